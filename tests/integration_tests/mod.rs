//! Integration tests module
//!
//! End-to-end tests for the rankmatch pipeline, including:
//! - Complete load -> filter -> fetch -> match -> report runs
//! - Failure isolation and run abort scenarios

pub mod error_scenarios;
pub mod fixtures;
pub mod pipeline_test;
