//! Run-level error type
//!
//! Per-domain problems never surface here: fetch failures are contained in
//! the domain's outcome and input failures degrade to empty lists (see
//! [`crate::utils::error`]). What is left are the errors that stop a run
//! from producing a report at all: building the HTTP client and writing
//! the output files.

use std::io;
use thiserror::Error;

/// Error that prevents a run from completing
#[derive(Error, Debug)]
pub enum Error {
    /// I/O errors while writing reports
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Run summary serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writing errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// HTTP client construction errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias using the run-level Error type
pub type Result<T> = std::result::Result<T, Error>;
