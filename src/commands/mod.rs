pub mod analyze;
pub mod filter;

// Re-export command functions for convenience
pub use analyze::{analyze, AnalyzeParams};
pub use filter::filter;
