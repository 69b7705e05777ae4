//! Terminal display utilities for CLI output.
//!
//! Provides progress bars and spinners for long-running operations.

pub mod progress;

pub use progress::{create_progress_bar, create_spinner, with_spinner};
