//! Exit codes for CLI operations following Unix conventions.
//!
//! # Exit Code Semantics
//!
//! - `0`: Success - operation completed, results found
//! - `1`: General error - unspecified failure
//! - `3-125`: Specific recoverable errors
//! - `126-255`: Reserved by shell

use crate::error::EngineError;

/// Standard exit codes for CLI operations.
///
/// These codes follow Unix conventions where 0 indicates success,
/// and non-zero values indicate various error conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Operation succeeded (code 0)
    Success = 0,

    /// Unspecified error occurred (code 1)
    GeneralError = 1,

    /// Query executed but matched nothing (code 3)
    NoResults = 3,

    /// Caller-supplied value outside the accepted range (code 4)
    InvalidArgument = 4,

    /// File I/O error (code 5)
    IoError = 5,

    /// Configuration error (code 6)
    ConfigError = 6,

    /// Artifact corruption detected (code 7)
    CorruptArtifact = 7,

    /// Artifact set has not been built yet (code 8)
    MissingArtifact = 8,

    /// Embedding backend failed to load or respond (code 9)
    UpstreamUnavailable = 9,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> i32 {
        code as i32
    }
}

impl ExitCode {
    /// Determine exit code for a query based on result presence.
    ///
    /// Returns `Success` if any results came back, `NoResults` otherwise.
    pub fn from_query_results<T>(results: &[T]) -> Self {
        if results.is_empty() {
            ExitCode::NoResults
        } else {
            ExitCode::Success
        }
    }

    /// Convert an `EngineError` to the appropriate exit code.
    ///
    /// Maps specific error types to semantic exit codes that scripts
    /// can use to determine appropriate recovery actions.
    pub fn from_error(error: &EngineError) -> Self {
        match error {
            EngineError::FileRead { .. } | EngineError::FileWrite { .. } => ExitCode::IoError,

            EngineError::MissingArtifact { .. } => ExitCode::MissingArtifact,
            EngineError::CorruptArtifact { .. } => ExitCode::CorruptArtifact,

            // The artifacts themselves validate internally; a dimension
            // mismatch at this level means the configured model disagrees
            // with the build, which is a configuration problem.
            EngineError::DimensionMismatch { .. } | EngineError::ConfigError { .. } => {
                ExitCode::ConfigError
            }

            EngineError::InvalidArgument { .. } => ExitCode::InvalidArgument,
            EngineError::UpstreamUnavailable { .. } => ExitCode::UpstreamUnavailable,

            // Everything else is a general error
            EngineError::BuildFailed { .. } | EngineError::General(_) => ExitCode::GeneralError,
        }
    }

    /// Check if this exit code indicates success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, ExitCode::Success)
    }

    /// Get a human-readable description of the exit code.
    pub fn description(&self) -> &str {
        match self {
            ExitCode::Success => "Success",
            ExitCode::GeneralError => "General error",
            ExitCode::NoResults => "No results",
            ExitCode::InvalidArgument => "Invalid argument",
            ExitCode::IoError => "I/O error",
            ExitCode::ConfigError => "Configuration error",
            ExitCode::CorruptArtifact => "Artifact corrupted",
            ExitCode::MissingArtifact => "Artifact set not built",
            ExitCode::UpstreamUnavailable => "Embedding backend unavailable",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Success as u8, 0);
        assert_eq!(ExitCode::GeneralError as u8, 1);
        assert_eq!(ExitCode::NoResults as u8, 3);
        assert_eq!(ExitCode::MissingArtifact as u8, 8);
    }

    #[test]
    fn test_from_query_results() {
        let hits = vec!["data"];
        assert_eq!(ExitCode::from_query_results(&hits), ExitCode::Success);

        let empty: Vec<&str> = Vec::new();
        assert_eq!(ExitCode::from_query_results(&empty), ExitCode::NoResults);
    }

    #[test]
    fn test_is_success() {
        assert!(ExitCode::Success.is_success());
        assert!(!ExitCode::NoResults.is_success());
        assert!(!ExitCode::GeneralError.is_success());
    }

    #[test]
    fn test_from_error_mapping() {
        let missing = EngineError::MissingArtifact {
            path: PathBuf::from("artifacts/vectors.bin"),
        };
        assert_eq!(ExitCode::from_error(&missing), ExitCode::MissingArtifact);

        let corrupt = EngineError::CorruptArtifact {
            reason: "checksum mismatch".to_string(),
        };
        assert_eq!(ExitCode::from_error(&corrupt), ExitCode::CorruptArtifact);

        let invalid = EngineError::InvalidArgument {
            reason: "top_n must be positive".to_string(),
        };
        assert_eq!(ExitCode::from_error(&invalid), ExitCode::InvalidArgument);

        let mismatch = EngineError::DimensionMismatch {
            expected: 384,
            actual: 512,
        };
        assert_eq!(ExitCode::from_error(&mismatch), ExitCode::ConfigError);
    }
}
