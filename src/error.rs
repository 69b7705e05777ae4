//! Error types for the recommendation engine
//!
//! This module provides structured error types using thiserror for better
//! error handling and actionable error messages.

use std::path::PathBuf;
use thiserror::Error;

use crate::embedding::EncodeError;
use crate::vector::VectorError;

/// Main error type for build and query operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// File system errors
    #[error("Failed to read file '{path}': {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A required artifact file does not exist
    #[error("Artifact missing: '{path}' not found. Build the artifact set first.")]
    MissingArtifact { path: PathBuf },

    /// An artifact exists but fails validation
    #[error("Artifact corrupted: {reason}")]
    CorruptArtifact { reason: String },

    /// A vector's width disagrees with the store's fixed dimension
    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A caller-supplied value is outside the accepted range
    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    /// The embedding model failed to load or embed
    #[error("Embedding backend unavailable: {reason}")]
    UpstreamUnavailable { reason: String },

    /// Configuration errors
    #[error("Invalid configuration: {reason}")]
    ConfigError { reason: String },

    /// Build pipeline errors with the failing stage attached
    #[error("Build failed during {stage}: {cause}")]
    BuildFailed { stage: String, cause: String },

    /// General errors for cases where we need to preserve existing behavior
    #[error("{0}")]
    General(String),
}

impl EngineError {
    /// Get a stable status code for this error type.
    ///
    /// Returns a string identifier that can be used in JSON responses
    /// for programmatic error handling.
    pub fn status_code(&self) -> String {
        match self {
            Self::FileRead { .. } => "FILE_READ_ERROR",
            Self::FileWrite { .. } => "FILE_WRITE_ERROR",
            Self::MissingArtifact { .. } => "MISSING_ARTIFACT",
            Self::CorruptArtifact { .. } => "CORRUPT_ARTIFACT",
            Self::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
            Self::UpstreamUnavailable { .. } => "UPSTREAM_UNAVAILABLE",
            Self::ConfigError { .. } => "CONFIG_ERROR",
            Self::BuildFailed { .. } => "BUILD_FAILED",
            Self::General(_) => "GENERAL_ERROR",
        }
        .to_string()
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::MissingArtifact { .. } => vec![
                "Run 'storymatch build --input <csv>' to produce the artifact set",
                "Check that artifacts_dir in .storymatch/settings.toml points at the right directory",
            ],
            Self::CorruptArtifact { .. } => vec![
                "Rebuild the artifacts with 'storymatch build'",
                "Check for disk errors or filesystem corruption",
            ],
            Self::DimensionMismatch { .. } => vec![
                "Rebuild the artifacts so they match the configured embedding model",
                "Check [embedding].model in .storymatch/settings.toml",
            ],
            Self::UpstreamUnavailable { .. } => vec![
                "Check your internet connection; models download on first use",
                "Verify the model cache directory is writable",
            ],
            Self::ConfigError { .. } => vec![
                "Check .storymatch/settings.toml for invalid values",
                "Run 'storymatch init --force' to regenerate a commented template",
            ],
            Self::FileRead { .. } => vec![
                "Check that the file exists and you have read permissions",
                "Ensure the file is not locked by another process",
            ],
            Self::FileWrite { .. } => vec![
                "Check disk space and write permissions for the target directory",
            ],
            _ => vec![],
        }
    }
}

impl From<VectorError> for EngineError {
    fn from(e: VectorError) -> Self {
        match e {
            VectorError::DimensionMismatch { expected, actual } => {
                Self::DimensionMismatch { expected, actual }
            }
            VectorError::InvalidTopK(_) => Self::InvalidArgument {
                reason: e.to_string(),
            },
            other => Self::General(other.to_string()),
        }
    }
}

impl From<EncodeError> for EngineError {
    fn from(e: EncodeError) -> Self {
        match e {
            // A bad model name is a configuration problem, not a
            // backend outage.
            EncodeError::UnknownModel(_) => Self::ConfigError {
                reason: e.to_string(),
            },
            other => Self::UpstreamUnavailable {
                reason: other.to_string(),
            },
        }
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Helper trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add context to an error
    fn context(self, msg: &str) -> Result<T, EngineError>;

    /// Add context with a path
    fn with_path(self, path: &std::path::Path) -> Result<T, EngineError>;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, msg: &str) -> Result<T, EngineError> {
        self.map_err(|e| EngineError::General(format!("{msg}: {e}")))
    }

    fn with_path(self, path: &std::path::Path) -> Result<T, EngineError> {
        self.map_err(|e| {
            EngineError::General(format!("Error processing '{}': {}", path.display(), e))
        })
    }
}
