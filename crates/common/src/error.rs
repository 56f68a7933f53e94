//! Error types shared across Clutch crates.

use std::path::PathBuf;

/// Exit code for a run that failed on its inputs (EDL, probe, config).
pub const EXIT_INPUT_ERROR: i32 = 2;

/// Exit code for a run where an external tool step failed.
pub const EXIT_TOOL_FAILURE: i32 = 1;

/// Exit code for a run stopped by the user.
pub const EXIT_CANCELLED: i32 = 130;

/// Top-level error type for Clutch operations.
#[derive(Debug, thiserror::Error)]
pub enum ClutchError {
    #[error("Malformed EDL record at {}:{line}: {message}", path.display())]
    MalformedRecord {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Probe failed for {}: {message}", path.display())]
    ProbeFailure { path: PathBuf, message: String },

    #[error("Step {step} failed: {message}")]
    ExternalToolFailure { step: usize, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Cannot read {}: {source}", path.display())]
    UnreadableInput {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Run cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ClutchError.
pub type ClutchResult<T> = Result<T, ClutchError>;

impl ClutchError {
    pub fn malformed(path: impl Into<PathBuf>, line: usize, msg: impl Into<String>) -> Self {
        Self::MalformedRecord {
            path: path.into(),
            line,
            message: msg.into(),
        }
    }

    pub fn probe(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::ProbeFailure {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn tool(step: usize, msg: impl Into<String>) -> Self {
        Self::ExternalToolFailure {
            step,
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Process exit status for this error.
    ///
    /// Input problems are reported before any external tool runs, so they
    /// get a code distinct from a failure in the middle of a run.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::MalformedRecord { .. }
            | Self::ProbeFailure { .. }
            | Self::Config { .. }
            | Self::FileNotFound { .. }
            | Self::UnreadableInput { .. }
            | Self::Json(_) => EXIT_INPUT_ERROR,
            Self::Cancelled => EXIT_CANCELLED,
            Self::ExternalToolFailure { .. } | Self::Io(_) | Self::Other(_) => EXIT_TOOL_FAILURE,
        }
    }
}
