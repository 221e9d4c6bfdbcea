//! Build backend errors

use std::fmt;

/// Errors that can occur while a backend builds an artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The backend process could not be started
    SpawnFailed { program: String, message: String },

    /// The build ran and failed; `message` holds the tail of its output
    BuildFailed {
        message: String,
        exit_code: Option<i32>,
    },

    /// The build finished but produced no recognizable artifact
    MissingArtifact { message: String },

    /// A required input file does not exist in the repository
    MissingInput { path: String },

    /// Preparing the build workspace failed
    Io { message: String },

    /// The build was cancelled before it finished
    Cancelled,
}

impl BackendError {
    pub fn build_failed(message: impl Into<String>, exit_code: Option<i32>) -> Self {
        BackendError::BuildFailed {
            message: message.into(),
            exit_code,
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            BackendError::BuildFailed { exit_code, .. } => *exit_code,
            _ => None,
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::SpawnFailed { program, message } => {
                write!(f, "Failed to start {}: {}", program, message)
            }
            BackendError::BuildFailed { message, exit_code } => {
                if let Some(code) = exit_code {
                    write!(f, "Build failed (exit code {}): {}", code, message)
                } else {
                    write!(f, "Build failed: {}", message)
                }
            }
            BackendError::MissingArtifact { message } => {
                write!(f, "Build produced no artifact: {}", message)
            }
            BackendError::MissingInput { path } => {
                write!(f, "Required file not found: {}", path)
            }
            BackendError::Io { message } => write!(f, "I/O error: {}", message),
            BackendError::Cancelled => write!(f, "Build cancelled"),
        }
    }
}

impl std::error::Error for BackendError {}

impl From<std::io::Error> for BackendError {
    fn from(e: std::io::Error) -> Self {
        BackendError::Io {
            message: e.to_string(),
        }
    }
}
