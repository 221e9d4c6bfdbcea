use super::types::Strategy;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that stop a detection pass.
///
/// Problems with secondary signals never surface here; they become warnings
/// on the `DetectionResult` instead.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("repository path does not exist: {0}")]
    PathNotFound(PathBuf),

    #[error("repository path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("failed to access repository {path}: {source}")]
    RepositoryAccess {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("could not detect application language")]
    NoLanguageDetected,

    #[error("multiple languages detected: {}", .0.iter().map(|s| s.language().to_string()).collect::<Vec<_>>().join(", "))]
    MultipleLanguages(Vec<Strategy>),

    #[error("no {marker} found for strategy {strategy}")]
    MarkerMissing { strategy: Strategy, marker: String },

    #[error("detected language '{0}' is not supported")]
    UnsupportedStrategy(Strategy),
}

impl DetectionError {
    /// Languages involved in an ambiguous detection, empty otherwise
    pub fn languages(&self) -> Vec<String> {
        match self {
            DetectionError::MultipleLanguages(strategies) => strategies
                .iter()
                .map(|s| s.language().to_string())
                .collect(),
            _ => Vec::new(),
        }
    }
}
