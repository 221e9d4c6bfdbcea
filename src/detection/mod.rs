//! Project detection
//!
//! Per-ecosystem analyzers inspect a repository through the
//! [`FileSystem`](crate::fs::FileSystem) abstraction and the [`Detector`]
//! resolves their results into one [`DetectionResult`].

pub mod analyzer;
pub mod cache;
pub mod cgo;
pub mod detector;
pub mod error;
pub mod go;
pub mod node;
pub mod python;
pub mod rust;
pub mod types;

pub use analyzer::EcosystemAnalyzer;
pub use cache::{CacheError, DetectionCache};
pub use cgo::CgoAnalysis;
pub use detector::{Detector, StrategyRecommendation, DOCKERFILE, FLAKE_FILE};
pub use error::DetectionError;
pub use types::{
    BuildType, DetectionResult, Framework, HintKey, HintKind, HintTypeError, HintValue, Strategy,
    SuggestedConfig,
};
