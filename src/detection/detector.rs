//! Repository-level detection
//!
//! The [`Detector`] runs each ecosystem analyzer against a repository and
//! resolves their answers into a single [`DetectionResult`]:
//!
//! 1. A readable `flake.nix` wins outright; an existing recipe is reused.
//! 2. Otherwise the Go, Node, Rust and Python analyzers run. Exactly one
//!    match is the answer, more than one is ambiguous.
//! 3. With no ecosystem match, a `Dockerfile` selects the dockerfile
//!    strategy with an OCI build type.
//!
//! All filesystem access goes through [`FileSystem`], so the detector can be
//! exercised against [`MockFileSystem`](crate::fs::MockFileSystem) in tests.

use super::analyzer::EcosystemAnalyzer;
use super::error::DetectionError;
use super::go::GoAnalyzer;
use super::node::NodeAnalyzer;
use super::python::PythonAnalyzer;
use super::rust::RustAnalyzer;
use super::types::{BuildType, DetectionResult, Strategy};
use crate::fs::{FileSystem, RealFileSystem};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

pub const FLAKE_FILE: &str = "flake.nix";
pub const DOCKERFILE: &str = "Dockerfile";

/// Suggested strategy for a repository, with the reasoning behind it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyRecommendation {
    pub strategy: Strategy,
    pub reason: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<Strategy>,
}

/// Detects the project type of a repository
pub struct Detector {
    fs: Arc<dyn FileSystem>,
    analyzers: Vec<Box<dyn EcosystemAnalyzer>>,
}

impl std::fmt::Debug for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Detector")
            .field(
                "analyzers",
                &self
                    .analyzers
                    .iter()
                    .map(|a| a.strategy())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Default for Detector {
    fn default() -> Self {
        Self::new(Arc::new(RealFileSystem))
    }
}

impl Detector {
    /// Creates a detector with the Go, Node, Rust and Python analyzers
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self {
            fs,
            analyzers: vec![
                Box::new(GoAnalyzer),
                Box::new(NodeAnalyzer),
                Box::new(RustAnalyzer),
                Box::new(PythonAnalyzer),
            ],
        }
    }

    pub fn filesystem(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    fn check_path(&self, repo: &Path) -> Result<(), DetectionError> {
        if !self.fs.exists(repo) {
            return Err(DetectionError::PathNotFound(repo.to_path_buf()));
        }
        if !self.fs.is_dir(repo) {
            return Err(DetectionError::NotADirectory(repo.to_path_buf()));
        }
        Ok(())
    }

    /// True when the repository root holds a readable `flake.nix`
    pub fn has_flake(&self, repo: &Path) -> bool {
        let path = repo.join(FLAKE_FILE);
        self.fs.is_file(&path) && self.fs.read_to_string(&path).is_ok()
    }

    pub fn has_dockerfile(&self, repo: &Path) -> bool {
        self.fs.is_file(&repo.join(DOCKERFILE))
    }

    fn flake_result() -> DetectionResult {
        DetectionResult::new(Strategy::Flake, 1.0)
    }

    fn dockerfile_result(confidence: f64) -> DetectionResult {
        let mut result = DetectionResult::new(Strategy::Dockerfile, confidence);
        result.recommended_build_type = BuildType::Oci;
        result
    }

    fn run_analyzer(
        &self,
        analyzer: &dyn EcosystemAnalyzer,
        repo: &Path,
    ) -> Result<Option<DetectionResult>, DetectionError> {
        analyzer
            .analyze(repo, self.fs.as_ref())
            .map_err(|source| DetectionError::RepositoryAccess {
                path: repo.to_path_buf(),
                source,
            })
    }

    fn ecosystem_matches(&self, repo: &Path) -> Result<Vec<DetectionResult>, DetectionError> {
        let mut matches = Vec::new();
        for analyzer in &self.analyzers {
            if let Some(result) = self.run_analyzer(analyzer.as_ref(), repo)? {
                debug!(
                    repo = %repo.display(),
                    strategy = %result.strategy,
                    confidence = result.confidence,
                    "Ecosystem matched"
                );
                matches.push(result);
            }
        }
        Ok(matches)
    }

    /// Detects the single strategy that applies to `repo`
    pub fn detect(&self, repo: &Path) -> Result<DetectionResult, DetectionError> {
        self.check_path(repo)?;

        if self.has_flake(repo) {
            info!(repo = %repo.display(), "Existing flake.nix found");
            return Ok(Self::flake_result());
        }

        let mut matches = self.ecosystem_matches(repo)?;
        match matches.len() {
            0 if self.has_dockerfile(repo) => {
                info!(repo = %repo.display(), "No ecosystem matched, using Dockerfile");
                Ok(Self::dockerfile_result(0.8))
            }
            0 => Err(DetectionError::NoLanguageDetected),
            1 => {
                let result = matches.remove(0);
                info!(
                    repo = %repo.display(),
                    strategy = %result.strategy,
                    framework = %result.framework,
                    version = %result.version,
                    "Detection complete"
                );
                Ok(result)
            }
            _ => Err(DetectionError::MultipleLanguages(
                matches.into_iter().map(|m| m.strategy).collect(),
            )),
        }
    }

    /// Every applicable result: flake first, ecosystems, then Dockerfile
    pub fn detect_all(&self, repo: &Path) -> Result<Vec<DetectionResult>, DetectionError> {
        self.check_path(repo)?;

        let mut results = Vec::new();
        if self.has_flake(repo) {
            results.push(Self::flake_result());
        }
        results.extend(self.ecosystem_matches(repo)?);
        if self.has_dockerfile(repo) {
            results.push(Self::dockerfile_result(0.8));
        }

        if results.is_empty() {
            return Err(DetectionError::NoLanguageDetected);
        }
        Ok(results)
    }

    /// Runs detection for one named strategy only
    ///
    /// The strategy's marker must be present; `auto` falls back to [`detect`](Self::detect).
    pub fn detect_for(
        &self,
        strategy: &Strategy,
        repo: &Path,
    ) -> Result<DetectionResult, DetectionError> {
        self.check_path(repo)?;

        match strategy {
            Strategy::Flake => {
                if self.has_flake(repo) {
                    Ok(Self::flake_result())
                } else {
                    Err(DetectionError::MarkerMissing {
                        strategy: strategy.clone(),
                        marker: FLAKE_FILE.to_string(),
                    })
                }
            }
            Strategy::Dockerfile => {
                if self.has_dockerfile(repo) {
                    Ok(Self::dockerfile_result(1.0))
                } else {
                    Err(DetectionError::MarkerMissing {
                        strategy: strategy.clone(),
                        marker: DOCKERFILE.to_string(),
                    })
                }
            }
            Strategy::Nixpacks => Ok(DetectionResult::new(Strategy::Nixpacks, 0.7)),
            Strategy::Auto => self.detect(repo),
            Strategy::Custom(_) => Err(DetectionError::UnsupportedStrategy(strategy.clone())),
            ecosystem => {
                let analyzer = self
                    .analyzers
                    .iter()
                    .find(|a| &a.strategy() == ecosystem)
                    .ok_or_else(|| DetectionError::UnsupportedStrategy(ecosystem.clone()))?;

                self.run_analyzer(analyzer.as_ref(), repo)?
                    .ok_or_else(|| DetectionError::MarkerMissing {
                        strategy: ecosystem.clone(),
                        marker: analyzer.marker_files().join(" or "),
                    })
            }
        }
    }

    /// Ecosystems whose marker files are present, and whether there is more than one
    pub fn is_mixed_language_repo(&self, repo: &Path) -> (bool, Vec<Strategy>) {
        let strategies: Vec<Strategy> = self
            .analyzers
            .iter()
            .filter(|a| a.matches(repo, self.fs.as_ref()))
            .map(|a| a.strategy())
            .collect();

        (strategies.len() > 1, strategies)
    }

    /// Recommends a strategy without failing on ambiguous repositories
    pub fn recommend(&self, repo: &Path) -> Result<StrategyRecommendation, DetectionError> {
        self.check_path(repo)?;

        if self.has_flake(repo) {
            return Ok(StrategyRecommendation {
                strategy: Strategy::Flake,
                reason: "Repository contains a flake.nix file".to_string(),
                confidence: 1.0,
                alternatives: Vec::new(),
            });
        }

        let (mixed, strategies) = self.is_mixed_language_repo(repo);
        if mixed {
            let (strategy, reason) = if self.has_dockerfile(repo) {
                (
                    Strategy::Dockerfile,
                    "Multiple languages detected, using the repository Dockerfile",
                )
            } else {
                (
                    Strategy::Nixpacks,
                    "Multiple languages detected, using Nixpacks",
                )
            };
            return Ok(StrategyRecommendation {
                strategy,
                reason: reason.to_string(),
                confidence: 0.5,
                alternatives: strategies,
            });
        }

        match self.detect(repo) {
            Ok(result) => Ok(StrategyRecommendation {
                reason: format!("Detected {} project", result.strategy),
                strategy: result.strategy,
                confidence: result.confidence,
                alternatives: Vec::new(),
            }),
            Err(DetectionError::NoLanguageDetected) => Ok(StrategyRecommendation {
                strategy: Strategy::Nixpacks,
                reason: "No language or Dockerfile detected, using Nixpacks as fallback"
                    .to_string(),
                confidence: 0.5,
                alternatives: Vec::new(),
            }),
            Err(e) => Err(e),
        }
    }
}
