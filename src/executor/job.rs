use crate::build_config::BuildConfig;
use crate::detection::{BuildType, DetectionResult, Strategy};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// One build request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildJob {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    pub repo_path: PathBuf,
    /// Commit the checkout is at; keys the detection cache
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    pub strategy: Strategy,
    #[serde(default)]
    pub build_type: BuildType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection: Option<DetectionResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<BuildConfig>,
}

impl BuildJob {
    pub fn new(repo_path: impl Into<PathBuf>, strategy: Strategy, build_type: BuildType) -> Self {
        Self {
            id: Uuid::new_v4(),
            repo_path: repo_path.into(),
            commit: None,
            strategy,
            build_type,
            recipe: None,
            detection: None,
            detected_at: None,
            config: None,
        }
    }

    pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = Some(commit.into());
        self
    }

    pub fn with_config(mut self, config: BuildConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_recipe(mut self, recipe: impl Into<String>) -> Self {
        self.recipe = Some(recipe.into());
        self
    }

    /// Caches a detection on the job, stamping when it was taken
    pub fn with_detection(mut self, detection: DetectionResult) -> Self {
        self.record_detection(detection);
        self
    }

    pub fn record_detection(&mut self, detection: DetectionResult) {
        self.detection = Some(detection);
        self.detected_at = Some(Utc::now());
    }

    /// A non-empty recipe already attached to the job
    pub fn existing_recipe(&self) -> Option<&str> {
        self.recipe.as_deref().filter(|r| !r.is_empty())
    }

    /// Stores `recipe` unless the job already has one
    ///
    /// Returns whether the recipe was written.
    pub fn record_recipe(&mut self, recipe: &str) -> bool {
        if self.existing_recipe().is_some() || recipe.is_empty() {
            return false;
        }
        self.recipe = Some(recipe.to_string());
        true
    }
}

/// Recipe text handed back by `prepare`
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRecipe {
    pub text: String,
    /// False when the job's existing recipe or the repository's flake was used
    pub freshly_generated: bool,
    pub detection: Option<DetectionResult>,
}

impl PreparedRecipe {
    pub fn reused(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            freshly_generated: false,
            detection: None,
        }
    }
}

/// Artifact of a successful build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResult {
    pub artifact: String,
    /// Set for pure-nix builds only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_path: Option<String>,
    /// Set for oci builds only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_tag: Option<String>,
    pub build_type: BuildType,
    pub logs: String,
    pub exit_code: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub prepared: PreparedRecipe,
    pub result: BuildResult,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_recipe_writes_once() {
        let mut job = BuildJob::new("/src", Strategy::AutoGo, BuildType::PureNix);
        assert!(job.record_recipe("first"));
        assert!(!job.record_recipe("second"));
        assert_eq!(job.recipe.as_deref(), Some("first"));
    }

    #[test]
    fn test_record_recipe_ignores_empty() {
        let mut job = BuildJob::new("/src", Strategy::Nixpacks, BuildType::Oci);
        assert!(!job.record_recipe(""));
        assert!(job.recipe.is_none());

        job.recipe = Some(String::new());
        assert!(job.existing_recipe().is_none());
        assert!(job.record_recipe("generated"));
    }

    #[test]
    fn test_detection_is_stamped() {
        let job = BuildJob::new("/src", Strategy::AutoRust, BuildType::PureNix)
            .with_detection(DetectionResult::new(Strategy::AutoRust, 0.9));
        assert!(job.detection.is_some());
        assert!(job.detected_at.is_some());
    }

    #[test]
    fn test_job_yaml() {
        let yaml = r#"
repo_path: /work/api
strategy: auto-go
build_type: oci
config:
  cgo_enabled: false
"#;
        let job: BuildJob = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(job.strategy, Strategy::AutoGo);
        assert_eq!(job.build_type, BuildType::Oci);
        assert_eq!(job.config.and_then(|c| c.cgo_enabled), Some(false));
    }

    #[test]
    fn test_unknown_build_type_survives_deserialization() {
        let job: BuildJob =
            serde_json::from_str(r#"{"repo_path":"/x","strategy":"auto-go","build_type":"wasm"}"#)
                .unwrap();
        assert_eq!(job.build_type, BuildType::Custom("wasm".to_string()));
    }
}
