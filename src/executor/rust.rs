use super::pipeline::{app_name_hint, effective_config, render_recipe, template_data};
use super::{ExecutorContext, StrategyExecutor};
use crate::build_config::BuildConfig;
use crate::detection::{DetectionResult, Strategy};
use crate::error::BuildError;
use crate::recipe::template_for_strategy;
use async_trait::async_trait;
use std::sync::Arc;

/// Cargo projects via `rustPlatform.buildRustPackage`
#[derive(Debug)]
pub struct RustExecutor {
    context: Arc<ExecutorContext>,
}

impl RustExecutor {
    pub fn new(context: Arc<ExecutorContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl StrategyExecutor for RustExecutor {
    fn strategy(&self) -> Strategy {
        Strategy::AutoRust
    }

    fn context(&self) -> &ExecutorContext {
        &self.context
    }

    fn generate_recipe(
        &self,
        detection: &DetectionResult,
        config: Option<&BuildConfig>,
    ) -> Result<String, BuildError> {
        let config = effective_config(config, detection)?;
        let template = template_for_strategy(&Strategy::AutoRust, &detection.framework, &config)
            .ok_or_else(|| BuildError::template_not_found("rust"))?;

        // The binary to run doubles as the package name
        let app_name = config
            .entry_point
            .clone()
            .filter(|e| !e.is_empty())
            .or_else(|| app_name_hint(detection))
            .unwrap_or_else(|| "app".to_string());

        render_recipe(&self.context, template, &template_data(app_name, detection, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{LogStream, MockBackend};
    use crate::detection::{BuildType, Detector, HintKey};
    use crate::error::ErrorCode;
    use crate::executor::BuildJob;
    use crate::fs::MockFileSystem;
    use tokio_util::sync::CancellationToken;

    fn rust_detection() -> DetectionResult {
        let mut detection = DetectionResult::new(Strategy::AutoRust, 0.95);
        detection.entry_points = vec!["cli".to_string(), "daemon".to_string()];
        detection.suggested_config.set_text(HintKey::EntryPoint, "cli");
        detection.suggested_config.set_text(HintKey::AppName, "cli");
        detection
    }

    #[test]
    fn test_recipe_uses_first_binary() {
        let exec = RustExecutor::new(Arc::new(ExecutorContext::for_tests()));
        let recipe = exec.generate_recipe(&rust_detection(), None).unwrap();
        assert!(recipe.contains("buildRustPackage"));
        assert!(recipe.contains("appName = \"cli\""));
    }

    #[test]
    fn test_user_entry_point_selects_binary() {
        let exec = RustExecutor::new(Arc::new(ExecutorContext::for_tests()));
        let config = BuildConfig {
            entry_point: Some("daemon".to_string()),
            ..Default::default()
        };
        let recipe = exec.generate_recipe(&rust_detection(), Some(&config)).unwrap();
        assert!(recipe.contains("appName = \"daemon\""));
    }

    #[test]
    fn test_invalid_user_config_rejected() {
        let exec = RustExecutor::new(Arc::new(ExecutorContext::for_tests()));
        let config = BuildConfig {
            build_tags: vec!["has space".to_string()],
            ..Default::default()
        };
        let err = exec
            .generate_recipe(&rust_detection(), Some(&config))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfig);
    }

    #[tokio::test]
    async fn test_cancelled_build() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "Cargo.toml",
            "[package]\nname = \"server\"\nversion = \"0.1.0\"\nedition = \"2021\"\n",
        );
        let package = Arc::new(
            MockBackend::new("/nix/store/x-server").with_delay(std::time::Duration::from_secs(30)),
        );
        let context = ExecutorContext::new(package, Arc::new(MockBackend::default()))
            .with_detector(Detector::new(Arc::new(fs)));
        let exec = RustExecutor::new(Arc::new(context));
        let job = BuildJob::new("/mock", Strategy::AutoRust, BuildType::PureNix);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = exec
            .execute(&job, &LogStream::detached(), &cancel)
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::BuildCancelled);
        assert!(err
            .generated_recipe
            .as_deref()
            .is_some_and(|r| r.contains("appName = \"server\"")));
    }
}
