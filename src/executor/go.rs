use super::pipeline::{self, app_name_hint, effective_config, render_recipe, template_data};
use super::{BuildJob, ExecutorContext, PreparedRecipe, StrategyExecutor};
use crate::build_config::BuildConfig;
use crate::detection::{DetectionResult, HintKey, Strategy};
use crate::error::BuildError;
use crate::recipe::{substitute_ldflags_variables, template_for_strategy, BuildContext};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

const DEFAULT_APP_NAME: &str = "app";

/// Go modules via `buildGoModule`
#[derive(Debug)]
pub struct GoExecutor {
    context: Arc<ExecutorContext>,
}

impl GoExecutor {
    pub fn new(context: Arc<ExecutorContext>) -> Self {
        Self { context }
    }

    /// Renders with ldflags placeholders resolved against `build_context`
    fn generate_with(
        &self,
        detection: &DetectionResult,
        user: Option<&BuildConfig>,
        build_context: &BuildContext,
    ) -> Result<String, BuildError> {
        let mut config = effective_config(user, detection)?;
        config.cgo_enabled = Some(resolve_cgo(user, detection));

        if config.entry_point.is_none() {
            config.entry_point = detection.entry_points.first().cloned();
        }

        if let Some(ldflags) = config.ldflags.as_deref() {
            config.ldflags = Some(substitute_ldflags_variables(ldflags, build_context));
        }

        let template = template_for_strategy(&Strategy::AutoGo, &detection.framework, &config)
            .ok_or_else(|| BuildError::template_not_found("go"))?;
        let app_name = app_name(config.entry_point.as_deref(), detection);
        debug!(app_name = %app_name, template, "Rendering Go recipe");

        let data = template_data(app_name, detection, config);
        render_recipe(&self.context, template, &data)
    }
}

/// The caller's explicit CGO setting wins over the detected one
fn resolve_cgo(user: Option<&BuildConfig>, detection: &DetectionResult) -> bool {
    let requested = user.and_then(|c| c.cgo_enabled);
    let detected = detection.suggested_config.flag(HintKey::CgoEnabled);

    if let (Some(requested), Some(detected)) = (requested, detected) {
        if requested != detected {
            info!(
                "User CGO setting ({}) overrides detected setting ({})",
                requested, detected
            );
        }
    }

    requested.or(detected).unwrap_or(false)
}

/// Entry point basename, else the module name hint
fn app_name(entry_point: Option<&str>, detection: &DetectionResult) -> String {
    entry_point
        .map(|e| e.trim_end_matches('/'))
        .and_then(|e| Path::new(e).file_name())
        .and_then(|name| name.to_str())
        .filter(|name| !name.is_empty() && *name != ".")
        .map(str::to_string)
        .or_else(|| app_name_hint(detection))
        .unwrap_or_else(|| DEFAULT_APP_NAME.to_string())
}

#[async_trait]
impl StrategyExecutor for GoExecutor {
    fn strategy(&self) -> Strategy {
        Strategy::AutoGo
    }

    fn context(&self) -> &ExecutorContext {
        &self.context
    }

    fn generate_recipe(
        &self,
        detection: &DetectionResult,
        config: Option<&BuildConfig>,
    ) -> Result<String, BuildError> {
        self.generate_with(detection, config, &BuildContext::reproducible(None))
    }

    fn prepare(&self, job: &BuildJob) -> Result<PreparedRecipe, BuildError> {
        let build_context = BuildContext::from_env(job.commit.as_deref());
        pipeline::prepare_with(&self.context, &Strategy::AutoGo, job, |detection| {
            self.generate_with(detection, job.config.as_ref(), &build_context)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{LogStream, MockBackend};
    use crate::detection::{BuildType, Detector};
    use crate::error::ErrorCode;
    use crate::fs::MockFileSystem;
    use tokio_util::sync::CancellationToken;

    fn go_detection(cgo: bool) -> DetectionResult {
        let mut detection = DetectionResult::new(Strategy::AutoGo, 0.95);
        detection.version = "1.22".to_string();
        detection.entry_points = vec![".".to_string()];
        detection.suggested_config.set_text(HintKey::GoVersion, "1.22");
        detection.suggested_config.set_text(HintKey::AppName, "hello");
        detection.suggested_config.set_bool(HintKey::CgoEnabled, cgo);
        detection
    }

    fn executor() -> GoExecutor {
        GoExecutor::new(Arc::new(ExecutorContext::for_tests()))
    }

    #[test]
    fn test_generate_recipe_pure_go() {
        let recipe = executor()
            .generate_recipe(&go_detection(false), None)
            .unwrap();
        assert!(recipe.contains("buildGo122Module"));
        assert!(recipe.contains("CGO_ENABLED = \"0\""));
        assert!(recipe.contains("hello"));
    }

    #[test]
    fn test_generate_recipe_is_deterministic() {
        let exec = executor();
        let detection = go_detection(false);
        let config = BuildConfig {
            ldflags: Some("-X main.built=${buildTime}".to_string()),
            ..Default::default()
        };
        let first = exec.generate_recipe(&detection, Some(&config)).unwrap();
        let second = exec.generate_recipe(&detection, Some(&config)).unwrap();
        assert_eq!(first, second);
        assert!(first.contains("1970-01-01"));
    }

    #[test]
    fn test_user_disables_detected_cgo() {
        let config = BuildConfig {
            cgo_enabled: Some(false),
            ..Default::default()
        };
        let recipe = executor()
            .generate_recipe(&go_detection(true), Some(&config))
            .unwrap();
        assert!(recipe.contains("CGO_ENABLED = \"0\""));
        assert!(!recipe.contains("pkg-config"));
    }

    #[test]
    fn test_detected_cgo_selects_cgo_template() {
        let recipe = executor()
            .generate_recipe(&go_detection(true), None)
            .unwrap();
        assert!(recipe.contains("CGO_ENABLED = \"1\""));
    }

    #[test]
    fn test_resolve_cgo() {
        let on = BuildConfig {
            cgo_enabled: Some(true),
            ..Default::default()
        };
        assert!(resolve_cgo(Some(&on), &go_detection(false)));
        assert!(resolve_cgo(None, &go_detection(true)));
        assert!(!resolve_cgo(None, &DetectionResult::new(Strategy::AutoGo, 0.9)));
    }

    #[test]
    fn test_app_name() {
        let detection = go_detection(false);
        assert_eq!(app_name(Some("cmd/api"), &detection), "api");
        assert_eq!(app_name(Some("./cmd/worker/"), &detection), "worker");
        assert_eq!(app_name(Some("."), &detection), "hello");
        assert_eq!(
            app_name(None, &DetectionResult::new(Strategy::AutoGo, 0.9)),
            "app"
        );
    }

    #[test]
    fn test_prepare_reuses_existing_recipe() {
        let job = BuildJob::new("/mock", Strategy::AutoGo, BuildType::PureNix)
            .with_recipe("{ existing }");
        let prepared = executor().prepare(&job).unwrap();
        assert_eq!(prepared.text, "{ existing }");
        assert!(!prepared.freshly_generated);
        assert!(prepared.detection.is_none());
    }

    #[tokio::test]
    async fn test_execute_detects_and_builds() {
        let fs = MockFileSystem::new();
        fs.add_file("go.mod", "module example.com/hello\n\ngo 1.22\n");
        fs.add_file("main.go", "package main\n\nfunc main() {}\n");

        let package = Arc::new(MockBackend::new("/nix/store/abc-hello"));
        let context = ExecutorContext::new(package.clone(), Arc::new(MockBackend::default()))
            .with_detector(Detector::new(Arc::new(fs)));
        let exec = GoExecutor::new(Arc::new(context));
        let job = BuildJob::new("/mock", Strategy::AutoGo, BuildType::PureNix)
            .with_commit("abc123");

        let execution = exec
            .execute(&job, &LogStream::detached(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(execution.prepared.freshly_generated);
        assert!(execution.prepared.text.contains("buildGo122Module"));
        assert_eq!(
            execution.result.store_path.as_deref(),
            Some("/nix/store/abc-hello")
        );
        let calls = package.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].recipe, execution.prepared.text);
    }

    #[tokio::test]
    async fn test_execute_without_go_mod_fails_detection() {
        let exec = executor();
        let job = BuildJob::new("/mock", Strategy::AutoGo, BuildType::PureNix);

        let err = exec
            .execute(&job, &LogStream::detached(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::NoLanguageDetected);
        assert_eq!(err.strategy, Some(Strategy::AutoGo));
        assert!(err.generated_recipe.is_none());
    }
}
