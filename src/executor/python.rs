use super::pipeline::{app_name_hint, effective_config, render_recipe, template_data};
use super::{ExecutorContext, StrategyExecutor};
use crate::build_config::BuildConfig;
use crate::detection::{DetectionResult, Strategy};
use crate::error::BuildError;
use crate::recipe::template_for_strategy;
use async_trait::async_trait;
use std::sync::Arc;

/// Python applications; Django, FastAPI and Flask get framework start commands
#[derive(Debug)]
pub struct PythonExecutor {
    context: Arc<ExecutorContext>,
}

impl PythonExecutor {
    pub fn new(context: Arc<ExecutorContext>) -> Self {
        Self { context }
    }
}

/// Django project package from `mysite.settings`
fn django_project(config: &BuildConfig) -> Option<String> {
    config
        .django
        .as_ref()
        .and_then(|d| d.settings_module.as_deref())
        .and_then(|module| module.split('.').next())
        .filter(|project| !project.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl StrategyExecutor for PythonExecutor {
    fn strategy(&self) -> Strategy {
        Strategy::AutoPython
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
        let template = template_for_strategy(&Strategy::AutoPython, &detection.framework, &config)
            .ok_or_else(|| BuildError::template_not_found("python"))?;
        let app_name = app_name_hint(detection)
            .or_else(|| django_project(&config))
            .unwrap_or_else(|| "app".to_string());

        render_recipe(&self.context, template, &template_data(app_name, detection, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_config::FastApiOptions;
    use crate::detection::{Framework, HintKey};

    fn executor() -> PythonExecutor {
        PythonExecutor::new(Arc::new(ExecutorContext::for_tests()))
    }

    fn detection(framework: Framework) -> DetectionResult {
        let mut detection = DetectionResult::new(Strategy::AutoPython, 0.9);
        detection.framework = framework;
        detection.suggested_config.set_text(HintKey::PythonVersion, "3.12");
        detection
    }

    #[test]
    fn test_django_recipe() {
        let mut detection = detection(Framework::Django);
        detection
            .suggested_config
            .set_text(HintKey::DjangoSettingsModule, "mysite.settings");

        let recipe = executor().generate_recipe(&detection, None).unwrap();
        assert!(recipe.contains("python312"));
        assert!(recipe.contains("gunicorn mysite.wsgi --bind 0.0.0.0:8000"));
        assert!(recipe.contains("appName = \"mysite\""));
    }

    #[test]
    fn test_fastapi_workers() {
        let mut detection = detection(Framework::FastApi);
        detection
            .suggested_config
            .set_text(HintKey::FastapiAppModule, "app.main:app");
        let config = BuildConfig {
            fastapi: Some(FastApiOptions {
                workers: Some(4),
                ..Default::default()
            }),
            ..Default::default()
        };

        let recipe = executor().generate_recipe(&detection, Some(&config)).unwrap();
        assert!(recipe.contains("uvicorn app.main:app --host 0.0.0.0 --port 8000 --workers 4"));
    }

    #[test]
    fn test_generic_defaults() {
        let recipe = executor()
            .generate_recipe(&DetectionResult::new(Strategy::AutoPython, 0.9), None)
            .unwrap();
        assert!(recipe.contains("python311"));
        assert!(recipe.contains("python main.py"));
        assert!(recipe.contains("appName = \"app\""));
    }

    #[test]
    fn test_django_project() {
        let config = BuildConfig::default();
        assert_eq!(django_project(&config), None);
    }
}
