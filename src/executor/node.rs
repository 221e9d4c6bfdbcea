use super::pipeline::{app_name_hint, effective_config, render_recipe, template_data};
use super::{ExecutorContext, StrategyExecutor};
use crate::build_config::BuildConfig;
use crate::detection::{DetectionResult, Strategy};
use crate::error::BuildError;
use crate::recipe::template_for_strategy;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Node.js projects via `buildNpmPackage`; Next.js gets its own template
#[derive(Debug)]
pub struct NodeExecutor {
    context: Arc<ExecutorContext>,
}

impl NodeExecutor {
    pub fn new(context: Arc<ExecutorContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl StrategyExecutor for NodeExecutor {
    fn strategy(&self) -> Strategy {
        Strategy::AutoNode
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
        let template = template_for_strategy(&Strategy::AutoNode, &detection.framework, &config)
            .ok_or_else(|| BuildError::template_not_found("nodejs"))?;
        let app_name = app_name_hint(detection).unwrap_or_else(|| "app".to_string());
        debug!(app_name = %app_name, template, framework = %detection.framework, "Rendering Node recipe");

        render_recipe(&self.context, template, &template_data(app_name, detection, config))
    }
}
