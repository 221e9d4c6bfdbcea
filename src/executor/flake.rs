use super::{BuildJob, ExecutorContext, PreparedRecipe, StrategyExecutor};
use crate::build_config::BuildConfig;
use crate::detection::{DetectionResult, Strategy, FLAKE_FILE};
use crate::error::BuildError;
use crate::progress::ProgressEvent;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Builds the flake the repository ships
#[derive(Debug)]
pub struct FlakeExecutor {
    context: Arc<ExecutorContext>,
}

impl FlakeExecutor {
    pub fn new(context: Arc<ExecutorContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl StrategyExecutor for FlakeExecutor {
    fn strategy(&self) -> Strategy {
        Strategy::Flake
    }

    fn context(&self) -> &ExecutorContext {
        &self.context
    }

    fn generate_recipe(
        &self,
        _detection: &DetectionResult,
        _config: Option<&BuildConfig>,
    ) -> Result<String, BuildError> {
        Ok(String::new())
    }

    fn prepare(&self, job: &BuildJob) -> Result<PreparedRecipe, BuildError> {
        if let Some(recipe) = job.existing_recipe() {
            self.context.report(ProgressEvent::RecipeReused {
                bytes: recipe.len(),
            });
            return Ok(PreparedRecipe::reused(recipe));
        }

        let detector = self.context.detector();
        if !detector.has_flake(&job.repo_path) {
            return Err(BuildError::flake_not_found().with_strategy(Strategy::Flake));
        }

        let path = job.repo_path.join(FLAKE_FILE);
        let text = detector
            .filesystem()
            .read_to_string(&path)
            .map_err(|e| BuildError::repository_access(e).with_strategy(Strategy::Flake))?;
        debug!(path = %path.display(), bytes = text.len(), "Using repository flake");

        Ok(PreparedRecipe::reused(text))
    }
}
