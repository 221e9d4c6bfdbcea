use super::pipeline::run_build;
use super::{select_build_type, BuildJob, Execution, ExecutorContext, PreparedRecipe, StrategyExecutor};
use crate::backend::LogStream;
use crate::build_config::BuildConfig;
use crate::detection::{DetectionResult, Strategy};
use crate::error::BuildError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Hands the repository to nixpacks; always produces an OCI image
#[derive(Debug)]
pub struct NixpacksExecutor {
    context: Arc<ExecutorContext>,
}

impl NixpacksExecutor {
    pub fn new(context: Arc<ExecutorContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl StrategyExecutor for NixpacksExecutor {
    fn strategy(&self) -> Strategy {
        Strategy::Nixpacks
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

    fn prepare(&self, _job: &BuildJob) -> Result<PreparedRecipe, BuildError> {
        Ok(PreparedRecipe::reused(String::new()))
    }

    async fn execute(
        &self,
        job: &BuildJob,
        logs: &LogStream,
        cancel: &CancellationToken,
    ) -> Result<Execution, BuildError> {
        let decision = select_build_type(&Strategy::Nixpacks, Some(&job.build_type));
        let prepared = self.prepare(job)?;
        run_build(
            &self.context,
            &Strategy::Nixpacks,
            job,
            prepared,
            &decision.build_type,
            logs,
            cancel,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, MockBackend};
    use crate::detection::BuildType;
    use crate::error::ErrorCode;

    #[tokio::test]
    async fn test_builds_through_container_backend() {
        let container = Arc::new(MockBackend::new("localhost:5000/app:1"));
        let context = ExecutorContext::new(Arc::new(MockBackend::default()), container.clone());
        let exec = NixpacksExecutor::new(Arc::new(context));

        let job = BuildJob::new("/mock", Strategy::Nixpacks, BuildType::PureNix);
        let execution = exec
            .execute(&job, &LogStream::detached(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(execution.result.build_type, BuildType::Oci);
        assert!(execution.prepared.text.is_empty());
        assert_eq!(container.calls()[0].strategy, Strategy::Nixpacks);
    }

    #[tokio::test]
    async fn test_failure_maps_to_nixpacks_code() {
        let container = Arc::new(MockBackend::failing(BackendError::build_failed(
            "no provider matched",
            Some(1),
        )));
        let context = ExecutorContext::new(Arc::new(MockBackend::default()), container);
        let exec = NixpacksExecutor::new(Arc::new(context));

        let job = BuildJob::new("/mock", Strategy::Nixpacks, BuildType::Oci);
        let err = exec
            .execute(&job, &LogStream::detached(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::NixpacksFailed);
        assert!(err.generated_recipe.is_none());
    }
}
