use super::pipeline::run_build;
use super::{select_build_type, BuildJob, Execution, ExecutorContext, PreparedRecipe, StrategyExecutor};
use crate::backend::LogStream;
use crate::build_config::BuildConfig;
use crate::detection::{DetectionResult, Strategy};
use crate::error::BuildError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Builds the repository's Dockerfile; always produces an OCI image
#[derive(Debug)]
pub struct DockerfileExecutor {
    context: Arc<ExecutorContext>,
}

impl DockerfileExecutor {
    pub fn new(context: Arc<ExecutorContext>) -> Self {
        Self { context }
    }
}

#[async_trait]
impl StrategyExecutor for DockerfileExecutor {
    fn strategy(&self) -> Strategy {
        Strategy::Dockerfile
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
        if !self.context.detector().has_dockerfile(&job.repo_path) {
            return Err(BuildError::dockerfile_not_found().with_strategy(Strategy::Dockerfile));
        }
        Ok(PreparedRecipe::reused(String::new()))
    }

    async fn execute(
        &self,
        job: &BuildJob,
        logs: &LogStream,
        cancel: &CancellationToken,
    ) -> Result<Execution, BuildError> {
        let decision = select_build_type(&Strategy::Dockerfile, Some(&job.build_type));
        info!(job_id = %job.id, "Build type: OCI (enforced for dockerfile strategy)");

        let prepared = self.prepare(job)?;
        run_build(
            &self.context,
            &Strategy::Dockerfile,
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
    use crate::backend::MockBackend;
    use crate::detection::{BuildType, Detector};
    use crate::error::{ErrorCategory, ErrorCode};
    use crate::fs::MockFileSystem;

    #[tokio::test]
    async fn test_pure_nix_request_is_forced_to_oci() {
        let fs = MockFileSystem::new();
        fs.add_file("Dockerfile", "FROM alpine\n");
        let package = Arc::new(MockBackend::new("/nix/store/unused"));
        let container = Arc::new(MockBackend::new("localhost:5000/app:abc"));
        let context = ExecutorContext::new(package.clone(), container.clone())
            .with_detector(Detector::new(Arc::new(fs)));
        let exec = DockerfileExecutor::new(Arc::new(context));

        let job = BuildJob::new("/mock", Strategy::Dockerfile, BuildType::PureNix);
        let execution = exec
            .execute(&job, &LogStream::detached(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(execution.result.build_type, BuildType::Oci);
        assert_eq!(
            execution.result.image_tag.as_deref(),
            Some("localhost:5000/app:abc")
        );
        assert!(execution.result.store_path.is_none());
        assert_eq!(package.call_count(), 0);
        assert_eq!(container.call_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_dockerfile() {
        let container = Arc::new(MockBackend::new("x"));
        let context = ExecutorContext::new(Arc::new(MockBackend::default()), container.clone())
            .with_detector(Detector::new(Arc::new(MockFileSystem::new())));
        let exec = DockerfileExecutor::new(Arc::new(context));

        let job = BuildJob::new("/mock", Strategy::Dockerfile, BuildType::Oci);
        let err = exec
            .execute(&job, &LogStream::detached(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::DockerfileNotFound);
        assert_eq!(err.category, ErrorCategory::Build);
        assert_eq!(container.call_count(), 0);
    }
}
