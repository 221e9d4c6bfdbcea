//! Strategy executors: turn a build job into a recipe and an artifact
//!
//! Each strategy has one executor. Ecosystem executors render a flake from
//! detection results; the flake, dockerfile and nixpacks executors build
//! what the repository already provides.

mod build_type;
mod dockerfile;
mod flake;
mod go;
mod job;
mod nixpacks;
mod node;
mod pipeline;
mod python;
mod registry;
mod rust;

pub use build_type::{select_build_type, BuildTypeDecision};
pub use dockerfile::DockerfileExecutor;
pub use flake::FlakeExecutor;
pub use go::GoExecutor;
pub use job::{BuildJob, BuildResult, Execution, PreparedRecipe};
pub use nixpacks::NixpacksExecutor;
pub use node::NodeExecutor;
pub use pipeline::ExecutorContext;
pub use python::PythonExecutor;
pub use registry::{ExecutorRegistry, RegistryError, REQUIRED_STRATEGIES};
pub use rust::RustExecutor;

use crate::backend::LogStream;
use crate::build_config::BuildConfig;
use crate::detection::{DetectionResult, Strategy};
use crate::error::BuildError;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Builds jobs for one strategy
#[async_trait]
pub trait StrategyExecutor: Send + Sync {
    /// Strategy this executor serves
    fn strategy(&self) -> Strategy;

    fn supports(&self, strategy: &Strategy) -> bool {
        self.strategy() == *strategy
    }

    /// Shared dependencies
    fn context(&self) -> &ExecutorContext;

    /// Renders a recipe from detection and the caller's config
    ///
    /// Deterministic for identical inputs. Executors that do not generate
    /// recipes return an empty string.
    fn generate_recipe(
        &self,
        detection: &DetectionResult,
        config: Option<&BuildConfig>,
    ) -> Result<String, BuildError>;

    /// Recipe to build: the job's stored one if present, else a new one
    fn prepare(&self, job: &BuildJob) -> Result<PreparedRecipe, BuildError> {
        let strategy = self.strategy();
        pipeline::prepare_with(self.context(), &strategy, job, |detection| {
            self.generate_recipe(detection, job.config.as_ref())
        })
    }

    /// Prepares the recipe and runs it through the backend
    async fn execute(
        &self,
        job: &BuildJob,
        logs: &LogStream,
        cancel: &CancellationToken,
    ) -> Result<Execution, BuildError> {
        let prepared = self.prepare(job)?;
        pipeline::run_build(
            self.context(),
            &self.strategy(),
            job,
            prepared,
            &job.build_type,
            logs,
            cancel,
        )
        .await
    }
}
