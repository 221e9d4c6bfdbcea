//! Build backends
//!
//! Two opaque services turn a recipe into an artifact: a [`PackageBuilder`]
//! produces a Nix store path (`pure-nix`) and a [`ContainerBuilder`] produces
//! an image tag (`oci`). The command-backed implementations shell out to
//! `nix`, `docker` and `nixpacks`; [`MockBackend`] is scripted for tests.

mod container;
mod error;
mod logs;
mod mock;
mod nix;
pub mod process;

pub use container::{image_tag, sanitize_image_name, CommandContainerBuilder};
pub use error::BackendError;
pub use logs::LogStream;
pub use mock::{MockBackend, RecordedCall};
pub use nix::{parse_store_path, write_recipe, NixPackageBuilder, RecipeWrite};

use crate::detection::Strategy;
use crate::executor::BuildJob;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// What a backend is asked to build
#[derive(Debug, Clone, Copy)]
pub struct BackendRequest<'a> {
    pub job: &'a BuildJob,
    pub recipe: &'a str,
    pub strategy: &'a Strategy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendOutput {
    /// Store path for package builds, image tag for container builds
    pub artifact: String,
    pub logs: String,
    pub exit_code: i32,
}

#[async_trait]
pub trait PackageBuilder: Send + Sync {
    fn name(&self) -> &str;

    async fn build(
        &self,
        request: &BackendRequest<'_>,
        logs: &LogStream,
        cancel: &CancellationToken,
    ) -> Result<BackendOutput, BackendError>;
}

#[async_trait]
pub trait ContainerBuilder: Send + Sync {
    fn name(&self) -> &str;

    async fn build(
        &self,
        request: &BackendRequest<'_>,
        logs: &LogStream,
        cancel: &CancellationToken,
    ) -> Result<BackendOutput, BackendError>;
}
