//! flakeforge - project detection and Nix flake based builds
//!
//! Inspects a repository, picks a build strategy, renders a Nix flake for it
//! and hands the flake to a build backend that produces either a Nix store
//! path or an OCI image.
//!
//! # Core Concepts
//!
//! - **Detection**: ecosystem analyzers read marker files (`go.mod`,
//!   `package.json`, `Cargo.toml`, `pyproject.toml`) and report a strategy,
//!   framework, version and build hints
//! - **Build config**: caller settings merged over detected hints, validated
//!   before anything is rendered
//! - **Recipes**: flakes rendered from per-ecosystem templates, checked for
//!   structure and optionally with `nix flake check`
//! - **Executors**: one per strategy, resolved through a registry, that turn a
//!   [`BuildJob`] into an [`Execution`] or a structured [`BuildError`]
//!
//! # Example
//!
//! ```no_run
//! use flakeforge::{BuildJob, ExecutorContext, ExecutorRegistry, ForgeConfig};
//! use flakeforge::backend::LogStream;
//! use flakeforge::detection::{BuildType, Strategy};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), flakeforge::BuildError> {
//! let context = ExecutorContext::from_config(&ForgeConfig::default());
//! let registry = ExecutorRegistry::with_defaults(Arc::new(context));
//!
//! let job = BuildJob::new("/srv/app", Strategy::AutoGo, BuildType::PureNix);
//! let executor = registry.resolve(&job.strategy)?;
//! let execution = executor
//!     .execute(&job, &LogStream::detached(), &CancellationToken::new())
//!     .await?;
//! println!("{}", execution.result.artifact);
//! # Ok(())
//! # }
//! ```

#[macro_use]
mod id_enum_macro;

pub mod backend;
pub mod build_config;
pub mod cli;
pub mod config;
pub mod detection;
pub mod error;
pub mod executor;
pub mod fs;
pub mod progress;
pub mod recipe;
pub mod util;

pub use build_config::BuildConfig;
pub use config::{ConfigError, ForgeConfig};
pub use detection::{BuildType, DetectionResult, Detector, Framework, Strategy};
pub use error::{BuildError, BuildErrorResponse, ErrorCategory, ErrorCode};
pub use executor::{
    BuildJob, BuildResult, Execution, ExecutorContext, ExecutorRegistry, PreparedRecipe,
    StrategyExecutor,
};
pub use recipe::{TemplateData, TemplateEngine};
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name_is_flakeforge() {
        assert_eq!(NAME, "flakeforge");
    }
}
