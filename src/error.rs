//! Structured build failures
//!
//! Every module-level error converts into a [`BuildError`], which carries a
//! machine code, a category, actionable suggestions and next steps, and
//! whether the job can be retried under the other backend.

use crate::backend::BackendError;
use crate::build_config::ValidationError;
use crate::config::ConfigError;
use crate::detection::{DetectionError, Strategy, DOCKERFILE, FLAKE_FILE};
use crate::executor::RegistryError;
use crate::recipe::RecipeError;
use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Machine-readable failure code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NoLanguageDetected,
    MultipleLanguages,
    UnsupportedLanguage,
    RepositoryAccessFailed,
    TemplateNotFound,
    TemplateRenderFailed,
    InvalidFlakeSyntax,
    BuildFailed,
    BuildTimeout,
    BuildOom,
    BuildCancelled,
    VendorHashFailed,
    DockerfileNotFound,
    FlakeNotFound,
    DependencyMissing,
    InvalidConfig,
    NixpacksFailed,
}

impl ErrorCode {
    pub const ALL: &'static [ErrorCode] = &[
        ErrorCode::NoLanguageDetected,
        ErrorCode::MultipleLanguages,
        ErrorCode::UnsupportedLanguage,
        ErrorCode::RepositoryAccessFailed,
        ErrorCode::TemplateNotFound,
        ErrorCode::TemplateRenderFailed,
        ErrorCode::InvalidFlakeSyntax,
        ErrorCode::BuildFailed,
        ErrorCode::BuildTimeout,
        ErrorCode::BuildOom,
        ErrorCode::BuildCancelled,
        ErrorCode::VendorHashFailed,
        ErrorCode::DockerfileNotFound,
        ErrorCode::FlakeNotFound,
        ErrorCode::DependencyMissing,
        ErrorCode::InvalidConfig,
        ErrorCode::NixpacksFailed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NoLanguageDetected => "NO_LANGUAGE_DETECTED",
            ErrorCode::MultipleLanguages => "MULTIPLE_LANGUAGES",
            ErrorCode::UnsupportedLanguage => "UNSUPPORTED_LANGUAGE",
            ErrorCode::RepositoryAccessFailed => "REPOSITORY_ACCESS_FAILED",
            ErrorCode::TemplateNotFound => "TEMPLATE_NOT_FOUND",
            ErrorCode::TemplateRenderFailed => "TEMPLATE_RENDER_FAILED",
            ErrorCode::InvalidFlakeSyntax => "INVALID_FLAKE_SYNTAX",
            ErrorCode::BuildFailed => "BUILD_FAILED",
            ErrorCode::BuildTimeout => "BUILD_TIMEOUT",
            ErrorCode::BuildOom => "BUILD_OOM",
            ErrorCode::BuildCancelled => "BUILD_CANCELLED",
            ErrorCode::VendorHashFailed => "VENDOR_HASH_FAILED",
            ErrorCode::DockerfileNotFound => "DOCKERFILE_NOT_FOUND",
            ErrorCode::FlakeNotFound => "FLAKE_NOT_FOUND",
            ErrorCode::DependencyMissing => "DEPENDENCY_MISSING",
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
            ErrorCode::NixpacksFailed => "NIXPACKS_FAILED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Detection,
    Template,
    Build,
    Timeout,
    Resource,
    Config,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Detection => "detection",
            ErrorCategory::Template => "template",
            ErrorCategory::Build => "build",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Resource => "resource",
            ErrorCategory::Config => "config",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serializable view of a [`BuildError`] for API responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildErrorResponse {
    pub error: String,
    pub code: ErrorCode,
    pub category: ErrorCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_recipe: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    pub can_retry_as_other_backend: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub detected_issues: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub next_steps: Vec<String>,
}

#[derive(Debug)]
pub struct BuildError {
    pub cause: anyhow::Error,
    pub code: ErrorCode,
    pub category: ErrorCategory,
    pub strategy: Option<Strategy>,
    pub generated_recipe: Option<String>,
    pub suggestions: Vec<String>,
    pub next_steps: Vec<String>,
    pub detected_issues: Vec<String>,
    pub can_retry_as_other_backend: bool,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl BuildError {
    pub fn new(cause: impl Into<anyhow::Error>, code: ErrorCode, category: ErrorCategory) -> Self {
        Self {
            cause: cause.into(),
            code,
            category,
            strategy: None,
            generated_recipe: None,
            suggestions: Vec::new(),
            next_steps: Vec::new(),
            detected_issues: Vec::new(),
            can_retry_as_other_backend: false,
        }
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Attaches recipe text; empty text is ignored
    pub fn with_recipe(mut self, recipe: impl Into<String>) -> Self {
        let recipe = recipe.into();
        if !recipe.is_empty() {
            self.generated_recipe = Some(recipe);
        }
        self
    }

    pub fn with_suggestions(mut self, suggestions: &[&str]) -> Self {
        self.suggestions = strings(suggestions);
        self
    }

    pub fn with_next_steps(mut self, steps: &[&str]) -> Self {
        self.next_steps = strings(steps);
        self
    }

    pub fn with_detected_issue(mut self, issue: impl Into<String>) -> Self {
        self.detected_issues.push(issue.into());
        self
    }

    pub fn with_retry(mut self, can_retry: bool) -> Self {
        self.can_retry_as_other_backend = can_retry;
        self
    }

    fn with_cause(mut self, cause: impl Into<anyhow::Error>) -> Self {
        self.cause = cause.into();
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.can_retry_as_other_backend
    }

    pub fn no_language_detected() -> Self {
        Self::new(
            anyhow!("could not detect application language"),
            ErrorCode::NoLanguageDetected,
            ErrorCategory::Detection,
        )
        .with_suggestions(&[
            "Specify a build strategy explicitly (e.g. auto-go, auto-node)",
            "Use the dockerfile strategy if the repository has a Dockerfile",
            "Use the nixpacks strategy for automatic detection",
            "Make sure the repository contains a standard manifest (go.mod, package.json, Cargo.toml, pyproject.toml)",
        ])
        .with_next_steps(&[
            "Review the repository structure",
            "Set a build strategy for the service",
        ])
    }

    pub fn multiple_languages(languages: &[String]) -> Self {
        let joined = languages.join(", ");
        let mut error = Self::new(
            anyhow!("multiple languages detected: {}", joined),
            ErrorCode::MultipleLanguages,
            ErrorCategory::Detection,
        )
        .with_suggestions(&[
            "Specify a build strategy explicitly to choose which language to build",
            "Use the dockerfile strategy for multi-language projects",
            "Consider splitting the project into separate services",
        ])
        .with_next_steps(&[
            "Choose the primary language for this service",
            "Set the strategy to the matching auto-* strategy",
        ]);
        if !languages.is_empty() {
            error = error.with_detected_issue(format!("Found project files for: {}", joined));
        }
        error
    }

    pub fn unsupported_language(language: &str) -> Self {
        Self::new(
            anyhow!("detected language '{}' is not supported", language),
            ErrorCode::UnsupportedLanguage,
            ErrorCategory::Detection,
        )
        .with_suggestions(&[
            "Use the dockerfile strategy with a custom Dockerfile",
            "Use the nixpacks strategy for automatic builds",
            "Use the flake strategy with a custom flake.nix",
        ])
        .with_next_steps(&[
            "Create a Dockerfile for the application",
            "Or try nixpacks, which supports many languages",
        ])
    }

    pub fn repository_access(cause: impl fmt::Display) -> Self {
        Self::new(
            anyhow!("failed to access repository: {}", cause),
            ErrorCode::RepositoryAccessFailed,
            ErrorCategory::Detection,
        )
        .with_suggestions(&[
            "Verify the repository path is correct",
            "Check that the repository is readable",
        ])
        .with_next_steps(&["Verify the repository path and its permissions"])
    }

    pub fn template_not_found(template: &str) -> Self {
        Self::new(
            anyhow!("template not found: {}", template),
            ErrorCode::TemplateNotFound,
            ErrorCategory::Template,
        )
        .with_suggestions(&[
            "Check that the build strategy is supported",
            "Use a different build strategy",
        ])
        .with_next_steps(&["Try a different build strategy"])
    }

    pub fn template_render_failed(cause: impl Into<anyhow::Error>) -> Self {
        Self::new(
            cause,
            ErrorCode::TemplateRenderFailed,
            ErrorCategory::Template,
        )
        .with_retry(true)
        .with_suggestions(&[
            "Check the build configuration for invalid values",
            "Try the default configuration values",
            "Use the dockerfile strategy as an alternative",
        ])
        .with_next_steps(&[
            "Review the build configuration",
            "Try with default settings",
            "Consider the dockerfile or nixpacks strategy",
        ])
    }

    pub fn invalid_flake_syntax(cause: impl Into<anyhow::Error>, recipe: &str) -> Self {
        Self::new(cause, ErrorCode::InvalidFlakeSyntax, ErrorCategory::Template)
            .with_recipe(recipe)
            .with_retry(true)
            .with_suggestions(&[
                "This is likely a template defect; report it with the generated recipe",
                "Try the dockerfile or nixpacks strategy instead",
                "Provide a custom flake.nix in the repository",
            ])
            .with_next_steps(&[
                "Report the issue with the generated recipe",
                "Use an alternative build strategy",
            ])
    }

    pub fn build_failed(cause: impl Into<anyhow::Error>) -> Self {
        Self::new(cause, ErrorCode::BuildFailed, ErrorCategory::Build)
            .with_retry(true)
            .with_suggestions(&[
                "Check the build logs for specific errors",
                "Verify all dependencies are available",
                "Try building locally to reproduce the issue",
            ])
            .with_next_steps(&["Review build logs", "Fix any identified issues", "Retry the build"])
    }

    pub fn build_timeout(timeout: Duration) -> Self {
        Self::new(
            anyhow!("build exceeded timeout limit of {}s", timeout.as_secs()),
            ErrorCode::BuildTimeout,
            ErrorCategory::Timeout,
        )
        .with_suggestions(&[
            "Increase the build timeout in the build configuration",
            "Optimize the build process",
            "Split large builds into smaller components",
        ])
        .with_next_steps(&[
            "Increase build_timeout",
            "Review the build for optimization opportunities",
        ])
    }

    pub fn build_oom() -> Self {
        Self::new(
            anyhow!("build exceeded memory limit"),
            ErrorCode::BuildOom,
            ErrorCategory::Resource,
        )
        .with_suggestions(&[
            "Reduce memory usage during the build",
            "Use a higher resource tier",
            "Split the build into smaller steps",
        ])
        .with_next_steps(&["Optimize build memory usage"])
    }

    pub fn build_cancelled() -> Self {
        Self::new(
            anyhow!("build was cancelled"),
            ErrorCode::BuildCancelled,
            ErrorCategory::Build,
        )
        .with_suggestions(&["Start the build again when ready"])
        .with_next_steps(&["Retry the build"])
    }

    pub fn vendor_hash_failed(cause: impl fmt::Display) -> Self {
        Self::new(
            anyhow!("failed to calculate vendor hash: {}", cause),
            ErrorCode::VendorHashFailed,
            ErrorCategory::Build,
        )
        .with_retry(true)
        .with_suggestions(&[
            "Ensure all dependencies are properly specified",
            "Check that dependency sources are reachable",
            "Try the dockerfile strategy instead",
        ])
        .with_next_steps(&[
            "Verify dependency specifications",
            "Check network access to dependency sources",
        ])
    }

    pub fn dockerfile_not_found() -> Self {
        Self::new(
            anyhow!("Dockerfile not found in repository"),
            ErrorCode::DockerfileNotFound,
            ErrorCategory::Build,
        )
        .with_suggestions(&[
            "Add a Dockerfile to the repository root",
            "Use a different build strategy (auto-*, nixpacks)",
        ])
        .with_next_steps(&[
            "Create a Dockerfile in the repository",
            "Or change to a different build strategy",
        ])
    }

    pub fn flake_not_found() -> Self {
        Self::new(
            anyhow!("flake.nix not found in repository"),
            ErrorCode::FlakeNotFound,
            ErrorCategory::Build,
        )
        .with_suggestions(&[
            "Add a flake.nix to the repository root",
            "Use an auto-* strategy to generate a flake",
            "Use the dockerfile or nixpacks strategy instead",
        ])
        .with_next_steps(&[
            "Create a flake.nix in the repository",
            "Or change to a different build strategy",
        ])
    }

    pub fn dependency_missing(dependencies: &[String]) -> Self {
        let joined = dependencies.join(", ");
        let mut error = Self::new(
            anyhow!("missing dependencies: {}", joined),
            ErrorCode::DependencyMissing,
            ErrorCategory::Build,
        )
        .with_retry(true)
        .with_suggestions(&[
            "Add the missing dependencies to the project",
            "Check that all dependencies are properly specified",
            "Try the dockerfile strategy for more control",
        ])
        .with_next_steps(&[
            "Install missing dependencies",
            "Update dependency specifications",
        ]);
        if !dependencies.is_empty() {
            error = error.with_detected_issue(format!("Missing: {}", joined));
        }
        error
    }

    pub fn nixpacks_failed(cause: impl fmt::Display) -> Self {
        Self::new(
            anyhow!("nixpacks build failed: {}", cause),
            ErrorCode::NixpacksFailed,
            ErrorCategory::Build,
        )
        .with_suggestions(&[
            "Check that the project structure is standard",
            "Try the dockerfile strategy instead",
        ])
        .with_next_steps(&[
            "Review build logs for specific errors",
            "Consider the dockerfile strategy",
        ])
    }

    pub fn invalid_config(field: &str, message: impl fmt::Display) -> Self {
        Self::new(
            anyhow!("invalid configuration: {} - {}", field, message),
            ErrorCode::InvalidConfig,
            ErrorCategory::Config,
        )
        .with_detected_issue(format!("Invalid field: {}", field))
        .with_suggestions(&[
            "Check the field value format",
            "Use default values if unsure",
        ])
        .with_next_steps(&["Fix the configuration value", "Retry the build"])
    }

    /// Rebuilds an error from its code, keeping `cause` where the code has one
    pub fn from_code(code: ErrorCode, cause: anyhow::Error) -> Self {
        match code {
            ErrorCode::NoLanguageDetected => Self::no_language_detected(),
            ErrorCode::MultipleLanguages => Self::multiple_languages(&[]),
            ErrorCode::UnsupportedLanguage => Self::unsupported_language("unknown"),
            ErrorCode::RepositoryAccessFailed => Self::repository_access(cause),
            ErrorCode::TemplateNotFound => Self::template_not_found("unknown"),
            ErrorCode::TemplateRenderFailed => Self::template_render_failed(cause),
            ErrorCode::InvalidFlakeSyntax => Self::invalid_flake_syntax(cause, ""),
            ErrorCode::BuildFailed => Self::build_failed(cause),
            ErrorCode::BuildTimeout => Self::build_timeout(Duration::ZERO),
            ErrorCode::BuildOom => Self::build_oom(),
            ErrorCode::BuildCancelled => Self::build_cancelled(),
            ErrorCode::VendorHashFailed => Self::vendor_hash_failed(cause),
            ErrorCode::DockerfileNotFound => Self::dockerfile_not_found(),
            ErrorCode::FlakeNotFound => Self::flake_not_found(),
            ErrorCode::DependencyMissing => Self::dependency_missing(&[]),
            ErrorCode::InvalidConfig => Self::invalid_config("unknown", cause),
            ErrorCode::NixpacksFailed => Self::nixpacks_failed(cause),
        }
    }

    /// Classifies a backend failure for a strategy
    pub fn from_backend(error: BackendError, strategy: &Strategy) -> Self {
        let classified = match &error {
            BackendError::Cancelled => Self::build_cancelled(),
            BackendError::MissingInput { path } if path == DOCKERFILE => {
                Self::dockerfile_not_found()
            }
            BackendError::MissingInput { path } if path == FLAKE_FILE => Self::flake_not_found(),
            BackendError::BuildFailed { message, exit_code } => {
                let lower = message.to_lowercase();
                if *exit_code == Some(137)
                    || lower.contains("out of memory")
                    || lower.contains("oom-kill")
                    || lower.contains("cannot allocate memory")
                {
                    Self::build_oom().with_detected_issue(format!("Build output: {}", message))
                } else if lower.contains("hash mismatch") {
                    Self::vendor_hash_failed(message)
                } else if lower.contains("missing dependencies") {
                    Self::dependency_missing(&[]).with_cause(anyhow!("{}", message))
                } else if *strategy == Strategy::Nixpacks {
                    Self::nixpacks_failed(message)
                } else {
                    Self::build_failed(error.clone())
                }
            }
            _ if *strategy == Strategy::Nixpacks => Self::nixpacks_failed(&error),
            _ => Self::build_failed(error.clone()),
        };
        classified.with_strategy(strategy.clone())
    }

    pub fn to_response(&self) -> BuildErrorResponse {
        BuildErrorResponse {
            error: self.to_string(),
            code: self.code,
            category: self.category,
            strategy: self.strategy.as_ref().map(|s| s.to_string()),
            generated_recipe: self.generated_recipe.clone(),
            suggestions: self.suggestions.clone(),
            can_retry_as_other_backend: self.can_retry_as_other_backend,
            detected_issues: self.detected_issues.clone(),
            next_steps: self.next_steps.clone(),
        }
    }
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cause)
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.source()
    }
}

impl From<DetectionError> for BuildError {
    fn from(error: DetectionError) -> Self {
        match error {
            DetectionError::NoLanguageDetected => Self::no_language_detected(),
            DetectionError::MultipleLanguages(_) => Self::multiple_languages(&error.languages()),
            DetectionError::UnsupportedStrategy(ref strategy) => {
                Self::unsupported_language(strategy.language())
            }
            DetectionError::MarkerMissing {
                strategy: Strategy::Flake,
                ..
            } => Self::flake_not_found(),
            DetectionError::MarkerMissing {
                strategy: Strategy::Dockerfile,
                ..
            } => Self::dockerfile_not_found(),
            DetectionError::MarkerMissing { .. } => Self::no_language_detected().with_cause(error),
            DetectionError::PathNotFound(_)
            | DetectionError::NotADirectory(_)
            | DetectionError::RepositoryAccess { .. } => Self::repository_access(error),
        }
    }
}

impl From<RecipeError> for BuildError {
    fn from(error: RecipeError) -> Self {
        match error {
            RecipeError::TemplateNotFound(ref name) => Self::template_not_found(name),
            RecipeError::RenderFailed { .. } => Self::template_render_failed(error),
            RecipeError::InvalidSyntax { .. } => {
                let recipe = error.recipe().unwrap_or_default().to_string();
                Self::invalid_flake_syntax(error, &recipe)
            }
            RecipeError::Cancelled => Self::build_cancelled(),
            RecipeError::ValidatorUnavailable(_) => Self::build_failed(error),
        }
    }
}

impl From<ValidationError> for BuildError {
    fn from(error: ValidationError) -> Self {
        Self::invalid_config(&error.field, &error.reason)
    }
}

impl From<ConfigError> for BuildError {
    fn from(error: ConfigError) -> Self {
        Self::invalid_config(error.key(), &error)
    }
}

impl From<RegistryError> for BuildError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::StrategyNotFound(strategy) => {
                Self::unsupported_language(strategy.language())
                    .with_detected_issue(format!("No executor is registered for {}", strategy))
                    .with_strategy(strategy)
            }
            missing @ RegistryError::MissingExecutors(_) => {
                Self::invalid_config("executors", &missing)
            }
        }
    }
}

impl From<BackendError> for BuildError {
    fn from(error: BackendError) -> Self {
        Self::from_backend(error, &Strategy::Auto)
    }
}
