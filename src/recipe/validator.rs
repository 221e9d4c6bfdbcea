use super::engine::{validate_syntax, TemplateData, TemplateEngine};
use super::error::RecipeError;
use crate::backend::{process, BackendError, LogStream};
use crate::config::ForgeConfig;
use crate::detection::FLAKE_FILE;
use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const CHECK_OUTPUT_LINES: usize = 20;

/// Checks recipes with `nix flake check --no-build` in a scratch directory
#[derive(Debug, Clone)]
pub struct NixValidator {
    nix_bin: String,
}

impl Default for NixValidator {
    fn default() -> Self {
        Self::new("nix")
    }
}

impl NixValidator {
    pub fn new(nix_bin: impl Into<String>) -> Self {
        Self {
            nix_bin: nix_bin.into(),
        }
    }

    pub fn from_config(config: &ForgeConfig) -> Self {
        Self::new(config.nix_bin.clone())
    }

    /// Structural check first, then the external check
    pub async fn validate(&self, recipe: &str, cancel: &CancellationToken) -> Result<(), RecipeError> {
        validate_syntax(recipe)?;

        let dir = tempfile::tempdir()
            .context("failed to create scratch directory")
            .map_err(RecipeError::ValidatorUnavailable)?;
        tokio::fs::write(dir.path().join(FLAKE_FILE), recipe)
            .await
            .context("failed to write recipe to scratch directory")
            .map_err(RecipeError::ValidatorUnavailable)?;

        let args = vec![
            "flake".to_string(),
            "check".to_string(),
            "--no-build".to_string(),
            dir.path().display().to_string(),
        ];
        let logs = LogStream::detached();

        debug!(dir = %dir.path().display(), "Running nix flake check");
        match process::run(&self.nix_bin, &args, Some(dir.path()), &logs, cancel).await {
            Ok(output) if output.exit_code == 0 => Ok(()),
            Ok(output) => {
                warn!(exit_code = output.exit_code, "nix flake check rejected recipe");
                let detail = logs.tail(CHECK_OUTPUT_LINES);
                let reason = if detail.is_empty() {
                    format!("nix flake check exited with code {}", output.exit_code)
                } else {
                    format!("nix flake check failed: {}", detail)
                };
                Err(RecipeError::syntax(reason, recipe))
            }
            Err(BackendError::Cancelled) => Err(RecipeError::Cancelled),
            Err(e) => Err(RecipeError::ValidatorUnavailable(anyhow::Error::new(e))),
        }
    }
}

/// Renders a template and validates the result
///
/// Without a validator only the structural check runs.
pub async fn render_and_validate(
    engine: &TemplateEngine,
    validator: Option<&NixValidator>,
    template_name: &str,
    data: &TemplateData,
    cancel: &CancellationToken,
) -> Result<String, RecipeError> {
    let recipe = engine.render(template_name, data)?;
    match validator {
        Some(validator) => validator.validate(&recipe, cancel).await?,
        None => validate_syntax(&recipe)?,
    }
    Ok(recipe)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    const VALID: &str = "{ description = \"x\"; inputs = { }; outputs = { self }: { packages = { }; }; }";

    #[tokio::test]
    async fn test_passing_check() {
        let validator = NixValidator::new("true");
        validator
            .validate(VALID, &CancellationToken::new())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_failing_check_carries_recipe() {
        let validator = NixValidator::new("false");
        let err = validator
            .validate(VALID, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RecipeError::InvalidSyntax { .. }));
        assert_eq!(err.recipe(), Some(VALID));
    }

    #[tokio::test]
    async fn test_structural_check_runs_first() {
        let validator = NixValidator::new("flakeforge-no-such-nix");
        let err = validator
            .validate("{ description", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RecipeError::InvalidSyntax { .. }));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let validator = NixValidator::new("flakeforge-no-such-nix");
        let err = validator
            .validate(VALID, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RecipeError::ValidatorUnavailable(_)));
    }

    #[tokio::test]
    async fn test_render_and_validate_without_nix() {
        let data = TemplateData {
            app_name: "svc".to_string(),
            ..Default::default()
        };
        let recipe = render_and_validate(
            &TemplateEngine::new(),
            None,
            "rust",
            &data,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert!(recipe.contains("buildRustPackage"));
    }
}
