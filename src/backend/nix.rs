use super::process::run_checked;
use super::{BackendError, BackendOutput, BackendRequest, LogStream, PackageBuilder};
use crate::config::ForgeConfig;
use crate::detection::FLAKE_FILE;
use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The last stdout line that is a bare store path and not a derivation
pub fn parse_store_path(stdout: &[String]) -> Option<String> {
    stdout
        .iter()
        .rev()
        .map(|line| line.trim())
        .find(|line| {
            line.starts_with("/nix/store/")
                && !line.contains(char::is_whitespace)
                && !line.ends_with(".drv")
        })
        .map(str::to_string)
}

/// What [`write_recipe`] did to the repository's `flake.nix`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeWrite {
    /// No recipe was rendered
    Skipped,
    Unchanged,
    Created,
    /// A different flake was already present and has been overwritten
    Replaced,
}

/// Writes the recipe as the repository's `flake.nix`
///
/// An empty recipe leaves the repository untouched; an existing flake
/// with the same content is not rewritten. A different existing flake is
/// replaced with a warning.
pub async fn write_recipe(repo_path: &Path, recipe: &str) -> Result<RecipeWrite, BackendError> {
    if recipe.is_empty() {
        return Ok(RecipeWrite::Skipped);
    }
    let path = repo_path.join(FLAKE_FILE);
    let outcome = match tokio::fs::read(&path).await {
        Ok(existing) if existing == recipe.as_bytes() => return Ok(RecipeWrite::Unchanged),
        Ok(_) => {
            warn!(
                path = %path.display(),
                "Replacing existing flake.nix with generated recipe"
            );
            RecipeWrite::Replaced
        }
        Err(_) => RecipeWrite::Created,
    };
    debug!(path = %path.display(), "Writing recipe");
    tokio::fs::write(&path, recipe).await?;
    Ok(outcome)
}

/// Builds `packages.default` with `nix build`
#[derive(Debug, Clone)]
pub struct NixPackageBuilder {
    nix_bin: String,
}

impl NixPackageBuilder {
    pub fn new(nix_bin: impl Into<String>) -> Self {
        Self {
            nix_bin: nix_bin.into(),
        }
    }

    pub fn from_config(config: &ForgeConfig) -> Self {
        Self::new(config.nix_bin.clone())
    }

    pub(crate) fn build_args(repo_path: &Path, output: &str) -> Vec<String> {
        vec![
            "build".to_string(),
            format!("{}#{}", repo_path.display(), output),
            "--print-out-paths".to_string(),
            "--no-link".to_string(),
            "-L".to_string(),
        ]
    }

    pub(crate) async fn build_output(
        &self,
        repo_path: &Path,
        output: &str,
        logs: &LogStream,
        cancel: &CancellationToken,
    ) -> Result<(String, i32), BackendError> {
        let args = Self::build_args(repo_path, output);
        let result = run_checked(&self.nix_bin, &args, Some(repo_path), logs, cancel).await?;
        let store_path =
            parse_store_path(&result.stdout).ok_or_else(|| BackendError::MissingArtifact {
                message: format!("nix build printed no store path for #{}", output),
            })?;
        Ok((store_path, result.exit_code))
    }
}

impl Default for NixPackageBuilder {
    fn default() -> Self {
        Self::new("nix")
    }
}

#[async_trait]
impl PackageBuilder for NixPackageBuilder {
    fn name(&self) -> &str {
        "nix"
    }

    async fn build(
        &self,
        request: &BackendRequest<'_>,
        logs: &LogStream,
        cancel: &CancellationToken,
    ) -> Result<BackendOutput, BackendError> {
        let repo_path = request.job.repo_path.as_path();
        write_recipe(repo_path, request.recipe).await?;

        info!(
            job_id = %request.job.id,
            strategy = %request.strategy,
            repo = %repo_path.display(),
            "Starting nix package build"
        );
        let (store_path, exit_code) = self.build_output(repo_path, "default", logs, cancel).await?;
        info!(job_id = %request.job.id, store_path = %store_path, "Nix package build finished");

        Ok(BackendOutput {
            artifact: store_path,
            logs: logs.contents(),
            exit_code,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn lines(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_store_path() {
        let stdout = lines(&[
            "building '/nix/store/abc-hello.drv'...",
            "/nix/store/abc-hello.drv",
            "/nix/store/xyz-hello-1.0.0",
            "",
        ]);
        assert_eq!(
            parse_store_path(&stdout).as_deref(),
            Some("/nix/store/xyz-hello-1.0.0")
        );
        assert_eq!(parse_store_path(&lines(&["warning: dirty tree"])), None);
    }

    #[test]
    fn test_build_args() {
        let args = NixPackageBuilder::build_args(Path::new("/src/app"), "default");
        assert_eq!(
            args,
            vec![
                "build",
                "/src/app#default",
                "--print-out-paths",
                "--no-link",
                "-L"
            ]
        );
    }

    #[tokio::test]
    async fn test_write_recipe() {
        let dir = TempDir::new().unwrap();
        write_recipe(dir.path(), "").await.unwrap();
        assert!(!dir.path().join(FLAKE_FILE).exists());

        write_recipe(dir.path(), "{ }").await.unwrap();
        let written = std::fs::read_to_string(dir.path().join(FLAKE_FILE)).unwrap();
        assert_eq!(written, "{ }");
    }

    #[tokio::test]
    async fn test_write_recipe_reports_replaced_flake() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(FLAKE_FILE);
        assert_eq!(write_recipe(dir.path(), "").await.unwrap(), RecipeWrite::Skipped);
        assert_eq!(write_recipe(dir.path(), "{ a = 1; }").await.unwrap(), RecipeWrite::Created);
        assert_eq!(
            write_recipe(dir.path(), "{ a = 1; }").await.unwrap(),
            RecipeWrite::Unchanged
        );

        std::fs::write(&path, b"# hand written\n{ \xff }").unwrap();
        assert_eq!(
            write_recipe(dir.path(), "{ a = 1; }").await.unwrap(),
            RecipeWrite::Replaced
        );
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ a = 1; }");
    }
}
