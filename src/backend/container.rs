use super::nix::{write_recipe, NixPackageBuilder};
use super::process::run_checked;
use super::{BackendError, BackendOutput, BackendRequest, ContainerBuilder, LogStream};
use crate::config::ForgeConfig;
use crate::detection::{Strategy, DOCKERFILE};
use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

/// Lowercased image repository name derived from a path's last component
pub fn sanitize_image_name(path: &Path) -> String {
    let raw = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let mut name = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
            name.push(ch);
        } else {
            name.push('-');
        }
    }

    let trimmed = name.trim_matches(|c| matches!(c, '-' | '.' | '_'));
    if trimmed.is_empty() {
        "app".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `<registry>/<name>:<job id>`
pub fn image_tag(registry: &str, repo_path: &Path, job_id: &Uuid) -> String {
    format!(
        "{}/{}:{}",
        registry.trim_end_matches('/'),
        sanitize_image_name(repo_path),
        job_id
    )
}

/// Builds images with `docker build`, `nixpacks build`, or the recipe's
/// `packages.docker` output loaded into docker
#[derive(Debug, Clone)]
pub struct CommandContainerBuilder {
    docker_bin: String,
    nixpacks_bin: String,
    nix: NixPackageBuilder,
    registry: String,
}

impl CommandContainerBuilder {
    pub fn new(
        docker_bin: impl Into<String>,
        nixpacks_bin: impl Into<String>,
        nix_bin: impl Into<String>,
        registry: impl Into<String>,
    ) -> Self {
        Self {
            docker_bin: docker_bin.into(),
            nixpacks_bin: nixpacks_bin.into(),
            nix: NixPackageBuilder::new(nix_bin),
            registry: registry.into(),
        }
    }

    pub fn from_config(config: &ForgeConfig) -> Self {
        Self::new(
            config.docker_bin.clone(),
            config.nixpacks_bin.clone(),
            config.nix_bin.clone(),
            config.registry.clone(),
        )
    }

    async fn docker_build(
        &self,
        repo_path: &Path,
        tag: &str,
        logs: &LogStream,
        cancel: &CancellationToken,
    ) -> Result<i32, BackendError> {
        if !repo_path.join(DOCKERFILE).is_file() {
            return Err(BackendError::MissingInput {
                path: DOCKERFILE.to_string(),
            });
        }
        let args = vec![
            "build".to_string(),
            "-t".to_string(),
            tag.to_string(),
            repo_path.display().to_string(),
        ];
        let output = run_checked(&self.docker_bin, &args, Some(repo_path), logs, cancel).await?;
        Ok(output.exit_code)
    }

    async fn nixpacks_build(
        &self,
        repo_path: &Path,
        tag: &str,
        logs: &LogStream,
        cancel: &CancellationToken,
    ) -> Result<i32, BackendError> {
        let args = vec![
            "build".to_string(),
            repo_path.display().to_string(),
            "--name".to_string(),
            tag.to_string(),
        ];
        let output = run_checked(&self.nixpacks_bin, &args, Some(repo_path), logs, cancel).await?;
        Ok(output.exit_code)
    }

    async fn nix_image_build(
        &self,
        repo_path: &Path,
        recipe: &str,
        tag: &str,
        logs: &LogStream,
        cancel: &CancellationToken,
    ) -> Result<i32, BackendError> {
        write_recipe(repo_path, recipe).await?;
        let (archive, _) = self.nix.build_output(repo_path, "docker", logs, cancel).await?;

        let load_args = vec!["load".to_string(), "-i".to_string(), archive];
        let loaded = run_checked(&self.docker_bin, &load_args, None, logs, cancel).await?;
        let source = loaded
            .stdout
            .iter()
            .find_map(|line| line.trim().strip_prefix("Loaded image: "))
            .map(str::to_string)
            .ok_or_else(|| BackendError::MissingArtifact {
                message: "docker load did not report an image".to_string(),
            })?;

        let tag_args = vec!["tag".to_string(), source, tag.to_string()];
        let output = run_checked(&self.docker_bin, &tag_args, None, logs, cancel).await?;
        Ok(output.exit_code)
    }
}

impl Default for CommandContainerBuilder {
    fn default() -> Self {
        Self::new("docker", "nixpacks", "nix", "localhost:5000")
    }
}

#[async_trait]
impl ContainerBuilder for CommandContainerBuilder {
    fn name(&self) -> &str {
        "command"
    }

    async fn build(
        &self,
        request: &BackendRequest<'_>,
        logs: &LogStream,
        cancel: &CancellationToken,
    ) -> Result<BackendOutput, BackendError> {
        let repo_path = request.job.repo_path.as_path();
        let tag = image_tag(&self.registry, repo_path, &request.job.id);

        info!(
            job_id = %request.job.id,
            strategy = %request.strategy,
            image = %tag,
            "Starting container build"
        );

        let exit_code = match request.strategy {
            Strategy::Dockerfile => self.docker_build(repo_path, &tag, logs, cancel).await?,
            Strategy::Nixpacks => self.nixpacks_build(repo_path, &tag, logs, cancel).await?,
            _ => {
                self.nix_image_build(repo_path, request.recipe, &tag, logs, cancel)
                    .await?
            }
        };

        info!(job_id = %request.job.id, image = %tag, "Container build finished");
        Ok(BackendOutput {
            artifact: tag,
            logs: logs.contents(),
            exit_code,
        })
    }
}
