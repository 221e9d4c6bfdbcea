//! Steps shared by every strategy executor

use super::job::{BuildJob, BuildResult, Execution, PreparedRecipe};
use crate::backend::{
    BackendOutput, BackendRequest, CommandContainerBuilder, ContainerBuilder, LogStream,
    NixPackageBuilder, PackageBuilder,
};
use crate::build_config::{build_config_from_detection, merge, BuildConfig};
use crate::config::ForgeConfig;
use crate::detection::{BuildType, DetectionCache, DetectionResult, Detector, HintKey, Strategy};
use crate::error::BuildError;
use crate::progress::{NoOpHandler, ProgressEvent, ProgressHandler};
use crate::recipe::{recipe_digest, validate_syntax, NixValidator, TemplateData, TemplateEngine};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Dependencies shared by all executors of a registry
pub struct ExecutorContext {
    detector: Detector,
    cache: Option<Arc<DetectionCache>>,
    engine: TemplateEngine,
    validator: Option<NixValidator>,
    package_builder: Arc<dyn PackageBuilder>,
    container_builder: Arc<dyn ContainerBuilder>,
    default_timeout: Option<Duration>,
    progress: Arc<dyn ProgressHandler>,
}

impl std::fmt::Debug for ExecutorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorContext")
            .field("detector", &self.detector)
            .field("cache", &self.cache.is_some())
            .field("validator", &self.validator)
            .field("package_builder", &self.package_builder.name())
            .field("container_builder", &self.container_builder.name())
            .field("default_timeout", &self.default_timeout)
            .finish()
    }
}

impl ExecutorContext {
    pub fn new(
        package_builder: Arc<dyn PackageBuilder>,
        container_builder: Arc<dyn ContainerBuilder>,
    ) -> Self {
        Self {
            detector: Detector::default(),
            cache: None,
            engine: TemplateEngine::new(),
            validator: None,
            package_builder,
            container_builder,
            default_timeout: None,
            progress: Arc::new(NoOpHandler),
        }
    }

    /// Process-backed context wired from runtime configuration
    pub fn from_config(config: &ForgeConfig) -> Self {
        let mut context = Self::new(
            Arc::new(NixPackageBuilder::from_config(config)),
            Arc::new(CommandContainerBuilder::from_config(config)),
        )
        .with_cache(Arc::new(DetectionCache::new(config.detection_cache_ttl())))
        .with_default_timeout(config.build_timeout());

        if config.validate_with_nix {
            context = context.with_validator(NixValidator::from_config(config));
        }
        context
    }

    pub fn with_detector(mut self, detector: Detector) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_cache(mut self, cache: Arc<DetectionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_validator(mut self, validator: NixValidator) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressHandler>) -> Self {
        self.progress = progress;
        self
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    pub fn engine(&self) -> &TemplateEngine {
        &self.engine
    }

    pub(crate) fn report(&self, event: ProgressEvent) {
        self.progress.on_progress(&event);
    }

    #[cfg(test)]
    pub(crate) fn for_tests() -> Self {
        use crate::backend::MockBackend;
        use crate::fs::MockFileSystem;

        Self::new(
            Arc::new(MockBackend::new("/nix/store/mock")),
            Arc::new(MockBackend::new("registry/mock:latest")),
        )
        .with_detector(Detector::new(Arc::new(MockFileSystem::new())))
    }
}

/// Caller-supplied detection, else a cache hit, else a fresh `detect_for`
pub(crate) fn resolve_detection(
    ctx: &ExecutorContext,
    strategy: &Strategy,
    job: &BuildJob,
) -> Result<DetectionResult, BuildError> {
    if let Some(detection) = &job.detection {
        debug!(job_id = %job.id, "Using caller-supplied detection");
        return Ok(detection.clone());
    }

    let repo_key = job.repo_path.display().to_string();
    let cache_key = ctx.cache.as_ref().zip(job.commit.as_deref());

    if let Some((cache, commit)) = cache_key {
        if let Some(hit) = cache.get(&repo_key, commit).filter(|d| d.strategy == *strategy) {
            ctx.report(ProgressEvent::DetectionComplete {
                strategy: hit.strategy.clone(),
                confidence: hit.confidence,
                from_cache: true,
            });
            return Ok(hit);
        }
    }

    ctx.report(ProgressEvent::DetectionStarted {
        repo_path: repo_key.clone(),
    });
    let detection = ctx
        .detector
        .detect_for(strategy, &job.repo_path)
        .map_err(|e| BuildError::from(e).with_strategy(strategy.clone()))?;

    for warning in &detection.warnings {
        warn!(job_id = %job.id, warning = %warning, "Detection warning");
    }

    if let Some((cache, commit)) = cache_key {
        if let Err(e) = cache.set(&repo_key, commit, &detection) {
            warn!(error = %e, "Failed to cache detection result");
        }
    }

    ctx.report(ProgressEvent::DetectionComplete {
        strategy: detection.strategy.clone(),
        confidence: detection.confidence,
        from_cache: false,
    });
    Ok(detection)
}

/// User config merged over the detected one, validated
pub(crate) fn effective_config(
    user: Option<&BuildConfig>,
    detection: &DetectionResult,
) -> Result<BuildConfig, BuildError> {
    let detected = build_config_from_detection(detection);
    let merged = merge(user, Some(&detected));
    merged.validate()?;
    Ok(merged)
}

/// Template inputs common to every ecosystem
pub(crate) fn template_data(
    app_name: String,
    detection: &DetectionResult,
    config: BuildConfig,
) -> TemplateData {
    TemplateData {
        app_name,
        version: String::new(),
        framework: detection.framework.clone(),
        entry_point: config.entry_point.clone().unwrap_or_default(),
        build_command: config.build_command.clone().unwrap_or_default(),
        start_command: config.start_command.clone().unwrap_or_default(),
        config,
        detection: Some(detection.clone()),
    }
}

/// App name hint reduced to something usable as a package name
pub(crate) fn app_name_hint(detection: &DetectionResult) -> Option<String> {
    detection
        .suggested_config
        .text(HintKey::AppName)
        .map(|name| name.rsplit('/').next().unwrap_or(name).trim().to_string())
        .filter(|name| !name.is_empty())
}

/// Renders and structurally checks a recipe
pub(crate) fn render_recipe(
    ctx: &ExecutorContext,
    template: &str,
    data: &TemplateData,
) -> Result<String, BuildError> {
    let recipe = ctx.engine.render(template, data)?;
    validate_syntax(&recipe)?;
    debug!(template, digest = %recipe_digest(&recipe), "Recipe rendered");
    ctx.report(ProgressEvent::RecipeGenerated {
        template: template.to_string(),
        bytes: recipe.len(),
    });
    Ok(recipe)
}

/// Standard `prepare`: reuse the job's recipe, else detect and generate
pub(crate) fn prepare_with<F>(
    ctx: &ExecutorContext,
    strategy: &Strategy,
    job: &BuildJob,
    generate: F,
) -> Result<PreparedRecipe, BuildError>
where
    F: FnOnce(&DetectionResult) -> Result<String, BuildError>,
{
    if let Some(recipe) = job.existing_recipe() {
        ctx.report(ProgressEvent::RecipeReused {
            bytes: recipe.len(),
        });
        return Ok(PreparedRecipe::reused(recipe));
    }

    let detection = resolve_detection(ctx, strategy, job)?;
    let text = generate(&detection).map_err(|e| e.with_strategy(strategy.clone()))?;

    Ok(PreparedRecipe {
        text,
        freshly_generated: true,
        detection: Some(detection),
    })
}

enum Backend<'a> {
    Package(&'a dyn PackageBuilder),
    Container(&'a dyn ContainerBuilder),
}

impl Backend<'_> {
    fn name(&self) -> &str {
        match self {
            Backend::Package(b) => b.name(),
            Backend::Container(b) => b.name(),
        }
    }
}

async fn sleep_or_forever(timeout: Option<Duration>) {
    match timeout {
        Some(duration) => tokio::time::sleep(duration).await,
        None => std::future::pending::<()>().await,
    }
}

/// Runs a prepared recipe through the backend matching `build_type`
///
/// A freshly generated recipe is attached to any error so the caller can
/// persist it before retrying.
pub(crate) async fn run_build(
    ctx: &ExecutorContext,
    strategy: &Strategy,
    job: &BuildJob,
    prepared: PreparedRecipe,
    build_type: &BuildType,
    logs: &LogStream,
    cancel: &CancellationToken,
) -> Result<Execution, BuildError> {
    match build(ctx, strategy, job, &prepared, build_type, logs, cancel).await {
        Ok(output) => {
            let (store_path, image_tag) = match build_type {
                BuildType::PureNix => (Some(output.artifact.clone()), None),
                _ => (None, Some(output.artifact.clone())),
            };
            Ok(Execution {
                prepared,
                result: BuildResult {
                    artifact: output.artifact,
                    store_path,
                    image_tag,
                    build_type: build_type.clone(),
                    logs: output.logs,
                    exit_code: output.exit_code,
                },
            })
        }
        Err(error) => {
            let mut error = error.with_strategy(strategy.clone());
            if prepared.freshly_generated && error.generated_recipe.is_none() {
                error = error.with_recipe(prepared.text.clone());
            }
            ctx.report(ProgressEvent::BuildFailed {
                job_id: job.id.to_string(),
                code: error.code.to_string(),
            });
            Err(error)
        }
    }
}

async fn build(
    ctx: &ExecutorContext,
    strategy: &Strategy,
    job: &BuildJob,
    prepared: &PreparedRecipe,
    build_type: &BuildType,
    logs: &LogStream,
    cancel: &CancellationToken,
) -> Result<BackendOutput, BuildError> {
    let backend = match build_type {
        BuildType::PureNix => Backend::Package(ctx.package_builder.as_ref()),
        BuildType::Oci => Backend::Container(ctx.container_builder.as_ref()),
        other => {
            return Err(BuildError::invalid_config(
                "build_type",
                format!("unsupported build type '{}', expected pure-nix or oci", other),
            ))
        }
    };

    if prepared.freshly_generated {
        if let Some(validator) = &ctx.validator {
            validator.validate(&prepared.text, cancel).await?;
        }
    }

    let timeout = job
        .config
        .as_ref()
        .and_then(|c| c.build_timeout)
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .or(ctx.default_timeout);

    let request = BackendRequest {
        job,
        recipe: &prepared.text,
        strategy,
    };

    ctx.report(ProgressEvent::BuildStarted {
        job_id: job.id.to_string(),
        build_type: build_type.clone(),
        backend: backend.name().to_string(),
    });
    info!(
        job_id = %job.id,
        strategy = %strategy,
        build_type = %build_type,
        timeout_secs = timeout.map(|t| t.as_secs()),
        "Dispatching build"
    );

    let started = Instant::now();
    let call = async {
        match &backend {
            Backend::Package(b) => b.build(&request, logs, cancel).await,
            Backend::Container(b) => b.build(&request, logs, cancel).await,
        }
    };

    let output = tokio::select! {
        _ = cancel.cancelled() => Err(BuildError::build_cancelled()),
        _ = sleep_or_forever(timeout) => {
            Err(BuildError::build_timeout(timeout.unwrap_or_default()))
        }
        result = call => result.map_err(|e| BuildError::from_backend(e, strategy)),
    }?;

    ctx.report(ProgressEvent::BuildComplete {
        job_id: job.id.to_string(),
        artifact: output.artifact.clone(),
        duration: started.elapsed(),
    });
    Ok(output)
}
