//! Subcommand handlers; each returns the process exit code

use super::commands::{BuildArgs, DetectArgs, RenderArgs, ValidateArgs};
use super::output::{OutputFormat, OutputFormatter};
use crate::backend::LogStream;
use crate::build_config::BuildConfig;
use crate::config::ForgeConfig;
use crate::detection::{Detector, Strategy};
use crate::error::BuildError;
use crate::executor::{
    select_build_type, BuildJob, ExecutorContext, ExecutorRegistry, REQUIRED_STRATEGIES,
};
use crate::progress::LoggingHandler;
use crate::recipe::{validate_syntax, NixValidator};
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;
pub const EXIT_CONFIG: i32 = 2;

fn repository_path(path: Option<&PathBuf>) -> PathBuf {
    let path = path.cloned().unwrap_or_else(|| PathBuf::from("."));
    std::fs::canonicalize(&path).unwrap_or(path)
}

fn load_config() -> Option<ForgeConfig> {
    let config = ForgeConfig::default();
    match config.validate() {
        Ok(()) => {
            debug!("{}", config);
            Some(config)
        }
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            None
        }
    }
}

/// Reads a job config file; the extension picks JSON, TOML or YAML
pub fn load_build_config(path: &Path) -> Result<BuildConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let config = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&content)
            .with_context(|| format!("Invalid JSON in {}", path.display()))?,
        Some("toml") => toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in {}", path.display()))?,
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid YAML in {}", path.display()))?,
        other => bail!(
            "Unsupported config format {:?} for {}, expected .json, .toml or .yaml",
            other.unwrap_or(""),
            path.display()
        ),
    };
    Ok(config)
}

fn load_user_config(path: Option<&PathBuf>) -> Result<Option<BuildConfig>> {
    path.map(|p| load_build_config(p)).transpose()
}

fn emit(output: &str, file: Option<&Path>) -> Result<()> {
    match file {
        Some(path) => {
            std::fs::write(path, output)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Output written");
        }
        None => print!("{}", output),
    }
    Ok(())
}

fn report_error(formatter: &OutputFormatter, error: &BuildError) {
    let response = error.to_response();
    match formatter.format_error(&response) {
        Ok(text) if formatter.format() == OutputFormat::Human => eprint!("{}", text),
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Error: {} ({:#})", error, e),
    }
}

/// Explicit strategy, else the detector's recommendation
fn resolve_strategy(
    detector: &Detector,
    repo: &Path,
    requested: Option<&Strategy>,
) -> Result<Strategy, BuildError> {
    if let Some(strategy) = requested.filter(|s| **s != Strategy::Auto) {
        return Ok(strategy.clone());
    }
    let recommendation = detector.recommend(repo)?;
    info!(
        strategy = %recommendation.strategy,
        reason = %recommendation.reason,
        "Using recommended strategy"
    );
    Ok(recommendation.strategy)
}

fn registry(context: ExecutorContext) -> Result<ExecutorRegistry, BuildError> {
    let registry = ExecutorRegistry::with_defaults(Arc::new(context));
    registry.verify_completeness(REQUIRED_STRATEGIES)?;
    Ok(registry)
}

pub async fn handle_detect(args: &DetectArgs, quiet: bool) -> i32 {
    let repo = repository_path(args.repository_path.as_ref());
    let detector = Detector::default();
    let formatter = OutputFormatter::new(args.format.into());

    if !quiet {
        info!(repo = %repo.display(), "Detecting project type");
    }

    let output = if args.all {
        detector
            .detect_all(&repo)
            .map_err(BuildError::from)
            .and_then(|results| {
                formatter
                    .format_detections(&results)
                    .map_err(BuildError::build_failed)
            })
    } else {
        detector
            .detect(&repo)
            .map_err(BuildError::from)
            .and_then(|result| {
                let recommendation = detector.recommend(&repo).ok();
                formatter
                    .format_detection(&result, recommendation.as_ref())
                    .map_err(BuildError::build_failed)
            })
    };

    match output {
        Ok(text) => match emit(&text, args.output.as_deref()) {
            Ok(()) => EXIT_SUCCESS,
            Err(e) => {
                error!("{:#}", e);
                EXIT_FAILURE
            }
        },
        Err(e) => {
            report_error(&formatter, &e);
            EXIT_FAILURE
        }
    }
}

pub async fn handle_render(args: &RenderArgs) -> i32 {
    let Some(config) = load_config() else {
        return EXIT_CONFIG;
    };
    let user_config = match load_user_config(args.config.as_ref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return EXIT_CONFIG;
        }
    };

    let repo = repository_path(args.repository_path.as_ref());
    let formatter = OutputFormatter::new(OutputFormat::Human);

    match render(&config, &repo, args.strategy.as_ref(), user_config.as_ref()) {
        Ok(recipe) => match emit(&recipe, args.output.as_deref()) {
            Ok(()) => EXIT_SUCCESS,
            Err(e) => {
                error!("{:#}", e);
                EXIT_FAILURE
            }
        },
        Err(e) => {
            report_error(&formatter, &e);
            EXIT_FAILURE
        }
    }
}

fn render(
    config: &ForgeConfig,
    repo: &Path,
    requested: Option<&Strategy>,
    user_config: Option<&BuildConfig>,
) -> Result<String, BuildError> {
    let context = ExecutorContext::from_config(config);
    let strategy = resolve_strategy(context.detector(), repo, requested)?;

    if !strategy.generates_recipe() {
        return Err(BuildError::template_not_found(strategy.as_str())
            .with_strategy(strategy.clone())
            .with_detected_issue(format!(
                "The {} strategy builds the repository as-is and has no generated recipe",
                strategy
            )));
    }

    let detection = context
        .detector()
        .detect_for(&strategy, repo)
        .map_err(|e| BuildError::from(e).with_strategy(strategy.clone()))?;
    let executor = registry(context)?.resolve(&strategy)?;
    executor.generate_recipe(&detection, user_config)
}

pub async fn handle_validate(args: &ValidateArgs) -> i32 {
    let content = match std::fs::read_to_string(&args.file) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: failed to read {}: {}", args.file.display(), e);
            return EXIT_FAILURE;
        }
    };

    let result = if args.nix {
        let Some(config) = load_config() else {
            return EXIT_CONFIG;
        };
        NixValidator::from_config(&config)
            .validate(&content, &CancellationToken::new())
            .await
    } else {
        validate_syntax(&content)
    };

    match result {
        Ok(()) => {
            println!("\u{2713} {} is valid", args.file.display());
            EXIT_SUCCESS
        }
        Err(e) => {
            let error = BuildError::from(e);
            report_error(&OutputFormatter::new(OutputFormat::Human), &error);
            EXIT_FAILURE
        }
    }
}

pub async fn handle_build(args: &BuildArgs, quiet: bool) -> i32 {
    let Some(config) = load_config() else {
        return EXIT_CONFIG;
    };
    let user_config = match load_user_config(args.config.as_ref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return EXIT_CONFIG;
        }
    };
    let stored_recipe = match args.recipe.as_ref().map(std::fs::read_to_string).transpose() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Error: failed to read recipe: {}", e);
            return EXIT_CONFIG;
        }
    };

    let repo = repository_path(args.repository_path.as_ref());
    let formatter = OutputFormatter::new(args.format.into());
    let context = ExecutorContext::from_config(&config).with_progress(Arc::new(LoggingHandler));

    let strategy = match resolve_strategy(context.detector(), &repo, args.strategy.as_ref()) {
        Ok(s) => s,
        Err(e) => {
            report_error(&formatter, &e);
            return EXIT_FAILURE;
        }
    };
    let build_type = select_build_type(&strategy, args.build_type.as_ref()).build_type;

    let mut job = BuildJob::new(&repo, strategy.clone(), build_type);
    if let Some(commit) = &args.commit {
        job = job.with_commit(commit.clone());
    }
    if let Some(user_config) = user_config {
        job = job.with_config(user_config);
    }
    if let Some(recipe) = stored_recipe {
        job = job.with_recipe(recipe);
    }

    let executor = match registry(context).and_then(|r| r.resolve(&strategy).map_err(BuildError::from)) {
        Ok(e) => e,
        Err(e) => {
            report_error(&formatter, &e);
            return EXIT_FAILURE;
        }
    };

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling build");
            signal_token.cancel();
        }
    });

    let (logs, mut rx) = LogStream::channel();
    let printer = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if !quiet {
                eprintln!("{}", line);
            }
        }
    });

    info!(job_id = %job.id, strategy = %strategy, build_type = %job.build_type, "Starting build");
    let outcome = executor.execute(&job, &logs, &cancel).await;
    drop(logs);
    let _ = printer.await;

    match outcome {
        Ok(execution) => {
            if execution.prepared.freshly_generated && job.record_recipe(&execution.prepared.text) {
                save_recipe(args.save_recipe.as_deref(), &execution.prepared.text);
            }
            match formatter.format_build(&job.id.to_string(), strategy.as_str(), &execution) {
                Ok(text) => {
                    print!("{}", text);
                    if formatter.format() != OutputFormat::Human {
                        println!();
                    }
                    EXIT_SUCCESS
                }
                Err(e) => {
                    error!("{:#}", e);
                    EXIT_FAILURE
                }
            }
        }
        Err(e) => {
            if let Some(recipe) = e.generated_recipe.as_deref() {
                if job.record_recipe(recipe) {
                    save_recipe(args.save_recipe.as_deref(), recipe);
                }
            }
            report_error(&formatter, &e);
            EXIT_FAILURE
        }
    }
}

fn save_recipe(path: Option<&Path>, recipe: &str) {
    let Some(path) = path else {
        return;
    };
    match std::fs::write(path, recipe) {
        Ok(()) => info!(path = %path.display(), "Generated recipe saved"),
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to save generated recipe"),
    }
}
