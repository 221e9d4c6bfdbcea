//! Executors end to end: real repositories on disk, scripted backends

use flakeforge::backend::{BackendError, LogStream, MockBackend};
use flakeforge::build_config::BuildConfig;
use flakeforge::detection::{BuildType, DetectionCache, Strategy};
use flakeforge::error::ErrorCode;
use flakeforge::executor::{
    BuildJob, ExecutorContext, ExecutorRegistry, FlakeExecutor, GoExecutor, NodeExecutor,
    PythonExecutor, RegistryError, RustExecutor, REQUIRED_STRATEGIES,
};
use flakeforge::progress::{ProgressEvent, ProgressHandler};
use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct RecordingHandler {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingHandler {
    fn count(&self, predicate: impl Fn(&ProgressEvent) -> bool) -> usize {
        self.events
            .lock()
            .map(|events| events.iter().filter(|e| predicate(e)).count())
            .unwrap_or(0)
    }
}

impl ProgressHandler for RecordingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

fn go_repo(go_mod: &str) -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    fs::write(dir.path().join("go.mod"), go_mod).expect("Failed to write go.mod");
    fs::write(
        dir.path().join("main.go"),
        "package main\n\nfunc main() {}\n",
    )
    .expect("Failed to write main.go");
    dir
}

fn clean_go_repo() -> TempDir {
    go_repo("module example.com/hello\n\ngo 1.22\n")
}

fn sqlite_go_repo() -> TempDir {
    go_repo("module example.com/store\n\ngo 1.22\n\nrequire github.com/mattn/go-sqlite3 v1.14.22\n")
}

fn registry_with(
    package: Arc<MockBackend>,
    container: Arc<MockBackend>,
) -> (ExecutorRegistry, Arc<RecordingHandler>) {
    let progress = Arc::new(RecordingHandler::default());
    let context = ExecutorContext::new(package, container).with_progress(progress.clone());
    (ExecutorRegistry::with_defaults(Arc::new(context)), progress)
}

async fn run(
    registry: &ExecutorRegistry,
    job: &BuildJob,
) -> Result<flakeforge::executor::Execution, flakeforge::BuildError> {
    let executor = registry.resolve(&job.strategy).expect("executor registered");
    executor
        .execute(job, &LogStream::detached(), &CancellationToken::new())
        .await
}

#[tokio::test]
async fn test_go_pure_nix_build() {
    let dir = clean_go_repo();
    let package = Arc::new(MockBackend::new("/nix/store/abc-hello"));
    let (registry, _) = registry_with(package.clone(), Arc::new(MockBackend::default()));

    let job = BuildJob::new(dir.path(), Strategy::AutoGo, BuildType::PureNix).with_commit("abc123");
    let execution = run(&registry, &job).await.unwrap();

    assert!(execution.prepared.freshly_generated);
    assert!(execution.prepared.text.contains("buildGo122Module"));
    assert!(execution.prepared.text.contains("CGO_ENABLED = \"0\""));
    assert_eq!(
        execution.prepared.detection.as_ref().map(|d| d.version.as_str()),
        Some("1.22")
    );
    assert_eq!(execution.result.build_type, BuildType::PureNix);
    assert_eq!(execution.result.store_path.as_deref(), Some("/nix/store/abc-hello"));
    assert!(execution.result.image_tag.is_none());

    let calls = package.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].backend, "package");
    assert_eq!(calls[0].job_id, job.id);
}

#[tokio::test]
async fn test_flake_reuse_idempotence() {
    let dir = clean_go_repo();
    let package = Arc::new(MockBackend::new("/nix/store/abc-hello"));
    let (registry, progress) = registry_with(package.clone(), Arc::new(MockBackend::default()));

    let mut job = BuildJob::new(dir.path(), Strategy::AutoGo, BuildType::PureNix);

    let first = run(&registry, &job).await.unwrap();
    assert!(job.record_recipe(&first.prepared.text));
    let stored = job.recipe.clone();

    let second = run(&registry, &job).await.unwrap();
    assert!(!second.prepared.freshly_generated);
    assert!(!job.record_recipe(&second.prepared.text));
    assert_eq!(job.recipe, stored);

    assert_eq!(
        progress.count(|e| matches!(e, ProgressEvent::RecipeGenerated { .. })),
        1
    );
    let calls = package.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].recipe, calls[1].recipe);
}

#[tokio::test]
async fn test_detected_cgo_selects_cgo_template() {
    let dir = sqlite_go_repo();
    let (registry, _) = registry_with(
        Arc::new(MockBackend::new("/nix/store/abc-store")),
        Arc::new(MockBackend::default()),
    );

    let job = BuildJob::new(dir.path(), Strategy::AutoGo, BuildType::PureNix);
    let execution = run(&registry, &job).await.unwrap();

    assert!(execution.prepared.text.contains("CGO_ENABLED = \"1\""));
    assert!(execution.prepared.text.contains("pkgs.pkg-config"));
}

#[tokio::test]
async fn test_user_disables_cgo() {
    let dir = sqlite_go_repo();
    let (registry, _) = registry_with(
        Arc::new(MockBackend::new("/nix/store/abc-store")),
        Arc::new(MockBackend::default()),
    );

    let job = BuildJob::new(dir.path(), Strategy::AutoGo, BuildType::PureNix).with_config(
        BuildConfig {
            cgo_enabled: Some(false),
            ..Default::default()
        },
    );
    let execution = run(&registry, &job).await.unwrap();

    assert!(execution
        .prepared
        .detection
        .as_ref()
        .is_some_and(|d| d.cgo_enabled()));
    assert!(execution.prepared.text.contains("CGO_ENABLED = \"0\""));
    assert!(!execution.prepared.text.contains("pkgs.pkg-config"));
}

#[tokio::test]
async fn test_dockerfile_is_built_as_oci() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("Dockerfile"), "FROM alpine\n").unwrap();
    let package = Arc::new(MockBackend::new("/nix/store/unused"));
    let container = Arc::new(MockBackend::new("localhost:5000/app:1"));
    let (registry, _) = registry_with(package.clone(), container.clone());

    let job = BuildJob::new(dir.path(), Strategy::Dockerfile, BuildType::PureNix);
    let execution = run(&registry, &job).await.unwrap();

    assert_eq!(execution.result.build_type, BuildType::Oci);
    assert_eq!(execution.result.image_tag.as_deref(), Some("localhost:5000/app:1"));
    assert_eq!(package.call_count(), 0);
    assert_eq!(container.calls()[0].backend, "container");
}

#[tokio::test]
async fn test_repository_flake_is_built_without_generation() {
    let dir = TempDir::new().unwrap();
    let flake = "{ description = \"own\"; outputs = { self }: { }; }";
    fs::write(dir.path().join("flake.nix"), flake).unwrap();
    let package = Arc::new(MockBackend::new("/nix/store/own"));
    let (registry, progress) = registry_with(package.clone(), Arc::new(MockBackend::default()));

    let job = BuildJob::new(dir.path(), Strategy::Flake, BuildType::PureNix);
    let execution = run(&registry, &job).await.unwrap();

    assert!(!execution.prepared.freshly_generated);
    assert_eq!(package.calls()[0].recipe, flake);
    assert_eq!(
        progress.count(|e| matches!(e, ProgressEvent::RecipeGenerated { .. })),
        0
    );
}

#[tokio::test]
async fn test_build_failure_returns_recipe_for_persistence() {
    let dir = clean_go_repo();
    let (registry, progress) = registry_with(
        Arc::new(MockBackend::failing(BackendError::build_failed(
            "error: builder for '/nix/store/x.drv' failed",
            Some(1),
        ))),
        Arc::new(MockBackend::default()),
    );

    let mut job = BuildJob::new(dir.path(), Strategy::AutoGo, BuildType::PureNix);
    let err = run(&registry, &job).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::BuildFailed);
    assert!(err.is_retryable());
    assert_eq!(err.strategy, Some(Strategy::AutoGo));
    let recipe = err.generated_recipe.clone().expect("recipe attached");
    assert!(job.record_recipe(&recipe));
    assert_eq!(
        progress.count(|e| matches!(e, ProgressEvent::BuildFailed { .. })),
        1
    );

    let response = err.to_response();
    assert_eq!(response.generated_recipe.as_deref(), Some(recipe.as_str()));
}

#[tokio::test]
async fn test_oom_is_classified() {
    let dir = clean_go_repo();
    let (registry, _) = registry_with(
        Arc::new(MockBackend::failing(BackendError::build_failed("Killed", Some(137)))),
        Arc::new(MockBackend::default()),
    );

    let job = BuildJob::new(dir.path(), Strategy::AutoGo, BuildType::PureNix);
    let err = run(&registry, &job).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::BuildOom);
}

#[tokio::test]
async fn test_default_timeout() {
    let dir = clean_go_repo();
    let package = Arc::new(MockBackend::new("/nix/store/x").with_delay(Duration::from_secs(30)));
    let context = ExecutorContext::new(package, Arc::new(MockBackend::default()))
        .with_default_timeout(Duration::from_millis(50));
    let registry = ExecutorRegistry::with_defaults(Arc::new(context));

    let job = BuildJob::new(dir.path(), Strategy::AutoGo, BuildType::PureNix);
    let err = run(&registry, &job).await.unwrap_err();

    assert_eq!(err.code, ErrorCode::BuildTimeout);
    assert!(err.generated_recipe.is_some());
}

#[tokio::test]
async fn test_cancellation() {
    let dir = clean_go_repo();
    let package = Arc::new(MockBackend::new("/nix/store/x").with_delay(Duration::from_secs(30)));
    let (registry, _) = registry_with(package, Arc::new(MockBackend::default()));

    let job = BuildJob::new(dir.path(), Strategy::AutoGo, BuildType::PureNix);
    let executor = registry.resolve(&Strategy::AutoGo).unwrap();
    let cancel = CancellationToken::new();

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            cancel.cancel();
        })
    };

    let err = executor
        .execute(&job, &LogStream::detached(), &cancel)
        .await
        .unwrap_err();
    canceller.await.unwrap();

    assert_eq!(err.code, ErrorCode::BuildCancelled);
}

#[tokio::test]
async fn test_unknown_build_type_is_rejected_before_backend() {
    let dir = clean_go_repo();
    let package = Arc::new(MockBackend::new("/nix/store/x"));
    let container = Arc::new(MockBackend::new("img"));
    let (registry, _) = registry_with(package.clone(), container.clone());

    let job: BuildJob = serde_json::from_value(serde_json::json!({
        "repo_path": dir.path(),
        "strategy": "auto-go",
        "build_type": "wasm",
    }))
    .unwrap();
    assert_eq!(job.build_type, BuildType::Custom("wasm".to_string()));

    let err = run(&registry, &job).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidConfig);
    assert_eq!(package.call_count() + container.call_count(), 0);
}

#[tokio::test]
async fn test_logs_stream_in_order() {
    let dir = clean_go_repo();
    let package = Arc::new(
        MockBackend::new("/nix/store/x").with_logs(["building", "installing", "done"]),
    );
    let (registry, _) = registry_with(package, Arc::new(MockBackend::default()));

    let job = BuildJob::new(dir.path(), Strategy::AutoGo, BuildType::PureNix);
    let executor = registry.resolve(&Strategy::AutoGo).unwrap();
    let (logs, mut rx) = LogStream::channel();

    let execution = executor
        .execute(&job, &logs, &CancellationToken::new())
        .await
        .unwrap();
    drop(logs);

    let mut received = Vec::new();
    while let Some(line) = rx.recv().await {
        received.push(line);
    }
    assert_eq!(received, vec!["building", "installing", "done"]);
    assert_eq!(execution.result.logs, "building\ninstalling\ndone");
}

#[tokio::test]
async fn test_detection_cache_is_used_per_commit() {
    let dir = clean_go_repo();
    let progress = Arc::new(RecordingHandler::default());
    let context = ExecutorContext::new(
        Arc::new(MockBackend::new("/nix/store/x")),
        Arc::new(MockBackend::default()),
    )
    .with_cache(Arc::new(DetectionCache::new(Duration::from_secs(60))))
    .with_progress(progress.clone());
    let registry = ExecutorRegistry::with_defaults(Arc::new(context));

    let job = BuildJob::new(dir.path(), Strategy::AutoGo, BuildType::PureNix).with_commit("abc123");
    run(&registry, &job).await.unwrap();
    run(&registry, &job).await.unwrap();

    assert_eq!(
        progress.count(|e| matches!(e, ProgressEvent::DetectionStarted { .. })),
        1
    );
    assert_eq!(
        progress.count(|e| matches!(
            e,
            ProgressEvent::DetectionComplete {
                from_cache: true,
                ..
            }
        )),
        1
    );
}

#[test]
fn test_registry_completeness() {
    let context = Arc::new(ExecutorContext::new(
        Arc::new(MockBackend::default()),
        Arc::new(MockBackend::default()),
    ));

    let full = ExecutorRegistry::with_defaults(context.clone());
    full.verify_completeness(REQUIRED_STRATEGIES).unwrap();
    for strategy in REQUIRED_STRATEGIES {
        assert!(full.resolve(strategy).is_ok());
    }

    let mut partial = ExecutorRegistry::new();
    partial.register(Arc::new(FlakeExecutor::new(context.clone())));
    partial.register(Arc::new(GoExecutor::new(context.clone())));
    partial.register(Arc::new(PythonExecutor::new(context.clone())));

    let err = partial.verify_completeness(REQUIRED_STRATEGIES).unwrap_err();
    assert_eq!(
        err,
        RegistryError::MissingExecutors(vec![Strategy::AutoNode, Strategy::AutoRust])
    );

    partial.register(Arc::new(NodeExecutor::new(context.clone())));
    partial.register(Arc::new(RustExecutor::new(context)));
    partial.verify_completeness(REQUIRED_STRATEGIES).unwrap();
}
