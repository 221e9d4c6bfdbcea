use super::{
    BackendError, BackendOutput, BackendRequest, ContainerBuilder, LogStream, PackageBuilder,
};
use crate::detection::Strategy;
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// One invocation seen by a [`MockBackend`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub backend: &'static str,
    pub job_id: Uuid,
    pub strategy: Strategy,
    pub recipe: String,
}

/// Scripted backend for tests
///
/// Emits its log lines, optionally waits (honoring cancellation), then
/// returns either its artifact or its scripted failure.
#[derive(Debug, Default)]
pub struct MockBackend {
    artifact: String,
    failure: Option<BackendError>,
    log_lines: Vec<String>,
    delay: Option<Duration>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockBackend {
    pub fn new(artifact: impl Into<String>) -> Self {
        Self {
            artifact: artifact.into(),
            ..Default::default()
        }
    }

    pub fn failing(error: BackendError) -> Self {
        Self {
            failure: Some(error),
            ..Default::default()
        }
    }

    pub fn with_logs<I, S>(mut self, lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.log_lines = lines.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }

    async fn run(
        &self,
        backend: &'static str,
        request: &BackendRequest<'_>,
        logs: &LogStream,
        cancel: &CancellationToken,
    ) -> Result<BackendOutput, BackendError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                backend,
                job_id: request.job.id,
                strategy: request.strategy.clone(),
                recipe: request.recipe.to_string(),
            });
        }

        for line in &self.log_lines {
            logs.send(line.clone());
        }

        if let Some(delay) = self.delay {
            tokio::select! {
                _ = cancel.cancelled() => return Err(BackendError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(BackendOutput {
                artifact: self.artifact.clone(),
                logs: logs.contents(),
                exit_code: 0,
            }),
        }
    }
}

#[async_trait]
impl PackageBuilder for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn build(
        &self,
        request: &BackendRequest<'_>,
        logs: &LogStream,
        cancel: &CancellationToken,
    ) -> Result<BackendOutput, BackendError> {
        self.run("package", request, logs, cancel).await
    }
}

#[async_trait]
impl ContainerBuilder for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn build(
        &self,
        request: &BackendRequest<'_>,
        logs: &LogStream,
        cancel: &CancellationToken,
    ) -> Result<BackendOutput, BackendError> {
        self.run("container", request, logs, cancel).await
    }
}
