//! Progress handler trait and events

use crate::detection::{BuildType, Strategy};
use std::time::Duration;

/// Events emitted while a job moves through detection, generation and build
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Detection started
    DetectionStarted { repo_path: String },

    /// Detection finished with a result
    DetectionComplete {
        strategy: Strategy,
        confidence: f64,
        from_cache: bool,
    },

    /// A recipe was rendered
    RecipeGenerated { template: String, bytes: usize },

    /// An existing recipe was reused instead of rendering one
    RecipeReused { bytes: usize },

    /// The backend call started
    BuildStarted {
        job_id: String,
        build_type: BuildType,
        backend: String,
    },

    /// The backend produced an artifact
    BuildComplete {
        job_id: String,
        artifact: String,
        duration: Duration,
    },

    /// The job failed
    BuildFailed { job_id: String, code: String },
}

/// Receives progress events
pub trait ProgressHandler: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {}
}
