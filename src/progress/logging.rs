//! Logging-based progress handler

use super::{ProgressEvent, ProgressHandler};
use tracing::{debug, info, warn};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::DetectionStarted { repo_path } => {
                info!(repo = %repo_path, "Starting detection");
            }
            ProgressEvent::DetectionComplete {
                strategy,
                confidence,
                from_cache,
            } => {
                info!(
                    strategy = %strategy,
                    confidence,
                    from_cache,
                    "Detection complete"
                );
            }
            ProgressEvent::RecipeGenerated { template, bytes } => {
                info!(template = %template, bytes, "Recipe generated");
            }
            ProgressEvent::RecipeReused { bytes } => {
                debug!(bytes, "Reusing existing recipe");
            }
            ProgressEvent::BuildStarted {
                job_id,
                build_type,
                backend,
            } => {
                info!(
                    job_id = %job_id,
                    build_type = %build_type,
                    backend = %backend,
                    "Build started"
                );
            }
            ProgressEvent::BuildComplete {
                job_id,
                artifact,
                duration,
            } => {
                info!(
                    job_id = %job_id,
                    artifact = %artifact,
                    duration_ms = duration.as_millis(),
                    "Build complete"
                );
            }
            ProgressEvent::BuildFailed { job_id, code } => {
                warn!(job_id = %job_id, code = %code, "Build failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{BuildType, Strategy};
    use std::time::Duration;

    #[test]
    fn test_logging_handler_handles_every_event() {
        let handler = LoggingHandler;
        let events = vec![
            ProgressEvent::DetectionStarted {
                repo_path: "/repo".to_string(),
            },
            ProgressEvent::DetectionComplete {
                strategy: Strategy::AutoGo,
                confidence: 0.95,
                from_cache: false,
            },
            ProgressEvent::RecipeGenerated {
                template: "go".to_string(),
                bytes: 900,
            },
            ProgressEvent::RecipeReused { bytes: 900 },
            ProgressEvent::BuildStarted {
                job_id: "1".to_string(),
                build_type: BuildType::PureNix,
                backend: "nix".to_string(),
            },
            ProgressEvent::BuildComplete {
                job_id: "1".to_string(),
                artifact: "/nix/store/x".to_string(),
                duration: Duration::from_millis(10),
            },
            ProgressEvent::BuildFailed {
                job_id: "1".to_string(),
                code: "BUILD_FAILED".to_string(),
            },
        ];
        for event in &events {
            handler.on_progress(event);
        }
    }
}
