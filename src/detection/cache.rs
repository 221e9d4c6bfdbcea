//! In-memory detection cache keyed by (repository, commit)

use super::types::DetectionResult;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("repository key cannot be empty")]
    EmptyRepository,

    #[error("commit key cannot be empty")]
    EmptyCommit,
}

#[derive(Debug, Clone)]
struct CachedDetection {
    result: DetectionResult,
    created_at: Instant,
}

/// Thread-safe TTL cache of detection results
///
/// A zero TTL disables expiry. Results are cloned on the way in and out, so
/// callers never share a cached value.
#[derive(Debug)]
pub struct DetectionCache {
    entries: RwLock<HashMap<(String, String), CachedDetection>>,
    ttl: Duration,
}

impl Default for DetectionCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl DetectionCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn expired(&self, entry: &CachedDetection) -> bool {
        !self.ttl.is_zero() && entry.created_at.elapsed() > self.ttl
    }

    /// Cached result for `(repo, commit)`, or `None` when missing or expired
    pub fn get(&self, repo: &str, commit: &str) -> Option<DetectionResult> {
        if repo.is_empty() || commit.is_empty() {
            return None;
        }

        let entries = self.entries.read().ok()?;
        let entry = entries.get(&(repo.to_string(), commit.to_string()))?;
        if self.expired(entry) {
            debug!(repo, commit, "Detection cache entry expired");
            return None;
        }
        Some(entry.result.clone())
    }

    pub fn set(&self, repo: &str, commit: &str, result: &DetectionResult) -> Result<(), CacheError> {
        if repo.is_empty() {
            return Err(CacheError::EmptyRepository);
        }
        if commit.is_empty() {
            return Err(CacheError::EmptyCommit);
        }

        if let Ok(mut entries) = self.entries.write() {
            entries.insert(
                (repo.to_string(), commit.to_string()),
                CachedDetection {
                    result: result.clone(),
                    created_at: Instant::now(),
                },
            );
        }
        Ok(())
    }

    pub fn delete(&self, repo: &str, commit: &str) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(&(repo.to_string(), commit.to_string()));
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
    }

    pub fn size(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    /// Drops expired entries and returns how many were removed
    pub fn cleanup_expired(&self) -> usize {
        if self.ttl.is_zero() {
            return 0;
        }

        let Ok(mut entries) = self.entries.write() else {
            return 0;
        };
        let before = entries.len();
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.created_at.elapsed() <= ttl);
        before - entries.len()
    }
}
