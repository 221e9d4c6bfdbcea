//! Runtime configuration for flakeforge
//!
//! Settings are loaded from environment variables with sensible defaults.
//!
//! # Environment Variables
//!
//! - `FLAKEFORGE_NIX_BIN`: nix executable - default: "nix"
//! - `FLAKEFORGE_DOCKER_BIN`: docker executable - default: "docker"
//! - `FLAKEFORGE_NIXPACKS_BIN`: nixpacks executable - default: "nixpacks"
//! - `FLAKEFORGE_REGISTRY`: image registry prefix - default: "localhost:5000"
//! - `FLAKEFORGE_VALIDATE_WITH_NIX`: run `nix flake check` on generated recipes (true|false) - default: "false"
//! - `FLAKEFORGE_DETECTION_CACHE_TTL`: detection cache TTL in seconds, 0 disables expiry - default: "86400"
//! - `FLAKEFORGE_BUILD_TIMEOUT`: default build timeout in seconds - default: "3600"
//! - `FLAKEFORGE_LOG_LEVEL`: logging level - default: "info"

use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_NIX_BIN: &str = "nix";
const DEFAULT_DOCKER_BIN: &str = "docker";
const DEFAULT_NIXPACKS_BIN: &str = "nixpacks";
const DEFAULT_REGISTRY: &str = "localhost:5000";
const DEFAULT_CACHE_TTL_SECS: u64 = 24 * 60 * 60;
const DEFAULT_BUILD_TIMEOUT_SECS: u64 = 60 * 60;
const DEFAULT_LOG_LEVEL: &str = "info";

const MAX_CACHE_TTL_SECS: u64 = 7 * 24 * 60 * 60;
const MAX_BUILD_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration validation failed for {field}: {message}")]
    ValidationFailed { field: String, message: String },

    #[error("Invalid log level: {0}. Valid options: trace, debug, info, warn, error")]
    InvalidLogLevel(String),
}

impl ConfigError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::ValidationFailed {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Name of the offending setting
    pub fn key(&self) -> &str {
        match self {
            ConfigError::ValidationFailed { field, .. } => field,
            ConfigError::InvalidLogLevel(_) => "log_level",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForgeConfig {
    pub nix_bin: String,
    pub docker_bin: String,
    pub nixpacks_bin: String,

    /// Registry prefix for image tags
    pub registry: String,

    pub validate_with_nix: bool,
    pub detection_cache_ttl_secs: u64,

    /// Applied when a job's build config sets no timeout
    pub build_timeout_secs: u64,

    pub log_level: String,
}

fn env_string(key: &str, default: &str) -> String {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

impl Default for ForgeConfig {
    /// Loads from `FLAKEFORGE_*` variables, falling back to defaults for
    /// anything missing or unparseable
    fn default() -> Self {
        Self {
            nix_bin: env_string("FLAKEFORGE_NIX_BIN", DEFAULT_NIX_BIN),
            docker_bin: env_string("FLAKEFORGE_DOCKER_BIN", DEFAULT_DOCKER_BIN),
            nixpacks_bin: env_string("FLAKEFORGE_NIXPACKS_BIN", DEFAULT_NIXPACKS_BIN),
            registry: env_string("FLAKEFORGE_REGISTRY", DEFAULT_REGISTRY),
            validate_with_nix: env_parsed("FLAKEFORGE_VALIDATE_WITH_NIX", false),
            detection_cache_ttl_secs: env_parsed(
                "FLAKEFORGE_DETECTION_CACHE_TTL",
                DEFAULT_CACHE_TTL_SECS,
            ),
            build_timeout_secs: env_parsed("FLAKEFORGE_BUILD_TIMEOUT", DEFAULT_BUILD_TIMEOUT_SECS),
            log_level: env_string("FLAKEFORGE_LOG_LEVEL", DEFAULT_LOG_LEVEL).to_lowercase(),
        }
    }
}

impl ForgeConfig {
    /// Checks numeric ranges, non-empty executables and the log level
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("nix_bin", &self.nix_bin),
            ("docker_bin", &self.docker_bin),
            ("nixpacks_bin", &self.nixpacks_bin),
            ("registry", &self.registry),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::invalid(field, "cannot be empty"));
            }
        }

        if self.detection_cache_ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(ConfigError::invalid(
                "detection_cache_ttl_secs",
                "cannot exceed 7 days",
            ));
        }

        if self.build_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "build_timeout_secs",
                "must be at least 1 second",
            ));
        }
        if self.build_timeout_secs > MAX_BUILD_TIMEOUT_SECS {
            return Err(ConfigError::invalid(
                "build_timeout_secs",
                "cannot exceed 24 hours",
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            _ => Err(ConfigError::InvalidLogLevel(self.log_level.clone())),
        }
    }

    pub fn detection_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.detection_cache_ttl_secs)
    }

    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }
}

impl fmt::Display for ForgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "flakeforge configuration:")?;
        writeln!(f, "  nix: {}", self.nix_bin)?;
        writeln!(f, "  docker: {}", self.docker_bin)?;
        writeln!(f, "  nixpacks: {}", self.nixpacks_bin)?;
        writeln!(f, "  Registry: {}", self.registry)?;
        writeln!(f, "  Validate With Nix: {}", self.validate_with_nix)?;
        writeln!(f, "  Detection Cache TTL: {}s", self.detection_cache_ttl_secs)?;
        writeln!(f, "  Build Timeout: {}s", self.build_timeout_secs)?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}
