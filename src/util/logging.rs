//! Structured logging setup
//!
//! Installs a `tracing` subscriber once per process. Output goes to stderr so
//! command output on stdout stays machine-readable.
//!
//! # Example
//!
//! ```no_run
//! use flakeforge::util::logging;
//!
//! // FLAKEFORGE_LOG_LEVEL=debug FLAKEFORGE_LOG_JSON=true
//! logging::init_from_env();
//! tracing::info!(repo = "/srv/app", "Detecting");
//! ```

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

/// Subscriber settings
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum level for this crate's events
    pub level: Level,

    /// One JSON object per line instead of human-readable output
    pub use_json: bool,

    pub include_target: bool,

    /// File and line of the emitting call site
    pub include_location: bool,

    pub include_thread_ids: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: true,
            include_location: false,
            include_thread_ids: false,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// JSON output with full call-site metadata, for build workers
    pub fn production() -> Self {
        Self {
            level: Level::INFO,
            use_json: true,
            include_target: true,
            include_location: true,
            include_thread_ids: true,
        }
    }

    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            ..Default::default()
        }
    }

    /// Reads `FLAKEFORGE_LOG_LEVEL` and `FLAKEFORGE_LOG_JSON`
    pub fn from_env() -> Self {
        let level = env::var("FLAKEFORGE_LOG_LEVEL")
            .map(|v| parse_level(&v))
            .unwrap_or(Level::INFO);

        let use_json = env::var("FLAKEFORGE_LOG_JSON")
            .ok()
            .and_then(|v| v.parse::<bool>().ok())
            .unwrap_or(false);

        Self {
            level,
            use_json,
            ..Default::default()
        }
    }
}

/// Case-insensitive level name; unknown names fall back to INFO
pub fn parse_level(level_str: &str) -> Level {
    match level_str.trim().to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        }
    }
}

fn crate_directive(level: Level) -> Option<Directive> {
    format!("flakeforge={}", level.as_str().to_lowercase())
        .parse()
        .ok()
}

/// Filter honoring `RUST_LOG`, with the crate pinned to `level` otherwise
pub fn build_filter(level: Level) -> EnvFilter {
    let mut filter = EnvFilter::from_default_env();

    if env::var("RUST_LOG").is_err() {
        if let Some(directive) = crate_directive(level) {
            filter = filter.add_directive(directive);
        }
    }
    filter
}

/// Installs the global subscriber; later calls are ignored
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = build_filter(config.level);
        let layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(config.include_target)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_thread_ids(config.include_thread_ids)
            .with_thread_names(config.include_thread_ids);

        let registry = tracing_subscriber::registry().with(filter);
        let result = if config.use_json {
            registry.with(layer.json()).try_init()
        } else {
            registry.with(layer).try_init()
        };

        if let Err(e) = result {
            eprintln!("Logging already initialized: {}", e);
        }
    });
}

pub fn init_default() {
    init_logging(LoggingConfig::default());
}

pub fn init_from_env() {
    init_logging(LoggingConfig::from_env());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level("Debug"), Level::DEBUG);
        assert_eq!(parse_level(" WARN "), Level::WARN);
        assert_eq!(parse_level("error"), Level::ERROR);
        assert_eq!(parse_level("loud"), Level::INFO);
        assert_eq!(parse_level(""), Level::INFO);
    }

    #[test]
    fn test_presets() {
        let default = LoggingConfig::default();
        assert_eq!(default.level, Level::INFO);
        assert!(!default.use_json);

        let production = LoggingConfig::production();
        assert!(production.use_json);
        assert!(production.include_location);

        assert_eq!(LoggingConfig::development().level, Level::DEBUG);
        assert_eq!(LoggingConfig::with_level(Level::WARN).level, Level::WARN);
    }

    #[test]
    #[serial]
    fn test_from_env() {
        env::set_var("FLAKEFORGE_LOG_LEVEL", "debug");
        env::set_var("FLAKEFORGE_LOG_JSON", "true");
        let config = LoggingConfig::from_env();
        env::remove_var("FLAKEFORGE_LOG_LEVEL");
        env::remove_var("FLAKEFORGE_LOG_JSON");

        assert_eq!(config.level, Level::DEBUG);
        assert!(config.use_json);
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        env::remove_var("FLAKEFORGE_LOG_LEVEL");
        env::set_var("FLAKEFORGE_LOG_JSON", "maybe");
        let config = LoggingConfig::from_env();
        env::remove_var("FLAKEFORGE_LOG_JSON");

        assert_eq!(config.level, Level::INFO);
        assert!(!config.use_json);
    }

    #[test]
    fn test_crate_directive() {
        let directive = crate_directive(Level::DEBUG).unwrap();
        assert_eq!(directive.to_string().to_lowercase(), "flakeforge=debug");
    }
}
