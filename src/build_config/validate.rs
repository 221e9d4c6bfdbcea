use super::BuildConfig;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

pub const MAX_LDFLAGS_LEN: usize = 4096;
pub const MAX_ENV_KEY_LEN: usize = 256;
pub const MAX_ENV_VALUE_LEN: usize = 32 * 1024;

/// A build config field that failed validation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    pub field: String,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

fn build_tag_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_.]+$").expect("valid regex"))
}

fn env_key_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid regex"))
}

pub trait ValidationRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn validate(&self, config: &BuildConfig) -> Result<(), ValidationError>;
}

pub struct BuildTagsRule;

impl ValidationRule for BuildTagsRule {
    fn name(&self) -> &'static str {
        "BuildTags"
    }

    fn validate(&self, config: &BuildConfig) -> Result<(), ValidationError> {
        for (i, tag) in config.build_tags.iter().enumerate() {
            let field = format!("build_tags[{}]", i);
            if tag.is_empty() {
                return Err(ValidationError::new(field, "build tag cannot be empty"));
            }
            if tag.contains(char::is_whitespace) {
                return Err(ValidationError::new(
                    field,
                    format!("build tag '{}' cannot contain spaces", tag),
                ));
            }
            if !build_tag_regex().is_match(tag) {
                return Err(ValidationError::new(
                    field,
                    format!(
                        "build tag '{}' may only contain letters, digits, '_' and '.'",
                        tag
                    ),
                ));
            }
        }
        Ok(())
    }
}

pub struct LdflagsRule;

impl ValidationRule for LdflagsRule {
    fn name(&self) -> &'static str {
        "Ldflags"
    }

    fn validate(&self, config: &BuildConfig) -> Result<(), ValidationError> {
        match &config.ldflags {
            Some(flags) if flags.len() > MAX_LDFLAGS_LEN => Err(ValidationError::new(
                "ldflags",
                format!(
                    "ldflags is {} bytes, maximum is {}",
                    flags.len(),
                    MAX_LDFLAGS_LEN
                ),
            )),
            _ => Ok(()),
        }
    }
}

pub struct EnvironmentVarsRule;

impl ValidationRule for EnvironmentVarsRule {
    fn name(&self) -> &'static str {
        "EnvironmentVars"
    }

    fn validate(&self, config: &BuildConfig) -> Result<(), ValidationError> {
        for (key, value) in &config.environment_vars {
            let field = format!("environment_vars.{}", key);
            if key.len() > MAX_ENV_KEY_LEN {
                return Err(ValidationError::new(
                    field,
                    format!("key exceeds {} bytes", MAX_ENV_KEY_LEN),
                ));
            }
            if !env_key_regex().is_match(key) {
                return Err(ValidationError::new(
                    field,
                    "key must start with a letter or '_' and contain only letters, digits and '_'",
                ));
            }
            if value.len() > MAX_ENV_VALUE_LEN {
                return Err(ValidationError::new(
                    field,
                    format!("value exceeds {} bytes", MAX_ENV_VALUE_LEN),
                ));
            }
        }
        Ok(())
    }
}

pub struct FastApiWorkersRule;

impl ValidationRule for FastApiWorkersRule {
    fn name(&self) -> &'static str {
        "FastApiWorkers"
    }

    fn validate(&self, config: &BuildConfig) -> Result<(), ValidationError> {
        match config.fastapi.as_ref().and_then(|f| f.workers) {
            Some(0) => Err(ValidationError::new(
                "fastapi.workers",
                "workers must be at least 1",
            )),
            _ => Ok(()),
        }
    }
}

pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: Vec<Box<dyn ValidationRule>>) -> Self {
        Self { rules }
    }

    pub fn validate(&self, config: &BuildConfig) -> Result<(), ValidationError> {
        for rule in &self.rules {
            if let Err(e) = rule.validate(config) {
                tracing::debug!(rule = rule.name(), field = %e.field, "Build config rejected");
                return Err(e);
            }
        }
        Ok(())
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            rules: vec![
                Box::new(BuildTagsRule),
                Box::new(LdflagsRule),
                Box::new(EnvironmentVarsRule),
                Box::new(FastApiWorkersRule),
            ],
        }
    }
}
