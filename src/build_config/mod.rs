//! Build configuration
//!
//! [`BuildConfig`] holds user- or detector-supplied build settings. Every
//! scalar is optional so "unset" stays distinct from an explicit `false` or
//! empty value; [`merge`] relies on that distinction.

mod convert;
mod merge;
mod validate;

pub use convert::build_config_from_detection;
pub use merge::merge;
pub use validate::{
    BuildTagsRule, EnvironmentVarsRule, FastApiWorkersRule, LdflagsRule, ValidationError,
    ValidationRule, Validator, MAX_ENV_KEY_LEN, MAX_ENV_VALUE_LEN, MAX_LDFLAGS_LEN,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NextJsOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_optimizer: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DjangoOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settings_module: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_root: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collect_static: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migrations: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FastApiOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_module: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workers: Option<u32>,
}

/// Build settings for a single job
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    // General
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
    /// Seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build_timeout: Option<u64>,

    // Go
    #[serde(skip_serializing_if = "Option::is_none")]
    pub go_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cgo_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub build_tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ldflags: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pre_build_commands: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub post_build_commands: Vec<String>,

    // Workspace
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_workspace: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_module: Option<String>,

    // Node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_manager: Option<String>,

    // Rust
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rust_edition: Option<String>,

    // Python
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python_version: Option<String>,

    // Framework options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nextjs: Option<NextJsOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub django: Option<DjangoOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fastapi: Option<FastApiOptions>,

    // Advanced
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_nix_packages: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub environment_vars: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_retry_as_oci: Option<bool>,
}

impl BuildConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the default field validators, returning the first failure
    pub fn validate(&self) -> Result<(), ValidationError> {
        Validator::default().validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_roundtrip_keeps_explicit_false() {
        let yaml = "cgo_enabled: false\nbuild_tags: [netgo]\nenvironment_vars:\n  PORT: \"8080\"\n";
        let config: BuildConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.cgo_enabled, Some(false));
        assert_eq!(config.build_tags, vec!["netgo"]);
        assert_eq!(config.environment_vars.get("PORT").map(String::as_str), Some("8080"));
        assert!(config.go_version.is_none());
    }

    #[test]
    fn test_serialize_skips_unset() {
        let config = BuildConfig {
            go_version: Some("1.22".to_string()),
            ..Default::default()
        };
        assert_eq!(serde_json::to_string(&config).unwrap(), r#"{"go_version":"1.22"}"#);
    }
}
