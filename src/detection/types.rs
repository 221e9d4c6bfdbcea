//! Detection result types
//!
//! A [`DetectionResult`] is produced once per detection pass and is immutable
//! afterwards. Ecosystem hints live in [`SuggestedConfig`], a map from the
//! closed [`HintKey`] set to a tagged [`HintValue`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

crate::define_id_enum! {
    /// Build strategy selecting which executor handles a job
    Strategy {
        Flake => "flake",
        AutoGo => "auto-go" | "go",
        AutoNode => "auto-node" | "node",
        AutoRust => "auto-rust" | "rust",
        AutoPython => "auto-python" | "python",
        Dockerfile => "dockerfile",
        Nixpacks => "nixpacks",
        Auto => "auto",
    }
}

impl Strategy {
    /// Strategies backed by a language ecosystem analyzer
    pub fn ecosystems() -> &'static [Strategy] {
        &[
            Strategy::AutoGo,
            Strategy::AutoNode,
            Strategy::AutoRust,
            Strategy::AutoPython,
        ]
    }

    /// Strategies that can only ever produce container images
    pub fn is_oci_only(&self) -> bool {
        matches!(self, Strategy::Dockerfile | Strategy::Nixpacks)
    }

    /// Strategies that never render a recipe themselves
    pub fn generates_recipe(&self) -> bool {
        matches!(
            self,
            Strategy::AutoGo | Strategy::AutoNode | Strategy::AutoRust | Strategy::AutoPython
        )
    }

    /// Human-readable ecosystem name used in diagnostics
    pub fn language(&self) -> &str {
        match self {
            Strategy::AutoGo => "go",
            Strategy::AutoNode => "node",
            Strategy::AutoRust => "rust",
            Strategy::AutoPython => "python",
            other => other.as_str(),
        }
    }
}

impl Default for Strategy {
    fn default() -> Self {
        Strategy::Auto
    }
}

crate::define_id_enum! {
    /// Web or application framework detected inside an ecosystem
    Framework {
        Generic => "generic",
        NextJs => "nextjs" | "next",
        Express => "express",
        Fastify => "fastify",
        React => "react",
        Django => "django",
        FastApi => "fastapi",
        Flask => "flask",
    }
}

impl Default for Framework {
    fn default() -> Self {
        Framework::Generic
    }
}

crate::define_id_enum! {
    /// Which backend a job targets
    BuildType {
        PureNix => "pure-nix" | "nix",
        Oci => "oci",
    }
}

impl Default for BuildType {
    fn default() -> Self {
        BuildType::PureNix
    }
}

/// Closed set of hint names a detector may suggest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HintKey {
    GoVersion,
    EntryPoint,
    CgoEnabled,
    NodeVersion,
    PackageManager,
    BuildCommand,
    StartCommand,
    PythonVersion,
    RustEdition,
    IsWorkspace,
    WorkspaceModule,
    WorkspaceMembers,
    AppName,
    NextjsRouter,
    DjangoSettingsModule,
    FastapiAppModule,
    DependencyManager,
}

/// The value shape a hint key accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintKind {
    Text,
    Bool,
    List,
}

impl fmt::Display for HintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HintKind::Text => f.write_str("string"),
            HintKind::Bool => f.write_str("bool"),
            HintKind::List => f.write_str("string list"),
        }
    }
}

impl HintKey {
    pub fn kind(&self) -> HintKind {
        match self {
            HintKey::CgoEnabled | HintKey::IsWorkspace => HintKind::Bool,
            HintKey::WorkspaceMembers => HintKind::List,
            _ => HintKind::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HintKey::GoVersion => "go_version",
            HintKey::EntryPoint => "entry_point",
            HintKey::CgoEnabled => "cgo_enabled",
            HintKey::NodeVersion => "node_version",
            HintKey::PackageManager => "package_manager",
            HintKey::BuildCommand => "build_command",
            HintKey::StartCommand => "start_command",
            HintKey::PythonVersion => "python_version",
            HintKey::RustEdition => "rust_edition",
            HintKey::IsWorkspace => "is_workspace",
            HintKey::WorkspaceModule => "workspace_module",
            HintKey::WorkspaceMembers => "workspace_members",
            HintKey::AppName => "app_name",
            HintKey::NextjsRouter => "nextjs_router",
            HintKey::DjangoSettingsModule => "django_settings_module",
            HintKey::FastapiAppModule => "fastapi_app_module",
            HintKey::DependencyManager => "dependency_manager",
        }
    }
}

impl fmt::Display for HintKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single suggested value: string, bool or string list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HintValue {
    Bool(bool),
    Text(String),
    List(Vec<String>),
}

impl HintValue {
    pub fn kind(&self) -> HintKind {
        match self {
            HintValue::Bool(_) => HintKind::Bool,
            HintValue::Text(_) => HintKind::Text,
            HintValue::List(_) => HintKind::List,
        }
    }
}

impl fmt::Display for HintValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HintValue::Bool(value) => write!(f, "{}", value),
            HintValue::Text(value) => f.write_str(value),
            HintValue::List(values) => f.write_str(&values.join(", ")),
        }
    }
}

impl From<bool> for HintValue {
    fn from(value: bool) -> Self {
        HintValue::Bool(value)
    }
}

impl From<String> for HintValue {
    fn from(value: String) -> Self {
        HintValue::Text(value)
    }
}

impl From<&str> for HintValue {
    fn from(value: &str) -> Self {
        HintValue::Text(value.to_string())
    }
}

impl From<Vec<String>> for HintValue {
    fn from(value: Vec<String>) -> Self {
        HintValue::List(value)
    }
}

/// Raised when a hint carries a value of the wrong shape
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("hint '{key}' expects a {expected} value, got {actual}")]
pub struct HintTypeError {
    pub key: HintKey,
    pub expected: HintKind,
    pub actual: HintKind,
}

/// Ordered, type-checked map of detector hints
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<HintKey, HintValue>", into = "BTreeMap<HintKey, HintValue>")]
pub struct SuggestedConfig {
    values: BTreeMap<HintKey, HintValue>,
}

impl SuggestedConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a hint, rejecting values whose shape does not match the key
    pub fn insert(
        &mut self,
        key: HintKey,
        value: impl Into<HintValue>,
    ) -> Result<(), HintTypeError> {
        let value = value.into();
        check_kind(key, &value)?;
        self.values.insert(key, value);
        Ok(())
    }

    pub fn set_text(&mut self, key: HintKey, value: impl Into<String>) {
        debug_assert_eq!(key.kind(), HintKind::Text);
        self.values.insert(key, HintValue::Text(value.into()));
    }

    pub fn set_bool(&mut self, key: HintKey, value: bool) {
        debug_assert_eq!(key.kind(), HintKind::Bool);
        self.values.insert(key, HintValue::Bool(value));
    }

    pub fn set_list(&mut self, key: HintKey, value: Vec<String>) {
        debug_assert_eq!(key.kind(), HintKind::List);
        self.values.insert(key, HintValue::List(value));
    }

    pub fn get(&self, key: HintKey) -> Option<&HintValue> {
        self.values.get(&key)
    }

    pub fn text(&self, key: HintKey) -> Option<&str> {
        match self.values.get(&key) {
            Some(HintValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn flag(&self, key: HintKey) -> Option<bool> {
        match self.values.get(&key) {
            Some(HintValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn list(&self, key: HintKey) -> Option<&[String]> {
        match self.values.get(&key) {
            Some(HintValue::List(items)) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn contains(&self, key: HintKey) -> bool {
        self.values.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&HintKey, &HintValue)> {
        self.values.iter()
    }
}

fn check_kind(key: HintKey, value: &HintValue) -> Result<(), HintTypeError> {
    if key.kind() == value.kind() {
        Ok(())
    } else {
        Err(HintTypeError {
            key,
            expected: key.kind(),
            actual: value.kind(),
        })
    }
}

impl TryFrom<BTreeMap<HintKey, HintValue>> for SuggestedConfig {
    type Error = HintTypeError;

    fn try_from(values: BTreeMap<HintKey, HintValue>) -> Result<Self, Self::Error> {
        for (key, value) in &values {
            check_kind(*key, value)?;
        }
        Ok(Self { values })
    }
}

impl From<SuggestedConfig> for BTreeMap<HintKey, HintValue> {
    fn from(config: SuggestedConfig) -> Self {
        config.values
    }
}

/// Output of analyzing one repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub strategy: Strategy,
    #[serde(default)]
    pub framework: Framework,
    #[serde(default)]
    pub version: String,
    pub confidence: f64,
    #[serde(default)]
    pub entry_points: Vec<String>,
    #[serde(default)]
    pub suggested_config: SuggestedConfig,
    #[serde(default)]
    pub recommended_build_type: BuildType,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl DetectionResult {
    /// Empty result for `strategy` with generic framework and pure-nix build type
    pub fn new(strategy: Strategy, confidence: f64) -> Self {
        let recommended_build_type = if strategy.is_oci_only() {
            BuildType::Oci
        } else {
            BuildType::PureNix
        };

        Self {
            strategy,
            framework: Framework::Generic,
            version: String::new(),
            confidence,
            entry_points: Vec::new(),
            suggested_config: SuggestedConfig::new(),
            recommended_build_type,
            warnings: Vec::new(),
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Resolved native-toolchain hint, false when the detector did not set it
    pub fn cgo_enabled(&self) -> bool {
        self.suggested_config
            .flag(HintKey::CgoEnabled)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_names_roundtrip() {
        for strategy in Strategy::all_variants() {
            assert_eq!(&Strategy::from_name(strategy.as_str()), strategy);
        }
        assert_eq!(Strategy::from_name("go"), Strategy::AutoGo);
        assert_eq!(
            Strategy::from_name("cobol"),
            Strategy::Custom("cobol".to_string())
        );
    }

    #[test]
    fn test_build_type_unknown_is_custom() {
        let parsed: BuildType = serde_json::from_str("\"vm\"").unwrap();
        assert!(parsed.is_custom());
        let parsed: BuildType = serde_json::from_str("\"oci\"").unwrap();
        assert_eq!(parsed, BuildType::Oci);
        assert_eq!(serde_json::to_string(&BuildType::PureNix).unwrap(), "\"pure-nix\"");
    }

    #[test]
    fn test_strategy_classification() {
        assert!(Strategy::Dockerfile.is_oci_only());
        assert!(Strategy::Nixpacks.is_oci_only());
        assert!(!Strategy::AutoGo.is_oci_only());
        assert!(Strategy::AutoRust.generates_recipe());
        assert!(!Strategy::Flake.generates_recipe());
        assert_eq!(Strategy::AutoPython.language(), "python");
    }

    #[test]
    fn test_suggested_config_rejects_wrong_kind() {
        let mut config = SuggestedConfig::new();
        let err = config.insert(HintKey::CgoEnabled, "yes").unwrap_err();
        assert_eq!(err.expected, HintKind::Bool);
        assert_eq!(err.actual, HintKind::Text);
        assert!(config.is_empty());

        config.insert(HintKey::CgoEnabled, true).unwrap();
        assert_eq!(config.flag(HintKey::CgoEnabled), Some(true));
        assert_eq!(config.text(HintKey::CgoEnabled), None);
    }

    #[test]
    fn test_suggested_config_deserialize_validates() {
        let ok: SuggestedConfig =
            serde_json::from_str(r#"{"go_version": "1.22", "cgo_enabled": false}"#).unwrap();
        assert_eq!(ok.text(HintKey::GoVersion), Some("1.22"));
        assert_eq!(ok.flag(HintKey::CgoEnabled), Some(false));

        let bad = serde_json::from_str::<SuggestedConfig>(r#"{"cgo_enabled": "true"}"#);
        assert!(bad.is_err());

        let unknown = serde_json::from_str::<SuggestedConfig>(r#"{"colour": "red"}"#);
        assert!(unknown.is_err());
    }

    #[test]
    fn test_suggested_config_serializes_in_key_order() {
        let mut config = SuggestedConfig::new();
        config.set_text(HintKey::PackageManager, "pnpm");
        config.set_text(HintKey::GoVersion, "1.21");
        config.set_list(HintKey::WorkspaceMembers, vec!["a".into(), "b".into()]);

        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(
            json,
            r#"{"go_version":"1.21","package_manager":"pnpm","workspace_members":["a","b"]}"#
        );
    }

    #[test]
    fn test_detection_result_defaults() {
        let result = DetectionResult::new(Strategy::Dockerfile, 0.7);
        assert_eq!(result.recommended_build_type, BuildType::Oci);
        assert_eq!(result.framework, Framework::Generic);
        assert!(!result.cgo_enabled());

        let go = DetectionResult::new(Strategy::AutoGo, 0.9);
        assert_eq!(go.recommended_build_type, BuildType::PureNix);
    }
}
