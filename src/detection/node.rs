//! Node.js ecosystem analyzer

use super::analyzer::{read_optional, EcosystemAnalyzer};
use super::types::{DetectionResult, Framework, HintKey, Strategy};
use crate::fs::FileSystem;
use anyhow::{Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

const DEFAULT_NODE_VERSION: &str = "20";

/// The subset of package.json the analyzer reads
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageJson {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub main: String,
    #[serde(default)]
    pub scripts: BTreeMap<String, String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub engines: Engines,
    #[serde(default)]
    pub package_manager: String,
    #[serde(default)]
    pub workspaces: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Engines {
    #[serde(default)]
    pub node: String,
}

impl PackageJson {
    fn dependency(&self, name: &str) -> Option<&str> {
        self.dependencies
            .get(name)
            .or_else(|| self.dev_dependencies.get(name))
            .map(String::as_str)
    }

    /// `workspaces` as either an array or `{ "packages": [...] }`
    fn workspace_members(&self) -> Vec<String> {
        let list = match &self.workspaces {
            Some(serde_json::Value::Array(items)) => items.clone(),
            Some(serde_json::Value::Object(map)) => match map.get("packages") {
                Some(serde_json::Value::Array(items)) => items.clone(),
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };

        list.into_iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect()
    }
}

fn node_version_regex() -> &'static Regex {
    static NODE_VERSION_REGEX: OnceLock<Regex> = OnceLock::new();
    NODE_VERSION_REGEX
        .get_or_init(|| Regex::new(r"^v?(\d+)(?:\.(\d+))?(?:\.(\d+))?").expect("valid regex"))
}

/// Reduces a version or range to `major` or `major.minor`
pub fn normalize_node_version(raw: &str) -> String {
    let trimmed = raw
        .trim()
        .trim_start_matches(|c: char| matches!(c, '^' | '~' | '>' | '<' | '=' | ' '))
        .trim_start_matches('v');

    match node_version_regex().captures(trimmed) {
        Some(caps) => match caps.get(2) {
            Some(minor) => format!("{}.{}", &caps[1], minor.as_str()),
            None => caps[1].to_string(),
        },
        None => trimmed.to_string(),
    }
}

/// Leading major version of a semver range, 0 when absent
pub fn major_version(range: &str) -> u32 {
    range
        .trim_start_matches(|c: char| !c.is_ascii_digit())
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .parse()
        .unwrap_or(0)
}

fn detect_node_version(fs: &dyn FileSystem, repo: &Path, pkg: &PackageJson) -> String {
    for file in [".nvmrc", ".node-version"] {
        if let Some(content) = read_optional(fs, &repo.join(file)) {
            let content = content.trim();
            if node_version_regex().is_match(content) {
                return normalize_node_version(content);
            }
        }
    }

    if !pkg.engines.node.is_empty() {
        return normalize_node_version(&pkg.engines.node);
    }

    DEFAULT_NODE_VERSION.to_string()
}

fn detect_package_manager(fs: &dyn FileSystem, repo: &Path, pkg: &PackageJson) -> &'static str {
    for manager in ["yarn", "pnpm", "npm"] {
        if pkg.package_manager.starts_with(manager) {
            return manager;
        }
    }

    if fs.is_file(&repo.join("pnpm-lock.yaml")) {
        "pnpm"
    } else if fs.is_file(&repo.join("yarn.lock")) {
        "yarn"
    } else {
        "npm"
    }
}

/// Framework by fixed priority: next, express, fastify, react
fn detect_framework(pkg: &PackageJson) -> (Framework, Option<&str>) {
    if let Some(version) = pkg.dependency("next") {
        return (Framework::NextJs, Some(version));
    }

    [
        ("express", Framework::Express),
        ("fastify", Framework::Fastify),
        ("react", Framework::React),
    ]
    .into_iter()
    .find(|(name, _)| pkg.dependency(name).is_some())
    .map(|(_, framework)| (framework, None))
    .unwrap_or((Framework::Generic, None))
}

/// Analyzer for repositories with a `package.json`
#[derive(Debug, Default, Clone, Copy)]
pub struct NodeAnalyzer;

impl EcosystemAnalyzer for NodeAnalyzer {
    fn strategy(&self) -> Strategy {
        Strategy::AutoNode
    }

    fn marker_files(&self) -> &'static [&'static str] {
        &["package.json"]
    }

    fn analyze(&self, repo: &Path, fs: &dyn FileSystem) -> Result<Option<DetectionResult>> {
        let manifest = repo.join("package.json");
        if !fs.is_file(&manifest) {
            return Ok(None);
        }

        let content = fs
            .read_lossy(&manifest)
            .context("Failed to read package.json")?;

        let mut result = DetectionResult::new(Strategy::AutoNode, 0.9);

        let pkg = match serde_json::from_str::<PackageJson>(&content) {
            Ok(pkg) => pkg,
            Err(_) => {
                result.warn("Could not parse package.json");
                result.confidence = 0.6;
                PackageJson::default()
            }
        };

        let version = detect_node_version(fs, repo, &pkg);
        result.version = version.clone();
        result.suggested_config.set_text(HintKey::NodeVersion, version);

        let manager = detect_package_manager(fs, repo, &pkg);
        result
            .suggested_config
            .set_text(HintKey::PackageManager, manager);

        let (framework, framework_version) = detect_framework(&pkg);
        if let Some(version) = framework_version {
            let router = if major_version(version) >= 13 {
                "app"
            } else {
                "pages"
            };
            result.suggested_config.set_text(HintKey::NextjsRouter, router);
        }
        result.framework = framework;

        if let Some(build) = pkg.scripts.get("build") {
            result
                .suggested_config
                .set_text(HintKey::BuildCommand, build.clone());
        }
        if let Some(start) = pkg.scripts.get("start") {
            result
                .suggested_config
                .set_text(HintKey::StartCommand, start.clone());
        }

        if !pkg.name.is_empty() {
            result
                .suggested_config
                .set_text(HintKey::AppName, pkg.name.clone());
        }

        if !pkg.main.is_empty() {
            result.entry_points.push(pkg.main.clone());
            result
                .suggested_config
                .set_text(HintKey::EntryPoint, pkg.main.clone());
        }

        let members = pkg.workspace_members();
        if !members.is_empty() {
            result.suggested_config.set_bool(HintKey::IsWorkspace, true);
            result
                .suggested_config
                .set_list(HintKey::WorkspaceMembers, members);
        }

        Ok(Some(result))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;

    fn analyze(fs: &MockFileSystem) -> DetectionResult {
        NodeAnalyzer
            .analyze(Path::new("/mock"), fs)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_normalize_node_version() {
        assert_eq!(normalize_node_version("v18.17.1"), "18.17");
        assert_eq!(normalize_node_version(">=18"), "18");
        assert_eq!(normalize_node_version("^20.1"), "20.1");
        assert_eq!(normalize_node_version("lts/*"), "lts/*");
    }

    #[test]
    fn test_major_version() {
        assert_eq!(major_version("^14.0.3"), 14);
        assert_eq!(major_version("12.3.0"), 12);
        assert_eq!(major_version("latest"), 0);
    }

    #[test]
    fn test_express_app_with_scripts() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "package.json",
            r#"{
                "name": "api",
                "main": "server.js",
                "scripts": {"start": "node server.js", "build": "tsc"},
                "dependencies": {"express": "^4.18.0", "react": "^18.0.0"},
                "engines": {"node": ">=18"}
            }"#,
        );
        fs.add_file("yarn.lock", "");

        let result = analyze(&fs);
        assert_eq!(result.framework, Framework::Express);
        assert_eq!(result.version, "18");
        assert_eq!(result.entry_points, vec!["server.js"]);
        assert_eq!(result.suggested_config.text(HintKey::PackageManager), Some("yarn"));
        assert_eq!(result.suggested_config.text(HintKey::BuildCommand), Some("tsc"));
        assert_eq!(
            result.suggested_config.text(HintKey::StartCommand),
            Some("node server.js")
        );
        assert_eq!(result.suggested_config.text(HintKey::AppName), Some("api"));
    }

    #[test]
    fn test_nextjs_router_and_nvmrc() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "package.json",
            r#"{"name": "web", "dependencies": {"next": "^14.1.0", "react": "^18.0.0"}}"#,
        );
        fs.add_file(".nvmrc", "v20.11.0\n");

        let result = analyze(&fs);
        assert_eq!(result.framework, Framework::NextJs);
        assert_eq!(result.version, "20.11");
        assert_eq!(result.suggested_config.text(HintKey::NextjsRouter), Some("app"));
        assert_eq!(result.suggested_config.text(HintKey::PackageManager), Some("npm"));
    }

    #[test]
    fn test_package_manager_field_wins() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "package.json",
            r#"{"packageManager": "pnpm@8.15.0", "devDependencies": {"next": "12.3.4"}}"#,
        );
        fs.add_file("yarn.lock", "");

        let result = analyze(&fs);
        assert_eq!(result.suggested_config.text(HintKey::PackageManager), Some("pnpm"));
        assert_eq!(result.suggested_config.text(HintKey::NextjsRouter), Some("pages"));
    }

    #[test]
    fn test_invalid_package_json_degrades() {
        let fs = MockFileSystem::new();
        fs.add_file("package.json", "{ not json");

        let result = analyze(&fs);
        assert_eq!(result.framework, Framework::Generic);
        assert_eq!(result.version, DEFAULT_NODE_VERSION);
        assert_eq!(result.warnings, vec!["Could not parse package.json"]);
    }

    #[test]
    fn test_workspaces() {
        let fs = MockFileSystem::new();
        fs.add_file(
            "package.json",
            r#"{"workspaces": {"packages": ["packages/*", "apps/web"]}}"#,
        );

        let result = analyze(&fs);
        assert_eq!(result.suggested_config.flag(HintKey::IsWorkspace), Some(true));
        assert_eq!(
            result.suggested_config.list(HintKey::WorkspaceMembers),
            Some(&["packages/*".to_string(), "apps/web".to_string()][..])
        );
    }
}
