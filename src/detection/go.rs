//! Go ecosystem analyzer

use super::analyzer::{read_optional, EcosystemAnalyzer};
use super::cgo;
use super::types::{DetectionResult, HintKey, Strategy};
use crate::fs::FileSystem;
use anyhow::{Context, Result};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Directories scanned one level deep for additional `main` packages
const ENTRY_POINT_DIRS: &[&str] = &["cmd"];

fn go_directive_regex() -> &'static Regex {
    static GO_VERSION_REGEX: OnceLock<Regex> = OnceLock::new();
    GO_VERSION_REGEX
        .get_or_init(|| Regex::new(r"^go\s+(\d+\.\d+(?:\.\d+)?)").expect("valid regex"))
}

/// Extracts the `go` directive from go.mod or go.work content
pub fn parse_go_version(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        go_directive_regex()
            .captures(line.trim())
            .map(|caps| caps[1].to_string())
    })
}

/// Extracts the module path from go.mod content
pub fn parse_module_path(content: &str) -> Option<String> {
    content.lines().find_map(|line| {
        line.trim()
            .strip_prefix("module ")
            .map(|rest| rest.trim().trim_matches('"').to_string())
            .filter(|module| !module.is_empty())
    })
}

/// Extracts `use` directives from go.work content, in file order
pub fn parse_go_work_members(content: &str) -> Vec<String> {
    let mut members = Vec::new();
    let mut in_block = false;

    for line in content.lines() {
        let line = line.split("//").next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        if in_block {
            if line == ")" {
                in_block = false;
            } else {
                members.push(line.trim_matches('"').to_string());
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("use") {
            let rest = rest.trim();
            if rest == "(" {
                in_block = true;
            } else if !rest.is_empty() {
                members.push(rest.trim_matches('"').to_string());
            }
        }
    }

    members
}

fn package_clause(content: &str) -> Option<&str> {
    content.lines().find_map(|line| {
        line.trim()
            .strip_prefix("package ")
            .and_then(|rest| rest.split_whitespace().next())
    })
}

/// True if `dir` holds a non-test Go file declaring `package main`
fn has_main_package(fs: &dyn FileSystem, dir: &Path) -> bool {
    let Ok(entries) = fs.read_dir(dir) else {
        return false;
    };

    entries
        .iter()
        .filter(|e| e.is_file())
        .filter(|e| e.file_name().ends_with(".go") && !e.file_name().ends_with("_test.go"))
        .any(|e| {
            fs.read_lossy(e.path())
                .map(|content| package_clause(&content) == Some("main"))
                .unwrap_or(false)
        })
}

/// Buildable units: `.` for a root main package, then `cmd/<name>` in name order
pub fn discover_entry_points(fs: &dyn FileSystem, repo: &Path) -> Vec<String> {
    let mut entry_points = Vec::new();

    if has_main_package(fs, repo) {
        entry_points.push(".".to_string());
    }

    for dir_name in ENTRY_POINT_DIRS {
        let dir = repo.join(dir_name);
        if !fs.is_dir(&dir) {
            continue;
        }
        let Ok(entries) = fs.read_dir(&dir) else {
            continue;
        };
        for entry in entries.iter().filter(|e| e.is_dir()) {
            if has_main_package(fs, entry.path()) {
                entry_points.push(format!("{}/{}", dir_name, entry.file_name()));
            }
        }
    }

    entry_points
}

/// Analyzer for repositories with a `go.mod`
#[derive(Debug, Default, Clone, Copy)]
pub struct GoAnalyzer;

impl EcosystemAnalyzer for GoAnalyzer {
    fn strategy(&self) -> Strategy {
        Strategy::AutoGo
    }

    fn marker_files(&self) -> &'static [&'static str] {
        &["go.mod"]
    }

    fn analyze(&self, repo: &Path, fs: &dyn FileSystem) -> Result<Option<DetectionResult>> {
        let go_mod_path = repo.join("go.mod");
        if !fs.is_file(&go_mod_path) {
            return Ok(None);
        }

        let go_mod = fs
            .read_lossy(&go_mod_path)
            .context("Failed to read go.mod")?;

        let mut result = DetectionResult::new(Strategy::AutoGo, 0.9);

        match parse_go_version(&go_mod) {
            Some(version) => result.version = version,
            None => result.warn("Could not parse Go version from go.mod"),
        }

        if let Some(module) = parse_module_path(&go_mod) {
            if let Some(name) = module.rsplit('/').next() {
                result.suggested_config.set_text(HintKey::AppName, name);
            }
        }

        if let Some(go_work) = read_optional(fs, &repo.join("go.work")) {
            if let Some(version) = parse_go_version(&go_work) {
                result.version = version;
            }
            let members = parse_go_work_members(&go_work);
            result.suggested_config.set_bool(HintKey::IsWorkspace, true);
            if !members.is_empty() {
                result
                    .suggested_config
                    .set_list(HintKey::WorkspaceMembers, members);
            }
        }

        if !result.version.is_empty() {
            let version = result.version.clone();
            result.suggested_config.set_text(HintKey::GoVersion, version);
        }

        result.entry_points = discover_entry_points(fs, repo);
        if let [only] = result.entry_points.as_slice() {
            let only = only.clone();
            result.suggested_config.set_text(HintKey::EntryPoint, only);
        }

        let cgo = cgo::detect_cgo(fs, repo);
        if !cgo.failures.is_empty() {
            result.warn("Could not detect CGO usage");
        }
        result
            .suggested_config
            .set_bool(HintKey::CgoEnabled, cgo.requires_cgo);
        if cgo.requires_cgo {
            result.warn("CGO detected - build may require additional system dependencies");
        }

        Ok(Some(result))
    }
}
