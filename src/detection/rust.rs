//! Rust ecosystem analyzer

use super::analyzer::EcosystemAnalyzer;
use super::types::{DetectionResult, HintKey, Strategy};
use crate::fs::FileSystem;
use anyhow::{Context, Result};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

const DEFAULT_EDITION: &str = "2021";

fn edition_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^\s*edition\s*=\s*["'](\d{4})["']"#).expect("valid regex")
    })
}

/// Edition declared in a Cargo.toml, if any
pub fn parse_edition(content: &str) -> Option<String> {
    edition_regex()
        .captures(content)
        .map(|caps| caps[1].to_string())
}

/// Binary names: every `[[bin]]` name, else the package name
pub fn binary_names(manifest: &toml::Table) -> Vec<String> {
    let bins: Vec<String> = manifest
        .get("bin")
        .and_then(|b| b.as_array())
        .map(|bins| {
            bins.iter()
                .filter_map(|bin| bin.get("name").and_then(|n| n.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    if !bins.is_empty() {
        return bins;
    }

    manifest
        .get("package")
        .and_then(|p| p.get("name"))
        .and_then(|n| n.as_str())
        .map(|name| vec![name.to_string()])
        .unwrap_or_default()
}

fn workspace_members(manifest: &toml::Table) -> Option<Vec<String>> {
    let workspace = manifest.get("workspace")?;
    Some(
        workspace
            .get("members")
            .and_then(|m| m.as_array())
            .map(|members| {
                members
                    .iter()
                    .filter_map(|m| m.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default(),
    )
}

/// Analyzer for repositories with a `Cargo.toml`
#[derive(Debug, Default, Clone, Copy)]
pub struct RustAnalyzer;

impl EcosystemAnalyzer for RustAnalyzer {
    fn strategy(&self) -> Strategy {
        Strategy::AutoRust
    }

    fn marker_files(&self) -> &'static [&'static str] {
        &["Cargo.toml"]
    }

    fn analyze(&self, repo: &Path, fs: &dyn FileSystem) -> Result<Option<DetectionResult>> {
        let manifest_path = repo.join("Cargo.toml");
        if !fs.is_file(&manifest_path) {
            return Ok(None);
        }

        let content = fs
            .read_lossy(&manifest_path)
            .context("Failed to read Cargo.toml")?;

        let mut result = DetectionResult::new(Strategy::AutoRust, 0.9);

        let edition = parse_edition(&content);
        if let Some(edition) = &edition {
            result.version = edition.clone();
        }
        result.suggested_config.set_text(
            HintKey::RustEdition,
            edition.unwrap_or_else(|| DEFAULT_EDITION.to_string()),
        );

        let manifest = match content.parse::<toml::Table>() {
            Ok(manifest) => manifest,
            Err(_) => {
                result.warn("Could not parse Cargo.toml");
                return Ok(Some(result));
            }
        };

        result.entry_points = binary_names(&manifest);
        if let Some(first) = result.entry_points.first() {
            let first = first.clone();
            result.suggested_config.set_text(HintKey::AppName, first);
        }

        if let Some(members) = workspace_members(&manifest) {
            result.warn("Rust workspace detected - may need to specify package");
            result.suggested_config.set_bool(HintKey::IsWorkspace, true);
            if !members.is_empty() {
                result
                    .suggested_config
                    .set_list(HintKey::WorkspaceMembers, members);
            }
        }

        Ok(Some(result))
    }
}
