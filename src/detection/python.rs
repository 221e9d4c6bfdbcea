//! Python ecosystem analyzer

use super::analyzer::{read_optional, EcosystemAnalyzer};
use super::types::{DetectionResult, Framework, HintKey, Strategy};
use crate::fs::FileSystem;
use anyhow::Result;
use regex::Regex;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::OnceLock;

const DEFAULT_PYTHON_VERSION: &str = "3.11";

/// Files searched, in order, for a module constructing `FastAPI(`
const FASTAPI_CANDIDATES: &[(&str, &str)] = &[
    ("main.py", "main:app"),
    ("app/main.py", "app.main:app"),
    ("src/main.py", "src.main:app"),
    ("app.py", "app:app"),
];

const ENTRY_POINT_FILES: &[&str] = &["main.py", "app.py", "manage.py"];

fn version_file_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+\.\d+(?:\.\d+)?)").expect("valid regex"))
}

fn requires_python_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^requires-python\s*=\s*["'][>=~^]*(\d+\.\d+)"#).expect("valid regex")
    })
}

fn poetry_python_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?m)^python\s*=\s*["'][\^~>=<]*(\d+\.\d+)"#).expect("valid regex")
    })
}

fn requirement_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^([a-zA-Z][a-zA-Z0-9_.-]*)").expect("valid regex"))
}

fn settings_module_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"DJANGO_SETTINGS_MODULE.*?["']([^"']+)["']"#).expect("valid regex")
    })
}

/// Python version from the first source that yields one
fn detect_python_version(fs: &dyn FileSystem, repo: &Path) -> Option<String> {
    if let Some(content) = read_optional(fs, &repo.join(".python-version")) {
        if let Some(caps) = version_file_regex().captures(content.trim()) {
            return Some(caps[1].to_string());
        }
    }

    if let Some(content) = read_optional(fs, &repo.join("pyproject.toml")) {
        for re in [requires_python_regex(), poetry_python_regex()] {
            if let Some(caps) = re.captures(&content) {
                return Some(caps[1].to_string());
            }
        }
    }

    read_optional(fs, &repo.join("runtime.txt")).and_then(|content| {
        content
            .trim()
            .strip_prefix("python-")
            .and_then(|v| version_file_regex().captures(v))
            .map(|caps| caps[1].to_string())
    })
}

/// Lowercased package names from requirements.txt lines
pub fn parse_requirements(content: &str) -> BTreeSet<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('-'))
        .filter_map(|line| requirement_name_regex().captures(line))
        .map(|caps| caps[1].to_lowercase().replace('_', "-"))
        .collect()
}

/// Lowercased dependency names declared in pyproject.toml
///
/// Covers PEP 621 `project.dependencies` and `tool.poetry.dependencies`.
pub fn parse_pyproject_dependencies(content: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let Ok(doc) = content.parse::<toml::Table>() else {
        return names;
    };

    if let Some(deps) = doc
        .get("project")
        .and_then(|p| p.get("dependencies"))
        .and_then(|d| d.as_array())
    {
        for dep in deps.iter().filter_map(|d| d.as_str()) {
            if let Some(caps) = requirement_name_regex().captures(dep.trim()) {
                names.insert(caps[1].to_lowercase().replace('_', "-"));
            }
        }
    }

    if let Some(deps) = doc
        .get("tool")
        .and_then(|t| t.get("poetry"))
        .and_then(|p| p.get("dependencies"))
        .and_then(|d| d.as_table())
    {
        names.extend(
            deps.keys()
                .filter(|k| k.as_str() != "python")
                .map(|k| k.to_lowercase().replace('_', "-")),
        );
    }

    names
}

/// Framework by fixed priority: django, fastapi, flask
fn detect_framework(dependencies: &BTreeSet<String>) -> Framework {
    [
        ("django", Framework::Django),
        ("fastapi", Framework::FastApi),
        ("flask", Framework::Flask),
    ]
    .into_iter()
    .find(|(name, _)| dependencies.contains(*name))
    .map(|(_, framework)| framework)
    .unwrap_or(Framework::Generic)
}

fn detect_settings_module(fs: &dyn FileSystem, repo: &Path) -> Option<String> {
    if let Some(manage) = read_optional(fs, &repo.join("manage.py")) {
        if let Some(caps) = settings_module_regex().captures(&manage) {
            return Some(caps[1].to_string());
        }
    }

    let entries = fs.read_dir(repo).ok()?;
    entries
        .iter()
        .filter(|e| e.is_dir() && !e.file_name().starts_with('.'))
        .find(|e| fs.is_file(&e.path().join("settings.py")))
        .map(|e| format!("{}.settings", e.file_name()))
}

fn detect_fastapi_module(fs: &dyn FileSystem, repo: &Path) -> Option<&'static str> {
    FASTAPI_CANDIDATES
        .iter()
        .find(|(file, _)| {
            read_optional(fs, &repo.join(file))
                .map(|content| content.contains("FastAPI("))
                .unwrap_or(false)
        })
        .map(|(_, module)| *module)
}

/// Analyzer for repositories with a Python project manifest
#[derive(Debug, Default, Clone, Copy)]
pub struct PythonAnalyzer;

impl EcosystemAnalyzer for PythonAnalyzer {
    fn strategy(&self) -> Strategy {
        Strategy::AutoPython
    }

    fn marker_files(&self) -> &'static [&'static str] {
        &["pyproject.toml", "requirements.txt", "setup.py"]
    }

    fn analyze(&self, repo: &Path, fs: &dyn FileSystem) -> Result<Option<DetectionResult>> {
        if !self.matches(repo, fs) {
            return Ok(None);
        }

        let mut result = DetectionResult::new(Strategy::AutoPython, 0.85);

        match detect_python_version(fs, repo) {
            Some(version) => {
                result.version = version.clone();
                result
                    .suggested_config
                    .set_text(HintKey::PythonVersion, version);
            }
            None => result
                .suggested_config
                .set_text(HintKey::PythonVersion, DEFAULT_PYTHON_VERSION),
        }

        let mut dependencies = BTreeSet::new();
        if let Some(content) = read_optional(fs, &repo.join("requirements.txt")) {
            dependencies.extend(parse_requirements(&content));
        }
        if let Some(content) = read_optional(fs, &repo.join("pyproject.toml")) {
            dependencies.extend(parse_pyproject_dependencies(&content));
        }

        result.framework = detect_framework(&dependencies);
        match result.framework {
            Framework::Django => {
                if let Some(module) = detect_settings_module(fs, repo) {
                    result
                        .suggested_config
                        .set_text(HintKey::DjangoSettingsModule, module);
                }
            }
            Framework::FastApi => {
                if let Some(module) = detect_fastapi_module(fs, repo) {
                    result
                        .suggested_config
                        .set_text(HintKey::FastapiAppModule, module);
                }
            }
            _ => {}
        }

        let manager = if fs.is_file(&repo.join("poetry.lock")) {
            "poetry"
        } else {
            "pip"
        };
        result
            .suggested_config
            .set_text(HintKey::DependencyManager, manager);

        result.entry_points = ENTRY_POINT_FILES
            .iter()
            .filter(|file| fs.is_file(&repo.join(file)))
            .map(|file| file.to_string())
            .collect();
        if let Some(first) = result.entry_points.first() {
            let first = first.clone();
            result.suggested_config.set_text(HintKey::EntryPoint, first);
        }

        Ok(Some(result))
    }
}
