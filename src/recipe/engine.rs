//! Recipe template rendering
//!
//! Templates are Nix flakes compiled into the binary with `[[name]]`
//! placeholders. Every placeholder value is computed up front from
//! [`TemplateData`] and already formatted as Nix source, then substituted
//! in a single left-to-right pass; inserted values are never re-scanned.

use super::error::RecipeError;
use super::helpers::{default_value, format_build_tags, ldflags_to_nix_list, nix_list, nix_string};
use crate::build_config::BuildConfig;
use crate::detection::{DetectionResult, Framework, HintKey, Strategy};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use tracing::debug;

pub const GO_TEMPLATE: &str = include_str!("templates/go.nix");
pub const GO_CGO_TEMPLATE: &str = include_str!("templates/go-cgo.nix");
pub const NODEJS_TEMPLATE: &str = include_str!("templates/nodejs.nix");
pub const NEXTJS_TEMPLATE: &str = include_str!("templates/nextjs.nix");
pub const RUST_TEMPLATE: &str = include_str!("templates/rust.nix");
pub const PYTHON_TEMPLATE: &str = include_str!("templates/python.nix");

const DEFAULT_APP_VERSION: &str = "0.1.0";
const DEFAULT_NODE_PACKAGE: &str = "nodejs_20";
const DEFAULT_PYTHON_PACKAGE: &str = "python311";

/// Everything a template can draw on
#[derive(Debug, Clone, Default)]
pub struct TemplateData {
    pub app_name: String,
    pub version: String,
    pub framework: Framework,
    pub entry_point: String,
    pub build_command: String,
    pub start_command: String,
    pub config: BuildConfig,
    pub detection: Option<DetectionResult>,
}

impl TemplateData {
    fn hint(&self, key: HintKey) -> Option<&str> {
        self.detection
            .as_ref()
            .and_then(|d| d.suggested_config.text(key))
    }
}

/// Template for a recipe-generating strategy, `None` for the others
pub fn template_for_strategy(
    strategy: &Strategy,
    framework: &Framework,
    config: &BuildConfig,
) -> Option<&'static str> {
    match strategy {
        Strategy::AutoGo if config.cgo_enabled == Some(true) => Some("go-cgo"),
        Strategy::AutoGo => Some("go"),
        Strategy::AutoNode if *framework == Framework::NextJs || config.nextjs.is_some() => {
            Some("nextjs")
        }
        Strategy::AutoNode => Some("nodejs"),
        Strategy::AutoRust => Some("rust"),
        Strategy::AutoPython => Some("python"),
        _ => None,
    }
}

fn minor_version_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)\.(\d+)").expect("valid regex"))
}

/// nixpkgs Go builder for a version, e.g. `1.22` -> `buildGo122Module`
pub fn go_builder(version: &str) -> String {
    match minor_version_regex().captures(version) {
        Some(caps) => format!("buildGo{}{}Module", &caps[1], &caps[2]),
        None => "buildGoModule".to_string(),
    }
}

/// nixpkgs Node.js attribute for a version, e.g. `18.17` -> `nodejs_18`
pub fn node_package(version: &str) -> String {
    let major: String = version.chars().take_while(|c| c.is_ascii_digit()).collect();
    if major.is_empty() {
        DEFAULT_NODE_PACKAGE.to_string()
    } else {
        format!("nodejs_{}", major)
    }
}

/// nixpkgs Python attribute for a version, e.g. `3.12.1` -> `python312`
pub fn python_package(version: &str) -> String {
    match minor_version_regex().captures(version) {
        Some(caps) => format!("python{}{}", &caps[1], &caps[2]),
        None => DEFAULT_PYTHON_PACKAGE.to_string(),
    }
}

fn python_start_command(data: &TemplateData) -> String {
    match data.framework {
        Framework::Django => {
            let settings = data
                .config
                .django
                .as_ref()
                .and_then(|d| d.settings_module.as_deref())
                .unwrap_or("");
            match settings.rsplit_once('.') {
                Some((project, _)) => format!("gunicorn {}.wsgi --bind 0.0.0.0:8000", project),
                None => "python manage.py runserver 0.0.0.0:8000".to_string(),
            }
        }
        Framework::FastApi => {
            let fastapi = data.config.fastapi.clone().unwrap_or_default();
            let module = fastapi.app_module.unwrap_or_else(|| "main:app".to_string());
            format!(
                "uvicorn {} --host 0.0.0.0 --port 8000 --workers {}",
                module,
                fastapi.workers.unwrap_or(1)
            )
        }
        Framework::Flask => "gunicorn app:app --bind 0.0.0.0:8000".to_string(),
        _ => format!("python {}", default_value("main.py", &data.entry_point)),
    }
}

fn default_start_command(template: &str, data: &TemplateData) -> String {
    match template {
        "nodejs" if !data.entry_point.is_empty() => format!("node {}", data.entry_point),
        "nodejs" | "nextjs" => "npm start".to_string(),
        "python" => python_start_command(data),
        _ => format!("./{}", data.app_name),
    }
}

fn template_variables(template: &str, data: &TemplateData) -> BTreeMap<&'static str, String> {
    let config = &data.config;
    let nextjs = config.nextjs.clone().unwrap_or_default();

    let start_command = if data.start_command.is_empty() {
        default_start_command(template, data)
    } else {
        data.start_command.clone()
    };

    let env_list: Vec<String> = config
        .environment_vars
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect();

    let mut vars = BTreeMap::new();
    vars.insert(
        "description",
        nix_string(&format!("{} ({} build)", data.app_name, template)),
    );
    vars.insert("app_name", nix_string(&data.app_name));
    vars.insert(
        "version",
        nix_string(default_value(DEFAULT_APP_VERSION, &data.version)),
    );
    vars.insert(
        "go_builder",
        go_builder(config.go_version.as_deref().unwrap_or("")),
    );
    vars.insert(
        "sub_packages",
        nix_list(&[default_value(".", &data.entry_point)]),
    );
    vars.insert("build_tags", format_build_tags(&config.build_tags));
    vars.insert(
        "ldflags",
        ldflags_to_nix_list(config.ldflags.as_deref().unwrap_or("")),
    );
    vars.insert("extra_packages", nix_list(&config.extra_nix_packages));
    vars.insert("pre_build", nix_string(&config.pre_build_commands.join("\n")));
    vars.insert(
        "post_build",
        nix_string(&config.post_build_commands.join("\n")),
    );
    vars.insert("env_list", nix_list(&env_list));
    vars.insert(
        "node_package",
        node_package(config.node_version.as_deref().unwrap_or("")),
    );
    vars.insert("npm_build_script", nix_string("build"));
    vars.insert(
        "skip_build",
        if data.build_command.is_empty() { "true" } else { "false" }.to_string(),
    );
    vars.insert("start_command", nix_string(&start_command));
    vars.insert(
        "nextjs_output_mode",
        nix_string(nextjs.output_mode.as_deref().unwrap_or("standalone")),
    );
    vars.insert(
        "nextjs_base_path",
        nix_string(nextjs.base_path.as_deref().unwrap_or("")),
    );
    vars.insert(
        "nextjs_asset_prefix",
        nix_string(nextjs.asset_prefix.as_deref().unwrap_or("")),
    );
    vars.insert(
        "nextjs_router",
        nix_string(data.hint(HintKey::NextjsRouter).unwrap_or("app")),
    );
    vars.insert(
        "python_package",
        python_package(config.python_version.as_deref().unwrap_or("")),
    );
    vars.insert(
        "django_settings_module",
        nix_string(
            config
                .django
                .as_ref()
                .and_then(|d| d.settings_module.as_deref())
                .unwrap_or(""),
        ),
    );
    vars.insert(
        "dependency_manager",
        nix_string(data.hint(HintKey::DependencyManager).unwrap_or("pip")),
    );
    vars
}

/// Replaces every `[[name]]` in one pass; unknown names are an error
fn substitute(
    template_name: &str,
    template: &str,
    vars: &BTreeMap<&'static str, String>,
) -> Result<String, RecipeError> {
    let mut out = String::with_capacity(template.len() + 512);
    let mut rest = template;

    while let Some(start) = rest.find("[[") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find("]]")
            .ok_or_else(|| RecipeError::render(template_name, "unterminated placeholder"))?;
        let name = &after[..end];
        let value = vars.get(name).ok_or_else(|| {
            RecipeError::render(template_name, format!("unknown placeholder '{}'", name))
        })?;
        out.push_str(value);
        rest = &after[end + 2..];
    }
    out.push_str(rest);

    Ok(out)
}

/// Renders recipe templates by name
#[derive(Debug, Clone)]
pub struct TemplateEngine {
    templates: BTreeMap<&'static str, &'static str>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine {
    pub fn new() -> Self {
        let templates = BTreeMap::from([
            ("go", GO_TEMPLATE),
            ("go-cgo", GO_CGO_TEMPLATE),
            ("nodejs", NODEJS_TEMPLATE),
            ("nextjs", NEXTJS_TEMPLATE),
            ("rust", RUST_TEMPLATE),
            ("python", PYTHON_TEMPLATE),
        ]);
        Self { templates }
    }

    /// Engine over a custom template set
    pub fn with_templates(templates: BTreeMap<&'static str, &'static str>) -> Self {
        Self { templates }
    }

    /// Template names in sorted order
    pub fn list_templates(&self) -> Vec<&'static str> {
        self.templates.keys().copied().collect()
    }

    pub fn render(&self, template_name: &str, data: &TemplateData) -> Result<String, RecipeError> {
        let template = self
            .templates
            .get(template_name)
            .ok_or_else(|| RecipeError::TemplateNotFound(template_name.to_string()))?;

        if data.app_name.trim().is_empty() {
            return Err(RecipeError::render(template_name, "app name cannot be empty"));
        }

        let vars = template_variables(template_name, data);
        let rendered = substitute(template_name, template, &vars)?;

        debug!(
            template = template_name,
            app_name = %data.app_name,
            bytes = rendered.len(),
            "Rendered recipe"
        );
        Ok(rendered)
    }
}

/// Where the scanner is inside recipe text; code is the empty stack
#[derive(Debug, Clone, Copy)]
enum Scope {
    String,
    IndentedString,
    /// `${ ... }` inside a string, closed by the brace that returns to this depth
    Interpolation(i64),
}

/// Structural check of recipe text without invoking Nix
///
/// Delimiters must balance and never close before they open; the flake must
/// mention `description`, `inputs`, `outputs` and `packages`. Delimiters
/// inside strings and comments do not count, those in `${ }` interpolations do.
pub fn validate_syntax(recipe: &str) -> Result<(), RecipeError> {
    check_delimiters(recipe).map_err(|reason| RecipeError::syntax(reason, recipe))?;

    for section in ["description", "inputs", "outputs", "packages"] {
        if !recipe.contains(section) {
            return Err(RecipeError::syntax(format!("missing {}", section), recipe));
        }
    }

    Ok(())
}

fn check_delimiters(recipe: &str) -> Result<(), String> {
    let chars: Vec<char> = recipe.chars().collect();
    let mut scopes: Vec<Scope> = Vec::new();
    let mut braces: i64 = 0;
    let mut brackets: i64 = 0;
    let mut parens: i64 = 0;

    let mut i = 0;
    while i < chars.len() {
        let next = chars.get(i + 1).copied();
        match (scopes.last().copied(), chars[i], next) {
            (Some(Scope::String), '\\', _) => i += 1,
            (Some(Scope::String), '"', _) => {
                scopes.pop();
            }
            (Some(Scope::IndentedString), '\'', Some('\'')) => match chars.get(i + 2) {
                Some('\'') | Some('$') => i += 2,
                Some('\\') => i += 3,
                _ => {
                    scopes.pop();
                    i += 1;
                }
            },
            (Some(Scope::String | Scope::IndentedString), '$', Some('{')) => {
                braces += 1;
                scopes.push(Scope::Interpolation(braces));
                i += 1;
            }
            (Some(Scope::String | Scope::IndentedString), _, _) => {}

            (_, '#', _) => {
                while i + 1 < chars.len() && chars[i + 1] != '\n' {
                    i += 1;
                }
            }
            (_, '/', Some('*')) => {
                let close = (i + 2..chars.len().saturating_sub(1))
                    .find(|&j| chars[j] == '*' && chars[j + 1] == '/')
                    .ok_or("unterminated comment")?;
                i = close + 1;
            }
            (_, '"', _) => scopes.push(Scope::String),
            (_, '\'', Some('\'')) => {
                scopes.push(Scope::IndentedString);
                i += 1;
            }
            (scope, '}', _) => {
                if matches!(scope, Some(Scope::Interpolation(depth)) if depth == braces) {
                    scopes.pop();
                }
                braces -= 1;
            }
            (_, '{', _) => braces += 1,
            (_, '[', _) => brackets += 1,
            (_, ']', _) => brackets -= 1,
            (_, '(', _) => parens += 1,
            (_, ')', _) => parens -= 1,
            _ => {}
        }
        if braces < 0 || brackets < 0 || parens < 0 {
            return Err("unbalanced brackets".to_string());
        }
        i += 1;
    }

    if braces != 0 {
        return Err(format!("unbalanced braces (count: {})", braces));
    }
    if brackets != 0 {
        return Err(format!("unbalanced square brackets (count: {})", brackets));
    }
    if parens != 0 {
        return Err(format!("unbalanced parentheses (count: {})", parens));
    }
    if let Some(Scope::String | Scope::IndentedString) = scopes.last() {
        return Err("unterminated string".to_string());
    }
    Ok(())
}
