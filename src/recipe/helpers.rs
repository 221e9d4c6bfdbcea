//! Value formatting helpers shared by every recipe template

use chrono::{DateTime, SecondsFormat, Utc};
use sha2::{Digest, Sha256};

/// Linker flags whose argument is a separate token that must stay attached
pub const TWO_TOKEN_LDFLAGS: &[&str] = &[
    "-X",
    "-extldflags",
    "-extld",
    "-linkmode",
    "-buildmode",
    "-installsuffix",
    "-buildid",
    "-r",
    "-B",
    "-T",
    "-H",
    "-I",
    "-L",
];

const DEFAULT_VERSION: &str = "0.0.0-dev";
const UNKNOWN_COMMIT: &str = "unknown";

/// Values available for `${version}`, `${commit}` and `${buildTime}` in ldflags
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    pub version: String,
    pub commit: String,
    pub build_time: DateTime<Utc>,
}

impl BuildContext {
    /// Context for an actual build: `VERSION` from the environment, current time
    pub fn from_env(commit: Option<&str>) -> Self {
        let version = std::env::var("VERSION")
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_VERSION.to_string());

        Self {
            version,
            commit: commit_or_unknown(commit),
            build_time: Utc::now(),
        }
    }

    /// Context with a fixed timestamp so repeated renders are identical
    pub fn reproducible(commit: Option<&str>) -> Self {
        Self {
            version: DEFAULT_VERSION.to_string(),
            commit: commit_or_unknown(commit),
            build_time: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

fn commit_or_unknown(commit: Option<&str>) -> String {
    commit
        .filter(|c| !c.is_empty())
        .unwrap_or(UNKNOWN_COMMIT)
        .to_string()
}

/// `value` unless it is empty
pub fn default_value<'a>(default: &'a str, value: &'a str) -> &'a str {
    if value.is_empty() {
        default
    } else {
        value
    }
}

/// Quotes `s` as a Nix string literal
pub fn nix_string(s: &str) -> String {
    let escaped = s
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace("${", "\\${");
    format!("\"{}\"", escaped)
}

/// Renders a list of strings as a Nix list literal
pub fn nix_list<S: AsRef<str>>(items: &[S]) -> String {
    if items.is_empty() {
        return "[ ]".to_string();
    }
    let quoted: Vec<String> = items.iter().map(|i| nix_string(i.as_ref())).collect();
    format!("[ {} ]", quoted.join(" "))
}

pub fn format_build_tags(tags: &[String]) -> String {
    nix_list(tags)
}

/// Splits an ldflags string into arguments
///
/// Whitespace separates tokens except inside single or double quotes; quotes
/// are kept so the Go linker sees them. Flags in [`TWO_TOKEN_LDFLAGS`] are
/// joined with their argument.
pub fn split_ldflags(flags: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in flags.chars() {
        match quote {
            Some(q) => {
                current.push(ch);
                if ch == q {
                    quote = None;
                }
            }
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                current.push(ch);
            }
            None if ch.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            None => current.push(ch),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    let mut grouped = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter();
    while let Some(token) = iter.next() {
        if TWO_TOKEN_LDFLAGS.contains(&token.as_str()) {
            match iter.next() {
                Some(arg) => grouped.push(format!("{} {}", token, arg)),
                None => grouped.push(token),
            }
        } else {
            grouped.push(token);
        }
    }
    grouped
}

pub fn ldflags_to_nix_list(flags: &str) -> String {
    nix_list(&split_ldflags(flags))
}

/// Replaces `${version}`, `${commit}` and `${buildTime}` (RFC 3339, UTC)
pub fn substitute_ldflags_variables(flags: &str, ctx: &BuildContext) -> String {
    if flags.is_empty() {
        return String::new();
    }
    flags
        .replace("${version}", &ctx.version)
        .replace("${commit}", &ctx.commit)
        .replace(
            "${buildTime}",
            &ctx.build_time.to_rfc3339_opts(SecondsFormat::Secs, true),
        )
}

pub fn has_ldflags_variables(flags: &str) -> bool {
    ["${version}", "${commit}", "${buildTime}"]
        .iter()
        .any(|v| flags.contains(v))
}

/// Hex SHA-256 of a rendered recipe
pub fn recipe_digest(recipe: &str) -> String {
    hex::encode(Sha256::digest(recipe.as_bytes()))
}
