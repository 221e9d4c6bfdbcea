use super::{BuildConfig, DjangoOptions, FastApiOptions, NextJsOptions};
use std::collections::BTreeMap;
use std::fmt::Debug;
use tracing::debug;

fn log_override<T: Debug + ?Sized>(field: &str, user: &T, detected: &T) {
    debug!(
        field,
        user_value = ?user,
        detected_value = ?detected,
        "user config overrides detected value"
    );
}

/// Non-empty user string wins
fn merge_string(field: &str, user: &Option<String>, detected: &Option<String>) -> Option<String> {
    match user {
        Some(u) if !u.is_empty() => {
            if let Some(d) = detected.as_ref().filter(|d| !d.is_empty() && *d != u) {
                log_override(field, u, d);
            }
            Some(u.clone())
        }
        _ => detected.clone(),
    }
}

/// Any `Some` user value wins, including an explicit `false`
fn merge_option<T: Clone + PartialEq + Debug>(
    field: &str,
    user: &Option<T>,
    detected: &Option<T>,
) -> Option<T> {
    match user {
        Some(u) => {
            if let Some(d) = detected.as_ref().filter(|d| *d != u) {
                log_override(field, u, d);
            }
            Some(u.clone())
        }
        None => detected.clone(),
    }
}

/// A non-empty user list replaces the detected one wholesale
fn merge_list(field: &str, user: &[String], detected: &[String]) -> Vec<String> {
    if user.is_empty() {
        return detected.to_vec();
    }
    if !detected.is_empty() && user != detected {
        log_override(field, user, detected);
    }
    user.to_vec()
}

fn merge_map(
    field: &str,
    user: &BTreeMap<String, String>,
    detected: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = detected.clone();
    for (key, value) in user {
        if let Some(existing) = merged.get(key).filter(|existing| *existing != value) {
            debug!(
                field,
                key = %key,
                user_value = %value,
                detected_value = %existing,
                "user config overrides detected value"
            );
        }
        merged.insert(key.clone(), value.clone());
    }
    merged
}

/// Merges an optional group field by field when both sides are present
fn merge_group<T: Clone>(
    user: &Option<T>,
    detected: &Option<T>,
    fields: impl FnOnce(&T, &T) -> T,
) -> Option<T> {
    match (user, detected) {
        (Some(u), Some(d)) => Some(fields(u, d)),
        (Some(u), None) => Some(u.clone()),
        (None, d) => d.clone(),
    }
}

fn merge_nextjs(user: &NextJsOptions, detected: &NextJsOptions) -> NextJsOptions {
    NextJsOptions {
        output_mode: merge_string("nextjs.output_mode", &user.output_mode, &detected.output_mode),
        base_path: merge_string("nextjs.base_path", &user.base_path, &detected.base_path),
        asset_prefix: merge_string(
            "nextjs.asset_prefix",
            &user.asset_prefix,
            &detected.asset_prefix,
        ),
        image_optimizer: merge_option(
            "nextjs.image_optimizer",
            &user.image_optimizer,
            &detected.image_optimizer,
        ),
    }
}

fn merge_django(user: &DjangoOptions, detected: &DjangoOptions) -> DjangoOptions {
    DjangoOptions {
        settings_module: merge_string(
            "django.settings_module",
            &user.settings_module,
            &detected.settings_module,
        ),
        static_root: merge_string("django.static_root", &user.static_root, &detected.static_root),
        collect_static: merge_option(
            "django.collect_static",
            &user.collect_static,
            &detected.collect_static,
        ),
        migrations: merge_option("django.migrations", &user.migrations, &detected.migrations),
    }
}

fn merge_fastapi(user: &FastApiOptions, detected: &FastApiOptions) -> FastApiOptions {
    FastApiOptions {
        app_module: merge_string("fastapi.app_module", &user.app_module, &detected.app_module),
        workers: merge_option("fastapi.workers", &user.workers, &detected.workers),
    }
}

/// Combines user and detected settings; user values take precedence
///
/// Either side may be absent. The result never aliases its inputs.
pub fn merge(user: Option<&BuildConfig>, detected: Option<&BuildConfig>) -> BuildConfig {
    let (user, detected) = match (user, detected) {
        (None, None) => return BuildConfig::default(),
        (Some(u), None) => return u.clone(),
        (None, Some(d)) => return d.clone(),
        (Some(u), Some(d)) => (u, d),
    };

    BuildConfig {
        build_command: merge_string("build_command", &user.build_command, &detected.build_command),
        start_command: merge_string("start_command", &user.start_command, &detected.start_command),
        entry_point: merge_string("entry_point", &user.entry_point, &detected.entry_point),
        build_timeout: merge_option("build_timeout", &user.build_timeout, &detected.build_timeout),

        go_version: merge_string("go_version", &user.go_version, &detected.go_version),
        cgo_enabled: merge_option("cgo_enabled", &user.cgo_enabled, &detected.cgo_enabled),
        build_tags: merge_list("build_tags", &user.build_tags, &detected.build_tags),
        ldflags: merge_string("ldflags", &user.ldflags, &detected.ldflags),
        pre_build_commands: merge_list(
            "pre_build_commands",
            &user.pre_build_commands,
            &detected.pre_build_commands,
        ),
        post_build_commands: merge_list(
            "post_build_commands",
            &user.post_build_commands,
            &detected.post_build_commands,
        ),

        is_workspace: merge_option("is_workspace", &user.is_workspace, &detected.is_workspace),
        workspace_module: merge_string(
            "workspace_module",
            &user.workspace_module,
            &detected.workspace_module,
        ),

        node_version: merge_string("node_version", &user.node_version, &detected.node_version),
        package_manager: merge_string(
            "package_manager",
            &user.package_manager,
            &detected.package_manager,
        ),
        rust_edition: merge_string("rust_edition", &user.rust_edition, &detected.rust_edition),
        python_version: merge_string(
            "python_version",
            &user.python_version,
            &detected.python_version,
        ),

        nextjs: merge_group(&user.nextjs, &detected.nextjs, merge_nextjs),
        django: merge_group(&user.django, &detected.django, merge_django),
        fastapi: merge_group(&user.fastapi, &detected.fastapi, merge_fastapi),

        extra_nix_packages: merge_list(
            "extra_nix_packages",
            &user.extra_nix_packages,
            &detected.extra_nix_packages,
        ),
        environment_vars: merge_map(
            "environment_vars",
            &user.environment_vars,
            &detected.environment_vars,
        ),
        auto_retry_as_oci: merge_option(
            "auto_retry_as_oci",
            &user.auto_retry_as_oci,
            &detected.auto_retry_as_oci,
        ),
    }
}
