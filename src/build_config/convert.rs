use super::{BuildConfig, DjangoOptions, FastApiOptions};
use crate::detection::{DetectionResult, HintKey};

/// Converts detector hints into config fields ready for [`merge`](super::merge)
pub fn build_config_from_detection(detection: &DetectionResult) -> BuildConfig {
    let hints = &detection.suggested_config;
    let text = |key: HintKey| hints.text(key).map(str::to_string);

    let mut config = BuildConfig {
        build_command: text(HintKey::BuildCommand),
        start_command: text(HintKey::StartCommand),
        entry_point: text(HintKey::EntryPoint),
        go_version: text(HintKey::GoVersion),
        cgo_enabled: hints.flag(HintKey::CgoEnabled),
        is_workspace: hints.flag(HintKey::IsWorkspace),
        workspace_module: text(HintKey::WorkspaceModule),
        node_version: text(HintKey::NodeVersion),
        package_manager: text(HintKey::PackageManager),
        rust_edition: text(HintKey::RustEdition),
        python_version: text(HintKey::PythonVersion),
        ..Default::default()
    };

    if let Some(settings_module) = text(HintKey::DjangoSettingsModule) {
        config.django = Some(DjangoOptions {
            settings_module: Some(settings_module),
            ..Default::default()
        });
    }

    if let Some(app_module) = text(HintKey::FastapiAppModule) {
        config.fastapi = Some(FastApiOptions {
            app_module: Some(app_module),
            ..Default::default()
        });
    }

    config
}
