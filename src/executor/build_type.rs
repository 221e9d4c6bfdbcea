use crate::detection::{BuildType, Strategy};
use serde::Serialize;
use tracing::warn;

/// Build type chosen for a strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildTypeDecision {
    pub build_type: BuildType,
    pub reason: String,
    /// True when the strategy overrode what the caller asked for
    pub forced: bool,
}

/// Picks the build type for `strategy`
///
/// Container-only strategies always get `oci`. Others keep the requested
/// build type, defaulting to `pure-nix`.
pub fn select_build_type(strategy: &Strategy, requested: Option<&BuildType>) -> BuildTypeDecision {
    if strategy.is_oci_only() {
        let forced = matches!(requested, Some(bt) if *bt != BuildType::Oci);
        if forced {
            warn!(
                strategy = %strategy,
                requested = ?requested.map(|b| b.as_str()),
                "{} strategy requires OCI build type, overriding",
                strategy
            );
        }
        return BuildTypeDecision {
            build_type: BuildType::Oci,
            reason: format!("{} strategy only produces container images", strategy),
            forced,
        };
    }

    match requested {
        Some(build_type) => BuildTypeDecision {
            build_type: build_type.clone(),
            reason: "requested by caller".to_string(),
            forced: false,
        },
        None => BuildTypeDecision {
            build_type: BuildType::PureNix,
            reason: format!("{} strategy defaults to a pure-nix build", strategy),
            forced: false,
        },
    }
}
