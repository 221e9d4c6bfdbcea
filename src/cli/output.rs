//! Output formatting for detection results, builds and failures
//!
//! JSON and YAML serialize the same structures the library returns. The human
//! format is a compact tree meant for terminals.

use crate::detection::{DetectionResult, StrategyRecommendation};
use crate::error::BuildErrorResponse;
use crate::executor::Execution;
use anyhow::{Context, Result};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
    Human,
}

/// Serializable summary of one finished build
#[derive(Debug, Clone, Serialize)]
pub struct BuildSummary<'a> {
    pub job_id: String,
    pub strategy: &'a str,
    #[serde(flatten)]
    pub result: &'a crate::executor::BuildResult,
    pub recipe_generated: bool,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    fn serialize<T: Serialize>(&self, value: &T, what: &str) -> Result<String> {
        match self.format {
            OutputFormat::Yaml => serde_yaml::to_string(value)
                .with_context(|| format!("Failed to serialize {} to YAML", what)),
            _ => serde_json::to_string_pretty(value)
                .with_context(|| format!("Failed to serialize {} to JSON", what)),
        }
    }

    pub fn format_detection(
        &self,
        result: &DetectionResult,
        recommendation: Option<&StrategyRecommendation>,
    ) -> Result<String> {
        match self.format {
            OutputFormat::Human => Ok(human_detection(result, recommendation)),
            _ => match recommendation {
                Some(recommendation) => self.serialize(
                    &serde_json::json!({
                        "detection": result,
                        "recommendation": recommendation,
                    }),
                    "detection result",
                ),
                None => self.serialize(result, "detection result"),
            },
        }
    }

    pub fn format_detections(&self, results: &[DetectionResult]) -> Result<String> {
        match self.format {
            OutputFormat::Human => {
                if results.is_empty() {
                    return Ok("No ecosystem detected\n".to_string());
                }
                Ok(results
                    .iter()
                    .map(|r| human_detection(r, None))
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
            _ => self.serialize(&results, "detection results"),
        }
    }

    pub fn format_build(&self, job_id: &str, strategy: &str, execution: &Execution) -> Result<String> {
        let summary = BuildSummary {
            job_id: job_id.to_string(),
            strategy,
            result: &execution.result,
            recipe_generated: execution.prepared.freshly_generated,
        };
        match self.format {
            OutputFormat::Human => Ok(human_build(&summary)),
            _ => self.serialize(&summary, "build result"),
        }
    }

    pub fn format_error(&self, response: &BuildErrorResponse) -> Result<String> {
        match self.format {
            OutputFormat::Human => Ok(human_error(response)),
            _ => self.serialize(response, "error response"),
        }
    }
}

fn human_detection(result: &DetectionResult, recommendation: Option<&StrategyRecommendation>) -> String {
    let mut output = String::new();

    output.push_str(&format!("Strategy:    {}\n", result.strategy));
    output.push_str(&format!("Framework:   {}\n", result.framework));
    if !result.version.is_empty() {
        output.push_str(&format!("Version:     {}\n", result.version));
    }
    output.push_str(&format!("Confidence:  {:.0}%\n", result.confidence * 100.0));
    output.push_str(&format!("Build type:  {}\n", result.recommended_build_type));

    if !result.entry_points.is_empty() {
        output.push_str(&format!("Entry:       {}\n", result.entry_points.join(", ")));
    }

    if !result.suggested_config.is_empty() {
        output.push_str("Hints:\n");
        let hints: Vec<_> = result.suggested_config.iter().collect();
        for (i, (key, value)) in hints.iter().enumerate() {
            let connector = if i == hints.len() - 1 { "\u{2514}" } else { "\u{251C}" };
            output.push_str(&format!("{}\u{2500} {}: {}\n", connector, key, value));
        }
    }

    for warning in &result.warnings {
        output.push_str(&format!("\u{26A0} {}\n", warning));
    }

    if let Some(recommendation) = recommendation {
        output.push_str(&format!(
            "\nRecommended: {} ({})\n",
            recommendation.strategy, recommendation.reason
        ));
        if !recommendation.alternatives.is_empty() {
            let alternatives: Vec<&str> =
                recommendation.alternatives.iter().map(|s| s.as_str()).collect();
            output.push_str(&format!("Alternatives: {}\n", alternatives.join(", ")));
        }
    }

    output
}

fn human_build(summary: &BuildSummary<'_>) -> String {
    let mut output = String::from("\u{2713} Build succeeded\n");
    output.push_str(&format!("Job:        {}\n", summary.job_id));
    output.push_str(&format!("Strategy:   {}\n", summary.strategy));
    output.push_str(&format!("Build type: {}\n", summary.result.build_type));
    if let Some(store_path) = &summary.result.store_path {
        output.push_str(&format!("Store path: {}\n", store_path));
    }
    if let Some(image_tag) = &summary.result.image_tag {
        output.push_str(&format!("Image:      {}\n", image_tag));
    }
    if summary.recipe_generated {
        output.push_str("Recipe:     generated\n");
    }
    output
}

fn human_error(response: &BuildErrorResponse) -> String {
    let mut output = format!("\u{2717} {} [{}]\n", response.error, response.code);

    if !response.detected_issues.is_empty() {
        output.push_str("\nDetected issues:\n");
        for issue in &response.detected_issues {
            output.push_str(&format!("  - {}\n", issue));
        }
    }
    if !response.suggestions.is_empty() {
        output.push_str("\nSuggestions:\n");
        for suggestion in &response.suggestions {
            output.push_str(&format!("  - {}\n", suggestion));
        }
    }
    if !response.next_steps.is_empty() {
        output.push_str("\nNext steps:\n");
        for (i, step) in response.next_steps.iter().enumerate() {
            output.push_str(&format!("  {}. {}\n", i + 1, step));
        }
    }
    if response.can_retry_as_other_backend {
        output.push_str("\nThis job can be retried with the other build type.\n");
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{BuildType, HintKey, Strategy};
    use crate::error::BuildError;
    use crate::executor::{BuildResult, PreparedRecipe};

    fn detection() -> DetectionResult {
        let mut result = DetectionResult::new(Strategy::AutoGo, 0.95);
        result.version = "1.22".to_string();
        result.entry_points = vec![".".to_string()];
        result.suggested_config.set_bool(HintKey::CgoEnabled, false);
        result.suggested_config.set_text(HintKey::GoVersion, "1.22");
        result
    }

    fn execution() -> Execution {
        Execution {
            prepared: PreparedRecipe {
                text: "{ }".to_string(),
                freshly_generated: true,
                detection: None,
            },
            result: BuildResult {
                artifact: "/nix/store/abc-hello".to_string(),
                store_path: Some("/nix/store/abc-hello".to_string()),
                image_tag: None,
                build_type: BuildType::PureNix,
                logs: String::new(),
                exit_code: 0,
            },
        }
    }

    #[test]
    fn test_detection_json() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let output = formatter.format_detection(&detection(), None).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["strategy"], "auto-go");
        assert_eq!(value["version"], "1.22");
    }

    #[test]
    fn test_detection_yaml() {
        let formatter = OutputFormatter::new(OutputFormat::Yaml);
        let output = formatter.format_detection(&detection(), None).unwrap();
        assert!(output.contains("strategy: auto-go"));
    }

    #[test]
    fn test_detection_human() {
        let formatter = OutputFormatter::new(OutputFormat::Human);
        let output = formatter.format_detection(&detection(), None).unwrap();
        assert!(output.contains("Strategy:    auto-go"));
        assert!(output.contains("Confidence:  95%"));
        assert!(output.contains("go_version"));
    }

    #[test]
    fn test_build_json_flattens_result() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let output = formatter.format_build("job-1", "auto-go", &execution()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["job_id"], "job-1");
        assert_eq!(value["store_path"], "/nix/store/abc-hello");
        assert_eq!(value["recipe_generated"], true);
        assert!(value.get("image_tag").is_none());
    }

    #[test]
    fn test_build_human() {
        let formatter = OutputFormatter::new(OutputFormat::Human);
        let output = formatter.format_build("job-1", "auto-go", &execution()).unwrap();
        assert!(output.contains("Store path: /nix/store/abc-hello"));
        assert!(!output.contains("Image:"));
    }

    #[test]
    fn test_error_formats() {
        let response = BuildError::dockerfile_not_found().to_response();

        let json = OutputFormatter::new(OutputFormat::Json)
            .format_error(&response)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["code"], "DOCKERFILE_NOT_FOUND");

        let human = OutputFormatter::new(OutputFormat::Human)
            .format_error(&response)
            .unwrap();
        assert!(human.contains("[DOCKERFILE_NOT_FOUND]"));
        assert!(human.contains("Suggestions:"));
    }

    #[test]
    fn test_empty_detections_human() {
        let formatter = OutputFormatter::new(OutputFormat::Human);
        assert_eq!(formatter.format_detections(&[]).unwrap(), "No ecosystem detected\n");
    }
}
