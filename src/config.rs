//! Configuration for inference submission and result summaries
//!
//! Both configs deserialize from JSON with every field optional, so an
//! empty object (`{}`) yields the defaults.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Entry point executed by the submitted scoring job.
pub const DEFAULT_SCRIPT: &str = "infer.py";

/// Symbolic name the test dataset is bound to.
pub const DEFAULT_INPUT_NAME: &str = "data";

/// Settings for [`crate::submit::InferenceSubmitter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Scoring script inside the source directory
    pub script: String,
    /// Name passed to `Dataset::as_named_input`
    pub input_name: String,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            script: DEFAULT_SCRIPT.to_string(),
            input_name: DEFAULT_INPUT_NAME.to_string(),
        }
    }
}

impl InferenceConfig {
    /// Parse a config from a JSON document.
    ///
    /// # Errors
    /// Returns error if the document is not valid JSON for this config
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a config from a JSON file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}

/// How the summary decides the global sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalPolicy {
    /// The last qualifying child that declares a goal decides
    #[default]
    LastDeclared,
    /// All declared goals must agree
    Strict,
}

/// Settings for [`crate::summary::ResultSummarizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Goal resolution policy
    pub goal_policy: GoalPolicy,
}

impl SummaryConfig {
    /// Parse a config from a JSON document.
    ///
    /// # Errors
    /// Returns error if the document is not valid JSON for this config
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inference_config_defaults() {
        let config = InferenceConfig::from_json_str("{}").unwrap();
        assert_eq!(config, InferenceConfig::default());
        assert_eq!(config.script, "infer.py");
        assert_eq!(config.input_name, "data");
    }

    #[test]
    fn test_inference_config_override() {
        let config = InferenceConfig::from_json_str(r#"{"script": "score.py"}"#).unwrap();
        assert_eq!(config.script, "score.py");
        assert_eq!(config.input_name, "data");
    }

    #[test]
    fn test_summary_config_policy() {
        let config = SummaryConfig::from_json_str(r#"{"goal_policy": "strict"}"#).unwrap();
        assert_eq!(config.goal_policy, GoalPolicy::Strict);
        assert_eq!(
            SummaryConfig::from_json_str("{}").unwrap().goal_policy,
            GoalPolicy::LastDeclared
        );
    }

    #[test]
    fn test_summary_config_rejects_unknown_policy() {
        assert!(SummaryConfig::from_json_str(r#"{"goal_policy": "first"}"#).is_err());
    }

    #[test]
    fn test_inference_config_missing_file() {
        let result = InferenceConfig::from_json_file("/nonexistent/inference.json");
        assert!(matches!(result, Err(crate::Error::Io(_))));
    }
}
