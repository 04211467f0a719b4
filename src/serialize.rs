//! [`ValidationResult`] → YAML / JSON reports.

use crate::error::SerializeError;
use crate::finding::ValidationResult;

/// Render a validation result as YAML.
///
/// Findings keep the order they were reported in.
pub fn to_yaml(result: &ValidationResult) -> Result<String, SerializeError> {
    // Go through serde_json::Value so field order matches the JSON report
    let value = serde_json::to_value(result).map_err(|e| SerializeError {
        message: format!("failed to convert result to JSON value: {}", e),
    })?;

    serde_saphyr::to_string(&value).map_err(|e| SerializeError {
        message: format!("failed to serialize to YAML: {}", e),
    })
}

/// Render a validation result as pretty-printed JSON.
pub fn to_json(result: &ValidationResult) -> Result<String, SerializeError> {
    serde_json::to_string_pretty(result).map_err(|e| SerializeError {
        message: format!("failed to serialize to JSON: {}", e),
    })
}
