//! JSON schema sections used by the editor

use crate::deposit::Step;
use crate::errors::{AppError, Result};
use serde_json::Value;

/// Sub-schema of the section edited in `step`
pub fn step_schema(schema: &Value, step: Step) -> Result<&Value> {
    schema
        .pointer(&format!("/properties/{}", step.as_str()))
        .ok_or_else(|| AppError::NotFound {
            resource_type: "schema section".to_string(),
            id: step.to_string(),
        })
}

/// Item schema of the record files (`properties._files.items`)
pub fn files_schema(schema: &Value) -> Result<&Value> {
    schema
        .pointer("/properties/_files/items")
        .ok_or_else(|| AppError::NotFound {
            resource_type: "schema section".to_string(),
            id: "_files".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "properties": {
                "metadata": {"type": "object", "properties": {"title": {"type": "string"}}},
                "_files": {"type": "array", "items": {"properties": {"label": {"type": "string"}}}}
            }
        })
    }

    #[test]
    fn test_step_schema() {
        let schema = schema();
        assert_eq!(step_schema(&schema, Step::Metadata).unwrap()["type"], "object");
        assert!(matches!(
            step_schema(&schema, Step::Projects),
            Err(AppError::NotFound { .. })
        ));
    }

    #[test]
    fn test_files_schema() {
        let schema = schema();
        assert!(files_schema(&schema).unwrap()["properties"]["label"].is_object());
        assert!(files_schema(&json!({})).is_err());
    }
}
