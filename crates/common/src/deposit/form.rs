//! Step data validation before save
//!
//! Field errors are collected for the whole step and reported together; a
//! single invalid field aborts the save.

use super::Step;
use crate::errors::{AppError, Result};
use crate::identifiers;
use serde_json::Value;

/// Names of the fields in error for one save attempt
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FormErrors {
    fields: Vec<String>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: impl Into<String>) {
        let field = field.into();
        if !self.fields.contains(&field) {
            self.fields.push(field);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn into_result(self) -> Result<()> {
        if self.fields.is_empty() {
            Ok(())
        } else {
            Err(AppError::InvalidFields {
                fields: self.fields,
            })
        }
    }
}

/// Check the data submitted for a step
pub fn validate_step_data(step: Step, data: &Value) -> Result<()> {
    let mut errors = FormErrors::new();

    match (step, data) {
        (Step::Metadata | Step::Diffusion, Value::Object(fields)) => {
            if let Some(Value::Array(identifiers)) = fields.get("identifiedBy") {
                if identifiers.iter().any(|entry| !identifier_is_valid(entry)) {
                    errors.add("identifiedBy");
                }
            }
        }
        (Step::Metadata | Step::Diffusion, _) => errors.add(step.as_str()),
        (_, Value::Object(_) | Value::Array(_)) => {}
        _ => errors.add(step.as_str()),
    }

    errors.into_result()
}

fn identifier_is_valid(entry: &Value) -> bool {
    let kind = entry.get("type").and_then(Value::as_str);
    let value = entry.get("value").and_then(Value::as_str);
    match (kind, value) {
        (Some(kind), Some(value)) => identifiers::validate(value, kind),
        // a value without type has nothing to be checked against
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_metadata() {
        let data = json!({
            "title": "A thesis",
            "identifiedBy": [
                {"type": "bf:Doi", "value": "10.1000/182"},
                {"type": "bf:Local", "value": "R003"}
            ]
        });
        assert!(validate_step_data(Step::Metadata, &data).is_ok());
    }

    #[test]
    fn test_invalid_identifier_reported_once() {
        let data = json!({
            "identifiedBy": [
                {"type": "bf:Doi", "value": "123"},
                {"type": "bf:Isbn", "value": "12"}
            ]
        });
        let err = validate_step_data(Step::Metadata, &data).unwrap_err();
        match err {
            AppError::InvalidFields { fields } => assert_eq!(fields, vec!["identifiedBy"]),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_shape_errors() {
        assert!(validate_step_data(Step::Metadata, &json!("title")).is_err());
        assert!(validate_step_data(Step::Contributors, &json!([{"name": "Doe, J."}])).is_ok());
        assert!(validate_step_data(Step::Projects, &json!(null)).is_err());
    }

    #[test]
    fn test_form_errors_deduplicate() {
        let mut errors = FormErrors::new();
        errors.add("title");
        errors.add("title");
        errors.add("language");
        assert_eq!(errors.fields(), ["title", "language"]);
        assert!(errors.into_result().is_err());
        assert!(FormErrors::new().into_result().is_ok());
    }
}
