//! Metadata import into the deposit editor
//!
//! External results (swisscovery records, metadata extracted from the main
//! PDF) are normalized into an [`ImportResult`] and merged into the editor
//! model step by step.
//!
//! Merge precedence (see [`merge_step_data`]):
//! - arrays concatenate, old entries first
//! - objects merge shallowly, new keys overwrite old ones
//! - anything else, or a shape change, replaces the old value

mod pdf;
mod swisscovery;

pub use pdf::map_pdf_extraction;
pub use swisscovery::{map_swisscovery, SearchType, SwisscoveryQuery, SwisscoveryResponse};

use crate::deposit::{Deposit, Step};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Normalized import, ready to be merged into the editor model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,

    /// Update for the contributors step
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contributors: Option<Value>,
}

impl ImportResult {
    pub fn is_empty(&self) -> bool {
        self.metadata.as_ref().map_or(true, Map::is_empty) && self.contributors.is_none()
    }
}

/// Merge step data following the import precedence rules
pub fn merge_step_data(old: Value, new: Value) -> Value {
    match (old, new) {
        (Value::Array(mut old), Value::Array(new)) => {
            old.extend(new);
            Value::Array(old)
        }
        (Value::Object(mut old), Value::Object(new)) => {
            for (key, value) in new {
                old.insert(key, value);
            }
            Value::Object(old)
        }
        (_, new) => new,
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Form model of the deposit editor, keyed by step name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EditorModel {
    steps: Map<String, Value>,
}

impl EditorModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Model for editing `step`, seeded from the data already on the deposit
    pub fn for_step(deposit: &Deposit, step: Step) -> Self {
        let mut model = Self::new();
        if let Some(data) = deposit.step_data(step) {
            model.update(step.as_str(), data);
        }
        model
    }

    pub fn get(&self, step: &str) -> Option<&Value> {
        self.steps.get(step)
    }

    /// Merge `data` into the model for `step`; blank data is ignored
    pub fn update(&mut self, step: &str, data: Value) {
        if is_blank(&data) {
            return;
        }
        let merged = match self.steps.remove(step) {
            Some(current) => merge_step_data(current, data),
            None => data,
        };
        self.steps.insert(step.to_string(), merged);
    }

    /// Merge an import: metadata into the metadata step, contributors separately
    pub fn apply_import(&mut self, import: ImportResult) {
        if let Some(metadata) = import.metadata {
            self.update(Step::Metadata.as_str(), Value::Object(metadata));
        }
        if let Some(contributors) = import.contributors {
            self.update(Step::Contributors.as_str(), contributors);
        }
    }

    /// Replace whole steps with the ones of `current`, the unsaved editor state
    pub fn overlay(&mut self, current: EditorModel) {
        for (step, data) in current.steps {
            self.steps.insert(step, data);
        }
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deposit::{sample_deposit, DepositStatus};
    use serde_json::json;

    #[test]
    fn test_objects_merge_shallow_new_wins() {
        let mut model = EditorModel::new();
        model.update("x", json!({"a": 1, "c": {"d": 1}}));
        model.update("x", json!({"b": 2, "c": {"e": 2}}));
        assert_eq!(model.get("x"), Some(&json!({"a": 1, "b": 2, "c": {"e": 2}})));
    }

    #[test]
    fn test_shallow_merge_collision() {
        let mut model = EditorModel::new();
        model.update("x", json!({"a": 1}));
        model.update("x", json!({"a": 3, "b": 2}));
        assert_eq!(model.get("x"), Some(&json!({"a": 3, "b": 2})));
    }

    #[test]
    fn test_arrays_concatenate_in_order() {
        let mut model = EditorModel::new();
        model.update("x", json!([1]));
        model.update("x", json!([2]));
        assert_eq!(model.get("x"), Some(&json!([1, 2])));
    }

    #[test]
    fn test_blank_data_ignored() {
        let mut model = EditorModel::new();
        model.update("x", json!({"a": 1}));
        model.update("x", Value::Null);
        model.update("x", json!(""));
        assert_eq!(model.get("x"), Some(&json!({"a": 1})));
    }

    #[test]
    fn test_shape_change_replaces() {
        let mut model = EditorModel::new();
        model.update("contributors", json!([{"name": "Doe, J."}]));
        model.update("contributors", json!("Doe, J., Roe, R."));
        assert_eq!(model.get("contributors"), Some(&json!("Doe, J., Roe, R.")));
    }

    #[test]
    fn test_apply_import_keeps_unrelated_fields() {
        let mut deposit = sample_deposit(Some("metadata"), DepositStatus::InProgress);
        deposit
            .set_step_data(Step::Metadata, json!({"title": "Old", "documentType": "coar:c_db06"}))
            .unwrap();
        let mut model = EditorModel::for_step(&deposit, Step::Metadata);

        let mut metadata = Map::new();
        metadata.insert("title".into(), json!("New"));
        model.apply_import(ImportResult {
            metadata: Some(metadata),
            contributors: Some(json!("Doe, J.")),
        });

        assert_eq!(
            model.get("metadata"),
            Some(&json!({"title": "New", "documentType": "coar:c_db06"}))
        );
        assert_eq!(model.get("contributors"), Some(&json!("Doe, J.")));
    }

    #[test]
    fn test_import_result_emptiness() {
        assert!(ImportResult::default().is_empty());
        assert!(ImportResult {
            metadata: Some(Map::new()),
            contributors: None
        }
        .is_empty());
        assert!(!ImportResult {
            metadata: None,
            contributors: Some(json!("X"))
        }
        .is_empty());
    }
}
