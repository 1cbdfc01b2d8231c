//! swisscovery catalog lookup

use super::ImportResult;
use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use validator::Validate;

/// Records are always requested in the deposit format
pub const RESPONSE_FORMAT: &str = "deposit";

/// Field searched in the catalog
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    #[default]
    AllForUi,
    DigitalObjectIdentifier,
    MmsId,
    Isbn,
    Issn,
}

impl SearchType {
    pub const ALL: [SearchType; 5] = [
        SearchType::AllForUi,
        SearchType::DigitalObjectIdentifier,
        SearchType::MmsId,
        SearchType::Isbn,
        SearchType::Issn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SearchType::AllForUi => "all_for_ui",
            SearchType::DigitalObjectIdentifier => "digital_object_identifier",
            SearchType::MmsId => "mms_id",
            SearchType::Isbn => "isbn",
            SearchType::Issn => "issn",
        }
    }

    /// Display name shown in search type pickers
    pub fn label(&self) -> &'static str {
        match self {
            SearchType::AllForUi => "Everywhere",
            SearchType::DigitalObjectIdentifier => "DOI",
            SearchType::MmsId => "ID swisscovery (MARC 001)",
            SearchType::Isbn => "ISBN",
            SearchType::Issn => "ISSN",
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A catalog search
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct SwisscoveryQuery {
    #[serde(rename = "type", default)]
    pub search_type: SearchType,

    #[validate(length(min = 1, max = 1000))]
    #[serde(default)]
    pub query: String,
}

impl SwisscoveryQuery {
    pub fn new(search_type: SearchType, query: impl Into<String>) -> Self {
        Self {
            search_type,
            query: query.into(),
        }
    }

    /// A blank query means there is nothing to search
    pub fn is_blank(&self) -> bool {
        self.query.trim().is_empty()
    }

    /// Query string parameters of the catalog endpoint
    pub fn params(&self) -> Result<[(&'static str, String); 3]> {
        self.validate().map_err(|e| AppError::Validation {
            message: e.to_string(),
            field: Some("query".to_string()),
        })?;
        Ok([
            ("type", self.search_type.as_str().to_string()),
            ("query", self.query.clone()),
            ("format", RESPONSE_FORMAT.to_string()),
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwisscoveryContributor {
    #[serde(default)]
    pub name: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Catalog record in the deposit format
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwisscoveryResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contributors: Option<Vec<SwisscoveryContributor>>,
}

/// Normalize a catalog record; contributors are flattened to `"A, B"`
pub fn map_swisscovery(response: SwisscoveryResponse) -> ImportResult {
    let contributors = response
        .contributors
        .filter(|list| !list.is_empty())
        .map(|list| {
            let names: Vec<&str> = list.iter().map(|c| c.name.as_str()).collect();
            Value::String(names.join(", "))
        });

    ImportResult {
        metadata: response.metadata,
        contributors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_contributors_joined() {
        let response: SwisscoveryResponse = serde_json::from_value(json!({
            "metadata": {"title": "Alps"},
            "contributors": [
                {"name": "Doe, J.", "role": "cre"},
                {"name": "Roe, R."}
            ]
        }))
        .unwrap();

        let import = map_swisscovery(response);
        assert_eq!(import.contributors, Some(json!("Doe, J., Roe, R.")));
        assert_eq!(import.metadata.unwrap()["title"], "Alps");
    }

    #[test]
    fn test_empty_record() {
        let import = map_swisscovery(SwisscoveryResponse::default());
        assert!(import.is_empty());
    }

    #[test]
    fn test_params() {
        let query = SwisscoveryQuery::new(SearchType::DigitalObjectIdentifier, "10.1000/xyz");
        let params = query.params().unwrap();
        assert_eq!(params[0], ("type", "digital_object_identifier".to_string()));
        assert_eq!(params[2], ("format", "deposit".to_string()));
    }

    #[test]
    fn test_empty_query_rejected() {
        let query = SwisscoveryQuery::new(SearchType::Isbn, "");
        assert!(query.is_blank());
        assert!(matches!(query.params(), Err(AppError::Validation { .. })));
    }

    #[test]
    fn test_search_type_wire_names() {
        let query: SwisscoveryQuery =
            serde_json::from_value(json!({"type": "mms_id", "query": "991"})).unwrap();
        assert_eq!(query.search_type, SearchType::MmsId);
        assert_eq!(SearchType::default().to_string(), "all_for_ui");
        assert_eq!(SearchType::ALL.len(), 5);
    }
}
