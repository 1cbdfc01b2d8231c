//! Schema, identifier and catalog reference handlers

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sonar_deposit_common::{
    deposit::Step,
    errors::Result,
    identifiers,
    import::SearchType,
    schema::{files_schema, step_schema},
};
use validator::Validate;

use super::{record_type, validated};
use crate::AppState;

/// Section name selecting the file item schema
const FILES_SECTION: &str = "_files";

#[derive(Debug, Deserialize, Validate)]
pub struct IdentifierRequest {
    #[serde(rename = "type")]
    #[validate(length(min = 1))]
    pub identifier_type: String,
    pub value: String,
}

#[derive(Serialize)]
pub struct IdentifierResponse {
    pub valid: bool,
}

#[derive(Serialize)]
pub struct SearchTypeOption {
    pub value: SearchType,
    pub label: &'static str,
}

/// Sub-schema of a step or of the file items
pub async fn schema(
    State(state): State<AppState>,
    Path((record_type_segment, section)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let record_type = record_type(&record_type_segment)?;
    let schema = state.backend.get_json_schema(record_type).await?;

    let section = if section == FILES_SECTION {
        files_schema(&schema)?
    } else {
        let step: Step = section.parse()?;
        step_schema(&schema, step)?
    };
    Ok(Json(section.clone()))
}

/// Check an identifier value against the format of its type
pub async fn validate_identifier(
    Json(request): Json<IdentifierRequest>,
) -> Result<Json<IdentifierResponse>> {
    let request = validated(request)?;
    Ok(Json(IdentifierResponse {
        valid: identifiers::validate(&request.value, &request.identifier_type),
    }))
}

/// Search types offered by the catalog import
pub async fn swisscovery_types() -> Json<Vec<SearchTypeOption>> {
    Json(
        SearchType::ALL
            .iter()
            .map(|search_type| SearchTypeOption {
                value: *search_type,
                label: search_type.label(),
            })
            .collect(),
    )
}
