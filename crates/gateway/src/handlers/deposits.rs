//! Deposit editing handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sonar_deposit_common::{
    deposit::{Deposit, Step},
    errors::Result,
    import::{EditorModel, SwisscoveryQuery},
    workflow::{DepositEditor, SaveOutcome},
};

use crate::AppState;

/// Deposit with its navigation state
#[derive(Serialize)]
pub struct DepositResponse {
    pub deposit: Deposit,
    /// Furthest step the user may navigate to
    pub max_step: String,
    pub steps: Vec<Step>,
}

/// Form model of one step
#[derive(Serialize)]
pub struct StepResponse {
    pub step: Step,
    pub model: EditorModel,
    pub next_step: Option<Step>,
    pub can_submit: bool,
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    /// Step the user submits from
    pub step: Step,
}

/// swisscovery search, with the editor model as the user left it
#[derive(Debug, Deserialize)]
pub struct SwisscoveryImportRequest {
    #[serde(flatten)]
    pub query: SwisscoveryQuery,
    #[serde(default)]
    pub model: Option<EditorModel>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PdfImportRequest {
    #[serde(default)]
    pub model: Option<EditorModel>,
}

/// Result of a metadata import; nothing is stored until the step is saved
#[derive(Serialize)]
pub struct ImportResponse {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<EditorModel>,
}

impl From<Option<EditorModel>> for ImportResponse {
    fn from(model: Option<EditorModel>) -> Self {
        Self {
            found: model.is_some(),
            model,
        }
    }
}

fn deposit_response(editor: &DepositEditor) -> DepositResponse {
    DepositResponse {
        deposit: editor.deposit().clone(),
        max_step: editor.max_step().to_string(),
        steps: editor.steps().steps().to_vec(),
    }
}

/// Create an empty deposit
pub async fn create_deposit(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<Deposit>)> {
    let deposit = state.backend.create_deposit().await?;
    tracing::info!(pid = %deposit.pid, "Deposit created");
    Ok((StatusCode::CREATED, Json(deposit)))
}

/// Get a deposit
pub async fn get_deposit(
    State(state): State<AppState>,
    Path(pid): Path<String>,
) -> Result<Json<DepositResponse>> {
    let editor = DepositEditor::load(state.backend.clone(), &pid).await?;
    Ok(Json(deposit_response(&editor)))
}

/// Get the form model of a step
pub async fn get_step(
    State(state): State<AppState>,
    Path((pid, step)): Path<(String, String)>,
) -> Result<Json<StepResponse>> {
    let step: Step = step.parse()?;
    let editor = DepositEditor::load(state.backend.clone(), &pid).await?;

    let next_step = if editor.steps().is_last(step) {
        None
    } else {
        Some(editor.steps().next_step(step)?)
    };

    Ok(Json(StepResponse {
        step,
        model: editor.model(step),
        next_step,
        can_submit: editor.can_submit(step),
    }))
}

/// Save the data of a step
pub async fn save_step(
    State(state): State<AppState>,
    Path((pid, step)): Path<(String, String)>,
    Json(data): Json<Value>,
) -> Result<Json<SaveOutcome>> {
    let step: Step = step.parse()?;
    let mut editor = DepositEditor::load(state.backend.clone(), &pid).await?;
    let outcome = editor.save(step, data).await?;
    Ok(Json(outcome))
}

/// Submit a deposit for validation
pub async fn publish(
    State(state): State<AppState>,
    Path(pid): Path<String>,
    Json(request): Json<PublishRequest>,
) -> Result<Json<DepositResponse>> {
    let mut editor = DepositEditor::load(state.backend.clone(), &pid).await?;
    editor.publish(request.step).await?;
    Ok(Json(deposit_response(&editor)))
}

/// Import metadata from the swisscovery catalog
pub async fn import_swisscovery(
    State(state): State<AppState>,
    Path(pid): Path<String>,
    Json(request): Json<SwisscoveryImportRequest>,
) -> Result<Json<ImportResponse>> {
    let editor = DepositEditor::load(state.backend.clone(), &pid).await?;
    let model = editor
        .import_swisscovery(&request.query, request.model)
        .await?;
    Ok(Json(model.into()))
}

/// Import metadata extracted from the main PDF file; the body is optional
pub async fn import_pdf(
    State(state): State<AppState>,
    Path(pid): Path<String>,
    request: Option<Json<PdfImportRequest>>,
) -> Result<Json<ImportResponse>> {
    let Json(request) = request.unwrap_or_default();
    let editor = DepositEditor::load(state.backend.clone(), &pid).await?;
    let model = editor.import_pdf_metadata(request.model).await?;
    Ok(Json(model.into()))
}
