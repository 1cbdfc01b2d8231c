//! File handlers for deposits and documents

use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};
use sonar_deposit_common::{
    client::{UploadFile, DOCUMENTS},
    errors::{AppError, Result},
    files::{filter_by_label, other_files as public_files, record_files, FileView, PublicFile},
    stats::{stats_query, UsageStats},
    workflow::{FileManager, UploadReport},
};
use validator::Validate;

use super::{record_type, validated};
use crate::AppState;

/// A head file with the download URL of its current version
#[derive(Serialize)]
pub struct FileItem {
    #[serde(flatten)]
    pub file: FileView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

impl From<&FileView> for FileItem {
    fn from(file: &FileView) -> Self {
        Self {
            download_url: file.head.download_url().ok(),
            file: file.clone(),
        }
    }
}

/// File list split into the main file and the additional ones
#[derive(Serialize)]
pub struct FilesResponse {
    pub main: Option<FileItem>,
    pub additional: Vec<FileItem>,
}

impl From<&FileManager> for FilesResponse {
    fn from(manager: &FileManager) -> Self {
        Self {
            main: manager.main_file().map(FileItem::from),
            additional: manager.additional_files().iter().map(FileItem::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub keys: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LabelRequest {
    #[validate(length(min = 1, max = 255))]
    pub label: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct OtherFilesParams {
    /// Label filter
    #[serde(default)]
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsParams {
    /// Comma-separated file keys to report downloads for
    #[serde(default)]
    pub keys: Option<String>,
}

async fn manager(state: &AppState, record_type_segment: &str, pid: &str) -> Result<FileManager> {
    let record_type = record_type(record_type_segment)?;
    Ok(FileManager::load(state.backend.clone(), record_type, pid)
        .await?
        .with_limits(state.config.upload.selection_limits()))
}

/// List the files of a record
pub async fn list_files(
    State(state): State<AppState>,
    Path((record_type, pid)): Path<(String, String)>,
) -> Result<Json<FilesResponse>> {
    let manager = manager(&state, &record_type, &pid).await?;
    Ok(Json(FilesResponse::from(&manager)))
}

/// Upload a batch of files sent as multipart parts
pub async fn upload_files(
    State(state): State<AppState>,
    Path((record_type, pid)): Path<(String, String)>,
    mut multipart: Multipart,
) -> Result<Json<UploadReport>> {
    let mut selected = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidFormat {
            message: e.to_string(),
        })?
    {
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(|e| AppError::InvalidFormat {
            message: e.to_string(),
        })?;

        let mut file = UploadFile::new(name, data.to_vec());
        file.content_type = content_type;
        selected.push(file);
    }

    if selected.is_empty() {
        return Err(AppError::MissingField {
            field: "files".to_string(),
        });
    }

    let mut manager = manager(&state, &record_type, &pid).await?;
    let report = manager.upload(selected).await?;
    Ok(Json(report))
}

/// Upload a new version of an existing file
pub async fn upload_version(
    State(state): State<AppState>,
    Path((record_type, pid, key)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<FilesResponse>> {
    let mut file = UploadFile::new(key.clone(), body.to_vec());
    file.content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let mut manager = manager(&state, &record_type, &pid).await?;
    manager.upload_version(&key, file).await?;
    Ok(Json(FilesResponse::from(&manager)))
}

/// Remove a file
pub async fn delete_file(
    State(state): State<AppState>,
    Path((record_type, pid, key)): Path<(String, String, String)>,
) -> Result<StatusCode> {
    let mut manager = manager(&state, &record_type, &pid).await?;
    manager.delete(&key).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Store a new file order
pub async fn reorder_files(
    State(state): State<AppState>,
    Path((record_type, pid)): Path<(String, String)>,
    Json(request): Json<ReorderRequest>,
) -> Result<Json<FilesResponse>> {
    let mut manager = manager(&state, &record_type, &pid).await?;
    manager.reorder(&request.keys).await?;
    Ok(Json(FilesResponse::from(&manager)))
}

/// Change the display label of a file
pub async fn update_label(
    State(state): State<AppState>,
    Path((record_type, pid, key)): Path<(String, String, String)>,
    Json(request): Json<LabelRequest>,
) -> Result<Json<FilesResponse>> {
    let request = validated(request)?;
    let mut manager = manager(&state, &record_type, &pid).await?;
    manager.update_label(&key, &request.label).await?;
    Ok(Json(FilesResponse::from(&manager)))
}

/// Downloadable files of a document other than the main one
pub async fn other_files(
    State(state): State<AppState>,
    Path(pid): Path<String>,
    Query(params): Query<OtherFilesParams>,
) -> Result<Json<Vec<PublicFile>>> {
    let record = state.backend.get_record(DOCUMENTS, &pid).await?;
    let files = public_files(&record_files(&record)?);
    let filter = params.q.unwrap_or_default();
    Ok(Json(
        filter_by_label(&files, &filter).into_iter().cloned().collect(),
    ))
}

/// View and download counts of a document
pub async fn stats(
    State(state): State<AppState>,
    Path(pid): Path<String>,
    Query(params): Query<StatsParams>,
) -> Result<Json<UsageStats>> {
    let record = state.backend.get_record(DOCUMENTS, &pid).await?;
    let bucket_id = record
        .get("_bucket")
        .and_then(|bucket| bucket.as_str())
        .ok_or_else(|| AppError::MissingField {
            field: "_bucket".to_string(),
        })?;

    let response = state.backend.post_stats(&stats_query(&pid, bucket_id)).await?;
    let stats = UsageStats::from_response(response)?;

    let stats = match params.keys.as_deref() {
        Some(keys) => {
            let keys: Vec<&str> = keys
                .split(',')
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .collect();
            stats.retain_keys(&keys)
        }
        None => stats,
    };
    Ok(Json(stats))
}
