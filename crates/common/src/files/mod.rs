//! Deposit and document files
//!
//! Provides:
//! - Raw file entries as listed by the backend (one entry per version)
//! - Reconciliation into head files with their version history
//! - Upload selection filtering (duplicates, size and count limits)
//! - Record-level file metadata (labels, order, public listing)

mod reconcile;
mod record;
mod selection;

pub use reconcile::reconcile;
pub use record::{filter_by_label, other_files, reorder, update_label, PublicFile};
pub use selection::{filter_selection, NamedFile, Selection, SelectionLimits};

use crate::errors::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Maximum size of a single uploaded file, in megabytes
pub const MAX_FILE_SIZE_MB: u64 = 500;

/// Maximum number of files attached to one record
pub const MAX_FILES: usize = 500;

/// Entry type of regular files; other types (e.g. thumbnails, fulltext) are skipped
pub const FILE_TYPE: &str = "file";

/// Links exposed for a file or file version
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileLinks {
    #[serde(rename = "self", default, skip_serializing_if = "Option::is_none")]
    pub self_link: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

/// File metadata stored on the record (`_files` entries)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileMetadata {
    #[serde(default)]
    pub key: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<FileLinks>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FileMetadata {
    pub fn is_file(&self) -> bool {
        self.file_type.as_deref() == Some(FILE_TYPE)
    }
}

/// A file version as listed by `GET .../files?versions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub key: String,

    #[serde(default)]
    pub is_head: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Record-level metadata for this key, attached by [`enrich`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<FileMetadata>,

    #[serde(default)]
    pub links: FileLinks,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FileEntry {
    pub fn is_file(&self) -> bool {
        self.metadata.as_ref().is_some_and(FileMetadata::is_file)
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.metadata.as_ref().and_then(|m| m.created)
    }

    pub fn order(&self) -> Option<i64> {
        self.metadata.as_ref().and_then(|m| m.order)
    }

    /// Download URL of this exact version
    pub fn download_url(&self) -> Result<String> {
        let self_link = self.links.self_link.as_deref().ok_or_else(|| AppError::MissingField {
            field: "links.self".to_string(),
        })?;
        let url = reqwest::Url::parse(self_link).map_err(|e| AppError::InvalidFormat {
            message: format!("links.self: {}", e),
        })?;
        let version = self.version_id.as_deref().unwrap_or_default();
        Ok(format!(
            "{}/{}?download&versionId={}",
            url.path(),
            self.key,
            version
        ))
    }
}

/// A head file with its previous versions, oldest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileView {
    #[serde(flatten)]
    pub head: FileEntry,

    #[serde(default)]
    pub versions: Vec<FileEntry>,
}

impl FileView {
    pub fn key(&self) -> &str {
        &self.head.key
    }

    pub fn label(&self) -> &str {
        self.head.label.as_deref().unwrap_or(&self.head.key)
    }
}

/// Attach the record metadata of each key and resolve display labels.
///
/// The label falls back from the entry's own label to the record label and
/// finally to the key. Entries without record metadata keep `metadata: None`
/// and are ignored by [`reconcile`].
pub fn enrich(entries: Vec<FileEntry>, record_files: &[FileMetadata]) -> Vec<FileEntry> {
    entries
        .into_iter()
        .map(|mut entry| {
            entry.metadata = record_files.iter().find(|f| f.key == entry.key).cloned();
            if entry.label.is_none() {
                let label = entry
                    .metadata
                    .as_ref()
                    .and_then(|m| m.label.clone())
                    .unwrap_or_else(|| entry.key.clone());
                entry.label = Some(label);
            }
            entry
        })
        .collect()
}

/// Parse the `_files` array of a record; a record without files yields `[]`
pub fn record_files(record: &Value) -> Result<Vec<FileMetadata>> {
    match record.get("_files") {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(files) => Ok(serde_json::from_value(files.clone())?),
    }
}

/// Split reconciled files into the main file and the additional ones
pub fn split_main(files: &[FileView]) -> (Option<&FileView>, &[FileView]) {
    match files.split_first() {
        Some((main, rest)) => (Some(main), rest),
        None => (None, &[]),
    }
}

#[cfg(test)]
pub(crate) fn entry(key: &str, is_head: bool, order: Option<i64>, created: Option<i64>) -> FileEntry {
    FileEntry {
        key: key.to_string(),
        is_head,
        version_id: Some(format!("{key}-{}", created.unwrap_or_default())),
        label: None,
        metadata: Some(FileMetadata {
            key: key.to_string(),
            file_type: Some(FILE_TYPE.to_string()),
            created: created.and_then(|secs| DateTime::from_timestamp(secs, 0)),
            order,
            ..FileMetadata::default()
        }),
        links: FileLinks::default(),
        extra: Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_backend_entry() {
        let entry: FileEntry = serde_json::from_value(json!({
            "key": "thesis.pdf",
            "is_head": true,
            "version_id": "7d1c",
            "size": 1024,
            "links": {"self": "https://sonar.ch/api/files/b1/thesis.pdf"}
        }))
        .unwrap();

        assert!(entry.is_head);
        assert!(!entry.is_file());
        assert_eq!(entry.extra["size"], 1024);
    }

    #[test]
    fn test_enrich_resolves_labels() {
        let record_files = vec![FileMetadata {
            key: "a.pdf".into(),
            file_type: Some("file".into()),
            label: Some("Main text".into()),
            ..FileMetadata::default()
        }];
        let mut with_label = entry("a.pdf", true, None, None);
        with_label.label = Some("Own label".into());
        let entries = vec![
            entry("a.pdf", true, None, None),
            with_label,
            entry("b.pdf", true, None, None),
        ];

        let enriched = enrich(entries, &record_files);
        assert_eq!(enriched[0].label.as_deref(), Some("Main text"));
        assert_eq!(enriched[1].label.as_deref(), Some("Own label"));
        assert_eq!(enriched[2].label.as_deref(), Some("b.pdf"));
        assert!(enriched[2].metadata.is_none());
    }

    #[test]
    fn test_download_url() {
        let mut file = entry("thesis.pdf", true, Some(1), None);
        file.version_id = Some("v42".into());
        file.links.self_link = Some("https://sonar.ch/api/documents/7/files?versions".into());

        assert_eq!(
            file.download_url().unwrap(),
            "/api/documents/7/files/thesis.pdf?download&versionId=v42"
        );
    }

    #[test]
    fn test_download_url_requires_self_link() {
        let file = entry("thesis.pdf", true, Some(1), None);
        assert!(matches!(file.download_url(), Err(AppError::MissingField { .. })));
    }

    #[test]
    fn test_record_files() {
        let record = json!({
            "pid": "1",
            "_files": [{"key": "a.pdf", "type": "file", "order": 1, "size": 10}]
        });
        let files = record_files(&record).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].extra["size"], 10);

        assert!(record_files(&json!({"pid": "2"})).unwrap().is_empty());
        assert!(record_files(&json!({"_files": "broken"})).is_err());
    }

    #[test]
    fn test_split_main() {
        let files = reconcile(vec![
            entry("a", true, Some(1), Some(1)),
            entry("b", true, Some(2), Some(1)),
        ]);
        let (main, rest) = split_main(&files);
        assert_eq!(main.map(FileView::key), Some("a"));
        assert_eq!(rest.len(), 1);

        let (main, rest) = split_main(&[]);
        assert!(main.is_none());
        assert!(rest.is_empty());
    }
}
