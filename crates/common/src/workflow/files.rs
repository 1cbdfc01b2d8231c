//! File management of a deposit or document

use crate::client::{DepositBackend, UploadFile};
use crate::errors::{AppError, Result};
use crate::files::{
    self, enrich, filter_selection, reconcile, record_files, split_main, FileMetadata, FileView,
    NamedFile, SelectionLimits,
};
use crate::metrics;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Outcome of an upload batch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UploadReport {
    pub uploaded: Vec<String>,
    pub duplicates: Vec<String>,
    pub oversized: Vec<String>,
    pub over_limit: Vec<String>,
}

/// Reconciled file list of one record, kept in sync with the backend
pub struct FileManager {
    backend: Arc<dyn DepositBackend>,
    record_type: String,
    pid: String,
    limits: SelectionLimits,
    files: Vec<FileView>,
}

impl FileManager {
    /// Load the current file list of a record
    pub async fn load(backend: Arc<dyn DepositBackend>, record_type: &str, pid: &str) -> Result<Self> {
        let mut manager = Self {
            backend,
            record_type: record_type.to_string(),
            pid: pid.to_string(),
            limits: SelectionLimits::default(),
            files: Vec::new(),
        };
        manager.reload().await?;
        Ok(manager)
    }

    pub fn with_limits(mut self, limits: SelectionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn files(&self) -> &[FileView] {
        &self.files
    }

    pub fn main_file(&self) -> Option<&FileView> {
        split_main(&self.files).0
    }

    pub fn additional_files(&self) -> &[FileView] {
        split_main(&self.files).1
    }

    fn find(&self, key: &str) -> Option<&FileView> {
        self.files.iter().find(|f| f.key() == key)
    }

    async fn fetch(&self) -> Result<Vec<FileView>> {
        let (entries, record) = futures::try_join!(
            self.backend.list_files(&self.record_type, &self.pid),
            self.backend.get_record(&self.record_type, &self.pid),
        )?;
        let views = reconcile(enrich(entries, &record_files(&record)?));
        metrics::record_reconciliation(views.len());
        Ok(views)
    }

    /// Replace the file list with the backend state; kept unchanged on error
    pub async fn reload(&mut self) -> Result<()> {
        self.files = self.fetch().await?;
        Ok(())
    }

    /// Upload a selection one file at a time.
    ///
    /// Duplicate names, oversized files and files beyond the record capacity
    /// are reported and skipped. The batch stops at the first failed upload;
    /// files uploaded before it stay on the record.
    pub async fn upload(&mut self, selected: Vec<UploadFile>) -> Result<UploadReport> {
        let existing: Vec<&str> = self.files.iter().map(FileView::key).collect();
        let selection = filter_selection(&existing, selected, self.limits);
        metrics::record_rejected_uploads("duplicate", selection.duplicates.len());
        metrics::record_rejected_uploads("too_large", selection.oversized.len());
        metrics::record_rejected_uploads("over_limit", selection.over_limit.len());

        let batch_id = Uuid::new_v4();
        tracing::info!(
            batch_id = %batch_id,
            pid = %self.pid,
            files = selection.accepted.len(),
            rejected = selection.has_rejections(),
            "Starting upload batch"
        );

        let mut uploaded = Vec::with_capacity(selection.accepted.len());
        let mut failure = None;
        for file in &selection.accepted {
            let start = Instant::now();
            let result = self
                .backend
                .upload_file(&self.record_type, &self.pid, file)
                .await;
            metrics::record_upload(start.elapsed().as_secs_f64(), file.size(), result.is_ok());
            match result {
                Ok(()) => {
                    tracing::debug!(batch_id = %batch_id, key = %file.name, "File uploaded");
                    uploaded.push(file.name.clone());
                }
                Err(e) => {
                    tracing::error!(batch_id = %batch_id, key = %file.name, error = %e, "Upload failed");
                    failure = Some(e);
                    break;
                }
            }
        }

        if let Some(error) = failure {
            if !uploaded.is_empty() {
                if let Err(e) = self.reload().await {
                    tracing::warn!(batch_id = %batch_id, error = %e, "Reload after failed batch failed");
                }
            }
            return Err(error);
        }

        if !uploaded.is_empty() {
            self.reload().await?;
        }

        tracing::info!(batch_id = %batch_id, uploaded = uploaded.len(), "Upload batch complete");
        Ok(UploadReport {
            uploaded,
            duplicates: selection.duplicates,
            oversized: selection.oversized,
            over_limit: selection.over_limit,
        })
    }

    /// Upload a new version of an existing file
    pub async fn upload_version(&mut self, key: &str, mut file: UploadFile) -> Result<()> {
        if self.find(key).is_none() {
            return Err(AppError::FileNotFound { key: key.to_string() });
        }
        if file.size() > self.limits.max_file_size {
            return Err(AppError::PayloadTooLarge {
                size: file.size(),
                limit: self.limits.max_file_size,
            });
        }

        file.name = key.to_string();
        let start = Instant::now();
        let result = self
            .backend
            .upload_file(&self.record_type, &self.pid, &file)
            .await;
        metrics::record_upload(start.elapsed().as_secs_f64(), file.size(), result.is_ok());
        result?;

        tracing::info!(pid = %self.pid, key = key, "New file version uploaded");
        self.reload().await
    }

    pub async fn delete(&mut self, key: &str) -> Result<()> {
        if self.find(key).is_none() {
            return Err(AppError::FileNotFound { key: key.to_string() });
        }
        self.backend
            .delete_file(&self.record_type, &self.pid, key)
            .await?;
        tracing::info!(pid = %self.pid, key = key, "File removed");
        self.reload().await
    }

    /// Store a new display order, given as the full list of keys
    pub async fn reorder(&mut self, ordered_keys: &[String]) -> Result<()> {
        self.update_record_files(|record_files| files::reorder(record_files, ordered_keys))
            .await
    }

    pub async fn update_label(&mut self, key: &str, label: &str) -> Result<()> {
        self.update_record_files(|record_files| files::update_label(record_files, key, label))
            .await
    }

    async fn update_record_files<F>(&mut self, change: F) -> Result<()>
    where
        F: FnOnce(&mut Vec<FileMetadata>) -> Result<()> + Send,
    {
        let mut record = self
            .backend
            .get_record(&self.record_type, &self.pid)
            .await?;
        let mut record_files = record_files(&record)?;
        change(&mut record_files)?;

        let fields = record.as_object_mut().ok_or_else(|| AppError::InvalidFormat {
            message: "record is not an object".to_string(),
        })?;
        fields.insert("_files".to_string(), serde_json::to_value(&record_files)?);

        self.backend
            .update_record(&self.record_type, &self.pid, &record)
            .await?;
        self.reload().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MemoryBackend, DEPOSITS};
    use crate::deposit::{sample_deposit, DepositStatus};
    use std::time::Duration;

    fn backend() -> MemoryBackend {
        MemoryBackend::new().with_deposit(sample_deposit(Some("files"), DepositStatus::InProgress))
    }

    async fn manager(backend: &Arc<MemoryBackend>) -> FileManager {
        FileManager::load(backend.clone(), DEPOSITS, "1").await.unwrap()
    }

    fn file(name: &str, size: usize) -> UploadFile {
        UploadFile::new(name, vec![0; size])
    }

    fn keys(manager: &FileManager) -> Vec<&str> {
        manager.files().iter().map(FileView::key).collect()
    }

    #[tokio::test]
    async fn test_uploads_are_sequential() {
        let backend = Arc::new(backend().with_upload_delay(Duration::from_millis(20)));
        let mut manager = manager(&backend).await;

        let report = manager
            .upload(vec![file("a.pdf", 1), file("b.pdf", 1), file("c.pdf", 1)])
            .await
            .unwrap();

        assert_eq!(report.uploaded, vec!["a.pdf", "b.pdf", "c.pdf"]);
        assert_eq!(backend.uploads().await, vec!["a.pdf", "b.pdf", "c.pdf"]);
        assert_eq!(backend.max_concurrent_uploads(), 1);
        assert_eq!(keys(&manager), vec!["a.pdf", "b.pdf", "c.pdf"]);
        assert_eq!(manager.main_file().map(FileView::key), Some("a.pdf"));
        assert_eq!(manager.additional_files().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicates_and_limits_reported() {
        let backend = Arc::new(backend());
        let mut manager = manager(&backend).await.with_limits(SelectionLimits {
            max_files: 3,
            max_file_size: 10,
        });
        manager.upload(vec![file("a.pdf", 1)]).await.unwrap();

        let report = manager
            .upload(vec![
                file("a.pdf", 1),
                file("huge.zip", 11),
                file("b.pdf", 1),
                file("c.pdf", 1),
                file("d.pdf", 1),
            ])
            .await
            .unwrap();

        assert_eq!(report.duplicates, vec!["a.pdf"]);
        assert_eq!(report.oversized, vec!["huge.zip"]);
        assert_eq!(report.uploaded, vec!["b.pdf", "c.pdf"]);
        assert_eq!(report.over_limit, vec!["d.pdf"]);
        assert_eq!(manager.files().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_upload_stops_batch() {
        let backend = Arc::new(backend().fail_uploads_of("b.pdf"));
        let mut manager = manager(&backend).await;

        let err = manager
            .upload(vec![file("a.pdf", 1), file("b.pdf", 1), file("c.pdf", 1)])
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Upstream { status: 500, .. }));
        assert_eq!(backend.uploads().await, vec!["a.pdf"]);
        assert_eq!(keys(&manager), vec!["a.pdf"]);
    }

    #[tokio::test]
    async fn test_new_version() {
        let backend = Arc::new(backend());
        let mut manager = manager(&backend).await;
        manager.upload(vec![file("a.pdf", 1)]).await.unwrap();

        manager.upload_version("a.pdf", file("local-name.pdf", 2)).await.unwrap();
        assert_eq!(keys(&manager), vec!["a.pdf"]);
        assert_eq!(manager.files()[0].versions.len(), 1);

        let err = manager.upload_version("zz.pdf", file("zz.pdf", 1)).await.unwrap_err();
        assert!(matches!(err, AppError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn test_new_version_size_limit() {
        let backend = Arc::new(backend());
        let mut manager = manager(&backend).await.with_limits(SelectionLimits {
            max_files: 10,
            max_file_size: 4,
        });
        manager.upload(vec![file("a.pdf", 1)]).await.unwrap();

        let err = manager.upload_version("a.pdf", file("a.pdf", 5)).await.unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge { size: 5, limit: 4 }));
        assert!(manager.files()[0].versions.is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let backend = Arc::new(backend());
        let mut manager = manager(&backend).await;
        manager.upload(vec![file("a.pdf", 1), file("b.pdf", 1)]).await.unwrap();

        tokio_test::assert_ok!(manager.delete("a.pdf").await);
        assert_eq!(keys(&manager), vec!["b.pdf"]);
        tokio_test::assert_err!(manager.delete("a.pdf").await);
    }

    #[tokio::test]
    async fn test_reorder_and_label() {
        let backend = Arc::new(backend());
        let mut manager = manager(&backend).await;
        manager
            .upload(vec![file("a.pdf", 1), file("b.pdf", 1), file("c.pdf", 1)])
            .await
            .unwrap();

        manager
            .reorder(&["c.pdf".to_string(), "a.pdf".to_string(), "b.pdf".to_string()])
            .await
            .unwrap();
        assert_eq!(keys(&manager), vec!["c.pdf", "a.pdf", "b.pdf"]);

        manager.update_label("a.pdf", "  Appendix ").await.unwrap();
        let record = backend.get_record(DEPOSITS, "1").await.unwrap();
        let labelled = record["_files"]
            .as_array()
            .unwrap()
            .iter()
            .find(|f| f["key"] == "a.pdf")
            .unwrap();
        assert_eq!(labelled["label"], "Appendix");
    }

    #[tokio::test]
    async fn test_failed_reorder_keeps_state() {
        let backend = Arc::new(backend());
        let mut manager = manager(&backend).await;
        manager.upload(vec![file("a.pdf", 1), file("b.pdf", 1)]).await.unwrap();

        let err = manager
            .reorder(&["b.pdf".to_string(), "missing".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::FileNotFound { .. }));
        assert_eq!(keys(&manager), vec!["a.pdf", "b.pdf"]);
    }
}
