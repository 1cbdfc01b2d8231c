//! SONAR REST backend abstraction
//!
//! Provides a unified interface over the deposit API:
//! - HTTP client for a running SONAR instance
//! - In-memory backend for tests and local development

mod http;
mod memory;

pub use http::HttpBackend;
pub use memory::MemoryBackend;

use crate::deposit::Deposit;
use crate::errors::Result;
use crate::files::{FileEntry, NamedFile};
use crate::import::{SwisscoveryQuery, SwisscoveryResponse};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Record type of deposits
pub const DEPOSITS: &str = "deposits";

/// Record type of published documents
pub const DOCUMENTS: &str = "documents";

/// A file to send to the backend
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            data,
        }
    }
}

impl NamedFile for UploadFile {
    fn file_name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Operations of the SONAR REST API used by the deposit workflow
#[async_trait]
pub trait DepositBackend: Send + Sync {
    /// Fetch a deposit by pid
    async fn get_deposit(&self, pid: &str) -> Result<Deposit>;

    /// Create an empty deposit
    async fn create_deposit(&self) -> Result<Deposit>;

    /// Persist a deposit, returning the stored version
    async fn update_deposit(&self, deposit: &Deposit) -> Result<Deposit>;

    /// Submit a deposit for validation
    async fn publish_deposit(&self, pid: &str) -> Result<()>;

    /// All versions of all files of a record
    async fn list_files(&self, record_type: &str, pid: &str) -> Result<Vec<FileEntry>>;

    /// Upload a file; an existing key gets a new version
    async fn upload_file(&self, record_type: &str, pid: &str, file: &UploadFile) -> Result<()>;

    async fn delete_file(&self, record_type: &str, pid: &str, key: &str) -> Result<()>;

    /// Metadata extracted from the main PDF of a deposit; `false` when nothing was found
    async fn extract_pdf_metadata(&self, pid: &str) -> Result<Value>;

    /// Look a record up in swisscovery; `None` when the catalog has no answer
    async fn search_swisscovery(&self, query: &SwisscoveryQuery) -> Result<Option<SwisscoveryResponse>>;

    async fn get_json_schema(&self, record_type: &str) -> Result<Value>;

    /// Raw record metadata
    async fn get_record(&self, record_type: &str, pid: &str) -> Result<Value>;

    async fn update_record(&self, record_type: &str, pid: &str, record: &Value) -> Result<Value>;

    /// Run a usage statistics query
    async fn post_stats(&self, query: &Value) -> Result<Value>;

    /// Backend name for logs
    fn name(&self) -> &str;
}

/// Create a backend based on configuration
pub fn create_backend(config: &crate::config::BackendConfig) -> Result<Arc<dyn DepositBackend>> {
    if config.base_url == "memory" {
        tracing::warn!("Using in-memory backend, data is not persisted");
        return Ok(Arc::new(MemoryBackend::new()));
    }
    Ok(Arc::new(HttpBackend::from_config(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;

    #[test]
    fn test_upload_file_is_named() {
        let file = UploadFile::new("thesis.pdf", vec![0; 42]);
        assert_eq!(file.file_name(), "thesis.pdf");
        assert_eq!(file.size(), 42);
    }

    #[test]
    fn test_create_backend() {
        let memory = BackendConfig {
            base_url: "memory".into(),
            ..BackendConfig::default()
        };
        assert_eq!(create_backend(&memory).unwrap().name(), "memory");

        let http = create_backend(&BackendConfig::default()).unwrap();
        assert_eq!(http.name(), "http");

        let invalid = BackendConfig {
            base_url: "not a url".into(),
            ..BackendConfig::default()
        };
        assert!(create_backend(&invalid).is_err());
    }
}
