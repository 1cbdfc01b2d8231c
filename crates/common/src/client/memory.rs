//! In-memory backend for tests and local development

use super::{DepositBackend, UploadFile, DEPOSITS};
use crate::deposit::{Deposit, DepositStatus};
use crate::errors::{AppError, Result};
use crate::files::{FileEntry, FileLinks, FILE_TYPE};
use crate::import::{SwisscoveryQuery, SwisscoveryResponse};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

type RecordId = (String, String);

fn record_id(record_type: &str, pid: &str) -> RecordId {
    (record_type.to_string(), pid.to_string())
}

#[derive(Default)]
struct State {
    records: HashMap<RecordId, Value>,
    files: HashMap<RecordId, Vec<FileEntry>>,
    schemas: HashMap<String, Value>,
    pdf_metadata: HashMap<String, Value>,
    swisscovery: HashMap<String, SwisscoveryResponse>,
    stats: Option<Value>,
    failing_uploads: HashSet<String>,
    uploads: Vec<String>,
    published: Vec<String>,
    next_pid: u64,
}

/// Backend keeping every record in memory
#[derive(Default)]
pub struct MemoryBackend {
    state: RwLock<State>,
    upload_delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a deposit
    pub fn with_deposit(mut self, deposit: Deposit) -> Self {
        let state = self.state.get_mut();
        if let Ok(value) = serde_json::to_value(&deposit) {
            state.records.insert(record_id(DEPOSITS, &deposit.pid), value);
        }
        self
    }

    /// Seed any record (documents, ...)
    pub fn with_record(mut self, record_type: &str, pid: &str, record: Value) -> Self {
        self.state.get_mut().records.insert(record_id(record_type, pid), record);
        self
    }

    pub fn with_schema(mut self, record_type: &str, schema: Value) -> Self {
        self.state.get_mut().schemas.insert(record_type.to_string(), schema);
        self
    }

    /// Extraction result returned for a deposit
    pub fn with_pdf_metadata(mut self, pid: &str, result: Value) -> Self {
        self.state.get_mut().pdf_metadata.insert(pid.to_string(), result);
        self
    }

    /// Catalog record returned for a query text
    pub fn with_swisscovery(mut self, query: &str, response: SwisscoveryResponse) -> Self {
        self.state.get_mut().swisscovery.insert(query.to_string(), response);
        self
    }

    pub fn with_stats(mut self, response: Value) -> Self {
        self.state.get_mut().stats = Some(response);
        self
    }

    /// Make uploads of `name` fail with a server error
    pub fn fail_uploads_of(mut self, name: &str) -> Self {
        self.state.get_mut().failing_uploads.insert(name.to_string());
        self
    }

    /// Delay each upload, to observe overlapping requests
    pub fn with_upload_delay(mut self, delay: Duration) -> Self {
        self.upload_delay = delay;
        self
    }

    /// Names of the uploaded files, in completion order
    pub async fn uploads(&self) -> Vec<String> {
        self.state.read().await.uploads.clone()
    }

    pub async fn published(&self) -> Vec<String> {
        self.state.read().await.published.clone()
    }

    /// Highest number of uploads observed in flight at the same time
    pub fn max_concurrent_uploads(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn store_upload(&self, record_type: &str, pid: &str, file: &UploadFile) -> Result<()> {
        let mut state = self.state.write().await;
        let id = record_id(record_type, pid);

        if state.failing_uploads.contains(&file.name) {
            return Err(AppError::Upstream {
                status: 500,
                message: format!("Upload of {} failed", file.name),
            });
        }

        let record = state
            .records
            .get_mut(&id)
            .and_then(Value::as_object_mut)
            .ok_or_else(|| AppError::RecordNotFound {
                record_type: record_type.to_string(),
                pid: pid.to_string(),
            })?;

        let record_files = record
            .entry("_files")
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Some(record_files) = record_files.as_array_mut() {
            let known = record_files
                .iter()
                .any(|f| f.get("key").and_then(Value::as_str) == Some(file.name.as_str()));
            if !known {
                let order = record_files.len() + 1;
                record_files.push(json!({
                    "key": file.name,
                    "type": FILE_TYPE,
                    "order": order,
                    "label": file.name,
                    "mimetype": file.content_type,
                    "created": chrono::Utc::now(),
                }));
            }
        }

        let entries = state.files.entry(id).or_default();
        for entry in entries.iter_mut().filter(|e| e.key == file.name) {
            entry.is_head = false;
        }
        let mut extra = Map::new();
        extra.insert("size".to_string(), json!(file.data.len()));
        entries.push(FileEntry {
            key: file.name.clone(),
            is_head: true,
            version_id: Some(uuid::Uuid::new_v4().to_string()),
            label: None,
            metadata: None,
            links: FileLinks {
                self_link: Some(format!("http://memory/api/{}/{}/files", record_type, pid)),
                download: None,
                preview: None,
            },
            extra,
        });

        state.uploads.push(file.name.clone());
        Ok(())
    }

    async fn deposit_value(&self, pid: &str) -> Result<Value> {
        self.state
            .read()
            .await
            .records
            .get(&record_id(DEPOSITS, pid))
            .cloned()
            .ok_or_else(|| AppError::DepositNotFound { pid: pid.to_string() })
    }
}

#[async_trait]
impl DepositBackend for MemoryBackend {
    async fn get_deposit(&self, pid: &str) -> Result<Deposit> {
        let value = self.deposit_value(pid).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn create_deposit(&self) -> Result<Deposit> {
        let mut state = self.state.write().await;
        state.next_pid += 1;
        let deposit = Deposit {
            pid: state.next_pid.to_string(),
            step: None,
            status: DepositStatus::InProgress,
            diffusion: None,
            extra: Map::new(),
        };
        state
            .records
            .insert(record_id(DEPOSITS, &deposit.pid), serde_json::to_value(&deposit)?);
        Ok(deposit)
    }

    async fn update_deposit(&self, deposit: &Deposit) -> Result<Deposit> {
        let mut state = self.state.write().await;
        let id = record_id(DEPOSITS, &deposit.pid);
        if !state.records.contains_key(&id) {
            return Err(AppError::DepositNotFound {
                pid: deposit.pid.clone(),
            });
        }
        state.records.insert(id, serde_json::to_value(deposit)?);
        Ok(deposit.clone())
    }

    async fn publish_deposit(&self, pid: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let record = state
            .records
            .get_mut(&record_id(DEPOSITS, pid))
            .and_then(Value::as_object_mut)
            .ok_or_else(|| AppError::DepositNotFound { pid: pid.to_string() })?;
        record.insert("status".to_string(), json!(DepositStatus::ToValidate.as_str()));
        state.published.push(pid.to_string());
        Ok(())
    }

    async fn list_files(&self, record_type: &str, pid: &str) -> Result<Vec<FileEntry>> {
        let state = self.state.read().await;
        let id = record_id(record_type, pid);
        if !state.records.contains_key(&id) {
            return Err(AppError::RecordNotFound {
                record_type: record_type.to_string(),
                pid: pid.to_string(),
            });
        }
        Ok(state.files.get(&id).cloned().unwrap_or_default())
    }

    async fn upload_file(&self, record_type: &str, pid: &str, file: &UploadFile) -> Result<()> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if !self.upload_delay.is_zero() {
            tokio::time::sleep(self.upload_delay).await;
        }
        let result = self.store_upload(record_type, pid, file).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn delete_file(&self, record_type: &str, pid: &str, key: &str) -> Result<()> {
        let mut state = self.state.write().await;
        let id = record_id(record_type, pid);

        let entries = state.files.entry(id.clone()).or_default();
        let before = entries.len();
        entries.retain(|e| e.key != key);
        if entries.len() == before {
            return Err(AppError::FileNotFound { key: key.to_string() });
        }

        if let Some(files) = state
            .records
            .get_mut(&id)
            .and_then(|r| r.get_mut("_files"))
            .and_then(Value::as_array_mut)
        {
            files.retain(|f| f.get("key").and_then(Value::as_str) != Some(key));
        }
        Ok(())
    }

    async fn extract_pdf_metadata(&self, pid: &str) -> Result<Value> {
        self.deposit_value(pid).await?;
        let state = self.state.read().await;
        Ok(state.pdf_metadata.get(pid).cloned().unwrap_or(Value::Bool(false)))
    }

    async fn search_swisscovery(&self, query: &SwisscoveryQuery) -> Result<Option<SwisscoveryResponse>> {
        query.params()?;
        Ok(self.state.read().await.swisscovery.get(&query.query).cloned())
    }

    async fn get_json_schema(&self, record_type: &str) -> Result<Value> {
        self.state
            .read()
            .await
            .schemas
            .get(record_type)
            .cloned()
            .ok_or_else(|| AppError::NotFound {
                resource_type: "schema".to_string(),
                id: record_type.to_string(),
            })
    }

    async fn get_record(&self, record_type: &str, pid: &str) -> Result<Value> {
        self.state
            .read()
            .await
            .records
            .get(&record_id(record_type, pid))
            .cloned()
            .ok_or_else(|| AppError::RecordNotFound {
                record_type: record_type.to_string(),
                pid: pid.to_string(),
            })
    }

    async fn update_record(&self, record_type: &str, pid: &str, record: &Value) -> Result<Value> {
        let mut state = self.state.write().await;
        let stored = state
            .records
            .get_mut(&record_id(record_type, pid))
            .ok_or_else(|| AppError::RecordNotFound {
                record_type: record_type.to_string(),
                pid: pid.to_string(),
            })?;
        *stored = record.clone();
        Ok(record.clone())
    }

    async fn post_stats(&self, _query: &Value) -> Result<Value> {
        Ok(self
            .state
            .read()
            .await
            .stats
            .clone()
            .unwrap_or_else(|| json!({"record-view": {"unique_count": 0}})))
    }

    fn name(&self) -> &str {
        "memory"
    }
}
