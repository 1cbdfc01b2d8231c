//! HTTP client for the SONAR REST API

use super::{DepositBackend, UploadFile, DEPOSITS};
use crate::config::BackendConfig;
use crate::deposit::{Deposit, RecordEnvelope};
use crate::errors::{AppError, Result};
use crate::files::FileEntry;
use crate::import::{SwisscoveryQuery, SwisscoveryResponse};
use crate::metrics;
use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoffBuilder};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::time::{Duration, Instant};

#[derive(Deserialize)]
struct FilesResponse {
    #[serde(default)]
    contents: Vec<FileEntry>,
}

/// SONAR backend reached over HTTP
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
    api_token: Option<String>,
    max_retries: u32,
    timeout: Duration,
}

impl HttpBackend {
    /// Create a new client for the given base URL
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url).map_err(|e| AppError::Configuration {
            message: format!("Invalid backend URL '{}': {}", base_url, e),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AppError::Configuration {
                message: format!("Backend URL '{}' cannot be a base", base_url),
            });
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url,
            api_token: None,
            max_retries: 3,
            timeout,
        })
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self> {
        let mut backend = Self::new(&config.base_url, config.timeout())?;
        backend.api_token = config.api_token.clone();
        backend.max_retries = config.max_retries;
        Ok(backend)
    }

    /// Build an endpoint URL from path segments; a trailing `""` adds a slash
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        let request = self.client.request(method, url);
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn transport_error(&self, error: reqwest::Error) -> AppError {
        if error.is_timeout() {
            AppError::UpstreamTimeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            AppError::HttpClient(error)
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(AppError::Upstream {
            status: status.as_u16(),
            message: body,
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        response.json::<T>().await.map_err(AppError::HttpClient)
    }

    /// GET with exponential backoff on transient failures
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(100))
            .with_max_elapsed_time(Some(self.timeout))
            .build();
        let max_retries = self.max_retries;
        let mut attempts = 0u32;

        retry(policy, || {
            attempts += 1;
            let attempt = attempts;
            let request = self.request(reqwest::Method::GET, url.clone());
            async move {
                self.send_json(request).await.map_err(|e| {
                    if e.is_transient() && attempt <= max_retries {
                        tracing::warn!(
                            attempt = attempt,
                            max_retries = max_retries,
                            error = %e,
                            "Backend request failed, retrying"
                        );
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
            }
        })
        .await
    }

    async fn observe<T>(&self, operation: &'static str, call: impl Future<Output = Result<T>>) -> Result<T> {
        let start = Instant::now();
        let result = call.await;
        metrics::record_backend_call(operation, start.elapsed().as_secs_f64(), result.is_ok());
        if let Err(e) = &result {
            tracing::debug!(operation = operation, error = %e, "Backend call failed");
        }
        result
    }
}

fn is_not_found(error: &AppError) -> bool {
    matches!(error, AppError::Upstream { status, .. } if *status == StatusCode::NOT_FOUND.as_u16())
}

#[async_trait]
impl DepositBackend for HttpBackend {
    async fn get_deposit(&self, pid: &str) -> Result<Deposit> {
        let url = self.url(&["api", DEPOSITS, pid]);
        self.observe("get_deposit", async {
            let envelope: RecordEnvelope<Deposit> = self.get_json(url).await.map_err(|e| {
                if is_not_found(&e) {
                    AppError::DepositNotFound { pid: pid.to_string() }
                } else {
                    e
                }
            })?;
            Ok(envelope.metadata)
        })
        .await
    }

    async fn create_deposit(&self) -> Result<Deposit> {
        let url = self.url(&["api", DEPOSITS, ""]);
        self.observe("create_deposit", async {
            let request = self.request(reqwest::Method::POST, url).json(&json!({}));
            let envelope: RecordEnvelope<Deposit> = self.send_json(request).await?;
            Ok(envelope.metadata)
        })
        .await
    }

    async fn update_deposit(&self, deposit: &Deposit) -> Result<Deposit> {
        let url = self.url(&["api", DEPOSITS, &deposit.pid]);
        self.observe("update_deposit", async {
            let request = self.request(reqwest::Method::PUT, url).json(deposit);
            let envelope: RecordEnvelope<Deposit> = self.send_json(request).await?;
            Ok(envelope.metadata)
        })
        .await
    }

    async fn publish_deposit(&self, pid: &str) -> Result<()> {
        let url = self.url(&["api", DEPOSITS, pid, "publish"]);
        self.observe("publish_deposit", async {
            self.send(self.request(reqwest::Method::POST, url)).await?;
            Ok(())
        })
        .await
    }

    async fn list_files(&self, record_type: &str, pid: &str) -> Result<Vec<FileEntry>> {
        let mut url = self.url(&["api", record_type, pid, "files"]);
        url.set_query(Some("versions"));
        self.observe("list_files", async {
            let response: FilesResponse = self.get_json(url).await?;
            Ok(response.contents)
        })
        .await
    }

    async fn upload_file(&self, record_type: &str, pid: &str, file: &UploadFile) -> Result<()> {
        let url = self.url(&["api", record_type, pid, "files", &file.name]);
        self.observe("upload_file", async {
            let content_type = file
                .content_type
                .as_deref()
                .unwrap_or("application/octet-stream");
            let request = self
                .request(reqwest::Method::PUT, url)
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(file.data.clone());
            self.send(request).await?;
            Ok(())
        })
        .await
    }

    async fn delete_file(&self, record_type: &str, pid: &str, key: &str) -> Result<()> {
        let url = self.url(&["api", record_type, pid, "files", key]);
        self.observe("delete_file", async {
            self.send(self.request(reqwest::Method::DELETE, url))
                .await
                .map_err(|e| {
                    if is_not_found(&e) {
                        AppError::FileNotFound { key: key.to_string() }
                    } else {
                        e
                    }
                })?;
            Ok(())
        })
        .await
    }

    async fn extract_pdf_metadata(&self, pid: &str) -> Result<Value> {
        let url = self.url(&["api", DEPOSITS, pid, "extract_pdf_metadata"]);
        self.observe("extract_pdf_metadata", self.get_json(url)).await
    }

    async fn search_swisscovery(&self, query: &SwisscoveryQuery) -> Result<Option<SwisscoveryResponse>> {
        let params = query.params()?;
        let mut url = self.url(&["api", "swisscovery", ""]);
        url.query_pairs_mut().extend_pairs(params.iter());
        self.observe("search_swisscovery", async {
            let response = self
                .request(reqwest::Method::GET, url)
                .send()
                .await
                .map_err(|e| self.transport_error(e))?;
            if response.status() != StatusCode::OK {
                tracing::info!(status = %response.status(), "No swisscovery result");
                return Ok(None);
            }
            let record = response
                .json::<SwisscoveryResponse>()
                .await
                .map_err(AppError::HttpClient)?;
            Ok(Some(record))
        })
        .await
    }

    async fn get_json_schema(&self, record_type: &str) -> Result<Value> {
        let url = self.url(&["schemas", record_type]);
        self.observe("get_json_schema", self.get_json(url)).await
    }

    async fn get_record(&self, record_type: &str, pid: &str) -> Result<Value> {
        let url = self.url(&["api", record_type, pid]);
        self.observe("get_record", async {
            let envelope: RecordEnvelope<Value> = self.get_json(url).await.map_err(|e| {
                if is_not_found(&e) {
                    AppError::RecordNotFound {
                        record_type: record_type.to_string(),
                        pid: pid.to_string(),
                    }
                } else {
                    e
                }
            })?;
            Ok(envelope.metadata)
        })
        .await
    }

    async fn update_record(&self, record_type: &str, pid: &str, record: &Value) -> Result<Value> {
        let url = self.url(&["api", record_type, pid]);
        self.observe("update_record", async {
            let request = self.request(reqwest::Method::PUT, url).json(record);
            let envelope: RecordEnvelope<Value> = self.send_json(request).await?;
            Ok(envelope.metadata)
        })
        .await
    }

    async fn post_stats(&self, query: &Value) -> Result<Value> {
        let url = self.url(&["api", "stats"]);
        self.observe("post_stats", async {
            let request = self.request(reqwest::Method::POST, url).json(query);
            self.send_json(request).await
        })
        .await
    }

    fn name(&self) -> &str {
        "http"
    }
}
