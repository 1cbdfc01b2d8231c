//! Liveness and readiness of the gateway
//!
//! The gateway holds no state of its own; it is ready once the editor can
//! load the JSON schemas of both record types from the SONAR backend.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use sonar_deposit_common::client::{DepositBackend, DEPOSITS, DOCUMENTS};
use std::time::Instant;

use crate::AppState;

#[derive(Serialize)]
pub struct Liveness {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    Ready,
    NotReady,
}

/// Schema lookup of one record type
#[derive(Serialize)]
pub struct SchemaCheck {
    pub record_type: &'static str,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct BackendStatus {
    pub name: String,
    pub latency_ms: u64,
    pub schemas: Vec<SchemaCheck>,
}

#[derive(Serialize)]
pub struct ReadinessReport {
    pub status: Readiness,
    pub backend: BackendStatus,
}

pub async fn health() -> Json<Liveness> {
    Json(Liveness {
        status: "healthy",
        version: sonar_deposit_common::VERSION,
    })
}

async fn check_schema(backend: &dyn DepositBackend, record_type: &'static str) -> SchemaCheck {
    match backend.get_json_schema(record_type).await {
        Ok(_) => SchemaCheck {
            record_type,
            available: true,
            error: None,
        },
        Err(e) => {
            tracing::warn!(record_type = record_type, error = %e, "Schema unavailable");
            SchemaCheck {
                record_type,
                available: false,
                error: Some(e.to_string()),
            }
        }
    }
}

/// 503 until the deposit and document schemas can be loaded
pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadinessReport>) {
    let backend = state.backend.as_ref();
    let start = Instant::now();
    let (deposits, documents) = tokio::join!(
        check_schema(backend, DEPOSITS),
        check_schema(backend, DOCUMENTS)
    );
    let latency_ms = start.elapsed().as_millis() as u64;

    let status = if deposits.available && documents.available {
        Readiness::Ready
    } else {
        Readiness::NotReady
    };
    let code = match status {
        Readiness::Ready => StatusCode::OK,
        Readiness::NotReady => StatusCode::SERVICE_UNAVAILABLE,
    };

    (
        code,
        Json(ReadinessReport {
            status,
            backend: BackendStatus {
                name: backend.name().to_string(),
                latency_ms,
                schemas: vec![deposits, documents],
            },
        }),
    )
}
