//! SONAR Deposit Common Library
//!
//! Shared code for the SONAR deposit services including:
//! - Deposit records and step tracking
//! - File version reconciliation and upload selection
//! - Metadata import (swisscovery, PDF extraction)
//! - Identifier validation
//! - SONAR REST backend client
//! - Workflow orchestration (editor, file manager)
//! - Error types, configuration, metrics and tracing

pub mod client;
pub mod config;
pub mod deposit;
pub mod errors;
pub mod files;
pub mod identifiers;
pub mod import;
pub mod metrics;
pub mod schema;
pub mod stats;
pub mod telemetry;
pub mod workflow;

// Re-export commonly used types
pub use client::{DepositBackend, HttpBackend, MemoryBackend};
pub use config::AppConfig;
pub use deposit::{Deposit, DepositStatus, Step, StepSequence};
pub use errors::{AppError, Result};
pub use workflow::{DepositEditor, FileManager};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
