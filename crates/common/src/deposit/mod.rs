//! Deposit record model
//!
//! A deposit is a user's in-progress submission. It advances through an
//! ordered sequence of steps; the data edited in each step is stored under
//! the step name on the record itself.

mod form;
mod steps;

pub use form::{validate_step_data, FormErrors};
pub use steps::{can_access, can_submit, max_step, upgrade_step_if_needed, Step, StepSequence};

use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Deposit status as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositStatus {
    InProgress,
    AskForChanges,
    ToValidate,
    Validated,
    Rejected,
}

impl DepositStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepositStatus::InProgress => "in_progress",
            DepositStatus::AskForChanges => "ask_for_changes",
            DepositStatus::ToValidate => "to_validate",
            DepositStatus::Validated => "validated",
            DepositStatus::Rejected => "rejected",
        }
    }

    /// Statuses in which the owner may still edit the deposit
    pub fn is_editable(&self) -> bool {
        matches!(self, DepositStatus::InProgress | DepositStatus::AskForChanges)
    }
}

impl fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Diffusion step data (license and access conditions)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diffusion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Deposit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deposit {
    pub pid: String,

    /// Furthest step reached; absent on freshly created deposits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,

    pub status: DepositStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diffusion: Option<Diffusion>,

    /// Remaining record fields (metadata, contributors, projects, user, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Envelope returned by the REST API for a single record
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecordEnvelope<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub metadata: T,
}

impl Deposit {
    /// Data stored for a step, if any
    pub fn step_data(&self, step: Step) -> Option<Value> {
        match step {
            Step::Diffusion => self
                .diffusion
                .as_ref()
                .and_then(|d| serde_json::to_value(d).ok()),
            _ => self.extra.get(step.as_str()).cloned(),
        }
    }

    /// Replace the data stored for a step
    pub fn set_step_data(&mut self, step: Step, data: Value) -> Result<()> {
        match step {
            Step::Diffusion => {
                let diffusion: Diffusion =
                    serde_json::from_value(data).map_err(|e| AppError::InvalidFormat {
                        message: format!("diffusion: {}", e),
                    })?;
                self.diffusion = Some(diffusion);
            }
            _ => {
                self.extra.insert(step.as_str().to_string(), data);
            }
        }
        Ok(())
    }

    /// License chosen in the diffusion step
    pub fn license(&self) -> Option<&str> {
        self.diffusion
            .as_ref()
            .and_then(|d| d.license.as_deref())
            .filter(|l| !l.is_empty())
    }
}

#[cfg(test)]
pub(crate) fn sample_deposit(step: Option<&str>, status: DepositStatus) -> Deposit {
    Deposit {
        pid: "1".to_string(),
        step: step.map(str::to_string),
        status,
        diffusion: None,
        extra: Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_keeps_unknown_fields() {
        let deposit: Deposit = serde_json::from_value(json!({
            "pid": "12",
            "step": "metadata",
            "status": "in_progress",
            "user": {"$ref": "https://sonar.ch/api/users/1"},
            "metadata": {"title": "On deposits"}
        }))
        .unwrap();

        assert_eq!(deposit.step.as_deref(), Some("metadata"));
        assert!(deposit.status.is_editable());
        assert_eq!(deposit.step_data(Step::Metadata), Some(json!({"title": "On deposits"})));

        let back = serde_json::to_value(&deposit).unwrap();
        assert_eq!(back["user"]["$ref"], "https://sonar.ch/api/users/1");
    }

    #[test]
    fn test_set_diffusion_data() {
        let mut deposit = sample_deposit(Some("projects"), DepositStatus::InProgress);
        deposit
            .set_step_data(Step::Diffusion, json!({"license": "CC BY", "oa_status": "green"}))
            .unwrap();

        assert_eq!(deposit.license(), Some("CC BY"));
        assert_eq!(deposit.step_data(Step::Diffusion).unwrap()["oa_status"], "green");
    }

    #[test]
    fn test_empty_license_is_absent() {
        let mut deposit = sample_deposit(None, DepositStatus::InProgress);
        deposit.set_step_data(Step::Diffusion, json!({"license": ""})).unwrap();
        assert_eq!(deposit.license(), None);
    }

    #[test]
    fn test_invalid_diffusion_rejected() {
        let mut deposit = sample_deposit(None, DepositStatus::InProgress);
        assert!(deposit.set_step_data(Step::Diffusion, json!([1, 2])).is_err());
        assert!(deposit.diffusion.is_none());
    }
}
