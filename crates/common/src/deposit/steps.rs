//! Deposit step tracking
//!
//! Computes the step following the current one and advances the step stored
//! on the deposit. The stored step only ever moves forward.

use super::{Deposit, DepositStatus};
use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A stage of the deposit form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Files,
    Metadata,
    Contributors,
    Projects,
    Diffusion,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Files => "files",
            Step::Metadata => "metadata",
            Step::Contributors => "contributors",
            Step::Projects => "projects",
            Step::Diffusion => "diffusion",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Step {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "files" => Ok(Step::Files),
            "metadata" => Ok(Step::Metadata),
            "contributors" => Ok(Step::Contributors),
            "projects" => Ok(Step::Projects),
            "diffusion" => Ok(Step::Diffusion),
            other => Err(AppError::UnknownStep {
                step: other.to_string(),
            }),
        }
    }
}

/// Ordered, duplicate-free list of steps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSequence {
    steps: Vec<Step>,
}

impl Default for StepSequence {
    fn default() -> Self {
        Self {
            steps: vec![
                Step::Files,
                Step::Metadata,
                Step::Contributors,
                Step::Projects,
                Step::Diffusion,
            ],
        }
    }
}

impl StepSequence {
    pub fn new(steps: Vec<Step>) -> Result<Self> {
        if steps.is_empty() {
            return Err(AppError::Validation {
                message: "step sequence cannot be empty".to_string(),
                field: None,
            });
        }
        for (i, step) in steps.iter().enumerate() {
            if steps[..i].contains(step) {
                return Err(AppError::Validation {
                    message: format!("step {} appears twice", step),
                    field: None,
                });
            }
        }
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn position(&self, step: Step) -> Option<usize> {
        self.steps.iter().position(|s| *s == step)
    }

    fn require_position(&self, step: Step) -> Result<usize> {
        self.position(step).ok_or_else(|| AppError::UnknownStep {
            step: step.to_string(),
        })
    }

    pub fn last(&self) -> Step {
        // non-empty by construction
        self.steps[self.steps.len() - 1]
    }

    pub fn is_last(&self, step: Step) -> bool {
        self.last() == step
    }

    /// Step following `current`, or `current` itself when it is the last one
    pub fn next_step(&self, current: Step) -> Result<Step> {
        let index = self.require_position(current)?;
        Ok(self.steps.get(index + 1).copied().unwrap_or(current))
    }
}

/// Advance `deposit.step` to the step after `current` when it is behind it.
///
/// A deposit without a stored step counts as being before the first step.
/// A stored step outside the sequence is rejected. Returns whether the
/// stored step changed.
pub fn upgrade_step_if_needed(
    deposit: &mut Deposit,
    steps: &StepSequence,
    current: Step,
) -> Result<bool> {
    let next = steps.next_step(current)?;
    let next_index = steps.require_position(next)?;

    let deposit_index = match deposit.step.as_deref() {
        None => None,
        Some(stored) => Some(steps.require_position(stored.parse()?)?),
    };

    if deposit_index.map_or(true, |index| index < next_index) {
        tracing::debug!(
            pid = %deposit.pid,
            from = ?deposit.step,
            to = %next,
            "Advancing deposit step"
        );
        deposit.step = Some(next.to_string());
        return Ok(true);
    }
    Ok(false)
}

/// Whether the deposit can be published from the current step
pub fn can_submit(deposit: &Deposit, current: Step) -> bool {
    matches!(
        deposit.status,
        DepositStatus::InProgress | DepositStatus::AskForChanges
    ) && current == Step::Diffusion
        && deposit.license().is_some()
}

/// Whether the owner may still open the deposit editor
pub fn can_access(deposit: &Deposit) -> bool {
    deposit.status.is_editable()
}

/// Furthest step reachable in the navigation
pub fn max_step(deposit: &Deposit) -> &str {
    deposit.step.as_deref().unwrap_or(Step::Metadata.as_str())
}
