//! Step-by-step deposit editing

use crate::client::DepositBackend;
use crate::deposit::{
    can_access, can_submit, max_step, upgrade_step_if_needed, validate_step_data, Deposit, Step,
    StepSequence,
};
use crate::errors::{AppError, Result};
use crate::import::{map_pdf_extraction, map_swisscovery, EditorModel, ImportResult, SwisscoveryQuery};
use crate::metrics;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Result of saving one step
#[derive(Debug, Clone, Serialize)]
pub struct SaveOutcome {
    /// Deposit as stored by the backend
    pub deposit: Deposit,
    /// Whether the furthest reached step moved forward
    pub advanced: bool,
    /// Step to navigate to; `None` after the last step
    pub next_step: Option<Step>,
}

/// Editor session over a single deposit
pub struct DepositEditor {
    backend: Arc<dyn DepositBackend>,
    steps: StepSequence,
    deposit: Deposit,
}

impl DepositEditor {
    /// Load a deposit; any lookup failure is reported as a missing deposit
    pub async fn load(backend: Arc<dyn DepositBackend>, pid: &str) -> Result<Self> {
        let deposit = backend.get_deposit(pid).await.map_err(|e| match e {
            AppError::DepositNotFound { .. } => e,
            AppError::NotFound { .. } | AppError::RecordNotFound { .. } => {
                AppError::DepositNotFound { pid: pid.to_string() }
            }
            other => {
                tracing::error!(pid = pid, error = %other, "Failed to load deposit");
                other
            }
        })?;

        Ok(Self {
            backend,
            steps: StepSequence::default(),
            deposit,
        })
    }

    pub fn with_steps(mut self, steps: StepSequence) -> Self {
        self.steps = steps;
        self
    }

    pub fn deposit(&self) -> &Deposit {
        &self.deposit
    }

    pub fn steps(&self) -> &StepSequence {
        &self.steps
    }

    pub fn max_step(&self) -> &str {
        max_step(&self.deposit)
    }

    pub fn can_submit(&self, current: Step) -> bool {
        can_submit(&self.deposit, current)
    }

    fn ensure_editable(&self) -> Result<()> {
        if can_access(&self.deposit) {
            Ok(())
        } else {
            Err(AppError::DepositLocked {
                pid: self.deposit.pid.clone(),
                status: self.deposit.status.to_string(),
            })
        }
    }

    /// Form model of `step` seeded from the stored deposit
    pub fn model(&self, step: Step) -> EditorModel {
        EditorModel::for_step(&self.deposit, step)
    }

    /// Validate and store the data of `step`, advancing the deposit when needed
    pub async fn save(&mut self, step: Step, data: Value) -> Result<SaveOutcome> {
        self.ensure_editable()?;
        validate_step_data(step, &data)?;

        let mut updated = self.deposit.clone();
        let advanced = upgrade_step_if_needed(&mut updated, &self.steps, step)?;
        updated.set_step_data(step, data)?;

        let stored = self.backend.update_deposit(&updated).await?;
        self.deposit = stored;
        metrics::record_save(step.as_str(), advanced);

        let next_step = if self.steps.is_last(step) {
            None
        } else {
            Some(self.steps.next_step(step)?)
        };

        tracing::info!(
            pid = %self.deposit.pid,
            step = %step,
            advanced = advanced,
            "Deposit saved"
        );

        Ok(SaveOutcome {
            deposit: self.deposit.clone(),
            advanced,
            next_step,
        })
    }

    /// Stored metadata and contributors, overlaid with the unsaved editor state
    fn import_model(&self, current: Option<EditorModel>, import: ImportResult) -> EditorModel {
        let mut model = EditorModel::for_step(&self.deposit, Step::Metadata);
        if let Some(contributors) = self.deposit.step_data(Step::Contributors) {
            model.update(Step::Contributors.as_str(), contributors);
        }
        if let Some(current) = current {
            model.overlay(current);
        }
        model.apply_import(import);
        model
    }

    /// Merge a swisscovery record into the editor model.
    ///
    /// `current` is the model being edited; steps it lacks come from the
    /// stored deposit. Returns `None` for a blank query or when the catalog
    /// has no record. Nothing is persisted until the step is saved.
    pub async fn import_swisscovery(
        &self,
        query: &SwisscoveryQuery,
        current: Option<EditorModel>,
    ) -> Result<Option<EditorModel>> {
        self.ensure_editable()?;
        if query.is_blank() {
            return Ok(None);
        }

        let import = self
            .backend
            .search_swisscovery(query)
            .await?
            .map(map_swisscovery)
            .filter(|import| !import.is_empty());
        metrics::record_import("swisscovery", import.is_some());

        tracing::info!(
            pid = %self.deposit.pid,
            search_type = %query.search_type,
            found = import.is_some(),
            "swisscovery import"
        );

        Ok(import.map(|import| self.import_model(current, import)))
    }

    /// Merge the metadata extracted from the main PDF into the editor model
    pub async fn import_pdf_metadata(
        &self,
        current: Option<EditorModel>,
    ) -> Result<Option<EditorModel>> {
        self.ensure_editable()?;

        let result = self.backend.extract_pdf_metadata(&self.deposit.pid).await?;
        let import = map_pdf_extraction(&result).filter(|import| !import.is_empty());
        metrics::record_import("pdf", import.is_some());

        tracing::info!(
            pid = %self.deposit.pid,
            found = import.is_some(),
            "PDF metadata import"
        );

        Ok(import.map(|import| self.import_model(current, import)))
    }

    /// Submit the deposit for validation from the `current` step
    pub async fn publish(&mut self, current: Step) -> Result<()> {
        if !self.can_submit(current) {
            let reason = if !can_access(&self.deposit) {
                format!("deposit status is {}", self.deposit.status)
            } else if current != Step::Diffusion {
                format!("cannot publish from step {}", current)
            } else {
                "no license selected".to_string()
            };
            return Err(AppError::NotSubmittable {
                pid: self.deposit.pid.clone(),
                reason,
            });
        }

        self.backend.publish_deposit(&self.deposit.pid).await?;
        self.deposit = self.backend.get_deposit(&self.deposit.pid).await?;
        metrics::record_publish();

        tracing::info!(pid = %self.deposit.pid, status = %self.deposit.status, "Deposit published");
        Ok(())
    }
}
