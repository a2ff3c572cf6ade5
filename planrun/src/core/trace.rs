//! Trace model: per-step `TraceEntry` and per-plan `ExecutionResult`.
//!
//! Status changes go through [`TraceEntry::transition`], which rejects moves
//! the step lifecycle does not allow.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::types::{Inputs, RiskLevel, StepStatus};

/// Attempted status change the step lifecycle does not permit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("step '{step_id}': illegal status transition {from} -> {to}")]
pub struct TransitionError {
    pub step_id: String,
    pub from: StepStatus,
    pub to: StepStatus,
}

/// Record of one processed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub step_id: String,
    pub tool: String,
    pub inputs_digest: String,
    /// Inputs after reference resolution (raw inputs for dry runs).
    pub inputs: Inputs,
    /// Set on success, and on failures that carry a payload.
    pub outputs: Option<Map<String, Value>>,
    pub output_digest: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub status: StepStatus,
    pub error: Option<String>,
}

impl TraceEntry {
    pub fn new(step_id: impl Into<String>, tool: impl Into<String>, inputs_digest: String) -> Self {
        Self {
            step_id: step_id.into(),
            tool: tool.into(),
            inputs_digest,
            inputs: Inputs::new(),
            outputs: None,
            output_digest: None,
            start_time: Utc::now(),
            end_time: None,
            status: StepStatus::Pending,
            error: None,
        }
    }

    pub fn transition(&mut self, next: StepStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                step_id: self.step_id.clone(),
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.end_time = Some(Utc::now());
        }
        Ok(())
    }

    /// PENDING -> RUNNING; restarts the clock at dispatch time.
    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.transition(StepStatus::Running)?;
        self.start_time = Utc::now();
        Ok(())
    }

    pub fn succeed(
        &mut self,
        outputs: Map<String, Value>,
        output_digest: Option<String>,
    ) -> Result<(), TransitionError> {
        self.transition(StepStatus::Success)?;
        self.outputs = Some(outputs);
        self.output_digest = output_digest;
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(StepStatus::Failure)?;
        self.error = Some(error.into());
        Ok(())
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds())
    }
}

/// Aggregate outcome of one `execute_plan` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub plan_goal: String,
    pub plan_risk_level: RiskLevel,
    pub workspace_root: PathBuf,
    pub total_steps: usize,
    pub successful_steps: usize,
    pub failed_steps: usize,
    pub skipped_steps: usize,
    pub overall_status: StepStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub traces: Vec<TraceEntry>,
    pub produced_files: Vec<String>,
    pub error_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_dir: Option<PathBuf>,
}

impl ExecutionResult {
    pub fn new(
        plan_goal: impl Into<String>,
        plan_risk_level: RiskLevel,
        workspace_root: PathBuf,
        total_steps: usize,
    ) -> Self {
        Self {
            plan_goal: plan_goal.into(),
            plan_risk_level,
            workspace_root,
            total_steps,
            successful_steps: 0,
            failed_steps: 0,
            skipped_steps: 0,
            overall_status: StepStatus::Pending,
            start_time: Utc::now(),
            end_time: None,
            traces: Vec::new(),
            produced_files: Vec::new(),
            error_summary: None,
            run_dir: None,
        }
    }

    /// Derive counts, overall status and error summary from the recorded traces.
    ///
    /// Steps that were never reached have no trace and count as skipped.
    pub fn finalize(&mut self) {
        let count = |status: StepStatus| self.traces.iter().filter(|t| t.status == status).count();
        self.successful_steps = count(StepStatus::Success);
        self.failed_steps = count(StepStatus::Failure);
        let unreached = self.total_steps.saturating_sub(self.traces.len());
        self.skipped_steps = count(StepStatus::Skipped) + unreached;

        self.overall_status = if self.failed_steps > 0 {
            StepStatus::Failure
        } else if self.successful_steps == self.total_steps {
            StepStatus::Success
        } else {
            StepStatus::Pending
        };

        self.error_summary = self
            .traces
            .iter()
            .find(|t| t.status == StepStatus::Failure)
            .map(|t| {
                format!(
                    "step {} failed: {}",
                    t.step_id,
                    t.error.as_deref().unwrap_or("unknown error")
                )
            });

        self.end_time = Some(Utc::now());
    }

    pub fn is_success(&self) -> bool {
        self.overall_status == StepStatus::Success
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.end_time
            .map(|end| (end - self.start_time).num_milliseconds())
    }

    /// Fraction of steps that succeeded (0.0 for an empty plan).
    pub fn success_rate(&self) -> f64 {
        if self.total_steps == 0 {
            return 0.0;
        }
        self.successful_steps as f64 / self.total_steps as f64
    }
}
