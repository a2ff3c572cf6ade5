//! Shared deterministic types for the plan execution core.
//!
//! These types define stable contracts between the planner, the executor and
//! the on-disk artifacts. They do not depend on external state or I/O.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tool input payload: JSON object keyed by parameter name.
pub type Inputs = Map<String, Value>;

/// Risk classification assigned to a plan by its planner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of work: a registered tool name plus its input parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub tool: String,
    #[serde(default)]
    pub inputs: Inputs,
    /// Free-form label describing what the step yields (e.g. `file:out/summary.md`).
    #[serde(default)]
    pub produces: Option<String>,
}

/// An ordered, risk-classified sequence of steps targeting a workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub goal: String,
    pub risk_level: RiskLevel,
    pub workspace_root: PathBuf,
    pub steps: Vec<Step>,
    #[serde(default)]
    pub success_criteria: Vec<String>,
}

impl Plan {
    /// Look up a step by id (first match in plan order).
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|step| step.id == id)
    }

    /// Largest numeric step id, or 0 when no step id parses as a number.
    pub fn max_step_id(&self) -> u64 {
        self.steps
            .iter()
            .filter_map(|step| step.id.trim().parse::<u64>().ok())
            .max()
            .unwrap_or(0)
    }
}

/// Result of a single tool invocation.
///
/// Expected failures (validation, policy rejection, missing files, non-zero
/// exits) are reported with `success == false` and an `error` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    /// Object, string, or null.
    pub data: Value,
    pub error: Option<String>,
}

impl ToolOutput {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Value::Null,
            error: Some(error.into()),
        }
    }

    /// Failure that still carries a payload (e.g. a command that ran but exited non-zero).
    pub fn failed_with_data(data: Value, error: impl Into<String>) -> Self {
        Self {
            success: false,
            data,
            error: Some(error.into()),
        }
    }
}

/// Lifecycle status shared by trace entries and whole executions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Success,
    Failure,
    Skipped,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Skipped => "skipped",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failure | Self::Skipped)
    }

    /// Legal transitions of the per-step lifecycle.
    ///
    /// `Pending -> Success` covers dry runs; `Pending -> Failure` covers steps
    /// rejected before dispatch (e.g. unknown tool).
    pub fn can_transition_to(self, next: StepStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Success)
                | (Self::Pending, Self::Failure)
                | (Self::Pending, Self::Skipped)
                | (Self::Running, Self::Success)
                | (Self::Running, Self::Failure)
        )
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
