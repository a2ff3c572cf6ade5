//! Plan producers.
//!
//! The engine treats planners as opaque: anything that turns a goal into a
//! [`Plan`] can implement [`Planner`]. [`CannedPlanner`] is the deterministic
//! implementation used by the CLI and tests.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use crate::core::invariants::validate_plan;
use crate::core::risk::estimate_risk;
use crate::core::types::{Inputs, Plan, RiskLevel, Step};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanningError {
    #[error("goal must be non-empty")]
    EmptyGoal,
    #[error("planner produced an invalid plan: {0}")]
    InvalidPlan(String),
}

pub trait Planner {
    fn generate_plan(&self, goal: &str, workspace_root: &Path) -> Result<Plan, PlanningError>;

    /// Risk of `plan` as judged by this planner; never lower than needed for
    /// shell steps that look destructive.
    fn estimate_risk_level(&self, plan: &Plan) -> RiskLevel {
        estimate_risk(plan)
    }
}

/// Keyword-matched canned plans.
///
/// - "summarize": read `data/notes.txt`, write three bullets to `out/summary.md` (LOW)
/// - "delete" / "rm -rf": a single `rm -rf *` shell step (HIGH)
/// - anything else: read `test.txt` (LOW)
#[derive(Debug, Default)]
pub struct CannedPlanner {
    calls: AtomicUsize,
}

pub const SUMMARY_CONTENT: &str = "- Summary point 1\n- Summary point 2\n- Summary point 3";

impl CannedPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }
}

impl Planner for CannedPlanner {
    fn generate_plan(&self, goal: &str, workspace_root: &Path) -> Result<Plan, PlanningError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if goal.trim().is_empty() {
            return Err(PlanningError::EmptyGoal);
        }
        let lowered = goal.to_lowercase();

        let (risk_level, steps, success_criteria) =
            if lowered.contains("summarize") || goal.contains("总结") {
                (
                    RiskLevel::Low,
                    vec![
                        canned_step(
                            "1",
                            "Read the source file",
                            "file",
                            json!({"action": "read_text", "path": "data/notes.txt"}),
                            "content:source_content",
                        ),
                        canned_step(
                            "2",
                            "Write summary to output file",
                            "file",
                            json!({
                                "action": "write_text",
                                "path": "out/summary.md",
                                "content": SUMMARY_CONTENT,
                            }),
                            "file:out/summary.md",
                        ),
                    ],
                    vec![
                        "File out/summary.md exists",
                        "File contains 3 bullet points starting with '-'",
                        "All steps completed successfully",
                    ],
                )
            } else if lowered.contains("delete") || goal.contains("删除") || goal.contains("rm -rf")
            {
                (
                    RiskLevel::High,
                    vec![canned_step(
                        "1",
                        "Attempt to delete files",
                        "shell",
                        json!({"cmd": "rm -rf *"}),
                        "file_deletion",
                    )],
                    vec!["Files deleted"],
                )
            } else {
                (
                    RiskLevel::Low,
                    vec![canned_step(
                        "1",
                        "Read a file",
                        "file",
                        json!({"action": "read_text", "path": "test.txt"}),
                        "content:file_content",
                    )],
                    vec!["File read successfully"],
                )
            };

        let plan = Plan {
            goal: goal.to_string(),
            risk_level,
            workspace_root: workspace_root.to_path_buf(),
            steps,
            success_criteria: success_criteria.into_iter().map(str::to_string).collect(),
        };
        let errors = validate_plan(&plan);
        if !errors.is_empty() {
            return Err(PlanningError::InvalidPlan(errors.join("; ")));
        }
        debug!(risk = %plan.risk_level, steps = plan.steps.len(), "generated canned plan");
        Ok(plan)
    }
}

fn canned_step(id: &str, description: &str, tool: &str, inputs: Value, produces: &str) -> Step {
    Step {
        id: id.to_string(),
        description: description.to_string(),
        tool: tool.to_string(),
        inputs: match inputs {
            Value::Object(map) => map,
            _ => Inputs::new(),
        },
        produces: Some(produces.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarize_goal_reads_then_writes() {
        let planner = CannedPlanner::new();
        let plan = planner
            .generate_plan("Summarize data/notes.txt", Path::new("/w"))
            .expect("plan");
        assert_eq!(plan.risk_level, RiskLevel::Low);
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].inputs["path"], "data/notes.txt");
        assert_eq!(plan.steps[1].inputs["path"], "out/summary.md");
        assert_eq!(plan.steps[1].inputs["content"], SUMMARY_CONTENT);
        assert_eq!(plan.workspace_root, Path::new("/w"));
        assert_eq!(plan.max_step_id(), 2);
    }

    #[test]
    fn delete_goal_is_high_risk_shell() {
        let planner = CannedPlanner::new();
        let plan = planner
            .generate_plan("please rm -rf everything", Path::new("/w"))
            .expect("plan");
        assert_eq!(plan.risk_level, RiskLevel::High);
        assert_eq!(plan.steps[0].tool, "shell");
        assert_eq!(plan.steps[0].inputs["cmd"], "rm -rf *");
        assert_eq!(planner.estimate_risk_level(&plan), RiskLevel::High);
    }

    #[test]
    fn other_goals_read_test_file() {
        let planner = CannedPlanner::new();
        let plan = planner
            .generate_plan("show me something", Path::new("/w"))
            .expect("plan");
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].inputs["path"], "test.txt");
        assert_eq!(planner.estimate_risk_level(&plan), RiskLevel::Low);
    }

    #[test]
    fn counts_calls_and_rejects_empty_goal() {
        let planner = CannedPlanner::new();
        assert_eq!(
            planner.generate_plan("  ", Path::new("/w")),
            Err(PlanningError::EmptyGoal)
        );
        planner.generate_plan("x", Path::new("/w")).expect("plan");
        assert_eq!(planner.call_count(), 2);
        planner.reset();
        assert_eq!(planner.call_count(), 0);
    }
}
