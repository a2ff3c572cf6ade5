//! Semantic plan invariants not expressible via JSON Schema.

use std::collections::HashSet;

use crate::core::types::Plan;

/// Check plan invariants:
/// - At least one step
/// - Non-empty step ids, unique within the plan
/// - Non-empty tool names
pub fn validate_plan(plan: &Plan) -> Vec<String> {
    let mut errors = Vec::new();
    if plan.steps.is_empty() {
        errors.push("plan must contain at least one step".to_string());
    }

    let mut seen = HashSet::new();
    for (idx, step) in plan.steps.iter().enumerate() {
        let label = format!("steps[{}]", idx);
        if step.id.trim().is_empty() {
            errors.push(format!("{}: id must be non-empty", label));
        } else if !seen.insert(step.id.as_str()) {
            errors.push(format!("{}: duplicate step id '{}'", label, step.id));
        }

        if step.tool.trim().is_empty() {
            errors.push(format!("{}: tool must be non-empty", label));
        }
    }
    errors
}
