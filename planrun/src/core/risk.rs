//! Risk estimation and the risk-tiered approval policy.

use crate::core::types::{Plan, RiskLevel};

/// Words that escalate a shell step to HIGH risk.
pub const HIGH_RISK_WORDS: &[&str] = &["rm", "delete", "format", "shutdown", "reboot"];

/// Escalate to HIGH when any `shell` step's `cmd` contains a high-risk word;
/// otherwise keep the plan's own level.
///
/// Words are maximal runs of ASCII alphanumerics: `rm -rf` and `/bin/rm`
/// escalate, `confirm` and `warm.txt` do not.
pub fn estimate_risk(plan: &Plan) -> RiskLevel {
    let escalates = plan
        .steps
        .iter()
        .filter(|step| step.tool == "shell")
        .filter_map(|step| step.inputs.get("cmd").and_then(|cmd| cmd.as_str()))
        .any(contains_high_risk_word);
    if escalates {
        RiskLevel::High
    } else {
        plan.risk_level
    }
}

fn contains_high_risk_word(cmd: &str) -> bool {
    cmd.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .any(|word| HIGH_RISK_WORDS.contains(&word))
}

/// What a front end must do before executing a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Approval {
    /// Execute without asking.
    Proceed,
    /// Ask the user and execute only on an explicit yes.
    Confirm,
    /// Do not execute; HIGH risk plans cannot be pre-approved.
    Refuse,
}

pub fn approval_for(risk: RiskLevel, assume_yes: bool) -> Approval {
    match (risk, assume_yes) {
        (RiskLevel::High, true) => Approval::Refuse,
        (RiskLevel::High, false) => Approval::Confirm,
        (_, true) => Approval::Proceed,
        (_, false) => Approval::Confirm,
    }
}
