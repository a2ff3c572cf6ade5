//! Interactive confirmation before executing a plan.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};

use crate::core::types::Plan;

/// Print a plan summary to `output` and ask `(y/N)` on `input`.
///
/// Only `y` or `yes` (any case) approves; end of input declines.
pub fn confirm<R: BufRead, W: Write>(plan: &Plan, mut input: R, mut output: W) -> Result<bool> {
    write_summary(plan, &mut output)?;
    write!(output, "Execute this plan? (y/N) ").context("write prompt")?;
    output.flush().context("flush prompt")?;

    let mut answer = String::new();
    input.read_line(&mut answer).context("read answer")?;
    let answer = answer.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// Human-readable plan summary: goal, risk and one line per step.
pub fn write_summary<W: Write>(plan: &Plan, output: &mut W) -> Result<()> {
    writeln!(output, "Goal: {}", plan.goal).context("write summary")?;
    writeln!(output, "Risk: {}", plan.risk_level).context("write summary")?;
    writeln!(output, "Workspace: {}", plan.workspace_root.display()).context("write summary")?;
    for step in &plan.steps {
        let description = if step.description.is_empty() {
            String::new()
        } else {
            format!(" - {}", step.description)
        };
        writeln!(output, "  [{}] {}{}", step.id, step.tool, description)
            .context("write summary")?;
    }
    Ok(())
}
