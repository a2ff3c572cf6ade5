//! Screened shell command execution under allow/deny lists and a timeout.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::core::command::CommandPolicy;
use crate::core::types::{Inputs, ToolOutput};
use crate::io::config::ShellSettings;
use crate::io::process::run_command_with_timeout;
use crate::tools::{Tool, required_str};

pub const NAME: &str = "shell";

/// Runs one screened command via `sh -c` inside the workspace root.
#[derive(Debug, Clone)]
pub struct ShellTool {
    root: PathBuf,
    policy: CommandPolicy,
    default_timeout: Duration,
    output_limit_bytes: usize,
}

impl ShellTool {
    pub fn new(
        workspace_root: &Path,
        policy: CommandPolicy,
        default_timeout: Duration,
        output_limit_bytes: usize,
    ) -> Result<Self> {
        let root = fs::canonicalize(workspace_root)
            .with_context(|| format!("resolve workspace root {}", workspace_root.display()))?;
        Ok(Self {
            root,
            policy,
            default_timeout,
            output_limit_bytes,
        })
    }

    pub fn from_settings(workspace_root: &Path, settings: &ShellSettings) -> Result<Self> {
        Self::new(
            workspace_root,
            settings.policy(),
            settings.timeout(),
            settings.output_limit_bytes,
        )
    }

    fn timeout_for(&self, inputs: &Inputs) -> Result<Duration, String> {
        match inputs.get("timeout") {
            None | Some(Value::Null) => Ok(self.default_timeout),
            Some(value) => value
                .as_f64()
                .filter(|secs| *secs > 0.0)
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                .ok_or_else(|| format!("Invalid timeout: {}. Must be a positive number", value)),
        }
    }

    fn run(&self, inputs: &Inputs) -> Result<ToolOutput, String> {
        let cmd = required_str(inputs, "cmd")?;
        let timeout = self.timeout_for(inputs)?;
        self.policy.screen(cmd)?;

        info!(cmd, "running shell command");
        let mut command = Command::new("sh");
        command.arg("-c").arg(cmd).current_dir(&self.root);
        let output = run_command_with_timeout(command, timeout, self.output_limit_bytes)
            .map_err(|err| format!("Error executing command: {:#}", err))?;

        if output.timed_out {
            warn!(cmd, "shell command timed out");
            return Err(format!(
                "Command timed out after {} seconds",
                format_secs(timeout)
            ));
        }

        let stdout = output.stdout_text();
        let stderr = output.stderr_text();
        let code = output.status.code();
        let data = json!({
            "stdout": stdout,
            "stderr": stderr,
            "return_code": code,
            "command": cmd,
        });
        debug!(cmd, ?code, "shell command finished");

        if code == Some(0) {
            return Ok(ToolOutput::ok(data));
        }
        let error = if !stderr.is_empty() {
            stderr
        } else {
            match code {
                Some(code) => format!("Command exited with status {}", code),
                None => "Command terminated by signal".to_string(),
            }
        };
        Ok(ToolOutput::failed_with_data(data, error))
    }
}

impl Tool for ShellTool {
    fn name(&self) -> &str {
        NAME
    }

    #[instrument(skip_all)]
    fn execute(&self, inputs: &Inputs) -> Result<ToolOutput> {
        Ok(self.run(inputs).unwrap_or_else(|error| {
            debug!(%error, "shell command rejected");
            ToolOutput::failed(error)
        }))
    }
}

/// Whole seconds print without a fraction (`30`), others as-is (`0.5`).
fn format_secs(timeout: Duration) -> String {
    let secs = timeout.as_secs_f64();
    if secs.fract() == 0.0 {
        format!("{}", timeout.as_secs())
    } else {
        format!("{}", secs)
    }
}
