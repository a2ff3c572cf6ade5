//! Engine settings stored in `planrun.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::command::CommandPolicy;

/// Default config file name, looked up in the current directory.
pub const CONFIG_FILE: &str = "planrun.toml";

/// Engine settings (TOML).
///
/// Built once by the front end and passed to the executor; there is no
/// process-wide instance. Missing fields fall back to the defaults below.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Directory tools are confined to. Defaults to the process cwd.
    pub workspace_root: Option<PathBuf>,

    /// Directory holding one subdirectory per run. Defaults to `<cwd>/runs`.
    pub runs_dir: Option<PathBuf>,

    pub shell: ShellSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ShellSettings {
    /// Base commands the shell tool may run.
    pub allow: Vec<String>,

    /// Base commands that are always rejected, even if allowed.
    pub deny: Vec<String>,

    /// Default per-command timeout when a step does not pass `timeout`.
    pub timeout_secs: u64,

    /// Truncate captured stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for ShellSettings {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| (*s).to_string()).collect();
        Self {
            allow: owned(&[
                "ls", "cat", "grep", "wc", "head", "tail", "python3", "mkdir",
            ]),
            deny: owned(&[
                "rm", "mv", "sudo", "curl", "wget", "ssh", "chmod", "chown", "kill", "killall",
                "pkill", "shutdown", "reboot", "format", "fdisk", "dd",
            ]),
            timeout_secs: 30,
            output_limit_bytes: 100_000,
        }
    }
}

impl ShellSettings {
    pub fn policy(&self) -> CommandPolicy {
        CommandPolicy::new(self.allow.clone(), self.deny.clone())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Settings {
    pub fn validate(&self) -> Result<()> {
        if self.shell.timeout_secs == 0 {
            return Err(anyhow!("shell.timeout_secs must be > 0"));
        }
        if self.shell.output_limit_bytes == 0 {
            return Err(anyhow!("shell.output_limit_bytes must be > 0"));
        }
        if self.shell.allow.iter().any(|c| c.trim().is_empty()) {
            return Err(anyhow!("shell.allow entries must be non-empty"));
        }
        if self.shell.deny.iter().any(|c| c.trim().is_empty()) {
            return Err(anyhow!("shell.deny entries must be non-empty"));
        }
        Ok(())
    }

    /// Configured workspace root, or the current directory.
    pub fn workspace_root(&self) -> Result<PathBuf> {
        match &self.workspace_root {
            Some(path) => Ok(path.clone()),
            None => std::env::current_dir().context("resolve current directory"),
        }
    }

    /// Configured runs directory, or `<cwd>/runs`.
    pub fn runs_dir(&self) -> Result<PathBuf> {
        match &self.runs_dir {
            Some(path) => Ok(path.clone()),
            None => Ok(std::env::current_dir()
                .context("resolve current directory")?
                .join("runs")),
        }
    }
}

/// Load settings from a TOML file.
///
/// If the file is missing, returns `Settings::default()`.
pub fn load_settings(path: &Path) -> Result<Settings> {
    if !path.exists() {
        debug!(path = %path.display(), "settings file missing, using defaults");
        let settings = Settings::default();
        settings.validate()?;
        return Ok(settings);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let settings: Settings =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    settings
        .validate()
        .with_context(|| format!("invalid settings in {}", path.display()))?;
    debug!(path = %path.display(), "loaded settings");
    Ok(settings)
}

/// Atomically write settings to disk (temp file + rename).
pub fn write_settings(path: &Path, settings: &Settings) -> Result<()> {
    settings.validate()?;
    let mut buf = toml::to_string_pretty(settings).context("serialize settings toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp settings {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace settings {}", path.display()))?;
    Ok(())
}
