//! Tool abstraction and registry.
//!
//! A [`Tool`] is a capability unit the executor dispatches steps to. Tools
//! report expected failures (bad inputs, policy rejections, missing files) as
//! unsuccessful [`ToolOutput`] values; an `Err` is reserved for conditions the
//! tool could not classify, and the executor records it as a step failure.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;
use serde_json::Value;
use thiserror::Error;

use crate::core::types::{Inputs, ToolOutput};
use crate::io::config::ShellSettings;

pub mod file;
pub mod sandbox;
pub mod shell;

pub use file::FileTool;
pub use shell::ShellTool;

/// Capability unit invoked by name from plan steps.
pub trait Tool: Send + Sync {
    /// Registry key, referenced by `Step::tool`.
    fn name(&self) -> &str;

    fn execute(&self, inputs: &Inputs) -> Result<ToolOutput>;
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Tool '{0}' is already registered")]
pub struct DuplicateToolError(pub String);

/// Name to tool mapping. Each name can be registered once; tools are never removed.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<(), DuplicateToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(DuplicateToolError(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|tool| tool.as_ref())
    }

    /// Registered names, sorted.
    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.list())
            .finish()
    }
}

/// Registry with the built-in `file` and `shell` tools confined to `workspace_root`.
pub fn default_registry(workspace_root: &Path, shell: &ShellSettings) -> Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(FileTool::new(workspace_root)?))?;
    registry.register(Box::new(ShellTool::from_settings(workspace_root, shell)?))?;
    Ok(registry)
}

/// Required string input, or the validation message for a failed `ToolOutput`.
pub(crate) fn required_str<'a>(inputs: &'a Inputs, key: &str) -> Result<&'a str, String> {
    match inputs.get(key) {
        None | Some(Value::Null) => Err(format!("Missing '{}' in inputs", key)),
        Some(Value::String(value)) => Ok(value),
        Some(_) => Err(format!("Input '{}' must be a string", key)),
    }
}

/// Optional string input; absent or null yields `default`.
pub(crate) fn optional_str<'a>(
    inputs: &'a Inputs,
    key: &str,
    default: &'a str,
) -> Result<&'a str, String> {
    match inputs.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(Value::String(value)) => Ok(value),
        Some(_) => Err(format!("Input '{}' must be a string", key)),
    }
}
