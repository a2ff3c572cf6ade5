//! Test-only helpers: plan builders, scripted tools and temp workspaces.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Result, anyhow};
use serde_json::{Value, json};

use crate::core::types::{Inputs, Plan, RiskLevel, Step, ToolOutput};
use crate::executor::Executor;
use crate::io::config::{Settings, ShellSettings};
use crate::tools::{Tool, ToolRegistry, default_registry};

/// Create a step with a generated description; `inputs` must be a JSON object.
pub fn step(id: &str, tool: &str, inputs: Value) -> Step {
    Step {
        id: id.to_string(),
        description: format!("step {}", id),
        tool: tool.to_string(),
        inputs: inputs.as_object().cloned().unwrap_or_default(),
        produces: None,
    }
}

/// Create a LOW risk plan targeting `/tmp/workspace`.
pub fn plan_with_steps(steps: Vec<Step>) -> Plan {
    Plan {
        goal: "test plan".to_string(),
        risk_level: RiskLevel::Low,
        workspace_root: PathBuf::from("/tmp/workspace"),
        steps,
        success_criteria: vec!["all steps succeed".to_string()],
    }
}

/// Inputs received by a [`ScriptedTool`], shared with the test after registration.
pub type CallLog = Arc<Mutex<Vec<Inputs>>>;

/// Tool that records its inputs and returns a fixed output.
///
/// By default it succeeds and echoes the inputs back as `data`.
pub struct ScriptedTool {
    name: String,
    output: Option<ToolOutput>,
    calls: CallLog,
}

impl ScriptedTool {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            output: None,
            calls: CallLog::default(),
        }
    }

    /// Always return `output` instead of echoing.
    pub fn returning(name: &str, output: ToolOutput) -> Self {
        Self {
            output: Some(output),
            ..Self::new(name)
        }
    }

    pub fn call_log(&self) -> CallLog {
        Arc::clone(&self.calls)
    }
}

impl Tool for ScriptedTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, inputs: &Inputs) -> Result<ToolOutput> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(inputs.clone());
        Ok(self
            .output
            .clone()
            .unwrap_or_else(|| ToolOutput::ok(Value::Object(inputs.clone()))))
    }
}

/// Tool whose every call returns an `Err`, simulating an unclassified crash.
pub struct FailingTool {
    name: String,
}

impl FailingTool {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl Tool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, _inputs: &Inputs) -> Result<ToolOutput> {
        Err(anyhow!("{} crashed", self.name))
    }
}

/// Temporary workspace with a sibling runs directory.
pub struct TestWorkspace {
    _dir: tempfile::TempDir,
    pub root: PathBuf,
    pub runs: PathBuf,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let base = fs::canonicalize(dir.path()).expect("canonicalize tempdir");
        let root = base.join("workspace");
        fs::create_dir(&root).expect("create workspace");
        Self {
            _dir: dir,
            root,
            runs: base.join("runs"),
        }
    }

    pub fn write(&self, rel: &str, contents: &str) -> PathBuf {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&path, contents).expect("write file");
        path
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.root.join(rel)).expect("read file")
    }

    pub fn exists(&self, rel: &str) -> bool {
        self.root.join(rel).exists()
    }

    pub fn settings(&self) -> Settings {
        Settings {
            workspace_root: Some(self.root.clone()),
            runs_dir: Some(self.runs.clone()),
            shell: ShellSettings::default(),
        }
    }

    /// Executor with the built-in tools and default shell settings.
    pub fn executor(&self) -> Executor {
        Executor::from_settings(&self.settings()).expect("executor")
    }

    /// Executor over the built-in tools plus `extra`.
    pub fn executor_with(&self, extra: Vec<Box<dyn Tool>>) -> Executor {
        let mut registry =
            default_registry(&self.root, &ShellSettings::default()).expect("registry");
        for tool in extra {
            registry.register(tool).expect("register tool");
        }
        self.executor_with_registry(registry)
    }

    pub fn executor_with_registry(&self, registry: ToolRegistry) -> Executor {
        Executor::new(&self.root, &self.runs, registry).expect("executor")
    }

    /// LOW risk plan targeting this workspace.
    pub fn plan(&self, steps: Vec<Step>) -> Plan {
        Plan {
            workspace_root: self.root.clone(),
            ..plan_with_steps(steps)
        }
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

/// `read_text` step for `path`.
pub fn read_step(id: &str, path: &str) -> Step {
    step(id, "file", json!({"action": "read_text", "path": path}))
}

/// `write_text` step writing `content` (a literal or a reference) to `path`.
pub fn write_step(id: &str, path: &str, content: &str) -> Step {
    step(
        id,
        "file",
        json!({"action": "write_text", "path": path, "content": content}),
    )
}

/// Absolute path string of `rel` under `root`, as tools report it.
pub fn under(root: &Path, rel: &str) -> String {
    root.join(rel).to_string_lossy().into_owned()
}
