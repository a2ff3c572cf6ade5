//! Plan execution: sequential dispatch, reference resolution and tracing.
//!
//! Each [`Executor::execute_plan`] call persists the plan to a fresh run
//! directory, runs steps in order until one fails, appends a trace line per
//! processed step and writes the finalized result. Ordinary step failures are
//! reported in the [`ExecutionResult`]; only artifact I/O errors escape as `Err`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use serde_json::{Map, Value, json};
use tracing::{debug, info, instrument, warn};

use crate::core::digest::digest;
use crate::core::resolve::{StepOutputs, resolve_inputs};
use crate::core::trace::{ExecutionResult, TraceEntry};
use crate::core::types::{Plan, Step, StepStatus};
use crate::io::config::Settings;
use crate::io::run_store::{self, append_trace, create_run_dir, write_plan, write_result};
use crate::tools::{ToolRegistry, default_registry};

pub struct Executor {
    workspace_root: PathBuf,
    runs_root: PathBuf,
    registry: ToolRegistry,
    /// Serializes `execute_plan` calls so workspace effects never interleave.
    run_lock: Mutex<()>,
}

impl Executor {
    /// `workspace_root` must exist and is canonicalized; `runs_root` is created on first run.
    pub fn new(workspace_root: &Path, runs_root: &Path, registry: ToolRegistry) -> Result<Self> {
        let workspace_root = fs::canonicalize(workspace_root)
            .with_context(|| format!("resolve workspace root {}", workspace_root.display()))?;
        Ok(Self {
            workspace_root,
            runs_root: runs_root.to_path_buf(),
            registry,
            run_lock: Mutex::new(()),
        })
    }

    /// Build an executor with a fresh built-in registry from `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let workspace_root = settings.workspace_root()?;
        let runs_root = settings.runs_dir()?;
        let registry = default_registry(&workspace_root, &settings.shell)?;
        Self::new(&workspace_root, &runs_root, registry)
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn runs_root(&self) -> &Path {
        &self.runs_root
    }

    /// Execute `plan` step by step, stopping at the first failure.
    ///
    /// With `dry_run` no tool is invoked: every step is recorded as a success
    /// with `{"dry_run": true}` outputs. The plan is still persisted.
    #[instrument(skip_all, fields(goal = %plan.goal, steps = plan.steps.len(), dry_run))]
    pub fn execute_plan(&self, plan: &Plan, dry_run: bool) -> Result<ExecutionResult> {
        let _guard = self
            .run_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut result = ExecutionResult::new(
            plan.goal.clone(),
            plan.risk_level,
            self.workspace_root.clone(),
            plan.steps.len(),
        );

        let paths = create_run_dir(&self.runs_root)?;
        write_plan(&paths, plan)?;
        result.run_dir = Some(paths.dir.clone());
        info!(run_dir = %paths.dir.display(), "executing plan");

        let mut outputs = StepOutputs::new();
        for step in &plan.steps {
            let trace = if dry_run {
                dry_run_trace(step)?
            } else {
                self.run_step(step, &mut outputs, &mut result.produced_files)?
            };
            append_trace(&paths, &trace)?;

            let failed = trace.status == StepStatus::Failure;
            if failed {
                warn!(
                    step_id = %trace.step_id,
                    error = trace.error.as_deref().unwrap_or(""),
                    "step failed, stopping"
                );
            }
            result.traces.push(trace);
            if failed {
                break;
            }
        }

        result.finalize();
        write_result(&paths, &result).context("persist execution result")?;
        info!(
            status = %result.overall_status,
            successful = result.successful_steps,
            failed = result.failed_steps,
            skipped = result.skipped_steps,
            "plan finished"
        );
        Ok(result)
    }

    /// Resolve, dispatch and record one step.
    fn run_step(
        &self,
        step: &Step,
        outputs: &mut StepOutputs,
        produced_files: &mut Vec<String>,
    ) -> Result<TraceEntry> {
        let mut trace = TraceEntry::new(&step.id, &step.tool, inputs_digest(step));
        let resolved = resolve_inputs(&step.inputs, outputs);
        trace.inputs = resolved.clone();

        let Some(tool) = self.registry.get(&step.tool) else {
            trace.fail(format!("Tool '{}' not found in registry", step.tool))?;
            return Ok(trace);
        };

        trace.start()?;
        debug!(step_id = %step.id, tool = %step.tool, "dispatching step");
        let output = match tool.execute(&resolved) {
            Ok(output) => output,
            Err(err) => {
                trace.fail(format!("{:#}", err))?;
                return Ok(trace);
            }
        };

        outputs.insert(step.id.clone(), output.data.clone());
        let recorded = outputs_object(&output.data);
        if output.success {
            if let Some(path) = output.data.get("path").and_then(Value::as_str) {
                produced_files.push(path.to_string());
            }
            let output_digest = digest(&Value::Object(recorded.clone()));
            trace.succeed(recorded, Some(output_digest))?;
        } else {
            if !output.data.is_null() {
                trace.outputs = Some(recorded);
            }
            trace.fail(
                output
                    .error
                    .unwrap_or_else(|| "tool reported failure without an error".to_string()),
            )?;
        }
        Ok(trace)
    }

    /// Load and validate a plan file (schema + invariants).
    pub fn load_plan(&self, path: &Path) -> Result<Plan> {
        run_store::load_plan(path)
    }

    /// Load the stored result of a previous run.
    pub fn load_trace(&self, run_dir: &Path) -> Result<ExecutionResult> {
        run_store::load_trace(run_dir)
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("workspace_root", &self.workspace_root)
            .field("runs_root", &self.runs_root)
            .field("registry", &self.registry)
            .finish()
    }
}

fn inputs_digest(step: &Step) -> String {
    digest(&Value::Object(step.inputs.clone()))
}

fn dry_run_trace(step: &Step) -> Result<TraceEntry> {
    let mut trace = TraceEntry::new(&step.id, &step.tool, inputs_digest(step));
    trace.inputs = step.inputs.clone();
    let mut outputs = Map::new();
    outputs.insert("dry_run".to_string(), json!(true));
    trace.succeed(outputs, None)?;
    Ok(trace)
}

/// Mapping outputs are kept as-is, null becomes `{}`, anything else is wrapped as `{"value": ...}`.
fn outputs_object(data: &Value) -> Map<String, Value> {
    match data {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other.clone());
            map
        }
    }
}
