//! Run directory layout and artifact persistence.
//!
//! Each execution gets `<runs_root>/<YYYYMMDD-HHMMSS>[-N]/` holding
//! `plan.json`, `trace.jsonl` and `result.json`. Run directories are only
//! ever created and appended to.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use chrono::Local;
use jsonschema::validator_for;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::core::invariants::validate_plan;
use crate::core::trace::{ExecutionResult, TraceEntry};
use crate::core::types::Plan;

pub const PLAN_FILE: &str = "plan.json";
pub const TRACE_FILE: &str = "trace.jsonl";
pub const RESULT_FILE: &str = "result.json";

const RUN_DIR_FORMAT: &str = "%Y%m%d-%H%M%S";
const MAX_SUFFIX: u32 = 1000;

const PLAN_SCHEMA: &str = include_str!("../../schemas/plan/v1.schema.json");

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    pub dir: PathBuf,
    pub plan_path: PathBuf,
    pub trace_path: PathBuf,
    pub result_path: PathBuf,
}

impl RunPaths {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            plan_path: dir.join(PLAN_FILE),
            trace_path: dir.join(TRACE_FILE),
            result_path: dir.join(RESULT_FILE),
        }
    }
}

/// Create a fresh run directory named after the local time.
///
/// `create_dir` fails on an existing directory, so a name already taken by a
/// concurrent or same-second run is retried with `-1`, `-2`, ... suffixes.
pub fn create_run_dir(runs_root: &Path) -> Result<RunPaths> {
    fs::create_dir_all(runs_root)
        .with_context(|| format!("create runs directory {}", runs_root.display()))?;
    let stamp = Local::now().format(RUN_DIR_FORMAT).to_string();

    for suffix in 0..MAX_SUFFIX {
        let name = if suffix == 0 {
            stamp.clone()
        } else {
            format!("{stamp}-{suffix}")
        };
        let dir = runs_root.join(&name);
        match fs::create_dir(&dir) {
            Ok(()) => {
                debug!(run_dir = %dir.display(), "created run directory");
                return Ok(RunPaths::new(&dir));
            }
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(err) => {
                return Err(err).with_context(|| format!("create run directory {}", dir.display()));
            }
        }
    }
    Err(anyhow!(
        "no free run directory for {} under {}",
        stamp,
        runs_root.display()
    ))
}

pub fn write_plan(paths: &RunPaths, plan: &Plan) -> Result<()> {
    debug!(path = %paths.plan_path.display(), steps = plan.steps.len(), "writing plan");
    write_json_atomic(&paths.plan_path, plan)
}

/// Append one trace entry as a single JSON line.
pub fn append_trace(paths: &RunPaths, entry: &TraceEntry) -> Result<()> {
    let mut line = serde_json::to_string(entry).context("serialize trace entry")?;
    line.push('\n');
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.trace_path)
        .with_context(|| format!("open trace {}", paths.trace_path.display()))?;
    file.write_all(line.as_bytes())
        .with_context(|| format!("append trace {}", paths.trace_path.display()))?;
    Ok(())
}

pub fn write_result(paths: &RunPaths, result: &ExecutionResult) -> Result<()> {
    debug!(
        path = %paths.result_path.display(),
        status = %result.overall_status,
        "writing result"
    );
    write_json_atomic(&paths.result_path, result)
}

/// Load and validate a plan from disk (schema + invariants).
pub fn load_plan(path: &Path) -> Result<Plan> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read plan {}", path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse plan {}", path.display()))?;
    plan_from_value(value).with_context(|| format!("invalid plan {}", path.display()))
}

/// Validate a parsed JSON document and convert it into a [`Plan`].
pub fn plan_from_value(value: Value) -> Result<Plan> {
    validate_schema(&value)?;
    let plan: Plan = serde_json::from_value(value).context("deserialize plan")?;
    let errors = validate_plan(&plan);
    if !errors.is_empty() {
        return Err(anyhow!("plan invariants failed: {}", errors.join("; ")));
    }
    Ok(plan)
}

fn validate_schema(plan: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(PLAN_SCHEMA).context("parse plan schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    if !compiled.is_valid(plan) {
        let messages = compiled
            .iter_errors(plan)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "plan schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

/// Load the finalized result stored in `run_dir`.
pub fn load_trace(run_dir: &Path) -> Result<ExecutionResult> {
    let path = run_dir.join(RESULT_FILE);
    debug!(path = %path.display(), "loading result");
    let contents =
        fs::read_to_string(&path).with_context(|| format!("read result {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parse result {}", path.display()))
}

/// Load the per-step trace lines stored in `run_dir`, in execution order.
pub fn load_trace_entries(run_dir: &Path) -> Result<Vec<TraceEntry>> {
    let path = run_dir.join(TRACE_FILE);
    let file = fs::File::open(&path).with_context(|| format!("open trace {}", path.display()))?;
    let mut entries = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("read trace {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: TraceEntry = serde_json::from_str(&line)
            .with_context(|| format!("parse trace {} line {}", path.display(), idx + 1))?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Run directories under `runs_root`, oldest first. A missing root yields none.
pub fn list_runs(runs_root: &Path) -> Result<Vec<PathBuf>> {
    if !runs_root.exists() {
        return Ok(Vec::new());
    }
    let mut runs = Vec::new();
    for entry in fs::read_dir(runs_root)
        .with_context(|| format!("read runs directory {}", runs_root.display()))?
    {
        let entry = entry.with_context(|| format!("read entry in {}", runs_root.display()))?;
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            runs.push(entry.path());
        }
    }
    runs.sort_by_key(|path| run_sort_key(path));
    Ok(runs)
}

/// `(timestamp, suffix)` so `-10` sorts after `-2`.
fn run_sort_key(path: &Path) -> (String, u32) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stamp_len = "YYYYMMDD-HHMMSS".len();
    if name.len() > stamp_len + 1 && name.is_char_boundary(stamp_len) {
        let (stamp, rest) = name.split_at(stamp_len);
        if let Some(Ok(suffix)) = rest.strip_prefix('-').map(str::parse::<u32>) {
            return (stamp.to_string(), suffix);
        }
    }
    (name, 0)
}

/// Most recent run directory, if any.
pub fn latest_run(runs_root: &Path) -> Result<Option<PathBuf>> {
    Ok(list_runs(runs_root)?.pop())
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value)
        .with_context(|| format!("serialize {}", path.display()))?;
    buf.push('\n');
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf).with_context(|| format!("write temp {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{RiskLevel, StepStatus};
    use crate::test_support::{plan_with_steps, step};
    use serde_json::{Map, json};

    /// Two runs started in the same second land in distinct directories.
    #[test]
    fn run_dirs_never_collide() {
        let temp = tempfile::tempdir().expect("tempdir");
        let first = create_run_dir(temp.path()).expect("first");
        let second = create_run_dir(temp.path()).expect("second");
        assert_ne!(first.dir, second.dir);
        assert!(first.dir.is_dir());
        assert!(second.dir.is_dir());
        assert_eq!(list_runs(temp.path()).expect("list").len(), 2);
    }

    #[test]
    fn run_dir_name_is_a_timestamp() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = create_run_dir(temp.path()).expect("create");
        let name = paths
            .dir
            .file_name()
            .and_then(|n| n.to_str())
            .expect("name")
            .to_string();
        assert_eq!(name.len(), 15, "{name}");
        assert_eq!(name.as_bytes()[8], b'-');
        assert!(
            name.chars()
                .enumerate()
                .all(|(i, c)| i == 8 || c.is_ascii_digit())
        );
    }

    #[test]
    fn plan_written_then_loaded_matches() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = create_run_dir(temp.path()).expect("create");
        let plan = plan_with_steps(vec![step(
            "1",
            "file",
            json!({"action": "read_text", "path": "a.txt"}),
        )]);
        write_plan(&paths, &plan).expect("write");
        let loaded = load_plan(&paths.plan_path).expect("load");
        assert_eq!(loaded, plan);
        let raw = fs::read_to_string(&paths.plan_path).expect("read");
        assert!(raw.ends_with("}\n"));
        assert!(raw.contains("\n  \"goal\""));
    }

    #[test]
    fn schema_rejects_plan_without_steps() {
        let err = plan_from_value(json!({
            "goal": "g",
            "risk_level": "LOW",
            "workspace_root": "/tmp",
            "steps": []
        }))
        .expect_err("invalid");
        assert!(format!("{err:#}").contains("schema validation failed"));
    }

    #[test]
    fn schema_rejects_unknown_risk_level() {
        let err = plan_from_value(json!({
            "goal": "g",
            "risk_level": "EXTREME",
            "workspace_root": "/tmp",
            "steps": [{"id": "1", "tool": "file"}]
        }))
        .expect_err("invalid");
        assert!(format!("{err:#}").contains("schema validation failed"));
    }

    #[test]
    fn invariants_reject_duplicate_ids() {
        let err = plan_from_value(json!({
            "goal": "g",
            "risk_level": "LOW",
            "workspace_root": "/tmp",
            "steps": [{"id": "1", "tool": "file"}, {"id": "1", "tool": "shell"}]
        }))
        .expect_err("invalid");
        assert!(format!("{err:#}").contains("duplicate step id '1'"));
    }

    #[test]
    fn traces_append_one_line_per_entry() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = create_run_dir(temp.path()).expect("create");
        let mut first = TraceEntry::new("1", "file", "aaaaaaaaaaaaaaaa".to_string());
        first.succeed(Map::new(), None).expect("succeed");
        let mut second = TraceEntry::new("2", "shell", "bbbbbbbbbbbbbbbb".to_string());
        second.fail("denied").expect("fail");

        append_trace(&paths, &first).expect("append");
        append_trace(&paths, &second).expect("append");

        let raw = fs::read_to_string(&paths.trace_path).expect("read");
        assert_eq!(raw.lines().count(), 2);
        let entries = load_trace_entries(&paths.dir).expect("load");
        assert_eq!(entries, vec![first, second]);
    }

    #[test]
    fn result_round_trips_through_load_trace() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = create_run_dir(temp.path()).expect("create");
        let mut result = ExecutionResult::new("g", RiskLevel::Low, temp.path().to_path_buf(), 1);
        let mut trace = TraceEntry::new("1", "file", "cccccccccccccccc".to_string());
        trace.succeed(Map::new(), None).expect("succeed");
        result.traces.push(trace);
        result.finalize();
        result.run_dir = Some(paths.dir.clone());

        write_result(&paths, &result).expect("write");
        let loaded = load_trace(&paths.dir).expect("load");
        assert_eq!(loaded, result);
        assert_eq!(loaded.overall_status, StepStatus::Success);
    }

    #[test]
    fn list_runs_orders_numeric_suffixes() {
        let temp = tempfile::tempdir().expect("tempdir");
        for name in [
            "20250102-000000",
            "20250101-120000-10",
            "20250101-120000",
            "20250101-120000-2",
        ] {
            fs::create_dir(temp.path().join(name)).expect("mkdir");
        }
        fs::write(temp.path().join("notes.txt"), "x").expect("write");

        let names: Vec<String> = list_runs(temp.path())
            .expect("list")
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        assert_eq!(
            names,
            vec![
                "20250101-120000",
                "20250101-120000-2",
                "20250101-120000-10",
                "20250102-000000"
            ]
        );
        assert_eq!(
            latest_run(temp.path()).expect("latest"),
            Some(temp.path().join("20250102-000000"))
        );
    }

    #[test]
    fn list_runs_on_missing_root_is_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(list_runs(&temp.path().join("nope")).expect("list").is_empty());
    }
}
