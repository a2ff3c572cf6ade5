//! Workspace-bounded file operations: `read_text`, `write_text`, `list_dir`.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::Pattern;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::core::types::{Inputs, ToolOutput};
use crate::tools::sandbox::{confine, relative_display};
use crate::tools::{Tool, optional_str, required_str};

pub const NAME: &str = "file";

/// File tool confined to a canonical workspace root.
#[derive(Debug, Clone)]
pub struct FileTool {
    root: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Overwrite,
    Append,
}

impl FileTool {
    /// `workspace_root` must exist; it is canonicalized once here.
    pub fn new(workspace_root: &Path) -> Result<Self> {
        let root = fs::canonicalize(workspace_root)
            .with_context(|| format!("resolve workspace root {}", workspace_root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_text(&self, inputs: &Inputs) -> Result<ToolOutput, String> {
        let requested = required_str(inputs, "path")?;
        let path = confine(&self.root, requested)?;
        if path.is_dir() {
            return Err(format!("Path is a directory, not a file: {}", requested));
        }
        let content = fs::read_to_string(&path).map_err(|err| match err.kind() {
            io::ErrorKind::NotFound => format!("File not found: {}", requested),
            io::ErrorKind::PermissionDenied => format!("Permission denied: {}", requested),
            _ => format!("Error reading file: {}", err),
        })?;
        debug!(path = %path.display(), bytes = content.len(), "read file");
        Ok(ToolOutput::ok(json!({
            "content": content,
            "path": path.to_string_lossy(),
        })))
    }

    fn write_text(&self, inputs: &Inputs) -> Result<ToolOutput, String> {
        let requested = required_str(inputs, "path")?;
        let content = required_str(inputs, "content")?;
        let mode = match optional_str(inputs, "mode", "overwrite")? {
            "overwrite" => WriteMode::Overwrite,
            "append" => WriteMode::Append,
            other => {
                return Err(format!(
                    "Invalid mode: {}. Must be 'overwrite' or 'append'",
                    other
                ));
            }
        };
        let path = confine(&self.root, requested)?;

        let write = || -> io::Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            match mode {
                WriteMode::Overwrite => fs::write(&path, content),
                WriteMode::Append => OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)?
                    .write_all(content.as_bytes()),
            }
        };
        write().map_err(|err| match err.kind() {
            io::ErrorKind::PermissionDenied => format!("Permission denied: {}", requested),
            _ => format!("Error writing file: {}", err),
        })?;

        debug!(path = %path.display(), bytes = content.len(), ?mode, "wrote file");
        Ok(ToolOutput::ok(json!({
            "path": path.to_string_lossy(),
            "bytes_written": content.len(),
        })))
    }

    fn list_dir(&self, inputs: &Inputs) -> Result<ToolOutput, String> {
        let requested = required_str(inputs, "path")?;
        let pattern = optional_str(inputs, "pattern", "*")?;
        let matcher = Pattern::new(pattern)
            .map_err(|err| format!("Invalid pattern '{}': {}", pattern, err))?;
        let path = confine(&self.root, requested)?;
        if !path.exists() {
            return Err(format!("Directory not found: {}", requested));
        }
        if !path.is_dir() {
            return Err(format!("Path is not a directory: {}", requested));
        }

        let read_error = |err: io::Error| match err.kind() {
            io::ErrorKind::PermissionDenied => format!("Permission denied: {}", requested),
            _ => format!("Error listing directory: {}", err),
        };
        let mut entries = Vec::new();
        for entry in fs::read_dir(&path).map_err(read_error)? {
            let entry = entry.map_err(read_error)?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !matcher.matches(&name) {
                continue;
            }
            let entry_path = entry.path();
            let metadata = fs::metadata(&entry_path).ok();
            let is_dir = metadata.as_ref().is_some_and(|m| m.is_dir());
            let is_file = metadata.as_ref().is_some_and(|m| m.is_file());
            let size = metadata.filter(|m| m.is_file()).map(|m| m.len());
            entries.push(json!({
                "name": name,
                "path": relative_display(&self.root, &entry_path),
                "is_dir": is_dir,
                "is_file": is_file,
                "size": size,
            }));
        }
        entries.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));

        let count = entries.len();
        debug!(path = %path.display(), count, "listed directory");
        Ok(ToolOutput::ok(json!({
            "path": path.to_string_lossy(),
            "entries": entries,
            "count": count,
        })))
    }
}

impl Tool for FileTool {
    fn name(&self) -> &str {
        NAME
    }

    #[instrument(skip_all, fields(action = inputs.get("action").and_then(serde_json::Value::as_str)))]
    fn execute(&self, inputs: &Inputs) -> Result<ToolOutput> {
        let action = inputs.get("action").and_then(Value::as_str).unwrap_or("");
        let outcome = match action {
            "read_text" => self.read_text(inputs),
            "write_text" => self.write_text(inputs),
            "list_dir" => self.list_dir(inputs),
            other => Err(format!(
                "Unknown action: {}. Valid actions: read_text, write_text, list_dir",
                if other.is_empty() { "None" } else { other }
            )),
        };
        Ok(outcome.unwrap_or_else(|error| {
            debug!(%error, "file action failed");
            ToolOutput::failed(error)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(value: Value) -> Inputs {
        value.as_object().cloned().unwrap_or_default()
    }

    fn tool() -> (tempfile::TempDir, FileTool) {
        let temp = tempfile::tempdir().expect("tempdir");
        let tool = FileTool::new(temp.path()).expect("tool");
        (temp, tool)
    }

    fn run(tool: &FileTool, value: Value) -> ToolOutput {
        tool.execute(&inputs(value)).expect("execute")
    }

    #[test]
    fn read_returns_content_and_absolute_path() {
        let (_temp, tool) = tool();
        fs::write(tool.root().join("test.txt"), "Hello, World!").expect("write");
        let out = run(&tool, json!({"action": "read_text", "path": "test.txt"}));
        assert!(out.success, "{:?}", out.error);
        assert_eq!(out.data["content"], "Hello, World!");
        assert_eq!(
            out.data["path"],
            tool.root().join("test.txt").to_string_lossy().into_owned()
        );
    }

    #[test]
    fn read_failures_are_distinct() {
        let (_temp, tool) = tool();
        fs::create_dir(tool.root().join("dir")).expect("mkdir");

        let missing = run(&tool, json!({"action": "read_text", "path": "nope.txt"}));
        assert_eq!(missing.error.as_deref(), Some("File not found: nope.txt"));
        assert!(missing.data.is_null());

        let dir = run(&tool, json!({"action": "read_text", "path": "dir"}));
        assert_eq!(dir.error.as_deref(), Some("Path is a directory, not a file: dir"));

        let no_path = run(&tool, json!({"action": "read_text"}));
        assert_eq!(no_path.error.as_deref(), Some("Missing 'path' in inputs"));
    }

    #[test]
    fn read_outside_workspace_is_rejected() {
        let (_temp, tool) = tool();
        let out = run(&tool, json!({"action": "read_text", "path": "../../etc/passwd"}));
        assert!(!out.success);
        assert!(out.error.unwrap_or_default().contains("outside workspace"));

        let absolute = run(&tool, json!({"action": "read_text", "path": "/etc/passwd"}));
        assert!(absolute.error.unwrap_or_default().contains("outside workspace"));
    }

    #[test]
    fn write_creates_parents_and_reports_bytes() {
        let (_temp, tool) = tool();
        let out = run(
            &tool,
            json!({"action": "write_text", "path": "out/nested/summary.md", "content": "héllo"}),
        );
        assert!(out.success, "{:?}", out.error);
        assert_eq!(out.data["bytes_written"], 6);
        assert_eq!(
            fs::read_to_string(tool.root().join("out/nested/summary.md")).expect("read"),
            "héllo"
        );
    }

    #[test]
    fn append_mode_extends_file() {
        let (_temp, tool) = tool();
        run(&tool, json!({"action": "write_text", "path": "log.txt", "content": "a"}));
        let out = run(
            &tool,
            json!({"action": "write_text", "path": "log.txt", "content": "b", "mode": "append"}),
        );
        assert!(out.success);
        assert_eq!(fs::read_to_string(tool.root().join("log.txt")).expect("read"), "ab");
    }

    #[test]
    fn write_validation_failures() {
        let (_temp, tool) = tool();
        let bad_mode = run(
            &tool,
            json!({"action": "write_text", "path": "a.txt", "content": "x", "mode": "truncate"}),
        );
        assert_eq!(
            bad_mode.error.as_deref(),
            Some("Invalid mode: truncate. Must be 'overwrite' or 'append'")
        );

        let no_content = run(&tool, json!({"action": "write_text", "path": "a.txt"}));
        assert_eq!(no_content.error.as_deref(), Some("Missing 'content' in inputs"));

        let not_string = run(
            &tool,
            json!({"action": "write_text", "path": "a.txt", "content": {"k": 1}}),
        );
        assert_eq!(
            not_string.error.as_deref(),
            Some("Input 'content' must be a string")
        );

        let escape = run(
            &tool,
            json!({"action": "write_text", "path": "../escape.txt", "content": "x"}),
        );
        assert!(escape.error.unwrap_or_default().contains("outside workspace"));
        assert!(!tool.root().join("a.txt").exists());
    }

    #[test]
    fn list_dir_filters_and_sorts_entries() {
        let (_temp, tool) = tool();
        let data = tool.root().join("data");
        fs::create_dir_all(data.join("sub")).expect("mkdir");
        fs::write(data.join("b.txt"), "bb").expect("write");
        fs::write(data.join("a.txt"), "a").expect("write");
        fs::write(data.join("c.md"), "c").expect("write");

        let all = run(&tool, json!({"action": "list_dir", "path": "data"}));
        assert!(all.success, "{:?}", all.error);
        assert_eq!(all.data["count"], 4);
        let names: Vec<&str> = all.data["entries"]
            .as_array()
            .expect("entries")
            .iter()
            .filter_map(|e| e["name"].as_str())
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "c.md", "sub"]);

        let txt = run(&tool, json!({"action": "list_dir", "path": "data", "pattern": "*.txt"}));
        assert_eq!(txt.data["count"], 2);
        let first = &txt.data["entries"][0];
        assert_eq!(first["path"], "data/a.txt");
        assert_eq!(first["is_file"], true);
        assert_eq!(first["is_dir"], false);
        assert_eq!(first["size"], 1);

        let sub = run(&tool, json!({"action": "list_dir", "path": "data", "pattern": "s?b"}));
        assert_eq!(sub.data["entries"][0]["size"], Value::Null);
        assert_eq!(sub.data["entries"][0]["is_dir"], true);
    }

    #[test]
    fn list_dir_on_file_or_missing_fails() {
        let (_temp, tool) = tool();
        fs::write(tool.root().join("f.txt"), "x").expect("write");
        let file = run(&tool, json!({"action": "list_dir", "path": "f.txt"}));
        assert_eq!(file.error.as_deref(), Some("Path is not a directory: f.txt"));
        let missing = run(&tool, json!({"action": "list_dir", "path": "nope"}));
        assert_eq!(missing.error.as_deref(), Some("Directory not found: nope"));
    }

    #[test]
    fn unknown_action_lists_valid_actions() {
        let (_temp, tool) = tool();
        let out = run(&tool, json!({"action": "delete", "path": "x"}));
        assert_eq!(
            out.error.as_deref(),
            Some("Unknown action: delete. Valid actions: read_text, write_text, list_dir")
        );
        let none = run(&tool, json!({"path": "x"}));
        assert!(none.error.unwrap_or_default().starts_with("Unknown action: None"));
    }

    #[test]
    fn list_dir_pattern_semantics() {
        let (_temp, tool) = tool();
        for name in [
            ".hidden", "notes.txt", "notes.txt.bak", "file1.log", "file10.log", "beta",
            "gamma", "]x", "a+b(c)",
        ] {
            fs::write(tool.root().join(name), "x").expect("write");
        }
        let names = |pattern: &str| -> Vec<String> {
            let out = run(&tool, json!({"action": "list_dir", "path": ".", "pattern": pattern}));
            assert!(out.success, "{pattern}: {:?}", out.error);
            out.data["entries"]
                .as_array()
                .expect("entries")
                .iter()
                .filter_map(|e| e["name"].as_str().map(str::to_string))
                .collect()
        };

        assert_eq!(names("*").len(), 9);
        assert_eq!(names("*.txt"), vec!["notes.txt"]);
        assert_eq!(names("file?.log"), vec!["file1.log"]);
        assert_eq!(names("[ab]*"), vec!["a+b(c)", "beta"]);
        assert!(!names("[!ab]*").contains(&"beta".to_string()));
        assert!(names("[!ab]*").contains(&"gamma".to_string()));
        assert_eq!(names("[]]x"), vec!["]x"]);
        assert_eq!(names("a+b(c)"), vec!["a+b(c)"]);
    }

    #[test]
    fn malformed_pattern_is_a_validation_failure() {
        let (_temp, tool) = tool();
        let out = run(&tool, json!({"action": "list_dir", "path": ".", "pattern": "a[b"}));
        assert!(!out.success);
        assert!(
            out.error
                .unwrap_or_default()
                .starts_with("Invalid pattern 'a[b'")
        );
    }
}
