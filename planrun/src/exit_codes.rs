//! Stable exit codes for planrun CLI commands.

/// Command succeeded; for `run`/`execute`, every step succeeded.
pub const OK: i32 = 0;
/// Command failed due to invalid settings/plan/run directory or other errors.
pub const INVALID: i32 = 1;
/// The plan executed but at least one step failed.
pub const FAILED: i32 = 2;
/// The user declined confirmation, or a HIGH risk plan was refused under `--yes`.
pub const DECLINED: i32 = 3;
