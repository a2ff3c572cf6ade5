//! Sandboxed, traced execution of structured plans.
//!
//! A [`core::types::Plan`] is an ordered list of tool invocations. The
//! [`executor::Executor`] runs its steps in order, substituting
//! `ref:step:<id>` inputs with earlier outputs, stops at the first failure,
//! and persists the plan, one trace line per step and the final result to a
//! fresh run directory. The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (data model, trace lifecycle,
//!   reference resolution, digests, command screening, risk policy).
//! - **[`io`]**: Side-effecting operations (settings, process execution, run artifacts).
//! - **[`tools`]**: Capability units the executor dispatches to, confined to the workspace.
//!
//! [`planner`] and [`approval`] are the thin collaborators the CLI uses to
//! produce plans and confirm them before execution.

pub mod approval;
pub mod core;
pub mod executor;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod planner;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tools;
