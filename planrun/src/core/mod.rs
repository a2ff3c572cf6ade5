//! Deterministic, pure logic shared by the plan execution engine.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod command;
pub mod digest;
pub mod invariants;
pub mod resolve;
pub mod risk;
pub mod trace;
pub mod types;
