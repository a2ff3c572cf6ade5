//! I/O helpers: settings, process execution and run artifacts.

pub mod config;
pub mod process;
pub mod run_store;
