//! Agent Memory Workbench CLI
//!
//! Command-line front end over the workspace crates: trajectory memory
//! inspection, steps-file validation, recording, and replay-first runs.

pub mod cli;
pub mod config;
pub mod provider;
