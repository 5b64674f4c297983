//! CLI library components for the state file tool.

pub mod commands;
pub mod logging;
pub mod summary;
