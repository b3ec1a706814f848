//! Shared helpers for CLI commands.

pub mod input;
pub mod logging;
