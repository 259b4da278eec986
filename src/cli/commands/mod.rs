//! Command implementations for the CLI.
//!
//! Each command is implemented in its own module.

pub mod config;
pub mod list;
pub mod query;
pub mod serve;
