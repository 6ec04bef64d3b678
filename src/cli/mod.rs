//! Command-line interface
//!
//! This module contains the CLI commands and argument parsing
//! for the dashboard. Rendering lives in `main.rs`.

pub mod commands;

pub use commands::{Command, Opt, ThemeArg};
