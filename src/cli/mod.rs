// src/cli/mod.rs
//! Command-line interface
//!
//! `start` runs the miner, `benchmark` measures raw hash rate, `config`
//! writes a template and `probe` checks the API server.

/// Argument definitions for every subcommand
pub mod commands;

pub use commands::{
    Action, BenchmarkOptions, Commands, ConfigOptions, ProbeOptions, StartOptions,
};
