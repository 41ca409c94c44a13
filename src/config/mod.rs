// src/config/mod.rs
//! Miner settings read from a TOML file
//!
//! A missing file falls back to built-in defaults. `start` flags and their
//! environment variables are applied on top (see [`crate::cli`]), and the
//! merged result is validated once before the engine starts.

/// [`Config`], its defaults and the conversions into engine settings
pub mod config;

pub use config::{Config, JobSourceKind};

/// Commented TOML file written by the `config` subcommand
pub fn generate_template() -> String {
    Config::generate_template()
}
