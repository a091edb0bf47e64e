//! Configuration management for batch intent execution
//!
//! This crate provides:
//! - Multiple config formats (TOML, YAML, JSON)
//! - Environment variable overrides
//! - Config validation with every problem reported at once

mod config;
mod loader;
mod validation;

pub use config::*;
pub use loader::*;
pub use validation::*;

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unsupported config format for {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Every failed check, joined with `; `
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("layered config: {0}")]
    Layered(#[from] ::config::ConfigError),

    #[error("toml: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
