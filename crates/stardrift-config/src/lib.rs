//! Configuration system for Stardrift.
//!
//! Runtime-configurable settings persisted to disk as RON, with CLI overrides
//! via clap and forward/backward compatible serialization.

mod cli;
mod config;
mod error;

pub use cli::CliArgs;
pub use config::{
    APP_NAME, BackgroundConfig, Config, DebugConfig, ThemePreference, WindowConfig,
    default_config_dir,
};
pub use error::ConfigError;
