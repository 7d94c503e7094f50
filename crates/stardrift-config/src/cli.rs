//! Command-line argument parsing for Stardrift.

use std::path::PathBuf;

use clap::Parser;

use crate::{Config, ThemePreference};

/// Stardrift command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "stardrift", about = "Animated starfield and nebula backdrop")]
pub struct CliArgs {
    /// Window width.
    #[arg(long)]
    pub width: Option<u32>,

    /// Window height.
    #[arg(long)]
    pub height: Option<u32>,

    /// Number of stars in the field.
    #[arg(long)]
    pub stars: Option<u32>,

    /// Maximum number of live nebula clouds.
    #[arg(long)]
    pub clouds: Option<u32>,

    /// Fixed RNG seed for a reproducible sky.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Palette theme (system, dark, light).
    #[arg(long)]
    pub theme: Option<ThemePreference>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(w) = args.width {
            self.window.width = w;
        }
        if let Some(h) = args.height {
            self.window.height = h;
        }
        if let Some(stars) = args.stars {
            self.background.star_count = stars;
        }
        if let Some(clouds) = args.clouds {
            self.background.cloud_cap = clouds;
        }
        if let Some(seed) = args.seed {
            self.background.seed = Some(seed);
        }
        if let Some(theme) = args.theme {
            self.background.theme = theme;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
