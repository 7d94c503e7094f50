//! The binary entry point for the Stardrift backdrop.

use clap::Parser;
use stardrift_app::platform::AppDirs;
use stardrift_config::{CliArgs, Config};

fn main() {
    let args = CliArgs::parse();

    let dirs = match &args.config {
        Some(dir) => Some(AppDirs::from_config_dir(dir.clone())),
        None => AppDirs::resolve().ok(),
    };
    if let Some(dirs) = &dirs
        && let Err(e) = dirs.create_dirs()
    {
        eprintln!("Failed to create app directories: {e}");
    }

    let (mut config, config_error) = match &dirs {
        Some(dirs) => match Config::load_or_create(&dirs.config_dir) {
            Ok(config) => (config, None),
            Err(e) => (Config::default(), Some(e)),
        },
        None => (Config::default(), None),
    };
    config.apply_cli_overrides(&args);

    stardrift_log::init_logging(
        dirs.as_ref().map(|d| d.log_dir.as_path()),
        cfg!(debug_assertions),
        Some(&config),
    );

    match &dirs {
        Some(dirs) => tracing::info!("Config directory: {}", dirs.config_dir.display()),
        None => tracing::warn!("No config directory available, using defaults"),
    }
    if let Some(e) = config_error {
        tracing::warn!("Falling back to default config: {e}");
    }

    if let Err(e) = stardrift_app::window::run(config) {
        tracing::error!("Event loop failed: {e}");
        std::process::exit(1);
    }
}
