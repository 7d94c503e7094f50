//! Per-user directories for configuration and logs.

use std::path::{Path, PathBuf};
use std::{fmt, io};

use stardrift_config::{APP_NAME, default_config_dir};

/// Errors that can occur while resolving or creating app directories.
#[derive(Debug)]
pub enum PlatformError {
    /// The OS did not report a configuration directory.
    NoConfigDir,
    Io(io::Error),
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoConfigDir => write!(f, "could not determine OS configuration directory"),
            Self::Io(e) => write!(f, "platform I/O error: {e}"),
        }
    }
}

impl std::error::Error for PlatformError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for PlatformError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// Where Stardrift keeps `config.ron` and its debug log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppDirs {
    pub config_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl AppDirs {
    /// `<os config dir>/stardrift` with a `logs` subdirectory.
    pub fn resolve() -> Result<Self, PlatformError> {
        default_config_dir()
            .map(Self::from_config_dir)
            .ok_or(PlatformError::NoConfigDir)
    }

    /// Same layout rooted at `root` instead of the OS directory.
    pub fn resolve_with_root(root: &Path) -> Self {
        Self::from_config_dir(root.join(APP_NAME))
    }

    /// Use an explicit config directory, as given with `--config`.
    pub fn from_config_dir(config_dir: PathBuf) -> Self {
        let log_dir = config_dir.join("logs");
        Self {
            config_dir,
            log_dir,
        }
    }

    pub fn create_dirs(&self) -> Result<(), PlatformError> {
        std::fs::create_dir_all(&self.config_dir)?;
        std::fs::create_dir_all(&self.log_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_with_root_layout() {
        let root = Path::new("/tmp/stardrift-test-root");
        let dirs = AppDirs::resolve_with_root(root);
        assert_eq!(dirs.config_dir, root.join("stardrift"));
        assert_eq!(dirs.log_dir, root.join("stardrift").join("logs"));
    }

    #[test]
    fn test_explicit_config_dir_keeps_logs_inside() {
        let dirs = AppDirs::from_config_dir(PathBuf::from("custom"));
        assert_eq!(dirs.config_dir, PathBuf::from("custom"));
        assert_eq!(dirs.log_dir, PathBuf::from("custom/logs"));
    }

    #[test]
    fn test_create_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = AppDirs::resolve_with_root(tmp.path());
        dirs.create_dirs().unwrap();
        assert!(dirs.config_dir.is_dir());
        assert!(dirs.log_dir.is_dir());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            PlatformError::NoConfigDir.to_string(),
            "could not determine OS configuration directory"
        );
        let io_err = PlatformError::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(io_err.to_string().contains("gone"));
    }
}
