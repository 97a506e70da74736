//! Platform paths for Pegboard files.

use std::path::{Path, PathBuf};

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// The platform config directory could not be determined.
    ConfigDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::ConfigDirNotFound => write!(f, "Cannot find config directory"),
        }
    }
}

impl std::error::Error for PathError {}

/// Resolves every file Pegboard reads or writes.
///
/// # Directory Structure
///
/// ```text
/// ~/.config/pegboard/
/// ├── config.toml              # Runtime tunables
/// ├── pegboard-data.json       # App snapshot (canvases, keys, lock)
/// ├── pegboard-widgets.json    # Floating windows to restore
/// ├── panes/<chatbox-id>/      # Per-pane cache, one file per key
/// └── logs/                    # Rolling log files
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PegboardPaths {
    root: PathBuf,
}

impl PegboardPaths {
    /// Uses the platform config directory (`dirs::config_dir()/pegboard`).
    pub fn from_platform() -> Result<Self, PathError> {
        let base = dirs::config_dir().ok_or(PathError::ConfigDirNotFound)?;
        Ok(Self::with_root(base.join("pegboard")))
    }

    /// Uses `root` instead of the platform directory (tests, portable installs).
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    pub fn snapshot_file(&self) -> PathBuf {
        self.root.join("pegboard-data.json")
    }

    pub fn widgets_file(&self) -> PathBuf {
        self.root.join("pegboard-widgets.json")
    }

    pub fn panes_dir(&self) -> PathBuf {
        self.root.join("panes")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }
}
