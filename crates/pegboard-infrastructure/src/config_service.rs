//! Configuration service.
//!
//! Loads [`PegboardConfig`] from `config.toml` and caches it.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use pegboard_core::config::PegboardConfig;
use pegboard_core::error::{PegboardError, Result};

/// Loads and caches the runtime configuration.
///
/// A missing file is created with defaults; an unreadable one falls back to
/// defaults without being overwritten.
#[derive(Debug, Clone)]
pub struct ConfigService {
    path: PathBuf,
    config: Arc<RwLock<Option<PegboardConfig>>>,
}

impl ConfigService {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            config: Arc::new(RwLock::new(None)),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Gets the configuration, loading from file if not cached.
    pub fn get_config(&self) -> PegboardConfig {
        if let Ok(read_lock) = self.config.read() {
            if let Some(cached) = read_lock.as_ref() {
                return cached.clone();
            }
        }

        let loaded = match self.load_config() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("[ConfigService] Using defaults: {}", e);
                PegboardConfig::default()
            }
        };

        if let Ok(mut write_lock) = self.config.write() {
            *write_lock = Some(loaded.clone());
        }
        loaded
    }

    /// Invalidates the cache, forcing a reload on next access.
    pub fn invalidate_cache(&self) {
        if let Ok(mut write_lock) = self.config.write() {
            *write_lock = None;
        }
    }

    /// Writes `config` to disk and caches it.
    pub fn save(&self, config: &PegboardConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, config.to_toml_string()?)?;
        if let Ok(mut write_lock) = self.config.write() {
            *write_lock = Some(config.clone());
        }
        Ok(())
    }

    fn load_config(&self) -> Result<PegboardConfig> {
        if !self.path.exists() {
            let defaults = PegboardConfig::default();
            if let Err(e) = self.save(&defaults) {
                tracing::warn!("[ConfigService] Could not write default config: {}", e);
            }
            return Ok(defaults);
        }

        let content = std::fs::read_to_string(&self.path)?;
        PegboardConfig::from_toml_str(&content).map_err(|e| {
            PegboardError::config(format!("{}: {}", self.path.display(), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_created_with_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        let service = ConfigService::new(path.clone());

        assert_eq!(service.get_config(), PegboardConfig::default());
        assert!(path.exists());
    }

    #[test]
    fn test_reads_overrides_and_caches() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "data_request_timeout_ms = 1234\n").unwrap();
        let service = ConfigService::new(path.clone());
        assert_eq!(service.get_config().data_request_timeout_ms, 1234);

        std::fs::write(&path, "data_request_timeout_ms = 99\n").unwrap();
        assert_eq!(service.get_config().data_request_timeout_ms, 1234);
        service.invalidate_cache();
        assert_eq!(service.get_config().data_request_timeout_ms, 99);
    }

    #[test]
    fn test_malformed_file_falls_back_without_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "grid_size_px = \"wide\"").unwrap();
        let service = ConfigService::new(path.clone());
        assert_eq!(service.get_config().grid_size_px, 20);
        assert!(std::fs::read_to_string(&path).unwrap().contains("wide"));
    }
}
