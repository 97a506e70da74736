//! Runtime tunables.
//!
//! Every field has a serde default so a partial (or empty) `config.toml`
//! is valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PegboardConfig {
    /// Pixels per grid unit.
    pub grid_size_px: u32,
    /// Minimum interval between throttled stream publishes.
    pub stream_throttle_ms: u64,
    /// Thinking-duration counter refresh interval.
    pub thinking_tick_ms: u64,
    /// How long the sync guard stays held after applying a remote patch.
    pub sync_guard_delay_ms: u64,
    /// Floating window data request timeout.
    pub data_request_timeout_ms: u64,
    /// Debounce for snapshot and widget-state writes.
    pub snapshot_debounce_ms: u64,
    pub scroll_highlight_ms: u64,
    /// Wheel silence that ends a pan gesture.
    pub pan_gesture_idle_ms: u64,
    /// Archived panes older than this are purged on restore. 0 keeps them forever.
    pub archived_retention_days: u32,
}

impl Default for PegboardConfig {
    fn default() -> Self {
        Self {
            grid_size_px: 20,
            stream_throttle_ms: 16,
            thinking_tick_ms: 100,
            sync_guard_delay_ms: 100,
            data_request_timeout_ms: 5000,
            snapshot_debounce_ms: 500,
            scroll_highlight_ms: 300,
            pan_gesture_idle_ms: 150,
            archived_retention_days: 30,
        }
    }
}

impl PegboardConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn stream_throttle(&self) -> Duration {
        Duration::from_millis(self.stream_throttle_ms)
    }

    pub fn thinking_tick(&self) -> Duration {
        Duration::from_millis(self.thinking_tick_ms)
    }

    pub fn sync_guard_delay(&self) -> Duration {
        Duration::from_millis(self.sync_guard_delay_ms)
    }

    pub fn data_request_timeout(&self) -> Duration {
        Duration::from_millis(self.data_request_timeout_ms)
    }

    pub fn snapshot_debounce(&self) -> Duration {
        Duration::from_millis(self.snapshot_debounce_ms)
    }

    pub fn scroll_highlight(&self) -> Duration {
        Duration::from_millis(self.scroll_highlight_ms)
    }

    pub fn pan_gesture_idle(&self) -> Duration {
        Duration::from_millis(self.pan_gesture_idle_ms)
    }

    /// `None` when archived panes are kept forever.
    pub fn archived_retention(&self) -> Option<Duration> {
        (self.archived_retention_days > 0)
            .then(|| Duration::from_secs(u64::from(self.archived_retention_days) * 24 * 60 * 60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PegboardConfig::from_toml_str("sync_guard_delay_ms = 250\n").unwrap();
        assert_eq!(config.sync_guard_delay(), Duration::from_millis(250));
        assert_eq!(config.data_request_timeout(), Duration::from_millis(5000));
        assert_eq!(config.grid_size_px, 20);
    }

    #[test]
    fn test_round_trip_through_toml() {
        let config = PegboardConfig::default();
        let text = config.to_toml_string().unwrap();
        assert_eq!(PegboardConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_zero_retention_keeps_forever() {
        let config = PegboardConfig {
            archived_retention_days: 0,
            ..Default::default()
        };
        assert!(config.archived_retention().is_none());
    }
}
