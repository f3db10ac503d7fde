//! Runtime settings.
//!
//! Defaults are compiled in. With the `config` feature enabled, settings are
//! read from `<config dir>/rfewer/config.toml`; any key may be omitted.
//! Command-line flags override whatever was loaded here.

use crate::error::{FewerError, Result};
use std::time::Duration;

/// Tunables shared by the line index, the filter slots and the session loop.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(serde::Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct Settings {
    /// Files smaller than this many bytes are read into memory instead of mapped
    pub in_memory_threshold: u64,

    /// Number of completed filter match sets kept for reuse
    pub cache_capacity: usize,

    /// How long the session waits between event-channel polls
    pub poll_interval_ms: u64,

    /// Lines between progress reports and abort checks
    pub progress_interval: u32,
}

impl Settings {
    pub const DEFAULT_IN_MEMORY_THRESHOLD: u64 = 50 * 1024 * 1024; // 50MB
    pub const DEFAULT_CACHE_CAPACITY: usize = 64;
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
    pub const DEFAULT_PROGRESS_INTERVAL: u32 = 10_000;

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Reject values the rest of the crate cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(FewerError::config("cache_capacity must be at least 1"));
        }
        if self.progress_interval == 0 {
            return Err(FewerError::config("progress_interval must be at least 1"));
        }
        Ok(())
    }

    /// Load settings from the user's config directory.
    ///
    /// A missing file yields the defaults; a malformed one is an error.
    #[cfg(feature = "config")]
    pub fn load() -> Result<Self> {
        let Some(dir) = dirs::config_dir() else {
            return Ok(Self::default());
        };
        let path = dir.join("rfewer").join("config.toml");
        match std::fs::read_to_string(&path) {
            Ok(text) => {
                log::debug!("loading settings from {}", path.display());
                Self::from_toml(&text)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(FewerError::config(format!(
                "cannot read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Without the `config` feature there is nothing to load.
    #[cfg(not(feature = "config"))]
    pub fn load() -> Result<Self> {
        Ok(Self::default())
    }

    #[cfg(feature = "config")]
    pub fn from_toml(text: &str) -> Result<Self> {
        let settings: Self = toml::from_str(text).map_err(|e| FewerError::config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            in_memory_threshold: Self::DEFAULT_IN_MEMORY_THRESHOLD,
            cache_capacity: Self::DEFAULT_CACHE_CAPACITY,
            poll_interval_ms: Self::DEFAULT_POLL_INTERVAL_MS,
            progress_interval: Self::DEFAULT_PROGRESS_INTERVAL,
        }
    }
}
