use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::engine::acquisition::LoopTiming;

/// Session settings, persisted as JSON
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Frame store capacity in frames
    pub buffer_capacity: usize,

    /// Configured camera exposure; each fetch waits exposure + margin
    pub exposure_ms: u64,
    pub fetch_margin_ms: u64,

    pub stop_timeout_ms: u64,

    /// Period of live analysis cycles
    pub analysis_interval_ms: u64,

    /// Target modulation frequency in Hz
    pub frequency_hz: f64,
    pub min_cycles: usize,

    pub output_path: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 1000,
            exposure_ms: 10,
            fetch_margin_ms: 100,
            stop_timeout_ms: 10_000,
            analysis_interval_ms: 10_000,
            frequency_hz: 5.0,
            min_cycles: 2,
            output_path: PathBuf::from("results.flk"),
        }
    }
}

impl SessionConfig {
    /// Read the config at `path`, writing defaults first if it does not exist
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)
                        .await
                        .context("Failed to create config directory")?;
                }
            }
            Self::default().save(path).await?;
        }

        let content = fs::read_to_string(path)
            .await
            .context(format!("Failed to read config from {:?}", path))?;
        let config: SessionConfig =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;
        config.validate()?;
        Ok(config)
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;

        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, json)
            .await
            .context("Failed to write temporary config file")?;
        fs::rename(&temp_path, path)
            .await
            .context("Failed to atomically update config file")?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity == 0 {
            anyhow::bail!("buffer_capacity must be at least 1");
        }
        if !(self.frequency_hz.is_finite() && self.frequency_hz > 0.0) {
            anyhow::bail!("frequency_hz must be positive, got {}", self.frequency_hz);
        }
        if self.min_cycles == 0 {
            anyhow::bail!("min_cycles must be at least 1");
        }
        if self.analysis_interval_ms == 0 {
            anyhow::bail!("analysis_interval_ms must be non-zero");
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.exposure_ms + self.fetch_margin_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn analysis_interval(&self) -> Duration {
        Duration::from_millis(self.analysis_interval_ms)
    }

    pub fn loop_timing(&self) -> LoopTiming {
        LoopTiming {
            fetch_timeout: self.fetch_timeout(),
            stop_timeout: self.stop_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_config_written_with_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let config = SessionConfig::load(&path).await.unwrap();
        assert_eq!(config, SessionConfig::default());
        assert!(path.exists());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"buffer_capacity": 64, "frequency_hz": 2.5}"#).unwrap();
        assert_eq!(config.buffer_capacity, 64);
        assert_eq!(config.frequency_hz, 2.5);
        assert_eq!(config.min_cycles, 2);
        assert_eq!(config.fetch_timeout(), Duration::from_millis(110));
    }

    #[test]
    fn test_validate_rejects_zero_cycles() {
        let config = SessionConfig {
            min_cycles: 0,
            ..SessionConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_file_fails_to_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, r#"{"frequency_hz": -1.0}"#).unwrap();

        let result = tokio_test::block_on(SessionConfig::load(&path));
        assert!(result.is_err());
    }
}
