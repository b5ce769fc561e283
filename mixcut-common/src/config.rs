//! Worker configuration
//!
//! Resolution priority (highest first):
//! 1. Command-line argument
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default
//!
//! Tiers 1 and 2 are applied by the binary on top of what [`WorkerConfig::load`]
//! returns. The resulting struct is built once at startup and handed to each
//! stage; nothing below `main` reads the process environment.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Queue delivery settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// How long a received message stays hidden before redelivery
    pub visibility_timeout_secs: u64,
    /// Deliveries allowed before a message is dead-lettered
    pub max_receive_count: u32,
    /// Sleep between polls of an empty queue
    pub poll_interval_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            visibility_timeout_secs: 15 * 60,
            max_receive_count: 3,
            poll_interval_ms: 1000,
        }
    }
}

impl QueueConfig {
    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Everything the stages need to know about their environment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// SQLite file holding jobs, tracks and the queue
    pub database_path: PathBuf,
    /// Directory backing the object store (one sub-directory per bucket)
    pub storage_root: PathBuf,
    /// Bucket source files are uploaded to
    pub uploads_bucket: String,
    /// Bucket cut tracks are uploaded to
    pub outputs_bucket: String,
    /// Key prefix for outputs; each job writes under `{prefix}/{job_id}/`
    pub output_prefix: String,
    /// Parent of the per-job scratch directories
    pub workspace_root: PathBuf,
    /// Audio cutting executable
    pub cutter_binary: String,
    /// Metadata tagging executable
    pub tagger_binary: String,
    /// Jobs processed in parallel by the worker loop
    pub max_concurrent_jobs: usize,
    pub queue: QueueConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            database_path: data_dir.join("mixcut.db"),
            storage_root: data_dir.join("objects"),
            uploads_bucket: "uploads".to_string(),
            outputs_bucket: "outputs".to_string(),
            output_prefix: "jobs".to_string(),
            workspace_root: std::env::temp_dir(),
            cutter_binary: "m4acut".to_string(),
            tagger_binary: "AtomicParsley".to_string(),
            max_concurrent_jobs: 4,
            queue: QueueConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Load configuration from TOML
    ///
    /// An explicitly given file must exist and parse. Without one, the
    /// platform config file is used if present; a missing file is not an
    /// error, compiled defaults apply.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        match default_config_path() {
            Some(path) if path.exists() => Self::from_file(&path),
            Some(path) => {
                warn!(
                    "Config file not found at {}, using defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            None => {
                warn!("Could not determine config directory, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        let config = Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Reject settings the stages cannot work with
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("uploads_bucket", &self.uploads_bucket),
            ("outputs_bucket", &self.outputs_bucket),
            ("cutter_binary", &self.cutter_binary),
            ("tagger_binary", &self.tagger_binary),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{} must not be empty", name)));
            }
        }
        if self.output_prefix.contains("..") {
            return Err(Error::Config("output_prefix must not contain '..'".to_string()));
        }
        if self.max_concurrent_jobs == 0 {
            return Err(Error::Config("max_concurrent_jobs must be at least 1".to_string()));
        }
        if self.queue.max_receive_count == 0 {
            return Err(Error::Config("queue.max_receive_count must be at least 1".to_string()));
        }
        if self.queue.visibility_timeout_secs == 0 {
            return Err(Error::Config(
                "queue.visibility_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// `~/.config/mixcut/config.toml` on Linux, platform equivalent elsewhere
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("mixcut").join("config.toml"))
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("mixcut"))
        .unwrap_or_else(|| PathBuf::from("./mixcut_data"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = WorkerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.queue.visibility_timeout(), Duration::from_secs(900));
        assert_eq!(config.queue.max_receive_count, 3);
        assert_eq!(config.output_prefix, "jobs");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = WorkerConfig::from_toml_str(
            r#"
            outputs_bucket = "cuts"
            max_concurrent_jobs = 2

            [queue]
            max_receive_count = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.outputs_bucket, "cuts");
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.queue.max_receive_count, 5);
        assert_eq!(config.queue.visibility_timeout_secs, 900);
        assert_eq!(config.uploads_bucket, "uploads");
    }

    #[test]
    fn test_invalid_toml() {
        let err = WorkerConfig::from_toml_str("max_concurrent_jobs = \"many\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = WorkerConfig::default();
        config.outputs_bucket = "  ".to_string();
        assert!(config.validate().is_err());

        let mut config = WorkerConfig::default();
        config.max_concurrent_jobs = 0;
        assert!(config.validate().is_err());

        let mut config = WorkerConfig::default();
        config.queue.max_receive_count = 0;
        assert!(config.validate().is_err());

        let mut config = WorkerConfig::default();
        config.output_prefix = "../escape".to_string();
        assert!(config.validate().is_err());
    }
}
