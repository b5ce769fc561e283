//! Audio cutter
//!
//! `m4acut -C <sheet> <audio>` splits an M4A file at the sheet's INDEX
//! points, writing one `.m4a` per track into its working directory.

use std::path::Path;

use async_trait::async_trait;
use mixcut_common::Result;

use super::tool::run_tool;

/// Splits a recording into per-track files
#[async_trait]
pub trait AudioCutter: Send + Sync {
    /// Cut `audio` according to `sheet`, writing the segments into `workdir`
    async fn cut(&self, workdir: &Path, sheet: &Path, audio: &Path) -> Result<()>;
}

/// Subprocess runner for `m4acut`
#[derive(Debug, Clone)]
pub struct M4aCutter {
    binary: String,
}

impl M4aCutter {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn arguments(sheet: &Path, audio: &Path) -> Vec<String> {
        vec![
            "-C".to_string(),
            sheet.to_string_lossy().into_owned(),
            audio.to_string_lossy().into_owned(),
        ]
    }
}

#[async_trait]
impl AudioCutter for M4aCutter {
    async fn cut(&self, workdir: &Path, sheet: &Path, audio: &Path) -> Result<()> {
        tracing::info!(
            audio = %audio.display(),
            sheet = %sheet.display(),
            "Cutting audio"
        );
        run_tool(&self.binary, Self::arguments(sheet, audio), Some(workdir)).await?;
        Ok(())
    }
}
