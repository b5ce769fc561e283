//! Per-job scratch directory
//!
//! Every processing attempt starts from an empty `{root}/job-{id}`, so files
//! left behind by a crashed attempt never leak into the output set.

use std::path::{Path, PathBuf};

use mixcut_common::Result;
use uuid::Uuid;
use walkdir::WalkDir;

/// Audio file name inside the workspace
pub const SOURCE_AUDIO: &str = "source.m4a";
/// Sheet file name inside the workspace
pub const SOURCE_SHEET: &str = "source.cue";

const OUTPUT_EXTENSION: &str = "m4a";

#[derive(Debug)]
pub struct JobWorkspace {
    dir: PathBuf,
}

impl JobWorkspace {
    pub fn dir_for(root: &Path, job_id: Uuid) -> PathBuf {
        root.join(format!("job-{}", job_id))
    }

    /// Remove any stale directory for this job and create a fresh one
    ///
    /// On failure whatever is left at the workspace path is removed (best
    /// effort) before the error is returned.
    pub async fn prepare(root: &Path, job_id: Uuid) -> Result<Self> {
        let dir = Self::dir_for(root, job_id);
        match Self::rebuild(&dir).await {
            Ok(()) => Ok(Self { dir }),
            Err(e) => {
                tracing::warn!(job_id = %job_id, error = %e, "Failed to prepare workspace");
                discard(&dir).await;
                Err(e.into())
            }
        }
    }

    async fn rebuild(dir: &Path) -> std::io::Result<()> {
        match tokio::fs::remove_dir_all(dir).await {
            Ok(()) => tracing::debug!(workspace = %dir.display(), "Removed stale workspace"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        tokio::fs::create_dir_all(dir).await
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn source_audio(&self) -> PathBuf {
        self.file(SOURCE_AUDIO)
    }

    pub fn source_sheet(&self) -> PathBuf {
        self.file(SOURCE_SHEET)
    }

    /// Cut segments: top-level `.m4a` files other than the source, sorted by
    /// file name
    pub fn output_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let is_output = entry.path().extension().is_some_and(|ext| ext == OUTPUT_EXTENSION)
                && entry.file_name() != SOURCE_AUDIO;
            if is_output {
                files.push(entry.into_path());
            }
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }

    /// Delete the directory; failures are logged, never returned
    pub async fn cleanup(self) {
        discard(&self.dir).await;
    }
}

/// Remove a workspace path, directory or not
async fn discard(path: &Path) {
    let removed = match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    };
    if let Err(e) = removed {
        tracing::warn!(
            workspace = %path.display(),
            error = %e,
            "Failed to clean up workspace"
        );
    }
}
