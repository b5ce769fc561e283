//! Local-directory object store
//!
//! Objects live at `{root}/{bucket}/{key}`. Writes go to a temporary sibling
//! first and are renamed into place, so readers never see a partial object.
//! Listing skips those in-progress files.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use mixcut_common::{Error, ObjectLocation, Result};
use uuid::Uuid;
use walkdir::WalkDir;

use super::ObjectStore;

const STAGING_PREFIX: &str = ".upload-";

#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of an object
    ///
    /// Rejects bucket names and keys that would escape the store root.
    pub fn object_path(&self, location: &ObjectLocation) -> Result<PathBuf> {
        if location.bucket.is_empty() || location.bucket.contains(['/', '\\']) || location.bucket == ".." {
            return Err(Error::InvalidInput(format!("Invalid bucket name: {}", location.bucket)));
        }

        let key = Path::new(&location.key);
        let key_is_plain = !location.key.is_empty()
            && key
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !key_is_plain {
            return Err(Error::InvalidInput(format!("Invalid object key: {}", location.key)));
        }

        Ok(self.root.join(&location.bucket).join(key))
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn get(&self, location: &ObjectLocation) -> Result<Vec<u8>> {
        let path = self.object_path(location)?;
        match tokio::fs::read(&path).await {
            Ok(body) => Ok(body),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(Error::NotFound(format!("Object {}", location)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, location: &ObjectLocation, body: Vec<u8>) -> Result<()> {
        let path = self.object_path(location)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let staging = path.with_file_name(format!("{}{}", STAGING_PREFIX, Uuid::new_v4()));
        tokio::fs::write(&staging, body).await?;
        if let Err(e) = tokio::fs::rename(&staging, &path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }

        tracing::debug!(object = %location, "Stored object");
        Ok(())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> Result<Vec<ObjectLocation>> {
        let prefix = prefix.trim_matches('/');
        let dir = self.object_path(&ObjectLocation::new(bucket, prefix))?;
        let bucket = bucket.to_string();
        let prefix = prefix.to_string();

        tokio::task::spawn_blocking(move || list_keys(&dir, &bucket, &prefix))
            .await
            .map_err(|e| Error::Internal(format!("Listing task failed: {}", e)))?
    }

    async fn get_to_file(&self, location: &ObjectLocation, path: &Path) -> Result<()> {
        let source = self.object_path(location)?;
        match tokio::fs::copy(&source, path).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound && !source.exists() => {
                Err(Error::NotFound(format!("Object {}", location)))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Walk `dir` and turn every stored file into a key under `prefix`
fn list_keys(dir: &Path, bucket: &str, prefix: &str) -> Result<Vec<ObjectLocation>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut objects = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file()
            || entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX)
        {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let relative: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        objects.push(ObjectLocation::new(
            bucket,
            format!("{}/{}", prefix, relative.join("/")),
        ));
    }
    objects.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(objects)
}
