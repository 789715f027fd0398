use std::path::{Path, PathBuf};

use crate::error::{ConfigError, required};

use super::{CosError, ObjectStore, archive, transfer};

/// The TKE files directory of one HPCS instance and its archive in the bucket.
///
/// Layout under `root` (`CLOUDTKEFILES`): `<guid>_tkefiles/` and `<guid>_tkefiles.zip`.
#[derive(Debug, Clone, PartialEq)]
pub struct TkeWorkspace {
    root: PathBuf,
    guid: String,
}

impl TkeWorkspace {
    pub fn new(root: impl Into<PathBuf>, guid: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            guid: guid.into(),
        }
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self::new(
            required(&lookup, "CLOUDTKEFILES")?,
            required(&lookup, "HPCS_GUID")?,
        ))
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(crate::error::process_env)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn name(&self) -> String {
        format!("{}_tkefiles", self.guid)
    }

    pub fn dir(&self) -> PathBuf {
        self.root.join(self.name())
    }

    pub fn archive_key(&self) -> String {
        format!("{}.zip", self.name())
    }

    pub fn archive_path(&self) -> PathBuf {
        self.root.join(self.archive_key())
    }

    /// Downloads and extracts the workspace archive.
    ///
    /// Returns `Ok(false)` when the bucket has no archive yet; the directory is
    /// created empty in that case.
    pub async fn restore<S: ObjectStore + ?Sized>(&self, store: &S) -> Result<bool, CosError> {
        let dir = self.dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| CosError::io(&dir, e))?;

        let archive = match transfer::try_download(store, &self.archive_key(), &self.root).await {
            Ok(path) => path,
            Err(CosError::NotFound { key }) => {
                tracing::warn!(key = %key, dir = %dir.display(), "no workspace archive, starting empty");
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        let entries = archive::unzip(&archive, &dir)?;
        tokio::fs::remove_file(&archive)
            .await
            .map_err(|e| CosError::io(&archive, e))?;
        tracing::info!(dir = %dir.display(), entries, "workspace restored");
        Ok(true)
    }

    /// Archives the workspace and uploads it. The local archive is removed after a
    /// successful upload and kept otherwise.
    pub async fn publish<S: ObjectStore + ?Sized>(&self, store: &S) -> Result<bool, CosError> {
        let dir = self.dir();
        let archive = self.archive_path();
        let files = archive::zip_dir(&dir, &archive)?;
        tracing::info!(dir = %dir.display(), files, "workspace archived");
        Ok(transfer::upload(store, &archive, &self.archive_key()).await)
    }
}
