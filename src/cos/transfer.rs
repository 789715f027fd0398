use std::path::{Path, PathBuf};

use super::{CosError, ObjectStore};

/// Local file name for an object key: its last path segment.
pub fn local_name(key: &str) -> Result<&str, CosError> {
    key.rsplit('/')
        .next()
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .ok_or_else(|| CosError::InvalidKey {
            key: key.to_string(),
        })
}

pub async fn try_download<S: ObjectStore + ?Sized>(
    store: &S,
    key: &str,
    dest_dir: &Path,
) -> Result<PathBuf, CosError> {
    let path = dest_dir.join(local_name(key)?);
    let body = store.get_object(key).await?;
    tokio::fs::write(&path, body)
        .await
        .map_err(|e| CosError::io(&path, e))?;
    Ok(path)
}

pub async fn try_upload<S: ObjectStore + ?Sized>(
    store: &S,
    local_path: &Path,
    key: &str,
) -> Result<(), CosError> {
    let body = tokio::fs::read(local_path)
        .await
        .map_err(|e| CosError::io(local_path, e))?;
    store.put_object(key, body).await?;
    tokio::fs::remove_file(local_path)
        .await
        .map_err(|e| CosError::io(local_path, e))?;
    Ok(())
}

/// Downloads `key` into `dest_dir`. Failures are logged and yield `None`.
pub async fn download<S: ObjectStore + ?Sized>(
    store: &S,
    key: &str,
    dest_dir: &Path,
) -> Option<PathBuf> {
    match try_download(store, key, dest_dir).await {
        Ok(path) => {
            tracing::info!(key, path = %path.display(), "download complete");
            Some(path)
        }
        Err(e) => {
            tracing::error!(key, error = %e, "download failed");
            None
        }
    }
}

/// Uploads `local_path` as `key`, removing the local file once the upload succeeded.
/// Failures are logged and yield `false`.
pub async fn upload<S: ObjectStore + ?Sized>(store: &S, local_path: &Path, key: &str) -> bool {
    match try_upload(store, local_path, key).await {
        Ok(()) => {
            tracing::info!(key, path = %local_path.display(), "upload complete, local copy removed");
            true
        }
        Err(e) => {
            tracing::error!(key, path = %local_path.display(), error = %e, "upload failed");
            false
        }
    }
}
