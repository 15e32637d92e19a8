//! Upload of a finished rendition directory.

use crate::domain::renditions::MANIFEST_EXTENSION;
use crate::error::RenditionError;
use crate::ports::storage::StoragePort;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Upload every file directly under `local_dir` to `{remote_folder}/{file_name}`
/// and return the locator of the manifest. Subdirectories are not descended into.
pub async fn publish_rendition<S: StoragePort + ?Sized>(
    storage: &S,
    local_dir: &Path,
    remote_folder: &str,
) -> Result<String, RenditionError> {
    let files = list_files(local_dir).await?;
    let mut manifest_locator = None;

    for (name, path) in files {
        let key = format!("{}/{}", remote_folder.trim_end_matches('/'), name);
        let locator = storage.upload(&path, &key).await?;
        debug!(%key, "Published artifact");

        if is_manifest(&name) {
            manifest_locator = Some(locator);
        }
    }

    manifest_locator.ok_or_else(|| RenditionError::MissingManifest(local_dir.to_path_buf()))
}

fn is_manifest(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext == MANIFEST_EXTENSION)
}

async fn list_files(dir: &Path) -> Result<Vec<(String, PathBuf)>, RenditionError> {
    let read_err = |e: std::io::Error| RenditionError::publish(format!("{}: {}", dir.display(), e));

    let mut entries = tokio::fs::read_dir(dir).await.map_err(read_err)?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
        let file_type = entry.file_type().await.map_err(read_err)?;
        if !file_type.is_file() {
            continue;
        }
        files.push((entry.file_name().to_string_lossy().to_string(), entry.path()));
    }
    files.sort();
    Ok(files)
}
