use crate::adapters::http::blob::BlobFetcher;
use crate::error::{PipelineError, RenditionError};
use crate::ports::storage::StoragePort;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// FsAdapter implements StoragePort on a local directory acting as the object store.
/// Fetch URLs are http(s) links or `file://` URLs pointing inside that directory.
#[derive(Clone)]
pub struct FsAdapter {
    root: PathBuf,
    fetcher: BlobFetcher,
}

impl FsAdapter {
    pub fn new(root: impl Into<PathBuf>, fetcher: BlobFetcher) -> Self {
        Self {
            root: root.into(),
            fetcher,
        }
    }

    fn object_path(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    /// Resolve a `file://` URL to a file under the store root.
    async fn local_source(&self, fetch_url: &str) -> Result<PathBuf, PipelineError> {
        let raw = fetch_url.strip_prefix("file://").ok_or_else(|| {
            PipelineError::download(format!("unsupported fetch URL scheme: {}", fetch_url))
        })?;

        let source = tokio::fs::canonicalize(raw)
            .await
            .map_err(|e| PipelineError::download(format!("{}: {}", raw, e)))?;
        let root = tokio::fs::canonicalize(&self.root)
            .await
            .map_err(|e| PipelineError::download(format!("{}: {}", self.root.display(), e)))?;

        if !source.starts_with(&root) {
            return Err(PipelineError::download(format!(
                "{} is outside the store root",
                source.display()
            )));
        }
        Ok(source)
    }
}

#[async_trait]
impl StoragePort for FsAdapter {
    async fn download(&self, fetch_url: &str, local_path: &Path) -> Result<(), PipelineError> {
        if fetch_url.starts_with("http://") || fetch_url.starts_with("https://") {
            return self.fetcher.fetch_to_file(fetch_url, local_path).await;
        }

        let source = self.local_source(fetch_url).await?;
        tokio::fs::copy(&source, local_path).await.map_err(|e| {
            PipelineError::download(format!("copy from {} failed: {}", source.display(), e))
        })?;
        Ok(())
    }

    async fn upload(&self, local_path: &Path, key: &str) -> Result<String, RenditionError> {
        let destination = self.object_path(key);
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| RenditionError::publish(format!("{}: {}", parent.display(), e)))?;
        }
        tokio::fs::copy(local_path, &destination)
            .await
            .map_err(|e| RenditionError::publish(format!("{}: {}", destination.display(), e)))?;
        Ok(destination.to_string_lossy().to_string())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    pub(crate) fn adapter(root: &Path) -> FsAdapter {
        FsAdapter::new(
            root,
            BlobFetcher::with_client(
                reqwest::Client::new(),
                Duration::from_secs(5),
                Duration::from_secs(60),
            ),
        )
    }

    #[tokio::test]
    async fn test_upload_overwrites_and_returns_path() {
        let store = tempdir().unwrap();
        let work = tempdir().unwrap();
        let adapter = adapter(store.path());
        let local = work.path().join("playlist.m3u8");

        std::fs::write(&local, b"first").unwrap();
        adapter.upload(&local, "users/42/movie-360p/playlist.m3u8").await.unwrap();
        std::fs::write(&local, b"second").unwrap();
        let locator = adapter
            .upload(&local, "users/42/movie-360p/playlist.m3u8")
            .await
            .unwrap();

        let expected = store
            .path()
            .join("users")
            .join("42")
            .join("movie-360p")
            .join("playlist.m3u8");
        assert_eq!(locator, expected.to_string_lossy());
        assert_eq!(std::fs::read(expected).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_download_copies_file_urls() {
        let store = tempdir().unwrap();
        let work = tempdir().unwrap();
        let source = store.path().join("movie.mp4");
        std::fs::write(&source, b"video").unwrap();
        let target = work.path().join("copy.mp4");

        let url = format!("file://{}", source.display());
        adapter(store.path()).download(&url, &target).await.unwrap();

        assert_eq!(std::fs::read(target).unwrap(), b"video");
    }

    #[tokio::test]
    async fn test_download_missing_source_is_a_download_error() {
        let store = tempdir().unwrap();
        let url = format!("file://{}", store.path().join("missing.mp4").display());

        let result = adapter(store.path())
            .download(&url, &store.path().join("x.mp4"))
            .await;

        assert!(matches!(result, Err(PipelineError::Download(_))));
    }

    #[tokio::test]
    async fn test_download_refuses_files_outside_the_store() {
        let store = tempdir().unwrap();
        let elsewhere = tempdir().unwrap();
        let secret = elsewhere.path().join("secret.txt");
        std::fs::write(&secret, b"do not copy").unwrap();
        let target = store.path().join("x.mp4");
        let adapter = adapter(store.path());

        let file_url = adapter
            .download(&format!("file://{}", secret.display()), &target)
            .await;
        let escaping = adapter
            .download(
                &format!(
                    "file://{}/../{}/secret.txt",
                    store.path().display(),
                    elsewhere.path().file_name().unwrap().to_string_lossy()
                ),
                &target,
            )
            .await;
        let plain_path = adapter
            .download(&secret.to_string_lossy(), &target)
            .await;

        assert!(matches!(file_url, Err(PipelineError::Download(_))));
        assert!(matches!(escaping, Err(PipelineError::Download(_))));
        assert!(matches!(plain_path, Err(PipelineError::Download(_))));
        assert!(!target.exists());
    }
}
