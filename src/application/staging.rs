//! Job-scoped local staging.
//!
//! A [`Workspace`] mirrors the job's logical blob path under the temp root.
//! Its deletion unit is the first path segment under that root, so jobs from
//! the same top-level folder share one teardown boundary. The store counts
//! leases per boundary and only removes it once the last job sharing it is
//! done; until then each job only removes the files it owns. A blob whose
//! workspace is still in use cannot be staged again: a second job for it
//! would share the source file and rendition directories.

use crate::domain::jobs::JobDescriptor;
use crate::error::PipelineError;
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

type Leases = Arc<Mutex<LeaseTable>>;

#[derive(Debug, Default)]
struct LeaseTable {
    /// Live workspaces per deletion root
    roots: HashMap<PathBuf, usize>,
    /// Source paths without extension of the workspaces in use
    stems: HashSet<PathBuf>,
}

impl LeaseTable {
    fn acquire(&mut self, root: &Path, stem: &Path) -> bool {
        if !self.stems.insert(stem.to_path_buf()) {
            return false;
        }
        *self.roots.entry(root.to_path_buf()).or_insert(0) += 1;
        true
    }

    /// Returns true if the lease just released was the last one on `root`.
    fn release(&mut self, root: &Path, stem: &Path) -> bool {
        self.stems.remove(stem);
        match self.roots.get_mut(root) {
            Some(count) if *count > 1 => {
                *count -= 1;
                false
            }
            Some(_) => {
                self.roots.remove(root);
                true
            }
            None => true,
        }
    }
}

#[derive(Clone, Debug)]
pub struct StagingStore {
    temp_root: PathBuf,
    leases: Leases,
}

impl StagingStore {
    pub fn new(temp_root: impl Into<PathBuf>) -> Self {
        Self {
            temp_root: temp_root.into(),
            leases: Arc::default(),
        }
    }

    pub fn temp_root(&self) -> &Path {
        &self.temp_root
    }

    /// Compute the workspace layout for a job and create the source file's parent directories.
    /// Fails while another workspace for the same blob stem is in use.
    pub async fn prepare(&self, job: &JobDescriptor) -> Result<Workspace, PipelineError> {
        let relative = job.local_relative_path();
        let source_path = self.temp_root.join(&relative);

        let first_segment = match relative.components().next() {
            Some(Component::Normal(segment)) if path_is_valid(&relative) => segment.to_owned(),
            _ => {
                error!(path = %source_path.display(), "Refusing to stage invalid logical path");
                return Err(PipelineError::staging(
                    source_path,
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "logical path must be relative and free of parent components",
                    ),
                ));
            }
        };
        let root = self.temp_root.join(first_segment);
        let stem = source_path.with_extension("");

        if !lock(&self.leases).acquire(&root, &stem) {
            warn!(source = %source_path.display(), "Blob is already being processed");
            return Err(PipelineError::staging(
                source_path,
                io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    "another job is processing this blob",
                ),
            ));
        }

        // Leases are held from here on, the guard releases them on any exit
        let workspace = Workspace {
            source_path,
            root,
            stem,
            owned: Mutex::new(Vec::new()),
            leases: self.leases.clone(),
            released: false,
        };

        if let Some(parent) = workspace.source_path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                error!(path = %parent.display(), error = %e, "Failed to create staging directory");
                return Err(PipelineError::staging(parent, e));
            }
        }

        debug!(
            root = %workspace.root.display(),
            source = %workspace.source_path.display(),
            "Workspace prepared"
        );
        Ok(workspace)
    }
}

fn lock(leases: &Leases) -> std::sync::MutexGuard<'_, LeaseTable> {
    leases.lock().unwrap_or_else(|e| e.into_inner())
}

fn path_is_valid(path: &Path) -> bool {
    path.components()
        .all(|component| matches!(component, Component::Normal(_)))
}

/// Local staging area of one job. Released exactly once: by [`Workspace::teardown`],
/// by [`Workspace::retain`], or when dropped.
#[derive(Debug)]
pub struct Workspace {
    source_path: PathBuf,
    root: PathBuf,
    stem: PathBuf,
    owned: Mutex<Vec<PathBuf>>,
    leases: Leases,
    released: bool,
}

impl Workspace {
    /// Where the downloaded source video lives.
    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Deletion unit of this workspace.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create (if needed) the output directory `{baseName}-{label}` next to the source file.
    pub async fn allocate_rendition_dir(&self, base_name: &str, label: &str) -> io::Result<PathBuf> {
        let parent = self.source_path.parent().unwrap_or(&self.root);
        let dir = parent.join(format!("{}-{}", base_name, label));
        tokio::fs::create_dir_all(&dir).await?;

        let mut owned = self.owned.lock().unwrap_or_else(|e| e.into_inner());
        if !owned.contains(&dir) {
            owned.push(dir.clone());
        }
        Ok(dir)
    }

    /// Remove the workspace. Failures are logged, never returned.
    pub async fn teardown(mut self) {
        self.released = true;

        for path in self.owned_paths() {
            if let Err(e) = remove_path(&path).await {
                warn!(path = %path.display(), error = %e, "Failed to remove staged path");
            }
        }

        let last = lock(&self.leases).release(&self.root, &self.stem);
        if last {
            match remove_path(&self.root).await {
                Ok(()) => info!(root = %self.root.display(), "Workspace removed"),
                Err(e) => warn!(root = %self.root.display(), error = %e, "Failed to remove workspace"),
            }
        } else {
            debug!(root = %self.root.display(), "Workspace root still leased by another job");
        }
    }

    /// Keep the workspace on disk for diagnosis. Its root lease is never released,
    /// so a shared root outlives every other job that uses it. The blob itself
    /// may be staged again.
    pub fn retain(mut self) -> PathBuf {
        self.released = true;
        lock(&self.leases).stems.remove(&self.stem);
        warn!(root = %self.root.display(), "Workspace retained for diagnosis");
        self.root.clone()
    }

    fn owned_paths(&self) -> Vec<PathBuf> {
        let mut paths = self.owned.lock().unwrap_or_else(|e| e.into_inner()).clone();
        paths.push(self.source_path.clone());
        paths
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        // Blocking removal on the dropping thread: only reached when a job
        // ends without teardown, and Drop may run outside a runtime.
        for path in self.owned_paths() {
            if let Err(e) = remove_path_sync(&path) {
                warn!(path = %path.display(), error = %e, "Failed to remove dropped staged path");
            }
        }
        let last = lock(&self.leases).release(&self.root, &self.stem);
        if last {
            if let Err(e) = remove_path_sync(&self.root) {
                warn!(root = %self.root.display(), error = %e, "Failed to remove dropped workspace");
            }
        }
    }
}

async fn remove_path(path: &Path) -> io::Result<()> {
    match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

fn remove_path_sync(path: &Path) -> io::Result<()> {
    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => std::fs::remove_dir_all(path),
        Ok(_) => std::fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::jobs::sample_job;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_prepare_uses_first_segment_as_root() {
        let temp = tempdir().unwrap();
        let store = StagingStore::new(temp.path());

        let workspace = store.prepare(&sample_job("users/42/movie.mp4")).await.unwrap();

        assert_eq!(workspace.root(), temp.path().join("users"));
        assert_eq!(
            workspace.source_path(),
            temp.path().join("users").join("42").join("movie.mp4")
        );
        assert!(temp.path().join("users").join("42").is_dir());
        workspace.teardown().await;
    }

    #[tokio::test]
    async fn test_allocate_rendition_dir_is_idempotent() {
        let temp = tempdir().unwrap();
        let store = StagingStore::new(temp.path());
        let workspace = store.prepare(&sample_job("users/42/movie.mp4")).await.unwrap();

        let first = workspace.allocate_rendition_dir("movie", "360p").await.unwrap();
        let second = workspace.allocate_rendition_dir("movie", "360p").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first, temp.path().join("users").join("42").join("movie-360p"));
        assert!(first.is_dir());
        workspace.teardown().await;
    }

    #[tokio::test]
    async fn test_teardown_removes_root() {
        let temp = tempdir().unwrap();
        let store = StagingStore::new(temp.path());
        let workspace = store.prepare(&sample_job("users/42/movie.mp4")).await.unwrap();
        std::fs::write(workspace.source_path(), b"video").unwrap();
        let out = workspace.allocate_rendition_dir("movie", "480p").await.unwrap();
        std::fs::write(out.join("playlist.m3u8"), b"#EXTM3U").unwrap();

        workspace.teardown().await;

        assert!(!temp.path().join("users").exists());
    }

    #[tokio::test]
    async fn test_shared_root_survives_until_last_lease() {
        let temp = tempdir().unwrap();
        let store = StagingStore::new(temp.path());
        let first = store.prepare(&sample_job("users/42/a.mp4")).await.unwrap();
        let second = store.prepare(&sample_job("users/43/b.mp4")).await.unwrap();
        std::fs::write(first.source_path(), b"a").unwrap();
        std::fs::write(second.source_path(), b"b").unwrap();
        let first_source = first.source_path().to_path_buf();
        let second_source = second.source_path().to_path_buf();

        first.teardown().await;
        assert!(!first_source.exists());
        assert!(second_source.exists());

        second.teardown().await;
        assert!(!temp.path().join("users").exists());
    }

    #[tokio::test]
    async fn test_dropped_workspace_is_removed() {
        let temp = tempdir().unwrap();
        let store = StagingStore::new(temp.path());
        {
            let workspace = store.prepare(&sample_job("users/42/movie.mp4")).await.unwrap();
            std::fs::write(workspace.source_path(), b"video").unwrap();
        }
        assert!(!temp.path().join("users").exists());
    }

    #[tokio::test]
    async fn test_drop_releases_blob_when_removal_fails() {
        let temp = tempdir().unwrap();
        let store = StagingStore::new(temp.path());
        let root = temp.path().join("users");
        {
            let workspace = store.prepare(&sample_job("users/42/movie.mp4")).await.unwrap();
            std::fs::write(workspace.source_path(), b"video").unwrap();
            // Source path now runs through a regular file
            std::fs::remove_dir_all(&root).unwrap();
            std::fs::write(&root, b"not a directory").unwrap();
        }

        assert!(!root.exists());
        let again = store.prepare(&sample_job("users/42/movie.mp4")).await.unwrap();
        again.teardown().await;
        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_retained_workspace_stays_on_disk() {
        let temp = tempdir().unwrap();
        let store = StagingStore::new(temp.path());
        let workspace = store.prepare(&sample_job("users/42/movie.mp4")).await.unwrap();

        let root = workspace.retain();

        assert!(root.is_dir());
    }

    #[tokio::test]
    async fn test_same_blob_cannot_be_staged_twice() {
        let temp = tempdir().unwrap();
        let store = StagingStore::new(temp.path());
        let first = store.prepare(&sample_job("users/42/movie.mp4")).await.unwrap();
        std::fs::write(first.source_path(), b"video").unwrap();

        let duplicate = store.prepare(&sample_job("users/42/movie.mp4")).await;
        let same_stem = store.prepare(&sample_job("users/42/movie.mov")).await;

        assert!(matches!(duplicate, Err(PipelineError::Staging { .. })));
        assert!(matches!(same_stem, Err(PipelineError::Staging { .. })));
        assert_eq!(std::fs::read(first.source_path()).unwrap(), b"video");

        first.teardown().await;
        let again = store.prepare(&sample_job("users/42/movie.mp4")).await.unwrap();
        std::fs::write(again.source_path(), b"video").unwrap();
        assert!(again.source_path().exists());
        again.teardown().await;
        assert!(!temp.path().join("users").exists());
    }

    #[tokio::test]
    async fn test_retained_blob_can_be_staged_again() {
        let temp = tempdir().unwrap();
        let store = StagingStore::new(temp.path());
        let retained = store.prepare(&sample_job("users/42/movie.mp4")).await.unwrap();
        let root = retained.retain();

        let again = store.prepare(&sample_job("users/42/movie.mp4")).await.unwrap();
        again.teardown().await;

        assert!(root.is_dir());
    }

    #[tokio::test]
    async fn test_parent_components_are_rejected() {
        let temp = tempdir().unwrap();
        let store = StagingStore::new(temp.path());

        let result = store.prepare(&sample_job("../escape/movie.mp4")).await;

        assert!(matches!(result, Err(PipelineError::Staging { .. })));
    }
}
