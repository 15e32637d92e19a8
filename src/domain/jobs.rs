use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A "video uploaded" event, as published by the upload service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JobDescriptor {
    pub user_id: String,
    pub file_id: String,
    pub blob_uri: String,
    pub file_name: String,
    pub file_extension: String,
    /// Logical slash-separated blob path, e.g. `users/42/movie.mp4`
    pub blob_name: String,
}

impl JobDescriptor {
    /// File name of the blob without its extension (`movie` for `users/42/movie.mp4`).
    pub fn base_name(&self) -> String {
        let file = self.blob_name.rsplit('/').next().unwrap_or(&self.blob_name);
        match file.rfind('.') {
            Some(idx) if idx > 0 => file[..idx].to_string(),
            _ => file.to_string(),
        }
    }

    /// Logical folder holding the blob (`users/42`), empty for top-level blobs.
    pub fn blob_folder(&self) -> &str {
        match self.blob_name.rfind('/') {
            Some(idx) => &self.blob_name[..idx],
            None => "",
        }
    }

    /// Remote folder receiving one rendition, e.g. `users/42/movie-360p`.
    pub fn rendition_folder(&self, label: &str) -> String {
        let leaf = format!("{}-{}", self.base_name(), label);
        match self.blob_folder() {
            "" => leaf,
            folder => format!("{}/{}", folder, leaf),
        }
    }

    /// Logical blob path translated to the local path separator.
    pub fn local_relative_path(&self) -> PathBuf {
        self.blob_name
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect()
    }
}

/// Outcome of one rendition, reported back by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenditionResult {
    pub label: String,
    pub success: bool,
    pub output_dir: PathBuf,
    pub manifest_name: String,
    /// Remote manifest locator, set once the rendition was published.
    pub locator: Option<String>,
}

/// Summary of a job that reached the per-rendition stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub file_id: String,
    pub renditions: Vec<RenditionResult>,
}

impl JobReport {
    pub fn succeeded(&self) -> usize {
        self.renditions.iter().filter(|r| r.success).count()
    }

    pub fn failed(&self) -> usize {
        self.renditions.len() - self.succeeded()
    }
}

#[cfg(test)]
pub(crate) fn sample_job(blob_name: &str) -> JobDescriptor {
    JobDescriptor {
        user_id: "42".to_string(),
        file_id: "file-1".to_string(),
        blob_uri: format!("https://store.example/videos/{}", blob_name),
        file_name: "movie".to_string(),
        file_extension: ".mp4".to_string(),
        blob_name: blob_name.to_string(),
    }
}
