//! Rendition ladder.

use crate::error::ConfigError;
use std::fmt;

/// Extension of the segmented-stream manifest written for every rendition.
pub const MANIFEST_EXTENSION: &str = "m3u8";

/// Manifest file name inside a rendition directory.
pub const MANIFEST_NAME: &str = "playlist.m3u8";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenditionSpec {
    pub label: String,
    pub dimensions: Dimensions,
}

impl RenditionSpec {
    pub fn new(label: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            label: label.into(),
            dimensions: Dimensions { width, height },
        }
    }

    /// Default ladder, in processing order.
    pub fn default_ladder() -> Vec<RenditionSpec> {
        vec![
            RenditionSpec::new("360p", 640, 360),
            RenditionSpec::new("480p", 854, 480),
            RenditionSpec::new("720p", 1280, 720),
        ]
    }

    /// Parse a ladder such as `360p=640x360,720p=1280x720`.
    pub fn parse_ladder(raw: &str) -> Result<Vec<RenditionSpec>, ConfigError> {
        let invalid = |reason: String| ConfigError::Invalid {
            key: "RENDITIONS",
            reason,
        };

        let mut ladder = Vec::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (label, size) = entry
                .split_once('=')
                .ok_or_else(|| invalid(format!("expected label=WxH, got '{}'", entry)))?;
            let (width, height) = size
                .split_once('x')
                .ok_or_else(|| invalid(format!("expected WxH, got '{}'", size)))?;
            let width = width
                .trim()
                .parse()
                .map_err(|_| invalid(format!("bad width in '{}'", entry)))?;
            let height = height
                .trim()
                .parse()
                .map_err(|_| invalid(format!("bad height in '{}'", entry)))?;
            ladder.push(RenditionSpec::new(label.trim(), width, height));
        }

        if ladder.is_empty() {
            return Err(invalid("no renditions configured".to_string()));
        }
        Ok(ladder)
    }
}
