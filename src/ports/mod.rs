//! Ports - Trait definitions for every external collaborator of the pipeline.

pub mod identity;
pub mod locator;
pub mod metadata;
pub mod queue;
pub mod storage;
pub mod transcoder;
