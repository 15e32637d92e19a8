//! Adapters - Implementations of the ports.

pub mod ffmpeg;
pub mod http;

#[cfg(feature = "aws")]
pub mod aws;
#[cfg(feature = "local")]
pub mod local;
