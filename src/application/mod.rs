//! Application layer - Generic services that use ports.

pub mod pipeline;
pub mod publisher;
pub mod staging;
pub mod worker;
