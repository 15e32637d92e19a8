//! AWS adapters: S3-compatible object store and SQS job intake.

pub mod s3;
pub mod sqs;

pub use s3::S3Adapter;
pub use sqs::SqsAdapter;
