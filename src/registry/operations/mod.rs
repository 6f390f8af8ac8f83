//! Registry operations grouped by resource
//!
//! Each group holds its own [`Endpoint`](crate::registry::endpoint::Endpoint)
//! and logger; [`RegistryClient`](crate::registry::RegistryClient) delegates to them.

pub mod blob_operations;
pub mod manifest_operations;

pub use blob_operations::{BlobOperations, BlobStream, MountOutcome};
pub use manifest_operations::ManifestOperations;
