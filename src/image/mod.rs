//! Image data model
//!
//! This module provides the types the sync pipeline moves between stages:
//! parsed [`ArtifactReference`]s, schema 2 [`Manifest`]s with their
//! [`Descriptor`]s, and the per-run [`Image`], [`Layer`] and [`Blob`] records.
//!
//! Manifests received from a registry keep their exact bytes so that the
//! manifest digest is preserved when it is published elsewhere.

pub mod manifest;
pub mod model;
pub mod reference;

pub use manifest::{Descriptor, MANIFEST_V2_MEDIA_TYPE, Manifest, sha256_digest};
pub use model::{Blob, Image, Layer};
pub use reference::{ArtifactReference, LATEST_TAG};
