//! Per-run records for images, their layers and the distinct blobs behind them

use crate::image::manifest::{Descriptor, Manifest};
use crate::image::reference::ArtifactReference;
use std::collections::{HashMap, HashSet};

/// One requested image and what is known about it at the destination
#[derive(Debug, Clone)]
pub struct Image {
    pub reference: ArtifactReference,
    pub exists_at_destination: bool,
    pub manifest: Option<Manifest>,
    pub layers: Vec<Layer>,
}

impl Image {
    pub fn new(reference: ArtifactReference) -> Self {
        Self {
            reference,
            exists_at_destination: false,
            manifest: None,
            layers: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.reference.name
    }

    pub fn tag(&self) -> &str {
        &self.reference.tag
    }

    /// One layer for the config blob, then one per manifest layer
    pub fn derive_layers(&mut self) {
        self.layers = match &self.manifest {
            Some(manifest) => manifest
                .blobs()
                .map(|descriptor| Layer::new(self.reference.clone(), descriptor.clone()))
                .collect(),
            None => Vec::new(),
        };
    }

    /// True once the manifest is known and every blob is present at the destination
    pub fn is_resolved(&self) -> bool {
        self.manifest.is_some() && self.layers.iter().all(Layer::is_resolved)
    }

    /// Copy blob state, keyed by digest, onto this image's layers
    pub fn apply_blob_state(&mut self, blobs: &HashMap<String, Blob>) {
        for layer in &mut self.layers {
            if let Some(blob) = blobs.get(layer.digest()) {
                layer.exists_at_destination = blob.exists_at_destination;
                layer.synced = blob.synced;
            }
        }
    }
}

/// A blob referenced by an image, tagged with the image that owns it
#[derive(Debug, Clone)]
pub struct Layer {
    pub owner: ArtifactReference,
    pub descriptor: Descriptor,
    pub exists_at_destination: bool,
    pub synced: bool,
}

impl Layer {
    pub fn new(owner: ArtifactReference, descriptor: Descriptor) -> Self {
        Self {
            owner,
            descriptor,
            exists_at_destination: false,
            synced: false,
        }
    }

    pub fn digest(&self) -> &str {
        &self.descriptor.digest
    }

    pub fn is_resolved(&self) -> bool {
        self.exists_at_destination || self.synced
    }
}

/// A distinct digest across all images in a run
#[derive(Debug, Clone)]
pub struct Blob {
    pub descriptor: Descriptor,
    /// Source repository the blob is downloaded from
    pub source_repository: String,
    pub exists_at_destination: bool,
    pub synced: bool,
}

impl Blob {
    pub fn digest(&self) -> &str {
        &self.descriptor.digest
    }

    /// Distinct blobs across `images`, in first-seen order
    pub fn collect_unique<'a>(images: impl IntoIterator<Item = &'a Image>) -> Vec<Blob> {
        let mut seen = HashSet::new();
        let mut blobs = Vec::new();
        for layer in images.into_iter().flat_map(|image| image.layers.iter()) {
            if seen.insert(layer.digest().to_string()) {
                blobs.push(Blob {
                    descriptor: layer.descriptor.clone(),
                    source_repository: layer.owner.name.clone(),
                    exists_at_destination: false,
                    synced: false,
                });
            }
        }
        blobs
    }
}
