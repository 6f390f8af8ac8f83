//! Docker image manifest (schema 2) and content descriptors

use crate::common::ValidationUtils;
use crate::error::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const MANIFEST_V2_MEDIA_TYPE: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const MANIFEST_LIST_MEDIA_TYPE: &str =
    "application/vnd.docker.distribution.manifest.list.v2+json";
pub const CONFIG_MEDIA_TYPE: &str = "application/vnd.docker.container.image.v1+json";
pub const LAYER_MEDIA_TYPE: &str = "application/vnd.docker.image.rootfs.diff.tar.gzip";

/// Content-addressed reference to a blob
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub media_type: String,
    pub size: u64,
    pub digest: String,
}

impl Descriptor {
    pub fn new(media_type: impl Into<String>, size: u64, digest: impl Into<String>) -> Self {
        Self {
            media_type: media_type.into(),
            size,
            digest: digest.into(),
        }
    }

    /// Descriptor for raw bytes, computing their sha256 digest
    pub fn for_content(media_type: impl Into<String>, data: &[u8]) -> Self {
        Self::new(media_type, data.len() as u64, sha256_digest(data))
    }
}

/// Image manifest; keeps the exact bytes it was parsed from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub schema_version: u32,
    pub media_type: String,
    pub config: Descriptor,
    pub layers: Vec<Descriptor>,
    #[serde(skip)]
    canonical: Option<Vec<u8>>,
}

impl Manifest {
    pub fn new(config: Descriptor, layers: Vec<Descriptor>) -> Self {
        Self {
            schema_version: 2,
            media_type: MANIFEST_V2_MEDIA_TYPE.to_string(),
            config,
            layers,
            canonical: None,
        }
    }

    /// Parse a manifest received from a registry
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let probe: serde_json::Value = serde_json::from_slice(data)?;
        if probe.get("mediaType").and_then(|m| m.as_str()) == Some(MANIFEST_LIST_MEDIA_TYPE) {
            return Err(RegistryError::Validation(
                "Manifest lists are not supported".to_string(),
            ));
        }

        let mut manifest: Manifest = serde_json::from_value(probe)?;
        manifest.validate()?;
        manifest.canonical = Some(data.to_vec());
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != 2 {
            return Err(RegistryError::Validation(format!(
                "Unsupported schema version: {}",
                self.schema_version
            )));
        }
        if self.media_type != MANIFEST_V2_MEDIA_TYPE {
            return Err(RegistryError::Validation(format!(
                "Unsupported manifest media type: {}",
                self.media_type
            )));
        }
        ValidationUtils::validate_digest(&self.config.digest)?;
        for layer in &self.layers {
            ValidationUtils::validate_digest(&layer.digest)?;
        }
        Ok(())
    }

    /// Bytes to publish: the received bytes if any, canonical JSON otherwise
    pub fn to_canonical_json(&self) -> Result<Vec<u8>> {
        match &self.canonical {
            Some(data) => Ok(data.clone()),
            None => Ok(serde_json::to_vec(self)?),
        }
    }

    /// Content digest of the published bytes
    pub fn digest(&self) -> Result<String> {
        Ok(sha256_digest(&self.to_canonical_json()?))
    }

    /// Config descriptor followed by layer descriptors, in manifest order
    pub fn blobs(&self) -> impl Iterator<Item = &Descriptor> {
        std::iter::once(&self.config).chain(self.layers.iter())
    }

    /// Sum of the config and layer sizes
    pub fn total_size(&self) -> u64 {
        self.blobs().map(|d| d.size).sum()
    }
}

/// `sha256:<hex>` digest of `data`
pub fn sha256_digest(data: &[u8]) -> String {
    format!("sha256:{}", hex::encode(Sha256::digest(data)))
}
