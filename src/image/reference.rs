//! Artifact references of the form `name:tag`

use crate::common::ValidationUtils;
use crate::error::{RegistryError, Result};
use std::fmt;
use std::str::FromStr;

/// Tag that is conventionally moved between builds and gets a content comparison
pub const LATEST_TAG: &str = "latest";

/// A repository name and tag identifying one image
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactReference {
    pub name: String,
    pub tag: String,
}

impl ArtifactReference {
    /// Parse `name:tag`; exactly one `:` is allowed, so registry hosts with ports are rejected
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason: &str| RegistryError::ReferenceFormat {
            reference: input.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = input.split(':');
        let (Some(name), Some(tag), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(invalid("expected exactly one ':' between name and tag"));
        };

        if name.is_empty() || tag.is_empty() {
            return Err(invalid("name and tag must both be non-empty"));
        }
        ValidationUtils::validate_repository(name).map_err(|e| invalid(&e.to_string()))?;
        ValidationUtils::validate_reference(tag).map_err(|e| invalid(&e.to_string()))?;

        Ok(Self {
            name: name.to_string(),
            tag: tag.to_string(),
        })
    }

    pub fn is_latest(&self) -> bool {
        self.tag == LATEST_TAG
    }
}

impl FromStr for ArtifactReference {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ArtifactReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}
