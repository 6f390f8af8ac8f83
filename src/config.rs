//! Configuration for registry endpoints and the sync pipeline

use crate::common::ValidationUtils;
use crate::error::{RegistryError, Result};
use serde::{Deserialize, Serialize};

/// Repository used to pool blobs shared across images
pub const DEFAULT_STAGING_REPOSITORY: &str = "trunk";

/// Default request timeout in seconds; blob transfers can be large
pub const DEFAULT_TIMEOUT_SECS: u64 = 7200;

/// Registry endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub address: String,
    pub skip_tls: bool,
    pub timeout: u64,
}

impl RegistryConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            skip_tls: false,
            timeout: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_skip_tls(mut self, skip_tls: bool) -> Self {
        self.skip_tls = skip_tls;
        self
    }

    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.address.is_empty() {
            return Err(RegistryError::Validation(
                "Registry address cannot be empty".to_string(),
            ));
        }

        if !self.address.starts_with("http://") && !self.address.starts_with("https://") {
            return Err(RegistryError::Validation(format!(
                "Invalid registry address: {}. Must start with http:// or https://",
                self.address
            )));
        }

        if self.timeout == 0 {
            return Err(RegistryError::Validation(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Sync pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Maximum number of tasks running at once within a stage
    pub concurrency: usize,
    /// Destination repository where blobs are checked and uploaded once
    pub staging_repository: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            staging_repository: DEFAULT_STAGING_REPOSITORY.to_string(),
        }
    }
}

impl SyncConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_staging_repository(mut self, repository: impl Into<String>) -> Self {
        self.staging_repository = repository.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(RegistryError::Validation(
                "concurrency must be greater than 0".to_string(),
            ));
        }
        ValidationUtils::validate_repository(&self.staging_repository)
    }

    /// Create config from environment variables and defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("SYNC_CONCURRENCY") {
            if let Ok(concurrency) = val.parse() {
                config.concurrency = concurrency;
            }
        }
        if let Ok(val) = std::env::var("SYNC_STAGING_REPOSITORY") {
            if !val.is_empty() {
                config.staging_repository = val;
            }
        }

        config
    }
}

/// Pool width derived from host parallelism
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
