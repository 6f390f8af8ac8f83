//! Common utilities shared by the registry client and the sync pipeline

use crate::error::{RegistryError, Result};
use crate::logging::Logger;
use std::time::{Duration, Instant};

/// Timing utilities
pub struct Timer {
    start: Instant,
    description: String,
}

impl Timer {
    /// Start a new timer
    pub fn start(description: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            description: description.into(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Log elapsed time and average speed for `bytes` moved while the timer ran
    pub fn log_transfer(&self, logger: &Logger, bytes: u64) {
        let elapsed = self.elapsed();
        logger.success(&format!(
            "{} completed in {} ({})",
            self.description,
            logger.format_duration(elapsed),
            logger.format_speed(logger.throughput(bytes, elapsed))
        ));
    }
}

/// Validation utilities for names that end up in request paths
pub struct ValidationUtils;

impl ValidationUtils {
    /// Validate repository name format
    pub fn validate_repository(repository: &str) -> Result<()> {
        if repository.is_empty() {
            return Err(RegistryError::Validation("Repository cannot be empty".to_string()));
        }

        if repository.contains("//") || repository.starts_with('/') || repository.ends_with('/') {
            return Err(RegistryError::Validation(format!(
                "Invalid repository format: {}",
                repository
            )));
        }

        if !repository
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "._-/".contains(c))
        {
            return Err(RegistryError::Validation(format!(
                "Repository may only contain lowercase letters, digits, '.', '_', '-' and '/': {}",
                repository
            )));
        }

        Ok(())
    }

    /// Validate tag reference
    pub fn validate_reference(reference: &str) -> Result<()> {
        if reference.is_empty() {
            return Err(RegistryError::Validation("Reference cannot be empty".to_string()));
        }

        if reference.len() > 128 {
            return Err(RegistryError::Validation(
                "Reference cannot exceed 128 characters".to_string(),
            ));
        }

        if !reference
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "._-".contains(c))
        {
            return Err(RegistryError::Validation(format!(
                "Reference may only contain letters, digits, '.', '_' and '-': {}",
                reference
            )));
        }

        Ok(())
    }

    /// Validate digest format
    pub fn validate_digest(digest: &str) -> Result<()> {
        let Some(hash_part) = digest.strip_prefix("sha256:") else {
            return Err(RegistryError::Validation(format!(
                "Digest must start with 'sha256:': {}",
                digest
            )));
        };

        if hash_part.len() != 64 {
            return Err(RegistryError::Validation(
                "SHA256 digest must be 64 characters".to_string(),
            ));
        }

        if !hash_part
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        {
            return Err(RegistryError::Validation(
                "Digest must contain only lowercase hexadecimal characters".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_repository() {
        assert!(ValidationUtils::validate_repository("valid/repo").is_ok());
        assert!(ValidationUtils::validate_repository("trunk").is_ok());
        assert!(ValidationUtils::validate_repository("").is_err());
        assert!(ValidationUtils::validate_repository("//invalid").is_err());
        assert!(ValidationUtils::validate_repository("/invalid").is_err());
        assert!(ValidationUtils::validate_repository("Upper/Case").is_err());
        assert!(ValidationUtils::validate_repository("a?b").is_err());
    }

    #[test]
    fn test_validate_reference() {
        assert!(ValidationUtils::validate_reference("1.0").is_ok());
        assert!(ValidationUtils::validate_reference("latest").is_ok());
        assert!(ValidationUtils::validate_reference("").is_err());
        assert!(ValidationUtils::validate_reference("has space").is_err());
        assert!(ValidationUtils::validate_reference("a/b").is_err());
    }

    #[test]
    fn test_validate_digest() {
        let valid_digest = "sha256:abcdef1234567890abcdef1234567890abcdef1234567890abcdef1234567890";
        assert!(ValidationUtils::validate_digest(valid_digest).is_ok());
        assert!(ValidationUtils::validate_digest("invalid").is_err());
        assert!(ValidationUtils::validate_digest("sha256:invalid").is_err());
        assert!(
            ValidationUtils::validate_digest(
                "sha256:ABCDEF1234567890ABCDEF1234567890ABCDEF1234567890ABCDEF1234567890"
            )
            .is_err()
        );
    }

    #[test]
    fn test_timer() {
        let timer = Timer::start("test operation");
        std::thread::sleep(Duration::from_millis(10));
        assert!(timer.elapsed() >= Duration::from_millis(10));
    }
}
