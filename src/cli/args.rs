//! Command-line argument parsing

use crate::config::{DEFAULT_STAGING_REPOSITORY, DEFAULT_TIMEOUT_SECS};
use crate::error::{RegistryError, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "registry-sync")]
#[command(about = "Copy images between Docker Registry V2 registries")]
#[command(version)]
pub struct Args {
    /// Source registry URL
    #[arg(
        long = "source",
        short = 's',
        env = "SOURCE_REGISTRY",
        help = "Source registry URL, e.g. https://registry-a.example.com"
    )]
    pub source: String,

    /// Destination registry URL
    #[arg(
        long = "destination",
        short = 'd',
        env = "DESTINATION_REGISTRY",
        help = "Destination registry URL"
    )]
    pub destination: String,

    /// Images to sync as name:tag
    #[arg(value_name = "ARTIFACT")]
    pub artifacts: Vec<String>,

    /// Comma separated images to sync, appended to the positional list
    #[arg(
        long = "artifacts",
        env = "ARTIFACTS",
        value_delimiter = ',',
        help = "Comma separated list of name:tag artifacts"
    )]
    pub artifact_list: Vec<String>,

    /// Number of tasks running at once within a stage
    #[arg(
        long = "concurrency",
        short = 'j',
        env = "SYNC_CONCURRENCY",
        help = "Maximum concurrent registry operations per stage (default: CPU count)"
    )]
    pub concurrency: Option<usize>,

    /// Destination repository used to stage blobs
    #[arg(
        long = "staging-repository",
        env = "SYNC_STAGING_REPOSITORY",
        default_value = DEFAULT_STAGING_REPOSITORY,
        help = "Destination repository where blobs are uploaded once"
    )]
    pub staging_repository: String,

    /// Timeout in seconds for network operations
    #[arg(
        long = "timeout",
        short = 't',
        default_value_t = DEFAULT_TIMEOUT_SECS,
        help = "Timeout for network operations in seconds"
    )]
    pub timeout: u64,

    /// Skip TLS verification
    #[arg(
        long = "skip-tls",
        short = 'k',
        help = "Skip TLS certificate verification"
    )]
    pub skip_tls: bool,

    /// Verbose output
    #[arg(long = "verbose", short = 'v', help = "Enable verbose output")]
    pub verbose: bool,

    /// Quiet mode
    #[arg(
        long = "quiet",
        short = 'q',
        conflicts_with = "verbose",
        help = "Only print errors"
    )]
    pub quiet: bool,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    /// Positional artifacts followed by the comma separated list, blanks removed
    pub fn all_artifacts(&self) -> Vec<String> {
        self.artifacts
            .iter()
            .chain(self.artifact_list.iter())
            .map(|artifact| artifact.trim())
            .filter(|artifact| !artifact.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Validate arguments
    pub fn validate(&self) -> Result<()> {
        if self.all_artifacts().is_empty() {
            return Err(RegistryError::Validation(
                "At least one artifact (name:tag) must be given".to_string(),
            ));
        }

        if self.concurrency == Some(0) {
            return Err(RegistryError::Validation(
                "Concurrency must be greater than 0".to_string(),
            ));
        }

        if self.timeout == 0 {
            return Err(RegistryError::Validation(
                "Timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
