//! Runner that turns parsed arguments into one sync run

use crate::cli::args::Args;
use crate::config::{RegistryConfig, SyncConfig};
use crate::error::Result;
use crate::logging::Logger;
use crate::registry::RegistryClient;
use crate::sync::{ImageSync, SyncReport};
use tokio_util::sync::CancellationToken;

pub struct Runner {
    args: Args,
    output: Logger,
}

impl Runner {
    pub fn new(args: Args) -> Self {
        let output = if args.quiet {
            Logger::new_quiet()
        } else {
            Logger::new(args.verbose)
        };

        Self { args, output }
    }

    pub fn output(&self) -> &Logger {
        &self.output
    }

    pub async fn run(&self, cancel: &CancellationToken) -> Result<SyncReport> {
        self.output.section("Registry Sync");
        self.args.validate()?;

        let artifacts = self.args.all_artifacts();
        let sync_config = self.sync_config();
        sync_config.validate()?;

        self.output.info(&format!("Source: {}", self.args.source));
        self.output
            .info(&format!("Destination: {}", self.args.destination));
        self.output.info(&format!(
            "Staging repository: {}, concurrency: {}",
            sync_config.staging_repository, sync_config.concurrency
        ));

        let source = self.connect(&self.args.source, cancel).await?;
        let destination = self.connect(&self.args.destination, cancel).await?;

        let sync = ImageSync::new(source, destination, sync_config, self.output.clone())?;
        let report = sync.sync(&artifacts, cancel).await?;
        report.log(&self.output);

        Ok(report)
    }

    /// Environment defaults overridden by explicit flags
    fn sync_config(&self) -> SyncConfig {
        let mut config = SyncConfig::from_env()
            .with_staging_repository(self.args.staging_repository.clone());
        if let Some(concurrency) = self.args.concurrency {
            config = config.with_concurrency(concurrency);
        }
        config
    }

    async fn connect(&self, address: &str, cancel: &CancellationToken) -> Result<RegistryClient> {
        let config = RegistryConfig::new(address)
            .with_timeout(self.args.timeout)
            .with_skip_tls(self.args.skip_tls);
        let client = RegistryClient::builder(config)
            .with_logger(self.output.clone())
            .build()?;

        self.output
            .step(&format!("Testing connectivity to {}", client.address()));
        client.ping(cancel).await?;
        self.output
            .success(&format!("Registry {} is reachable", client.address()));

        Ok(client)
    }
}
