//! Staged replication of images from a source to a destination registry
//!
//! Stages run strictly one after another. Each stage moves its items into
//! pool tasks and rebuilds its collection from the returned outcomes, so no
//! record is touched by two tasks at once.

use crate::common::Timer;
use crate::concurrency::{TaskOutcome, WorkPool};
use crate::config::SyncConfig;
use crate::error::{RegistryError, Result, Stage};
use crate::image::{ArtifactReference, Blob, Image};
use crate::logging::Logger;
use crate::registry::RegistryClient;
use crate::sync::{ArtifactSync, SyncReport};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

pub struct ImageSync {
    source: Arc<RegistryClient>,
    destination: Arc<RegistryClient>,
    config: SyncConfig,
    output: Logger,
}

impl ImageSync {
    pub fn new(
        source: RegistryClient,
        destination: RegistryClient,
        config: SyncConfig,
        output: Logger,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source: Arc::new(source),
            destination: Arc::new(destination),
            config,
            output,
        })
    }

    /// Replicate every `name:tag` in `artifacts` to the destination
    pub async fn sync(
        &self,
        artifacts: &[String],
        cancel: &CancellationToken,
    ) -> Result<SyncReport> {
        let started = Instant::now();
        let mut report = SyncReport::default();

        let images = self.parse_references(artifacts)?;
        report.images_requested = images.len();
        if images.is_empty() {
            self.output.warning("No artifacts requested, nothing to sync");
            report.elapsed = started.elapsed();
            return Ok(report);
        }

        self.output.section(&format!(
            "Syncing {} image(s) from {} to {}",
            images.len(),
            self.source.address(),
            self.destination.address()
        ));

        self.ensure_not_cancelled(Stage::ProbeImages, cancel)?;
        let images = self.probe_images(images, cancel).await?;

        let (present, mut pending): (Vec<Image>, Vec<Image>) = images
            .into_iter()
            .partition(|image| image.exists_at_destination);
        report.images_present = present.len();

        if pending.is_empty() {
            self.output
                .success("All images already exist in the destination registry");
            report.elapsed = started.elapsed();
            return Ok(report);
        }

        self.ensure_not_cancelled(Stage::FetchManifests, cancel)?;
        pending = self.fetch_manifests(pending, cancel).await?;
        for image in &mut pending {
            image.derive_layers();
        }

        let blobs = Blob::collect_unique(&pending);
        report.blobs_total = blobs.len();

        self.ensure_not_cancelled(Stage::ProbeBlobs, cancel)?;
        let blobs = self.probe_blobs(blobs, cancel).await?;

        let (present_blobs, missing_blobs): (Vec<Blob>, Vec<Blob>) = blobs
            .into_iter()
            .partition(|blob| blob.exists_at_destination);
        report.blobs_present = present_blobs.len();

        self.ensure_not_cancelled(Stage::PushBlobs, cancel)?;
        let pushed = self.push_blobs(missing_blobs, cancel).await?;
        report.blobs_uploaded = pushed.len();
        report.bytes_uploaded = pushed.iter().map(|blob| blob.descriptor.size).sum();

        let blob_state: HashMap<String, Blob> = present_blobs
            .into_iter()
            .chain(pushed)
            .map(|blob| (blob.digest().to_string(), blob))
            .collect();
        for image in &mut pending {
            image.apply_blob_state(&blob_state);
        }

        self.ensure_not_cancelled(Stage::MountBlobs, cancel)?;
        let (attempted, failed) = self.mount_blobs(&pending, cancel).await;
        report.mounts_attempted = attempted;
        report.mounts_failed = failed;

        self.ensure_not_cancelled(Stage::PublishManifests, cancel)?;
        let published = self.publish_manifests(pending, cancel).await?;
        report.images_published = published.len();

        self.ensure_not_cancelled(Stage::Verify, cancel)?;
        self.verify_images(published, cancel).await?;

        report.elapsed = started.elapsed();
        self.output.success(&format!(
            "Synced {} image(s) in {}",
            report.images_published,
            self.output.format_duration(report.elapsed)
        ));
        Ok(report)
    }

    fn pool<T: Send + 'static>(&self) -> WorkPool<T> {
        WorkPool::new(self.config.concurrency)
    }

    fn ensure_not_cancelled(&self, stage: Stage, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(RegistryError::Cancelled.in_stage(stage, "sync run"));
        }
        Ok(())
    }

    /// Parse every input, dropping exact duplicates
    fn parse_references(&self, artifacts: &[String]) -> Result<Vec<Image>> {
        let mut seen = HashSet::new();
        let mut images = Vec::with_capacity(artifacts.len());
        for artifact in artifacts {
            let reference = ArtifactReference::parse(artifact)
                .map_err(|e| e.in_stage(Stage::Parse, artifact.as_str()))?;
            if seen.insert(reference.clone()) {
                images.push(Image::new(reference));
            } else {
                self.output
                    .verbose(&format!("Ignoring duplicate artifact {}", reference));
            }
        }
        Ok(images)
    }

    async fn probe_images(&self, images: Vec<Image>, cancel: &CancellationToken) -> Result<Vec<Image>> {
        self.output.step("Checking which images exist in the destination");

        let mut pool = self.pool();
        let subjects = subjects(&images, |image| image.reference.to_string());
        for mut image in images {
            let source = Arc::clone(&self.source);
            let destination = Arc::clone(&self.destination);
            let output = self.output.clone();
            pool.submit(move |cancel: CancellationToken| async move {
                let exists = probe_destination(&source, &destination, &mut image, &cancel).await?;
                image.exists_at_destination = exists;
                if image.exists_at_destination {
                    output.info(&format!("{} already exists, skipping", image.reference));
                } else {
                    output.info(&format!("{} needs to be synced", image.reference));
                }
                Ok::<_, RegistryError>(image)
            });
        }

        settle(Stage::ProbeImages, subjects, pool.run(cancel).await)
    }

    async fn fetch_manifests(&self, images: Vec<Image>, cancel: &CancellationToken) -> Result<Vec<Image>> {
        self.output.step("Fetching manifests from the source");

        let mut pool = self.pool();
        let subjects = subjects(&images, |image| image.reference.to_string());
        for mut image in images {
            let source = Arc::clone(&self.source);
            let output = self.output.clone();
            pool.submit(move |cancel: CancellationToken| async move {
                // `latest` images already carry the manifest fetched while probing
                if image.manifest.is_none() {
                    let manifest = source.get_manifest(image.name(), image.tag(), &cancel).await?;
                    image.manifest = Some(manifest);
                }
                if let Some(manifest) = &image.manifest {
                    output.detail(&format!(
                        "{}: {} layer(s), {}",
                        image.reference,
                        manifest.layers.len(),
                        output.format_size(manifest.total_size())
                    ));
                }
                Ok::<_, RegistryError>(image)
            });
        }

        settle(Stage::FetchManifests, subjects, pool.run(cancel).await)
    }

    async fn probe_blobs(&self, blobs: Vec<Blob>, cancel: &CancellationToken) -> Result<Vec<Blob>> {
        self.output.step(&format!(
            "Checking {} blob(s) in staging repository {}",
            blobs.len(),
            self.config.staging_repository
        ));

        let mut pool = self.pool();
        let subjects = subjects(&blobs, blob_subject);
        for mut blob in blobs {
            let destination = Arc::clone(&self.destination);
            let staging = self.config.staging_repository.clone();
            let output = self.output.clone();
            pool.submit(move |cancel: CancellationToken| async move {
                let exists = destination.blob_exists(&staging, blob.digest(), &cancel).await?;
                blob.exists_at_destination = exists;
                if blob.exists_at_destination {
                    output.verbose(&format!("Blob {} already exists", blob.digest()));
                }
                Ok::<_, RegistryError>(blob)
            });
        }

        settle(Stage::ProbeBlobs, subjects, pool.run(cancel).await)
    }

    async fn push_blobs(&self, blobs: Vec<Blob>, cancel: &CancellationToken) -> Result<Vec<Blob>> {
        if blobs.is_empty() {
            self.output.info("No blobs need to be uploaded");
            return Ok(blobs);
        }
        self.output.step(&format!("Uploading {} blob(s)", blobs.len()));

        let mut pool = self.pool();
        let subjects = subjects(&blobs, blob_subject);
        for mut blob in blobs {
            let source = Arc::clone(&self.source);
            let destination = Arc::clone(&self.destination);
            let staging = self.config.staging_repository.clone();
            let output = self.output.clone();
            pool.submit(move |cancel: CancellationToken| async move {
                let timer = Timer::start(format!(
                    "Upload of {} ({})",
                    blob.digest(),
                    output.format_size(blob.descriptor.size)
                ));
                let stream = source
                    .download_blob(&blob.source_repository, blob.digest(), &cancel)
                    .await?;
                destination
                    .upload_blob(&staging, blob.digest(), stream, &cancel)
                    .await?;
                blob.synced = true;
                timer.log_transfer(&output, blob.descriptor.size);
                Ok::<_, RegistryError>(blob)
            });
        }

        settle(Stage::PushBlobs, subjects, pool.run(cancel).await)
    }

    /// Mount every uploaded layer into its owning repository.
    ///
    /// Never fails: rejected or erroring mounts are logged and counted. Returns
    /// `(attempted, failed)`.
    async fn mount_blobs(&self, images: &[Image], cancel: &CancellationToken) -> (usize, usize) {
        let staging = &self.config.staging_repository;
        let mut targets = HashSet::new();
        let mut pool = self.pool();

        for layer in images.iter().flat_map(|image| image.layers.iter()) {
            if !layer.synced || &layer.owner.name == staging {
                continue;
            }
            if !targets.insert((layer.owner.name.clone(), layer.digest().to_string())) {
                continue;
            }

            let destination = Arc::clone(&self.destination);
            let repository = layer.owner.name.clone();
            let digest = layer.digest().to_string();
            let staging = staging.clone();
            let output = self.output.clone();
            pool.submit(move |cancel: CancellationToken| async move {
                let mounted = match destination
                    .mount_blob(&repository, &digest, &staging, &cancel)
                    .await
                {
                    Ok(outcome) => outcome.is_mounted(),
                    Err(e) => {
                        output.warning(&format!(
                            "Failed to mount {} into {}: {}",
                            digest, repository, e
                        ));
                        false
                    }
                };
                if mounted {
                    output.verbose(&format!("Mounted {} into {}", digest, repository));
                }
                Ok::<_, RegistryError>(mounted)
            });
        }

        if pool.is_empty() {
            return (0, 0);
        }
        self.output
            .step(&format!("Mounting {} blob(s) into image repositories", pool.len()));

        let outcomes = pool.run(cancel).await;
        let attempted = outcomes.iter().filter(|outcome| !outcome.is_cancelled()).count();
        let failed = outcomes
            .iter()
            .filter(|outcome| !outcome.is_cancelled() && !matches!(outcome, TaskOutcome::Succeeded(true)))
            .count();
        (attempted, failed)
    }

    async fn publish_manifests(&self, images: Vec<Image>, cancel: &CancellationToken) -> Result<Vec<Image>> {
        self.output.step("Publishing manifests");

        let mut pool = self.pool();
        let subjects = subjects(&images, |image| image.reference.to_string());
        for image in images {
            let destination = Arc::clone(&self.destination);
            let output = self.output.clone();
            pool.submit(move |cancel: CancellationToken| async move {
                let manifest = match (&image.manifest, image.is_resolved()) {
                    (Some(manifest), true) => manifest,
                    _ => {
                        return Err(RegistryError::Integrity(format!(
                            "not every blob of {} is present in the destination registry",
                            image.reference
                        )));
                    }
                };
                destination
                    .put_manifest(image.name(), image.tag(), manifest, &cancel)
                    .await?;
                output.success(&format!("Published {}", image.reference));
                Ok::<_, RegistryError>(image)
            });
        }

        settle(Stage::PublishManifests, subjects, pool.run(cancel).await)
    }

    async fn verify_images(&self, images: Vec<Image>, cancel: &CancellationToken) -> Result<()> {
        self.output.step("Verifying images in the destination");

        let mut pool = self.pool();
        let subjects = subjects(&images, |image| image.reference.to_string());
        for mut image in images {
            let source = Arc::clone(&self.source);
            let destination = Arc::clone(&self.destination);
            pool.submit(move |cancel: CancellationToken| async move {
                if probe_destination(&source, &destination, &mut image, &cancel).await? {
                    Ok::<_, RegistryError>(())
                } else {
                    Err(RegistryError::Integrity(format!(
                        "the manifest of image {} does not exist in the destination registry",
                        image.reference
                    )))
                }
            });
        }

        settle(Stage::Verify, subjects, pool.run(cancel).await)?;
        Ok(())
    }
}

#[async_trait]
impl ArtifactSync for ImageSync {
    async fn sync(&self, artifacts: &[String], cancel: &CancellationToken) -> Result<SyncReport> {
        ImageSync::sync(self, artifacts, cancel).await
    }
}

/// Whether `image` is already present at the destination.
///
/// A plain HEAD decides for most tags. `latest` is mutable, so it only counts
/// as present when source and destination agree on the config digest; the
/// HEAD is skipped for it and the source manifest fetched for the comparison
/// is kept on the image.
async fn probe_destination(
    source: &RegistryClient,
    destination: &RegistryClient,
    image: &mut Image,
    cancel: &CancellationToken,
) -> Result<bool> {
    if !image.reference.is_latest() {
        return destination
            .manifest_exists(image.name(), image.tag(), cancel)
            .await;
    }

    let source_manifest = match image.manifest.take() {
        Some(manifest) => manifest,
        None => source.get_manifest(image.name(), image.tag(), cancel).await?,
    };
    let same_config = match destination
        .get_manifest(image.name(), image.tag(), cancel)
        .await
    {
        Ok(current) => current.config.digest == source_manifest.config.digest,
        Err(e) if e.is_cancelled() => return Err(e),
        Err(_) => false,
    };
    image.manifest = Some(source_manifest);
    Ok(same_config)
}

fn subjects<T>(items: &[T], describe: impl Fn(&T) -> String) -> Vec<String> {
    items.iter().map(describe).collect()
}

fn blob_subject(blob: &Blob) -> String {
    format!("blob {} of {}", blob.digest(), blob.source_repository)
}

/// Collect the values of one stage, or the first failure with its stage context
fn settle<T>(stage: Stage, subjects: Vec<String>, outcomes: Vec<TaskOutcome<T>>) -> Result<Vec<T>> {
    subjects
        .into_iter()
        .zip(outcomes)
        .map(|(subject, outcome)| outcome.into_result().map_err(|e| e.in_stage(stage, subject)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settle_keeps_values_in_order() {
        let outcomes = vec![TaskOutcome::Succeeded(1), TaskOutcome::Succeeded(2)];
        let values = settle(
            Stage::ProbeBlobs,
            vec!["a".to_string(), "b".to_string()],
            outcomes,
        )
        .unwrap();
        assert_eq!(values, vec![1, 2]);
    }

    #[test]
    fn test_settle_reports_first_failure_with_subject() {
        let outcomes: Vec<TaskOutcome<u32>> = vec![
            TaskOutcome::Succeeded(1),
            TaskOutcome::Failed(RegistryError::Upload("no location".to_string())),
            TaskOutcome::Cancelled,
        ];
        let err = settle(
            Stage::PushBlobs,
            vec!["one".to_string(), "two".to_string(), "three".to_string()],
            outcomes,
        )
        .unwrap_err();

        assert_eq!(err.stage(), Some(Stage::PushBlobs));
        assert!(err.to_string().contains("two"));
        assert!(matches!(err.root_cause(), RegistryError::Upload(_)));
    }

    #[test]
    fn test_settle_maps_unlaunched_tasks_to_cancelled() {
        let outcomes: Vec<TaskOutcome<u32>> = vec![TaskOutcome::Cancelled];
        let err = settle(Stage::Verify, vec!["app:1.0".to_string()], outcomes).unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn test_parse_references_drops_duplicates() {
        let sync = ImageSync::new(
            RegistryClient::new("http://localhost:5000").unwrap(),
            RegistryClient::new("http://localhost:5001").unwrap(),
            SyncConfig::default().with_concurrency(2),
            Logger::new_quiet(),
        )
        .unwrap();

        let images = sync
            .parse_references(&[
                "app:1.0".to_string(),
                "app:1.0".to_string(),
                "team/tool:latest".to_string(),
            ])
            .unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images[1].name(), "team/tool");

        let err = sync.parse_references(&["app".to_string()]).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::Parse));
        assert!(matches!(err.root_cause(), RegistryError::ReferenceFormat { .. }));
    }

    #[test]
    fn test_new_rejects_zero_concurrency() {
        let result = ImageSync::new(
            RegistryClient::new("http://localhost:5000").unwrap(),
            RegistryClient::new("http://localhost:5001").unwrap(),
            SyncConfig::default().with_concurrency(0),
            Logger::new_quiet(),
        );
        assert!(matches!(result, Err(RegistryError::Validation(_))));
    }
}
