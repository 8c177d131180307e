use std::fs;
use std::time::Instant;

use camino::Utf8Path;
use serde::Serialize;
use tracing::{debug, info};

use crate::app::{ProgressEvent, ProgressSink};
use crate::descriptor::{Artifact, ArtifactRole, DatasetDescriptor};
use crate::domain::{AcquisitionResult, ArchiveFormat, MarkerKind, Split};
use crate::error::PrepError;
use crate::fs_util::ArchiveExtractor;
use crate::store::MarkerStore;
use crate::transport::{TransferProgress, Transport};

#[derive(Debug, Clone, Serialize)]
pub struct AcquisitionStatus {
    pub source: String,
    pub destination_root: String,
    pub downloaded: bool,
    pub extracted: bool,
    pub splits: Vec<SplitStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SplitStatus {
    pub split: Split,
    pub present: bool,
    pub folder: String,
    pub artifacts: Vec<ArtifactStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ArtifactStatus {
    pub role: ArtifactRole,
    pub name: String,
    pub url: String,
    pub downloaded: bool,
    pub extracted: bool,
}

/// Drives download and extraction of every present split of a descriptor.
///
/// Each step is guarded by its own marker, so an interrupted run resumes at
/// the first unmarked step. Calls on the same descriptor must not overlap;
/// the `&mut DatasetDescriptor` receivers make that a borrow-check error.
pub struct Acquirer<T: Transport, A: ArchiveExtractor> {
    transport: T,
    archive: A,
    markers: MarkerStore,
}

impl<T: Transport, A: ArchiveExtractor> Acquirer<T, A> {
    pub fn new(transport: T, archive: A) -> Self {
        Self {
            transport,
            archive,
            markers: MarkerStore::new(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn archive(&self) -> &A {
        &self.archive
    }

    pub fn markers(&self) -> &MarkerStore {
        &self.markers
    }

    pub fn ensure_acquired(
        &self,
        descriptor: &mut DatasetDescriptor,
        verbose: bool,
        sink: &dyn ProgressSink,
    ) -> Result<AcquisitionResult, PrepError> {
        if descriptor.is_downloaded() && !descriptor.refresh_on_every_use() {
            debug!(source = descriptor.source(), "dataset already acquired");
            return Ok(AcquisitionResult::NoOp);
        }

        // Datasets that change at the source are fetched again on every use.
        let force = descriptor.refresh_on_every_use();
        if force {
            descriptor.reset_status();
        }

        let splits = descriptor.present_splits().collect::<Vec<_>>();
        for split in splits {
            self.acquire_split(descriptor, split, force, verbose, sink)?;
        }

        descriptor.mark_acquired();
        info!(
            source = descriptor.source(),
            root = %descriptor.destination_root(),
            "dataset acquired"
        );
        Ok(AcquisitionResult::Acquired)
    }

    /// Wipes the destination root, then acquires everything again.
    ///
    /// A failed wipe returns before the status flags are touched.
    pub fn refresh(
        &self,
        descriptor: &mut DatasetDescriptor,
        verbose: bool,
        sink: &dyn ProgressSink,
    ) -> Result<AcquisitionResult, PrepError> {
        let root = descriptor.destination_root().to_path_buf();
        info!(root = %root, "refreshing dataset");
        self.markers.clear_root(&root)?;
        descriptor.reset_status();
        if verbose {
            sink.event(ProgressEvent::message(format!("Cleared {root}")));
        }
        self.ensure_acquired(descriptor, verbose, sink)
    }

    pub fn status(&self, descriptor: &DatasetDescriptor) -> AcquisitionStatus {
        let splits = Split::ALL
            .into_iter()
            .map(|split| {
                let folder = descriptor.split_folder(split);
                let present = descriptor.split(split).present;
                let artifacts = if present {
                    descriptor
                        .artifacts(split)
                        .into_iter()
                        .map(|artifact| ArtifactStatus {
                            downloaded: self.markers.has_marker(
                                &folder,
                                &artifact.name,
                                MarkerKind::Downloaded,
                            ),
                            extracted: self.markers.has_marker(
                                &folder,
                                &artifact.name,
                                MarkerKind::Extracted,
                            ),
                            role: artifact.role,
                            name: artifact.name,
                            url: artifact.url,
                        })
                        .collect()
                } else {
                    Vec::new()
                };
                SplitStatus {
                    split,
                    present,
                    folder: folder.to_string(),
                    artifacts,
                }
            })
            .collect();

        AcquisitionStatus {
            source: descriptor.source().to_string(),
            destination_root: descriptor.destination_root().to_string(),
            downloaded: descriptor.is_downloaded(),
            extracted: descriptor.is_extracted(),
            splits,
        }
    }

    fn acquire_split(
        &self,
        descriptor: &DatasetDescriptor,
        split: Split,
        force: bool,
        verbose: bool,
        sink: &dyn ProgressSink,
    ) -> Result<(), PrepError> {
        let started = Instant::now();
        let folder = descriptor.split_folder(split);
        let artifacts = descriptor.artifacts(split);

        for artifact in &artifacts {
            self.download_if_needed(&folder, artifact, force, verbose, sink)?;
        }
        for artifact in &artifacts {
            self.extract_if_needed(descriptor.extract(), &folder, artifact, force, verbose, sink)?;
        }

        info!(split = %split, folder = %folder, "split ready");
        if verbose {
            sink.event(ProgressEvent {
                message: format!("{split}: ready in {folder}"),
                transfer: None,
                elapsed: Some(started.elapsed()),
            });
        }
        Ok(())
    }

    fn download_if_needed(
        &self,
        folder: &Utf8Path,
        artifact: &Artifact,
        force: bool,
        verbose: bool,
        sink: &dyn ProgressSink,
    ) -> Result<bool, PrepError> {
        if !force
            && self
                .markers
                .has_marker(folder, &artifact.name, MarkerKind::Downloaded)
        {
            debug!(artifact = %artifact.name, folder = %folder, "already downloaded");
            return Ok(false);
        }

        let destination = folder.join(&artifact.name);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| PrepError::Filesystem(format!("create {parent}: {err}")))?;
        }

        info!(url = %artifact.url, destination = %destination, "downloading");
        if verbose {
            sink.event(ProgressEvent::message(format!("Downloading {}", artifact.name)));
            let mut report = |progress: TransferProgress| {
                sink.event(ProgressEvent::transfer(progress));
            };
            self.transport
                .fetch(&artifact.url, destination.as_std_path(), Some(&mut report))?;
            sink.event(ProgressEvent::message("Done!"));
        } else {
            self.transport
                .fetch(&artifact.url, destination.as_std_path(), None)?;
        }

        self.markers
            .write_marker(folder, &artifact.name, MarkerKind::Downloaded)?;
        Ok(true)
    }

    fn extract_if_needed(
        &self,
        extract_enabled: bool,
        folder: &Utf8Path,
        artifact: &Artifact,
        force: bool,
        verbose: bool,
        sink: &dyn ProgressSink,
    ) -> Result<bool, PrepError> {
        if !force
            && self
                .markers
                .has_marker(folder, &artifact.name, MarkerKind::Extracted)
        {
            debug!(artifact = %artifact.name, folder = %folder, "already extracted");
            return Ok(false);
        }

        let archive_path = folder.join(&artifact.name);
        match ArchiveFormat::from_name(&artifact.name) {
            Some(format) if extract_enabled => {
                info!(archive = %archive_path, %format, "extracting");
                if verbose {
                    sink.event(ProgressEvent::message(format!("Extracting {archive_path} ...")));
                }
                self.archive
                    .extract(archive_path.as_std_path(), folder.as_std_path())?;
                if verbose {
                    sink.event(ProgressEvent::message("Done"));
                }
            }
            _ => {
                debug!(artifact = %artifact.name, "no extraction needed");
            }
        }

        self.markers
            .write_marker(folder, &artifact.name, MarkerKind::Extracted)?;
        Ok(true)
    }
}
