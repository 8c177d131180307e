use std::time::Duration;

use crate::descriptor::{ArtifactRole, DatasetDescriptor, DescriptorOptions};
use crate::domain::{AcquisitionResult, ArchiveFormat, Split};
use crate::engine::{Acquirer, AcquisitionStatus};
use crate::error::PrepError;
use crate::fs_util::{ArchiveExtractor, FsArchiveExtractor};
use crate::output::ConsoleProgress;
use crate::process::Task;
use crate::table::{self, Table};
use crate::transport::{HttpTransport, TransferProgress, Transport};

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub transfer: Option<TransferProgress>,
    pub elapsed: Option<Duration>,
}

impl ProgressEvent {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transfer: None,
            elapsed: None,
        }
    }

    pub fn transfer(progress: TransferProgress) -> Self {
        Self {
            message: String::new(),
            transfer: Some(progress),
            elapsed: None,
        }
    }
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// A dataset instance: its descriptor plus the engine that materializes it.
pub struct Dataset<T: Transport, A: ArchiveExtractor> {
    descriptor: DatasetDescriptor,
    acquirer: Acquirer<T, A>,
    sink: Box<dyn ProgressSink>,
}

impl Dataset<HttpTransport, FsArchiveExtractor> {
    pub fn from_options(options: DescriptorOptions) -> Result<Self, PrepError> {
        let descriptor = DatasetDescriptor::new(options)?;
        Ok(Self::new(descriptor, HttpTransport::new()?, FsArchiveExtractor))
    }
}

impl<T: Transport, A: ArchiveExtractor> Dataset<T, A> {
    /// Progress goes to the console whenever a call asks for `verbose`. The
    /// descriptor's own flag only picks the default for `load` and [`Task::execute`].
    pub fn new(descriptor: DatasetDescriptor, transport: T, archive: A) -> Self {
        Self {
            descriptor,
            acquirer: Acquirer::new(transport, archive),
            sink: Box::new(ConsoleProgress::new()),
        }
    }

    pub fn with_sink(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    pub fn descriptor(&self) -> &DatasetDescriptor {
        &self.descriptor
    }

    pub fn acquirer(&self) -> &Acquirer<T, A> {
        &self.acquirer
    }

    pub fn ensure_acquired(&mut self, verbose: bool) -> Result<AcquisitionResult, PrepError> {
        self.acquirer
            .ensure_acquired(&mut self.descriptor, verbose, self.sink.as_ref())
    }

    pub fn refresh(&mut self, verbose: bool) -> Result<AcquisitionResult, PrepError> {
        self.acquirer
            .refresh(&mut self.descriptor, verbose, self.sink.as_ref())
    }

    pub fn is_downloaded(&self) -> bool {
        self.descriptor.is_downloaded()
    }

    pub fn is_extracted(&self) -> bool {
        self.descriptor.is_extracted()
    }

    pub fn status(&self) -> AcquisitionStatus {
        self.acquirer.status(&self.descriptor)
    }

    /// Loads a split's data (or labels) file into a table, acquiring first if needed.
    pub fn load(&mut self, split: Split, role: ArtifactRole) -> Result<Table, PrepError> {
        if !self.descriptor.split(split).present {
            return Err(PrepError::Configuration(format!(
                "split {split} is not present in this dataset"
            )));
        }
        let verbose = self.descriptor.verbose();
        self.ensure_acquired(verbose)?;

        let artifact = self
            .descriptor
            .artifacts(split)
            .into_iter()
            .find(|artifact| artifact.role == role)
            .ok_or_else(|| {
                PrepError::Configuration(format!("split {split} has no labels file"))
            })?;
        let folder = self.descriptor.split_folder(split);
        if ArchiveFormat::from_name(&artifact.name).is_some() && self.descriptor.extract() {
            return Err(PrepError::UnsupportedFormat(format!(
                "{} was unpacked into {folder}; load one of its files instead",
                artifact.name
            )));
        }
        table::load_table(folder.join(&artifact.name).as_std_path())
    }
}

impl<T: Transport, A: ArchiveExtractor> Task for Dataset<T, A> {
    fn name(&self) -> &str {
        self.descriptor.source()
    }

    fn execute(&mut self) -> Result<(), PrepError> {
        let verbose = self.descriptor.verbose();
        self.ensure_acquired(verbose).map(|_| ())
    }
}
