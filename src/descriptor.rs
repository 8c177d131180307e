use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use serde::Serialize;

use crate::domain::Split;
use crate::error::PrepError;

/// Layout of one split at the source and on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitSpec {
    /// Empty means the source URL itself is the artifact of this split.
    pub data_filename: String,
    pub labels_filename: String,
    pub subfolder: String,
    pub present: bool,
}

impl SplitSpec {
    pub fn for_split(split: Split) -> Self {
        Self {
            data_filename: String::new(),
            labels_filename: String::new(),
            subfolder: split.as_str().to_string(),
            present: true,
        }
    }

    pub fn absent(split: Split) -> Self {
        Self {
            present: false,
            ..Self::for_split(split)
        }
    }

    pub fn with_data(mut self, filename: impl Into<String>) -> Self {
        self.data_filename = filename.into();
        self
    }

    pub fn with_labels(mut self, filename: impl Into<String>) -> Self {
        self.labels_filename = filename.into();
        self
    }

    pub fn with_subfolder(mut self, subfolder: impl Into<String>) -> Self {
        self.subfolder = subfolder.into();
        self
    }
}

/// Construction parameters of a [`DatasetDescriptor`].
#[derive(Debug, Clone)]
pub struct DescriptorOptions {
    pub source: String,
    pub destination_root: Utf8PathBuf,
    pub train: SplitSpec,
    pub validate: SplitSpec,
    pub test: SplitSpec,
    pub extract: bool,
    pub refresh_on_every_use: bool,
    pub already_downloaded: bool,
    pub verbose: bool,
}

impl DescriptorOptions {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination_root: Utf8PathBuf::from("./data/"),
            train: SplitSpec::for_split(Split::Train),
            validate: SplitSpec::for_split(Split::Validate),
            test: SplitSpec::for_split(Split::Test),
            extract: true,
            refresh_on_every_use: false,
            already_downloaded: false,
            verbose: true,
        }
    }

    pub fn split_mut(&mut self, split: Split) -> &mut SplitSpec {
        match split {
            Split::Train => &mut self.train,
            Split::Validate => &mut self.validate,
            Split::Test => &mut self.test,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactRole {
    Data,
    Labels,
}

/// One remote file and where it lands locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub role: ArtifactRole,
    pub name: String,
    pub url: String,
}

/// Configuration and status of one dataset acquisition target.
///
/// The `downloaded` and `extracted` flags are only written by the acquisition
/// engine and its refresh path; everything else is fixed at construction.
#[derive(Debug, Clone)]
pub struct DatasetDescriptor {
    source: String,
    destination_root: Utf8PathBuf,
    splits: [SplitSpec; 3],
    extract: bool,
    refresh_on_every_use: bool,
    verbose: bool,
    downloaded: bool,
    extracted: bool,
}

impl DatasetDescriptor {
    pub fn new(options: DescriptorOptions) -> Result<Self, PrepError> {
        let source = options.source.trim().to_string();
        if source.is_empty() {
            return Err(PrepError::Configuration(
                "source URL is required".to_string(),
            ));
        }
        if options.destination_root.as_str().trim().is_empty() {
            return Err(PrepError::Configuration(
                "destination root must not be empty".to_string(),
            ));
        }

        let mut splits = [options.train, options.validate, options.test];
        for (split, spec) in Split::ALL.iter().zip(splits.iter_mut()) {
            spec.subfolder = spec.subfolder.trim().trim_matches('/').to_string();
            spec.data_filename = spec.data_filename.trim().to_string();
            spec.labels_filename = spec.labels_filename.trim().to_string();
            if spec.present {
                validate_split(*split, spec, &source)?;
            }
        }

        for (index, split) in Split::ALL.iter().enumerate() {
            let spec = &splits[index];
            if !spec.present {
                continue;
            }
            for (other_index, other) in Split::ALL.iter().enumerate().skip(index + 1) {
                let other_spec = &splits[other_index];
                if other_spec.present && other_spec.subfolder == spec.subfolder {
                    return Err(PrepError::Configuration(format!(
                        "splits {split} and {other} share subfolder '{}'",
                        spec.subfolder
                    )));
                }
            }
        }

        Ok(Self {
            source,
            destination_root: options.destination_root,
            splits,
            extract: options.extract,
            refresh_on_every_use: options.refresh_on_every_use,
            verbose: options.verbose,
            downloaded: options.already_downloaded,
            extracted: false,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn destination_root(&self) -> &Utf8Path {
        &self.destination_root
    }

    pub fn split(&self, split: Split) -> &SplitSpec {
        match split {
            Split::Train => &self.splits[0],
            Split::Validate => &self.splits[1],
            Split::Test => &self.splits[2],
        }
    }

    pub fn present_splits(&self) -> impl Iterator<Item = Split> + '_ {
        Split::ALL
            .into_iter()
            .filter(|split| self.split(*split).present)
    }

    pub fn extract(&self) -> bool {
        self.extract
    }

    pub fn refresh_on_every_use(&self) -> bool {
        self.refresh_on_every_use
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn is_downloaded(&self) -> bool {
        self.downloaded
    }

    pub fn is_extracted(&self) -> bool {
        self.extracted
    }

    /// `destination_root/<subfolder>`, derived from the split's own subfolder only.
    pub fn split_folder(&self, split: Split) -> Utf8PathBuf {
        let subfolder = &self.split(split).subfolder;
        if subfolder.is_empty() {
            self.destination_root.clone()
        } else {
            self.destination_root.join(subfolder)
        }
    }

    /// Data artifact first, then labels when the split names a labels file.
    pub fn artifacts(&self, split: Split) -> Vec<Artifact> {
        let spec = self.split(split);
        let mut artifacts = Vec::with_capacity(2);
        let data_name = if spec.data_filename.is_empty() {
            source_file_name(&self.source).unwrap_or_default()
        } else {
            spec.data_filename.clone()
        };
        artifacts.push(Artifact {
            role: ArtifactRole::Data,
            name: data_name,
            url: join_url(&self.source, &spec.data_filename),
        });
        if !spec.labels_filename.is_empty() {
            artifacts.push(Artifact {
                role: ArtifactRole::Labels,
                name: spec.labels_filename.clone(),
                url: join_url(&self.source, &spec.labels_filename),
            });
        }
        artifacts
    }

    pub(crate) fn mark_acquired(&mut self) {
        self.downloaded = true;
        self.extracted = true;
    }

    pub(crate) fn reset_status(&mut self) {
        self.downloaded = false;
        self.extracted = false;
    }
}

fn validate_split(split: Split, spec: &SplitSpec, source: &str) -> Result<(), PrepError> {
    check_relative(split, "subfolder", &spec.subfolder)?;
    check_relative(split, "data filename", &spec.data_filename)?;
    check_relative(split, "labels filename", &spec.labels_filename)?;

    if spec.data_filename.is_empty() && source_file_name(source).is_none() {
        return Err(PrepError::Configuration(format!(
            "split {split} has no data filename and source '{source}' does not name a file"
        )));
    }
    if !spec.labels_filename.is_empty() && spec.labels_filename == spec.data_filename {
        return Err(PrepError::Configuration(format!(
            "split {split} uses '{}' for both data and labels",
            spec.labels_filename
        )));
    }
    Ok(())
}

fn check_relative(split: Split, field: &str, value: &str) -> Result<(), PrepError> {
    let path = Utf8Path::new(value);
    let escapes = path
        .components()
        .any(|component| !matches!(component, Utf8Component::Normal(_)));
    if escapes {
        return Err(PrepError::Configuration(format!(
            "split {split} {field} '{value}' must be a relative path below the destination root"
        )));
    }
    Ok(())
}

/// Appends `filename` to `source`, inserting a separator when needed.
pub fn join_url(source: &str, filename: &str) -> String {
    if filename.is_empty() {
        return source.to_string();
    }
    if source.ends_with('/') {
        format!("{source}{filename}")
    } else {
        format!("{source}/{filename}")
    }
}

/// Last path segment of a URL, ignoring query and fragment.
pub fn source_file_name(source: &str) -> Option<String> {
    let without_fragment = source.split('#').next().unwrap_or(source);
    let path = without_fragment
        .split('?')
        .next()
        .unwrap_or(without_fragment);
    let path = path.split_once("://").map(|(_, rest)| rest).unwrap_or(path);
    let (_, tail) = path.split_once('/')?;
    let name = tail.rsplit('/').next()?;
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
