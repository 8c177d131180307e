use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::descriptor::{DescriptorOptions, SplitSpec};
use crate::domain::{Preset, Split};
use crate::error::PrepError;

pub const DEFAULT_CONFIG_FILE: &str = "dataset.json";
pub const MNIST_SOURCE: &str = "https://storage.googleapis.com/cvdf-datasets/mnist/";

#[derive(Debug, Deserialize, Serialize)]
pub struct DatasetConfig {
    pub source: String,
    #[serde(default)]
    pub destination_root: Option<String>,
    #[serde(default)]
    pub train: Option<SplitEntry>,
    #[serde(default)]
    pub validate: Option<SplitEntry>,
    #[serde(default)]
    pub test: Option<SplitEntry>,
    #[serde(default)]
    pub extract: Option<bool>,
    #[serde(default)]
    pub refresh_on_every_use: Option<bool>,
    #[serde(default)]
    pub already_downloaded: Option<bool>,
    #[serde(default)]
    pub verbose: Option<bool>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum SplitEntry {
    Shorthand(String),
    Detailed(SplitEntryObject),
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SplitEntryObject {
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub labels: Option<String>,
    #[serde(default)]
    pub subfolder: Option<String>,
    #[serde(default)]
    pub present: Option<bool>,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<DescriptorOptions, PrepError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        if path.is_none() && !config_path.exists() {
            return Err(PrepError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| PrepError::ConfigRead(config_path.clone()))?;
        let config: DatasetConfig = serde_json::from_str(&content)
            .map_err(|err| PrepError::ConfigParse(err.to_string()))?;

        Ok(Self::resolve_config(config))
    }

    /// Splits missing from the file are treated as absent at the source.
    pub fn resolve_config(config: DatasetConfig) -> DescriptorOptions {
        let mut options = DescriptorOptions::new(config.source);
        if let Some(root) = config.destination_root {
            options.destination_root = Utf8PathBuf::from(root);
        }
        let entries = [config.train, config.validate, config.test];
        for (split, entry) in Split::ALL.into_iter().zip(entries) {
            *options.split_mut(split) = resolve_split(split, entry);
        }
        if let Some(extract) = config.extract {
            options.extract = extract;
        }
        if let Some(refresh) = config.refresh_on_every_use {
            options.refresh_on_every_use = refresh;
        }
        if let Some(already) = config.already_downloaded {
            options.already_downloaded = already;
        }
        if let Some(verbose) = config.verbose {
            options.verbose = verbose;
        }
        options
    }

    pub fn preset(
        preset: Preset,
        source: Option<&str>,
        file: Option<&str>,
    ) -> Result<DescriptorOptions, PrepError> {
        match preset {
            Preset::Mnist => Ok(mnist_options(source.unwrap_or(MNIST_SOURCE))),
            Preset::Csv => {
                let source = source.ok_or_else(|| {
                    PrepError::Configuration("csv preset requires --source".to_string())
                })?;
                let file = file.ok_or_else(|| {
                    PrepError::Configuration("csv preset requires --file".to_string())
                })?;
                Ok(csv_options(source, file))
            }
        }
    }
}

fn resolve_split(split: Split, entry: Option<SplitEntry>) -> SplitSpec {
    match entry {
        None => SplitSpec::absent(split),
        Some(SplitEntry::Shorthand(data)) => SplitSpec::for_split(split).with_data(data),
        Some(SplitEntry::Detailed(obj)) => {
            let mut spec = SplitSpec::for_split(split);
            if let Some(data) = obj.data {
                spec.data_filename = data;
            }
            if let Some(labels) = obj.labels {
                spec.labels_filename = labels;
            }
            if let Some(subfolder) = obj.subfolder {
                spec.subfolder = subfolder;
            }
            spec.present = obj.present.unwrap_or(true);
            spec
        }
    }
}

/// The four gzip IDX files, with images and labels paired per split.
pub fn mnist_options(source: &str) -> DescriptorOptions {
    let mut options = DescriptorOptions::new(source);
    options.destination_root = Utf8PathBuf::from("./data/MNIST");
    options.train = SplitSpec::for_split(Split::Train)
        .with_data("train-images-idx3-ubyte.gz")
        .with_labels("train-labels-idx1-ubyte.gz");
    options.validate = SplitSpec::absent(Split::Validate);
    options.test = SplitSpec::for_split(Split::Test)
        .with_data("t10k-images-idx3-ubyte.gz")
        .with_labels("t10k-labels-idx1-ubyte.gz");
    options
}

/// A single CSV file, plain or archived, used as the train split.
pub fn csv_options(source: &str, file: &str) -> DescriptorOptions {
    let mut options = DescriptorOptions::new(source);
    options.train = SplitSpec::for_split(Split::Train)
        .with_data(file)
        .with_subfolder("");
    options.validate = SplitSpec::absent(Split::Validate);
    options.test = SplitSpec::absent(Split::Test);
    options
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_config_shorthand() {
        let config: DatasetConfig = serde_json::from_str(
            r#"{
                "source": "https://example.org/ds/",
                "destination_root": "/tmp/ds",
                "train": "train.tgz",
                "test": {"data": "test.zip", "labels": "test-labels.csv", "subfolder": "eval"}
            }"#,
        )
        .unwrap();

        let options = ConfigLoader::resolve_config(config);
        assert_eq!(options.destination_root, Utf8PathBuf::from("/tmp/ds"));
        assert_eq!(options.train.data_filename, "train.tgz");
        assert_eq!(options.train.subfolder, "train");
        assert!(!options.validate.present);
        assert_eq!(options.test.labels_filename, "test-labels.csv");
        assert_eq!(options.test.subfolder, "eval");
        assert!(options.extract);
        assert!(options.verbose);
    }
}
