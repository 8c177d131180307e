use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use dataset_prep::descriptor::{ArtifactRole, DatasetDescriptor, DescriptorOptions, SplitSpec};
use dataset_prep::domain::Split;
use dataset_prep::error::PrepError;

#[test]
fn defaults_follow_split_names() {
    let options = DescriptorOptions::new("https://example.org/ds/all.zip");
    assert_eq!(options.destination_root, Utf8PathBuf::from("./data/"));
    assert!(options.extract);
    assert!(options.verbose);
    assert!(!options.refresh_on_every_use);

    let descriptor = DatasetDescriptor::new(options).unwrap();
    assert_eq!(descriptor.split(Split::Train).subfolder, "train");
    assert_eq!(descriptor.split(Split::Validate).subfolder, "validate");
    assert_eq!(descriptor.split(Split::Test).subfolder, "test");
    assert_eq!(descriptor.present_splits().count(), 3);
    assert!(!descriptor.is_downloaded());
    assert!(!descriptor.is_extracted());
}

#[test]
fn empty_data_filename_fetches_the_source_itself() {
    let mut options = DescriptorOptions::new("https://example.org/ds/all.zip");
    options.validate = SplitSpec::absent(Split::Validate);
    options.test = SplitSpec::absent(Split::Test);
    let descriptor = DatasetDescriptor::new(options).unwrap();

    let artifacts = descriptor.artifacts(Split::Train);
    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].name, "all.zip");
    assert_eq!(artifacts[0].url, "https://example.org/ds/all.zip");
}

#[test]
fn labels_follow_data() {
    let mut options = DescriptorOptions::new("https://example.org/mnist/");
    options.train = SplitSpec::for_split(Split::Train)
        .with_data("train-images-idx3-ubyte.gz")
        .with_labels("train-labels-idx1-ubyte.gz");
    options.validate = SplitSpec::absent(Split::Validate);
    options.test = SplitSpec::absent(Split::Test);
    let descriptor = DatasetDescriptor::new(options).unwrap();

    let roles = descriptor
        .artifacts(Split::Train)
        .into_iter()
        .map(|artifact| artifact.role)
        .collect::<Vec<_>>();
    assert_eq!(roles, vec![ArtifactRole::Data, ArtifactRole::Labels]);
}

#[test]
fn duplicate_subfolders_are_rejected() {
    let mut options = DescriptorOptions::new("https://example.org/ds/");
    options.train = SplitSpec::for_split(Split::Train)
        .with_data("a.csv")
        .with_subfolder("shared");
    options.test = SplitSpec::for_split(Split::Test)
        .with_data("b.csv")
        .with_subfolder("shared/");
    options.validate = SplitSpec::absent(Split::Validate);
    let err = DatasetDescriptor::new(options).unwrap_err();
    assert_matches!(err, PrepError::Configuration(_));
}

#[test]
fn absent_splits_may_share_subfolders() {
    let mut options = DescriptorOptions::new("https://example.org/ds/");
    options.train = SplitSpec::for_split(Split::Train).with_data("a.csv");
    options.validate = SplitSpec::absent(Split::Validate).with_subfolder("train");
    options.test = SplitSpec::absent(Split::Test).with_subfolder("train");
    assert!(DatasetDescriptor::new(options).is_ok());
}

#[test]
fn missing_source_is_rejected() {
    let err = DatasetDescriptor::new(DescriptorOptions::new("  ")).unwrap_err();
    assert_matches!(err, PrepError::Configuration(_));
}

#[test]
fn split_without_any_file_is_rejected() {
    let mut options = DescriptorOptions::new("https://example.org/ds/");
    options.validate = SplitSpec::absent(Split::Validate);
    options.test = SplitSpec::absent(Split::Test);
    let err = DatasetDescriptor::new(options).unwrap_err();
    assert_matches!(err, PrepError::Configuration(_));
}

#[test]
fn same_file_for_data_and_labels_is_rejected() {
    let mut options = DescriptorOptions::new("https://example.org/ds/");
    options.train = SplitSpec::for_split(Split::Train)
        .with_data("train.csv")
        .with_labels("train.csv");
    options.validate = SplitSpec::absent(Split::Validate);
    options.test = SplitSpec::absent(Split::Test);
    let err = DatasetDescriptor::new(options).unwrap_err();
    assert_matches!(err, PrepError::Configuration(_));
}

#[test]
fn already_downloaded_seeds_status() {
    let mut options = DescriptorOptions::new("https://example.org/ds/all.zip");
    options.already_downloaded = true;
    let descriptor = DatasetDescriptor::new(options).unwrap();
    assert!(descriptor.is_downloaded());
    assert!(!descriptor.is_extracted());
}

#[test]
fn each_split_uses_its_own_folder() {
    let mut options = DescriptorOptions::new("https://example.org/ds/");
    options.destination_root = Utf8PathBuf::from("/tmp/ds");
    options.train = SplitSpec::for_split(Split::Train).with_data("train.csv");
    options.validate = SplitSpec::for_split(Split::Validate)
        .with_data("validate.csv")
        .with_subfolder("");
    options.test = SplitSpec::absent(Split::Test);
    let descriptor = DatasetDescriptor::new(options).unwrap();
    assert_eq!(
        descriptor.split_folder(Split::Train),
        Utf8PathBuf::from("/tmp/ds/train")
    );
    assert_eq!(
        descriptor.split_folder(Split::Validate),
        Utf8PathBuf::from("/tmp/ds")
    );
}
