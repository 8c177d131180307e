use assert_matches::assert_matches;

use dataset_prep::config::{ConfigLoader, MNIST_SOURCE};
use dataset_prep::descriptor::DatasetDescriptor;
use dataset_prep::domain::{Preset, Split};
use dataset_prep::error::PrepError;

#[test]
fn resolves_config_file() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("dataset.json");
    std::fs::write(
        &path,
        r#"{
            "source": "https://example.org/ds/",
            "train": {"data": "train.zip", "labels": "train-labels.csv"},
            "validate": "validate.zip",
            "refresh_on_every_use": true,
            "verbose": false
        }"#,
    )
    .unwrap();

    let options = ConfigLoader::resolve(path.to_str()).unwrap();
    assert!(options.refresh_on_every_use);
    assert!(!options.verbose);
    assert!(!options.test.present);

    let descriptor = DatasetDescriptor::new(options).unwrap();
    assert_eq!(
        descriptor.present_splits().collect::<Vec<_>>(),
        vec![Split::Train, Split::Validate]
    );
    assert_eq!(descriptor.artifacts(Split::Train).len(), 2);
}

#[test]
fn unreadable_config_path() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("missing.json");
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, PrepError::ConfigRead(_));
}

#[test]
fn malformed_config() {
    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("dataset.json");
    std::fs::write(&path, "{\"train\": 1}").unwrap();
    let err = ConfigLoader::resolve(path.to_str()).unwrap_err();
    assert_matches!(err, PrepError::ConfigParse(_));
}

#[test]
fn mnist_preset_is_valid() {
    let options = ConfigLoader::preset(Preset::Mnist, None, None).unwrap();
    assert_eq!(options.source, MNIST_SOURCE);
    let descriptor = DatasetDescriptor::new(options).unwrap();
    assert_eq!(
        descriptor.present_splits().collect::<Vec<_>>(),
        vec![Split::Train, Split::Test]
    );
    let test = descriptor.artifacts(Split::Test);
    assert_eq!(test[0].name, "t10k-images-idx3-ubyte.gz");
    assert_eq!(test[1].name, "t10k-labels-idx1-ubyte.gz");
}

#[test]
fn csv_preset_needs_source_and_file() {
    let err = ConfigLoader::preset(Preset::Csv, None, Some("iris.csv")).unwrap_err();
    assert_matches!(err, PrepError::Configuration(_));

    let options =
        ConfigLoader::preset(Preset::Csv, Some("https://example.org/ds"), Some("iris.csv"))
            .unwrap();
    let descriptor = DatasetDescriptor::new(options).unwrap();
    assert_eq!(
        descriptor.artifacts(Split::Train)[0].url,
        "https://example.org/ds/iris.csv"
    );
    assert_eq!(
        descriptor.split_folder(Split::Train),
        descriptor.destination_root().to_path_buf()
    );
}
