use camino::Utf8PathBuf;

use dataset_prep::domain::MarkerKind;
use dataset_prep::store::MarkerStore;

fn folder(temp: &tempfile::TempDir) -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(temp.path().join("ds").join("train")).unwrap()
}

#[test]
fn query_before_folder_exists() {
    let temp = tempfile::tempdir().unwrap();
    let store = MarkerStore::new();
    let folder = folder(&temp);
    assert!(!store.has_marker(&folder, "train.tgz", MarkerKind::Downloaded));
    assert!(!store.has_marker(&folder, "train.tgz", MarkerKind::Extracted));
}

#[test]
fn written_markers_are_found() {
    let temp = tempfile::tempdir().unwrap();
    let store = MarkerStore::new();
    let folder = folder(&temp);

    let path = store
        .write_marker(&folder, "train.tgz", MarkerKind::Extracted)
        .unwrap();
    assert_eq!(path, folder.join(".train.tgz_extracted"));
    assert!(store.has_marker(&folder, "train.tgz", MarkerKind::Extracted));
    assert!(!store.has_marker(&folder, "train.tgz", MarkerKind::Downloaded));
}

#[test]
fn artifact_file_counts_as_downloaded() {
    let temp = tempfile::tempdir().unwrap();
    let store = MarkerStore::new();
    let folder = folder(&temp);
    std::fs::create_dir_all(folder.as_std_path()).unwrap();
    std::fs::write(folder.join("train.csv").as_std_path(), b"a,b\n").unwrap();

    assert!(store.has_marker(&folder, "train.csv", MarkerKind::Downloaded));
    assert!(!store.has_marker(&folder, "train.csv", MarkerKind::Extracted));
}

#[test]
fn clearing_root_removes_markers() {
    let temp = tempfile::tempdir().unwrap();
    let store = MarkerStore::new();
    let folder = folder(&temp);
    store
        .write_marker(&folder, "train.csv", MarkerKind::Downloaded)
        .unwrap();

    let root = folder.parent().unwrap().to_path_buf();
    store.clear_root(&root).unwrap();
    assert!(!root.as_std_path().exists());
    assert!(!store.has_marker(&folder, "train.csv", MarkerKind::Downloaded));

    store.clear_root(&root).unwrap();
}
