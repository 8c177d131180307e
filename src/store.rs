use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;

use crate::domain::MarkerKind;
use crate::error::PrepError;

/// Filesystem-backed completion markers.
///
/// A marker for `(folder, artifact, kind)` is the hidden file
/// `.<artifact file name><kind suffix>` next to the artifact. Markers are only
/// ever created; they disappear when the whole destination root is cleared.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkerStore;

impl MarkerStore {
    pub fn new() -> Self {
        Self
    }

    pub fn marker_path(&self, folder: &Utf8Path, artifact: &str, kind: MarkerKind) -> Utf8PathBuf {
        let artifact_path = folder.join(artifact);
        let dir = artifact_path
            .parent()
            .map(Utf8Path::to_path_buf)
            .unwrap_or_else(|| folder.to_path_buf());
        let file_name = artifact_path.file_name().unwrap_or(artifact);
        dir.join(format!(".{file_name}{}", kind.suffix()))
    }

    /// A downloaded artifact counts as marked when its sentinel exists or the
    /// artifact file itself is present, so an archive may be deleted after
    /// extraction without triggering another download.
    pub fn has_marker(&self, folder: &Utf8Path, artifact: &str, kind: MarkerKind) -> bool {
        if self.marker_path(folder, artifact, kind).as_std_path().is_file() {
            return true;
        }
        match kind {
            MarkerKind::Downloaded => folder.join(artifact).as_std_path().is_file(),
            MarkerKind::Extracted => false,
        }
    }

    pub fn write_marker(
        &self,
        folder: &Utf8Path,
        artifact: &str,
        kind: MarkerKind,
    ) -> Result<Utf8PathBuf, PrepError> {
        let path = self.marker_path(folder, artifact, kind);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| PrepError::Filesystem(format!("create {parent}: {err}")))?;
        }
        let content = format!("{kind} {}\n", Utc::now().to_rfc3339());
        fs::write(path.as_std_path(), content)
            .map_err(|err| PrepError::Filesystem(format!("write marker {path}: {err}")))?;
        Ok(path)
    }

    /// Removes the destination root with every artifact and marker under it.
    pub fn clear_root(&self, root: &Utf8Path) -> Result<(), PrepError> {
        if root.as_std_path().exists() {
            fs::remove_dir_all(root.as_std_path())
                .map_err(|err| PrepError::Filesystem(format!("remove {root}: {err}")))?;
        }
        Ok(())
    }
}
