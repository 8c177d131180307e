use std::fs;
use std::io;
use std::path::Path;

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::debug;
use zip::ZipArchive;

use crate::domain::ArchiveFormat;
use crate::error::PrepError;

/// Unpacks one local archive into a folder.
pub trait ArchiveExtractor: Send + Sync {
    fn extract(&self, archive_path: &Path, destination: &Path) -> Result<(), PrepError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FsArchiveExtractor;

impl ArchiveExtractor for FsArchiveExtractor {
    fn extract(&self, archive_path: &Path, destination: &Path) -> Result<(), PrepError> {
        let format = ArchiveFormat::from_path(archive_path).ok_or_else(|| {
            PrepError::UnsupportedArchive(archive_path.display().to_string())
        })?;
        fs::create_dir_all(destination)
            .map_err(|err| PrepError::Filesystem(format!("create {}: {err}", destination.display())))?;
        match format {
            ArchiveFormat::Zip => extract_zip(archive_path, destination),
            ArchiveFormat::TarGz => extract_tar_gz(archive_path, destination),
        }
    }
}

/// Writes every entry of a zip archive under `target_dir`, refusing entries
/// whose names escape it.
pub fn extract_zip(zip_path: &Path, target_dir: &Path) -> Result<(), PrepError> {
    let archive_error =
        |detail: String| PrepError::Archive(format!("{}: {detail}", zip_path.display()));
    let file = fs::File::open(zip_path).map_err(|err| archive_error(format!("open: {err}")))?;
    let mut archive = ZipArchive::new(file).map_err(|err| archive_error(err.to_string()))?;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|err| archive_error(format!("entry {index}: {err}")))?;
        let relative = entry
            .enclosed_name()
            .ok_or_else(|| archive_error(format!("entry '{}' escapes the folder", entry.name())))?;
        let entry_path = target_dir.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&entry_path)
                .map_err(|err| archive_error(format!("{}: {err}", relative.display())))?;
            continue;
        }
        if let Some(parent) = entry_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| archive_error(format!("{}: {err}", relative.display())))?;
        }
        let mut outfile = fs::File::create(&entry_path)
            .map_err(|err| archive_error(format!("{}: {err}", relative.display())))?;
        let written = io::copy(&mut entry, &mut outfile)
            .map_err(|err| archive_error(format!("{}: {err}", relative.display())))?;
        debug!(entry = %relative.display(), bytes = written, "unzipped entry");
    }
    debug!(archive = %zip_path.display(), entries = archive.len(), "zip extracted");
    Ok(())
}

pub fn extract_tar_gz(archive_path: &Path, target_dir: &Path) -> Result<(), PrepError> {
    let file = fs::File::open(archive_path).map_err(|err| {
        PrepError::Archive(format!("open tarball {}: {err}", archive_path.display()))
    })?;
    let mut archive = Archive::new(GzDecoder::new(file));
    archive
        .unpack(target_dir)
        .map_err(|err| PrepError::Archive(format!("{}: {err}", archive_path.display())))
}
