//! Unpacking of sdist archives (.tar.gz, .tgz, .zip)

use super::ExtractError;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tar::Archive;

/// Unpack `archive` into `dest` and return the project root.
///
/// Sdists normally wrap everything in a single `<name>-<version>/`
/// directory; that directory is the root when present.
pub fn unpack(archive: &Path, dest: &Path) -> Result<PathBuf, ExtractError> {
    let name = archive
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("")
        .to_lowercase();

    fs::create_dir_all(dest).map_err(ExtractError::io(dest))?;

    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        extract_tar_gz(archive, dest)?;
    } else if name.ends_with(".zip") {
        extract_zip(archive, dest)?;
    } else {
        return Err(ExtractError::UnsupportedArchive {
            path: archive.to_path_buf(),
        });
    }

    project_root(dest)
}

fn extract_tar_gz(archive_path: &Path, dest: &Path) -> Result<(), ExtractError> {
    let file = File::open(archive_path).map_err(ExtractError::io(archive_path))?;
    let mut archive = Archive::new(GzDecoder::new(file));

    archive.unpack(dest).map_err(|e| ExtractError::Archive {
        path: archive_path.to_path_buf(),
        message: e.to_string(),
    })
}

fn extract_zip(archive_path: &Path, dest: &Path) -> Result<(), ExtractError> {
    let archive_error = |message: String| ExtractError::Archive {
        path: archive_path.to_path_buf(),
        message,
    };

    let file = File::open(archive_path).map_err(ExtractError::io(archive_path))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| archive_error(e.to_string()))?;
    archive
        .extract(dest)
        .map_err(|e| archive_error(e.to_string()))
}

fn project_root(dest: &Path) -> Result<PathBuf, ExtractError> {
    let entries = fs::read_dir(dest)
        .map_err(ExtractError::io(dest))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(ExtractError::io(dest))?;

    match entries.as_slice() {
        [single] if single.path().is_dir() => Ok(single.path()),
        _ => Ok(dest.to_path_buf()),
    }
}
