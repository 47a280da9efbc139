//! Source distribution metadata extraction
//!
//! Downloads an sdist, checks it against the registry digest, unpacks it and
//! reads what its build script declares:
//! 1. `setup.py`, run inside the capture harness
//! 2. `pyproject.toml` (`[project]` and `[build-system]`), filling whatever
//!    the build script left empty
//!
//! Everything happens inside a per-call temporary directory that is removed
//! on every exit path.

mod archive;
mod capture;
mod harness;
mod pyproject;

pub use archive::unpack;
pub use capture::build_metadata_from_capture;
pub use harness::{CaptureHarness, PythonHarness};

use crate::metadata::{BuildMetadata, ReleaseMetadata};
use crate::resolve::BuildSource;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Failed to download {url}: {message}")]
    Network { url: String, message: String },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to unpack {path}: {message}")]
    Archive { path: PathBuf, message: String },

    #[error("Unsupported archive format: {path}")]
    UnsupportedArchive { path: PathBuf },

    #[error("SHA256 verification failed for '{path}'\n  Expected: {expected}\n  Got: {actual}")]
    DigestMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("No setup.py or pyproject.toml [project] table found in {path}")]
    MissingBuildScript { path: PathBuf },

    #[error("Build script failed: {0}")]
    BuildScript(String),
}

impl ExtractError {
    pub(crate) fn io(path: &Path) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Whether resolution may continue with registry metadata alone
    pub fn is_fallback_eligible(&self) -> bool {
        matches!(
            self,
            ExtractError::BuildScript(_) | ExtractError::MissingBuildScript { .. }
        )
    }
}

/// File name an archive URL downloads to
fn archive_file_name(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("sdist")
}

/// Download an archive byte-for-byte into `dest_dir`, returning its path.
///
/// The digest is not checked here; see [`verify_sha256`].
pub fn download_sdist(url: &str, dest_dir: &Path) -> Result<PathBuf, ExtractError> {
    let path = dest_dir.join(archive_file_name(url));
    info!("Downloading {}", url);

    let network = |message: String| ExtractError::Network {
        url: url.to_string(),
        message,
    };

    let response = ureq::get(url).call().map_err(|e| network(e.to_string()))?;
    let mut reader = response.into_body().into_reader();
    let mut file = File::create(&path).map_err(ExtractError::io(&path))?;
    let bytes = std::io::copy(&mut reader, &mut file).map_err(|e| network(e.to_string()))?;

    debug!("Wrote {} bytes to {}", bytes, path.display());
    Ok(path)
}

/// Verify SHA256 checksum of a file
pub fn verify_sha256(path: &Path, expected: &str) -> Result<(), ExtractError> {
    let mut file = File::open(path).map_err(ExtractError::io(path))?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher).map_err(ExtractError::io(path))?;
    let actual = hex::encode(hasher.finalize());

    if actual != expected.to_lowercase() {
        return Err(ExtractError::DigestMismatch {
            path: path.to_path_buf(),
            expected: expected.to_string(),
            actual,
        });
    }

    Ok(())
}

/// Reads build metadata out of source distributions
pub struct SdistExtractor<H> {
    harness: H,
}

impl<H: CaptureHarness> SdistExtractor<H> {
    pub fn new(harness: H) -> Self {
        Self { harness }
    }

    /// Unpack a downloaded archive under `work_dir` and read its declarations
    pub fn extract(&self, archive: &Path, work_dir: &Path) -> Result<BuildMetadata, ExtractError> {
        let root = unpack(archive, &work_dir.join("src"))?;
        self.extract_tree(&root)
    }

    /// Read the declarations of an unpacked source tree
    pub fn extract_tree(&self, root: &Path) -> Result<BuildMetadata, ExtractError> {
        let pyproject = pyproject::read_pyproject(root)?;

        if !root.join("setup.py").is_file() {
            return match pyproject {
                Some(pyproject) if pyproject.has_project_table => Ok(pyproject.metadata),
                _ => Err(ExtractError::MissingBuildScript {
                    path: root.to_path_buf(),
                }),
            };
        }

        let captured = self.harness.capture(root)?;
        let mut build = build_metadata_from_capture(&captured)?;
        if let Some(pyproject) = pyproject {
            fill_missing(&mut build, pyproject.metadata);
        }
        Ok(build)
    }
}

/// Copy fields the build script left empty from pyproject.toml
fn fill_missing(build: &mut BuildMetadata, fallback: BuildMetadata) {
    build.name = build.name.take().or(fallback.name);
    build.version = build.version.take().or(fallback.version);
    build.python_requires = build.python_requires.take().or(fallback.python_requires);
    if build.install_requires.is_empty() {
        build.install_requires = fallback.install_requires;
    }
    if build.setup_requires.is_empty() {
        build.setup_requires = fallback.setup_requires;
    }
    if build.entry_points.is_empty() {
        build.entry_points = fallback.entry_points;
    }
    if build.packages.is_empty() {
        build.packages = fallback.packages;
    }
}

impl<H: CaptureHarness> BuildSource for SdistExtractor<H> {
    fn build_metadata(&self, release: &ReleaseMetadata) -> Result<BuildMetadata, ExtractError> {
        let work_dir = TempDir::new().map_err(ExtractError::io(&std::env::temp_dir()))?;
        let archive = download_sdist(&release.sdist_url, work_dir.path())?;
        verify_sha256(&archive, &release.sha256)?;
        self.extract(&archive, work_dir.path())
    }
}
