//! PyPI registry integration
//!
//! Fetches release metadata from the PyPI JSON API:
//! `GET {index}/{package}/json` for the latest release or
//! `GET {index}/{package}/{version}/json` for a pinned one.

use crate::metadata::ReleaseMetadata;
use crate::resolve::ReleaseSource;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

/// Default JSON API root
pub const DEFAULT_INDEX_URL: &str = "https://pypi.org/pypi";

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Package '{package}' not found on PyPI")]
    PackageNotFound { package: String },

    #[error("Version {version} of '{package}' not found on PyPI")]
    VersionNotFound { package: String, version: String },

    #[error("Hash information for sdist was not found on PyPI metadata of '{package}'")]
    MetadataNotFound { package: String },

    #[error("Failed to fetch package info from PyPI: {0}")]
    Network(String),

    #[error("Failed to parse PyPI response: {0}")]
    Parse(String),
}

/// PyPI JSON API response structure
#[derive(Deserialize)]
struct PyPiResponse {
    info: PackageInfo,
    #[serde(default)]
    urls: Vec<ReleaseFile>,
}

#[derive(Deserialize)]
struct PackageInfo {
    name: String,
    version: String,
    requires_python: Option<String>,
    requires_dist: Option<Vec<String>>,
    summary: Option<String>,
    license: Option<String>,
    home_page: Option<String>,
}

/// One published artifact of a release
#[derive(Deserialize, Debug, Clone)]
pub struct ReleaseFile {
    pub packagetype: String,
    #[serde(default)]
    pub url: String,
    pub digests: Digests,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Digests {
    pub sha256: String,
}

/// Client for a PyPI-compatible JSON API
#[derive(Debug, Clone)]
pub struct PyPi {
    index_url: String,
}

impl Default for PyPi {
    fn default() -> Self {
        Self::new(DEFAULT_INDEX_URL)
    }
}

impl PyPi {
    pub fn new(index_url: &str) -> Self {
        Self {
            index_url: index_url.trim_end_matches('/').to_string(),
        }
    }

    fn release_url(&self, package: &str, version: Option<&str>) -> String {
        match version {
            Some(version) => format!("{}/{}/{}/json", self.index_url, package, version),
            None => format!("{}/{}/json", self.index_url, package),
        }
    }

    /// Fetch release metadata; without a version the latest release is used
    pub fn fetch_release(
        &self,
        package: &str,
        version: Option<&str>,
    ) -> Result<ReleaseMetadata, RegistryError> {
        let url = self.release_url(package, version);
        info!("Fetching {}", url);

        let response = ureq::get(&url).call().map_err(|e| match e {
            ureq::Error::StatusCode(404) => match version {
                Some(version) => RegistryError::VersionNotFound {
                    package: package.to_string(),
                    version: version.to_string(),
                },
                None => RegistryError::PackageNotFound {
                    package: package.to_string(),
                },
            },
            other => RegistryError::Network(other.to_string()),
        })?;

        let body = response
            .into_body()
            .read_to_string()
            .map_err(|e| RegistryError::Network(e.to_string()))?;

        parse_release(&body)
    }
}

impl ReleaseSource for PyPi {
    fn fetch_release(
        &self,
        package: &str,
        version: Option<&str>,
    ) -> Result<ReleaseMetadata, RegistryError> {
        PyPi::fetch_release(self, package, version)
    }
}

/// Parse a JSON API body into a release record
pub fn parse_release(body: &str) -> Result<ReleaseMetadata, RegistryError> {
    let response: PyPiResponse =
        serde_json::from_str(body).map_err(|e| RegistryError::Parse(e.to_string()))?;
    release_from_response(response)
}

fn release_from_response(response: PyPiResponse) -> Result<ReleaseMetadata, RegistryError> {
    let info = response.info;
    let sha256 = sha256_from_urls(&info.name, &response.urls)?.to_string();
    let sdist_url = sdist_file(&response.urls)
        .map(|file| file.url.clone())
        .unwrap_or_default();
    debug!("Selected sdist {} for {} {}", sdist_url, info.name, info.version);

    Ok(ReleaseMetadata {
        sdist_url,
        sha256,
        name: info.name,
        version: info.version,
        requires_python: info.requires_python.filter(|r| !r.trim().is_empty()),
        requires_dist: info.requires_dist.unwrap_or_default(),
        summary: info.summary.filter(|s| !s.is_empty()),
        license: info.license.filter(|l| !l.is_empty()),
        home: info.home_page.filter(|h| !h.is_empty()),
    })
}

fn sdist_file(urls: &[ReleaseFile]) -> Option<&ReleaseFile> {
    urls.iter().find(|file| file.packagetype == "sdist")
}

/// Digest of the first source distribution among a release's files
pub fn sha256_from_urls<'a>(
    package: &str,
    urls: &'a [ReleaseFile],
) -> Result<&'a str, RegistryError> {
    sdist_file(urls)
        .map(|file| file.digests.sha256.as_str())
        .ok_or_else(|| RegistryError::MetadataNotFound {
            package: package.to_string(),
        })
}
