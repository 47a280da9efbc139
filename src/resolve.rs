//! Package resolution pipeline
//!
//! Fetches the registry record, reads the sdist build script, merges both and
//! derives the recipe-level flags (skip selector, python limit, noarch).

use crate::metadata::{BuildMetadata, MergedMetadata, ReleaseMetadata, merge};
use crate::registry::RegistryError;
use crate::requirements::python_version::{
    PythonSupport, Selector, python_limit, python_skip_selector,
};
use crate::requirements::{NormalizedRequirementSet, get_entry_points, normalize};
use crate::sdist::ExtractError;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

/// Where release records come from
pub trait ReleaseSource {
    fn fetch_release(
        &self,
        package: &str,
        version: Option<&str>,
    ) -> Result<ReleaseMetadata, RegistryError>;
}

/// Where build-script metadata comes from
pub trait BuildSource {
    fn build_metadata(&self, release: &ReleaseMetadata) -> Result<BuildMetadata, ExtractError>;
}

/// Everything a recipe writer needs for one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPackage {
    pub metadata: MergedMetadata,
    pub requirements: NormalizedRequirementSet,
    pub entry_points: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<Selector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python_limit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noarch: Option<String>,
}

pub struct Resolver<'a> {
    releases: &'a dyn ReleaseSource,
    builds: Option<&'a dyn BuildSource>,
    support: PythonSupport,
}

impl<'a> Resolver<'a> {
    pub fn new(releases: &'a dyn ReleaseSource, support: PythonSupport) -> Self {
        Self {
            releases,
            builds: None,
            support,
        }
    }

    /// Also read the sdist build script of each release
    pub fn with_build_source(mut self, builds: &'a dyn BuildSource) -> Self {
        self.builds = Some(builds);
        self
    }

    pub fn resolve(
        &self,
        package: &str,
        version: Option<&str>,
    ) -> Result<ResolvedPackage, ResolveError> {
        let release = self.releases.fetch_release(package, version)?;
        info!("Resolving {} {}", release.name, release.version);

        let build = match self.builds {
            Some(builds) => match builds.build_metadata(&release) {
                Ok(build) => Some(build),
                Err(e) if e.is_fallback_eligible() => {
                    warn!(
                        "Using registry metadata only for {} {}: {}",
                        release.name, release.version, e
                    );
                    None
                }
                Err(e) => return Err(e.into()),
            },
            None => None,
        };

        let merged = merge(&release, build.as_ref());
        let mut requirements = normalize(&merged);
        let (mut skip, python_limit) =
            self.python_constraints(merged.requires_python.as_deref());

        // Platform selectors in run need per-platform builds
        let noarch = (merged.compilers.is_empty()
            && !requirements.run.iter().any(|entry| entry.contains("# [")))
        .then(|| "python".to_string());
        if noarch.is_some() {
            // A noarch package carries its interpreter range as a pin instead
            skip = None;
            if let Some(limit) = &python_limit {
                pin_python(&mut requirements, limit);
            }
        }

        Ok(ResolvedPackage {
            entry_points: build.as_ref().map(get_entry_points).unwrap_or_default(),
            metadata: merged,
            requirements,
            skip,
            python_limit,
            noarch,
        })
    }

    fn python_constraints(&self, requires_python: Option<&str>) -> (Option<Selector>, Option<String>) {
        let Some(expr) = requires_python else {
            return (None, None);
        };

        let skip = python_skip_selector(expr, &self.support).unwrap_or_else(|e| {
            warn!("Ignoring requires_python: {}", e);
            None
        });
        let limit = python_limit(expr, &self.support).unwrap_or_else(|e| {
            warn!("Ignoring requires_python: {}", e);
            None
        });
        (skip, limit)
    }
}

fn pin_python(requirements: &mut NormalizedRequirementSet, limit: &str) {
    for entry in requirements
        .host
        .iter_mut()
        .chain(requirements.run.iter_mut())
        .filter(|entry| entry.as_str() == "python")
    {
        *entry = format!("python {}", limit);
    }
}
