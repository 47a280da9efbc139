//! Release, build-script and merged metadata records

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// What the package registry publishes for one release
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReleaseMetadata {
    pub name: String,
    pub version: String,
    pub requires_python: Option<String>,
    pub requires_dist: Vec<String>,
    pub sdist_url: String,
    pub sha256: String,
    pub summary: Option<String>,
    pub license: Option<String>,
    pub home: Option<String>,
}

/// What a source distribution's build script declares
///
/// Any field may be empty; scripts routinely omit keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildMetadata {
    pub name: Option<String>,
    pub version: Option<String>,
    pub python_requires: Option<String>,
    pub install_requires: Vec<String>,
    pub setup_requires: Vec<String>,
    /// Category (`console_scripts`, `gui_scripts`, ...) to entry strings
    pub entry_points: BTreeMap<String, Vec<String>>,
    pub compilers: BTreeSet<String>,
    pub packages: Vec<String>,
}

/// Where the build-side half of a merged record came from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildSourceKind {
    /// The sdist build script was captured
    Sdist,
    /// Build-script data was unavailable; registry data only
    #[default]
    Registry,
}

/// Registry and build-script metadata reconciled into one record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergedMetadata {
    pub name: String,
    pub version: String,
    pub requires_python: Option<String>,
    pub sdist_url: String,
    pub sha256: String,
    pub summary: Option<String>,
    pub license: Option<String>,
    pub home: Option<String>,
    /// `requires_dist` from the registry
    pub release_requires: Vec<String>,
    /// `install_requires` from the build script
    pub build_requires: Vec<String>,
    pub setup_requires: Vec<String>,
    pub entry_points: BTreeMap<String, Vec<String>>,
    pub compilers: BTreeSet<String>,
    pub packages: Vec<String>,
    pub build_source: BuildSourceKind,
}

/// Reconcile a release record with build-script metadata.
///
/// `build` is `None` when no build script was captured. Identity, digest and
/// URL come from the registry. Compiler and setup information from the build
/// script is kept as-is and never dropped; compilers are unioned with hints
/// inferred from the setup requirements.
pub fn merge(release: &ReleaseMetadata, build: Option<&BuildMetadata>) -> MergedMetadata {
    let build_source = match build {
        Some(_) => BuildSourceKind::Sdist,
        None => BuildSourceKind::Registry,
    };
    let empty = BuildMetadata::default();
    let build = build.unwrap_or(&empty);

    if let Some(version) = &build.version
        && version != &release.version
    {
        warn!(
            "Build script of {} declares version {}, registry reports {}",
            release.name, version, release.version
        );
    }

    let compilers = crate::requirements::get_compilers(&build.setup_requires, &build.compilers);

    MergedMetadata {
        name: release.name.clone(),
        version: release.version.clone(),
        requires_python: release
            .requires_python
            .clone()
            .filter(|r| !r.trim().is_empty())
            .or_else(|| build.python_requires.clone()),
        sdist_url: release.sdist_url.clone(),
        sha256: release.sha256.clone(),
        summary: release.summary.clone(),
        license: release.license.clone(),
        home: release.home.clone(),
        release_requires: release.requires_dist.clone(),
        build_requires: build.install_requires.clone(),
        setup_requires: build.setup_requires.clone(),
        entry_points: build.entry_points.clone(),
        compilers,
        packages: build.packages.clone(),
        build_source,
    }
}
