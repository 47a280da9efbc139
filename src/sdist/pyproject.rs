//! `pyproject.toml` declarations

use super::ExtractError;
use crate::metadata::BuildMetadata;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Deserialize, Default)]
struct PyProject {
    project: Option<Project>,
    #[serde(rename = "build-system")]
    build_system: Option<BuildSystem>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
struct Project {
    name: Option<String>,
    version: Option<String>,
    requires_python: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    scripts: BTreeMap<String, String>,
    #[serde(default)]
    gui_scripts: BTreeMap<String, String>,
    #[serde(default)]
    entry_points: BTreeMap<String, BTreeMap<String, String>>,
}

#[derive(Deserialize, Default)]
struct BuildSystem {
    #[serde(default)]
    requires: Vec<String>,
}

/// What a source tree's `pyproject.toml` declares
pub(super) struct PyProjectMetadata {
    /// Whether a PEP 621 `[project]` table was present
    pub(super) has_project_table: bool,
    pub(super) metadata: BuildMetadata,
}

fn format_entries(entries: BTreeMap<String, String>) -> Vec<String> {
    entries
        .into_iter()
        .map(|(name, target)| format!("{} = {}", name, target))
        .collect()
}

/// Read `pyproject.toml` from `root`, if present
pub(super) fn read_pyproject(root: &Path) -> Result<Option<PyProjectMetadata>, ExtractError> {
    let path = root.join("pyproject.toml");
    if !path.is_file() {
        return Ok(None);
    }

    let content = fs::read_to_string(&path).map_err(ExtractError::io(&path))?;
    let parsed: PyProject = toml::from_str(&content)
        .map_err(|e| ExtractError::BuildScript(format!("Invalid pyproject.toml: {}", e)))?;

    let has_project_table = parsed.project.is_some();
    let project = parsed.project.unwrap_or_default();

    let mut entry_points: BTreeMap<String, Vec<String>> = project
        .entry_points
        .into_iter()
        .map(|(group, entries)| (group, format_entries(entries)))
        .collect();
    if !project.scripts.is_empty() {
        entry_points.insert("console_scripts".to_string(), format_entries(project.scripts));
    }
    if !project.gui_scripts.is_empty() {
        entry_points.insert("gui_scripts".to_string(), format_entries(project.gui_scripts));
    }

    Ok(Some(PyProjectMetadata {
        has_project_table,
        metadata: BuildMetadata {
            name: project.name,
            version: project.version,
            python_requires: project.requires_python,
            install_requires: project.dependencies,
            setup_requires: parsed.build_system.unwrap_or_default().requires,
            entry_points,
            ..Default::default()
        },
    }))
}
