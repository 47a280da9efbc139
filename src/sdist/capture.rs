//! Validation of captured `setup()` keyword arguments
//!
//! Build scripts pass whatever types they like: requirement lists as a
//! newline-separated string, entry points as an INI blob, versions as
//! numbers. Each accepted shape is converted here; anything else is a
//! build-script error.

use super::ExtractError;
use crate::metadata::BuildMetadata;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

fn malformed(key: &str, expected: &str) -> ExtractError {
    ExtractError::BuildScript(format!("'{}' is not {}", key, expected))
}

fn optional_string(object: &Map<String, Value>, key: &str) -> Result<Option<String>, ExtractError> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string()).filter(|s| !s.is_empty())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(malformed(key, "a string")),
    }
}

fn lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn string_list(key: &str, value: Option<&Value>) -> Result<Vec<String>, ExtractError> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(s)) => Ok(lines(s)),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.trim().to_string()),
                _ => Err(malformed(key, "a list of strings")),
            })
            .collect(),
        Some(_) => Err(malformed(key, "a list of strings")),
    }
}

/// Parse setuptools' INI spelling of entry points:
///
/// ```text
/// [console_scripts]
/// tool = pkg.cli:main
/// ```
fn parse_entry_points_ini(text: &str) -> Result<BTreeMap<String, Vec<String>>, ExtractError> {
    let mut entry_points: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut section: Option<String> = None;

    for line in lines(text) {
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let name = name.trim().to_string();
            entry_points.entry(name.clone()).or_default();
            section = Some(name);
        } else if let Some(name) = &section {
            entry_points.entry(name.clone()).or_default().push(line);
        } else {
            return Err(malformed("entry_points", "grouped under a [section]"));
        }
    }

    Ok(entry_points)
}

fn entry_points(value: Option<&Value>) -> Result<BTreeMap<String, Vec<String>>, ExtractError> {
    match value {
        None | Some(Value::Null) => Ok(BTreeMap::new()),
        Some(Value::String(s)) => parse_entry_points_ini(s),
        Some(Value::Object(groups)) => groups
            .iter()
            .map(|(group, entries)| {
                string_list("entry_points", Some(entries)).map(|entries| (group.clone(), entries))
            })
            .collect(),
        Some(_) => Err(malformed("entry_points", "a mapping or INI text")),
    }
}

fn compiler_for_source(source: &str) -> Option<&'static str> {
    let extension = source.rsplit_once('.')?.1.to_lowercase();
    match extension.as_str() {
        "c" | "pyx" => Some("c"),
        "cpp" | "cxx" | "cc" | "c++" => Some("cxx"),
        "f" | "f90" | "f95" | "for" => Some("fortran"),
        _ => None,
    }
}

fn compilers(value: Option<&Value>) -> Result<BTreeSet<String>, ExtractError> {
    let extensions = match value {
        None | Some(Value::Null) => return Ok(BTreeSet::new()),
        Some(Value::Array(extensions)) => extensions,
        Some(_) => return Err(malformed("ext_modules", "a list of extensions")),
    };

    let mut compilers = BTreeSet::new();
    for extension in extensions {
        let extension = extension
            .as_object()
            .ok_or_else(|| malformed("ext_modules", "a list of extensions"))?;

        let mut found = BTreeSet::new();
        if let Some(language) = extension.get("language").and_then(Value::as_str)
            && matches!(language.to_lowercase().as_str(), "c++" | "cxx" | "cpp")
        {
            found.insert("cxx");
        }
        for source in string_list("ext_modules", extension.get("sources"))? {
            found.extend(compiler_for_source(&source));
        }
        if found.is_empty() {
            found.insert("c");
        }
        compilers.extend(found.into_iter().map(str::to_string));
    }

    Ok(compilers)
}

/// Convert the harness's captured mapping into build metadata
pub fn build_metadata_from_capture(value: &Value) -> Result<BuildMetadata, ExtractError> {
    let object = value
        .as_object()
        .ok_or_else(|| ExtractError::BuildScript("captured metadata is not a mapping".into()))?;

    Ok(BuildMetadata {
        name: optional_string(object, "name")?,
        version: optional_string(object, "version")?,
        python_requires: optional_string(object, "python_requires")?,
        install_requires: string_list("install_requires", object.get("install_requires"))?,
        setup_requires: string_list("setup_requires", object.get("setup_requires"))?,
        entry_points: entry_points(object.get("entry_points"))?,
        compilers: compilers(object.get("ext_modules"))?,
        packages: string_list("packages", object.get("packages"))?,
    })
}
