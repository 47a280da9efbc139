//! Output formatting for JSON and text modes
//!
//! Provides types for structured output that can be serialized to JSON
//! for machine-readable output, or displayed as text for human consumption.

use crate::requirements::marker::{MarkerClause, RequirementClause};
use crate::requirements::python_version::Selector;
use crate::resolve::ResolvedPackage;
use serde::Serialize;
use std::fmt::Write;

/// Result of a python-range translation
#[derive(Debug, Serialize)]
pub struct PythonRangeResult {
    pub expr: String,
    pub skip: Option<Selector>,
    pub limit: Option<String>,
}

/// Result of parsing one requirement string
#[derive(Debug, Serialize)]
pub struct RequirementResult {
    pub name: String,
    pub version: String,
    pub markers: Vec<MarkerClause>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub selector: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub extra: bool,
}

impl RequirementResult {
    pub fn new(clause: RequirementClause, selector: String) -> Self {
        Self {
            extra: clause.is_extra(),
            name: clause.name,
            version: clause.version,
            markers: clause.markers,
            selector,
        }
    }
}

/// Print a value as pretty JSON to stdout
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing JSON: {}", e);
            std::process::exit(1);
        }
    }
}

fn section(out: &mut String, title: &str, entries: &[String]) {
    if entries.is_empty() {
        return;
    }
    let _ = writeln!(out, "  {}:", title);
    for entry in entries {
        let _ = writeln!(out, "    - {}", entry);
    }
}

/// Recipe-shaped text view of a resolved package
pub fn render_resolved(resolved: &ResolvedPackage) -> String {
    let metadata = &resolved.metadata;
    let mut out = String::new();

    let _ = writeln!(out, "package: {} {}", metadata.name, metadata.version);
    if !metadata.sdist_url.is_empty() {
        let _ = writeln!(out, "source: {}", metadata.sdist_url);
        let _ = writeln!(out, "sha256: {}", metadata.sha256);
    }

    let _ = writeln!(out, "build:");
    if let Some(noarch) = &resolved.noarch {
        let _ = writeln!(out, "  noarch: {}", noarch);
    }
    if let Some(skip) = &resolved.skip {
        let _ = writeln!(out, "  skip: true  {}", skip.comment());
    }
    section(&mut out, "entry_points", &resolved.entry_points);

    let requirements = &resolved.requirements;
    let _ = writeln!(out, "requirements:");
    section(&mut out, "build", &requirements.build);
    section(&mut out, "host", &requirements.host);
    section(&mut out, "run", &requirements.run);

    if let Some(limit) = &resolved.python_limit {
        let _ = writeln!(out, "python: {}", limit);
    }
    if let Some(summary) = &metadata.summary {
        let _ = writeln!(out, "summary: {}", summary);
    }
    if let Some(license) = &metadata.license {
        let _ = writeln!(out, "license: {}", license);
    }
    if let Some(home) = &metadata.home {
        let _ = writeln!(out, "home: {}", home);
    }

    out
}

pub fn render_python_range(result: &PythonRangeResult) -> String {
    let skip = result
        .skip
        .as_ref()
        .map(Selector::comment)
        .unwrap_or_else(|| "none".to_string());
    let limit = result.limit.as_deref().unwrap_or("none");
    format!("skip: {}\nlimit: {}\n", skip, limit)
}

pub fn render_requirement(result: &RequirementResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "name: {}", result.name);
    if !result.version.is_empty() {
        let _ = writeln!(out, "version: {}", result.version);
    }
    for marker in &result.markers {
        let _ = writeln!(
            out,
            "marker: {} {} {}",
            marker.variable, marker.operator, marker.value
        );
    }
    if result.extra {
        let _ = writeln!(out, "extra: true");
    }
    if !result.selector.is_empty() {
        let _ = writeln!(out, "selector: # [{}]", result.selector);
    }
    out
}
