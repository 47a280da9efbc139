//! Requirement normalization
//!
//! Turns raw PEP 508 requirement strings from the registry and the build
//! script into the `build`/`host`/`run` sections of a conda recipe:
//! - `py (>=1.5.0)` becomes `py >=1.5.0`
//! - `pathlib2 (>=2.2.0) ; python_version < "3.6"` becomes
//!   `pathlib2 >=2.2.0  # [py<36]`
//! - requirements guarded by an `extra` marker are left out

pub mod marker;
pub mod python_version;
pub mod selector;

use crate::metadata::{BuildMetadata, MergedMetadata};
use marker::{normalize_name, parse_requirement, parse_requirement_clause};
use regex::Regex;
use selector::markers_to_selector;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;
use tracing::{debug, warn};

const PYTHON: &str = "python";
const PIP: &str = "pip";

/// Build dependencies that imply a native compiler
const COMPILER_HINTS: [(&str, &str); 6] = [
    ("cython", "c"),
    ("cffi", "c"),
    ("pybind11", "cxx"),
    ("cppy", "cxx"),
    ("setuptools-rust", "rust"),
    ("maturin", "rust"),
];

static SPEC_START_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^\s<>=!~;]+)([<>=!~].*)$").unwrap());

/// Final requirement sections handed to the recipe writer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizedRequirementSet {
    pub build: Vec<String>,
    pub host: Vec<String>,
    pub run: Vec<String>,
}

/// Package name of a normalized requirement line (`numpy >=1.16  # [win]`)
fn entry_name(entry: &str) -> &str {
    entry
        .split(|c: char| c.is_whitespace() || "<>=!~".contains(c))
        .next()
        .unwrap_or(entry)
}

/// Selector comment of a normalized requirement line, including the `#`
fn entry_selector(entry: &str) -> Option<&str> {
    entry.find("  # [").map(|idx| &entry[idx + 2..])
}

/// Appends requirement lines, dropping later lines for a package already present
#[derive(Default)]
struct RequirementList {
    entries: Vec<String>,
    seen: HashSet<String>,
}

impl RequirementList {
    fn with(names: &[&str]) -> Self {
        let mut list = Self::default();
        for name in names {
            list.push(name.to_string());
        }
        list
    }

    fn push(&mut self, entry: String) {
        let key = normalize_name(entry_name(&entry));
        if self.seen.insert(key) {
            self.entries.push(entry);
        } else {
            debug!("Dropping duplicate requirement '{}'", entry);
        }
    }

    /// Parse a raw requirement and append its recipe line
    fn push_raw(&mut self, raw: &str) {
        let clause = match parse_requirement_clause(raw) {
            Ok(clause) => clause,
            Err(e) => {
                warn!("Skipping requirement: {}", e);
                return;
            }
        };

        if clause.is_extra() {
            debug!("Skipping optional requirement '{}'", raw.trim());
            return;
        }
        if normalize_name(&clause.name) == PYTHON {
            return;
        }

        let mut entry = if clause.version.is_empty() {
            clause.name
        } else {
            format!("{} {}", clause.name, clause.version)
        };
        let selector = markers_to_selector(&clause.markers);
        if !selector.is_empty() {
            entry = format!("{}  # [{}]", entry, selector);
        }
        self.push(entry);
    }
}

/// Build `host` and `run` from the registry's declared requirements.
///
/// `host` always carries `python` and `pip`; `run` always starts with `python`.
pub fn extract_requirements(requires: &[String]) -> NormalizedRequirementSet {
    let mut run = RequirementList::with(&[PYTHON]);
    for raw in requires {
        run.push_raw(raw);
    }

    NormalizedRequirementSet {
        build: Vec::new(),
        host: vec![PYTHON.to_string(), PIP.to_string()],
        run: run.entries,
    }
}

/// Combine both requirement sources of a merged record into recipe sections.
///
/// Registry requirements come first; build-script requirements only add
/// packages the registry did not already declare.
pub fn normalize(merged: &MergedMetadata) -> NormalizedRequirementSet {
    let mut run = RequirementList::with(&[PYTHON]);
    for raw in merged.release_requires.iter().chain(&merged.build_requires) {
        run.push_raw(raw);
    }

    let mut host = RequirementList::with(&[PYTHON, PIP]);
    for raw in &merged.setup_requires {
        host.push_raw(raw);
    }

    let build = merged
        .compilers
        .iter()
        .map(|compiler| format!("{{{{ compiler('{}') }}}}", compiler))
        .collect();

    let mut requirements = NormalizedRequirementSet {
        build,
        host: host.entries,
        run: run.entries,
    };
    if !merged.compilers.is_empty() {
        update_requirements_with_pin(&mut requirements);
    }
    requirements
}

/// Infer native compilers from build dependency names, merged with hints
/// already recorded.
pub fn get_compilers<S: AsRef<str>>(
    build_dependencies: &[S],
    existing: &BTreeSet<String>,
) -> BTreeSet<String> {
    let mut compilers = existing.clone();
    for dependency in build_dependencies {
        let raw = dependency.as_ref();
        let name = match parse_requirement(raw.split(';').next().unwrap_or(raw)) {
            Ok((name, _)) => normalize_name(&name),
            Err(_) => normalize_name(raw),
        };
        for (hint, compiler) in COMPILER_HINTS {
            if name == hint {
                compilers.insert(compiler.to_string());
            }
        }
    }
    compilers
}

/// Flatten every entry-point category into one list
pub fn get_entry_points(build: &BuildMetadata) -> Vec<String> {
    build.entry_points.values().flatten().cloned().collect()
}

/// Replace `run` entries that are also built against in `host` with a
/// compatible pin, so the runtime version follows the build-time one.
pub fn update_requirements_with_pin(requirements: &mut NormalizedRequirementSet) {
    let host_names: HashSet<String> = requirements
        .host
        .iter()
        .map(|entry| normalize_name(entry_name(entry)))
        .filter(|name| name != PYTHON && name != PIP)
        .collect();

    for entry in requirements.run.iter_mut() {
        let name = entry_name(entry).to_string();
        if !host_names.contains(&normalize_name(&name)) {
            continue;
        }
        let pin = format!("{{{{ pin_compatible('{}') }}}}", name);
        *entry = match entry_selector(entry) {
            Some(selector) => format!("{}  {}", pin, selector),
            None => pin,
        };
    }
}

/// Put a space between a package name and an attached version specifier.
pub fn format_dependencies<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    raw.iter()
        .map(|dep| {
            let dep = dep.as_ref().trim();
            match SPEC_START_RE.captures(dep) {
                Some(caps) => format!("{} {}", &caps[1], &caps[2]),
                None => dep.to_string(),
            }
        })
        .collect()
}
