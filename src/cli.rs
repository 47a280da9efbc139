use clap::{Parser, Subcommand};
use std::fmt;
use std::str::FromStr;

/// Resolve Python package build metadata for conda recipes
#[derive(Parser, Debug)]
#[command(name = "metaforge")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Output results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Log progress to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve a package's dependencies, selectors and compilers
    Resolve {
        /// Package specification: <package>[==<version>|@<version>]
        spec: PackageSpec,

        /// Use registry metadata only; do not download the sdist
        #[arg(long)]
        no_sdist: bool,

        /// PyPI JSON API root (overrides config)
        #[arg(long)]
        index_url: Option<String>,
    },
    /// Translate a requires_python constraint into a skip selector and limit
    PythonRange {
        /// Constraint, e.g. ">=3.6,<3.10"
        expr: String,
    },
    /// Parse a requirement string and show its selector
    Requirement {
        /// Requirement, e.g. 'pathlib2 (>=2.2.0) ; python_version < "3.6"'
        raw: String,
    },
}

/// A package specification: package[==version] or package[@version]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub package: String,
    pub version: Option<String>,
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(v) => write!(f, "{}=={}", self.package, v),
            None => write!(f, "{}", self.package),
        }
    }
}

impl FromStr for PackageSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (package, version) = match s.split_once("==").or_else(|| s.split_once('@')) {
            Some((pkg, ver)) => (pkg.trim(), Some(ver.trim())),
            None => (s, None),
        };

        if package.is_empty() {
            return Err("Package name cannot be empty".to_string());
        }
        if !package
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_.".contains(c))
        {
            return Err(format!(
                "Invalid package name '{}'. Expected: <package>[==<version>]",
                package
            ));
        }

        let version = match version {
            Some("") => return Err("Version cannot be empty".to_string()),
            Some(v) => Some(v.to_string()),
            None => None,
        };

        Ok(PackageSpec {
            package: package.to_string(),
            version,
        })
    }
}
