//! `requires_python` translation
//!
//! A constraint such as `>=2.7, !=3.0.*, !=3.1.*` is evaluated at minor
//! version granularity against the interpreters a recipe can target:
//! Python 2.7 plus every 3.x minor from the configured floor to the newest
//! tracked release. Two views are produced:
//!
//! - a skip selector (`py2k`, `py<37`, `py>=38`, `py==36`, `py3k`) naming the
//!   interpreters the package must not be built for
//! - a limit expression (`>=3.6`, `<3.8`, `!=3.6`) suitable for pinning the
//!   `python` requirement, clamped to the floor

use super::marker::ParseError;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// A `major.minor` interpreter version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PyMinor {
    pub major: u32,
    pub minor: u32,
}

/// The only Python 2 release recipes still distinguish
pub const PY27: PyMinor = PyMinor::new(2, 7);

impl PyMinor {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Selector spelling without the dot: 3.6 -> "36", 3.10 -> "310"
    pub fn digits(&self) -> String {
        format!("{}{}", self.major, self.minor)
    }

    /// The following minor, or `None` past `u32::MAX`
    pub fn next(&self) -> Option<Self> {
        self.minor.checked_add(1).map(|minor| Self::new(self.major, minor))
    }
}

impl fmt::Display for PyMinor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for PyMinor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s
            .trim()
            .split_once('.')
            .ok_or_else(|| format!("Expected <major>.<minor>, got '{}'", s))?;
        let major = major
            .parse()
            .map_err(|_| format!("Invalid major version in '{}'", s))?;
        let minor = minor
            .parse()
            .map_err(|_| format!("Invalid minor version in '{}'", s))?;
        Ok(Self::new(major, minor))
    }
}

/// The interpreter range recipes are generated for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PythonSupport {
    /// Oldest supported minor; lower bounds below it are raised to it
    pub floor: PyMinor,
    /// Newest tracked minor
    pub newest: PyMinor,
}

impl Default for PythonSupport {
    fn default() -> Self {
        Self {
            floor: PyMinor::new(3, 6),
            newest: PyMinor::new(3, 14),
        }
    }
}

impl PythonSupport {
    pub fn new(floor: PyMinor, newest: PyMinor) -> Result<Self, String> {
        if floor.major != 3 || newest.major != 3 {
            return Err(format!(
                "Python floor ({}) and newest ({}) must both be 3.x releases",
                floor, newest
            ));
        }
        if newest < floor {
            return Err(format!(
                "Newest Python ({}) is older than the floor ({})",
                newest, floor
            ));
        }
        Ok(Self { floor, newest })
    }

    /// Every tracked 3.x minor from the floor to the newest, ascending
    pub fn py3_minors(&self) -> Vec<PyMinor> {
        (self.floor.minor..=self.newest.minor)
            .map(|minor| PyMinor::new(self.floor.major, minor))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparator {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    Compatible,
    Arbitrary,
}

const OPERATORS: [(&str, Comparator); 8] = [
    ("===", Comparator::Arbitrary),
    ("~=", Comparator::Compatible),
    ("==", Comparator::Eq),
    ("!=", Comparator::Ne),
    ("<=", Comparator::Le),
    (">=", Comparator::Ge),
    ("<", Comparator::Lt),
    (">", Comparator::Gt),
];

#[derive(Debug, Clone)]
struct VersionClause {
    op: Comparator,
    operator: &'static str,
    major: u32,
    minor: Option<u32>,
    patch: Option<u32>,
    wildcard: bool,
    version: String,
}

fn leading_number(segment: &str) -> Option<u32> {
    let digits: String = segment.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

impl VersionClause {
    fn parse(raw: &str, expr: &str) -> Result<Self, ParseError> {
        let (operator, op) = OPERATORS
            .iter()
            .find(|(text, _)| raw.starts_with(text))
            .copied()
            .ok_or_else(|| ParseError::new(expr, format!("'{}' has no comparison operator", raw)))?;
        let version = raw[operator.len()..].trim().to_string();

        let mut segments = version.split('.');
        let major = segments
            .next()
            .and_then(leading_number)
            .ok_or_else(|| ParseError::new(expr, format!("'{}' has no version number", raw)))?;

        let mut wildcard = false;
        let mut numbers = [None, None];
        for slot in numbers.iter_mut() {
            match segments.next() {
                Some("*") => {
                    wildcard = true;
                    break;
                }
                Some(segment) => {
                    *slot = Some(leading_number(segment).ok_or_else(|| {
                        ParseError::new(expr, format!("invalid version segment in '{}'", raw))
                    })?);
                }
                None => break,
            }
        }

        Ok(Self {
            op,
            operator,
            major,
            minor: numbers[0],
            patch: numbers[1],
            wildcard,
            version,
        })
    }

    fn key(&self) -> PyMinor {
        PyMinor::new(self.major, self.minor.unwrap_or(0))
    }

    fn has_patch(&self) -> bool {
        self.patch.is_some_and(|p| p > 0)
    }

    /// `key().next()`, failing on versions with no following minor
    fn next_key(&self, expr: &str) -> Result<PyMinor, ParseError> {
        self.key()
            .next()
            .ok_or_else(|| ParseError::new(expr, format!("version out of range in '{}'", self.version)))
    }

    /// Oldest minor a `>`, `>=` or `~=` clause admits
    fn lower_bound(&self, expr: &str) -> Result<Option<PyMinor>, ParseError> {
        match self.op {
            Comparator::Gt if !self.has_patch() => self.next_key(expr).map(Some),
            Comparator::Gt | Comparator::Ge | Comparator::Compatible => Ok(Some(self.key())),
            _ => Ok(None),
        }
    }

    /// Whether any release of the minor version `v` satisfies this clause
    fn admits(&self, v: PyMinor) -> bool {
        let key = self.key();
        match self.op {
            Comparator::Lt if self.has_patch() => v <= key,
            Comparator::Lt => v < key,
            Comparator::Le => v <= key,
            Comparator::Gt if self.has_patch() => v >= key,
            Comparator::Gt => v > key,
            Comparator::Ge => v >= key,
            Comparator::Eq | Comparator::Arbitrary if self.minor.is_none() => v.major == self.major,
            Comparator::Eq | Comparator::Arbitrary => v == key,
            Comparator::Ne if self.minor.is_none() && self.wildcard => v.major != self.major,
            // Excluding one patch release leaves the rest of the minor usable
            Comparator::Ne if self.has_patch() => true,
            Comparator::Ne => v != key,
            Comparator::Compatible if self.patch.is_some() => v == key,
            Comparator::Compatible => v >= key && v.major == self.major,
        }
    }
}

fn parse_constraint(expr: &str) -> Result<Vec<VersionClause>, ParseError> {
    expr.split(',')
        .map(str::trim)
        .filter(|clause| !clause.is_empty())
        .map(|clause| VersionClause::parse(clause, expr))
        .collect()
}

/// A conda-build selector expression such as `py2k` or `py<37`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Selector(String);

impl Selector {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The selector as a line comment: `# [py2k]`
    pub fn comment(&self) -> String {
        format!("# [{}]", self.0)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn bound_selector(
    py2: bool,
    py3: &[PyMinor],
    enabled: &[PyMinor],
    lower: Option<PyMinor>,
) -> Vec<String> {
    let (Some(first), Some(last)) = (enabled.first(), enabled.last()) else {
        return match (py2, lower) {
            (true, _) => vec!["py3k".to_string()],
            // Lower bound past every tracked minor
            (false, Some(lower)) if py3.last().is_some_and(|newest| lower > *newest) => {
                vec![format!("py<{}", lower.digits())]
            }
            // Nothing tracked is admitted
            (false, _) => vec!["py2k".to_string(), "py3k".to_string()],
        };
    };
    if enabled.len() == py3.len() {
        return if py2 { Vec::new() } else { vec!["py2k".to_string()] };
    }

    let mut parts = Vec::new();
    if Some(first) != py3.first() {
        parts.push(format!("py<{}", first.digits()));
    } else if !py2 {
        parts.push("py2k".to_string());
    }
    if Some(last) != py3.last()
        && let Some(next) = last.next()
    {
        parts.push(format!("py>={}", next.digits()));
    }
    parts
}

/// Compute the selector for interpreters a package cannot be built for.
///
/// Returns `None` when every tracked interpreter is admitted.
pub fn python_skip_selector(
    expr: &str,
    support: &PythonSupport,
) -> Result<Option<Selector>, ParseError> {
    let clauses = parse_constraint(expr)?;
    let (exclusions, bounds): (Vec<&VersionClause>, Vec<&VersionClause>) =
        clauses.iter().partition(|c| c.op == Comparator::Ne);
    let admitted = |v: PyMinor| bounds.iter().all(|c| c.admits(v));

    let py3 = support.py3_minors();
    let enabled: Vec<PyMinor> = py3.iter().copied().filter(|v| admitted(*v)).collect();
    let mut lower: Option<PyMinor> = None;
    for clause in &bounds {
        if let Some(bound) = clause.lower_bound(expr)? {
            lower = Some(lower.map_or(bound, |current| current.max(bound)));
        }
    }
    let mut parts = bound_selector(admitted(PY27), &py3, &enabled, lower);

    // Exclusions never widen the bound; they only knock out admitted minors
    let excluded: Vec<String> = enabled
        .iter()
        .filter(|v| exclusions.iter().any(|c| !c.admits(**v)))
        .map(|v| format!("py=={}", v.digits()))
        .collect();
    if !parts.is_empty() && !excluded.is_empty() {
        warn!(
            "Ambiguous requires_python '{}': combining {} with {}",
            expr,
            parts.join(" or "),
            excluded.join(" or ")
        );
    }
    parts.extend(excluded);

    Ok((!parts.is_empty()).then(|| Selector(parts.join(" or "))))
}

/// Canonical `python` pin for a constraint, clamped to the supported floor.
///
/// Returns `None` when the constraint imposes nothing on supported interpreters.
pub fn python_limit(expr: &str, support: &PythonSupport) -> Result<Option<String>, ParseError> {
    let clauses = parse_constraint(expr)?;
    let mut lower: Option<PyMinor> = None;
    let mut upper: Option<(PyMinor, Option<u32>)> = None;
    let mut others = Vec::new();

    for clause in &clauses {
        match clause.op {
            Comparator::Ge | Comparator::Gt => {
                // Packages still installable on 2.7 carry no lower limit
                if clause.admits(PY27) {
                    continue;
                }
                let Some(bound) = clause.lower_bound(expr)? else {
                    continue;
                };
                let bound = bound.max(support.floor);
                lower = Some(lower.map_or(bound, |current| current.max(bound)));
            }
            Comparator::Lt | Comparator::Le => {
                let bound = if clause.op == Comparator::Le {
                    (clause.next_key(expr)?, None)
                } else if clause.has_patch() {
                    (clause.key(), clause.patch)
                } else {
                    (clause.key(), None)
                };
                let tighter = match upper {
                    Some((minor, patch)) => {
                        (bound.0, bound.1.unwrap_or(0)) < (minor, patch.unwrap_or(0))
                    }
                    None => true,
                };
                if tighter {
                    upper = Some(bound);
                }
            }
            Comparator::Ne => {
                if clause.key() < support.floor {
                    continue;
                }
                let version = clause
                    .version
                    .strip_suffix(".*")
                    .unwrap_or(&clause.version);
                others.push(format!("!={}", version));
            }
            Comparator::Eq | Comparator::Compatible | Comparator::Arbitrary => {
                others.push(format!("{}{}", clause.operator, clause.version));
            }
        }
    }

    let mut parts = Vec::new();
    if let Some(lower) = lower {
        parts.push(format!(">={}", lower));
    }
    if let Some((minor, patch)) = upper {
        match patch {
            Some(patch) => parts.push(format!("<{}.{}", minor, patch)),
            None => parts.push(format!("<{}", minor)),
        }
    }
    parts.extend(others);

    Ok((!parts.is_empty()).then(|| parts.join(",")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: [(&str, &str, &str); 12] = [
        (">=3.5", "py2k", ">=3.6"),
        (">=3.6", "py2k", ">=3.6"),
        (">=3.7", "py<37", ">=3.7"),
        ("<=3.7", "py>=38", "<3.8"),
        ("<=3.7.1", "py>=38", "<3.8"),
        ("<3.7", "py>=37", "<3.7"),
        (
            ">2.7, !=3.0.*, !=3.1.*, !=3.2.*, !=3.3.*, !=3.4.*",
            "py2k",
            ">=3.6",
        ),
        (">=2.7, !=3.6.*", "py==36", "!=3.6"),
        (">3.7", "py<38", ">=3.8"),
        (">2.7", "py2k", ">=3.6"),
        ("<3", "py3k", "<3.0"),
        ("!=3.7", "py==37", "!=3.7"),
    ];

    #[test]
    fn test_skip_selector_table() {
        let support = PythonSupport::default();
        for (expr, selector, _) in TABLE {
            let result = python_skip_selector(expr, &support).unwrap().unwrap();
            assert_eq!(result.comment(), format!("# [{}]", selector), "{}", expr);
        }
    }

    #[test]
    fn test_limit_table() {
        let support = PythonSupport::default();
        for (expr, _, limit) in TABLE {
            assert_eq!(
                python_limit(expr, &support).unwrap().as_deref(),
                Some(limit),
                "{}",
                expr
            );
        }
    }

    #[test]
    fn test_unconstrained() {
        let support = PythonSupport::default();
        assert_eq!(python_skip_selector("", &support).unwrap(), None);
        assert_eq!(python_limit("", &support).unwrap(), None);
        assert_eq!(python_skip_selector(">=2.7", &support).unwrap(), None);
        assert_eq!(python_limit(">=2.7", &support).unwrap(), None);
    }

    #[test]
    fn test_two_sided_range() {
        let support = PythonSupport::default();
        let selector = python_skip_selector(">=3.7,<3.10", &support).unwrap().unwrap();
        assert_eq!(selector.as_str(), "py<37 or py>=310");
        assert_eq!(
            python_limit(">=3.7,<3.10", &support).unwrap().as_deref(),
            Some(">=3.7,<3.10")
        );

        let selector = python_skip_selector(">=3.6,<3.8", &support).unwrap().unwrap();
        assert_eq!(selector.as_str(), "py2k or py>=38");
    }

    #[test]
    fn test_floor_is_configurable() {
        let support = PythonSupport::new(PyMinor::new(3, 8), PyMinor::new(3, 12)).unwrap();
        assert_eq!(
            python_limit(">=3.5", &support).unwrap().as_deref(),
            Some(">=3.8")
        );
        let selector = python_skip_selector(">=3.8", &support).unwrap().unwrap();
        assert_eq!(selector.as_str(), "py2k");
        // 3.6 is below the floor, so excluding it changes nothing
        let selector = python_skip_selector(">=3.0, !=3.6.*", &support).unwrap().unwrap();
        assert_eq!(selector.as_str(), "py2k");
    }

    #[test]
    fn test_tightest_bounds_win() {
        let support = PythonSupport::default();
        assert_eq!(
            python_limit(">=3.5, >=3.8, <4, <3.11", &support).unwrap().as_deref(),
            Some(">=3.8,<3.11")
        );
        assert_eq!(
            python_limit("<3.9.2", &support).unwrap().as_deref(),
            Some("<3.9.2")
        );
    }

    #[test]
    fn test_compatible_release() {
        let support = PythonSupport::default();
        let selector = python_skip_selector("~=3.7", &support).unwrap().unwrap();
        assert_eq!(selector.as_str(), "py<37");
        assert_eq!(
            python_limit("~=3.7", &support).unwrap().as_deref(),
            Some("~=3.7")
        );
    }

    #[test]
    fn test_lower_bound_past_newest() {
        let support = PythonSupport::new(PyMinor::new(3, 6), PyMinor::new(3, 13)).unwrap();
        for (expr, selector, limit) in [
            (">=3.14", "py<314", ">=3.14"),
            (">3.14", "py<315", ">=3.15"),
            ("~=3.14", "py<314", "~=3.14"),
        ] {
            let result = python_skip_selector(expr, &support).unwrap().unwrap();
            assert_eq!(result.as_str(), selector, "{}", expr);
            assert_eq!(python_limit(expr, &support).unwrap().as_deref(), Some(limit));
        }

        assert_eq!(PythonSupport::default().newest, PyMinor::new(3, 14));
        let result = python_skip_selector(">=3.15", &PythonSupport::default()).unwrap();
        assert_eq!(result.as_ref().map(Selector::as_str), Some("py<315"));
    }

    #[test]
    fn test_python2_only() {
        let support = PythonSupport::default();
        for expr in ["<3", "==2.7"] {
            let result = python_skip_selector(expr, &support).unwrap().unwrap();
            assert_eq!(result.as_str(), "py3k", "{}", expr);
        }
        let result = python_skip_selector(">=3.7,<3.7", &support).unwrap().unwrap();
        assert_eq!(result.as_str(), "py2k or py3k");
    }

    #[test]
    fn test_version_overflow_is_an_error() {
        let support = PythonSupport::default();
        for expr in ["<=3.4294967295", ">3.4294967295"] {
            assert!(python_limit(expr, &support).is_err(), "{}", expr);
        }
        assert!(python_skip_selector(">3.4294967295", &support).is_err());
        assert_eq!(PyMinor::new(3, u32::MAX).next(), None);
    }

    #[test]
    fn test_invalid_constraint() {
        let support = PythonSupport::default();
        assert!(python_skip_selector("3.6", &support).is_err());
        assert!(python_limit(">=three", &support).is_err());
    }

    #[test]
    fn test_python_support_validation() {
        assert!(PythonSupport::new(PyMinor::new(3, 9), PyMinor::new(3, 6)).is_err());
        assert!(PythonSupport::new(PyMinor::new(2, 7), PyMinor::new(3, 6)).is_err());
        assert_eq!("3.10".parse::<PyMinor>().unwrap(), PyMinor::new(3, 10));
        assert!("3".parse::<PyMinor>().is_err());
    }
}
