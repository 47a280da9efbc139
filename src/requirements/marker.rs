//! PEP 508 requirement and environment-marker parsing
//!
//! Requirements come from two places with slightly different spellings:
//! - PyPI `requires_dist`: `pathlib2 (>=2.2.0) ; python_version < "3.6"`
//! - setup.py `install_requires`: `pathlib2>=2.2.0;python_version<"3.6"`
//!
//! Markers are flattened into connector-tagged clauses instead of an
//! expression tree. Only a handful of marker variables are ever translated
//! into selectors, so grouping parentheses are dropped.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Failed to parse '{input}': {reason}")]
pub struct ParseError {
    pub input: String,
    pub reason: String,
}

impl ParseError {
    pub fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// One atomic marker comparison with the boolean connectors around it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkerClause {
    pub variable: String,
    pub operator: String,
    pub value: String,
    /// Connector joining this clause to the previous one ("and", "or" or "")
    pub preceding: String,
    /// Connector joining this clause to the next one ("and", "or" or "")
    pub following: String,
}

impl MarkerClause {
    /// Tuple view: (variable, operator, value, preceding, following)
    pub fn as_tuple(&self) -> (&str, &str, &str, &str, &str) {
        (
            &self.variable,
            &self.operator,
            &self.value,
            &self.preceding,
            &self.following,
        )
    }
}

/// A raw requirement split into name, version specifier and markers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequirementClause {
    pub name: String,
    /// Version specifier without parentheses, empty when unconstrained
    pub version: String,
    pub markers: Vec<MarkerClause>,
}

impl RequirementClause {
    /// Whether any marker restricts this requirement to an optional extra
    pub fn is_extra(&self) -> bool {
        self.markers.iter().any(|m| m.variable == "extra")
    }
}

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)\s*(?:\[[^\]]*\])?").unwrap()
});

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"^\s*(?:(?P<str>"[^"]*"|'[^']*')|(?P<op>===|==|!=|<=|>=|~=|<|>)|(?P<paren>[()])|(?P<word>[A-Za-z0-9_.*+-]+))"#,
    )
    .unwrap()
});

/// Split a requirement into its package name and version specifier.
///
/// Extras (`requests[security]`) are dropped from the name; parentheses
/// around the specifier are removed. Marker text must already be split off.
pub fn parse_requirement(raw: &str) -> Result<(String, String), ParseError> {
    let trimmed = raw.trim();
    let caps = NAME_RE
        .captures(trimmed)
        .ok_or_else(|| ParseError::new(raw, "missing package name"))?;
    let name = caps[1].to_string();
    let rest = trimmed[caps[0].len()..].trim();

    if rest.starts_with('@') {
        // Direct URL references carry no version range a recipe can use
        return Ok((name, String::new()));
    }

    let version = rest
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .unwrap_or(rest)
        .trim();

    if !version.is_empty() && !version.starts_with(['<', '>', '=', '!', '~']) {
        return Err(ParseError::new(
            raw,
            format!("unexpected text after package name: '{}'", version),
        ));
    }

    let version = version
        .split(',')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(",");

    Ok((name, version))
}

#[derive(Debug, PartialEq)]
enum Token {
    Literal(String),
    Word(String),
    Op(String),
}

fn tokenize(raw: &str) -> Result<Vec<Token>, ParseError> {
    let mut tokens = Vec::new();
    let mut rest = raw;

    while !rest.trim().is_empty() {
        let caps = TOKEN_RE
            .captures(rest)
            .ok_or_else(|| ParseError::new(raw, format!("unexpected input at '{}'", rest.trim())))?;

        if let Some(s) = caps.name("str") {
            let quoted = s.as_str();
            tokens.push(Token::Literal(quoted[1..quoted.len() - 1].to_string()));
        } else if let Some(op) = caps.name("op") {
            tokens.push(Token::Op(op.as_str().to_string()));
        } else if let Some(word) = caps.name("word") {
            tokens.push(Token::Word(word.as_str().to_string()));
        }
        // Parentheses only group clauses; the flattened form ignores them

        rest = &rest[caps[0].len()..];
    }

    Ok(tokens)
}

fn mirror_operator(op: &str) -> String {
    match op {
        "<" => ">",
        ">" => "<",
        "<=" => ">=",
        ">=" => "<=",
        other => other,
    }
    .to_string()
}

/// Parse a marker expression into connector-tagged clauses.
///
/// `python_version < "3.6" and sys_platform == "win32"` yields two clauses:
/// the first with following connector "and", the second with preceding "and".
pub fn parse_markers(raw: &str) -> Result<Vec<MarkerClause>, ParseError> {
    let mut tokens = tokenize(raw)?.into_iter().peekable();
    let mut clauses: Vec<MarkerClause> = Vec::new();
    let mut pending_connector = String::new();

    while let Some(left) = tokens.next() {
        let operator = match tokens.next() {
            Some(Token::Op(op)) => op,
            Some(Token::Word(w)) if w == "in" => w,
            Some(Token::Word(w)) if w == "not" => match tokens.next() {
                Some(Token::Word(w)) if w == "in" => "not in".to_string(),
                _ => return Err(ParseError::new(raw, "expected 'in' after 'not'")),
            },
            _ => return Err(ParseError::new(raw, "expected a comparison operator")),
        };
        let right = tokens
            .next()
            .ok_or_else(|| ParseError::new(raw, "comparison is missing its right-hand side"))?;

        let (variable, operator, value) = match (left, right) {
            (Token::Word(var), Token::Literal(value)) => (var, operator, value),
            (Token::Literal(value), Token::Word(var)) => (var, mirror_operator(&operator), value),
            // Unquoted literal values show up in hand-written setup.py markers
            (Token::Word(var), Token::Word(value)) => (var, operator, value),
            _ => return Err(ParseError::new(raw, "comparison needs a marker variable")),
        };

        let following = match tokens.peek() {
            Some(Token::Word(w)) if w == "and" || w == "or" => {
                let connector = w.clone();
                tokens.next();
                if tokens.peek().is_none() {
                    return Err(ParseError::new(raw, "dangling boolean connector"));
                }
                connector
            }
            None => String::new(),
            Some(_) => return Err(ParseError::new(raw, "expected 'and' or 'or' between clauses")),
        };

        clauses.push(MarkerClause {
            variable,
            operator,
            value,
            preceding: std::mem::replace(&mut pending_connector, following.clone()),
            following,
        });
    }

    if clauses.is_empty() {
        return Err(ParseError::new(raw, "empty marker expression"));
    }

    Ok(clauses)
}

/// Parse a full requirement string, including an optional `; marker` suffix.
pub fn parse_requirement_clause(raw: &str) -> Result<RequirementClause, ParseError> {
    let (requirement, markers) = match raw.split_once(';') {
        Some((req, marker)) => (req, Some(marker)),
        None => (raw, None),
    };

    let (name, version) = parse_requirement(requirement)?;
    let markers = match markers {
        Some(m) if !m.trim().is_empty() => parse_markers(m)?,
        _ => Vec::new(),
    };

    Ok(RequirementClause {
        name,
        version,
        markers,
    })
}

/// Normalize a Python package name for identity comparison
///
/// Names are case-insensitive and treat `-`, `_` and `.` as equivalent.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().replace(['_', '.'], "-")
}
