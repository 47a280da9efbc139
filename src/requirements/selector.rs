//! Translation of environment markers into conda-build selectors

use super::marker::MarkerClause;
use tracing::debug;

/// Map a platform literal onto the selector name conda-build understands
fn platform_token(value: &str) -> String {
    match value.to_lowercase().as_str() {
        "win32" | "cygwin" | "windows" | "nt" => "win".to_string(),
        "linux" | "linux2" => "linux".to_string(),
        "darwin" => "osx".to_string(),
        "posix" => "unix".to_string(),
        other => other.chars().filter(|c| c.is_ascii_alphanumeric()).collect(),
    }
}

/// "3.6" -> "36", "3.6.1" -> "36", "3.10" -> "310"
fn version_digits(value: &str) -> String {
    value
        .split('.')
        .take(2)
        .map(|part| part.trim_end_matches('*'))
        .collect::<Vec<_>>()
        .concat()
}

/// Translate a single marker comparison into a selector token.
///
/// An empty token means the clause does not restrict the build.
pub fn clause_to_selector(variable: &str, operator: &str, value: &str) -> String {
    match variable {
        "extra" => String::new(),
        "sys_platform" | "platform_system" | "os_name" => {
            let token = platform_token(value);
            match operator {
                "==" | "===" => token,
                "!=" => format!("not {}", token),
                _ => {
                    debug!("Ignoring {} {} {:?}", variable, operator, value);
                    String::new()
                }
            }
        }
        "python_version" | "python_full_version" => {
            let comparator = match operator {
                "~=" => ">=",
                "<" | "<=" | ">" | ">=" | "==" | "!=" => operator,
                _ => {
                    debug!("Ignoring {} {} {:?}", variable, operator, value);
                    return String::new();
                }
            };
            format!("py{}{}", comparator, version_digits(value))
        }
        _ => {
            debug!("No selector for marker variable '{}'", variable);
            String::new()
        }
    }
}

/// Combine the selector tokens of a marker expression, keeping connectors
/// between the clauses that produced a token.
pub fn markers_to_selector(markers: &[MarkerClause]) -> String {
    let mut selector = String::new();
    let mut connector = "";

    for clause in markers {
        let token = clause_to_selector(&clause.variable, &clause.operator, &clause.value);
        if !token.is_empty() {
            if !selector.is_empty() {
                selector.push(' ');
                selector.push_str(if connector.is_empty() { "and" } else { connector });
                selector.push(' ');
            }
            selector.push_str(&token);
        }
        // A dropped clause hands its trailing connector to the next token
        if !clause.following.is_empty() {
            connector = clause.following.as_str();
        }
    }

    selector
}
