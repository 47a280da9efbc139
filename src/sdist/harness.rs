//! Sandboxed execution of `setup.py`
//!
//! The build script runs under a Python interpreter with `setup()` replaced
//! by a recorder. The recorder writes the keyword arguments it saw as JSON.
//! Scratch files live in a temporary directory removed on every exit path.

use super::ExtractError;
use serde_json::Value;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

const CAPTURE_SCRIPT: &str = include_str!("capture_setup.py");

/// Exit code the recorder uses when `setup()` was never reached
const SETUP_NOT_CALLED: i32 = 3;

/// Runs a build script and returns the arguments it passed to `setup()`
pub trait CaptureHarness {
    fn capture(&self, project_root: &Path) -> Result<Value, ExtractError>;
}

/// Capture harness backed by a local Python interpreter
#[derive(Debug, Clone)]
pub struct PythonHarness {
    interpreter: PathBuf,
    timeout: Duration,
}

impl PythonHarness {
    pub fn new(interpreter: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout,
        }
    }

    fn tail(path: &Path) -> String {
        let text = fs::read_to_string(path).unwrap_or_default();
        let lines: Vec<&str> = text.lines().collect();
        lines[lines.len().saturating_sub(5)..].join("\n")
    }
}

impl CaptureHarness for PythonHarness {
    fn capture(&self, project_root: &Path) -> Result<Value, ExtractError> {
        let sandbox = TempDir::new().map_err(ExtractError::io(&std::env::temp_dir()))?;
        let script = sandbox.path().join("capture_setup.py");
        let output = sandbox.path().join("capture.json");
        let stdout_log = sandbox.path().join("stdout.log");
        let stderr_log = sandbox.path().join("stderr.log");
        let home = sandbox.path().join("home");

        fs::write(&script, CAPTURE_SCRIPT).map_err(ExtractError::io(&script))?;
        fs::create_dir_all(&home).map_err(ExtractError::io(&home))?;
        let stdout = File::create(&stdout_log).map_err(ExtractError::io(&stdout_log))?;
        let stderr = File::create(&stderr_log).map_err(ExtractError::io(&stderr_log))?;

        info!("Running build script in {}", project_root.display());
        debug!("Using interpreter {}", self.interpreter.display());

        // Output goes to files, not pipes, so a chatty script cannot block
        let mut child = Command::new(&self.interpreter)
            .arg(&script)
            .current_dir(project_root)
            .env("METAFORGE_CAPTURE_OUT", &output)
            .env("HOME", &home)
            .env("TMPDIR", sandbox.path())
            .env("PYTHONUSERBASE", &home)
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(|e| {
                ExtractError::BuildScript(format!(
                    "Failed to start {}: {}",
                    self.interpreter.display(),
                    e
                ))
            })?;

        let status = match child
            .wait_timeout(self.timeout)
            .map_err(ExtractError::io(project_root))?
        {
            Some(status) => status,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExtractError::BuildScript(format!(
                    "setup.py timed out after {} seconds",
                    self.timeout.as_secs()
                )));
            }
        };

        for line in fs::read_to_string(&stderr_log).unwrap_or_default().lines() {
            debug!("[setup.py] {}", line);
        }

        match status.code() {
            Some(0) => {}
            Some(SETUP_NOT_CALLED) => {
                return Err(ExtractError::BuildScript(
                    "setup.py never called setup()".to_string(),
                ));
            }
            code => {
                warn!("setup.py exited with {:?}", code);
                return Err(ExtractError::BuildScript(format!(
                    "setup.py exited with code {}: {}",
                    code.unwrap_or(-1),
                    Self::tail(&stderr_log)
                )));
            }
        }

        let captured = fs::read_to_string(&output).map_err(ExtractError::io(&output))?;
        serde_json::from_str(&captured)
            .map_err(|e| ExtractError::BuildScript(format!("Unreadable capture output: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn python() -> Option<PythonHarness> {
        let available = Command::new("python3")
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        available.then(|| PythonHarness::new("python3", Duration::from_secs(30)))
    }

    fn project(setup_py: &str) -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("setup.py"), setup_py).unwrap();
        dir
    }

    #[test]
    fn test_capture_setup_kwargs() {
        let Some(harness) = python() else { return };
        let dir = project(
            r#"
from setuptools import setup, Extension
print("noise on stdout")
setup(
    name="gsw",
    version="3.3.1",
    install_requires=["numpy"],
    setup_requires=("numpy",),
    ext_modules=[Extension("gsw._gsw_ufuncs", sources=["src/method_bodies.c"])],
    entry_points={"console_scripts": ["gsw-cli = gsw.cli:main"]},
)
"#,
        );

        let captured = harness.capture(dir.path()).unwrap();
        assert_eq!(captured["name"], "gsw");
        assert_eq!(captured["setup_requires"], serde_json::json!(["numpy"]));
        assert_eq!(captured["ext_modules"][0]["sources"][0], "src/method_bodies.c");
        assert_eq!(
            captured["entry_points"]["console_scripts"][0],
            "gsw-cli = gsw.cli:main"
        );
    }

    #[test]
    fn test_capture_without_setup_call() {
        let Some(harness) = python() else { return };
        let dir = project("x = 1\n");
        let err = harness.capture(dir.path()).unwrap_err();
        assert!(err.to_string().contains("never called setup()"));
    }

    #[test]
    fn test_capture_script_error() {
        let Some(harness) = python() else { return };
        let dir = project("raise RuntimeError('boom')\n");
        let err = harness.capture(dir.path()).unwrap_err();
        assert!(matches!(err, ExtractError::BuildScript(_)));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_capture_timeout() {
        let Some(_) = python() else { return };
        let harness = PythonHarness::new("python3", Duration::from_secs(1));
        let dir = project("import time\ntime.sleep(30)\n");
        let err = harness.capture(dir.path()).unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_missing_interpreter() {
        let harness = PythonHarness::new("/nonexistent/python", Duration::from_secs(1));
        let dir = project("");
        let err = harness.capture(dir.path()).unwrap_err();
        assert!(err.is_fallback_eligible());
    }
}
