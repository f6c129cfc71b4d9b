//! Python interpreter lookup and venv creation

use crate::error::{VenvError, VenvResult};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// An installed Python interpreter and its `major.minor` version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PythonInterpreter {
    program: String,
    version: String,
}

impl PythonInterpreter {
    /// Resolve `program` by running `<program> --version`
    pub async fn resolve(program: &str) -> VenvResult<Self> {
        debug!("Executing: {} --version", program);

        let output = Command::new(program)
            .arg("--version")
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| VenvError::InterpreterNotFound {
                program: program.to_string(),
                source: e,
            })?;

        // Python 2 and very old 3.x print the version on stderr
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let version = parse_version(&stdout)
            .or_else(|| parse_version(&stderr))
            .ok_or_else(|| VenvError::InterpreterVersion {
                program: program.to_string(),
                output: format!("{}{}", stdout.trim(), stderr.trim()),
            })?;

        info!("Resolved {} as Python {}", program, version);
        Ok(Self {
            program: program.to_string(),
            version,
        })
    }

    /// Use `program` with a version supplied by the caller, without probing it
    pub fn with_version(program: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            version: version.into(),
        }
    }

    /// Interpreter program name or path
    pub fn program(&self) -> &str {
        &self.program
    }

    /// `major.minor` version
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Run `<program> -m venv --upgrade <path>`
    ///
    /// `--upgrade` lets a rerun over an existing or partial directory
    /// converge instead of failing.
    pub async fn create_venv(&self, path: &Path) -> VenvResult<()> {
        debug!("Executing: {} -m venv --upgrade {}", self.program, path.display());

        let output = Command::new(&self.program)
            .args(["-m", "venv", "--upgrade"])
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| VenvError::InterpreterNotFound {
                program: self.program.clone(),
                source: e,
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(VenvError::VenvCreate {
                path: path.to_path_buf(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

/// Extract `major.minor` from `Python 3.10.12`-style output
pub fn parse_version(output: &str) -> Option<String> {
    let rest = output.trim().strip_prefix("Python ")?;
    let full = rest.split_whitespace().next()?;
    let mut parts = full.split('.');
    let major = parts.next().filter(|p| p.chars().all(|c| c.is_ascii_digit()))?;
    let minor: String = parts
        .next()?
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if major.is_empty() || minor.is_empty() {
        return None;
    }
    Some(format!("{}.{}", major, minor))
}
