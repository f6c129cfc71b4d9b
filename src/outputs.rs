//! Step outputs for the calling pipeline
//!
//! In GitHub format, outputs go to the file named by `GITHUB_OUTPUT` and the
//! environment's bin directory to the file named by `GITHUB_PATH`. Without
//! those variables the same lines are printed to stdout.

use crate::error::{VenvError, VenvResult};
use crate::provision::ProvisionOutcome;
use clap::ValueEnum;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

/// How provisioning results are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// GitHub Actions file commands
    Github,
    /// Single JSON object on stdout
    Json,
    /// `key=value` lines on stdout
    Plain,
}

/// Destination files for GitHub Actions file commands
#[derive(Debug, Clone, Default)]
pub struct GithubFiles {
    /// Step output file (`GITHUB_OUTPUT`)
    pub output: Option<PathBuf>,
    /// PATH additions file (`GITHUB_PATH`)
    pub path: Option<PathBuf>,
}

impl GithubFiles {
    /// Read destinations from the process environment
    pub fn from_env() -> Self {
        Self {
            output: std::env::var_os("GITHUB_OUTPUT").map(PathBuf::from),
            path: std::env::var_os("GITHUB_PATH").map(PathBuf::from),
        }
    }
}

/// Serializable view of a provisioning outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutputs {
    /// True when the environment was restored from the cache
    pub cache_hit: bool,
    /// Composite key the environment is stored under
    pub cache_key: String,
    /// Absolute path of the environment's Python interpreter
    pub python_executable: String,
    /// Directory to prepend to `PATH` (`bin`, or `Scripts` on Windows)
    pub bin_dir: String,
}

impl From<&ProvisionOutcome> for StepOutputs {
    fn from(outcome: &ProvisionOutcome) -> Self {
        Self {
            cache_hit: outcome.cache_hit,
            cache_key: outcome.cache_key.to_string(),
            python_executable: outcome.environment.executable.display().to_string(),
            bin_dir: outcome.environment.bin_dir.display().to_string(),
        }
    }
}

impl StepOutputs {
    /// Output lines in `name=value` form, using the action's output names
    ///
    /// A value spanning lines is written as a `name<<DELIMITER` block so it
    /// cannot be read back as extra outputs.
    pub fn lines(&self) -> Vec<String> {
        vec![
            output_line("cache-hit", &self.cache_hit.to_string()),
            output_line("cache-key", &self.cache_key),
            output_line("python-executable", &self.python_executable),
        ]
    }

    /// Render for stdout in the given format
    pub fn render(&self, format: OutputFormat) -> VenvResult<String> {
        match format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(self)?),
            OutputFormat::Github | OutputFormat::Plain => Ok(self.lines().join("\n")),
        }
    }

    /// Emit outputs, writing GitHub file commands where configured
    pub async fn emit(&self, format: OutputFormat, files: &GithubFiles) -> VenvResult<()> {
        if format != OutputFormat::Github {
            println!("{}", self.render(format)?);
            return Ok(());
        }

        if has_line_break(&self.bin_dir) {
            return Err(VenvError::OutputValue {
                name: "bin-dir",
                file: "GITHUB_PATH",
                reason: "value contains a line break".to_string(),
            });
        }

        match &files.output {
            Some(path) => append_lines(path, &self.lines()).await?,
            None => println!("{}", self.lines().join("\n")),
        }
        match &files.path {
            Some(path) => append_lines(path, &[self.bin_dir.clone()]).await?,
            None => println!("path={}", self.bin_dir),
        }
        Ok(())
    }
}

fn has_line_break(value: &str) -> bool {
    value.contains(|c: char| c == '\n' || c == '\r')
}

fn output_line(name: &str, value: &str) -> String {
    if !has_line_break(value) {
        return format!("{name}={value}");
    }
    let delimiter = format!("ghadelimiter_{}", Uuid::new_v4());
    format!("{name}<<{delimiter}\n{value}\n{delimiter}")
}

async fn append_lines(path: &Path, lines: &[String]) -> VenvResult<()> {
    debug!("Appending {} line(s) to {}", lines.len(), path.display());

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(|e| VenvError::io(format!("opening {}", path.display()), e))?;

    let mut content = lines.join("\n");
    content.push('\n');
    file.write_all(content.as_bytes())
        .await
        .map_err(|e| VenvError::io(format!("writing {}", path.display()), e))?;
    file.flush()
        .await
        .map_err(|e| VenvError::io(format!("writing {}", path.display()), e))?;
    Ok(())
}
