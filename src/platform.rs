//! Platform facts for the running CI job
//!
//! The OS family decides the virtual environment layout. The raw OS name and
//! architecture are carried unchanged because they feed the cache key.

use crate::error::{VenvError, VenvResult};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Operating system family of a runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsFamily {
    /// Linux runners
    Linux,
    /// macOS runners
    MacOS,
    /// Windows runners
    Windows,
}

impl OsFamily {
    /// Detect the family of the host running this binary
    pub fn detect() -> VenvResult<Self> {
        std::env::consts::OS.parse()
    }

    /// Human-readable name, matching the `RUNNER_OS` spelling
    pub fn name(&self) -> &'static str {
        match self {
            Self::Linux => "Linux",
            Self::MacOS => "macOS",
            Self::Windows => "Windows",
        }
    }

    /// Directory inside a virtual environment holding its executables
    pub fn bin_dir_name(&self) -> &'static str {
        match self {
            Self::Windows => "Scripts",
            Self::Linux | Self::MacOS => "bin",
        }
    }
}

impl FromStr for OsFamily {
    type Err = VenvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linux" => Ok(Self::Linux),
            "macos" | "darwin" | "osx" => Ok(Self::MacOS),
            "windows" | "win32" | "win64" | "win" => Ok(Self::Windows),
            _ => Err(VenvError::UnsupportedPlatform(s.to_string())),
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Ambient facts about the job, passed explicitly to the provisioner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformContext {
    /// OS name as reported by the runner (goes into the cache key as-is)
    pub os: String,
    /// Parsed OS family
    pub family: OsFamily,
    /// Architecture as reported by the runner (goes into the cache key as-is)
    pub arch: String,
    /// Job workspace root
    pub workspace: PathBuf,
}

impl PlatformContext {
    /// Build a context from a runner OS name
    pub fn new(
        os: impl Into<String>,
        arch: impl Into<String>,
        workspace: impl Into<PathBuf>,
    ) -> VenvResult<Self> {
        let os = os.into();
        let family = os.parse()?;
        Ok(Self {
            os,
            family,
            arch: arch.into(),
            workspace: workspace.into(),
        })
    }

    /// Build a context from optional overrides, falling back to the host
    ///
    /// The overrides normally come from CLI flags that clap already
    /// populated from `RUNNER_OS`, `RUNNER_ARCH` and `GITHUB_WORKSPACE`.
    pub fn resolve(
        os: Option<String>,
        arch: Option<String>,
        workspace: Option<PathBuf>,
    ) -> VenvResult<Self> {
        let os = match os {
            Some(os) => os,
            None => OsFamily::detect()?.name().to_string(),
        };
        let arch = arch.unwrap_or_else(host_arch);
        let workspace = match workspace {
            Some(path) => path,
            None => std::env::current_dir()
                .map_err(|e| VenvError::io("getting current directory", e))?,
        };
        Self::new(os, arch, workspace)
    }

    /// Workspace root
    pub fn workspace(&self) -> &Path {
        &self.workspace
    }
}

/// Host architecture in `RUNNER_ARCH` spelling
fn host_arch() -> String {
    match std::env::consts::ARCH {
        "x86_64" => "X64".to_string(),
        "x86" => "X86".to_string(),
        "aarch64" => "ARM64".to_string(),
        "arm" => "ARM".to_string(),
        other => other.to_string(),
    }
}
