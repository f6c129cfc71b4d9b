//! CLI argument definitions using clap derive

use crate::outputs::OutputFormat;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// cached-venv - Cached Python virtual environments for CI
///
/// Restores a virtual environment from the cache when one matches the job,
/// creates it otherwise, and reports where its interpreter lives.
#[derive(Parser, Debug)]
#[command(name = "cached-venv")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "CACHED_VENV_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Restore or create a virtual environment and report its interpreter
    Provision(ProvisionArgs),

    /// Print the cache key for an environment
    Key(KeyArgs),

    /// Save an environment to the cache after the job
    Save(SaveArgs),

    /// Manage the local cache store
    Cache(CacheArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),
}

/// Identity of an environment and the platform facts that key it
#[derive(Args, Debug, Clone)]
pub struct EnvArgs {
    /// Environment name (e.g. unit-tests)
    #[arg(short, long)]
    pub name: String,

    /// Opaque seed mixed into the cache key (e.g. a lockfile hash)
    #[arg(long)]
    pub cache_seed: String,

    /// Runner operating system (Linux, macOS, Windows)
    #[arg(long, env = "RUNNER_OS")]
    pub os: Option<String>,

    /// Runner architecture (e.g. X64, ARM64)
    #[arg(long, env = "RUNNER_ARCH")]
    pub arch: Option<String>,

    /// Workspace root holding the environments
    #[arg(long, env = "GITHUB_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Python major.minor version (probed from the interpreter if omitted)
    #[arg(long)]
    pub python_version: Option<String>,

    /// Interpreter used to create environments (default: from config)
    #[arg(long)]
    pub python: Option<String>,

    /// Cache store directory (default: from config)
    #[arg(long, env = "CACHED_VENV_DIR")]
    pub cache_dir: Option<PathBuf>,
}

/// Arguments for the provision command
#[derive(Parser, Debug)]
pub struct ProvisionArgs {
    #[command(flatten)]
    pub env: EnvArgs,

    /// Skip the cache lookup and always create the environment
    #[arg(long)]
    pub no_restore: bool,

    /// How to report outputs
    #[arg(short, long, default_value = "github")]
    pub format: OutputFormat,
}

/// Arguments for the key command
#[derive(Parser, Debug)]
pub struct KeyArgs {
    #[command(flatten)]
    pub env: EnvArgs,
}

/// Arguments for the save command
#[derive(Parser, Debug)]
pub struct SaveArgs {
    #[command(flatten)]
    pub env: EnvArgs,
}

/// Output format for listings
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ListFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one key per line)
    Plain,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,

    /// Cache store directory (default: from config)
    #[arg(long, global = true, env = "CACHED_VENV_DIR")]
    pub cache_dir: Option<PathBuf>,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cached environments
    List {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: ListFormat,
    },

    /// Remove old cached environments
    Gc {
        /// Remove entries older than N days (default: from config)
        #[arg(long)]
        days: Option<u32>,

        /// Dry run - show what would be removed
        #[arg(long)]
        dry_run: bool,
    },

    /// Remove all cached environments
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Initialize default configuration
    Init {
        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}
