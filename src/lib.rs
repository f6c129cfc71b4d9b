//! cached-venv - Cached Python virtual environments for CI
//!
//! Computes a cache key from the job's platform, Python version and a seed,
//! restores a matching environment from the cache store, and creates a fresh
//! one with `python3 -m venv --upgrade` on a miss.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod outputs;
pub mod platform;
pub mod provision;
pub mod python;
pub mod ui;

pub use error::{VenvError, VenvResult};
