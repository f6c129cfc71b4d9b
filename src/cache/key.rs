//! Cache key derivation
//!
//! A key is the pipe-joined tuple `seed|os|arch|cached-venv|version|name`.
//! Same inputs = same key, and any changed field yields a different key.

use crate::error::{VenvError, VenvResult};
use sha2::{Digest, Sha256};
use std::fmt;

/// Separator between key fields
pub const SEPARATOR: &str = "|";

/// Fixed tag identifying keys produced by this tool
pub const TAG: &str = "cached-venv";

/// Composite cache key for one virtual environment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive a key from its parts
    ///
    /// Fields are used verbatim. A field containing the separator is rejected,
    /// otherwise two different tuples could render to the same string. Line
    /// breaks are rejected because the key is written to line-oriented step
    /// outputs. `python_version` and `name` become directory names under the
    /// workspace, so each must be a single path component.
    pub fn compute(
        seed: &str,
        os: &str,
        arch: &str,
        python_version: &str,
        name: &str,
    ) -> VenvResult<Self> {
        if name.is_empty() {
            return Err(VenvError::EmptyName);
        }

        let fields = [
            ("cache-seed", seed),
            ("os", os),
            ("arch", arch),
            ("python-version", python_version),
            ("name", name),
        ];
        for (field, value) in fields {
            if value.contains(SEPARATOR) {
                return Err(VenvError::KeyFieldSeparator {
                    field,
                    separator: SEPARATOR,
                    value: value.to_string(),
                });
            }
            if value.contains(|c: char| c == '\n' || c == '\r') {
                return Err(VenvError::KeyFieldLineBreak {
                    field,
                    value: value.to_string(),
                });
            }
        }

        for (field, value) in [("python-version", python_version), ("name", name)] {
            if !is_path_component(value) {
                return Err(VenvError::InvalidPathComponent {
                    field,
                    value: value.to_string(),
                });
            }
        }

        let key = [seed, os, arch, TAG, python_version, name].join(SEPARATOR);
        Ok(Self(key))
    }

    /// Wrap an existing key string (e.g. read back from store metadata)
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The key as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem-safe digest of the key, first 16 hex chars of SHA256
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.0.as_bytes());
        let result = hasher.finalize();
        hex::encode(&result[..8])
    }
}

/// True when `value` names exactly one entry inside its parent directory
///
/// Drive prefixes (`C:`) count as separators so a Windows path cannot slip
/// through on either host.
pub fn is_path_component(value: &str) -> bool {
    !value.is_empty()
        && value != "."
        && value != ".."
        && !value.contains(|c: char| matches!(c, '/' | '\\' | ':' | '\0'))
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
