//! Human-facing progress output
//!
//! Uses `cliclack` in interactive terminals and falls back to plain lines in
//! CI. Everything here writes to stderr so stdout stays machine-readable.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{key_value, step_ok_detail, step_warn_hint};
pub use progress::TaskSpinner;
