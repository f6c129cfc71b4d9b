//! Cache keys and the blob store for virtual environments
//!
//! Entries are keyed by a composite of seed, platform, Python version and
//! environment name. The store treats entries as opaque directory trees.
//!
//! # Entry lifecycle
//!
//! | Step | Who | Effect |
//! |------|-----|--------|
//! | Restore | `provision` | Copy entry into the workspace, or report a miss |
//! | Materialize | `provision` | On miss, create the environment in place |
//! | Save | `save` | After the job, publish the environment under its key |
//! | Prune | `cache gc`, `cache clear` | Drop expired entries and interrupted saves |

pub mod key;
pub mod local;
pub mod store;

pub use key::CacheKey;
pub use local::LocalCacheStore;
pub use store::{format_bytes, CacheEntryInfo, CacheStore};
