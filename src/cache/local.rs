//! Directory-backed cache store
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/<digest>/current              name of the published generation
//! <root>/<digest>/gen-<uuid>/entry.json metadata (CacheEntryInfo)
//! <root>/<digest>/gen-<uuid>/data/      the saved directory tree
//! <root>/<digest>/.staging-<uuid>/      in-flight save
//! ```
//!
//! A save fills a staging directory, renames it to a new generation and then
//! replaces `current` with a rename. Readers follow `current` and copy one
//! generation, so they see either the previous or the new tree in full.
//! Superseded generations are deleted right after publishing; a reader that
//! loses its generation mid-copy re-reads `current` and starts over.

use crate::cache::key::{is_path_component, CacheKey};
use crate::cache::store::{CacheEntryInfo, CacheStore};
use crate::error::{VenvError, VenvResult};
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

const ENTRY_FILE: &str = "entry.json";
const DATA_DIR: &str = "data";
const POINTER_FILE: &str = "current";
const GENERATION_PREFIX: &str = "gen-";
const STAGING_PREFIX: &str = ".staging-";
const POINTER_TMP_PREFIX: &str = ".current-";

/// Times a restore follows `current` before giving up on a busy entry
const RESTORE_ATTEMPTS: usize = 5;

/// State of an entry directory as seen through its pointer file
#[derive(Debug)]
enum Generation {
    /// No pointer: nothing published yet
    Missing,
    /// Pointer names a generation that has already been deleted
    Retired,
    Published(PathBuf, CacheEntryInfo),
}

/// Cache store keeping entries in a local directory
#[derive(Debug, Clone)]
pub struct LocalCacheStore {
    root: PathBuf,
}

impl LocalCacheStore {
    /// Create a store rooted at `root` (created lazily on first save)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default store location under the user cache directory
    pub fn default_root() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cached-venv")
            .join("entries")
    }

    /// Store root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_dir(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.digest())
    }

    /// Resolve the generation currently published for `key`
    async fn lookup(&self, key: &CacheKey) -> VenvResult<Generation> {
        match current_generation(&self.entry_dir(key)).await? {
            Generation::Published(_, info) if info.key != key.as_str() => {
                warn!(
                    "Cache entry {} belongs to a different key ({}), treating as miss",
                    info.digest, info.key
                );
                Ok(Generation::Missing)
            }
            other => Ok(other),
        }
    }
}

#[async_trait]
impl CacheStore for LocalCacheStore {
    async fn restore(&self, key: &CacheKey, target: &Path) -> VenvResult<bool> {
        for attempt in 1..=RESTORE_ATTEMPTS {
            let generation = match self.lookup(key).await? {
                Generation::Missing => {
                    debug!("Cache miss for {}", key);
                    return Ok(false);
                }
                Generation::Retired => {
                    debug!("Generation for {} retired, re-reading (attempt {})", key, attempt);
                    tokio::task::yield_now().await;
                    continue;
                }
                Generation::Published(generation, _) => generation,
            };

            match replace_dir(&generation.join(DATA_DIR), target).await {
                Ok(bytes) => {
                    info!("Restored {} ({} bytes) into {}", key, bytes, target.display());
                    return Ok(true);
                }
                Err(e) => {
                    // Retirement deletes a generation only after `current` moved
                    // off it, so a failure on a still-current generation is real
                    let moved = match current_generation(&self.entry_dir(key)).await {
                        Ok(Generation::Published(current, _)) => current != generation,
                        _ => true,
                    };
                    if !moved && generation.exists() {
                        return Err(e);
                    }
                    debug!("Generation for {} retired mid-copy: {}", key, e);
                    tokio::task::yield_now().await;
                }
            }
        }

        warn!(
            "Cache entry for {} kept changing during restore, treating as miss",
            key
        );
        Ok(false)
    }

    async fn save(&self, key: &CacheKey, source: &Path) -> VenvResult<CacheEntryInfo> {
        if !source.is_dir() {
            return Err(VenvError::PathNotFound(source.to_path_buf()));
        }

        let entry_dir = self.entry_dir(key);
        fs::create_dir_all(&entry_dir)
            .await
            .map_err(|e| VenvError::io(format!("creating {}", entry_dir.display()), e))?;

        let id = Uuid::new_v4();
        let staging = entry_dir.join(format!("{}{}", STAGING_PREFIX, id));
        let info = match stage_generation(key, source, &staging).await {
            Ok(info) => info,
            Err(e) => {
                discard(&staging).await;
                return Err(e);
            }
        };

        let generation_name = format!("{}{}", GENERATION_PREFIX, id);
        let generation = entry_dir.join(&generation_name);
        if let Err(e) = fs::rename(&staging, &generation).await {
            discard(&staging).await;
            return Err(VenvError::store(
                &generation,
                format!("publishing entry failed: {}", e),
            ));
        }

        // Last writer wins: the pointer swap is the single publish step
        let pointer_tmp = entry_dir.join(format!("{}{}", POINTER_TMP_PREFIX, id));
        let published = match fs::write(&pointer_tmp, &generation_name).await {
            Ok(()) => fs::rename(&pointer_tmp, entry_dir.join(POINTER_FILE)).await,
            Err(e) => Err(e),
        };
        if let Err(e) = published {
            discard(&pointer_tmp).await;
            discard(&generation).await;
            return Err(VenvError::store(
                &entry_dir,
                format!("updating {} failed: {}", POINTER_FILE, e),
            ));
        }

        retire_generations(&entry_dir).await;
        info!("Saved {} ({} bytes)", key, info.size_bytes);
        Ok(info)
    }

    async fn list(&self) -> VenvResult<Vec<CacheEntryInfo>> {
        if !self.root.exists() {
            return Ok(vec![]);
        }

        let mut entries = vec![];
        let mut dir = fs::read_dir(&self.root)
            .await
            .map_err(|e| VenvError::io("reading cache store", e))?;

        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| VenvError::io("reading cache store entry", e))?
        {
            if entry.file_name().to_string_lossy().starts_with('.') {
                continue;
            }
            match current_generation(&entry.path()).await {
                Ok(Generation::Published(_, info)) => entries.push(info),
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable entry {}: {}", entry.path().display(), e),
            }
        }

        // Newest first
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(entries)
    }

    async fn remove(&self, key: &CacheKey) -> VenvResult<bool> {
        let dir = self.entry_dir(key);
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir)
            .await
            .map_err(|e| VenvError::io(format!("removing {}", dir.display()), e))?;
        debug!("Removed cache entry {}", key);
        Ok(true)
    }

    async fn prune_incomplete(&self, min_age: Duration) -> VenvResult<usize> {
        if !self.root.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        let mut dir = fs::read_dir(&self.root)
            .await
            .map_err(|e| VenvError::io("reading cache store", e))?;

        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| VenvError::io("reading cache store entry", e))?
        {
            let path = entry.path();
            if entry.file_name().to_string_lossy().starts_with('.') {
                // Staging directories from before entries were generational
                if is_stale(&path, min_age).await && remove_path(&path).await {
                    removed += 1;
                }
                continue;
            }
            if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                removed += prune_entry_dir(&path, min_age).await;
            }
        }

        if removed > 0 {
            info!("Removed {} incomplete cache item(s)", removed);
        }
        Ok(removed)
    }

    fn store_name(&self) -> &'static str {
        "local"
    }
}

/// Copy `source` into `staging/data` and write its metadata
async fn stage_generation(
    key: &CacheKey,
    source: &Path,
    staging: &Path,
) -> VenvResult<CacheEntryInfo> {
    let size = copy_tree(source, &staging.join(DATA_DIR)).await?;
    let info = CacheEntryInfo::new(key, size);
    let json = serde_json::to_string_pretty(&info)?;
    fs::write(staging.join(ENTRY_FILE), json)
        .await
        .map_err(|e| VenvError::io("writing cache entry metadata", e))?;
    Ok(info)
}

/// Follow the pointer file of `entry_dir`
async fn current_generation(entry_dir: &Path) -> VenvResult<Generation> {
    let pointer = entry_dir.join(POINTER_FILE);
    let name = match fs::read_to_string(&pointer).await {
        Ok(name) => name,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Generation::Missing),
        Err(e) => return Err(VenvError::io(format!("reading {}", pointer.display()), e)),
    };

    let name = name.trim();
    if !name.starts_with(GENERATION_PREFIX) || !is_path_component(name) {
        return Err(VenvError::store(
            &pointer,
            format!("invalid generation name {:?}", name),
        ));
    }

    let generation = entry_dir.join(name);
    let meta = generation.join(ENTRY_FILE);
    let content = match fs::read_to_string(&meta).await {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Generation::Retired),
        Err(e) => return Err(VenvError::io(format!("reading {}", meta.display()), e)),
    };
    let info: CacheEntryInfo = serde_json::from_str(&content)?;
    Ok(Generation::Published(generation, info))
}

/// Delete every generation of `entry_dir` except the published one
async fn retire_generations(entry_dir: &Path) {
    let current = match current_generation(entry_dir).await {
        Ok(Generation::Published(path, _)) => path,
        Ok(_) => return,
        Err(e) => {
            warn!("Not retiring old generations in {}: {}", entry_dir.display(), e);
            return;
        }
    };

    let mut dir = match fs::read_dir(entry_dir).await {
        Ok(dir) => dir,
        Err(e) => {
            warn!("Failed to read {}: {}", entry_dir.display(), e);
            return;
        }
    };
    loop {
        match dir.next_entry().await {
            Ok(Some(entry)) => {
                let path = entry.path();
                if entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with(GENERATION_PREFIX)
                    && path != current
                {
                    debug!("Retiring {}", path.display());
                    discard(&path).await;
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("Failed to read {}: {}", entry_dir.display(), e);
                break;
            }
        }
    }
}

/// Remove stale leftovers inside one entry directory
async fn prune_entry_dir(entry_dir: &Path, min_age: Duration) -> usize {
    let current = match current_generation(entry_dir).await {
        Ok(Generation::Published(path, _)) => path,
        // Never published or pointer broken: the whole entry is unusable
        _ => {
            let stale = is_stale(entry_dir, min_age).await;
            return usize::from(stale && remove_path(entry_dir).await);
        }
    };

    let mut removed = 0;
    let Ok(mut dir) = fs::read_dir(entry_dir).await else {
        return 0;
    };
    while let Ok(Some(entry)) = dir.next_entry().await {
        let name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();
        let leftover = name.starts_with(STAGING_PREFIX)
            || name.starts_with(POINTER_TMP_PREFIX)
            || (name.starts_with(GENERATION_PREFIX) && path != current);
        if leftover && is_stale(&path, min_age).await && remove_path(&path).await {
            removed += 1;
        }
    }
    removed
}

/// True when `path` was last modified at least `min_age` ago
async fn is_stale(path: &Path, min_age: Duration) -> bool {
    match fs::symlink_metadata(path).await.and_then(|m| m.modified()) {
        Ok(modified) => {
            SystemTime::now()
                .duration_since(modified)
                .unwrap_or_default()
                >= min_age
        }
        Err(_) => false,
    }
}

/// Remove a file or directory, logging failures. Returns true if removed.
async fn remove_path(path: &Path) -> bool {
    let result = match fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).await,
        Ok(_) => fs::remove_file(path).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => {
            debug!("Removed {}", path.display());
            true
        }
        Err(e) => {
            warn!("Failed to remove {}: {}", path.display(), e);
            false
        }
    }
}

/// Best-effort cleanup of a temporary path
async fn discard(path: &Path) {
    let result = match fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).await,
        Ok(_) => fs::remove_file(path).await,
        Err(_) => return,
    };
    if let Err(e) = result {
        warn!("Failed to clean up {}: {}", path.display(), e);
    }
}

/// Copy `src` next to `target` and swap it into place
///
/// `target` keeps its previous contents if the copy fails.
async fn replace_dir(src: &Path, target: &Path) -> VenvResult<u64> {
    let name = target
        .file_name()
        .ok_or_else(|| VenvError::store(target, "restore target has no directory name"))?
        .to_string_lossy()
        .into_owned();
    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)
        .await
        .map_err(|e| VenvError::io(format!("creating {}", parent.display()), e))?;

    let id = Uuid::new_v4();
    let staging = parent.join(format!(".{}.restore-{}", name, id));
    let bytes = match copy_tree(src, &staging).await {
        Ok(bytes) => bytes,
        Err(e) => {
            discard(&staging).await;
            return Err(e);
        }
    };

    let previous = parent.join(format!(".{}.old-{}", name, id));
    let had_previous = fs::symlink_metadata(target).await.is_ok();
    if had_previous {
        if let Err(e) = fs::rename(target, &previous).await {
            discard(&staging).await;
            return Err(VenvError::io(format!("moving aside {}", target.display()), e));
        }
    }

    if let Err(e) = fs::rename(&staging, target).await {
        if had_previous {
            if let Err(undo) = fs::rename(&previous, target).await {
                warn!("Failed to put back {}: {}", target.display(), undo);
            }
        }
        discard(&staging).await;
        return Err(VenvError::io(format!("replacing {}", target.display()), e));
    }

    if had_previous {
        discard(&previous).await;
    }
    Ok(bytes)
}

/// Copy a directory tree, preserving symlinks. Returns bytes of regular files copied.
async fn copy_tree(src: &Path, dst: &Path) -> VenvResult<u64> {
    let mut total = 0u64;
    let mut pending = vec![(src.to_path_buf(), dst.to_path_buf())];

    while let Some((from, to)) = pending.pop() {
        fs::create_dir_all(&to)
            .await
            .map_err(|e| VenvError::io(format!("creating {}", to.display()), e))?;

        let mut entries = fs::read_dir(&from)
            .await
            .map_err(|e| VenvError::io(format!("reading {}", from.display()), e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| VenvError::io(format!("reading {}", from.display()), e))?
        {
            let src_path = entry.path();
            let dst_path = to.join(entry.file_name());
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| VenvError::io(format!("inspecting {}", src_path.display()), e))?;

            if file_type.is_symlink() {
                copy_symlink(&src_path, &dst_path)
                    .await
                    .map_err(|e| VenvError::io(format!("linking {}", dst_path.display()), e))?;
            } else if file_type.is_dir() {
                pending.push((src_path, dst_path));
            } else {
                total += fs::copy(&src_path, &dst_path)
                    .await
                    .map_err(|e| VenvError::io(format!("copying {}", src_path.display()), e))?;
            }
        }
    }

    Ok(total)
}

#[cfg(unix)]
async fn copy_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    let target = fs::read_link(src).await?;
    fs::symlink(target, dst).await
}

#[cfg(windows)]
async fn copy_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    let target = fs::read_link(src).await?;
    let is_dir = fs::metadata(src).await.map(|m| m.is_dir()).unwrap_or(false);
    if is_dir {
        fs::symlink_dir(target, dst).await
    } else {
        fs::symlink_file(target, dst).await
    }
}
