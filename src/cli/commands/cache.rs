//! Cache command - manage the local cache store

use crate::cache::{format_bytes, CacheEntryInfo, CacheStore, LocalCacheStore};
use crate::cli::args::{CacheAction, CacheArgs, ListFormat};
use crate::config::{Config, ConfigManager};
use crate::error::VenvResult;
use chrono::Utc;
use console::style;
use std::io::{self, Write};
use std::time::Duration;
use tracing::debug;

/// Leftovers younger than this may belong to a save still in progress
const INCOMPLETE_GRACE: Duration = Duration::from_secs(60 * 60);

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> VenvResult<()> {
    let root = args
        .cache_dir
        .unwrap_or_else(|| ConfigManager::cache_dir(config));
    let store = LocalCacheStore::new(root);
    debug!("Using {} store at {}", store.store_name(), store.root().display());

    match args.action {
        CacheAction::List { format } => list_entries(&store, format).await,
        CacheAction::Gc { days, dry_run } => gc_entries(&store, config, days, dry_run).await,
        CacheAction::Clear { yes } => clear_entries(&store, yes).await,
    }
}

/// List all cached environments
async fn list_entries(store: &dyn CacheStore, format: ListFormat) -> VenvResult<()> {
    let entries = store.list().await?;

    match format {
        ListFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        ListFormat::Plain => {
            for entry in &entries {
                println!("{}", entry.key);
            }
        }
        ListFormat::Table => {
            if entries.is_empty() {
                println!("No cached environments found.");
            } else {
                print_entry_table(&entries);
            }
        }
    }

    Ok(())
}

fn print_entry_table(entries: &[CacheEntryInfo]) {
    println!("{:<18} {:<10} {:<17} KEY", "DIGEST", "SIZE", "CREATED");
    println!("{}", "-".repeat(80));

    let mut total = 0u64;
    for entry in entries {
        total += entry.size_bytes;
        println!(
            "{:<18} {:<10} {:<17} {}",
            entry.digest,
            format_bytes(entry.size_bytes),
            entry.created_at.format("%Y-%m-%d %H:%M"),
            entry.key
        );
    }

    println!();
    println!(
        "Total: {} environment(s), {}",
        entries.len(),
        format_bytes(total)
    );
}

/// Entries that a gc run with the given age limit would remove
pub(crate) fn expired_entries(entries: &[CacheEntryInfo], days: u32) -> Vec<&CacheEntryInfo> {
    entries
        .iter()
        .filter(|e| e.is_older_than_days(days))
        .collect()
}

/// Garbage collect old entries
async fn gc_entries(
    store: &dyn CacheStore,
    config: &Config,
    days_override: Option<u32>,
    dry_run: bool,
) -> VenvResult<()> {
    let gc_days = days_override.unwrap_or(config.cache.gc_days);

    if !dry_run {
        let pruned = store.prune_incomplete(INCOMPLETE_GRACE).await?;
        if pruned > 0 {
            println!(
                "{} removed {} interrupted save(s)",
                style("✓").green(),
                pruned
            );
        }
    }

    if gc_days == 0 {
        println!("Cache GC is disabled (gc_days = 0)");
        return Ok(());
    }

    let entries = store.list().await?;
    let to_remove = expired_entries(&entries, gc_days);

    if to_remove.is_empty() {
        println!("No cached environments older than {} days.", gc_days);
        return Ok(());
    }

    println!(
        "Found {} cached environment(s) older than {} days:",
        to_remove.len(),
        gc_days
    );
    for entry in &to_remove {
        let age_days = (Utc::now() - entry.created_at).num_days();
        println!("  {} {} ({} days old)", style("•").red(), entry.key, age_days);
    }

    if dry_run {
        println!();
        println!("Dry run - nothing removed.");
        return Ok(());
    }

    let mut removed = 0;
    for entry in to_remove {
        if store.remove(&entry.cache_key()).await? {
            removed += 1;
        }
    }

    println!(
        "{} removed {} cached environment(s)",
        style("✓").green(),
        removed
    );
    Ok(())
}

/// Remove every entry
async fn clear_entries(store: &dyn CacheStore, skip_confirm: bool) -> VenvResult<()> {
    let entries = store.list().await?;

    if entries.is_empty() {
        store.prune_incomplete(Duration::ZERO).await?;
        println!("No cached environments to clear.");
        return Ok(());
    }

    println!("This will remove {} cached environment(s):", entries.len());
    for entry in &entries {
        println!("  {} {}", style("•").red(), entry.key);
    }
    println!();

    if !skip_confirm {
        print!("Are you sure? [y/N] ");
        let _ = io::stdout().flush();

        let mut input = String::new();
        if io::stdin().read_line(&mut input).is_err() {
            println!("Failed to read input, aborting.");
            return Ok(());
        }

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    let mut removed = 0;
    for entry in &entries {
        if store.remove(&entry.cache_key()).await? {
            removed += 1;
        }
    }
    store.prune_incomplete(Duration::ZERO).await?;

    println!(
        "{} cleared {} cached environment(s)",
        style("✓").green(),
        removed
    );
    Ok(())
}
