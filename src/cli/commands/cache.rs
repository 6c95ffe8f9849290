//! Cache command - tenant-scoped cache administration

use crate::cache::{CacheStore, CleanupReport, StoreRegistry};
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::{Config, ConfigManager};
use crate::error::GantryResult;
use console::style;
use std::io::{self, Write};

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config) -> GantryResult<()> {
    let registry = StoreRegistry::new(ConfigManager::cache_base_dir(), config.cache.clone());
    let store = registry.get_or_create(config.remote.token.as_deref())?;

    match args.action {
        CacheAction::Status { format } => show_status(&store, format),
        CacheAction::Gc => gc(&store),
        CacheAction::Clear { yes } => clear(&store, yes),
    }
}

fn show_status(store: &CacheStore, format: OutputFormat) -> GantryResult<()> {
    let status = store.status()?;

    match format {
        OutputFormat::Json => {
            #[derive(serde::Serialize)]
            struct StatusJson {
                root: String,
                metadata_count: u64,
                artifact_count: u64,
                total_artifact_bytes: u64,
                max_bytes: u64,
                oldest_entry: Option<String>,
                newest_entry: Option<String>,
            }

            let json = StatusJson {
                root: store.root().display().to_string(),
                metadata_count: status.metadata_count,
                artifact_count: status.artifact_count,
                total_artifact_bytes: status.total_artifact_bytes,
                max_bytes: status.max_bytes,
                oldest_entry: status.oldest_entry.map(|t| t.to_rfc3339()),
                newest_entry: status.newest_entry.map(|t| t.to_rfc3339()),
            };
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Plain => {
            println!("{}", store.root().display());
        }
        OutputFormat::Table => {
            println!("Cache root:  {}", store.root().display());
            println!("Metadata:    {} entries", status.metadata_count);
            println!(
                "Artifacts:   {} file(s), {} of {}",
                status.artifact_count,
                format_bytes(status.total_artifact_bytes),
                format_bytes(status.max_bytes)
            );
            if let Some(oldest) = status.oldest_entry {
                println!("Oldest:      {}", oldest.format("%Y-%m-%d %H:%M"));
            }
            if let Some(newest) = status.newest_entry {
                println!("Newest:      {}", newest.format("%Y-%m-%d %H:%M"));
            }
        }
    }
    Ok(())
}

fn gc(store: &CacheStore) -> GantryResult<()> {
    let mut report = store.evict_expired()?;
    let lru = store.evict_lru_if_over_cap()?;
    report.rows_removed += lru.rows_removed;
    report.artifacts_removed += lru.artifacts_removed;
    report.bytes_freed += lru.bytes_freed;
    report.failures.extend(lru.failures);

    print_report(&report);
    Ok(())
}

fn clear(store: &CacheStore, skip_confirm: bool) -> GantryResult<()> {
    if !skip_confirm {
        print!("Remove all cached data under {}? [y/N] ", store.root().display());
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

    let report = store.clear();
    print_report(&report);
    Ok(())
}

fn print_report(report: &CleanupReport) {
    if report.is_empty() {
        println!("Nothing to remove.");
        return;
    }

    println!(
        "{} removed {} row(s), {} artifact(s), freed {}",
        style("✓").green(),
        report.rows_removed,
        report.artifacts_removed,
        format_bytes(report.bytes_freed)
    );

    for failure in &report.failures {
        println!("  {} {}", style("!").yellow(), failure);
    }
}

/// Format bytes as human-readable size (e.g., "1.5 GB")
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_bytes_ranges() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GB");
    }
}
