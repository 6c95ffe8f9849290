//! Job commands - read operations through the caching decorator

use crate::cache::{CachedJobService, StoreRegistry};
use crate::cli::args::{JobAction, JobArgs, OutputFormat};
use crate::config::{Config, ConfigManager};
use crate::error::{GantryError, GantryResult};
use crate::remote::service::JobService;
use crate::remote::types::{JobDetails, WorkItem};
use crate::remote::HttpJobService;
use crate::signal::{cancel_pair, CancelSignal};
use console::style;
use std::path::PathBuf;
use tracing::debug;

/// Execute the job command
pub async fn execute(args: JobArgs, config: &Config) -> GantryResult<()> {
    let service = build_service(config)?;
    let signal = ctrl_c_signal();

    match args.action {
        JobAction::Show { job_id, format } => show_job(&service, &job_id, format, &signal).await,
        JobAction::Items { job_id, format } => {
            list_items(&service, &job_id, format, &signal).await
        }
        JobAction::Log { job_id, item_id } => {
            print_log(&service, &job_id, &item_id, &signal).await
        }
        JobAction::Artifact {
            job_id,
            name,
            output,
        } => download_artifact(&service, &job_id, &name, output, &signal).await,
    }
}

/// Wrap the HTTP client in the per-tenant caching decorator
fn build_service(config: &Config) -> GantryResult<CachedJobService> {
    let remote = HttpJobService::new(&config.remote)?;
    let registry = StoreRegistry::new(ConfigManager::cache_base_dir(), config.cache.clone());
    let store = registry.get_or_create(config.remote.token.as_deref())?;
    Ok(CachedJobService::new(
        Box::new(remote),
        store,
        &config.cache,
    ))
}

/// A signal that fires on Ctrl-C
fn ctrl_c_signal() -> CancelSignal {
    let (handle, signal) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Ctrl-C received, cancelling");
            handle.cancel();
        }
    });
    signal
}

async fn show_job(
    service: &CachedJobService,
    job_id: &str,
    format: OutputFormat,
    signal: &CancelSignal,
) -> GantryResult<()> {
    let details = service.job(job_id, signal).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&details)?),
        OutputFormat::Plain => println!("{} {}", details.id, details.state),
        OutputFormat::Table => print_job_table(&details),
    }
    Ok(())
}

fn print_job_table(details: &JobDetails) {
    let state_display = if details.state.is_terminal() {
        style(details.state.to_string()).green()
    } else {
        style(details.state.to_string()).yellow()
    };

    println!("Job:      {}", details.id);
    println!("Name:     {}", details.name);
    println!("State:    {}", state_display);
    println!(
        "Created:  {}",
        details.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(finished) = details.finished_at {
        println!("Finished: {}", finished.format("%Y-%m-%d %H:%M:%S"));
    }
}

async fn list_items(
    service: &CachedJobService,
    job_id: &str,
    format: OutputFormat,
    signal: &CancelSignal,
) -> GantryResult<()> {
    let items = service.work_items(job_id, signal).await?;

    if items.is_empty() {
        println!("No work items.");
        return Ok(());
    }

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&items)?),
        OutputFormat::Plain => {
            for item in &items {
                println!("{}", item.id);
            }
        }
        OutputFormat::Table => print_item_table(&items),
    }
    Ok(())
}

fn print_item_table(items: &[WorkItem]) {
    println!("{:<16} {:<30} {:<12} {:<6}", "ID", "NAME", "STATE", "EXIT");
    println!("{}", "-".repeat(66));

    for item in items {
        let exit = item
            .exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<16} {:<30} {:<12} {:<6}",
            item.id, item.name, item.state, exit
        );
    }

    println!();
    println!("Total: {} item(s)", items.len());
}

async fn print_log(
    service: &CachedJobService,
    job_id: &str,
    item_id: &str,
    signal: &CancelSignal,
) -> GantryResult<()> {
    let mut stream = service.log(job_id, item_id, signal).await?;
    let mut stdout = tokio::io::stdout();
    tokio::io::copy(&mut stream, &mut stdout)
        .await
        .map_err(|e| GantryError::io("writing log to stdout", e))?;
    Ok(())
}

async fn download_artifact(
    service: &CachedJobService,
    job_id: &str,
    name: &str,
    output: Option<PathBuf>,
    signal: &CancelSignal,
) -> GantryResult<()> {
    let target = output.unwrap_or_else(|| default_artifact_target(name));

    let mut stream = service.artifact(job_id, name, signal).await?;
    let mut file = tokio::fs::File::create(&target)
        .await
        .map_err(|e| GantryError::io(format!("creating {}", target.display()), e))?;
    let written = tokio::io::copy(&mut stream, &mut file)
        .await
        .map_err(|e| GantryError::io(format!("writing {}", target.display()), e))?;

    println!(
        "{} wrote {} ({} bytes)",
        style("✓").green(),
        target.display(),
        written
    );
    Ok(())
}

/// Artifact names come from the remote service; keep only the final
/// path component when deriving a local file name from one.
fn default_artifact_target(name: &str) -> PathBuf {
    PathBuf::from(name)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("artifact.bin"))
}
