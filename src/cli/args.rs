//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Gantry - fast job inspection with a persistent local cache
///
/// Reads jobs, work items, logs, and artifacts from a remote execution
/// service, caching everything that can no longer change.
#[derive(Parser, Debug)]
#[command(name = "gantry")]
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
    #[arg(short, long, global = true, env = "GANTRY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Base URL of the job service (overrides config)
    #[arg(long, global = true, env = "GANTRY_BASE_URL")]
    pub base_url: Option<String>,

    /// Bearer token for the job service (overrides config)
    #[arg(long, global = true, env = "GANTRY_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Inspect jobs and their outputs
    Job(JobArgs),

    /// Manage the local cache
    Cache(CacheArgs),
}

/// Arguments for the job command
#[derive(Parser, Debug)]
pub struct JobArgs {
    /// Subcommand for job
    #[command(subcommand)]
    pub action: JobAction,
}

/// Job subcommands
#[derive(Subcommand, Debug)]
pub enum JobAction {
    /// Show a job's details
    Show {
        /// Job identifier
        job_id: String,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// List a job's work items
    Items {
        /// Job identifier
        job_id: String,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Print a work item's log
    Log {
        /// Job identifier
        job_id: String,

        /// Work item identifier
        item_id: String,
    },

    /// Download a named artifact
    Artifact {
        /// Job identifier
        job_id: String,

        /// Artifact name
        name: String,

        /// Output file (defaults to the artifact name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show cache statistics for the current tenant
    Status {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Purge expired entries and idle artifacts
    Gc,

    /// Remove all cached data for the current tenant
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Output format for listing commands
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_job_show() {
        let cli = Cli::parse_from(["gantry", "job", "show", "j-42"]);
        match cli.command {
            Commands::Job(args) => match args.action {
                JobAction::Show { job_id, .. } => assert_eq!(job_id, "j-42"),
                _ => panic!("expected Show action"),
            },
            _ => panic!("expected Job command"),
        }
    }

    #[test]
    fn cli_parses_job_artifact_with_output() {
        let cli = Cli::parse_from([
            "gantry", "job", "artifact", "j-42", "report.txt", "-o", "/tmp/out.txt",
        ]);
        match cli.command {
            Commands::Job(args) => match args.action {
                JobAction::Artifact { name, output, .. } => {
                    assert_eq!(name, "report.txt");
                    assert_eq!(output, Some(PathBuf::from("/tmp/out.txt")));
                }
                _ => panic!("expected Artifact action"),
            },
            _ => panic!("expected Job command"),
        }
    }

    #[test]
    fn cli_parses_cache_status() {
        let cli = Cli::parse_from(["gantry", "cache", "status"]);
        match cli.command {
            Commands::Cache(args) => {
                assert!(matches!(args.action, CacheAction::Status { .. }));
            }
            _ => panic!("expected Cache command"),
        }
    }

    #[test]
    fn cli_parses_cache_clear_yes() {
        let cli = Cli::parse_from(["gantry", "cache", "clear", "--yes"]);
        match cli.command {
            Commands::Cache(args) => match args.action {
                CacheAction::Clear { yes } => assert!(yes),
                _ => panic!("expected Clear action"),
            },
            _ => panic!("expected Cache command"),
        }
    }

    #[test]
    fn cli_global_overrides() {
        let cli = Cli::parse_from([
            "gantry",
            "--base-url",
            "https://jobs.example.com",
            "--token",
            "tok",
            "cache",
            "gc",
        ]);
        assert_eq!(cli.base_url.as_deref(), Some("https://jobs.example.com"));
        assert_eq!(cli.token.as_deref(), Some("tok"));
    }

    #[test]
    fn cli_verbose_levels() {
        let cli = Cli::parse_from(["gantry", "cache", "gc"]);
        assert_eq!(cli.verbose, 0);

        let cli = Cli::parse_from(["gantry", "-vv", "cache", "gc"]);
        assert_eq!(cli.verbose, 2);
    }
}
