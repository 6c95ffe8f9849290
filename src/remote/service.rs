//! Remote job service abstraction
//!
//! Provides a trait for the read-only job service operations so that the
//! caching layer can wrap any backend (HTTP client, test double) by
//! construction.

use crate::error::GantryResult;
use crate::remote::types::{JobDetails, WorkItem};
use crate::signal::CancelSignal;
use async_trait::async_trait;
use tokio::io::AsyncRead;

/// Binary content returned by log and artifact reads
pub type ByteStream = Box<dyn AsyncRead + Send + Unpin>;

/// Abstract read-only job service interface
///
/// Implementations report failures as one of the remote error kinds
/// (not-found, unauthorized, transient, timeout) or cancellation; they
/// never invent new ones.
#[async_trait]
pub trait JobService: Send + Sync {
    /// Fetch a job's details
    async fn job(&self, job_id: &str, signal: &CancelSignal) -> GantryResult<JobDetails>;

    /// List a job's work items
    async fn work_items(&self, job_id: &str, signal: &CancelSignal) -> GantryResult<Vec<WorkItem>>;

    /// Fetch a single work item
    async fn work_item(
        &self,
        job_id: &str,
        item_id: &str,
        signal: &CancelSignal,
    ) -> GantryResult<WorkItem>;

    /// Read a work item's log
    ///
    /// For a running job the returned content is a snapshot of a stream
    /// that is still being appended to.
    async fn log(
        &self,
        job_id: &str,
        item_id: &str,
        signal: &CancelSignal,
    ) -> GantryResult<ByteStream>;

    /// Read a named artifact produced by a job
    async fn artifact(
        &self,
        job_id: &str,
        name: &str,
        signal: &CancelSignal,
    ) -> GantryResult<ByteStream>;
}
