//! Read-through caching wrapper for the job service
//!
//! `CachedJobService` implements [`JobService`] itself, so it substitutes
//! for the real client by construction. TTLs follow the job lifecycle: a
//! running job's records change within seconds and are cached briefly; a
//! finished job is immutable and cached for hours. A running job's log is
//! still being appended to, so it bypasses the cache entirely until the
//! job finishes.

use crate::cache::key::{sanitize_segment, CacheKey};
use crate::cache::store::CacheStore;
use crate::config::CacheConfig;
use crate::error::{GantryError, GantryResult};
use crate::remote::service::{ByteStream, JobService};
use crate::remote::types::{JobDetails, WorkItem};
use crate::signal::CancelSignal;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Caching decorator around a job service
pub struct CachedJobService {
    inner: Box<dyn JobService>,
    store: Arc<CacheStore>,
    enabled: bool,
    running_ttl: Duration,
    finished_ttl: Duration,
}

impl CachedJobService {
    pub fn new(inner: Box<dyn JobService>, store: Arc<CacheStore>, config: &CacheConfig) -> Self {
        Self {
            inner,
            store,
            enabled: config.is_enabled(),
            running_ttl: config.running_ttl(),
            finished_ttl: config.finished_ttl(),
        }
    }

    fn ttl_for(&self, finished: bool) -> Duration {
        if finished {
            self.finished_ttl
        } else {
            self.running_ttl
        }
    }

    /// Read-through for the job record itself
    ///
    /// The miss path records the job's terminal-ness as a side effect, so
    /// sub-operations can pick their TTL without refetching the job.
    async fn fetch_job(&self, job_id: &str, signal: &CancelSignal) -> GantryResult<JobDetails> {
        let key = CacheKey::new(&["job", job_id]);

        if let Some(raw) = self.store.get_metadata(&key, signal)? {
            match serde_json::from_str(&raw) {
                Ok(details) => return Ok(details),
                Err(e) => debug!("Discarding undecodable cached job record {}: {}", key, e),
            }
        }

        debug!("Job metadata miss for {}, fetching", key);
        let details = self.inner.job(job_id, signal).await?;
        let finished = details.is_finished();
        let ttl = self.ttl_for(finished);
        self.store
            .set_group_state(key.group_id(), finished, ttl, signal)?;
        self.store
            .set_metadata(&key, &serde_json::to_string(&details)?, ttl, signal)?;
        Ok(details)
    }

    /// Whether a job has finished, from the group-state cache when fresh
    async fn job_finished(&self, job_id: &str, signal: &CancelSignal) -> GantryResult<bool> {
        let group = sanitize_segment(job_id);
        if let Some(finished) = self.store.group_state(&group, signal)? {
            return Ok(finished);
        }
        let details = self.fetch_job(job_id, signal).await?;
        Ok(details.is_finished())
    }

    /// Persist a fetched stream and serve the stored copy
    ///
    /// The write hands back a handle opened before the cap check, so the
    /// caller is served even when the fresh entry is demoted right away.
    async fn write_through(
        &self,
        key: &CacheKey,
        mut stream: ByteStream,
        signal: &CancelSignal,
    ) -> GantryResult<ByteStream> {
        let (file, _) = self.store.set_artifact(key, &mut stream, signal).await?;
        Ok(Box::new(file))
    }
}

#[async_trait]
impl JobService for CachedJobService {
    async fn job(&self, job_id: &str, signal: &CancelSignal) -> GantryResult<JobDetails> {
        if signal.is_cancelled() {
            return Err(GantryError::Cancelled);
        }
        if !self.enabled {
            return self.inner.job(job_id, signal).await;
        }
        self.fetch_job(job_id, signal).await
    }

    async fn work_items(&self, job_id: &str, signal: &CancelSignal) -> GantryResult<Vec<WorkItem>> {
        if signal.is_cancelled() {
            return Err(GantryError::Cancelled);
        }
        if !self.enabled {
            return self.inner.work_items(job_id, signal).await;
        }

        let key = CacheKey::new(&["job", job_id, "workitems"]);
        if let Some(raw) = self.store.get_metadata(&key, signal)? {
            match serde_json::from_str(&raw) {
                Ok(items) => return Ok(items),
                Err(e) => debug!("Discarding undecodable cached work items {}: {}", key, e),
            }
        }

        let items = self.inner.work_items(job_id, signal).await?;
        let ttl = self.ttl_for(self.job_finished(job_id, signal).await?);
        self.store
            .set_metadata(&key, &serde_json::to_string(&items)?, ttl, signal)?;
        Ok(items)
    }

    async fn work_item(
        &self,
        job_id: &str,
        item_id: &str,
        signal: &CancelSignal,
    ) -> GantryResult<WorkItem> {
        if signal.is_cancelled() {
            return Err(GantryError::Cancelled);
        }
        if !self.enabled {
            return self.inner.work_item(job_id, item_id, signal).await;
        }

        let key = CacheKey::new(&["job", job_id, "wi", item_id]);
        if let Some(raw) = self.store.get_metadata(&key, signal)? {
            match serde_json::from_str(&raw) {
                Ok(item) => return Ok(item),
                Err(e) => debug!("Discarding undecodable cached work item {}: {}", key, e),
            }
        }

        let item = self.inner.work_item(job_id, item_id, signal).await?;
        let ttl = self.ttl_for(self.job_finished(job_id, signal).await?);
        self.store
            .set_metadata(&key, &serde_json::to_string(&item)?, ttl, signal)?;
        Ok(item)
    }

    async fn log(
        &self,
        job_id: &str,
        item_id: &str,
        signal: &CancelSignal,
    ) -> GantryResult<ByteStream> {
        if signal.is_cancelled() {
            return Err(GantryError::Cancelled);
        }
        if !self.enabled {
            return self.inner.log(job_id, item_id, signal).await;
        }

        // A running job's log is append-only; any cached copy would be
        // stale by construction.
        if !self.job_finished(job_id, signal).await? {
            debug!("Job {} still running, bypassing log cache", job_id);
            return self.inner.log(job_id, item_id, signal).await;
        }

        let key = CacheKey::new(&["job", job_id, "wi", item_id, "log"]);
        if let Some(file) = self.store.get_artifact(&key, signal).await? {
            return Ok(Box::new(file));
        }

        let stream = self.inner.log(job_id, item_id, signal).await?;
        self.write_through(&key, stream, signal).await
    }

    async fn artifact(
        &self,
        job_id: &str,
        name: &str,
        signal: &CancelSignal,
    ) -> GantryResult<ByteStream> {
        if signal.is_cancelled() {
            return Err(GantryError::Cancelled);
        }
        if !self.enabled {
            return self.inner.artifact(job_id, name, signal).await;
        }

        // Content-addressed: presence alone is validity, eviction is the
        // only thing that removes an artifact.
        let key = CacheKey::new(&["job", job_id, "artifact", name]);
        if let Some(file) = self.store.get_artifact(&key, signal).await? {
            return Ok(Box::new(file));
        }

        let stream = self.inner.artifact(job_id, name, signal).await?;
        self.write_through(&key, stream, signal).await
    }
}
