//! HTTP client for the remote job service
//!
//! Thin glue over reqwest: builds requests, maps HTTP statuses onto the
//! remote error kinds, and races every wire operation against the
//! cancellation signal. No retries happen at this layer.

use crate::config::RemoteConfig;
use crate::error::{GantryError, GantryResult};
use crate::remote::service::{ByteStream, JobService};
use crate::remote::types::{JobDetails, WorkItem};
use crate::signal::CancelSignal;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use std::io::Cursor;
use std::time::Duration;

/// Production job service client
#[derive(Debug)]
pub struct HttpJobService {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpJobService {
    /// Build a client from the remote configuration
    pub fn new(config: &RemoteConfig) -> GantryResult<Self> {
        let base_url = config
            .base_url
            .clone()
            .ok_or(GantryError::RemoteNotConfigured)?;

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| GantryError::Internal(format!("building HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    async fn get(&self, path: &str, signal: &CancelSignal) -> GantryResult<reqwest::Response> {
        if signal.is_cancelled() {
            return Err(GantryError::Cancelled);
        }

        let mut request = self.client.get(format!("{}/{}", self.base_url, path));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = tokio::select! {
            _ = signal.cancelled() => return Err(GantryError::Cancelled),
            result = request.send() => result.map_err(|e| classify_transport(path, e))?,
        };

        match response.status() {
            status if status.is_success() => Ok(response),
            StatusCode::NOT_FOUND => Err(GantryError::NotFound(path.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(GantryError::Unauthorized),
            StatusCode::REQUEST_TIMEOUT => Err(GantryError::Timeout(path.to_string())),
            status => Err(GantryError::Transient(format!(
                "{} returned {}",
                path, status
            ))),
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        signal: &CancelSignal,
    ) -> GantryResult<T> {
        let response = self.get(path, signal).await?;
        tokio::select! {
            _ = signal.cancelled() => Err(GantryError::Cancelled),
            result = response.json::<T>() => {
                result.map_err(|e| GantryError::Transient(format!("decoding {}: {}", path, e)))
            }
        }
    }

    async fn get_bytes(&self, path: &str, signal: &CancelSignal) -> GantryResult<ByteStream> {
        let response = self.get(path, signal).await?;
        let bytes = tokio::select! {
            _ = signal.cancelled() => return Err(GantryError::Cancelled),
            result = response.bytes() => {
                result.map_err(|e| classify_transport(path, e))?
            }
        };
        Ok(Box::new(Cursor::new(bytes.to_vec())))
    }
}

fn classify_transport(path: &str, err: reqwest::Error) -> GantryError {
    if err.is_timeout() {
        GantryError::Timeout(path.to_string())
    } else {
        GantryError::Transient(format!("{}: {}", path, err))
    }
}

#[async_trait]
impl JobService for HttpJobService {
    async fn job(&self, job_id: &str, signal: &CancelSignal) -> GantryResult<JobDetails> {
        self.get_json(&format!("jobs/{}", job_id), signal).await
    }

    async fn work_items(&self, job_id: &str, signal: &CancelSignal) -> GantryResult<Vec<WorkItem>> {
        self.get_json(&format!("jobs/{}/workitems", job_id), signal)
            .await
    }

    async fn work_item(
        &self,
        job_id: &str,
        item_id: &str,
        signal: &CancelSignal,
    ) -> GantryResult<WorkItem> {
        self.get_json(&format!("jobs/{}/workitems/{}", job_id, item_id), signal)
            .await
    }

    async fn log(
        &self,
        job_id: &str,
        item_id: &str,
        signal: &CancelSignal,
    ) -> GantryResult<ByteStream> {
        self.get_bytes(&format!("jobs/{}/workitems/{}/log", job_id, item_id), signal)
            .await
    }

    async fn artifact(
        &self,
        job_id: &str,
        name: &str,
        signal: &CancelSignal,
    ) -> GantryResult<ByteStream> {
        self.get_bytes(&format!("jobs/{}/artifacts/{}", job_id, name), signal)
            .await
    }
}
