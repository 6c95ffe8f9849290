//! Domain records returned by the remote job service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a job or work item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobState {
    /// Whether this state can still change
    ///
    /// A terminal job's metadata, logs, and artifacts are immutable.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

/// Full job record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobDetails {
    /// Job identifier assigned by the service
    pub id: String,

    /// Human-readable job name
    pub name: String,

    /// Current state
    pub state: JobState,

    /// When the job was submitted
    pub created_at: DateTime<Utc>,

    /// When the job reached a terminal state, if it has
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobDetails {
    /// Whether the job has reached a terminal state
    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }
}

/// A single unit of work within a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkItem {
    /// Work item identifier, unique within the job
    pub id: String,

    /// Work item name
    pub name: String,

    /// Current state
    pub state: JobState,

    /// Exit code, once the item has finished
    pub exit_code: Option<i32>,

    /// When the item started executing
    pub started_at: Option<DateTime<Utc>>,

    /// When the item finished
    pub finished_at: Option<DateTime<Utc>>,
}
