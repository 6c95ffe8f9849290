//! Remote job service boundary
//!
//! The trait in [`service`] is the seam the caching layer wraps; [`http`]
//! is the production implementation.

pub mod http;
pub mod service;
pub mod types;

pub use http::HttpJobService;
pub use service::{ByteStream, JobService};
pub use types::{JobDetails, JobState, WorkItem};
