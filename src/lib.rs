//! Gantry - Fast Job Inspection
//!
//! Wraps a remote job-execution API in a persistent, multi-tenant,
//! read-through local cache so repeated queries about the same job are
//! cheap, consistent, and safe across processes.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod remote;
pub mod signal;

pub use error::{GantryError, GantryResult};
