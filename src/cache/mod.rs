//! Persistent read-through cache for remote job data
//!
//! Layered bottom-up: [`key`] sanitizes untrusted identifier segments and
//! enforces path containment; [`store`] persists metadata rows and
//! artifact files per tenant with crash-safe writes and size-bounded
//! eviction; [`registry`] maps credentials to isolated store instances;
//! [`decorator`] wraps the remote job service with the TTL policy.
//!
//! # Consistency model
//!
//! Each key is independent: the last completed write wins and no
//! multi-key atomicity is promised. Artifact writes are atomic via
//! temp-file-then-rename; index writes via SQLite row atomicity. Several
//! processes may share a store root (WAL journal, busy timeout).

pub mod decorator;
pub mod key;
pub mod registry;
pub mod store;

pub use decorator::CachedJobService;
pub use key::{sanitize_segment, validate_within_root, CacheKey};
pub use registry::{tenant_id, StoreRegistry};
pub use store::{CacheStore, CleanupReport, StoreStatus};
