//! Per-tenant store registry
//!
//! Cache state for different credentials must never mix, so each tenant
//! (derived from the credential, or a fixed public tenant) gets its own
//! store root. The registry hands out one shared store instance per
//! tenant for the lifetime of the process.

use crate::cache::store::CacheStore;
use crate::config::CacheConfig;
use crate::error::GantryResult;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Tenant used when no credential is configured
const PUBLIC_TENANT: &str = "public";

/// Derive the tenant identifier for an optional credential
///
/// The credential itself never appears on disk; only a truncated hash
/// does.
pub fn tenant_id(credential: Option<&str>) -> String {
    match credential {
        None => PUBLIC_TENANT.to_string(),
        Some(credential) => {
            let mut hasher = Sha256::new();
            hasher.update(credential.as_bytes());
            let digest = hasher.finalize();
            format!("cache-{}", hex::encode(&digest[..8]))
        }
    }
}

/// Registry of per-tenant cache stores
///
/// Owns every store it creates; dropping the registry releases them.
pub struct StoreRegistry {
    base_dir: PathBuf,
    config: CacheConfig,
    stores: Mutex<HashMap<String, Arc<CacheStore>>>,
}

impl StoreRegistry {
    pub fn new(base_dir: PathBuf, config: CacheConfig) -> Self {
        Self {
            base_dir,
            config,
            stores: Mutex::new(HashMap::new()),
        }
    }

    /// Get the shared store for a credential's tenant, creating it on
    /// first access
    ///
    /// Concurrent first access for the same tenant constructs exactly one
    /// store; the map lock is held across construction.
    pub fn get_or_create(&self, credential: Option<&str>) -> GantryResult<Arc<CacheStore>> {
        let tenant = tenant_id(credential);
        let mut stores = self
            .stores
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(store) = stores.get(&tenant) {
            return Ok(Arc::clone(store));
        }

        let root = self.base_dir.join(&tenant);
        debug!("Opening cache store for tenant {} at {}", tenant, root.display());
        let store = Arc::new(CacheStore::open(&root, &self.config)?);
        stores.insert(tenant, Arc::clone(&store));
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry(temp: &TempDir) -> Arc<StoreRegistry> {
        Arc::new(StoreRegistry::new(
            temp.path().to_path_buf(),
            CacheConfig::default(),
        ))
    }

    #[test]
    fn tenant_id_public_without_credential() {
        assert_eq!(tenant_id(None), "public");
    }

    #[test]
    fn tenant_id_hashes_credential() {
        let id = tenant_id(Some("secret-token"));
        assert!(id.starts_with("cache-"));
        assert_eq!(id.len(), "cache-".len() + 16);
        assert!(!id.contains("secret-token"));
    }

    #[test]
    fn tenant_id_is_deterministic() {
        assert_eq!(tenant_id(Some("tok")), tenant_id(Some("tok")));
        assert_ne!(tenant_id(Some("tok-a")), tenant_id(Some("tok-b")));
    }

    #[test]
    fn same_tenant_shares_instance() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp);

        let a = registry.get_or_create(Some("tok")).unwrap();
        let b = registry.get_or_create(Some("tok")).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn different_tenants_get_distinct_roots() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp);

        let a = registry.get_or_create(Some("tok-a")).unwrap();
        let b = registry.get_or_create(Some("tok-b")).unwrap();
        let public = registry.get_or_create(None).unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert_ne!(a.root(), b.root());
        assert!(public.root().ends_with("public"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_first_access_creates_one_instance() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp);

        let mut handles = Vec::new();
        for _ in 0..20 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                registry.get_or_create(Some("shared-token")).unwrap()
            }));
        }

        let mut stores = Vec::new();
        for handle in handles {
            stores.push(handle.await.unwrap());
        }

        let first = &stores[0];
        assert!(stores.iter().all(|s| Arc::ptr_eq(first, s)));
    }
}
