use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::files::{read_json, write_json, StateError};
use super::token_store::{TokenCache, TokenStore};

/// Cache backend endpoints this deployment has used, persisted in `redis.json`.
///
/// Endpoints are only ever added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheBackendRecord {
    #[serde(default)]
    known_urls: Vec<String>,
}

impl CacheBackendRecord {
    pub fn contains(&self, endpoint: &str) -> bool {
        self.known_urls.iter().any(|url| url == endpoint)
    }

    /// Record an endpoint. Returns `false` if it was already known.
    pub fn insert(&mut self, endpoint: &str) -> bool {
        if self.contains(endpoint) {
            return false;
        }
        self.known_urls.push(endpoint.to_string());
        true
    }

    pub fn known_urls(&self) -> &[String] {
        &self.known_urls
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// First time this endpoint was seen; the token store was reset.
    NewEndpoint,
    AlreadyKnown,
}

/// Resets the token store whenever the deployment moves to a cache backend
/// it has not used before, so tokens minted elsewhere are never honoured.
pub struct CacheBackendReconciler<'a> {
    record_path: PathBuf,
    cache: &'a dyn TokenCache,
}

impl<'a> CacheBackendReconciler<'a> {
    pub fn new(record_path: impl Into<PathBuf>, cache: &'a dyn TokenCache) -> Self {
        Self {
            record_path: record_path.into(),
            cache,
        }
    }

    /// Load the record. Missing or corrupt files yield an empty record.
    pub fn load(&self) -> Result<CacheBackendRecord, StateError> {
        match read_json(&self.record_path) {
            Ok(record) => Ok(record.unwrap_or_default()),
            Err(e) if e.is_corrupt() => {
                warn!("Cache backend record is unreadable, starting fresh: {}", e);
                Ok(CacheBackendRecord::default())
            }
            Err(e) => Err(e),
        }
    }

    pub fn reconcile(&self, endpoint: &str) -> Result<Reconciliation, StateError> {
        let mut record = self.load()?;
        if !record.insert(endpoint) {
            debug!("Cache backend {} is already known, skipping.", endpoint);
            return Ok(Reconciliation::AlreadyKnown);
        }

        debug!("Cache backend {} is not known, resetting token store.", endpoint);
        // Reset before recording: if we die in between, the next start resets again.
        self.cache.put_tokens(&TokenStore::default())?;
        write_json(&self.record_path, &record)?;

        info!("Recorded new cache backend {}", endpoint);
        Ok(Reconciliation::NewEndpoint)
    }
}
