//! Persisted bootstrap state.
//!
//! All files live in one service state directory:
//! - `loopkey.json` - license key (see `crate::license`)
//! - `redis.json` - cache backend endpoints seen so far
//! - `tokens.json` - issued access/refresh/client tokens
//!
//! Files are rewritten whole through a temp file and a rename. A file that is
//! empty or not valid JSON (for example after the process was killed
//! mid-write on an older version) is treated as absent.

mod cache_record;
mod files;
mod token_store;

pub use cache_record::{CacheBackendReconciler, CacheBackendRecord, Reconciliation};
pub use files::{read_json, write_json, StateError};
pub use token_store::{FileTokenCache, TokenCache, TokenStore, TokenStoreInitializer};

use std::path::{Path, PathBuf};

use tracing::debug;

/// Default state directory, relative to the working directory.
pub const DEFAULT_STATE_DIR: &str = "state";

const LICENSE_KEY_FILE: &str = "loopkey.json";
const CACHE_RECORD_FILE: &str = "redis.json";
const TOKEN_STORE_FILE: &str = "tokens.json";

/// The service state directory and the well-known files inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateDir {
    root: PathBuf,
}

impl StateDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Create the directory if it does not exist yet.
    ///
    /// Returns `true` when the directory was created by this call.
    pub fn ensure(&self) -> Result<bool, StateError> {
        if self.root.is_dir() {
            return Ok(false);
        }
        std::fs::create_dir_all(&self.root)
            .map_err(|source| StateError::io("create", &self.root, source))?;
        debug!("Created state directory {:?}", self.root);
        Ok(true)
    }

    pub fn license_key_path(&self) -> PathBuf {
        self.root.join(LICENSE_KEY_FILE)
    }

    pub fn cache_record_path(&self) -> PathBuf {
        self.root.join(CACHE_RECORD_FILE)
    }

    pub fn token_store_path(&self) -> PathBuf {
        self.root.join(TOKEN_STORE_FILE)
    }
}
