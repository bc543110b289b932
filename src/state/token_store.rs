use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::files::{read_json, write_json, StateError};

/// Issued credentials, persisted in `tokens.json`.
///
/// Entries are opaque here; their shape belongs to the token-issuing code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenStore {
    #[serde(default)]
    pub access_tokens: Vec<Value>,
    #[serde(default)]
    pub refresh_tokens: Vec<Value>,
    #[serde(default)]
    pub client_tokens: Vec<Value>,
}

impl TokenStore {
    pub fn is_empty(&self) -> bool {
        self.access_tokens.is_empty()
            && self.refresh_tokens.is_empty()
            && self.client_tokens.is_empty()
    }
}

/// Where the token store lives once the service is running.
///
/// The reconciler resets it through this seam when the cache backend changes.
pub trait TokenCache: Send + Sync {
    fn put_tokens(&self, tokens: &TokenStore) -> Result<(), StateError>;
}

/// Token cache backed by the `tokens.json` state file.
#[derive(Debug, Clone)]
pub struct FileTokenCache {
    path: PathBuf,
}

impl FileTokenCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenCache for FileTokenCache {
    fn put_tokens(&self, tokens: &TokenStore) -> Result<(), StateError> {
        write_json(&self.path, tokens)?;
        debug!("Token store written to {:?}", self.path);
        Ok(())
    }
}

/// Makes sure `tokens.json` exists before any token-issuing code runs.
pub struct TokenStoreInitializer {
    path: PathBuf,
}

impl TokenStoreInitializer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Create an empty token store if none exists.
    ///
    /// A well-formed existing store is never touched. A corrupt one is
    /// replaced, since nothing could have read tokens from it anyway.
    /// Returns `true` when a new store was written.
    pub fn ensure(&self) -> Result<bool, StateError> {
        match read_json::<TokenStore>(&self.path) {
            Ok(Some(_)) => {
                debug!("Token store already present at {:?}", self.path);
                return Ok(false);
            }
            Ok(None) => {}
            Err(e) if e.is_corrupt() => {
                warn!("Token store is unreadable, recreating it: {}", e);
            }
            Err(e) => return Err(e),
        }

        write_json(&self.path, &TokenStore::default())?;
        info!("Created empty token store at {:?}", self.path);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_empty_store_shape() {
        let value = serde_json::to_value(TokenStore::default()).unwrap();
        assert_eq!(
            value,
            json!({"accessTokens": [], "refreshTokens": [], "clientTokens": []})
        );
    }

    #[test]
    fn test_ensure_creates_missing_store() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("tokens.json");
        let init = TokenStoreInitializer::new(&path);

        assert!(init.ensure().unwrap());
        let store: TokenStore = read_json(&path).unwrap().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_ensure_keeps_existing_store() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("tokens.json");
        let existing = TokenStore {
            access_tokens: vec![json!({"token": "eg1~abc"})],
            ..Default::default()
        };
        write_json(&path, &existing).unwrap();

        let init = TokenStoreInitializer::new(&path);
        assert!(!init.ensure().unwrap());
        assert_eq!(read_json::<TokenStore>(&path).unwrap(), Some(existing));
    }

    #[test]
    fn test_ensure_replaces_corrupt_store() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("tokens.json");
        std::fs::write(&path, "{\"accessTokens\": [").unwrap();

        assert!(TokenStoreInitializer::new(&path).ensure().unwrap());
        assert!(read_json::<TokenStore>(&path).unwrap().unwrap().is_empty());
    }

    #[test]
    fn test_file_token_cache_overwrites() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("tokens.json");
        let full = TokenStore {
            client_tokens: vec![json!({"token": "eg1~client"})],
            ..Default::default()
        };
        write_json(&path, &full).unwrap();

        FileTokenCache::new(&path)
            .put_tokens(&TokenStore::default())
            .unwrap();
        assert!(read_json::<TokenStore>(&path).unwrap().unwrap().is_empty());
    }
}
