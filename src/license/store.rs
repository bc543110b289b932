use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::state::{read_json, write_json, StateError};

/// On-disk shape of `loopkey.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct LicenseKeyFile {
    #[serde(default)]
    loopkey: Option<String>,
}

/// Reads and writes the persisted license key.
#[derive(Debug, Clone)]
pub struct LicenseKeyStore {
    path: PathBuf,
}

impl LicenseKeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored key, or `None` if the file is absent or holds an empty/null key.
    pub fn read(&self) -> Result<Option<String>, StateError> {
        let file: Option<LicenseKeyFile> = read_json(&self.path)?;
        Ok(file
            .and_then(|f| f.loopkey)
            .filter(|key| !key.trim().is_empty()))
    }

    pub fn write(&self, key: &str) -> Result<(), StateError> {
        write_json(
            &self.path,
            &LicenseKeyFile {
                loopkey: Some(key.to_string()),
            },
        )?;
        debug!("License key saved to {:?}", self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_read_absent() {
        let tmp = tempdir().unwrap();
        let store = LicenseKeyStore::new(tmp.path().join("loopkey.json"));
        assert_eq!(store.read().unwrap(), None);
    }

    #[test]
    fn test_write_then_read() {
        let tmp = tempdir().unwrap();
        let store = LicenseKeyStore::new(tmp.path().join("state").join("loopkey.json"));

        store.write("key-123").unwrap();
        assert_eq!(store.read().unwrap().as_deref(), Some("key-123"));

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(raw, r#"{"loopkey":"key-123"}"#);
    }

    #[test]
    fn test_empty_and_null_keys_read_as_absent() {
        let tmp = tempdir().unwrap();
        let store = LicenseKeyStore::new(tmp.path().join("loopkey.json"));

        for content in [r#"{"loopkey":""}"#, r#"{"loopkey":null}"#, "{}"] {
            std::fs::write(store.path(), content).unwrap();
            assert_eq!(store.read().unwrap(), None, "content: {}", content);
        }
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let tmp = tempdir().unwrap();
        let store = LicenseKeyStore::new(tmp.path().join("loopkey.json"));
        std::fs::write(store.path(), "{loopkey").unwrap();

        assert!(store.read().unwrap_err().is_corrupt());
    }
}
