//! Local activation token slot.
//!
//! A single key-value slot persisted as JSON under the platform config
//! directory. Clearing the slot revokes local Pro status immediately, with
//! no server round-trip.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LicenseResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredActivation {
    activation_token: String,
}

/// File-backed token slot.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    /// Store at an explicit path (tests, portable installs).
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the platform default location.
    pub fn default_location() -> Self {
        let base = dirs::config_dir().unwrap_or_else(std::env::temp_dir);
        Self {
            path: base.join("smartclip").join("activation.json"),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Persist the activation token, replacing any previous one.
    pub fn save(&self, token: &str) -> LicenseResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_vec_pretty(&StoredActivation {
            activation_token: token.to_string(),
        })?;
        fs::write(&self.path, body)?;
        debug!(path = %self.path.display(), "activation token stored");
        Ok(())
    }

    /// The stored token, if any. A malformed slot reads as empty.
    pub fn load(&self) -> Option<String> {
        let bytes = fs::read(&self.path).ok()?;
        let stored: StoredActivation = serde_json::from_slice(&bytes).ok()?;
        if stored.activation_token.is_empty() {
            return None;
        }
        Some(stored.activation_token)
    }

    /// Drop the stored token. Missing slot is a no-op.
    pub fn clear(&self) -> LicenseResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "activation token cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::at(dir.path().join("activation.json"));

        assert!(store.load().is_none());
        store.save("tok_abc").unwrap();
        assert_eq!(store.load().as_deref(), Some("tok_abc"));

        store.save("tok_new").unwrap();
        assert_eq!(store.load().as_deref(), Some("tok_new"));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = TokenStore::at(dir.path().join("activation.json"));

        store.clear().unwrap();
        store.save("tok").unwrap();
        store.clear().unwrap();
        assert!(store.load().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn test_malformed_slot_reads_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("activation.json");
        fs::write(&path, b"not json").unwrap();
        assert!(TokenStore::at(path).load().is_none());
    }
}
