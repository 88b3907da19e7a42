//! File-based credential store for development builds
//!
//! Keeps secrets in a plain JSON file next to the data directory so debug
//! builds never touch the OS keychain.
//!
//! WARNING: Not secure. Only used when `debug_assertions` is enabled.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::traits::{CredentialError, CredentialStore};

pub const DEV_CREDENTIALS_FILE: &str = "credentials.dev.json";

pub struct DevFileCredentialStore {
    path: PathBuf,
    cache: Mutex<HashMap<String, String>>,
}

impl DevFileCredentialStore {
    pub fn new(path: PathBuf) -> Self {
        let cache = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable dev credentials");
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };
        Self { path, cache: Mutex::new(cache) }
    }

    fn flush(&self) -> Result<(), CredentialError> {
        let cache = self.cache.lock().unwrap();
        let content = serde_json::to_string_pretty(&*cache).map_err(|e| CredentialError::StorageError(e.to_string()))?;
        std::fs::write(&self.path, content).map_err(|e| CredentialError::StorageError(e.to_string()))
    }
}

impl CredentialStore for DevFileCredentialStore {
    fn store(&self, key: &str, value: &str) -> Result<(), CredentialError> {
        self.cache.lock().unwrap().insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn retrieve(&self, key: &str) -> Result<Option<String>, CredentialError> {
        Ok(self.cache.lock().unwrap().get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<bool, CredentialError> {
        let removed = self.cache.lock().unwrap().remove(key).is_some();
        if removed {
            self.flush()?;
        }
        Ok(removed)
    }

    fn exists(&self, key: &str) -> Result<bool, CredentialError> {
        Ok(self.cache.lock().unwrap().contains_key(key))
    }
}
