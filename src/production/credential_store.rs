//! OS keychain credential store.
//!
//! All secrets sit in one keychain entry as a JSON map, so a process needs a
//! single keychain read at startup no matter how many secrets it uses.

use std::collections::HashMap;
use std::sync::Mutex;

use keyring::Entry;

use crate::traits::{CredentialError, CredentialStore};

const SERVICE_NAME: &str = "storefront";
const VAULT_KEY: &str = "__vault__";

pub struct KeychainCredentialStore {
    cache: Mutex<HashMap<String, String>>,
}

impl KeychainCredentialStore {
    pub fn new() -> Self {
        let mut cache = HashMap::new();

        if let Ok(entry) = Entry::new(SERVICE_NAME, VAULT_KEY) {
            match entry.get_password() {
                Ok(json) => match serde_json::from_str::<HashMap<String, String>>(&json) {
                    Ok(map) => {
                        tracing::info!(count = map.len(), "Loaded credential vault from keychain");
                        cache = map;
                    }
                    Err(e) => tracing::warn!(error = %e, "Credential vault is not valid JSON, starting empty"),
                },
                Err(keyring::Error::NoEntry) => {
                    tracing::debug!("No credential vault in keychain yet");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to load credential vault");
                }
            }
        }

        Self { cache: Mutex::new(cache) }
    }

    fn save_vault(&self) -> Result<(), CredentialError> {
        let cache = self.cache.lock().unwrap();
        let json = serde_json::to_string(&*cache).map_err(|e| CredentialError::StorageError(e.to_string()))?;

        let entry = Entry::new(SERVICE_NAME, VAULT_KEY).map_err(|e| CredentialError::StorageError(e.to_string()))?;
        entry.set_password(&json).map_err(|e| match e {
            keyring::Error::NoStorageAccess(_) => CredentialError::AccessDenied,
            other => CredentialError::StorageError(other.to_string()),
        })
    }
}

impl Default for KeychainCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeychainCredentialStore {
    fn store(&self, key: &str, value: &str) -> Result<(), CredentialError> {
        self.cache.lock().unwrap().insert(key.to_string(), value.to_string());
        self.save_vault()?;
        tracing::debug!(key = %key, "Stored credential");
        Ok(())
    }

    fn retrieve(&self, key: &str) -> Result<Option<String>, CredentialError> {
        Ok(self.cache.lock().unwrap().get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<bool, CredentialError> {
        let existed = self.cache.lock().unwrap().remove(key).is_some();
        if existed {
            self.save_vault()?;
            tracing::debug!(key = %key, "Deleted credential");
        }
        Ok(existed)
    }

    fn exists(&self, key: &str) -> Result<bool, CredentialError> {
        Ok(self.cache.lock().unwrap().contains_key(key))
    }
}
