//! Persisted application settings
//!
//! Settings live in the shared store under the `settings` key. Secrets do not:
//! the bot token is kept in the credential store (see [`BOT_TOKEN_KEY`]).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::store::{Store, SETTINGS};
use crate::traits::StoreError;

/// Credential store key for the Telegram bot token
pub const BOT_TOKEN_KEY: &str = "telegram_bot_token";

const DEFAULT_STUB_DELAY_MS: u64 = 1000;
const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 25;
const DEFAULT_SETTLE_DELAY_MS: u64 = 2000;
const DEFAULT_ORDER_PREFIX: &str = "NT";

/// Signature block appended to every order message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessInfo {
    pub business_name: String,
    #[serde(default)]
    pub tagline: Option<String>,
    #[serde(default)]
    pub gstin: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub contacts: Vec<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Telegram chat that receives order messages. `None` means unconfigured.
    pub chat_id: Option<String>,
    /// With no destination configured, pretend delivery succeeded after `stub_delay_ms`
    pub stub_when_unconfigured: bool,
    pub stub_delay_ms: u64,
    pub attempt_timeout_secs: u64,
    pub settle_delay_ms: u64,
    pub order_prefix: String,
    pub business: Option<BusinessInfo>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            chat_id: None,
            stub_when_unconfigured: true,
            stub_delay_ms: DEFAULT_STUB_DELAY_MS,
            attempt_timeout_secs: DEFAULT_ATTEMPT_TIMEOUT_SECS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            order_prefix: DEFAULT_ORDER_PREFIX.to_string(),
            business: None,
        }
    }
}

impl Settings {
    /// Chat id with blank values treated as unconfigured
    pub fn destination(&self) -> Option<&str> {
        self.chat_id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    }

    pub fn stub_delay(&self) -> Duration {
        Duration::from_millis(self.stub_delay_ms)
    }

    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs.max(1))
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Read-through accessor for [`Settings`]
#[derive(Clone)]
pub struct SettingsStore {
    store: Store,
}

impl SettingsStore {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Current settings; an unreadable store yields defaults
    pub fn get(&self) -> Settings {
        self.store.read(SETTINGS)
    }

    pub fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        tracing::debug!(configured = settings.destination().is_some(), "Settings saved");
        self.store.save(SETTINGS, settings)
    }

    /// Load, modify and persist in one step
    pub fn update<F>(&self, apply: F) -> Result<Settings, StoreError>
    where
        F: FnOnce(&mut Settings),
    {
        let settings = self.store.transaction(|tx| {
            let mut settings: Settings = tx.load(SETTINGS)?;
            apply(&mut settings);
            tx.save(SETTINGS, &settings)?;
            Ok(settings)
        })?;
        tracing::debug!(configured = settings.destination().is_some(), "Settings saved");
        Ok(settings)
    }

    pub fn set_chat_id(&self, chat_id: Option<String>) -> Result<Settings, StoreError> {
        self.update(|s| s.chat_id = chat_id.filter(|id| !id.trim().is_empty()))
    }
}
