//! Application state management

use std::path::Path;
use std::sync::Arc;

use crate::cart::Cart;
use crate::catalog::CatalogManager;
use crate::config::SettingsStore;
use crate::events::EventBus;
use crate::orders::OrderLifecycle;
#[cfg(not(debug_assertions))]
use crate::production::KeychainCredentialStore;
use crate::production::TelegramNotifier;
use crate::retry_scheduler::RetryScheduler;
use crate::sqlite_store::SqliteStore;
use crate::store::Store;
use crate::traits::{Connectivity, CredentialStore, Notifier};

pub const STORE_FILE: &str = "store.sqlite";

/// Application state containing all dependencies
pub struct AppState {
    pub store: Store,
    pub settings: SettingsStore,
    pub credentials: Arc<dyn CredentialStore>,
    pub catalog: Arc<CatalogManager>,
    pub cart: Arc<Cart>,
    pub orders: Arc<OrderLifecycle>,
    pub scheduler: Arc<RetryScheduler>,
    pub events: EventBus,
}

impl AppState {
    /// Create a new AppState with production implementations
    pub fn new_production(
        data_dir: &Path,
        connectivity: Arc<dyn Connectivity>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        tracing::info!(data_dir = %data_dir.display(), "Initializing AppState");
        std::fs::create_dir_all(data_dir)?;

        let db_path = data_dir.join(STORE_FILE);
        tracing::info!(path = %db_path.display(), "Opening store");
        let store = Store::new(Arc::new(SqliteStore::open(&db_path)?));
        let settings = SettingsStore::new(store.clone());

        #[cfg(debug_assertions)]
        let credentials: Arc<dyn CredentialStore> = {
            let cred_path = data_dir.join(crate::production::DEV_CREDENTIALS_FILE);
            tracing::info!(path = %cred_path.display(), "DEV MODE: file-based credential store");
            Arc::new(crate::production::DevFileCredentialStore::new(cred_path))
        };
        #[cfg(not(debug_assertions))]
        let credentials: Arc<dyn CredentialStore> = {
            tracing::info!("Keychain credential store initialized");
            Arc::new(KeychainCredentialStore::new())
        };

        let notifier = Arc::new(TelegramNotifier::new(settings, credentials.clone())?);
        tracing::info!("Telegram notifier initialized");

        let state = Self::with_components(store, notifier, connectivity, credentials);
        tracing::info!("AppState initialization complete");
        Ok(state)
    }

    /// Wire the application around the given store and collaborators
    pub fn with_components(
        store: Store,
        notifier: Arc<dyn Notifier>,
        connectivity: Arc<dyn Connectivity>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        let settings = SettingsStore::new(store.clone());
        let events = EventBus::new();
        let orders = Arc::new(OrderLifecycle::new(store.clone()));

        match orders.repair_overlaps() {
            Ok(0) => {}
            Ok(removed) => tracing::warn!(removed, "Removed duplicate order records from previous session"),
            Err(e) => tracing::warn!(error = %e, "Could not check order records for duplicates"),
        }

        let scheduler = Arc::new(RetryScheduler::new(
            orders.clone(),
            notifier,
            connectivity,
            settings.clone(),
            events.clone(),
        ));

        Self {
            catalog: Arc::new(CatalogManager::new(store.clone())),
            cart: Arc::new(Cart::new(store.clone())),
            store,
            settings,
            credentials,
            orders,
            scheduler,
            events,
        }
    }

    /// Create a new AppState with test implementations
    #[cfg(test)]
    pub fn new_test(notifier: Arc<dyn Notifier>) -> Self {
        use crate::mocks::{InMemoryCredentialStore, InMemoryStore, ManualConnectivity};

        Self::with_components(
            Store::new(Arc::new(InMemoryStore::new())),
            notifier,
            Arc::new(ManualConnectivity::online()),
            Arc::new(InMemoryCredentialStore::new()),
        )
    }
}
