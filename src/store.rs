//! Typed access to the shared persistent store
//!
//! Every component reads and writes through [`Store`] instead of holding its
//! own copy of a collection, so the dashboard, the order manager and the
//! storefront always observe the same state. Writers publish a [`StoreChange`]
//! that views can subscribe to.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::traits::{KeyValueStore, StoreError, StoreTxn};

pub const PENDING_ORDERS: &str = "pendingOrders";
pub const COMPLETED_ORDERS: &str = "completedOrders";
pub const PRODUCTS: &str = "products";
pub const SETTINGS: &str = "settings";
pub const CART_ITEMS: &str = "cartItems";

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Keys touched by one write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub keys: Vec<String>,
}

#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn KeyValueStore>,
    changes: broadcast::Sender<StoreChange>,
}

impl Store {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { backend, changes }
    }

    /// Load a value. Absent or malformed values read as `T::default()`;
    /// only a failing backend is an error.
    pub fn load<T>(&self, key: &str) -> Result<T, StoreError>
    where
        T: DeserializeOwned + Default,
    {
        self.load_or(key, T::default)
    }

    /// Like [`Store::load`] with an explicit fallback for absent or malformed values
    pub fn load_or<T, F>(&self, key: &str, fallback: F) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
        F: FnOnce() -> T,
    {
        Ok(decode(key, self.backend.get(key)?, fallback))
    }

    /// Infallible read for views: a failing backend is logged and defaulted
    pub fn read<T>(&self, key: &str) -> T
    where
        T: DeserializeOwned + Default,
    {
        self.load(key).unwrap_or_else(|e| {
            tracing::warn!(key = %key, error = %e, "Store read failed, using default");
            T::default()
        })
    }

    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = to_json(value)?;
        self.backend.set(key, &raw)?;
        self.publish(vec![key.to_string()]);
        Ok(())
    }

    /// Run a read-modify-write cycle against the backend as one unit.
    ///
    /// Loads inside `body` see the latest committed state and no other writer
    /// can commit until `body` returns. Returning `Err` discards its writes.
    /// `body` must not call back into this [`Store`].
    pub fn transaction<R, F>(&self, body: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut StoreTx<'_>) -> Result<R, StoreError>,
    {
        let mut body = Some(body);
        let mut output = None;
        let mut touched = Vec::new();

        self.backend.transact(&mut |txn| {
            let body = body
                .take()
                .ok_or_else(|| StoreError::DatabaseError("transaction body re-entered".to_string()))?;
            let mut tx = StoreTx { txn, touched: Vec::new() };
            output = Some(body(&mut tx)?);
            touched = tx.touched;
            Ok(())
        })?;

        if !touched.is_empty() {
            self.publish(touched);
        }
        output.ok_or_else(|| StoreError::DatabaseError("transaction body did not run".to_string()))
    }

    pub fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let existed = self.backend.delete(key)?;
        if existed {
            self.publish(vec![key.to_string()]);
        }
        Ok(existed)
    }

    /// Receive a [`StoreChange`] after every successful write
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    fn publish(&self, keys: Vec<String>) {
        // No subscribers is fine
        let _ = self.changes.send(StoreChange { keys });
    }
}

/// Typed view inside [`Store::transaction`]
pub struct StoreTx<'a> {
    txn: &'a mut dyn StoreTxn,
    touched: Vec<String>,
}

impl StoreTx<'_> {
    /// Same defaulting rules as [`Store::load`]
    pub fn load<T>(&self, key: &str) -> Result<T, StoreError>
    where
        T: DeserializeOwned + Default,
    {
        self.load_or(key, T::default)
    }

    pub fn load_or<T, F>(&self, key: &str, fallback: F) -> Result<T, StoreError>
    where
        T: DeserializeOwned,
        F: FnOnce() -> T,
    {
        Ok(decode(key, self.txn.get(key)?, fallback))
    }

    pub fn save<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<(), StoreError> {
        let raw = to_json(value)?;
        self.txn.set(key, &raw)?;
        if !self.touched.iter().any(|k| k == key) {
            self.touched.push(key.to_string());
        }
        Ok(())
    }
}

fn decode<T, F>(key: &str, raw: Option<String>, fallback: F) -> T
where
    T: DeserializeOwned,
    F: FnOnce() -> T,
{
    let Some(raw) = raw else {
        return fallback();
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        tracing::warn!(key = %key, error = %e, "Malformed stored value, using default");
        fallback()
    })
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::SerializationError(e.to_string()))
}
