//! Durable key-value storage trait

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// Trait for the persistent store that holds every collection the app owns.
///
/// Values are JSON documents stored as text. Production: SQLite with WAL.
/// Testing: HashMap with failure injection.
pub trait KeyValueStore: Send + Sync {
    /// Read the raw value for a key
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a single key
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a key, returning whether it existed
    fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Run a read-modify-write cycle as one unit.
    ///
    /// Reads made through the view see every write committed before the cycle
    /// began, and no other writer (in this process or another one sharing the
    /// same backing file) can commit in between. An `Err` from `body` discards
    /// the cycle's writes. The fallback passes the store straight through and
    /// is only suitable for backends with a single writer; its writes land in
    /// call order, so a move saves its destination before its source.
    fn transact(&self, body: &mut dyn FnMut(&mut dyn StoreTxn) -> Result<(), StoreError>) -> Result<(), StoreError> {
        body(&mut Passthrough(self))
    }
}

/// Reads and writes inside [`KeyValueStore::transact`]
pub trait StoreTxn {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
}

struct Passthrough<'a, S: ?Sized>(&'a S);

impl<S: KeyValueStore + ?Sized> StoreTxn for Passthrough<'_, S> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.0.get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.0.set(key, value)
    }
}
