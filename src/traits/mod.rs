//! Trait definitions for dependency injection
//!
//! Everything outside the process (disk, network, keychain, the OS notion of
//! "online") sits behind one of these traits so the order pipeline can be
//! exercised with in-memory doubles.

mod connectivity;
mod credential_store;
mod kv_store;
mod notifier;

pub use connectivity::Connectivity;
pub use credential_store::{CredentialStore, CredentialError};
pub use kv_store::{KeyValueStore, StoreError, StoreTxn};
pub use notifier::{Notifier, NotifierError};

#[cfg(test)]
pub use connectivity::MockConnectivity;
#[cfg(test)]
pub use credential_store::MockCredentialStore;
