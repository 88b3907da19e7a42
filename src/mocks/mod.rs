//! Test doubles for dependency injection
//!
//! Provides in-memory implementations of all external dependencies for isolated testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;
use tokio::sync::watch;

use crate::models::{DeliveryOutcome, Order};
use crate::traits::{
    Connectivity,
    CredentialStore, CredentialError,
    KeyValueStore, StoreError, StoreTxn,
    Notifier,
};

// ============================================================================
// InMemoryStore
// ============================================================================

#[derive(Default)]
struct StoreState {
    values: HashMap<String, String>,
    writes: usize,
}

/// In-memory key-value store for testing
///
/// `transact` is atomic and counts as one write. `set_unavailable(true)` makes
/// every call fail as if the disk had gone away.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<StoreState>>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of successful write operations (a `transact` counts once)
    pub fn write_count(&self) -> usize {
        self.state.lock().unwrap().writes
    }

    /// Raw stored text (for assertions)
    pub fn raw(&self, key: &str) -> Option<String> {
        self.state.lock().unwrap().values.get(key).cloned()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store switched off".to_string()));
        }
        Ok(())
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        Ok(self.state.lock().unwrap().values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        state.values.insert(key.to_string(), value.to_string());
        state.writes += 1;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        let existed = state.values.remove(key).is_some();
        if existed {
            state.writes += 1;
        }
        Ok(existed)
    }

    fn transact(&self, body: &mut dyn FnMut(&mut dyn StoreTxn) -> Result<(), StoreError>) -> Result<(), StoreError> {
        self.check()?;
        let mut state = self.state.lock().unwrap();
        let mut txn = BufferedTxn { committed: &state.values, staged: HashMap::new() };
        body(&mut txn)?;
        let staged = txn.staged;
        if !staged.is_empty() {
            state.values.extend(staged);
            state.writes += 1;
        }
        Ok(())
    }
}

/// Staged writes over a locked snapshot; dropped on error
struct BufferedTxn<'a> {
    committed: &'a HashMap<String, String>,
    staged: HashMap<String, String>,
}

impl StoreTxn for BufferedTxn<'_> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.staged.get(key).or_else(|| self.committed.get(key)).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.staged.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// ============================================================================
// InMemoryCredentialStore
// ============================================================================

/// In-memory credential store for testing
///
/// Thread-safe storage backed by HashMap. No actual keychain interaction.
#[derive(Clone)]
pub struct InMemoryCredentialStore {
    store: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self {
            store: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create store with pre-populated entries
    pub fn with_entries(entries: Vec<(&str, &str)>) -> Self {
        let map = entries
            .into_iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Self {
            store: Arc::new(Mutex::new(map)),
        }
    }

    /// Get all stored keys (for assertions)
    pub fn keys(&self) -> Vec<String> {
        self.store.lock().unwrap().keys().cloned().collect()
    }
}

impl Default for InMemoryCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn store(&self, key: &str, value: &str) -> Result<(), CredentialError> {
        self.store.lock().unwrap().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn retrieve(&self, key: &str) -> Result<Option<String>, CredentialError> {
        Ok(self.store.lock().unwrap().get(key).cloned())
    }

    fn delete(&self, key: &str) -> Result<bool, CredentialError> {
        Ok(self.store.lock().unwrap().remove(key).is_some())
    }

    fn exists(&self, key: &str) -> Result<bool, CredentialError> {
        Ok(self.store.lock().unwrap().contains_key(key))
    }
}

// ============================================================================
// ManualConnectivity
// ============================================================================

/// Connectivity switch for testing
#[derive(Clone)]
pub struct ManualConnectivity {
    online: Arc<AtomicBool>,
}

impl ManualConnectivity {
    pub fn online() -> Self {
        Self { online: Arc::new(AtomicBool::new(true)) }
    }

    pub fn offline() -> Self {
        Self { online: Arc::new(AtomicBool::new(false)) }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

impl Connectivity for ManualConnectivity {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

// ============================================================================
// RecordedNotifier
// ============================================================================

/// Response script for the recorded notifier
#[derive(Clone)]
pub enum NotifierBehavior {
    AlwaysSucceed,
    /// Fail the first N calls, then succeed
    FailThenSucceed { fail_count: usize, reason: String },
    AlwaysFail(String),
    Custom(Arc<dyn Fn(&Order) -> DeliveryOutcome + Send + Sync>),
}

/// Recorded notifier for testing
///
/// Records every order it is asked to deliver and answers from a configurable
/// script. `hold()` parks every send until `release()` so tests can observe a
/// sweep while it is in flight.
#[derive(Clone)]
pub struct RecordedNotifier {
    sent: Arc<Mutex<Vec<Order>>>,
    behavior: Arc<Mutex<NotifierBehavior>>,
    delay: Arc<Mutex<Option<Duration>>>,
    gate: Arc<watch::Sender<bool>>,
}

impl RecordedNotifier {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            behavior: Arc::new(Mutex::new(NotifierBehavior::AlwaysSucceed)),
            delay: Arc::new(Mutex::new(None)),
            gate: Arc::new(gate),
        }
    }

    pub fn success() -> Self {
        Self::new()
    }

    pub fn always_fail(reason: &str) -> Self {
        let notifier = Self::new();
        notifier.set_behavior(NotifierBehavior::AlwaysFail(reason.to_string()));
        notifier
    }

    pub fn fail_then_succeed(fail_count: usize, reason: &str) -> Self {
        let notifier = Self::new();
        notifier.set_behavior(NotifierBehavior::FailThenSucceed { fail_count, reason: reason.to_string() });
        notifier
    }

    pub fn set_behavior(&self, behavior: NotifierBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    /// Sleep this long inside every send
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Park sends until `release()`
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    /// Orders received so far, in call order
    pub fn sent(&self) -> Vec<Order> {
        self.sent.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    fn respond(&self, order: &Order, call_number: usize) -> DeliveryOutcome {
        let behavior = self.behavior.lock().unwrap().clone();
        match behavior {
            NotifierBehavior::AlwaysSucceed => DeliveryOutcome::Delivered,
            NotifierBehavior::FailThenSucceed { fail_count, reason } => {
                if call_number <= fail_count {
                    DeliveryOutcome::failed(reason)
                } else {
                    DeliveryOutcome::Delivered
                }
            }
            NotifierBehavior::AlwaysFail(reason) => DeliveryOutcome::failed(reason),
            NotifierBehavior::Custom(func) => func(order),
        }
    }
}

impl Default for RecordedNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Notifier for RecordedNotifier {
    async fn send(&self, order: &Order) -> DeliveryOutcome {
        let call_number = {
            let mut sent = self.sent.lock().unwrap();
            sent.push(order.clone());
            sent.len()
        };

        let mut gate = self.gate.subscribe();
        let _ = gate.wait_for(|open| *open).await;

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.respond(order, call_number)
    }
}

// ============================================================================
// Tests
// ============================================================================
