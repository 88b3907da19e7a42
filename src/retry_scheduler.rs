//! Retry scheduler for pending orders
//!
//! Decides when delivery is attempted: once right after placement, and as a
//! full sweep of the pending queue on startup, on reconnect, and on demand.
//! The scheduler has no environment-listening code of its own; triggers arrive
//! on a channel fed by whoever watches connectivity or the operator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::SettingsStore;
use crate::events::{EventBus, StorefrontEvent};
use crate::models::{DeliveryOutcome, Order};
use crate::orders::{AttemptKind, OrderLifecycle, SweepTally, Transition};
use crate::traits::{Connectivity, Notifier, NotifierError, StoreError};

/// Capacity of the trigger channel handed to [`RetryScheduler::spawn`]
pub const TRIGGER_CHANNEL_CAPACITY: usize = 16;

/// Why a sweep was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Process start; the sweep runs after the settle delay
    Startup,
    /// Connectivity went from unavailable to available
    ConnectivityRestored,
    /// Operator asked for a retry
    RetryNow,
}

/// What a sweep request ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    AlreadyRunning,
    NothingPending,
    Offline,
    Ran(SweepTally),
}

/// Clears the in-flight flag when the sweep ends, however it ends
struct SweepGuard<'a>(&'a AtomicBool);

impl<'a> SweepGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SweepGuard(flag))
    }
}

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct RetryScheduler {
    orders: Arc<OrderLifecycle>,
    notifier: Arc<dyn Notifier>,
    connectivity: Arc<dyn Connectivity>,
    settings: SettingsStore,
    events: EventBus,
    sweeping: AtomicBool,
}

impl RetryScheduler {
    pub fn new(
        orders: Arc<OrderLifecycle>,
        notifier: Arc<dyn Notifier>,
        connectivity: Arc<dyn Connectivity>,
        settings: SettingsStore,
        events: EventBus,
    ) -> Self {
        Self {
            orders,
            notifier,
            connectivity,
            settings,
            events,
            sweeping: AtomicBool::new(false),
        }
    }

    pub fn is_sweeping(&self) -> bool {
        self.sweeping.load(Ordering::Acquire)
    }

    /// The immediate attempt that follows placement. Touches only this order.
    pub async fn deliver_new(&self, order: &Order) -> Result<Transition, StoreError> {
        self.events.emit(StorefrontEvent::OrderQueued { order_id: order.order_id.clone() });

        let outcome = self.attempt(order).await;
        let transition = self
            .orders
            .record_delivery_outcome(&order.order_id, &outcome, AttemptKind::Initial)?;
        self.announce(&order.order_id, &outcome, &transition);
        Ok(transition)
    }

    /// Retry a single pending order outside of any sweep.
    /// Returns `None` when the order is not pending.
    pub async fn retry_one(&self, order_id: &str) -> Result<Option<Transition>, StoreError> {
        let Some(entry) = self.orders.find_pending(order_id) else {
            tracing::debug!(order_id = %order_id, "Retry requested for order that is not pending");
            return Ok(None);
        };

        let outcome = self.attempt(&entry.order).await;
        let transition = self.orders.record_delivery_outcome(order_id, &outcome, AttemptKind::Retry)?;
        self.announce(order_id, &outcome, &transition);
        Ok(Some(transition))
    }

    /// Attempt every pending order concurrently and apply the results in one write.
    ///
    /// Dropped without effect while another sweep is in flight, while offline,
    /// or when nothing is due. Orders queued after the snapshot are left for
    /// the next trigger, as are orders whose placement attempt has not
    /// reported back within the attempt timeout.
    pub async fn sweep(&self, trigger: Trigger) -> Result<SweepOutcome, StoreError> {
        let Some(_guard) = SweepGuard::acquire(&self.sweeping) else {
            tracing::debug!(trigger = ?trigger, "Sweep already running, request dropped");
            return Ok(SweepOutcome::AlreadyRunning);
        };

        if !self.connectivity.is_online() {
            tracing::debug!(trigger = ?trigger, "Offline, sweep skipped");
            return Ok(SweepOutcome::Offline);
        }

        let snapshot = self.orders.due_for_retry(self.settings.get().attempt_timeout());
        if snapshot.is_empty() {
            tracing::debug!(trigger = ?trigger, "No pending orders, sweep skipped");
            return Ok(SweepOutcome::NothingPending);
        }

        tracing::info!(trigger = ?trigger, pending = snapshot.len(), "Sweep started");
        self.events.emit(StorefrontEvent::SweepStarted { pending: snapshot.len() });

        let attempts = snapshot.iter().map(|entry| async move {
            (entry.order_id().to_string(), self.attempt(&entry.order).await)
        });
        let outcomes = join_all(attempts).await;

        let tally = self.orders.record_sweep(outcomes)?;
        self.events.emit(StorefrontEvent::SweepFinished {
            delivered: tally.delivered.len(),
            failed: tally.requeued.len(),
        });
        Ok(SweepOutcome::Ran(tally))
    }

    /// Startup path: if online with orders pending, wait the settle delay and sweep
    pub async fn startup(&self) -> Result<SweepOutcome, StoreError> {
        if !self.connectivity.is_online() {
            tracing::info!("Offline at startup, waiting for connectivity");
            return Ok(SweepOutcome::Offline);
        }
        if self.orders.pending().is_empty() {
            return Ok(SweepOutcome::NothingPending);
        }

        let settle = self.settings.get().settle_delay();
        tracing::info!(settle_ms = settle.as_millis() as u64, "Pending orders found at startup");
        tokio::time::sleep(settle).await;
        self.sweep(Trigger::Startup).await
    }

    /// Run until the trigger channel closes, handling each trigger on its own task
    pub fn spawn(self: Arc<Self>, mut triggers: mpsc::Receiver<Trigger>) -> JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("Retry scheduler started");
            while let Some(trigger) = triggers.recv().await {
                let scheduler = Arc::clone(&self);
                tokio::spawn(async move {
                    let result = match trigger {
                        Trigger::Startup => scheduler.startup().await,
                        other => scheduler.sweep(other).await,
                    };
                    if let Err(e) = result {
                        tracing::error!(trigger = ?trigger, error = %e, "Sweep could not record outcomes");
                    }
                });
            }
            tracing::info!("Retry scheduler stopped");
        })
    }

    /// One bounded delivery attempt
    async fn attempt(&self, order: &Order) -> DeliveryOutcome {
        let limit = self.settings.get().attempt_timeout();
        match tokio::time::timeout(limit, self.notifier.send(order)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(
                    order_id = %order.order_id,
                    timeout_secs = limit.as_secs(),
                    "Delivery attempt timed out"
                );
                DeliveryOutcome::failed(NotifierError::Timeout.to_string())
            }
        }
    }

    fn announce(&self, order_id: &str, outcome: &DeliveryOutcome, transition: &Transition) {
        let order_id = order_id.to_string();
        match (transition, outcome) {
            (Transition::Completed, _) => self.events.emit(StorefrontEvent::OrderSent { order_id }),
            (Transition::Requeued { attempt_count }, DeliveryOutcome::Failed { reason }) => {
                self.events.emit(StorefrontEvent::OrderQueuedForRetry {
                    order_id,
                    attempt_count: *attempt_count,
                    reason: reason.clone(),
                })
            }
            _ => {}
        }
    }
}

/// Channel pair for feeding triggers into a spawned scheduler
pub fn trigger_channel() -> (mpsc::Sender<Trigger>, mpsc::Receiver<Trigger>) {
    mpsc::channel(TRIGGER_CHANNEL_CAPACITY)
}
