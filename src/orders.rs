//! Order lifecycle: the pending queue and the completed ledger
//!
//! Both collections live in the shared store. An order id is in at most one of
//! them at a time. Every mutation loads and rewrites the collections inside a
//! single store transaction, so a second process sharing the database cannot
//! slip a write in between. Moves write the destination first; on a backend
//! without transactions an interrupted move can at worst leave an order in
//! both (repaired by [`OrderLifecycle::repair_overlaps`]) and never in neither.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;

use crate::config::Settings;
use crate::models::{items_total, CartItem, CustomerDetails, DeliveryOutcome, Order, OrderQueue, PendingOrder};
use crate::store::{Store, StoreTx, COMPLETED_ORDERS, PENDING_ORDERS, SETTINGS};
use crate::traits::StoreError;

/// Which attempt an outcome belongs to.
///
/// Placement counts the immediate attempt up front (`attempt_count = 1`), so a
/// failure of that attempt must not count it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptKind {
    Initial,
    Retry,
}

/// What recording an outcome did to the order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Moved from pending to the completed ledger
    Completed,
    /// Still pending after a failed attempt
    Requeued { attempt_count: u32 },
    /// Not in the pending queue (already resolved or deleted); nothing changed
    NotPending,
}

/// Outcome of applying a whole sweep's results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepTally {
    pub delivered: Vec<String>,
    pub requeued: Vec<(String, u32)>,
    /// Resolved or deleted by someone else while the sweep ran
    pub vanished: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrderStats {
    pub pending: usize,
    pub completed: usize,
    /// Pending orders that have failed at least one retry
    pub retried: usize,
}

pub struct OrderLifecycle {
    store: Store,
}

impl OrderLifecycle {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn pending(&self) -> Vec<PendingOrder> {
        self.store.read(PENDING_ORDERS)
    }

    pub fn completed(&self) -> Vec<Order> {
        self.store.read(COMPLETED_ORDERS)
    }

    pub fn find_pending(&self, order_id: &str) -> Option<PendingOrder> {
        self.pending().into_iter().find(|p| p.order_id() == order_id)
    }

    pub fn find_completed(&self, order_id: &str) -> Option<Order> {
        self.completed().into_iter().find(|o| o.order_id == order_id)
    }

    /// Pending orders a sweep should attempt: everything except orders whose
    /// placement attempt (possibly in another process) is still within `grace`.
    pub fn due_for_retry(&self, grace: Duration) -> Vec<PendingOrder> {
        let now = Utc::now();
        let grace = chrono::Duration::from_std(grace).unwrap_or(chrono::Duration::MAX);
        self.pending()
            .into_iter()
            .filter(|entry| !entry.awaiting_first_outcome(now, grace))
            .collect()
    }

    pub fn stats(&self) -> OrderStats {
        let pending = self.pending();
        OrderStats {
            retried: pending.iter().filter(|p| p.attempt_count > 1).count(),
            pending: pending.len(),
            completed: self.completed().len(),
        }
    }

    /// Create an order from cart contents and append it to the pending queue.
    ///
    /// Inputs are trusted; validation happens upstream. The order is durable
    /// when this returns `Ok`, before any delivery attempt is made.
    pub fn place(&self, items: &[CartItem], details: CustomerDetails) -> Result<Order, StoreError> {
        let settings: Settings = self.store.read(SETTINGS);

        let order = self.store.transaction(|tx| {
            let mut pending: Vec<PendingOrder> = tx.load(PENDING_ORDERS)?;
            let completed: Vec<Order> = tx.load(COMPLETED_ORDERS)?;
            let taken: HashSet<&str> = pending
                .iter()
                .map(|p| p.order_id())
                .chain(completed.iter().map(|o| o.order_id.as_str()))
                .collect();

            let now = Utc::now();
            let mut order_id = generate_order_id(&settings.order_prefix, now);
            while taken.contains(order_id.as_str()) {
                order_id = generate_order_id(&settings.order_prefix, now);
            }

            let order = Order {
                order_id,
                timestamp: now,
                name: details.name,
                mobile: details.mobile,
                gst: details.gst,
                address: details.address,
                grand_total: items_total(items),
                items: items.to_vec(),
                notes: details.notes,
            };

            pending.push(PendingOrder {
                order: order.clone(),
                attempt_count: 1,
                last_attempt: Some(now),
                last_error: None,
            });
            tx.save(PENDING_ORDERS, &pending)?;
            Ok(order)
        })?;

        tracing::info!(
            order_id = %order.order_id,
            items = order.items.len(),
            grand_total = %order.grand_total,
            "Order placed and queued"
        );
        Ok(order)
    }

    /// Apply the result of one delivery attempt.
    ///
    /// Success moves the order to the completed ledger; recording success for
    /// an order that is no longer pending is a no-op.
    pub fn record_delivery_outcome(
        &self,
        order_id: &str,
        outcome: &DeliveryOutcome,
        kind: AttemptKind,
    ) -> Result<Transition, StoreError> {
        let transition = self.store.transaction(|tx| {
            let mut pending: Vec<PendingOrder> = tx.load(PENDING_ORDERS)?;
            let Some(index) = pending.iter().position(|p| p.order_id() == order_id) else {
                return Ok(Transition::NotPending);
            };

            match outcome {
                DeliveryOutcome::Delivered => {
                    let entry = pending.remove(index);
                    write_move(tx, vec![entry.order], &pending)?;
                    Ok(Transition::Completed)
                }
                DeliveryOutcome::Failed { reason } => {
                    let entry = &mut pending[index];
                    apply_failure(entry, reason, kind, Utc::now());
                    let attempt_count = entry.attempt_count;
                    tx.save(PENDING_ORDERS, &pending)?;
                    Ok(Transition::Requeued { attempt_count })
                }
            }
        })?;

        match (&transition, outcome) {
            (Transition::NotPending, _) => {
                tracing::debug!(order_id = %order_id, "Outcome for order no longer pending, ignored");
            }
            (Transition::Completed, _) => {
                tracing::info!(order_id = %order_id, "Delivery confirmed");
            }
            (Transition::Requeued { attempt_count }, DeliveryOutcome::Failed { reason }) => {
                tracing::warn!(order_id = %order_id, attempt = attempt_count, reason = %reason, "Delivery failed, order stays pending");
            }
            (Transition::Requeued { .. }, DeliveryOutcome::Delivered) => {}
        }
        Ok(transition)
    }

    /// Apply every outcome of a sweep in one combined write.
    ///
    /// Only the listed orders are touched; orders queued while the sweep was
    /// running keep their state.
    pub fn record_sweep(&self, outcomes: Vec<(String, DeliveryOutcome)>) -> Result<SweepTally, StoreError> {
        let now = Utc::now();

        let tally = self.store.transaction(|tx| {
            let mut pending: Vec<PendingOrder> = tx.load(PENDING_ORDERS)?;
            let mut by_id: HashMap<&str, &DeliveryOutcome> =
                outcomes.iter().map(|(id, outcome)| (id.as_str(), outcome)).collect();
            let mut tally = SweepTally::default();
            let mut moved = Vec::new();

            pending.retain_mut(|entry| {
                let Some(outcome) = by_id.remove(entry.order_id()) else {
                    return true;
                };
                match outcome {
                    DeliveryOutcome::Delivered => {
                        tally.delivered.push(entry.order_id().to_string());
                        moved.push(entry.order.clone());
                        false
                    }
                    DeliveryOutcome::Failed { reason } => {
                        apply_failure(entry, reason, AttemptKind::Retry, now);
                        tally.requeued.push((entry.order_id().to_string(), entry.attempt_count));
                        true
                    }
                }
            });
            tally.vanished = by_id.into_keys().map(str::to_string).collect();

            if !moved.is_empty() {
                write_move(tx, moved, &pending)?;
            } else if !tally.requeued.is_empty() {
                tx.save(PENDING_ORDERS, &pending)?;
            }
            Ok(tally)
        })?;

        tracing::info!(
            delivered = tally.delivered.len(),
            failed = tally.requeued.len(),
            vanished = tally.vanished.len(),
            "Sweep outcomes recorded"
        );
        Ok(tally)
    }

    /// Operator attests the order was fulfilled outside the app.
    /// Returns false if the order was not pending.
    pub fn manual_resolve(&self, order_id: &str) -> Result<bool, StoreError> {
        let resolved = self.store.transaction(|tx| {
            let mut pending: Vec<PendingOrder> = tx.load(PENDING_ORDERS)?;
            let Some(index) = pending.iter().position(|p| p.order_id() == order_id) else {
                return Ok(false);
            };
            let entry = pending.remove(index);
            write_move(tx, vec![entry.order], &pending)?;
            Ok(true)
        })?;

        if resolved {
            tracing::info!(order_id = %order_id, "Order manually marked as sent");
        }
        Ok(resolved)
    }

    /// Permanently delete a record. Returns false if the id was not in that queue.
    pub fn discard(&self, order_id: &str, queue: OrderQueue) -> Result<bool, StoreError> {
        let removed = self.store.transaction(|tx| match queue {
            OrderQueue::Pending => {
                let mut pending: Vec<PendingOrder> = tx.load(PENDING_ORDERS)?;
                let before = pending.len();
                pending.retain(|p| p.order_id() != order_id);
                let removed = pending.len() != before;
                if removed {
                    tx.save(PENDING_ORDERS, &pending)?;
                }
                Ok(removed)
            }
            OrderQueue::Completed => {
                let mut completed: Vec<Order> = tx.load(COMPLETED_ORDERS)?;
                let before = completed.len();
                completed.retain(|o| o.order_id != order_id);
                let removed = completed.len() != before;
                if removed {
                    tx.save(COMPLETED_ORDERS, &completed)?;
                }
                Ok(removed)
            }
        })?;

        if removed {
            tracing::info!(order_id = %order_id, queue = ?queue, "Order record deleted");
        }
        Ok(removed)
    }

    /// Drop pending entries whose id already reached the completed ledger, and
    /// collapse duplicate ids within each collection. Returns how many entries
    /// were removed.
    pub fn repair_overlaps(&self) -> Result<usize, StoreError> {
        let removed = self.store.transaction(|tx| {
            let mut pending: Vec<PendingOrder> = tx.load(PENDING_ORDERS)?;
            let mut completed: Vec<Order> = tx.load(COMPLETED_ORDERS)?;
            let before = pending.len() + completed.len();

            let mut seen = HashSet::new();
            completed.retain(|o| seen.insert(o.order_id.clone()));
            pending.retain(|p| seen.insert(p.order_id().to_string()));

            let removed = before - pending.len() - completed.len();
            if removed > 0 {
                tx.save(COMPLETED_ORDERS, &completed)?;
                tx.save(PENDING_ORDERS, &pending)?;
            }
            Ok(removed)
        })?;

        if removed > 0 {
            tracing::warn!(removed, "Repaired overlapping order records");
        }
        Ok(removed)
    }
}

/// Append to the ledger and rewrite the pending queue, destination first
fn write_move(tx: &mut StoreTx<'_>, orders: Vec<Order>, pending: &[PendingOrder]) -> Result<(), StoreError> {
    let mut completed: Vec<Order> = tx.load(COMPLETED_ORDERS)?;
    for order in orders {
        if completed.iter().any(|o| o.order_id == order.order_id) {
            tracing::warn!(order_id = %order.order_id, "Order already in completed ledger");
            continue;
        }
        completed.push(order);
    }
    tx.save(COMPLETED_ORDERS, &completed)?;
    tx.save(PENDING_ORDERS, pending)
}

fn apply_failure(entry: &mut PendingOrder, reason: &str, kind: AttemptKind, at: DateTime<Utc>) {
    if kind == AttemptKind::Retry {
        entry.attempt_count += 1;
    }
    entry.last_attempt = Some(at);
    entry.last_error = Some(reason.to_string());
}

/// `PREFIX-YYYYMMDD-HHMMSS-xxxxxx`, the tail being random hex
fn generate_order_id(prefix: &str, now: DateTime<Utc>) -> String {
    let local = now.with_timezone(&Local);
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}", prefix, local.format("%Y%m%d-%H%M%S"), &random[..6])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use rust_decimal::Decimal;
    use crate::catalog::default_catalog;
    use crate::mocks::InMemoryStore;

    fn lifecycle() -> (Arc<InMemoryStore>, OrderLifecycle) {
        let backend = Arc::new(InMemoryStore::new());
        (backend.clone(), OrderLifecycle::new(Store::new(backend)))
    }

    fn cart(lines: &[(&str, u32)]) -> Vec<CartItem> {
        let catalog = default_catalog();
        lines
            .iter()
            .map(|(id, qty)| CartItem::new(catalog.iter().find(|p| p.id == *id).unwrap().clone(), *qty))
            .collect()
    }

    fn customer() -> CustomerDetails {
        CustomerDetails {
            name: "Asha".to_string(),
            mobile: "9876543210".to_string(),
            ..CustomerDetails::default()
        }
    }

    fn failed(reason: &str) -> DeliveryOutcome {
        DeliveryOutcome::failed(reason)
    }

    #[test]
    fn test_place_queues_exactly_one_pending_entry() {
        let (_, orders) = lifecycle();

        let order = orders.place(&cart(&[("ST001", 2), ("GL001", 1)]), customer()).unwrap();

        let pending = orders.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempt_count, 1);
        assert!(pending[0].last_attempt.is_some());
        assert_eq!(pending[0].order, order);
        assert_eq!(order.grand_total, Decimal::from(400));
        assert!(order.order_id.starts_with("NT-"));
        assert!(orders.completed().is_empty());
    }

    #[test]
    fn test_grand_total_is_frozen_at_placement() {
        let (_, orders) = lifecycle();
        let mut items = cart(&[("CK001", 1)]);
        let order = orders.place(&items, customer()).unwrap();

        items[0].product.rate = Decimal::from(9999);

        assert_eq!(orders.find_pending(&order.order_id).unwrap().order.grand_total, Decimal::from(1250));
    }

    #[test]
    fn test_order_ids_are_unique() {
        let (_, orders) = lifecycle();
        let mut ids = HashSet::new();
        for _ in 0..50 {
            let order = orders.place(&cart(&[("ST003", 1)]), customer()).unwrap();
            assert!(ids.insert(order.order_id));
        }
    }

    #[test]
    fn test_order_id_uses_configured_prefix() {
        let (backend, orders) = lifecycle();
        Store::new(backend).save(SETTINGS, &Settings { order_prefix: "SHOP".to_string(), ..Settings::default() }).unwrap();

        let order = orders.place(&cart(&[("ST003", 1)]), customer()).unwrap();
        assert!(order.order_id.starts_with("SHOP-"));
        assert_eq!(order.order_id.len(), "SHOP-20261019-142305-abcdef".len());
    }

    #[test]
    fn test_place_fails_when_store_unavailable() {
        let (backend, orders) = lifecycle();
        backend.set_unavailable(true);

        assert!(orders.place(&cart(&[("ST001", 1)]), customer()).is_err());

        backend.set_unavailable(false);
        assert!(orders.pending().is_empty());
    }

    #[test]
    fn test_success_moves_to_completed_and_is_idempotent() {
        let (_, orders) = lifecycle();
        let order = orders.place(&cart(&[("ST001", 1)]), customer()).unwrap();

        let first = orders.record_delivery_outcome(&order.order_id, &DeliveryOutcome::Delivered, AttemptKind::Initial).unwrap();
        let second = orders.record_delivery_outcome(&order.order_id, &DeliveryOutcome::Delivered, AttemptKind::Retry).unwrap();

        assert_eq!(first, Transition::Completed);
        assert_eq!(second, Transition::NotPending);
        assert!(orders.pending().is_empty());
        assert_eq!(orders.completed(), vec![order]);
    }

    #[test]
    fn test_initial_failure_keeps_attempt_count() {
        let (_, orders) = lifecycle();
        let order = orders.place(&cart(&[("ST001", 1)]), customer()).unwrap();

        let transition = orders.record_delivery_outcome(&order.order_id, &failed("offline"), AttemptKind::Initial).unwrap();

        assert_eq!(transition, Transition::Requeued { attempt_count: 1 });
        let pending = orders.find_pending(&order.order_id).unwrap();
        assert_eq!(pending.attempt_count, 1);
        assert_eq!(pending.last_error.as_deref(), Some("offline"));
    }

    #[test]
    fn test_retry_failure_increments_attempt_count() {
        let (_, orders) = lifecycle();
        let order = orders.place(&cart(&[("ST001", 1)]), customer()).unwrap();
        let placed_at = orders.find_pending(&order.order_id).unwrap().last_attempt;

        orders.record_delivery_outcome(&order.order_id, &failed("timeout"), AttemptKind::Retry).unwrap();
        let transition = orders.record_delivery_outcome(&order.order_id, &failed("timeout"), AttemptKind::Retry).unwrap();

        assert_eq!(transition, Transition::Requeued { attempt_count: 3 });
        let pending = orders.find_pending(&order.order_id).unwrap();
        assert!(pending.last_attempt >= placed_at);
        assert!(orders.completed().is_empty());
    }

    #[test]
    fn test_failure_for_unknown_order_is_noop() {
        let (_, orders) = lifecycle();
        let transition = orders.record_delivery_outcome("NT-missing", &failed("x"), AttemptKind::Retry).unwrap();
        assert_eq!(transition, Transition::NotPending);
    }

    #[test]
    fn test_record_sweep_partitions_in_one_write() {
        let (backend, orders) = lifecycle();
        let a = orders.place(&cart(&[("ST001", 1)]), customer()).unwrap();
        let b = orders.place(&cart(&[("ST002", 1)]), customer()).unwrap();
        let c = orders.place(&cart(&[("ST003", 1)]), customer()).unwrap();
        let writes_before = backend.write_count();

        let tally = orders.record_sweep(vec![
            (a.order_id.clone(), DeliveryOutcome::Delivered),
            (b.order_id.clone(), failed("502")),
        ]).unwrap();

        assert_eq!(backend.write_count(), writes_before + 1);
        assert_eq!(tally.delivered, vec![a.order_id.clone()]);
        assert_eq!(tally.requeued, vec![(b.order_id.clone(), 2)]);
        assert!(tally.vanished.is_empty());

        let pending_ids: Vec<String> = orders.pending().iter().map(|p| p.order_id().to_string()).collect();
        assert_eq!(pending_ids, vec![b.order_id.clone(), c.order_id.clone()]);
        assert_eq!(orders.find_pending(&c.order_id).unwrap().attempt_count, 1);
        assert_eq!(orders.completed(), vec![a]);
    }

    #[test]
    fn test_record_sweep_skips_orders_removed_meanwhile() {
        let (_, orders) = lifecycle();
        let a = orders.place(&cart(&[("ST001", 1)]), customer()).unwrap();
        orders.discard(&a.order_id, OrderQueue::Pending).unwrap();

        let tally = orders.record_sweep(vec![(a.order_id.clone(), DeliveryOutcome::Delivered)]).unwrap();

        assert_eq!(tally.vanished, vec![a.order_id]);
        assert!(orders.completed().is_empty());
    }

    #[test]
    fn test_manual_resolve() {
        let (_, orders) = lifecycle();
        let order = orders.place(&cart(&[("CR002", 4)]), customer()).unwrap();

        assert!(orders.manual_resolve(&order.order_id).unwrap());
        assert!(!orders.manual_resolve(&order.order_id).unwrap());

        assert!(orders.pending().is_empty());
        assert_eq!(orders.completed(), vec![order]);
    }

    #[test]
    fn test_discard_from_either_queue() {
        let (_, orders) = lifecycle();
        let sent = orders.place(&cart(&[("ST001", 1)]), customer()).unwrap();
        let queued = orders.place(&cart(&[("ST002", 1)]), customer()).unwrap();
        orders.manual_resolve(&sent.order_id).unwrap();

        assert!(orders.discard(&sent.order_id, OrderQueue::Completed).unwrap());
        assert!(!orders.discard(&sent.order_id, OrderQueue::Completed).unwrap());
        assert!(!orders.discard(&queued.order_id, OrderQueue::Completed).unwrap());

        assert!(orders.completed().is_empty());
        assert_eq!(orders.pending().len(), 1);

        assert!(orders.discard(&queued.order_id, OrderQueue::Pending).unwrap());
        assert!(orders.pending().is_empty());
    }

    #[test]
    fn test_move_never_duplicates_in_ledger() {
        let (backend, orders) = lifecycle();
        let order = orders.place(&cart(&[("ST001", 1)]), customer()).unwrap();
        // Simulate an interrupted per-key move: ledger written, pending not yet
        Store::new(backend).save(COMPLETED_ORDERS, &vec![order.clone()]).unwrap();

        orders.manual_resolve(&order.order_id).unwrap();

        assert_eq!(orders.completed().len(), 1);
        assert!(orders.pending().is_empty());
    }

    #[test]
    fn test_repair_overlaps() {
        let (backend, orders) = lifecycle();
        let a = orders.place(&cart(&[("ST001", 1)]), customer()).unwrap();
        let b = orders.place(&cart(&[("ST002", 1)]), customer()).unwrap();
        Store::new(backend).save(COMPLETED_ORDERS, &vec![a.clone(), a.clone()]).unwrap();

        assert_eq!(orders.repair_overlaps().unwrap(), 2);
        assert_eq!(orders.repair_overlaps().unwrap(), 0);

        assert_eq!(orders.completed(), vec![a]);
        assert_eq!(orders.pending().len(), 1);
        assert_eq!(orders.pending()[0].order, b);
    }

    #[test]
    fn test_due_for_retry_skips_unreported_placement_attempts() {
        let (_, orders) = lifecycle();
        let reported = orders.place(&cart(&[("ST001", 1)]), customer()).unwrap();
        let in_flight = orders.place(&cart(&[("ST002", 1)]), customer()).unwrap();
        orders.record_delivery_outcome(&reported.order_id, &failed("offline"), AttemptKind::Initial).unwrap();

        let due: Vec<String> = orders
            .due_for_retry(Duration::from_secs(25))
            .iter()
            .map(|p| p.order_id().to_string())
            .collect();
        assert_eq!(due, vec![reported.order_id.clone()]);

        // Once the grace period has passed the entry is picked up regardless
        assert_eq!(orders.due_for_retry(Duration::ZERO).len(), 2);
        assert!(orders.find_pending(&in_flight.order_id).is_some());
    }

    #[test]
    fn test_concurrent_writers_on_one_database_lose_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.sqlite");
        let open = || OrderLifecycle::new(Store::new(Arc::new(crate::SqliteStore::open(&path).unwrap())));
        let daemon = open();
        let checkout = open();

        let swept = daemon.place(&cart(&[("ST001", 1)]), customer()).unwrap();
        let placed = std::thread::scope(|scope| {
            let sweeper = scope.spawn(|| {
                for _ in 0..20 {
                    daemon.record_sweep(vec![(swept.order_id.clone(), failed("offline"))]).unwrap();
                }
                daemon.record_sweep(vec![(swept.order_id.clone(), DeliveryOutcome::Delivered)]).unwrap();
            });
            let placed: Vec<Order> = (0..20)
                .map(|_| checkout.place(&cart(&[("GL001", 1)]), customer()).unwrap())
                .collect();
            sweeper.join().unwrap();
            placed
        });

        let pending: Vec<String> = daemon.pending().iter().map(|p| p.order_id().to_string()).collect();
        for order in &placed {
            assert!(pending.contains(&order.order_id), "{} lost", order.order_id);
        }
        assert_eq!(pending.len(), placed.len());
        assert_eq!(daemon.completed(), vec![swept]);
    }

    #[test]
    fn test_stats() {
        let (_, orders) = lifecycle();
        let a = orders.place(&cart(&[("ST001", 1)]), customer()).unwrap();
        let b = orders.place(&cart(&[("ST002", 1)]), customer()).unwrap();
        orders.record_delivery_outcome(&a.order_id, &failed("x"), AttemptKind::Retry).unwrap();
        orders.manual_resolve(&b.order_id).unwrap();

        assert_eq!(orders.stats(), OrderStats { pending: 1, completed: 1, retried: 1 });
    }
}
