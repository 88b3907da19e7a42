//! Operator and storefront intents
//!
//! Each command validates its input, calls into the owning component, and
//! reports failures as [`StorefrontError`]. Delivery problems are not errors
//! here; they show up as queue state and events.

use std::path::{Path, PathBuf};

use rust_decimal::Decimal;
use serde::Serialize;

use crate::catalog::ALL_CATEGORIES;
use crate::config::{Settings, BOT_TOKEN_KEY};
use crate::error::StorefrontError;
use crate::events::StorefrontEvent;
use crate::export;
use crate::models::{CartItem, CustomerDetails, Order, OrderQueue, PendingOrder, Product};
use crate::orders::Transition;
use crate::retry_scheduler::{SweepOutcome, Trigger};
use crate::state::AppState;
use crate::validation::{normalize_customer, validate_cart, validate_customer, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub products: usize,
    pub pending: usize,
    pub completed: usize,
    pub retried: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartSummary {
    pub items: Vec<CartItem>,
    pub total_items: u64,
    pub total: Decimal,
}

/// What the customer is told after checkout
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderReceipt {
    pub order: Order,
    /// False when the order is waiting in the pending queue
    pub delivered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettingsView {
    pub chat_id: Option<String>,
    pub bot_token_configured: bool,
    pub stub_when_unconfigured: bool,
    pub stub_delay_ms: u64,
    pub attempt_timeout_secs: u64,
    pub order_prefix: String,
}

// ============================================================================
// Dashboard
// ============================================================================

pub fn get_dashboard(state: &AppState) -> DashboardStats {
    let stats = state.orders.stats();
    DashboardStats {
        products: state.catalog.list().len(),
        pending: stats.pending,
        completed: stats.completed,
        retried: stats.retried,
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// Products matching an optional search term and category
pub fn list_products(state: &AppState, search: Option<&str>, category: Option<&str>) -> Vec<Product> {
    state
        .catalog
        .search(search.unwrap_or(""), category.unwrap_or(ALL_CATEGORIES))
}

pub fn list_categories(state: &AppState) -> Vec<String> {
    state.catalog.categories()
}

pub fn add_product(state: &AppState, product: Product) -> Result<(), StorefrontError> {
    Ok(state.catalog.add(product)?)
}

pub fn update_product(state: &AppState, product: Product) -> Result<bool, StorefrontError> {
    Ok(state.catalog.update(product)?)
}

pub fn delete_product(state: &AppState, product_id: &str) -> Result<bool, StorefrontError> {
    Ok(state.catalog.delete(product_id)?)
}

// ============================================================================
// Cart
// ============================================================================

pub fn get_cart(state: &AppState) -> CartSummary {
    let items = state.cart.items();
    CartSummary {
        total_items: crate::models::total_units(&items),
        total: crate::models::items_total(&items),
        items,
    }
}

pub fn add_to_cart(state: &AppState, product_id: &str, qty: u32) -> Result<CartSummary, StorefrontError> {
    let product = state
        .catalog
        .get(product_id)
        .ok_or_else(|| ValidationError::UnknownProduct(product_id.to_string()))?;
    state.cart.add(product, qty)?;
    Ok(get_cart(state))
}

pub fn update_cart_quantity(state: &AppState, product_id: &str, qty: u32) -> Result<CartSummary, StorefrontError> {
    state.cart.update_quantity(product_id, qty)?;
    Ok(get_cart(state))
}

pub fn remove_from_cart(state: &AppState, product_id: &str) -> Result<CartSummary, StorefrontError> {
    state.cart.remove(product_id)?;
    Ok(get_cart(state))
}

pub fn clear_cart(state: &AppState) -> Result<(), StorefrontError> {
    Ok(state.cart.clear()?)
}

// ============================================================================
// Orders
// ============================================================================

/// Checkout: persist the cart as a pending order, clear the cart, then make
/// the immediate delivery attempt.
pub async fn place_order(state: &AppState, details: CustomerDetails) -> Result<OrderReceipt, StorefrontError> {
    let details = normalize_customer(details);
    validate_customer(&details)?;
    let items = state.cart.items();
    validate_cart(&items)?;

    let order = state.orders.place(&items, details)?;
    if let Err(e) = state.cart.clear() {
        tracing::warn!(order_id = %order.order_id, error = %e, "Order saved but cart could not be cleared");
    }

    let delivered = match state.scheduler.deliver_new(&order).await {
        Ok(transition) => transition == Transition::Completed,
        Err(e) => {
            tracing::error!(order_id = %order.order_id, error = %e, "Could not record delivery outcome");
            false
        }
    };
    Ok(OrderReceipt { order, delivered })
}

pub fn list_pending_orders(state: &AppState) -> Vec<PendingOrder> {
    state.orders.pending()
}

pub fn list_completed_orders(state: &AppState) -> Vec<Order> {
    state.orders.completed()
}

/// Sweep every pending order now
pub async fn retry_now(state: &AppState) -> Result<SweepOutcome, StorefrontError> {
    Ok(state.scheduler.sweep(Trigger::RetryNow).await?)
}

/// Retry one pending order through the direct path
pub async fn retry_order(state: &AppState, order_id: &str) -> Result<Transition, StorefrontError> {
    state
        .scheduler
        .retry_one(order_id)
        .await?
        .ok_or_else(|| StorefrontError::OrderNotFound(order_id.to_string()))
}

/// Operator attests the order was fulfilled without delivery
pub fn mark_complete(state: &AppState, order_id: &str, confirmed: bool) -> Result<(), StorefrontError> {
    if !confirmed {
        return Err(StorefrontError::ConfirmationRequired(format!(
            "mark order {} as sent without delivering it",
            order_id
        )));
    }
    if !state.orders.manual_resolve(order_id)? {
        return Err(StorefrontError::OrderNotFound(order_id.to_string()));
    }
    state
        .events
        .emit(StorefrontEvent::OrderResolvedManually { order_id: order_id.to_string() });
    Ok(())
}

/// Permanently delete an order record. Unknown ids are a no-op returning false.
pub fn delete_order(
    state: &AppState,
    order_id: &str,
    queue: OrderQueue,
    confirmed: bool,
) -> Result<bool, StorefrontError> {
    if !confirmed {
        return Err(StorefrontError::ConfirmationRequired(format!(
            "permanently delete order {}",
            order_id
        )));
    }
    Ok(state.orders.discard(order_id, queue)?)
}

/// Write `orders_YYYY-MM-DD.csv` into `dir`. Returns the file path and row count.
pub fn export_orders(state: &AppState, dir: &Path) -> Result<(PathBuf, usize), StorefrontError> {
    let path = dir.join(export::export_filename(chrono::Local::now().date_naive()));
    let file = std::fs::File::create(&path)
        .map_err(|e| StorefrontError::Export(format!("{}: {}", path.display(), e)))?;
    let rows = export::write_orders(file, &state.orders.completed(), &state.orders.pending())?;
    Ok((path, rows))
}

// ============================================================================
// Settings
// ============================================================================

pub fn get_settings(state: &AppState) -> Result<SettingsView, StorefrontError> {
    let settings: Settings = state.settings.get();
    Ok(SettingsView {
        chat_id: settings.destination().map(str::to_string),
        bot_token_configured: state.credentials.exists(BOT_TOKEN_KEY)?,
        stub_when_unconfigured: settings.stub_when_unconfigured,
        stub_delay_ms: settings.stub_delay_ms,
        attempt_timeout_secs: settings.attempt_timeout_secs,
        order_prefix: settings.order_prefix,
    })
}

/// Set or clear the Telegram chat id
pub fn set_chat_id(state: &AppState, chat_id: Option<String>) -> Result<(), StorefrontError> {
    let settings = state.settings.set_chat_id(chat_id)?;
    tracing::info!(configured = settings.destination().is_some(), "Telegram chat id updated");
    Ok(())
}

/// Set or clear the Telegram bot token
pub fn set_bot_token(state: &AppState, token: Option<String>) -> Result<(), StorefrontError> {
    match token.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
        Some(token) => {
            state.credentials.store(BOT_TOKEN_KEY, &token)?;
            tracing::info!("Telegram bot token stored");
        }
        None => {
            state.credentials.delete(BOT_TOKEN_KEY)?;
            tracing::info!("Telegram bot token cleared");
        }
    }
    Ok(())
}

/// Whether an unconfigured notifier simulates success
pub fn set_stub_mode(state: &AppState, enabled: bool) -> Result<(), StorefrontError> {
    state.settings.update(|s| s.stub_when_unconfigured = enabled)?;
    tracing::info!(enabled, "Stub delivery mode updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::mocks::RecordedNotifier;

    fn customer() -> CustomerDetails {
        CustomerDetails {
            name: "  Asha ".to_string(),
            mobile: "9876543210".to_string(),
            gst: Some("   ".to_string()),
            ..CustomerDetails::default()
        }
    }

    #[tokio::test]
    async fn test_place_order_clears_cart_and_delivers() {
        let state = AppState::new_test(Arc::new(RecordedNotifier::success()));
        add_to_cart(&state, "CK002", 1).unwrap();

        let receipt = place_order(&state, customer()).await.unwrap();

        assert!(receipt.delivered);
        assert_eq!(receipt.order.name, "Asha");
        assert_eq!(receipt.order.gst, None);
        assert_eq!(receipt.order.grand_total, Decimal::from(600));
        assert!(get_cart(&state).items.is_empty());
        assert_eq!(get_dashboard(&state).completed, 1);
    }

    #[tokio::test]
    async fn test_invalid_checkout_changes_nothing() {
        let state = AppState::new_test(Arc::new(RecordedNotifier::success()));
        add_to_cart(&state, "CK002", 1).unwrap();

        let bad_mobile = CustomerDetails { mobile: "12345".to_string(), ..customer() };
        let err = place_order(&state, bad_mobile).await.unwrap_err();

        assert!(matches!(err, StorefrontError::Validation(ValidationError::InvalidMobile)));
        assert_eq!(get_cart(&state).total_items, 1);
        assert_eq!(get_dashboard(&state).pending, 0);
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected() {
        let state = AppState::new_test(Arc::new(RecordedNotifier::success()));
        let err = place_order(&state, customer()).await.unwrap_err();
        assert!(matches!(err, StorefrontError::Validation(ValidationError::EmptyCart)));
    }

    #[test]
    fn test_unknown_product_cannot_enter_cart() {
        let state = AppState::new_test(Arc::new(RecordedNotifier::success()));
        let err = add_to_cart(&state, "NOPE", 1).unwrap_err();
        assert!(matches!(err, StorefrontError::Validation(ValidationError::UnknownProduct(_))));
    }

    #[test]
    fn test_cart_summary_counts_huge_quantities() {
        let state = AppState::new_test(Arc::new(RecordedNotifier::success()));
        add_to_cart(&state, "ST001", u32::MAX).unwrap();

        let summary = add_to_cart(&state, "ST002", 2).unwrap();

        assert_eq!(summary.items.len(), 2);
        assert_eq!(summary.total_items, u64::from(u32::MAX) + 2);
    }

    #[tokio::test]
    async fn test_operator_actions_require_confirmation() {
        let state = AppState::new_test(Arc::new(RecordedNotifier::always_fail("offline")));
        add_to_cart(&state, "ST001", 3).unwrap();
        let receipt = place_order(&state, customer()).await.unwrap();
        let id = receipt.order.order_id.clone();
        assert!(!receipt.delivered);

        let err = mark_complete(&state, &id, false).unwrap_err();
        assert!(matches!(err, StorefrontError::ConfirmationRequired(_)));
        assert_eq!(list_pending_orders(&state).len(), 1);

        let mut events = state.events.subscribe();
        mark_complete(&state, &id, true).unwrap();
        assert_eq!(events.try_recv().unwrap(), StorefrontEvent::OrderResolvedManually { order_id: id.clone() });
        assert_eq!(list_completed_orders(&state), vec![receipt.order]);

        assert!(matches!(mark_complete(&state, &id, true), Err(StorefrontError::OrderNotFound(_))));
        assert!(delete_order(&state, &id, OrderQueue::Completed, false).is_err());
        assert!(delete_order(&state, &id, OrderQueue::Completed, true).unwrap());
        assert!(!delete_order(&state, &id, OrderQueue::Completed, true).unwrap());
    }

    #[tokio::test]
    async fn test_retry_order_not_pending() {
        let state = AppState::new_test(Arc::new(RecordedNotifier::success()));
        let err = retry_order(&state, "NT-MISSING").await.unwrap_err();
        assert!(matches!(err, StorefrontError::OrderNotFound(_)));
    }

    #[test]
    fn test_settings_commands() {
        let state = AppState::new_test(Arc::new(RecordedNotifier::success()));

        set_chat_id(&state, Some("-100987".to_string())).unwrap();
        set_bot_token(&state, Some(" 123:abc ".to_string())).unwrap();
        set_stub_mode(&state, false).unwrap();

        let view = get_settings(&state).unwrap();
        assert_eq!(view.chat_id.as_deref(), Some("-100987"));
        assert!(view.bot_token_configured);
        assert!(!view.stub_when_unconfigured);
        assert_eq!(state.credentials.retrieve(BOT_TOKEN_KEY).unwrap().as_deref(), Some("123:abc"));

        set_chat_id(&state, None).unwrap();
        set_bot_token(&state, None).unwrap();
        let view = get_settings(&state).unwrap();
        assert_eq!(view.chat_id, None);
        assert!(!view.bot_token_configured);
    }

    #[test]
    fn test_export_writes_dated_file() {
        let state = AppState::new_test(Arc::new(RecordedNotifier::success()));
        let dir = tempfile::TempDir::new().unwrap();

        let (path, rows) = export_orders(&state, dir.path()).unwrap();

        assert_eq!(rows, 0);
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("orders_") && name.ends_with(".csv"));
        assert!(std::fs::read_to_string(&path).unwrap().starts_with("Order ID,"));
    }

    #[test]
    fn test_product_commands() {
        let state = AppState::new_test(Arc::new(RecordedNotifier::success()));
        assert_eq!(list_products(&state, Some("mug"), None).len(), 1);
        assert_eq!(list_categories(&state)[0], ALL_CATEGORIES);

        let mut jug = list_products(&state, Some("CR002"), None).remove(0);
        jug.id = "CR003".to_string();
        jug.name = "Ceramic Jug".to_string();
        add_product(&state, jug.clone()).unwrap();
        assert!(matches!(add_product(&state, jug.clone()), Err(StorefrontError::Validation(_))));

        jug.rate = Decimal::from(210);
        assert!(update_product(&state, jug).unwrap());
        assert!(delete_product(&state, "CR003").unwrap());
        assert_eq!(get_dashboard(&state).products, 16);
    }
}
