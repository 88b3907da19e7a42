//! Catalog, cart and order records as they are persisted in the store

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A catalog entry. Orders embed a copy, never a reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub rate: Decimal,
    pub unit: String,
    pub category: String,
    #[serde(default)]
    pub image: String,
}

/// A product snapshot with the quantity the customer picked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    #[serde(flatten)]
    pub product: Product,
    pub qty: u32,
}

impl CartItem {
    pub fn new(product: Product, qty: u32) -> Self {
        Self { product, qty }
    }

    pub fn line_total(&self) -> Decimal {
        self.product.rate.saturating_mul(Decimal::from(self.qty))
    }
}

/// Sum of `rate × qty` over a set of items
pub fn items_total(items: &[CartItem]) -> Decimal {
    items.iter().map(CartItem::line_total).fold(Decimal::ZERO, Decimal::saturating_add)
}

/// Units across all lines. Widened so large per-line quantities cannot overflow.
pub fn total_units(items: &[CartItem]) -> u64 {
    items.iter().map(|i| u64::from(i.qty)).sum()
}

/// Customer fields collected at checkout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub name: String,
    pub mobile: String,
    #[serde(default)]
    pub gst: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A placed order. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: String,
    pub timestamp: DateTime<Utc>,
    pub name: String,
    pub mobile: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gst: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub items: Vec<CartItem>,
    pub grand_total: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// An order waiting for confirmed delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOrder {
    pub order: Order,
    pub attempt_count: u32,
    pub last_attempt: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl PendingOrder {
    pub fn order_id(&self) -> &str {
        &self.order.order_id
    }

    /// The attempt made at placement has not reported back yet and was
    /// started less than `grace` before `now`.
    pub fn awaiting_first_outcome(&self, now: DateTime<Utc>, grace: chrono::Duration) -> bool {
        self.attempt_count <= 1
            && self.last_error.is_none()
            && self.last_attempt.is_some_and(|at| now - at < grace)
    }
}

/// Result of handing one order to the notifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered,
    Failed { reason: String },
}

impl DeliveryOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        DeliveryOutcome::Failed { reason: reason.into() }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered)
    }
}

/// Which persisted collection an operator action targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderQueue {
    Pending,
    Completed,
}

impl std::str::FromStr for OrderQueue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderQueue::Pending),
            "completed" => Ok(OrderQueue::Completed),
            other => Err(format!("unknown queue '{}', expected pending or completed", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plate() -> Product {
        Product {
            id: "ST001".to_string(),
            name: "Steel Plate 10\"".to_string(),
            rate: Decimal::new(7550, 2),
            unit: "pcs".to_string(),
            category: "Tableware".to_string(),
            image: String::new(),
        }
    }

    #[test]
    fn test_items_total() {
        let items = vec![
            CartItem::new(plate(), 2),
            CartItem::new(Product { rate: Decimal::from(30), ..plate() }, 3),
        ];
        assert_eq!(items_total(&items), Decimal::new(24100, 2));
        assert_eq!(items_total(&[]), Decimal::ZERO);
    }

    #[test]
    fn test_cart_item_is_flat_product_with_qty() {
        let json = serde_json::to_value(CartItem::new(plate(), 4)).unwrap();
        assert_eq!(json["id"], "ST001");
        assert_eq!(json["qty"], 4);
        assert!(json.get("product").is_none());
    }

    #[test]
    fn test_reads_numeric_rates() {
        let item: CartItem = serde_json::from_str(
            r#"{"id":"CK001","name":"Pressure Cooker 5L","rate":1250,"unit":"pcs","category":"Cookware","image":"","qty":1}"#,
        ).unwrap();
        assert_eq!(item.product.rate, Decimal::from(1250));
    }

    #[test]
    fn test_pending_order_field_names() {
        let pending = PendingOrder {
            order: Order {
                order_id: "NT-20261019-1a2b3c".to_string(),
                timestamp: Utc::now(),
                name: "Asha".to_string(),
                mobile: "9876543210".to_string(),
                gst: None,
                address: None,
                items: vec![CartItem::new(plate(), 1)],
                grand_total: Decimal::new(7550, 2),
                notes: None,
            },
            attempt_count: 1,
            last_attempt: None,
            last_error: None,
        };
        let json = serde_json::to_value(&pending).unwrap();
        assert_eq!(json["attemptCount"], 1);
        assert!(json["lastAttempt"].is_null());
        assert_eq!(json["order"]["orderId"], "NT-20261019-1a2b3c");
        assert!(json["order"].get("gst").is_none());
    }

    #[test]
    fn test_queue_from_str() {
        assert_eq!("pending".parse::<OrderQueue>().unwrap(), OrderQueue::Pending);
        assert_eq!("completed".parse::<OrderQueue>().unwrap(), OrderQueue::Completed);
        assert!("archived".parse::<OrderQueue>().is_err());
    }
}
