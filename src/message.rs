//! Human-readable order summary sent to the operator's chat

use rust_decimal::Decimal;

use crate::config::BusinessInfo;
use crate::models::Order;

const RULE: &str = "────────────────────────────";

/// Render an amount with exactly two decimals
pub fn money(amount: Decimal) -> String {
    let mut rounded = amount.round_dp(2);
    rounded.rescale(2);
    rounded.to_string()
}

/// Telegram Markdown body for a new order
pub fn format_order_message(order: &Order, business: Option<&BusinessInfo>) -> String {
    let items = order
        .items
        .iter()
        .map(|item| format!("- {} x {} (₹{})", item.product.name, item.qty, money(item.line_total())))
        .collect::<Vec<_>>()
        .join("\n");

    let mut lines = vec![
        "📦 *New Order Received*".to_string(),
        format!("*Order:* `{}`", order.order_id),
        format!("*Name:* {}", order.name),
        format!("*Mobile:* {}", order.mobile),
    ];
    if let Some(gst) = &order.gst {
        lines.push(format!("*GST:* {}", gst));
    }
    if let Some(address) = &order.address {
        lines.push(format!("*Address:* {}", address));
    }
    lines.push(format!("*Total:* ₹{}", money(order.grand_total)));
    lines.push(format!("*Items:*\n{}", items));
    if let Some(notes) = &order.notes {
        lines.push(format!("*Notes:* {}", notes));
    }

    let body = lines.join("\n");
    match business {
        Some(info) => format!("{}\n\n{}", body, signature(info)),
        None => body,
    }
}

fn signature(info: &BusinessInfo) -> String {
    let mut lines = vec![RULE.to_string(), format!("🏷️ *{}*", info.business_name)];
    if let Some(tagline) = &info.tagline {
        lines.push(format!("_{}_", tagline));
    }
    if let Some(gstin) = &info.gstin {
        lines.push(format!("🧾 GSTIN: {}", gstin));
    }
    if let Some(owner) = &info.owner {
        lines.push(format!("👤 Proprietor: {}", owner));
    }
    if !info.contacts.is_empty() {
        lines.push(format!("📞 {}", info.contacts.join(" | ")));
    }
    if let Some(email) = &info.email {
        lines.push(format!("📧 {}", email));
    }
    if let Some(address) = &info.address {
        lines.push(format!("📍 {}", address));
    }
    lines.push(RULE.to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::catalog::default_catalog;
    use crate::models::{items_total, CartItem};

    fn order() -> Order {
        let catalog = default_catalog();
        let items = vec![
            CartItem::new(catalog[0].clone(), 2),
            CartItem::new(catalog[3].clone(), 1),
        ];
        Order {
            order_id: "NT-20261019-101500-a1b2c3".to_string(),
            timestamp: Utc::now(),
            name: "Asha".to_string(),
            mobile: "9876543210".to_string(),
            gst: Some("29ABCDE1234F1Z5".to_string()),
            address: None,
            grand_total: items_total(&items),
            items,
            notes: Some("Deliver after 5pm".to_string()),
        }
    }

    #[test]
    fn test_money() {
        assert_eq!(money(Decimal::from(75)), "75.00");
        assert_eq!(money(Decimal::new(12345, 3)), "12.35");
    }

    #[test]
    fn test_message_lists_order_fields() {
        let text = format_order_message(&order(), None);

        assert!(text.starts_with("📦 *New Order Received*\n*Order:* `NT-20261019-101500-a1b2c3`"));
        assert!(text.contains("*GST:* 29ABCDE1234F1Z5"));
        assert!(!text.contains("*Address:*"));
        assert!(text.contains("*Total:* ₹1400.00"));
        assert!(text.contains("- Steel Plate 10\" x 2 (₹150.00)\n- Pressure Cooker 5L x 1 (₹1250.00)"));
        assert!(text.ends_with("*Notes:* Deliver after 5pm"));
    }

    #[test]
    fn test_signature_block() {
        let info = BusinessInfo {
            business_name: "Nandan Traders".to_string(),
            contacts: vec!["9800000001".to_string(), "9800000002".to_string()],
            ..BusinessInfo::default()
        };
        let text = format_order_message(&order(), Some(&info));

        assert!(text.contains("\n\n────────────────────────────\n🏷️ *Nandan Traders*"));
        assert!(text.contains("📞 9800000001 | 9800000002"));
        assert!(!text.contains("GSTIN"));
        assert!(text.ends_with(RULE));
    }
}
