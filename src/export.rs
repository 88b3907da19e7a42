//! CSV export of completed and pending orders

use std::io;

use chrono::NaiveDate;

use crate::message::money;
use crate::models::{Order, PendingOrder};

pub const EXPORT_HEADERS: [&str; 9] = [
    "Order ID",
    "Timestamp",
    "Name",
    "Mobile",
    "GST",
    "Address",
    "Grand Total",
    "Items",
    "Notes",
];

/// `orders_YYYY-MM-DD.csv`
pub fn export_filename(date: NaiveDate) -> String {
    format!("orders_{}.csv", date.format("%Y-%m-%d"))
}

/// `name (Qty: n)` per line, joined with `; `
pub fn item_summary(order: &Order) -> String {
    order
        .items
        .iter()
        .map(|item| format!("{} (Qty: {})", item.product.name, item.qty))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Write completed orders, then pending ones, one row each. Returns the row count.
pub fn write_orders<W: io::Write>(
    writer: W,
    completed: &[Order],
    pending: &[PendingOrder],
) -> Result<usize, csv::Error> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(EXPORT_HEADERS)?;

    let orders = completed.iter().chain(pending.iter().map(|p| &p.order));
    let mut rows = 0;
    for order in orders {
        let timestamp = order.timestamp.to_rfc3339();
        let total = money(order.grand_total);
        let items = item_summary(order);
        csv.write_record([
            order.order_id.as_str(),
            timestamp.as_str(),
            order.name.as_str(),
            order.mobile.as_str(),
            order.gst.as_deref().unwrap_or(""),
            order.address.as_deref().unwrap_or(""),
            total.as_str(),
            items.as_str(),
            order.notes.as_deref().unwrap_or(""),
        ])?;
        rows += 1;
    }
    csv.flush()?;

    tracing::info!(rows = rows, "Orders exported");
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use crate::catalog::default_catalog;
    use crate::models::{items_total, CartItem};

    fn order(id: &str, address: Option<&str>) -> Order {
        let catalog = default_catalog();
        let items = vec![
            CartItem::new(catalog[0].clone(), 2),
            CartItem::new(catalog[5].clone(), 1),
        ];
        Order {
            order_id: id.to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 10, 19, 10, 15, 0).unwrap(),
            name: "Asha".to_string(),
            mobile: "9876543210".to_string(),
            gst: None,
            address: address.map(str::to_string),
            grand_total: items_total(&items),
            items,
            notes: None,
        }
    }

    #[test]
    fn test_filename() {
        assert_eq!(export_filename(NaiveDate::from_ymd_opt(2026, 3, 7).unwrap()), "orders_2026-03-07.csv");
    }

    #[test]
    fn test_rows_completed_then_pending() {
        let completed = vec![order("NT-A", Some("12 MG Road, Pune"))];
        let pending = vec![PendingOrder {
            order: order("NT-B", None),
            attempt_count: 2,
            last_attempt: None,
            last_error: Some("Timeout".to_string()),
        }];

        let mut out = Vec::new();
        let rows = write_orders(&mut out, &completed, &pending).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(rows, 2);
        assert_eq!(lines[0], "Order ID,Timestamp,Name,Mobile,GST,Address,Grand Total,Items,Notes");
        assert_eq!(
            lines[1],
            "NT-A,2026-10-19T10:15:00+00:00,Asha,9876543210,,\"12 MG Road, Pune\",400.00,\
             \"Steel Plate 10\"\" (Qty: 2); Water Glass Set (Qty: 1)\","
        );
        assert!(lines[2].starts_with("NT-B,"));
    }

    #[test]
    fn test_empty_export_has_header_only() {
        let mut out = Vec::new();
        assert_eq!(write_orders(&mut out, &[], &[]).unwrap(), 0);
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 1);
    }
}
