//! Order notifications.
//!
//! An order is never stored: it is rendered into a WhatsApp message and
//! relayed to the store's notify number.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::clock;
use crate::ids::OrderId;

/// `product` part of an order.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderProduct {
    pub name: String,
    /// Shown as sent by the form, number or string
    pub price: Value,
    pub category: String,
}

/// `customer` part of an order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCustomer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

/// `delivery` part of an order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDelivery {
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub country: String,
}

/// Body of `POST /api/orders/submit`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub product: OrderProduct,
    pub customer: OrderCustomer,
    pub delivery: OrderDelivery,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub terms_accepted: Option<bool>,
}

/// Integral floats print without a fraction, `1300.0` as `1300`.
fn display_price(price: &Value) -> String {
    match price {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        Value::Null => "undefined".to_string(),
        other => other.to_string(),
    }
}

/// Render the notification text for `order`.
pub fn format_order_message(order: &OrderRequest, at: DateTime<Utc>, order_id: &OrderId) -> String {
    let OrderRequest {
        product,
        customer,
        delivery,
        notes,
        ..
    } = order;

    let mut message = String::from("🛒 *NEW ORDER RECEIVED* 🛒\n\n");

    message.push_str("📦 *Product Details:*\n");
    message.push_str(&format!("   • Name: {}\n", product.name));
    message.push_str(&format!("   • Price: ${}\n", display_price(&product.price)));
    message.push_str(&format!("   • Category: {}\n\n", product.category));

    message.push_str("👤 *Customer Information:*\n");
    message.push_str(&format!(
        "   • Name: {} {}\n",
        customer.first_name, customer.last_name
    ));
    message.push_str(&format!("   • Email: {}\n", customer.email));
    message.push_str(&format!("   • Phone: {}\n\n", customer.phone));

    message.push_str("📍 *Delivery Address:*\n");
    message.push_str(&format!("   • Street: {}\n", delivery.address));
    message.push_str(&format!("   • City: {}\n", delivery.city));
    message.push_str(&format!("   • State: {}\n", delivery.state));
    message.push_str(&format!("   • ZIP: {}\n", delivery.zip_code));
    message.push_str(&format!("   • Country: {}\n\n", delivery.country));

    if let Some(notes) = notes.as_deref().filter(|n| !n.trim().is_empty()) {
        message.push_str("📝 *Additional Notes:*\n");
        message.push_str(&format!("   {notes}\n\n"));
    }

    message.push_str(&format!("⏰ *Order Time:* {}\n", clock::local_display(at)));
    message.push_str(&format!("🆔 *Order ID:* {order_id}\n\n"));

    message.push_str("✅ *Order Status:* Pending\n");
    message.push_str(&format!("📞 *Contact Customer:* {}\n", customer.phone));
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn order(notes: Option<&str>) -> OrderRequest {
        serde_json::from_value(json!({
            "product": {"name": "Gaming Laptop", "price": 1299.99, "category": "Laptop"},
            "customer": {
                "firstName": "Nimal",
                "lastName": "Perera",
                "email": "nimal@example.com",
                "phone": "+94770000000"
            },
            "delivery": {
                "address": "12 Galle Rd",
                "city": "Colombo",
                "state": "Western",
                "zipCode": "00300",
                "country": "Sri Lanka"
            },
            "notes": notes,
            "termsAccepted": true
        }))
        .unwrap()
    }

    #[test]
    fn message_layout() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 20, 30).unwrap();
        let id = OrderId::from_parts(1_700_000_000_000, 36);
        let text = format_order_message(&order(Some("Leave at the gate")), at, &id);

        assert!(text.starts_with("🛒 *NEW ORDER RECEIVED* 🛒\n\n📦 *Product Details:*\n"));
        assert!(text.contains(
            "   • Name: Gaming Laptop\n   • Price: $1299.99\n   • Category: Laptop\n\n"
        ));
        assert!(text.contains("   • Name: Nimal Perera\n"));
        assert!(text.contains("   • ZIP: 00300\n   • Country: Sri Lanka\n\n"));
        assert!(text.contains("📝 *Additional Notes:*\n   Leave at the gate\n\n"));
        assert!(text.contains(&format!("⏰ *Order Time:* {}\n", clock::local_display(at))));
        assert!(text.contains("🆔 *Order ID:* ORD-LOYW3V28-00010\n\n"));
        assert!(
            text.ends_with("✅ *Order Status:* Pending\n📞 *Contact Customer:* +94770000000\n")
        );
    }

    #[test]
    fn blank_notes_are_skipped() {
        let at = Utc::now();
        let id = OrderId::generate();
        assert!(!format_order_message(&order(Some("   ")), at, &id).contains("Additional Notes"));
        assert!(!format_order_message(&order(None), at, &id).contains("Additional Notes"));
    }

    #[test]
    fn prices_print_like_the_form_sent_them() {
        assert_eq!(display_price(&json!(1300.0)), "1300");
        assert_eq!(display_price(&json!(49.99)), "49.99");
        assert_eq!(display_price(&json!(15)), "15");
        assert_eq!(display_price(&json!("99.50")), "99.50");
    }
}
