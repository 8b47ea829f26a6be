//! Plain-text rendering of order emails.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};

use crate::domain::aggregates::{Order, OrderStatus};
use crate::store::CustomerContact;

const RULE: &str = "----------------------------------------";
const DATE_FORMAT: &str = "%B %d, %Y at %I:%M %p";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub fn order_confirmation(order: &Order, to: &str, customer_name: &str) -> Result<EmailMessage, fmt::Error> {
    let mut body = String::new();
    writeln!(body, "Dear {customer_name},\n")?;
    writeln!(body, "Thank you for your order! We're excited to confirm your purchase.\n")?;
    writeln!(body, "Order Details:\n{RULE}")?;
    write_summary(&mut body, order)?;
    write_addresses(&mut body, order)?;
    writeln!(body, "Items Ordered:")?;
    for item in &order.items {
        writeln!(body, "  - {} (Qty: {}) - {}", item.product_name, item.quantity, item.line_total().round_dp(2))?;
    }
    if let (Some(code), Some(discount)) = (&order.coupon_code, order.discount_amount) {
        writeln!(body, "\nCoupon {code} saved you {}", discount.round_dp(2))?;
    }
    writeln!(body, "\n{RULE}\nWe'll send you another email when your order ships.")?;
    Ok(EmailMessage { to: to.to_string(), subject: format!("Order Confirmation - Order #{}", order.id), body })
}

pub fn order_status_update(order: &Order, to: &str, customer_name: &str) -> Result<EmailMessage, fmt::Error> {
    let mut body = String::new();
    writeln!(body, "Dear {customer_name},\n")?;
    writeln!(body, "Your order status has been updated.\n")?;
    writeln!(body, "Order ID: #{}", order.id)?;
    writeln!(body, "New Status: {}\n", order.status)?;
    match order.status {
        OrderStatus::Shipped => {
            if let Some(tracking) = &order.tracking_number {
                writeln!(body, "Tracking Number: {tracking}")?;
                writeln!(body, "You can track your order using this tracking number.\n")?;
            }
        }
        OrderStatus::Delivered => {
            writeln!(body, "Your order has been delivered! We hope you enjoy your purchase.\n")?;
        }
        OrderStatus::Cancelled => {
            writeln!(body, "Your order has been cancelled. Any payment taken will be refunded.\n")?;
        }
        _ => {}
    }
    writeln!(body, "Thank you for shopping with us!")?;
    Ok(EmailMessage { to: to.to_string(), subject: format!("Order Update - Order #{}", order.id), body })
}

pub fn admin_new_order(order: &Order, admin_email: &str, customer: Option<&CustomerContact>) -> Result<EmailMessage, fmt::Error> {
    let mut body = String::new();
    writeln!(body, "Hello Admin,\n\nA new order has been placed.\n\n{RULE}\nORDER DETAILS\n{RULE}")?;
    write_summary(&mut body, order)?;
    writeln!(body, "CUSTOMER INFORMATION\n{RULE}")?;
    writeln!(body, "Customer ID: {}", order.customer_id)?;
    writeln!(body, "Customer Name: {}", customer.map_or("N/A", |c| c.name.as_str()))?;
    writeln!(body, "Customer Email: {}\n", customer.and_then(|c| c.email.as_deref()).unwrap_or("N/A"))?;
    write_addresses(&mut body, order)?;
    writeln!(body, "ORDER ITEMS\n{RULE}")?;
    for (n, item) in order.items.iter().enumerate() {
        writeln!(
            body, "{}. {}\n   Quantity: {}\n   Price: {}\n   Subtotal: {}\n",
            n + 1, item.product_name, item.quantity, item.price.round_dp(2), item.line_total().round_dp(2),
        )?;
    }
    if let Some(code) = &order.coupon_code {
        writeln!(body, "COUPON APPLIED\n{RULE}\nCoupon Code: {code}")?;
        if let Some(discount) = order.discount_amount {
            writeln!(body, "Discount Amount: {}", discount.round_dp(2))?;
        }
        body.push('\n');
    }
    writeln!(body, "{RULE}\nPlease process this order and update its status.")?;
    Ok(EmailMessage { to: admin_email.to_string(), subject: format!("New Order Received - Order #{}", order.id), body })
}

fn write_summary(body: &mut String, order: &Order) -> fmt::Result {
    writeln!(body, "Order ID: #{}", order.id)?;
    writeln!(body, "Order Date: {}", order.order_date.format(DATE_FORMAT))?;
    writeln!(body, "Status: {}", order.status)?;
    writeln!(body, "Total Amount: {}\n", order.total_amount.round_dp(2))
}

fn write_addresses(body: &mut String, order: &Order) -> fmt::Result {
    let shipping = &order.shipping;
    if let Some(address) = shipping.shipping_address.as_deref().filter(|a| !a.trim().is_empty()) {
        writeln!(body, "Shipping Address:\n{address}\n")?;
    }
    if let Some(address) = shipping.delivery_address() {
        writeln!(body, "Delivery Address:\n{address}\n")?;
    }
    if let Some(location) = shipping.location.as_deref().filter(|l| !l.trim().is_empty()) {
        writeln!(body, "Location/Landmark:\n{location}\n")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{OrderItem, ShippingDetails};
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn order() -> Order {
        let shipping = ShippingDetails { street: Some("4 Lake View".into()), city: Some("Mysuru".into()), ..Default::default() };
        let items = vec![OrderItem { id: 1, product_id: 2, product_name: "Clay Pot".into(), price: Decimal::new(300, 0), quantity: 3 }];
        Order::restore(31, 8, Decimal::new(850, 0), Utc::now(), OrderStatus::Pending, None,
            Some("FLAT50".into()), Some(Decimal::new(50, 0)), shipping, items)
    }

    #[test]
    fn test_confirmation() {
        let msg = order_confirmation(&order(), "asha@example.com", "Asha").unwrap();
        assert_eq!(msg.subject, "Order Confirmation - Order #31");
        assert!(msg.body.starts_with("Dear Asha,"));
        assert!(msg.body.contains("Clay Pot (Qty: 3) - 900"));
        assert!(msg.body.contains("4 Lake View, Mysuru"));
        assert!(msg.body.contains("Coupon FLAT50 saved you 50"));
    }

    #[test]
    fn test_status_update_mentions_tracking() {
        let mut o = order();
        o.apply_status(OrderStatus::Shipped).unwrap();
        let msg = order_status_update(&o, "asha@example.com", "Asha").unwrap();
        assert!(msg.body.contains("New Status: SHIPPED"));
        assert!(msg.body.contains("Tracking Number: TRK00000031"));
    }

    #[test]
    fn test_admin_message_without_customer() {
        let msg = admin_new_order(&order(), "ops@example.com", None).unwrap();
        assert_eq!(msg.to, "ops@example.com");
        assert!(msg.body.contains("Customer Name: N/A"));
        assert!(msg.body.contains("Coupon Code: FLAT50"));
    }
}
