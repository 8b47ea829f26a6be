//! NATS-backed notifier.
//!
//! Rendered emails are published as JSON envelopes on
//! `<prefix>.<kind>` (for example `notifications.email.order_confirmed`);
//! a mail relay subscribed to those subjects does the actual delivery.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::message::{self, EmailMessage};
use super::{NotificationError, Notifier};
use crate::domain::aggregates::Order;
use crate::store::CustomerContact;

pub const DEFAULT_SUBJECT_PREFIX: &str = "notifications.email";

#[derive(Debug, Serialize)]
pub struct EmailEnvelope<'a> {
    pub event_id: Uuid,
    pub kind: &'a str,
    pub order_id: i64,
    pub occurred_at: DateTime<Utc>,
    pub message: EmailMessage,
}

impl<'a> EmailEnvelope<'a> {
    pub fn new(kind: &'a str, order_id: i64, message: EmailMessage) -> Self {
        Self { event_id: Uuid::now_v7(), kind, order_id, occurred_at: Utc::now(), message }
    }
}

#[derive(Clone)]
pub struct NatsNotifier {
    client: async_nats::Client,
    subject_prefix: String,
}

impl NatsNotifier {
    pub fn new(client: async_nats::Client) -> Self {
        Self { client, subject_prefix: DEFAULT_SUBJECT_PREFIX.to_string() }
    }

    pub fn with_subject_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.subject_prefix = prefix.into();
        self
    }

    async fn publish(&self, envelope: EmailEnvelope<'_>) -> Result<(), NotificationError> {
        let subject = format!("{}.{}", self.subject_prefix, envelope.kind);
        let payload = serde_json::to_vec(&envelope)?;
        self.client.publish(subject.clone(), payload.into()).await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;
        debug!(%subject, order_id = envelope.order_id, event_id = %envelope.event_id, "notification published");
        Ok(())
    }
}

#[async_trait]
impl Notifier for NatsNotifier {
    async fn notify_order_confirmed(&self, order: &Order, customer_email: &str, customer_name: &str) -> Result<(), NotificationError> {
        let msg = message::order_confirmation(order, customer_email, customer_name)?;
        self.publish(EmailEnvelope::new("order_confirmed", order.id, msg)).await
    }

    async fn notify_order_status_changed(&self, order: &Order, customer_email: &str, customer_name: &str) -> Result<(), NotificationError> {
        let msg = message::order_status_update(order, customer_email, customer_name)?;
        self.publish(EmailEnvelope::new("order_status_changed", order.id, msg)).await
    }

    async fn notify_admin_new_order(&self, order: &Order, admin_email: &str, customer: Option<&CustomerContact>) -> Result<(), NotificationError> {
        let msg = message::admin_new_order(order, admin_email, customer)?;
        self.publish(EmailEnvelope::new("admin_new_order", order.id, msg)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_shape() {
        let msg = EmailMessage { to: "a@example.com".into(), subject: "s".into(), body: "b".into() };
        let json = serde_json::to_value(EmailEnvelope::new("order_confirmed", 9, msg)).unwrap();
        assert_eq!(json["kind"], "order_confirmed");
        assert_eq!(json["order_id"], 9);
        assert_eq!(json["message"]["to"], "a@example.com");
        assert!(json["event_id"].is_string());
    }
}
