#![allow(dead_code)]

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};

use greencart_orders::domain::aggregates::{Coupon, Order, OrderStatus, Product, ShippingDetails};
use greencart_orders::domain::value_objects::CouponCode;
use greencart_orders::notifications::{DispatcherConfig, DispatcherWorkers, NotificationDispatcher, NotificationError, Notifier};
use greencart_orders::services::{OrderLineRequest, OrderRequest, OrderService};
use greencart_orders::store::{CustomerContact, MemoryStore};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sent {
    Confirmed { order_id: i64, to: String },
    StatusChanged { order_id: i64, to: String, status: OrderStatus },
    Admin { order_id: i64, to: String, customer_known: bool },
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Sent>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Sent> { self.sent.lock().unwrap().clone() }
    fn record(&self, sent: Sent) { self.sent.lock().unwrap().push(sent); }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify_order_confirmed(&self, order: &Order, customer_email: &str, _name: &str) -> Result<(), NotificationError> {
        self.record(Sent::Confirmed { order_id: order.id, to: customer_email.into() });
        Ok(())
    }

    async fn notify_order_status_changed(&self, order: &Order, customer_email: &str, _name: &str) -> Result<(), NotificationError> {
        self.record(Sent::StatusChanged { order_id: order.id, to: customer_email.into(), status: order.status });
        Ok(())
    }

    async fn notify_admin_new_order(&self, order: &Order, admin_email: &str, customer: Option<&CustomerContact>) -> Result<(), NotificationError> {
        self.record(Sent::Admin { order_id: order.id, to: admin_email.into(), customer_known: customer.is_some() });
        Ok(())
    }
}

/// Fails every delivery.
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn notify_order_confirmed(&self, _: &Order, _: &str, _: &str) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp relay down".into()))
    }

    async fn notify_order_status_changed(&self, _: &Order, _: &str, _: &str) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp relay down".into()))
    }

    async fn notify_admin_new_order(&self, _: &Order, _: &str, _: Option<&CustomerContact>) -> Result<(), NotificationError> {
        Err(NotificationError::Transport("smtp relay down".into()))
    }
}

pub const CUSTOMER: i64 = 7;
pub const CUSTOMER_EMAIL: &str = "meera@example.com";

pub struct Harness {
    pub store: MemoryStore,
    pub orders: Arc<OrderService>,
    pub workers: DispatcherWorkers,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_config(DispatcherConfig::default()).await
    }

    pub async fn with_config(config: DispatcherConfig) -> Self {
        let store = MemoryStore::new();
        store.insert_customer(CUSTOMER, CustomerContact { email: Some(CUSTOMER_EMAIL.into()), name: "Meera".into() }).await;
        let notifier = Arc::new(RecordingNotifier::default());
        let (dispatcher, workers) = NotificationDispatcher::spawn(notifier.clone(), Arc::new(store.clone()), config);
        let orders = Arc::new(OrderService::new(Arc::new(store.clone()), dispatcher));
        Self { store, orders, workers, notifier }
    }

    /// Drops the service, waits for queued notifications and returns them.
    pub async fn finish(self) -> Vec<Sent> {
        drop(self.orders);
        self.workers.join().await;
        self.notifier.sent()
    }
}

pub async fn seed_product(store: &MemoryStore, id: i64, price: Decimal, stock: i32) {
    store.insert_product(Product::new(id, format!("Product {id}"), price, stock)).await;
}

pub async fn seed_coupon(store: &MemoryStore, coupon: Coupon) {
    store.insert_coupon(coupon).await;
}

pub fn code(s: &str) -> CouponCode { CouponCode::new(s).unwrap() }

pub fn line(product_id: i64, price: Decimal, quantity: i32) -> OrderLineRequest {
    OrderLineRequest::new(product_id, format!("Product {product_id}"), price, quantity)
}

pub fn request(customer_id: i64, items: Vec<OrderLineRequest>, coupon: Option<&str>) -> OrderRequest {
    OrderRequest {
        customer_id: Some(customer_id),
        items,
        coupon_code: coupon.map(str::to_string),
        shipping: ShippingDetails { city: Some("Bengaluru".into()), pincode: Some("560001".into()), ..Default::default() },
    }
}
