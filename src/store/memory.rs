//! In-process store.
//!
//! Transactions are serializable: `begin` takes the store lock and works on a
//! copy of the state, `commit` swaps the copy in, and dropping or rolling back
//! simply throws the copy away.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use super::{CustomerContact, CustomerDirectory, Store, StoreError, StoreResult, Transaction};
use crate::domain::aggregates::{CartLine, Coupon, NewOrder, Order, OrderStatus, Product};
use crate::domain::value_objects::CouponCode;

#[derive(Clone, Debug, Default)]
struct MemoryState {
    products: BTreeMap<i64, Product>,
    coupons: HashMap<CouponCode, Coupon>,
    orders: BTreeMap<i64, Order>,
    cart: BTreeMap<i64, CartLine>,
    last_order_id: i64,
    last_item_id: i64,
    last_cart_line_id: i64,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    customers: Arc<RwLock<HashMap<i64, CustomerContact>>>,
    failing_commits: Arc<AtomicU32>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub async fn insert_product(&self, product: Product) {
        self.state.lock().await.products.insert(product.id, product);
    }

    pub async fn insert_coupon(&self, coupon: Coupon) {
        self.state.lock().await.coupons.insert(coupon.code.clone(), coupon);
    }

    pub async fn insert_customer(&self, customer_id: i64, contact: CustomerContact) {
        self.customers.write().await.insert(customer_id, contact);
    }

    pub async fn add_cart_line(&self, customer_id: i64, product_id: i64, quantity: i32) -> CartLine {
        let mut state = self.state.lock().await;
        upsert_line(&mut state, customer_id, product_id, quantity)
    }

    pub async fn product(&self, product_id: i64) -> Option<Product> {
        self.state.lock().await.products.get(&product_id).cloned()
    }

    pub async fn coupon(&self, code: &CouponCode) -> Option<Coupon> {
        self.state.lock().await.coupons.get(code).cloned()
    }

    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    pub async fn cart_for(&self, customer_id: i64) -> Vec<CartLine> {
        let state = self.state.lock().await;
        lines_of(&state, customer_id)
    }

    /// Makes the next `count` commits fail as if the connection dropped.
    pub fn fail_next_commits(&self, count: u32) {
        self.failing_commits.store(count, Ordering::SeqCst);
    }
}

fn lines_of(state: &MemoryState, customer_id: i64) -> Vec<CartLine> {
    state.cart.values().filter(|l| l.customer_id == customer_id).cloned().collect()
}

fn upsert_line(state: &mut MemoryState, customer_id: i64, product_id: i64, quantity: i32) -> CartLine {
    if let Some(line) = state.cart.values_mut().find(|l| l.customer_id == customer_id && l.product_id == product_id) {
        line.quantity = quantity;
        return line.clone();
    }
    state.last_cart_line_id += 1;
    let line = CartLine { id: state.last_cart_line_id, customer_id, product_id, quantity };
    state.cart.insert(line.id, line.clone());
    line
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn Transaction>> {
        let committed = self.state.clone().lock_owned().await;
        let working = committed.clone();
        Ok(Box::new(MemoryTransaction { committed, working, failing_commits: self.failing_commits.clone() }))
    }

    async fn find_order(&self, order_id: i64) -> StoreResult<Option<Order>> {
        Ok(self.state.lock().await.orders.get(&order_id).cloned())
    }

    async fn orders_for_customer(&self, customer_id: i64) -> StoreResult<Vec<Order>> {
        let state = self.state.lock().await;
        let mut orders: Vec<Order> = state.orders.values().filter(|o| o.customer_id == customer_id).cloned().collect();
        orders.sort_by(|a, b| b.order_date.cmp(&a.order_date).then(b.id.cmp(&a.id)));
        Ok(orders)
    }
}

#[async_trait]
impl CustomerDirectory for MemoryStore {
    async fn get_customer_by_id(&self, customer_id: i64) -> StoreResult<Option<CustomerContact>> {
        Ok(self.customers.read().await.get(&customer_id).cloned())
    }
}

pub struct MemoryTransaction {
    committed: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    failing_commits: Arc<AtomicU32>,
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn find_product(&mut self, product_id: i64) -> StoreResult<Option<Product>> {
        Ok(self.working.products.get(&product_id).cloned())
    }

    async fn decrement_stock(&mut self, product_id: i64, quantity: i32) -> StoreResult<Option<i32>> {
        Ok(self.working.products.get_mut(&product_id).and_then(|p| p.take_stock(quantity)))
    }

    async fn increment_stock(&mut self, product_id: i64, quantity: i32) -> StoreResult<Option<i32>> {
        Ok(self.working.products.get_mut(&product_id).map(|p| p.return_stock(quantity)))
    }

    async fn find_coupon(&mut self, code: &CouponCode) -> StoreResult<Option<Coupon>> {
        Ok(self.working.coupons.get(code).cloned())
    }

    async fn redeem_coupon(&mut self, code: &CouponCode) -> StoreResult<Option<i32>> {
        let now = Utc::now();
        Ok(self.working.coupons.get_mut(code).filter(|c| c.is_valid_at(now)).map(|c| {
            c.record_redemption();
            c.used_count
        }))
    }

    async fn insert_order(&mut self, order: NewOrder) -> StoreResult<Order> {
        self.working.last_order_id += 1;
        let id = self.working.last_order_id;
        let first_item = self.working.last_item_id + 1;
        let item_ids: Vec<i64> = (first_item..first_item + order.items.len() as i64).collect();
        self.working.last_item_id += order.items.len() as i64;
        let order = order.into_order(id, &item_ids);
        self.working.orders.insert(id, order.clone());
        Ok(order)
    }

    async fn find_order_for_update(&mut self, order_id: i64) -> StoreResult<Option<Order>> {
        Ok(self.working.orders.get(&order_id).cloned())
    }

    async fn update_order_status(&mut self, order_id: i64, status: OrderStatus, tracking_number: Option<&str>) -> StoreResult<()> {
        let order = self.working.orders.get_mut(&order_id)
            .ok_or_else(|| StoreError::Corrupt(format!("order {order_id} vanished mid-transaction")))?;
        order.status = status;
        order.tracking_number = tracking_number.map(str::to_string);
        Ok(())
    }

    async fn cart_lines(&mut self, customer_id: i64) -> StoreResult<Vec<CartLine>> {
        Ok(lines_of(&self.working, customer_id))
    }

    async fn find_cart_line(&mut self, customer_id: i64, product_id: i64) -> StoreResult<Option<CartLine>> {
        Ok(self.working.cart.values().find(|l| l.customer_id == customer_id && l.product_id == product_id).cloned())
    }

    async fn upsert_cart_line(&mut self, customer_id: i64, product_id: i64, quantity: i32) -> StoreResult<CartLine> {
        Ok(upsert_line(&mut self.working, customer_id, product_id, quantity))
    }

    async fn delete_cart_line(&mut self, line_id: i64) -> StoreResult<()> {
        self.working.cart.remove(&line_id);
        Ok(())
    }

    async fn clear_cart(&mut self, customer_id: i64) -> StoreResult<u64> {
        let before = self.working.cart.len();
        self.working.cart.retain(|_, l| l.customer_id != customer_id);
        Ok((before - self.working.cart.len()) as u64)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let injected = self.failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StoreError::Unavailable("connection lost during commit".into()));
        }
        let MemoryTransaction { mut committed, working, .. } = *self;
        *committed = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}
