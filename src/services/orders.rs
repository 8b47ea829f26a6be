//! Order workflow orchestration.
//!
//! `place_order` runs coupon redemption, stock reservation, order persistence
//! and cart cleanup in a single transaction. Notifications are queued only
//! after that transaction has committed.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::domain::aggregates::{Order, OrderStatus};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::notifications::NotificationDispatcher;
use crate::services::assembler::{OrderAssembler, OrderRequest, ValidatedOrder};
use crate::services::coupons::{AppliedCoupon, CouponError, CouponGuard};
use crate::services::inventory::{InventoryLedger, StockError};
use crate::store::{Store, Transaction};
use crate::{OrderError, Result};

pub struct OrderService {
    store: Arc<dyn Store>,
    ledger: InventoryLedger,
    coupons: CouponGuard,
    assembler: OrderAssembler,
    notifications: NotificationDispatcher,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>, notifications: NotificationDispatcher) -> Self {
        Self {
            store,
            ledger: InventoryLedger::new(),
            coupons: CouponGuard::new(),
            assembler: OrderAssembler::new(),
            notifications,
        }
    }

    #[instrument(skip_all, fields(customer_id = ?request.customer_id, lines = request.items.len()))]
    pub async fn place_order(&self, request: OrderRequest) -> Result<Order> {
        let validated = self.assembler.validate(request)
            .map_err(|e| OrderError::InvalidOrderRequest(e.to_string()))?;

        let mut tx = self.store.begin().await.map_err(OrderError::OrderPlacementFailed)?;
        let mut order = match self.place_in(tx.as_mut(), &validated).await {
            Ok(order) => order,
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "rollback failed");
                }
                let e = e.during_placement();
                if e.is_rejection() {
                    info!(code = e.code(), error = %e, "order rejected");
                } else {
                    error!(error = %e, "order placement failed");
                }
                return Err(e);
            }
        };

        tx.commit().await.map_err(|e| {
            error!(error = %e, "commit failed, order discarded");
            OrderError::OrderPlacementFailed(e)
        })?;

        order.record_placed();
        info!(order_id = order.id, total = %order.total_amount, "order placed");
        self.publish(&mut order);
        Ok(order)
    }

    async fn place_in(&self, tx: &mut dyn Transaction, order: &ValidatedOrder) -> Result<Order> {
        let subtotal = order.subtotal()?;
        let applied: Option<AppliedCoupon> = match &order.coupon_code {
            Some(code) => {
                self.coupons.validate(tx, code, subtotal).await?;
                Some(self.coupons.redeem(tx, code, subtotal).await?)
            }
            None => None,
        };

        for line in &order.lines {
            self.ledger.reserve(tx, line.product_id, line.quantity).await?;
        }

        let new_order = self.assembler.assemble(order, applied.as_ref())?;
        let persisted = tx.insert_order(new_order).await?;
        let cleared = tx.clear_cart(order.customer_id).await?;
        if cleared > 0 {
            info!(customer_id = order.customer_id, cleared, "cart cleared");
        }
        Ok(persisted)
    }

    /// Moves an order to `status`. Setting the current status again changes
    /// nothing and sends no notification. Cancelling puts the items' stock back.
    #[instrument(skip(self))]
    pub async fn update_order_status(&self, order_id: i64, status: OrderStatus) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        let result = self.update_in(tx.as_mut(), order_id, status).await;
        let mut order = match result {
            Ok(order) => order,
            Err(e) => {
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "rollback failed");
                }
                return Err(e);
            }
        };
        tx.commit().await?;
        self.publish(&mut order);
        Ok(order)
    }

    async fn update_in(&self, tx: &mut dyn Transaction, order_id: i64, status: OrderStatus) -> Result<Order> {
        let mut order = tx.find_order_for_update(order_id).await?
            .ok_or(OrderError::OrderNotFound(order_id))?;
        let change = order.apply_status(status)?;
        if !change.changed() {
            return Ok(order);
        }

        tx.update_order_status(order.id, order.status, order.tracking_number.as_deref()).await?;
        if change.is_cancellation() {
            for item in &order.items {
                match self.ledger.release(tx, item.product_id, item.quantity).await {
                    Ok(_) => {}
                    Err(StockError::ProductNotFound(product_id)) => {
                        warn!(order_id, product_id, "product gone, stock not returned");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
        info!(order_id, from = %change.from, to = %change.to, "order status updated");
        Ok(order)
    }

    pub async fn get_order_by_id(&self, order_id: i64) -> Result<Order> {
        self.store.find_order(order_id).await?.ok_or(OrderError::OrderNotFound(order_id))
    }

    pub async fn orders_for_customer(&self, customer_id: i64) -> Result<Vec<Order>> {
        Ok(self.store.orders_for_customer(customer_id).await?)
    }

    /// Quotes a coupon against an order total without redeeming it.
    pub async fn preview_coupon(&self, code: &str, order_total: Decimal) -> std::result::Result<AppliedCoupon, CouponError> {
        self.coupons.preview(self.store.as_ref(), code, order_total).await
    }

    fn publish(&self, order: &mut Order) {
        for event in order.take_events() {
            match event {
                DomainEvent::Order(OrderEvent::Placed { .. }) => self.notifications.order_confirmed(order.clone()),
                DomainEvent::Order(OrderEvent::StatusChanged { .. }) => self.notifications.order_status_changed(order.clone()),
            }
        }
    }
}
