//! Postgres store on top of sqlx.
//!
//! Stock and coupon counters are changed with conditional `UPDATE ... RETURNING`
//! statements; Postgres row locks serialize concurrent writers for the duration
//! of the enclosing transaction, so read-committed isolation is enough.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{PgConnection, Postgres};
use std::collections::HashMap;

use super::{CustomerContact, CustomerDirectory, Store, StoreError, StoreResult, Transaction};
use crate::domain::aggregates::{CartLine, Coupon, NewOrder, Order, OrderItem, OrderStatus, Product, ShippingDetails};
use crate::domain::value_objects::CouponCode;

#[derive(Clone)]
pub struct PgStore { pool: PgPool }

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }

    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(database_url).await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    pub fn pool(&self) -> &PgPool { &self.pool }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64, customer_id: i64, total_amount: Decimal, order_date: DateTime<Utc>, status: String,
    tracking_number: Option<String>, coupon_code: Option<String>, discount_amount: Option<Decimal>,
    shipping_address: Option<String>, street: Option<String>, city: Option<String>, state: Option<String>,
    country: Option<String>, pincode: Option<String>, location: Option<String>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> StoreResult<Order> {
        let status: OrderStatus = self.status.parse().map_err(StoreError::Corrupt)?;
        let shipping = ShippingDetails {
            shipping_address: self.shipping_address, street: self.street, city: self.city, state: self.state,
            country: self.country, pincode: self.pincode, location: self.location,
        };
        Ok(Order::restore(
            self.id, self.customer_id, self.total_amount, self.order_date, status, self.tracking_number,
            self.coupon_code, self.discount_amount, shipping, items,
        ))
    }
}

#[derive(sqlx::FromRow)]
struct OrderItemRow { id: i64, order_id: i64, product_id: i64, product_name: String, price: Decimal, quantity: i32 }

#[derive(sqlx::FromRow)]
struct CouponRow {
    id: i64, code: String, discount_type: String, discount_value: Decimal,
    min_order_amount: Option<Decimal>, max_discount: Option<Decimal>, expiry_date: Option<DateTime<Utc>>,
    usage_limit: Option<i32>, used_count: i32, is_active: bool,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = StoreError;
    fn try_from(r: CouponRow) -> StoreResult<Self> {
        Ok(Coupon {
            id: r.id,
            code: CouponCode::new(r.code).map_err(|e| StoreError::Corrupt(e.to_string()))?,
            discount_type: r.discount_type.parse().map_err(StoreError::Corrupt)?,
            discount_value: r.discount_value, min_order_amount: r.min_order_amount, max_discount: r.max_discount,
            expiry_date: r.expiry_date, usage_limit: r.usage_limit, used_count: r.used_count, is_active: r.is_active,
        })
    }
}

const SELECT_ORDER: &str = "SELECT id, customer_id, total_amount, order_date, status, tracking_number, coupon_code, discount_amount, shipping_address, street, city, state, country, pincode, location FROM orders";

async fn fetch_items(conn: &mut PgConnection, order_ids: &[i64]) -> StoreResult<HashMap<i64, Vec<OrderItem>>> {
    let rows = sqlx::query_as::<_, OrderItemRow>("SELECT id, order_id, product_id, product_name, price, quantity FROM order_items WHERE order_id = ANY($1) ORDER BY id")
        .bind(order_ids).fetch_all(conn).await?;
    let mut by_order: HashMap<i64, Vec<OrderItem>> = HashMap::new();
    for r in rows {
        by_order.entry(r.order_id).or_default().push(OrderItem {
            id: r.id, product_id: r.product_id, product_name: r.product_name, price: r.price, quantity: r.quantity,
        });
    }
    Ok(by_order)
}

async fn hydrate(conn: &mut PgConnection, rows: Vec<OrderRow>) -> StoreResult<Vec<Order>> {
    let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
    let mut items = fetch_items(conn, &ids).await?;
    rows.into_iter().map(|r| {
        let lines = items.remove(&r.id).unwrap_or_default();
        r.into_order(lines)
    }).collect()
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> StoreResult<Box<dyn Transaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }

    async fn find_order(&self, order_id: i64) -> StoreResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDER} WHERE id = $1"))
            .bind(order_id).fetch_optional(&mut *conn).await?;
        match row {
            Some(row) => Ok(hydrate(&mut conn, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn orders_for_customer(&self, customer_id: i64) -> StoreResult<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDER} WHERE customer_id = $1 ORDER BY order_date DESC, id DESC"))
            .bind(customer_id).fetch_all(&mut *conn).await?;
        hydrate(&mut conn, rows).await
    }
}

#[async_trait]
impl CustomerDirectory for PgStore {
    async fn get_customer_by_id(&self, customer_id: i64) -> StoreResult<Option<CustomerContact>> {
        let contact = sqlx::query_as::<_, CustomerContact>("SELECT email, name FROM customers WHERE id = $1")
            .bind(customer_id).fetch_optional(&self.pool).await?;
        Ok(contact)
    }
}

pub struct PgTransaction { tx: sqlx::Transaction<'static, Postgres> }

#[async_trait]
impl Transaction for PgTransaction {
    async fn find_product(&mut self, product_id: i64) -> StoreResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>("SELECT id, name, price, stock_quantity FROM products WHERE id = $1")
            .bind(product_id).fetch_optional(&mut *self.tx).await?;
        Ok(product)
    }

    async fn decrement_stock(&mut self, product_id: i64, quantity: i32) -> StoreResult<Option<i32>> {
        let remaining: Option<(i32,)> = sqlx::query_as(
            "UPDATE products SET stock_quantity = stock_quantity - $2 WHERE id = $1 AND $2 > 0 AND stock_quantity >= $2 RETURNING stock_quantity",
        )
        .bind(product_id).bind(quantity).fetch_optional(&mut *self.tx).await?;
        Ok(remaining.map(|(stock,)| stock))
    }

    async fn increment_stock(&mut self, product_id: i64, quantity: i32) -> StoreResult<Option<i32>> {
        let stock: Option<(i32,)> = sqlx::query_as(
            "UPDATE products SET stock_quantity = stock_quantity + $2 WHERE id = $1 RETURNING stock_quantity",
        )
        .bind(product_id).bind(quantity.max(0)).fetch_optional(&mut *self.tx).await?;
        Ok(stock.map(|(stock,)| stock))
    }

    async fn find_coupon(&mut self, code: &CouponCode) -> StoreResult<Option<Coupon>> {
        let row = sqlx::query_as::<_, CouponRow>(
            "SELECT id, code, discount_type, discount_value, min_order_amount, max_discount, expiry_date, usage_limit, used_count, is_active FROM coupons WHERE code = $1",
        )
        .bind(code.as_str()).fetch_optional(&mut *self.tx).await?;
        row.map(Coupon::try_from).transpose()
    }

    async fn redeem_coupon(&mut self, code: &CouponCode) -> StoreResult<Option<i32>> {
        let used: Option<(i32,)> = sqlx::query_as(
            "UPDATE coupons SET used_count = used_count + 1 \
             WHERE code = $1 AND is_active \
               AND (usage_limit IS NULL OR used_count < usage_limit) \
               AND (expiry_date IS NULL OR expiry_date >= NOW()) \
             RETURNING used_count",
        )
        .bind(code.as_str()).fetch_optional(&mut *self.tx).await?;
        Ok(used.map(|(count,)| count))
    }

    async fn insert_order(&mut self, order: NewOrder) -> StoreResult<Order> {
        let s = &order.shipping;
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO orders (customer_id, total_amount, order_date, status, coupon_code, discount_amount, shipping_address, street, city, state, country, pincode, location) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) RETURNING id",
        )
        .bind(order.customer_id).bind(order.total_amount).bind(order.order_date).bind(order.status.as_str())
        .bind(order.coupon_code.as_ref().map(CouponCode::as_str)).bind(order.discount_amount)
        .bind(&s.shipping_address).bind(&s.street).bind(&s.city).bind(&s.state).bind(&s.country).bind(&s.pincode).bind(&s.location)
        .fetch_one(&mut *self.tx).await?;

        let mut item_ids = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let (item_id,): (i64,) = sqlx::query_as(
                "INSERT INTO order_items (order_id, product_id, product_name, price, quantity) VALUES ($1, $2, $3, $4, $5) RETURNING id",
            )
            .bind(id).bind(item.product_id).bind(&item.product_name).bind(item.price).bind(item.quantity)
            .fetch_one(&mut *self.tx).await?;
            item_ids.push(item_id);
        }
        Ok(order.into_order(id, &item_ids))
    }

    async fn find_order_for_update(&mut self, order_id: i64) -> StoreResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!("{SELECT_ORDER} WHERE id = $1 FOR UPDATE"))
            .bind(order_id).fetch_optional(&mut *self.tx).await?;
        match row {
            Some(row) => Ok(hydrate(&mut self.tx, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn update_order_status(&mut self, order_id: i64, status: OrderStatus, tracking_number: Option<&str>) -> StoreResult<()> {
        let result = sqlx::query("UPDATE orders SET status = $2, tracking_number = $3 WHERE id = $1")
            .bind(order_id).bind(status.as_str()).bind(tracking_number)
            .execute(&mut *self.tx).await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Corrupt(format!("order {order_id} vanished mid-transaction")));
        }
        Ok(())
    }

    async fn cart_lines(&mut self, customer_id: i64) -> StoreResult<Vec<CartLine>> {
        let lines = sqlx::query_as::<_, CartLine>("SELECT id, customer_id, product_id, quantity FROM cart_items WHERE customer_id = $1 ORDER BY id")
            .bind(customer_id).fetch_all(&mut *self.tx).await?;
        Ok(lines)
    }

    async fn find_cart_line(&mut self, customer_id: i64, product_id: i64) -> StoreResult<Option<CartLine>> {
        let line = sqlx::query_as::<_, CartLine>("SELECT id, customer_id, product_id, quantity FROM cart_items WHERE customer_id = $1 AND product_id = $2 FOR UPDATE")
            .bind(customer_id).bind(product_id).fetch_optional(&mut *self.tx).await?;
        Ok(line)
    }

    async fn upsert_cart_line(&mut self, customer_id: i64, product_id: i64, quantity: i32) -> StoreResult<CartLine> {
        let line = sqlx::query_as::<_, CartLine>(
            "INSERT INTO cart_items (customer_id, product_id, quantity) VALUES ($1, $2, $3) \
             ON CONFLICT (customer_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity \
             RETURNING id, customer_id, product_id, quantity",
        )
        .bind(customer_id).bind(product_id).bind(quantity).fetch_one(&mut *self.tx).await?;
        Ok(line)
    }

    async fn delete_cart_line(&mut self, line_id: i64) -> StoreResult<()> {
        sqlx::query("DELETE FROM cart_items WHERE id = $1").bind(line_id).execute(&mut *self.tx).await?;
        Ok(())
    }

    async fn clear_cart(&mut self, customer_id: i64) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE customer_id = $1").bind(customer_id).execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
