mod common;

use rust_decimal_macros::dec;
use std::sync::Arc;

use common::*;
use greencart_orders::domain::aggregates::Coupon;
use greencart_orders::services::CouponError;
use greencart_orders::OrderError;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_orders_race_for_the_same_stock() {
    let h = Harness::new().await;
    seed_product(&h.store, 1, dec!(20), 5).await;

    let tasks: Vec<_> = (0..2).map(|n| {
        let orders = Arc::clone(&h.orders);
        tokio::spawn(async move { orders.place_order(request(100 + n, vec![line(1, dec!(20), 3)], None)).await })
    }).collect();
    let mut results = Vec::new();
    for task in tasks {
        results.push(task.await.unwrap());
    }

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let rejected = results.into_iter().find_map(Result::err).unwrap();
    match rejected {
        OrderError::InsufficientStock { product_id: 1, available, requested: 3 } => assert!(available == 5 || available == 2),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(h.store.product(1).await.unwrap().stock_quantity, 2);
    assert_eq!(h.store.order_count().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_coupon_usage_limit_holds_under_contention() {
    let h = Harness::new().await;
    seed_product(&h.store, 1, dec!(100), 1_000).await;
    seed_coupon(&h.store, Coupon::fixed(1, code("LAST3"), dec!(10)).with_usage_limit(3)).await;

    let tasks: Vec<_> = (0..10).map(|n| {
        let orders = Arc::clone(&h.orders);
        tokio::spawn(async move { orders.place_order(request(200 + n, vec![line(1, dec!(100), 1)], Some("LAST3"))).await })
    }).collect();
    let mut ok = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(order) => {
                assert_eq!(order.total_amount, dec!(90));
                ok += 1;
            }
            Err(OrderError::Coupon(CouponError::UsageLimitReached)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(ok, 3);
    assert_eq!(h.store.coupon(&code("LAST3")).await.unwrap().used_count, 3);
    assert_eq!(h.store.product(1).await.unwrap().stock_quantity, 997);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_stock_matches_successful_reservations() {
    let h = Harness::new().await;
    seed_product(&h.store, 1, dec!(5), 25).await;
    seed_product(&h.store, 2, dec!(8), 12).await;

    let tasks: Vec<_> = (0..30).map(|n: i64| {
        let orders = Arc::clone(&h.orders);
        let (q1, q2) = ((n % 4 + 1) as i32, (n % 3) as i32);
        tokio::spawn(async move {
            let mut items = vec![line(1, dec!(5), q1)];
            if q2 > 0 {
                items.push(line(2, dec!(8), q2));
            }
            orders.place_order(request(300 + n, items, None)).await
        })
    }).collect();

    let (mut taken1, mut taken2) = (0, 0);
    for task in tasks {
        match task.await.unwrap() {
            Ok(order) => {
                assert_eq!(order.total_amount, order.subtotal());
                for item in &order.items {
                    match item.product_id {
                        1 => taken1 += item.quantity,
                        _ => taken2 += item.quantity,
                    }
                }
            }
            Err(OrderError::InsufficientStock { .. }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    let stock1 = h.store.product(1).await.unwrap().stock_quantity;
    let stock2 = h.store.product(2).await.unwrap().stock_quantity;
    assert!(stock1 >= 0 && stock2 >= 0);
    assert_eq!(stock1, 25 - taken1);
    assert_eq!(stock2, 12 - taken2);
}
