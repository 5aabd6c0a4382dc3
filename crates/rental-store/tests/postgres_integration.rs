//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p rental-store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use common::{Money, OrderId, PaymentId, RentalPeriod, ResourceId, UserId};
use rental_store::{
    Availability, Order, OrderQuery, OrderScope, OrderStatus, PageRequest, Payment, PaymentMethod,
    PaymentPurpose, PaymentQuery, PaymentStatus, PostgresRentalStore, PostgresResourceCatalog,
    RentalStore, RentalStoreExt, Resource, ResourceCatalog, Settlement, StoreError,
};
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_rental_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh pool with cleared tables
async fn get_test_pool() -> PgPool {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE payments, orders, resources")
        .execute(&pool)
        .await
        .unwrap();

    pool
}

fn period(start: u32, end: u32) -> RentalPeriod {
    RentalPeriod::new(
        NaiveDate::from_ymd_opt(2030, 6, start).unwrap(),
        NaiveDate::from_ymd_opt(2030, 6, end).unwrap(),
    )
    .unwrap()
}

fn new_order(resource_id: ResourceId, period: RentalPeriod, status: OrderStatus) -> Order {
    let now = Utc::now();
    let id = OrderId::new();
    Order {
        id,
        order_no: format!("RO{}", &id.to_string()[..12]),
        resource_id,
        renter_id: UserId::new(),
        owner_id: UserId::new(),
        period,
        days: period.days(),
        daily_price: Money::from_minor(5000),
        total_price: Money::from_minor(5000 * period.days()),
        deposit: Money::from_minor(5000),
        status,
        remark: None,
        created_at: now,
        updated_at: now,
    }
}

fn new_payment(order: &Order, purpose: PaymentPurpose) -> Payment {
    let now = Utc::now();
    let id = PaymentId::new();
    Payment {
        id,
        payment_no: format!("PAY{}", &id.to_string()[..12]),
        order_id: order.id,
        payer_id: order.renter_id,
        purpose,
        method: PaymentMethod::Wechat,
        amount: order.total_price,
        status: PaymentStatus::Pending,
        external_transaction_id: None,
        raw_notify_payload: None,
        paid_at: None,
        created_at: now,
        updated_at: now,
    }
}

fn success(tx: &str) -> Settlement {
    Settlement {
        status: PaymentStatus::Success,
        external_transaction_id: Some(tx.to_string()),
        raw_payload: serde_json::json!({"transaction_id": tx, "result_code": "SUCCESS"}),
        paid_at: Some(Utc::now()),
    }
}

#[tokio::test]
async fn insert_and_fetch_order() {
    let store = PostgresRentalStore::new(get_test_pool().await);
    let order = new_order(ResourceId::new(), period(1, 4), OrderStatus::Pending);

    store.insert_order(order.clone()).await.unwrap();

    let by_id = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(by_id.order_no, order.order_no);
    assert_eq!(by_id.period, order.period);
    assert_eq!(by_id.total_price, Money::from_minor(15000));
    assert_eq!(by_id.status, OrderStatus::Pending);

    let by_no = store.get_order_by_no(&order.order_no).await.unwrap();
    assert_eq!(by_no.map(|o| o.id), Some(order.id));
}

#[tokio::test]
async fn insert_rejects_overlap_with_confirmed_order() {
    let store = PostgresRentalStore::new(get_test_pool().await);
    let resource = ResourceId::new();
    store
        .insert_order(new_order(resource, period(1, 4), OrderStatus::Confirmed))
        .await
        .unwrap();

    let result = store
        .insert_order(new_order(resource, period(3, 6), OrderStatus::Pending))
        .await;
    assert!(matches!(result, Err(StoreError::DateRangeConflict { .. })));

    // Half-open ranges: touching end and start do not overlap
    store
        .insert_order(new_order(resource, period(4, 6), OrderStatus::Pending))
        .await
        .unwrap();
}

#[tokio::test]
async fn duplicate_order_number_is_rejected() {
    let store = PostgresRentalStore::new(get_test_pool().await);
    let first = new_order(ResourceId::new(), period(1, 2), OrderStatus::Pending);
    let mut second = new_order(ResourceId::new(), period(1, 2), OrderStatus::Pending);
    second.order_no = first.order_no.clone();

    store.insert_order(first).await.unwrap();
    let result = store.insert_order(second).await;
    assert!(matches!(result, Err(StoreError::DuplicateKey(_))));
}

#[tokio::test]
async fn concurrent_confirmations_have_one_winner() {
    let store = PostgresRentalStore::new(get_test_pool().await);
    let resource = ResourceId::new();

    let mut ids = Vec::new();
    for _ in 0..8 {
        let order = store
            .insert_order(new_order(resource, period(10, 13), OrderStatus::Pending))
            .await
            .unwrap();
        ids.push(order.id);
    }

    let mut handles = Vec::new();
    for id in ids {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .update_order_status(id, OrderStatus::Pending, OrderStatus::Confirmed, None)
                .await
        }));
    }

    let mut confirmed = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(Some(_)) => confirmed += 1,
            Err(StoreError::DateRangeConflict { .. }) => conflicts += 1,
            other => panic!("unexpected result: {other:?}"),
        }
    }

    assert_eq!(confirmed, 1);
    assert_eq!(conflicts, 7);
}

#[tokio::test]
async fn update_status_compare_and_set() {
    let store = PostgresRentalStore::new(get_test_pool().await);
    let order = store
        .insert_order(new_order(ResourceId::new(), period(1, 4), OrderStatus::Pending))
        .await
        .unwrap();

    let updated = store
        .update_order_status(
            order.id,
            OrderStatus::Pending,
            OrderStatus::Cancelled,
            Some("changed plans".to_string()),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, OrderStatus::Cancelled);
    assert_eq!(updated.remark.as_deref(), Some("changed plans"));

    let stale = store
        .update_order_status(order.id, OrderStatus::Pending, OrderStatus::Confirmed, None)
        .await
        .unwrap();
    assert!(stale.is_none());

    let missing = store
        .update_order_status(OrderId::new(), OrderStatus::Pending, OrderStatus::Confirmed, None)
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn query_orders_by_scope_and_status() {
    let store = PostgresRentalStore::new(get_test_pool().await);
    let me = UserId::new();

    for day in 1..=3 {
        let mut order = new_order(ResourceId::new(), period(day, day + 1), OrderStatus::Pending);
        order.renter_id = me;
        store.insert_order(order).await.unwrap();
    }
    let mut owned = new_order(ResourceId::new(), period(1, 2), OrderStatus::Completed);
    owned.owner_id = me;
    store.insert_order(owned).await.unwrap();

    let all = store.query_orders(&OrderQuery::for_user(me)).await.unwrap();
    assert_eq!(all.total, 4);

    let rented = store
        .query_orders(
            &OrderQuery::for_user(me)
                .scope(OrderScope::Rented)
                .page(PageRequest::new(2, 2)),
        )
        .await
        .unwrap();
    assert_eq!(rented.total, 3);
    assert_eq!(rented.items.len(), 1);

    let owned_completed = store
        .query_orders(
            &OrderQuery::for_user(me)
                .scope(OrderScope::Owned)
                .status(OrderStatus::Completed),
        )
        .await
        .unwrap();
    assert_eq!(owned_completed.total, 1);

    let stats = store.order_stats(me).await.unwrap();
    assert_eq!(stats.rented_count, 3);
    assert_eq!(stats.owned_count, 1);
    assert_eq!(stats.pending_count, 3);
    assert_eq!(stats.completed_count, 1);
    assert_eq!(stats.total_earned, 5000);
    assert_eq!(stats.total_spent, 0);
}

#[tokio::test]
async fn one_pending_payment_per_purpose() {
    let store = PostgresRentalStore::new(get_test_pool().await);
    let order = store
        .insert_order(new_order(ResourceId::new(), period(1, 4), OrderStatus::Pending))
        .await
        .unwrap();

    let rent = store
        .insert_payment(new_payment(&order, PaymentPurpose::Rent))
        .await
        .unwrap();
    let result = store
        .insert_payment(new_payment(&order, PaymentPurpose::Rent))
        .await;
    assert!(matches!(
        result,
        Err(StoreError::DuplicatePendingPayment { .. })
    ));

    // Once the first one is cancelled a new attempt is allowed
    store.cancel_payment(rent.id).await.unwrap().unwrap();
    store
        .insert_payment(new_payment(&order, PaymentPurpose::Rent))
        .await
        .unwrap();

    assert!(
        store
            .pending_payment(order.id, PaymentPurpose::Rent)
            .await
            .unwrap()
            .is_some()
    );
}

#[tokio::test]
async fn concurrent_settlements_have_one_winner() {
    let store = PostgresRentalStore::new(get_test_pool().await);
    let order = store
        .insert_order(new_order(ResourceId::new(), period(1, 4), OrderStatus::Pending))
        .await
        .unwrap();
    let payment = store
        .insert_payment(new_payment(&order, PaymentPurpose::Rent))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let store = store.clone();
        let payment_no = payment.payment_no.clone();
        handles.push(tokio::spawn(async move {
            store.settle_payment(&payment_no, success("TX-42")).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().is_some() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);

    let stored = store.get_payment(payment.id).await.unwrap().unwrap();
    assert_eq!(stored.status, PaymentStatus::Success);
    assert_eq!(stored.external_transaction_id.as_deref(), Some("TX-42"));
    assert!(stored.raw_notify_payload.is_some());
    assert!(store.is_paid(order.id, PaymentPurpose::Rent).await.unwrap());

    let listed = store
        .query_payments(&PaymentQuery::for_payer(order.renter_id).order_id(order.id))
        .await
        .unwrap();
    assert_eq!(listed.total, 1);
}

#[tokio::test]
async fn settlement_keeps_long_transaction_ids() {
    let store = PostgresRentalStore::new(get_test_pool().await);
    let order = store
        .insert_order(new_order(ResourceId::new(), period(1, 4), OrderStatus::Pending))
        .await
        .unwrap();
    let payment = store
        .insert_payment(new_payment(&order, PaymentPurpose::Rent))
        .await
        .unwrap();

    let tx = format!("TX-{}", "9".repeat(200));
    let settled = store
        .settle_payment(&payment.payment_no, success(&tx))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(settled.external_transaction_id.as_deref(), Some(tx.as_str()));
}

#[tokio::test]
async fn catalog_round_trip() {
    let pool = get_test_pool().await;
    let catalog = PostgresResourceCatalog::new(pool);
    let resource = Resource {
        id: ResourceId::new(),
        owner_id: UserId::new(),
        daily_rate: Money::from_minor(5000),
        deposit: Money::from_minor(5000),
        availability: Availability::Available,
    };
    catalog.upsert(&resource).await.unwrap();

    assert!(
        catalog
            .set_availability(resource.id, Availability::Rented)
            .await
            .unwrap()
    );
    let stored = catalog.get_resource(resource.id).await.unwrap().unwrap();
    assert_eq!(stored.availability, Availability::Rented);

    assert!(
        !catalog
            .set_availability(ResourceId::new(), Availability::Rented)
            .await
            .unwrap()
    );
}
