//! Integration tests for payment initiation.

use std::time::Duration;

use chrono::Utc;
use common::{Money, PaymentId, ResourceId, UserId};
use domain::{
    ChargeStatus, CreateOrder, CreatePayment, DomainError, OrderService, PaymentError,
    PaymentService, RequestTransition, SandboxGateway, required_purposes,
};
use rental_store::{
    Availability, InMemoryRentalStore, InMemoryResourceCatalog, Order, OrderStatus, PaymentMethod,
    PaymentPurpose, PaymentQuery, PaymentStatus, RentalStore, Resource,
};

struct TestHarness {
    orders: OrderService<InMemoryRentalStore, InMemoryResourceCatalog>,
    payments: PaymentService<InMemoryRentalStore, SandboxGateway>,
    gateway: SandboxGateway,
    owner: UserId,
    renter: UserId,
    resource: ResourceId,
}

impl TestHarness {
    async fn new(deposit: Money) -> Self {
        let store = InMemoryRentalStore::new();
        let catalog = InMemoryResourceCatalog::new();
        let gateway = SandboxGateway::new("wx-test");
        let owner = UserId::new();
        let resource = ResourceId::new();
        catalog
            .insert(Resource {
                id: resource,
                owner_id: owner,
                daily_rate: Money::from_major(50),
                deposit,
                availability: Availability::Available,
            })
            .await;

        Self {
            orders: OrderService::new(store.clone(), catalog),
            payments: PaymentService::new(store, gateway.clone())
                .with_timeout(Duration::from_millis(200)),
            gateway,
            owner,
            renter: UserId::new(),
            resource,
        }
    }

    async fn order(&self) -> Order {
        let today = Utc::now().date_naive();
        self.orders
            .create_order(CreateOrder::new(
                self.renter,
                self.resource,
                today + chrono::Duration::days(3),
                today + chrono::Duration::days(6),
            ))
            .await
            .unwrap()
    }
}

fn payment_error(err: DomainError) -> PaymentError {
    match err {
        DomainError::Payment(e) => e,
        other => panic!("expected payment error, got {other:?}"),
    }
}

#[tokio::test]
async fn create_payment_uses_price_snapshot() {
    let h = TestHarness::new(Money::from_major(50)).await;
    let order = h.order().await;

    let rent = h
        .payments
        .create_payment(
            CreatePayment::new(order.id, h.renter, PaymentPurpose::Rent)
                .method(PaymentMethod::Alipay),
        )
        .await
        .unwrap();
    assert_eq!(rent.payment.amount, Money::from_major(150));
    assert_eq!(rent.payment.status, PaymentStatus::Pending);
    assert_eq!(rent.payment.method, PaymentMethod::Alipay);
    assert!(rent.payment.payment_no.starts_with("PAY"));
    assert_eq!(rent.gateway_params.payment_no, rent.payment.payment_no);
    assert_eq!(rent.gateway_params.amount, 15000);
    assert_eq!(rent.gateway_params.app_id, "wx-test");

    let deposit = h
        .payments
        .create_payment(CreatePayment::new(order.id, h.renter, PaymentPurpose::Deposit))
        .await
        .unwrap();
    assert_eq!(deposit.payment.amount, Money::from_major(50));
    assert_eq!(h.gateway.charge_count().await, 2);
}

#[tokio::test]
async fn required_purposes_depend_on_deposit() {
    let with_deposit = TestHarness::new(Money::from_major(50)).await;
    let order = with_deposit.order().await;
    assert_eq!(
        required_purposes(&order),
        vec![PaymentPurpose::Rent, PaymentPurpose::Deposit]
    );

    let without = TestHarness::new(Money::zero()).await;
    let order = without.order().await;
    assert_eq!(
        required_purposes(&order),
        vec![PaymentPurpose::Rent]
    );

    // Zero deposit cannot be charged
    let err = without
        .payments
        .create_payment(CreatePayment::new(order.id, without.renter, PaymentPurpose::Deposit))
        .await
        .unwrap_err();
    assert!(matches!(payment_error(err), PaymentError::InvalidAmount(0)));
}

#[tokio::test]
async fn one_pending_payment_per_purpose() {
    let h = TestHarness::new(Money::from_major(50)).await;
    let order = h.order().await;

    h.payments
        .create_payment(CreatePayment::new(order.id, h.renter, PaymentPurpose::Rent))
        .await
        .unwrap();
    let err = h
        .payments
        .create_payment(CreatePayment::new(order.id, h.renter, PaymentPurpose::Rent))
        .await
        .unwrap_err();
    assert!(matches!(
        payment_error(err),
        PaymentError::DuplicatePendingPayment { .. }
    ));
}

#[tokio::test]
async fn concurrent_creates_leave_one_pending() {
    let h = TestHarness::new(Money::from_major(50)).await;
    let order = h.order().await;
    let payments = std::sync::Arc::new(h.payments);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let payments = payments.clone();
        let cmd = CreatePayment::new(order.id, h.renter, PaymentPurpose::Rent);
        handles.push(tokio::spawn(async move { payments.create_payment(cmd).await }));
    }

    let mut created = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            created += 1;
        }
    }
    assert_eq!(created, 1);
}

#[tokio::test]
async fn payment_rejections() {
    let h = TestHarness::new(Money::from_major(50)).await;
    let order = h.order().await;

    let err = h
        .payments
        .create_payment(CreatePayment::new(order.id, h.owner, PaymentPurpose::Rent))
        .await
        .unwrap_err();
    assert!(matches!(payment_error(err), PaymentError::Forbidden));

    let err = h
        .payments
        .create_payment(CreatePayment::new(order.id, h.renter, PaymentPurpose::Refund))
        .await
        .unwrap_err();
    assert!(matches!(payment_error(err), PaymentError::Validation(_)));

    h.orders
        .request_transition(RequestTransition::new(order.id, h.renter, OrderStatus::Cancelled))
        .await
        .unwrap();
    let err = h
        .payments
        .create_payment(CreatePayment::new(order.id, h.renter, PaymentPurpose::Rent))
        .await
        .unwrap_err();
    assert!(matches!(
        payment_error(err),
        PaymentError::OrderNotPayable {
            status: OrderStatus::Cancelled
        }
    ));
}

#[tokio::test]
async fn gateway_outage_keeps_payment_pending() {
    let h = TestHarness::new(Money::from_major(50)).await;
    let order = h.order().await;
    h.gateway.set_fail_on_charge(true).await;

    let err = h
        .payments
        .create_payment(CreatePayment::new(order.id, h.renter, PaymentPurpose::Rent))
        .await
        .unwrap_err();
    assert!(err.is_infrastructure());
    let PaymentError::GatewayUnavailable { payment_no, .. } = payment_error(err) else {
        panic!("expected gateway error");
    };

    let stored = h
        .payments
        .store()
        .get_payment_by_no(&payment_no)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, PaymentStatus::Pending);
}

#[tokio::test(start_paused = true)]
async fn gateway_call_is_bounded() {
    let h = TestHarness::new(Money::from_major(50)).await;
    let order = h.order().await;
    h.gateway.set_delay(Some(Duration::from_secs(30))).await;

    let err = h
        .payments
        .create_payment(CreatePayment::new(order.id, h.renter, PaymentPurpose::Rent))
        .await
        .unwrap_err();
    let PaymentError::GatewayUnavailable { reason, .. } = payment_error(err) else {
        panic!("expected gateway error");
    };
    assert!(reason.contains("timed out"));
}

#[tokio::test]
async fn cancel_is_payer_only_and_once() {
    let h = TestHarness::new(Money::from_major(50)).await;
    let order = h.order().await;
    let intent = h
        .payments
        .create_payment(CreatePayment::new(order.id, h.renter, PaymentPurpose::Rent))
        .await
        .unwrap();

    let err = h
        .payments
        .cancel_payment(intent.payment.id, h.owner)
        .await
        .unwrap_err();
    assert!(matches!(payment_error(err), PaymentError::NotFound(_)));

    let cancelled = h
        .payments
        .cancel_payment(intent.payment.id, h.renter)
        .await
        .unwrap();
    assert_eq!(cancelled.status, PaymentStatus::Cancelled);

    let err = h
        .payments
        .cancel_payment(intent.payment.id, h.renter)
        .await
        .unwrap_err();
    assert!(matches!(
        payment_error(err),
        PaymentError::NotPending {
            status: PaymentStatus::Cancelled
        }
    ));

    // A fresh attempt is possible after cancelling
    h.payments
        .create_payment(CreatePayment::new(order.id, h.renter, PaymentPurpose::Rent))
        .await
        .unwrap();
}

#[tokio::test]
async fn get_and_list_are_scoped_to_payer() {
    let h = TestHarness::new(Money::from_major(50)).await;
    let order = h.order().await;
    let intent = h
        .payments
        .create_payment(CreatePayment::new(order.id, h.renter, PaymentPurpose::Rent))
        .await
        .unwrap();

    assert!(h.payments.get_payment(intent.payment.id, h.renter).await.is_ok());
    assert!(h.payments.get_payment(intent.payment.id, h.owner).await.is_err());
    assert!(h.payments.get_payment(PaymentId::new(), h.renter).await.is_err());

    let mine = h
        .payments
        .list_payments(PaymentQuery::for_payer(h.renter))
        .await
        .unwrap();
    assert_eq!(mine.total, 1);
    let theirs = h
        .payments
        .list_payments(PaymentQuery::for_payer(h.owner))
        .await
        .unwrap();
    assert_eq!(theirs.total, 0);
}

#[tokio::test]
async fn query_gateway_reports_charge_state() {
    let h = TestHarness::new(Money::from_major(50)).await;
    let order = h.order().await;
    let intent = h
        .payments
        .create_payment(CreatePayment::new(order.id, h.renter, PaymentPurpose::Rent))
        .await
        .unwrap();
    let payment_no = intent.payment.payment_no;

    assert_eq!(
        h.payments.query_gateway(&payment_no).await.unwrap(),
        ChargeStatus::NotPaid
    );

    h.gateway.settle(&payment_no, "TX-9").await;
    assert!(matches!(
        h.payments.query_gateway(&payment_no).await.unwrap(),
        ChargeStatus::Paid { .. }
    ));

    h.gateway.set_fail_on_query(true).await;
    assert!(matches!(
        h.payments.query_gateway(&payment_no).await,
        Err(PaymentError::GatewayUnavailable { .. })
    ));
}
