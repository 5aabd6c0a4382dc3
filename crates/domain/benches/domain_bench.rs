use chrono::{Duration, NaiveDate, Utc};
use common::{Money, RentalPeriod, ResourceId, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{CreateOrder, OrderService, Quote, RequestTransition, Role, decide};
use rental_store::{
    Availability, InMemoryRentalStore, InMemoryResourceCatalog, OrderStatus, Resource,
};

async fn seeded_service() -> (
    OrderService<InMemoryRentalStore, InMemoryResourceCatalog>,
    ResourceId,
) {
    let catalog = InMemoryResourceCatalog::new();
    let resource = ResourceId::new();
    catalog
        .insert(Resource {
            id: resource,
            owner_id: UserId::new(),
            daily_rate: Money::from_major(50),
            deposit: Money::from_major(100),
            availability: Availability::Available,
        })
        .await;
    (OrderService::new(InMemoryRentalStore::new(), catalog), resource)
}

fn bench_decide(c: &mut Criterion) {
    c.bench_function("domain/decide_full_matrix", |b| {
        b.iter(|| {
            let mut allowed = 0;
            for current in OrderStatus::ALL {
                for target in OrderStatus::ALL {
                    for role in Role::ALL {
                        if decide(current, target, role).is_ok() {
                            allowed += 1;
                        }
                    }
                }
            }
            std::hint::black_box(allowed)
        });
    });
}

fn bench_quote(c: &mut Criterion) {
    let start = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
    let period = RentalPeriod::new(start, start + Duration::days(30)).unwrap();

    c.bench_function("domain/quote", |b| {
        b.iter(|| {
            Quote::compute(
                std::hint::black_box(period),
                Money::from_major(50),
                Money::from_major(100),
            )
            .unwrap()
        });
    });
}

fn bench_create_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let start = Utc::now().date_naive() + Duration::days(1);

    c.bench_function("domain/create_order", |b| {
        b.iter(|| {
            rt.block_on(async {
                let (service, resource) = seeded_service().await;
                let cmd =
                    CreateOrder::new(UserId::new(), resource, start, start + Duration::days(3));
                service.create_order(cmd).await.unwrap();
            });
        });
    });
}

fn bench_booking_cycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let start = Utc::now().date_naive() + Duration::days(1);

    c.bench_function("domain/create_confirm_cancel", |b| {
        b.iter(|| {
            rt.block_on(async {
                let (service, resource) = seeded_service().await;
                let renter = UserId::new();
                let order = service
                    .create_order(CreateOrder::new(
                        renter,
                        resource,
                        start,
                        start + Duration::days(3),
                    ))
                    .await
                    .unwrap();
                service.confirm_settled(order.id).await.unwrap();
                service
                    .request_transition(RequestTransition::new(
                        order.id,
                        renter,
                        OrderStatus::Cancelled,
                    ))
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_decide,
    bench_quote,
    bench_create_order,
    bench_booking_cycle
);
criterion_main!(benches);
