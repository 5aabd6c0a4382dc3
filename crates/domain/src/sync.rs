//! Keeps the catalog's availability flag in step with committed order transitions.

use rental_store::{Availability, Order, OrderStatus, ResourceCatalog, StoreError};

/// Flips a resource's availability after an order transition commits.
///
/// Only the writer that won the order's compare-and-set may call
/// [`on_transition`](Self::on_transition), so each committed transition
/// produces at most one catalog write.
#[derive(Debug, Clone)]
pub struct ResourceStatusSynchronizer<C> {
    catalog: C,
}

impl<C: ResourceCatalog> ResourceStatusSynchronizer<C> {
    pub fn new(catalog: C) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Availability implied by an order entering `status`, if any.
    pub fn availability_for(status: OrderStatus) -> Option<Availability> {
        match status {
            OrderStatus::Confirmed | OrderStatus::Ongoing => Some(Availability::Rented),
            OrderStatus::Completed | OrderStatus::Cancelled => Some(Availability::Available),
            OrderStatus::Pending | OrderStatus::Dispute => None,
        }
    }

    /// Applies the availability implied by the order's new status.
    ///
    /// Returns the availability written, or `None` when the status implies no change.
    #[tracing::instrument(skip(self, order), fields(order_no = %order.order_no, resource_id = %order.resource_id))]
    pub async fn on_transition(&self, order: &Order) -> Result<Option<Availability>, StoreError> {
        let Some(availability) = Self::availability_for(order.status) else {
            return Ok(None);
        };

        if !self
            .catalog
            .set_availability(order.resource_id, availability)
            .await?
        {
            tracing::warn!(%availability, "Resource missing from catalog, availability not updated");
            return Ok(None);
        }

        tracing::debug!(%availability, "Resource availability updated");
        Ok(Some(availability))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use common::{Money, OrderId, RentalPeriod, ResourceId, UserId};
    use rental_store::{InMemoryResourceCatalog, Resource};

    type Synchronizer = ResourceStatusSynchronizer<InMemoryResourceCatalog>;

    fn order_for(resource_id: ResourceId, status: OrderStatus) -> Order {
        let period = RentalPeriod::new(
            NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2030, 1, 3).unwrap(),
        )
        .unwrap();
        Order {
            id: OrderId::new(),
            order_no: "RO1".to_string(),
            resource_id,
            renter_id: UserId::new(),
            owner_id: UserId::new(),
            period,
            days: 2,
            daily_price: Money::from_minor(100),
            total_price: Money::from_minor(200),
            deposit: Money::zero(),
            status,
            remark: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn mapping() {
        assert_eq!(Synchronizer::availability_for(OrderStatus::Confirmed), Some(Availability::Rented));
        assert_eq!(Synchronizer::availability_for(OrderStatus::Ongoing), Some(Availability::Rented));
        assert_eq!(Synchronizer::availability_for(OrderStatus::Completed), Some(Availability::Available));
        assert_eq!(Synchronizer::availability_for(OrderStatus::Cancelled), Some(Availability::Available));
        assert_eq!(Synchronizer::availability_for(OrderStatus::Dispute), None);
        assert_eq!(Synchronizer::availability_for(OrderStatus::Pending), None);
    }

    #[tokio::test]
    async fn writes_only_when_status_implies_a_change() {
        let catalog = InMemoryResourceCatalog::new();
        let resource = Resource {
            id: ResourceId::new(),
            owner_id: UserId::new(),
            daily_rate: Money::from_minor(100),
            deposit: Money::zero(),
            availability: Availability::Available,
        };
        catalog.insert(resource.clone()).await;
        let sync = ResourceStatusSynchronizer::new(catalog.clone());

        let written = sync
            .on_transition(&order_for(resource.id, OrderStatus::Confirmed))
            .await
            .unwrap();
        assert_eq!(written, Some(Availability::Rented));

        let written = sync
            .on_transition(&order_for(resource.id, OrderStatus::Dispute))
            .await
            .unwrap();
        assert_eq!(written, None);
        assert_eq!(catalog.availability(resource.id).await, Some(Availability::Rented));
        assert_eq!(catalog.availability_updates().await, 1);
    }

    #[tokio::test]
    async fn missing_resource_is_not_an_error() {
        let sync = ResourceStatusSynchronizer::new(InMemoryResourceCatalog::new());
        let written = sync
            .on_transition(&order_for(ResourceId::new(), OrderStatus::Cancelled))
            .await
            .unwrap();
        assert_eq!(written, None);
    }
}
