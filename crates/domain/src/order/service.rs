//! Order service: booking creation, transitions and queries.

use chrono::Utc;
use common::{OrderId, RentalPeriod, ResourceId, UserId};
use rental_store::{
    Order, OrderQuery, OrderStats, OrderStatus, Page, RentalStore, ResourceCatalog,
    ResourceCatalogExt,
};

use crate::error::DomainError;
use crate::numbering;
use crate::sync::ResourceStatusSynchronizer;

use super::{CreateOrder, OrderError, Quote, RequestTransition, Role, decide};

/// Service for managing rental orders.
///
/// Every status change goes through [`decide`] and a compare-and-set write;
/// only the winning writer runs the resource status synchronizer.
pub struct OrderService<S, C> {
    store: S,
    sync: ResourceStatusSynchronizer<C>,
}

impl<S: RentalStore, C: ResourceCatalog> OrderService<S, C> {
    /// Creates a new order service over the given store and catalog.
    pub fn new(store: S, catalog: C) -> Self {
        Self {
            store,
            sync: ResourceStatusSynchronizer::new(catalog),
        }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns a reference to the resource catalog.
    pub fn catalog(&self) -> &C {
        self.sync.catalog()
    }

    /// Books a resource, creating a `pending` order.
    ///
    /// Rejections are reported in a fixed order: request validation, missing
    /// resource, self-booking, date conflict, availability. The store repeats
    /// the conflict check atomically with the insert.
    #[tracing::instrument(skip(self, cmd), fields(resource_id = %cmd.resource_id, renter_id = %cmd.renter_id))]
    pub async fn create_order(&self, cmd: CreateOrder) -> Result<Order, DomainError> {
        let period = cmd.validate(Utc::now().date_naive())?;

        let resource = self
            .catalog()
            .get_resource(cmd.resource_id)
            .await?
            .ok_or(OrderError::ResourceNotFound(cmd.resource_id))?;

        if resource.owner_id == cmd.renter_id {
            return Err(OrderError::SelfBookingForbidden.into());
        }

        if self.store.has_conflict(resource.id, period, None).await? {
            return Err(OrderError::DateRangeConflict {
                resource_id: resource.id,
                period,
            }
            .into());
        }

        if !self.catalog().is_bookable(resource.id).await? {
            return Err(OrderError::ResourceUnavailable {
                resource_id: resource.id,
                availability: resource.availability,
            }
            .into());
        }

        let (daily_rate, deposit) = self
            .catalog()
            .current_price(resource.id)
            .await?
            .ok_or(OrderError::ResourceNotFound(resource.id))?;
        let quote = Quote::compute(period, daily_rate, deposit)?;
        let now = Utc::now();
        let order = Order {
            id: OrderId::new(),
            order_no: numbering::order_no(),
            resource_id: resource.id,
            renter_id: cmd.renter_id,
            owner_id: resource.owner_id,
            period,
            days: quote.days,
            daily_price: quote.daily_price,
            total_price: quote.total_price,
            deposit: quote.deposit,
            status: OrderStatus::Pending,
            remark: cmd.remark,
            created_at: now,
            updated_at: now,
        };

        let order = self.store.insert_order(order).await?;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(order_no = %order.order_no, total_price = %order.total_price, "Order created");
        Ok(order)
    }

    /// Moves an order to the requested status on behalf of a participant.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id, target = %cmd.target))]
    pub async fn request_transition(&self, cmd: RequestTransition) -> Result<Order, DomainError> {
        cmd.validate()?;

        let order = self
            .store
            .get_order(cmd.order_id)
            .await?
            .ok_or(OrderError::NotFound(cmd.order_id))?;
        let role = Role::of(&order, cmd.actor_id).ok_or(OrderError::Forbidden)?;

        let next = decide(order.status, cmd.target, role).map_err(|reason| {
            OrderError::InvalidTransition {
                from: order.status,
                to: cmd.target,
                reason,
            }
        })?;

        let updated = self
            .store
            .update_order_status(order.id, order.status, next, cmd.remark)
            .await?
            .ok_or(OrderError::ConcurrentModification(order.id))?;

        self.after_transition(&updated, role).await;
        Ok(updated)
    }

    /// Confirms a pending order once its payments have settled.
    ///
    /// Settlement confirms on the owner's behalf. Returns `Ok(None)` when
    /// the order is no longer pending or another writer confirmed it first.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_settled(&self, order_id: OrderId) -> Result<Option<Order>, DomainError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(OrderError::NotFound(order_id))?;

        let Ok(next) = decide(order.status, OrderStatus::Confirmed, Role::Owner) else {
            return Ok(None);
        };

        let updated = self
            .store
            .update_order_status(order.id, order.status, next, None)
            .await?;

        if let Some(ref confirmed) = updated {
            self.after_transition(confirmed, Role::Owner).await;
        }
        Ok(updated)
    }

    async fn after_transition(&self, order: &Order, role: Role) {
        metrics::counter!("order_transitions_total", "to" => order.status.as_str()).increment(1);
        tracing::info!(order_no = %order.order_no, status = %order.status, %role, "Order transitioned");

        // The transition is committed; a catalog failure must not undo it.
        if let Err(e) = self.sync.on_transition(order).await {
            tracing::error!(
                order_no = %order.order_no,
                resource_id = %order.resource_id,
                error = %e,
                "Failed to sync resource availability"
            );
        }
    }

    /// Returns true if a calendar-holding order of the resource overlaps the period.
    pub async fn has_conflict(
        &self,
        resource_id: ResourceId,
        period: RentalPeriod,
        exclude: Option<OrderId>,
    ) -> Result<bool, DomainError> {
        Ok(self.store.has_conflict(resource_id, period, exclude).await?)
    }

    /// Loads an order visible to the actor.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId, actor_id: UserId) -> Result<Order, DomainError> {
        let order = self
            .store
            .get_order(order_id)
            .await?
            .ok_or(OrderError::NotFound(order_id))?;

        if !order.involves(actor_id) {
            return Err(OrderError::Forbidden.into());
        }
        Ok(order)
    }

    /// Lists the actor's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, query: OrderQuery) -> Result<Page<Order>, DomainError> {
        Ok(self.store.query_orders(&query).await?)
    }

    /// Aggregates counters over the actor's orders.
    #[tracing::instrument(skip(self))]
    pub async fn order_stats(&self, actor_id: UserId) -> Result<OrderStats, DomainError> {
        Ok(self.store.order_stats(actor_id).await?)
    }
}
