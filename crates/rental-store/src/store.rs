use async_trait::async_trait;
use common::{OrderId, PaymentId, RentalPeriod, ResourceId, UserId};

use crate::model::{Order, OrderStatus, Payment, PaymentPurpose, PaymentStatus, Settlement};
use crate::query::{OrderQuery, OrderStats, Page, PaymentQuery};
use crate::Result;

/// Persistence for orders and payments.
///
/// Every write that protects an invariant is a single atomic step:
/// conflict-checked inserts, and compare-and-set status updates that only
/// apply if the stored status still matches what the caller read. A CAS that
/// loses returns `Ok(None)` rather than an error so callers can treat it as
/// a replay or a stale read. All implementations must be thread-safe.
#[async_trait]
pub trait RentalStore: Send + Sync {
    /// Inserts a new order, failing with `DateRangeConflict` if its period
    /// overlaps an order that holds the same resource's calendar.
    ///
    /// The check and the insert are atomic with respect to other bookings
    /// of the same resource.
    async fn insert_order(&self, order: Order) -> Result<Order>;

    /// Retrieves an order by ID.
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Retrieves an order by its public order number.
    async fn get_order_by_no(&self, order_no: &str) -> Result<Option<Order>>;

    /// Lists a user's orders, newest first.
    async fn query_orders(&self, query: &OrderQuery) -> Result<Page<Order>>;

    /// Aggregates counters over a user's orders.
    async fn order_stats(&self, user_id: UserId) -> Result<OrderStats>;

    /// Returns true if any calendar-holding order of the resource overlaps the period.
    async fn has_conflict(
        &self,
        resource_id: ResourceId,
        period: RentalPeriod,
        exclude: Option<OrderId>,
    ) -> Result<bool>;

    /// Moves an order from `expected` to `next`.
    ///
    /// Returns `Ok(None)` if the order is missing or no longer in `expected`.
    /// When `next` holds the calendar and `expected` does not, the overlap
    /// check against other holding orders runs atomically with the update and
    /// fails with `DateRangeConflict`. A `remark` of `None` keeps the stored one.
    async fn update_order_status(
        &self,
        id: OrderId,
        expected: OrderStatus,
        next: OrderStatus,
        remark: Option<String>,
    ) -> Result<Option<Order>>;

    /// Inserts a new payment, failing with `DuplicatePendingPayment` if the
    /// order already has a pending payment for the same purpose.
    async fn insert_payment(&self, payment: Payment) -> Result<Payment>;

    /// Retrieves a payment by ID.
    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>>;

    /// Retrieves a payment by its payment number.
    async fn get_payment_by_no(&self, payment_no: &str) -> Result<Option<Payment>>;

    /// Retrieves every payment recorded against an order, oldest first.
    async fn payments_for_order(&self, order_id: OrderId) -> Result<Vec<Payment>>;

    /// Lists a payer's payments, newest first.
    async fn query_payments(&self, query: &PaymentQuery) -> Result<Page<Payment>>;

    /// Applies a gateway result if the payment is still open.
    ///
    /// Returns the updated payment for the single winning writer and
    /// `Ok(None)` for every other caller.
    async fn settle_payment(
        &self,
        payment_no: &str,
        settlement: Settlement,
    ) -> Result<Option<Payment>>;

    /// Cancels a payment that is still pending.
    ///
    /// Returns `Ok(None)` if the payment is missing or no longer pending.
    async fn cancel_payment(&self, id: PaymentId) -> Result<Option<Payment>>;
}

/// Extension trait providing convenience methods for rental stores.
#[async_trait]
pub trait RentalStoreExt: RentalStore {
    /// Returns the pending payment for an order and purpose, if any.
    async fn pending_payment(
        &self,
        order_id: OrderId,
        purpose: PaymentPurpose,
    ) -> Result<Option<Payment>> {
        Ok(self
            .payments_for_order(order_id)
            .await?
            .into_iter()
            .find(|p| p.purpose == purpose && p.status == PaymentStatus::Pending))
    }

    /// Returns true if a successful payment exists for the order and purpose.
    async fn is_paid(&self, order_id: OrderId, purpose: PaymentPurpose) -> Result<bool> {
        Ok(self
            .payments_for_order(order_id)
            .await?
            .iter()
            .any(|p| p.purpose == purpose && p.status == PaymentStatus::Success))
    }
}

// Blanket implementation for all RentalStore implementations
impl<T: RentalStore + ?Sized> RentalStoreExt for T {}
