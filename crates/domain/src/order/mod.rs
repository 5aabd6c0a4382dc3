//! Order booking rules and the order service.

mod commands;
mod machine;
mod pricing;
mod service;

pub use commands::{CreateOrder, MAX_REMARK_CHARS, RequestTransition};
pub use machine::{Role, TransitionRejection, decide};
pub use pricing::Quote;
pub use service::OrderService;

use common::{OrderId, RentalPeriod, ResourceId};
use rental_store::{Availability, OrderStatus};
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// The request is malformed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The resource does not exist in the catalog.
    #[error("Resource not found: {0}")]
    ResourceNotFound(ResourceId),

    /// A user tried to rent their own resource.
    #[error("Cannot book your own resource")]
    SelfBookingForbidden,

    /// The requested dates overlap a held booking.
    #[error("Date range {period} is already booked for resource {resource_id}")]
    DateRangeConflict {
        resource_id: ResourceId,
        period: RentalPeriod,
    },

    /// The resource is not accepting bookings.
    #[error("Resource {resource_id} is {availability}")]
    ResourceUnavailable {
        resource_id: ResourceId,
        availability: Availability,
    },

    /// The daily rate and period produce no valid price.
    #[error("Cannot price {days} days at {daily_rate} minor units per day")]
    InvalidPrice { days: i64, daily_rate: i64 },

    /// The order does not exist.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// The actor is neither renter nor owner of the order.
    #[error("Not a participant of this order")]
    Forbidden,

    /// The state machine rejected the move.
    #[error("Cannot move order from {from} to {to}: {reason}")]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
        reason: TransitionRejection,
    },

    /// Another writer changed the order first.
    #[error("Order {0} was modified concurrently")]
    ConcurrentModification(OrderId),
}

impl OrderError {
    /// Stable machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            OrderError::Validation(_) => "validation_error",
            OrderError::ResourceNotFound(_) => "resource_not_found",
            OrderError::SelfBookingForbidden => "self_booking_forbidden",
            OrderError::DateRangeConflict { .. } => "date_range_conflict",
            OrderError::ResourceUnavailable { .. } => "resource_unavailable",
            OrderError::InvalidPrice { .. } => "invalid_price",
            OrderError::NotFound(_) => "order_not_found",
            OrderError::Forbidden => "forbidden",
            OrderError::InvalidTransition { reason, .. } => reason.code(),
            OrderError::ConcurrentModification(_) => "concurrent_modification",
        }
    }
}
