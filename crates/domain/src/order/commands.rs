//! Order commands.

use chrono::NaiveDate;
use common::{OrderId, RentalPeriod, ResourceId, UserId};
use rental_store::OrderStatus;

use super::OrderError;

/// Longest remark accepted on an order, in characters.
pub const MAX_REMARK_CHARS: usize = 500;

fn validate_remark(remark: Option<&str>) -> Result<(), OrderError> {
    match remark {
        Some(r) if r.chars().count() > MAX_REMARK_CHARS => Err(OrderError::Validation(format!(
            "remark must be at most {MAX_REMARK_CHARS} characters"
        ))),
        _ => Ok(()),
    }
}

/// Command to book a resource for a date range.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    /// The user booking the resource.
    pub renter_id: UserId,

    /// The resource being booked.
    pub resource_id: ResourceId,

    /// First day of the booking.
    pub start_date: NaiveDate,

    /// Day the resource is handed back (exclusive).
    pub end_date: NaiveDate,

    /// Free-form note for the owner.
    pub remark: Option<String>,
}

impl CreateOrder {
    /// Creates a new CreateOrder command.
    pub fn new(
        renter_id: UserId,
        resource_id: ResourceId,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            renter_id,
            resource_id,
            start_date,
            end_date,
            remark: None,
        }
    }

    /// Attaches a remark to the booking.
    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = Some(remark.into());
        self
    }

    /// Checks the request shape against `today` and returns the booked period.
    pub fn validate(&self, today: NaiveDate) -> Result<RentalPeriod, OrderError> {
        if self.start_date < today {
            return Err(OrderError::Validation(format!(
                "start date {} is in the past",
                self.start_date
            )));
        }
        let period = RentalPeriod::new(self.start_date, self.end_date)
            .map_err(|e| OrderError::Validation(e.to_string()))?;
        validate_remark(self.remark.as_deref())?;
        Ok(period)
    }
}

/// Command to move an order to a new status.
#[derive(Debug, Clone)]
pub struct RequestTransition {
    /// The order to move.
    pub order_id: OrderId,

    /// The user asking for the move.
    pub actor_id: UserId,

    /// The requested status.
    pub target: OrderStatus,

    /// Replaces the stored remark when present.
    pub remark: Option<String>,
}

impl RequestTransition {
    /// Creates a new RequestTransition command.
    pub fn new(order_id: OrderId, actor_id: UserId, target: OrderStatus) -> Self {
        Self {
            order_id,
            actor_id,
            target,
            remark: None,
        }
    }

    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = Some(remark.into());
        self
    }

    pub fn validate(&self) -> Result<(), OrderError> {
        validate_remark(self.remark.as_deref())
    }
}
