use common::{OrderId, RentalPeriod, ResourceId};
use thiserror::Error;

use crate::model::{ParseEnumError, PaymentPurpose};

/// Errors that can occur when interacting with the rental store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The period overlaps an order that holds the resource's calendar.
    #[error("Date range {period} conflicts with an existing booking of resource {resource_id}")]
    DateRangeConflict {
        resource_id: ResourceId,
        period: RentalPeriod,
    },

    /// A pending payment already exists for this order and purpose.
    #[error("Order {order_id} already has a pending {purpose} payment")]
    DuplicatePendingPayment {
        order_id: OrderId,
        purpose: PaymentPurpose,
    },

    /// A unique key (order number, payment number) was reused.
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// A stored row could not be mapped back to a record.
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    /// The backing store refused the operation.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<ParseEnumError> for StoreError {
    fn from(err: ParseEnumError) -> Self {
        StoreError::InvalidData(err.to_string())
    }
}

impl From<common::InvalidPeriod> for StoreError {
    fn from(err: common::InvalidPeriod) -> Self {
        StoreError::InvalidData(err.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
