//! Domain error types.

use rental_store::StoreError;
use thiserror::Error;

use crate::order::OrderError;
use crate::payment::PaymentError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A booking rule rejected the request.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    /// A payment rule rejected the request.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// The store failed for a reason that is not a business rule.
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DateRangeConflict {
                resource_id,
                period,
            } => DomainError::Order(OrderError::DateRangeConflict {
                resource_id,
                period,
            }),
            StoreError::DuplicatePendingPayment { order_id, purpose } => {
                DomainError::Payment(PaymentError::DuplicatePendingPayment { order_id, purpose })
            }
            other => DomainError::Store(other),
        }
    }
}

impl DomainError {
    /// Stable machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Order(e) => e.code(),
            DomainError::Payment(e) => e.code(),
            DomainError::Store(_) => "store_unavailable",
        }
    }

    /// Returns true if the error comes from infrastructure rather than a rule.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            DomainError::Store(_) | DomainError::Payment(PaymentError::GatewayUnavailable { .. })
        )
    }
}
