//! Reconciliation error types.

use domain::DomainError;
use rental_store::StoreError;
use thiserror::Error;

/// Errors that can occur while reconciling gateway results.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// The notification is unsigned or its signature does not match.
    #[error("Notification signature is invalid")]
    SignatureInvalid,

    /// The notification body could not be read.
    #[error("Malformed notification: {0}")]
    MalformedPayload(String),

    /// The shared signing secret is unusable.
    #[error("Notification signing secret must not be empty")]
    InvalidSecret,

    /// No payment carries the notified payment number.
    #[error("Payment not found: {0}")]
    PaymentNotFound(String),

    /// The gateway reported a different amount than the payment expects.
    #[error("Amount mismatch for {payment_no}: expected {expected}, got {actual}")]
    AmountMismatch {
        payment_no: String,
        expected: i64,
        actual: i64,
    },

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ReconcileError {
    /// Stable machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            ReconcileError::SignatureInvalid => "signature_invalid",
            ReconcileError::MalformedPayload(_) => "malformed_payload",
            ReconcileError::InvalidSecret => "invalid_secret",
            ReconcileError::PaymentNotFound(_) => "payment_not_found",
            ReconcileError::AmountMismatch { .. } => "amount_mismatch",
            ReconcileError::Domain(e) => e.code(),
            ReconcileError::Store(_) => "store_unavailable",
        }
    }

    /// Returns true if the error comes from infrastructure rather than a rule.
    pub fn is_infrastructure(&self) -> bool {
        match self {
            ReconcileError::Store(_) => true,
            ReconcileError::Domain(e) => e.is_infrastructure(),
            _ => false,
        }
    }

    /// Returns true if the gateway should be told the notification was handled.
    ///
    /// Authenticated notifications rejected by a business rule are
    /// acknowledged so the gateway stops retrying them. Unauthenticated,
    /// unreadable, or infrastructure failures are not.
    pub fn acknowledges(&self) -> bool {
        !self.is_infrastructure()
            && !matches!(
                self,
                ReconcileError::SignatureInvalid
                    | ReconcileError::MalformedPayload(_)
                    | ReconcileError::InvalidSecret
            )
    }
}

/// Convenience type alias for reconciliation results.
pub type Result<T> = std::result::Result<T, ReconcileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_rejections_are_acknowledged() {
        assert!(ReconcileError::PaymentNotFound("PAY1".into()).acknowledges());
        assert!(
            ReconcileError::AmountMismatch {
                payment_no: "PAY1".into(),
                expected: 100,
                actual: 1,
            }
            .acknowledges()
        );
    }

    #[test]
    fn auth_and_infrastructure_failures_are_not_acknowledged() {
        assert!(!ReconcileError::SignatureInvalid.acknowledges());
        assert!(!ReconcileError::MalformedPayload("eof".into()).acknowledges());

        let err = ReconcileError::Store(StoreError::Unavailable("down".into()));
        assert!(err.is_infrastructure());
        assert!(!err.acknowledges());
        assert_eq!(err.code(), "store_unavailable");
    }
}
