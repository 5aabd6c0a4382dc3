//! Payment initiation against an order and the gateway port.

mod gateway;
mod service;

pub use gateway::{
    ChargeRequest, ChargeStatus, GatewayError, GatewayParams, PaymentGateway, SandboxGateway,
};
pub use service::{
    CreatePayment, DEFAULT_GATEWAY_TIMEOUT, PaymentIntent, PaymentService, amount_for,
    required_purposes,
};

use common::{OrderId, PaymentId};
use rental_store::{OrderStatus, PaymentPurpose, PaymentStatus};
use thiserror::Error;

/// Errors that can occur during payment operations.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The request is malformed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Only the renter may pay for an order.
    #[error("Only the renter can pay for this order")]
    Forbidden,

    /// The order no longer accepts payments.
    #[error("Order is {status} and cannot be paid")]
    OrderNotPayable { status: OrderStatus },

    /// A pending payment already exists for this order and purpose.
    #[error("Order {order_id} already has a pending {purpose} payment")]
    DuplicatePendingPayment {
        order_id: OrderId,
        purpose: PaymentPurpose,
    },

    /// The amount to charge is zero or negative.
    #[error("Invalid amount: {0} minor units")]
    InvalidAmount(i64),

    /// The payment does not exist or belongs to someone else.
    #[error("Payment not found: {0}")]
    NotFound(PaymentId),

    /// The payment has left the pending state.
    #[error("Payment is {status}, not pending")]
    NotPending { status: PaymentStatus },

    /// The gateway failed or timed out; the payment stays pending.
    #[error("Payment gateway unavailable for {payment_no}: {reason}")]
    GatewayUnavailable { payment_no: String, reason: String },
}

impl PaymentError {
    /// Stable machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            PaymentError::Validation(_) => "validation_error",
            PaymentError::OrderNotFound(_) => "order_not_found",
            PaymentError::Forbidden => "forbidden",
            PaymentError::OrderNotPayable { .. } => "order_not_payable",
            PaymentError::DuplicatePendingPayment { .. } => "duplicate_pending_payment",
            PaymentError::InvalidAmount(_) => "invalid_amount",
            PaymentError::NotFound(_) => "payment_not_found",
            PaymentError::NotPending { .. } => "payment_not_pending",
            PaymentError::GatewayUnavailable { .. } => "gateway_unavailable",
        }
    }
}
