//! Domain layer for the rental platform.
//!
//! This crate provides the booking rules and their services:
//! - Order state machine deciding `(current, target, role)` moves
//! - Order service for booking creation, transitions and queries
//! - Payment service for payment initiation against a gateway
//! - Resource status synchronizer reacting to committed transitions

pub mod error;
pub mod numbering;
pub mod order;
pub mod payment;
pub mod sync;

pub use error::DomainError;
pub use order::{
    CreateOrder, OrderError, OrderService, Quote, RequestTransition, Role, TransitionRejection,
    decide,
};
pub use payment::{
    ChargeRequest, ChargeStatus, CreatePayment, DEFAULT_GATEWAY_TIMEOUT, GatewayError,
    GatewayParams, PaymentError, PaymentGateway, PaymentIntent, PaymentService, SandboxGateway,
    amount_for, required_purposes,
};
pub use sync::ResourceStatusSynchronizer;
