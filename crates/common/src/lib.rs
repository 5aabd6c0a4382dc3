//! Shared identifiers and value types for the rental platform.

pub mod money;
pub mod period;
pub mod types;

pub use money::Money;
pub use period::{InvalidPeriod, RentalPeriod};
pub use types::{OrderId, PaymentId, ResourceId, UserId};
