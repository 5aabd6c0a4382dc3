//! Payment reconciliation for the rental platform.
//!
//! Gateway results arrive as signed notifications or from status polls.
//! Each is verified, applied to its payment with a compare-and-set so it
//! takes effect exactly once, and the order is confirmed once every
//! required payment has succeeded.

pub mod error;
pub mod notification;
pub mod reconciler;
pub mod signature;

pub use error::ReconcileError;
pub use notification::{Notification, NotificationBuilder};
pub use reconciler::{PaymentReconciler, ReconcileOutcome};
pub use signature::{NotificationSigner, canonical_string};
