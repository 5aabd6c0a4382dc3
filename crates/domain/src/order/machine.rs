//! Order state machine.

use common::UserId;
use rental_store::{Order, OrderStatus};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The actor's relation to an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Renter,
    Owner,
}

impl Role {
    pub const ALL: [Role; 2] = [Role::Renter, Role::Owner];

    /// Returns the user's role on the order, or `None` for outsiders.
    pub fn of(order: &Order, user: UserId) -> Option<Role> {
        if order.renter_id == user {
            Some(Role::Renter)
        } else if order.owner_id == user {
            Some(Role::Owner)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Renter => "renter",
            Role::Owner => "owner",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the state machine refused a move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionRejection {
    /// No role may make this move from the current state.
    #[error("illegal transition")]
    IllegalEdge,

    /// The move exists but not for this role.
    #[error("role not permitted")]
    RoleNotPermitted,
}

impl TransitionRejection {
    pub fn code(&self) -> &'static str {
        match self {
            TransitionRejection::IllegalEdge => "invalid_transition",
            TransitionRejection::RoleNotPermitted => "role_not_permitted",
        }
    }
}

/// Decides whether `role` may move an order from `current` to `target`.
///
/// State transitions:
/// ```text
/// pending ──► confirmed ──► ongoing ──► completed
///    │            │            │
///    │            ├────────────┴──► dispute
///    └────────────┴──► cancelled
/// ```
///
/// | target    | roles                                          | from               |
/// |-----------|------------------------------------------------|--------------------|
/// | confirmed | owner                                          | pending            |
/// | cancelled | renter (pending, confirmed), owner (confirmed) | pending, confirmed |
/// | ongoing   | owner                                          | confirmed          |
/// | completed | renter, owner                                  | ongoing            |
/// | dispute   | renter, owner                                  | confirmed, ongoing |
pub fn decide(
    current: OrderStatus,
    target: OrderStatus,
    role: Role,
) -> Result<OrderStatus, TransitionRejection> {
    use OrderStatus::*;

    let allowed: &[Role] = match (current, target) {
        (Pending, Confirmed) => &[Role::Owner],
        (Pending, Cancelled) => &[Role::Renter],
        (Confirmed, Cancelled) => &[Role::Renter, Role::Owner],
        (Confirmed, Ongoing) => &[Role::Owner],
        (Ongoing, Completed) => &[Role::Renter, Role::Owner],
        (Confirmed | Ongoing, Dispute) => &[Role::Renter, Role::Owner],
        _ => return Err(TransitionRejection::IllegalEdge),
    };

    if allowed.contains(&role) {
        Ok(target)
    } else {
        Err(TransitionRejection::RoleNotPermitted)
    }
}
