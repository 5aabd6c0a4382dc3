use common::{OrderId, UserId};
use serde::{Deserialize, Serialize};

use crate::model::OrderStatus;

/// Upper bound on page size for list queries.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Default page size when the caller does not specify one.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Which side of the booking the listing user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderScope {
    /// Orders where the user is renter or owner.
    #[default]
    All,
    /// Orders the user placed.
    Rented,
    /// Orders on the user's resources.
    Owned,
}

/// 1-based page selection, clamped to sane bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    /// Creates a page request, clamping `page` to at least 1 and `limit` to `1..=MAX_PAGE_SIZE`.
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            page: page.max(1),
            limit: limit.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, DEFAULT_PAGE_SIZE)
    }
}

/// A page of results plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub request: PageRequest,
}

impl<T> Page<T> {
    /// Number of pages needed to show every matching row.
    pub fn pages(&self) -> u64 {
        self.total.div_ceil(u64::from(self.request.limit()))
    }
}

/// Filter for listing a user's orders, newest first.
#[derive(Debug, Clone)]
pub struct OrderQuery {
    pub user_id: UserId,
    pub scope: OrderScope,
    pub status: Option<OrderStatus>,
    pub page: PageRequest,
}

impl OrderQuery {
    /// Creates a query for every order the user participates in.
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id,
            scope: OrderScope::All,
            status: None,
            page: PageRequest::default(),
        }
    }

    pub fn scope(mut self, scope: OrderScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn page(mut self, page: PageRequest) -> Self {
        self.page = page;
        self
    }

    /// Returns true if the order passes the scope and status filters.
    pub fn matches(&self, renter_id: UserId, owner_id: UserId, status: OrderStatus) -> bool {
        let in_scope = match self.scope {
            OrderScope::All => renter_id == self.user_id || owner_id == self.user_id,
            OrderScope::Rented => renter_id == self.user_id,
            OrderScope::Owned => owner_id == self.user_id,
        };
        in_scope && self.status.is_none_or(|s| s == status)
    }
}

/// Filter for listing a payer's payments, newest first.
#[derive(Debug, Clone)]
pub struct PaymentQuery {
    pub payer_id: UserId,
    pub order_id: Option<OrderId>,
    pub page: PageRequest,
}

impl PaymentQuery {
    pub fn for_payer(payer_id: UserId) -> Self {
        Self {
            payer_id,
            order_id: None,
            page: PageRequest::default(),
        }
    }

    pub fn order_id(mut self, order_id: OrderId) -> Self {
        self.order_id = Some(order_id);
        self
    }

    pub fn page(mut self, page: PageRequest) -> Self {
        self.page = page;
        self
    }
}

/// Per-user order counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct OrderStats {
    pub rented_count: u64,
    pub owned_count: u64,
    pub pending_count: u64,
    pub ongoing_count: u64,
    pub completed_count: u64,
    /// Sum of completed orders' total price where the user rented, in minor units.
    pub total_spent: i64,
    /// Sum of completed orders' total price where the user owned, in minor units.
    pub total_earned: i64,
}
