//! HTTP handlers and the state they share.

pub mod health;
pub mod metrics;
pub mod orders;
pub mod payments;

use domain::{OrderService, PaymentService, SandboxGateway};
use reconciliation::PaymentReconciler;
use rental_store::{Page, PageRequest, RentalStore, ResourceCatalog};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S, C> {
    pub reconciler: PaymentReconciler<S, C, SandboxGateway>,
    /// Handle on the gateway, for local runs that settle charges by hand.
    pub gateway: SandboxGateway,
    /// Name of the storage backend, reported by the health check.
    pub storage: &'static str,
}

impl<S: RentalStore + Clone, C: ResourceCatalog> AppState<S, C> {
    pub fn orders(&self) -> &OrderService<S, C> {
        self.reconciler.orders()
    }

    pub fn payments(&self) -> &PaymentService<S, SandboxGateway> {
        self.reconciler.payments()
    }
}

/// `?page=&limit=` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct Pagination {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl Pagination {
    pub fn request(&self) -> PageRequest {
        let default = PageRequest::default();
        PageRequest::new(
            self.page.unwrap_or(default.page()),
            self.limit.unwrap_or(default.limit()),
        )
    }
}

/// A page of results.
#[derive(Debug, Serialize)]
pub struct PageResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub pages: u64,
}

impl<T> PageResponse<T> {
    pub fn from_page<U>(page: Page<U>, map: impl FnMut(U) -> T) -> Self {
        let pages = page.pages();
        Self {
            total: page.total,
            page: page.request.page(),
            limit: page.request.limit(),
            pages,
            items: page.items.into_iter().map(map).collect(),
        }
    }
}

fn parse_uuid(id: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(id).map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}
