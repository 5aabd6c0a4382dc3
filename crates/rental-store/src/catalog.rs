//! Resource catalog port and in-memory implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{Money, ResourceId};
use tokio::sync::RwLock;

use crate::model::{Availability, Resource};
use crate::{Result, StoreError};

/// Read and availability-flag access to the external resource catalog.
#[async_trait]
pub trait ResourceCatalog: Send + Sync {
    /// Retrieves a resource by ID.
    async fn get_resource(&self, id: ResourceId) -> Result<Option<Resource>>;

    /// Sets the availability flag of a resource.
    ///
    /// Returns false if the resource does not exist.
    async fn set_availability(&self, id: ResourceId, availability: Availability) -> Result<bool>;
}

/// Booking-side view of the catalog.
#[async_trait]
pub trait ResourceCatalogExt: ResourceCatalog {
    /// Returns true if the resource exists and is currently available.
    async fn is_bookable(&self, id: ResourceId) -> Result<bool> {
        Ok(self
            .get_resource(id)
            .await?
            .is_some_and(|r| r.availability == Availability::Available))
    }

    /// Returns the current `(daily_rate, deposit)` of the resource.
    async fn current_price(&self, id: ResourceId) -> Result<Option<(Money, Money)>> {
        Ok(self
            .get_resource(id)
            .await?
            .map(|r| (r.daily_rate, r.deposit)))
    }
}

impl<T: ResourceCatalog + ?Sized> ResourceCatalogExt for T {}

#[derive(Debug, Default)]
struct InMemoryCatalogState {
    resources: HashMap<ResourceId, Resource>,
    availability_updates: u64,
    fail_on_update: bool,
}

/// In-memory resource catalog for tests and local runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryResourceCatalog {
    state: Arc<RwLock<InMemoryCatalogState>>,
}

impl InMemoryResourceCatalog {
    /// Creates a new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a resource.
    pub async fn insert(&self, resource: Resource) {
        self.state
            .write()
            .await
            .resources
            .insert(resource.id, resource);
    }

    /// Returns the current availability of a resource.
    pub async fn availability(&self, id: ResourceId) -> Option<Availability> {
        self.state
            .read()
            .await
            .resources
            .get(&id)
            .map(|r| r.availability)
    }

    /// Returns how many availability writes have been applied.
    pub async fn availability_updates(&self) -> u64 {
        self.state.read().await.availability_updates
    }

    /// Configures availability writes to fail.
    pub async fn set_fail_on_update(&self, fail: bool) {
        self.state.write().await.fail_on_update = fail;
    }
}

#[async_trait]
impl ResourceCatalog for InMemoryResourceCatalog {
    async fn get_resource(&self, id: ResourceId) -> Result<Option<Resource>> {
        Ok(self.state.read().await.resources.get(&id).cloned())
    }

    async fn set_availability(&self, id: ResourceId, availability: Availability) -> Result<bool> {
        let mut state = self.state.write().await;

        if state.fail_on_update {
            return Err(StoreError::Unavailable("catalog write failed".to_string()));
        }

        let Some(resource) = state.resources.get_mut(&id) else {
            return Ok(false);
        };
        resource.availability = availability;
        state.availability_updates += 1;
        Ok(true)
    }
}
