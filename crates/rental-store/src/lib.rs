pub mod catalog;
pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod query;
pub mod store;

pub use catalog::{InMemoryResourceCatalog, ResourceCatalog, ResourceCatalogExt};
pub use error::{Result, StoreError};
pub use memory::InMemoryRentalStore;
pub use model::{
    Availability, Order, OrderStatus, ParseEnumError, Payment, PaymentMethod, PaymentPurpose,
    PaymentStatus, Resource, Settlement,
};
pub use postgres::{PostgresRentalStore, PostgresResourceCatalog};
pub use query::{
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, OrderQuery, OrderScope, OrderStats, Page, PageRequest,
    PaymentQuery,
};
pub use store::{RentalStore, RentalStoreExt};
