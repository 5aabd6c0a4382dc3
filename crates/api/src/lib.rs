//! HTTP API for the rental platform.
//!
//! Provides REST endpoints for booking orders, moving them through their
//! lifecycle, paying for them and receiving gateway notifications, with
//! structured logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use domain::SandboxGateway;
use metrics_exporter_prometheus::PrometheusHandle;
use reconciliation::{NotificationSigner, PaymentReconciler, ReconcileError};
use rental_store::{RentalStore, ResourceCatalog};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S, C>(state: Arc<AppState<S, C>>, metrics_handle: PrometheusHandle) -> Router
where
    S: RentalStore + Clone + 'static,
    C: ResourceCatalog + 'static,
{
    use routes::{orders, payments};

    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    // Payment routes share one parameter name at the second segment; for
    // create and notify it holds the payment method.
    Router::new()
        .route("/health", get(routes::health::check::<S, C>))
        .route(
            "/orders",
            post(orders::create::<S, C>).get(orders::list::<S, C>),
        )
        .route("/orders/stats", get(orders::stats::<S, C>))
        .route("/orders/{id}", get(orders::get::<S, C>))
        .route("/orders/{id}/status", put(orders::update_status::<S, C>))
        .route(
            "/payments",
            post(payments::create::<S, C>).get(payments::list::<S, C>),
        )
        .route(
            "/payments/{id}/create",
            post(payments::create_with_method::<S, C>),
        )
        .route("/payments/{id}/notify", post(payments::notify::<S, C>))
        .route("/payments/{id}/status", get(payments::status::<S, C>))
        .route("/payments/{id}/cancel", post(payments::cancel::<S, C>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state over the given storage backend.
pub fn create_state<S, C>(
    store: S,
    catalog: C,
    config: &Config,
    storage: &'static str,
) -> Result<Arc<AppState<S, C>>, ReconcileError>
where
    S: RentalStore + Clone + 'static,
    C: ResourceCatalog + 'static,
{
    let signer = NotificationSigner::new(&config.gateway_secret)?;
    let gateway = SandboxGateway::new(config.gateway_app_id.clone());
    let reconciler = PaymentReconciler::new(store, catalog, gateway.clone(), signer)
        .with_gateway_timeout(config.gateway_timeout);

    Ok(Arc::new(AppState {
        reconciler,
        gateway,
        storage,
    }))
}
