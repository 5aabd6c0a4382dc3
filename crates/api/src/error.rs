//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, OrderError, PaymentError, TransitionRejection};
use reconciliation::ReconcileError;

/// API-level error type that maps to HTTP responses.
///
/// Every response body is `{"error": message, "code": reason_code}`.
#[derive(Debug)]
pub enum ApiError {
    /// The caller's identity is missing or invalid.
    Unauthorized(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Domain logic error.
    Domain(DomainError),
    /// Reconciliation error.
    Reconcile(ReconcileError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "validation_error", msg),
            ApiError::Domain(err) => (domain_status(&err), err.code(), err.to_string()),
            ApiError::Reconcile(err) => {
                let status = match &err {
                    ReconcileError::Domain(e) => domain_status(e),
                    e if e.is_infrastructure() => StatusCode::SERVICE_UNAVAILABLE,
                    ReconcileError::PaymentNotFound(_) => StatusCode::NOT_FOUND,
                    _ => StatusCode::BAD_REQUEST,
                };
                (status, err.code(), err.to_string())
            }
        };

        if status.is_server_error() {
            tracing::error!(code, error = %message, "request failed");
        }
        metrics::counter!("api_errors_total", "code" => code).increment(1);

        let body = serde_json::json!({ "error": message, "code": code });
        (status, axum::Json(body)).into_response()
    }
}

fn domain_status(err: &DomainError) -> StatusCode {
    match err {
        DomainError::Order(order_err) => match order_err {
            OrderError::Validation(_)
            | OrderError::SelfBookingForbidden
            | OrderError::DateRangeConflict { .. }
            | OrderError::ResourceUnavailable { .. }
            | OrderError::InvalidPrice { .. } => StatusCode::BAD_REQUEST,
            OrderError::ResourceNotFound(_) | OrderError::NotFound(_) => StatusCode::NOT_FOUND,
            OrderError::Forbidden => StatusCode::FORBIDDEN,
            OrderError::InvalidTransition { reason, .. } => match reason {
                TransitionRejection::IllegalEdge => StatusCode::BAD_REQUEST,
                TransitionRejection::RoleNotPermitted => StatusCode::FORBIDDEN,
            },
            OrderError::ConcurrentModification(_) => StatusCode::CONFLICT,
        },
        DomainError::Payment(payment_err) => match payment_err {
            PaymentError::Validation(_)
            | PaymentError::OrderNotPayable { .. }
            | PaymentError::DuplicatePendingPayment { .. }
            | PaymentError::InvalidAmount(_)
            | PaymentError::NotPending { .. } => StatusCode::BAD_REQUEST,
            PaymentError::OrderNotFound(_) | PaymentError::NotFound(_) => StatusCode::NOT_FOUND,
            PaymentError::Forbidden => StatusCode::FORBIDDEN,
            PaymentError::GatewayUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        },
        DomainError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<ReconcileError> for ApiError {
    fn from(err: ReconcileError) -> Self {
        ApiError::Reconcile(err)
    }
}
