//! Payment creation, status and gateway notification endpoints.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{OrderId, PaymentId};
use domain::{CreatePayment, GatewayParams};
use reconciliation::ReconcileOutcome;
use rental_store::{
    Payment, PaymentMethod, PaymentPurpose, PaymentQuery, PaymentStatus, RentalStore,
    ResourceCatalog,
};
use serde::{Deserialize, Serialize};

use super::{AppState, PageResponse, Pagination, parse_uuid};
use crate::auth::CurrentUser;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreatePaymentRequest {
    pub order_id: String,
    pub payment_type: String,
    pub method: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListPaymentsParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub order_id: Option<String>,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: String,
    pub payment_no: String,
    pub order_id: String,
    pub purpose: PaymentPurpose,
    pub method: PaymentMethod,
    pub amount: i64,
    pub status: PaymentStatus,
    pub external_transaction_id: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id.to_string(),
            payment_no: payment.payment_no,
            order_id: payment.order_id.to_string(),
            purpose: payment.purpose,
            method: payment.method,
            amount: payment.amount.minor_units(),
            status: payment.status,
            external_transaction_id: payment.external_transaction_id,
            paid_at: payment.paid_at,
            created_at: payment.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentCreatedResponse {
    pub payment_id: String,
    pub payment_no: String,
    pub amount: i64,
    pub gateway_params: GatewayParams,
}

/// Acknowledgement body the gateway expects from a notification endpoint.
#[derive(Debug, Serialize)]
pub struct NotifyAck {
    pub return_code: &'static str,
    pub return_msg: String,
}

impl NotifyAck {
    fn success() -> Self {
        Self {
            return_code: "SUCCESS",
            return_msg: "OK".to_string(),
        }
    }

    fn fail(msg: impl Into<String>) -> Self {
        Self {
            return_code: "FAIL",
            return_msg: msg.into(),
        }
    }
}

// -- Handlers --

/// POST /payments: start paying for an order.
#[tracing::instrument(skip(state, req), fields(user_id = %user.0))]
pub async fn create<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    user: CurrentUser,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<Json<PaymentCreatedResponse>, ApiError>
where
    S: RentalStore + Clone + 'static,
    C: ResourceCatalog + 'static,
{
    let method = req.method.as_deref().map(parse_method).transpose()?;
    start_payment(&state, user, req, method).await
}

/// POST /payments/{method}/create: start paying through a specific channel.
#[tracing::instrument(skip(state, req), fields(user_id = %user.0))]
pub async fn create_with_method<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    user: CurrentUser,
    Path(method): Path<String>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<Json<PaymentCreatedResponse>, ApiError>
where
    S: RentalStore + Clone + 'static,
    C: ResourceCatalog + 'static,
{
    let method = parse_method(&method)?;
    start_payment(&state, user, req, Some(method)).await
}

async fn start_payment<S, C>(
    state: &AppState<S, C>,
    user: CurrentUser,
    req: CreatePaymentRequest,
    method: Option<PaymentMethod>,
) -> Result<Json<PaymentCreatedResponse>, ApiError>
where
    S: RentalStore + Clone + 'static,
    C: ResourceCatalog + 'static,
{
    let order_id = OrderId::from_uuid(parse_uuid(&req.order_id)?);
    let purpose = req
        .payment_type
        .parse::<PaymentPurpose>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let mut cmd = CreatePayment::new(order_id, user.0, purpose);
    if let Some(method) = method {
        cmd = cmd.method(method);
    }

    let intent = state.payments().create_payment(cmd).await?;
    Ok(Json(PaymentCreatedResponse {
        payment_id: intent.payment.id.to_string(),
        payment_no: intent.payment.payment_no,
        amount: intent.payment.amount.minor_units(),
        gateway_params: intent.gateway_params,
    }))
}

/// GET /payments: list the caller's payments, newest first.
#[tracing::instrument(skip(state), fields(user_id = %user.0))]
pub async fn list<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    user: CurrentUser,
    Query(params): Query<ListPaymentsParams>,
) -> Result<Json<PageResponse<PaymentResponse>>, ApiError>
where
    S: RentalStore + Clone + 'static,
    C: ResourceCatalog + 'static,
{
    let pagination = Pagination {
        page: params.page,
        limit: params.limit,
    };
    let mut query = PaymentQuery::for_payer(user.0).page(pagination.request());
    if let Some(order_id) = params.order_id.as_deref() {
        query = query.order_id(OrderId::from_uuid(parse_uuid(order_id)?));
    }

    let page = state.payments().list_payments(query).await?;
    Ok(Json(PageResponse::from_page(page, PaymentResponse::from)))
}

/// GET /payments/{id}/status: the caller's payment, polling the gateway while pending.
#[tracing::instrument(skip(state), fields(user_id = %user.0))]
pub async fn status<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<PaymentResponse>, ApiError>
where
    S: RentalStore + Clone + 'static,
    C: ResourceCatalog + 'static,
{
    let payment_id = PaymentId::from_uuid(parse_uuid(&id)?);
    let payment = state.reconciler.payment_status(payment_id, user.0).await?;
    Ok(Json(payment.into()))
}

/// POST /payments/{id}/cancel: abandon a pending payment.
#[tracing::instrument(skip(state), fields(user_id = %user.0))]
pub async fn cancel<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<PaymentResponse>, ApiError>
where
    S: RentalStore + Clone + 'static,
    C: ResourceCatalog + 'static,
{
    let payment_id = PaymentId::from_uuid(parse_uuid(&id)?);
    let payment = state.payments().cancel_payment(payment_id, user.0).await?;
    Ok(Json(payment.into()))
}

/// POST /payments/{method}/notify: gateway webhook.
///
/// Unauthenticated; the body's signature is its credential. Authenticated
/// notifications are acknowledged even when a business rule rejects them,
/// so only unverifiable bodies and infrastructure failures are retried.
#[tracing::instrument(skip(state, body))]
pub async fn notify<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    Path(method): Path<String>,
    body: Bytes,
) -> (StatusCode, Json<NotifyAck>)
where
    S: RentalStore + Clone + 'static,
    C: ResourceCatalog + 'static,
{
    if let Err(e) = parse_method(&method) {
        tracing::warn!(%method, error = ?e, "Notification for unknown payment method");
        return (
            StatusCode::BAD_REQUEST,
            Json(NotifyAck::fail("unknown_payment_method")),
        );
    }

    match state.reconciler.handle_notification(&body).await {
        Ok(outcome) => {
            if let ReconcileOutcome::Settled {
                confirmed_order: Some(order),
                ..
            }
            | ReconcileOutcome::Replayed {
                confirmed_order: Some(order),
                ..
            } = &outcome
            {
                tracing::info!(order_no = %order.order_no, "Order confirmed by payment");
            }
            (StatusCode::OK, Json(NotifyAck::success()))
        }
        Err(e) if e.acknowledges() => (StatusCode::OK, Json(NotifyAck::success())),
        Err(e) if e.is_infrastructure() => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(NotifyAck::fail(e.code())),
        ),
        Err(e) => (StatusCode::BAD_REQUEST, Json(NotifyAck::fail(e.code()))),
    }
}

fn parse_method(method: &str) -> Result<PaymentMethod, ApiError> {
    method
        .parse::<PaymentMethod>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}
