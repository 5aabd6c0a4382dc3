//! Order booking, transition and query endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, NaiveDate, Utc};
use common::{OrderId, ResourceId};
use domain::{CreateOrder, RequestTransition};
use rental_store::{
    Order, OrderQuery, OrderScope, OrderStats, OrderStatus, RentalStore, ResourceCatalog,
};
use serde::{Deserialize, Serialize};

use super::{AppState, PageResponse, Pagination, parse_uuid};
use crate::auth::CurrentUser;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub resource_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub remark: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    pub remark: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListOrdersParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub scope: Option<String>,
    pub status: Option<String>,
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub order_no: String,
    pub resource_id: String,
    pub renter_id: String,
    pub owner_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub days: i64,
    pub daily_price: i64,
    pub total_price: i64,
    pub deposit: i64,
    pub status: OrderStatus,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            order_no: order.order_no,
            resource_id: order.resource_id.to_string(),
            renter_id: order.renter_id.to_string(),
            owner_id: order.owner_id.to_string(),
            start_date: order.period.start(),
            end_date: order.period.end(),
            days: order.days,
            daily_price: order.daily_price.minor_units(),
            total_price: order.total_price.minor_units(),
            deposit: order.deposit.minor_units(),
            status: order.status,
            remark: order.remark,
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

// -- Handlers --

/// POST /orders: book a resource for a date range.
#[tracing::instrument(skip(state, req), fields(user_id = %user.0))]
pub async fn create<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    user: CurrentUser,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError>
where
    S: RentalStore + Clone + 'static,
    C: ResourceCatalog + 'static,
{
    let resource_id = ResourceId::from_uuid(parse_uuid(&req.resource_id)?);
    let mut cmd = CreateOrder::new(user.0, resource_id, req.start_date, req.end_date);
    if let Some(remark) = req.remark {
        cmd = cmd.with_remark(remark);
    }

    let order = state.orders().create_order(cmd).await?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /orders: list the caller's orders, newest first.
#[tracing::instrument(skip(state), fields(user_id = %user.0))]
pub async fn list<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    user: CurrentUser,
    Query(params): Query<ListOrdersParams>,
) -> Result<Json<PageResponse<OrderResponse>>, ApiError>
where
    S: RentalStore + Clone + 'static,
    C: ResourceCatalog + 'static,
{
    let pagination = Pagination {
        page: params.page,
        limit: params.limit,
    };
    let mut query = OrderQuery::for_user(user.0).page(pagination.request());

    if let Some(scope) = params.scope.as_deref() {
        query = query.scope(parse_scope(scope)?);
    }
    if let Some(status) = params.status.as_deref() {
        let status = status
            .parse::<OrderStatus>()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;
        query = query.status(status);
    }

    let page = state.orders().list_orders(query).await?;
    Ok(Json(PageResponse::from_page(page, OrderResponse::from)))
}

/// GET /orders/stats: counters over the caller's orders.
#[tracing::instrument(skip(state), fields(user_id = %user.0))]
pub async fn stats<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    user: CurrentUser,
) -> Result<Json<OrderStats>, ApiError>
where
    S: RentalStore + Clone + 'static,
    C: ResourceCatalog + 'static,
{
    Ok(Json(state.orders().order_stats(user.0).await?))
}

/// GET /orders/{id}: load an order the caller takes part in.
#[tracing::instrument(skip(state), fields(user_id = %user.0))]
pub async fn get<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: RentalStore + Clone + 'static,
    C: ResourceCatalog + 'static,
{
    let order_id = OrderId::from_uuid(parse_uuid(&id)?);
    let order = state.orders().get_order(order_id, user.0).await?;
    Ok(Json(order.into()))
}

/// PUT /orders/{id}/status: move an order through its lifecycle.
#[tracing::instrument(skip(state, req), fields(user_id = %user.0))]
pub async fn update_status<S, C>(
    State(state): State<Arc<AppState<S, C>>>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: RentalStore + Clone + 'static,
    C: ResourceCatalog + 'static,
{
    let order_id = OrderId::from_uuid(parse_uuid(&id)?);
    let target = req
        .status
        .parse::<OrderStatus>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let mut cmd = RequestTransition::new(order_id, user.0, target);
    if let Some(remark) = req.remark {
        cmd = cmd.with_remark(remark);
    }

    let order = state.orders().request_transition(cmd).await?;
    Ok(Json(order.into()))
}

fn parse_scope(scope: &str) -> Result<OrderScope, ApiError> {
    match scope {
        "all" => Ok(OrderScope::All),
        "rented" | "renter" => Ok(OrderScope::Rented),
        "owned" | "owner" => Ok(OrderScope::Owned),
        other => Err(ApiError::BadRequest(format!("Unknown scope: {other}"))),
    }
}
