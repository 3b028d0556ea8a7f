use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::services::orders::{CreateOrderRequest, CreateOrderResponse, OrderResponse};
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Place an order",
    description = "Guest and registered checkout share this endpoint; a signed-in \
                   account is attached by phone-number match. All stock decrements, \
                   the coupon redemption and the invoice assignment commit atomically.",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order placed", body = CreateOrderResponse),
        (status = 400, description = "Unresolvable line item or stock exhausted", body = crate::errors::ErrorResponse),
        (status = 404, description = "Referenced inventory unit does not exist", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), ServiceError> {
    let response = state.services.orders.create_order(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Fetch one order",
    params(("id" = i64, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order", body = OrderResponse),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<OrderResponse>, ServiceError> {
    Ok(Json(state.services.orders.get_order(id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/my-orders",
    summary = "Orders belonging to the signed-in user",
    responses((status = 200, description = "Orders, newest first", body = [OrderResponse])),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn my_orders(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<OrderResponse>>, ServiceError> {
    Ok(Json(state.services.orders.my_orders(&auth.user).await?))
}

#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    summary = "Transition an order's lifecycle status",
    description = "Moving into `returned` credits every line's stock back exactly once.",
    params(("id" = i64, Path, description = "Order id")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Updated order", body = OrderResponse),
        (status = 400, description = "Unknown status", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown order", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    _auth: AuthUser,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<OrderResponse>, ServiceError> {
    Ok(Json(
        state
            .services
            .orders
            .update_order_status(id, &request.status)
            .await?,
    ))
}
