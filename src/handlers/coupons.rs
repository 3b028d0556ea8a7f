use axum::{extract::State, Json};
use chrono::Utc;

use crate::errors::ServiceError;
use crate::services::coupons::{
    ApplyCouponRequest, CouponPreviewResponse, SpinRequest, SpinResult, WheelItem,
};
use crate::AppState;

#[utoipa::path(
    post,
    path = "/api/v1/coupons/apply",
    summary = "Preview a coupon against a cart total",
    description = "Non-authoritative: the order transaction re-evaluates the same \
                   rules and its result is what gets billed.",
    request_body = ApplyCouponRequest,
    responses((status = 200, description = "Evaluation result", body = CouponPreviewResponse)),
    tag = "Coupons"
)]
pub async fn apply_coupon(
    State(state): State<AppState>,
    Json(request): Json<ApplyCouponRequest>,
) -> Result<Json<CouponPreviewResponse>, ServiceError> {
    Ok(Json(
        state.services.coupons.preview(request, Utc::now()).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/wheel/items",
    summary = "Wheel slices currently available",
    responses((status = 200, description = "Eligible wheel coupons", body = [WheelItem])),
    tag = "Coupons"
)]
pub async fn wheel_items(
    State(state): State<AppState>,
) -> Result<Json<Vec<WheelItem>>, ServiceError> {
    Ok(Json(state.services.coupons.wheel_items(Utc::now()).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/wheel/spin",
    summary = "Draw the wheel for an order",
    description = "At most one outcome per order; replays return the recorded win \
                   with `already_spun` set.",
    request_body = SpinRequest,
    responses((status = 200, description = "Draw outcome", body = SpinResult)),
    tag = "Coupons"
)]
pub async fn spin_wheel(
    State(state): State<AppState>,
    Json(request): Json<SpinRequest>,
) -> Result<Json<SpinResult>, ServiceError> {
    Ok(Json(
        state
            .services
            .coupons
            .spin(&request.order_id, Utc::now())
            .await?,
    ))
}
