use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::services::reviews::{HelpfulToggleResponse, ReviewOut, SubmitReviewRequest};
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}/reviews",
    summary = "List reviews for a product",
    params(("id" = i64, Path, description = "Product id")),
    responses((status = 200, description = "Reviews, newest first", body = [ReviewOut])),
    tag = "Reviews"
)]
pub async fn list_reviews(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> Result<Json<Vec<ReviewOut>>, ServiceError> {
    Ok(Json(
        state.services.reviews.list_for_product(product_id).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/products/{id}/reviews",
    summary = "Submit or replace a review",
    description = "One review per user per product. Verified buyers rate 1-5; \
                   everyone else floors at 4 stars.",
    params(("id" = i64, Path, description = "Product id")),
    request_body = SubmitReviewRequest,
    responses(
        (status = 201, description = "Recorded review", body = ReviewOut),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Reviews"
)]
pub async fn submit_review(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
    auth: AuthUser,
    Json(request): Json<SubmitReviewRequest>,
) -> Result<(StatusCode, Json<ReviewOut>), ServiceError> {
    let review = state
        .services
        .reviews
        .submit(&auth.user, product_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

#[utoipa::path(
    post,
    path = "/api/v1/reviews/{id}/helpful",
    summary = "Toggle a helpful vote on a review",
    params(("id" = i64, Path, description = "Review id")),
    responses(
        (status = 200, description = "Vote state after the toggle", body = HelpfulToggleResponse),
        (status = 404, description = "Unknown review", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Reviews"
)]
pub async fn toggle_helpful(
    State(state): State<AppState>,
    Path(review_id): Path<i64>,
    auth: AuthUser,
) -> Result<Json<HelpfulToggleResponse>, ServiceError> {
    Ok(Json(
        state
            .services
            .reviews
            .toggle_helpful(&auth.user, review_id)
            .await?,
    ))
}
