use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::errors::ServiceError;
use crate::services::catalog::{
    AnnouncementOut, BannerOut, CategoryOut, ProductDetail, ProductQuery,
};
use crate::AppState;

#[utoipa::path(
    get,
    path = "/api/v1/products",
    summary = "List products",
    params(
        ("category" = Option<String>, Query, description = "Category slug or name"),
        ("search" = Option<String>, Query, description = "Substring match on product name"),
        ("sort" = Option<String>, Query, description = "newest | price_low | price_high"),
    ),
    responses((status = 200, description = "Active products", body = [ProductDetail])),
    tag = "Catalog"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<Vec<ProductDetail>>, ServiceError> {
    Ok(Json(state.services.catalog.list_products(query).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    summary = "Get one product with variants and sizes",
    params(("id" = i64, Path, description = "Product id")),
    responses(
        (status = 200, description = "Product detail", body = ProductDetail),
        (status = 404, description = "Unknown product", body = crate::errors::ErrorResponse),
    ),
    tag = "Catalog"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ProductDetail>, ServiceError> {
    Ok(Json(state.services.catalog.get_product(id).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/categories",
    summary = "List categories",
    responses((status = 200, description = "Categories", body = [CategoryOut])),
    tag = "Catalog"
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<Vec<CategoryOut>>, ServiceError> {
    Ok(Json(state.services.catalog.list_categories().await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/banners",
    summary = "List active banners",
    responses((status = 200, description = "Banners", body = [BannerOut])),
    tag = "Catalog"
)]
pub async fn list_banners(
    State(state): State<AppState>,
) -> Result<Json<Vec<BannerOut>>, ServiceError> {
    Ok(Json(state.services.catalog.list_banners().await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/announcements",
    summary = "List active announcements",
    responses((status = 200, description = "Announcements", body = [AnnouncementOut])),
    tag = "Catalog"
)]
pub async fn list_announcements(
    State(state): State<AppState>,
) -> Result<Json<Vec<AnnouncementOut>>, ServiceError> {
    Ok(Json(state.services.catalog.list_announcements().await?))
}
