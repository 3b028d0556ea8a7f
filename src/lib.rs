//! Naari Couture storefront backend.
//!
//! Catalog browsing, guest + registered checkout with atomic stock
//! decrement, coupon/spin-wheel promotions, phone-OTP and social sign-in,
//! and product reviews.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod openapi;
pub mod services;

use axum::{
    extract::State,
    routing::{get, post, put},
    Json, Router,
};
use sea_orm::DatabaseConnection;
use serde_json::{json, Value};
use std::sync::Arc;

/// Shared application state threaded through every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: Arc<events::EventSender>,
    pub auth: Arc<auth::AuthService>,
    pub services: handlers::AppServices,
}

/// Storefront API surface, mounted under `/api/v1`.
pub fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        // Auth
        .route("/auth/otp/request", post(handlers::accounts::request_otp))
        .route("/auth/otp/verify", post(handlers::accounts::verify_otp))
        .route("/auth/google", post(handlers::accounts::google_sign_in))
        .route("/auth/firebase", post(handlers::accounts::firebase_sign_in))
        .route("/auth/refresh", post(handlers::accounts::refresh))
        // Profile (bearer)
        .route(
            "/profile",
            get(handlers::accounts::get_profile).put(handlers::accounts::update_profile),
        )
        // Catalog
        .route("/products", get(handlers::catalog::list_products))
        .route("/products/:id", get(handlers::catalog::get_product))
        .route("/categories", get(handlers::catalog::list_categories))
        .route("/banners", get(handlers::catalog::list_banners))
        .route(
            "/announcements",
            get(handlers::catalog::list_announcements),
        )
        // Orders
        .route("/orders", post(handlers::orders::create_order))
        .route("/orders/:id", get(handlers::orders::get_order))
        .route(
            "/orders/:id/status",
            put(handlers::orders::update_order_status),
        )
        .route("/my-orders", get(handlers::orders::my_orders))
        // Coupons and the wheel
        .route("/coupons/apply", post(handlers::coupons::apply_coupon))
        .route("/wheel/items", get(handlers::coupons::wheel_items))
        .route("/wheel/spin", post(handlers::coupons::spin_wheel))
        // Reviews
        .route(
            "/products/:id/reviews",
            get(handlers::reviews::list_reviews).post(handlers::reviews::submit_review),
        )
        .route(
            "/reviews/:id/helpful",
            post(handlers::reviews::toggle_helpful),
        )
}

async fn api_status() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "naari-couture-api",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    Json(json!({
        "status": db_status,
        "checks": { "database": db_status },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
