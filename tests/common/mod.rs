//! Shared harness: application services over an in-memory SQLite database
//! with the real migrations applied.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use naari_couture_api::{
    auth::{AuthConfig, AuthService},
    config::AppConfig,
    db::{self, DbPool},
    entities::{coupon, coupon::CouponType, user},
    events::{self, EventSender},
    handlers::AppServices,
    services::catalog::{NewProduct, NewSizeVariant, NewVariant},
    services::orders::{CreateOrderRequest, OrderLineRequest},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use tokio::sync::mpsc;

pub struct TestApp {
    pub db: Arc<DbPool>,
    pub services: AppServices,
    pub auth: Arc<AuthService>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Fresh application state over a private in-memory database. The pool
    /// is capped at one connection so the database lives exactly as long as
    /// the app and concurrent work serializes the way a single SQLite
    /// writer does.
    pub async fn new() -> Self {
        let cfg = test_config();

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to open test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations");
        let db = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let auth = Arc::new(AuthService::new(
            AuthConfig::new(
                cfg.jwt_secret.clone(),
                cfg.auth_issuer.clone(),
                cfg.auth_audience.clone(),
                StdDuration::from_secs(cfg.jwt_expiration as u64),
                StdDuration::from_secs(cfg.refresh_token_expiration as u64),
            ),
            db.clone(),
        ));

        let services = AppServices::new(db.clone(), event_sender, auth.clone(), &cfg);

        Self {
            db,
            services,
            auth,
            _event_task: event_task,
        }
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        jwt_secret: "k9Qw7ZxP2mN4vB6cY8dF1gH3jL5sT0uR_k9Qw7ZxP2mN4vB6cY8dF1gH3jL5sT0uR".into(),
        jwt_expiration: 3600,
        refresh_token_expiration: 604_800,
        host: "127.0.0.1".into(),
        port: 18_080,
        environment: "test".into(),
        log_level: "warn".into(),
        log_json: false,
        auto_migrate: true,
        cors_allowed_origins: None,
        cors_allow_any_origin: true,
        cors_allow_credentials: false,
        db_max_connections: 1,
        db_min_connections: 1,
        db_connect_timeout_secs: 30,
        db_idle_timeout_secs: 600,
        db_acquire_timeout_secs: 30,
        invoice_prefix: "NC".into(),
        phone_country_prefix: "+91".into(),
        enforce_coupon_user_limit: false,
        sms_gateway_url: "http://127.0.0.1:1/unused".into(),
        sms_api_key: None,
        id_token_verify_url: None,
        auth_issuer: "naari-couture-api".into(),
        auth_audience: "naari-couture-storefront".into(),
    }
}

/// Ids of one seeded purchasable unit.
#[derive(Debug, Clone, Copy)]
pub struct SeededUnit {
    pub category_id: i64,
    pub product_id: i64,
    pub variant_id: i64,
    pub size_id: i64,
}

/// Seeds category → product → variant → size variant through the catalog
/// service, returning the ids of each level.
pub async fn seed_unit(
    app: &TestApp,
    category: &str,
    has_size: bool,
    product_name: &str,
    color: &str,
    size: Option<&str>,
    stock: i32,
    base_price: Decimal,
) -> SeededUnit {
    let catalog = &app.services.catalog;

    let cat = catalog
        .create_category(category, has_size, None)
        .await
        .expect("category");
    let product = catalog
        .create_product(NewProduct {
            category_id: cat.id,
            name: product_name.to_string(),
            description: format!("{} in {}", product_name, color),
            fabric: Some("Silk".to_string()),
            base_price,
            original_price: None,
        })
        .await
        .expect("product");
    let variant = catalog
        .add_variant(
            product.id,
            NewVariant {
                color_name: color.to_string(),
                color_code: "#AA3344".to_string(),
                thumbnail_url: "https://cdn.example/thumb.jpg".to_string(),
                video_url: None,
                stock,
            },
        )
        .await
        .expect("variant");
    let unit = catalog
        .add_size_variant(
            variant.id,
            NewSizeVariant {
                size: size.map(str::to_string),
                stock,
                price_adjustment: Decimal::ZERO,
                sku: None,
            },
        )
        .await
        .expect("size variant");

    SeededUnit {
        category_id: cat.id,
        product_id: product.id,
        variant_id: variant.id,
        size_id: unit.id,
    }
}

/// Coupon row with sensible defaults; tweak fields before inserting.
pub fn coupon_defaults(code: &str) -> coupon::ActiveModel {
    let now = Utc::now();
    coupon::ActiveModel {
        code: Set(code.to_string()),
        description: Set(None),
        coupon_type: Set(CouponType::Flat),
        discount_value: Set(dec!(100)),
        max_discount_amount: Set(None),
        min_order_value: Set(Decimal::ZERO),
        valid_from: Set(now - Duration::days(1)),
        valid_until: Set(now + Duration::days(30)),
        active: Set(true),
        limit_per_user: Set(1),
        total_usage_limit: Set(None),
        times_used: Set(0),
        is_wheel_coupon: Set(false),
        wheel_label: Set(None),
        wheel_color: Set("#8B3E48".to_string()),
        win_probability: Set(50),
        daily_global_limit: Set(10),
        last_used_date: Set(None),
        today_usage_count: Set(0),
        ..Default::default()
    }
}

pub async fn seed_coupon(app: &TestApp, model: coupon::ActiveModel) -> coupon::Model {
    model.insert(&*app.db).await.expect("coupon")
}

pub async fn seed_user(
    app: &TestApp,
    phone: Option<&str>,
    email: Option<&str>,
) -> user::Model {
    user::ActiveModel {
        username: Set(phone.or(email).unwrap_or("customer").to_string()),
        email: Set(email.map(str::to_string)),
        phone_number: Set(phone.map(str::to_string)),
        auth_provider: Set("phone".to_string()),
        is_verified: Set(true),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&*app.db)
    .await
    .expect("user")
}

pub fn line(
    unit: &SeededUnit,
    size: &str,
    color: Option<&str>,
    quantity: i32,
    price: Decimal,
) -> OrderLineRequest {
    OrderLineRequest {
        product_id: Some(unit.product_id),
        variant_id: None,
        size_id: Some(unit.size_id),
        quantity,
        price,
        size: size.to_string(),
        color: color.map(str::to_string),
    }
}

pub fn checkout_request(
    phone: &str,
    total: Decimal,
    items: Vec<OrderLineRequest>,
) -> CreateOrderRequest {
    CreateOrderRequest {
        full_name: "Asha Sharma".to_string(),
        phone_number: phone.to_string(),
        email: None,
        address: "12 MG Road, Jaipur".to_string(),
        pincode: "302001".to_string(),
        payment_method: "cod".to_string(),
        total_amount: total,
        shipping_charges: Decimal::ZERO,
        coupon_code: None,
        items,
    }
}

pub async fn stock_of(app: &TestApp, size_id: i64) -> i32 {
    naari_couture_api::entities::size_variant::Entity::find_by_id(size_id)
        .one(&*app.db)
        .await
        .expect("query")
        .expect("size variant")
        .stock
}

pub async fn master_stock_of(app: &TestApp, variant_id: i64) -> i32 {
    naari_couture_api::entities::product_variant::Entity::find_by_id(variant_id)
        .one(&*app.db)
        .await
        .expect("query")
        .expect("variant")
        .stock
}
