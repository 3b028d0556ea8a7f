//! HTTP handlers: thin DTO-mapping layers over the service structs.

pub mod accounts;
pub mod catalog;
pub mod coupons;
pub mod orders;
pub mod reviews;

use crate::auth::AuthService;
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::accounts::{AccountService, HttpIdTokenVerifier};
use crate::services::catalog::CatalogService;
use crate::services::coupons::CouponService;
use crate::services::customers::CustomerService;
use crate::services::notifications::SmsGateway;
use crate::services::orders::{OrderService, OrderServiceConfig};
use crate::services::reviews::ReviewService;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Service container used by the HTTP layer.
#[derive(Clone)]
pub struct AppServices {
    pub accounts: AccountService,
    pub catalog: CatalogService,
    pub coupons: CouponService,
    pub customers: CustomerService,
    pub orders: OrderService,
    pub reviews: ReviewService,
}

impl AppServices {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        auth: Arc<AuthService>,
        cfg: &AppConfig,
    ) -> Self {
        let customers = CustomerService::new(db.clone(), cfg.phone_country_prefix.clone());
        let coupons = CouponService::new(db.clone(), event_sender.clone());

        let sms = SmsGateway::new(
            cfg.sms_gateway_url.clone(),
            cfg.sms_api_key.clone(),
            cfg.phone_country_prefix.clone(),
        );
        let verifier = Arc::new(HttpIdTokenVerifier::new(cfg.id_token_verify_url.clone()));

        let accounts = AccountService::new(
            db.clone(),
            customers.clone(),
            auth,
            sms,
            verifier,
            event_sender.clone(),
        );
        let orders = OrderService::new(
            db.clone(),
            customers.clone(),
            coupons.clone(),
            event_sender.clone(),
            OrderServiceConfig {
                invoice_prefix: cfg.invoice_prefix.clone(),
                enforce_coupon_user_limit: cfg.enforce_coupon_user_limit,
            },
        );
        let reviews = ReviewService::new(db.clone(), customers.clone(), event_sender);
        let catalog = CatalogService::new(db);

        Self {
            accounts,
            catalog,
            coupons,
            customers,
            orders,
            reviews,
        }
    }
}
