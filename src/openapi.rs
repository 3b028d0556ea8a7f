use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Naari Couture API",
        version = "0.3.0",
        description = r#"
# Naari Couture Storefront API

Backend for the Naari Couture ethnic-wear storefront.

- **Catalog**: products with color variants and per-size stock/pricing
- **Checkout**: guest and registered orders in one atomic transaction
- **Coupons**: preview + in-checkout revalidation, spin-wheel rewards
- **Accounts**: phone OTP, Google and Firebase sign-in
- **Reviews**: verified-buyer detection and helpful votes

Bearer-protected endpoints expect `Authorization: Bearer <access token>`;
checkout, catalog browsing, coupon preview and the wheel are open to
guests.
        "#,
        contact(name = "Naari Couture", email = "dev@naaricouture.in"),
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8000", description = "Local development"),
    ),
    tags(
        (name = "Auth", description = "OTP and social sign-in"),
        (name = "Profile", description = "Signed-in user profile"),
        (name = "Catalog", description = "Products, categories, banners"),
        (name = "Orders", description = "Checkout, history, lifecycle"),
        (name = "Coupons", description = "Discount preview and the spin wheel"),
        (name = "Reviews", description = "Product reviews"),
    ),
    paths(
        crate::handlers::accounts::request_otp,
        crate::handlers::accounts::verify_otp,
        crate::handlers::accounts::google_sign_in,
        crate::handlers::accounts::firebase_sign_in,
        crate::handlers::accounts::refresh,
        crate::handlers::accounts::get_profile,
        crate::handlers::accounts::update_profile,
        crate::handlers::catalog::list_products,
        crate::handlers::catalog::get_product,
        crate::handlers::catalog::list_categories,
        crate::handlers::catalog::list_banners,
        crate::handlers::catalog::list_announcements,
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::my_orders,
        crate::handlers::orders::update_order_status,
        crate::handlers::coupons::apply_coupon,
        crate::handlers::coupons::wheel_items,
        crate::handlers::coupons::spin_wheel,
        crate::handlers::reviews::list_reviews,
        crate::handlers::reviews::submit_review,
        crate::handlers::reviews::toggle_helpful,
    ),
    components(schemas(
        crate::auth::TokenPair,
        crate::auth::SessionProfile,
        crate::errors::ErrorResponse,
        crate::services::accounts::RequestOtpRequest,
        crate::services::accounts::RequestOtpResponse,
        crate::services::accounts::VerifyOtpRequest,
        crate::services::accounts::GoogleSignInRequest,
        crate::services::accounts::FirebaseSignInRequest,
        crate::services::accounts::RefreshRequest,
        crate::services::customers::UpdateProfileRequest,
        crate::services::customers::ProfileResponse,
        crate::services::catalog::ProductDetail,
        crate::services::catalog::VariantDetail,
        crate::services::catalog::SizeDetail,
        crate::services::catalog::CategoryOut,
        crate::services::catalog::BannerOut,
        crate::services::catalog::AnnouncementOut,
        crate::services::orders::CreateOrderRequest,
        crate::services::orders::OrderLineRequest,
        crate::services::orders::CreateOrderResponse,
        crate::services::orders::OrderResponse,
        crate::services::orders::OrderItemResponse,
        crate::handlers::orders::UpdateStatusRequest,
        crate::services::coupons::ApplyCouponRequest,
        crate::services::coupons::CouponPreviewResponse,
        crate::services::coupons::WheelItem,
        crate::services::coupons::SpinRequest,
        crate::services::coupons::SpinResult,
        crate::services::reviews::SubmitReviewRequest,
        crate::services::reviews::ReviewOut,
        crate::services::reviews::HelpfulToggleResponse,
    ))
)]
pub struct ApiDoc;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_generates() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("Naari Couture API"));
        assert!(json.contains("/api/v1/orders"));
        assert!(json.contains("/api/v1/wheel/spin"));
    }
}
