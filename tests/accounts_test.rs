mod common;

use assert_matches::assert_matches;
use common::*;
use naari_couture_api::entities::{order, otp_verification, user};
use naari_couture_api::errors::ServiceError;
use naari_couture_api::services::accounts::{
    GoogleSignInRequest, RequestOtpRequest, VerifyOtpRequest,
};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};

async fn latest_otp(app: &TestApp, phone: &str) -> String {
    otp_verification::Entity::find()
        .filter(otp_verification::Column::PhoneNumber.eq(phone))
        .order_by_desc(otp_verification::Column::CreatedAt)
        .one(&*app.db)
        .await
        .unwrap()
        .expect("an OTP row must exist")
        .otp_code
}

#[tokio::test]
async fn otp_login_bootstraps_an_account() {
    let app = TestApp::new().await;

    // No SMS key configured: issuance still succeeds, delivery is flagged.
    let issued = app
        .services
        .accounts
        .request_otp(RequestOtpRequest {
            phone_number: "98765 43210".to_string(),
        })
        .await
        .unwrap();
    assert!(issued.success);
    assert!(!issued.sms_delivered);

    let otp = latest_otp(&app, "+919876543210").await;
    let tokens = app
        .services
        .accounts
        .verify_otp(VerifyOtpRequest {
            phone_number: "9876543210".to_string(),
            otp,
        })
        .await
        .unwrap();

    assert_eq!(tokens.user.phone, "+919876543210");
    let claims = app.auth.verify_token(&tokens.access_token).unwrap();
    assert_eq!(claims.kind, "access");

    // Second login reuses the same account.
    app.services
        .accounts
        .request_otp(RequestOtpRequest {
            phone_number: "+919876543210".to_string(),
        })
        .await
        .unwrap();
    let otp = latest_otp(&app, "+919876543210").await;
    let again = app
        .services
        .accounts
        .verify_otp(VerifyOtpRequest {
            phone_number: "+91 98765 43210".to_string(),
            otp,
        })
        .await
        .unwrap();
    assert_eq!(again.user.id, tokens.user.id);
    assert_eq!(user::Entity::find().count(&*app.db).await.unwrap(), 1);
}

#[tokio::test]
async fn wrong_or_reused_otp_is_rejected() {
    let app = TestApp::new().await;
    app.services
        .accounts
        .request_otp(RequestOtpRequest {
            phone_number: "9876543210".to_string(),
        })
        .await
        .unwrap();
    let otp = latest_otp(&app, "+919876543210").await;

    let wrong = "000000".to_string();
    let tampered = if otp == wrong { "111111".to_string() } else { wrong };
    let err = app
        .services
        .accounts
        .verify_otp(VerifyOtpRequest {
            phone_number: "9876543210".to_string(),
            otp: tampered,
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Unauthorized(_));

    // A redeemed OTP cannot be replayed.
    app.services
        .accounts
        .verify_otp(VerifyOtpRequest {
            phone_number: "9876543210".to_string(),
            otp: otp.clone(),
        })
        .await
        .unwrap();
    let err = app
        .services
        .accounts
        .verify_otp(VerifyOtpRequest {
            phone_number: "9876543210".to_string(),
            otp,
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Unauthorized(_));
}

#[tokio::test]
async fn login_links_past_guest_orders_and_backfills_profile() {
    let app = TestApp::new().await;
    let unit = seed_unit(
        &app,
        "Sarees",
        false,
        "Handloom Saree",
        "Cream",
        None,
        5,
        dec!(2750),
    )
    .await;

    // Guest checkout happens before any account exists.
    let request = checkout_request(
        "9876543210",
        dec!(2750),
        vec![line(&unit, "FREE", Some("Cream"), 1, dec!(2750))],
    );
    app.services.orders.create_order(request).await.unwrap();

    app.services
        .accounts
        .request_otp(RequestOtpRequest {
            phone_number: "9876543210".to_string(),
        })
        .await
        .unwrap();
    let otp = latest_otp(&app, "+919876543210").await;
    let tokens = app
        .services
        .accounts
        .verify_otp(VerifyOtpRequest {
            phone_number: "9876543210".to_string(),
            otp,
        })
        .await
        .unwrap();

    // Profile carries the checkout details and the order is now linked.
    assert_eq!(tokens.user.full_name, "Asha Sharma");
    assert_eq!(tokens.user.address, "12 MG Road, Jaipur");
    assert_eq!(tokens.user.pincode, "302001");

    let linked = order::Entity::find()
        .filter(order::Column::UserId.eq(tokens.user.id))
        .count(&*app.db)
        .await
        .unwrap();
    assert_eq!(linked, 1);
}

#[tokio::test]
async fn google_sign_in_keys_off_the_email() {
    let app = TestApp::new().await;

    let first = app
        .services
        .accounts
        .google_sign_in(GoogleSignInRequest {
            email: "asha@example.com".to_string(),
            full_name: Some("Asha Sharma".to_string()),
            profile_pic: None,
        })
        .await
        .unwrap();
    assert_eq!(first.user.email, "asha@example.com");
    assert_eq!(first.user.full_name, "Asha Sharma");

    let second = app
        .services
        .accounts
        .google_sign_in(GoogleSignInRequest {
            email: "asha@example.com".to_string(),
            full_name: None,
            profile_pic: None,
        })
        .await
        .unwrap();
    assert_eq!(second.user.id, first.user.id);
    assert_eq!(user::Entity::find().count(&*app.db).await.unwrap(), 1);
}
