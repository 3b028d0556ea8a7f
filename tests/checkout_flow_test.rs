mod common;

use chrono::{Datelike, Utc};
use common::*;
use naari_couture_api::entities::{coupon, order, order_item, user};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

#[tokio::test]
async fn checkout_decrements_stock_and_assigns_invoice() {
    let app = TestApp::new().await;
    let unit = seed_unit(
        &app,
        "Lehengas",
        true,
        "Bridal Lehenga",
        "Red",
        Some("XL"),
        5,
        dec!(4999),
    )
    .await;

    let request = checkout_request(
        "+91 98765 43210",
        dec!(9998),
        vec![line(&unit, "XL", Some("Red"), 2, dec!(4999))],
    );
    let response = app.services.orders.create_order(request).await.unwrap();

    assert!(response.success);
    assert_eq!(
        response.invoice_no,
        format!("NC-{}-{:04}", Utc::now().year(), response.order_id)
    );
    assert_eq!(stock_of(&app, unit.size_id).await, 3);

    let placed = app.services.orders.get_order(response.order_id).await.unwrap();
    assert_eq!(placed.status, "pending");
    assert_eq!(placed.items.len(), 1);
    assert_eq!(placed.items[0].quantity, 2);
    assert_eq!(placed.items[0].price, dec!(4999));
    assert_eq!(placed.phone_number, "+919876543210");
}

#[tokio::test]
async fn one_size_checkout_keeps_master_stock_in_lockstep() {
    let app = TestApp::new().await;
    // No explicit size: the catalog falls back to the reserved FREE marker.
    let unit = seed_unit(
        &app,
        "Sarees",
        false,
        "Banarasi Saree",
        "Green",
        None,
        10,
        dec!(2499),
    )
    .await;

    let request = checkout_request(
        "9876543210",
        dec!(7497),
        vec![line(&unit, "FREE", Some("Green"), 3, dec!(2499))],
    );
    app.services.orders.create_order(request).await.unwrap();

    assert_eq!(stock_of(&app, unit.size_id).await, 7);
    assert_eq!(master_stock_of(&app, unit.variant_id).await, 7);
}

#[tokio::test]
async fn non_positive_quoted_price_falls_back_to_catalog() {
    let app = TestApp::new().await;
    let unit = seed_unit(
        &app,
        "Suits",
        true,
        "Anarkali Suit",
        "Blue",
        Some("M"),
        4,
        dec!(1899),
    )
    .await;

    let request = checkout_request(
        "9876543210",
        dec!(1899),
        vec![line(&unit, "M", Some("Blue"), 1, Decimal::ZERO)],
    );
    let response = app.services.orders.create_order(request).await.unwrap();

    let item = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(response.order_id))
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.price, dec!(1899));
}

#[tokio::test]
async fn checkout_backfills_only_empty_profile_fields() {
    let app = TestApp::new().await;
    let buyer = seed_user(&app, Some("+919876543210"), None).await;
    let unit = seed_unit(
        &app,
        "Kurtas",
        true,
        "Chikankari Kurta",
        "White",
        Some("S"),
        6,
        dec!(999),
    )
    .await;

    // Different phone formatting than stored; canonicalization must match.
    let request = checkout_request(
        "98765 43210",
        dec!(999),
        vec![line(&unit, "S", Some("White"), 1, dec!(999))],
    );
    let response = app.services.orders.create_order(request).await.unwrap();

    let refreshed = user::Entity::find_by_id(buyer.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.first_name.as_deref(), Some("Asha Sharma"));
    assert_eq!(refreshed.address.as_deref(), Some("12 MG Road, Jaipur"));
    assert_eq!(refreshed.pincode.as_deref(), Some("302001"));

    let placed = order::Entity::find_by_id(response.order_id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(placed.user_id, Some(buyer.id));

    // A later checkout with different details must not overwrite.
    let mut second = checkout_request(
        "9876543210",
        dec!(999),
        vec![line(&unit, "S", Some("White"), 1, dec!(999))],
    );
    second.full_name = "Someone Else".to_string();
    second.address = "Another address".to_string();
    app.services.orders.create_order(second).await.unwrap();

    let unchanged = user::Entity::find_by_id(buyer.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(unchanged.first_name.as_deref(), Some("Asha Sharma"));
    assert_eq!(unchanged.address.as_deref(), Some("12 MG Road, Jaipur"));
}

#[tokio::test]
async fn valid_coupon_is_recomputed_and_claimed_in_the_transaction() {
    let app = TestApp::new().await;
    let unit = seed_unit(
        &app,
        "Sarees",
        false,
        "Kanjivaram Saree",
        "Gold",
        None,
        5,
        dec!(5000),
    )
    .await;
    let promo = seed_coupon(&app, coupon_defaults("WELCOME100")).await;

    let mut request = checkout_request(
        "9876543210",
        dec!(5000),
        vec![line(&unit, "FREE", Some("Gold"), 1, dec!(5000))],
    );
    // Lookup is case-insensitive.
    request.coupon_code = Some("welcome100".to_string());
    let response = app.services.orders.create_order(request).await.unwrap();

    let placed = order::Entity::find_by_id(response.order_id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(placed.discount_amount, dec!(100));
    assert_eq!(placed.coupon_id, Some(promo.id));

    let claimed = coupon::Entity::find_by_id(promo.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claimed.times_used, 1);
}

#[tokio::test]
async fn unknown_or_expired_coupon_never_fails_checkout() {
    let app = TestApp::new().await;
    let unit = seed_unit(
        &app,
        "Suits",
        true,
        "Palazzo Suit",
        "Pink",
        Some("L"),
        3,
        dec!(1500),
    )
    .await;

    let mut expired = coupon_defaults("GONE50");
    expired.valid_until = sea_orm::Set(Utc::now() - chrono::Duration::days(1));
    let stale = seed_coupon(&app, expired).await;

    for code in ["NOSUCHCODE", "GONE50"] {
        let mut request = checkout_request(
            "9876543210",
            dec!(1500),
            vec![line(&unit, "L", Some("Pink"), 1, dec!(1500))],
        );
        request.coupon_code = Some(code.to_string());
        let response = app.services.orders.create_order(request).await.unwrap();

        let placed = order::Entity::find_by_id(response.order_id)
            .one(&*app.db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(placed.discount_amount, Decimal::ZERO);
        assert_eq!(placed.coupon_id, None);
    }

    let untouched = coupon::Entity::find_by_id(stale.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(untouched.times_used, 0);
}
