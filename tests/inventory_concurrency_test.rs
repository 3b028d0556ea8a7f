mod common;

use assert_matches::assert_matches;
use common::*;
use naari_couture_api::entities::{coupon, order};
use naari_couture_api::errors::ServiceError;
use naari_couture_api::services::orders::OrderLineRequest;
use rust_decimal_macros::dec;
use sea_orm::{EntityTrait, PaginatorTrait};

#[tokio::test]
async fn second_checkout_for_the_last_unit_is_rejected() {
    let app = TestApp::new().await;
    let unit = seed_unit(
        &app,
        "Sarees",
        false,
        "Organza Saree",
        "Peach",
        None,
        1,
        dec!(3200),
    )
    .await;

    let first = checkout_request(
        "9876543210",
        dec!(3200),
        vec![line(&unit, "FREE", Some("Peach"), 1, dec!(3200))],
    );
    app.services.orders.create_order(first).await.unwrap();

    let second = checkout_request(
        "9123456780",
        dec!(3200),
        vec![line(&unit, "FREE", Some("Peach"), 1, dec!(3200))],
    );
    let err = app.services.orders.create_order(second).await.unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(reason) => {
        assert!(reason.contains("Organza Saree"));
        assert!(reason.contains("FREE"));
    });

    assert_eq!(stock_of(&app, unit.size_id).await, 0);
}

#[tokio::test]
async fn racing_checkouts_commit_exactly_one_order() {
    let app = TestApp::new().await;
    let unit = seed_unit(
        &app,
        "Lehengas",
        true,
        "Velvet Lehenga",
        "Maroon",
        Some("M"),
        1,
        dec!(7999),
    )
    .await;

    let make_request = |phone: &str| {
        checkout_request(
            phone,
            dec!(7999),
            vec![line(&unit, "M", Some("Maroon"), 1, dec!(7999))],
        )
    };

    let (a, b) = tokio::join!(
        app.services.orders.create_order(make_request("9876543210")),
        app.services.orders.create_order(make_request("9123456780")),
    );

    let successes = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(successes, 1, "exactly one of the racing checkouts may win");
    assert_eq!(stock_of(&app, unit.size_id).await, 0);
    assert_eq!(
        order::Entity::find().count(&*app.db).await.unwrap(),
        1,
        "the losing checkout must leave no order row behind"
    );
}

#[tokio::test]
async fn failed_line_rolls_back_every_effect() {
    let app = TestApp::new().await;
    let unit = seed_unit(
        &app,
        "Kurtas",
        true,
        "Silk Kurta",
        "Black",
        Some("M"),
        5,
        dec!(1200),
    )
    .await;
    let promo = seed_coupon(&app, coupon_defaults("FEST100")).await;

    // First line is fine; the second references a size that does not exist,
    // so the whole checkout must unwind.
    let broken_line = OrderLineRequest {
        product_id: Some(unit.product_id),
        variant_id: None,
        size_id: None,
        quantity: 1,
        price: dec!(1200),
        size: "XXL".to_string(),
        color: Some("Black".to_string()),
    };
    let mut request = checkout_request(
        "9876543210",
        dec!(2400),
        vec![
            line(&unit, "M", Some("Black"), 1, dec!(1200)),
            broken_line,
        ],
    );
    request.coupon_code = Some("FEST100".to_string());

    let err = app.services.orders.create_order(request).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(reason) => {
        assert!(reason.contains("Black"));
        assert!(reason.contains("XXL"));
    });

    // No order, no stock movement, no coupon claim.
    assert_eq!(order::Entity::find().count(&*app.db).await.unwrap(), 0);
    assert_eq!(stock_of(&app, unit.size_id).await, 5);
    let untouched = coupon::Entity::find_by_id(promo.id)
        .one(&*app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(untouched.times_used, 0);
}

#[tokio::test]
async fn oversized_quantity_is_rejected_up_front() {
    let app = TestApp::new().await;
    let unit = seed_unit(
        &app,
        "Suits",
        true,
        "Sharara Suit",
        "Teal",
        Some("S"),
        2,
        dec!(2100),
    )
    .await;

    let request = checkout_request(
        "9876543210",
        dec!(6300),
        vec![line(&unit, "S", Some("Teal"), 3, dec!(2100))],
    );
    let err = app.services.orders.create_order(request).await.unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));
    assert_eq!(stock_of(&app, unit.size_id).await, 2);
}
