mod common;

use assert_matches::assert_matches;
use common::*;
use naari_couture_api::errors::ServiceError;
use rust_decimal_macros::dec;

#[tokio::test]
async fn transition_into_returned_restores_stock_exactly_once() {
    let app = TestApp::new().await;
    let unit = seed_unit(
        &app,
        "Sarees",
        false,
        "Chiffon Saree",
        "Navy",
        None,
        5,
        dec!(1800),
    )
    .await;

    let request = checkout_request(
        "9876543210",
        dec!(3600),
        vec![line(&unit, "FREE", Some("Navy"), 2, dec!(1800))],
    );
    let placed = app.services.orders.create_order(request).await.unwrap();
    assert_eq!(stock_of(&app, unit.size_id).await, 3);
    assert_eq!(master_stock_of(&app, unit.variant_id).await, 3);

    let orders = &app.services.orders;
    orders
        .update_order_status(placed.order_id, "shipped")
        .await
        .unwrap();
    assert_eq!(stock_of(&app, unit.size_id).await, 3);

    // shipped -> returned credits both counters.
    let returned = orders
        .update_order_status(placed.order_id, "returned")
        .await
        .unwrap();
    assert_eq!(returned.status, "returned");
    assert_eq!(stock_of(&app, unit.size_id).await, 5);
    assert_eq!(master_stock_of(&app, unit.variant_id).await, 5);

    // Re-saving an already-returned order restores nothing more.
    orders
        .update_order_status(placed.order_id, "returned")
        .await
        .unwrap();
    assert_eq!(stock_of(&app, unit.size_id).await, 5);
    assert_eq!(master_stock_of(&app, unit.variant_id).await, 5);
}

#[tokio::test]
async fn leaving_returned_does_not_decrement_again() {
    let app = TestApp::new().await;
    let unit = seed_unit(
        &app,
        "Kurtas",
        true,
        "Cotton Kurta",
        "Yellow",
        Some("M"),
        4,
        dec!(899),
    )
    .await;

    let request = checkout_request(
        "9876543210",
        dec!(899),
        vec![line(&unit, "M", Some("Yellow"), 1, dec!(899))],
    );
    let placed = app.services.orders.create_order(request).await.unwrap();

    let orders = &app.services.orders;
    orders
        .update_order_status(placed.order_id, "returned")
        .await
        .unwrap();
    assert_eq!(stock_of(&app, unit.size_id).await, 4);

    // Moving out of returned is an administrative correction; stock is not
    // touched in either direction.
    orders
        .update_order_status(placed.order_id, "delivered")
        .await
        .unwrap();
    assert_eq!(stock_of(&app, unit.size_id).await, 4);
}

#[tokio::test]
async fn unknown_status_is_rejected() {
    let app = TestApp::new().await;
    let unit = seed_unit(
        &app,
        "Suits",
        true,
        "Patiala Suit",
        "Green",
        Some("L"),
        2,
        dec!(1600),
    )
    .await;

    let request = checkout_request(
        "9876543210",
        dec!(1600),
        vec![line(&unit, "L", Some("Green"), 1, dec!(1600))],
    );
    let placed = app.services.orders.create_order(request).await.unwrap();

    let err = app
        .services
        .orders
        .update_order_status(placed.order_id, "misplaced")
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStatus(_));

    let err = app
        .services
        .orders
        .update_order_status(9999, "shipped")
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn my_orders_matches_by_account_link_and_phone() {
    let app = TestApp::new().await;
    let buyer = seed_user(&app, Some("+919876543210"), None).await;
    let unit = seed_unit(
        &app,
        "Lehengas",
        true,
        "Net Lehenga",
        "Rose",
        Some("S"),
        6,
        dec!(5500),
    )
    .await;

    // Guest checkout with a matching phone gets linked during the
    // transaction; a checkout from another phone must not show up.
    let mine = checkout_request(
        "98765-43210",
        dec!(5500),
        vec![line(&unit, "S", Some("Rose"), 1, dec!(5500))],
    );
    app.services.orders.create_order(mine).await.unwrap();

    let other = checkout_request(
        "9111111111",
        dec!(5500),
        vec![line(&unit, "S", Some("Rose"), 1, dec!(5500))],
    );
    app.services.orders.create_order(other).await.unwrap();

    let history = app.services.orders.my_orders(&buyer).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].phone_number, "+919876543210");
    assert_eq!(history[0].items.len(), 1);
}
