mod common;

use common::*;
use naari_couture_api::entities::review;
use naari_couture_api::services::reviews::SubmitReviewRequest;
use rust_decimal_macros::dec;
use sea_orm::{EntityTrait, PaginatorTrait};

fn review_body(rating: i32, comment: &str) -> SubmitReviewRequest {
    SubmitReviewRequest {
        rating,
        comment: Some(comment.to_string()),
        images: vec![],
    }
}

#[tokio::test]
async fn buyers_are_verified_and_rate_freely() {
    let app = TestApp::new().await;
    let buyer = seed_user(&app, Some("+919876543210"), None).await;
    let unit = seed_unit(
        &app,
        "Sarees",
        false,
        "Cotton Saree",
        "Indigo",
        None,
        5,
        dec!(1500),
    )
    .await;

    let request = checkout_request(
        "9876543210",
        dec!(1500),
        vec![line(&unit, "FREE", Some("Indigo"), 1, dec!(1500))],
    );
    app.services.orders.create_order(request).await.unwrap();

    let recorded = app
        .services
        .reviews
        .submit(&buyer, unit.product_id, review_body(2, "Color faded fast"))
        .await
        .unwrap();

    assert!(recorded.is_verified_buyer);
    assert_eq!(recorded.rating, 2);
    assert_eq!(recorded.comment, "Color faded fast");
}

#[tokio::test]
async fn non_buyers_floor_at_four_stars() {
    let app = TestApp::new().await;
    let visitor = seed_user(&app, Some("+919111111111"), None).await;
    let unit = seed_unit(
        &app,
        "Lehengas",
        true,
        "Sequin Lehenga",
        "Silver",
        Some("M"),
        5,
        dec!(8999),
    )
    .await;

    let recorded = app
        .services
        .reviews
        .submit(&visitor, unit.product_id, review_body(1, "Never bought it"))
        .await
        .unwrap();

    assert!(!recorded.is_verified_buyer);
    assert_eq!(recorded.rating, 4);
}

#[tokio::test]
async fn returned_orders_do_not_count_as_purchases() {
    let app = TestApp::new().await;
    let buyer = seed_user(&app, Some("+919876543210"), None).await;
    let unit = seed_unit(
        &app,
        "Suits",
        true,
        "Churidar Suit",
        "Orange",
        Some("S"),
        5,
        dec!(2000),
    )
    .await;

    let request = checkout_request(
        "9876543210",
        dec!(2000),
        vec![line(&unit, "S", Some("Orange"), 1, dec!(2000))],
    );
    let placed = app.services.orders.create_order(request).await.unwrap();
    app.services
        .orders
        .update_order_status(placed.order_id, "returned")
        .await
        .unwrap();

    let recorded = app
        .services
        .reviews
        .submit(&buyer, unit.product_id, review_body(1, "Sent it back"))
        .await
        .unwrap();
    assert!(!recorded.is_verified_buyer);
    assert_eq!(recorded.rating, 4);
}

#[tokio::test]
async fn resubmission_replaces_the_prior_review() {
    let app = TestApp::new().await;
    let buyer = seed_user(&app, Some("+919876543210"), None).await;
    let unit = seed_unit(
        &app,
        "Kurtas",
        true,
        "Printed Kurta",
        "Mustard",
        Some("L"),
        5,
        dec!(750),
    )
    .await;

    let request = checkout_request(
        "9876543210",
        dec!(750),
        vec![line(&unit, "L", Some("Mustard"), 1, dec!(750))],
    );
    app.services.orders.create_order(request).await.unwrap();

    let reviews = &app.services.reviews;
    reviews
        .submit(&buyer, unit.product_id, review_body(5, "Lovely"))
        .await
        .unwrap();
    let second = reviews
        .submit(&buyer, unit.product_id, review_body(3, "Shrunk after a wash"))
        .await
        .unwrap();

    assert_eq!(second.rating, 3);
    assert_eq!(
        review::Entity::find().count(&*app.db).await.unwrap(),
        1,
        "one review per user per product"
    );

    let listed = reviews.list_for_product(unit.product_id).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].comment, "Shrunk after a wash");
}

#[tokio::test]
async fn helpful_votes_toggle_per_user() {
    let app = TestApp::new().await;
    let author = seed_user(&app, Some("+919876543210"), None).await;
    let reader = seed_user(&app, Some("+919222222222"), None).await;
    let unit = seed_unit(
        &app,
        "Sarees",
        false,
        "Linen Saree",
        "Olive",
        None,
        5,
        dec!(2200),
    )
    .await;

    let posted = app
        .services
        .reviews
        .submit(&author, unit.product_id, review_body(4, "Good drape"))
        .await
        .unwrap();

    let reviews = &app.services.reviews;
    let on = reviews.toggle_helpful(&reader, posted.id).await.unwrap();
    assert!(on.liked);
    assert_eq!(on.helpful_count, 1);

    let off = reviews.toggle_helpful(&reader, posted.id).await.unwrap();
    assert!(!off.liked);
    assert_eq!(off.helpful_count, 0);
}
