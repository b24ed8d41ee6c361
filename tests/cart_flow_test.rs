mod common;

use axum::http::StatusCode;
use rust_decimal_macros::dec;
use serde_json::json;

use common::{decimal_field, seed_product, seed_user, spawn_app};

#[tokio::test]
async fn anonymous_user_cannot_add_to_cart() {
    let app = spawn_app().await;
    seed_product(&app.db, "Mug", "mug", dec!(12.99), 10).await;

    let response = app
        .request(
            "POST",
            "/api/v1/cart/items",
            None,
            Some(json!({ "product_id": 1, "quantity": 2 })),
        )
        .await;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn add_item_then_view_priced_cart() {
    let app = spawn_app().await;
    let product = seed_product(&app.db, "Mug", "mug", dec!(12.99), 10).await;
    seed_user(&app.db, "alice", "password1", false).await;
    let sid = app.login("alice", "password1").await;

    let response = app
        .request(
            "POST",
            "/api/v1/cart/items",
            Some(&sid),
            Some(json!({ "product_id": product.id, "quantity": 3 })),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let view = app.request("GET", "/api/v1/cart", Some(&sid), None).await;
    assert_eq!(view.status, StatusCode::OK);
    let lines = view.body["lines"].as_array().unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["quantity"], 3);
    assert_eq!(decimal_field(&view.body["total"]), dec!(38.97));
}

#[tokio::test]
async fn adding_same_product_accumulates_quantity() {
    let app = spawn_app().await;
    let product = seed_product(&app.db, "Mug", "mug", dec!(10.00), 10).await;
    seed_user(&app.db, "alice", "password1", false).await;
    let sid = app.login("alice", "password1").await;

    for qty in [2, 5] {
        app.request(
            "POST",
            "/api/v1/cart/items",
            Some(&sid),
            Some(json!({ "product_id": product.id, "quantity": qty })),
        )
        .await;
    }

    let view = app.request("GET", "/api/v1/cart", Some(&sid), None).await;
    let lines = view.body["lines"].as_array().unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["quantity"], 7);
}

#[tokio::test]
async fn unusable_quantities_count_as_one_each() {
    let app = spawn_app().await;
    let product = seed_product(&app.db, "Mug", "mug", dec!(10.00), 10).await;
    seed_user(&app.db, "alice", "password1", false).await;
    let sid = app.login("alice", "password1").await;

    // Each malformed quantity still adds a single unit.
    for quantity in [json!(0), json!(-4), json!("garbage"), json!(null)] {
        app.request(
            "POST",
            "/api/v1/cart/items",
            Some(&sid),
            Some(json!({ "product_id": product.id, "quantity": quantity })),
        )
        .await;
    }
    let view = app.request("GET", "/api/v1/cart", Some(&sid), None).await;
    assert_eq!(view.body["lines"][0]["quantity"], 4);

    // String numbers are honored.
    app.request(
        "POST",
        "/api/v1/cart/items",
        Some(&sid),
        Some(json!({ "product_id": product.id, "quantity": "4" })),
    )
    .await;
    let view = app.request("GET", "/api/v1/cart", Some(&sid), None).await;
    assert_eq!(view.body["lines"][0]["quantity"], 8);
}

#[tokio::test]
async fn update_replaces_cart_and_drops_zeroed_lines() {
    let app = spawn_app().await;
    let first = seed_product(&app.db, "Mug", "mug", dec!(10.00), 10).await;
    let second = seed_product(&app.db, "Plate", "plate", dec!(8.00), 10).await;
    seed_user(&app.db, "alice", "password1", false).await;
    let sid = app.login("alice", "password1").await;

    for product in [&first, &second] {
        app.request(
            "POST",
            "/api/v1/cart/items",
            Some(&sid),
            Some(json!({ "product_id": product.id, "quantity": 2 })),
        )
        .await;
    }

    let response = app
        .request(
            "PUT",
            "/api/v1/cart",
            Some(&sid),
            Some(json!({ "quantities": {
                (first.id.to_string()): 4,
                (second.id.to_string()): 0
            }})),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let lines = response.body["lines"].as_array().unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["product"]["id"], first.id);
    assert_eq!(lines[0]["quantity"], 4);
}

#[tokio::test]
async fn update_without_quantity_fields_leaves_cart_alone() {
    let app = spawn_app().await;
    let product = seed_product(&app.db, "Mug", "mug", dec!(10.00), 10).await;
    seed_user(&app.db, "alice", "password1", false).await;
    let sid = app.login("alice", "password1").await;

    app.request(
        "POST",
        "/api/v1/cart/items",
        Some(&sid),
        Some(json!({ "product_id": product.id, "quantity": 2 })),
    )
    .await;

    let response = app
        .request("PUT", "/api/v1/cart", Some(&sid), Some(json!({})))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["lines"].as_array().unwrap().len(), 1);
    assert_eq!(response.body["lines"][0]["quantity"], 2);
}

#[tokio::test]
async fn clear_cart_empties_it() {
    let app = spawn_app().await;
    let product = seed_product(&app.db, "Mug", "mug", dec!(10.00), 10).await;
    seed_user(&app.db, "alice", "password1", false).await;
    let sid = app.login("alice", "password1").await;

    app.request(
        "POST",
        "/api/v1/cart/items",
        Some(&sid),
        Some(json!({ "product_id": product.id })),
    )
    .await;

    let response = app.request("DELETE", "/api/v1/cart", Some(&sid), None).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let view = app.request("GET", "/api/v1/cart", Some(&sid), None).await;
    assert!(view.body["lines"].as_array().unwrap().is_empty());
    assert_eq!(decimal_field(&view.body["total"]), dec!(0));
}

#[tokio::test]
async fn stale_product_ids_are_skipped_in_view() {
    let app = spawn_app().await;
    let product = seed_product(&app.db, "Mug", "mug", dec!(10.00), 10).await;
    seed_user(&app.db, "alice", "password1", false).await;
    let sid = app.login("alice", "password1").await;

    app.request(
        "POST",
        "/api/v1/cart/items",
        Some(&sid),
        Some(json!({ "product_id": product.id, "quantity": 1 })),
    )
    .await;
    // An id that was never in the catalog.
    app.request(
        "POST",
        "/api/v1/cart/items",
        Some(&sid),
        Some(json!({ "product_id": 9999, "quantity": 1 })),
    )
    .await;

    let view = app.request("GET", "/api/v1/cart", Some(&sid), None).await;
    assert_eq!(view.status, StatusCode::OK);
    let lines = view.body["lines"].as_array().unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["product"]["id"], product.id);
    assert_eq!(decimal_field(&view.body["total"]), dec!(10));
}

#[tokio::test]
async fn logout_keeps_the_cart_with_the_session() {
    let app = spawn_app().await;
    let product = seed_product(&app.db, "Mug", "mug", dec!(10.00), 10).await;
    seed_user(&app.db, "alice", "password1", false).await;
    let sid = app.login("alice", "password1").await;

    app.request(
        "POST",
        "/api/v1/cart/items",
        Some(&sid),
        Some(json!({ "product_id": product.id })),
    )
    .await;

    let response = app
        .request("POST", "/api/v1/auth/logout", Some(&sid), None)
        .await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let view = app.request("GET", "/api/v1/cart", Some(&sid), None).await;
    assert_eq!(view.body["lines"].as_array().unwrap().len(), 1);

    // But cart mutation now requires logging back in.
    let denied = app
        .request(
            "POST",
            "/api/v1/cart/items",
            Some(&sid),
            Some(json!({ "product_id": product.id })),
        )
        .await;
    assert_eq!(denied.status, StatusCode::UNAUTHORIZED);
}
