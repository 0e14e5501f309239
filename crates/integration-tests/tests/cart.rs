//! Cart endpoint integration tests.
//!
//! Run with: cargo test -p cartwise-integration-tests

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::time::{Duration, Instant};

use reqwest::StatusCode;
use serde_json::json;
use tokio::task::JoinSet;

use cartwise_integration_tests::{
    MCO_TIMEOUT, MOCK_SUGGESTION_TITLE, MockReply, TEST_USER_HEADER, TestContext, Upstream,
    body_json,
};

// ============================================================================
// Add / Show
// ============================================================================

#[tokio::test]
async fn test_repeated_adds_then_threshold_refresh() {
    let ctx = TestContext::start().await;

    let first = ctx.add_to_cart(7, 1, 2).await;
    assert_eq!(first.status(), StatusCode::OK);
    let second = body_json(ctx.add_to_cart(7, 1, 3).await).await;
    assert_eq!(second["message"], "Item added to cart");
    assert_eq!(second["item"]["quantity"], 5);

    for product_id in 2..=4 {
        let resp = ctx.add_to_cart(7, product_id, 1).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    // The fourth distinct product pushes the cart over the threshold.
    let stored = ctx.wait_for_stored_suggestions(7).await;
    assert_eq!(stored[0]["title"], MOCK_SUGGESTION_TITLE);
    assert_eq!(stored[0]["items"], json!(["Basil", "Parmesan"]));
    assert_eq!(stored[0]["user_id"], 7);

    let runs = ctx.upstream.runs();
    assert!(!runs.is_empty());
    assert_eq!(runs[0]["userId"], "user_7");
    let prompt = runs[0]["newMessage"]["parts"][0]["text"].as_str().unwrap();
    assert!(prompt.starts_with("user_id: 7"));
    assert!(prompt.contains("Olive oil"));

    let cart = body_json(ctx.get(7, "/cart").await).await;
    assert_eq!(cart["user_id"], 7);
    let items = cart["items"].as_array().unwrap();
    assert_eq!(items.len(), 4);
    let tomatoes = items.iter().find(|line| line["product_id"] == 1).unwrap();
    assert_eq!(tomatoes["quantity"], 5);
    assert_eq!(tomatoes["product"]["name"], "Tomatoes");
}

#[tokio::test]
async fn test_no_refresh_at_or_below_threshold() {
    let ctx = TestContext::start().await;

    for product_id in 1..=3 {
        ctx.add_to_cart(3, product_id, 1).await;
    }
    // Every add is also relayed; once all three land, any refresh would have too.
    ctx.upstream.wait_for_notifications(3).await;

    assert!(ctx.upstream.runs().is_empty());
    let available = body_json(ctx.get(3, "/suggestions/available").await).await;
    assert_eq!(available["available"], false);
}

#[tokio::test]
async fn test_carts_are_per_user() {
    let ctx = TestContext::with_upstream(Upstream::None).await;

    ctx.add_to_cart(1, 1, 1).await;
    ctx.add_to_cart(2, 2, 4).await;

    let cart = body_json(ctx.get(1, "/cart").await).await;
    let items = cart["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["product_id"], 1);
}

#[tokio::test]
async fn test_failing_upstream_does_not_fail_the_add() {
    let ctx = TestContext::start().await;
    ctx.upstream
        .reply_with(MockReply::status(StatusCode::SERVICE_UNAVAILABLE));

    for product_id in 1..=4 {
        let resp = ctx.add_to_cart(7, product_id, 1).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    // The refresh reached the upstream and failed there.
    ctx.upstream.wait_for_runs(1).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let available = body_json(ctx.get(7, "/suggestions/available").await).await;
    assert_eq!(available["available"], false);
    let stored = body_json(ctx.get(7, "/suggestions/stored").await).await;
    assert!(stored["suggestions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_slow_upstream_does_not_delay_the_add() {
    let ctx = TestContext::start().await;
    ctx.upstream
        .reply_with(MockReply::default().delayed(MCO_TIMEOUT * 3));

    for product_id in 1..=3 {
        ctx.add_to_cart(7, product_id, 1).await;
    }
    let started = Instant::now();
    let fourth = ctx.add_to_cart(7, 4, 1).await;
    assert_eq!(fourth.status(), StatusCode::OK);
    assert!(started.elapsed() < MCO_TIMEOUT / 2);

    // Past the client timeout the refresh has given up without storing.
    ctx.upstream.wait_for_runs(1).await;
    tokio::time::sleep(MCO_TIMEOUT + Duration::from_millis(300)).await;

    let available = body_json(ctx.get(7, "/suggestions/available").await).await;
    assert_eq!(available["available"], false);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_of_one_product_share_a_line() {
    let ctx = TestContext::with_upstream(Upstream::None).await;

    let mut adds = JoinSet::new();
    for quantity in 1..=10 {
        let request = ctx
            .client
            .post(ctx.url("/cart/add"))
            .header(TEST_USER_HEADER, "7")
            .json(&json!({ "product_id": 1, "quantity": quantity }));
        adds.spawn(request.send());
    }
    while let Some(resp) = adds.join_next().await {
        assert_eq!(resp.unwrap().unwrap().status(), StatusCode::OK);
    }

    let cart = body_json(ctx.get(7, "/cart").await).await;
    let items = cart["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 55);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_adds_create_one_cart() {
    let ctx = TestContext::with_upstream(Upstream::None).await;

    let mut adds = JoinSet::new();
    for product_id in 1..=6 {
        let request = ctx
            .client
            .post(ctx.url("/cart/add"))
            .header(TEST_USER_HEADER, "8")
            .json(&json!({ "product_id": product_id, "quantity": 1 }));
        adds.spawn(request.send());
    }
    while let Some(resp) = adds.join_next().await {
        assert_eq!(resp.unwrap().unwrap().status(), StatusCode::OK);
    }

    let cart = body_json(ctx.get(8, "/cart").await).await;
    let items = cart["items"].as_array().unwrap();
    assert_eq!(items.len(), 6);
    assert!(items.iter().all(|line| line["cart_id"] == cart["id"]));
}

// ============================================================================
// Validation
// ============================================================================

#[tokio::test]
async fn test_add_rejects_bad_input() {
    let ctx = TestContext::with_upstream(Upstream::None).await;

    let zero = ctx.add_to_cart(7, 1, 0).await;
    assert_eq!(zero.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(zero).await["error"].is_string());

    let negative = ctx.add_to_cart(7, 1, -2).await;
    assert_eq!(negative.status(), StatusCode::BAD_REQUEST);

    let missing_field = ctx.post(7, "/cart/add", &json!({ "quantity": 1 })).await;
    assert_eq!(missing_field.status(), StatusCode::BAD_REQUEST);

    let unknown = ctx.add_to_cart(7, 99, 1).await;
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    // Nothing above created a cart.
    assert_eq!(ctx.get(7, "/cart").await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_requires_identity() {
    let ctx = TestContext::with_upstream(Upstream::None).await;

    let resp = ctx.client.get(ctx.url("/cart")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["error"], "Authentication required");
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn test_delete_item() {
    let ctx = TestContext::with_upstream(Upstream::None).await;

    let no_cart = ctx
        .delete(7, "/cart/delete", Some(&json!({ "product_id": 1 })))
        .await;
    assert_eq!(no_cart.status(), StatusCode::NOT_FOUND);

    ctx.add_to_cart(7, 1, 2).await;
    ctx.add_to_cart(7, 2, 1).await;

    let absent = ctx
        .delete(7, "/cart/delete", Some(&json!({ "product_id": 5 })))
        .await;
    assert_eq!(absent.status(), StatusCode::NOT_FOUND);

    let removed = ctx
        .delete(7, "/cart/delete", Some(&json!({ "product_id": 1 })))
        .await;
    assert_eq!(removed.status(), StatusCode::OK);
    assert_eq!(body_json(removed).await["message"], "Item removed");

    let cart = body_json(ctx.get(7, "/cart").await).await;
    let items = cart["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["product_id"], 2);

    let no_body = ctx.delete(7, "/cart/delete", None).await;
    assert_eq!(no_body.status(), StatusCode::BAD_REQUEST);
}
