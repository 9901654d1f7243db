//! Routing and access checks that never reach the database.

mod common;

use axum::http::{Method, StatusCode};
use common::{offline_app, send, test_config, token};
use marketplace::utils::{Role, error_codes};
use serde_json::json;

#[tokio::test]
async fn protected_route_without_token_is_unauthorized() {
    let app = offline_app(test_config());
    let (status, body) = send(&app, Method::GET, "/cart/get_user_cart", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], false);
    assert_eq!(body["code"], error_codes::AUTH_FAILED);
}

#[tokio::test]
async fn forged_token_is_unauthorized() {
    let app = offline_app(test_config());
    let (status, _) = send(&app, Method::GET, "/wishlist/get_user_wishlist", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn user_cannot_reach_admin_routes() {
    let app = offline_app(test_config());
    let user = token(Role::User);
    for uri in [
        "/order/get_total_orders",
        "/order/total_revenue",
        "/vendor/get_vendor_list",
        "/user/get_users",
    ] {
        let (status, body) = send(&app, Method::GET, uri, Some(&user), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
        assert_eq!(body["code"], error_codes::PERMISSION_DENIED);
    }
}

#[tokio::test]
async fn vendor_has_no_cart() {
    let app = offline_app(test_config());
    let vendor = token(Role::Vendor);
    let (status, _) = send(&app, Method::GET, "/cart/get_user_cart", Some(&vendor), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn wishlist_requires_token() {
    let app = offline_app(test_config());
    let id = uuid::Uuid::new_v4();
    for (method, uri) in [
        (Method::GET, "/wishlist/get_user_wishlist".to_string()),
        (Method::POST, format!("/wishlist/add_to_wishlist/{id}")),
        (Method::GET, format!("/wishlist/check/{id}")),
        (Method::DELETE, "/wishlist".to_string()),
    ] {
        let (status, body) = send(&app, method, &uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["code"], error_codes::AUTH_FAILED);
    }
}

#[tokio::test]
async fn vendor_has_no_wishlist() {
    let app = offline_app(test_config());
    let vendor = token(Role::Vendor);
    let id = uuid::Uuid::new_v4();
    for (method, uri) in [
        (Method::GET, "/wishlist/get_user_wishlist".to_string()),
        (Method::POST, format!("/wishlist/add_to_wishlist/{id}")),
        (Method::POST, format!("/wishlist/remove_from_wishlist/{id}")),
    ] {
        let (status, body) = send(&app, method, &uri, Some(&vendor), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
        assert_eq!(body["code"], error_codes::PERMISSION_DENIED);
    }
}

#[tokio::test]
async fn user_cannot_manage_catalog() {
    let app = offline_app(test_config());
    let user = token(Role::User);
    let (status, _) = send(
        &app,
        Method::POST,
        "/products/check_duplicate_product",
        Some(&user),
        Some(json!({ "name": "Phone" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_cannot_place_orders() {
    let app = offline_app(test_config());
    let admin = token(Role::Admin);
    let (status, _) = send(
        &app,
        Method::POST,
        "/order/buy_now",
        Some(&admin),
        Some(json!({ "product_id": uuid::Uuid::new_v4() })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn signup_with_bad_email_is_rejected() {
    let app = offline_app(test_config());
    let (status, body) = send(
        &app,
        Method::POST,
        "/user/signup",
        None,
        Some(json!({
            "first_name": "Asha",
            "last_name": "Rao",
            "email": "not-an-email",
            "password": "secret123"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], error_codes::VALIDATION_ERROR);
}

#[tokio::test]
async fn vendor_login_with_short_password_is_rejected() {
    let app = offline_app(test_config());
    let (status, _) = send(
        &app,
        Method::POST,
        "/vendor/login",
        None,
        Some(json!({ "email": "shop@example.com", "password": "123" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn zero_quantity_never_reaches_the_cart() {
    let app = offline_app(test_config());
    let user = token(Role::User);
    let (status, _) = send(
        &app,
        Method::POST,
        "/cart/add_to_cart",
        Some(&user),
        Some(json!({ "product_id": uuid::Uuid::new_v4(), "quantity": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn feedback_rating_out_of_range_is_rejected() {
    let app = offline_app(test_config());
    let user = token(Role::User);
    let (status, _) = send(
        &app,
        Method::POST,
        "/feedback/add_feedback",
        Some(&user),
        Some(json!({ "product_id": uuid::Uuid::new_v4(), "message": "great", "rating": 6 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn offer_without_products_is_rejected() {
    let app = offline_app(test_config());
    let admin = token(Role::Admin);
    let (status, _) = send(
        &app,
        Method::POST,
        "/offer/add_offers",
        Some(&admin),
        Some(json!({ "type": "Summer Sale", "products": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn routes_are_mounted_under_base_uri() {
    let mut config = test_config();
    config.api_base_uri = "/api/".into();
    let app = offline_app(config);

    let (status, _) = send(&app, Method::GET, "/api/cart/get_user_cart", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::GET, "/cart/get_user_cart", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ping_is_public() {
    let app = offline_app(test_config());
    let (status, body) = send(&app, Method::GET, "/ping", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], "pong");
}
