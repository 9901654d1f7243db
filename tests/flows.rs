//! End-to-end flows against a real Postgres.
//!
//! Run with `DATABASE_URL=... cargo test -- --ignored`.

mod common;

use axum::{
    Router,
    http::{Method, StatusCode},
};
use common::{send, state_with, test_config};
use marketplace::router::create_router;
use serde_json::{Value, json};
use sqlx::PgPool;
use uuid::Uuid;

fn app(pool: PgPool) -> Router {
    create_router(state_with(pool, test_config()))
}

fn decimal(value: &Value) -> f64 {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        other => other.as_f64().expect("decimal number"),
    }
}

/// Section, category and subcategory plus one product priced 1500 (was 2000).
async fn seed_product(pool: &PgPool, name: &str) -> Uuid {
    let section = Uuid::new_v4();
    let category = Uuid::new_v4();
    let subcategory = Uuid::new_v4();
    let product = Uuid::new_v4();
    let tag = product.simple().to_string();

    sqlx::query("INSERT INTO main_menus (id, menu_name, slug) VALUES ($1, $2, $2)")
        .bind(section)
        .bind(format!("section-{tag}"))
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO categories (id, main_menu_id, menu_name, slug) VALUES ($1, $2, $3, $3)")
        .bind(category)
        .bind(section)
        .bind(format!("category-{tag}"))
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO subcategories (id, category_id, menu_name, slug) VALUES ($1, $2, $3, $3)")
        .bind(subcategory)
        .bind(category)
        .bind(format!("subcategory-{tag}"))
        .execute(pool)
        .await
        .unwrap();
    sqlx::query(
        r#"
        INSERT INTO products (id, section_id, category_id, subcategory_id, name, brand, item_code,
                              actual_price, selling_price, stock)
        VALUES ($1, $2, $3, $4, $5, 'Acme', $6, 2000, 1500, 5)
        "#,
    )
    .bind(product)
    .bind(section)
    .bind(category)
    .bind(subcategory)
    .bind(name)
    .bind(&tag[..10])
    .execute(pool)
    .await
    .unwrap();
    product
}

async fn signup(app: &Router, email: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/user/signup",
        None,
        Some(json!({
            "first_name": "Asha",
            "last_name": "Rao",
            "email": email,
            "password": "secret123"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["data"]["token"].as_str().unwrap().to_string()
}

async fn add_address(app: &Router, token: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/user/update_user",
        Some(token),
        Some(json!({
            "address": {
                "full_name": "Asha Rao",
                "phone": "9876543210",
                "pincode": "560001",
                "address": "12 MG Road",
                "city": "Bengaluru",
                "state": "Karnataka",
                "address_type": "Home"
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let address = &body["data"]["addresses"][0];
    assert_eq!(address["is_default"], true);
    address["id"].as_str().unwrap().to_string()
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn checkout_moves_cart_into_order(pool: PgPool) {
    let product = seed_product(&pool, "Phone X").await;
    let app = app(pool);
    let user = signup(&app, "asha@example.com").await;
    let address_id = add_address(&app, &user).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/order/create_order",
        Some(&user),
        Some(json!({ "address_id": address_id })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, _) = send(
        &app,
        Method::POST,
        "/cart/add_to_cart",
        Some(&user),
        Some(json!({ "product_id": product, "quantity": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, cart) = send(&app, Method::GET, "/cart/get_user_cart", Some(&user), None).await;
    assert_eq!(cart["data"]["total_items"], 1);
    assert_eq!(decimal(&cart["data"]["total_price"]), 1500.0);

    let (status, order) = send(
        &app,
        Method::POST,
        "/order/create_order",
        Some(&user),
        Some(json!({ "address_id": address_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{order}");
    let order = &order["data"];
    assert_eq!(decimal(&order["items_price"]), 1500.0);
    assert_eq!(decimal(&order["tax_price"]), 150.0);
    assert_eq!(decimal(&order["shipping_price"]), 0.0);
    assert_eq!(decimal(&order["total_price"]), 1650.0);
    assert!(order["order_number"].as_str().unwrap().starts_with("ORD"));

    let (_, cart) = send(&app, Method::GET, "/cart/get_user_cart", Some(&user), None).await;
    assert_eq!(cart["data"]["total_items"], 0);
    assert_eq!(cart["data"]["items"].as_array().unwrap().len(), 0);

    let (status, orders) = send(&app, Method::GET, "/order/user_orders", Some(&user), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(orders["data"].as_array().unwrap().len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn wishlist_ignores_repeated_adds(pool: PgPool) {
    let product = seed_product(&pool, "Kettle").await;
    let app = app(pool);
    let user = signup(&app, "ravi@example.com").await;
    let add = format!("/wishlist/add_to_wishlist/{product}");

    for _ in 0..2 {
        let (status, body) = send(&app, Method::POST, &add, Some(&user), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    let check = format!("/wishlist/check/{product}");
    let (_, body) = send(&app, Method::GET, &check, Some(&user), None).await;
    assert_eq!(body["data"]["in_wishlist"], true);

    let remove = format!("/wishlist/remove_from_wishlist/{product}");
    let (status, _) = send(&app, Method::POST, &remove, Some(&user), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, Method::GET, &check, Some(&user), None).await;
    assert_eq!(body["data"]["in_wishlist"], false);

    let missing = format!("/wishlist/add_to_wishlist/{}", Uuid::new_v4());
    let (status, _) = send(&app, Method::POST, &missing, Some(&user), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn offer_products_are_not_duplicated(pool: PgPool) {
    let product = seed_product(&pool, "Blender").await;
    let app = app(pool);

    let credentials = json!({ "email": "admin@example.com", "password": "secret123" });
    let (status, _) = send(&app, Method::POST, "/vendor/admin_register", None, Some(credentials.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, login) = send(&app, Method::POST, "/vendor/login", None, Some(credentials)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(login["data"]["is_admin"], true);
    let admin = login["data"]["token"].as_str().unwrap().to_string();

    let offer = json!({
        "type": "Summer Sale",
        "description": "Hot deals",
        "products": [{
            "product_id": product,
            "start_date": "2026-01-01T00:00:00Z",
            "end_date": "2099-01-01T00:00:00Z"
        }]
    });
    let (status, first) = send(&app, Method::POST, "/offer/add_offers", Some(&admin), Some(offer.clone())).await;
    assert_eq!(status, StatusCode::OK, "{first}");
    assert_eq!(first["data"]["added"], 1);

    let (_, second) = send(&app, Method::POST, "/offer/add_offers", Some(&admin), Some(offer)).await;
    assert_eq!(second["data"]["added"], 0);
    assert_eq!(second["data"]["offer"]["products"].as_array().unwrap().len(), 1);

    let (status, dynamic) = send(&app, Method::GET, "/offer/get_dynamic_offers", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dynamic["data"].as_array().unwrap().len(), 1);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn concurrent_address_adds_respect_the_limit(pool: PgPool) {
    let app = app(pool);
    let token = signup(&app, "busy@example.com").await;

    let adds = (0..5).map(|i| {
        let app = app.clone();
        let token = token.clone();
        async move {
            send(
                &app,
                Method::POST,
                "/user/update_user",
                Some(&token),
                Some(json!({
                    "address": {
                        "full_name": format!("Asha {i}"),
                        "phone": "9876543210",
                        "pincode": "560001",
                        "address": "12 MG Road",
                        "city": "Bengaluru",
                        "state": "Karnataka",
                        "address_type": "Home",
                        "is_default": true
                    }
                })),
            )
            .await
            .0
        }
    });
    let statuses = futures_util::future::join_all(adds).await;
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 3, "{statuses:?}");
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::BAD_REQUEST).count(), 2, "{statuses:?}");

    let (status, user) = send(&app, Method::GET, "/user/get_user", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let addresses = user["data"]["addresses"].as_array().unwrap();
    assert_eq!(addresses.len(), 3);
    assert_eq!(addresses.iter().filter(|a| a["is_default"] == true).count(), 1);
}
