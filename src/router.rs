use axum::{
    Json, Router,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
};

use crate::{
    AppState,
    common::ApiResponse,
    middleware::{
        log_errors, require_admin, require_user, require_user_or_admin, require_vendor,
        require_vendor_or_admin,
    },
    routes::{
        analytics, banner, cart, feedback, menu, offer, order, product, recently_viewed, user,
        vendor, wishlist,
    },
    utils::success_to_api_response,
};

async fn ping() -> (StatusCode, Json<ApiResponse<&'static str>>) {
    (StatusCode::OK, success_to_api_response("pong"))
}

pub fn user_routes(state: &AppState) -> Router<AppState> {
    let authenticated = Router::new()
        .route("/change_password", post(user::change_password))
        .route("/get_user", get(user::get_user))
        .route("/update_user", post(user::update_user))
        .route("/update_user_password", post(user::update_user_password))
        .route("/update_user_address", post(user::update_user_address))
        .route("/address/{id}", delete(user::delete_address))
        .route_layer(from_fn_with_state(state.clone(), require_user));

    let admin = Router::new()
        .route("/get_users", get(user::get_users))
        .route("/get_user_by_id/{id}", get(user::get_user_by_id))
        .route_layer(from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/signup", post(user::signup))
        .route("/login", post(user::login))
        .merge(authenticated)
        .merge(admin)
}

pub fn vendor_routes(state: &AppState) -> Router<AppState> {
    let own = Router::new()
        .route("/profile", get(vendor::get_profile).delete(vendor::delete_profile))
        .route("/update_profile", post(vendor::update_profile))
        .route("/vendor_orders", get(vendor::vendor_orders))
        .route_layer(from_fn_with_state(state.clone(), require_vendor));

    let shared = Router::new()
        .route("/vendor_products", get(vendor::vendor_products))
        .route_layer(from_fn_with_state(state.clone(), require_vendor_or_admin));

    let admin = Router::new()
        .route("/get_admin", get(vendor::get_admin))
        .route("/get_vendor_list", get(vendor::get_vendor_list))
        .route("/vendor_detail/{id}", get(vendor::vendor_detail))
        .route("/{id}/status", put(vendor::update_vendor_status))
        .route_layer(from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/signup", post(vendor::signup))
        .route("/resend_otp", post(vendor::resend_otp))
        .route("/verify_otp", post(vendor::verify_otp))
        .route("/admin_register", post(vendor::admin_register))
        .route("/login", post(vendor::login))
        .merge(own)
        .merge(shared)
        .merge(admin)
}

pub fn menu_routes(state: &AppState) -> Router<AppState> {
    let admin = Router::new()
        .route("/add_section", post(menu::add_section))
        .route("/add_category", post(menu::add_category))
        .route("/add_subcategory", post(menu::add_subcategory))
        .route("/update_section", post(menu::update_section))
        .route("/update_categories", post(menu::update_categories))
        .route("/update_subcategories", post(menu::update_subcategories))
        .route("/update_menus", post(menu::update_menus))
        .route_layer(from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/get_menus", get(menu::get_menus))
        .route("/get_menu_by_id/{id}", get(menu::get_menu_by_id))
        .route("/get_subcategories_by_id/{id}", get(menu::get_subcategories_by_id))
        .merge(admin)
}

pub fn product_routes(state: &AppState) -> Router<AppState> {
    let catalog = Router::new()
        .route("/add_product", post(product::add_product))
        .route("/edit_product", put(product::edit_product))
        .route("/change_status/{id}", post(product::change_status))
        .route("/change_stock_status/{id}", post(product::change_stock_status))
        .route("/check_duplicate_product", post(product::check_duplicate_product))
        .route("/import_product", post(product::import_product))
        .route("/upload_image", post(product::upload_image))
        .route("/save_images", post(product::save_images))
        .route_layer(from_fn_with_state(state.clone(), require_vendor_or_admin));

    let history = Router::new()
        .route("/save_recently_viewed", post(recently_viewed::save_recently_viewed))
        .route("/get_recently_viewed", get(recently_viewed::get_recently_viewed))
        .route_layer(from_fn_with_state(state.clone(), require_user));

    Router::new()
        .route("/get_products", get(product::get_products))
        .route("/get_products_by_id/{id}", get(product::get_products_by_id))
        .route("/get_products_by_query", get(product::get_products_by_query))
        .route("/get_filters", get(product::get_filters))
        .route("/by-mainmenu/{id}", get(product::get_products_by_main_menu))
        .route("/by-category/{id}", get(product::get_products_by_category))
        .route("/best-sellers", get(product::get_best_sellers))
        .route("/daily-offers", get(product::get_daily_offers))
        .route("/discounted", get(product::get_discounted_products))
        .merge(catalog)
        .merge(history)
}

pub fn cart_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/add_to_cart", post(cart::add_to_cart))
        .route("/update_cart", post(cart::update_cart))
        .route("/remove_item_from_cart/{product_id}", delete(cart::remove_item_from_cart))
        .route("/get_user_cart", get(cart::get_user_cart))
        .route_layer(from_fn_with_state(state.clone(), require_user))
}

pub fn order_routes(state: &AppState) -> Router<AppState> {
    let customer = Router::new()
        .route("/create_order", post(order::create_order))
        .route("/buy_now", post(order::buy_now))
        .route("/buy_now/{session_id}", get(order::get_buy_now))
        .route("/user_orders", get(order::get_user_orders))
        .route_layer(from_fn_with_state(state.clone(), require_user));

    let shared = Router::new()
        .route("/get_order_by_id/{id}", get(order::get_order_by_id))
        .route_layer(from_fn_with_state(state.clone(), require_user_or_admin));

    let admin = Router::new()
        .route("/get_total_orders", get(order::get_total_orders))
        .route("/query", get(order::query_orders))
        .route("/update_order/{id}", post(order::update_order))
        .route("/total_revenue", get(analytics::get_total_revenue))
        .route("/get_monthly_orders", get(analytics::get_monthly_orders))
        .route("/get_daily_orders", get(analytics::get_daily_orders))
        .route("/get_yearly_orders", get(analytics::get_yearly_orders))
        .route("/get_order_by_category", get(analytics::get_order_by_category))
        .route("/top_selling_products", get(analytics::get_top_selling_products))
        .route("/top_selling_by_subcategory", get(analytics::get_top_selling_by_subcategory))
        .route_layer(from_fn_with_state(state.clone(), require_admin));

    Router::new().merge(customer).merge(shared).merge(admin)
}

pub fn offer_routes(state: &AppState) -> Router<AppState> {
    let admin = Router::new()
        .route("/add_offers", post(offer::add_offers))
        .route("/import_offer/{type}", post(offer::import_offer))
        .route("/update_offers/{type}", post(offer::update_offers))
        .route("/delete_dynamic_offer/{type}", post(offer::delete_dynamic_offer))
        .route(
            "/delete_product_from_offer/{type}/{product_id}",
            post(offer::delete_product_from_offer),
        )
        .route("/{id}", post(offer::update_offer_status).delete(offer::delete_offer))
        .route("/add_banner", post(banner::add_banner))
        .route("/edit_banner", post(banner::edit_banner))
        .route("/banner/{id}", delete(banner::delete_banner))
        .route_layer(from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/get_all_offers", get(offer::get_all_offers))
        .route("/get_offers/{type}", get(offer::get_offers))
        .route("/get_dynamic_offers", get(offer::get_dynamic_offers))
        .route("/active/{type}", get(offer::get_active_offer))
        .route("/get_banners", get(banner::get_banners))
        .merge(admin)
}

pub fn wishlist_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", delete(wishlist::clear_wishlist))
        .route("/get_user_wishlist", get(wishlist::get_user_wishlist))
        .route("/add_to_wishlist/{id}", post(wishlist::add_to_wishlist))
        .route("/remove_from_wishlist/{id}", post(wishlist::remove_from_wishlist))
        .route("/check/{id}", get(wishlist::check_wishlist))
        .route_layer(from_fn_with_state(state.clone(), require_user))
}

pub fn feedback_routes(state: &AppState) -> Router<AppState> {
    let author = Router::new()
        .route("/add_feedback", post(feedback::add_feedback))
        .route_layer(from_fn_with_state(state.clone(), require_user));

    let reader = Router::new()
        .route("/get_feedback_by_user/{id}", get(feedback::get_feedback_by_user))
        .route_layer(from_fn_with_state(state.clone(), require_user_or_admin));

    Router::new()
        .route("/get_feedback_by_product/{id}", get(feedback::get_feedback_by_product))
        .merge(author)
        .merge(reader)
}

/// Every resource under the configured base path, with request logging.
/// Rate limiting and CORS are added by the binary.
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/ping", get(ping))
        .nest("/user", user_routes(&state))
        .nest("/vendor", vendor_routes(&state))
        .nest("/menus", menu_routes(&state))
        .nest("/products", product_routes(&state))
        .nest("/cart", cart_routes(&state))
        .nest("/order", order_routes(&state))
        .nest("/offer", offer_routes(&state))
        .nest("/wishlist", wishlist_routes(&state))
        .nest("/feedback", feedback_routes(&state));

    let base = state.config.api_base_uri.trim_end_matches('/');
    let router = if base.is_empty() {
        api
    } else {
        Router::new().nest(base, api)
    };

    router.layer(from_fn(log_errors)).with_state(state)
}
