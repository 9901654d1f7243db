use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    AppState,
    error::{ApiResult, AppError},
    middleware::Identity,
    routes::product::model::{Product, ProductView, views},
    utils::{success_to_api_response, success_with_message},
};

use super::model;

#[derive(Debug, Serialize)]
pub struct WishlistStatus {
    pub in_wishlist: bool,
}

#[axum::debug_handler]
pub async fn get_user_wishlist(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Vec<ProductView>> {
    let ids = model::products(&state.pool, identity.id()).await?;
    let products = Product::by_ids(&state.pool, &ids).await?;
    Ok((StatusCode::OK, success_to_api_response(views(products))))
}

#[axum::debug_handler]
pub async fn add_to_wishlist(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(product_id): Path<Uuid>,
) -> ApiResult<Vec<Uuid>> {
    if Product::find(&state.pool, product_id).await?.is_none() {
        return Err(AppError::not_found("Product"));
    }
    let products = model::add(&state.pool, identity.id(), product_id).await?;
    Ok((StatusCode::OK, success_with_message("Product added to wishlist", products)))
}

#[axum::debug_handler]
pub async fn remove_from_wishlist(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(product_id): Path<Uuid>,
) -> ApiResult<Vec<Uuid>> {
    let products = model::remove(&state.pool, identity.id(), product_id)
        .await?
        .ok_or_else(|| AppError::not_found("Wishlist"))?;
    Ok((StatusCode::OK, success_with_message("Product removed from wishlist", products)))
}

#[axum::debug_handler]
pub async fn check_wishlist(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(product_id): Path<Uuid>,
) -> ApiResult<WishlistStatus> {
    let in_wishlist = model::contains(&state.pool, identity.id(), product_id).await?;
    Ok((StatusCode::OK, success_to_api_response(WishlistStatus { in_wishlist })))
}

#[axum::debug_handler]
pub async fn clear_wishlist(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<()> {
    model::clear(&state.pool, identity.id()).await?;
    Ok((StatusCode::OK, success_with_message("Wishlist cleared", ())))
}
