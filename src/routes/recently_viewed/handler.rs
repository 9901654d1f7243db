use axum::{
    extract::{Extension, Json, State},
    http::StatusCode,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    AppState,
    error::{ApiResult, AppError},
    middleware::Identity,
    routes::product::model::{Product, ProductView, views},
    utils::{success_to_api_response, success_with_message},
};

use super::model;

#[derive(Debug, Deserialize)]
pub struct RecentlyViewedRequest {
    pub product_id: Uuid,
}

#[axum::debug_handler]
pub async fn save_recently_viewed(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(payload): Json<RecentlyViewedRequest>,
) -> ApiResult<Vec<Uuid>> {
    if Product::find(&state.pool, payload.product_id).await?.is_none() {
        return Err(AppError::not_found("Product"));
    }
    let products = model::save(&state.pool, identity.id(), payload.product_id).await?;
    Ok((StatusCode::OK, success_with_message("Recently viewed updated", products)))
}

#[axum::debug_handler]
pub async fn get_recently_viewed(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Vec<ProductView>> {
    let ids = model::load(&state.pool, identity.id()).await?;
    let products = Product::by_ids(&state.pool, &ids).await?;
    Ok((StatusCode::OK, success_to_api_response(views(products))))
}
