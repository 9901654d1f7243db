use std::collections::HashMap;

use axum::{
    extract::{Extension, Json, Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    AppState,
    common::{PageQuery, Pagination},
    error::{ApiResult, AppError},
    middleware::Identity,
    routes::product::model::{Product, ProductView},
    utils::{success_to_api_response, success_with_message},
};

use super::model::{
    AddOfferRequest, NamedOfferProduct, Offer, OfferProduct, OfferProductView, OfferStatusRequest,
    OfferView, active_windows, distinct_ids, merge_products, remove_product, set_window,
};

/// Join windows with current product documents in one query.
async fn attach_products(state: &AppState, windows: Vec<OfferProduct>) -> Result<Vec<OfferProductView>, AppError> {
    let ids: Vec<Uuid> = windows.iter().map(|w| w.product_id).collect();
    let mut products: HashMap<Uuid, ProductView> = Product::by_ids(&state.pool, &ids)
        .await?
        .into_iter()
        .map(|p| (p.id, ProductView::from(p)))
        .collect();
    Ok(windows
        .into_iter()
        .map(|window| OfferProductView {
            product: products.remove(&window.product_id),
            window,
        })
        .collect())
}

async fn offer_view(state: &AppState, offer: Offer, windows: Vec<OfferProduct>) -> Result<OfferView, AppError> {
    let total_products = offer.products.len();
    Ok(OfferView {
        id: offer.id,
        offer_type: offer.offer_type,
        description: offer.description,
        is_active: offer.is_active,
        total_products,
        products: attach_products(state, windows).await?,
    })
}

async fn ensure_products_exist(state: &AppState, windows: &[OfferProduct]) -> Result<(), AppError> {
    let ids = distinct_ids(windows);
    let found = Product::count_existing(&state.pool, &ids).await?;
    if found != ids.len() as i64 {
        return Err(AppError::BadRequest("One or more products do not exist".into()));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct OfferChange {
    pub offer: Offer,
    pub added: usize,
}

#[axum::debug_handler]
pub async fn add_offers(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<AddOfferRequest>,
) -> ApiResult<OfferChange> {
    if req.offer_type.trim().is_empty() {
        return Err(AppError::Validation("type is required".into()));
    }
    if req.products.is_empty() {
        return Err(AppError::Validation("at least one product is required".into()));
    }
    for window in &req.products {
        window.check()?;
    }
    ensure_products_exist(&state, &req.products).await?;

    let mut added = 0;
    let offer = Offer::modify_products(
        &state.pool,
        &req.offer_type,
        Some(identity.id()),
        true,
        req.description.as_deref(),
        |products| {
            added = merge_products(products, &req.products);
            Ok(())
        },
    )
    .await?;

    tracing::info!(offer_type = %offer.offer_type, added, "offer products added");
    Ok((StatusCode::OK, success_with_message("Offer saved successfully", OfferChange { offer, added })))
}

#[axum::debug_handler]
pub async fn import_offer(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(offer_type): Path<String>,
    Json(rows): Json<Vec<NamedOfferProduct>>,
) -> ApiResult<OfferChange> {
    if rows.is_empty() {
        return Err(AppError::Validation("at least one product is required".into()));
    }

    let names: Vec<String> = rows.iter().map(|r| r.name.clone()).collect();
    let ids: HashMap<String, Uuid> = Product::ids_by_names(&state.pool, &names)
        .await?
        .into_iter()
        .map(|(id, name)| (name, id))
        .collect();

    let mut windows = Vec::with_capacity(rows.len());
    let mut unknown = Vec::new();
    for row in rows {
        match ids.get(&row.name.trim().to_lowercase()) {
            Some(id) => windows.push(OfferProduct {
                product_id: *id,
                start_date: row.start_date,
                end_date: row.end_date,
            }),
            None => unknown.push(row.name),
        }
    }
    if !unknown.is_empty() {
        return Err(AppError::BadRequest(format!("Products not found: {}", unknown.join(", "))));
    }
    for window in &windows {
        window.check()?;
    }

    let mut added = 0;
    let offer = Offer::modify_products(&state.pool, &offer_type, Some(identity.id()), true, None, |products| {
        added = merge_products(products, &windows);
        Ok(())
    })
    .await?;

    Ok((StatusCode::OK, success_with_message("Offer imported successfully", OfferChange { offer, added })))
}

#[axum::debug_handler]
pub async fn update_offers(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(offer_type): Path<String>,
    Json(window): Json<OfferProduct>,
) -> ApiResult<Offer> {
    window.check()?;
    ensure_products_exist(&state, std::slice::from_ref(&window)).await?;

    let offer = Offer::modify_products(&state.pool, &offer_type, Some(identity.id()), false, None, |products| {
        set_window(products, window.clone());
        Ok(())
    })
    .await?;

    Ok((StatusCode::OK, success_with_message("Offer updated successfully", offer)))
}

#[axum::debug_handler]
pub async fn get_all_offers(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Vec<OfferView>> {
    let (_, limit) = query.resolve(10);
    let offers = Offer::list_active(&state.pool).await?;

    let mut result = Vec::with_capacity(offers.len());
    for offer in offers {
        let windows = offer.products.iter().take(limit as usize).cloned().collect();
        result.push(offer_view(&state, offer, windows).await?);
    }
    Ok((StatusCode::OK, success_to_api_response(result)))
}

#[derive(Debug, Serialize)]
pub struct OfferPage {
    #[serde(flatten)]
    pub offer: OfferView,
    pub pagination: Pagination,
}

#[axum::debug_handler]
pub async fn get_offers(
    State(state): State<AppState>,
    Path(offer_type): Path<String>,
    Query(query): Query<PageQuery>,
) -> ApiResult<OfferPage> {
    let (page, limit) = query.resolve(10);
    let offer = Offer::find_by_type(&state.pool, &offer_type)
        .await?
        .ok_or_else(|| AppError::not_found("Offer"))?;

    let pagination = Pagination::new(page, limit, offer.products.len() as i64);
    let windows = offer
        .products
        .iter()
        .skip(pagination.offset() as usize)
        .take(limit as usize)
        .cloned()
        .collect();
    let offer = offer_view(&state, offer, windows).await?;

    Ok((StatusCode::OK, success_to_api_response(OfferPage { offer, pagination })))
}

#[axum::debug_handler]
pub async fn get_dynamic_offers(State(state): State<AppState>) -> ApiResult<Vec<Offer>> {
    let offers = Offer::list_dynamic(&state.pool).await?;
    Ok((StatusCode::OK, success_to_api_response(offers)))
}

#[axum::debug_handler]
pub async fn get_active_offer(
    State(state): State<AppState>,
    Path(offer_type): Path<String>,
) -> ApiResult<OfferView> {
    let offer = Offer::find_by_type(&state.pool, &offer_type)
        .await?
        .filter(|o| o.is_active)
        .ok_or_else(|| AppError::not_found("Offer"))?;

    let windows = active_windows(&offer.products, Utc::now());
    let view = offer_view(&state, offer, windows).await?;
    Ok((StatusCode::OK, success_to_api_response(view)))
}

#[axum::debug_handler]
pub async fn update_offer_status(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
    Json(req): Json<OfferStatusRequest>,
) -> ApiResult<Offer> {
    let offer = Offer::set_active(&state.pool, id, req.is_active, identity.id())
        .await?
        .ok_or_else(|| AppError::not_found("Offer"))?;
    Ok((StatusCode::OK, success_with_message("Offer updated successfully", offer)))
}

#[axum::debug_handler]
pub async fn delete_offer(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<Offer> {
    if Offer::find(&state.pool, id).await?.is_none() {
        return Err(AppError::not_found("Offer"));
    }
    let offer = Offer::set_active(&state.pool, id, false, identity.id())
        .await?
        .ok_or_else(|| AppError::not_found("Offer"))?;
    Ok((StatusCode::OK, success_with_message("Offer deleted successfully", offer)))
}

#[axum::debug_handler]
pub async fn delete_dynamic_offer(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(offer_type): Path<String>,
) -> ApiResult<Offer> {
    let offer = Offer::toggle_by_type(&state.pool, &offer_type, identity.id())
        .await?
        .ok_or_else(|| AppError::not_found("Offer"))?;
    let message = if offer.is_active { "Offer activated" } else { "Offer deactivated" };
    Ok((StatusCode::OK, success_with_message(message, offer)))
}

#[axum::debug_handler]
pub async fn delete_product_from_offer(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path((offer_type, product_id)): Path<(String, Uuid)>,
) -> ApiResult<Offer> {
    let offer = Offer::modify_products(&state.pool, &offer_type, Some(identity.id()), false, None, |products| {
        if remove_product(products, product_id) {
            Ok(())
        } else {
            Err(AppError::NotFound("Product not found in offer".into()))
        }
    })
    .await?;
    Ok((StatusCode::OK, success_with_message("Product removed from offer", offer)))
}
