use std::collections::HashMap;

use axum::{
    extract::{Extension, Json, Path, State},
    http::StatusCode,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    AppState,
    error::{ApiResult, AppError},
    middleware::Identity,
    routes::product::model::{Product, ProductView},
    utils::{success_to_api_response, success_with_message},
};

use super::model::{
    AddToCartRequest, Cart, CartLine, CartView, UpdateCartRequest, add_item, apply_delta,
    remove_item,
};

async fn cart_view(state: &AppState, user_id: Uuid, cart: Option<Cart>) -> Result<CartView, AppError> {
    let Some(cart) = cart else {
        return Ok(CartView {
            user_id,
            items: Vec::new(),
            total_items: 0,
            total_price: Default::default(),
        });
    };

    let ids: Vec<Uuid> = cart.items.iter().map(|i| i.product_id).collect();
    let mut products: HashMap<Uuid, ProductView> = Product::by_ids(&state.pool, &ids)
        .await?
        .into_iter()
        .map(|p| (p.id, ProductView::from(p)))
        .collect();

    Ok(CartView {
        user_id,
        items: cart
            .items
            .into_iter()
            .map(|item| CartLine {
                product: products.remove(&item.product_id),
                item,
            })
            .collect(),
        total_items: cart.total_items,
        total_price: cart.total_price,
    })
}

#[axum::debug_handler]
pub async fn add_to_cart(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<AddToCartRequest>,
) -> ApiResult<Cart> {
    req.validate()?;
    let product = Product::find(&state.pool, req.product_id)
        .await?
        .ok_or_else(|| AppError::not_found("Product"))?;
    if !product.is_active {
        return Err(AppError::BadRequest("Product is not available".into()));
    }

    let cart = Cart::modify(&state.pool, identity.id(), true, |items| {
        add_item(items, product.id, req.quantity, product.selling_price);
        Ok(())
    })
    .await?;

    Ok((StatusCode::OK, success_with_message("Product added to cart", cart)))
}

#[axum::debug_handler]
pub async fn update_cart(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<UpdateCartRequest>,
) -> ApiResult<Cart> {
    req.validate()?;
    let cart = Cart::modify(&state.pool, identity.id(), false, |items| {
        apply_delta(items, req.product_id, req.quantity)
    })
    .await?;
    Ok((StatusCode::OK, success_with_message("Cart updated", cart)))
}

#[axum::debug_handler]
pub async fn remove_item_from_cart(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(product_id): Path<Uuid>,
) -> ApiResult<Cart> {
    let cart = Cart::modify(&state.pool, identity.id(), false, |items| remove_item(items, product_id)).await?;
    Ok((StatusCode::OK, success_with_message("Item removed from cart", cart)))
}

#[axum::debug_handler]
pub async fn get_user_cart(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<CartView> {
    let cart = Cart::find(&state.pool, identity.id()).await?;
    let view = cart_view(&state, identity.id(), cart).await?;
    Ok((StatusCode::OK, success_to_api_response(view)))
}
