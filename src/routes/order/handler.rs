use std::collections::HashMap;

use axum::{
    extract::{Extension, Json, Path, Query, State},
    http::StatusCode,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    AppState,
    cache::{BuyNowCacheOperations, BuyNowSession},
    common::{Pagination, resolve_page},
    error::{ApiResult, AppError},
    middleware::Identity,
    routes::cart::model::{Cart, totals},
    routes::product::model::Product,
    routes::user::model::User,
    utils::{success_to_api_response, success_with_message},
};

use super::model::{
    BuyNowRequest, CreateOrderRequest, Order, OrderItem, OrderQuery, OrderTotals,
    UpdateOrderRequest,
};

#[axum::debug_handler]
pub async fn create_order(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<CreateOrderRequest>,
) -> ApiResult<Order> {
    let user_id = identity.id();

    // every check happens before the first write
    let cart = Cart::find(&state.pool, user_id)
        .await?
        .filter(|c| !c.items.is_empty())
        .ok_or_else(|| AppError::BadRequest("Cart is empty".into()))?;

    let user = User::find_by_id(&state.pool, user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;
    let address = user
        .address(req.address_id)
        .cloned()
        .ok_or_else(|| AppError::BadRequest("Address not found".into()))?;

    let ids: Vec<Uuid> = cart.items.iter().map(|i| i.product_id).collect();
    let products: HashMap<Uuid, Product> = Product::by_ids(&state.pool, &ids)
        .await?
        .into_iter()
        .map(|p| (p.id, p))
        .collect();

    let mut lines = Vec::with_capacity(cart.items.len());
    for item in &cart.items {
        let product = products.get(&item.product_id).ok_or_else(|| {
            AppError::BadRequest(format!("Product {} is no longer available", item.product_id))
        })?;
        lines.push(OrderItem {
            product_id: item.product_id,
            name: product.name.clone(),
            quantity: item.quantity,
            price: item.price_at_add_time,
            image: product.images.first().cloned(),
        });
    }
    let order_totals = OrderTotals::compute(totals(&cart.items).total_price);

    let mut tx = state.pool.begin().await?;
    let order = Order::create(&mut *tx, user_id, &lines, &address, order_totals).await?;
    if Cart::swap(&mut *tx, user_id, cart.version, &[]).await?.is_none() {
        tx.rollback().await?;
        return Err(AppError::Conflict("Cart changed during checkout, please retry".into()));
    }
    tx.commit().await?;

    let sold: Vec<(Uuid, i64)> = lines
        .iter()
        .map(|l| (l.product_id, i64::from(l.quantity)))
        .collect();
    if let Err(e) = Product::increment_sales(&state.pool, &sold).await {
        tracing::warn!(order_id = %order.id, error = %e, "failed to update sales counts");
    }

    tracing::info!(order_id = %order.id, %user_id, total = %order.total_price, "order created");
    Ok((StatusCode::CREATED, success_with_message("Order created successfully", order)))
}

#[derive(Debug, Serialize)]
pub struct BuyNowCreated {
    pub session_id: String,
}

#[axum::debug_handler]
pub async fn buy_now(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<BuyNowRequest>,
) -> ApiResult<BuyNowCreated> {
    if req.quantity < 1 {
        return Err(AppError::Validation("quantity must be at least 1".into()));
    }
    let product = Product::find(&state.pool, req.product_id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(|| AppError::not_found("Product"))?;

    let session = BuyNowSession::new(identity.id(), product.id, req.quantity, product.selling_price);
    BuyNowCacheOperations::save(&state.redis, &session).await?;

    Ok((
        StatusCode::CREATED,
        success_with_message(
            "Buy now session created",
            BuyNowCreated {
                session_id: session.session_id,
            },
        ),
    ))
}

#[axum::debug_handler]
pub async fn get_buy_now(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(session_id): Path<String>,
) -> ApiResult<BuyNowSession> {
    let session = BuyNowCacheOperations::get(&state.redis, &session_id)
        .await?
        // other users' sessions look expired
        .filter(|s| s.user_id == identity.id())
        .ok_or_else(|| AppError::NotFound("Buy now session expired or not found".into()))?;
    Ok((StatusCode::OK, success_to_api_response(session)))
}

#[axum::debug_handler]
pub async fn get_user_orders(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Vec<Order>> {
    let orders = Order::for_user(&state.pool, identity.id()).await?;
    Ok((StatusCode::OK, success_to_api_response(orders)))
}

#[axum::debug_handler]
pub async fn get_order_by_id(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<Uuid>,
) -> ApiResult<Order> {
    let order = Order::find(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("Order"))?;
    if !identity.is_admin() && order.user_id != identity.id() {
        return Err(AppError::Forbidden("Access denied".into()));
    }
    Ok((StatusCode::OK, success_to_api_response(order)))
}

#[axum::debug_handler]
pub async fn get_total_orders(State(state): State<AppState>) -> ApiResult<Vec<Order>> {
    let orders = Order::list(&state.pool).await?;
    Ok((StatusCode::OK, success_to_api_response(orders)))
}

#[derive(Debug, Serialize)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub pagination: Pagination,
}

#[axum::debug_handler]
pub async fn query_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderQuery>,
) -> ApiResult<OrderPage> {
    let (page, limit) = resolve_page(query.page, query.limit, 10);
    let offset = Pagination::new(page, limit, 0).offset();
    let (orders, total) = Order::query(&state.pool, &query, limit, offset).await?;
    Ok((
        StatusCode::OK,
        success_to_api_response(OrderPage {
            orders,
            pagination: Pagination::new(page, limit, total),
        }),
    ))
}

#[axum::debug_handler]
pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateOrderRequest>,
) -> ApiResult<Order> {
    let order = match req.status {
        Some(status) => Order::push_status(&state.pool, id, status).await?,
        None => Order::find(&state.pool, id).await?,
    }
    .ok_or_else(|| AppError::not_found("Order"))?;

    tracing::info!(order_id = %id, status = ?order.current_status(), "order updated");
    Ok((StatusCode::OK, success_with_message("Order updated successfully", order)))
}
