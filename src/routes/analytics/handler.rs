use axum::{
    extract::{Query, State},
    http::StatusCode,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{
    AppState,
    error::ApiResult,
    utils::{success_to_api_response, success_with_message},
};

use super::model::{
    self, CategoryShare, MonthSummary, PeriodCount, SubcategoryTop, TopProduct, category_share,
};

#[derive(Debug, Deserialize)]
pub struct TopQuery {
    pub limit: Option<i64>,
}

impl TopQuery {
    fn resolve(&self, default: i64) -> i64 {
        self.limit.filter(|l| *l > 0).unwrap_or(default).min(100)
    }
}

#[axum::debug_handler]
pub async fn get_total_revenue(State(state): State<AppState>) -> ApiResult<Decimal> {
    let revenue = model::total_revenue(&state.pool).await?;
    Ok((StatusCode::OK, success_to_api_response(revenue)))
}

#[axum::debug_handler]
pub async fn get_monthly_orders(State(state): State<AppState>) -> ApiResult<Vec<PeriodCount>> {
    let rows = model::orders_by_month(&state.pool).await?;
    Ok((StatusCode::OK, success_to_api_response(rows)))
}

#[axum::debug_handler]
pub async fn get_daily_orders(State(state): State<AppState>) -> ApiResult<Vec<PeriodCount>> {
    let rows = model::orders_by_day(&state.pool).await?;
    Ok((StatusCode::OK, success_to_api_response(rows)))
}

#[axum::debug_handler]
pub async fn get_yearly_orders(State(state): State<AppState>) -> ApiResult<Vec<MonthSummary>> {
    let months = model::current_year(&state.pool).await?;
    Ok((StatusCode::OK, success_with_message("Yearly orders retrieved successfully", months)))
}

#[axum::debug_handler]
pub async fn get_order_by_category(State(state): State<AppState>) -> ApiResult<Vec<CategoryShare>> {
    let rows = model::revenue_by_subcategory(&state.pool).await?;
    Ok((
        StatusCode::OK,
        success_with_message("Sales by category retrieved successfully", category_share(rows)),
    ))
}

#[axum::debug_handler]
pub async fn get_top_selling_products(
    State(state): State<AppState>,
    Query(query): Query<TopQuery>,
) -> ApiResult<Vec<TopProduct>> {
    let products = model::top_selling(&state.pool, query.resolve(10)).await?;
    Ok((StatusCode::OK, success_to_api_response(products)))
}

#[axum::debug_handler]
pub async fn get_top_selling_by_subcategory(
    State(state): State<AppState>,
    Query(query): Query<TopQuery>,
) -> ApiResult<Vec<SubcategoryTop>> {
    let groups = model::top_selling_by_subcategory(&state.pool, query.resolve(5) as usize).await?;
    Ok((StatusCode::OK, success_to_api_response(groups)))
}
