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
    routes::product::model::Product,
    utils::{success_to_api_response, success_with_message},
};

use super::model::{Feedback, FeedbackEntry, FeedbackRequest};

#[axum::debug_handler]
pub async fn add_feedback(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Json(req): Json<FeedbackRequest>,
) -> ApiResult<Feedback> {
    req.validate()?;
    if Product::find(&state.pool, req.product_id).await?.is_none() {
        return Err(AppError::not_found("Product"));
    }

    let feedback = Feedback::create(&state.pool, identity.id(), &req).await?;
    Ok((StatusCode::CREATED, success_with_message("Feedback added successfully", feedback)))
}

#[axum::debug_handler]
pub async fn get_feedback_by_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> ApiResult<Vec<FeedbackEntry>> {
    let entries = Feedback::by_product(&state.pool, product_id).await?;
    Ok((StatusCode::OK, success_to_api_response(entries)))
}

#[axum::debug_handler]
pub async fn get_feedback_by_user(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Vec<FeedbackEntry>> {
    if !identity.is_admin() && identity.id() != user_id {
        return Err(AppError::Forbidden("Access denied".into()));
    }
    let entries = Feedback::by_user(&state.pool, user_id).await?;
    Ok((StatusCode::OK, success_to_api_response(entries)))
}
