use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    AppState,
    error::{ApiResult, AppError},
    routes::product::model::Product,
    utils::{multipart::FormData, success_to_api_response, success_with_message},
};

use super::model::{Banner, BannerChanges};

const BANNER_FOLDER: &str = "banners";

fn optional_id(form: &FormData, field: &str) -> Result<Option<Uuid>, AppError> {
    form.text(field)
        .map(|v| {
            Uuid::parse_str(v).map_err(|_| AppError::Validation(format!("{field} must be a valid id")))
        })
        .transpose()
}

async fn upload_banner_image(state: &AppState, form: &FormData) -> Result<Option<String>, AppError> {
    match form.files_named("image").next() {
        Some(file) => Ok(Some(
            state
                .storage
                .upload(file.bytes.clone(), &file.content_type, BANNER_FOLDER)
                .await?,
        )),
        None => Ok(None),
    }
}

async fn ensure_product(state: &AppState, product_id: Option<Uuid>) -> Result<(), AppError> {
    if let Some(id) = product_id {
        if Product::find(&state.pool, id).await?.is_none() {
            return Err(AppError::not_found("Product"));
        }
    }
    Ok(())
}

#[axum::debug_handler]
pub async fn add_banner(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Banner> {
    let form = FormData::read(multipart).await?;
    let offer_name = form.text("offer_name");
    let product_id = optional_id(&form, "product_id")?;
    if offer_name.is_none() && product_id.is_none() {
        return Err(AppError::Validation("offer_name or product_id is required".into()));
    }
    ensure_product(&state, product_id).await?;

    let image = upload_banner_image(&state, &form).await?;
    let banner = Banner::create(&state.pool, image, offer_name, product_id).await?;
    Ok((StatusCode::CREATED, success_with_message("Banner added successfully", banner)))
}

#[axum::debug_handler]
pub async fn get_banners(State(state): State<AppState>) -> ApiResult<Vec<Banner>> {
    let banners = Banner::list_active(&state.pool).await?;
    Ok((StatusCode::OK, success_to_api_response(banners)))
}

#[axum::debug_handler]
pub async fn edit_banner(State(state): State<AppState>, multipart: Multipart) -> ApiResult<Banner> {
    let form = FormData::read(multipart).await?;
    let id = optional_id(&form, "id")?.ok_or_else(|| AppError::Validation("id is required".into()))?;
    let current = Banner::find(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("Banner"))?;

    let product_id = optional_id(&form, "product_id")?;
    ensure_product(&state, product_id).await?;
    let is_active = form
        .text("is_active")
        .map(|v| {
            v.parse::<bool>()
                .map_err(|_| AppError::Validation("is_active must be true or false".into()))
        })
        .transpose()?;

    let image = upload_banner_image(&state, &form).await?;
    let replaced = image.is_some();
    let banner = Banner::update(
        &state.pool,
        id,
        BannerChanges {
            image,
            offer_name: form.text("offer_name").map(str::to_string),
            product_id,
            is_active,
        },
    )
    .await?
    .ok_or_else(|| AppError::not_found("Banner"))?;

    if let (true, Some(old)) = (replaced, current.image.as_deref()) {
        if let Err(e) = state.storage.delete(old).await {
            tracing::warn!(url = old, error = %e, "failed to delete replaced banner image");
        }
    }

    Ok((StatusCode::OK, success_with_message("Banner updated successfully", banner)))
}

#[axum::debug_handler]
pub async fn delete_banner(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<()> {
    let banner = Banner::find(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::not_found("Banner"))?;

    if let Some(url) = banner.image.as_deref() {
        state.storage.delete(url).await?;
    }
    Banner::delete(&state.pool, id).await?;

    tracing::info!(banner_id = %id, "banner deleted");
    Ok((StatusCode::OK, success_with_message("Banner deleted successfully", ())))
}
