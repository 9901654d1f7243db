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
    utils::{
        Role, generate_token, hash_password, success_to_api_response, success_with_message,
        verify_password,
    },
};

use super::model::{
    AuthResponse, ChangePasswordRequest, LoginRequest, SignupRequest, UpdateAddressRequest,
    UpdatePasswordRequest, UpdateUserRequest, User, add_address, merge_address, remove_address,
};

async fn current_user(state: &AppState, identity: &Identity) -> Result<User, AppError> {
    User::find_by_id(&state.pool, identity.id())
        .await?
        .ok_or_else(|| AppError::not_found("User"))
}

#[axum::debug_handler]
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<AuthResponse> {
    req.validate()?;

    if User::find_by_email(&state.pool, &req.email).await?.is_some() {
        return Err(AppError::Conflict("User already exists".into()));
    }

    let password_hash = hash_password(&req.password)?;
    let user = User::create(&state.pool, &req, password_hash).await?;
    let (token, expires_at) = generate_token(user.id, Role::User, &state.config)?;

    tracing::info!(user_id = %user.id, "user registered");
    Ok((
        StatusCode::CREATED,
        success_with_message(
            "User created successfully",
            AuthResponse {
                user,
                token,
                expires_at,
            },
        ),
    ))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<AuthResponse> {
    req.validate()?;

    let user = User::find_by_email(&state.pool, &req.email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    if !verify_password(&req.password, &user.password_hash)? {
        return Err(AppError::BadRequest("Invalid password".into()));
    }

    let (token, expires_at) = generate_token(user.id, Role::User, &state.config)?;
    Ok((
        StatusCode::OK,
        success_with_message(
            "Login successful",
            AuthResponse {
                user,
                token,
                expires_at,
            },
        ),
    ))
}

/// Password reset for a signed-in user; the account must match the token.
#[axum::debug_handler]
pub async fn change_password(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<()> {
    req.validate()?;

    let user = User::find_by_email(&state.pool, &req.email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    if user.id != identity.id() {
        return Err(AppError::Forbidden("Cannot change another account's password".into()));
    }
    if !verify_password(&req.current_password, &user.password_hash)? {
        return Err(AppError::BadRequest("Invalid password".into()));
    }

    User::update_password(&state.pool, user.id, hash_password(&req.new_password)?).await?;
    tracing::info!(user_id = %user.id, "password changed");
    Ok((StatusCode::OK, success_with_message("Password changed successfully", ())))
}

#[axum::debug_handler]
pub async fn get_user(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
) -> ApiResult<User> {
    let user = current_user(&state, &identity).await?;
    Ok((StatusCode::OK, success_to_api_response(user)))
}

#[axum::debug_handler]
pub async fn update_user(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Json(req): Json<UpdateUserRequest>,
) -> ApiResult<User> {
    req.validate()?;

    let user = User::edit_addresses(&state.pool, identity.id(), Some(&req), |addresses| {
        match req.address.clone() {
            Some(address) => add_address(addresses, address),
            None => Ok(()),
        }
    })
    .await?;
    Ok((StatusCode::OK, success_with_message("User updated successfully", user)))
}

#[axum::debug_handler]
pub async fn update_user_password(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Json(req): Json<UpdatePasswordRequest>,
) -> ApiResult<()> {
    req.validate()?;

    let user = current_user(&state, &identity).await?;
    if !verify_password(&req.current_password, &user.password_hash)? {
        return Err(AppError::BadRequest("Invalid password".into()));
    }

    User::update_password(&state.pool, user.id, hash_password(&req.password)?).await?;
    Ok((StatusCode::OK, success_with_message("Password updated successfully", ())))
}

#[axum::debug_handler]
pub async fn update_user_address(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Json(req): Json<UpdateAddressRequest>,
) -> ApiResult<User> {
    req.validate()?;

    let address = req.address;
    let user = User::edit_addresses(&state.pool, identity.id(), None, |addresses| {
        merge_address(addresses, address)
    })
    .await?;
    Ok((StatusCode::OK, success_with_message("Address updated successfully", user)))
}

#[axum::debug_handler]
pub async fn delete_address(
    Extension(identity): Extension<Identity>,
    State(state): State<AppState>,
    Path(address_id): Path<Uuid>,
) -> ApiResult<User> {
    let user = User::edit_addresses(&state.pool, identity.id(), None, |addresses| {
        remove_address(addresses, address_id)
    })
    .await?;
    Ok((StatusCode::OK, success_with_message("Address removed", user)))
}

#[axum::debug_handler]
pub async fn get_users(State(state): State<AppState>) -> ApiResult<Vec<User>> {
    let users = User::list(&state.pool).await?;
    Ok((StatusCode::OK, success_to_api_response(users)))
}

#[axum::debug_handler]
pub async fn get_user_by_id(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<User> {
    let user = User::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    Ok((StatusCode::OK, success_to_api_response(user)))
}
