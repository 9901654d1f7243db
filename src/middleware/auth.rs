use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use uuid::Uuid;

use crate::{
    AppState,
    error::AppError,
    utils::{Claims, Role, verify_token},
};

/// Caller resolved from the bearer token, attached to every protected request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    User(Uuid),
    Vendor(Uuid),
    Admin(Uuid),
}

impl Identity {
    pub fn id(&self) -> Uuid {
        match self {
            Identity::User(id) | Identity::Vendor(id) | Identity::Admin(id) => *id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Identity::User(_) => Role::User,
            Identity::Vendor(_) => Role::Vendor,
            Identity::Admin(_) => Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Identity::Admin(_))
    }
}

impl TryFrom<Claims> for Identity {
    type Error = AppError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&claims.sub)
            .map_err(|_| AppError::Unauthorized("Invalid token subject".into()))?;
        Ok(match claims.role {
            Role::User => Identity::User(id),
            Role::Vendor => Identity::Vendor(id),
            Role::Admin => Identity::Admin(id),
        })
    }
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Identity, AppError> {
    let Authorization(bearer) = headers
        .typed_get::<Authorization<Bearer>>()
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".into()))?;

    let claims = verify_token(bearer.token(), &state.config).map_err(|e| {
        tracing::debug!(error = %e, "token rejected");
        AppError::Unauthorized("Invalid or expired token".into())
    })?;

    Identity::try_from(claims)
}

async fn authorize(
    state: &AppState,
    mut req: Request,
    next: Next,
    allowed: &[Role],
) -> Result<Response, AppError> {
    let identity = authenticate(state, req.headers())?;
    if !allowed.contains(&identity.role()) {
        return Err(AppError::Forbidden("Access denied".into()));
    }
    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

pub async fn require_user(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    authorize(&state, req, next, &[Role::User]).await
}

pub async fn require_vendor(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    authorize(&state, req, next, &[Role::Vendor]).await
}

pub async fn require_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    authorize(&state, req, next, &[Role::Admin]).await
}

pub async fn require_vendor_or_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    authorize(&state, req, next, &[Role::Vendor, Role::Admin]).await
}

/// Users and admins, e.g. reading an order.
pub async fn require_user_or_admin(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    authorize(&state, req, next, &[Role::User, Role::Admin]).await
}
