use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use quickorder_core::{Principal, Role};
use quickorder_order::CartOwner;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::state::{AppState, AuthConfig};

// ============================================================================
// JWT Claims
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// `user:<uuid>` for accounts, `guest-<uuid>` for anonymous sessions.
    pub sub: String,
    pub email: Option<String>,
    pub role: Role,
    pub exp: usize,
}

impl Claims {
    pub fn new(sub: String, email: Option<String>, role: Role, auth: &AuthConfig) -> Self {
        Self {
            sub,
            email,
            role,
            exp: (Utc::now() + Duration::seconds(auth.expiration as i64)).timestamp() as usize,
        }
    }

    pub fn encode(&self, auth: &AuthConfig) -> Result<String, AppError> {
        encode(&Header::default(), self, &EncodingKey::from_secret(auth.secret.as_bytes()))
            .map_err(|e| AppError::InternalServerError(format!("Token encoding failed: {}", e)))
    }
}

// ============================================================================
// Session Authentication Middleware
// ============================================================================

/// Accepts any valid token (guest or account) and injects the caller's
/// `Principal` and `Claims` into the request extensions.
pub async fn session_auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (claims, principal) = authenticate(&state, bearer).await?;

    req.extensions_mut().insert(principal);
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

// ============================================================================
// Admin Authentication Middleware
// ============================================================================

pub async fn admin_auth_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (claims, principal) = authenticate(&state, bearer).await?;

    if !principal.is_admin() {
        tracing::warn!(sub = %claims.sub, "Non-admin token used on admin route");
        return Err(AppError::AuthorizationError("Administrator access required".into()));
    }

    req.extensions_mut().insert(principal);
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

async fn authenticate(
    state: &AppState,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<(Claims, Principal), AppError> {
    let TypedHeader(Authorization(bearer)) =
        bearer.ok_or_else(|| AppError::AuthenticationError("Missing bearer token".into()))?;

    let token_data = decode::<Claims>(
        bearer.token(),
        &DecodingKey::from_secret(state.auth.secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| AppError::AuthenticationError(format!("Invalid token: {}", e)))?;

    let claims = token_data.claims;
    let mut principal = Principal::from_subject(&claims.sub, claims.role)?;

    // Account tokens outlive account changes; re-check the account itself.
    if let CartOwner::User(id) = principal.owner {
        let user = state
            .users
            .get_user(id)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| AppError::AuthenticationError("Account is disabled or removed".into()))?;
        principal.role = user.role();
    }

    Ok((claims, principal))
}
