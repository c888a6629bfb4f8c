use axum::{
    extract::State,
    routing::get,
    Extension, Json, Router,
};
use quickorder_core::{Principal, User};
use serde::Deserialize;

use crate::{error::AppError, state::AppState};

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub password: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/me", get(get_profile).put(update_profile))
}

async fn current_user(state: &AppState, principal: &Principal) -> Result<User, AppError> {
    let user_id = principal
        .user_id()
        .ok_or_else(|| AppError::AuthorizationError("Guest sessions have no profile".into()))?;
    state
        .users
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError("User not found".into()))
}

/// GET /v1/me
async fn get_profile(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<User>, AppError> {
    Ok(Json(current_user(&state, &principal).await?))
}

/// PUT /v1/me
async fn update_profile(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<User>, AppError> {
    let mut user = current_user(&state, &principal).await?;

    if let Some(name) = req.name {
        if name.trim().is_empty() {
            return Err(AppError::ValidationError("name is required".into()));
        }
        user.name = name.trim().to_string();
    }
    if let Some(phone) = req.phone {
        user.phone = Some(phone.trim().to_string()).filter(|p| !p.is_empty());
    }
    if let Some(address) = req.address {
        user.address = Some(address.trim().to_string()).filter(|a| !a.is_empty());
    }
    if let Some(password) = req.password.as_deref() {
        user.set_password(password)?;
    }
    user.updated_at = chrono::Utc::now();

    state.users.update_user(&user).await?;
    Ok(Json(user))
}
