use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use quickorder_core::identity::{guest_subject, user_subject};
use quickorder_core::{Role, User};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{error::AppError, middleware::auth::Claims, state::AppState};

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/guest", post(login_guest))
        .route("/register", post(register))
        .route("/login", post(login))
}

fn user_token(state: &AppState, user: User) -> Result<AuthResponse, AppError> {
    let role = user.role();
    let claims = Claims::new(user_subject(user.id), Some(user.email.clone()), role, &state.auth);
    Ok(AuthResponse {
        token: claims.encode(&state.auth)?,
        role,
        user: Some(user),
    })
}

/// POST /v1/auth/guest
async fn login_guest(State(state): State<AppState>) -> Result<Json<AuthResponse>, AppError> {
    let claims = Claims::new(guest_subject(), None, Role::Guest, &state.auth);
    let token = claims.encode(&state.auth)?;

    Ok(Json(AuthResponse { token, role: Role::Guest, user: None }))
}

/// POST /v1/auth/register
async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let mut user = User::new(&req.name, &req.email, &req.password)?;
    user.phone = req.phone.filter(|p| !p.trim().is_empty());
    user.address = req.address.filter(|a| !a.trim().is_empty());

    state.users.create_user(&user).await?;
    info!(user_id = %user.id, "Registered new customer");

    Ok((StatusCode::CREATED, Json(user_token(&state, user)?)))
}

/// POST /v1/auth/login
async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = state
        .users
        .find_by_email(&req.email)
        .await?
        .filter(|u| u.check_password(&req.password))
        .ok_or_else(|| {
            warn!("Failed login attempt");
            AppError::AuthenticationError("Invalid email or password".into())
        })?;

    if !user.is_active {
        return Err(AppError::AuthenticationError("Account is disabled".into()));
    }

    info!(user_id = %user.id, role = %user.role(), "User logged in");
    Ok(Json(user_token(&state, user)?))
}
