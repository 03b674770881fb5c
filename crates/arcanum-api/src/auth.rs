use anyhow::anyhow;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use uuid::Uuid;

use arcanum_types::api::{
    AuthResponse, LoginRequest, RefreshRequest, RegisterRequest, RegisterResponse,
    UserCountResponse,
};

use crate::{AppState, error::ApiError, run_blocking};

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    // Validate input
    if !req.email.contains('@') {
        return Err(ApiError::BadRequest("invalid email address"));
    }
    if req.username.len() < 3 || req.username.len() > 32 {
        return Err(ApiError::BadRequest("username must be 3-32 characters"));
    }
    if req.password.len() < 8 {
        return Err(ApiError::BadRequest("password must be at least 8 characters"));
    }

    let user_id = Uuid::new_v4();

    let resp = run_blocking(move || {
        if state.db.get_user_by_email(&req.email)?.is_some() {
            return Err(ApiError::Conflict("email already registered"));
        }

        // Hash password with Argon2id
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(req.password.as_bytes(), &salt)
            .map_err(|e| ApiError::Internal(anyhow!("failed to hash password: {}", e)))?
            .to_string();

        state
            .db
            .create_user(&user_id.to_string(), &req.email, &req.username, &password_hash)?;

        Ok(RegisterResponse { user_id })
    })
    .await?;

    Ok((StatusCode::CREATED, Json(resp)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let pair: AuthResponse = run_blocking(move || {
        let user = state
            .db
            .get_user_by_email(&req.email)?
            .ok_or(ApiError::Unauthenticated)?;

        // Verify password
        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|e| ApiError::Internal(anyhow!("corrupt password hash for user {}: {}", user.id, e)))?;

        Argon2::default()
            .verify_password(req.password.as_bytes(), &parsed_hash)
            .map_err(|_| ApiError::Unauthenticated)?;

        // A fresh login replaces whatever refresh session was live before.
        state.sessions.issue_pair(&state.db, &user, Utc::now())
    })
    .await?;

    Ok(Json(pair))
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let pair: AuthResponse =
        run_blocking(move || state.sessions.rotate(&state.db, &req.refresh_token, Utc::now()))
            .await?;

    Ok(Json(pair))
}

pub async fn user_count(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let count = run_blocking(move || Ok(state.db.count_users()?)).await?;
    Ok(Json(UserCountResponse { count }))
}
