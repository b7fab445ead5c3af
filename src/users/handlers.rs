use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::extractors::OwnerContext,
    error::AppError,
    state::AppState,
    users::dto::{
        ChangePasswordRequest, LoginRequest, SignupRequest, SuccessResponse, TokenResponse,
        UpdateProfileRequest, UserResponse,
    },
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
}

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/:id", get(get_user).patch(update_user))
        .route("/users/:id/password", put(change_password))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TokenResponse>), AppError> {
    let Json(req) = payload?;
    let token = state
        .accounts
        .signup(req)
        .await
        .inspect_err(|e| warn!(error = %e, "signup failed"))?;
    Ok((StatusCode::CREATED, Json(TokenResponse { token })))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, AppError> {
    let Json(req) = payload?;
    let token = state
        .accounts
        .login(req)
        .await
        .inspect_err(|e| warn!(error = %e, "login failed"))?;
    Ok(Json(TokenResponse { token }))
}

#[instrument(skip(state, owner))]
pub async fn get_user(
    State(state): State<AppState>,
    OwnerContext(owner): OwnerContext,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .accounts
        .profile(&owner)
        .await
        .inspect_err(|e| warn!(error = %e, "get user failed"))?;
    Ok(Json(user))
}

#[instrument(skip(state, owner, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    OwnerContext(owner): OwnerContext,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<UserResponse>, AppError> {
    let Json(req) = payload?;
    let user = state
        .accounts
        .update_profile(&owner, req)
        .await
        .inspect_err(|e| warn!(error = %e, "update user failed"))?;
    Ok(Json(user))
}

#[instrument(skip(state, owner, payload))]
pub async fn change_password(
    State(state): State<AppState>,
    OwnerContext(owner): OwnerContext,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse>, AppError> {
    let Json(req) = payload?;
    state
        .accounts
        .change_password(&owner, req)
        .await
        .inspect_err(|e| warn!(error = %e, "change password failed"))?;
    Ok(Json(SuccessResponse { success: true }))
}
