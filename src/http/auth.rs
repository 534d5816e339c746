use axum::{
    extract::State,
    routing::{delete, get, post},
    Router,
};
use serde::Deserialize;

use super::{ApiJson, AppState, AuthUser};
use crate::error::AppResult;
use crate::models::{UpdateProfileParams, User};
use crate::response::{ApiResponse, Created};
use crate::services::auth_service::{
    AuthPayload, ChangePasswordParams, LoginParams, ResetPasswordParams, SignupParams,
};

#[derive(Debug, Default, Deserialize)]
struct EmailRequest {
    #[serde(default)]
    email: String,
}

#[derive(Debug, Default, Deserialize)]
struct VerifyOtpRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    otp: String,
}

#[derive(Debug, Default, Deserialize)]
struct DeleteAccountRequest {
    #[serde(default)]
    password: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/profile", get(profile).put(update_profile))
        .route("/change-password", post(change_password))
        .route("/account", delete(delete_account))
        .route("/restore/send-otp", post(send_restore_otp))
        .route("/restore/verify-otp", post(verify_restore_otp))
}

async fn signup(
    State(state): State<AppState>,
    ApiJson(params): ApiJson<SignupParams>,
) -> AppResult<Created<AuthPayload>> {
    let payload = state.auth.signup(&params)?;
    Ok(Created(ApiResponse::ok("User registered successfully", payload)))
}

async fn login(
    State(state): State<AppState>,
    ApiJson(params): ApiJson<LoginParams>,
) -> AppResult<ApiResponse<AuthPayload>> {
    let payload = state.auth.login(&params)?;
    Ok(ApiResponse::ok("Login successful", payload))
}

async fn logout(State(state): State<AppState>, auth: AuthUser) -> AppResult<ApiResponse<()>> {
    state.auth.logout(&auth.token)?;
    Ok(ApiResponse::message("Logged out successfully"))
}

async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<EmailRequest>,
) -> AppResult<ApiResponse<()>> {
    state.auth.forgot_password(&req.email).await?;
    Ok(ApiResponse::message("Reset link sent if email exists"))
}

async fn reset_password(
    State(state): State<AppState>,
    ApiJson(params): ApiJson<ResetPasswordParams>,
) -> AppResult<ApiResponse<()>> {
    state.auth.reset_password(&params)?;
    Ok(ApiResponse::message("Password reset successfully"))
}

async fn profile(State(state): State<AppState>, auth: AuthUser) -> AppResult<ApiResponse<User>> {
    let user = state.auth.profile(auth.id())?;
    Ok(ApiResponse::ok("Profile fetched successfully", user))
}

async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(params): ApiJson<UpdateProfileParams>,
) -> AppResult<ApiResponse<User>> {
    let user = state.auth.update_profile(auth.id(), &params)?;
    Ok(ApiResponse::ok("Profile updated successfully", user))
}

async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(params): ApiJson<ChangePasswordParams>,
) -> AppResult<ApiResponse<()>> {
    state.auth.change_password(auth.id(), &params)?;
    Ok(ApiResponse::message("Password changed successfully"))
}

async fn delete_account(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(req): ApiJson<DeleteAccountRequest>,
) -> AppResult<ApiResponse<()>> {
    state.auth.delete_account(auth.id(), &req.password)?;
    Ok(ApiResponse::message("Your account has been deleted successfully"))
}

async fn send_restore_otp(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<EmailRequest>,
) -> AppResult<ApiResponse<()>> {
    state.auth.send_restore_otp(&req.email).await?;
    Ok(ApiResponse::message("OTP sent if account exists"))
}

async fn verify_restore_otp(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<VerifyOtpRequest>,
) -> AppResult<ApiResponse<User>> {
    let user = state.auth.verify_restore_otp(&req.email, &req.otp)?;
    Ok(ApiResponse::ok("Account restored successfully", user))
}
