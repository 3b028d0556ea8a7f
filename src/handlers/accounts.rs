use axum::{extract::State, Json};

use crate::auth::{AuthUser, TokenPair};
use crate::errors::ServiceError;
use crate::services::accounts::{
    FirebaseSignInRequest, GoogleSignInRequest, RefreshRequest, RequestOtpRequest,
    RequestOtpResponse, VerifyOtpRequest,
};
use crate::services::customers::{ProfileResponse, UpdateProfileRequest};
use crate::AppState;

#[utoipa::path(
    post,
    path = "/api/v1/auth/otp/request",
    summary = "Request a login OTP",
    request_body = RequestOtpRequest,
    responses(
        (status = 200, description = "OTP issued (delivery status in body)", body = RequestOtpResponse),
        (status = 400, description = "Invalid phone number", body = crate::errors::ErrorResponse),
    ),
    tag = "Auth"
)]
pub async fn request_otp(
    State(state): State<AppState>,
    Json(request): Json<RequestOtpRequest>,
) -> Result<Json<RequestOtpResponse>, ServiceError> {
    Ok(Json(state.services.accounts.request_otp(request).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/otp/verify",
    summary = "Verify an OTP and sign in",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Signed in", body = TokenPair),
        (status = 401, description = "Wrong or expired OTP", body = crate::errors::ErrorResponse),
    ),
    tag = "Auth"
)]
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(request): Json<VerifyOtpRequest>,
) -> Result<Json<TokenPair>, ServiceError> {
    Ok(Json(state.services.accounts.verify_otp(request).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/google",
    summary = "Sign in with a Google profile",
    request_body = GoogleSignInRequest,
    responses((status = 200, description = "Signed in", body = TokenPair)),
    tag = "Auth"
)]
pub async fn google_sign_in(
    State(state): State<AppState>,
    Json(request): Json<GoogleSignInRequest>,
) -> Result<Json<TokenPair>, ServiceError> {
    Ok(Json(state.services.accounts.google_sign_in(request).await?))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/firebase",
    summary = "Sign in with a Firebase phone id-token",
    request_body = FirebaseSignInRequest,
    responses(
        (status = 200, description = "Signed in", body = TokenPair),
        (status = 401, description = "Token rejected", body = crate::errors::ErrorResponse),
    ),
    tag = "Auth"
)]
pub async fn firebase_sign_in(
    State(state): State<AppState>,
    Json(request): Json<FirebaseSignInRequest>,
) -> Result<Json<TokenPair>, ServiceError> {
    Ok(Json(
        state.services.accounts.firebase_sign_in(request).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    summary = "Exchange a refresh token for a new pair",
    request_body = RefreshRequest,
    responses((status = 200, description = "Refreshed", body = TokenPair)),
    tag = "Auth"
)]
pub async fn refresh(
    State(state): State<AppState>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, ServiceError> {
    Ok(Json(state.services.accounts.refresh(request).await?))
}

#[utoipa::path(
    get,
    path = "/api/v1/profile",
    summary = "Fetch the signed-in user's profile",
    responses((status = 200, description = "Profile", body = ProfileResponse)),
    security(("Bearer" = [])),
    tag = "Profile"
)]
pub async fn get_profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ProfileResponse>, ServiceError> {
    Ok(Json(
        state.services.customers.get_profile(auth.user.id).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/v1/profile",
    summary = "Update the signed-in user's profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = ProfileResponse),
        (status = 409, description = "Email already in use", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = [])),
    tag = "Profile"
)]
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, ServiceError> {
    Ok(Json(
        state
            .services
            .customers
            .update_profile(auth.user, request)
            .await?,
    ))
}
