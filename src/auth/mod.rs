//! JWT issuance and verification for storefront sessions.
//!
//! Login happens through OTP or an external identity token (see
//! `services::accounts`); this module only mints and checks the bearer
//! tokens those flows hand out.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::{DatabaseConnection, EntityTrait};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::user;
use crate::errors::ServiceError;

/// Claim structure for JWT tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    pub nbf: i64,
    pub iss: String,
    pub aud: String,
    /// "access" or "refresh"
    pub kind: String,
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub access_token_expiration: Duration,
    pub refresh_token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_issuer: String,
        jwt_audience: String,
        access_token_expiration: Duration,
        refresh_token_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_issuer,
            jwt_audience,
            access_token_expiration,
            refresh_token_expiration,
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token expired")]
    TokenExpired,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::error::DbErr),
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Database(db) => ServiceError::DatabaseError(db),
            AuthError::UserNotFound => ServiceError::Unauthorized("User not found".to_string()),
            other => ServiceError::Unauthorized(other.to_string()),
        }
    }
}

/// Token pair issued on login, with the profile snapshot the checkout page
/// uses for auto-fill.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: SessionProfile,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionProfile {
    pub id: i64,
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub pincode: String,
}

impl SessionProfile {
    pub fn from_user(user: &user::Model) -> Self {
        Self {
            id: user.id,
            full_name: user.display_name(),
            phone: user.phone_number.clone().unwrap_or_default(),
            email: user.email.clone().unwrap_or_default(),
            address: user.address.clone().unwrap_or_default(),
            pincode: user.pincode.clone().unwrap_or_default(),
        }
    }
}

/// Issues and validates bearer tokens.
#[derive(Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    db: Arc<DatabaseConnection>,
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Arc<DatabaseConnection>) -> Self {
        Self { config, db }
    }

    /// Generate an access/refresh token pair for a user.
    pub fn generate_tokens(&self, user: &user::Model) -> Result<TokenPair, AuthError> {
        let now = Utc::now();
        let access_exp = now
            + ChronoDuration::from_std(self.config.access_token_expiration)
                .map_err(|_| AuthError::TokenCreation("Invalid token duration".to_string()))?;
        let refresh_exp = now
            + ChronoDuration::from_std(self.config.refresh_token_expiration)
                .map_err(|_| AuthError::TokenCreation("Invalid token duration".to_string()))?;

        let access_token = self.encode_claims(Claims {
            sub: user.id.to_string(),
            phone: user.phone_number.clone(),
            email: user.email.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: access_exp.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
            kind: "access".to_string(),
        })?;

        let refresh_token = self.encode_claims(Claims {
            sub: user.id.to_string(),
            phone: None,
            email: None,
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: refresh_exp.timestamp(),
            nbf: now.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
            kind: "refresh".to_string(),
        })?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_token_expiration.as_secs() as i64,
            user: SessionProfile::from_user(user),
        })
    }

    fn encode_claims(&self, claims: Claims) -> Result<String, AuthError> {
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Verify a token and return its claims.
    pub fn verify_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.config.jwt_audience.clone()]);
        validation.set_issuer(&[self.config.jwt_issuer.clone()]);

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken(e.to_string()),
        })?;

        Ok(data.claims)
    }

    /// Load the user behind a verified access token.
    pub async fn authenticate(&self, token: &str) -> Result<user::Model, AuthError> {
        let claims = self.verify_token(token)?;
        if claims.kind != "access" {
            return Err(AuthError::InvalidToken(
                "Refresh token used as access token".to_string(),
            ));
        }

        let user_id: i64 = claims
            .sub
            .parse()
            .map_err(|_| AuthError::InvalidToken("Malformed subject claim".to_string()))?;

        debug!(user_id, "Authenticating bearer token");

        user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    /// Exchange a valid refresh token for a fresh pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, AuthError> {
        let claims = self.verify_token(refresh_token)?;
        if claims.kind != "refresh" {
            return Err(AuthError::InvalidToken("Not a refresh token".to_string()));
        }

        let user_id: i64 = claims
            .sub
            .parse()
            .map_err(|_| AuthError::InvalidToken("Malformed subject claim".to_string()))?;

        let user = user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        self.generate_tokens(&user)
    }
}

/// Extractor for bearer-protected routes. Resolves the full user row so
/// handlers can read profile fields directly.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: user::Model,
}

#[axum::async_trait]
impl FromRequestParts<crate::AppState> for AuthUser {
    type Rejection = ServiceError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &crate::AppState,
    ) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| ServiceError::Unauthorized("Missing Authorization header".into()))?;

        let token = header_value
            .strip_prefix("Bearer ")
            .ok_or_else(|| ServiceError::Unauthorized("Expected a Bearer token".into()))?;

        let user = state.auth.authenticate(token).await.map_err(ServiceError::from)?;

        Ok(AuthUser { user })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn test_config() -> AuthConfig {
        AuthConfig::new(
            "unit-test-secret-that-is-long-enough-for-hs256-and-then-some-0123456789".to_string(),
            "naari-couture-api".to_string(),
            "naari-couture-storefront".to_string(),
            Duration::from_secs(3600),
            Duration::from_secs(86400),
        )
    }

    fn test_user() -> user::Model {
        user::Model {
            id: 42,
            username: "+919876543210".to_string(),
            email: None,
            phone_number: Some("+919876543210".to_string()),
            first_name: Some("Asha".to_string()),
            last_name: None,
            auth_provider: "phone".to_string(),
            profile_pic: None,
            is_verified: true,
            address: None,
            pincode: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn token_round_trip() {
        let service = AuthService::new(
            test_config(),
            Arc::new(DatabaseConnection::Disconnected),
        );
        let pair = service.generate_tokens(&test_user()).unwrap();

        let claims = service.verify_token(&pair.access_token).unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.kind, "access");
        assert_eq!(claims.phone.as_deref(), Some("+919876543210"));

        let refresh_claims = service.verify_token(&pair.refresh_token).unwrap();
        assert_eq!(refresh_claims.kind, "refresh");
    }

    #[test]
    fn tampered_token_rejected() {
        let service = AuthService::new(
            test_config(),
            Arc::new(DatabaseConnection::Disconnected),
        );
        let pair = service.generate_tokens(&test_user()).unwrap();

        let mut other_config = test_config();
        other_config.jwt_secret =
            "another-secret-that-is-also-long-enough-for-hs256-validation-9876543210".to_string();
        let other = AuthService::new(other_config, Arc::new(DatabaseConnection::Disconnected));

        assert!(other.verify_token(&pair.access_token).is_err());
    }

    #[test]
    fn session_profile_prefers_first_name() {
        let user = test_user();
        let profile = SessionProfile::from_user(&user);
        assert_eq!(profile.full_name, "Asha");
        assert_eq!(profile.phone, "+919876543210");
    }
}
