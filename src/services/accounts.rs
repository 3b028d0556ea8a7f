//! Login flows: phone OTP, Google and Firebase sign-in.
//!
//! All three converge on the same bootstrap: find or create the user row,
//! sync past guest orders onto it, hand out a JWT pair. The SMS gateway and
//! the id-token verifier are external collaborators and are never called
//! inside a database transaction.

use crate::{
    auth::{AuthService, TokenPair},
    db::DbPool,
    entities::{otp_verification, user},
    errors::ServiceError,
    events::{Event, EventSender},
    services::customers::CustomerService,
    services::notifications::SmsGateway,
};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

/// How long an issued OTP stays redeemable.
const OTP_TTL_MINUTES: i64 = 10;

/// Identity attested by an external token verifier (Firebase). The login
/// flow trusts the verifier to have proven phone ownership.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifiedIdentity {
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub picture: Option<String>,
}

#[async_trait]
pub trait IdTokenVerifier: Send + Sync {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, ServiceError>;
}

/// Verifier backed by an HTTP endpoint (the Firebase token-check function).
pub struct HttpIdTokenVerifier {
    http: reqwest::Client,
    verify_url: Option<String>,
}

impl HttpIdTokenVerifier {
    pub fn new(verify_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            verify_url,
        }
    }
}

#[async_trait]
impl IdTokenVerifier for HttpIdTokenVerifier {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, ServiceError> {
        let Some(url) = &self.verify_url else {
            return Err(ServiceError::ExternalServiceError(
                "Identity verification is not configured".to_string(),
            ));
        };

        let response = self
            .http
            .post(url)
            .json(&serde_json::json!({ "id_token": id_token }))
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Id-token verifier unreachable");
                ServiceError::ExternalServiceError("Identity verification unavailable".to_string())
            })?;

        if !response.status().is_success() {
            return Err(ServiceError::Unauthorized(
                "Identity token rejected".to_string(),
            ));
        }

        response.json::<VerifiedIdentity>().await.map_err(|e| {
            warn!(error = %e, "Id-token verifier returned a malformed body");
            ServiceError::ExternalServiceError("Identity verification unavailable".to_string())
        })
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RequestOtpRequest {
    #[validate(length(min = 10, message = "Enter a valid phone number"))]
    pub phone_number: String,
}

/// Success-shaped even when the SMS provider is down: blocking login on a
/// third-party outage is worse than letting the user proceed via logged OTP.
#[derive(Debug, Serialize, ToSchema)]
pub struct RequestOtpResponse {
    pub success: bool,
    pub message: String,
    pub sms_delivered: bool,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyOtpRequest {
    #[validate(length(min = 10, message = "Enter a valid phone number"))]
    pub phone_number: String,
    #[validate(length(equal = 6, message = "OTP must be 6 digits"))]
    pub otp: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct GoogleSignInRequest {
    #[validate(email(message = "Enter a valid email address"))]
    pub email: String,
    pub full_name: Option<String>,
    pub profile_pic: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct FirebaseSignInRequest {
    #[validate(length(min = 1, message = "id_token is required"))]
    pub id_token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Login orchestration across OTP, Google and Firebase.
#[derive(Clone)]
pub struct AccountService {
    db: Arc<DbPool>,
    customers: CustomerService,
    auth: Arc<AuthService>,
    sms: SmsGateway,
    verifier: Arc<dyn IdTokenVerifier>,
    event_sender: Arc<EventSender>,
}

impl AccountService {
    pub fn new(
        db: Arc<DbPool>,
        customers: CustomerService,
        auth: Arc<AuthService>,
        sms: SmsGateway,
        verifier: Arc<dyn IdTokenVerifier>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        Self {
            db,
            customers,
            auth,
            sms,
            verifier,
            event_sender,
        }
    }

    /// Issues a fresh OTP and hands it to the SMS gateway fire-and-forget.
    #[instrument(skip(self, request), fields(phone = %request.phone_number))]
    pub async fn request_otp(
        &self,
        request: RequestOtpRequest,
    ) -> Result<RequestOtpResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let phone = self
            .customers
            .canonicalize(&request.phone_number)
            .ok_or_else(|| {
                ServiceError::ValidationError("Enter a valid 10-digit phone number".to_string())
            })?;

        let otp = generate_otp(&mut rand::thread_rng());

        otp_verification::ActiveModel {
            phone_number: Set(phone.clone()),
            otp_code: Set(otp.clone()),
            is_used: Set(false),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        // Delivery happens after the row is durable, outside any
        // transaction, and never blocks issuance.
        let delivered = self.sms.send_otp(&phone, &otp).await;

        self.event_sender
            .send(Event::OtpIssued {
                phone_number: phone,
                delivered,
            })
            .await;

        Ok(RequestOtpResponse {
            success: true,
            message: if delivered {
                "OTP sent to your phone".to_string()
            } else {
                "OTP generated; SMS delivery is currently unavailable".to_string()
            },
            sms_delivered: delivered,
        })
    }

    /// Redeems an OTP, bootstrapping the account on first login.
    #[instrument(skip(self, request), fields(phone = %request.phone_number))]
    pub async fn verify_otp(&self, request: VerifyOtpRequest) -> Result<TokenPair, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let phone = self
            .customers
            .canonicalize(&request.phone_number)
            .ok_or_else(|| {
                ServiceError::ValidationError("Enter a valid 10-digit phone number".to_string())
            })?;

        let cutoff = Utc::now() - Duration::minutes(OTP_TTL_MINUTES);
        let pending = otp_verification::Entity::find()
            .filter(otp_verification::Column::PhoneNumber.eq(phone.clone()))
            .filter(otp_verification::Column::IsUsed.eq(false))
            .filter(otp_verification::Column::CreatedAt.gte(cutoff))
            .order_by_desc(otp_verification::Column::CreatedAt)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::Unauthorized("OTP expired or not requested".to_string())
            })?;

        if pending.otp_code != request.otp {
            return Err(ServiceError::Unauthorized("Incorrect OTP".to_string()));
        }

        let mut used: otp_verification::ActiveModel = pending.into();
        used.is_used = Set(true);
        used.update(&*self.db).await?;

        let user = self.get_or_create_by_phone(&phone).await?;
        self.finish_login(user).await
    }

    /// Google sign-in: the client completes the Google flow and posts the
    /// verified profile; accounts key off the email address.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn google_sign_in(
        &self,
        request: GoogleSignInRequest,
    ) -> Result<TokenPair, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let existing = user::Entity::find()
            .filter(user::Column::Email.eq(request.email.clone()))
            .one(&*self.db)
            .await?;

        let user = match existing {
            Some(user) => user,
            None => {
                let username = self
                    .available_username(request.email.split('@').next().unwrap_or("user"))
                    .await?;
                let created = user::ActiveModel {
                    username: Set(username),
                    email: Set(Some(request.email.clone())),
                    first_name: Set(request.full_name.clone().filter(|n| !n.is_empty())),
                    auth_provider: Set("google".to_string()),
                    profile_pic: Set(request.profile_pic.clone()),
                    is_verified: Set(true),
                    created_at: Set(Utc::now()),
                    ..Default::default()
                }
                .insert(&*self.db)
                .await?;
                info!(user_id = created.id, "User registered via Google");
                self.event_sender
                    .send(Event::UserRegistered {
                        user_id: created.id,
                        provider: "google".to_string(),
                    })
                    .await;
                created
            }
        };

        self.finish_login(user).await
    }

    /// Firebase phone sign-in: the external verifier attests phone
    /// ownership, then the flow joins the OTP path.
    #[instrument(skip(self, request))]
    pub async fn firebase_sign_in(
        &self,
        request: FirebaseSignInRequest,
    ) -> Result<TokenPair, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let identity = self.verifier.verify(&request.id_token).await?;
        let raw_phone = identity.phone_number.ok_or_else(|| {
            ServiceError::Unauthorized("Identity token carries no phone number".to_string())
        })?;
        let phone = self.customers.canonicalize(&raw_phone).ok_or_else(|| {
            ServiceError::Unauthorized("Identity token carries a malformed phone number".to_string())
        })?;

        let user = self.get_or_create_by_phone(&phone).await?;

        // Attested profile data fills gaps only; it never overwrites.
        if identity.name.is_some() || identity.picture.is_some() {
            let mut changed = false;
            let mut active: user::ActiveModel = user.clone().into();
            if user.first_name.as_deref().unwrap_or("").is_empty() {
                if let Some(name) = identity.name.filter(|n| !n.is_empty()) {
                    active.first_name = Set(Some(name));
                    changed = true;
                }
            }
            if user.profile_pic.is_none() {
                if let Some(picture) = identity.picture.filter(|p| !p.is_empty()) {
                    active.profile_pic = Set(Some(picture));
                    changed = true;
                }
            }
            if changed {
                active.auth_provider = Set("firebase".to_string());
                active.updated_at = Set(Some(Utc::now()));
                active.update(&*self.db).await?;
            }
        }

        let user = user::Entity::find_by_id(user.id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;
        self.finish_login(user).await
    }

    pub async fn refresh(&self, request: RefreshRequest) -> Result<TokenPair, ServiceError> {
        self.auth
            .refresh(&request.refresh_token)
            .await
            .map_err(ServiceError::from)
    }

    async fn get_or_create_by_phone(&self, phone: &str) -> Result<user::Model, ServiceError> {
        if let Some(user) = user::Entity::find()
            .filter(user::Column::PhoneNumber.eq(phone))
            .one(&*self.db)
            .await?
        {
            return Ok(user);
        }

        let username = self.available_username(phone).await?;
        let created = user::ActiveModel {
            username: Set(username),
            phone_number: Set(Some(phone.to_string())),
            auth_provider: Set("phone".to_string()),
            is_verified: Set(true),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(user_id = created.id, "User registered via phone");
        self.event_sender
            .send(Event::UserRegistered {
                user_id: created.id,
                provider: "phone".to_string(),
            })
            .await;

        Ok(created)
    }

    /// Usernames are unique; a collision falls back to a timestamped
    /// suffix rather than failing the login.
    async fn available_username(&self, base: &str) -> Result<String, ServiceError> {
        let taken = user::Entity::find()
            .filter(user::Column::Username.eq(base))
            .one(&*self.db)
            .await?
            .is_some();

        if !taken {
            return Ok(base.to_string());
        }
        Ok(format!("{}-{}", base, Utc::now().timestamp()))
    }

    /// Shared tail of every login flow: guest-order sync, then tokens.
    async fn finish_login(&self, user: user::Model) -> Result<TokenPair, ServiceError> {
        // Sync failures must not block login.
        let user = match self.customers.sync_guest_orders(user.clone()).await {
            Ok(synced) => synced,
            Err(e) => {
                warn!(user_id = user.id, error = %e, "Guest order sync failed; continuing login");
                user
            }
        };

        self.auth.generate_tokens(&user).map_err(ServiceError::from)
    }
}

/// Six-digit numeric OTP.
fn generate_otp<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("{:06}", rng.gen_range(0..1_000_000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn otp_is_always_six_digits() {
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let otp = generate_otp(&mut rng);
            assert_eq!(otp.len(), 6);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn unconfigured_verifier_reports_external_error() {
        let verifier = HttpIdTokenVerifier::new(None);
        let err = verifier.verify("token").await.unwrap_err();
        assert!(matches!(err, ServiceError::ExternalServiceError(_)));
    }
}
