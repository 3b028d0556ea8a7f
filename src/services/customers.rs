use crate::{
    db::DbPool,
    entities::{order, user},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use validator::Validate;

/// Normalizes a phone number to `<country_prefix>` + the last ten digits.
///
/// Guest checkouts, OTP logins and token-verified logins all feed numbers in
/// different shapes ("9876543210", "+91 98765 43210", "919876543210"). Every
/// lookup and every write goes through this one function so the formats can
/// never drift apart.
pub fn canonical_phone(raw: &str, country_prefix: &str) -> Option<String> {
    let digits: Vec<char> = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 10 {
        return None;
    }
    let local: String = digits[digits.len() - 10..].iter().collect();
    Some(format!("{}{}", country_prefix, local))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub full_name: String,
    pub address: Option<String>,
    pub pincode: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProfileResponse {
    pub full_name: String,
    pub phone: String,
    pub address: String,
    pub pincode: String,
    pub email: String,
}

impl ProfileResponse {
    pub fn from_user(user: &user::Model) -> Self {
        Self {
            full_name: user.display_name(),
            phone: user.phone_number.clone().unwrap_or_default(),
            address: user.address.clone().unwrap_or_default(),
            pincode: user.pincode.clone().unwrap_or_default(),
            email: user.email.clone().unwrap_or_default(),
        }
    }
}

/// Profile lookups and the guest/registered reconciliation logic.
#[derive(Clone)]
pub struct CustomerService {
    db: Arc<DbPool>,
    country_prefix: String,
}

impl CustomerService {
    pub fn new(db: Arc<DbPool>, country_prefix: String) -> Self {
        Self { db, country_prefix }
    }

    pub fn canonicalize(&self, raw: &str) -> Option<String> {
        canonical_phone(raw, &self.country_prefix)
    }

    /// Find a registered user by any phone format.
    pub async fn find_by_phone<C: ConnectionTrait>(
        &self,
        conn: &C,
        raw_phone: &str,
    ) -> Result<Option<user::Model>, ServiceError> {
        let Some(phone) = self.canonicalize(raw_phone) else {
            return Ok(None);
        };

        user::Entity::find()
            .filter(user::Column::PhoneNumber.eq(phone))
            .one(conn)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Copies checkout form data into any profile fields that are still
    /// empty. Populated fields are never overwritten here.
    pub async fn backfill_from_checkout<C: ConnectionTrait>(
        &self,
        conn: &C,
        user: user::Model,
        full_name: &str,
        address: &str,
        pincode: &str,
        email: Option<&str>,
    ) -> Result<(), ServiceError> {
        let mut changed = false;
        let mut active: user::ActiveModel = user.clone().into();

        if user.first_name.as_deref().unwrap_or("").is_empty() && !full_name.is_empty() {
            active.first_name = Set(Some(full_name.to_string()));
            changed = true;
        }
        if user.address.as_deref().unwrap_or("").is_empty() && !address.is_empty() {
            active.address = Set(Some(address.to_string()));
            changed = true;
        }
        if user.pincode.as_deref().unwrap_or("").is_empty() && !pincode.is_empty() {
            active.pincode = Set(Some(pincode.to_string()));
            changed = true;
        }
        if user.email.as_deref().unwrap_or("").is_empty() {
            if let Some(email) = email.filter(|e| !e.is_empty()) {
                let taken = user::Entity::find()
                    .filter(user::Column::Email.eq(email))
                    .filter(user::Column::Id.ne(user.id))
                    .one(conn)
                    .await?
                    .is_some();
                if !taken {
                    active.email = Set(Some(email.to_string()));
                    changed = true;
                }
            }
        }

        if changed {
            active.updated_at = Set(Some(Utc::now()));
            active.update(conn).await?;
            info!(user_id = user.id, "Profile back-filled from checkout");
        }

        Ok(())
    }

    /// Login-time sync: pull details from the newest matching guest order
    /// into empty profile fields and link all unlinked guest orders to the
    /// account. Failures here must not block login.
    #[instrument(skip(self, user), fields(user_id = user.id))]
    pub async fn sync_guest_orders(&self, user: user::Model) -> Result<user::Model, ServiceError> {
        let Some(phone) = user
            .phone_number
            .as_deref()
            .and_then(|p| self.canonicalize(p))
        else {
            return Ok(user);
        };

        let latest_order = order::Entity::find()
            .filter(order::Column::PhoneNumber.eq(phone.clone()))
            .order_by_desc(order::Column::CreatedAt)
            .one(&*self.db)
            .await?;

        if let Some(ref past) = latest_order {
            self.backfill_from_checkout(
                &*self.db,
                user.clone(),
                &past.full_name,
                &past.address,
                &past.pincode,
                past.email.as_deref(),
            )
            .await?;
        }

        let linked = order::Entity::update_many()
            .col_expr(order::Column::UserId, sea_orm::sea_query::Expr::value(user.id))
            .filter(order::Column::PhoneNumber.eq(phone))
            .filter(order::Column::UserId.is_null())
            .exec(&*self.db)
            .await?;

        if linked.rows_affected > 0 {
            info!(
                user_id = user.id,
                linked = linked.rows_affected,
                "Linked past guest orders to account"
            );
        }

        user::Entity::find_by_id(user.id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))
    }

    pub async fn get_profile(&self, user_id: i64) -> Result<ProfileResponse, ServiceError> {
        let user = user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".to_string()))?;
        Ok(ProfileResponse::from_user(&user))
    }

    /// Explicit profile update; unlike the checkout back-fill this may
    /// overwrite populated fields.
    #[instrument(skip(self, request), fields(user_id = user.id))]
    pub async fn update_profile(
        &self,
        user: user::Model,
        request: UpdateProfileRequest,
    ) -> Result<ProfileResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let user_id = user.id;
        let mut active: user::ActiveModel = user.into();

        active.first_name = Set(Some(request.full_name));
        active.address = Set(request.address);
        active.pincode = Set(request.pincode);

        if let Some(email) = request.email.filter(|e| !e.is_empty()) {
            let taken = user::Entity::find()
                .filter(user::Column::Email.eq(email.clone()))
                .filter(user::Column::Id.ne(user_id))
                .one(&*self.db)
                .await?
                .is_some();
            if taken {
                warn!(user_id, "Profile update rejected: email already taken");
                return Err(ServiceError::Conflict(
                    "Email already in use by another account".to_string(),
                ));
            }
            active.email = Set(Some(email));
        }

        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&*self.db).await?;

        info!(user_id, "Profile updated");
        Ok(ProfileResponse::from_user(&updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_phone_strips_prefixes_and_spacing() {
        assert_eq!(
            canonical_phone("+91 98765 43210", "+91").as_deref(),
            Some("+919876543210")
        );
        assert_eq!(
            canonical_phone("9876543210", "+91").as_deref(),
            Some("+919876543210")
        );
        assert_eq!(
            canonical_phone("919876543210", "+91").as_deref(),
            Some("+919876543210")
        );
        assert_eq!(
            canonical_phone("+919876543210", "+91").as_deref(),
            Some("+919876543210")
        );
    }

    #[test]
    fn canonical_phone_is_idempotent() {
        let once = canonical_phone("09876543210", "+91").unwrap();
        let twice = canonical_phone(&once, "+91").unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn canonical_phone_rejects_short_numbers() {
        assert_eq!(canonical_phone("12345", "+91"), None);
        assert_eq!(canonical_phone("", "+91"), None);
        assert_eq!(canonical_phone("abc-def", "+91"), None);
    }
}
