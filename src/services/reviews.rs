//! Product reviews with verified-buyer detection.

use crate::{
    db::DbPool,
    entities::{
        order, order_item, product, product_variant, review, review_like, size_variant, user,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::customers::CustomerService,
    services::orders::OrderStatus,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, JoinType, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SubmitReviewRequest {
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: i32,
    pub comment: Option<String>,
    /// Object-store URLs; at most three are kept.
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewOut {
    pub id: i64,
    pub reviewer_name: String,
    pub rating: i32,
    pub comment: String,
    pub is_verified_buyer: bool,
    pub images: Vec<String>,
    pub helpful_count: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HelpfulToggleResponse {
    pub liked: bool,
    pub helpful_count: u64,
}

/// Recorded rating after the verified-buyer policy is applied: verified
/// buyers rate freely within 1..=5, everyone else floors at 4 stars.
pub fn recorded_rating(requested: i32, verified_buyer: bool) -> i32 {
    let clamped = requested.clamp(1, 5);
    if verified_buyer {
        clamped
    } else {
        clamped.max(4)
    }
}

#[derive(Clone)]
pub struct ReviewService {
    db: Arc<DbPool>,
    customers: CustomerService,
    event_sender: Arc<EventSender>,
}

impl ReviewService {
    pub fn new(db: Arc<DbPool>, customers: CustomerService, event_sender: Arc<EventSender>) -> Self {
        Self {
            db,
            customers,
            event_sender,
        }
    }

    /// Whether this user has actually bought the product: any of their
    /// orders that was not cancelled or returned, containing a unit of the
    /// product. Orders match by account link or by canonical phone.
    pub async fn is_verified_buyer(
        &self,
        user: &user::Model,
        product_id: i64,
    ) -> Result<bool, ServiceError> {
        let unit_ids: Vec<i64> = size_variant::Entity::find()
            .join(JoinType::InnerJoin, size_variant::Relation::Variant.def())
            .filter(product_variant::Column::ProductId.eq(product_id))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|u| u.id)
            .collect();

        if unit_ids.is_empty() {
            return Ok(false);
        }

        let mut owner = Condition::any().add(order::Column::UserId.eq(user.id));
        if let Some(phone) = user
            .phone_number
            .as_deref()
            .and_then(|p| self.customers.canonicalize(p))
        {
            owner = owner.add(order::Column::PhoneNumber.eq(phone));
        }

        let qualifying: Vec<i64> = order::Entity::find()
            .filter(owner)
            .filter(
                order::Column::Status.is_not_in([
                    OrderStatus::Cancelled.to_string(),
                    OrderStatus::Returned.to_string(),
                ]),
            )
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|o| o.id)
            .collect();

        if qualifying.is_empty() {
            return Ok(false);
        }

        let purchases = order_item::Entity::find()
            .filter(order_item::Column::OrderId.is_in(qualifying))
            .filter(order_item::Column::SizeVariantId.is_in(unit_ids))
            .count(&*self.db)
            .await?;

        Ok(purchases > 0)
    }

    #[instrument(skip(self))]
    pub async fn list_for_product(
        &self,
        product_id: i64,
    ) -> Result<Vec<ReviewOut>, ServiceError> {
        let reviews = review::Entity::find()
            .filter(review::Column::ProductId.eq(product_id))
            .order_by_desc(review::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let user_ids: Vec<i64> = reviews.iter().map(|r| r.user_id).collect();
        let reviewers: HashMap<i64, user::Model> = user::Entity::find()
            .filter(user::Column::Id.is_in(user_ids))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();

        let mut out = Vec::with_capacity(reviews.len());
        for r in reviews {
            let helpful_count = review_like::Entity::find()
                .filter(review_like::Column::ReviewId.eq(r.id))
                .count(&*self.db)
                .await?;
            out.push(Self::to_out(r, &reviewers, helpful_count));
        }
        Ok(out)
    }

    /// One review per user per product; a resubmission replaces the prior
    /// review rather than stacking a second one.
    #[instrument(skip(self, user, request), fields(user_id = user.id, product_id))]
    pub async fn submit(
        &self,
        user: &user::Model,
        product_id: i64,
        request: SubmitReviewRequest,
    ) -> Result<ReviewOut, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let verified = self.is_verified_buyer(user, product_id).await?;
        let rating = recorded_rating(request.rating, verified);
        let mut images = request.images.into_iter().filter(|i| !i.is_empty());

        let existing = review::Entity::find()
            .filter(review::Column::ProductId.eq(product_id))
            .filter(review::Column::UserId.eq(user.id))
            .one(&*self.db)
            .await?;

        let saved = match existing {
            Some(prior) => {
                let mut active: review::ActiveModel = prior.into();
                active.rating = Set(rating);
                active.comment = Set(request.comment.clone().filter(|c| !c.is_empty()));
                active.is_verified_buyer = Set(verified);
                active.image_1 = Set(images.next());
                active.image_2 = Set(images.next());
                active.image_3 = Set(images.next());
                active.created_at = Set(Utc::now());
                active.update(&*self.db).await?
            }
            None => {
                review::ActiveModel {
                    product_id: Set(product_id),
                    user_id: Set(user.id),
                    rating: Set(rating),
                    comment: Set(request.comment.clone().filter(|c| !c.is_empty())),
                    is_verified_buyer: Set(verified),
                    image_1: Set(images.next()),
                    image_2: Set(images.next()),
                    image_3: Set(images.next()),
                    created_at: Set(Utc::now()),
                    ..Default::default()
                }
                .insert(&*self.db)
                .await?
            }
        };

        info!(review_id = saved.id, verified, "Review recorded");
        self.event_sender
            .send(Event::ReviewSubmitted {
                review_id: saved.id,
                product_id,
                verified_buyer: verified,
            })
            .await;

        let helpful_count = review_like::Entity::find()
            .filter(review_like::Column::ReviewId.eq(saved.id))
            .count(&*self.db)
            .await?;
        let reviewers = HashMap::from([(user.id, user.clone())]);
        Ok(Self::to_out(saved, &reviewers, helpful_count))
    }

    /// Toggles this user's "helpful" vote on a review.
    #[instrument(skip(self, user), fields(user_id = user.id, review_id))]
    pub async fn toggle_helpful(
        &self,
        user: &user::Model,
        review_id: i64,
    ) -> Result<HelpfulToggleResponse, ServiceError> {
        let review = review::Entity::find_by_id(review_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Review {} not found", review_id)))?;

        let existing = review_like::Entity::find()
            .filter(review_like::Column::ReviewId.eq(review.id))
            .filter(review_like::Column::UserId.eq(user.id))
            .one(&*self.db)
            .await?;

        let liked = match existing {
            Some(like) => {
                like.delete(&*self.db).await?;
                false
            }
            None => {
                review_like::ActiveModel {
                    review_id: Set(review.id),
                    user_id: Set(user.id),
                    ..Default::default()
                }
                .insert(&*self.db)
                .await?;
                true
            }
        };

        let helpful_count = review_like::Entity::find()
            .filter(review_like::Column::ReviewId.eq(review.id))
            .count(&*self.db)
            .await?;

        Ok(HelpfulToggleResponse {
            liked,
            helpful_count,
        })
    }

    fn to_out(
        review: review::Model,
        reviewers: &HashMap<i64, user::Model>,
        helpful_count: u64,
    ) -> ReviewOut {
        let reviewer_name = reviewers
            .get(&review.user_id)
            .map(|u| u.display_name())
            .unwrap_or_else(|| "Customer".to_string());

        let images = [&review.image_1, &review.image_2, &review.image_3]
            .into_iter()
            .filter_map(|i| i.clone())
            .collect();

        ReviewOut {
            id: review.id,
            reviewer_name,
            rating: review.rating,
            comment: review.comment.unwrap_or_default(),
            is_verified_buyer: review.is_verified_buyer,
            images,
            helpful_count,
            created_at: review.created_at,
        }
    }
}
