use crate::{
    db::DbPool,
    entities::{coupon, coupon::CouponType, wheel_usage},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, NaiveDate, Utc};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter, Set,
    SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

/// Outcome of evaluating a coupon against an order total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CouponEvaluation {
    pub valid: bool,
    pub reason: Option<String>,
    pub discount: Decimal,
}

impl CouponEvaluation {
    fn rejected(reason: &str) -> Self {
        Self {
            valid: false,
            reason: Some(reason.to_string()),
            discount: Decimal::ZERO,
        }
    }

    fn accepted(discount: Decimal) -> Self {
        Self {
            valid: true,
            reason: None,
            discount,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApplyCouponRequest {
    pub code: String,
    pub cart_total: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CouponPreviewResponse {
    pub success: bool,
    pub message: String,
    pub discount_amount: Decimal,
    pub final_total: Decimal,
    pub coupon_code: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WheelItem {
    pub id: i64,
    pub label: String,
    pub color: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SpinRequest {
    pub order_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SpinResult {
    pub success: bool,
    pub coupon_code: Option<String>,
    pub message: String,
    pub discount_text: Option<String>,
    pub already_spun: bool,
}

/// Coupon rules and the spin-wheel draw.
#[derive(Clone)]
pub struct CouponService {
    db: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl CouponService {
    pub fn new(db: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Daily wheel usage with the stale-date reset applied. The stored
    /// counter only means something on the day it was written; on any other
    /// day it reads as zero. Callers must use this instead of the raw
    /// column.
    pub fn effective_daily_usage(coupon: &coupon::Model, today: NaiveDate) -> i32 {
        match coupon.last_used_date {
            Some(date) if date == today => coupon.today_usage_count,
            _ => 0,
        }
    }

    /// Evaluates a coupon against an order total. Pure over its inputs:
    /// the preview endpoint and the order transaction call this with the
    /// same arguments and must get the same answer, because the
    /// transaction's answer is what gets billed.
    pub fn evaluate(
        coupon: &coupon::Model,
        order_total: Decimal,
        now: DateTime<Utc>,
    ) -> CouponEvaluation {
        if !coupon.active {
            return CouponEvaluation::rejected("This coupon is not active right now.");
        }
        if now < coupon.valid_from {
            return CouponEvaluation::rejected("This coupon is not valid yet.");
        }
        if now > coupon.valid_until {
            return CouponEvaluation::rejected("This coupon has expired.");
        }
        if let Some(limit) = coupon.total_usage_limit {
            if coupon.times_used >= limit {
                return CouponEvaluation::rejected("This coupon has been fully redeemed.");
            }
        }
        if coupon.is_wheel_coupon
            && Self::effective_daily_usage(coupon, now.date_naive()) >= coupon.daily_global_limit
        {
            return CouponEvaluation::rejected("Today's limit for this reward is over.");
        }
        if order_total < coupon.min_order_value {
            return CouponEvaluation {
                valid: false,
                reason: Some(format!(
                    "Minimum order value for this coupon is ₹{}.",
                    coupon.min_order_value
                )),
                discount: Decimal::ZERO,
            };
        }

        let discount = match coupon.coupon_type {
            CouponType::Flat => coupon.discount_value,
            CouponType::Percentage => {
                let raw = coupon.discount_value / Decimal::from(100) * order_total;
                match coupon.max_discount_amount {
                    Some(cap) => raw.min(cap),
                    None => raw,
                }
            }
        };

        // A discount can never exceed what is being paid.
        CouponEvaluation::accepted(discount.min(order_total))
    }

    /// Wheel-draw eligibility: the checkout rule set minus the minimum
    /// order value, restricted to wheel-mode coupons.
    pub fn wheel_eligible(coupon: &coupon::Model, now: DateTime<Utc>) -> bool {
        coupon.is_wheel_coupon
            && coupon.active
            && now >= coupon.valid_from
            && now <= coupon.valid_until
            && coupon
                .total_usage_limit
                .map_or(true, |limit| coupon.times_used < limit)
            && Self::effective_daily_usage(coupon, now.date_naive()) < coupon.daily_global_limit
    }

    /// Case-insensitive coupon lookup.
    pub async fn find_by_code<C: ConnectionTrait>(
        &self,
        conn: &C,
        code: &str,
    ) -> Result<Option<coupon::Model>, ServiceError> {
        coupon::Entity::find()
            .filter(
                Expr::expr(Func::lower(Expr::col((
                    coupon::Entity,
                    coupon::Column::Code,
                ))))
                .eq(code.to_lowercase()),
            )
            .one(conn)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Client-facing preview of a coupon against a cart total. Not
    /// authoritative; the order transaction re-evaluates.
    #[instrument(skip(self, request), fields(code = %request.code))]
    pub async fn preview(
        &self,
        request: ApplyCouponRequest,
        now: DateTime<Utc>,
    ) -> Result<CouponPreviewResponse, ServiceError> {
        let Some(coupon) = self.find_by_code(&*self.db, &request.code).await? else {
            return Ok(CouponPreviewResponse {
                success: false,
                message: "Invalid coupon code.".to_string(),
                discount_amount: Decimal::ZERO,
                final_total: request.cart_total,
                coupon_code: None,
            });
        };

        let evaluation = Self::evaluate(&coupon, request.cart_total, now);
        if !evaluation.valid {
            return Ok(CouponPreviewResponse {
                success: false,
                message: evaluation
                    .reason
                    .unwrap_or_else(|| "Coupon cannot be applied.".to_string()),
                discount_amount: Decimal::ZERO,
                final_total: request.cart_total,
                coupon_code: None,
            });
        }

        let final_total = (request.cart_total - evaluation.discount).max(Decimal::ZERO);
        Ok(CouponPreviewResponse {
            success: true,
            message: "Coupon applied successfully!".to_string(),
            discount_amount: evaluation.discount,
            final_total,
            coupon_code: Some(coupon.code),
        })
    }

    /// Number of orders this user has already redeemed the coupon on.
    pub async fn user_redemptions<C: ConnectionTrait>(
        &self,
        conn: &C,
        coupon_id: i64,
        user_id: i64,
    ) -> Result<u64, ServiceError> {
        use crate::entities::order;
        use sea_orm::PaginatorTrait;

        order::Entity::find()
            .filter(order::Column::CouponId.eq(coupon_id))
            .filter(order::Column::UserId.eq(user_id))
            .count(conn)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Atomically claims one lifetime redemption. Returns false when the
    /// usage cap was hit by a concurrent checkout first.
    pub async fn claim_redemption<C: ConnectionTrait>(
        &self,
        conn: &C,
        coupon_id: i64,
    ) -> Result<bool, ServiceError> {
        let result = coupon::Entity::update_many()
            .col_expr(
                coupon::Column::TimesUsed,
                Expr::col(coupon::Column::TimesUsed).add(1),
            )
            .filter(coupon::Column::Id.eq(coupon_id))
            .filter(
                Condition::any()
                    .add(coupon::Column::TotalUsageLimit.is_null())
                    .add(
                        Expr::col(coupon::Column::TimesUsed)
                            .lt(Expr::col(coupon::Column::TotalUsageLimit)),
                    ),
            )
            .exec(conn)
            .await?;

        Ok(result.rows_affected == 1)
    }

    /// Wheel slices currently worth showing: eligible wheel coupons with
    /// daily budget left.
    pub async fn wheel_items(&self, now: DateTime<Utc>) -> Result<Vec<WheelItem>, ServiceError> {
        let coupons = coupon::Entity::find()
            .filter(coupon::Column::IsWheelCoupon.eq(true))
            .filter(coupon::Column::Active.eq(true))
            .filter(coupon::Column::ValidFrom.lte(now))
            .filter(coupon::Column::ValidUntil.gte(now))
            .all(&*self.db)
            .await?;

        Ok(coupons
            .into_iter()
            .filter(|cp| Self::effective_daily_usage(cp, now.date_naive()) < cp.daily_global_limit)
            .map(|cp| WheelItem {
                id: cp.id,
                label: cp.wheel_display(),
                color: cp.wheel_color,
            })
            .collect())
    }

    /// Draws the wheel for an order, exactly once. Replays return the
    /// recorded outcome instead of drawing again.
    #[instrument(skip(self), fields(order_ref = %order_ref))]
    pub async fn spin(
        &self,
        order_ref: &str,
        now: DateTime<Utc>,
    ) -> Result<SpinResult, ServiceError> {
        if order_ref.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "order_id is required".to_string(),
            ));
        }

        if let Some(prior) = self.recorded_outcome(order_ref).await? {
            return Ok(prior);
        }

        let txn = self.db.begin().await?;
        let today = now.date_naive();

        let eligible: Vec<coupon::Model> = coupon::Entity::find()
            .filter(coupon::Column::IsWheelCoupon.eq(true))
            .filter(coupon::Column::Active.eq(true))
            .filter(coupon::Column::ValidFrom.lte(now))
            .filter(coupon::Column::ValidUntil.gte(now))
            .all(&txn)
            .await?
            .into_iter()
            .filter(|cp| Self::wheel_eligible(cp, now))
            .collect();

        if eligible.is_empty() {
            txn.rollback().await?;
            return Ok(SpinResult {
                success: false,
                coupon_code: None,
                message: "All of today's rewards are gone. Try again tomorrow!".to_string(),
                discount_text: None,
                already_spun: false,
            });
        }

        let weights: Vec<i32> = eligible.iter().map(|cp| cp.win_probability).collect();
        let index = weighted_pick(&weights, &mut rand::thread_rng());
        let winner = eligible[index].clone();

        let usage = wheel_usage::ActiveModel {
            order_ref: Set(order_ref.to_string()),
            coupon_id: Set(winner.id),
            created_at: Set(now),
            ..Default::default()
        };

        if let Err(e) = usage.insert(&txn).await {
            txn.rollback().await?;
            // A racing retry won the insert; hand back its outcome.
            if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                warn!(order_ref = %order_ref, "Concurrent spin detected; returning recorded outcome");
                if let Some(prior) = self.recorded_outcome(order_ref).await? {
                    return Ok(prior);
                }
            }
            return Err(ServiceError::DatabaseError(e));
        }

        let effective = Self::effective_daily_usage(&winner, today);
        let mut active: coupon::ActiveModel = winner.clone().into();
        active.today_usage_count = Set(effective + 1);
        active.last_used_date = Set(Some(today));
        active.update(&txn).await?;

        txn.commit().await?;

        info!(order_ref = %order_ref, coupon_id = winner.id, "Wheel draw recorded");
        self.event_sender
            .send(Event::WheelSpun {
                order_ref: order_ref.to_string(),
                coupon_id: winner.id,
            })
            .await;

        let label = winner.wheel_display();
        Ok(SpinResult {
            success: true,
            coupon_code: Some(winner.code),
            message: format!("Congratulations! You won {}!", label),
            discount_text: Some(label),
            already_spun: false,
        })
    }

    async fn recorded_outcome(&self, order_ref: &str) -> Result<Option<SpinResult>, ServiceError> {
        let existing = wheel_usage::Entity::find()
            .filter(wheel_usage::Column::OrderRef.eq(order_ref))
            .find_also_related(coupon::Entity)
            .one(&*self.db)
            .await?;

        let Some((_, Some(won))) = existing else {
            return Ok(None);
        };

        Ok(Some(SpinResult {
            success: true,
            coupon_code: Some(won.code.clone()),
            message: "You have already won a reward on this order!".to_string(),
            discount_text: Some(won.wheel_display()),
            already_spun: true,
        }))
    }
}

/// Weighted index pick; an all-zero weight set degrades to a uniform draw.
fn weighted_pick<R: Rng + ?Sized>(weights: &[i32], rng: &mut R) -> usize {
    let clamped: Vec<u32> = weights.iter().map(|w| (*w).max(0) as u32).collect();
    if clamped.iter().all(|w| *w == 0) {
        return rng.gen_range(0..weights.len());
    }
    let dist = WeightedIndex::new(&clamped).expect("non-empty positive weights");
    dist.sample(rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rust_decimal_macros::dec;

    fn base_coupon() -> coupon::Model {
        let now = Utc::now();
        coupon::Model {
            id: 1,
            code: "WELCOME100".to_string(),
            description: None,
            coupon_type: CouponType::Flat,
            discount_value: dec!(100),
            max_discount_amount: None,
            min_order_value: dec!(0),
            valid_from: now - Duration::days(1),
            valid_until: now + Duration::days(30),
            active: true,
            limit_per_user: 1,
            total_usage_limit: None,
            times_used: 0,
            is_wheel_coupon: false,
            wheel_label: None,
            wheel_color: "#8B3E48".to_string(),
            win_probability: 50,
            daily_global_limit: 10,
            last_used_date: None,
            today_usage_count: 0,
        }
    }

    #[test]
    fn flat_discount_is_independent_of_total() {
        let coupon = base_coupon();
        let now = Utc::now();
        assert_eq!(
            CouponService::evaluate(&coupon, dec!(500), now).discount,
            dec!(100)
        );
        assert_eq!(
            CouponService::evaluate(&coupon, dec!(5000), now).discount,
            dec!(100)
        );
    }

    #[test]
    fn percentage_discount_respects_cap() {
        let mut coupon = base_coupon();
        coupon.coupon_type = CouponType::Percentage;
        coupon.discount_value = dec!(10);
        coupon.max_discount_amount = Some(dec!(150));

        let now = Utc::now();
        // 10% of 1000 = 100, under the cap
        assert_eq!(
            CouponService::evaluate(&coupon, dec!(1000), now).discount,
            dec!(100)
        );
        // 10% of 5000 = 500, clamped to 150
        assert_eq!(
            CouponService::evaluate(&coupon, dec!(5000), now).discount,
            dec!(150)
        );
    }

    #[test]
    fn discount_never_exceeds_order_total() {
        let mut coupon = base_coupon();
        coupon.discount_value = dec!(500);

        let result = CouponService::evaluate(&coupon, dec!(200), Utc::now());
        assert!(result.valid);
        assert_eq!(result.discount, dec!(200));
    }

    #[test]
    fn expired_coupon_has_specific_reason() {
        let mut coupon = base_coupon();
        coupon.valid_until = Utc::now() - Duration::days(1);

        let result = CouponService::evaluate(&coupon, dec!(1000), Utc::now());
        assert!(!result.valid);
        assert_eq!(result.reason.as_deref(), Some("This coupon has expired."));
    }

    #[test]
    fn inactive_and_below_minimum_rejected() {
        let now = Utc::now();

        let mut inactive = base_coupon();
        inactive.active = false;
        assert!(!CouponService::evaluate(&inactive, dec!(1000), now).valid);

        let mut min = base_coupon();
        min.min_order_value = dec!(999);
        let result = CouponService::evaluate(&min, dec!(500), now);
        assert!(!result.valid);
        assert!(result.reason.unwrap().contains("999"));
    }

    #[test]
    fn lifetime_cap_rejected_once_exhausted() {
        let mut coupon = base_coupon();
        coupon.total_usage_limit = Some(5);
        coupon.times_used = 5;

        let result = CouponService::evaluate(&coupon, dec!(1000), Utc::now());
        assert!(!result.valid);
        assert_eq!(
            result.reason.as_deref(),
            Some("This coupon has been fully redeemed.")
        );
    }

    #[test]
    fn daily_usage_resets_on_a_new_day() {
        let today = Utc::now().date_naive();
        let mut coupon = base_coupon();
        coupon.is_wheel_coupon = true;
        coupon.daily_global_limit = 3;
        coupon.today_usage_count = 3;
        coupon.last_used_date = Some(today - Duration::days(1));

        // Stale counter reads as zero, so the coupon is usable again.
        assert_eq!(CouponService::effective_daily_usage(&coupon, today), 0);
        assert!(CouponService::evaluate(&coupon, dec!(1000), Utc::now()).valid);

        // Same-day counter is honored.
        coupon.last_used_date = Some(today);
        assert_eq!(CouponService::effective_daily_usage(&coupon, today), 3);
        assert!(!CouponService::evaluate(&coupon, dec!(1000), Utc::now()).valid);
    }

    #[test]
    fn preview_and_transaction_inputs_are_deterministic() {
        let coupon = base_coupon();
        let now = Utc::now();
        let a = CouponService::evaluate(&coupon, dec!(1234.56), now);
        let b = CouponService::evaluate(&coupon, dec!(1234.56), now);
        assert_eq!(a, b);
    }

    #[test]
    fn weighted_pick_favors_heavier_slices() {
        let mut rng = StdRng::seed_from_u64(7);
        let weights = [90, 5, 5];
        let mut counts = [0usize; 3];
        for _ in 0..1000 {
            counts[weighted_pick(&weights, &mut rng)] += 1;
        }
        assert!(counts[0] > counts[1] + counts[2]);
    }

    #[test]
    fn weighted_pick_handles_all_zero_weights() {
        let mut rng = StdRng::seed_from_u64(7);
        let weights = [0, 0, 0];
        let index = weighted_pick(&weights, &mut rng);
        assert!(index < 3);
    }
}
