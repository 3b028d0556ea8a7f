use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(15))")]
pub enum CouponType {
    #[sea_orm(string_value = "FLAT")]
    Flat,
    #[sea_orm(string_value = "PERCENTAGE")]
    Percentage,
}

/// A discount rule, optionally exposed on the post-purchase spin wheel.
///
/// `times_used` / `total_usage_limit` cap lifetime checkout redemptions;
/// `today_usage_count` / `daily_global_limit` cap wheel wins per calendar
/// day. `today_usage_count` is meaningful only when `last_used_date` is the
/// current day; readers must go through
/// `CouponService::effective_daily_usage` rather than trusting the stored
/// value.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "coupons")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub code: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub coupon_type: CouponType,
    pub discount_value: Decimal,
    /// Cap for percentage coupons.
    pub max_discount_amount: Option<Decimal>,
    pub min_order_value: Decimal,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub active: bool,
    pub limit_per_user: i32,
    pub total_usage_limit: Option<i32>,
    pub times_used: i32,
    pub is_wheel_coupon: bool,
    pub wheel_label: Option<String>,
    pub wheel_color: String,
    /// Relative weight of this slice in the wheel draw, 0..=100.
    pub win_probability: i32,
    pub daily_global_limit: i32,
    pub last_used_date: Option<Date>,
    pub today_usage_count: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
    #[sea_orm(has_many = "super::wheel_usage::Entity")]
    WheelUsages,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl Related<super::wheel_usage::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WheelUsages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Label shown on a wheel slice, falling back to the coupon code.
    pub fn wheel_display(&self) -> String {
        self.wheel_label
            .clone()
            .filter(|label| !label.is_empty())
            .unwrap_or_else(|| self.code.clone())
    }
}
