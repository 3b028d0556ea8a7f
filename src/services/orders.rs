use crate::{
    db::DbPool,
    entities::{coupon, order, order_item, user},
    errors::ServiceError,
    events::{Event, EventSender},
    services::coupons::CouponService,
    services::customers::CustomerService,
    services::inventory::{self, LineItemRef},
};
use chrono::{DateTime, Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use validator::{Validate, ValidationError};

static PINCODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{6}$").expect("valid regex"));

/// Order lifecycle. Stored as its snake_case string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Shipped,
    Delivered,
    ReturnRequested,
    Returned,
    Cancelled,
}

fn validate_payment_method(value: &str) -> Result<(), ValidationError> {
    match value {
        "upi" | "card" | "cod" => Ok(()),
        _ => {
            let mut err = ValidationError::new("payment_method");
            err.message = Some("Payment method must be one of: upi, card, cod".into());
            Err(err)
        }
    }
}

/// One cart line as submitted at checkout.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, ToSchema)]
pub struct OrderLineRequest {
    pub product_id: Option<i64>,
    pub variant_id: Option<i64>,
    pub size_id: Option<i64>,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    /// Client-quoted unit price; non-positive values fall back to the
    /// catalog base price.
    pub price: Decimal,
    #[validate(length(min = 1, message = "Size is required"))]
    pub size: String,
    pub color: Option<String>,
}

impl OrderLineRequest {
    fn line_ref(&self) -> LineItemRef {
        LineItemRef {
            size_id: self.size_id,
            variant_id: self.variant_id,
            product_id: self.product_id,
            size: self.size.clone(),
            color: self.color.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,
    #[validate(length(min = 10, message = "Enter a valid phone number"))]
    pub phone_number: String,
    #[validate(email(message = "Enter a valid email address"))]
    pub email: Option<String>,
    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,
    #[validate(regex(path = "PINCODE_RE", message = "Pincode must be 6 digits"))]
    pub pincode: String,
    #[validate(custom = "validate_payment_method")]
    pub payment_method: String,
    pub total_amount: Decimal,
    #[serde(default)]
    pub shipping_charges: Decimal,
    pub coupon_code: Option<String>,
    #[validate(length(min = 1, message = "Cart is empty"))]
    #[validate]
    pub items: Vec<OrderLineRequest>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreateOrderResponse {
    pub success: bool,
    pub order_id: i64,
    pub invoice_no: String,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub product_name: String,
    pub price: Decimal,
    pub quantity: i32,
    pub size: String,
    pub color: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: i64,
    pub full_name: String,
    pub phone_number: String,
    pub address: String,
    pub pincode: String,
    pub payment_method: String,
    pub total_amount: Decimal,
    pub shipping_charges: Decimal,
    pub discount_amount: Decimal,
    pub applied_coupon_code: Option<String>,
    pub status: String,
    pub invoice_no: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub items: Vec<OrderItemResponse>,
}

/// Customer-facing invoice number: `<prefix>-<year>-<4-digit order id>`.
pub fn format_invoice(prefix: &str, year: i32, order_id: i64) -> String {
    format!("{}-{}-{:04}", prefix, year, order_id)
}

#[derive(Clone)]
pub struct OrderServiceConfig {
    pub invoice_prefix: String,
    pub enforce_coupon_user_limit: bool,
}

/// Order placement, history and lifecycle transitions.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    customers: CustomerService,
    coupons: CouponService,
    event_sender: Arc<EventSender>,
    config: OrderServiceConfig,
}

impl OrderService {
    pub fn new(
        db: Arc<DbPool>,
        customers: CustomerService,
        coupons: CouponService,
        event_sender: Arc<EventSender>,
        config: OrderServiceConfig,
    ) -> Self {
        Self {
            db,
            customers,
            coupons,
            event_sender,
            config,
        }
    }

    /// Places an order as one atomic unit of work: every stock decrement,
    /// the coupon redemption, the invoice assignment and the profile
    /// back-fill either all land or none do.
    ///
    /// Guest and registered checkouts share this path; a registered user is
    /// attached purely by phone-number match, no account is created here.
    #[instrument(skip(self, request), fields(phone = %request.phone_number, lines = request.items.len()))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<CreateOrderResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let phone = self
            .customers
            .canonicalize(&request.phone_number)
            .ok_or_else(|| {
                ServiceError::ValidationError("Enter a valid 10-digit phone number".to_string())
            })?;

        let now = Utc::now();
        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start checkout transaction");
            ServiceError::DatabaseError(e)
        })?;

        let buyer = user::Entity::find()
            .filter(user::Column::PhoneNumber.eq(phone.clone()))
            .one(&txn)
            .await?;

        let (discount_amount, coupon_id) = self
            .settle_coupon(&txn, &request, buyer.as_ref(), now)
            .await?;

        let inserted = order::ActiveModel {
            user_id: Set(buyer.as_ref().map(|u| u.id)),
            full_name: Set(request.full_name.clone()),
            phone_number: Set(phone),
            email: Set(request.email.clone().filter(|e| !e.is_empty())),
            address: Set(request.address.clone()),
            pincode: Set(request.pincode.clone()),
            total_amount: Set(request.total_amount),
            discount_amount: Set(discount_amount),
            shipping_charges: Set(request.shipping_charges),
            payment_method: Set(request.payment_method.clone()),
            status: Set(OrderStatus::Pending.to_string()),
            coupon_id: Set(coupon_id),
            invoice_no: Set(None),
            created_at: Set(now),
            updated_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        // The invoice embeds the freshly assigned numeric id, so it has to
        // be a second write to the same row.
        let invoice_no = format_invoice(&self.config.invoice_prefix, now.year(), inserted.id);
        let order_id = inserted.id;
        let mut pending: order::ActiveModel = inserted.into();
        pending.invoice_no = Set(Some(invoice_no.clone()));
        pending.update(&txn).await?;

        for line in &request.items {
            let resolved = inventory::resolve_unit(&txn, &line.line_ref()).await?;

            if resolved.unit.stock < line.quantity {
                return Err(ServiceError::InsufficientStock(format!(
                    "{} ({}) is out of stock",
                    resolved.product.name, resolved.unit.size
                )));
            }

            // Snapshot the quoted price so later catalog edits cannot
            // rewrite history; a missing quote falls back to the catalog.
            let unit_price = if line.price > Decimal::ZERO {
                line.price
            } else {
                resolved.product.base_price
            };

            order_item::ActiveModel {
                order_id: Set(order_id),
                size_variant_id: Set(Some(resolved.unit.id)),
                product_name: Set(resolved.product.name.clone()),
                price: Set(unit_price),
                quantity: Set(line.quantity),
                size: Set(line.size.clone()),
                color: Set(line
                    .color
                    .clone()
                    .filter(|c| !c.is_empty())
                    .or_else(|| Some(resolved.variant.color_name.clone()))),
                ..Default::default()
            }
            .insert(&txn)
            .await?;

            inventory::decrement_stock(&txn, &resolved, line.quantity).await?;
        }

        if let Some(buyer) = buyer {
            self.customers
                .backfill_from_checkout(
                    &txn,
                    buyer,
                    &request.full_name,
                    &request.address,
                    &request.pincode,
                    request.email.as_deref(),
                )
                .await?;
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id, "Failed to commit checkout transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id, invoice_no = %invoice_no, "Order placed");
        self.event_sender
            .send(Event::OrderCreated {
                order_id,
                invoice_no: invoice_no.clone(),
            })
            .await;
        if let Some(coupon_id) = coupon_id {
            self.event_sender
                .send(Event::CouponRedeemed {
                    coupon_id,
                    order_id,
                })
                .await;
        }

        Ok(CreateOrderResponse {
            success: true,
            order_id,
            invoice_no,
            message: "Order placed successfully".to_string(),
        })
    }

    /// Re-validates a supplied promo code inside the transaction and claims
    /// a redemption. An unknown, expired or otherwise unusable code is a
    /// zero discount, never a checkout failure.
    async fn settle_coupon<C: ConnectionTrait>(
        &self,
        conn: &C,
        request: &CreateOrderRequest,
        buyer: Option<&user::Model>,
        now: DateTime<Utc>,
    ) -> Result<(Decimal, Option<i64>), ServiceError> {
        let Some(code) = request
            .coupon_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
        else {
            return Ok((Decimal::ZERO, None));
        };

        let Some(coupon) = self.coupons.find_by_code(conn, code).await? else {
            info!(code = %code, "Unknown coupon code ignored at checkout");
            return Ok((Decimal::ZERO, None));
        };

        let evaluation = CouponService::evaluate(&coupon, request.total_amount, now);
        if !evaluation.valid {
            info!(
                code = %code,
                reason = evaluation.reason.as_deref().unwrap_or("invalid"),
                "Coupon not applied at checkout"
            );
            return Ok((Decimal::ZERO, None));
        }

        if self.config.enforce_coupon_user_limit {
            if let Some(buyer) = buyer {
                let used = self
                    .coupons
                    .user_redemptions(conn, coupon.id, buyer.id)
                    .await?;
                if used >= coupon.limit_per_user as u64 {
                    info!(code = %code, user_id = buyer.id, "Per-user coupon limit reached");
                    return Ok((Decimal::ZERO, None));
                }
            }
        }

        // The lifetime counter is claimed with a guarded increment so a
        // concurrent checkout cannot push it past the cap.
        if !self.coupons.claim_redemption(conn, coupon.id).await? {
            info!(code = %code, "Coupon usage cap hit during checkout");
            return Ok((Decimal::ZERO, None));
        }

        Ok((evaluation.discount, Some(coupon.id)))
    }

    /// Orders belonging to the authenticated user, by account link or by
    /// canonical phone match, newest first.
    #[instrument(skip(self, user), fields(user_id = user.id))]
    pub async fn my_orders(&self, user: &user::Model) -> Result<Vec<OrderResponse>, ServiceError> {
        let mut condition = Condition::any().add(order::Column::UserId.eq(user.id));
        if let Some(phone) = user
            .phone_number
            .as_deref()
            .and_then(|p| self.customers.canonicalize(p))
        {
            condition = condition.add(order::Column::PhoneNumber.eq(phone));
        }

        let orders = order::Entity::find()
            .filter(condition)
            .order_by_desc(order::Column::CreatedAt)
            .find_with_related(order_item::Entity)
            .all(&*self.db)
            .await?;

        let coupon_codes = self
            .coupon_codes_for(orders.iter().map(|(o, _)| o))
            .await?;

        Ok(orders
            .into_iter()
            .map(|(order, items)| Self::to_response(order, items, &coupon_codes))
            .collect())
    }

    pub async fn get_order(&self, order_id: i64) -> Result<OrderResponse, ServiceError> {
        let order = order::Entity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let items = order
            .find_related(order_item::Entity)
            .all(&*self.db)
            .await?;
        let coupon_codes = self.coupon_codes_for(std::iter::once(&order)).await?;

        Ok(Self::to_response(order, items, &coupon_codes))
    }

    /// Applies a status change through the explicit transition table. The
    /// restock side effect fires only on a strict transition into
    /// `returned` — re-saving an already-returned order restores nothing.
    #[instrument(skip(self), fields(order_id))]
    pub async fn update_order_status(
        &self,
        order_id: i64,
        new_status: &str,
    ) -> Result<OrderResponse, ServiceError> {
        let new_status = OrderStatus::from_str(new_status)
            .map_err(|_| ServiceError::InvalidStatus(format!("Unknown order status: {new_status}")))?;

        let txn = self.db.begin().await?;

        let order = order::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        let old_status_raw = order.status.clone();
        let old_status = OrderStatus::from_str(&old_status_raw).map_err(|_| {
            ServiceError::InvalidStatus(format!("Stored status is corrupt: {old_status_raw}"))
        })?;

        let mut restored: Vec<(i64, i32)> = Vec::new();
        if new_status == OrderStatus::Returned && old_status != OrderStatus::Returned {
            let items = order
                .find_related(order_item::Entity)
                .all(&txn)
                .await?;
            for item in items {
                if let Some(size_variant_id) = item.size_variant_id {
                    inventory::restock_unit(&txn, size_variant_id, item.quantity).await?;
                    restored.push((size_variant_id, item.quantity));
                }
            }
        }

        let mut active: order::ActiveModel = order.into();
        active.status = Set(new_status.to_string());
        active.updated_at = Set(Some(Utc::now()));
        let updated = active.update(&txn).await?;

        txn.commit().await?;

        info!(
            order_id,
            old_status = %old_status_raw,
            new_status = %new_status,
            "Order status updated"
        );
        self.event_sender
            .send(Event::OrderStatusChanged {
                order_id,
                old_status: old_status_raw,
                new_status: new_status.to_string(),
            })
            .await;
        for (size_variant_id, quantity) in restored {
            self.event_sender
                .send(Event::StockRestored {
                    order_id,
                    size_variant_id,
                    quantity,
                })
                .await;
        }

        let items = updated
            .find_related(order_item::Entity)
            .all(&*self.db)
            .await?;
        let coupon_codes = self.coupon_codes_for(std::iter::once(&updated)).await?;
        Ok(Self::to_response(updated, items, &coupon_codes))
    }

    async fn coupon_codes_for<'a, I>(
        &self,
        orders: I,
    ) -> Result<HashMap<i64, String>, ServiceError>
    where
        I: Iterator<Item = &'a order::Model>,
    {
        let ids: Vec<i64> = orders.filter_map(|o| o.coupon_id).collect();
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let coupons = coupon::Entity::find()
            .filter(coupon::Column::Id.is_in(ids))
            .all(&*self.db)
            .await?;

        Ok(coupons.into_iter().map(|c| (c.id, c.code)).collect())
    }

    fn to_response(
        order: order::Model,
        items: Vec<order_item::Model>,
        coupon_codes: &HashMap<i64, String>,
    ) -> OrderResponse {
        let applied_coupon_code = order
            .coupon_id
            .and_then(|id| coupon_codes.get(&id).cloned());

        OrderResponse {
            id: order.id,
            full_name: order.full_name,
            phone_number: order.phone_number,
            address: order.address,
            pincode: order.pincode,
            payment_method: order.payment_method,
            total_amount: order.total_amount,
            shipping_charges: order.shipping_charges,
            discount_amount: order.discount_amount,
            applied_coupon_code,
            status: order.status,
            invoice_no: order.invoice_no,
            created_at: order.created_at,
            updated_at: order.updated_at,
            items: items
                .into_iter()
                .map(|item| OrderItemResponse {
                    product_name: item.product_name,
                    price: item.price,
                    quantity: item.quantity,
                    size: item.size,
                    color: item.color,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoice_number_embeds_year_and_padded_id() {
        assert_eq!(format_invoice("NC", 2025, 7), "NC-2025-0007");
        assert_eq!(format_invoice("NC", 2025, 123), "NC-2025-0123");
        // Ids past four digits keep their full width.
        assert_eq!(format_invoice("NC", 2026, 54321), "NC-2026-54321");
    }

    #[test]
    fn order_status_round_trips_snake_case() {
        assert_eq!(OrderStatus::ReturnRequested.to_string(), "return_requested");
        assert_eq!(
            OrderStatus::from_str("return_requested").unwrap(),
            OrderStatus::ReturnRequested
        );
        assert_eq!(OrderStatus::Returned.to_string(), "returned");
        assert!(OrderStatus::from_str("refunded_maybe").is_err());
    }

    #[test]
    fn payment_method_whitelist() {
        assert!(validate_payment_method("upi").is_ok());
        assert!(validate_payment_method("card").is_ok());
        assert!(validate_payment_method("cod").is_ok());
        assert!(validate_payment_method("crypto").is_err());
    }
}
