//! Inventory unit resolution and stock mutation.
//!
//! Everything here runs inside the caller's transaction; the functions take
//! any `ConnectionTrait` so the order coordinator can pass its
//! `DatabaseTransaction` through.

use crate::{
    entities::{product, product_variant, size_variant},
    errors::ServiceError,
};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, JoinType, QueryFilter, QuerySelect, RelationTrait,
};
use serde::Deserialize;
use tracing::warn;
use utoipa::ToSchema;
use validator::Validate;

/// Reserved size marker for one-size goods (sarees, suits). Units with this
/// size keep their parent variant's master stock in lockstep.
pub const ONE_SIZE: &str = "FREE";

/// A cart line's inventory address. Different client call sites know
/// different amounts: a re-order flow carries the exact `size_id`, a
/// product page knows `variant_id` + size, a cart built from search only
/// has product, size and color.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LineItemRef {
    pub size_id: Option<i64>,
    pub variant_id: Option<i64>,
    pub product_id: Option<i64>,
    #[validate(length(min = 1, message = "Size is required"))]
    pub size: String,
    pub color: Option<String>,
}

/// A resolved unit together with its variant and product rows, so callers
/// can snapshot names and prices without re-querying.
#[derive(Debug, Clone)]
pub struct ResolvedUnit {
    pub unit: size_variant::Model,
    pub variant: product_variant::Model,
    pub product: product::Model,
}

impl ResolvedUnit {
    pub fn is_one_size(&self) -> bool {
        self.unit.size == ONE_SIZE
    }
}

/// SKU derived for a size variant: `productId-variantId-size`. Persisted and
/// customer-visible, so the format is load-bearing.
pub fn derive_sku(product_id: i64, variant_id: i64, size: &str) -> String {
    format!("{}-{}-{}", product_id, variant_id, size)
}

/// Maps a line item to exactly one sellable unit, first strategy with a key
/// present wins:
///
/// 1. explicit unit id;
/// 2. (variant id, size);
/// 3. (product id, size, color) as a filtered fallback.
pub async fn resolve_unit<C: ConnectionTrait>(
    conn: &C,
    line: &LineItemRef,
) -> Result<ResolvedUnit, ServiceError> {
    let unit = if let Some(size_id) = line.size_id {
        Some(
            size_variant::Entity::find_by_id(size_id)
                .one(conn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound("Selected product variant not found".to_string())
                })?,
        )
    } else if let Some(variant_id) = line.variant_id {
        Some(
            size_variant::Entity::find()
                .filter(size_variant::Column::VariantId.eq(variant_id))
                .filter(size_variant::Column::Size.eq(line.size.clone()))
                .one(conn)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound("Selected product variant not found".to_string())
                })?,
        )
    } else if let Some(product_id) = line.product_id {
        let mut query = size_variant::Entity::find()
            .join(JoinType::InnerJoin, size_variant::Relation::Variant.def())
            .filter(product_variant::Column::ProductId.eq(product_id))
            .filter(size_variant::Column::Size.eq(line.size.clone()));
        if let Some(color) = &line.color {
            query = query.filter(product_variant::Column::ColorName.eq(color.clone()));
        }
        query.one(conn).await?
    } else {
        return Err(ServiceError::ValidationError(
            "Line item carries no product reference".to_string(),
        ));
    };

    let Some(unit) = unit else {
        return Err(ServiceError::ValidationError(format!(
            "Product not found: {} - {}",
            line.color.as_deref().unwrap_or("Any color"),
            line.size
        )));
    };

    let variant = product_variant::Entity::find_by_id(unit.variant_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Product variant not found".to_string()))?;
    let product = product::Entity::find_by_id(variant.product_id)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound("Product not found".to_string()))?;

    Ok(ResolvedUnit {
        unit,
        variant,
        product,
    })
}

/// Decrements a unit's stock by `quantity`, guarded so two racing checkouts
/// cannot both take the last piece: the UPDATE only applies while
/// `stock >= quantity`, and an affected-row count of zero means the caller
/// lost the race (or the stock was short all along).
///
/// One-size units decrement the parent variant's master stock in the same
/// transaction to honor the lockstep invariant.
pub async fn decrement_stock<C: ConnectionTrait>(
    conn: &C,
    resolved: &ResolvedUnit,
    quantity: i32,
) -> Result<(), ServiceError> {
    let applied = size_variant::Entity::update_many()
        .col_expr(
            size_variant::Column::Stock,
            Expr::col(size_variant::Column::Stock).sub(quantity),
        )
        .filter(size_variant::Column::Id.eq(resolved.unit.id))
        .filter(size_variant::Column::Stock.gte(quantity))
        .exec(conn)
        .await?;

    if applied.rows_affected == 0 {
        return Err(ServiceError::InsufficientStock(format!(
            "{} ({}) is out of stock",
            resolved.product.name, resolved.unit.size
        )));
    }

    if resolved.is_one_size() {
        product_variant::Entity::update_many()
            .col_expr(
                product_variant::Column::Stock,
                Expr::col(product_variant::Column::Stock).sub(quantity),
            )
            .filter(product_variant::Column::Id.eq(resolved.variant.id))
            .exec(conn)
            .await?;
    }

    Ok(())
}

/// Credits stock back for a returned line. A unit that has since been
/// deleted from the catalog is skipped; order history outlives the catalog.
pub async fn restock_unit<C: ConnectionTrait>(
    conn: &C,
    size_variant_id: i64,
    quantity: i32,
) -> Result<(), ServiceError> {
    let Some(unit) = size_variant::Entity::find_by_id(size_variant_id)
        .one(conn)
        .await?
    else {
        warn!(size_variant_id, "Restock skipped: unit no longer exists");
        return Ok(());
    };

    size_variant::Entity::update_many()
        .col_expr(
            size_variant::Column::Stock,
            Expr::col(size_variant::Column::Stock).add(quantity),
        )
        .filter(size_variant::Column::Id.eq(unit.id))
        .exec(conn)
        .await?;

    if unit.size == ONE_SIZE {
        product_variant::Entity::update_many()
            .col_expr(
                product_variant::Column::Stock,
                Expr::col(product_variant::Column::Stock).add(quantity),
            )
            .filter(product_variant::Column::Id.eq(unit.variant_id))
            .exec(conn)
            .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sku_embeds_product_variant_and_size() {
        assert_eq!(derive_sku(12, 34, "XL"), "12-34-XL");
        assert_eq!(derive_sku(7, 3, ONE_SIZE), "7-3-FREE");
    }

    #[test]
    fn one_size_marker_is_free() {
        assert_eq!(ONE_SIZE, "FREE");
    }
}
