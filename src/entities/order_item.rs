use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Immutable snapshot of one purchased unit. `size_variant_id` is nullable
/// so order history survives catalog deletions.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub order_id: i64,
    pub size_variant_id: Option<i64>,
    pub product_name: String,
    /// Unit price as quoted at checkout, not re-read from the catalog.
    pub price: Decimal,
    pub quantity: i32,
    pub size: String,
    pub color: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
    #[sea_orm(
        belongs_to = "super::size_variant::Entity",
        from = "Column::SizeVariantId",
        to = "super::size_variant::Column::Id"
    )]
    SizeVariant,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::size_variant::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SizeVariant.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
