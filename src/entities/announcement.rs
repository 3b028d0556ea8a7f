use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Ticker strip shown above the storefront header.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "announcements")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub text: String,
    pub link: Option<String>,
    pub is_active: bool,
    pub background_color: String,
    pub text_color: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
