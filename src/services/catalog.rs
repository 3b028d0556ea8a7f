use crate::{
    db::DbPool,
    entities::{
        announcement, banner, category, product, product_image, product_variant, size_variant,
    },
    errors::ServiceError,
    services::inventory::{derive_sku, ONE_SIZE},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, ModelTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ProductQuery {
    /// Category slug or name, matched case-insensitively.
    pub category: Option<String>,
    /// Substring match on the product name.
    pub search: Option<String>,
    /// One of `newest`, `price_low`, `price_high`.
    pub sort: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SizeDetail {
    pub id: i64,
    pub size: String,
    pub stock: i32,
    /// Effective selling price: base price plus the size adjustment.
    pub price: Decimal,
    pub sku: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VariantDetail {
    pub id: i64,
    pub color_name: String,
    pub color_code: String,
    pub thumbnail: String,
    pub video: Option<String>,
    pub stock: i32,
    pub images: Vec<String>,
    pub sizes: Vec<SizeDetail>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductDetail {
    pub id: i64,
    pub name: String,
    pub category_name: String,
    pub description: String,
    pub fabric: String,
    pub base_price: Decimal,
    pub original_price: Option<Decimal>,
    pub has_size: bool,
    pub variants: Vec<VariantDetail>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CategoryOut {
    pub id: i64,
    pub name: String,
    pub has_size: bool,
    pub slug: String,
    pub image: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BannerOut {
    pub id: i64,
    pub title: Option<String>,
    pub image: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AnnouncementOut {
    pub text: String,
    pub link: Option<String>,
    pub background_color: String,
    pub text_color: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewProduct {
    pub category_id: i64,
    pub name: String,
    pub description: String,
    pub fabric: Option<String>,
    pub base_price: Decimal,
    pub original_price: Option<Decimal>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewVariant {
    pub color_name: String,
    pub color_code: String,
    pub thumbnail_url: String,
    pub video_url: Option<String>,
    pub stock: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewSizeVariant {
    pub size: Option<String>,
    pub stock: i32,
    pub price_adjustment: Decimal,
    pub sku: Option<String>,
}

/// URL-safe slug from a category name.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// Catalog reads and the service-level write path used by seeding.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DbPool>,
}

impl CatalogService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        query: ProductQuery,
    ) -> Result<Vec<ProductDetail>, ServiceError> {
        let mut select = product::Entity::find().filter(product::Column::IsActive.eq(true));

        if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
            let needle = category.to_lowercase();
            let matching: Vec<i64> = category::Entity::find()
                .filter(
                    Condition::any()
                        .add(
                            Expr::expr(Func::lower(Expr::col((
                                category::Entity,
                                category::Column::Slug,
                            ))))
                            .eq(needle.clone()),
                        )
                        .add(
                            Expr::expr(Func::lower(Expr::col((
                                category::Entity,
                                category::Column::Name,
                            ))))
                            .eq(needle),
                        ),
                )
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|c| c.id)
                .collect();
            select = select.filter(product::Column::CategoryId.is_in(matching));
        }

        if let Some(search) = query.search.as_deref().filter(|s| !s.is_empty()) {
            select = select.filter(
                Expr::expr(Func::lower(Expr::col((
                    product::Entity,
                    product::Column::Name,
                ))))
                .like(format!("%{}%", search.to_lowercase())),
            );
        }

        select = match query.sort.as_deref() {
            Some("newest") => select.order_by_desc(product::Column::CreatedAt),
            Some("price_low") => select.order_by_asc(product::Column::BasePrice),
            Some("price_high") => select.order_by_desc(product::Column::BasePrice),
            _ => select.order_by_asc(product::Column::Id),
        };

        let products = select.all(&*self.db).await?;
        let categories: HashMap<i64, category::Model> = category::Entity::find()
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        let mut details = Vec::with_capacity(products.len());
        for p in products {
            details.push(self.serialize_product(p, &categories).await?);
        }
        Ok(details)
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: i64) -> Result<ProductDetail, ServiceError> {
        let product = product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let categories: HashMap<i64, category::Model> = category::Entity::find()
            .filter(category::Column::Id.eq(product.category_id))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        self.serialize_product(product, &categories).await
    }

    async fn serialize_product(
        &self,
        product: product::Model,
        categories: &HashMap<i64, category::Model>,
    ) -> Result<ProductDetail, ServiceError> {
        let variants = product
            .find_related(product_variant::Entity)
            .all(&*self.db)
            .await?;

        let mut variant_details = Vec::with_capacity(variants.len());
        for v in variants {
            let images = v
                .find_related(product_image::Entity)
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|img| img.image_url)
                .collect();

            let sizes = v
                .find_related(size_variant::Entity)
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|s| SizeDetail {
                    id: s.id,
                    size: s.size,
                    stock: s.stock,
                    price: product.base_price + s.price_adjustment,
                    sku: s.sku,
                })
                .collect();

            variant_details.push(VariantDetail {
                id: v.id,
                color_name: v.color_name,
                color_code: v.color_code,
                thumbnail: v.thumbnail_url,
                video: v.video_url,
                stock: v.stock,
                images,
                sizes,
            });
        }

        let category = categories.get(&product.category_id);
        Ok(ProductDetail {
            id: product.id,
            name: product.name,
            category_name: category
                .map(|c| c.name.clone())
                .unwrap_or_else(|| "Uncategorized".to_string()),
            description: product.description,
            fabric: product.fabric.unwrap_or_default(),
            base_price: product.base_price,
            original_price: product.original_price,
            has_size: category.map(|c| c.has_size).unwrap_or(false),
            variants: variant_details,
        })
    }

    pub async fn list_categories(&self) -> Result<Vec<CategoryOut>, ServiceError> {
        let categories = category::Entity::find().all(&*self.db).await?;
        Ok(categories
            .into_iter()
            .map(|c| CategoryOut {
                id: c.id,
                name: c.name,
                has_size: c.has_size,
                slug: c.slug,
                image: c.image_url.unwrap_or_default(),
            })
            .collect())
    }

    pub async fn list_banners(&self) -> Result<Vec<BannerOut>, ServiceError> {
        let banners = banner::Entity::find()
            .filter(banner::Column::IsActive.eq(true))
            .order_by_desc(banner::Column::Id)
            .all(&*self.db)
            .await?;
        Ok(banners
            .into_iter()
            .map(|b| BannerOut {
                id: b.id,
                title: b.title,
                image: b.image_url,
            })
            .collect())
    }

    pub async fn list_announcements(&self) -> Result<Vec<AnnouncementOut>, ServiceError> {
        let rows = announcement::Entity::find()
            .filter(announcement::Column::IsActive.eq(true))
            .all(&*self.db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|a| AnnouncementOut {
                text: a.text,
                link: a.link,
                background_color: a.background_color,
                text_color: a.text_color,
            })
            .collect())
    }

    pub async fn create_category(
        &self,
        name: &str,
        has_size: bool,
        image_url: Option<String>,
    ) -> Result<category::Model, ServiceError> {
        let created = category::ActiveModel {
            name: Set(name.to_string()),
            has_size: Set(has_size),
            slug: Set(slugify(name)),
            image_url: Set(image_url),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(category_id = created.id, "Category created");
        Ok(created)
    }

    pub async fn create_product(&self, new: NewProduct) -> Result<product::Model, ServiceError> {
        category::Entity::find_by_id(new.category_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Category {} not found", new.category_id))
            })?;

        let created = product::ActiveModel {
            category_id: Set(new.category_id),
            name: Set(new.name),
            description: Set(new.description),
            fabric: Set(new.fabric),
            base_price: Set(new.base_price),
            original_price: Set(new.original_price),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(product_id = created.id, "Product created");
        Ok(created)
    }

    pub async fn add_variant(
        &self,
        product_id: i64,
        new: NewVariant,
    ) -> Result<product_variant::Model, ServiceError> {
        product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let created = product_variant::ActiveModel {
            product_id: Set(product_id),
            color_name: Set(new.color_name),
            color_code: Set(new.color_code),
            thumbnail_url: Set(new.thumbnail_url),
            video_url: Set(new.video_url),
            stock: Set(new.stock),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        Ok(created)
    }

    /// Adds a purchasable unit. Every product must end up with at least one
    /// row here; one-size goods use the reserved `FREE` size.
    pub async fn add_size_variant(
        &self,
        variant_id: i64,
        new: NewSizeVariant,
    ) -> Result<size_variant::Model, ServiceError> {
        let variant = product_variant::Entity::find_by_id(variant_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Variant {} not found", variant_id)))?;

        let size = new
            .size
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| ONE_SIZE.to_string());
        let sku = new
            .sku
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| derive_sku(variant.product_id, variant.id, &size));

        let created = size_variant::ActiveModel {
            variant_id: Set(variant_id),
            size: Set(size),
            stock: Set(new.stock),
            price_adjustment: Set(new.price_adjustment),
            sku: Set(sku),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        Ok(created)
    }
}
