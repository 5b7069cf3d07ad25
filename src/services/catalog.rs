//! Catalog service: category and product CRUD plus the bulk reload that
//! feeds raw listings through the variant grouper.
//!
//! Product ids are always the deterministic group key, whether a product
//! arrives via bulk reload or the admin form, so both paths land identical
//! listings on the same row.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};
use utoipa::ToSchema;
use validator::Validate;

use crate::catalog::grouper::{self, GroupedProduct, RawListing};
use crate::catalog::loader::CategoryRecord;
use crate::entities::category::{
    self, ActiveModel as CategoryActiveModel, Entity as CategoryEntity, Model as CategoryModel,
};
use crate::entities::product::{
    self, ActiveModel as ProductActiveModel, Entity as ProductEntity, Model as ProductModel,
    ProductStatus,
};
use crate::entities::product_variant::{
    self, ActiveModel as VariantActiveModel, Entity as VariantEntity, Model as VariantModel,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpsertCategoryRequest {
    /// Slug; derived from the name when omitted.
    pub id: Option<String>,
    #[validate(length(min = 1, message = "Category name is required"))]
    pub name: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VariantInput {
    #[validate(length(min = 1, message = "Quantity label is required"))]
    pub quantity_label: String,
    pub flavor: Option<String>,
    pub price: Decimal,
    pub mrp: Option<Decimal>,
    pub discount: Option<Decimal>,
    pub tax: Option<Decimal>,
    #[serde(default)]
    pub stock: i32,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[validate(length(min = 1, message = "Product name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Brand is required"))]
    pub brand: String,
    pub description: Option<String>,
    #[validate(length(min = 1, message = "Category is required"))]
    pub category_id: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub is_bestseller: bool,
    #[serde(default)]
    pub product_type: String,
    #[validate(length(min = 1, message = "At least one variant is required"))]
    pub variants: Vec<VariantInput>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<String>,
    pub image_urls: Option<Vec<String>>,
    pub is_bestseller: Option<bool>,
    pub status: Option<ProductStatus>,
    pub product_type: Option<String>,
    /// When present, replaces the product's variant set wholesale.
    pub variants: Option<Vec<VariantInput>>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub bestseller: Option<bool>,
    /// Substring match against name and brand.
    pub search: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductWithVariants {
    #[serde(flatten)]
    pub product: ProductModel,
    pub variants: Vec<VariantModel>,
}

/// Row counts written by a bulk reload.
#[derive(Debug, Clone, Copy, Serialize, ToSchema)]
pub struct ReloadSummary {
    pub categories: usize,
    pub products: usize,
    pub variants: usize,
    pub skipped_listings: usize,
}

#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<Arc<EventSender>>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    // ---- categories ----

    pub async fn list_categories(&self) -> Result<Vec<CategoryModel>, ServiceError> {
        Ok(CategoryEntity::find()
            .order_by_asc(category::Column::Name)
            .all(&*self.db)
            .await?)
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn upsert_category(
        &self,
        request: UpsertCategoryRequest,
    ) -> Result<CategoryModel, ServiceError> {
        request.validate()?;

        let id = request
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| slugify(&request.name));

        let existing = CategoryEntity::find_by_id(&id).one(&*self.db).await?;
        let model = match existing {
            Some(found) => {
                let mut active: CategoryActiveModel = found.into();
                active.name = Set(request.name);
                active.image_url = Set(request.image_url);
                active.update(&*self.db).await?
            }
            None => {
                CategoryActiveModel {
                    id: Set(id),
                    name: Set(request.name),
                    image_url: Set(request.image_url),
                    ..Default::default()
                }
                .insert(&*self.db)
                .await?
            }
        };
        Ok(model)
    }

    /// Refuses to delete a category that still owns products.
    #[instrument(skip(self))]
    pub async fn delete_category(&self, category_id: &str) -> Result<(), ServiceError> {
        let category = CategoryEntity::find_by_id(category_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("category {} not found", category_id)))?;

        let in_use = ProductEntity::find()
            .filter(product::Column::CategoryId.eq(category_id))
            .count(&*self.db)
            .await?;
        if in_use > 0 {
            return Err(ServiceError::Conflict(format!(
                "category {} still has {} products",
                category_id, in_use
            )));
        }

        CategoryEntity::delete_by_id(category.id).exec(&*self.db).await?;
        Ok(())
    }

    // ---- products ----

    #[instrument(skip(self, filter))]
    pub async fn list_products(
        &self,
        filter: ProductFilter,
    ) -> Result<Vec<ProductWithVariants>, ServiceError> {
        let mut query = ProductEntity::find().order_by_asc(product::Column::CreatedAt);

        if let Some(category) = &filter.category {
            query = query.filter(product::Column::CategoryId.eq(category.clone()));
        }
        if let Some(bestseller) = filter.bestseller {
            query = query.filter(product::Column::IsBestseller.eq(bestseller));
        }
        if let Some(search) = &filter.search {
            let pattern = format!("%{}%", search);
            query = query.filter(
                Condition::any()
                    .add(product::Column::Name.like(pattern.clone()))
                    .add(product::Column::Brand.like(pattern)),
            );
        }

        let rows = query
            .find_with_related(VariantEntity)
            .all(&*self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(product, mut variants)| {
                variants.sort_by_key(|v| v.position);
                ProductWithVariants { product, variants }
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: &str) -> Result<ProductWithVariants, ServiceError> {
        let product = ProductEntity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {} not found", product_id)))?;

        let variants = VariantEntity::find()
            .filter(product_variant::Column::ProductId.eq(product_id))
            .order_by_asc(product_variant::Column::Position)
            .all(&*self.db)
            .await?;

        Ok(ProductWithVariants { product, variants })
    }

    /// Creates a product with the same deterministic id the bulk loader
    /// would assign, so an admin-entered listing and a reloaded one agree.
    #[instrument(skip(self, request), fields(brand = %request.brand, name = %request.name))]
    pub async fn create_product(
        &self,
        request: CreateProductRequest,
    ) -> Result<ProductWithVariants, ServiceError> {
        request.validate()?;

        let base = grouper::base_name(&request.name);
        let key = grouper::group_key(&request.brand, &base);

        if ProductEntity::find_by_id(&key).one(&*self.db).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "product {} already exists",
                key
            )));
        }

        let category = CategoryEntity::find_by_id(&request.category_id)
            .one(&*self.db)
            .await?;
        if category.is_none() {
            return Err(ServiceError::ValidationError(format!(
                "category {} does not exist",
                request.category_id
            )));
        }

        let description = request.description.clone().unwrap_or_else(|| {
            format!(
                "Premium {} by {}. High quality supplements for your fitness goals.",
                base, request.brand
            )
        });

        let txn = self.db.begin().await?;

        let product = ProductActiveModel {
            id: Set(key.clone()),
            name: Set(base),
            brand: Set(request.brand),
            description: Set(description),
            category_id: Set(request.category_id),
            image_urls: Set(serde_json::json!(request.image_urls)),
            is_bestseller: Set(request.is_bestseller),
            product_type: Set(request.product_type),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let variants = insert_variants(&txn, &key, &request.variants).await?;

        txn.commit().await?;
        info!(product_id = %key, "product created");

        if let Some(sender) = &self.event_sender {
            sender.send_or_log(Event::ProductCreated(key.clone())).await;
        }

        Ok(ProductWithVariants { product, variants })
    }

    /// Partial update; a supplied variant list replaces the existing set.
    #[instrument(skip(self, request))]
    pub async fn update_product(
        &self,
        product_id: &str,
        request: UpdateProductRequest,
    ) -> Result<ProductWithVariants, ServiceError> {
        request.validate()?;

        let existing = ProductEntity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {} not found", product_id)))?;

        let txn = self.db.begin().await?;

        let mut active: ProductActiveModel = existing.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(description) = request.description {
            active.description = Set(description);
        }
        if let Some(category_id) = request.category_id {
            active.category_id = Set(category_id);
        }
        if let Some(image_urls) = request.image_urls {
            active.image_urls = Set(serde_json::json!(image_urls));
        }
        if let Some(is_bestseller) = request.is_bestseller {
            active.is_bestseller = Set(is_bestseller);
        }
        if let Some(status) = request.status {
            active.status = Set(status);
        }
        if let Some(product_type) = request.product_type {
            active.product_type = Set(product_type);
        }
        let product = active.update(&txn).await?;

        let variants = match request.variants {
            Some(inputs) if inputs.is_empty() => {
                return Err(ServiceError::ValidationError(
                    "a product must keep at least one variant".into(),
                ));
            }
            Some(inputs) => {
                VariantEntity::delete_many()
                    .filter(product_variant::Column::ProductId.eq(product_id))
                    .exec(&txn)
                    .await?;
                insert_variants(&txn, product_id, &inputs).await?
            }
            None => {
                VariantEntity::find()
                    .filter(product_variant::Column::ProductId.eq(product_id))
                    .order_by_asc(product_variant::Column::Position)
                    .all(&txn)
                    .await?
            }
        };

        txn.commit().await?;
        Ok(ProductWithVariants { product, variants })
    }

    /// Deletes a product and its variants. Historical order items keep
    /// their snapshotted prices and dangling product references.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, product_id: &str) -> Result<(), ServiceError> {
        let existing = ProductEntity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {} not found", product_id)))?;

        let txn = self.db.begin().await?;
        VariantEntity::delete_many()
            .filter(product_variant::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;
        ProductEntity::delete_by_id(existing.id).exec(&txn).await?;
        txn.commit().await?;

        info!(product_id = %product_id, "product deleted");
        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::ProductDeleted(product_id.to_string()))
                .await;
        }
        Ok(())
    }

    // ---- bulk reload ----

    /// Replaces the whole catalog from a parsed bulk payload: wipes
    /// variants, products and categories, then reinserts grouped data in
    /// one transaction. Orders are untouched.
    #[instrument(skip(self, categories, listings), fields(listings = listings.len()))]
    pub async fn replace_catalog(
        &self,
        categories: &[CategoryRecord],
        listings: &[RawListing],
    ) -> Result<ReloadSummary, ServiceError> {
        let grouped = grouper::group_listings(listings);
        let grouped_listing_count: usize = grouped.iter().map(|p| p.variants.len()).sum();
        let summary = ReloadSummary {
            categories: categories.len(),
            products: grouped.len(),
            variants: grouped_listing_count,
            skipped_listings: listings.len() - grouped_listing_count,
        };

        let txn = self.db.begin().await?;

        VariantEntity::delete_many().exec(&txn).await?;
        ProductEntity::delete_many().exec(&txn).await?;
        CategoryEntity::delete_many().exec(&txn).await?;

        for record in categories {
            CategoryActiveModel {
                id: Set(record.id.clone()),
                name: Set(record.name.clone()),
                image_url: Set(record.image_url.clone()),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        for grouped_product in &grouped {
            persist_grouped_product(&txn, grouped_product).await?;
            debug!(
                product_id = %grouped_product.id,
                variants = grouped_product.variants.len(),
                "product persisted"
            );
        }

        txn.commit().await?;

        info!(
            categories = summary.categories,
            products = summary.products,
            variants = summary.variants,
            skipped = summary.skipped_listings,
            "catalog reloaded"
        );

        if let Some(sender) = &self.event_sender {
            sender
                .send_or_log(Event::CatalogReloaded {
                    categories: summary.categories,
                    products: summary.products,
                    variants: summary.variants,
                })
                .await;
        }

        Ok(summary)
    }
}

/// Category slug in the same alphabet as product group keys.
fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Inserts one grouped product and its variants inside a caller transaction.
pub(crate) async fn persist_grouped_product<C>(
    conn: &C,
    grouped: &GroupedProduct,
) -> Result<(), ServiceError>
where
    C: sea_orm::ConnectionTrait,
{
    ProductActiveModel {
        id: Set(grouped.id.clone()),
        name: Set(grouped.name.clone()),
        brand: Set(grouped.brand.clone()),
        description: Set(grouped.description.clone()),
        category_id: Set(grouped.category_id.clone()),
        image_urls: Set(serde_json::json!(grouped.image_urls)),
        is_bestseller: Set(grouped.is_bestseller),
        product_type: Set(grouped.product_type.clone()),
        ..Default::default()
    }
    .insert(conn)
    .await?;

    for variant in &grouped.variants {
        VariantActiveModel {
            id: Set(format!("{}_var_{}", grouped.id, variant.position)),
            product_id: Set(grouped.id.clone()),
            sku: Set(variant.sku.clone()),
            quantity_label: Set(variant.quantity_label.clone()),
            flavor: Set(variant.flavor.clone()),
            price: Set(variant.price),
            mrp: Set(variant.mrp),
            discount: Set(variant.discount),
            tax: Set(variant.tax),
            stock: Set(variant.stock),
            position: Set(variant.position),
            ..Default::default()
        }
        .insert(conn)
        .await?;
    }
    Ok(())
}

async fn insert_variants<C>(
    conn: &C,
    product_id: &str,
    inputs: &[VariantInput],
) -> Result<Vec<VariantModel>, ServiceError>
where
    C: sea_orm::ConnectionTrait,
{
    let now = Utc::now();
    let mut models = Vec::with_capacity(inputs.len());
    for (i, input) in inputs.iter().enumerate() {
        if input.quantity_label.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "variant quantity label is required".into(),
            ));
        }
        let position = i as i32;
        let model = VariantActiveModel {
            id: Set(format!("{}_var_{}", product_id, position)),
            product_id: Set(product_id.to_string()),
            sku: Set(grouper::variant_sku(
                product_id,
                &input.quantity_label,
                position,
            )),
            quantity_label: Set(input.quantity_label.clone()),
            flavor: Set(input.flavor.clone()),
            price: Set(input.price),
            mrp: Set(input.mrp.unwrap_or_else(|| grouper::default_mrp(input.price))),
            discount: Set(input.discount.unwrap_or(Decimal::from(20))),
            tax: Set(input.tax.unwrap_or(Decimal::from(18))),
            stock: Set(input.stock),
            position: Set(position),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(conn)
        .await?;
        models.push(model);
    }
    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_product_request_requires_variants() {
        let request = CreateProductRequest {
            name: "Gold Standard Whey 1KG".into(),
            brand: "ON".into(),
            description: None,
            category_id: "protein".into(),
            image_urls: vec![],
            is_bestseller: false,
            product_type: String::new(),
            variants: vec![],
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn variant_input_parses_with_minimal_fields() {
        let json = r#"{"quantityLabel": "1KG", "price": 3000}"#;
        let input: VariantInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.quantity_label, "1KG");
        assert_eq!(input.stock, 0);
        assert!(input.mrp.is_none());
    }

    #[test]
    fn category_slug_derives_from_name() {
        assert_eq!(slugify("Mass Gainers"), "mass_gainers");
        assert_eq!(slugify("Pre-Workout"), "pre_workout");
    }

    #[test]
    fn product_filter_defaults_to_no_constraints() {
        let filter: ProductFilter = serde_json::from_str("{}").unwrap();
        assert!(filter.category.is_none());
        assert!(filter.bestseller.is_none());
        assert!(filter.search.is_none());
    }
}
