//! Order service.
//!
//! Checkout never trusts client-supplied amounts: every line is priced from
//! the variant's stored price at order time. Storefront clients send a
//! `price` field on each line; it is dropped on decode and never read, so a
//! tampered amount changes nothing.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::order::{
    self, ActiveModel as OrderActiveModel, Entity as OrderEntity, Model as OrderModel, OrderStatus,
    PaymentStatus,
};
use crate::entities::order_item::{
    self, ActiveModel as OrderItemActiveModel, Entity as OrderItemEntity, Model as OrderItemModel,
};
use crate::entities::product_variant::{self, Entity as VariantEntity};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// One cart line as submitted by the storefront.
///
/// Only these three fields are read. Storefront payloads also carry a
/// `price` per line; it is dropped on decode so the stored variant price is
/// the only amount that can reach the total.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub product_id: String,
    /// Omitted by storefronts that predate per-size variants.
    pub variant_id: Option<String>,
    /// Must be at least 1; checked while pricing the cart.
    pub quantity: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 10, message = "Phone must have at least 10 digits"))]
    pub phone: String,
    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,
    pub payment_method: String,
    #[validate(length(min = 1, message = "Cart must contain at least one line"))]
    pub items: Vec<CartLine>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub tracking_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: OrderModel,
    pub items: Vec<OrderItemModel>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderModel>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// A cart line resolved against a stored variant price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// Prices every cart line from stored variant data.
///
/// `variants_by_id` holds the variants the cart named explicitly;
/// `fallback_by_product` maps product ids to their first variant for legacy
/// lines without a variant id. Any unresolvable line fails the whole cart,
/// so no order row is written for a partially valid cart.
pub fn price_cart_lines(
    lines: &[CartLine],
    variants_by_id: &HashMap<String, product_variant::Model>,
    fallback_by_product: &HashMap<String, product_variant::Model>,
) -> Result<(Vec<PricedLine>, Decimal), ServiceError> {
    let mut priced = Vec::with_capacity(lines.len());
    let mut subtotal = Decimal::ZERO;

    for line in lines {
        if line.quantity < 1 {
            return Err(ServiceError::ValidationError(format!(
                "quantity must be at least 1 for product {}",
                line.product_id
            )));
        }
        let variant = match &line.variant_id {
            Some(variant_id) => {
                let variant = variants_by_id.get(variant_id).ok_or_else(|| {
                    ServiceError::NotFound(format!("variant {} not found", variant_id))
                })?;
                if variant.product_id != line.product_id {
                    return Err(ServiceError::ValidationError(format!(
                        "variant {} does not belong to product {}",
                        variant_id, line.product_id
                    )));
                }
                variant
            }
            None => fallback_by_product.get(&line.product_id).ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "product {} has no purchasable variants",
                    line.product_id
                ))
            })?,
        };

        subtotal += variant.price * Decimal::from(line.quantity);
        priced.push(PricedLine {
            product_id: line.product_id.clone(),
            variant_id: Some(variant.id.clone()),
            quantity: line.quantity,
            unit_price: variant.price,
        });
    }

    Ok((priced, subtotal))
}

#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<Arc<EventSender>>,
    shipping_fee: Decimal,
}

impl OrderService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Option<Arc<EventSender>>,
        shipping_fee: Decimal,
    ) -> Self {
        Self {
            db,
            event_sender,
            shipping_fee,
        }
    }

    /// Validates and prices a cart, then persists the order and its lines in
    /// one transaction. Resolution failures happen before any write.
    #[instrument(skip(self, request), fields(lines = request.items.len()))]
    pub async fn create_order(
        &self,
        user_id: Option<Uuid>,
        request: CreateOrderRequest,
    ) -> Result<OrderDetail, ServiceError> {
        request.validate()?;

        let (priced, subtotal) = self.resolve_and_price(&request.items).await?;
        let total_amount = subtotal + self.shipping_fee;
        let order_id = Uuid::new_v4();
        let now = Utc::now();

        let txn = self.db.begin().await.map_err(|e| {
            error!(error = %e, "failed to start order transaction");
            ServiceError::DatabaseError(e)
        })?;

        let order = OrderActiveModel {
            id: Set(order_id),
            user_id: Set(user_id),
            name: Set(request.name.clone()),
            phone: Set(request.phone.clone()),
            address: Set(request.address.clone()),
            total_amount: Set(total_amount),
            shipping_fee: Set(self.shipping_fee),
            payment_method: Set(request.payment_method.clone()),
            payment_status: Set(PaymentStatus::Pending),
            status: Set(OrderStatus::Pending),
            tracking_id: Set(None),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        }
        .insert(&txn)
        .await
        .map_err(|e| {
            error!(error = %e, order_id = %order_id, "failed to insert order");
            ServiceError::DatabaseError(e)
        })?;

        let mut items = Vec::with_capacity(priced.len());
        for line in &priced {
            let item = OrderItemActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(line.product_id.clone()),
                variant_id: Set(line.variant_id.clone()),
                quantity: Set(line.quantity),
                price: Set(line.unit_price),
                created_at: Set(now),
            }
            .insert(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "failed to insert order item");
                ServiceError::DatabaseError(e)
            })?;
            items.push(item);
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "failed to commit order transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, %total_amount, "order created");

        if let Some(sender) = &self.event_sender {
            sender.send_or_log(Event::OrderCreated(order_id)).await;
        }

        Ok(OrderDetail { order, items })
    }

    /// Batch-fetches every referenced variant, plus first-variant fallbacks
    /// for legacy lines, then prices the cart.
    async fn resolve_and_price(
        &self,
        lines: &[CartLine],
    ) -> Result<(Vec<PricedLine>, Decimal), ServiceError> {
        let explicit_ids: Vec<String> = lines
            .iter()
            .filter_map(|line| line.variant_id.clone())
            .collect();

        let variants_by_id: HashMap<String, product_variant::Model> = if explicit_ids.is_empty() {
            HashMap::new()
        } else {
            VariantEntity::find()
                .filter(product_variant::Column::Id.is_in(explicit_ids))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|v| (v.id.clone(), v))
                .collect()
        };

        let legacy_product_ids: Vec<String> = lines
            .iter()
            .filter(|line| line.variant_id.is_none())
            .map(|line| line.product_id.clone())
            .collect();

        let mut fallback_by_product: HashMap<String, product_variant::Model> = HashMap::new();
        if !legacy_product_ids.is_empty() {
            let candidates = VariantEntity::find()
                .filter(product_variant::Column::ProductId.is_in(legacy_product_ids))
                .order_by_asc(product_variant::Column::Position)
                .all(&*self.db)
                .await?;
            for variant in candidates {
                fallback_by_product
                    .entry(variant.product_id.clone())
                    .or_insert(variant);
            }
        }

        price_cart_lines(lines, &variants_by_id, &fallback_by_product)
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderDetail, ServiceError> {
        let order = OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", order_id)))?;

        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        Ok(OrderDetail { order, items })
    }

    /// Newest-first page of all orders, for the admin dashboard.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        let paginator = OrderEntity::find()
            .order_by_desc(order::Column::CreatedAt)
            .paginate(&*self.db, per_page.max(1));

        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok(OrderListResponse {
            orders,
            total,
            page,
            per_page,
        })
    }

    /// Orders belonging to one user, newest first.
    #[instrument(skip(self))]
    pub async fn list_user_orders(&self, user_id: Uuid) -> Result<Vec<OrderDetail>, ServiceError> {
        let orders = OrderEntity::find()
            .filter(order::Column::UserId.eq(user_id))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        let mut detailed = Vec::with_capacity(orders.len());
        for order in orders {
            let items = OrderItemEntity::find()
                .filter(order_item::Column::OrderId.eq(order.id))
                .all(&*self.db)
                .await?;
            detailed.push(OrderDetail { order, items });
        }
        Ok(detailed)
    }

    /// Applies any combination of fulfillment status, payment status and
    /// tracking id. Transitions are not constrained: the admin dashboard may
    /// move an order between any two statuses.
    #[instrument(skip(self, request))]
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        request: UpdateOrderStatusRequest,
    ) -> Result<OrderModel, ServiceError> {
        let existing = OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", order_id)))?;

        let old_status = existing.status;
        let mut active: OrderActiveModel = existing.into();

        if let Some(status) = request.status {
            active.status = Set(status);
        }
        if let Some(payment_status) = request.payment_status {
            active.payment_status = Set(payment_status);
        }
        if let Some(tracking_id) = request.tracking_id {
            active.tracking_id = Set(Some(tracking_id));
        }

        let updated = active.update(&*self.db).await?;
        info!(order_id = %order_id, status = ?updated.status, "order updated");

        if let Some(sender) = &self.event_sender {
            if let Some(new_status) = request.status {
                if new_status != old_status {
                    sender
                        .send_or_log(Event::OrderStatusChanged {
                            order_id,
                            old_status: format!("{:?}", old_status),
                            new_status: format!("{:?}", new_status),
                        })
                        .await;
                }
            }
            if let Some(payment_status) = request.payment_status {
                sender
                    .send_or_log(Event::PaymentStatusChanged {
                        order_id,
                        new_status: format!("{:?}", payment_status),
                    })
                    .await;
            }
        }

        Ok(updated)
    }

    /// Removes an order and its items.
    #[instrument(skip(self))]
    pub async fn delete_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let existing = OrderEntity::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {} not found", order_id)))?;

        let txn = self.db.begin().await?;
        OrderItemEntity::delete_many()
            .filter(order_item::Column::OrderId.eq(order_id))
            .exec(&txn)
            .await?;
        OrderEntity::delete_by_id(existing.id).exec(&txn).await?;
        txn.commit().await?;

        info!(order_id = %order_id, "order deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn variant(id: &str, product_id: &str, price: Decimal) -> product_variant::Model {
        product_variant::Model {
            id: id.into(),
            product_id: product_id.into(),
            sku: format!("{}_sku", id),
            quantity_label: "1KG".into(),
            flavor: None,
            price,
            mrp: price,
            discount: dec!(0),
            tax: dec!(18),
            stock: 5,
            position: 0,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn line(product_id: &str, variant_id: Option<&str>, quantity: i32) -> CartLine {
        CartLine {
            product_id: product_id.into(),
            variant_id: variant_id.map(Into::into),
            quantity,
        }
    }

    #[test]
    fn totals_come_from_stored_prices() {
        // Two lines: 2 x 500 + 1 x 1000 = 2000 before shipping.
        let mut by_id = HashMap::new();
        by_id.insert("v500".to_string(), variant("v500", "whey", dec!(500)));
        by_id.insert("v1000".to_string(), variant("v1000", "whey", dec!(1000)));

        let lines = vec![
            line("whey", Some("v500"), 2),
            line("whey", Some("v1000"), 1),
        ];

        let (priced, subtotal) = price_cart_lines(&lines, &by_id, &HashMap::new()).unwrap();
        assert_eq!(subtotal, dec!(2000));
        assert_eq!(subtotal + dec!(100), dec!(2100));
        assert_eq!(priced[0].unit_price, dec!(500));
        assert_eq!(priced[1].unit_price, dec!(1000));
    }

    #[test]
    fn unknown_variant_fails_the_whole_cart() {
        let mut by_id = HashMap::new();
        by_id.insert("v500".to_string(), variant("v500", "whey", dec!(500)));

        let lines = vec![line("whey", Some("v500"), 1), line("whey", Some("ghost"), 1)];

        let err = price_cart_lines(&lines, &by_id, &HashMap::new()).unwrap_err();
        assert_matches!(err, ServiceError::NotFound(msg) if msg.contains("ghost"));
    }

    #[test]
    fn variant_product_mismatch_is_rejected() {
        let mut by_id = HashMap::new();
        by_id.insert("v500".to_string(), variant("v500", "whey", dec!(500)));

        let lines = vec![line("creatine", Some("v500"), 1)];

        let err = price_cart_lines(&lines, &by_id, &HashMap::new()).unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }

    #[test]
    fn legacy_lines_fall_back_to_first_variant() {
        let mut fallback = HashMap::new();
        fallback.insert("whey".to_string(), variant("v_first", "whey", dec!(750)));

        let lines = vec![line("whey", None, 2)];

        let (priced, subtotal) = price_cart_lines(&lines, &HashMap::new(), &fallback).unwrap();
        assert_eq!(subtotal, dec!(1500));
        assert_eq!(priced[0].variant_id.as_deref(), Some("v_first"));
    }

    #[test]
    fn legacy_line_without_variants_is_rejected() {
        let lines = vec![line("empty-product", None, 1)];

        let err = price_cart_lines(&lines, &HashMap::new(), &HashMap::new()).unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(msg) if msg.contains("empty-product"));
    }

    #[test]
    fn duplicate_variant_lines_price_independently() {
        let mut by_id = HashMap::new();
        by_id.insert("v500".to_string(), variant("v500", "whey", dec!(500)));

        let lines = vec![line("whey", Some("v500"), 1), line("whey", Some("v500"), 3)];

        let (priced, subtotal) = price_cart_lines(&lines, &by_id, &HashMap::new()).unwrap();
        assert_eq!(priced.len(), 2);
        assert_eq!(subtotal, dec!(2000));
    }

    #[test]
    fn injected_price_fields_are_dropped_and_never_priced() {
        // Storefront clients send a price per line; it must not survive
        // decoding or influence the total.
        let payload = r#"{"productId": "whey", "variantId": "v500", "quantity": 1, "price": 1}"#;
        let parsed: CartLine = serde_json::from_str(payload).unwrap();
        assert_eq!(parsed.variant_id.as_deref(), Some("v500"));

        let mut by_id = HashMap::new();
        by_id.insert("v500".to_string(), variant("v500", "whey", dec!(500)));

        let (priced, subtotal) = price_cart_lines(&[parsed], &by_id, &HashMap::new()).unwrap();
        assert_eq!(priced[0].unit_price, dec!(500));
        assert_eq!(subtotal, dec!(500));
    }

    #[test]
    fn cart_line_accepts_legacy_shape() {
        let payload = r#"{"productId": "whey", "quantity": 2}"#;
        let parsed: CartLine = serde_json::from_str(payload).unwrap();
        assert_eq!(parsed.variant_id, None);
        assert_eq!(parsed.quantity, 2);
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let mut by_id = HashMap::new();
        by_id.insert("v500".to_string(), variant("v500", "whey", dec!(500)));

        let lines = vec![line("whey", Some("v500"), 0)];

        let err = price_cart_lines(&lines, &by_id, &HashMap::new()).unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }

    #[test]
    fn empty_cart_fails_request_validation() {
        let request = CreateOrderRequest {
            name: "Asha".into(),
            phone: "9876543210".into(),
            address: "12 Gym Street".into(),
            payment_method: "COD".into(),
            items: vec![],
        };
        assert!(request.validate().is_err());
    }
}
