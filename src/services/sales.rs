use crate::{
    auth::Actor,
    db::DbPool,
    entities::{
        inventory_balance::{self, Entity as InventoryBalance},
        product::{self, Column as ProductColumn, Entity as Product},
        sale::{self, Column as SaleColumn, Entity as Sale},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::inventory::apply_delta,
};
use chrono::{NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RecordSaleRequest {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[validate(length(max = 1024, message = "Notes are limited to 1024 characters"))]
    pub notes: Option<String>,
    /// Defaults to today; any other date needs an elevated actor.
    pub sale_date: Option<NaiveDate>,
    pub sale_time: Option<NaiveTime>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct EditSaleRequest {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[validate(length(max = 1024, message = "Notes are limited to 1024 characters"))]
    pub notes: Option<String>,
}

/// A sale joined with the product it sold.
#[derive(Debug, Clone, Serialize)]
pub struct SaleWithProduct {
    pub sale: sale::Model,
    pub product: product::Model,
}

async fn available_stock<C: ConnectionTrait>(
    conn: &C,
    owner_id: Uuid,
    product_id: Uuid,
) -> Result<Decimal, ServiceError> {
    let balance = InventoryBalance::find()
        .filter(inventory_balance::Column::OwnerId.eq(owner_id))
        .filter(inventory_balance::Column::ProductId.eq(product_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?;

    // A product that has never moved has zero stock, not unlimited stock.
    Ok(balance.map(|b| b.quantity).unwrap_or(Decimal::ZERO))
}

/// The sales ledger. Every write here pairs the sale row with its inventory
/// movement in a single transaction, so the ledger and the stock level never
/// drift apart.
pub struct SalesService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl SalesService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Records a sale and deducts its quantity from stock.
    #[instrument(skip(self, actor, request), fields(owner_id = %actor.owner_id, product_id = %request.product_id, quantity = %request.quantity))]
    pub async fn record_sale(
        &self,
        actor: &Actor,
        request: RecordSaleRequest,
    ) -> Result<sale::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        if request.quantity <= Decimal::ZERO {
            return Err(ServiceError::InvalidQuantity(format!(
                "quantity must be positive, got {}",
                request.quantity
            )));
        }
        if request.unit_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "unit_price cannot be negative".to_string(),
            ));
        }

        let owner_id = actor.owner_id;
        let now = Utc::now();
        let today = now.date_naive();
        let sale_date = request.sale_date.unwrap_or(today);
        actor.ensure_can_write_dated(sale_date, today)?;

        let product = self.find_owned_product(owner_id, request.product_id).await?;
        if !product.is_active {
            return Err(ServiceError::ValidationError(format!(
                "Product '{}' is deactivated",
                product.name
            )));
        }
        if !product.kind.is_sellable() {
            return Err(ServiceError::ValidationError(format!(
                "Product '{}' is an ingredient and cannot be sold",
                product.name
            )));
        }

        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        let available = available_stock(&txn, owner_id, request.product_id).await?;
        if available < request.quantity {
            return Err(ServiceError::InsufficientStock { available });
        }

        let sale_id = Uuid::new_v4();
        let recorded = sale::ActiveModel {
            id: Set(sale_id),
            owner_id: Set(owner_id),
            product_id: Set(request.product_id),
            quantity: Set(request.quantity),
            unit_price: Set(request.unit_price),
            total_amount: Set(request.quantity * request.unit_price),
            sale_date: Set(sale_date),
            sale_time: Set(request.sale_time.unwrap_or_else(|| now.time())),
            notes: Set(request.notes),
            created_at: Set(now),
            updated_at: Set(None),
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        let adjustment = apply_delta(&txn, owner_id, request.product_id, -request.quantity).await?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(
            sale_id = %recorded.id,
            total = %recorded.total_amount,
            remaining_stock = %adjustment.balance.quantity,
            "Sale recorded"
        );

        if let Err(e) = self
            .event_sender
            .send(Event::SaleRecorded {
                sale_id: recorded.id,
                product_id: recorded.product_id,
                quantity: recorded.quantity,
            })
            .await
        {
            warn!(error = %e, "Failed to send sale recorded event");
        }
        self.notify_if_low(&adjustment.balance).await;

        Ok(recorded)
    }

    /// Rewrites a sale. The old quantity is restored, the new quantity is
    /// checked and deducted against the (possibly different) target product,
    /// and the row is updated, all in one transaction.
    #[instrument(skip(self, actor, request), fields(owner_id = %actor.owner_id, sale_id = %sale_id))]
    pub async fn edit_sale(
        &self,
        actor: &Actor,
        sale_id: Uuid,
        request: EditSaleRequest,
    ) -> Result<sale::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        if request.quantity <= Decimal::ZERO {
            return Err(ServiceError::InvalidQuantity(format!(
                "quantity must be positive, got {}",
                request.quantity
            )));
        }
        if request.unit_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "unit_price cannot be negative".to_string(),
            ));
        }

        let owner_id = actor.owner_id;
        let sale = self.find_owned_sale(owner_id, sale_id).await?;

        let today = Utc::now().date_naive();
        actor.ensure_can_write_dated(sale.sale_date, today)?;

        let target = self.find_owned_product(owner_id, request.product_id).await?;
        if target.id != sale.product_id {
            // Only a move to a different product re-runs the catalogue
            // checks; the original product may have been deactivated since.
            if !target.is_active {
                return Err(ServiceError::ValidationError(format!(
                    "Product '{}' is deactivated",
                    target.name
                )));
            }
            if !target.kind.is_sellable() {
                return Err(ServiceError::ValidationError(format!(
                    "Product '{}' is an ingredient and cannot be sold",
                    target.name
                )));
            }
        }

        let old_product_id = sale.product_id;
        let old_quantity = sale.quantity;
        let quantity_delta = request.quantity - old_quantity;

        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        apply_delta(&txn, owner_id, old_product_id, old_quantity).await?;

        // With the old quantity restored, availability covers same-product
        // shrinks for free; only a real increase can fail here.
        let available = available_stock(&txn, owner_id, request.product_id).await?;
        if available < request.quantity {
            return Err(ServiceError::InsufficientStock { available });
        }

        let adjustment = apply_delta(&txn, owner_id, request.product_id, -request.quantity).await?;

        let mut active: sale::ActiveModel = sale.into();
        active.product_id = Set(request.product_id);
        active.quantity = Set(request.quantity);
        active.unit_price = Set(request.unit_price);
        active.total_amount = Set(request.quantity * request.unit_price);
        active.notes = Set(request.notes);
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(&txn).await.map_err(ServiceError::db_error)?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(
            sale_id = %updated.id,
            quantity_delta = %quantity_delta,
            total = %updated.total_amount,
            "Sale edited"
        );

        if let Err(e) = self
            .event_sender
            .send(Event::SaleEdited {
                sale_id: updated.id,
                product_id: updated.product_id,
                quantity_delta,
            })
            .await
        {
            warn!(error = %e, "Failed to send sale edited event");
        }
        self.notify_if_low(&adjustment.balance).await;

        Ok(updated)
    }

    /// Deletes a sale and restores its quantity to stock.
    #[instrument(skip(self, actor), fields(owner_id = %actor.owner_id, sale_id = %sale_id))]
    pub async fn delete_sale(&self, actor: &Actor, sale_id: Uuid) -> Result<(), ServiceError> {
        let owner_id = actor.owner_id;
        let sale = self.find_owned_sale(owner_id, sale_id).await?;

        let today = Utc::now().date_naive();
        actor.ensure_can_write_dated(sale.sale_date, today)?;

        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(ServiceError::db_error)?;

        apply_delta(&txn, owner_id, sale.product_id, sale.quantity).await?;

        Sale::delete_by_id(sale_id)
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;

        txn.commit().await.map_err(ServiceError::db_error)?;

        info!(
            sale_id = %sale_id,
            quantity_restored = %sale.quantity,
            "Sale deleted"
        );

        if let Err(e) = self
            .event_sender
            .send(Event::SaleDeleted {
                sale_id,
                product_id: sale.product_id,
                quantity_restored: sale.quantity,
            })
            .await
        {
            warn!(error = %e, "Failed to send sale deleted event");
        }

        Ok(())
    }

    /// Sales joined with their products, newest first, optionally bounded to
    /// an inclusive date range.
    pub async fn get_sales(
        &self,
        actor: &Actor,
        range: Option<(NaiveDate, NaiveDate)>,
    ) -> Result<Vec<SaleWithProduct>, ServiceError> {
        let mut query = Sale::find().filter(SaleColumn::OwnerId.eq(actor.owner_id));

        if let Some((from, to)) = range {
            query = query.filter(SaleColumn::SaleDate.between(from, to));
        }

        let rows = query
            .order_by_desc(SaleColumn::SaleDate)
            .order_by_desc(SaleColumn::SaleTime)
            .find_also_related(Product)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        rows.into_iter()
            .map(|(sale, product)| {
                let product = product.ok_or_else(|| {
                    ServiceError::NotFound(format!(
                        "Product {} referenced by sale {} not found",
                        sale.product_id, sale.id
                    ))
                })?;
                Ok(SaleWithProduct { sale, product })
            })
            .collect()
    }

    async fn find_owned_product(
        &self,
        owner_id: Uuid,
        product_id: Uuid,
    ) -> Result<product::Model, ServiceError> {
        Product::find_by_id(product_id)
            .filter(ProductColumn::OwnerId.eq(owner_id))
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }

    async fn find_owned_sale(
        &self,
        owner_id: Uuid,
        sale_id: Uuid,
    ) -> Result<sale::Model, ServiceError> {
        Sale::find_by_id(sale_id)
            .filter(SaleColumn::OwnerId.eq(owner_id))
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Sale {} not found", sale_id)))
    }

    async fn notify_if_low(&self, balance: &inventory_balance::Model) {
        if !balance.is_low() {
            return;
        }
        if let Err(e) = self
            .event_sender
            .send(Event::LowStockDetected {
                owner_id: balance.owner_id,
                product_id: balance.product_id,
                quantity: balance.quantity,
                min_threshold: balance.min_threshold,
            })
            .await
        {
            warn!(error = %e, "Failed to send low stock event");
        }
    }
}
