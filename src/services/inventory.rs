use crate::{
    auth::Actor,
    db::DbPool,
    entities::{
        inventory_balance::{self, Entity as InventoryBalance},
        product::{self, Entity as Product},
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Outcome of a stock adjustment.
#[derive(Debug, Clone)]
pub struct AdjustmentResult {
    pub balance: inventory_balance::Model,
    pub previous_quantity: Decimal,
    pub requested_delta: Decimal,
    pub applied_delta: Decimal,
}

impl AdjustmentResult {
    /// True when the zero floor absorbed part of the requested delta.
    pub fn clamped(&self) -> bool {
        self.applied_delta != self.requested_delta
    }
}

/// A balance sitting at or below its threshold, with its product.
#[derive(Debug, Clone)]
pub struct LowStockEntry {
    pub product: product::Model,
    pub balance: inventory_balance::Model,
}

/// Applies a signed delta to the balance of `(owner_id, product_id)`.
///
/// This is the only code path that writes `quantity`. The result is clamped
/// at zero, the row is created lazily on first touch, and `last_updated` is
/// stamped. Callers run it inside their own transaction so a sale and its
/// stock movement commit together.
pub(crate) async fn apply_delta<C: ConnectionTrait>(
    conn: &C,
    owner_id: Uuid,
    product_id: Uuid,
    delta: Decimal,
) -> Result<AdjustmentResult, ServiceError> {
    let existing = InventoryBalance::find()
        .filter(inventory_balance::Column::OwnerId.eq(owner_id))
        .filter(inventory_balance::Column::ProductId.eq(product_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?;

    match existing {
        Some(balance) => {
            let previous = balance.quantity;
            let new_quantity = (previous + delta).max(Decimal::ZERO);

            let mut active: inventory_balance::ActiveModel = balance.into();
            active.quantity = Set(new_quantity);
            active.last_updated = Set(Utc::now());
            let updated = active.update(conn).await.map_err(ServiceError::db_error)?;

            Ok(AdjustmentResult {
                previous_quantity: previous,
                requested_delta: delta,
                applied_delta: new_quantity - previous,
                balance: updated,
            })
        }
        None => {
            let initial = delta.max(Decimal::ZERO);
            let created = inventory_balance::ActiveModel {
                id: Set(Uuid::new_v4()),
                owner_id: Set(owner_id),
                product_id: Set(product_id),
                quantity: Set(initial),
                min_threshold: Set(Decimal::ZERO),
                last_updated: Set(Utc::now()),
            }
            .insert(conn)
            .await
            .map_err(ServiceError::db_error)?;

            Ok(AdjustmentResult {
                previous_quantity: Decimal::ZERO,
                requested_delta: delta,
                applied_delta: initial,
                balance: created,
            })
        }
    }
}

/// Stock levels per owned product.
pub struct InventoryService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl InventoryService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Applies a manual stock adjustment (restock, spoilage, correction).
    #[instrument(skip(self, actor), fields(owner_id = %actor.owner_id, product_id = %product_id, delta = %delta))]
    pub async fn adjust(
        &self,
        actor: &Actor,
        product_id: Uuid,
        delta: Decimal,
    ) -> Result<AdjustmentResult, ServiceError> {
        let owner_id = actor.owner_id;
        self.ensure_owned_product(owner_id, product_id).await?;

        let result = self
            .db_pool
            .transaction::<_, AdjustmentResult, ServiceError>(move |txn| {
                Box::pin(async move { apply_delta(txn, owner_id, product_id, delta).await })
            })
            .await
            .map_err(ServiceError::from)?;

        if result.clamped() {
            warn!(
                requested = %result.requested_delta,
                applied = %result.applied_delta,
                "Adjustment clamped at the zero floor"
            );
        }

        info!(
            previous = %result.previous_quantity,
            new = %result.balance.quantity,
            "Inventory adjusted"
        );

        if let Err(e) = self
            .event_sender
            .send(Event::InventoryAdjusted {
                owner_id,
                product_id,
                previous_quantity: result.previous_quantity,
                new_quantity: result.balance.quantity,
            })
            .await
        {
            warn!(error = %e, "Failed to send inventory adjusted event");
        }
        self.notify_if_low(&result.balance).await;

        Ok(result)
    }

    /// Every balance the owner has, including zero rows.
    pub async fn get_inventory(
        &self,
        actor: &Actor,
    ) -> Result<Vec<inventory_balance::Model>, ServiceError> {
        InventoryBalance::find()
            .filter(inventory_balance::Column::OwnerId.eq(actor.owner_id))
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    /// Current balance for one product, `None` when it has never moved.
    pub async fn get_balance(
        &self,
        actor: &Actor,
        product_id: Uuid,
    ) -> Result<Option<inventory_balance::Model>, ServiceError> {
        InventoryBalance::find()
            .filter(inventory_balance::Column::OwnerId.eq(actor.owner_id))
            .filter(inventory_balance::Column::ProductId.eq(product_id))
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    /// Sets the low-stock threshold, creating the balance row if needed.
    #[instrument(skip(self, actor), fields(owner_id = %actor.owner_id, product_id = %product_id))]
    pub async fn set_min_threshold(
        &self,
        actor: &Actor,
        product_id: Uuid,
        min_threshold: Decimal,
    ) -> Result<inventory_balance::Model, ServiceError> {
        if min_threshold < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "min_threshold cannot be negative".to_string(),
            ));
        }

        let owner_id = actor.owner_id;
        self.ensure_owned_product(owner_id, product_id).await?;

        let balance = self
            .db_pool
            .transaction::<_, inventory_balance::Model, ServiceError>(move |txn| {
                Box::pin(async move {
                    let existing = InventoryBalance::find()
                        .filter(inventory_balance::Column::OwnerId.eq(owner_id))
                        .filter(inventory_balance::Column::ProductId.eq(product_id))
                        .one(txn)
                        .await
                        .map_err(ServiceError::db_error)?;

                    match existing {
                        Some(balance) => {
                            let mut active: inventory_balance::ActiveModel = balance.into();
                            active.min_threshold = Set(min_threshold);
                            active.update(txn).await.map_err(ServiceError::db_error)
                        }
                        None => {
                            inventory_balance::ActiveModel {
                                id: Set(Uuid::new_v4()),
                                owner_id: Set(owner_id),
                                product_id: Set(product_id),
                                quantity: Set(Decimal::ZERO),
                                min_threshold: Set(min_threshold),
                                last_updated: Set(Utc::now()),
                            }
                            .insert(txn)
                            .await
                            .map_err(ServiceError::db_error)
                        }
                    }
                })
            })
            .await
            .map_err(ServiceError::from)?;

        self.notify_if_low(&balance).await;

        Ok(balance)
    }

    /// Active products whose stock sits at or below their threshold.
    pub async fn low_stock(&self, actor: &Actor) -> Result<Vec<LowStockEntry>, ServiceError> {
        let rows = InventoryBalance::find()
            .filter(inventory_balance::Column::OwnerId.eq(actor.owner_id))
            .find_also_related(Product)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        let mut entries = Vec::new();
        for (balance, product) in rows {
            if !balance.is_low() {
                continue;
            }
            let product = product.ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Product {} referenced by balance {} not found",
                    balance.product_id, balance.id
                ))
            })?;
            if !product.is_active {
                continue;
            }
            entries.push(LowStockEntry { product, balance });
        }

        Ok(entries)
    }

    async fn ensure_owned_product(
        &self,
        owner_id: Uuid,
        product_id: Uuid,
    ) -> Result<product::Model, ServiceError> {
        Product::find_by_id(product_id)
            .filter(product::Column::OwnerId.eq(owner_id))
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
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
