use crate::{
    auth::Actor,
    db::DbPool,
    entities::product::{self, Column as ProductColumn, Entity as Product, ProductKind},
    errors::ServiceError,
    events::{Event, EventSender},
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 255, message = "Product name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 32, message = "Unit is required"))]
    pub unit: String,
    #[validate(custom = "validate_non_negative")]
    pub price: Decimal,
    #[validate(custom = "validate_non_negative")]
    pub cost: Decimal,
    pub kind: ProductKind,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 255, message = "Product name is required"))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 32, message = "Unit is required"))]
    pub unit: Option<String>,
    #[validate(custom = "validate_non_negative")]
    pub price: Option<Decimal>,
    #[validate(custom = "validate_non_negative")]
    pub cost: Option<Decimal>,
    pub kind: Option<ProductKind>,
}

fn validate_non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        let mut err = ValidationError::new("non_negative");
        err.message = Some("Must not be negative".into());
        return Err(err);
    }
    Ok(())
}

/// The product catalogue, scoped per owner.
pub struct ProductService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
}

impl ProductService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self, actor, request), fields(owner_id = %actor.owner_id, name = %request.name))]
    pub async fn create_product(
        &self,
        actor: &Actor,
        request: CreateProductRequest,
    ) -> Result<product::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;

        // Names are unique per owner so sales listings stay unambiguous.
        let duplicate = Product::find()
            .filter(ProductColumn::OwnerId.eq(actor.owner_id))
            .filter(ProductColumn::Name.eq(&request.name))
            .filter(ProductColumn::IsActive.eq(true))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;
        if duplicate.is_some() {
            return Err(ServiceError::ValidationError(format!(
                "An active product named '{}' already exists",
                request.name
            )));
        }

        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            owner_id: Set(actor.owner_id),
            name: Set(request.name),
            unit: Set(request.unit),
            price: Set(request.price),
            cost: Set(request.cost),
            kind: Set(request.kind),
            ..Default::default()
        };

        let created = product.insert(db).await.map_err(ServiceError::db_error)?;

        info!(product_id = %created.id, "Product created");

        if let Err(e) = self.event_sender.send(Event::ProductCreated(created.id)).await {
            warn!(error = %e, "Failed to send product created event");
        }

        Ok(created)
    }

    pub async fn get_product(
        &self,
        actor: &Actor,
        product_id: Uuid,
    ) -> Result<Option<product::Model>, ServiceError> {
        Product::find_by_id(product_id)
            .filter(ProductColumn::OwnerId.eq(actor.owner_id))
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    /// The owner's catalogue, name-ordered. Deactivated products are hidden
    /// unless asked for.
    pub async fn list_products(
        &self,
        actor: &Actor,
        include_inactive: bool,
    ) -> Result<Vec<product::Model>, ServiceError> {
        let mut query = Product::find().filter(ProductColumn::OwnerId.eq(actor.owner_id));

        if !include_inactive {
            query = query.filter(ProductColumn::IsActive.eq(true));
        }

        query
            .order_by_asc(ProductColumn::Name)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self, actor, request), fields(owner_id = %actor.owner_id, product_id = %product_id))]
    pub async fn update_product(
        &self,
        actor: &Actor,
        product_id: Uuid,
        request: UpdateProductRequest,
    ) -> Result<product::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let product = self.find_owned(actor, product_id).await?;
        let mut product: product::ActiveModel = product.into();

        if let Some(name) = request.name {
            product.name = Set(name);
        }
        if let Some(unit) = request.unit {
            product.unit = Set(unit);
        }
        if let Some(price) = request.price {
            product.price = Set(price);
        }
        if let Some(cost) = request.cost {
            product.cost = Set(cost);
        }
        if let Some(kind) = request.kind {
            product.kind = Set(kind);
        }

        let updated = product
            .update(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        info!(product_id = %updated.id, "Product updated");

        if let Err(e) = self.event_sender.send(Event::ProductUpdated(updated.id)).await {
            warn!(error = %e, "Failed to send product updated event");
        }

        Ok(updated)
    }

    /// Deactivates instead of deleting so sales and forecasts keep a valid
    /// product reference.
    #[instrument(skip(self, actor), fields(owner_id = %actor.owner_id, product_id = %product_id))]
    pub async fn deactivate_product(
        &self,
        actor: &Actor,
        product_id: Uuid,
    ) -> Result<product::Model, ServiceError> {
        let product = self.find_owned(actor, product_id).await?;
        let mut product: product::ActiveModel = product.into();
        product.is_active = Set(false);

        let updated = product
            .update(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        info!(product_id = %updated.id, "Product deactivated");

        if let Err(e) = self
            .event_sender
            .send(Event::ProductDeactivated(updated.id))
            .await
        {
            warn!(error = %e, "Failed to send product deactivated event");
        }

        Ok(updated)
    }

    async fn find_owned(
        &self,
        actor: &Actor,
        product_id: Uuid,
    ) -> Result<product::Model, ServiceError> {
        Product::find_by_id(product_id)
            .filter(ProductColumn::OwnerId.eq(actor.owner_id))
            .one(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))
    }
}
