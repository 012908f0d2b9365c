use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Inventory balance entity
///
/// Exactly one row per (owner, product), created lazily by the first
/// adjustment. `quantity` never goes below zero; every mutation routes
/// through the inventory service's clamped adjustment.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "inventory_balances")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub owner_id: Uuid,
    pub product_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub quantity: Decimal,
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub min_threshold: Decimal,
    pub last_updated: DateTime<Utc>,
}

impl Model {
    /// Low-stock is derived, never stored.
    pub fn is_low(&self) -> bool {
        self.quantity <= self.min_threshold
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn balance(quantity: Decimal, min_threshold: Decimal) -> Model {
        Model {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            quantity,
            min_threshold,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn low_stock_includes_the_threshold_itself() {
        assert!(balance(dec!(5), dec!(10)).is_low());
        assert!(balance(dec!(10), dec!(10)).is_low());
        assert!(!balance(dec!(11), dec!(10)).is_low());
    }
}
