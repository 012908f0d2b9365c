use sea_orm_migration::prelude::*;

/// Embedded migrator for the ledger schema.
///
/// Migrations run in order on startup when `auto_migrate` is set, and the
/// integration tests run them against fresh in-memory databases, so tables
/// and indexes live here rather than in a separate migration crate.
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240115_000001_create_products_table::Migration),
            Box::new(m20240115_000002_create_inventory_balances_table::Migration),
            Box::new(m20240115_000003_create_sales_table::Migration),
            Box::new(m20240115_000004_create_forecasts_table::Migration),
        ]
    }
}

mod m20240115_000001_create_products_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000001_create_products_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Products::OwnerId).uuid().not_null())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Unit).string().not_null())
                        .col(ColumnDef::new(Products::Price).decimal().not_null())
                        .col(ColumnDef::new(Products::Cost).decimal().not_null())
                        .col(ColumnDef::new(Products::Kind).string().not_null())
                        .col(
                            ColumnDef::new(Products::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Products::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Products::UpdatedAt).timestamp().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_products_owner_id")
                        .table(Products::Table)
                        .col(Products::OwnerId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Products {
        Table,
        Id,
        OwnerId,
        Name,
        Unit,
        Price,
        Cost,
        Kind,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240115_000002_create_inventory_balances_table {
    use super::m20240115_000001_create_products_table::Products;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000002_create_inventory_balances_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(InventoryBalances::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryBalances::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(InventoryBalances::OwnerId).uuid().not_null())
                        .col(
                            ColumnDef::new(InventoryBalances::ProductId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryBalances::Quantity)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryBalances::MinThreshold)
                                .decimal()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryBalances::LastUpdated)
                                .timestamp()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inventory_balances_product_id")
                                .from(InventoryBalances::Table, InventoryBalances::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // One balance row per product per owner; the unique index is what
            // lets the adjuster create rows lazily without doubling up.
            manager
                .create_index(
                    Index::create()
                        .name("idx_inventory_balances_owner_product")
                        .table(InventoryBalances::Table)
                        .col(InventoryBalances::OwnerId)
                        .col(InventoryBalances::ProductId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InventoryBalances::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum InventoryBalances {
        Table,
        Id,
        OwnerId,
        ProductId,
        Quantity,
        MinThreshold,
        LastUpdated,
    }
}

mod m20240115_000003_create_sales_table {
    use super::m20240115_000001_create_products_table::Products;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000003_create_sales_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Sales::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Sales::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Sales::OwnerId).uuid().not_null())
                        .col(ColumnDef::new(Sales::ProductId).uuid().not_null())
                        .col(ColumnDef::new(Sales::Quantity).decimal().not_null())
                        .col(ColumnDef::new(Sales::UnitPrice).decimal().not_null())
                        .col(ColumnDef::new(Sales::TotalAmount).decimal().not_null())
                        .col(ColumnDef::new(Sales::SaleDate).date().not_null())
                        .col(ColumnDef::new(Sales::SaleTime).time().not_null())
                        .col(ColumnDef::new(Sales::Notes).string().null())
                        .col(ColumnDef::new(Sales::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Sales::UpdatedAt).timestamp().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_sales_product_id")
                                .from(Sales::Table, Sales::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_sales_owner_sale_date")
                        .table(Sales::Table)
                        .col(Sales::OwnerId)
                        .col(Sales::SaleDate)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_sales_product_id")
                        .table(Sales::Table)
                        .col(Sales::ProductId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Sales::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Sales {
        Table,
        Id,
        OwnerId,
        ProductId,
        Quantity,
        UnitPrice,
        TotalAmount,
        SaleDate,
        SaleTime,
        Notes,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240115_000004_create_forecasts_table {
    use super::m20240115_000001_create_products_table::Products;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240115_000004_create_forecasts_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Forecasts::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Forecasts::Id).uuid().not_null().primary_key())
                        .col(ColumnDef::new(Forecasts::OwnerId).uuid().not_null())
                        .col(ColumnDef::new(Forecasts::ProductId).uuid().not_null())
                        .col(ColumnDef::new(Forecasts::ForecastDate).date().not_null())
                        .col(
                            ColumnDef::new(Forecasts::PredictedQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Forecasts::ConfidenceScore)
                                .double()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Forecasts::ActualQuantity).integer().null())
                        .col(ColumnDef::new(Forecasts::ModelVersion).string().not_null())
                        .col(ColumnDef::new(Forecasts::CreatedAt).timestamp().not_null())
                        .col(ColumnDef::new(Forecasts::UpdatedAt).timestamp().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_forecasts_product_id")
                                .from(Forecasts::Table, Forecasts::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Restrict)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            // Generation is idempotent per day; the unique index turns a
            // concurrent duplicate insert into a constraint error the service
            // resolves by fetching the winning row.
            manager
                .create_index(
                    Index::create()
                        .name("idx_forecasts_owner_product_date")
                        .table(Forecasts::Table)
                        .col(Forecasts::OwnerId)
                        .col(Forecasts::ProductId)
                        .col(Forecasts::ForecastDate)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_forecasts_owner_date")
                        .table(Forecasts::Table)
                        .col(Forecasts::OwnerId)
                        .col(Forecasts::ForecastDate)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Forecasts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Forecasts {
        Table,
        Id,
        OwnerId,
        ProductId,
        ForecastDate,
        PredictedQuantity,
        ConfidenceScore,
        ActualQuantity,
        ModelVersion,
        CreatedAt,
        UpdatedAt,
    }
}
