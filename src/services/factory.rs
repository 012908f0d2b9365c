use std::sync::Arc;

use crate::{
    config::ForecastTuning,
    db::DbPool,
    events::EventSender,
    services::{
        forecasting::ForecastingService, inventory::InventoryService, products::ProductService,
        sales::SalesService,
    },
};

/// Factory for creating service instances with shared dependencies
pub struct ServiceFactory {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    forecast_tuning: ForecastTuning,
}

impl ServiceFactory {
    /// Creates a new service factory with the given dependencies
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        forecast_tuning: ForecastTuning,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            forecast_tuning,
        }
    }

    /// Creates a product service instance
    pub fn product_service(&self) -> ProductService {
        ProductService::new(self.db_pool.clone(), self.event_sender.clone())
    }

    /// Creates an inventory service instance
    pub fn inventory_service(&self) -> InventoryService {
        InventoryService::new(self.db_pool.clone(), self.event_sender.clone())
    }

    /// Creates a sales service instance
    pub fn sales_service(&self) -> SalesService {
        SalesService::new(self.db_pool.clone(), self.event_sender.clone())
    }

    /// Creates a forecasting service instance
    pub fn forecasting_service(&self) -> ForecastingService {
        ForecastingService::new(
            self.db_pool.clone(),
            self.event_sender.clone(),
            self.forecast_tuning.clone(),
        )
    }

    /// Creates all services as a tuple for convenience
    pub fn create_all(
        &self,
    ) -> (
        ProductService,
        InventoryService,
        SalesService,
        ForecastingService,
    ) {
        (
            self.product_service(),
            self.inventory_service(),
            self.sales_service(),
            self.forecasting_service(),
        )
    }

    /// Gets a reference to the database pool
    pub fn db_pool(&self) -> &Arc<DbPool> {
        &self.db_pool
    }

    /// Gets a reference to the event sender
    pub fn event_sender(&self) -> &Arc<EventSender> {
        &self.event_sender
    }
}

/// Service container holding all service instances
#[derive(Clone)]
pub struct ServiceContainer {
    pub products: Arc<ProductService>,
    pub inventory: Arc<InventoryService>,
    pub sales: Arc<SalesService>,
    pub forecasting: Arc<ForecastingService>,
}

impl ServiceContainer {
    /// Creates a new service container with all services initialized
    pub fn new(factory: &ServiceFactory) -> Self {
        let (products, inventory, sales, forecasting) = factory.create_all();

        Self {
            products: Arc::new(products),
            inventory: Arc::new(inventory),
            sales: Arc::new(sales),
            forecasting: Arc::new(forecasting),
        }
    }
}
