//! Shared harness for integration tests. Each `TestApp` owns a fresh
//! in-memory SQLite database, so tests are isolated and can run in parallel.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use stockcast::{
    auth::Actor,
    config::ForecastTuning,
    db::{self, DbPool},
    entities::{product, sale},
    events::{self, EventSender},
    services::{
        factory::{ServiceContainer, ServiceFactory},
        products::CreateProductRequest,
        sales::RecordSaleRequest,
    },
};
use tokio::sync::mpsc;
use uuid::Uuid;

pub struct TestApp {
    pub db: Arc<DbPool>,
    pub services: ServiceContainer,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_tuning(ForecastTuning::default()).await
    }

    pub async fn with_tuning(tuning: ForecastTuning) -> Self {
        // Shared-cache keeps every pooled connection on the same database;
        // the uuid keeps parallel tests apart.
        let url = format!(
            "sqlite:file:{}?mode=memory&cache=shared",
            Uuid::new_v4().simple()
        );
        let pool = db::establish_connection(&url)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let factory = ServiceFactory::new(
            db_arc.clone(),
            Arc::new(EventSender::new(event_tx)),
            tuning,
        );
        let services = ServiceContainer::new(&factory);

        Self {
            db: db_arc,
            services,
            _event_task: event_task,
        }
    }

    /// Seeds an active sellable product priced at 5 per unit.
    pub async fn seed_product(&self, actor: &Actor, name: &str) -> product::Model {
        self.services
            .products
            .create_product(
                actor,
                CreateProductRequest {
                    name: name.to_string(),
                    unit: "pcs".to_string(),
                    price: dec!(5),
                    cost: dec!(2),
                    kind: product::ProductKind::Sellable,
                },
            )
            .await
            .expect("failed to seed product")
    }

    /// Seeds a product and puts `quantity` units in stock.
    pub async fn seed_stocked_product(
        &self,
        actor: &Actor,
        name: &str,
        quantity: Decimal,
    ) -> product::Model {
        let product = self.seed_product(actor, name).await;
        self.services
            .inventory
            .adjust(actor, product.id, quantity)
            .await
            .expect("failed to stock product");
        product
    }

    /// Records a sale dated `date` through an elevated actor, so history can
    /// be written on any date.
    pub async fn record_sale_on(
        &self,
        owner_id: Uuid,
        product_id: Uuid,
        date: NaiveDate,
        quantity: Decimal,
    ) -> sale::Model {
        let actor = Actor::elevated(owner_id);
        self.services
            .sales
            .record_sale(
                &actor,
                RecordSaleRequest {
                    product_id,
                    quantity,
                    unit_price: dec!(5),
                    notes: None,
                    sale_date: Some(date),
                    sale_time: None,
                },
            )
            .await
            .expect("failed to record dated sale")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub fn days_ago(n: i64) -> NaiveDate {
    Utc::now().date_naive() - Duration::days(n)
}

pub fn tomorrow() -> NaiveDate {
    Utc::now().date_naive() + Duration::days(1)
}
