use crate::{
    auth::Actor,
    config::ForecastTuning,
    db::DbPool,
    entities::{
        forecast::{self, Column as ForecastColumn, Entity as Forecast},
        inventory_balance::{self, Entity as InventoryBalance},
        product::{self, Column as ProductColumn, Entity as Product, ProductKind},
        sale::{Column as SaleColumn, Entity as Sale},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    ml::demand::{classify_priority, mape, DemandModel, ProductionPriority},
};
use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, SqlErr};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Outcome of one generation run.
#[derive(Debug)]
pub struct GenerationSummary {
    pub forecast_date: NaiveDate,
    pub forecasts: Vec<forecast::Model>,
    /// Rows written by this run; zero when the date was already covered.
    pub generated: usize,
    /// Products skipped for not having enough sale history.
    pub skipped: usize,
    /// Products whose generation failed; the run continues past them.
    pub failed: usize,
    /// Past forecast rows that received their realized quantity.
    pub backfilled: u64,
}

/// One line of the production plan for a date.
#[derive(Debug, Clone)]
pub struct ProductionPlanEntry {
    pub product: product::Model,
    pub forecast: forecast::Model,
    pub current_stock: Decimal,
    pub is_low_stock: bool,
    pub priority: ProductionPriority,
}

/// Generates day-ahead demand forecasts from the sales ledger and scores
/// them once the day's real sales are known.
pub struct ForecastingService {
    db_pool: Arc<DbPool>,
    event_sender: Arc<EventSender>,
    tuning: ForecastTuning,
}

impl ForecastingService {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        tuning: ForecastTuning,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            tuning,
        }
    }

    /// Generates tomorrow's forecasts for every active sellable product.
    ///
    /// Idempotent per date: when rows for tomorrow already exist they are
    /// returned unchanged and nothing is written. Otherwise the run first
    /// back-fills actuals for past dates, then forecasts each product in
    /// isolation; one product failing does not stop the rest.
    #[instrument(skip(self, actor), fields(owner_id = %actor.owner_id))]
    pub async fn generate_for_tomorrow(
        &self,
        actor: &Actor,
    ) -> Result<GenerationSummary, ServiceError> {
        let owner_id = actor.owner_id;
        let today = Utc::now().date_naive();
        let target = today + Duration::days(1);

        let existing = self.get_for_date(actor, target).await?;
        if !existing.is_empty() {
            info!(
                forecast_date = %target,
                count = existing.len(),
                "Forecasts already exist, returning them unchanged"
            );
            return Ok(GenerationSummary {
                forecast_date: target,
                forecasts: existing,
                generated: 0,
                skipped: 0,
                failed: 0,
                backfilled: 0,
            });
        }

        let backfilled = self.backfill_actuals(actor).await?;

        let products = Product::find()
            .filter(ProductColumn::OwnerId.eq(owner_id))
            .filter(ProductColumn::IsActive.eq(true))
            .filter(ProductColumn::Kind.eq(ProductKind::Sellable))
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        let window_start = today - Duration::days(i64::from(self.tuning.history_window_days) - 1);
        let model = DemandModel::from_tuning(&self.tuning);

        let mut forecasts = Vec::new();
        let mut generated = 0usize;
        let mut skipped = 0usize;
        let mut failed = 0usize;

        for product in products {
            match self
                .forecast_product(owner_id, &product, target, window_start, today, &model)
                .await
            {
                Ok(row) => {
                    forecasts.push(row);
                    generated += 1;
                }
                Err(ServiceError::InsufficientHistory { distinct_days, .. }) => {
                    info!(
                        product_id = %product.id,
                        distinct_days,
                        "Skipping forecast, not enough sale history"
                    );
                    skipped += 1;
                }
                Err(e) => {
                    warn!(
                        product_id = %product.id,
                        error = %e,
                        "Forecast generation failed for product, continuing with the rest"
                    );
                    failed += 1;
                }
            }
        }

        info!(
            forecast_date = %target,
            generated,
            skipped,
            failed,
            backfilled,
            "Forecast generation complete"
        );

        if generated > 0 {
            if let Err(e) = self
                .event_sender
                .send(Event::ForecastsGenerated {
                    owner_id,
                    forecast_date: target,
                    product_count: generated,
                })
                .await
            {
                warn!(error = %e, "Failed to send forecasts generated event");
            }
        }

        Ok(GenerationSummary {
            forecast_date: target,
            forecasts,
            generated,
            skipped,
            failed,
            backfilled,
        })
    }

    /// Forecast rows for one date, highest predicted demand first.
    pub async fn get_for_date(
        &self,
        actor: &Actor,
        date: NaiveDate,
    ) -> Result<Vec<forecast::Model>, ServiceError> {
        Forecast::find()
            .filter(ForecastColumn::OwnerId.eq(actor.owner_id))
            .filter(ForecastColumn::ForecastDate.eq(date))
            .order_by_desc(ForecastColumn::PredictedQuantity)
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)
    }

    /// Fills `actual_quantity` on every past-dated forecast that does not
    /// have one yet, summing that day's sales of the product. A day without
    /// sales back-fills as zero; it still counts as an observation.
    #[instrument(skip(self, actor), fields(owner_id = %actor.owner_id))]
    pub async fn backfill_actuals(&self, actor: &Actor) -> Result<u64, ServiceError> {
        let owner_id = actor.owner_id;
        let today = Utc::now().date_naive();
        let db = self.db_pool.as_ref();

        let pending = Forecast::find()
            .filter(ForecastColumn::OwnerId.eq(owner_id))
            .filter(ForecastColumn::ActualQuantity.is_null())
            .filter(ForecastColumn::ForecastDate.lt(today))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let mut updated = 0u64;
        for row in pending {
            let sold: Decimal = Sale::find()
                .filter(SaleColumn::OwnerId.eq(owner_id))
                .filter(SaleColumn::ProductId.eq(row.product_id))
                .filter(SaleColumn::SaleDate.eq(row.forecast_date))
                .all(db)
                .await
                .map_err(ServiceError::db_error)?
                .into_iter()
                .map(|s| s.quantity)
                .sum();

            let actual = sold
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .to_i32()
                .unwrap_or(0);

            let mut active: forecast::ActiveModel = row.into();
            active.actual_quantity = Set(Some(actual));
            active.updated_at = Set(Some(Utc::now()));
            active.update(db).await.map_err(ServiceError::db_error)?;
            updated += 1;
        }

        if updated > 0 {
            info!(updated, "Back-filled forecast actuals");
            if let Err(e) = self
                .event_sender
                .send(Event::ForecastActualsBackfilled { owner_id, updated })
                .await
            {
                warn!(error = %e, "Failed to send actuals backfilled event");
            }
        }

        Ok(updated)
    }

    /// Accuracy score over the trailing window, as a percentage with one
    /// decimal. Only rows whose actual is known participate; zero-actual
    /// rows are excluded from the error mean. No eligible rows scores 0.0.
    #[instrument(skip(self, actor), fields(owner_id = %actor.owner_id, trailing_days))]
    pub async fn accuracy(&self, actor: &Actor, trailing_days: u32) -> Result<f64, ServiceError> {
        let today = Utc::now().date_naive();
        let from = today - Duration::days(i64::from(trailing_days) + 1);
        let to = today - Duration::days(1);

        let rows = Forecast::find()
            .filter(ForecastColumn::OwnerId.eq(actor.owner_id))
            .filter(ForecastColumn::ForecastDate.between(from, to))
            .filter(ForecastColumn::ActualQuantity.is_not_null())
            .all(self.db_pool.as_ref())
            .await
            .map_err(ServiceError::db_error)?;

        let pairs: Vec<(f64, f64)> = rows
            .iter()
            .filter_map(|r| {
                r.actual_quantity
                    .map(|actual| (f64::from(r.predicted_quantity), f64::from(actual)))
            })
            .collect();

        let score = match mape(&pairs) {
            Some(m) => {
                let pct = (1.0 - m).max(0.0) * 100.0;
                (pct * 10.0).round() / 10.0
            }
            None => 0.0,
        };

        Ok(score)
    }

    /// The production plan for a date: every forecast joined with its
    /// product and current stock, classified by urgency and ordered most
    /// urgent first. The classification is derived on read, never stored.
    pub async fn production_plan(
        &self,
        actor: &Actor,
        date: NaiveDate,
    ) -> Result<Vec<ProductionPlanEntry>, ServiceError> {
        let owner_id = actor.owner_id;
        let db = self.db_pool.as_ref();

        let rows = Forecast::find()
            .filter(ForecastColumn::OwnerId.eq(owner_id))
            .filter(ForecastColumn::ForecastDate.eq(date))
            .find_also_related(Product)
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        let balances: HashMap<Uuid, inventory_balance::Model> = InventoryBalance::find()
            .filter(inventory_balance::Column::OwnerId.eq(owner_id))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|b| (b.product_id, b))
            .collect();

        let mut entries = Vec::new();
        for (forecast, product) in rows {
            let product = product.ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Product {} referenced by forecast {} not found",
                    forecast.product_id, forecast.id
                ))
            })?;
            if !product.is_active {
                continue;
            }

            let balance = balances.get(&forecast.product_id);
            let current_stock = balance.map(|b| b.quantity).unwrap_or(Decimal::ZERO);
            // No balance row means zero stock, which is low by definition.
            let is_low_stock = balance.map(|b| b.is_low()).unwrap_or(true);
            let priority = classify_priority(
                current_stock.to_f64().unwrap_or(0.0),
                forecast.predicted_quantity,
                self.tuning.high_priority_stock_ratio,
            );

            entries.push(ProductionPlanEntry {
                product,
                forecast,
                current_stock,
                is_low_stock,
                priority,
            });
        }

        entries.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(b.forecast.predicted_quantity.cmp(&a.forecast.predicted_quantity))
        });

        Ok(entries)
    }

    async fn forecast_product(
        &self,
        owner_id: Uuid,
        product: &product::Model,
        target: NaiveDate,
        window_start: NaiveDate,
        today: NaiveDate,
        model: &DemandModel,
    ) -> Result<forecast::Model, ServiceError> {
        let db = self.db_pool.as_ref();

        let sales = Sale::find()
            .filter(SaleColumn::OwnerId.eq(owner_id))
            .filter(SaleColumn::ProductId.eq(product.id))
            .filter(SaleColumn::SaleDate.between(window_start, today))
            .all(db)
            .await
            .map_err(ServiceError::db_error)?;

        // One data point per calendar day; BTreeMap keeps them ascending.
        let mut per_day: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
        for sale in sales {
            *per_day.entry(sale.sale_date).or_insert(Decimal::ZERO) += sale.quantity;
        }

        if per_day.len() < self.tuning.min_history_days as usize {
            return Err(ServiceError::InsufficientHistory {
                product_id: product.id,
                distinct_days: per_day.len(),
            });
        }

        let history: Vec<(NaiveDate, f64)> = per_day
            .into_iter()
            .map(|(date, quantity)| (date, quantity.to_f64().unwrap_or(0.0)))
            .collect();

        let prediction = model.predict(&history, target);

        let row = forecast::ActiveModel {
            id: Set(Uuid::new_v4()),
            owner_id: Set(owner_id),
            product_id: Set(product.id),
            forecast_date: Set(target),
            predicted_quantity: Set(prediction.predicted_quantity),
            confidence_score: Set(prediction.confidence),
            actual_quantity: Set(None),
            model_version: Set(self.tuning.model_version.clone()),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        };

        match row.insert(db).await {
            Ok(inserted) => Ok(inserted),
            // A concurrent run won the unique (owner, product, date) race;
            // its row is the result.
            Err(err) => match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => Forecast::find()
                    .filter(ForecastColumn::OwnerId.eq(owner_id))
                    .filter(ForecastColumn::ProductId.eq(product.id))
                    .filter(ForecastColumn::ForecastDate.eq(target))
                    .one(db)
                    .await
                    .map_err(ServiceError::db_error)?
                    .ok_or(ServiceError::DatabaseError(err)),
                _ => Err(ServiceError::DatabaseError(err)),
            },
        }
    }
}
