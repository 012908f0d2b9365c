use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use sea_orm::{EntityTrait, QuerySelect};
use tokio::sync::mpsc;
use tracing::{error, info};
use uuid::Uuid;

use stockcast as app;
use stockcast::entities::product;

/// Nightly forecast runner: back-fills actuals and generates tomorrow's
/// demand forecasts from the sales ledger.
#[derive(Parser, Debug)]
#[command(
    name = "stockcast",
    version,
    about = "Generates day-ahead demand forecasts from the sales ledger"
)]
struct Cli {
    /// Run for one owner only; the default covers every owner with products
    #[arg(long)]
    owner: Option<Uuid>,

    /// Trailing window for the accuracy report, in days
    #[arg(long, default_value_t = 7)]
    accuracy_days: u32,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = app::config::load_config().context("failed to load configuration")?;
    app::config::init_tracing(cfg.log_level(), cfg.log_json);

    info!(environment = %cfg.environment, "🚀 stockcast starting");

    // Init DB
    let db_pool = app::db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to the database")?;
    if cfg.auto_migrate {
        app::db::run_migrations(&db_pool)
            .await
            .context("failed running migrations")?;
    }

    let db_arc = Arc::new(db_pool);

    // Init events
    let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
    let events_task = tokio::spawn(app::events::process_events(event_rx));

    // Build services
    let factory = app::services::factory::ServiceFactory::new(
        db_arc.clone(),
        Arc::new(app::events::EventSender::new(event_tx)),
        cfg.forecast.clone(),
    );
    let services = app::services::factory::ServiceContainer::new(&factory);

    let owners = match cli.owner {
        Some(owner) => vec![owner],
        None => distinct_owners(db_arc.as_ref()).await?,
    };

    if owners.is_empty() {
        info!("No owners with products, nothing to forecast");
    }

    for owner_id in owners {
        let actor = app::auth::Actor::user(owner_id);

        match services.forecasting.generate_for_tomorrow(&actor).await {
            Ok(summary) => {
                info!(
                    %owner_id,
                    forecast_date = %summary.forecast_date,
                    generated = summary.generated,
                    skipped = summary.skipped,
                    failed = summary.failed,
                    backfilled = summary.backfilled,
                    "Forecast run complete"
                );

                match services
                    .forecasting
                    .accuracy(&actor, cli.accuracy_days)
                    .await
                {
                    Ok(score) => {
                        info!(
                            %owner_id,
                            trailing_days = cli.accuracy_days,
                            accuracy = score,
                            "Forecast accuracy"
                        );
                    }
                    Err(e) => error!(%owner_id, error = %e, "Accuracy report failed"),
                }
            }
            // One owner failing should not take down the whole batch.
            Err(e) => {
                error!(%owner_id, error = %e, "Forecast run failed");
            }
        }
    }

    // Dropping the services closes the event channel so the logger drains.
    drop(services);
    drop(factory);
    let _ = events_task.await;

    Ok(())
}

async fn distinct_owners(db: &app::db::DbPool) -> anyhow::Result<Vec<Uuid>> {
    product::Entity::find()
        .select_only()
        .column(product::Column::OwnerId)
        .distinct()
        .into_tuple::<Uuid>()
        .all(db)
        .await
        .context("failed to list owners")
}
