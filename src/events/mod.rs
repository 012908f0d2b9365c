use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

// Events emitted by the services once their transaction has committed.
// A failed send is logged and swallowed; the ledger write already happened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Product events
    ProductCreated(Uuid),
    ProductUpdated(Uuid),
    ProductDeactivated(Uuid),

    // Sales ledger events
    SaleRecorded {
        sale_id: Uuid,
        product_id: Uuid,
        quantity: Decimal,
    },
    SaleEdited {
        sale_id: Uuid,
        product_id: Uuid,
        quantity_delta: Decimal,
    },
    SaleDeleted {
        sale_id: Uuid,
        product_id: Uuid,
        quantity_restored: Decimal,
    },

    // Inventory events
    InventoryAdjusted {
        owner_id: Uuid,
        product_id: Uuid,
        previous_quantity: Decimal,
        new_quantity: Decimal,
    },
    LowStockDetected {
        owner_id: Uuid,
        product_id: Uuid,
        quantity: Decimal,
        min_threshold: Decimal,
    },

    // Forecast events
    ForecastsGenerated {
        owner_id: Uuid,
        forecast_date: NaiveDate,
        product_count: usize,
    },
    ForecastActualsBackfilled {
        owner_id: Uuid,
        updated: u64,
    },
}

// Drains the event channel and logs each event at an appropriate level.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match event {
            Event::LowStockDetected {
                owner_id,
                product_id,
                quantity,
                min_threshold,
            } => {
                warn!(
                    %owner_id,
                    %product_id,
                    %quantity,
                    %min_threshold,
                    "Low stock detected"
                );
            }
            Event::InventoryAdjusted {
                owner_id,
                product_id,
                previous_quantity,
                new_quantity,
            } => {
                info!(
                    %owner_id,
                    %product_id,
                    %previous_quantity,
                    %new_quantity,
                    "Inventory adjusted"
                );
            }
            Event::ForecastsGenerated {
                owner_id,
                forecast_date,
                product_count,
            } => {
                info!(%owner_id, %forecast_date, product_count, "Forecasts generated");
            }
            other => {
                info!("Received event: {:?}", other);
            }
        }
    }

    warn!("Event processing loop has ended");
}
