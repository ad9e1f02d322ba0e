//! # Ledger Engine
//!
//! The write paths that move stock and feed the daily accumulators, plus the
//! read-only analytics built on them.
//!
//! ## Unit of Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate input                 ← rejected before any lock             │
//! │  read catalog (pool)            ← recipe / ingredients                 │
//! │  BEGIN                                                                  │
//! │    lock rows, ascending id      ← UPDATE ... RETURNING *               │
//! │    apply signed deltas          ← galley_core::ledger                  │
//! │    write sale / order / waste / audit rows                             │
//! │    merge daily accumulators                                            │
//! │  COMMIT                         ← any error before this rolls back     │
//! │  publish events                 ← best-effort                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! SQLite has no `SELECT ... FOR UPDATE`. Every unit of work opens with a
//! write statement, which takes the database write lock for the rest of the
//! transaction; concurrent units queue on `busy_timeout`.

pub mod consolidation;
pub mod menu;
pub mod purchases;
pub mod reports;
pub mod sales;
pub mod waste;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::EngineConfig;
use crate::error::DbResult;
use crate::events::EventBus;
use crate::pool::Database;
use crate::subscribers::{Alerter, CostRecalculator};

pub use consolidation::{ConsolidationItem, ConsolidationResult, StockConsolidator};
pub use menu::MenuEngineering;
pub use purchases::{NewPurchaseLine, NewPurchaseOrder, OrderUpdate, PurchaseReceiver, ReceivedQuantity};
pub use reports::{Reports, SalesReport, WasteReport};
pub use sales::{IngestIssue, IngestReport, SaleInput, SaleLineImport, SaleProcessor};
pub use waste::{WasteInput, WasteRecorder};

/// What a delete did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteOutcome {
    /// Effects were reversed and the row soft-deleted.
    Reversed,
    /// The row had no stock effects to undo; it was only soft-deleted.
    SoftDeleted,
    /// The row was already deleted; nothing changed.
    AlreadyDeleted,
}

/// Entry point bundling the database, the event bus and configuration.
#[derive(Debug, Clone)]
pub struct Engine {
    db: Database,
    bus: EventBus,
    config: EngineConfig,
}

impl Engine {
    pub fn new(db: Database, config: EngineConfig) -> Self {
        let bus = EventBus::new(config.events.channel_capacity, config.handler_timeout());
        Engine { db, bus, config }
    }

    /// Opens the configured database and builds the engine.
    pub async fn open(config: EngineConfig) -> DbResult<Self> {
        let db = Database::new(config.db_config()?).await?;
        Ok(Self::new(db, config))
    }

    /// Opens the engine and starts the default subscribers.
    pub async fn start(config: EngineConfig) -> DbResult<Self> {
        let engine = Self::open(config).await?;
        engine.spawn_default_subscribers();
        Ok(engine)
    }

    /// Starts cost recalculation and alerting.
    pub fn spawn_default_subscribers(&self) -> Vec<JoinHandle<()>> {
        info!("Starting default event subscribers");
        vec![
            self.bus.spawn_handler(CostRecalculator::new(self.db.clone(), self.bus.clone())),
            self.bus.spawn_handler(Alerter::new(self.db.clone(), self.config.food_cost_threshold())),
        ]
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =========================================================================
    // Services
    // =========================================================================

    pub fn sales(&self) -> SaleProcessor {
        SaleProcessor::new(self.db.clone(), self.bus.clone())
    }

    pub fn purchases(&self) -> PurchaseReceiver {
        PurchaseReceiver::new(self.db.clone(), self.bus.clone())
    }

    pub fn waste(&self) -> WasteRecorder {
        WasteRecorder::new(self.db.clone())
    }

    pub fn consolidation(&self) -> StockConsolidator {
        StockConsolidator::new(self.db.clone())
    }

    pub fn menu(&self) -> MenuEngineering {
        MenuEngineering::new(self.db.clone(), self.config.classifier_settings())
    }

    pub fn reports(&self) -> Reports {
        Reports::new(self.db.clone())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::pool::DbConfig;
    use crate::repository::{NewIngredient, NewRecipe};
    use galley_core::{Ingredient, Recipe};

    pub const TENANT: &str = "tenant-a";

    pub async fn engine() -> Engine {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        Engine::new(db, EngineConfig::default())
    }

    pub async fn ingredient(engine: &Engine, name: &str, price_cents: i64, stock: f64) -> Ingredient {
        engine
            .db()
            .ingredients()
            .create(TENANT, &NewIngredient::new(name, "kg", price_cents).with_stock(stock))
            .await
            .unwrap()
    }

    pub async fn recipe(engine: &Engine, input: NewRecipe) -> Recipe {
        engine.db().recipes().create(TENANT, &input).await.unwrap()
    }

    pub async fn stock_of(engine: &Engine, id: &str) -> f64 {
        engine.db().ingredients().require(TENANT, id).await.unwrap().virtual_stock
    }
}
