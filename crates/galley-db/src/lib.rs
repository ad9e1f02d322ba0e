//! # galley-db: Persistence and Ledger Engine for Galley
//!
//! This crate owns every stock mutation of the inventory & cost ledger.
//! It stores everything in SQLite through sqlx and runs each write path as
//! one transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Galley Data Flow                                 │
//! │                                                                         │
//! │  HTTP handler / import job (external)                                  │
//! │       │ tenant id + input                                               │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     galley-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐   ┌───────────────┐   ┌───────────────┐   │   │
//! │  │   │    Engine     │   │ Repositories  │   │   Event bus   │   │   │
//! │  │   │  (engine/)    │──►│ (repository/) │   │  (events.rs)  │   │   │
//! │  │   │ SaleProcessor │   │ IngredientRepo│   │ CostRecalc... │   │   │
//! │  │   │ PurchaseRecv. │   │ LedgerRepo    │   │ Alerter       │   │   │
//! │  │   │ WasteRecorder │   │ ...           │   │               │   │   │
//! │  │   └───────┬───────┘   └───────┬───────┘   └───────▲───────┘   │   │
//! │  │           │ publish after commit                  │           │   │
//! │  │           └───────────────────────────────────────┘           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (WAL)                       │   │
//! │  │   ~/.local/share/galley/galley.db                               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`config`] - TOML configuration with environment overrides
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (ingredient, sale, ...)
//! - [`engine`] - Units of work and read-side analytics
//! - [`events`] - In-process event bus
//! - [`subscribers`] - Cost recalculation and alerting
//!
//! ## Usage
//!
//! ```rust,ignore
//! use galley_db::{Engine, EngineConfig, SaleInput};
//!
//! let engine = Engine::start(EngineConfig::load_or_default(None)).await?;
//!
//! let sale = engine
//!     .sales()
//!     .process_sale("tenant-a", &SaleInput::new(&recipe_id, 2.0, today))
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod subscribers;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::EngineConfig;
pub use engine::{
    ConsolidationItem, ConsolidationResult, DeleteOutcome, Engine, IngestIssue, IngestReport, MenuEngineering,
    NewPurchaseLine, NewPurchaseOrder, OrderUpdate, PurchaseReceiver, ReceivedQuantity, Reports, SaleInput,
    SaleLineImport, SaleProcessor, SalesReport, StockConsolidator, WasteInput, WasteRecorder, WasteReport,
};
pub use error::{DbError, DbResult};
pub use events::{EventBus, EventHandler};
pub use pool::{Database, DbConfig};
pub use subscribers::{Alerter, CostRecalculator};

// Repository re-exports for convenience
pub use repository::alert::AlertRepository;
pub use repository::audit::AuditRepository;
pub use repository::ingredient::{IngredientRepository, NewIngredient};
pub use repository::ledger::LedgerRepository;
pub use repository::purchase::PurchaseRepository;
pub use repository::recipe::{NewRecipe, RecipeRepository};
pub use repository::sale::SaleRepository;
pub use repository::waste::WasteRepository;
