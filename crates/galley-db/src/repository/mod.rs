//! # Repository Module
//!
//! Database repository implementations for the ledger.
//!
//! ## Two Kinds of Methods
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Pool methods (&self)                                                  │
//! │  ├── reads for reports, catalog writes, subscriber writes              │
//! │  └── each call borrows its own pooled connection                       │
//! │                                                                         │
//! │  Unit-of-work functions (conn: &mut SqliteConnection)                  │
//! │  ├── called by the engine with `&mut *tx`                              │
//! │  ├── `lock_*` touch the row with an UPDATE ... RETURNING, taking the   │
//! │  │   database write lock before anything is read                       │
//! │  └── never reach for the pool: the caller's transaction is the only    │
//! │      connection they may use                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every query is scoped by `tenant_id`; rows of another tenant are never
//! visible, even by id.
//!
//! ## Available Repositories
//!
//! - [`IngredientRepository`] - Ingredients and the stock figure
//! - [`RecipeRepository`] - Recipes with composition and variants
//! - [`SaleRepository`] - Sales and their recorded stock movements
//! - [`PurchaseRepository`] - Purchase orders and lines
//! - [`LedgerRepository`] - Daily purchase ledger and daily sales summaries
//! - [`WasteRepository`] - Waste records
//! - [`AuditRepository`] - Stock snapshots and adjustments
//! - [`AlertRepository`] - Alerts raised by subscribers

pub mod alert;
pub mod audit;
pub mod ingredient;
pub mod ledger;
pub mod purchase;
pub mod recipe;
pub mod sale;
pub mod waste;

pub use alert::AlertRepository;
pub use audit::AuditRepository;
pub use ingredient::{IngredientRepository, NewIngredient};
pub use ledger::LedgerRepository;
pub use purchase::PurchaseRepository;
pub use recipe::{NewRecipe, NewRecipeLine, NewVariant, RecipeRepository};
pub use sale::SaleRepository;
pub use waste::WasteRepository;

/// Generates a new UUID v4 string id.
pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
