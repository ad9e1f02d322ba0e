//! # galley-core: Pure Ledger Logic for Galley
//!
//! This crate holds the arithmetic and the rules of the inventory & cost
//! ledger as pure functions. Nothing in here touches a database, a socket
//! or a clock that the caller did not hand in.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Galley Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          HTTP layer / document extraction (external)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ tenant id + request                    │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               galley-db (engine + SQLite)                       │   │
//! │  │   SaleProcessor, PurchaseReceiver, WasteRecorder, ...           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ pure calls                             │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ galley-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────────────┐  │   │
//! │  │   │  types   │ │  ledger  │ │   cost   │ │       menu       │  │   │
//! │  │   │ Recipe   │ │ deltas   │ │ resolver │ │ star/workhorse/  │  │   │
//! │  │   │ Sale ... │ │ merges   │ │          │ │ puzzle/dog       │  │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Ingredient, Recipe, Sale, PurchaseOrder, ...)
//! - [`money`] - Money type with integer cents
//! - [`ledger`] - Stock deltas and accumulator merge rules
//! - [`cost`] - Recipe cost resolver
//! - [`menu`] - Menu engineering classifier
//! - [`events`] - Domain events published after commit
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation, run before any lock is taken
//!
//! ## Example Usage
//!
//! ```rust
//! use galley_core::ledger::{consumption_delta, deduct};
//!
//! // 2 kg of flour per batch of 4 portions, selling 3 portions at factor 1.0
//! let delta = consumption_delta(2.0, 4, 3.0, 1.0);
//! assert!((delta - 1.5).abs() < 1e-9);
//!
//! // Stock floors at zero
//! let change = deduct(1.0, delta);
//! assert_eq!(change.after, 0.0);
//! assert_eq!(change.applied, -1.0);
//! ```

pub mod cost;
pub mod error;
pub mod events;
pub mod ledger;
pub mod menu;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use events::DomainEvent;
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Tolerance used when comparing stock quantities.
///
/// Quantities are `f64` (kilograms, litres, units); anything closer than this
/// is considered equal, and a remaining accumulator quantity at or below it
/// counts as empty.
pub const QUANTITY_EPSILON: f64 = 1e-9;

/// Default popularity threshold factor for menu engineering.
///
/// A recipe is "popular" when it sold at least this fraction of the mean.
pub const DEFAULT_POPULARITY_FACTOR: f64 = 0.7;

/// Largest quantity accepted on input (sale, receipt, waste, count).
pub const MAX_QUANTITY: f64 = 1_000_000_000.0;

/// Largest price or amount accepted on input, in cents.
pub const MAX_PRICE_CENTS: i64 = 100_000_000;

/// Ceiling for any computed amount or accumulator, in cents.
///
/// `MAX_QUANTITY × MAX_PRICE_CENTS` does not exceed it, and it leaves room
/// under `i64::MAX` for many such amounts to be summed.
pub const MAX_AMOUNT_CENTS: i64 = 100_000_000_000_000_000;

/// Maximum number of lines accepted in one batch (waste, consolidation,
/// purchase order, sale-line import).
pub const MAX_BATCH_LINES: usize = 500;
