//! # Domain Types
//!
//! Core domain types of the inventory & cost ledger.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Catalog (read by the engine, CRUD owned elsewhere)                    │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐               │
//! │  │  Ingredient  │◄──│  RecipeLine  │──►│    Recipe    │               │
//! │  │ virtual_stock│   │ qty / batch  │   │ portions     │               │
//! │  │ unit_price   │   └──────────────┘   │ variants     │               │
//! │  └──────────────┘                      └──────────────┘               │
//! │                                                                         │
//! │  Write records (soft-deleted, never hard-deleted)                      │
//! │  Sale (+ StockMovement) · PurchaseOrder (+ lines) · WasteRecord        │
//! │                                                                         │
//! │  Accumulators (merged, not overwritten)                                │
//! │  DailyPurchaseRecord · DailySalesSummary                               │
//! │                                                                         │
//! │  Audit trail (append-only)                                             │
//! │  StockSnapshot · StockAdjustment · Alert                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every entity carries a UUID v4 string `id` and the `tenant_id` it belongs
//! to. Tenants never share rows.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;

// =============================================================================
// Ingredient
// =============================================================================

/// A stock-keeping ingredient.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Ingredient {
    pub id: String,
    pub tenant_id: String,
    pub name: String,

    /// Unit of measure stock is counted in ("kg", "l", "unit").
    pub unit: String,

    /// Price per purchased format, in cents.
    pub unit_price_cents: i64,

    /// Stock units contained in one purchased format.
    /// `None` means `unit_price_cents` is already per stock unit.
    pub format_quantity: Option<f64>,

    /// Usable fraction after trimming, in percent (default 100).
    pub yield_percent: f64,

    /// Ledger-derived quantity on hand.
    pub virtual_stock: f64,

    /// Manually counted figure waiting for consolidation.
    pub physical_stock: Option<f64>,

    pub min_stock: f64,

    /// Hidden from pickers when false; history is kept.
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Ingredient {
    /// Price of one stock unit, in fractional cents.
    ///
    /// ```text
    /// unit_price 1250 per 5 kg bag  →  250 cents / kg
    /// unit_price 320, no format     →  320 cents / kg
    /// ```
    pub fn unit_cost(&self) -> f64 {
        match self.format_quantity {
            Some(q) if q > crate::QUANTITY_EPSILON => self.unit_price_cents as f64 / q,
            _ => self.unit_price_cents as f64,
        }
    }

    /// Price of one *usable* stock unit, after yield loss.
    pub fn usable_unit_cost(&self) -> f64 {
        let yield_fraction = self.yield_percent / 100.0;
        if yield_fraction <= crate::QUANTITY_EPSILON {
            return self.unit_cost();
        }
        self.unit_cost() / yield_fraction
    }

    /// Converts a per-stock-unit price back into this ingredient's format price.
    pub fn format_price_for_unit_cost(&self, unit_cost_cents: i64) -> Money {
        match self.format_quantity {
            Some(q) if q > crate::QUANTITY_EPSILON => Money::from_cents(unit_cost_cents).times(q),
            _ => Money::from_cents(unit_cost_cents),
        }
    }

    /// True when stock fell under the configured minimum.
    pub fn is_below_minimum(&self) -> bool {
        self.min_stock > 0.0 && self.virtual_stock < self.min_stock
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

// =============================================================================
// Recipe
// =============================================================================

/// One composition line: how much of an ingredient a whole batch uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct RecipeLine {
    pub ingredient_id: String,
    /// Quantity per batch, in the ingredient's unit.
    pub quantity: f64,
    pub position: i64,
}

/// A named sub-item sold from a recipe (a glass from a bottle).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct RecipeVariant {
    pub id: String,
    pub recipe_id: String,
    pub name: String,
    /// Multiplier on both price and ingredient consumption.
    pub price_factor: f64,
    /// Own price; falls back to `recipe.sell_price × price_factor`.
    pub sell_price_cents: Option<i64>,
}

/// A sellable recipe.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Recipe {
    pub id: String,
    pub tenant_id: String,
    /// Short code printed on tickets, matched first on import.
    pub code: Option<String>,
    pub name: String,
    /// Portions one batch yields (≥ 1).
    pub portions: i64,
    pub sell_price_cents: i64,
    /// Last cost computed by the cost recalculation subscriber.
    pub cost_per_portion_cents: Option<i64>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,

    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub lines: Vec<RecipeLine>,

    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub variants: Vec<RecipeVariant>,
}

impl Recipe {
    #[inline]
    pub fn sell_price(&self) -> Money {
        Money::from_cents(self.sell_price_cents)
    }

    pub fn variant(&self, variant_id: &str) -> Option<&RecipeVariant> {
        self.variants.iter().find(|v| v.id == variant_id)
    }
}

// =============================================================================
// Sale
// =============================================================================

/// Where a sale came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleSource {
    /// Entered at the till.
    #[default]
    Manual,
    /// Ingested from an extracted document.
    Import,
}

/// A recorded sale. Immutable except for soft delete.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    pub tenant_id: String,
    pub recipe_id: String,
    pub variant_id: Option<String>,
    pub quantity: f64,
    pub unit_price_cents: i64,
    pub total_cents: i64,
    /// Variant factor applied at sale time (frozen).
    pub price_factor: f64,
    /// Ingredient cost booked into the daily summary (frozen).
    pub ingredient_cost_cents: i64,
    #[ts(as = "String")]
    pub sale_date: NaiveDate,
    pub source: SaleSource,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Sale {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    #[inline]
    pub fn ingredient_cost(&self) -> Money {
        Money::from_cents(self.ingredient_cost_cents)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Stock actually moved for one composition line of a sale.
///
/// `requested` is the proportional delta; `applied` is what the floor at
/// zero let through. Reversal restores `applied`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub ingredient_id: String,
    pub requested: f64,
    pub applied: f64,
}

// =============================================================================
// Purchase Orders
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseOrderStatus {
    #[default]
    Pending,
    Received,
    Cancelled,
}

impl PurchaseOrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseOrderStatus::Pending => "pending",
            PurchaseOrderStatus::Received => "received",
            PurchaseOrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for PurchaseOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseOrderLine {
    pub id: String,
    pub order_id: String,
    pub ingredient_id: String,
    pub ordered_quantity: f64,
    /// Explicit received amount; falls back to the ordered amount.
    pub received_quantity: Option<f64>,
    /// Price per stock unit, in cents.
    pub unit_price_cents: i64,
    pub position: i64,
}

impl PurchaseOrderLine {
    pub fn received(&self) -> f64 {
        self.received_quantity.unwrap_or(self.ordered_quantity)
    }

    pub fn line_total(&self) -> Money {
        Money::from_cents(self.unit_price_cents).times(self.received())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseOrder {
    pub id: String,
    pub tenant_id: String,
    pub supplier_reference: Option<String>,
    pub notes: Option<String>,
    pub status: PurchaseOrderStatus,
    #[ts(as = "Option<String>")]
    pub expected_on: Option<NaiveDate>,
    #[ts(as = "Option<String>")]
    pub received_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,

    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub lines: Vec<PurchaseOrderLine>,
}

impl PurchaseOrder {
    pub fn total(&self) -> Money {
        self.lines.iter().map(|l| l.line_total()).sum()
    }

    /// Business date the receipt is booked on.
    pub fn receipt_date(&self) -> Option<NaiveDate> {
        self.received_at.map(|at| at.date_naive())
    }
}

// =============================================================================
// Accumulators
// =============================================================================

/// Per (ingredient, date, tenant, source order) purchase accumulator.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DailyPurchaseRecord {
    pub id: String,
    pub tenant_id: String,
    pub ingredient_id: String,
    #[ts(as = "String")]
    pub purchase_date: NaiveDate,
    /// `None` for rows written before the per-order key existed.
    pub source_order_id: Option<String>,
    pub quantity_bought: f64,
    pub total_spent_cents: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl DailyPurchaseRecord {
    /// Derived average price per stock unit.
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.total_spent_cents).per(self.quantity_bought)
    }
}

/// Per (recipe, date, tenant) sales accumulator.
///
/// `gross_profit_cents == revenue_cents - ingredient_cost_cents` always.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct DailySalesSummary {
    pub id: String,
    pub tenant_id: String,
    pub recipe_id: String,
    #[ts(as = "String")]
    pub sale_date: NaiveDate,
    pub units_sold: f64,
    pub revenue_cents: i64,
    pub ingredient_cost_cents: i64,
    pub gross_profit_cents: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Waste
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct WasteRecord {
    pub id: String,
    pub tenant_id: String,
    /// `None` when the loss could not be matched to an ingredient.
    pub ingredient_id: Option<String>,
    pub description: Option<String>,
    pub quantity: f64,
    pub value_lost_cents: i64,
    pub reason: String,
    /// Reporting period, `year * 100 + month`.
    pub period: i64,
    #[ts(as = "String")]
    pub waste_date: NaiveDate,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Reporting period of a business date: `year * 100 + month`.
///
/// ```rust
/// use chrono::NaiveDate;
/// use galley_core::types::period_of;
///
/// let d = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
/// assert_eq!(period_of(d), 202603);
/// ```
pub fn period_of(date: NaiveDate) -> i64 {
    date.year() as i64 * 100 + date.month() as i64
}

// =============================================================================
// Audit Trail
// =============================================================================

/// Point-in-time record taken at consolidation.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockSnapshot {
    pub id: String,
    pub tenant_id: String,
    pub ingredient_id: String,
    pub consolidation_id: String,
    /// Virtual stock before the reset.
    pub virtual_stock: f64,
    /// Counted value the ledger was reset to.
    pub physical_stock: f64,
    /// `physical_stock - virtual_stock`.
    pub difference: f64,
    #[ts(as = "String")]
    pub taken_at: DateTime<Utc>,
}

/// Free-form manual correction note.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockAdjustment {
    pub id: String,
    pub tenant_id: String,
    pub ingredient_id: String,
    pub consolidation_id: Option<String>,
    pub quantity_delta: f64,
    pub note: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Ingredient stock fell below its minimum.
    LowStock,
    /// Recipe cost exceeded the food-cost threshold.
    FoodCost,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Alert {
    pub id: String,
    pub tenant_id: String,
    pub kind: AlertKind,
    pub subject_id: String,
    pub message: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ingredient(unit_price_cents: i64, format_quantity: Option<f64>, yield_percent: f64) -> Ingredient {
        let now = Utc::now();
        Ingredient {
            id: "flour".to_string(),
            tenant_id: "t1".to_string(),
            name: "Flour".to_string(),
            unit: "kg".to_string(),
            unit_price_cents,
            format_quantity,
            yield_percent,
            virtual_stock: 10.0,
            physical_stock: None,
            min_stock: 0.0,
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn test_unit_cost_uses_format_quantity() {
        assert!((ingredient(1250, Some(5.0), 100.0).unit_cost() - 250.0).abs() < 1e-9);
        assert!((ingredient(320, None, 100.0).unit_cost() - 320.0).abs() < 1e-9);
        // A zero format is treated as "price already per unit"
        assert!((ingredient(320, Some(0.0), 100.0).unit_cost() - 320.0).abs() < 1e-9);
    }

    #[test]
    fn test_usable_unit_cost_applies_yield() {
        let onion = ingredient(200, None, 80.0);
        assert!((onion.usable_unit_cost() - 250.0).abs() < 1e-9);
    }

    #[test]
    fn test_format_price_round_trip() {
        let flour = ingredient(1250, Some(5.0), 100.0);
        assert_eq!(flour.format_price_for_unit_cost(260).cents(), 1300);
    }

    #[test]
    fn test_below_minimum() {
        let mut flour = ingredient(100, None, 100.0);
        assert!(!flour.is_below_minimum());
        flour.min_stock = 12.0;
        assert!(flour.is_below_minimum());
    }

    #[test]
    fn test_order_line_received_falls_back_to_ordered() {
        let line = PurchaseOrderLine {
            id: "l1".to_string(),
            order_id: "po".to_string(),
            ingredient_id: "flour".to_string(),
            ordered_quantity: 10.0,
            received_quantity: None,
            unit_price_cents: 250,
            position: 0,
        };
        assert_eq!(line.received(), 10.0);
        assert_eq!(line.line_total().cents(), 2500);

        let partial = PurchaseOrderLine {
            received_quantity: Some(8.0),
            ..line
        };
        assert_eq!(partial.line_total().cents(), 2000);
    }

    #[test]
    fn test_period_of() {
        let d = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap();
        assert_eq!(period_of(d), 202512);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(PurchaseOrderStatus::Received.to_string(), "received");
        assert_eq!(PurchaseOrderStatus::default(), PurchaseOrderStatus::Pending);
    }
}
