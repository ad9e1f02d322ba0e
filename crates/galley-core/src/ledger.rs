//! # Ledger Math
//!
//! Stock deltas, sale pricing and accumulator merge rules. Everything the
//! engine writes to the database is computed here first.
//!
//! ## Stock Deltas
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Sale of `quantity` portions of a recipe, variant factor `f`:           │
//! │                                                                         │
//! │     delta(line) = (line.quantity / recipe.portions) × quantity × f      │
//! │                                                                         │
//! │  Deduction floors at zero:                                              │
//! │     stock 1.0, delta 1.5  →  stock 0.0, applied −1.0                    │
//! │                                                                         │
//! │  The applied amount is stored with the sale, so deleting it puts back  │
//! │  exactly what was taken, not what was asked for.                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Accumulators
//! Daily purchase and sales rows are merged: a second write for the same key
//! adds to the first. Reversal subtracts and clamps at zero.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::{DailySalesSummary, Recipe};
use crate::QUANTITY_EPSILON;

// =============================================================================
// Stock Deltas
// =============================================================================

/// Stock consumed by one composition line for a sale.
pub fn consumption_delta(line_quantity: f64, portions: i64, quantity: f64, price_factor: f64) -> f64 {
    let portions = portions.max(1) as f64;
    (line_quantity / portions) * quantity * price_factor
}

/// Per-ingredient consumption for selling `quantity` of `recipe`.
///
/// Lines naming the same ingredient are summed. The map iterates in
/// ascending ingredient id, which is the lock acquisition order.
pub fn plan_consumption(recipe: &Recipe, quantity: f64, price_factor: f64) -> BTreeMap<String, f64> {
    let mut plan = BTreeMap::new();
    for line in &recipe.lines {
        let delta = consumption_delta(line.quantity, recipe.portions, quantity, price_factor);
        *plan.entry(line.ingredient_id.clone()).or_insert(0.0) += delta;
    }
    plan
}

/// Result of applying a signed delta to a stock figure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StockChange {
    pub before: f64,
    pub after: f64,
    /// Signed delta that actually landed (`after - before`).
    pub applied: f64,
}

/// Removes `amount` from `current`, flooring at zero.
pub fn deduct(current: f64, amount: f64) -> StockChange {
    let after = (current - amount).max(0.0);
    StockChange {
        before: current,
        after,
        applied: after - current,
    }
}

/// Adds `amount` to `current`.
pub fn restore(current: f64, amount: f64) -> StockChange {
    let after = current + amount;
    StockChange {
        before: current,
        after,
        applied: amount,
    }
}

/// Authoritative reset to a counted value (negative counts clamp to zero).
pub fn reset(current: f64, counted: f64) -> StockChange {
    let after = counted.max(0.0);
    StockChange {
        before: current,
        after,
        applied: after - current,
    }
}

// =============================================================================
// Sale Pricing
// =============================================================================

/// Price resolution for one sale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SalePricing {
    pub unit_price: Money,
    pub price_factor: f64,
    pub total: Money,
}

/// Resolves unit price, variant factor and total.
///
/// ## Precedence
/// ```text
/// factor      = variant.price_factor            (1.0 without a variant)
/// total       = override_total                  if given
///             | unit_price × quantity
/// unit_price  = override_total / quantity       if a total was given
///             | override_price                  if given
///             | variant.sell_price              if the variant has one
///             | recipe.sell_price × factor
/// ```
///
/// A total that would leave the amount range is a validation error.
pub fn price_sale(
    recipe: &Recipe,
    variant_id: Option<&str>,
    override_price: Option<Money>,
    override_total: Option<Money>,
    quantity: f64,
) -> CoreResult<SalePricing> {
    let variant = match variant_id {
        Some(id) => Some(recipe.variant(id).ok_or_else(|| CoreError::VariantNotFound {
            recipe_id: recipe.id.clone(),
            variant_id: id.to_string(),
        })?),
        None => None,
    };

    let price_factor = variant.map(|v| v.price_factor).unwrap_or(1.0);

    if let Some(total) = override_total {
        return Ok(SalePricing {
            unit_price: total.per(quantity),
            price_factor,
            total,
        });
    }

    let list_price = match variant.and_then(|v| v.sell_price_cents) {
        Some(cents) => Money::from_cents(cents),
        None => recipe
            .sell_price()
            .checked_times(price_factor)
            .ok_or_else(|| ValidationError::amount_out_of_range("unit_price"))?,
    };
    let unit_price = override_price.unwrap_or(list_price);
    let total = unit_price
        .checked_times(quantity)
        .ok_or_else(|| ValidationError::amount_out_of_range("total"))?;

    Ok(SalePricing {
        unit_price,
        price_factor,
        total,
    })
}

// =============================================================================
// Sales Accumulator
// =============================================================================

/// The additive part of a daily sales row.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SalesTotals {
    pub units_sold: f64,
    pub revenue: Money,
    pub ingredient_cost: Money,
}

impl SalesTotals {
    pub fn gross_profit(&self) -> Money {
        self.revenue - self.ingredient_cost
    }

    /// Adds a contribution. Fails rather than wrap when a running amount
    /// would leave the representable range.
    pub fn merged(&self, other: &SalesTotals) -> CoreResult<SalesTotals> {
        Ok(SalesTotals {
            units_sold: self.units_sold + other.units_sold,
            revenue: self
                .revenue
                .checked_add(other.revenue)
                .ok_or_else(|| ValidationError::amount_out_of_range("revenue"))?,
            ingredient_cost: self
                .ingredient_cost
                .checked_add(other.ingredient_cost)
                .ok_or_else(|| ValidationError::amount_out_of_range("ingredient_cost"))?,
        })
    }

    /// Removes a contribution; each field clamps at zero.
    pub fn reversed(&self, other: &SalesTotals) -> SalesTotals {
        SalesTotals {
            units_sold: (self.units_sold - other.units_sold).max(0.0),
            revenue: (self.revenue - other.revenue).floor_zero(),
            ingredient_cost: (self.ingredient_cost - other.ingredient_cost).floor_zero(),
        }
    }
}

impl DailySalesSummary {
    pub fn totals(&self) -> SalesTotals {
        SalesTotals {
            units_sold: self.units_sold,
            revenue: Money::from_cents(self.revenue_cents),
            ingredient_cost: Money::from_cents(self.ingredient_cost_cents),
        }
    }

    /// Overwrites the additive fields and recomputes gross profit.
    pub fn set_totals(&mut self, totals: SalesTotals) {
        self.units_sold = totals.units_sold;
        self.revenue_cents = totals.revenue.cents();
        self.ingredient_cost_cents = totals.ingredient_cost.cents();
        self.gross_profit_cents = totals.gross_profit().cents();
    }
}

// =============================================================================
// Purchase Accumulator
// =============================================================================

/// The additive part of a daily purchase row.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PurchaseTotals {
    pub quantity: f64,
    pub total: Money,
}

impl PurchaseTotals {
    pub fn merged(&self, other: &PurchaseTotals) -> CoreResult<PurchaseTotals> {
        Ok(PurchaseTotals {
            quantity: self.quantity + other.quantity,
            total: self
                .total
                .checked_add(other.total)
                .ok_or_else(|| ValidationError::amount_out_of_range("total_spent"))?,
        })
    }

    pub fn reversed(&self, other: &PurchaseTotals) -> PurchaseTotals {
        PurchaseTotals {
            quantity: self.quantity - other.quantity,
            total: (self.total - other.total).floor_zero(),
        }
    }

    /// Nothing left: the accumulator row should go.
    pub fn is_exhausted(&self) -> bool {
        self.quantity <= QUANTITY_EPSILON
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RecipeLine, RecipeVariant};
    use chrono::Utc;

    fn recipe() -> Recipe {
        let now = Utc::now();
        Recipe {
            id: "wine".to_string(),
            tenant_id: "t1".to_string(),
            code: Some("RIOJA".to_string()),
            name: "Rioja bottle".to_string(),
            portions: 1,
            sell_price_cents: 2400,
            cost_per_portion_cents: None,
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            lines: vec![
                RecipeLine {
                    ingredient_id: "z-wine".to_string(),
                    quantity: 0.75,
                    position: 0,
                },
                RecipeLine {
                    ingredient_id: "a-cork".to_string(),
                    quantity: 1.0,
                    position: 1,
                },
            ],
            variants: vec![RecipeVariant {
                id: "glass".to_string(),
                recipe_id: "wine".to_string(),
                name: "Glass".to_string(),
                price_factor: 0.2,
                sell_price_cents: None,
            }],
        }
    }

    #[test]
    fn test_consumption_delta_divides_by_portions() {
        assert!((consumption_delta(2.0, 4, 3.0, 1.0) - 1.5).abs() < 1e-12);
        assert!((consumption_delta(2.0, 4, 3.0, 0.5) - 0.75).abs() < 1e-12);
        // portions below one are treated as one
        assert!((consumption_delta(2.0, 0, 1.0, 1.0) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_plan_is_sorted_and_summed() {
        let mut r = recipe();
        r.lines.push(RecipeLine {
            ingredient_id: "a-cork".to_string(),
            quantity: 1.0,
            position: 2,
        });
        let plan = plan_consumption(&r, 2.0, 1.0);
        let ids: Vec<&String> = plan.keys().collect();
        assert_eq!(ids, vec!["a-cork", "z-wine"]);
        assert!((plan["a-cork"] - 4.0).abs() < 1e-12);
        assert!((plan["z-wine"] - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_deduct_floors_at_zero() {
        let change = deduct(1.0, 1.5);
        assert_eq!(change.after, 0.0);
        assert_eq!(change.applied, -1.0);

        let change = deduct(5.0, 1.5);
        assert_eq!(change.after, 3.5);
        assert_eq!(change.applied, -1.5);
    }

    #[test]
    fn test_reset_is_authoritative() {
        let change = reset(12.0, 7.5);
        assert_eq!(change.after, 7.5);
        assert_eq!(change.applied, -4.5);

        let change = reset(3.0, -2.0);
        assert_eq!(change.after, 0.0);
    }

    #[test]
    fn test_price_sale_base() {
        let pricing = price_sale(&recipe(), None, None, None, 2.0).unwrap();
        assert_eq!(pricing.unit_price.cents(), 2400);
        assert_eq!(pricing.price_factor, 1.0);
        assert_eq!(pricing.total.cents(), 4800);
    }

    #[test]
    fn test_price_sale_variant_scales_price() {
        let pricing = price_sale(&recipe(), Some("glass"), None, None, 3.0).unwrap();
        assert_eq!(pricing.unit_price.cents(), 480);
        assert_eq!(pricing.price_factor, 0.2);
        assert_eq!(pricing.total.cents(), 1440);
    }

    #[test]
    fn test_price_sale_variant_own_price_and_override() {
        let mut r = recipe();
        r.variants[0].sell_price_cents = Some(550);
        let pricing = price_sale(&r, Some("glass"), None, None, 1.0).unwrap();
        assert_eq!(pricing.unit_price.cents(), 550);

        let pricing = price_sale(&r, Some("glass"), Some(Money::from_cents(500)), None, 2.0).unwrap();
        assert_eq!(pricing.unit_price.cents(), 500);
        assert_eq!(pricing.total.cents(), 1000);
        assert_eq!(pricing.price_factor, 0.2);
    }

    #[test]
    fn test_price_sale_keeps_explicit_total() {
        let pricing = price_sale(&recipe(), None, None, Some(Money::from_cents(1000)), 3.0).unwrap();
        assert_eq!(pricing.total.cents(), 1000);
        assert_eq!(pricing.unit_price.cents(), 333);
        assert_eq!(pricing.price_factor, 1.0);
    }

    #[test]
    fn test_price_sale_rejects_unrepresentable_total() {
        let err = price_sale(&recipe(), None, Some(Money::from_cents(i64::MAX / 2)), None, 1e9).unwrap_err();
        assert!(matches!(err, CoreError::Validation(ValidationError::OutOfRange { .. })));
    }

    #[test]
    fn test_merge_refuses_to_overflow() {
        let full = SalesTotals {
            units_sold: 1.0,
            revenue: Money::from_cents(crate::MAX_AMOUNT_CENTS),
            ingredient_cost: Money::zero(),
        };
        let more = SalesTotals {
            units_sold: 1.0,
            revenue: Money::from_cents(1),
            ingredient_cost: Money::zero(),
        };
        assert!(full.merged(&more).is_err());

        let row = PurchaseTotals {
            quantity: 1.0,
            total: Money::from_cents(i64::MAX),
        };
        assert!(row.merged(&row).is_err());
    }

    #[test]
    fn test_price_sale_unknown_variant() {
        let err = price_sale(&recipe(), Some("magnum"), None, None, 1.0).unwrap_err();
        assert!(matches!(err, CoreError::VariantNotFound { .. }));
    }

    #[test]
    fn test_sales_totals_merge_and_reverse_keep_profit_invariant() {
        let a = SalesTotals {
            units_sold: 2.0,
            revenue: Money::from_cents(1000),
            ingredient_cost: Money::from_cents(300),
        };
        let b = SalesTotals {
            units_sold: 1.0,
            revenue: Money::from_cents(500),
            ingredient_cost: Money::from_cents(900),
        };
        let merged = a.merged(&b).unwrap();
        assert_eq!(merged.gross_profit().cents(), 300);

        let back = merged.reversed(&b);
        assert_eq!(back, a);

        // over-reversal clamps every field
        let empty = a.reversed(&merged);
        assert_eq!(empty.units_sold, 0.0);
        assert_eq!(empty.revenue, Money::zero());
        assert_eq!(empty.ingredient_cost, Money::zero());
        assert_eq!(empty.gross_profit(), Money::zero());
    }

    #[test]
    fn test_purchase_totals_exhaustion() {
        let row = PurchaseTotals {
            quantity: 10.0,
            total: Money::from_cents(2500),
        };
        let part = PurchaseTotals {
            quantity: 4.0,
            total: Money::from_cents(1000),
        };
        let left = row.reversed(&part);
        assert!(!left.is_exhausted());
        assert_eq!(left.total.cents(), 1500);
        assert!(left.reversed(&PurchaseTotals { quantity: 6.0, total: Money::from_cents(1500) }).is_exhausted());
    }
}
