//! # Recipe Cost Resolver
//!
//! Computes what one portion of a recipe costs at current ingredient prices.
//!
//! ```text
//! cost_per_portion = Σ (line.quantity / portions) × ingredient.usable_unit_cost
//! ```
//!
//! The resolver is used by the sale processor (to book ingredient cost into
//! the daily summary), by menu engineering, and by the cost recalculation
//! subscriber that feeds food-cost alerts.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::{Ingredient, Recipe};

/// Resolved cost of one recipe portion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeCost {
    pub recipe_id: String,
    /// Fractional cents; round with [`RecipeCost::per_portion`].
    pub per_portion_cents: f64,
    /// Ingredient ids named by the recipe that could not be priced.
    pub unpriced: Vec<String>,
}

impl RecipeCost {
    pub fn per_portion(&self) -> Money {
        Money::from_cost(self.per_portion_cents)
    }

    /// Cost of `quantity` portions sold at variant factor `price_factor`.
    pub fn for_sale(&self, quantity: f64, price_factor: f64) -> Money {
        Money::from_cost(self.per_portion_cents * quantity * price_factor)
    }

    /// Share of the sell price eaten by ingredients (0.32 = 32 %).
    ///
    /// `None` when the sell price is zero.
    pub fn food_cost_ratio(&self, sell_price: Money) -> Option<f64> {
        if sell_price.cents() <= 0 {
            return None;
        }
        Some(self.per_portion_cents / sell_price.as_f64())
    }
}

/// Resolves a recipe's per-portion cost.
///
/// `ingredients` is keyed by ingredient id and must only contain rows of the
/// recipe's tenant. Lines whose ingredient is missing or soft-deleted
/// contribute nothing and are listed in `unpriced`.
pub fn resolve_recipe_cost(recipe: &Recipe, ingredients: &HashMap<String, Ingredient>) -> RecipeCost {
    let portions = recipe.portions.max(1) as f64;
    let mut per_portion_cents = 0.0;
    let mut unpriced = Vec::new();

    for line in &recipe.lines {
        match ingredients.get(&line.ingredient_id) {
            Some(ingredient) if !ingredient.is_deleted() => {
                per_portion_cents += (line.quantity / portions) * ingredient.usable_unit_cost();
            }
            _ => unpriced.push(line.ingredient_id.clone()),
        }
    }

    RecipeCost {
        recipe_id: recipe.id.clone(),
        per_portion_cents,
        unpriced,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
