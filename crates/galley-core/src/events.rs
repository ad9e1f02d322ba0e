//! # Domain Events
//!
//! Typed events published after a write commits.
//!
//! ```text
//! ┌────────────────────────────┬──────────────────────────────────────────┐
//! │ event                      │ published by                             │
//! ├────────────────────────────┼──────────────────────────────────────────┤
//! │ ingredient.price.changed   │ purchase receiver (line price differs)   │
//! │ recipe.cost.updated        │ cost recalculation subscriber            │
//! │ sale.registered            │ sale processor                           │
//! └────────────────────────────┴──────────────────────────────────────────┘
//! ```
//!
//! Delivery is best-effort. Nothing in the stock or ledger state depends on
//! a subscriber having seen an event.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Event published on the in-process bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    IngredientPriceChanged {
        tenant_id: String,
        ingredient_id: String,
        old_unit_price_cents: i64,
        new_unit_price_cents: i64,
    },
    RecipeCostUpdated {
        tenant_id: String,
        recipe_id: String,
        cost_per_portion_cents: i64,
        sell_price_cents: i64,
    },
    SaleRegistered {
        tenant_id: String,
        sale_id: String,
        recipe_id: String,
        quantity: f64,
        total_cents: i64,
        /// Ingredients whose stock the sale touched.
        ingredient_ids: Vec<String>,
    },
}

impl DomainEvent {
    /// Dotted event name used in logs and subscriber routing.
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::IngredientPriceChanged { .. } => "ingredient.price.changed",
            DomainEvent::RecipeCostUpdated { .. } => "recipe.cost.updated",
            DomainEvent::SaleRegistered { .. } => "sale.registered",
        }
    }

    pub fn tenant_id(&self) -> &str {
        match self {
            DomainEvent::IngredientPriceChanged { tenant_id, .. }
            | DomainEvent::RecipeCostUpdated { tenant_id, .. }
            | DomainEvent::SaleRegistered { tenant_id, .. } => tenant_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_and_tenant() {
        let event = DomainEvent::RecipeCostUpdated {
            tenant_id: "t1".to_string(),
            recipe_id: "r1".to_string(),
            cost_per_portion_cents: 320,
            sell_price_cents: 1000,
        };
        assert_eq!(event.name(), "recipe.cost.updated");
        assert_eq!(event.tenant_id(), "t1");
    }

    #[test]
    fn test_serialized_tag() {
        let event = DomainEvent::IngredientPriceChanged {
            tenant_id: "t1".to_string(),
            ingredient_id: "flour".to_string(),
            old_unit_price_cents: 250,
            new_unit_price_cents: 260,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ingredient_price_changed");
        assert_eq!(json["new_unit_price_cents"], 260);
    }
}
