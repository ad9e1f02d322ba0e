//! # Default Event Subscribers
//!
//! ```text
//! ingredient.price.changed ──► CostRecalculator ──► recipe.cost.updated
//!                                                          │
//! sale.registered ─────────────────────┐                   │
//!                                      ▼                   ▼
//!                                   Alerter ──► alerts (low_stock, food_cost)
//! ```
//!
//! Both run on the event bus after the triggering unit of work committed.
//! A failure here is logged by the bus and never touches the ledger.

use tracing::{debug, info};

use crate::error::DbResult;
use crate::events::{EventBus, EventHandler};
use crate::pool::Database;
use galley_core::cost::resolve_recipe_cost;
use galley_core::{AlertKind, DomainEvent, Money};

// =============================================================================
// Cost Recalculation
// =============================================================================

/// Recomputes the stored per-portion cost of recipes using a repriced
/// ingredient.
#[derive(Debug, Clone)]
pub struct CostRecalculator {
    db: Database,
    bus: EventBus,
}

impl CostRecalculator {
    pub fn new(db: Database, bus: EventBus) -> Self {
        CostRecalculator { db, bus }
    }

    async fn recalculate(&self, tenant_id: &str, ingredient_id: &str) -> DbResult<usize> {
        let recipes = self.db.recipes().using_ingredient(tenant_id, ingredient_id).await?;
        if recipes.is_empty() {
            return Ok(0);
        }

        let prices = self.db.ingredients().price_map(tenant_id).await?;
        for recipe in &recipes {
            let cost = resolve_recipe_cost(recipe, &prices).per_portion();
            self.db.recipes().set_cost_per_portion(tenant_id, &recipe.id, cost.cents()).await?;
            debug!(recipe_id = %recipe.id, cost_cents = cost.cents(), "Recipe cost recalculated");

            self.bus.publish(DomainEvent::RecipeCostUpdated {
                tenant_id: tenant_id.to_string(),
                recipe_id: recipe.id.clone(),
                cost_per_portion_cents: cost.cents(),
                sell_price_cents: recipe.sell_price_cents,
            });
        }
        Ok(recipes.len())
    }
}

impl EventHandler for CostRecalculator {
    fn name(&self) -> &'static str {
        "cost_recalculator"
    }

    async fn handle(&self, event: DomainEvent) -> DbResult<()> {
        if let DomainEvent::IngredientPriceChanged {
            tenant_id,
            ingredient_id,
            ..
        } = &event
        {
            let count = self.recalculate(tenant_id, ingredient_id).await?;
            info!(tenant_id = %tenant_id, ingredient_id = %ingredient_id, recipes = count, "Recipe costs refreshed");
        }
        Ok(())
    }
}

// =============================================================================
// Alerting
// =============================================================================

/// Raises low-stock and food-cost alerts.
#[derive(Debug, Clone)]
pub struct Alerter {
    db: Database,
    /// Cost / sell price ratio above which a recipe alerts (0.35 = 35 %).
    food_cost_threshold: f64,
}

impl Alerter {
    pub fn new(db: Database, food_cost_threshold: f64) -> Self {
        Alerter { db, food_cost_threshold }
    }

    async fn check_food_cost(&self, tenant_id: &str, recipe_id: &str, cost_cents: i64, sell_cents: i64) -> DbResult<()> {
        if sell_cents <= 0 {
            return Ok(());
        }

        let ratio = cost_cents as f64 / sell_cents as f64;
        if ratio > self.food_cost_threshold {
            let message = format!(
                "Food cost {:.1}% exceeds {:.1}% (cost {} / price {})",
                ratio * 100.0,
                self.food_cost_threshold * 100.0,
                Money::from_cents(cost_cents),
                Money::from_cents(sell_cents)
            );
            self.db.alerts().raise(tenant_id, AlertKind::FoodCost, recipe_id, &message).await?;
        }
        Ok(())
    }

    async fn check_low_stock(&self, tenant_id: &str, ingredient_ids: &[String]) -> DbResult<()> {
        for ingredient_id in ingredient_ids {
            let Some(ingredient) = self.db.ingredients().get(tenant_id, ingredient_id).await? else {
                continue;
            };
            if ingredient.is_below_minimum() {
                let message = format!(
                    "{} at {} {} (minimum {})",
                    ingredient.name, ingredient.virtual_stock, ingredient.unit, ingredient.min_stock
                );
                self.db.alerts().raise(tenant_id, AlertKind::LowStock, ingredient_id, &message).await?;
            }
        }
        Ok(())
    }
}

impl EventHandler for Alerter {
    fn name(&self) -> &'static str {
        "alerter"
    }

    async fn handle(&self, event: DomainEvent) -> DbResult<()> {
        match &event {
            DomainEvent::RecipeCostUpdated {
                tenant_id,
                recipe_id,
                cost_per_portion_cents,
                sell_price_cents,
            } => {
                self.check_food_cost(tenant_id, recipe_id, *cost_per_portion_cents, *sell_price_cents)
                    .await
            }
            DomainEvent::SaleRegistered {
                tenant_id,
                ingredient_ids,
                ..
            } => self.check_low_stock(tenant_id, ingredient_ids).await,
            DomainEvent::IngredientPriceChanged { .. } => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::DbConfig;
    use crate::repository::{NewIngredient, NewRecipe};

    const TENANT: &str = "tenant-a";

    #[tokio::test]
    async fn test_price_change_updates_recipe_cost() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let bus = EventBus::new(16, std::time::Duration::from_secs(1));
        let mut rx = bus.subscribe();

        let flour = db
            .ingredients()
            .create(TENANT, &NewIngredient::new("Flour", "kg", 300))
            .await
            .unwrap();
        let bread = db
            .recipes()
            .create(TENANT, &NewRecipe::new("Bread", 2, 500).line(&flour.id, 1.0))
            .await
            .unwrap();

        let recalculator = CostRecalculator::new(db.clone(), bus.clone());
        recalculator
            .handle(DomainEvent::IngredientPriceChanged {
                tenant_id: TENANT.into(),
                ingredient_id: flour.id.clone(),
                old_unit_price_cents: 200,
                new_unit_price_cents: 300,
            })
            .await
            .unwrap();

        let stored = db.recipes().require(TENANT, &bread.id).await.unwrap();
        assert_eq!(stored.cost_per_portion_cents, Some(150));
        match rx.recv().await.unwrap() {
            DomainEvent::RecipeCostUpdated { recipe_id, cost_per_portion_cents, .. } => {
                assert_eq!(recipe_id, bread.id);
                assert_eq!(cost_per_portion_cents, 150);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_food_cost_alert_threshold() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let alerter = Alerter::new(db.clone(), 0.35);

        for (recipe, cost) in [("cheap", 300), ("dear", 400)] {
            alerter
                .handle(DomainEvent::RecipeCostUpdated {
                    tenant_id: TENANT.into(),
                    recipe_id: recipe.into(),
                    cost_per_portion_cents: cost,
                    sell_price_cents: 1000,
                })
                .await
                .unwrap();
        }

        let alerts = db.alerts().list(TENANT).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::FoodCost);
        assert_eq!(alerts[0].subject_id, "dear");
    }

    #[tokio::test]
    async fn test_low_stock_alert() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let low = db
            .ingredients()
            .create(TENANT, &NewIngredient::new("Butter", "kg", 900).with_stock(1.0).with_min_stock(2.0))
            .await
            .unwrap();
        let fine = db
            .ingredients()
            .create(TENANT, &NewIngredient::new("Sugar", "kg", 100).with_stock(9.0).with_min_stock(2.0))
            .await
            .unwrap();

        Alerter::new(db.clone(), 0.35)
            .handle(DomainEvent::SaleRegistered {
                tenant_id: TENANT.into(),
                sale_id: "s1".into(),
                recipe_id: "r1".into(),
                quantity: 1.0,
                total_cents: 100,
                ingredient_ids: vec![low.id.clone(), fine.id.clone()],
            })
            .await
            .unwrap();

        let alerts = db.alerts().list(TENANT).await.unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::LowStock);
        assert_eq!(alerts[0].subject_id, low.id);
    }
}
