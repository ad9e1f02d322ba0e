//! Menu engineering over a date range.
//!
//! Read-only: per-portion cost from current prices, popularity from the
//! daily sales summaries, then [`galley_core::menu::classify`].

use chrono::NaiveDate;
use tracing::info;

use crate::error::DbResult;
use crate::pool::Database;
use galley_core::cost::resolve_recipe_cost;
use galley_core::menu::{classify, ClassifierSettings, MenuEngineeringReport, MenuItemInput};
use galley_core::ValidationError;

#[derive(Debug, Clone)]
pub struct MenuEngineering {
    db: Database,
    settings: ClassifierSettings,
}

impl MenuEngineering {
    pub fn new(db: Database, settings: ClassifierSettings) -> Self {
        MenuEngineering { db, settings }
    }

    pub fn with_settings(mut self, settings: ClassifierSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Classifies every active recipe of the tenant for `from..=to`.
    ///
    /// Cost and margin are per portion: the batch cost of the composition
    /// at current prices, with yield applied, divided by `portions`. This
    /// matches `sell_price`, which is also per portion.
    pub async fn classify_period(&self, tenant_id: &str, from: NaiveDate, to: NaiveDate) -> DbResult<MenuEngineeringReport> {
        if from > to {
            return Err(ValidationError::InvalidFormat {
                field: "date_range".to_string(),
                reason: format!("{} is after {}", from, to),
            }
            .into());
        }

        let recipes = self.db.recipes().list(tenant_id, false).await?;
        let prices = self.db.ingredients().price_map(tenant_id).await?;
        let units = self.db.ledger().units_sold_between(tenant_id, from, to).await?;

        let items: Vec<MenuItemInput> = recipes
            .iter()
            .map(|recipe| MenuItemInput {
                recipe_id: recipe.id.clone(),
                name: recipe.name.clone(),
                sell_price: recipe.sell_price(),
                cost_cents: resolve_recipe_cost(recipe, &prices).per_portion_cents,
                popularity: units.get(&recipe.id).copied().unwrap_or(0.0),
            })
            .collect();

        let report = classify(&items, &self.settings);
        info!(
            tenant_id,
            %from,
            %to,
            recipes = report.items.len(),
            mean_popularity = report.mean_popularity,
            "Menu engineering computed"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::*;
    use crate::engine::SaleInput;
    use crate::repository::NewRecipe;
    use galley_core::menu::Quadrant;

    #[tokio::test]
    async fn test_classifies_recorded_sales() {
        let engine = engine().await;
        let base = ingredient(&engine, "Base", 100, 10_000.0).await;
        let day = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();

        // cost = 9 or 10 units of a 100-cent ingredient
        let a = recipe(&engine, NewRecipe::new("A", 1, 1000).line(&base.id, 9.0)).await;
        let b = recipe(&engine, NewRecipe::new("B", 1, 2000).line(&base.id, 10.0)).await;
        let c = recipe(&engine, NewRecipe::new("C", 1, 2000).line(&base.id, 10.0)).await;
        let d = recipe(&engine, NewRecipe::new("D", 1, 1000).line(&base.id, 9.0)).await;

        for (r, units) in [(&a, 100.0), (&b, 10.0), (&c, 100.0), (&d, 10.0)] {
            engine
                .sales()
                .process_sale(TENANT, &SaleInput::new(&r.id, units, day))
                .await
                .unwrap();
        }

        let report = engine.menu().classify_period(TENANT, day, day).await.unwrap();
        let quadrant = |id: &str| report.items.iter().find(|i| i.recipe_id == id).unwrap().quadrant;

        assert_eq!(quadrant(&a.id), Quadrant::Workhorse);
        assert_eq!(quadrant(&b.id), Quadrant::Puzzle);
        assert_eq!(quadrant(&c.id), Quadrant::Star);
        assert_eq!(quadrant(&d.id), Quadrant::Dog);
        assert_eq!(report.mean_popularity, 55.0);
    }

    #[tokio::test]
    async fn test_inverted_range_rejected() {
        let engine = engine().await;
        let from = NaiveDate::from_ymd_opt(2026, 6, 2).unwrap();
        let to = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        let err = engine.menu().classify_period(TENANT, from, to).await.unwrap_err();
        assert!(err.is_validation());
    }
}
