//! # Sale Processor
//!
//! Records sales, reverses them, and ingests sale lines extracted from
//! documents.
//!
//! ## Recording a Sale
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  SaleInput { recipe, quantity, variant | override price/total, date }  │
//! │       │                                                                 │
//! │       ▼ validate, load recipe, price_sale()      (no lock yet)         │
//! │  BEGIN                                                                  │
//! │       │  for each ingredient (ascending id):                            │
//! │       │      lock → deduct (floor 0) → write → remember movement       │
//! │       │  ingredient cost from the locked prices                        │
//! │       │  INSERT sale + movements                                       │
//! │       │  merge DailySalesSummary(recipe, date)                         │
//! │  COMMIT                                                                 │
//! │       ▼                                                                 │
//! │  publish sale.registered                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reversal replays the stored movements (what was actually taken, which
//! may be less than requested when stock hit zero) and subtracts the sale's
//! contribution from the summary.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::DeleteOutcome;
use crate::error::{DbError, DbResult};
use crate::events::EventBus;
use crate::pool::Database;
use crate::repository::{new_id, IngredientRepository, LedgerRepository, RecipeRepository, SaleRepository};
use galley_core::cost::resolve_recipe_cost;
use galley_core::ledger::{deduct, plan_consumption, price_sale, restore, SalesTotals};
use galley_core::validation::{validate_batch_size, validate_price_cents, validate_quantity};
use galley_core::{DomainEvent, Money, Recipe, Sale, SaleSource, StockMovement};

// =============================================================================
// Inputs
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleInput {
    pub recipe_id: String,
    pub quantity: f64,
    pub variant_id: Option<String>,
    /// Explicit unit price; wins over the recipe and variant price.
    pub unit_price_cents: Option<i64>,
    /// Explicit line total. Kept as given; the unit price is derived from it.
    #[serde(default)]
    pub total_cents: Option<i64>,
    pub sale_date: NaiveDate,
    #[serde(default)]
    pub source: SaleSource,
}

impl SaleInput {
    pub fn new(recipe_id: impl Into<String>, quantity: f64, sale_date: NaiveDate) -> Self {
        SaleInput {
            recipe_id: recipe_id.into(),
            quantity,
            variant_id: None,
            unit_price_cents: None,
            total_cents: None,
            sale_date,
            source: SaleSource::Manual,
        }
    }

    pub fn with_variant(mut self, variant_id: impl Into<String>) -> Self {
        self.variant_id = Some(variant_id.into());
        self
    }

    pub fn with_unit_price(mut self, cents: i64) -> Self {
        self.unit_price_cents = Some(cents);
        self
    }

    pub fn with_total(mut self, cents: i64) -> Self {
        self.total_cents = Some(cents);
        self
    }

    fn validate(&self) -> DbResult<()> {
        validate_quantity("quantity", self.quantity)?;
        if let Some(cents) = self.unit_price_cents {
            validate_price_cents("unit_price", cents)?;
        }
        if let Some(cents) = self.total_cents {
            validate_price_cents("total", cents)?;
        }
        Ok(())
    }
}

/// One sale line extracted from a ticket or report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleLineImport {
    /// Recipe code or name as printed.
    pub recipe: String,
    pub quantity: f64,
    /// Line total, in cents.
    pub total_cents: i64,
    pub sale_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestIssue {
    /// Position of the line in the submitted batch.
    pub line: usize,
    pub recipe: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    pub imported: Vec<Sale>,
    /// Lines whose recipe could not be matched.
    pub unmatched: Vec<IngestIssue>,
    /// Lines that matched but were rejected.
    pub failed: Vec<IngestIssue>,
}

// =============================================================================
// Sale Processor
// =============================================================================

#[derive(Debug, Clone)]
pub struct SaleProcessor {
    db: Database,
    bus: EventBus,
}

impl SaleProcessor {
    pub fn new(db: Database, bus: EventBus) -> Self {
        SaleProcessor { db, bus }
    }

    /// Records a sale and deducts its ingredients.
    pub async fn process_sale(&self, tenant_id: &str, input: &SaleInput) -> DbResult<Sale> {
        input.validate()?;

        let recipe = self
            .db
            .recipes()
            .get(tenant_id, &input.recipe_id)
            .await?
            .ok_or_else(|| DbError::not_found("Recipe", &input.recipe_id))?;

        let pricing = price_sale(
            &recipe,
            input.variant_id.as_deref(),
            input.unit_price_cents.map(Money::from_cents),
            input.total_cents.map(Money::from_cents),
            input.quantity,
        )?;
        let plan = plan_consumption(&recipe, input.quantity, pricing.price_factor);

        let mut tx = self.db.pool().begin().await?;
        let mut locked = HashMap::new();
        let mut movements = Vec::with_capacity(plan.len());

        for (ingredient_id, amount) in &plan {
            let Some(mut ingredient) = IngredientRepository::lock(&mut *tx, tenant_id, ingredient_id).await? else {
                warn!(
                    tenant_id,
                    recipe_id = %recipe.id,
                    ingredient_id = %ingredient_id,
                    "Recipe line skipped: ingredient not found"
                );
                continue;
            };

            let change = deduct(ingredient.virtual_stock, *amount);
            IngredientRepository::write_stock(&mut *tx, tenant_id, ingredient_id, change.after).await?;
            debug!(
                ingredient_id = %ingredient_id,
                requested = amount,
                applied = change.applied,
                after = change.after,
                "Stock deducted"
            );

            movements.push(StockMovement {
                ingredient_id: ingredient_id.clone(),
                requested: *amount,
                applied: change.applied,
            });
            ingredient.virtual_stock = change.after;
            locked.insert(ingredient_id.clone(), ingredient);
        }

        let ingredient_cost = resolve_recipe_cost(&recipe, &locked).for_sale(input.quantity, pricing.price_factor);

        let sale = Sale {
            id: new_id(),
            tenant_id: tenant_id.to_string(),
            recipe_id: recipe.id.clone(),
            variant_id: input.variant_id.clone(),
            quantity: input.quantity,
            unit_price_cents: pricing.unit_price.cents(),
            total_cents: pricing.total.cents(),
            price_factor: pricing.price_factor,
            ingredient_cost_cents: ingredient_cost.cents(),
            sale_date: input.sale_date,
            source: input.source,
            created_at: Utc::now(),
            deleted_at: None,
        };

        SaleRepository::insert(&mut *tx, &sale).await?;
        SaleRepository::insert_movements(&mut *tx, &sale.id, &movements).await?;
        LedgerRepository::merge_sales(
            &mut *tx,
            tenant_id,
            &sale.recipe_id,
            sale.sale_date,
            &SalesTotals {
                units_sold: sale.quantity,
                revenue: sale.total(),
                ingredient_cost: sale.ingredient_cost(),
            },
        )
        .await?;

        tx.commit().await?;

        info!(
            tenant_id,
            sale_id = %sale.id,
            recipe_id = %sale.recipe_id,
            quantity = sale.quantity,
            total_cents = sale.total_cents,
            "Sale recorded"
        );

        self.bus.publish(DomainEvent::SaleRegistered {
            tenant_id: tenant_id.to_string(),
            sale_id: sale.id.clone(),
            recipe_id: sale.recipe_id.clone(),
            quantity: sale.quantity,
            total_cents: sale.total_cents,
            ingredient_ids: movements.into_iter().map(|m| m.ingredient_id).collect(),
        });

        Ok(sale)
    }

    /// Reverses a sale's stock and summary effects and soft-deletes it.
    pub async fn delete_sale(&self, tenant_id: &str, sale_id: &str) -> DbResult<DeleteOutcome> {
        let mut tx = self.db.pool().begin().await?;

        let Some(sale) = SaleRepository::lock_for_delete(&mut *tx, tenant_id, sale_id).await? else {
            return match SaleRepository::find_any(&mut *tx, tenant_id, sale_id).await? {
                Some(_) => {
                    info!(tenant_id, sale_id, "Sale already deleted");
                    Ok(DeleteOutcome::AlreadyDeleted)
                }
                None => Err(DbError::not_found("Sale", sale_id)),
            };
        };

        let mut movements = SaleRepository::movements(&mut *tx, &sale.id).await?;
        if movements.is_empty() {
            movements = Self::movements_from_recipe(&mut tx, &sale).await?;
        }

        for movement in &movements {
            let Some(ingredient) = IngredientRepository::lock(&mut *tx, tenant_id, &movement.ingredient_id).await? else {
                warn!(
                    tenant_id,
                    sale_id,
                    ingredient_id = %movement.ingredient_id,
                    "Stock not restored: ingredient not found"
                );
                continue;
            };

            let change = restore(ingredient.virtual_stock, movement.applied.abs());
            IngredientRepository::write_stock(&mut *tx, tenant_id, &movement.ingredient_id, change.after).await?;
        }

        LedgerRepository::reverse_sales(
            &mut *tx,
            tenant_id,
            &sale.recipe_id,
            sale.sale_date,
            &SalesTotals {
                units_sold: sale.quantity,
                revenue: sale.total(),
                ingredient_cost: sale.ingredient_cost(),
            },
        )
        .await?;

        tx.commit().await?;

        info!(tenant_id, sale_id, restored = movements.len(), "Sale reversed");
        Ok(DeleteOutcome::Reversed)
    }

    /// Movements rebuilt from the live composition with the sale's frozen
    /// factor, for sales recorded without stored movements.
    async fn movements_from_recipe(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        sale: &Sale,
    ) -> DbResult<Vec<StockMovement>> {
        let Some(recipe) = RecipeRepository::load_any(&mut **tx, &sale.tenant_id, &sale.recipe_id).await? else {
            warn!(sale_id = %sale.id, recipe_id = %sale.recipe_id, "No movements and no recipe; stock not restored");
            return Ok(Vec::new());
        };

        debug!(sale_id = %sale.id, "Replaying live composition");
        Ok(plan_consumption(&recipe, sale.quantity, sale.price_factor)
            .into_iter()
            .map(|(ingredient_id, amount)| StockMovement {
                ingredient_id,
                requested: amount,
                applied: -amount,
            })
            .collect())
    }

    // =========================================================================
    // Ingestion
    // =========================================================================

    /// Records extracted sale lines, one unit of work per line.
    ///
    /// Lines are matched to recipes by code, then by name (trimmed,
    /// case-insensitive). Unmatched and rejected lines are reported and do
    /// not stop the batch.
    pub async fn ingest_sale_lines(&self, tenant_id: &str, lines: &[SaleLineImport]) -> DbResult<IngestReport> {
        validate_batch_size("Sale import", lines.len())?;

        let recipes = self.db.recipes().list(tenant_id, true).await?;
        let mut report = IngestReport::default();

        for (index, line) in lines.iter().enumerate() {
            let Some(recipe) = match_recipe(&recipes, &line.recipe) else {
                warn!(tenant_id, line = index, recipe = %line.recipe, "Sale line unmatched");
                report.unmatched.push(IngestIssue {
                    line: index,
                    recipe: line.recipe.clone(),
                    reason: "no recipe with this code or name".to_string(),
                });
                continue;
            };

            let result = match validate_quantity("quantity", line.quantity) {
                Ok(()) => {
                    let input = SaleInput {
                        recipe_id: recipe.id.clone(),
                        quantity: line.quantity,
                        variant_id: None,
                        unit_price_cents: None,
                        total_cents: Some(line.total_cents),
                        sale_date: line.sale_date,
                        source: SaleSource::Import,
                    };
                    self.process_sale(tenant_id, &input).await
                }
                Err(e) => Err(e.into()),
            };

            match result {
                Ok(sale) => report.imported.push(sale),
                Err(e) => {
                    warn!(tenant_id, line = index, recipe = %line.recipe, error = %e, "Sale line rejected");
                    report.failed.push(IngestIssue {
                        line: index,
                        recipe: line.recipe.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            tenant_id,
            imported = report.imported.len(),
            unmatched = report.unmatched.len(),
            failed = report.failed.len(),
            "Sale lines ingested"
        );
        Ok(report)
    }
}

/// Code match first, then name.
fn match_recipe<'a>(recipes: &'a [Recipe], reference: &str) -> Option<&'a Recipe> {
    let needle = reference.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    recipes
        .iter()
        .find(|r| r.code.as_deref().is_some_and(|c| c.trim().to_lowercase() == needle))
        .or_else(|| recipes.iter().find(|r| r.name.trim().to_lowercase() == needle))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::*;
    use crate::repository::NewRecipe;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 2).unwrap()
    }

    #[tokio::test]
    async fn test_sale_deducts_and_summarizes() {
        let engine = engine().await;
        let flour = ingredient(&engine, "Flour", 200, 10.0).await;
        let cheese = ingredient(&engine, "Cheese", 1000, 5.0).await;
        let pizza = recipe(
            &engine,
            NewRecipe::new("Pizza", 4, 1200).line(&flour.id, 2.0).line(&cheese.id, 1.0),
        )
        .await;

        let sale = engine
            .sales()
            .process_sale(TENANT, &SaleInput::new(&pizza.id, 2.0, today()))
            .await
            .unwrap();

        assert_eq!(sale.total_cents, 2400);
        assert_eq!(sale.price_factor, 1.0);
        // (2/4)*2*200 + (1/4)*2*1000 = 200 + 500
        assert_eq!(sale.ingredient_cost_cents, 700);
        assert_eq!(stock_of(&engine, &flour.id).await, 9.0);
        assert_eq!(stock_of(&engine, &cheese.id).await, 4.5);

        let summary = engine
            .db()
            .ledger()
            .sales_summary(TENANT, &pizza.id, today())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.units_sold, 2.0);
        assert_eq!(summary.revenue_cents, 2400);
        assert_eq!(summary.gross_profit_cents, 1700);
    }

    #[tokio::test]
    async fn test_variant_factor_scales_price_and_consumption() {
        let engine = engine().await;
        let beans = ingredient(&engine, "Beans", 100, 10.0).await;
        let coffee = recipe(
            &engine,
            NewRecipe::new("Coffee", 1, 300).line(&beans.id, 1.0).variant("Large", 1.5, None),
        )
        .await;
        let large = coffee.variants[0].id.clone();

        let sale = engine
            .sales()
            .process_sale(TENANT, &SaleInput::new(&coffee.id, 2.0, today()).with_variant(&large))
            .await
            .unwrap();

        assert_eq!(sale.unit_price_cents, 450);
        assert_eq!(sale.price_factor, 1.5);
        assert_eq!(stock_of(&engine, &beans.id).await, 7.0);
    }

    #[tokio::test]
    async fn test_unknown_variant_rejected_without_effects() {
        let engine = engine().await;
        let beans = ingredient(&engine, "Beans", 100, 10.0).await;
        let coffee = recipe(&engine, NewRecipe::new("Coffee", 1, 300).line(&beans.id, 1.0)).await;

        let err = engine
            .sales()
            .process_sale(TENANT, &SaleInput::new(&coffee.id, 1.0, today()).with_variant("nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(galley_core::CoreError::VariantNotFound { .. })));
        assert_eq!(stock_of(&engine, &beans.id).await, 10.0);
    }

    #[tokio::test]
    async fn test_invalid_quantity_and_missing_recipe() {
        let engine = engine().await;
        let sales = engine.sales();

        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = sales
                .process_sale(TENANT, &SaleInput::new("whatever", bad, today()))
                .await
                .unwrap_err();
            assert!(err.is_validation(), "{bad} should be rejected");
        }

        let err = sales
            .process_sale(TENANT, &SaleInput::new("missing", 1.0, today()))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_oversized_sales_are_rejected_not_wrapped() {
        let engine = engine().await;
        let salt = ingredient(&engine, "Salt", 1, galley_core::MAX_QUANTITY).await;
        let pinch = recipe(&engine, NewRecipe::new("Pinch", 1, 100).line(&salt.id, 0.001)).await;
        let sales = engine.sales();

        let err = sales
            .process_sale(TENANT, &SaleInput::new(&pinch.id, 1e18, today()))
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let err = sales
            .process_sale(TENANT, &SaleInput::new(&pinch.id, 1.0, today()).with_unit_price(i64::MAX))
            .await
            .unwrap_err();
        assert!(err.is_validation());

        // The largest accepted sale fits; a second one would push the
        // summary past the ceiling and is refused without touching stock.
        let big = SaleInput::new(&pinch.id, galley_core::MAX_QUANTITY, today())
            .with_unit_price(galley_core::MAX_PRICE_CENTS);
        let first = sales.process_sale(TENANT, &big).await.unwrap();
        assert_eq!(first.total_cents, galley_core::MAX_AMOUNT_CENTS);
        let stock_after_first = stock_of(&engine, &salt.id).await;

        let err = sales.process_sale(TENANT, &big).await.unwrap_err();
        assert!(err.is_validation());
        assert_eq!(stock_of(&engine, &salt.id).await, stock_after_first);

        let summary = engine
            .db()
            .ledger()
            .sales_summary(TENANT, &pinch.id, today())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.revenue_cents, galley_core::MAX_AMOUNT_CENTS);
        assert_eq!(summary.gross_profit_cents, summary.revenue_cents - summary.ingredient_cost_cents);
    }

    #[tokio::test]
    async fn test_delete_restores_applied_amount_only() {
        let engine = engine().await;
        let milk = ingredient(&engine, "Milk", 100, 1.0).await;
        let latte = recipe(&engine, NewRecipe::new("Latte", 1, 400).line(&milk.id, 3.0)).await;

        let sale = engine
            .sales()
            .process_sale(TENANT, &SaleInput::new(&latte.id, 1.0, today()))
            .await
            .unwrap();
        assert_eq!(stock_of(&engine, &milk.id).await, 0.0);

        let outcome = engine.sales().delete_sale(TENANT, &sale.id).await.unwrap();
        assert_eq!(outcome, DeleteOutcome::Reversed);
        // Only 1.0 was ever taken
        assert_eq!(stock_of(&engine, &milk.id).await, 1.0);

        let again = engine.sales().delete_sale(TENANT, &sale.id).await.unwrap();
        assert_eq!(again, DeleteOutcome::AlreadyDeleted);
        assert_eq!(stock_of(&engine, &milk.id).await, 1.0);

        let summary = engine
            .db()
            .ledger()
            .sales_summary(TENANT, &latte.id, today())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.units_sold, 0.0);
        assert_eq!(summary.revenue_cents, 0);
        assert_eq!(summary.gross_profit_cents, 0);

        let err = engine.sales().delete_sale(TENANT, "missing").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_deleted_ingredient_line_is_skipped() {
        let engine = engine().await;
        let bun = ingredient(&engine, "Bun", 50, 10.0).await;
        let patty = ingredient(&engine, "Patty", 300, 10.0).await;
        let burger = recipe(
            &engine,
            NewRecipe::new("Burger", 1, 900).line(&bun.id, 1.0).line(&patty.id, 1.0),
        )
        .await;
        engine.db().ingredients().soft_delete(TENANT, &patty.id).await.unwrap();

        let sale = engine
            .sales()
            .process_sale(TENANT, &SaleInput::new(&burger.id, 1.0, today()))
            .await
            .unwrap();

        assert_eq!(stock_of(&engine, &bun.id).await, 9.0);
        assert_eq!(sale.ingredient_cost_cents, 50);
        let movements = engine.db().sales().get_movements(&sale.id).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].ingredient_id, bun.id);
    }

    #[tokio::test]
    async fn test_sale_event_published_after_commit() {
        let engine = engine().await;
        let mut rx = engine.bus().subscribe();
        let rice = ingredient(&engine, "Rice", 100, 10.0).await;
        let bowl = recipe(&engine, NewRecipe::new("Bowl", 1, 800).line(&rice.id, 0.5)).await;

        let sale = engine
            .sales()
            .process_sale(TENANT, &SaleInput::new(&bowl.id, 1.0, today()))
            .await
            .unwrap();

        match rx.recv().await.unwrap() {
            DomainEvent::SaleRegistered { sale_id, ingredient_ids, .. } => {
                assert_eq!(sale_id, sale.id);
                assert_eq!(ingredient_ids, vec![rice.id.clone()]);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ingest_matches_code_then_name() {
        let engine = engine().await;
        let tea = ingredient(&engine, "Tea leaves", 100, 100.0).await;
        let green = recipe(&engine, NewRecipe::new("Green Tea", 1, 250).with_code("GT-1").line(&tea.id, 1.0)).await;
        let black = recipe(&engine, NewRecipe::new("Black Tea", 1, 250).line(&tea.id, 1.0)).await;

        let lines = vec![
            SaleLineImport {
                recipe: " gt-1 ".into(),
                quantity: 4.0,
                total_cents: 1000,
                sale_date: today(),
            },
            SaleLineImport {
                recipe: "BLACK TEA".into(),
                quantity: 2.0,
                total_cents: 450,
                sale_date: today(),
            },
            SaleLineImport {
                recipe: "Chai".into(),
                quantity: 1.0,
                total_cents: 300,
                sale_date: today(),
            },
            SaleLineImport {
                recipe: "Green Tea".into(),
                quantity: 0.0,
                total_cents: 300,
                sale_date: today(),
            },
        ];

        let report = engine.sales().ingest_sale_lines(TENANT, &lines).await.unwrap();
        assert_eq!(report.imported.len(), 2);
        assert_eq!(report.imported[0].recipe_id, green.id);
        assert_eq!(report.imported[0].unit_price_cents, 250);
        assert_eq!(report.imported[0].source, SaleSource::Import);
        assert_eq!(report.imported[1].recipe_id, black.id);
        assert_eq!(report.imported[1].unit_price_cents, 225);
        assert_eq!(report.unmatched.len(), 1);
        assert_eq!(report.unmatched[0].line, 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].line, 3);
        assert_eq!(stock_of(&engine, &tea.id).await, 94.0);
    }

    #[tokio::test]
    async fn test_ingest_keeps_document_total() {
        let engine = engine().await;
        let tea = ingredient(&engine, "Tea leaves", 100, 100.0).await;
        let green = recipe(&engine, NewRecipe::new("Tea", 1, 250).line(&tea.id, 1.0)).await;

        let lines = vec![SaleLineImport {
            recipe: "Tea".into(),
            quantity: 3.0,
            total_cents: 1000,
            sale_date: today(),
        }];
        let report = engine.sales().ingest_sale_lines(TENANT, &lines).await.unwrap();

        let sale = &report.imported[0];
        assert_eq!(sale.total_cents, 1000);
        assert_eq!(sale.unit_price_cents, 333);

        let summary = engine
            .db()
            .ledger()
            .sales_summary(TENANT, &green.id, today())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.revenue_cents, 1000);

        engine.sales().delete_sale(TENANT, &sale.id).await.unwrap();
        let summary = engine
            .db()
            .ledger()
            .sales_summary(TENANT, &green.id, today())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.revenue_cents, 0);
    }

    #[tokio::test]
    async fn test_ingest_rejects_empty_batch() {
        let engine = engine().await;
        let err = engine.sales().ingest_sale_lines(TENANT, &[]).await.unwrap_err();
        assert!(matches!(err, DbError::Core(galley_core::CoreError::EmptyBatch { .. })));
    }
}
