//! # Waste Recorder
//!
//! Writes off stock lost outside of sales. A record that names an
//! ingredient deducts `quantity` from it (floored at zero); deleting the
//! record puts exactly `quantity` back. Unmatched records (free-text
//! description only) carry a value but never touch stock.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::DeleteOutcome;
use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::{new_id, IngredientRepository, WasteRepository};
use galley_core::ledger::{deduct, restore};
use galley_core::types::period_of;
use galley_core::validation::{validate_batch_size, validate_price_cents, validate_quantity, validate_required, validate_text};
use galley_core::{Money, ValidationError, WasteRecord};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WasteInput {
    /// `None` when the loss could not be matched to an ingredient.
    pub ingredient_id: Option<String>,
    pub description: Option<String>,
    pub quantity: f64,
    /// Defaults to `quantity × unit cost` for matched ingredients.
    pub value_lost_cents: Option<i64>,
    pub reason: String,
    pub waste_date: chrono::NaiveDate,
}

impl WasteInput {
    pub fn ingredient(ingredient_id: impl Into<String>, quantity: f64, reason: impl Into<String>, waste_date: chrono::NaiveDate) -> Self {
        WasteInput {
            ingredient_id: Some(ingredient_id.into()),
            description: None,
            quantity,
            value_lost_cents: None,
            reason: reason.into(),
            waste_date,
        }
    }

    pub fn unmatched(description: impl Into<String>, quantity: f64, value_lost_cents: i64, reason: impl Into<String>, waste_date: chrono::NaiveDate) -> Self {
        WasteInput {
            ingredient_id: None,
            description: Some(description.into()),
            quantity,
            value_lost_cents: Some(value_lost_cents),
            reason: reason.into(),
            waste_date,
        }
    }

    fn validate(&self) -> DbResult<()> {
        validate_quantity("quantity", self.quantity)?;
        validate_required("reason", &self.reason)?;
        validate_text("description", self.description.as_deref(), 500)?;
        if let Some(cents) = self.value_lost_cents {
            validate_price_cents("value_lost", cents)?;
        }
        if self.ingredient_id.is_none() && self.description.as_deref().map_or(true, |d| d.trim().is_empty()) {
            return Err(ValidationError::Required {
                field: "ingredient_id or description".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct WasteRecorder {
    db: Database,
}

impl WasteRecorder {
    pub fn new(db: Database) -> Self {
        WasteRecorder { db }
    }

    /// Records a batch of losses in one unit of work.
    ///
    /// Records come back in input order. An ingredient id that does not
    /// resolve aborts the whole batch.
    pub async fn record_waste(&self, tenant_id: &str, inputs: &[WasteInput]) -> DbResult<Vec<WasteRecord>> {
        validate_batch_size("Waste", inputs.len())?;
        for input in inputs {
            input.validate()?;
        }

        // Ascending ingredient id; unmatched entries last
        let mut order: Vec<usize> = (0..inputs.len()).collect();
        order.sort_by(|&a, &b| match (&inputs[a].ingredient_id, &inputs[b].ingredient_id) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => a.cmp(&b),
        });

        let now = Utc::now();
        let mut tx = self.db.pool().begin().await?;
        let mut records: Vec<Option<WasteRecord>> = vec![None; inputs.len()];

        for index in order {
            let input = &inputs[index];
            let mut value_lost = input.value_lost_cents.map(Money::from_cents);

            if let Some(ingredient_id) = &input.ingredient_id {
                let ingredient = IngredientRepository::lock(&mut *tx, tenant_id, ingredient_id)
                    .await?
                    .ok_or_else(|| DbError::not_found("Ingredient", ingredient_id))?;

                let change = deduct(ingredient.virtual_stock, input.quantity);
                IngredientRepository::write_stock(&mut *tx, tenant_id, ingredient_id, change.after).await?;

                if value_lost.is_none() {
                    value_lost = Some(Money::from_cost(ingredient.unit_cost() * input.quantity));
                }
            }

            let record = WasteRecord {
                id: new_id(),
                tenant_id: tenant_id.to_string(),
                ingredient_id: input.ingredient_id.clone(),
                description: input.description.clone(),
                quantity: input.quantity,
                value_lost_cents: value_lost.unwrap_or_default().cents(),
                reason: input.reason.trim().to_string(),
                period: period_of(input.waste_date),
                waste_date: input.waste_date,
                created_at: now,
                deleted_at: None,
            };
            WasteRepository::insert(&mut *tx, &record).await?;
            records[index] = Some(record);
        }

        tx.commit().await?;

        let records: Vec<WasteRecord> = records.into_iter().flatten().collect();
        info!(tenant_id, count = records.len(), "Waste recorded");
        Ok(records)
    }

    /// Restores the wasted quantity and soft-deletes the record.
    pub async fn delete_waste(&self, tenant_id: &str, waste_id: &str) -> DbResult<DeleteOutcome> {
        let mut tx = self.db.pool().begin().await?;

        let Some(record) = WasteRepository::lock_for_delete(&mut *tx, tenant_id, waste_id).await? else {
            return match WasteRepository::find_any(&mut *tx, tenant_id, waste_id).await? {
                Some(_) => Ok(DeleteOutcome::AlreadyDeleted),
                None => Err(DbError::not_found("Waste record", waste_id)),
            };
        };

        let Some(ingredient_id) = record.ingredient_id.as_deref() else {
            tx.commit().await?;
            info!(tenant_id, waste_id, "Unmatched waste record deleted");
            return Ok(DeleteOutcome::SoftDeleted);
        };

        match IngredientRepository::lock(&mut *tx, tenant_id, ingredient_id).await? {
            Some(ingredient) => {
                let change = restore(ingredient.virtual_stock, record.quantity);
                IngredientRepository::write_stock(&mut *tx, tenant_id, ingredient_id, change.after).await?;
            }
            None => warn!(tenant_id, waste_id, ingredient_id, "Stock not restored: ingredient not found"),
        }

        tx.commit().await?;
        info!(tenant_id, waste_id, quantity = record.quantity, "Waste reversed");
        Ok(DeleteOutcome::Reversed)
    }
}
