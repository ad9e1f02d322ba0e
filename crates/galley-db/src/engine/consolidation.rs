//! # Stock Consolidation
//!
//! Reconciles counted stock with the virtual ledger.
//!
//! ## Per Item
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  counted = item.counted  |  ingredient.physical_stock (pending count)  │
//! │                                                                         │
//! │  1. StockSnapshot { virtual before, counted, counted − virtual }       │
//! │  2. StockAdjustment with the item's note (if any)                      │
//! │  3. virtual_stock = counted, physical_stock = NULL                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The count is authoritative: whatever sales or waste did to the virtual
//! figure is replaced. The whole batch commits or none of it does.

use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::pool::Database;
use crate::repository::{new_id, AuditRepository, IngredientRepository};
use galley_core::ledger::reset;
use galley_core::validation::{validate_batch_size, validate_required, validate_text};
use galley_core::{CoreError, StockAdjustment, StockSnapshot, ValidationError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationItem {
    pub ingredient_id: String,
    /// Counted stock. Falls back to the ingredient's pending count.
    pub counted: Option<f64>,
    pub note: Option<String>,
}

impl ConsolidationItem {
    pub fn counted(ingredient_id: impl Into<String>, counted: f64) -> Self {
        ConsolidationItem {
            ingredient_id: ingredient_id.into(),
            counted: Some(counted),
            note: None,
        }
    }

    /// Uses the count already stored on the ingredient.
    pub fn pending(ingredient_id: impl Into<String>) -> Self {
        ConsolidationItem {
            ingredient_id: ingredient_id.into(),
            counted: None,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsolidationResult {
    pub consolidation_id: String,
    pub snapshots: Vec<StockSnapshot>,
    pub adjustments: Vec<StockAdjustment>,
}

#[derive(Debug, Clone)]
pub struct StockConsolidator {
    db: Database,
}

impl StockConsolidator {
    pub fn new(db: Database) -> Self {
        StockConsolidator { db }
    }

    pub async fn consolidate(&self, tenant_id: &str, items: &[ConsolidationItem]) -> DbResult<ConsolidationResult> {
        validate_batch_size("Consolidation", items.len())?;

        let mut seen = HashSet::new();
        for item in items {
            validate_required("ingredient_id", &item.ingredient_id)?;
            validate_text("note", item.note.as_deref(), 500)?;
            if let Some(counted) = item.counted {
                if !counted.is_finite() {
                    return Err(ValidationError::NotFinite {
                        field: "counted".to_string(),
                    }
                    .into());
                }
            }
            if !seen.insert(item.ingredient_id.as_str()) {
                return Err(ValidationError::InvalidFormat {
                    field: "ingredient_id".to_string(),
                    reason: format!("{} listed more than once", item.ingredient_id),
                }
                .into());
            }
        }

        let mut sorted: Vec<&ConsolidationItem> = items.iter().collect();
        sorted.sort_by(|a, b| a.ingredient_id.cmp(&b.ingredient_id));

        let consolidation_id = new_id();
        let now = Utc::now();
        let mut result = ConsolidationResult {
            consolidation_id: consolidation_id.clone(),
            snapshots: Vec::with_capacity(items.len()),
            adjustments: Vec::new(),
        };

        let mut tx = self.db.pool().begin().await?;

        for item in sorted {
            let ingredient = IngredientRepository::lock(&mut *tx, tenant_id, &item.ingredient_id)
                .await?
                .ok_or_else(|| DbError::not_found("Ingredient", &item.ingredient_id))?;

            let counted = item
                .counted
                .or(ingredient.physical_stock)
                .ok_or_else(|| CoreError::MissingPhysicalCount(item.ingredient_id.clone()))?;
            let change = reset(ingredient.virtual_stock, counted);

            let snapshot = StockSnapshot {
                id: new_id(),
                tenant_id: tenant_id.to_string(),
                ingredient_id: item.ingredient_id.clone(),
                consolidation_id: consolidation_id.clone(),
                virtual_stock: change.before,
                physical_stock: change.after,
                difference: change.applied,
                taken_at: now,
            };
            AuditRepository::insert_snapshot(&mut *tx, &snapshot).await?;

            if let Some(note) = item.note.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
                let adjustment = StockAdjustment {
                    id: new_id(),
                    tenant_id: tenant_id.to_string(),
                    ingredient_id: item.ingredient_id.clone(),
                    consolidation_id: Some(consolidation_id.clone()),
                    quantity_delta: change.applied,
                    note: note.to_string(),
                    created_at: now,
                };
                AuditRepository::insert_adjustment(&mut *tx, &adjustment).await?;
                result.adjustments.push(adjustment);
            }

            IngredientRepository::write_counted(&mut *tx, tenant_id, &item.ingredient_id, change.after).await?;
            debug!(
                ingredient_id = %item.ingredient_id,
                before = change.before,
                after = change.after,
                "Stock consolidated"
            );
            result.snapshots.push(snapshot);
        }

        tx.commit().await?;

        info!(
            tenant_id,
            consolidation_id = %consolidation_id,
            items = result.snapshots.len(),
            "Stock consolidation committed"
        );
        Ok(result)
    }
}
