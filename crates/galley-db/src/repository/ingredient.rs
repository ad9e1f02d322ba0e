//! # Ingredient Repository
//!
//! Ingredients and their stock figure.
//!
//! ## Stock Field Ownership
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  virtual_stock   written only by unit-of-work functions below, after   │
//! │                  `lock` returned the row inside the same transaction   │
//! │                                                                         │
//! │  physical_stock  written by `set_physical_count` (a pending count),    │
//! │                  cleared by consolidation                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::new_id;
use galley_core::validation::{
    validate_name, validate_non_negative, validate_price_cents, validate_quantity, validate_required,
    validate_yield_percent,
};
use galley_core::Ingredient;

/// Fields for a new ingredient.
#[derive(Debug, Clone)]
pub struct NewIngredient {
    pub name: String,
    pub unit: String,
    /// Price per purchased format, in cents.
    pub unit_price_cents: i64,
    pub format_quantity: Option<f64>,
    pub yield_percent: f64,
    pub initial_stock: f64,
    pub min_stock: f64,
}

impl NewIngredient {
    pub fn new(name: impl Into<String>, unit: impl Into<String>, unit_price_cents: i64) -> Self {
        NewIngredient {
            name: name.into(),
            unit: unit.into(),
            unit_price_cents,
            format_quantity: None,
            yield_percent: 100.0,
            initial_stock: 0.0,
            min_stock: 0.0,
        }
    }

    pub fn with_stock(mut self, stock: f64) -> Self {
        self.initial_stock = stock;
        self
    }

    pub fn with_format(mut self, format_quantity: f64) -> Self {
        self.format_quantity = Some(format_quantity);
        self
    }

    pub fn with_min_stock(mut self, min_stock: f64) -> Self {
        self.min_stock = min_stock;
        self
    }

    pub fn with_yield(mut self, yield_percent: f64) -> Self {
        self.yield_percent = yield_percent;
        self
    }

    fn validate(&self) -> DbResult<()> {
        validate_name(&self.name)?;
        validate_required("unit", &self.unit)?;
        validate_price_cents("unit_price", self.unit_price_cents)?;
        if let Some(q) = self.format_quantity {
            validate_quantity("format_quantity", q)?;
        }
        validate_yield_percent(self.yield_percent)?;
        validate_non_negative("initial_stock", self.initial_stock)?;
        validate_non_negative("min_stock", self.min_stock)?;
        Ok(())
    }
}

/// Repository for ingredient database operations.
#[derive(Debug, Clone)]
pub struct IngredientRepository {
    pool: SqlitePool,
}

impl IngredientRepository {
    /// Creates a new IngredientRepository.
    pub fn new(pool: SqlitePool) -> Self {
        IngredientRepository { pool }
    }

    // =========================================================================
    // Pool Methods
    // =========================================================================

    pub async fn create(&self, tenant_id: &str, input: &NewIngredient) -> DbResult<Ingredient> {
        validate_required("tenant_id", tenant_id)?;
        input.validate()?;

        let now = Utc::now();
        let id = new_id();
        debug!(tenant_id, id = %id, name = %input.name, "Creating ingredient");

        let ingredient = sqlx::query_as::<_, Ingredient>(
            r#"
            INSERT INTO ingredients (
                id, tenant_id, name, unit, unit_price_cents, format_quantity,
                yield_percent, virtual_stock, physical_stock, min_stock,
                is_active, created_at, updated_at, deleted_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, NULL, ?, 1, ?, ?, NULL)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(tenant_id)
        .bind(input.name.trim())
        .bind(input.unit.trim())
        .bind(input.unit_price_cents)
        .bind(input.format_quantity)
        .bind(input.yield_percent)
        .bind(input.initial_stock)
        .bind(input.min_stock)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(ingredient)
    }

    /// Gets a live (not soft-deleted) ingredient.
    pub async fn get(&self, tenant_id: &str, id: &str) -> DbResult<Option<Ingredient>> {
        let ingredient = sqlx::query_as::<_, Ingredient>(
            "SELECT * FROM ingredients WHERE tenant_id = ? AND id = ? AND deleted_at IS NULL",
        )
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ingredient)
    }

    /// Gets a live ingredient or fails with NotFound.
    pub async fn require(&self, tenant_id: &str, id: &str) -> DbResult<Ingredient> {
        self.get(tenant_id, id)
            .await?
            .ok_or_else(|| DbError::not_found("Ingredient", id))
    }

    pub async fn list(&self, tenant_id: &str, include_inactive: bool) -> DbResult<Vec<Ingredient>> {
        let ingredients = sqlx::query_as::<_, Ingredient>(
            r#"
            SELECT * FROM ingredients
            WHERE tenant_id = ? AND deleted_at IS NULL AND (is_active = 1 OR ?)
            ORDER BY name
            "#,
        )
        .bind(tenant_id)
        .bind(include_inactive)
        .fetch_all(&self.pool)
        .await?;

        Ok(ingredients)
    }

    /// Every live ingredient of the tenant keyed by id, inactive included.
    ///
    /// Input for the recipe cost resolver.
    pub async fn price_map(&self, tenant_id: &str) -> DbResult<HashMap<String, Ingredient>> {
        let ingredients = self.list(tenant_id, true).await?;
        Ok(ingredients.into_iter().map(|i| (i.id.clone(), i)).collect())
    }

    /// Hides the ingredient from pickers without touching its history.
    pub async fn set_active(&self, tenant_id: &str, id: &str, active: bool) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE ingredients SET is_active = ?, updated_at = ? WHERE tenant_id = ? AND id = ? AND deleted_at IS NULL",
        )
        .bind(active)
        .bind(Utc::now())
        .bind(tenant_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Ingredient", id));
        }
        Ok(())
    }

    pub async fn soft_delete(&self, tenant_id: &str, id: &str) -> DbResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE ingredients SET deleted_at = ?, updated_at = ? WHERE tenant_id = ? AND id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(tenant_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Ingredient", id));
        }
        Ok(())
    }

    /// Records (or clears) a manual count waiting for consolidation.
    pub async fn set_physical_count(&self, tenant_id: &str, id: &str, counted: Option<f64>) -> DbResult<()> {
        if let Some(value) = counted {
            validate_non_negative("physical_stock", value)?;
        }

        let result = sqlx::query(
            "UPDATE ingredients SET physical_stock = ?, updated_at = ? WHERE tenant_id = ? AND id = ? AND deleted_at IS NULL",
        )
        .bind(counted)
        .bind(Utc::now())
        .bind(tenant_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Ingredient", id));
        }
        Ok(())
    }

    // =========================================================================
    // Unit-of-Work Functions
    // =========================================================================

    /// Takes the row lock on an ingredient and returns its current state.
    ///
    /// `None` when the ingredient does not resolve for the tenant (unknown
    /// or soft-deleted); nothing is locked in that case.
    pub async fn lock(conn: &mut SqliteConnection, tenant_id: &str, id: &str) -> DbResult<Option<Ingredient>> {
        let ingredient = sqlx::query_as::<_, Ingredient>(
            r#"
            UPDATE ingredients SET updated_at = ?
            WHERE tenant_id = ? AND id = ? AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(Utc::now())
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        if ingredient.is_some() {
            debug!(tenant_id, ingredient_id = id, "Ingredient row locked");
        }
        Ok(ingredient)
    }

    /// Writes the stock figure of a locked ingredient.
    pub async fn write_stock(conn: &mut SqliteConnection, tenant_id: &str, id: &str, virtual_stock: f64) -> DbResult<()> {
        sqlx::query("UPDATE ingredients SET virtual_stock = ?, updated_at = ? WHERE tenant_id = ? AND id = ?")
            .bind(virtual_stock)
            .bind(Utc::now())
            .bind(tenant_id)
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Writes the per-format price of a locked ingredient.
    pub async fn write_unit_price(conn: &mut SqliteConnection, tenant_id: &str, id: &str, unit_price_cents: i64) -> DbResult<()> {
        sqlx::query("UPDATE ingredients SET unit_price_cents = ?, updated_at = ? WHERE tenant_id = ? AND id = ?")
            .bind(unit_price_cents)
            .bind(Utc::now())
            .bind(tenant_id)
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Resets stock to a counted value and clears the pending count.
    pub async fn write_counted(conn: &mut SqliteConnection, tenant_id: &str, id: &str, counted: f64) -> DbResult<()> {
        sqlx::query(
            "UPDATE ingredients SET virtual_stock = ?, physical_stock = NULL, updated_at = ? WHERE tenant_id = ? AND id = ?",
        )
        .bind(counted)
        .bind(Utc::now())
        .bind(tenant_id)
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let db = db().await;
        let flour = db
            .ingredients()
            .create("t1", &NewIngredient::new("Flour", "kg", 1250).with_format(5.0).with_stock(20.0))
            .await
            .unwrap();

        let loaded = db.ingredients().require("t1", &flour.id).await.unwrap();
        assert_eq!(loaded.name, "Flour");
        assert_eq!(loaded.virtual_stock, 20.0);
        assert!((loaded.unit_cost() - 250.0).abs() < 1e-9);
        assert!(loaded.physical_stock.is_none());
    }

    #[tokio::test]
    async fn test_tenants_are_isolated() {
        let db = db().await;
        let flour = db
            .ingredients()
            .create("t1", &NewIngredient::new("Flour", "kg", 100))
            .await
            .unwrap();

        assert!(db.ingredients().get("t2", &flour.id).await.unwrap().is_none());
        assert!(db.ingredients().list("t2", true).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_invalid_input() {
        let db = db().await;
        let err = db
            .ingredients()
            .create("t1", &NewIngredient::new("Onion", "kg", 100).with_yield(0.0))
            .await
            .unwrap_err();
        assert!(err.is_validation());

        let err = db
            .ingredients()
            .create("t1", &NewIngredient::new("", "kg", 100))
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_deactivate_and_soft_delete() {
        let db = db().await;
        let repo = db.ingredients();
        let salt = repo.create("t1", &NewIngredient::new("Salt", "kg", 50)).await.unwrap();

        repo.set_active("t1", &salt.id, false).await.unwrap();
        assert!(repo.list("t1", false).await.unwrap().is_empty());
        assert_eq!(repo.list("t1", true).await.unwrap().len(), 1);

        repo.soft_delete("t1", &salt.id).await.unwrap();
        assert!(repo.get("t1", &salt.id).await.unwrap().is_none());
        assert!(repo.soft_delete("t1", &salt.id).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_lock_skips_deleted_rows() {
        let db = db().await;
        let repo = db.ingredients();
        let salt = repo.create("t1", &NewIngredient::new("Salt", "kg", 50)).await.unwrap();
        repo.soft_delete("t1", &salt.id).await.unwrap();

        let mut tx = db.pool().begin().await.unwrap();
        let locked = IngredientRepository::lock(&mut *tx, "t1", &salt.id).await.unwrap();
        assert!(locked.is_none());
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn test_physical_count() {
        let db = db().await;
        let repo = db.ingredients();
        let milk = repo.create("t1", &NewIngredient::new("Milk", "l", 90)).await.unwrap();

        repo.set_physical_count("t1", &milk.id, Some(7.5)).await.unwrap();
        assert_eq!(repo.require("t1", &milk.id).await.unwrap().physical_stock, Some(7.5));

        assert!(repo.set_physical_count("t1", &milk.id, Some(f64::NAN)).await.is_err());
    }
}
