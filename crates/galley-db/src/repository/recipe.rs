//! # Recipe Repository
//!
//! Recipes with their composition lines and sale variants.
//!
//! Composition and variants are written together with the recipe in one
//! transaction and always loaded with it, so a `Recipe` handed to the engine
//! is complete.

use std::collections::HashMap;

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::new_id;
use galley_core::validation::{
    validate_name, validate_non_negative, validate_portions, validate_price_cents, validate_price_factor,
    validate_required,
};
use galley_core::{Recipe, RecipeLine, RecipeVariant};

/// One composition line of a new recipe.
#[derive(Debug, Clone)]
pub struct NewRecipeLine {
    pub ingredient_id: String,
    /// Quantity per batch, in the ingredient's unit.
    pub quantity: f64,
}

/// A sale variant of a new recipe.
#[derive(Debug, Clone)]
pub struct NewVariant {
    pub name: String,
    pub price_factor: f64,
    pub sell_price_cents: Option<i64>,
}

/// Fields for a new recipe.
#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub code: Option<String>,
    pub name: String,
    pub portions: i64,
    pub sell_price_cents: i64,
    pub lines: Vec<NewRecipeLine>,
    pub variants: Vec<NewVariant>,
}

impl NewRecipe {
    pub fn new(name: impl Into<String>, portions: i64, sell_price_cents: i64) -> Self {
        NewRecipe {
            code: None,
            name: name.into(),
            portions,
            sell_price_cents,
            lines: Vec::new(),
            variants: Vec::new(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn line(mut self, ingredient_id: impl Into<String>, quantity: f64) -> Self {
        self.lines.push(NewRecipeLine {
            ingredient_id: ingredient_id.into(),
            quantity,
        });
        self
    }

    pub fn variant(mut self, name: impl Into<String>, price_factor: f64, sell_price_cents: Option<i64>) -> Self {
        self.variants.push(NewVariant {
            name: name.into(),
            price_factor,
            sell_price_cents,
        });
        self
    }

    fn validate(&self) -> DbResult<()> {
        validate_name(&self.name)?;
        validate_portions(self.portions)?;
        validate_price_cents("sell_price", self.sell_price_cents)?;
        for line in &self.lines {
            validate_required("ingredient_id", &line.ingredient_id)?;
            validate_non_negative("quantity", line.quantity)?;
        }
        for variant in &self.variants {
            validate_name(&variant.name)?;
            validate_price_factor(variant.price_factor)?;
            if let Some(cents) = variant.sell_price_cents {
                validate_price_cents("variant_sell_price", cents)?;
            }
        }
        Ok(())
    }
}

/// Repository for recipe database operations.
#[derive(Debug, Clone)]
pub struct RecipeRepository {
    pool: SqlitePool,
}

impl RecipeRepository {
    /// Creates a new RecipeRepository.
    pub fn new(pool: SqlitePool) -> Self {
        RecipeRepository { pool }
    }

    /// Creates a recipe with its lines and variants.
    ///
    /// Every line must name a live ingredient of the same tenant.
    pub async fn create(&self, tenant_id: &str, input: &NewRecipe) -> DbResult<Recipe> {
        validate_required("tenant_id", tenant_id)?;
        input.validate()?;

        let now = Utc::now();
        let id = new_id();
        debug!(tenant_id, id = %id, name = %input.name, "Creating recipe");

        let mut tx = self.pool.begin().await?;

        let mut recipe = sqlx::query_as::<_, Recipe>(
            r#"
            INSERT INTO recipes (
                id, tenant_id, code, name, portions, sell_price_cents,
                cost_per_portion_cents, is_active, created_at, updated_at, deleted_at
            ) VALUES (?, ?, ?, ?, ?, ?, NULL, 1, ?, ?, NULL)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(tenant_id)
        .bind(input.code.as_deref().map(str::trim))
        .bind(input.name.trim())
        .bind(input.portions)
        .bind(input.sell_price_cents)
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        for (position, line) in input.lines.iter().enumerate() {
            let known: Option<String> = sqlx::query_scalar(
                "SELECT id FROM ingredients WHERE tenant_id = ? AND id = ? AND deleted_at IS NULL",
            )
            .bind(tenant_id)
            .bind(&line.ingredient_id)
            .fetch_optional(&mut *tx)
            .await?;
            if known.is_none() {
                return Err(DbError::not_found("Ingredient", &line.ingredient_id));
            }

            sqlx::query(
                "INSERT INTO recipe_lines (id, recipe_id, ingredient_id, quantity, position) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(new_id())
            .bind(&id)
            .bind(&line.ingredient_id)
            .bind(line.quantity)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        for variant in &input.variants {
            sqlx::query(
                "INSERT INTO recipe_variants (id, recipe_id, name, price_factor, sell_price_cents) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(new_id())
            .bind(&id)
            .bind(variant.name.trim())
            .bind(variant.price_factor)
            .bind(variant.sell_price_cents)
            .execute(&mut *tx)
            .await?;
        }

        Self::attach(&mut *tx, std::slice::from_mut(&mut recipe)).await?;
        tx.commit().await?;

        Ok(recipe)
    }

    /// Gets a live recipe with lines and variants.
    pub async fn get(&self, tenant_id: &str, id: &str) -> DbResult<Option<Recipe>> {
        let mut conn = self.pool.acquire().await?;
        Self::load(&mut *conn, tenant_id, id).await
    }

    pub async fn require(&self, tenant_id: &str, id: &str) -> DbResult<Recipe> {
        self.get(tenant_id, id)
            .await?
            .ok_or_else(|| DbError::not_found("Recipe", id))
    }

    /// Lists live recipes, each with lines and variants.
    pub async fn list(&self, tenant_id: &str, include_inactive: bool) -> DbResult<Vec<Recipe>> {
        let mut conn = self.pool.acquire().await?;
        let mut recipes = sqlx::query_as::<_, Recipe>(
            r#"
            SELECT * FROM recipes
            WHERE tenant_id = ? AND deleted_at IS NULL AND (is_active = 1 OR ?)
            ORDER BY name
            "#,
        )
        .bind(tenant_id)
        .bind(include_inactive)
        .fetch_all(&mut *conn)
        .await?;

        Self::attach(&mut *conn, &mut recipes).await?;
        Ok(recipes)
    }

    /// Live recipes whose composition names the ingredient.
    pub async fn using_ingredient(&self, tenant_id: &str, ingredient_id: &str) -> DbResult<Vec<Recipe>> {
        let mut conn = self.pool.acquire().await?;
        let mut recipes = sqlx::query_as::<_, Recipe>(
            r#"
            SELECT DISTINCT r.* FROM recipes r
            JOIN recipe_lines rl ON rl.recipe_id = r.id
            WHERE r.tenant_id = ? AND rl.ingredient_id = ? AND r.deleted_at IS NULL
            ORDER BY r.name
            "#,
        )
        .bind(tenant_id)
        .bind(ingredient_id)
        .fetch_all(&mut *conn)
        .await?;

        Self::attach(&mut *conn, &mut recipes).await?;
        Ok(recipes)
    }

    /// Stores the last computed per-portion cost.
    pub async fn set_cost_per_portion(&self, tenant_id: &str, id: &str, cents: i64) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE recipes SET cost_per_portion_cents = ?, updated_at = ? WHERE tenant_id = ? AND id = ?",
        )
        .bind(cents)
        .bind(Utc::now())
        .bind(tenant_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Recipe", id));
        }
        Ok(())
    }

    pub async fn set_active(&self, tenant_id: &str, id: &str, active: bool) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE recipes SET is_active = ?, updated_at = ? WHERE tenant_id = ? AND id = ? AND deleted_at IS NULL",
        )
        .bind(active)
        .bind(Utc::now())
        .bind(tenant_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Recipe", id));
        }
        Ok(())
    }

    pub async fn soft_delete(&self, tenant_id: &str, id: &str) -> DbResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE recipes SET deleted_at = ?, updated_at = ? WHERE tenant_id = ? AND id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(tenant_id)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Recipe", id));
        }
        Ok(())
    }

    // =========================================================================
    // Unit-of-Work Functions
    // =========================================================================

    /// Loads a recipe on the caller's connection, soft-deleted rows included.
    ///
    /// Reversal replays against recipes that may have been deleted since the
    /// sale, so this does not filter on `deleted_at`.
    pub async fn load_any(conn: &mut SqliteConnection, tenant_id: &str, id: &str) -> DbResult<Option<Recipe>> {
        let recipe = sqlx::query_as::<_, Recipe>("SELECT * FROM recipes WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        match recipe {
            Some(mut recipe) => {
                Self::attach(conn, std::slice::from_mut(&mut recipe)).await?;
                Ok(Some(recipe))
            }
            None => Ok(None),
        }
    }

    async fn load(conn: &mut SqliteConnection, tenant_id: &str, id: &str) -> DbResult<Option<Recipe>> {
        Ok(Self::load_any(conn, tenant_id, id)
            .await?
            .filter(|r| r.deleted_at.is_none()))
    }

    /// Fills `lines` and `variants` of already loaded recipes.
    async fn attach(conn: &mut SqliteConnection, recipes: &mut [Recipe]) -> DbResult<()> {
        if recipes.is_empty() {
            return Ok(());
        }

        let mut lines_by_recipe: HashMap<String, Vec<RecipeLine>> = HashMap::new();
        let mut variants_by_recipe: HashMap<String, Vec<RecipeVariant>> = HashMap::new();

        for recipe in recipes.iter() {
            let lines = sqlx::query_as::<_, RecipeLine>(
                "SELECT ingredient_id, quantity, position FROM recipe_lines WHERE recipe_id = ? ORDER BY position",
            )
            .bind(&recipe.id)
            .fetch_all(&mut *conn)
            .await?;
            lines_by_recipe.insert(recipe.id.clone(), lines);

            let variants = sqlx::query_as::<_, RecipeVariant>(
                "SELECT * FROM recipe_variants WHERE recipe_id = ? ORDER BY name",
            )
            .bind(&recipe.id)
            .fetch_all(&mut *conn)
            .await?;
            variants_by_recipe.insert(recipe.id.clone(), variants);
        }

        for recipe in recipes.iter_mut() {
            recipe.lines = lines_by_recipe.remove(&recipe.id).unwrap_or_default();
            recipe.variants = variants_by_recipe.remove(&recipe.id).unwrap_or_default();
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
