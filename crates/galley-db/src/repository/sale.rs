//! # Sale Repository
//!
//! Sales and the stock movements recorded with them.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. RECORD (one transaction, see engine::sales)                        │
//! │     └── insert() → Sale { deleted_at: None }                           │
//! │     └── insert_movements() → one row per touched ingredient            │
//! │                                                                         │
//! │  2. (OPTIONAL) DELETE                                                  │
//! │     └── lock_for_delete() → sets deleted_at, returns the sale          │
//! │     └── movements() → what to put back                                 │
//! │                                                                         │
//! │  Rows are never removed; the frozen price_factor and the movements    │
//! │  are what reversal replays.                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use galley_core::{Sale, StockMovement};

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale by id, soft-deleted included.
    pub async fn get(&self, tenant_id: &str, id: &str) -> DbResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_any(&mut *conn, tenant_id, id).await
    }

    /// Live sales with `from <= sale_date <= to`.
    pub async fn list_between(&self, tenant_id: &str, from: NaiveDate, to: NaiveDate) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(
            r#"
            SELECT * FROM sales
            WHERE tenant_id = ? AND sale_date BETWEEN ? AND ? AND deleted_at IS NULL
            ORDER BY sale_date, created_at
            "#,
        )
        .bind(tenant_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Stock movements recorded for a sale.
    pub async fn get_movements(&self, sale_id: &str) -> DbResult<Vec<StockMovement>> {
        let mut conn = self.pool.acquire().await?;
        Self::movements(&mut *conn, sale_id).await
    }

    // =========================================================================
    // Unit-of-Work Functions
    // =========================================================================

    pub async fn insert(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, recipe_id = %sale.recipe_id, "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, tenant_id, recipe_id, variant_id, quantity,
                unit_price_cents, total_cents, price_factor, ingredient_cost_cents,
                sale_date, source, created_at, deleted_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.tenant_id)
        .bind(&sale.recipe_id)
        .bind(&sale.variant_id)
        .bind(sale.quantity)
        .bind(sale.unit_price_cents)
        .bind(sale.total_cents)
        .bind(sale.price_factor)
        .bind(sale.ingredient_cost_cents)
        .bind(sale.sale_date)
        .bind(sale.source)
        .bind(sale.created_at)
        .bind(sale.deleted_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn insert_movements(conn: &mut SqliteConnection, sale_id: &str, movements: &[StockMovement]) -> DbResult<()> {
        for movement in movements {
            sqlx::query(
                "INSERT INTO sale_stock_movements (sale_id, ingredient_id, requested, applied) VALUES (?, ?, ?, ?)",
            )
            .bind(sale_id)
            .bind(&movement.ingredient_id)
            .bind(movement.requested)
            .bind(movement.applied)
            .execute(&mut *conn)
            .await?;
        }
        Ok(())
    }

    /// Movements of a sale in ascending ingredient id (lock order).
    pub async fn movements(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT ingredient_id, requested, applied FROM sale_stock_movements
            WHERE sale_id = ?
            ORDER BY ingredient_id
            "#,
        )
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(movements)
    }

    /// Soft-deletes a live sale and returns it; the UPDATE is the row lock.
    ///
    /// `None` when there is no live sale with that id.
    pub async fn lock_for_delete(conn: &mut SqliteConnection, tenant_id: &str, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(
            r#"
            UPDATE sales SET deleted_at = ?
            WHERE tenant_id = ? AND id = ? AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(Utc::now())
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(sale)
    }

    /// Finds a sale whether or not it is deleted.
    pub async fn find_any(conn: &mut SqliteConnection, tenant_id: &str, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(sale)
    }
}
