//! # Audit Repository
//!
//! Stock snapshots and adjustments written by consolidation. Both tables
//! are append-only; triggers in the schema reject UPDATEs.

use sqlx::{SqliteConnection, SqlitePool};

use crate::error::DbResult;
use galley_core::{StockAdjustment, StockSnapshot};

/// Repository for the consolidation audit trail.
#[derive(Debug, Clone)]
pub struct AuditRepository {
    pool: SqlitePool,
}

impl AuditRepository {
    /// Creates a new AuditRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AuditRepository { pool }
    }

    /// Snapshots of one ingredient, oldest first.
    pub async fn snapshots_for(&self, tenant_id: &str, ingredient_id: &str) -> DbResult<Vec<StockSnapshot>> {
        let rows = sqlx::query_as::<_, StockSnapshot>(
            "SELECT * FROM stock_snapshots WHERE tenant_id = ? AND ingredient_id = ? ORDER BY taken_at, id",
        )
        .bind(tenant_id)
        .bind(ingredient_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn snapshots_for_consolidation(&self, tenant_id: &str, consolidation_id: &str) -> DbResult<Vec<StockSnapshot>> {
        let rows = sqlx::query_as::<_, StockSnapshot>(
            "SELECT * FROM stock_snapshots WHERE tenant_id = ? AND consolidation_id = ? ORDER BY ingredient_id",
        )
        .bind(tenant_id)
        .bind(consolidation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn adjustments_for(&self, tenant_id: &str, ingredient_id: &str) -> DbResult<Vec<StockAdjustment>> {
        let rows = sqlx::query_as::<_, StockAdjustment>(
            "SELECT * FROM stock_adjustments WHERE tenant_id = ? AND ingredient_id = ? ORDER BY created_at, id",
        )
        .bind(tenant_id)
        .bind(ingredient_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // =========================================================================
    // Unit-of-Work Functions
    // =========================================================================

    pub async fn insert_snapshot(conn: &mut SqliteConnection, snapshot: &StockSnapshot) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_snapshots (
                id, tenant_id, ingredient_id, consolidation_id,
                virtual_stock, physical_stock, difference, taken_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&snapshot.id)
        .bind(&snapshot.tenant_id)
        .bind(&snapshot.ingredient_id)
        .bind(&snapshot.consolidation_id)
        .bind(snapshot.virtual_stock)
        .bind(snapshot.physical_stock)
        .bind(snapshot.difference)
        .bind(snapshot.taken_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn insert_adjustment(conn: &mut SqliteConnection, adjustment: &StockAdjustment) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO stock_adjustments (
                id, tenant_id, ingredient_id, consolidation_id, quantity_delta, note, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&adjustment.id)
        .bind(&adjustment.tenant_id)
        .bind(&adjustment.ingredient_id)
        .bind(&adjustment.consolidation_id)
        .bind(adjustment.quantity_delta)
        .bind(&adjustment.note)
        .bind(adjustment.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}
