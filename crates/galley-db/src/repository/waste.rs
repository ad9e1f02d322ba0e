//! # Waste Repository
//!
//! Spoilage, breakage and other stock written off outside of sales.
//! A record may point at an ingredient or only carry a free-text
//! description; only the former touches stock.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use galley_core::WasteRecord;

/// Repository for waste record database operations.
#[derive(Debug, Clone)]
pub struct WasteRepository {
    pool: SqlitePool,
}

impl WasteRepository {
    /// Creates a new WasteRepository.
    pub fn new(pool: SqlitePool) -> Self {
        WasteRepository { pool }
    }

    pub async fn get(&self, tenant_id: &str, id: &str) -> DbResult<Option<WasteRecord>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_any(&mut *conn, tenant_id, id).await
    }

    /// Live records of a reporting period (`YYYYMM`).
    pub async fn list_for_period(&self, tenant_id: &str, period: i64) -> DbResult<Vec<WasteRecord>> {
        let records = sqlx::query_as::<_, WasteRecord>(
            r#"
            SELECT * FROM waste_records
            WHERE tenant_id = ? AND period = ? AND deleted_at IS NULL
            ORDER BY waste_date, created_at
            "#,
        )
        .bind(tenant_id)
        .bind(period)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    // =========================================================================
    // Unit-of-Work Functions
    // =========================================================================

    pub async fn insert(conn: &mut SqliteConnection, record: &WasteRecord) -> DbResult<()> {
        debug!(id = %record.id, ingredient_id = ?record.ingredient_id, "Inserting waste record");

        sqlx::query(
            r#"
            INSERT INTO waste_records (
                id, tenant_id, ingredient_id, description, quantity,
                value_lost_cents, reason, period, waste_date, created_at, deleted_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.tenant_id)
        .bind(&record.ingredient_id)
        .bind(&record.description)
        .bind(record.quantity)
        .bind(record.value_lost_cents)
        .bind(&record.reason)
        .bind(record.period)
        .bind(record.waste_date)
        .bind(record.created_at)
        .bind(record.deleted_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Soft-deletes a live record and returns it.
    pub async fn lock_for_delete(conn: &mut SqliteConnection, tenant_id: &str, id: &str) -> DbResult<Option<WasteRecord>> {
        let record = sqlx::query_as::<_, WasteRecord>(
            r#"
            UPDATE waste_records SET deleted_at = ?
            WHERE tenant_id = ? AND id = ? AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(Utc::now())
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(record)
    }

    pub async fn find_any(conn: &mut SqliteConnection, tenant_id: &str, id: &str) -> DbResult<Option<WasteRecord>> {
        let record = sqlx::query_as::<_, WasteRecord>("SELECT * FROM waste_records WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(record)
    }
}
