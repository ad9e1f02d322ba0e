//! # Purchase Order Repository
//!
//! Purchase orders and their lines.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   create ──► PENDING ──── receive ────► RECEIVED ──── delete ──► ✗     │
//! │                 │                      (stock +,       (stock −,        │
//! │                 │                       ledger +)       ledger −)       │
//! │                 └────── cancel ──► CANCELLED                            │
//! │                                                                         │
//! │   The repository stores whatever status it is told; the engine         │
//! │   (engine::purchases) decides which transitions are allowed.           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use galley_core::{PurchaseOrder, PurchaseOrderLine, PurchaseOrderStatus};

/// Repository for purchase order database operations.
#[derive(Debug, Clone)]
pub struct PurchaseRepository {
    pool: SqlitePool,
}

impl PurchaseRepository {
    /// Creates a new PurchaseRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PurchaseRepository { pool }
    }

    /// Gets an order with its lines, soft-deleted included.
    pub async fn get(&self, tenant_id: &str, id: &str) -> DbResult<Option<PurchaseOrder>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_any(&mut *conn, tenant_id, id).await
    }

    /// Live orders, newest first, optionally filtered by status.
    pub async fn list(&self, tenant_id: &str, status: Option<PurchaseOrderStatus>) -> DbResult<Vec<PurchaseOrder>> {
        let mut conn = self.pool.acquire().await?;
        let mut orders = sqlx::query_as::<_, PurchaseOrder>(
            r#"
            SELECT * FROM purchase_orders
            WHERE tenant_id = ? AND deleted_at IS NULL AND (? IS NULL OR status = ?)
            ORDER BY created_at DESC
            "#,
        )
        .bind(tenant_id)
        .bind(status)
        .bind(status)
        .fetch_all(&mut *conn)
        .await?;

        for order in orders.iter_mut() {
            order.lines = Self::lines(&mut *conn, &order.id).await?;
        }
        Ok(orders)
    }

    // =========================================================================
    // Unit-of-Work Functions
    // =========================================================================

    /// Inserts the order header; lines go through [`Self::insert_line`].
    pub async fn insert_order(conn: &mut SqliteConnection, order: &PurchaseOrder) -> DbResult<()> {
        debug!(id = %order.id, status = %order.status, "Inserting purchase order");

        sqlx::query(
            r#"
            INSERT INTO purchase_orders (
                id, tenant_id, supplier_reference, notes, status,
                expected_on, received_at, created_at, updated_at, deleted_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, NULL)
            "#,
        )
        .bind(&order.id)
        .bind(&order.tenant_id)
        .bind(&order.supplier_reference)
        .bind(&order.notes)
        .bind(order.status)
        .bind(order.expected_on)
        .bind(order.received_at)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn insert_line(conn: &mut SqliteConnection, line: &PurchaseOrderLine) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO purchase_order_lines (
                id, order_id, ingredient_id, ordered_quantity,
                received_quantity, unit_price_cents, position
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&line.id)
        .bind(&line.order_id)
        .bind(&line.ingredient_id)
        .bind(line.ordered_quantity)
        .bind(line.received_quantity)
        .bind(line.unit_price_cents)
        .bind(line.position)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    pub async fn lines(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<PurchaseOrderLine>> {
        let lines = sqlx::query_as::<_, PurchaseOrderLine>(
            "SELECT * FROM purchase_order_lines WHERE order_id = ? ORDER BY position",
        )
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(lines)
    }

    /// Takes the row lock on a live order and returns it with its lines.
    pub async fn lock(conn: &mut SqliteConnection, tenant_id: &str, id: &str) -> DbResult<Option<PurchaseOrder>> {
        let order = sqlx::query_as::<_, PurchaseOrder>(
            r#"
            UPDATE purchase_orders SET updated_at = ?
            WHERE tenant_id = ? AND id = ? AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(Utc::now())
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Self::with_lines(conn, order).await
    }

    /// Soft-deletes a live order and returns it with its lines.
    pub async fn lock_for_delete(conn: &mut SqliteConnection, tenant_id: &str, id: &str) -> DbResult<Option<PurchaseOrder>> {
        let now = Utc::now();
        let order = sqlx::query_as::<_, PurchaseOrder>(
            r#"
            UPDATE purchase_orders SET deleted_at = ?, updated_at = ?
            WHERE tenant_id = ? AND id = ? AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(tenant_id)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        Self::with_lines(conn, order).await
    }

    pub async fn find_any(conn: &mut SqliteConnection, tenant_id: &str, id: &str) -> DbResult<Option<PurchaseOrder>> {
        let order = sqlx::query_as::<_, PurchaseOrder>("SELECT * FROM purchase_orders WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Self::with_lines(conn, order).await
    }

    pub async fn write_status(
        conn: &mut SqliteConnection,
        tenant_id: &str,
        id: &str,
        status: PurchaseOrderStatus,
        received_at: Option<DateTime<Utc>>,
    ) -> DbResult<()> {
        sqlx::query(
            "UPDATE purchase_orders SET status = ?, received_at = ?, updated_at = ? WHERE tenant_id = ? AND id = ?",
        )
        .bind(status)
        .bind(received_at)
        .bind(Utc::now())
        .bind(tenant_id)
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn write_details(
        conn: &mut SqliteConnection,
        tenant_id: &str,
        id: &str,
        supplier_reference: Option<&str>,
        notes: Option<&str>,
        expected_on: Option<NaiveDate>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE purchase_orders
            SET supplier_reference = ?, notes = ?, expected_on = ?, updated_at = ?
            WHERE tenant_id = ? AND id = ?
            "#,
        )
        .bind(supplier_reference)
        .bind(notes)
        .bind(expected_on)
        .bind(Utc::now())
        .bind(tenant_id)
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Sets the received amount of one line. Returns false for a foreign line id.
    pub async fn write_received_quantity(
        conn: &mut SqliteConnection,
        order_id: &str,
        line_id: &str,
        received_quantity: f64,
    ) -> DbResult<bool> {
        let result = sqlx::query("UPDATE purchase_order_lines SET received_quantity = ? WHERE order_id = ? AND id = ?")
            .bind(received_quantity)
            .bind(order_id)
            .bind(line_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn with_lines(conn: &mut SqliteConnection, order: Option<PurchaseOrder>) -> DbResult<Option<PurchaseOrder>> {
        match order {
            Some(mut order) => {
                order.lines = Self::lines(conn, &order.id).await?;
                Ok(Some(order))
            }
            None => Ok(None),
        }
    }
}
