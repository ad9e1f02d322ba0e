//! # Ledger Repository
//!
//! The two daily accumulators: purchases per (ingredient, date, order) and
//! sales per (recipe, date).
//!
//! ## Merge, Never Overwrite
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  merge_*(key, contribution)                                            │
//! │     1. SELECT the row for the key      (caller already holds the lock) │
//! │     2. none  → INSERT contribution                                     │
//! │        found → UPDATE row = row + contribution                         │
//! │                                                                         │
//! │  reverse_*(key, contribution)                                          │
//! │     row = row − contribution, each field clamped at zero               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The read-add-write runs inside the caller's unit of work, which opened
//! with a write and therefore holds the database write lock.

use std::collections::HashMap;

use chrono::{NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use crate::error::DbResult;
use crate::repository::new_id;
use galley_core::ledger::{PurchaseTotals, SalesTotals};
use galley_core::{DailyPurchaseRecord, DailySalesSummary, Money};

/// Repository for the daily accumulators.
#[derive(Debug, Clone)]
pub struct LedgerRepository {
    pool: SqlitePool,
}

impl LedgerRepository {
    /// Creates a new LedgerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        LedgerRepository { pool }
    }

    // =========================================================================
    // Purchase Ledger (reads)
    // =========================================================================

    pub async fn purchases_between(&self, tenant_id: &str, from: NaiveDate, to: NaiveDate) -> DbResult<Vec<DailyPurchaseRecord>> {
        let rows = sqlx::query_as::<_, DailyPurchaseRecord>(
            r#"
            SELECT * FROM daily_purchases
            WHERE tenant_id = ? AND purchase_date BETWEEN ? AND ?
            ORDER BY purchase_date, ingredient_id
            "#,
        )
        .bind(tenant_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn purchases_for_order(&self, tenant_id: &str, order_id: &str) -> DbResult<Vec<DailyPurchaseRecord>> {
        let rows = sqlx::query_as::<_, DailyPurchaseRecord>(
            "SELECT * FROM daily_purchases WHERE tenant_id = ? AND source_order_id = ? ORDER BY ingredient_id",
        )
        .bind(tenant_id)
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Everything bought of one ingredient on one day, across all orders.
    pub async fn purchase_day_total(&self, tenant_id: &str, ingredient_id: &str, date: NaiveDate) -> DbResult<PurchaseTotals> {
        let rows = sqlx::query_as::<_, DailyPurchaseRecord>(
            "SELECT * FROM daily_purchases WHERE tenant_id = ? AND ingredient_id = ? AND purchase_date = ?",
        )
        .bind(tenant_id)
        .bind(ingredient_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await?;

        let mut totals = PurchaseTotals::default();
        for row in &rows {
            totals = totals.merged(&PurchaseTotals {
                quantity: row.quantity_bought,
                total: Money::from_cents(row.total_spent_cents),
            })?;
        }
        Ok(totals)
    }

    // =========================================================================
    // Sales Summary (reads)
    // =========================================================================

    pub async fn sales_between(&self, tenant_id: &str, from: NaiveDate, to: NaiveDate) -> DbResult<Vec<DailySalesSummary>> {
        let rows = sqlx::query_as::<_, DailySalesSummary>(
            r#"
            SELECT * FROM daily_sales_summaries
            WHERE tenant_id = ? AND sale_date BETWEEN ? AND ?
            ORDER BY sale_date, recipe_id
            "#,
        )
        .bind(tenant_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn sales_summary(&self, tenant_id: &str, recipe_id: &str, date: NaiveDate) -> DbResult<Option<DailySalesSummary>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_sales(&mut *conn, tenant_id, recipe_id, date).await
    }

    /// Units sold per recipe over a date range (menu engineering popularity).
    pub async fn units_sold_between(&self, tenant_id: &str, from: NaiveDate, to: NaiveDate) -> DbResult<HashMap<String, f64>> {
        let rows = self.sales_between(tenant_id, from, to).await?;
        let mut units = HashMap::new();
        for row in rows {
            *units.entry(row.recipe_id).or_insert(0.0) += row.units_sold;
        }
        Ok(units)
    }

    // =========================================================================
    // Purchase Ledger (unit of work)
    // =========================================================================

    async fn find_purchase(
        conn: &mut SqliteConnection,
        tenant_id: &str,
        ingredient_id: &str,
        date: NaiveDate,
        source_order_id: Option<&str>,
    ) -> DbResult<Option<DailyPurchaseRecord>> {
        // `IS` matches NULL against NULL for rows that predate per-order keys
        let row = sqlx::query_as::<_, DailyPurchaseRecord>(
            r#"
            SELECT * FROM daily_purchases
            WHERE tenant_id = ? AND ingredient_id = ? AND purchase_date = ? AND source_order_id IS ?
            "#,
        )
        .bind(tenant_id)
        .bind(ingredient_id)
        .bind(date)
        .bind(source_order_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row)
    }

    /// Adds a contribution to the purchase accumulator for the key.
    pub async fn merge_purchase(
        conn: &mut SqliteConnection,
        tenant_id: &str,
        ingredient_id: &str,
        date: NaiveDate,
        source_order_id: Option<&str>,
        contribution: &PurchaseTotals,
    ) -> DbResult<DailyPurchaseRecord> {
        let now = Utc::now();
        let existing = Self::find_purchase(conn, tenant_id, ingredient_id, date, source_order_id).await?;

        let row = match existing {
            Some(row) => {
                let merged = PurchaseTotals {
                    quantity: row.quantity_bought,
                    total: Money::from_cents(row.total_spent_cents),
                }
                .merged(contribution)?;

                debug!(ingredient_id, %date, quantity = merged.quantity, "Merging purchase ledger row");
                sqlx::query_as::<_, DailyPurchaseRecord>(
                    r#"
                    UPDATE daily_purchases SET quantity_bought = ?, total_spent_cents = ?, updated_at = ?
                    WHERE id = ?
                    RETURNING *
                    "#,
                )
                .bind(merged.quantity)
                .bind(merged.total.cents())
                .bind(now)
                .bind(&row.id)
                .fetch_one(&mut *conn)
                .await?
            }
            None => {
                debug!(ingredient_id, %date, quantity = contribution.quantity, "Inserting purchase ledger row");
                sqlx::query_as::<_, DailyPurchaseRecord>(
                    r#"
                    INSERT INTO daily_purchases (
                        id, tenant_id, ingredient_id, purchase_date, source_order_id,
                        quantity_bought, total_spent_cents, updated_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                    RETURNING *
                    "#,
                )
                .bind(new_id())
                .bind(tenant_id)
                .bind(ingredient_id)
                .bind(date)
                .bind(source_order_id)
                .bind(contribution.quantity)
                .bind(contribution.total.cents())
                .bind(now)
                .fetch_one(&mut *conn)
                .await?
            }
        };

        Ok(row)
    }

    /// Removes every accumulator row keyed by the order. Returns the count.
    pub async fn delete_order_purchases(conn: &mut SqliteConnection, tenant_id: &str, order_id: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM daily_purchases WHERE tenant_id = ? AND source_order_id = ?")
            .bind(tenant_id)
            .bind(order_id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected())
    }

    /// Subtracts a contribution from an un-keyed (legacy) ingredient/day row.
    ///
    /// The row is removed once nothing is left. Returns false when no such
    /// row exists.
    pub async fn reverse_legacy_purchase(
        conn: &mut SqliteConnection,
        tenant_id: &str,
        ingredient_id: &str,
        date: NaiveDate,
        contribution: &PurchaseTotals,
    ) -> DbResult<bool> {
        let Some(row) = Self::find_purchase(conn, tenant_id, ingredient_id, date, None).await? else {
            warn!(ingredient_id, %date, "No legacy purchase ledger row to reverse");
            return Ok(false);
        };

        let left = PurchaseTotals {
            quantity: row.quantity_bought,
            total: Money::from_cents(row.total_spent_cents),
        }
        .reversed(contribution);

        if left.is_exhausted() {
            debug!(ingredient_id, %date, "Legacy purchase ledger row exhausted, removing");
            sqlx::query("DELETE FROM daily_purchases WHERE id = ?")
                .bind(&row.id)
                .execute(&mut *conn)
                .await?;
        } else {
            sqlx::query("UPDATE daily_purchases SET quantity_bought = ?, total_spent_cents = ?, updated_at = ? WHERE id = ?")
                .bind(left.quantity)
                .bind(left.total.cents())
                .bind(Utc::now())
                .bind(&row.id)
                .execute(&mut *conn)
                .await?;
        }
        Ok(true)
    }

    // =========================================================================
    // Sales Summary (unit of work)
    // =========================================================================

    pub async fn find_sales(
        conn: &mut SqliteConnection,
        tenant_id: &str,
        recipe_id: &str,
        date: NaiveDate,
    ) -> DbResult<Option<DailySalesSummary>> {
        let row = sqlx::query_as::<_, DailySalesSummary>(
            "SELECT * FROM daily_sales_summaries WHERE tenant_id = ? AND recipe_id = ? AND sale_date = ?",
        )
        .bind(tenant_id)
        .bind(recipe_id)
        .bind(date)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row)
    }

    async fn write_sales(conn: &mut SqliteConnection, row: &DailySalesSummary) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE daily_sales_summaries
            SET units_sold = ?, revenue_cents = ?, ingredient_cost_cents = ?, gross_profit_cents = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(row.units_sold)
        .bind(row.revenue_cents)
        .bind(row.ingredient_cost_cents)
        .bind(row.gross_profit_cents)
        .bind(row.updated_at)
        .bind(&row.id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Adds a sale's contribution to the (recipe, date) summary.
    pub async fn merge_sales(
        conn: &mut SqliteConnection,
        tenant_id: &str,
        recipe_id: &str,
        date: NaiveDate,
        contribution: &SalesTotals,
    ) -> DbResult<DailySalesSummary> {
        let now = Utc::now();

        match Self::find_sales(conn, tenant_id, recipe_id, date).await? {
            Some(mut row) => {
                let merged = row.totals().merged(contribution)?;
                row.set_totals(merged);
                row.updated_at = now;
                Self::write_sales(conn, &row).await?;
                Ok(row)
            }
            None => {
                let mut row = DailySalesSummary {
                    id: new_id(),
                    tenant_id: tenant_id.to_string(),
                    recipe_id: recipe_id.to_string(),
                    sale_date: date,
                    units_sold: 0.0,
                    revenue_cents: 0,
                    ingredient_cost_cents: 0,
                    gross_profit_cents: 0,
                    updated_at: now,
                };
                row.set_totals(SalesTotals::default().merged(contribution)?);

                sqlx::query(
                    r#"
                    INSERT INTO daily_sales_summaries (
                        id, tenant_id, recipe_id, sale_date, units_sold,
                        revenue_cents, ingredient_cost_cents, gross_profit_cents, updated_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&row.id)
                .bind(&row.tenant_id)
                .bind(&row.recipe_id)
                .bind(row.sale_date)
                .bind(row.units_sold)
                .bind(row.revenue_cents)
                .bind(row.ingredient_cost_cents)
                .bind(row.gross_profit_cents)
                .bind(row.updated_at)
                .execute(&mut *conn)
                .await?;
                Ok(row)
            }
        }
    }

    /// Removes a sale's contribution; fields clamp at zero.
    ///
    /// `None` when the summary row does not exist (nothing to reverse).
    pub async fn reverse_sales(
        conn: &mut SqliteConnection,
        tenant_id: &str,
        recipe_id: &str,
        date: NaiveDate,
        contribution: &SalesTotals,
    ) -> DbResult<Option<DailySalesSummary>> {
        let Some(mut row) = Self::find_sales(conn, tenant_id, recipe_id, date).await? else {
            warn!(recipe_id, %date, "No sales summary row to reverse");
            return Ok(None);
        };

        let reversed = row.totals().reversed(contribution);
        row.set_totals(reversed);
        row.updated_at = Utc::now();
        Self::write_sales(conn, &row).await?;
        Ok(Some(row))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    fn bought(quantity: f64, cents: i64) -> PurchaseTotals {
        PurchaseTotals {
            quantity,
            total: Money::from_cents(cents),
        }
    }

    #[tokio::test]
    async fn test_purchase_merge_accumulates_per_order() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.pool().begin().await.unwrap();

        LedgerRepository::merge_purchase(&mut *tx, "t1", "flour", day(), Some("po-1"), &bought(10.0, 2500))
            .await
            .unwrap();
        let row = LedgerRepository::merge_purchase(&mut *tx, "t1", "flour", day(), Some("po-1"), &bought(5.0, 1250))
            .await
            .unwrap();
        assert_eq!(row.quantity_bought, 15.0);
        assert_eq!(row.total_spent_cents, 3750);
        assert_eq!(row.unit_price().cents(), 250);

        LedgerRepository::merge_purchase(&mut *tx, "t1", "flour", day(), Some("po-2"), &bought(2.0, 600))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let total = db.ledger().purchase_day_total("t1", "flour", day()).await.unwrap();
        assert_eq!(total.quantity, 17.0);
        assert_eq!(total.total.cents(), 4350);

        let mut tx = db.pool().begin().await.unwrap();
        let removed = LedgerRepository::delete_order_purchases(&mut *tx, "t1", "po-1").await.unwrap();
        tx.commit().await.unwrap();
        assert_eq!(removed, 1);

        let total = db.ledger().purchase_day_total("t1", "flour", day()).await.unwrap();
        assert_eq!(total.quantity, 2.0);
        assert_eq!(total.total.cents(), 600);
    }

    #[tokio::test]
    async fn test_legacy_row_reversal() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let mut tx = db.pool().begin().await.unwrap();

        LedgerRepository::merge_purchase(&mut *tx, "t1", "milk", day(), None, &bought(8.0, 800))
            .await
            .unwrap();
        assert!(LedgerRepository::reverse_legacy_purchase(&mut *tx, "t1", "milk", day(), &bought(3.0, 300))
            .await
            .unwrap());
        tx.commit().await.unwrap();

        let total = db.ledger().purchase_day_total("t1", "milk", day()).await.unwrap();
        assert_eq!(total.quantity, 5.0);
        assert_eq!(total.total.cents(), 500);

        let mut tx = db.pool().begin().await.unwrap();
        LedgerRepository::reverse_legacy_purchase(&mut *tx, "t1", "milk", day(), &bought(5.0, 500))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        assert!(db.ledger().purchases_between("t1", day(), day()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sales_summary_keeps_gross_profit() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let sale = SalesTotals {
            units_sold: 2.0,
            revenue: Money::from_cents(2000),
            ingredient_cost: Money::from_cents(700),
        };

        let mut tx = db.pool().begin().await.unwrap();
        LedgerRepository::merge_sales(&mut *tx, "t1", "pizza", day(), &sale).await.unwrap();
        let row = LedgerRepository::merge_sales(&mut *tx, "t1", "pizza", day(), &sale).await.unwrap();
        assert_eq!(row.units_sold, 4.0);
        assert_eq!(row.gross_profit_cents, row.revenue_cents - row.ingredient_cost_cents);

        let row = LedgerRepository::reverse_sales(&mut *tx, "t1", "pizza", day(), &sale)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.units_sold, 2.0);
        assert_eq!(row.revenue_cents, 2000);
        assert_eq!(row.gross_profit_cents, 1300);
        tx.commit().await.unwrap();

        let units = db.ledger().units_sold_between("t1", day(), day()).await.unwrap();
        assert_eq!(units.get("pizza"), Some(&2.0));
    }
}
