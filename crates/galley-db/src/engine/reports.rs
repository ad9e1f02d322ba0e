//! Read-side views over the ledgers and the audit trail.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::DbResult;
use crate::pool::Database;
use galley_core::ledger::SalesTotals;
use galley_core::{Alert, DailyPurchaseRecord, DailySalesSummary, Ingredient, Money, Sale, StockSnapshot, WasteRecord};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesReport {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub rows: Vec<DailySalesSummary>,
    pub totals: SalesTotals,
}

impl SalesReport {
    pub fn gross_profit(&self) -> Money {
        self.totals.gross_profit()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WasteReport {
    pub period: i64,
    pub records: Vec<WasteRecord>,
    pub value_lost: Money,
}

#[derive(Debug, Clone)]
pub struct Reports {
    db: Database,
}

impl Reports {
    pub fn new(db: Database) -> Self {
        Reports { db }
    }

    pub async fn purchase_ledger(&self, tenant_id: &str, from: NaiveDate, to: NaiveDate) -> DbResult<Vec<DailyPurchaseRecord>> {
        self.db.ledger().purchases_between(tenant_id, from, to).await
    }

    pub async fn sales(&self, tenant_id: &str, from: NaiveDate, to: NaiveDate) -> DbResult<SalesReport> {
        let rows = self.db.ledger().sales_between(tenant_id, from, to).await?;
        let totals = rows
            .iter()
            .try_fold(SalesTotals::default(), |acc, row| acc.merged(&row.totals()))?;

        Ok(SalesReport { from, to, rows, totals })
    }

    /// Individual live sales, oldest first.
    pub async fn sale_register(&self, tenant_id: &str, from: NaiveDate, to: NaiveDate) -> DbResult<Vec<Sale>> {
        self.db.sales().list_between(tenant_id, from, to).await
    }

    /// Live waste of a `YYYYMM` period.
    pub async fn waste(&self, tenant_id: &str, period: i64) -> DbResult<WasteReport> {
        let records = self.db.waste().list_for_period(tenant_id, period).await?;
        let value_lost = records.iter().map(|r| Money::from_cents(r.value_lost_cents)).sum();

        Ok(WasteReport {
            period,
            records,
            value_lost,
        })
    }

    pub async fn stock_history(&self, tenant_id: &str, ingredient_id: &str) -> DbResult<Vec<StockSnapshot>> {
        self.db.audit().snapshots_for(tenant_id, ingredient_id).await
    }

    /// Every snapshot one consolidation batch wrote.
    pub async fn consolidation(&self, tenant_id: &str, consolidation_id: &str) -> DbResult<Vec<StockSnapshot>> {
        self.db.audit().snapshots_for_consolidation(tenant_id, consolidation_id).await
    }

    /// Active ingredients whose stock is under their minimum.
    pub async fn low_stock(&self, tenant_id: &str) -> DbResult<Vec<Ingredient>> {
        let ingredients = self.db.ingredients().list(tenant_id, false).await?;
        Ok(ingredients.into_iter().filter(|i| i.is_below_minimum()).collect())
    }

    pub async fn alerts(&self, tenant_id: &str) -> DbResult<Vec<Alert>> {
        self.db.alerts().list(tenant_id).await
    }
}
