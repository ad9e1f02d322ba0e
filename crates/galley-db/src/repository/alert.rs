//! Alerts raised by event subscribers (low stock, food cost).

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;

use crate::error::DbResult;
use crate::repository::new_id;
use galley_core::{Alert, AlertKind};

/// Repository for alert rows.
#[derive(Debug, Clone)]
pub struct AlertRepository {
    pool: SqlitePool,
}

impl AlertRepository {
    /// Creates a new AlertRepository.
    pub fn new(pool: SqlitePool) -> Self {
        AlertRepository { pool }
    }

    pub async fn raise(&self, tenant_id: &str, kind: AlertKind, subject_id: &str, message: &str) -> DbResult<Alert> {
        info!(tenant_id, ?kind, subject_id, "Raising alert");

        let alert = sqlx::query_as::<_, Alert>(
            r#"
            INSERT INTO alerts (id, tenant_id, kind, subject_id, message, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(new_id())
        .bind(tenant_id)
        .bind(kind)
        .bind(subject_id)
        .bind(message)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(alert)
    }

    /// Alerts for a tenant, newest first.
    pub async fn list(&self, tenant_id: &str) -> DbResult<Vec<Alert>> {
        let alerts = sqlx::query_as::<_, Alert>("SELECT * FROM alerts WHERE tenant_id = ? ORDER BY created_at DESC, id")
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(alerts)
    }
}
