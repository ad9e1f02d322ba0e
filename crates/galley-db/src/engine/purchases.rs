//! # Purchase Receiver
//!
//! Purchase order lifecycle and the stock/ledger effects of receiving one.
//!
//! ## Status Transitions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  from \ to     pending      received            cancelled              │
//! │  ─────────     ───────      ────────            ─────────              │
//! │  pending       no-op        apply receipt       ok                     │
//! │  received      rejected     no-op (idempotent)  rejected               │
//! │  cancelled     rejected     rejected            no-op                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Receipt Effects (per ingredient, ascending id)
//! - `virtual_stock += received quantity`
//! - merge into the purchase ledger row keyed by (ingredient, receipt date,
//!   this order)
//! - when the line price differs from the ingredient's current unit cost,
//!   update the ingredient price and queue `ingredient.price.changed`
//!
//! Deleting a received order removes the ledger rows keyed by the order
//! (or, for rows written before per-order keys existed, subtracts from the
//! un-keyed day row) and takes the stock back out, floored at zero.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;
use tracing::{debug, info, warn};

use super::DeleteOutcome;
use crate::error::{DbError, DbResult};
use crate::events::EventBus;
use crate::pool::Database;
use crate::repository::{new_id, IngredientRepository, LedgerRepository, PurchaseRepository};
use galley_core::ledger::{deduct, restore, PurchaseTotals};
use galley_core::validation::{
    validate_batch_size, validate_non_negative, validate_price_cents, validate_quantity, validate_text,
};
use galley_core::{
    CoreError, DomainEvent, Money, PurchaseOrder, PurchaseOrderLine, PurchaseOrderStatus, ValidationError,
    QUANTITY_EPSILON,
};

const MAX_REFERENCE_LEN: usize = 200;
const MAX_NOTES_LEN: usize = 2000;

// =============================================================================
// Inputs
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPurchaseLine {
    pub ingredient_id: String,
    pub ordered_quantity: f64,
    /// Defaults to the ordered quantity on receipt.
    pub received_quantity: Option<f64>,
    /// Price per stock unit, in cents.
    pub unit_price_cents: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewPurchaseOrder {
    pub supplier_reference: Option<String>,
    pub notes: Option<String>,
    pub expected_on: Option<NaiveDate>,
    /// `pending` or `received`.
    pub status: PurchaseOrderStatus,
    /// Receipt timestamp for orders created as received (defaults to now).
    pub received_at: Option<DateTime<Utc>>,
    pub lines: Vec<NewPurchaseLine>,
}

impl NewPurchaseOrder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the order as already received.
    pub fn received(mut self) -> Self {
        self.status = PurchaseOrderStatus::Received;
        self
    }

    pub fn received_at(mut self, at: DateTime<Utc>) -> Self {
        self.status = PurchaseOrderStatus::Received;
        self.received_at = Some(at);
        self
    }

    pub fn with_supplier(mut self, reference: impl Into<String>) -> Self {
        self.supplier_reference = Some(reference.into());
        self
    }

    pub fn line(mut self, ingredient_id: impl Into<String>, quantity: f64, unit_price_cents: i64) -> Self {
        self.lines.push(NewPurchaseLine {
            ingredient_id: ingredient_id.into(),
            ordered_quantity: quantity,
            received_quantity: None,
            unit_price_cents,
        });
        self
    }

    /// Adds a line that arrived short or over.
    pub fn line_received(
        mut self,
        ingredient_id: impl Into<String>,
        ordered: f64,
        received: f64,
        unit_price_cents: i64,
    ) -> Self {
        self.lines.push(NewPurchaseLine {
            ingredient_id: ingredient_id.into(),
            ordered_quantity: ordered,
            received_quantity: Some(received),
            unit_price_cents,
        });
        self
    }

    fn validate(&self) -> DbResult<()> {
        if self.status == PurchaseOrderStatus::Cancelled {
            return Err(ValidationError::InvalidFormat {
                field: "status".to_string(),
                reason: "an order cannot be created as cancelled".to_string(),
            }
            .into());
        }
        validate_batch_size("Purchase order", self.lines.len())?;
        validate_text("supplier_reference", self.supplier_reference.as_deref(), MAX_REFERENCE_LEN)?;
        validate_text("notes", self.notes.as_deref(), MAX_NOTES_LEN)?;

        for line in &self.lines {
            validate_quantity("ordered_quantity", line.ordered_quantity)?;
            if let Some(received) = line.received_quantity {
                validate_non_negative("received_quantity", received)?;
            }
            validate_price_cents("unit_price", line.unit_price_cents)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceivedQuantity {
    pub line_id: String,
    pub quantity: f64,
}

/// Changes to an existing order. `None` fields are left as they are.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub status: Option<PurchaseOrderStatus>,
    pub supplier_reference: Option<String>,
    pub notes: Option<String>,
    pub expected_on: Option<NaiveDate>,
    /// Only honoured while the order is pending.
    #[serde(default)]
    pub received_quantities: Vec<ReceivedQuantity>,
    /// Receipt timestamp for a pending → received transition.
    pub received_at: Option<DateTime<Utc>>,
}

impl OrderUpdate {
    pub fn status(status: PurchaseOrderStatus) -> Self {
        OrderUpdate {
            status: Some(status),
            ..Default::default()
        }
    }

    fn validate(&self) -> DbResult<()> {
        validate_text("supplier_reference", self.supplier_reference.as_deref(), MAX_REFERENCE_LEN)?;
        validate_text("notes", self.notes.as_deref(), MAX_NOTES_LEN)?;
        for received in &self.received_quantities {
            validate_non_negative("received_quantity", received.quantity)?;
        }
        Ok(())
    }

    fn touches_details(&self) -> bool {
        self.supplier_reference.is_some() || self.notes.is_some() || self.expected_on.is_some()
    }
}

/// Everything one order brought in of one ingredient.
#[derive(Debug, Clone, Copy)]
struct IngredientReceipt {
    totals: PurchaseTotals,
    /// Price of the last line naming the ingredient.
    unit_price_cents: i64,
}

fn receipts_by_ingredient(lines: &[PurchaseOrderLine]) -> DbResult<BTreeMap<String, IngredientReceipt>> {
    let mut receipts: BTreeMap<String, IngredientReceipt> = BTreeMap::new();
    for line in lines {
        let contribution = PurchaseTotals {
            quantity: line.received(),
            total: line.line_total(),
        };
        match receipts.get_mut(&line.ingredient_id) {
            Some(r) => {
                r.totals = r.totals.merged(&contribution)?;
                r.unit_price_cents = line.unit_price_cents;
            }
            None => {
                receipts.insert(
                    line.ingredient_id.clone(),
                    IngredientReceipt {
                        totals: contribution,
                        unit_price_cents: line.unit_price_cents,
                    },
                );
            }
        }
    }
    Ok(receipts)
}

// =============================================================================
// Purchase Receiver
// =============================================================================

#[derive(Debug, Clone)]
pub struct PurchaseReceiver {
    db: Database,
    bus: EventBus,
}

impl PurchaseReceiver {
    pub fn new(db: Database, bus: EventBus) -> Self {
        PurchaseReceiver { db, bus }
    }

    /// Creates an order, applying the receipt when it is created as received.
    pub async fn create_order(&self, tenant_id: &str, input: &NewPurchaseOrder) -> DbResult<PurchaseOrder> {
        input.validate()?;

        let now = Utc::now();
        let received_at = match input.status {
            PurchaseOrderStatus::Received => Some(input.received_at.unwrap_or(now)),
            _ => None,
        };
        let mut order = PurchaseOrder {
            id: new_id(),
            tenant_id: tenant_id.to_string(),
            supplier_reference: input.supplier_reference.clone(),
            notes: input.notes.clone(),
            status: input.status,
            expected_on: input.expected_on,
            received_at,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            lines: Vec::with_capacity(input.lines.len()),
        };

        let mut tx = self.db.pool().begin().await?;
        PurchaseRepository::insert_order(&mut *tx, &order).await?;

        for (position, line) in input.lines.iter().enumerate() {
            let line = PurchaseOrderLine {
                id: new_id(),
                order_id: order.id.clone(),
                ingredient_id: line.ingredient_id.clone(),
                ordered_quantity: line.ordered_quantity,
                received_quantity: line.received_quantity,
                unit_price_cents: line.unit_price_cents,
                position: position as i64,
            };
            if IngredientRepository::lock(&mut *tx, tenant_id, &line.ingredient_id).await?.is_none() {
                return Err(DbError::not_found("Ingredient", &line.ingredient_id));
            }
            PurchaseRepository::insert_line(&mut *tx, &line).await?;
            order.lines.push(line);
        }

        let events = match order.receipt_date() {
            Some(date) => Self::apply_receipt(&mut *tx, &order, date).await?,
            None => Vec::new(),
        };

        tx.commit().await?;

        info!(
            tenant_id,
            order_id = %order.id,
            status = %order.status,
            lines = order.lines.len(),
            total_cents = order.total().cents(),
            "Purchase order created"
        );
        for event in events {
            self.bus.publish(event);
        }

        Ok(order)
    }

    /// Updates editable fields and, optionally, the status.
    pub async fn update_order(&self, tenant_id: &str, order_id: &str, update: &OrderUpdate) -> DbResult<PurchaseOrder> {
        update.validate()?;

        let mut tx = self.db.pool().begin().await?;
        let order = PurchaseRepository::lock(&mut *tx, tenant_id, order_id)
            .await?
            .ok_or_else(|| DbError::not_found("Purchase order", order_id))?;

        if update.touches_details() {
            PurchaseRepository::write_details(
                &mut *tx,
                tenant_id,
                order_id,
                update.supplier_reference.as_deref().or(order.supplier_reference.as_deref()),
                update.notes.as_deref().or(order.notes.as_deref()),
                update.expected_on.or(order.expected_on),
            )
            .await?;
        }

        if !update.received_quantities.is_empty() {
            if order.status == PurchaseOrderStatus::Pending {
                for received in &update.received_quantities {
                    if !PurchaseRepository::write_received_quantity(&mut *tx, order_id, &received.line_id, received.quantity).await? {
                        return Err(DbError::not_found("Purchase order line", &received.line_id));
                    }
                }
            } else {
                warn!(
                    tenant_id,
                    order_id,
                    status = %order.status,
                    "Received quantities ignored: order is no longer pending"
                );
            }
        }

        let target = update.status.unwrap_or(order.status);
        let mut events = Vec::new();

        match (order.status, target) {
            (from, to) if from == to => {
                if update.status == Some(PurchaseOrderStatus::Received) {
                    info!(tenant_id, order_id, "Order already received; receipt not reapplied");
                }
            }
            (PurchaseOrderStatus::Pending, PurchaseOrderStatus::Received) => {
                let received_at = update.received_at.unwrap_or_else(Utc::now);
                PurchaseRepository::write_status(&mut *tx, tenant_id, order_id, target, Some(received_at)).await?;

                let mut receiving = order.clone();
                receiving.lines = PurchaseRepository::lines(&mut *tx, order_id).await?;
                events = Self::apply_receipt(&mut *tx, &receiving, received_at.date_naive()).await?;
            }
            (PurchaseOrderStatus::Pending, PurchaseOrderStatus::Cancelled) => {
                PurchaseRepository::write_status(&mut *tx, tenant_id, order_id, target, None).await?;
            }
            (from, to) => {
                return Err(CoreError::InvalidStatusTransition {
                    order_id: order_id.to_string(),
                    from: from.to_string(),
                    to: to.to_string(),
                }
                .into());
            }
        }

        let updated = PurchaseRepository::find_any(&mut *tx, tenant_id, order_id)
            .await?
            .ok_or_else(|| DbError::not_found("Purchase order", order_id))?;
        tx.commit().await?;

        info!(tenant_id, order_id, from = %order.status, to = %updated.status, "Purchase order updated");
        for event in events {
            self.bus.publish(event);
        }

        Ok(updated)
    }

    /// Soft-deletes an order, reversing its receipt when it was received.
    pub async fn delete_order(&self, tenant_id: &str, order_id: &str) -> DbResult<DeleteOutcome> {
        let mut tx = self.db.pool().begin().await?;

        let Some(order) = PurchaseRepository::lock_for_delete(&mut *tx, tenant_id, order_id).await? else {
            return match PurchaseRepository::find_any(&mut *tx, tenant_id, order_id).await? {
                Some(_) => {
                    info!(tenant_id, order_id, "Purchase order already deleted");
                    Ok(DeleteOutcome::AlreadyDeleted)
                }
                None => Err(DbError::not_found("Purchase order", order_id)),
            };
        };

        if order.status != PurchaseOrderStatus::Received {
            tx.commit().await?;
            info!(tenant_id, order_id, status = %order.status, "Purchase order deleted");
            return Ok(DeleteOutcome::SoftDeleted);
        }

        let removed = LedgerRepository::delete_order_purchases(&mut *tx, tenant_id, order_id).await?;
        let receipt_date = order.receipt_date().unwrap_or_else(|| order.created_at.date_naive());
        if removed == 0 {
            debug!(tenant_id, order_id, "No ledger rows keyed by order; reversing legacy day rows");
        }

        for (ingredient_id, receipt) in receipts_by_ingredient(&order.lines)? {
            if removed == 0 && receipt.totals.quantity > QUANTITY_EPSILON {
                LedgerRepository::reverse_legacy_purchase(&mut *tx, tenant_id, &ingredient_id, receipt_date, &receipt.totals)
                    .await?;
            }

            let Some(ingredient) = IngredientRepository::lock(&mut *tx, tenant_id, &ingredient_id).await? else {
                warn!(tenant_id, order_id, ingredient_id = %ingredient_id, "Stock not reversed: ingredient not found");
                continue;
            };
            let change = deduct(ingredient.virtual_stock, receipt.totals.quantity);
            IngredientRepository::write_stock(&mut *tx, tenant_id, &ingredient_id, change.after).await?;
            debug!(ingredient_id = %ingredient_id, applied = change.applied, "Receipt reversed");
        }

        tx.commit().await?;

        info!(tenant_id, order_id, ledger_rows = removed, "Received purchase order reversed");
        Ok(DeleteOutcome::Reversed)
    }

    /// Stock, ledger and price effects of receiving `order`.
    ///
    /// Returns the events to publish once the caller commits.
    async fn apply_receipt(
        conn: &mut SqliteConnection,
        order: &PurchaseOrder,
        received_on: NaiveDate,
    ) -> DbResult<Vec<DomainEvent>> {
        let tenant_id = order.tenant_id.as_str();
        let mut events = Vec::new();

        for (ingredient_id, receipt) in receipts_by_ingredient(&order.lines)? {
            if receipt.totals.quantity <= QUANTITY_EPSILON {
                debug!(ingredient_id = %ingredient_id, "Nothing received for ingredient");
                continue;
            }

            let ingredient = IngredientRepository::lock(conn, tenant_id, &ingredient_id)
                .await?
                .ok_or_else(|| DbError::not_found("Ingredient", &ingredient_id))?;

            let change = restore(ingredient.virtual_stock, receipt.totals.quantity);
            IngredientRepository::write_stock(conn, tenant_id, &ingredient_id, change.after).await?;

            LedgerRepository::merge_purchase(
                conn,
                tenant_id,
                &ingredient_id,
                received_on,
                Some(&order.id),
                &receipt.totals,
            )
            .await?;

            let current = Money::from_cost(ingredient.unit_cost()).cents();
            if receipt.unit_price_cents > 0 && receipt.unit_price_cents != current {
                let new_price = ingredient.format_price_for_unit_cost(receipt.unit_price_cents);
                IngredientRepository::write_unit_price(conn, tenant_id, &ingredient_id, new_price.cents()).await?;
                info!(
                    tenant_id,
                    ingredient_id = %ingredient_id,
                    old_cents = ingredient.unit_price_cents,
                    new_cents = new_price.cents(),
                    "Ingredient price updated from purchase"
                );
                events.push(DomainEvent::IngredientPriceChanged {
                    tenant_id: tenant_id.to_string(),
                    ingredient_id: ingredient_id.clone(),
                    old_unit_price_cents: ingredient.unit_price_cents,
                    new_unit_price_cents: new_price.cents(),
                });
            }

            debug!(
                ingredient_id = %ingredient_id,
                quantity = receipt.totals.quantity,
                after = change.after,
                "Receipt applied"
            );
        }

        Ok(events)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::*;

    #[tokio::test]
    async fn test_received_order_adds_stock_and_ledger() {
        let engine = engine().await;
        let flour = ingredient(&engine, "Flour", 200, 5.0).await;

        let order = engine
            .purchases()
            .create_order(TENANT, &NewPurchaseOrder::new().received().line(&flour.id, 10.0, 200))
            .await
            .unwrap();

        assert_eq!(stock_of(&engine, &flour.id).await, 15.0);
        let rows = engine.db().ledger().purchases_for_order(TENANT, &order.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity_bought, 10.0);
        assert_eq!(rows[0].total_spent_cents, 2000);
    }

    #[tokio::test]
    async fn test_pending_order_has_no_effects_until_received() {
        let engine = engine().await;
        let flour = ingredient(&engine, "Flour", 200, 0.0).await;
        let purchases = engine.purchases();

        let order = purchases
            .create_order(TENANT, &NewPurchaseOrder::new().line(&flour.id, 10.0, 200))
            .await
            .unwrap();
        assert_eq!(order.status, PurchaseOrderStatus::Pending);
        assert_eq!(stock_of(&engine, &flour.id).await, 0.0);

        // Short delivery recorded while pending
        let update = OrderUpdate {
            received_quantities: vec![ReceivedQuantity {
                line_id: order.lines[0].id.clone(),
                quantity: 8.0,
            }],
            ..Default::default()
        };
        purchases.update_order(TENANT, &order.id, &update).await.unwrap();

        let received = purchases
            .update_order(TENANT, &order.id, &OrderUpdate::status(PurchaseOrderStatus::Received))
            .await
            .unwrap();
        assert_eq!(received.status, PurchaseOrderStatus::Received);
        assert!(received.received_at.is_some());
        assert_eq!(stock_of(&engine, &flour.id).await, 8.0);

        // Receiving again only updates editable fields
        let again = OrderUpdate {
            status: Some(PurchaseOrderStatus::Received),
            notes: Some("checked".into()),
            ..Default::default()
        };
        let updated = purchases.update_order(TENANT, &order.id, &again).await.unwrap();
        assert_eq!(updated.notes.as_deref(), Some("checked"));
        assert_eq!(stock_of(&engine, &flour.id).await, 8.0);
    }

    #[tokio::test]
    async fn test_invalid_transitions_rejected() {
        let engine = engine().await;
        let flour = ingredient(&engine, "Flour", 200, 0.0).await;
        let purchases = engine.purchases();

        let received = purchases
            .create_order(TENANT, &NewPurchaseOrder::new().received().line(&flour.id, 1.0, 200))
            .await
            .unwrap();
        let err = purchases
            .update_order(TENANT, &received.id, &OrderUpdate::status(PurchaseOrderStatus::Pending))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvalidStatusTransition { .. })));

        let pending = purchases
            .create_order(TENANT, &NewPurchaseOrder::new().line(&flour.id, 1.0, 200))
            .await
            .unwrap();
        purchases
            .update_order(TENANT, &pending.id, &OrderUpdate::status(PurchaseOrderStatus::Cancelled))
            .await
            .unwrap();
        let err = purchases
            .update_order(TENANT, &pending.id, &OrderUpdate::status(PurchaseOrderStatus::Received))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvalidStatusTransition { .. })));
        assert_eq!(stock_of(&engine, &flour.id).await, 1.0);
    }

    #[tokio::test]
    async fn test_unknown_ingredient_rolls_back() {
        let engine = engine().await;
        let flour = ingredient(&engine, "Flour", 200, 0.0).await;

        let err = engine
            .purchases()
            .create_order(
                TENANT,
                &NewPurchaseOrder::new().received().line(&flour.id, 5.0, 200).line("ghost", 1.0, 100),
            )
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(stock_of(&engine, &flour.id).await, 0.0);
        assert!(engine.db().purchases().list(TENANT, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_on_create_is_rejected() {
        let engine = engine().await;
        let mut input = NewPurchaseOrder::new().line("x", 1.0, 100);
        input.status = PurchaseOrderStatus::Cancelled;

        let err = engine.purchases().create_order(TENANT, &input).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_price_change_propagates() {
        let engine = engine().await;
        let mut rx = engine.bus().subscribe();
        // 1250 per 5 kg bag = 250 / kg
        let flour = engine
            .db()
            .ingredients()
            .create(TENANT, &crate::repository::NewIngredient::new("Flour", "kg", 1250).with_format(5.0))
            .await
            .unwrap();

        engine
            .purchases()
            .create_order(TENANT, &NewPurchaseOrder::new().received().line(&flour.id, 10.0, 250))
            .await
            .unwrap();
        assert!(rx.try_recv().is_err(), "same price must not publish");

        engine
            .purchases()
            .create_order(TENANT, &NewPurchaseOrder::new().received().line(&flour.id, 10.0, 300))
            .await
            .unwrap();

        let updated = engine.db().ingredients().require(TENANT, &flour.id).await.unwrap();
        assert_eq!(updated.unit_price_cents, 1500);
        match rx.recv().await.unwrap() {
            DomainEvent::IngredientPriceChanged {
                old_unit_price_cents,
                new_unit_price_cents,
                ..
            } => {
                assert_eq!(old_unit_price_cents, 1250);
                assert_eq!(new_unit_price_cents, 1500);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_delete_pending_order_is_plain_soft_delete() {
        let engine = engine().await;
        let flour = ingredient(&engine, "Flour", 200, 3.0).await;
        let purchases = engine.purchases();

        let order = purchases
            .create_order(TENANT, &NewPurchaseOrder::new().line(&flour.id, 10.0, 200))
            .await
            .unwrap();
        assert_eq!(purchases.delete_order(TENANT, &order.id).await.unwrap(), DeleteOutcome::SoftDeleted);
        assert_eq!(purchases.delete_order(TENANT, &order.id).await.unwrap(), DeleteOutcome::AlreadyDeleted);
        assert_eq!(stock_of(&engine, &flour.id).await, 3.0);
    }
}
