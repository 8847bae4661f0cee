use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;
use scylla::client::session::Session;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::order::{Order, OrderStatus};

use super::{next_candidate, ClaimOutcome, ClaimRequest, ClaimSlot, OrderStore, SEQUENCE_MAX};

// ============================================================================
// ScyllaDB Order Store
// ============================================================================
//
// Layout:
// - `orders`: one row per order. The claim-contested fields (status,
//   assigned_preparer, assigned_courier) are native columns so lightweight
//   transactions can condition on them; the full aggregate rides along as a
//   JSON payload column.
// - `tenant_sequences`: per-tenant display-number counter, advanced with a
//   compare-and-set.
// - `open_sequences`: reservation rows for numbers held by open orders;
//   insert-if-not-exists is what makes a number unique among open orders.
//
// Claims are lightweight transactions. An LWT either applies atomically or
// reports the row did not match; there is no read-then-write window for a
// rival claimant to slip through.
//
// ============================================================================

pub struct ScyllaOrderStore {
    session: Arc<Session>,
}

impl ScyllaOrderStore {
    pub fn new(session: Arc<Session>) -> Self {
        Self { session }
    }

    /// Create the tables this store relies on. The keyspace is expected to
    /// be selected on the session already.
    pub async fn ensure_schema(session: &Session) -> Result<()> {
        session
            .query_unpaged(
                "CREATE TABLE IF NOT EXISTS orders (
                    id uuid PRIMARY KEY,
                    tenant_id uuid,
                    sequence_number int,
                    status text,
                    assigned_preparer uuid,
                    assigned_courier uuid,
                    payload text,
                    updated_at timestamp
                )",
                &[],
            )
            .await?;
        session
            .query_unpaged(
                "CREATE TABLE IF NOT EXISTS tenant_sequences (
                    tenant_id uuid PRIMARY KEY,
                    value int
                )",
                &[],
            )
            .await?;
        session
            .query_unpaged(
                "CREATE TABLE IF NOT EXISTS open_sequences (
                    tenant_id uuid,
                    sequence_number int,
                    PRIMARY KEY (tenant_id, sequence_number)
                )",
                &[],
            )
            .await?;
        Ok(())
    }

    fn status_list(statuses: &[OrderStatus]) -> String {
        statuses
            .iter()
            .map(|status| format!("'{}'", status.as_str()))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Run one LWT and report whether it applied. When the condition fails,
    /// the result row carries the current column values instead of a lone
    /// `[applied]` flag, which is why the fallback maps to `false`.
    async fn applied(
        &self,
        statement: &str,
        values: impl scylla::serialize::row::SerializeRow,
    ) -> Result<bool> {
        let result = self.session.query_unpaged(statement, values).await?;
        let rows = match result.into_rows_result() {
            Ok(rows) => rows,
            Err(_) => return Ok(false),
        };
        Ok(matches!(rows.maybe_first_row::<(bool,)>(), Ok(Some((true,)))))
    }
}

#[async_trait]
impl OrderStore for ScyllaOrderStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        let payload = serde_json::to_string(order)?;

        let mut batch = scylla::statement::batch::Batch::default();
        batch.append_statement(
            "INSERT INTO orders (
                id, tenant_id, sequence_number, status,
                assigned_preparer, assigned_courier, payload, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        );
        batch.append_statement(
            "INSERT INTO open_sequences (tenant_id, sequence_number) VALUES (?, ?)",
        );

        self.session
            .batch(
                &batch,
                (
                    (
                        order.id,
                        order.tenant_id,
                        order.sequence_number as i32,
                        order.status.as_str(),
                        order.assigned_preparer,
                        order.assigned_courier,
                        payload,
                        order.updated_at,
                    ),
                    (order.tenant_id, order.sequence_number as i32),
                ),
            )
            .await?;

        tracing::debug!(
            order_id = %order.id,
            tenant_id = %order.tenant_id,
            sequence_number = order.sequence_number,
            "Inserted order"
        );
        Ok(())
    }

    async fn load(&self, order_id: Uuid) -> Result<Option<Order>> {
        let result = self
            .session
            .query_unpaged("SELECT payload FROM orders WHERE id = ?", (order_id,))
            .await?;

        let rows = match result.into_rows_result() {
            Ok(rows) => rows,
            Err(_) => return Ok(None),
        };
        match rows.maybe_first_row::<(String,)>() {
            Ok(Some((payload,))) => Ok(Some(serde_json::from_str(&payload)?)),
            _ => Ok(None),
        }
    }

    async fn update(&self, order: &Order) -> Result<()> {
        let payload = serde_json::to_string(order)?;

        if order.status.is_terminal() {
            // Closing an order releases its display number for reuse.
            let mut batch = scylla::statement::batch::Batch::default();
            batch.append_statement(
                "UPDATE orders SET status = ?, payload = ?, updated_at = ? WHERE id = ?",
            );
            batch.append_statement(
                "DELETE FROM open_sequences WHERE tenant_id = ? AND sequence_number = ?",
            );
            self.session
                .batch(
                    &batch,
                    (
                        (order.status.as_str(), payload, Utc::now(), order.id),
                        (order.tenant_id, order.sequence_number as i32),
                    ),
                )
                .await?;
        } else {
            self.session
                .query_unpaged(
                    "UPDATE orders SET status = ?, payload = ?, updated_at = ? WHERE id = ?",
                    (order.status.as_str(), payload, Utc::now(), order.id),
                )
                .await?;
        }
        Ok(())
    }

    async fn claim(&self, request: ClaimRequest) -> Result<ClaimOutcome> {
        let current = match self.load(request.order_id).await? {
            Some(order) => order,
            None => bail!("order {} does not exist", request.order_id),
        };

        // The payload written alongside the claim reflects the updated
        // aggregate; the contested columns themselves are what the LWT
        // conditions on.
        let mut updated = current;
        match request.slot {
            ClaimSlot::Preparer => updated.assigned_preparer = Some(request.claimant),
            ClaimSlot::Courier => updated.assigned_courier = Some(request.claimant),
        }
        updated.record_transition(request.target, request.actor, request.note.clone());
        let payload = serde_json::to_string(&updated)?;

        let column = match request.slot {
            ClaimSlot::Preparer => "assigned_preparer",
            ClaimSlot::Courier => "assigned_courier",
        };
        let sources = Self::status_list(&request.allowed_from);

        // Unset slot first; each statement is an atomic LWT on its own.
        let take_unset = format!(
            "UPDATE orders SET status = ?, {column} = ?, payload = ?, updated_at = ? \
             WHERE id = ? IF {column} = null AND status IN ({sources})"
        );
        if self
            .applied(
                &take_unset,
                (
                    request.target.as_str(),
                    request.claimant,
                    payload.clone(),
                    updated.updated_at,
                    request.order_id,
                ),
            )
            .await?
        {
            tracing::info!(
                order_id = %request.order_id,
                claimant = %request.claimant,
                target = ?request.target,
                "✅ Claim applied"
            );
            return Ok(ClaimOutcome::Claimed(updated));
        }

        if request.allow_self {
            let take_own = format!(
                "UPDATE orders SET status = ?, {column} = ?, payload = ?, updated_at = ? \
                 WHERE id = ? IF {column} = ? AND status IN ({sources})"
            );
            if self
                .applied(
                    &take_own,
                    (
                        request.target.as_str(),
                        request.claimant,
                        payload,
                        updated.updated_at,
                        request.order_id,
                        request.claimant,
                    ),
                )
                .await?
            {
                return Ok(ClaimOutcome::Claimed(updated));
            }
        }

        tracing::debug!(
            order_id = %request.order_id,
            claimant = %request.claimant,
            "Claim lost the race"
        );
        Ok(ClaimOutcome::Lost)
    }

    async fn next_sequence(&self, tenant_id: Uuid) -> Result<u16> {
        self.session
            .query_unpaged(
                "INSERT INTO tenant_sequences (tenant_id, value) VALUES (?, 0) IF NOT EXISTS",
                (tenant_id,),
            )
            .await?;

        // Two failure modes per attempt: another allocator advanced the
        // counter (CAS misses), or the candidate is held by an open order
        // (reservation insert misses). Both just advance and retry.
        for _ in 0..(SEQUENCE_MAX as usize * 2) {
            let result = self
                .session
                .query_unpaged(
                    "SELECT value FROM tenant_sequences WHERE tenant_id = ?",
                    (tenant_id,),
                )
                .await?;
            let current = match result.into_rows_result() {
                Ok(rows) => match rows.maybe_first_row::<(i32,)>() {
                    Ok(Some((value,))) => value as u16,
                    _ => 0,
                },
                Err(_) => 0,
            };

            let candidate = next_candidate(current);
            let advanced = self
                .applied(
                    "UPDATE tenant_sequences SET value = ? WHERE tenant_id = ? IF value = ?",
                    (candidate as i32, tenant_id, current as i32),
                )
                .await?;
            if !advanced {
                continue;
            }

            let reserved = self
                .applied(
                    "INSERT INTO open_sequences (tenant_id, sequence_number) \
                     VALUES (?, ?) IF NOT EXISTS",
                    (tenant_id, candidate as i32),
                )
                .await?;
            if reserved {
                return Ok(candidate);
            }
        }
        bail!("tenant {} has no free sequence number", tenant_id);
    }
}
