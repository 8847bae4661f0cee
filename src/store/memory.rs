use std::collections::HashMap;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::order::Order;

use super::{next_candidate, ClaimOutcome, ClaimRequest, ClaimSlot, OrderStore, SEQUENCE_MAX};

// ============================================================================
// In-Memory Order Store
// ============================================================================
//
// Backs the unit tests and the demo binary. The whole store sits behind one
// mutex and no critical section awaits, so every operation (the conditional
// claim in particular) is linearizable exactly like a single-statement
// database write.
//
// ============================================================================

#[derive(Default)]
pub struct MemoryOrderStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    orders: HashMap<Uuid, Order>,
    /// Last sequence number issued per tenant.
    sequences: HashMap<Uuid, u16>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert(&self, order: &Order) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.orders.contains_key(&order.id) {
            bail!("order {} already exists", order.id);
        }
        inner.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn load(&self, order_id: Uuid) -> Result<Option<Order>> {
        let inner = self.inner.lock().await;
        Ok(inner.orders.get(&order_id).cloned())
    }

    async fn update(&self, order: &Order) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if !inner.orders.contains_key(&order.id) {
            bail!("order {} does not exist", order.id);
        }
        inner.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn claim(&self, request: ClaimRequest) -> Result<ClaimOutcome> {
        let mut inner = self.inner.lock().await;
        let order = match inner.orders.get_mut(&request.order_id) {
            Some(order) => order,
            None => bail!("order {} does not exist", request.order_id),
        };

        if !request.allowed_from.contains(&order.status) {
            return Ok(ClaimOutcome::Lost);
        }

        let slot = match request.slot {
            ClaimSlot::Preparer => &mut order.assigned_preparer,
            ClaimSlot::Courier => &mut order.assigned_courier,
        };
        match *slot {
            None => {}
            Some(owner) if request.allow_self && owner == request.claimant => {}
            Some(_) => return Ok(ClaimOutcome::Lost),
        }

        *slot = Some(request.claimant);
        order.record_transition(request.target, request.actor, request.note);
        Ok(ClaimOutcome::Claimed(order.clone()))
    }

    async fn next_sequence(&self, tenant_id: Uuid) -> Result<u16> {
        let mut inner = self.inner.lock().await;

        let in_use: Vec<u16> = inner
            .orders
            .values()
            .filter(|order| order.tenant_id == tenant_id && order.is_open())
            .map(|order| order.sequence_number)
            .collect();

        let last = inner.sequences.get(&tenant_id).copied().unwrap_or(0);
        let mut candidate = last;
        for _ in 0..SEQUENCE_MAX {
            candidate = next_candidate(candidate);
            if !in_use.contains(&candidate) {
                inner.sequences.insert(tenant_id, candidate);
                return Ok(candidate);
            }
        }
        bail!("tenant {} has no free sequence number", tenant_id);
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
