// ============================================================================
// Order Store - Persistence Boundary
// ============================================================================
//
// Owns the persisted Order aggregates. Two kinds of writes cross this
// boundary: plain last-write-wins updates for uncontested fields, and the
// single correctness-critical primitive of the engine, the atomic
// conditional claim. The claim must be one indivisible storage operation,
// never a read-then-write pair; it is what closes the race between two
// actors taking the same order.
//
// Implementations:
// - `MemoryOrderStore`: mutex-guarded map, linearizable by construction;
//   backs the unit tests and the demo.
// - `ScyllaOrderStore`: production store; claims use lightweight
//   transactions (`IF` conditions), sequence numbers use
//   insert-if-not-exists reservations.
//
// ============================================================================

mod memory;
mod scylla;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::order::{Order, OrderStatus};

pub use memory::MemoryOrderStore;
pub use scylla::ScyllaOrderStore;

/// Which exclusive assignment slot a claim targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimSlot {
    Preparer,
    Courier,
}

/// One atomic claim attempt: move to `target` and take `slot` for
/// `claimant`, provided the slot is unset (or, when `allow_self` is set,
/// already the claimant's) and the status is still one of `allowed_from`.
#[derive(Debug, Clone)]
pub struct ClaimRequest {
    pub order_id: Uuid,
    pub tenant_id: Uuid,
    pub slot: ClaimSlot,
    pub claimant: Uuid,
    /// Who requested the claim; differs from `claimant` for admin-assisted
    /// courier assignment and is the identity recorded in the history.
    pub actor: Uuid,
    pub target: OrderStatus,
    pub allowed_from: Vec<OrderStatus>,
    pub allow_self: bool,
    pub note: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ClaimOutcome {
    /// The conditional write applied; the claimant owns the slot.
    Claimed(Order),
    /// Someone else won the race (or the status moved on). The caller must
    /// re-read before retrying.
    Lost,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert(&self, order: &Order) -> anyhow::Result<()>;

    async fn load(&self, order_id: Uuid) -> anyhow::Result<Option<Order>>;

    /// Plain write for non-claim transitions and slice progress. Safe to be
    /// last-write-wins: the guard re-validated against a fresh read
    /// immediately before this call.
    async fn update(&self, order: &Order) -> anyhow::Result<()>;

    async fn claim(&self, request: ClaimRequest) -> anyhow::Result<ClaimOutcome>;

    /// Per-tenant increment-and-wrap allocation over 1..=999, skipping
    /// numbers still held by open orders of the same tenant.
    async fn next_sequence(&self, tenant_id: Uuid) -> anyhow::Result<u16>;
}

pub(crate) const SEQUENCE_MAX: u16 = 999;

pub(crate) fn next_candidate(current: u16) -> u16 {
    if current >= SEQUENCE_MAX {
        1
    } else {
        current + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_wraps_after_999() {
        assert_eq!(next_candidate(998), 999);
        assert_eq!(next_candidate(999), 1);
        assert_eq!(next_candidate(0), 1);
    }
}
