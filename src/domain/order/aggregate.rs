use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value_objects::{
    HistoryEntry, LineItem, OrderAmounts, OrderStatus, OrderType, PaymentMethod,
};

// ============================================================================
// Order Aggregate
// ============================================================================
//
// The only shared mutable resource in the engine. Created once by the intake
// flow with a frozen monetary snapshot, then mutated exclusively through the
// lifecycle service. Orders are never deleted; cancellation and payment
// closure are statuses.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// 1–999, unique among the tenant's open orders, wraps after 999.
    pub sequence_number: u16,
    pub customer_id: Uuid,
    pub order_type: OrderType,
    pub delivery_address: Option<String>,
    /// Immutable once the order is created.
    pub line_items: Vec<LineItem>,
    pub status: OrderStatus,
    /// Written only by the assignment protocol's conditional update.
    pub assigned_preparer: Option<Uuid>,
    /// Delivery orders only; same write discipline as the preparer slot.
    pub assigned_courier: Option<Uuid>,
    /// Mutated only by the claimed preparer while `Preparing`.
    pub per_slice_progress: HashMap<String, bool>,
    pub payment_method: PaymentMethod,
    /// Computed once at creation, never recomputed.
    pub amounts: OrderAmounts,
    /// Instant each status was first entered.
    pub status_timestamps: HashMap<OrderStatus, DateTime<Utc>>,
    /// Append-only.
    pub history: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Build a freshly-received order. The first history entry and status
    /// timestamp are written here so every order starts with a complete
    /// audit trail.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        tenant_id: Uuid,
        sequence_number: u16,
        customer_id: Uuid,
        order_type: OrderType,
        delivery_address: Option<String>,
        line_items: Vec<LineItem>,
        payment_method: PaymentMethod,
        amounts: OrderAmounts,
        created_by: Uuid,
    ) -> Self {
        let now = Utc::now();
        let status = OrderStatus::Received;
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            sequence_number,
            customer_id,
            order_type,
            delivery_address,
            line_items,
            status,
            assigned_preparer: None,
            assigned_courier: None,
            per_slice_progress: HashMap::new(),
            payment_method,
            amounts,
            status_timestamps: HashMap::from([(status, now)]),
            history: vec![HistoryEntry {
                status,
                actor: created_by,
                note: None,
                timestamp: now,
            }],
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a transition that already passed the guard (and, for claim
    /// edges, the store's conditional write): set the status, stamp the
    /// first entry into that status, and append exactly one history entry.
    pub fn record_transition(&mut self, target: OrderStatus, actor: Uuid, note: Option<String>) {
        let now = Utc::now();
        self.status = target;
        self.status_timestamps.entry(target).or_insert(now);
        self.history.push(HistoryEntry {
            status: target,
            actor,
            note,
            timestamp: now,
        });
        self.updated_at = now;
    }

    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
