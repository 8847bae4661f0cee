use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Order Value Objects
// ============================================================================

/// Lifecycle status of an order.
///
/// `Pending` is a defined intake state kept for completeness; every current
/// creation path starts orders at `Received`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Received,
    Confirmed,
    Preparing,
    Finalized,
    Ready,
    OutForDelivery,
    Delivered,
    PaidClosed,
    Canceled,
}

impl OrderStatus {
    /// Structural transition table. Cancellation is reachable from every
    /// non-terminal status that has not yet reached `Delivered`; role
    /// restrictions on top of these edges live in the transition guard.
    pub fn legal_targets(self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Received, Canceled],
            Received => &[Preparing, Canceled],
            Confirmed => &[Preparing, Canceled],
            Preparing => &[Finalized, Canceled],
            Finalized => &[Ready, Canceled],
            Ready => &[OutForDelivery, Delivered, Canceled],
            OutForDelivery => &[Delivered, Canceled],
            Delivered => &[PaidClosed],
            PaidClosed => &[],
            Canceled => &[],
        }
    }

    pub fn can_transition_to(self, target: OrderStatus) -> bool {
        self.legal_targets().contains(&target)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::PaidClosed | OrderStatus::Canceled)
    }

    /// Column value used by the Scylla store for LWT conditions.
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Received => "received",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::Finalized => "finalized",
            OrderStatus::Ready => "ready",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::PaidClosed => "paid_closed",
            OrderStatus::Canceled => "canceled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Delivery,
    Pickup,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentMethod {
    /// `change_for` is the banknote amount the customer will hand over.
    Cash { change_for: Option<Decimal> },
    Card,
    Pix,
}

// ============================================================================
// Caller Identity
// ============================================================================
//
// The engine consumes an already-resolved identity; token mechanics are an
// upstream concern.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    PlatformAdmin,
    TenantAdmin,
    Kitchen,
    Courier,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub can_prepare: bool,
    pub can_finalize: bool,
    pub can_dispatch: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Caller {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub role: Role,
    pub capabilities: Capabilities,
}

impl Caller {
    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::PlatformAdmin | Role::TenantAdmin)
    }
}

// ============================================================================
// Line Items
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToppingLine {
    pub topping_id: Uuid,
    pub quantity: u32,
}

/// Fully-configured pizza frozen inside a combo line. A snapshot, not a
/// live catalog reference: later catalog edits cannot change a placed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NestedPizza {
    pub name: String,
    pub toppings: Vec<ToppingLine>,
    pub crust_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub catalog_item_id: Uuid,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub premium_value: Decimal,
    pub toppings: Vec<ToppingLine>,
    pub crust_id: Option<Uuid>,
    pub notes: Option<String>,
    pub nested_pizzas: Vec<NestedPizza>,
    /// Frozen at creation by the pricing engine; never recomputed.
    pub subtotal: Decimal,
}

// ============================================================================
// Monetary Snapshot
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAmounts {
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub courier_commission: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub status: OrderStatus,
    pub actor: Uuid,
    pub note: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_self_loop_edges() {
        let all = [
            OrderStatus::Pending,
            OrderStatus::Received,
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::Finalized,
            OrderStatus::Ready,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
            OrderStatus::PaidClosed,
            OrderStatus::Canceled,
        ];

        for status in all {
            assert!(
                !status.can_transition_to(status),
                "{:?} must not allow a self-loop",
                status
            );
        }
    }

    #[test]
    fn test_terminal_states_have_no_outgoing_edges() {
        assert!(OrderStatus::PaidClosed.legal_targets().is_empty());
        assert!(OrderStatus::Canceled.legal_targets().is_empty());
    }

    #[test]
    fn test_happy_path_edges() {
        assert!(OrderStatus::Received.can_transition_to(OrderStatus::Preparing));
        assert!(OrderStatus::Preparing.can_transition_to(OrderStatus::Finalized));
        assert!(OrderStatus::Finalized.can_transition_to(OrderStatus::Ready));
        assert!(OrderStatus::Ready.can_transition_to(OrderStatus::OutForDelivery));
        assert!(OrderStatus::OutForDelivery.can_transition_to(OrderStatus::Delivered));
        assert!(OrderStatus::Delivered.can_transition_to(OrderStatus::PaidClosed));
    }

    #[test]
    fn test_skipping_preparation_is_illegal() {
        assert!(!OrderStatus::Received.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Received.can_transition_to(OrderStatus::Ready));
        assert!(!OrderStatus::Preparing.can_transition_to(OrderStatus::Ready));
    }

    #[test]
    fn test_delivered_cannot_be_canceled() {
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Canceled));
        assert!(!OrderStatus::PaidClosed.can_transition_to(OrderStatus::Canceled));
    }

    #[test]
    fn test_status_serialization_round_trip() {
        let status = OrderStatus::OutForDelivery;
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, "\"out_for_delivery\"");
        let back: OrderStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(status, back);
    }

    #[test]
    fn test_status_column_value_matches_serde() {
        let json = serde_json::to_string(&OrderStatus::PaidClosed).unwrap();
        assert_eq!(json.trim_matches('"'), OrderStatus::PaidClosed.as_str());
    }

    #[test]
    fn test_admin_roles() {
        let caller = Caller {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            role: Role::TenantAdmin,
            capabilities: Capabilities::default(),
        };
        assert!(caller.is_admin());

        let kitchen = Caller {
            role: Role::Kitchen,
            ..caller
        };
        assert!(!kitchen.is_admin());
    }
}
