// ============================================================================
// Messaging - Tenant-Scoped Event Fan-Out
// ============================================================================
//
// Every successful mutation publishes one compact event to the owning
// tenant's channel so connected kitchen and delivery clients stay in sync.
// Publishing is best-effort from the lifecycle service's perspective: the
// persisted write is the source of truth, and a publish failure never rolls
// a transition back.
//
// ============================================================================

mod redpanda;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::order::{Order, OrderStatus};

pub use redpanda::RedpandaPublisher;

/// Compact description of one order mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    pub order_id: Uuid,
    pub sequence_number: u16,
    pub status: OrderStatus,
    pub assignee_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}

impl OrderEvent {
    pub fn from_order(order: &Order) -> Self {
        let assignee_id = match order.status {
            OrderStatus::OutForDelivery | OrderStatus::Delivered => order.assigned_courier,
            _ => order.assigned_preparer,
        };
        Self {
            order_id: order.id,
            sequence_number: order.sequence_number,
            status: order.status,
            assignee_id,
            timestamp: order.updated_at,
        }
    }
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, tenant_id: Uuid, event: OrderEvent) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{OrderAmounts, OrderType, PaymentMethod};
    use rust_decimal::Decimal;

    #[test]
    fn test_event_carries_the_relevant_assignee() {
        let mut order = Order::create(
            Uuid::new_v4(),
            12,
            Uuid::new_v4(),
            OrderType::Delivery,
            Some("Praça da Sé, 1".to_string()),
            Vec::new(),
            PaymentMethod::Pix,
            OrderAmounts {
                subtotal: Decimal::ZERO,
                delivery_fee: Decimal::ZERO,
                discount: Decimal::ZERO,
                total: Decimal::ZERO,
                courier_commission: Decimal::ZERO,
            },
            Uuid::new_v4(),
        );

        let preparer = Uuid::new_v4();
        order.assigned_preparer = Some(preparer);
        order.record_transition(OrderStatus::Preparing, preparer, None);
        assert_eq!(OrderEvent::from_order(&order).assignee_id, Some(preparer));

        let courier = Uuid::new_v4();
        order.assigned_courier = Some(courier);
        order.record_transition(OrderStatus::Finalized, preparer, None);
        order.record_transition(OrderStatus::Ready, preparer, None);
        order.record_transition(OrderStatus::OutForDelivery, courier, None);
        assert_eq!(OrderEvent::from_order(&order).assignee_id, Some(courier));
    }

    #[test]
    fn test_event_serialization() {
        let event = OrderEvent {
            order_id: Uuid::new_v4(),
            sequence_number: 42,
            status: OrderStatus::Ready,
            assignee_id: None,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: OrderEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
        assert!(json.contains("\"ready\""));
    }
}
