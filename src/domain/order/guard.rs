use super::aggregate::Order;
use super::errors::DenialReason;
use super::value_objects::{Caller, OrderStatus, OrderType, Role};

// ============================================================================
// Transition Guard
// ============================================================================
//
// One declarative check evaluated once per request, instead of role
// conditionals scattered per call site. The guard answers a single question:
// is this caller allowed to move this order to this status right now? It
// validates nothing about the race itself; claim edges are still settled by
// the store's conditional write after the guard approves.
//
// ============================================================================

pub struct TransitionGuard;

impl TransitionGuard {
    pub fn authorize(
        order: &Order,
        caller: &Caller,
        target: OrderStatus,
    ) -> Result<(), DenialReason> {
        // Platform admins operate across tenants; everyone else is confined
        // to their own pizzeria.
        if caller.role != Role::PlatformAdmin && caller.tenant_id != order.tenant_id {
            return Err(DenialReason::TenantMismatch);
        }

        if !order.status.can_transition_to(target) {
            return Err(DenialReason::IllegalTransition {
                from: order.status,
                to: target,
            });
        }

        // Pickup orders hand over at the counter; there is no courier leg.
        if target == OrderStatus::OutForDelivery && order.order_type != OrderType::Delivery {
            return Err(DenialReason::IllegalTransition {
                from: order.status,
                to: target,
            });
        }

        match caller.role {
            Role::PlatformAdmin | Role::TenantAdmin => Ok(()),
            Role::Kitchen => Self::authorize_kitchen(order, caller, target),
            Role::Courier => Self::authorize_courier(order, caller, target),
        }
    }

    fn authorize_kitchen(
        order: &Order,
        caller: &Caller,
        target: OrderStatus,
    ) -> Result<(), DenialReason> {
        let caps = caller.capabilities;
        match target {
            OrderStatus::Preparing | OrderStatus::Finalized => {
                if !caps.can_prepare {
                    return Err(DenialReason::InsufficientCapability);
                }
                // Once a preparer owns the order, only that preparer may keep
                // moving it through the kitchen.
                match order.assigned_preparer {
                    Some(preparer) if preparer != caller.id => Err(DenialReason::NotAssignee),
                    _ => Ok(()),
                }
            }
            OrderStatus::Ready => {
                if caps.can_finalize {
                    Ok(())
                } else {
                    Err(DenialReason::InsufficientCapability)
                }
            }
            OrderStatus::OutForDelivery | OrderStatus::Delivered => {
                if caps.can_dispatch {
                    Ok(())
                } else {
                    Err(DenialReason::InsufficientCapability)
                }
            }
            _ => Err(DenialReason::InsufficientCapability),
        }
    }

    fn authorize_courier(
        order: &Order,
        caller: &Caller,
        target: OrderStatus,
    ) -> Result<(), DenialReason> {
        match target {
            // Self-claim; the race itself is decided by the store.
            OrderStatus::OutForDelivery => match order.assigned_courier {
                Some(courier) if courier != caller.id => Err(DenialReason::NotAssignee),
                _ => Ok(()),
            },
            OrderStatus::Delivered => match order.assigned_courier {
                Some(courier) if courier == caller.id => Ok(()),
                _ => Err(DenialReason::NotAssignee),
            },
            _ => Err(DenialReason::InsufficientCapability),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::value_objects::{
        Capabilities, OrderAmounts, PaymentMethod,
    };
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn order(tenant_id: Uuid, status: OrderStatus, order_type: OrderType) -> Order {
        let mut order = Order::create(
            tenant_id,
            1,
            Uuid::new_v4(),
            order_type,
            matches!(order_type, OrderType::Delivery).then(|| "Av. Paulista, 900".to_string()),
            Vec::new(),
            PaymentMethod::Card,
            OrderAmounts {
                subtotal: Decimal::ZERO,
                delivery_fee: Decimal::ZERO,
                discount: Decimal::ZERO,
                total: Decimal::ZERO,
                courier_commission: Decimal::ZERO,
            },
            Uuid::new_v4(),
        );
        order.status = status;
        order
    }

    fn caller(tenant_id: Uuid, role: Role, capabilities: Capabilities) -> Caller {
        Caller {
            id: Uuid::new_v4(),
            tenant_id,
            role,
            capabilities,
        }
    }

    fn kitchen_caps() -> Capabilities {
        Capabilities {
            can_prepare: true,
            can_finalize: true,
            can_dispatch: false,
        }
    }

    #[test]
    fn test_illegal_edge_received_to_delivered() {
        let tenant_id = Uuid::new_v4();
        let order = order(tenant_id, OrderStatus::Received, OrderType::Delivery);
        let admin = caller(tenant_id, Role::TenantAdmin, Capabilities::default());

        let err = TransitionGuard::authorize(&order, &admin, OrderStatus::Delivered).unwrap_err();
        assert!(matches!(err, DenialReason::IllegalTransition { .. }));
    }

    #[test]
    fn test_admin_may_walk_every_legal_edge() {
        let tenant_id = Uuid::new_v4();
        let admin = caller(tenant_id, Role::TenantAdmin, Capabilities::default());

        for (from, to) in [
            (OrderStatus::Received, OrderStatus::Preparing),
            (OrderStatus::Preparing, OrderStatus::Finalized),
            (OrderStatus::Finalized, OrderStatus::Ready),
            (OrderStatus::Ready, OrderStatus::OutForDelivery),
            (OrderStatus::OutForDelivery, OrderStatus::Delivered),
            (OrderStatus::Delivered, OrderStatus::PaidClosed),
            (OrderStatus::Ready, OrderStatus::Canceled),
        ] {
            let order = order(tenant_id, from, OrderType::Delivery);
            assert!(
                TransitionGuard::authorize(&order, &admin, to).is_ok(),
                "{:?} -> {:?} should be authorized for an admin",
                from,
                to
            );
        }
    }

    #[test]
    fn test_tenant_admin_cannot_cross_tenants() {
        let order = order(Uuid::new_v4(), OrderStatus::Received, OrderType::Delivery);
        let foreign_admin = caller(Uuid::new_v4(), Role::TenantAdmin, Capabilities::default());

        let err =
            TransitionGuard::authorize(&order, &foreign_admin, OrderStatus::Preparing).unwrap_err();
        assert_eq!(err, DenialReason::TenantMismatch);
    }

    #[test]
    fn test_platform_admin_crosses_tenants() {
        let order = order(Uuid::new_v4(), OrderStatus::Received, OrderType::Delivery);
        let platform = caller(Uuid::new_v4(), Role::PlatformAdmin, Capabilities::default());

        assert!(TransitionGuard::authorize(&order, &platform, OrderStatus::Preparing).is_ok());
    }

    #[test]
    fn test_kitchen_needs_can_prepare() {
        let tenant_id = Uuid::new_v4();
        let order = order(tenant_id, OrderStatus::Received, OrderType::Delivery);
        let no_caps = caller(tenant_id, Role::Kitchen, Capabilities::default());

        let err =
            TransitionGuard::authorize(&order, &no_caps, OrderStatus::Preparing).unwrap_err();
        assert_eq!(err, DenialReason::InsufficientCapability);

        let cook = caller(tenant_id, Role::Kitchen, kitchen_caps());
        assert!(TransitionGuard::authorize(&order, &cook, OrderStatus::Preparing).is_ok());
    }

    #[test]
    fn test_assigned_preparer_excludes_other_cooks() {
        let tenant_id = Uuid::new_v4();
        let mut order = order(tenant_id, OrderStatus::Preparing, OrderType::Delivery);
        let owner = caller(tenant_id, Role::Kitchen, kitchen_caps());
        order.assigned_preparer = Some(owner.id);

        assert!(TransitionGuard::authorize(&order, &owner, OrderStatus::Finalized).is_ok());

        let other_cook = caller(tenant_id, Role::Kitchen, kitchen_caps());
        let err =
            TransitionGuard::authorize(&order, &other_cook, OrderStatus::Finalized).unwrap_err();
        assert_eq!(err, DenialReason::NotAssignee);
    }

    #[test]
    fn test_kitchen_dispatch_capability_gates_handoff() {
        let tenant_id = Uuid::new_v4();
        let order = order(tenant_id, OrderStatus::Ready, OrderType::Pickup);
        let cook = caller(tenant_id, Role::Kitchen, kitchen_caps());

        // Counter handoff of a pickup order needs can_dispatch.
        let err = TransitionGuard::authorize(&order, &cook, OrderStatus::Delivered).unwrap_err();
        assert_eq!(err, DenialReason::InsufficientCapability);

        let dispatcher = caller(
            tenant_id,
            Role::Kitchen,
            Capabilities {
                can_dispatch: true,
                ..kitchen_caps()
            },
        );
        assert!(TransitionGuard::authorize(&order, &dispatcher, OrderStatus::Delivered).is_ok());
    }

    #[test]
    fn test_courier_self_claim_and_delivery() {
        let tenant_id = Uuid::new_v4();
        let courier = caller(tenant_id, Role::Courier, Capabilities::default());

        let ready = order(tenant_id, OrderStatus::Ready, OrderType::Delivery);
        assert!(TransitionGuard::authorize(&ready, &courier, OrderStatus::OutForDelivery).is_ok());

        // Delivering requires being the assigned courier.
        let mut en_route = order(tenant_id, OrderStatus::OutForDelivery, OrderType::Delivery);
        let err =
            TransitionGuard::authorize(&en_route, &courier, OrderStatus::Delivered).unwrap_err();
        assert_eq!(err, DenialReason::NotAssignee);

        en_route.assigned_courier = Some(courier.id);
        assert!(TransitionGuard::authorize(&en_route, &courier, OrderStatus::Delivered).is_ok());
    }

    #[test]
    fn test_courier_cannot_claim_an_owned_order() {
        let tenant_id = Uuid::new_v4();
        let mut ready = order(tenant_id, OrderStatus::Ready, OrderType::Delivery);
        ready.assigned_courier = Some(Uuid::new_v4());

        let courier = caller(tenant_id, Role::Courier, Capabilities::default());
        let err =
            TransitionGuard::authorize(&ready, &courier, OrderStatus::OutForDelivery).unwrap_err();
        assert_eq!(err, DenialReason::NotAssignee);
    }

    #[test]
    fn test_courier_cannot_cancel_or_cook() {
        let tenant_id = Uuid::new_v4();
        let courier = caller(tenant_id, Role::Courier, Capabilities::default());

        let received = order(tenant_id, OrderStatus::Received, OrderType::Delivery);
        assert_eq!(
            TransitionGuard::authorize(&received, &courier, OrderStatus::Preparing).unwrap_err(),
            DenialReason::InsufficientCapability
        );
        assert_eq!(
            TransitionGuard::authorize(&received, &courier, OrderStatus::Canceled).unwrap_err(),
            DenialReason::InsufficientCapability
        );
    }

    #[test]
    fn test_kitchen_cannot_cancel() {
        let tenant_id = Uuid::new_v4();
        let cook = caller(tenant_id, Role::Kitchen, kitchen_caps());
        let received = order(tenant_id, OrderStatus::Received, OrderType::Delivery);

        assert_eq!(
            TransitionGuard::authorize(&received, &cook, OrderStatus::Canceled).unwrap_err(),
            DenialReason::InsufficientCapability
        );
    }

    #[test]
    fn test_pickup_order_never_goes_out_for_delivery() {
        let tenant_id = Uuid::new_v4();
        let admin = caller(tenant_id, Role::TenantAdmin, Capabilities::default());
        let pickup = order(tenant_id, OrderStatus::Ready, OrderType::Pickup);

        let err =
            TransitionGuard::authorize(&pickup, &admin, OrderStatus::OutForDelivery).unwrap_err();
        assert!(matches!(err, DenialReason::IllegalTransition { .. }));
    }

    #[test]
    fn test_self_loop_is_rejected() {
        let tenant_id = Uuid::new_v4();
        let admin = caller(tenant_id, Role::TenantAdmin, Capabilities::default());
        let preparing = order(tenant_id, OrderStatus::Preparing, OrderType::Delivery);

        let err =
            TransitionGuard::authorize(&preparing, &admin, OrderStatus::Preparing).unwrap_err();
        assert!(matches!(err, DenialReason::IllegalTransition { .. }));
    }
}
