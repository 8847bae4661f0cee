use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::catalog::CatalogReader;
use crate::domain::order::{
    Caller, DenialReason, LifecycleError, Order, OrderStatus, OrderType, PaymentMethod,
    PricingError, TransitionGuard,
};
use crate::domain::pricing::{self, LineItemRequest};
use crate::messaging::{EventPublisher, OrderEvent};
use crate::metrics::Metrics;
use crate::store::{ClaimOutcome, ClaimRequest, ClaimSlot, OrderStore};

// ============================================================================
// Lifecycle Service - Composition Root
// ============================================================================
//
// The only component other subsystems call. Every state-changing request
// flows load → guard → (claim | plain update) → publish. Requests for
// different orders run fully in parallel; requests for the same order race
// at the storage layer and are settled there, never by an in-process lock.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub tenant_id: Uuid,
    pub customer_id: Uuid,
    /// Intake actor recorded in the first history entry.
    pub created_by: Uuid,
    pub order_type: OrderType,
    pub delivery_address: Option<String>,
    pub payment_method: PaymentMethod,
    pub line_items: Vec<LineItemRequest>,
    pub discount: Decimal,
}

#[derive(Debug, Clone, Default)]
pub struct TransitionOptions {
    pub note: Option<String>,
}

/// Resolved courier identity handed in by the roster collaborator for
/// admin-assisted assignment.
#[derive(Debug, Clone)]
pub struct CourierRef {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub active: bool,
}

pub struct LifecycleService {
    store: Arc<dyn OrderStore>,
    catalog: Arc<dyn CatalogReader>,
    publisher: Arc<dyn EventPublisher>,
    metrics: Arc<Metrics>,
}

impl LifecycleService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        catalog: Arc<dyn CatalogReader>,
        publisher: Arc<dyn EventPublisher>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            catalog,
            publisher,
            metrics,
        }
    }

    // ------------------------------------------------------------------
    // Order intake
    // ------------------------------------------------------------------

    /// Price and persist a new order. Pricing happens exactly once, here;
    /// the resulting monetary snapshot is frozen onto the order. Any
    /// failure leaves nothing behind.
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<Order, LifecycleError> {
        let result = self.create_order_inner(request).await;
        match &result {
            Ok(order) => {
                self.metrics.orders_created.inc();
                tracing::info!(
                    order_id = %order.id,
                    tenant_id = %order.tenant_id,
                    sequence_number = order.sequence_number,
                    total = %order.amounts.total,
                    "✅ Order created"
                );
            }
            Err(LifecycleError::Pricing(e)) => {
                self.metrics.record_pricing_failure(e.kind());
                tracing::warn!(error = %e, "Order creation rejected by pricing");
            }
            Err(e) => {
                tracing::error!(error = %e, "Order creation failed");
            }
        }
        result
    }

    async fn create_order_inner(
        &self,
        request: CreateOrderRequest,
    ) -> Result<Order, LifecycleError> {
        if request.line_items.is_empty() {
            return Err(PricingError::InvalidConfiguration(
                "an order needs at least one line item".to_string(),
            )
            .into());
        }
        if request.order_type == OrderType::Delivery && request.delivery_address.is_none() {
            return Err(PricingError::InvalidConfiguration(
                "delivery orders require a delivery address".to_string(),
            )
            .into());
        }

        // One snapshot fetch covering every referenced id, combo slot
        // references included. A missing id fails the whole order.
        let mut ids: Vec<Uuid> = request
            .line_items
            .iter()
            .flat_map(|line| line.referenced_ids())
            .collect();
        let mut combo_slots = HashMap::new();
        for line in &request.line_items {
            if let LineItemRequest::Combo { item_id, .. } = line {
                let slots = self
                    .catalog
                    .fetch_combo_slots(request.tenant_id, *item_id)
                    .await?;
                ids.extend(slots.iter().map(|slot| slot.reference_item()));
                combo_slots.insert(*item_id, slots);
            }
        }
        ids.sort_unstable();
        ids.dedup();
        let items = self.catalog.fetch_items(request.tenant_id, &ids).await?;
        let settings = self
            .catalog
            .fetch_tenant_settings(request.tenant_id)
            .await?;

        let mut priced = Vec::with_capacity(request.line_items.len());
        for line in &request.line_items {
            priced.push(pricing::price_line(line, &items, &combo_slots)?);
        }
        let amounts =
            pricing::order_amounts(&priced, request.order_type, &settings, request.discount)?;

        if let PaymentMethod::Cash {
            change_for: Some(change_for),
        } = &request.payment_method
        {
            if *change_for < amounts.total {
                return Err(PricingError::InvalidConfiguration(
                    "cash amount does not cover the order total".to_string(),
                )
                .into());
            }
        }

        let sequence_number = self.store.next_sequence(request.tenant_id).await?;
        let order = Order::create(
            request.tenant_id,
            sequence_number,
            request.customer_id,
            request.order_type,
            request.delivery_address,
            priced.into_iter().map(|line| line.item).collect(),
            request.payment_method,
            amounts,
            request.created_by,
        );

        self.store.insert(&order).await?;
        self.publish(&order).await;
        Ok(order)
    }

    // ------------------------------------------------------------------
    // Transitions
    // ------------------------------------------------------------------

    /// Move an order along one edge of the status graph. Claim edges go
    /// through the assignment protocol; everything else is a plain update
    /// re-validated by the guard against a fresh read.
    pub async fn transition(
        &self,
        order_id: Uuid,
        caller: &Caller,
        target: OrderStatus,
        options: TransitionOptions,
    ) -> Result<Order, LifecycleError> {
        let started = Instant::now();
        let order = self
            .store
            .load(order_id)
            .await?
            .ok_or(LifecycleError::NotFound)?;

        if let Err(reason) = TransitionGuard::authorize(&order, caller, target) {
            return Err(self.deny(order_id, caller, target, reason));
        }

        let updated = match Self::claim_slot_for(target) {
            Some((slot, allowed_from)) => {
                let outcome = self
                    .store
                    .claim(ClaimRequest {
                        order_id,
                        tenant_id: order.tenant_id,
                        slot,
                        claimant: caller.id,
                        actor: caller.id,
                        target,
                        allowed_from,
                        allow_self: true,
                        note: options.note,
                    })
                    .await?;
                match outcome {
                    ClaimOutcome::Claimed(order) => order,
                    ClaimOutcome::Lost => {
                        self.metrics.claim_conflicts.inc();
                        tracing::info!(
                            order_id = %order_id,
                            claimant = %caller.id,
                            target = ?target,
                            "Claim lost to a concurrent actor"
                        );
                        return Err(LifecycleError::Conflict);
                    }
                }
            }
            None => {
                let mut updated = order;
                updated.record_transition(target, caller.id, options.note);
                self.store.update(&updated).await?;
                updated
            }
        };

        self.publish(&updated).await;
        self.metrics
            .record_transition(target.as_str(), started.elapsed().as_secs_f64());
        tracing::info!(
            order_id = %order_id,
            target = ?target,
            actor = %caller.id,
            "✅ Transition applied"
        );
        Ok(updated)
    }

    /// The two claim sites of the protocol. Any caller the guard lets onto
    /// these edges becomes the exclusive assignee; that is what "taking" an
    /// order means.
    fn claim_slot_for(target: OrderStatus) -> Option<(ClaimSlot, Vec<OrderStatus>)> {
        match target {
            OrderStatus::Preparing => Some((
                ClaimSlot::Preparer,
                vec![OrderStatus::Received, OrderStatus::Confirmed],
            )),
            OrderStatus::OutForDelivery => Some((ClaimSlot::Courier, vec![OrderStatus::Ready])),
            _ => None,
        }
    }

    // ------------------------------------------------------------------
    // Admin-assisted courier assignment
    // ------------------------------------------------------------------

    pub async fn assign_courier(
        &self,
        order_id: Uuid,
        caller: &Caller,
        courier: &CourierRef,
    ) -> Result<Order, LifecycleError> {
        let started = Instant::now();
        let order = self
            .store
            .load(order_id)
            .await?
            .ok_or(LifecycleError::NotFound)?;

        if !caller.is_admin() {
            return Err(self.deny(
                order_id,
                caller,
                OrderStatus::OutForDelivery,
                DenialReason::InsufficientCapability,
            ));
        }
        if caller.role != crate::domain::order::Role::PlatformAdmin
            && caller.tenant_id != order.tenant_id
        {
            return Err(self.deny(
                order_id,
                caller,
                OrderStatus::OutForDelivery,
                DenialReason::TenantMismatch,
            ));
        }
        if order.order_type != OrderType::Delivery
            || order.status != OrderStatus::Ready
            || courier.tenant_id != order.tenant_id
            || !courier.active
        {
            return Err(self.deny(
                order_id,
                caller,
                OrderStatus::OutForDelivery,
                DenialReason::IllegalTransition {
                    from: order.status,
                    to: OrderStatus::OutForDelivery,
                },
            ));
        }

        let outcome = self
            .store
            .claim(ClaimRequest {
                order_id,
                tenant_id: order.tenant_id,
                slot: ClaimSlot::Courier,
                claimant: courier.id,
                actor: caller.id,
                target: OrderStatus::OutForDelivery,
                allowed_from: vec![OrderStatus::Ready],
                // Explicit assignment only ever takes a free slot.
                allow_self: false,
                note: None,
            })
            .await?;

        match outcome {
            ClaimOutcome::Claimed(updated) => {
                self.publish(&updated).await;
                self.metrics.record_transition(
                    OrderStatus::OutForDelivery.as_str(),
                    started.elapsed().as_secs_f64(),
                );
                tracing::info!(
                    order_id = %order_id,
                    courier = %courier.id,
                    assigned_by = %caller.id,
                    "✅ Courier assigned"
                );
                Ok(updated)
            }
            ClaimOutcome::Lost => {
                self.metrics.claim_conflicts.inc();
                Err(LifecycleError::Conflict)
            }
        }
    }

    // ------------------------------------------------------------------
    // Slice progress
    // ------------------------------------------------------------------

    /// Merge per-slice progress ticks. Only the claimed preparer may write
    /// these, and only while the order is actually being prepared.
    pub async fn update_slice_progress(
        &self,
        order_id: Uuid,
        caller: &Caller,
        progress: HashMap<String, bool>,
    ) -> Result<Order, LifecycleError> {
        let mut order = self
            .store
            .load(order_id)
            .await?
            .ok_or(LifecycleError::NotFound)?;

        if caller.role != crate::domain::order::Role::PlatformAdmin
            && caller.tenant_id != order.tenant_id
        {
            return Err(self.deny(
                order_id,
                caller,
                order.status,
                DenialReason::TenantMismatch,
            ));
        }
        if order.status != OrderStatus::Preparing {
            return Err(self.deny(
                order_id,
                caller,
                OrderStatus::Preparing,
                DenialReason::IllegalTransition {
                    from: order.status,
                    to: OrderStatus::Preparing,
                },
            ));
        }
        if order.assigned_preparer != Some(caller.id) {
            return Err(self.deny(
                order_id,
                caller,
                OrderStatus::Preparing,
                DenialReason::NotAssignee,
            ));
        }

        order.per_slice_progress.extend(progress);
        order.updated_at = chrono::Utc::now();
        self.store.update(&order).await?;
        self.publish(&order).await;
        Ok(order)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn deny(
        &self,
        order_id: Uuid,
        caller: &Caller,
        target: OrderStatus,
        reason: DenialReason,
    ) -> LifecycleError {
        let error = LifecycleError::Denied(reason);
        self.metrics.record_denial(error.reason_code());
        tracing::info!(
            order_id = %order_id,
            caller = %caller.id,
            target = ?target,
            reason = %reason,
            "Transition denied"
        );
        error
    }

    /// Fire-and-forget fan-out. The write is the source of truth; a failed
    /// publish is logged and swallowed, never surfaced as a failed
    /// transition.
    async fn publish(&self, order: &Order) {
        let event = OrderEvent::from_order(order);
        match self.publisher.publish(order.tenant_id, event).await {
            Ok(()) => self.metrics.record_publish(true),
            Err(error) => {
                self.metrics.record_publish(false);
                tracing::warn!(
                    order_id = %order.id,
                    tenant_id = %order.tenant_id,
                    error = %error,
                    "Event publish failed; state change stands"
                );
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
