use super::value_objects::OrderStatus;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

/// Order-creation pricing failures. All of these surface before anything is
/// persisted; a rejected order leaves no record behind.
#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    #[error("No price configured for the requested size")]
    CatalogMismatch,

    #[error("Invalid line configuration: {0}")]
    InvalidConfiguration(String),

    #[error("A required selection is missing: {0}")]
    MissingRequiredSelection(String),

    #[error("Combo configuration is incomplete: {0}")]
    IncompleteCombo(String),

    #[error("Catalog item not found: {0}")]
    CatalogItemNotFound(uuid::Uuid),
}

impl PricingError {
    pub fn kind(&self) -> &'static str {
        match self {
            PricingError::CatalogMismatch => "catalog_mismatch",
            PricingError::InvalidConfiguration(_) => "invalid_configuration",
            PricingError::MissingRequiredSelection(_) => "missing_required_selection",
            PricingError::IncompleteCombo(_) => "incomplete_combo",
            PricingError::CatalogItemNotFound(_) => "catalog_item_not_found",
        }
    }
}

/// Why the transition guard rejected a request. Surfaced as-is so the caller
/// can decide whether to escalate or inform the operator; never downgraded
/// to a silent no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DenialReason {
    #[error("No edge from {from:?} to {to:?}")]
    IllegalTransition { from: OrderStatus, to: OrderStatus },

    #[error("Caller lacks the capability for this transition")]
    InsufficientCapability,

    #[error("Caller is not the assigned actor for this order")]
    NotAssignee,

    #[error("Caller does not belong to the order's tenant")]
    TenantMismatch,
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Order not found")]
    NotFound,

    #[error("Transition denied: {0}")]
    Denied(DenialReason),

    /// Lost a claim race. Expected under concurrency: re-read the order and
    /// retry if still applicable.
    #[error("Another actor already claimed this order")]
    Conflict,

    #[error(transparent)]
    Pricing(#[from] PricingError),

    #[error("Storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}

impl LifecycleError {
    pub fn reason_code(&self) -> &'static str {
        match self {
            LifecycleError::NotFound => "not_found",
            LifecycleError::Denied(DenialReason::IllegalTransition { .. }) => "illegal_transition",
            LifecycleError::Denied(DenialReason::InsufficientCapability) => {
                "insufficient_capability"
            }
            LifecycleError::Denied(DenialReason::NotAssignee) => "not_assignee",
            LifecycleError::Denied(DenialReason::TenantMismatch) => "tenant_mismatch",
            LifecycleError::Conflict => "conflict",
            LifecycleError::Pricing(_) => "pricing",
            LifecycleError::Storage(_) => "storage",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denial_reason_display() {
        let reason = DenialReason::IllegalTransition {
            from: OrderStatus::Received,
            to: OrderStatus::Delivered,
        };
        let msg = reason.to_string();
        assert!(msg.contains("Received"));
        assert!(msg.contains("Delivered"));
    }

    #[test]
    fn test_reason_codes_are_stable() {
        assert_eq!(LifecycleError::Conflict.reason_code(), "conflict");
        assert_eq!(
            LifecycleError::Denied(DenialReason::NotAssignee).reason_code(),
            "not_assignee"
        );
        assert_eq!(LifecycleError::NotFound.reason_code(), "not_found");
    }
}
