use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::errors::PricingError;

// ============================================================================
// Catalog Snapshot - Read-Only Pricing Input
// ============================================================================
//
// The lifecycle engine never mutates catalog data; menu CRUD lives in a
// different subsystem. What the pricing engine consumes is an immutable
// snapshot of the items referenced by one order.
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Pizza,
    Topping,
    Beverage,
    Combo,
    Crust,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PizzaSize {
    Small,
    Medium,
    Large,
    Family,
}

/// Per-size pricing rules for a pizza item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizePricing {
    pub price: Decimal,
    /// Maximum topping divisions for this size; also the rescale factor of
    /// the fractional topping formula.
    pub max_toppings: u32,
    pub crust_required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub category: Category,
    /// Shelf price. Zero for toppings and pizzas (pizzas price per size).
    pub base_price: Decimal,
    /// Surcharge over the included allowance (topping premium, crust
    /// premium, premium beverage in a combo).
    pub premium_value: Decimal,
    /// Present only for `Category::Pizza`.
    pub size_prices: HashMap<PizzaSize, SizePricing>,
    /// Volume label used to match beverages against combo slots, e.g. "2L".
    pub size_label: Option<String>,
    pub active: bool,
}

/// A required sub-item position inside a combo product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComboSlot {
    pub combo_id: Uuid,
    pub position: u32,
    pub quantity: u32,
    pub kind: SlotKind,
}

/// What a combo slot requires. Pizza slots reference the pizza item whose
/// per-size rules (max toppings, crust requirement) govern the nested
/// configuration; beverage slots reference the default included beverage,
/// whose `size_label` any substituted choice must match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SlotKind {
    Pizza { reference_item: Uuid, size: PizzaSize },
    Beverage { reference_item: Uuid },
}

impl ComboSlot {
    pub fn reference_item(&self) -> Uuid {
        match self.kind {
            SlotKind::Pizza { reference_item, .. } => reference_item,
            SlotKind::Beverage { reference_item } => reference_item,
        }
    }
}

/// Flat per-tenant amounts applied once, at order creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenantSettings {
    pub tenant_id: Uuid,
    pub delivery_fee: Decimal,
    pub courier_commission: Decimal,
}

// ============================================================================
// Catalog Reader Trait
// ============================================================================

/// Read-only lookups the pricing engine and intake flow depend on. A missing
/// id is a hard failure surfaced at order-creation time, never skipped.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    async fn fetch_items(
        &self,
        tenant_id: Uuid,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, CatalogItem>, PricingError>;

    async fn fetch_combo_slots(
        &self,
        tenant_id: Uuid,
        combo_id: Uuid,
    ) -> Result<Vec<ComboSlot>, PricingError>;

    async fn fetch_tenant_settings(&self, tenant_id: Uuid) -> Result<TenantSettings, PricingError>;
}

// ============================================================================
// In-Memory Snapshot
// ============================================================================

/// Immutable in-memory catalog used by the demo binary and tests. Built once
/// and shared; lookups clone the referenced items into the snapshot map the
/// pricing engine receives.
#[derive(Debug, Default, Clone)]
pub struct CatalogSnapshot {
    items: HashMap<Uuid, CatalogItem>,
    combo_slots: HashMap<Uuid, Vec<ComboSlot>>,
    settings: HashMap<Uuid, TenantSettings>,
}

impl CatalogSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, item: CatalogItem) -> Self {
        self.items.insert(item.id, item);
        self
    }

    pub fn with_combo_slots(mut self, combo_id: Uuid, slots: Vec<ComboSlot>) -> Self {
        self.combo_slots.insert(combo_id, slots);
        self
    }

    pub fn with_settings(mut self, settings: TenantSettings) -> Self {
        self.settings.insert(settings.tenant_id, settings);
        self
    }
}

#[async_trait]
impl CatalogReader for CatalogSnapshot {
    async fn fetch_items(
        &self,
        tenant_id: Uuid,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, CatalogItem>, PricingError> {
        let mut found = HashMap::with_capacity(ids.len());
        for id in ids {
            match self.items.get(id) {
                Some(item) if item.tenant_id == tenant_id => {
                    found.insert(*id, item.clone());
                }
                _ => return Err(PricingError::CatalogItemNotFound(*id)),
            }
        }
        Ok(found)
    }

    async fn fetch_combo_slots(
        &self,
        tenant_id: Uuid,
        combo_id: Uuid,
    ) -> Result<Vec<ComboSlot>, PricingError> {
        match self.items.get(&combo_id) {
            Some(item) if item.tenant_id == tenant_id && item.category == Category::Combo => {}
            _ => return Err(PricingError::CatalogItemNotFound(combo_id)),
        }
        Ok(self.combo_slots.get(&combo_id).cloned().unwrap_or_default())
    }

    async fn fetch_tenant_settings(&self, tenant_id: Uuid) -> Result<TenantSettings, PricingError> {
        self.settings
            .get(&tenant_id)
            .cloned()
            .ok_or(PricingError::CatalogItemNotFound(tenant_id))
    }
}
