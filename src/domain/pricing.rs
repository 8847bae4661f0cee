use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use super::catalog::{CatalogItem, Category, ComboSlot, PizzaSize, SlotKind, TenantSettings};
use super::order::errors::PricingError;
use super::order::value_objects::{
    LineItem, NestedPizza, OrderAmounts, OrderType, ToppingLine,
};

// ============================================================================
// Pricing Engine
// ============================================================================
//
// Pure and deterministic: a line request plus a catalog snapshot in, a frozen
// line item plus its breakdown out. No I/O, no clock, no state. Invoked once
// per order at creation; re-pricing an existing order is not supported.
//
// Topping model: a pizza with N selected toppings gives each topping a 1/N
// fraction, rescaled to a full-pizza-equivalent premium by the size's
// max-topping count M. Contribution = premium × (1/N) × M. This is the
// "fraction of pizza × total allowed divisions" model, not an average.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum LineItemRequest {
    Pizza {
        item_id: Uuid,
        size: PizzaSize,
        quantity: u32,
        toppings: Vec<ToppingLine>,
        crust_id: Option<Uuid>,
        /// Beverages bundled onto the pizza line; charged premium only.
        beverages: Vec<BeverageSelection>,
        notes: Option<String>,
    },
    Beverage {
        item_id: Uuid,
        quantity: u32,
        notes: Option<String>,
    },
    Combo {
        item_id: Uuid,
        quantity: u32,
        /// One configuration per pizza slot, in slot order.
        pizzas: Vec<ComboPizzaConfig>,
        /// Chosen beverage per beverage slot, in slot order. `None` keeps the
        /// slot's included default at no charge.
        beverages: Vec<Option<Uuid>>,
        notes: Option<String>,
    },
}

impl LineItemRequest {
    pub fn item_id(&self) -> Uuid {
        match self {
            LineItemRequest::Pizza { item_id, .. }
            | LineItemRequest::Beverage { item_id, .. }
            | LineItemRequest::Combo { item_id, .. } => *item_id,
        }
    }

    /// Every catalog id the request references, for one snapshot fetch.
    pub fn referenced_ids(&self) -> Vec<Uuid> {
        let mut ids = vec![self.item_id()];
        match self {
            LineItemRequest::Pizza {
                toppings,
                crust_id,
                beverages,
                ..
            } => {
                ids.extend(toppings.iter().map(|t| t.topping_id));
                ids.extend(crust_id.iter());
                ids.extend(beverages.iter().map(|b| b.beverage_id));
            }
            LineItemRequest::Beverage { .. } => {}
            LineItemRequest::Combo {
                pizzas, beverages, ..
            } => {
                for pizza in pizzas {
                    ids.extend(pizza.toppings.iter().map(|t| t.topping_id));
                    ids.extend(pizza.crust_id.iter());
                }
                ids.extend(beverages.iter().flatten());
            }
        }
        ids
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BeverageSelection {
    pub beverage_id: Uuid,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComboPizzaConfig {
    pub name: String,
    pub toppings: Vec<ToppingLine>,
    pub crust_id: Option<Uuid>,
    pub notes: Option<String>,
}

/// Per-line decomposition of the computed subtotal.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBreakdown {
    pub base: Decimal,
    pub toppings: Decimal,
    pub crust: Decimal,
    pub beverages: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub item: LineItem,
    pub breakdown: PriceBreakdown,
}

fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn lookup<'a>(
    items: &'a HashMap<Uuid, CatalogItem>,
    id: Uuid,
) -> Result<&'a CatalogItem, PricingError> {
    items.get(&id).ok_or(PricingError::CatalogItemNotFound(id))
}

fn expect_category(item: &CatalogItem, category: Category) -> Result<(), PricingError> {
    if item.category != category {
        return Err(PricingError::InvalidConfiguration(format!(
            "{} is not a {:?}",
            item.name, category
        )));
    }
    Ok(())
}

/// Fractional multi-topping total for one pizza surface.
///
/// `max_toppings` is the size's M; an entry with quantity q occupies q of the
/// N fractions, so listing a topping twice and giving it quantity 2 price
/// identically.
fn toppings_total(
    toppings: &[ToppingLine],
    items: &HashMap<Uuid, CatalogItem>,
    max_toppings: u32,
) -> Result<Decimal, PricingError> {
    let fractions: u32 = toppings.iter().map(|t| t.quantity).sum();
    if fractions == 0 {
        return Err(PricingError::InvalidConfiguration(
            "a pizza needs at least one topping".to_string(),
        ));
    }
    if fractions > max_toppings {
        return Err(PricingError::InvalidConfiguration(format!(
            "{} toppings selected, size allows {}",
            fractions, max_toppings
        )));
    }

    let n = Decimal::from(fractions);
    let m = Decimal::from(max_toppings);
    let mut total = Decimal::ZERO;
    for selection in toppings {
        let topping = lookup(items, selection.topping_id)?;
        expect_category(topping, Category::Topping)?;
        total += topping.premium_value * Decimal::from(selection.quantity) * m / n;
    }
    Ok(total)
}

/// Crust contribution: base price plus premium when chosen; an error when the
/// size mandates one and none was chosen. `missing` shapes the error for the
/// top-level (MissingRequiredSelection) vs combo (IncompleteCombo) context.
fn crust_total(
    crust_id: Option<Uuid>,
    crust_required: bool,
    items: &HashMap<Uuid, CatalogItem>,
    missing: impl FnOnce() -> PricingError,
) -> Result<Decimal, PricingError> {
    match crust_id {
        Some(id) => {
            let crust = lookup(items, id)?;
            expect_category(crust, Category::Crust)?;
            Ok(crust.base_price + crust.premium_value)
        }
        None if crust_required => Err(missing()),
        None => Ok(Decimal::ZERO),
    }
}

fn price_pizza(
    item_id: Uuid,
    size: PizzaSize,
    quantity: u32,
    toppings: &[ToppingLine],
    crust_id: Option<Uuid>,
    beverages: &[BeverageSelection],
    notes: &Option<String>,
    items: &HashMap<Uuid, CatalogItem>,
) -> Result<PricedLine, PricingError> {
    let pizza = lookup(items, item_id)?;
    expect_category(pizza, Category::Pizza)?;
    let size_pricing = pizza
        .size_prices
        .get(&size)
        .ok_or(PricingError::CatalogMismatch)?;

    let base = size_pricing.price;
    let toppings_sum = toppings_total(toppings, items, size_pricing.max_toppings)?;
    let crust_sum = crust_total(crust_id, size_pricing.crust_required, items, || {
        PricingError::MissingRequiredSelection(format!(
            "size {:?} of {} requires a crust",
            size, pizza.name
        ))
    })?;

    // Bundled beverages are never charged their shelf price, only premium.
    let mut beverages_sum = Decimal::ZERO;
    for selection in beverages {
        let beverage = lookup(items, selection.beverage_id)?;
        expect_category(beverage, Category::Beverage)?;
        beverages_sum += beverage.premium_value * Decimal::from(selection.quantity);
    }

    let qty = Decimal::from(quantity);
    let subtotal = round_money((base + toppings_sum + crust_sum + beverages_sum) * qty);

    Ok(PricedLine {
        item: LineItem {
            catalog_item_id: item_id,
            quantity,
            unit_price: base,
            premium_value: pizza.premium_value,
            toppings: toppings.to_vec(),
            crust_id,
            notes: notes.clone(),
            nested_pizzas: Vec::new(),
            subtotal,
        },
        breakdown: PriceBreakdown {
            base: base * qty,
            toppings: toppings_sum * qty,
            crust: crust_sum * qty,
            beverages: beverages_sum * qty,
        },
    })
}

fn price_standalone_beverage(
    item_id: Uuid,
    quantity: u32,
    notes: &Option<String>,
    items: &HashMap<Uuid, CatalogItem>,
) -> Result<PricedLine, PricingError> {
    let beverage = lookup(items, item_id)?;
    expect_category(beverage, Category::Beverage)?;

    let qty = Decimal::from(quantity);
    let subtotal = round_money(beverage.base_price * qty);
    Ok(PricedLine {
        item: LineItem {
            catalog_item_id: item_id,
            quantity,
            unit_price: beverage.base_price,
            premium_value: beverage.premium_value,
            toppings: Vec::new(),
            crust_id: None,
            notes: notes.clone(),
            nested_pizzas: Vec::new(),
            subtotal,
        },
        breakdown: PriceBreakdown {
            base: subtotal,
            toppings: Decimal::ZERO,
            crust: Decimal::ZERO,
            beverages: Decimal::ZERO,
        },
    })
}

fn price_combo(
    item_id: Uuid,
    quantity: u32,
    pizzas: &[ComboPizzaConfig],
    beverage_choices: &[Option<Uuid>],
    notes: &Option<String>,
    items: &HashMap<Uuid, CatalogItem>,
    slots: &[ComboSlot],
) -> Result<PricedLine, PricingError> {
    let combo = lookup(items, item_id)?;
    expect_category(combo, Category::Combo)?;

    let mut pizza_configs = pizzas.iter();
    let mut choices = beverage_choices.iter();
    let mut toppings_sum = Decimal::ZERO;
    let mut crust_sum = Decimal::ZERO;
    let mut beverages_sum = Decimal::ZERO;
    let mut nested = Vec::new();

    for slot in slots {
        let slot_qty = Decimal::from(slot.quantity);
        match &slot.kind {
            SlotKind::Pizza {
                reference_item,
                size,
            } => {
                let config = pizza_configs.next().ok_or_else(|| {
                    PricingError::IncompleteCombo(format!(
                        "pizza slot {} is not configured",
                        slot.position
                    ))
                })?;
                let reference = lookup(items, *reference_item)?;
                expect_category(reference, Category::Pizza)?;
                let size_pricing = reference
                    .size_prices
                    .get(size)
                    .ok_or(PricingError::CatalogMismatch)?;

                if config.toppings.iter().map(|t| t.quantity).sum::<u32>() == 0 {
                    return Err(PricingError::IncompleteCombo(format!(
                        "pizza slot {} has no toppings",
                        slot.position
                    )));
                }
                toppings_sum +=
                    toppings_total(&config.toppings, items, size_pricing.max_toppings)? * slot_qty;
                crust_sum += crust_total(
                    config.crust_id,
                    size_pricing.crust_required,
                    items,
                    || {
                        PricingError::IncompleteCombo(format!(
                            "pizza slot {} requires a crust",
                            slot.position
                        ))
                    },
                )? * slot_qty;

                nested.push(NestedPizza {
                    name: config.name.clone(),
                    toppings: config.toppings.clone(),
                    crust_id: config.crust_id,
                    notes: config.notes.clone(),
                });
            }
            SlotKind::Beverage { reference_item } => {
                let choice = choices.next().copied().flatten();
                if let Some(chosen_id) = choice {
                    let chosen = lookup(items, chosen_id)?;
                    expect_category(chosen, Category::Beverage)?;
                    let reference = lookup(items, *reference_item)?;
                    if chosen.size_label != reference.size_label {
                        return Err(PricingError::IncompleteCombo(format!(
                            "beverage slot {} requires size {:?}",
                            slot.position, reference.size_label
                        )));
                    }
                    // Included beverages are free; only the premium of a
                    // substituted choice is charged.
                    beverages_sum += chosen.premium_value * slot_qty;
                }
            }
        }
    }

    if pizza_configs.next().is_some() {
        return Err(PricingError::IncompleteCombo(
            "more pizza configurations than combo slots".to_string(),
        ));
    }

    let base = combo.base_price;
    let qty = Decimal::from(quantity);
    let subtotal = round_money((base + toppings_sum + crust_sum + beverages_sum) * qty);

    Ok(PricedLine {
        item: LineItem {
            catalog_item_id: item_id,
            quantity,
            unit_price: base,
            premium_value: combo.premium_value,
            toppings: Vec::new(),
            crust_id: None,
            notes: notes.clone(),
            nested_pizzas: nested,
            subtotal,
        },
        breakdown: PriceBreakdown {
            base: base * qty,
            toppings: toppings_sum * qty,
            crust: crust_sum * qty,
            beverages: beverages_sum * qty,
        },
    })
}

/// Compute one line's frozen item and breakdown from the catalog snapshot.
pub fn price_line(
    request: &LineItemRequest,
    items: &HashMap<Uuid, CatalogItem>,
    combo_slots: &HashMap<Uuid, Vec<ComboSlot>>,
) -> Result<PricedLine, PricingError> {
    let quantity = match request {
        LineItemRequest::Pizza { quantity, .. }
        | LineItemRequest::Beverage { quantity, .. }
        | LineItemRequest::Combo { quantity, .. } => *quantity,
    };
    if quantity == 0 {
        return Err(PricingError::InvalidConfiguration(
            "line quantity must be at least 1".to_string(),
        ));
    }

    match request {
        LineItemRequest::Pizza {
            item_id,
            size,
            quantity,
            toppings,
            crust_id,
            beverages,
            notes,
        } => price_pizza(
            *item_id, *size, *quantity, toppings, *crust_id, beverages, notes, items,
        ),
        LineItemRequest::Beverage {
            item_id,
            quantity,
            notes,
        } => price_standalone_beverage(*item_id, *quantity, notes, items),
        LineItemRequest::Combo {
            item_id,
            quantity,
            pizzas,
            beverages,
            notes,
        } => {
            let slots = combo_slots
                .get(item_id)
                .ok_or(PricingError::CatalogItemNotFound(*item_id))?;
            price_combo(
                *item_id, *quantity, pizzas, beverages, notes, items, slots,
            )
        }
    }
}

/// Order-level monetary snapshot. The delivery fee applies to delivery
/// orders only; the courier commission is recorded alongside for payment
/// reconciliation downstream.
pub fn order_amounts(
    lines: &[PricedLine],
    order_type: OrderType,
    settings: &TenantSettings,
    discount: Decimal,
) -> Result<OrderAmounts, PricingError> {
    if discount < Decimal::ZERO {
        return Err(PricingError::InvalidConfiguration(
            "discount cannot be negative".to_string(),
        ));
    }

    let subtotal: Decimal = lines.iter().map(|line| line.item.subtotal).sum();
    let (delivery_fee, courier_commission) = match order_type {
        OrderType::Delivery => (settings.delivery_fee, settings.courier_commission),
        OrderType::Pickup => (Decimal::ZERO, Decimal::ZERO),
    };

    if discount > subtotal + delivery_fee {
        return Err(PricingError::InvalidConfiguration(
            "discount exceeds the order value".to_string(),
        ));
    }

    Ok(OrderAmounts {
        subtotal,
        delivery_fee,
        discount,
        total: subtotal + delivery_fee - discount,
        courier_commission,
    })
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::SizePricing;
    use rust_decimal_macros::dec;

    struct Fixture {
        tenant_id: Uuid,
        items: HashMap<Uuid, CatalogItem>,
        combo_slots: HashMap<Uuid, Vec<ComboSlot>>,
        pizza_id: Uuid,
        calabresa: Uuid,
        catupiry: Uuid,
        stuffed_crust: Uuid,
        soda_2l: Uuid,
        premium_soda_2l: Uuid,
        combo_id: Uuid,
    }

    fn item(tenant_id: Uuid, name: &str, category: Category) -> CatalogItem {
        CatalogItem {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.to_string(),
            category,
            base_price: Decimal::ZERO,
            premium_value: Decimal::ZERO,
            size_prices: HashMap::new(),
            size_label: None,
            active: true,
        }
    }

    /// Medium pizza: R$35.00 base, max 2 toppings, crust optional.
    /// Large pizza: R$48.00 base, max 4 toppings, crust required.
    fn fixture() -> Fixture {
        let tenant_id = Uuid::new_v4();
        let mut items = HashMap::new();

        let mut pizza = item(tenant_id, "Pizza da Casa", Category::Pizza);
        pizza.size_prices.insert(
            PizzaSize::Medium,
            SizePricing {
                price: dec!(35.00),
                max_toppings: 2,
                crust_required: false,
            },
        );
        pizza.size_prices.insert(
            PizzaSize::Large,
            SizePricing {
                price: dec!(48.00),
                max_toppings: 4,
                crust_required: true,
            },
        );
        let pizza_id = pizza.id;

        let mut calabresa = item(tenant_id, "Calabresa", Category::Topping);
        calabresa.premium_value = dec!(2.50);
        let mut catupiry = item(tenant_id, "Catupiry", Category::Topping);
        catupiry.premium_value = dec!(5.00);

        let mut stuffed_crust = item(tenant_id, "Borda Recheada", Category::Crust);
        stuffed_crust.base_price = dec!(8.00);
        stuffed_crust.premium_value = dec!(2.00);

        let mut soda_2l = item(tenant_id, "Guaraná 2L", Category::Beverage);
        soda_2l.base_price = dec!(12.00);
        soda_2l.size_label = Some("2L".to_string());

        let mut premium_soda_2l = item(tenant_id, "Suco Premium 2L", Category::Beverage);
        premium_soda_2l.base_price = dec!(15.00);
        premium_soda_2l.premium_value = dec!(4.00);
        premium_soda_2l.size_label = Some("2L".to_string());

        let mut combo = item(tenant_id, "Combo Família", Category::Combo);
        combo.base_price = dec!(60.00);
        let combo_id = combo.id;

        let slots = vec![
            ComboSlot {
                combo_id,
                position: 0,
                quantity: 1,
                kind: SlotKind::Pizza {
                    reference_item: pizza_id,
                    size: PizzaSize::Medium,
                },
            },
            ComboSlot {
                combo_id,
                position: 1,
                quantity: 1,
                kind: SlotKind::Beverage {
                    reference_item: soda_2l.id,
                },
            },
        ];

        let calabresa_id = calabresa.id;
        let catupiry_id = catupiry.id;
        let stuffed_crust_id = stuffed_crust.id;
        let soda_2l_id = soda_2l.id;
        let premium_soda_2l_id = premium_soda_2l.id;
        for entry in [pizza, calabresa, catupiry, stuffed_crust, soda_2l, premium_soda_2l, combo] {
            items.insert(entry.id, entry);
        }

        Fixture {
            tenant_id,
            items,
            combo_slots: HashMap::from([(combo_id, slots)]),
            pizza_id,
            calabresa: calabresa_id,
            catupiry: catupiry_id,
            stuffed_crust: stuffed_crust_id,
            soda_2l: soda_2l_id,
            premium_soda_2l: premium_soda_2l_id,
            combo_id,
        }
    }

    fn pizza_request(fx: &Fixture, toppings: Vec<ToppingLine>, quantity: u32) -> LineItemRequest {
        LineItemRequest::Pizza {
            item_id: fx.pizza_id,
            size: PizzaSize::Medium,
            quantity,
            toppings,
            crust_id: None,
            beverages: Vec::new(),
            notes: None,
        }
    }

    fn topping(id: Uuid) -> ToppingLine {
        ToppingLine {
            topping_id: id,
            quantity: 1,
        }
    }

    #[test]
    fn test_fractional_topping_pricing_worked_example() {
        // Size M: max 2 toppings. Two toppings at R$2.50 and R$5.00:
        // 2.50×(1/2)×2 + 5.00×(1/2)×2 = 7.50; base 35.00 → 42.50.
        let fx = fixture();
        let request = pizza_request(&fx, vec![topping(fx.calabresa), topping(fx.catupiry)], 1);

        let priced = price_line(&request, &fx.items, &fx.combo_slots).unwrap();
        assert_eq!(priced.breakdown.toppings, dec!(7.50));
        assert_eq!(priced.item.subtotal, dec!(42.50));
    }

    #[test]
    fn test_single_topping_fills_the_whole_pizza() {
        // One topping occupies the full surface: 2.50×(1/1)×2 = 5.00.
        let fx = fixture();
        let request = pizza_request(&fx, vec![topping(fx.calabresa)], 1);

        let priced = price_line(&request, &fx.items, &fx.combo_slots).unwrap();
        assert_eq!(priced.item.subtotal, dec!(40.00));
    }

    #[test]
    fn test_quantity_multiplies_the_line() {
        let fx = fixture();
        let request = pizza_request(&fx, vec![topping(fx.calabresa), topping(fx.catupiry)], 3);

        let priced = price_line(&request, &fx.items, &fx.combo_slots).unwrap();
        assert_eq!(priced.item.subtotal, dec!(127.50));
    }

    #[test]
    fn test_zero_toppings_is_invalid() {
        let fx = fixture();
        let request = pizza_request(&fx, vec![], 1);

        let err = price_line(&request, &fx.items, &fx.combo_slots).unwrap_err();
        assert!(matches!(err, PricingError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_too_many_toppings_for_size() {
        let fx = fixture();
        let request = pizza_request(
            &fx,
            vec![
                topping(fx.calabresa),
                topping(fx.catupiry),
                topping(fx.calabresa),
            ],
            1,
        );

        let err = price_line(&request, &fx.items, &fx.combo_slots).unwrap_err();
        assert!(matches!(err, PricingError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_unpriced_size_is_a_catalog_mismatch() {
        let fx = fixture();
        let request = LineItemRequest::Pizza {
            item_id: fx.pizza_id,
            size: PizzaSize::Small,
            quantity: 1,
            toppings: vec![topping(fx.calabresa)],
            crust_id: None,
            beverages: Vec::new(),
            notes: None,
        };

        let err = price_line(&request, &fx.items, &fx.combo_slots).unwrap_err();
        assert!(matches!(err, PricingError::CatalogMismatch));
    }

    #[test]
    fn test_crust_adds_base_plus_premium() {
        let fx = fixture();
        let request = LineItemRequest::Pizza {
            item_id: fx.pizza_id,
            size: PizzaSize::Medium,
            quantity: 1,
            toppings: vec![topping(fx.calabresa), topping(fx.catupiry)],
            crust_id: Some(fx.stuffed_crust),
            beverages: Vec::new(),
            notes: None,
        };

        // 35.00 + 7.50 + (8.00 + 2.00) = 52.50
        let priced = price_line(&request, &fx.items, &fx.combo_slots).unwrap();
        assert_eq!(priced.breakdown.crust, dec!(10.00));
        assert_eq!(priced.item.subtotal, dec!(52.50));
    }

    #[test]
    fn test_mandatory_crust_missing_fails() {
        let fx = fixture();
        let request = LineItemRequest::Pizza {
            item_id: fx.pizza_id,
            size: PizzaSize::Large,
            quantity: 1,
            toppings: vec![topping(fx.calabresa)],
            crust_id: None,
            beverages: Vec::new(),
            notes: None,
        };

        let err = price_line(&request, &fx.items, &fx.combo_slots).unwrap_err();
        assert!(matches!(err, PricingError::MissingRequiredSelection(_)));
    }

    #[test]
    fn test_bundled_beverage_charges_premium_only() {
        let fx = fixture();
        let request = LineItemRequest::Pizza {
            item_id: fx.pizza_id,
            size: PizzaSize::Medium,
            quantity: 1,
            toppings: vec![topping(fx.calabresa), topping(fx.catupiry)],
            crust_id: None,
            beverages: vec![BeverageSelection {
                beverage_id: fx.premium_soda_2l,
                quantity: 2,
            }],
            notes: None,
        };

        // Premium 4.00 × 2, never the R$15.00 shelf price.
        let priced = price_line(&request, &fx.items, &fx.combo_slots).unwrap();
        assert_eq!(priced.breakdown.beverages, dec!(8.00));
        assert_eq!(priced.item.subtotal, dec!(50.50));
    }

    #[test]
    fn test_standalone_beverage_charges_shelf_price() {
        let fx = fixture();
        let request = LineItemRequest::Beverage {
            item_id: fx.soda_2l,
            quantity: 3,
            notes: None,
        };

        let priced = price_line(&request, &fx.items, &fx.combo_slots).unwrap();
        assert_eq!(priced.item.subtotal, dec!(36.00));
    }

    #[test]
    fn test_combo_with_default_beverage() {
        let fx = fixture();
        let request = LineItemRequest::Combo {
            item_id: fx.combo_id,
            quantity: 1,
            pizzas: vec![ComboPizzaConfig {
                name: "Metade calabresa, metade catupiry".to_string(),
                toppings: vec![topping(fx.calabresa), topping(fx.catupiry)],
                crust_id: None,
                notes: None,
            }],
            beverages: vec![None],
            notes: None,
        };

        // 60.00 base + 7.50 toppings; the included default beverage is free.
        let priced = price_line(&request, &fx.items, &fx.combo_slots).unwrap();
        assert_eq!(priced.item.subtotal, dec!(67.50));
        assert_eq!(priced.item.nested_pizzas.len(), 1);
    }

    #[test]
    fn test_combo_premium_beverage_substitution() {
        let fx = fixture();
        let request = LineItemRequest::Combo {
            item_id: fx.combo_id,
            quantity: 1,
            pizzas: vec![ComboPizzaConfig {
                name: "Calabresa".to_string(),
                toppings: vec![topping(fx.calabresa)],
                crust_id: None,
                notes: None,
            }],
            beverages: vec![Some(fx.premium_soda_2l)],
            notes: None,
        };

        // 60.00 + 2.50×(1/1)×2 + premium 4.00 = 69.00. The substitute's
        // shelf price never enters the sum.
        let priced = price_line(&request, &fx.items, &fx.combo_slots).unwrap();
        assert_eq!(priced.item.subtotal, dec!(69.00));
    }

    #[test]
    fn test_combo_missing_pizza_slot_configuration() {
        let fx = fixture();
        let request = LineItemRequest::Combo {
            item_id: fx.combo_id,
            quantity: 1,
            pizzas: vec![],
            beverages: vec![None],
            notes: None,
        };

        let err = price_line(&request, &fx.items, &fx.combo_slots).unwrap_err();
        assert!(matches!(err, PricingError::IncompleteCombo(_)));
    }

    #[test]
    fn test_combo_beverage_size_mismatch() {
        let fx = fixture();
        let mut small_soda = item(fx.tenant_id, "Guaraná Lata", Category::Beverage);
        small_soda.base_price = dec!(6.00);
        small_soda.size_label = Some("350ml".to_string());
        let small_id = small_soda.id;
        let mut items = fx.items.clone();
        items.insert(small_id, small_soda);

        let request = LineItemRequest::Combo {
            item_id: fx.combo_id,
            quantity: 1,
            pizzas: vec![ComboPizzaConfig {
                name: "Calabresa".to_string(),
                toppings: vec![topping(fx.calabresa)],
                crust_id: None,
                notes: None,
            }],
            beverages: vec![Some(small_id)],
            notes: None,
        };

        let err = price_line(&request, &items, &fx.combo_slots).unwrap_err();
        assert!(matches!(err, PricingError::IncompleteCombo(_)));
    }

    #[test]
    fn test_order_amounts_delivery() {
        let fx = fixture();
        let settings = TenantSettings {
            tenant_id: fx.tenant_id,
            delivery_fee: dec!(9.00),
            courier_commission: dec!(5.00),
        };
        let lines = vec![
            price_line(
                &pizza_request(&fx, vec![topping(fx.calabresa), topping(fx.catupiry)], 1),
                &fx.items,
                &fx.combo_slots,
            )
            .unwrap(),
            price_line(
                &LineItemRequest::Beverage {
                    item_id: fx.soda_2l,
                    quantity: 1,
                    notes: None,
                },
                &fx.items,
                &fx.combo_slots,
            )
            .unwrap(),
        ];

        let amounts = order_amounts(&lines, OrderType::Delivery, &settings, dec!(4.50)).unwrap();
        assert_eq!(amounts.subtotal, dec!(54.50));
        assert_eq!(amounts.delivery_fee, dec!(9.00));
        assert_eq!(amounts.total, dec!(59.00));
        assert_eq!(amounts.courier_commission, dec!(5.00));

        // The frozen invariant: total = Σ subtotals + fee − discount.
        let lines_sum: Decimal = lines.iter().map(|l| l.item.subtotal).sum();
        assert_eq!(
            amounts.total,
            lines_sum + amounts.delivery_fee - amounts.discount
        );
    }

    #[test]
    fn test_order_amounts_pickup_skips_fee_and_commission() {
        let fx = fixture();
        let settings = TenantSettings {
            tenant_id: fx.tenant_id,
            delivery_fee: dec!(9.00),
            courier_commission: dec!(5.00),
        };
        let lines = vec![price_line(
            &pizza_request(&fx, vec![topping(fx.calabresa)], 1),
            &fx.items,
            &fx.combo_slots,
        )
        .unwrap()];

        let amounts =
            order_amounts(&lines, OrderType::Pickup, &settings, Decimal::ZERO).unwrap();
        assert_eq!(amounts.delivery_fee, Decimal::ZERO);
        assert_eq!(amounts.courier_commission, Decimal::ZERO);
        assert_eq!(amounts.total, amounts.subtotal);
    }

    #[test]
    fn test_discount_cannot_exceed_order_value() {
        let fx = fixture();
        let settings = TenantSettings {
            tenant_id: fx.tenant_id,
            delivery_fee: Decimal::ZERO,
            courier_commission: Decimal::ZERO,
        };
        let lines = vec![price_line(
            &pizza_request(&fx, vec![topping(fx.calabresa)], 1),
            &fx.items,
            &fx.combo_slots,
        )
        .unwrap()];

        let err =
            order_amounts(&lines, OrderType::Pickup, &settings, dec!(1000.00)).unwrap_err();
        assert!(matches!(err, PricingError::InvalidConfiguration(_)));
    }
}
