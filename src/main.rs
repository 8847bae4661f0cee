use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use scylla::client::session::Session;
use scylla::client::session_builder::SessionBuilder;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

mod domain;
mod messaging;
mod metrics;
mod service;
mod store;
mod utils;

use domain::catalog::{
    CatalogItem, CatalogSnapshot, Category, ComboSlot, PizzaSize, SizePricing, SlotKind,
    TenantSettings,
};
use domain::order::{Capabilities, Caller, OrderStatus, OrderType, PaymentMethod, Role, ToppingLine};
use domain::pricing::LineItemRequest;
use messaging::RedpandaPublisher;
use service::{CreateOrderRequest, LifecycleService, TransitionOptions};
use store::ScyllaOrderStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Structured logging with environment-based filtering; override with
    // RUST_LOG, e.g. RUST_LOG=debug cargo run.
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,pizzeria_core=debug")),
        )
        .init();

    tracing::info!("🍕 Starting pizzeria order lifecycle engine");

    // === 1. ScyllaDB session ===
    tracing::info!("Connecting to ScyllaDB...");
    let session: Session = SessionBuilder::new()
        .known_node("127.0.0.1:9042")
        .build()
        .await?;

    session
        .query_unpaged(
            "CREATE KEYSPACE IF NOT EXISTS pizzeria_ks WITH REPLICATION = \
             {'class': 'SimpleStrategy', 'replication_factor': 1}",
            &[],
        )
        .await?;
    session.use_keyspace("pizzeria_ks", false).await?;
    ScyllaOrderStore::ensure_schema(&session).await?;
    let session = Arc::new(session);

    // === 2. Prometheus metrics + scrape endpoint ===
    let engine_metrics = Arc::new(metrics::Metrics::new()?);
    let registry = Arc::new(engine_metrics.registry().clone());
    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().expect("metrics runtime");
        rt.block_on(async {
            if let Err(e) = metrics::start_metrics_server(registry, 9090).await {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    });

    // === 3. Wire the lifecycle service ===
    let tenant_id = Uuid::new_v4();
    let demo = demo_catalog(tenant_id);
    let publisher = Arc::new(RedpandaPublisher::new("127.0.0.1:9092")?);
    let store = Arc::new(ScyllaOrderStore::new(session.clone()));
    let service = Arc::new(LifecycleService::new(
        store,
        Arc::new(demo.snapshot.clone()),
        publisher,
        engine_metrics,
    ));

    // === 4. Walk one delivery order through its whole life ===
    tracing::info!("📝 Demonstrating the order lifecycle");

    let order = service
        .create_order(CreateOrderRequest {
            tenant_id,
            customer_id: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
            order_type: OrderType::Delivery,
            delivery_address: Some("Rua Harmonia, 123 - Vila Madalena".to_string()),
            payment_method: PaymentMethod::Cash {
                change_for: Some(dec!(100.00)),
            },
            line_items: vec![LineItemRequest::Pizza {
                item_id: demo.pizza_id,
                size: PizzaSize::Medium,
                quantity: 1,
                toppings: vec![
                    ToppingLine {
                        topping_id: demo.calabresa_id,
                        quantity: 1,
                    },
                    ToppingLine {
                        topping_id: demo.catupiry_id,
                        quantity: 1,
                    },
                ],
                crust_id: None,
                beverages: Vec::new(),
                notes: Some("Sem cebola".to_string()),
            }],
            discount: Decimal::ZERO,
        })
        .await?;

    tracing::info!(
        order_id = %order.id,
        sequence_number = order.sequence_number,
        total = %order.amounts.total,
        "✅ Order #{} received",
        order.sequence_number
    );

    // Two cooks race for the same order; exactly one wins the claim.
    let cook_a = kitchen_caller(tenant_id);
    let cook_b = kitchen_caller(tenant_id);
    let (first, second) = tokio::join!(
        service.transition(order.id, &cook_a, OrderStatus::Preparing, TransitionOptions::default()),
        service.transition(order.id, &cook_b, OrderStatus::Preparing, TransitionOptions::default()),
    );
    let winner = match (&first, &second) {
        (Ok(_), Err(_)) => &cook_a,
        (Err(_), Ok(_)) => &cook_b,
        _ => anyhow::bail!("claim race must produce exactly one winner"),
    };
    tracing::info!(preparer = %winner.id, "👨‍🍳 Preparer claimed the order");

    service
        .update_slice_progress(
            order.id,
            winner,
            HashMap::from([("half-1".to_string(), true), ("half-2".to_string(), true)]),
        )
        .await?;

    service
        .transition(order.id, winner, OrderStatus::Finalized, TransitionOptions::default())
        .await?;
    service
        .transition(order.id, winner, OrderStatus::Ready, TransitionOptions::default())
        .await?;

    let courier = Caller {
        id: Uuid::new_v4(),
        tenant_id,
        role: Role::Courier,
        capabilities: Capabilities::default(),
    };
    service
        .transition(order.id, &courier, OrderStatus::OutForDelivery, TransitionOptions::default())
        .await?;
    tracing::info!(courier = %courier.id, "🛵 Courier took the delivery");

    service
        .transition(order.id, &courier, OrderStatus::Delivered, TransitionOptions::default())
        .await?;

    let admin = Caller {
        id: Uuid::new_v4(),
        tenant_id,
        role: Role::TenantAdmin,
        capabilities: Capabilities::default(),
    };
    let closed = service
        .transition(
            order.id,
            &admin,
            OrderStatus::PaidClosed,
            TransitionOptions {
                note: Some("cash reconciled".to_string()),
            },
        )
        .await?;

    tracing::info!(
        order_id = %closed.id,
        history_entries = closed.history.len(),
        "🎉 Order closed"
    );

    Ok(())
}

fn kitchen_caller(tenant_id: Uuid) -> Caller {
    Caller {
        id: Uuid::new_v4(),
        tenant_id,
        role: Role::Kitchen,
        capabilities: Capabilities {
            can_prepare: true,
            can_finalize: true,
            can_dispatch: false,
        },
    }
}

struct DemoCatalog {
    snapshot: CatalogSnapshot,
    pizza_id: Uuid,
    calabresa_id: Uuid,
    catupiry_id: Uuid,
}

fn demo_catalog(tenant_id: Uuid) -> DemoCatalog {
    let pizza_id = Uuid::new_v4();
    let calabresa_id = Uuid::new_v4();
    let catupiry_id = Uuid::new_v4();
    let soda_id = Uuid::new_v4();
    let combo_id = Uuid::new_v4();

    let mut size_prices = HashMap::new();
    size_prices.insert(
        PizzaSize::Medium,
        SizePricing {
            price: dec!(35.00),
            max_toppings: 2,
            crust_required: false,
        },
    );
    size_prices.insert(
        PizzaSize::Large,
        SizePricing {
            price: dec!(48.00),
            max_toppings: 4,
            crust_required: false,
        },
    );

    let snapshot = CatalogSnapshot::new()
        .with_item(CatalogItem {
            id: pizza_id,
            tenant_id,
            name: "Pizza da Casa".to_string(),
            category: Category::Pizza,
            base_price: Decimal::ZERO,
            premium_value: Decimal::ZERO,
            size_prices,
            size_label: None,
            active: true,
        })
        .with_item(CatalogItem {
            id: calabresa_id,
            tenant_id,
            name: "Calabresa".to_string(),
            category: Category::Topping,
            base_price: Decimal::ZERO,
            premium_value: dec!(2.50),
            size_prices: HashMap::new(),
            size_label: None,
            active: true,
        })
        .with_item(CatalogItem {
            id: catupiry_id,
            tenant_id,
            name: "Catupiry".to_string(),
            category: Category::Topping,
            base_price: Decimal::ZERO,
            premium_value: dec!(5.00),
            size_prices: HashMap::new(),
            size_label: None,
            active: true,
        })
        .with_item(CatalogItem {
            id: soda_id,
            tenant_id,
            name: "Guaraná 2L".to_string(),
            category: Category::Beverage,
            base_price: dec!(12.00),
            premium_value: Decimal::ZERO,
            size_prices: HashMap::new(),
            size_label: Some("2L".to_string()),
            active: true,
        })
        .with_item(CatalogItem {
            id: combo_id,
            tenant_id,
            name: "Combo Casal".to_string(),
            category: Category::Combo,
            base_price: dec!(55.00),
            premium_value: Decimal::ZERO,
            size_prices: HashMap::new(),
            size_label: None,
            active: true,
        })
        .with_combo_slots(
            combo_id,
            vec![
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
                        reference_item: soda_id,
                    },
                },
            ],
        )
        .with_settings(TenantSettings {
            tenant_id,
            delivery_fee: dec!(9.00),
            courier_commission: dec!(5.00),
        });

    DemoCatalog {
        snapshot,
        pizza_id,
        calabresa_id,
        catupiry_id,
    }
}
