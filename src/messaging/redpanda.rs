use anyhow::Result;
use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    producer::{FutureProducer, FutureRecord},
};
use uuid::Uuid;

use crate::utils::{retry_with_backoff, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, RetryConfig, RetryResult};

use super::{EventPublisher, OrderEvent};

/// Kafka topic all order events land on. The tenant id is the partition
/// key, which scopes the fan-out: subscribers follow their own tenant's
/// partition stream.
const ORDER_EVENTS_TOPIC: &str = "order-events";

pub struct RedpandaPublisher {
    producer: FutureProducer,
    circuit_breaker: CircuitBreaker,
}

impl RedpandaPublisher {
    pub fn new(brokers: &str) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        let cb_config = CircuitBreakerConfig {
            failure_threshold: 5,
            timeout: std::time::Duration::from_secs(30),
            success_threshold: 3,
        };

        Ok(Self {
            producer,
            circuit_breaker: CircuitBreaker::new(cb_config),
        })
    }

    async fn send(&self, key: &str, payload: &str) -> Result<()> {
        let record = FutureRecord::to(ORDER_EVENTS_TOPIC).key(key).payload(payload);
        self.producer
            .send(
                record,
                rdkafka::util::Timeout::After(std::time::Duration::from_secs(5)),
            )
            .await
            .map_err(|(e, _)| anyhow::anyhow!("Kafka send error: {}", e))?;
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for RedpandaPublisher {
    async fn publish(&self, tenant_id: Uuid, event: OrderEvent) -> Result<()> {
        let key = tenant_id.to_string();
        let payload = serde_json::to_string(&event)?;

        // A couple of quick retries for transient broker hiccups; the
        // breaker keeps a dead broker from stalling every transition.
        let result = retry_with_backoff(RetryConfig::conservative(), |_attempt| {
            let key = key.clone();
            let payload = payload.clone();
            async move {
                self.circuit_breaker
                    .call(self.send(&key, &payload))
                    .await
            }
        })
        .await;

        match result {
            RetryResult::Success(_) => {
                tracing::info!(
                    tenant_id = %tenant_id,
                    order_id = %event.order_id,
                    status = ?event.status,
                    "Published order event"
                );
                Ok(())
            }
            RetryResult::Failed(CircuitBreakerError::CircuitOpen) => {
                tracing::error!(
                    tenant_id = %tenant_id,
                    order_id = %event.order_id,
                    "Circuit breaker open - event broker unavailable"
                );
                Err(anyhow::anyhow!("circuit breaker open for event broker"))
            }
            RetryResult::Failed(CircuitBreakerError::OperationFailed(e)) => {
                tracing::error!(
                    error = %e,
                    tenant_id = %tenant_id,
                    order_id = %event.order_id,
                    "Failed to publish order event"
                );
                Err(e)
            }
        }
    }
}
