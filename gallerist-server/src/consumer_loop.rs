//! Generic poll/dispatch/ack loop shared by every stage consumer task.
//! Consumers in `gallerist-core` only implement `handle(msg) -> Result<()>`
//! for one message at a time; the polling, claim-stale recovery, and
//! ack/nack bookkeeping around that lives here since it is identical across
//! all four queues.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use gallerist_config::QueueConfig;
use gallerist_core::bus::{Delivery, MessageBus};
use gallerist_core::error::Result;
use gallerist_model::Envelope;
use tracing::{error, warn};

const CONSUMER_GROUP: &str = "gallerist";
/// Reclaim deliveries idle for at least this long — a crashed consumer
/// should not hold a message hostage forever.
const STALE_CLAIM_IDLE_MS: u64 = 60_000;
const STALE_CLAIM_BATCH: u32 = 16;
/// How many poll ticks between stale-claim sweeps.
const CLAIM_EVERY_N_TICKS: u32 = 10;

pub async fn run<F, Fut>(bus: Arc<dyn MessageBus>, queue_config: QueueConfig, queue: &'static str, handler: F)
where
    F: Fn(Envelope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let consumer_name = format!("{queue}-{}", std::process::id());
    let mut tick: u32 = 0;

    loop {
        tick = tick.wrapping_add(1);

        let deliveries = if tick % CLAIM_EVERY_N_TICKS == 0 {
            match bus
                .claim_stale(queue, CONSUMER_GROUP, &consumer_name, STALE_CLAIM_IDLE_MS, STALE_CLAIM_BATCH)
                .await
            {
                Ok(d) => d,
                Err(err) => {
                    warn!(queue, error = %err, "claim_stale failed");
                    Vec::new()
                }
            }
        } else {
            match bus
                .consume(queue, CONSUMER_GROUP, &consumer_name, queue_config.prefetch)
                .await
            {
                Ok(d) => d,
                Err(err) => {
                    warn!(queue, error = %err, "consume failed");
                    Vec::new()
                }
            }
        };

        if deliveries.is_empty() {
            tokio::time::sleep(Duration::from_millis(200)).await;
            continue;
        }

        for delivery in deliveries {
            process_one(bus.as_ref(), &queue_config, queue, &handler, delivery).await;
        }
    }
}

async fn process_one<F, Fut>(bus: &dyn MessageBus, queue_config: &QueueConfig, queue: &str, handler: &F, delivery: Delivery)
where
    F: Fn(Envelope) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let result = handler(delivery.envelope.clone()).await;
    match result {
        Ok(()) => {
            if let Err(err) = bus.ack(queue, CONSUMER_GROUP, &delivery.stream_id).await {
                error!(queue, stream_id = %delivery.stream_id, error = %err, "ack failed");
            }
        }
        Err(err) => {
            warn!(queue, stream_id = %delivery.stream_id, attempt = delivery.attempt, error = %err, "handler failed");
            if let Err(nack_err) = bus
                .nack(
                    queue,
                    CONSUMER_GROUP,
                    &delivery,
                    queue_config.max_retries,
                    queue_config.retry_base_delay_ms,
                    &err.to_string(),
                )
                .await
            {
                error!(queue, stream_id = %delivery.stream_id, error = %nack_err, "nack failed");
            }
        }
    }
}
