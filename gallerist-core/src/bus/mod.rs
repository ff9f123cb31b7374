//! Message Bus Adapter (C4): named queues, persistent messages, per-consumer
//! prefetch, explicit acks, exponential-backoff retries, and a dead-letter
//! queue per topic, realized over Redis Streams.

mod redis_streams;

pub use redis_streams::RedisStreamsBus;

use async_trait::async_trait;
use gallerist_model::Envelope;

use crate::error::Result;

/// A delivered message plus the bookkeeping a consumer needs to ack/retry it.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub stream_id: String,
    pub envelope: Envelope,
    pub attempt: u32,
}

#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publishes `envelope` to its queue (`Envelope::queue_name`). Returns the
    /// broker-assigned message id.
    async fn publish(&self, envelope: &Envelope) -> Result<String>;

    /// Reads up to `prefetch` undelivered messages for `queue` under
    /// `consumer_group`, creating the group (and its stream) if absent.
    async fn consume(
        &self,
        queue: &str,
        consumer_group: &str,
        consumer_name: &str,
        prefetch: u32,
    ) -> Result<Vec<Delivery>>;

    /// Reclaims messages idle for at least `min_idle_ms` in `consumer_group`,
    /// handing them to `consumer_name` — recovery from a crashed consumer.
    async fn claim_stale(
        &self,
        queue: &str,
        consumer_group: &str,
        consumer_name: &str,
        min_idle_ms: u64,
        count: u32,
    ) -> Result<Vec<Delivery>>;

    /// Acknowledges successful processing, removing the message from the
    /// consumer group's pending entries list.
    async fn ack(&self, queue: &str, consumer_group: &str, stream_id: &str) -> Result<()>;

    /// Marks a delivery as failed. Below `max_retries` the message is
    /// acked and republished after an exponential backoff delay with its
    /// attempt counter incremented; at or beyond `max_retries` it is acked
    /// and moved to `<queue>_dlq` instead.
    async fn nack(
        &self,
        queue: &str,
        consumer_group: &str,
        delivery: &Delivery,
        max_retries: u32,
        retry_base_delay_ms: u64,
        reason: &str,
    ) -> Result<()>;
}
