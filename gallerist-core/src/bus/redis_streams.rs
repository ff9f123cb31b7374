use std::fmt;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, RedisError};
use tracing::{debug, warn};

use gallerist_model::Envelope;

use crate::error::{CoreError, Result};

use super::{Delivery, MessageBus};

const PAYLOAD_FIELD: &str = "payload";
const ATTEMPT_FIELD: &str = "attempt";
const REASON_FIELD: &str = "reason";

fn dlq_name(queue: &str) -> String {
    format!("{queue}_dlq")
}

/// Redis Streams-backed [`MessageBus`]. Each logical queue is a stream; each
/// consumer kind gets its own consumer group so independent consumers don't
/// steal each other's deliveries.
#[derive(Clone)]
pub struct RedisStreamsBus {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisStreamsBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStreamsBus").finish()
    }
}

impl RedisStreamsBus {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    async fn ensure_group(&self, stream: &str, group: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let result: std::result::Result<(), RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(stream)
            .arg(group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(err) if err.to_string().contains("BUSYGROUP") => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn parse_reply(reply: StreamReadReply) -> Result<Vec<Delivery>> {
        let mut out = Vec::new();
        for key in reply.keys {
            for id in key.ids {
                let payload: String = id
                    .map
                    .get(PAYLOAD_FIELD)
                    .and_then(|v| redis::from_redis_value::<String>(v).ok())
                    .ok_or_else(|| {
                        CoreError::Internal(format!("stream entry {} missing payload", id.id))
                    })?;
                let attempt: u32 = id
                    .map
                    .get(ATTEMPT_FIELD)
                    .and_then(|v| redis::from_redis_value::<u32>(v).ok())
                    .unwrap_or(0);
                let envelope: Envelope = serde_json::from_str(&payload)?;
                out.push(Delivery {
                    stream_id: id.id,
                    envelope,
                    attempt,
                });
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl MessageBus for RedisStreamsBus {
    async fn publish(&self, envelope: &Envelope) -> Result<String> {
        let queue = envelope.queue_name();
        self.ensure_group(queue, "_bootstrap").await.ok();
        let payload = serde_json::to_string(envelope)?;
        let mut conn = self.conn.clone();
        let id: String = conn
            .xadd(queue, "*", &[(PAYLOAD_FIELD, payload), (ATTEMPT_FIELD, "0".to_string())])
            .await?;
        debug!(queue, id = %id, "published message");
        Ok(id)
    }

    async fn consume(
        &self,
        queue: &str,
        consumer_group: &str,
        consumer_name: &str,
        prefetch: u32,
    ) -> Result<Vec<Delivery>> {
        self.ensure_group(queue, consumer_group).await?;
        let mut conn = self.conn.clone();
        let opts = StreamReadOptions::default()
            .group(consumer_group, consumer_name)
            .count(prefetch as usize);
        let reply: StreamReadReply = conn.xread_options(&[queue], &[">"], &opts).await?;
        Self::parse_reply(reply)
    }

    async fn claim_stale(
        &self,
        queue: &str,
        consumer_group: &str,
        consumer_name: &str,
        min_idle_ms: u64,
        count: u32,
    ) -> Result<Vec<Delivery>> {
        let mut conn = self.conn.clone();
        let (_cursor, entries, _deleted): (String, Vec<redis::streams::StreamId>, Vec<String>) =
            redis::cmd("XAUTOCLAIM")
                .arg(queue)
                .arg(consumer_group)
                .arg(consumer_name)
                .arg(min_idle_ms)
                .arg("0-0")
                .arg("COUNT")
                .arg(count)
                .query_async(&mut conn)
                .await?;

        let mut out = Vec::with_capacity(entries.len());
        for id in entries {
            let payload: String = id
                .map
                .get(PAYLOAD_FIELD)
                .and_then(|v| redis::from_redis_value::<String>(v).ok())
                .ok_or_else(|| {
                    CoreError::Internal(format!("claimed entry {} missing payload", id.id))
                })?;
            let attempt: u32 = id
                .map
                .get(ATTEMPT_FIELD)
                .and_then(|v| redis::from_redis_value::<u32>(v).ok())
                .unwrap_or(0);
            let envelope: Envelope = serde_json::from_str(&payload)?;
            out.push(Delivery {
                stream_id: id.id,
                envelope,
                attempt,
            });
        }
        if !out.is_empty() {
            warn!(queue, claimed = out.len(), "reclaimed stale deliveries");
        }
        Ok(out)
    }

    async fn ack(&self, queue: &str, consumer_group: &str, stream_id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.xack(queue, consumer_group, &[stream_id]).await?;
        Ok(())
    }

    async fn nack(
        &self,
        queue: &str,
        consumer_group: &str,
        delivery: &Delivery,
        max_retries: u32,
        retry_base_delay_ms: u64,
        reason: &str,
    ) -> Result<()> {
        self.ack(queue, consumer_group, &delivery.stream_id).await?;

        if delivery.attempt + 1 >= max_retries {
            warn!(
                queue,
                id = %delivery.stream_id,
                attempt = delivery.attempt,
                reason,
                "exhausted retries, routing to dead-letter queue"
            );
            let payload = serde_json::to_string(&delivery.envelope)?;
            let mut conn = self.conn.clone();
            let _: String = conn
                .xadd(
                    dlq_name(queue),
                    "*",
                    &[
                        (PAYLOAD_FIELD, payload),
                        (ATTEMPT_FIELD, (delivery.attempt + 1).to_string()),
                        (REASON_FIELD, reason.to_string()),
                    ],
                )
                .await?;
            return Ok(());
        }

        let next_attempt = delivery.attempt + 1;
        let delay_ms = retry_base_delay_ms.saturating_mul(1u64 << next_attempt.min(16));
        debug!(queue, attempt = next_attempt, delay_ms, "scheduling retry");
        tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;

        let payload = serde_json::to_string(&delivery.envelope)?;
        let mut conn = self.conn.clone();
        let _: String = conn
            .xadd(
                queue,
                "*",
                &[(PAYLOAD_FIELD, payload), (ATTEMPT_FIELD, next_attempt.to_string())],
            )
            .await?;
        Ok(())
    }
}
