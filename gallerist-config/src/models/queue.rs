/// Settings for the message-bus adapter (C4).
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Per-consumer in-flight bound (`queue.prefetch`, default 4–16).
    pub prefetch: u32,
    /// Attempts before a message is routed to its dead-letter queue
    /// (`queue.maxRetries`, default 5).
    pub max_retries: u32,
    /// Base delay for the exponential backoff applied between retries.
    pub retry_base_delay_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            prefetch: 8,
            max_retries: 5,
            retry_base_delay_ms: 500,
        }
    }
}
