use thiserror::Error;

/// Errors surfaced by every component in this crate. Adapters (sqlx, redis,
/// zip/unrar/7z, image) get their own `#[from]` arm rather than being wrapped
/// in `Internal` so callers can match on failure class when it matters (e.g.
/// retry a `Transport` error, never retry `Invalid*`).
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("model error: {0}")]
    Model(#[from] gallerist_model::ModelError),

    #[error("invalid archive: {0}")]
    InvalidArchive(String),

    #[error("invalid entry reference: {0}")]
    InvalidEntryRef(String),

    #[error("unsupported image: {0}")]
    UnsupportedImage(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("cron expression invalid: {0}")]
    InvalidCron(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("job {0} exceeded stage failure tolerance")]
    FailureToleranceExceeded(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
