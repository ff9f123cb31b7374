use thiserror::Error;

/// Errors surfaced while constructing or validating model types.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("invalid entry ref: {0}")]
    InvalidEntryRef(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Crate-local result alias.
pub type Result<T> = std::result::Result<T, ModelError>;
