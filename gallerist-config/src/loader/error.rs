use thiserror::Error;

/// Errors raised while loading or validating configuration. A guard-rail
/// failure here is always a startup-time abort, never a runtime fallback —
/// mirrors `ferrex-config`'s `ConfigGuardRailError`.
#[derive(Error, Debug)]
pub enum ConfigLoadError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {key}: {value} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("guard rail violated: {0}")]
    GuardRail(String),
}

pub type Result<T> = std::result::Result<T, ConfigLoadError>;
