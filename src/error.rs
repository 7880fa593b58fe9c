//! Error types for print-quote.

use rust_decimal::Decimal;

/// Top-level error type for the bot.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Startup error: {0}")]
    Startup(#[from] StartupError),

    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    #[error("Pricing error: {0}")]
    Pricing(#[from] PricingError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Failed to initialize logging: {0}")]
    Logging(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Channel-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Channel {name} failed to start: {reason}")]
    StartupFailed { name: String, reason: String },

    #[error("Failed to send response on channel {name}: {reason}")]
    SendFailed { name: String, reason: String },
}

/// Single-instance guard errors.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Another instance is already running (lock held on {resource})")]
    TransportConflict { resource: String },

    #[error("Failed to acquire instance lock on {resource}: {source}")]
    Lock {
        resource: String,
        #[source]
        source: std::io::Error,
    },
}

/// Session store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Session for user {user_id} not found")]
    NotFound { user_id: String },

    #[error("Session for user {user_id} already exists")]
    AlreadyExists { user_id: String },

    #[error("Storage backend failure: {0}")]
    Backend(String),
}

/// Price lookup failures. These indicate a mismatch between the dialogue
/// and the pricing table; buttons only offer keys the table knows.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PricingError {
    #[error("Unknown material: {material}")]
    UnknownMaterial { material: String },

    #[error("Unknown subtype {subtype} for material {material}")]
    UnknownSubtype { material: String, subtype: String },

    #[error("Material {material} requires a subtype")]
    SubtypeRequired { material: String },

    #[error("Material {material} has no subtypes, got {subtype}")]
    UnexpectedSubtype { material: String, subtype: String },

    #[error("Total for material {material} overflows")]
    Overflow { material: String },
}

/// Rejected free-text input. Recovered by the dialogue: the user is
/// re-prompted for the same field.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("not a number: {input:?}")]
    NotANumber { input: String },

    #[error("not an integer: {input:?}")]
    NotAnInteger { input: String },

    #[error("{value} is below the minimum {min}")]
    BelowMinimum { value: Decimal, min: Decimal },

    #[error("{value} is above the maximum {max}")]
    AboveMaximum { value: Decimal, max: Decimal },
}

/// Result type alias for the bot.
pub type Result<T> = std::result::Result<T, Error>;
