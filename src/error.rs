//! Error types for voicegate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoicegateError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio stream errors
    #[error("Invalid stream size: {message}")]
    InvalidStreamSize { message: String },

    #[error("Stream writer already claimed")]
    WriterAlreadyClaimed,

    #[error("Reader limit exceeded: at most {max} concurrent readers")]
    ReaderLimitExceeded { max: usize },

    // Directive errors
    #[error("Directive handler already registered for {name}")]
    DuplicateDirectiveHandler { name: String },

    #[error("Malformed directive: {message}")]
    MalformedDirective { message: String },

    // Event assembly/delivery errors
    #[error("Context unavailable: {message}")]
    ContextUnavailable { message: String },

    #[error("Event send failed: {message}")]
    SendFailed { message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VoicegateError>;
