use thiserror::Error;

#[derive(Debug, Error)]
pub enum OllagramError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Telegram error: {0}")]
    Telegram(String),

    #[error("Inference backend error: {0}")]
    Inference(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OllagramError>;
