use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("provider: {0}")]
    Provider(String),

    #[error("webhook signature: {0}")]
    Signature(String),

    #[error("delivery: {0}")]
    Delivery(String),

    #[error("config: {0}")]
    Config(String),
}
