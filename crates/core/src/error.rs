use thiserror::Error;

pub type CoreResult<T> = Result<T, AttributionError>;

#[derive(Error, Debug)]
pub enum AttributionError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown attribution model: {0}")]
    InvalidModel(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    #[error("Conversion {conversion_id} not found for customer {customer_id}")]
    ConversionNotFound {
        customer_id: String,
        conversion_id: uuid::Uuid,
    },

    #[error("Touchpoint source error: {0}")]
    Source(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
