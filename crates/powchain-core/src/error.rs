use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid amount {amount} for address {address}")]
    InvalidAmount { address: String, amount: f64 },

    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),

    #[error("malformed document: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
