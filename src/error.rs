use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Ledger store rejected the request: {reason}")]
    Store { reason: String },

    #[error("Transaction not found: {id}")]
    TransactionNotFound { id: String },

    #[error("Failed to parse booking annotation: {reason}")]
    Annotation { reason: String },

    #[error("Invalid parameters: {reason}")]
    InvalidParams { reason: String },

    #[error("Financial analysis failed: {reason}")]
    Analyzer { reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
