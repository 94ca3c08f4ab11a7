use thiserror::Error;

/// Errors raised while building or valuing portfolio records.
#[derive(Debug, Error, PartialEq)]
pub enum PortfolioError {
    #[error("Asset not found: {0}")]
    NotFound(String),
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
    #[error("Arithmetic overflow: {0}")]
    Overflow(String),
}

impl PortfolioError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        PortfolioError::InvalidRecord(msg.into())
    }

    pub(crate) fn overflow(msg: impl Into<String>) -> Self {
        PortfolioError::Overflow(msg.into())
    }
}

/// Result type for portfolio operations
pub type Result<T> = std::result::Result<T, PortfolioError>;
