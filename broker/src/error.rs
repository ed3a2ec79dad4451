//! Broker error types.

/// Errors that can occur while talking to the KIS API.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    /// Credential rejected or token issuance failed. Fatal for the run.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Transport-level failure (DNS, TLS, timeout, non-2xx status).
    #[error("connection error: {0}")]
    Connection(String),

    /// The API answered but signalled a business-level rejection
    /// (`rt_cd != "0"`).
    #[error("KIS API error [{code}]: {message}")]
    Api { code: String, message: String },

    /// Transport-level failure while submitting an order.
    #[error("order error: {0}")]
    Order(String),

    /// Response body did not match the expected shape.
    #[error("failed to parse response: {0}")]
    Parse(String),

    /// Token cache could not be written. Reads never fail here: a corrupt
    /// cache reads as absent.
    #[error("token cache error: {0}")]
    TokenCache(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BrokerError>;
