use thiserror::Error;

/// Errors building a broker client.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("invalid management URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("unsupported URL scheme {0} (only http is supported)")]
    UnsupportedScheme(String),
}
