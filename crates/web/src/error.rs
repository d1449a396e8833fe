use nano_http::protocol::ListenError;
use thiserror::Error;

/// A route table or server that can't be built.
///
/// Raised while building, never while serving: a server with an invalid configuration
/// does not start.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("invalid authentication descriptor '{descriptor}': {reason}")]
    InvalidAuthentication { descriptor: String, reason: &'static str },

    #[error("invalid http method '{method}' for route '{pattern}'")]
    InvalidMethod { pattern: String, method: String },

    #[error("route pattern '{pattern}' must not contain a query string")]
    InvalidPattern { pattern: String },

    #[error("https requires a tls configuration")]
    MissingCertificate,
}

impl ConfigurationError {
    pub fn invalid_authentication<S: ToString>(descriptor: S, reason: &'static str) -> Self {
        Self::InvalidAuthentication { descriptor: descriptor.to_string(), reason }
    }
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("transport error: {source}")]
    Transport {
        #[from]
        source: ListenError,
    },
}
