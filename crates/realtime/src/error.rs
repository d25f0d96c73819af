//! Relay error types
//!
//! Runtime failures (dropped frames, transport errors, unexpected closes) are
//! contained inside the relay and only logged. These errors surface while a
//! relay is being built.

/// Relay construction error
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Invalid API URL {url}: {source}")]
    InvalidApiUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Unsupported API URL scheme: {0}")]
    UnsupportedScheme(String),
    #[error("No tokio runtime available to drive the realtime relay")]
    NoRuntime,
    #[error("Endpoint {0} needs TLS; enable the `native-tls` feature or supply a transport")]
    TlsUnavailable(String),
}

/// Result type alias for relay construction
pub type RelayResult<T> = Result<T, RelayError>;
