use std::time::Duration;

/// Boxed source error for transport failures.
///
/// Kept opaque so endpoints can report failures from any client library.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Faults raised while building or polling endpoints.
///
/// Unrecognised vendor type codes are not represented here: they produce no
/// entities and are only logged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Required credentials or addresses are missing. Fatal at construction.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The endpoint could not be reached.
    #[error("transport error talking to {endpoint}")]
    Transport {
        endpoint: String,
        #[source]
        source: BoxError,
    },

    /// The endpoint did not answer within the per-request bound.
    #[error("request to {endpoint} timed out after {timeout:?}")]
    Timeout { endpoint: String, timeout: Duration },

    /// The endpoint answered, but not with what we expected.
    #[error("protocol error from {endpoint}: {message}")]
    Protocol { endpoint: String, message: String },
}

impl Error {
    pub fn transport(endpoint: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Transport {
            endpoint: endpoint.into(),
            source: source.into(),
        }
    }

    pub fn protocol(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Whether this fault is local to one endpoint and should only skip it.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Configuration(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
