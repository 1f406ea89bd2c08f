use thiserror::Error;

/// Domain-level errors for MachineMate.
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    HttpRequest(String),

    #[error("Identification request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Malformed identification response: {0}")]
    InvalidResponse(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Machine not found: {0}")]
    MachineNotFound(String),

    #[error("Trace not found: {0}")]
    TraceNotFound(String),

    #[error("Precondition violated: {0}")]
    Precondition(String),
}

impl DomainError {
    /// Whether the resolver recovers from this error with the offline fallback.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            DomainError::HttpRequest(_)
                | DomainError::Timeout { .. }
                | DomainError::InvalidResponse(_)
                | DomainError::Io(_)
        )
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        DomainError::Io(err.to_string())
    }
}

impl From<toml::de::Error> for DomainError {
    fn from(err: toml::de::Error) -> Self {
        DomainError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for DomainError {
    fn from(err: toml::ser::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Serialization(err.to_string())
    }
}
