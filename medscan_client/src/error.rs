use std::path::PathBuf;

use thiserror::Error;

/// Local rejection of a dropped file. Never reaches the network.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{file_name} is not a supported image type (accepted: {accepted})")]
    UnsupportedType { file_name: String, accepted: String },

    #[error("{file_name} is {size_bytes} bytes, which exceeds the upload limit of {max_bytes} bytes")]
    FileTooLarge {
        file_name: String,
        size_bytes: u64,
        max_bytes: u64,
    },
}

/// Failure surfaced from the analysis service boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Cannot connect to the backend server. Please make sure it is running.")]
    ConnectionUnreachable,

    #[error(
        "Server error: {status} - {status_text}{}",
        .detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default()
    )]
    ServerError {
        status: u16,
        status_text: String,
        detail: Option<String>,
    },

    #[error("The analysis request timed out. Please try again.")]
    Timeout,

    #[error("The server returned an unreadable analysis result: {0}")]
    InvalidPayload(String),

    /// The submission task died before producing a result.
    #[error("The analysis request failed unexpectedly: {0}")]
    Internal(String),
}

impl TransportError {
    /// Whether a fresh attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::ConnectionUnreachable | TransportError::Timeout => true,
            TransportError::ServerError { status, .. } => *status >= 500,
            TransportError::InvalidPayload(_) | TransportError::Internal(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid {key}: {reason}")]
    Invalid { key: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

impl ConfigError {
    pub(crate) fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no file is staged for analysis")]
    NothingStaged,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}
