use thiserror::Error;

const REQUEST_FAILED: &str = "Something has gone wrong with this request, please try again.";

/// Displayable error used across the library.
///
/// Every variant carries a short user-facing message; the longer debug detail
/// (I/O error text, HTTP body snippet) is retained for logs only. Errors never
/// crash the process: every failure path resolves to a terminal
/// [`DownloadStatus::Failed`](crate::DownloadStatus) or a logged no-op.
#[derive(Debug, Clone, Error)]
pub enum ChartError {
    /// Cache directory or tile file could not be created, read or written.
    #[error("{message}")]
    Io {
        message: String,
        detail: Option<String>,
    },

    /// Transport-level network failure (connection, timeout, TLS).
    #[error("{}", REQUEST_FAILED)]
    Network { detail: Option<String> },

    /// Non-2xx HTTP response, with up to the first 1000 characters of the
    /// response body kept for diagnostics.
    #[error("HTTP {status}")]
    Http {
        status: u16,
        snippet: Option<String>,
    },

    /// Degenerate or unusable geometry.
    #[error("{message}")]
    Geometry { message: String },

    /// Persisted area list could not be read or written.
    #[error("{message}")]
    Persistence {
        message: String,
        detail: Option<String>,
    },

    /// A download was cut short (app killed or cancelled mid-download).
    #[error("Download Interrupted")]
    Interrupted,
}

impl ChartError {
    pub fn io(message: impl Into<String>, err: &std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            detail: Some(err.to_string()),
        }
    }

    pub fn network(detail: impl Into<String>) -> Self {
        Self::Network {
            detail: Some(detail.into()),
        }
    }

    /// Build an HTTP error from a status code and raw response body, keeping
    /// at most the first 1000 characters of the body for diagnostics.
    pub fn http(status: u16, body: &[u8]) -> Self {
        let snippet = std::str::from_utf8(body)
            .ok()
            .map(|text| text.chars().take(1000).collect::<String>());
        Self::Http { status, snippet }
    }

    pub fn geometry(message: impl Into<String>) -> Self {
        Self::Geometry {
            message: message.into(),
        }
    }

    pub fn persistence(message: impl Into<String>, detail: Option<String>) -> Self {
        Self::Persistence {
            message: message.into(),
            detail,
        }
    }

    /// Machine code for the failure: HTTP status where one exists, else 0.
    pub fn code(&self) -> i32 {
        match self {
            Self::Http { status, .. } => *status as i32,
            _ => 0,
        }
    }

    /// Short human-readable message suitable for display.
    pub fn display_string(&self) -> String {
        match self {
            Self::Http { .. } | Self::Network { .. } => REQUEST_FAILED.to_string(),
            other => other.to_string(),
        }
    }

    /// Longer debug description retained for logs only.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Io { detail, .. }
            | Self::Network { detail }
            | Self::Persistence { detail, .. } => detail.as_deref(),
            Self::Http { snippet, .. } => snippet.as_deref(),
            _ => None,
        }
    }
}
