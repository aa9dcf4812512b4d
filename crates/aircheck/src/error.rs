use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("recording cancelled")]
    Cancelled,

    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    #[error("request failed with HTTP {status} during {operation} for {url}")]
    HttpStatus {
        status: StatusCode,
        url: String,
        operation: &'static str,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("index error: {reason}")]
    Playlist { reason: String },

    #[error("proxy configuration error: {reason}")]
    ProxyConfiguration { reason: String },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    #[error("encoder failed: {reason}")]
    Encode { reason: String },
}

impl RecorderError {
    pub fn invalid_url(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            input: input.into(),
            reason: reason.into(),
        }
    }

    pub fn http_status(
        status: StatusCode,
        url: impl Into<String>,
        operation: &'static str,
    ) -> Self {
        Self::HttpStatus {
            status,
            url: url.into(),
            operation,
        }
    }

    pub fn playlist(reason: impl Into<String>) -> Self {
        Self::Playlist {
            reason: reason.into(),
        }
    }

    pub fn proxy_configuration(reason: impl Into<String>) -> Self {
        Self::ProxyConfiguration {
            reason: reason.into(),
        }
    }

    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub fn encode(reason: impl Into<String>) -> Self {
        Self::Encode {
            reason: reason.into(),
        }
    }

    /// Transient errors reduce one cycle's yield and are simply retried on
    /// the next scheduled invocation. Everything else signals a defect or a
    /// condition that is fatal to the current recording window.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network { .. } | Self::HttpStatus { .. } | Self::Playlist { .. } => true,
            Self::Cancelled
            | Self::InvalidUrl { .. }
            | Self::Io { .. }
            | Self::ProxyConfiguration { .. }
            | Self::Configuration { .. }
            | Self::Encode { .. } => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, RecorderError>;
