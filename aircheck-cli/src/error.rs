use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("failed to read configuration {path}: {source}")]
    ConfigRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration {path}: {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {reason}")]
    Invalid { reason: String },

    #[error(transparent)]
    Recorder(#[from] aircheck_engine::RecorderError),
}

impl CliError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
