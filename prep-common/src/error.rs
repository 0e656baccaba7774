use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum PrepError {
    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("HTTP Request Error: {0}")]
    Http(#[from] Arc<reqwest::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),

    #[error("TOML Parsing Error: {0}")]
    Toml(#[from] Arc<toml::de::Error>),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("Installation of {0} failed: {1}")]
    Install(String, String),

    #[error("DownloadError: Failed to download '{0}' from '{1}': {2}")]
    Download(String, String, String),

    #[error("Corrupt archive {0}: {1}")]
    CorruptArchive(String, String),

    #[error("Extraction Error: {0}")]
    Extraction(String),

    #[error("Validation Error: {0}")]
    Validation(String),

    #[error("Failed to execute command: {0}")]
    CommandExec(String),
}

/// Coarse classification of [`PrepError`], used by callers that need to act on
/// the failure category rather than the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Precondition,
    Install,
    Download,
    CorruptArchive,
    Extraction,
    Other,
}

impl PrepError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PrepError::Precondition(_) => ErrorKind::Precondition,
            PrepError::Install(..) => ErrorKind::Install,
            PrepError::Download(..) => ErrorKind::Download,
            PrepError::CorruptArchive(..) => ErrorKind::CorruptArchive,
            PrepError::Extraction(_) => ErrorKind::Extraction,
            _ => ErrorKind::Other,
        }
    }
}

impl From<std::io::Error> for PrepError {
    fn from(err: std::io::Error) -> Self {
        PrepError::Io(Arc::new(err))
    }
}

impl From<reqwest::Error> for PrepError {
    fn from(err: reqwest::Error) -> Self {
        PrepError::Http(Arc::new(err))
    }
}

impl From<serde_json::Error> for PrepError {
    fn from(err: serde_json::Error) -> Self {
        PrepError::Json(Arc::new(err))
    }
}

impl From<toml::de::Error> for PrepError {
    fn from(err: toml::de::Error) -> Self {
        PrepError::Toml(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, PrepError>;
