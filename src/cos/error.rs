use thiserror::Error;

/// Object-storage errors.
///
/// SECURITY: Error messages must NEVER contain the API key or bearer token.
#[derive(Debug, Error)]
pub enum CosError {
    /// IAM rejected the API key or returned no token
    #[error("authentication failed: {message}")]
    Auth { message: String },

    /// COS returned an error response
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Network-level error (connection failed, timeout, etc.)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("object not found: '{key}'")]
    NotFound { key: String },

    #[error("invalid object key: '{key}'")]
    InvalidKey { key: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("archive error: {0}")]
    Archive(String),

    #[error(transparent)]
    Config(#[from] crate::error::ConfigError),
}

impl From<zip::result::ZipError> for CosError {
    fn from(err: zip::result::ZipError) -> Self {
        CosError::Archive(err.to_string())
    }
}

impl From<walkdir::Error> for CosError {
    fn from(err: walkdir::Error) -> Self {
        CosError::Archive(err.to_string())
    }
}

impl CosError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        CosError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}
