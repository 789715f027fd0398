use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Inventory(#[from] crate::inventory::InventoryError),

    #[error(transparent)]
    Terraform(#[from] crate::terraform::TerraformError),

    #[error(transparent)]
    Ceremony(#[from] crate::tke::CeremonyError),

    #[error(transparent)]
    Cos(#[from] crate::cos::CosError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration problems: missing files, keys or environment variables.
///
/// SECURITY: Values of secret variables never appear in these messages.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file {name} not found under {searched} or its inventory/ directory")]
    MissingFile { name: String, searched: String },

    #[error("{path}: missing {key}")]
    MissingKey { path: String, key: String },

    #[error("{path}: {message}")]
    Invalid { path: String, message: String },

    #[error("environment variable {0} is not set")]
    MissingEnv(String),

    #[error("environment variable {name} is invalid: {message}")]
    InvalidEnv { name: String, message: String },
}

/// Reads configuration values from a lookup function so callers can swap the process
/// environment for a fixed map in tests.
pub(crate) fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<String, ConfigError> {
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ConfigError::MissingEnv(name.to_string()))
}

pub(crate) fn optional(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}
