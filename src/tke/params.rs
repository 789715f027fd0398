use std::fmt;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

pub const MAX_THRESHOLD: u8 = 8;
pub const CUSTOM_KEY_HEX_LEN: usize = 64;

#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("invalid ceremony parameters: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read ceremony parameters from {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid ceremony parameters: {0}")]
    Invalid(String),
}

/// Inputs for one master-key ceremony, read once at start-up.
#[derive(Clone, Deserialize)]
pub struct CeremonyParams {
    pub admin_name: String,
    pub admin_password: String,
    #[serde(default)]
    pub thresholds: Thresholds,
    pub keys: Vec<MasterKeyPart>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Thresholds {
    pub signature: u8,
    pub revocation: u8,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            signature: 1,
            revocation: 1,
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MasterKeyPart {
    Random {
        description: String,
        password: String,
    },
    Custom {
        description: String,
        password: String,
        value: String,
    },
}

impl MasterKeyPart {
    pub fn description(&self) -> &str {
        match self {
            Self::Random { description, .. } | Self::Custom { description, .. } => description,
        }
    }

    pub fn password(&self) -> &str {
        match self {
            Self::Random { password, .. } | Self::Custom { password, .. } => password,
        }
    }

    /// Arguments after `mk-add`.
    pub fn add_args(&self) -> Vec<String> {
        match self {
            Self::Random { .. } => vec!["--random".to_string()],
            Self::Custom { value, .. } => vec!["--value".to_string(), value.clone()],
        }
    }
}

impl CeremonyParams {
    pub fn from_json(raw: &str) -> Result<Self, ParamsError> {
        let params: Self = serde_json::from_str(raw)?;
        params.validate()?;
        Ok(params)
    }

    /// `INPUT_FILE` carries either the JSON document itself or a path to it.
    pub fn from_input(input: &str) -> Result<Self, ParamsError> {
        let trimmed = input.trim_start();
        if trimmed.starts_with('{') {
            return Self::from_json(trimmed);
        }
        let path = Path::new(input.trim());
        let raw = std::fs::read_to_string(path).map_err(|source| ParamsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.admin_name.trim().is_empty() {
            return Err(ParamsError::Invalid("admin_name must not be empty".into()));
        }
        if self.admin_password.is_empty() {
            return Err(ParamsError::Invalid(
                "admin_password must not be empty".into(),
            ));
        }
        for (name, value) in [
            ("signature", self.thresholds.signature),
            ("revocation", self.thresholds.revocation),
        ] {
            if !(1..=MAX_THRESHOLD).contains(&value) {
                return Err(ParamsError::Invalid(format!(
                    "{} threshold must be between 1 and {}, got {}",
                    name, MAX_THRESHOLD, value
                )));
            }
        }
        if !(2..=3).contains(&self.keys.len()) {
            return Err(ParamsError::Invalid(format!(
                "expected 2 or 3 master key parts, got {}",
                self.keys.len()
            )));
        }
        for (i, key) in self.keys.iter().enumerate() {
            if key.description().trim().is_empty() {
                return Err(ParamsError::Invalid(format!(
                    "key part {} has an empty description",
                    i + 1
                )));
            }
            // KEYNUMs are looked up by description, so each must be unique
            if self.keys[..i]
                .iter()
                .any(|earlier| earlier.description().trim() == key.description().trim())
            {
                return Err(ParamsError::Invalid(format!(
                    "key part {} repeats description '{}'",
                    i + 1,
                    key.description().trim()
                )));
            }
            if key.password().is_empty() {
                return Err(ParamsError::Invalid(format!(
                    "key part {} has an empty password",
                    i + 1
                )));
            }
            if let MasterKeyPart::Custom { value, .. } = key {
                if value.len() != CUSTOM_KEY_HEX_LEN || !value.chars().all(|c| c.is_ascii_hexdigit())
                {
                    return Err(ParamsError::Invalid(format!(
                        "key part {} value must be {} hex digits",
                        i + 1,
                        CUSTOM_KEY_HEX_LEN
                    )));
                }
            }
        }
        Ok(())
    }
}

impl fmt::Debug for CeremonyParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CeremonyParams")
            .field("admin_name", &self.admin_name)
            .field("admin_password", &"[REDACTED]")
            .field("thresholds", &self.thresholds)
            .field("keys", &self.keys)
            .finish()
    }
}

impl fmt::Debug for MasterKeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Random { description, .. } => f
                .debug_struct("Random")
                .field("description", description)
                .field("password", &"[REDACTED]")
                .finish(),
            Self::Custom { description, .. } => f
                .debug_struct("Custom")
                .field("description", description)
                .field("password", &"[REDACTED]")
                .field("value", &"[REDACTED]")
                .finish(),
        }
    }
}
