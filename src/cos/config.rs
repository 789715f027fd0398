use std::fmt;

use crate::error::{ConfigError, optional, required};

pub const DEFAULT_IAM_ENDPOINT: &str = "https://iam.cloud.ibm.com";

/// Bucket coordinates and credentials, read from the environment.
#[derive(Clone)]
pub struct CosConfig {
    pub api_key: String,
    pub service_instance: String,
    pub endpoint: String,
    pub bucket: String,
    pub iam_endpoint: String,
}

impl CosConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(crate::error::process_env)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            api_key: required(&lookup, "API_KEY")?,
            service_instance: required(&lookup, "COS_SERVICE_CRN")?,
            endpoint: normalize_endpoint(&required(&lookup, "ENDPOINT")?),
            bucket: required(&lookup, "BUCKET")?,
            iam_endpoint: normalize_endpoint(
                &optional(&lookup, "IAM_ENDPOINT")
                    .unwrap_or_else(|| DEFAULT_IAM_ENDPOINT.to_string()),
            ),
        })
    }
}

impl fmt::Debug for CosConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CosConfig")
            .field("api_key", &"[REDACTED]")
            .field("service_instance", &self.service_instance)
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("iam_endpoint", &self.iam_endpoint)
            .finish()
    }
}

// NOTE: COS endpoint lists publish bare host names
pub fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim().trim_end_matches('/');
    if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}
