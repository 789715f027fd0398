use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use tokio::sync::OnceCell;

use super::{CosConfig, CosError, ObjectStore};

const APIKEY_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";
const SERVICE_INSTANCE_HEADER: &str = "ibm-service-instance-id";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct IamErrorResponse {
    #[serde(rename = "errorMessage")]
    error_message: Option<String>,
}

/// IBM Cloud Object Storage client authenticated with an IAM API key.
#[derive(Clone)]
pub struct CosClient {
    client: reqwest::Client,
    api_key: String,
    service_instance: String,
    endpoint: String,
    bucket: String,
    iam_endpoint: String,
    token: OnceCell<String>,
}

impl CosClient {
    pub fn new(config: &CosConfig) -> Result<Self, CosError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(CosError::Network)?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            service_instance: config.service_instance.clone(),
            endpoint: config.endpoint.clone(),
            bucket: config.bucket.clone(),
            iam_endpoint: config.iam_endpoint.clone(),
            token: OnceCell::new(),
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn object_url(&self, key: &str) -> String {
        let encoded: Vec<String> = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}/{}", self.endpoint, self.bucket, encoded.join("/"))
    }

    // NOTE: One token per client; these tools finish well inside its lifetime
    async fn token(&self) -> Result<&str, CosError> {
        self.token
            .get_or_try_init(|| self.request_token())
            .await
            .map(String::as_str)
    }

    async fn request_token(&self) -> Result<String, CosError> {
        let url = format!("{}/identity/token", self.iam_endpoint);
        let body = format!(
            "grant_type={}&apikey={}",
            urlencoding::encode(APIKEY_GRANT_TYPE),
            urlencoding::encode(&self.api_key)
        );

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(ACCEPT, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<IamErrorResponse>(&text)
                .ok()
                .and_then(|e| e.error_message)
                .unwrap_or_else(|| format!("IAM returned {}", status.as_u16()));
            return Err(CosError::Auth { message });
        }

        let token: TokenResponse = serde_json::from_str(&text).map_err(|e| CosError::Auth {
            message: format!("Failed to parse token response: {}", e),
        })?;

        tracing::debug!("IAM token acquired");
        Ok(token.access_token)
    }

    pub async fn get_object(&self, key: &str) -> Result<Vec<u8>, CosError> {
        let token = self.token().await?;
        let response = self
            .client
            .get(self.object_url(key))
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header(SERVICE_INSTANCE_HEADER, &self.service_instance)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(CosError::NotFound {
                key: key.to_string(),
            });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }

        let bytes = response.bytes().await?;
        tracing::info!(bucket = %self.bucket, key, bytes = bytes.len(), "object downloaded");
        Ok(bytes.to_vec())
    }

    pub async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<(), CosError> {
        let token = self.token().await?;
        let size = body.len();
        let response = self
            .client
            .put(self.object_url(key))
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .header(SERVICE_INSTANCE_HEADER, &self.service_instance)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }

        tracing::info!(bucket = %self.bucket, key, bytes = size, "object uploaded");
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for CosClient {
    async fn get_object(&self, key: &str) -> Result<Vec<u8>, CosError> {
        CosClient::get_object(self, key).await
    }

    async fn put_object(&self, key: &str, body: Vec<u8>) -> Result<(), CosError> {
        CosClient::put_object(self, key, body).await
    }
}

/// S3-style error body: `<Error><Code>..</Code><Message>..</Message></Error>`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct S3ErrorResponse {
    code: String,
    #[serde(default)]
    message: Option<String>,
}

fn api_error(status: StatusCode, body: &str) -> CosError {
    let message = match quick_xml::de::from_str::<S3ErrorResponse>(body) {
        Ok(S3ErrorResponse {
            code,
            message: Some(detail),
        }) if !detail.trim().is_empty() => format!("{}: {}", code.trim(), detail.trim()),
        Ok(S3ErrorResponse { code, .. }) => code.trim().to_string(),
        Err(_) => status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string(),
    };

    CosError::Api {
        status: status.as_u16(),
        message,
    }
}

impl std::fmt::Debug for CosClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CosClient")
            .field("api_key", &"[REDACTED]")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CosConfig {
        CosConfig {
            api_key: "super_secret_api_key_12345".to_string(),
            service_instance: "crn:v1:bluemix:public:cloud-object-storage:global:a/1::".to_string(),
            endpoint: "https://s3.us-south.cloud-object-storage.appdomain.cloud".to_string(),
            bucket: "tke-files".to_string(),
            iam_endpoint: "https://iam.cloud.ibm.com".to_string(),
        }
    }

    #[test]
    fn test_client_creation() {
        assert!(CosClient::new(&config()).is_ok());
    }

    #[test]
    fn test_debug_does_not_expose_api_key() {
        let client = CosClient::new(&config()).unwrap();
        let debug_output = format!("{:?}", client);

        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_api_key_12345"),
            "Debug output must NOT contain the actual API key"
        );
    }

    #[test]
    fn test_object_url_encodes_segments() {
        let client = CosClient::new(&config()).unwrap();
        assert_eq!(
            client.object_url("ceremony/my file.zip"),
            "https://s3.us-south.cloud-object-storage.appdomain.cloud/tke-files/ceremony/my%20file.zip"
        );
    }

    #[test]
    fn test_api_error_from_xml() {
        let body = "<?xml version=\"1.0\"?><Error><Code>AccessDenied</Code><Message>Access Denied</Message></Error>";
        let err = api_error(StatusCode::FORBIDDEN, body);
        assert_eq!(err.to_string(), "API error (403): AccessDenied: Access Denied");
    }

    #[test]
    fn test_api_error_unescapes_entities() {
        let body = "<Error><Code>InvalidArgument</Code><Message>Key &lt;a&gt; &amp; b</Message><Resource>/tke-files/x</Resource></Error>";
        let err = api_error(StatusCode::BAD_REQUEST, body);
        assert_eq!(err.to_string(), "API error (400): InvalidArgument: Key <a> & b");
    }

    #[test]
    fn test_api_error_code_without_message() {
        let err = api_error(StatusCode::FORBIDDEN, "<Error><Code>AccessDenied</Code></Error>");
        assert_eq!(err.to_string(), "API error (403): AccessDenied");
    }

    #[test]
    fn test_api_error_without_body() {
        let err = api_error(StatusCode::INTERNAL_SERVER_ERROR, "");
        assert_eq!(err.to_string(), "API error (500): Internal Server Error");
    }
}
