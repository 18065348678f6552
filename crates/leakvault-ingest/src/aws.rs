//! AWS client configuration shared by the S3 fetcher and the DynamoDB sink

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::debug;

pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    pub region: String,
    /// Custom endpoint (LocalStack, MinIO, DynamoDB Local)
    pub endpoint: Option<String>,
    /// Static keys; when absent the default provider chain is used
    pub access_key: Option<String>,
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
    /// Path-style S3 addressing, needed by most S3-compatible servers
    pub path_style: bool,
}

impl AwsConfig {
    pub fn from_env() -> Self {
        Self {
            region: env::var("AWS_REGION")
                .or_else(|_| env::var("AWS_DEFAULT_REGION"))
                .unwrap_or_else(|_| DEFAULT_REGION.to_string()),
            endpoint: env::var("AWS_ENDPOINT_URL").ok(),
            access_key: env::var("AWS_ACCESS_KEY_ID").ok(),
            secret_key: env::var("AWS_SECRET_ACCESS_KEY").ok(),
            path_style: env::var("S3_PATH_STYLE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        }
    }

    /// Point every client at a local emulator with dummy keys
    pub fn for_local(endpoint: impl Into<String>) -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            endpoint: Some(endpoint.into()),
            access_key: Some("test".to_string()),
            secret_key: Some("test".to_string()),
            path_style: true,
        }
    }

    fn static_credentials(&self) -> Option<Credentials> {
        match (&self.access_key, &self.secret_key) {
            (Some(access), Some(secret)) => Some(Credentials::new(
                access,
                secret,
                None,
                None,
                "leakvault-static",
            )),
            _ => None,
        }
    }

    /// Resolve a shared SDK config
    pub async fn load_sdk_config(&self) -> SdkConfig {
        debug!(
            region = %self.region,
            endpoint = ?self.endpoint,
            static_keys = self.access_key.is_some(),
            "Loading AWS configuration"
        );

        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(self.region.clone()));

        if let Some(endpoint) = &self.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        if let Some(credentials) = self.static_credentials() {
            loader = loader.credentials_provider(credentials);
        }

        loader.load().await
    }

    pub async fn s3_client(&self) -> aws_sdk_s3::Client {
        let sdk_config = self.load_sdk_config().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(self.path_style)
            .build();
        aws_sdk_s3::Client::from_conf(s3_config)
    }

    pub async fn dynamodb_client(&self) -> aws_sdk_dynamodb::Client {
        aws_sdk_dynamodb::Client::new(&self.load_sdk_config().await)
    }
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            access_key: None,
            secret_key: None,
            path_style: false,
        }
    }
}
