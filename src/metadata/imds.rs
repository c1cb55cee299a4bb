//! EC2 Instance Metadata Service (IMDSv2)
//!
//! A `PUT /latest/api/token` with a TTL header yields a session token that
//! authenticates the subsequent `GET /latest/meta-data/<path>` reads.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::{MetadataKey, MetadataSource};
use crate::ProvisionError;
use crate::config::MetadataSettings;

/// EC2 metadata service base URL (link-local address)
pub const IMDS_BASE_URL: &str = "http://169.254.169.254";

const TOKEN_TTL_HEADER: &str = "X-aws-ec2-metadata-token-ttl-seconds";
const TOKEN_HEADER: &str = "X-aws-ec2-metadata-token";

/// IMDSv2 client
pub struct Imds {
    client: Client,
    base_url: String,
    token_ttl_seconds: u32,
}

impl Imds {
    /// Build a client from configuration
    pub fn new(settings: &MetadataSettings) -> Result<Self, ProvisionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(2))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.endpoint.trim_end_matches('/').to_string(),
            token_ttl_seconds: settings.token_ttl_seconds,
        })
    }

    /// Create with a custom base URL (for testing)
    pub fn with_base_url(base_url: &str) -> Result<Self, ProvisionError> {
        Self::new(&MetadataSettings {
            endpoint: base_url.to_string(),
            ..MetadataSettings::default()
        })
    }
}

#[async_trait]
impl MetadataSource for Imds {
    fn name(&self) -> &'static str {
        "IMDSv2"
    }

    async fn session_token(&self) -> Result<String, ProvisionError> {
        let url = format!("{}/latest/api/token", self.base_url);
        debug!("Requesting IMDSv2 token (ttl {}s)", self.token_ttl_seconds);

        let response = self
            .client
            .put(&url)
            .header(TOKEN_TTL_HEADER, self.token_ttl_seconds.to_string())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProvisionError::Metadata(format!(
                "token request failed: {}",
                response.status()
            )));
        }

        Ok(response.text().await?)
    }

    async fn get(&self, token: Option<&str>, key: MetadataKey) -> Result<String, ProvisionError> {
        let url = format!("{}/latest/meta-data/{}", self.base_url, key.path());
        debug!("Fetching metadata: {}", key);

        let mut request = self.client.get(&url);
        if let Some(token) = token {
            request = request.header(TOKEN_HEADER, token);
        }
        let response = request.send().await?;

        if response.status().is_success() {
            Ok(response.text().await?)
        } else {
            Err(ProvisionError::Metadata(format!(
                "failed to fetch {}: {}",
                key,
                response.status()
            )))
        }
    }
}
