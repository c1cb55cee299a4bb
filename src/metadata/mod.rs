//! Instance metadata sources
//!
//! A source hands out a session token and answers plaintext reads for a
//! fixed set of keys. [`fetch_metadata`] turns three reads into an
//! [`InstanceMetadata`] according to a [`FetchPolicy`].

pub mod imds;
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{InstanceMetadata, ProvisionError};

/// Facts read from the metadata service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataKey {
    InstanceId,
    PrivateIpv4,
    AvailabilityZone,
}

impl MetadataKey {
    /// Path below `/latest/meta-data/`
    pub fn path(&self) -> &'static str {
        match self {
            Self::InstanceId => "instance-id",
            Self::PrivateIpv4 => "local-ipv4",
            Self::AvailabilityZone => "placement/availability-zone",
        }
    }
}

impl std::fmt::Display for MetadataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// What a failed token request or read turns into
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchPolicy {
    /// Log a warning and substitute an empty value
    #[default]
    Empty,
    /// Abort with an error
    Fail,
}

/// Trait for instance metadata services
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Name of this source (e.g., "IMDSv2")
    fn name(&self) -> &'static str;

    /// Acquire a short-lived session token
    async fn session_token(&self) -> Result<String, ProvisionError>;

    /// Read a single fact, authenticated with `token` when present
    async fn get(&self, token: Option<&str>, key: MetadataKey) -> Result<String, ProvisionError>;
}

/// Fetch the instance identity facts with one token and three reads
pub async fn fetch_metadata(
    source: &dyn MetadataSource,
    policy: FetchPolicy,
) -> Result<InstanceMetadata, ProvisionError> {
    debug!("Fetching instance metadata from {}", source.name());

    let token = match source.session_token().await {
        Ok(token) => Some(token),
        Err(e) if policy == FetchPolicy::Empty => {
            warn!("Could not acquire metadata token, reading without one: {}", e);
            None
        }
        Err(e) => return Err(e),
    };

    let mut metadata = InstanceMetadata::default();
    for key in [
        MetadataKey::InstanceId,
        MetadataKey::PrivateIpv4,
        MetadataKey::AvailabilityZone,
    ] {
        let value = match source.get(token.as_deref(), key).await {
            Ok(value) => value.trim().to_string(),
            Err(e) if policy == FetchPolicy::Empty => {
                warn!("Metadata read for {} failed, leaving it empty: {}", key, e);
                String::new()
            }
            Err(e) => return Err(e),
        };
        metadata.set(key, value);
    }

    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::mock::MockMetadataSource;
    use super::*;

    #[tokio::test]
    async fn test_fetch_all_facts() {
        let source = MockMetadataSource::new()
            .with_value(MetadataKey::InstanceId, "i-0abc\n")
            .with_value(MetadataKey::PrivateIpv4, "10.0.1.15")
            .with_value(MetadataKey::AvailabilityZone, "us-east-1a");

        let metadata = fetch_metadata(&source, FetchPolicy::Fail).await.unwrap();
        assert_eq!(metadata.instance_id, "i-0abc");
        assert_eq!(metadata.private_ipv4, "10.0.1.15");
        assert_eq!(metadata.availability_zone, "us-east-1a");
    }

    #[tokio::test]
    async fn test_empty_policy_substitutes_empty_value() {
        let source = MockMetadataSource::new()
            .with_value(MetadataKey::InstanceId, "i-0abc")
            .with_value(MetadataKey::AvailabilityZone, "us-east-1a");

        let metadata = fetch_metadata(&source, FetchPolicy::Empty).await.unwrap();
        assert_eq!(metadata.instance_id, "i-0abc");
        assert_eq!(metadata.private_ipv4, "");
    }

    #[tokio::test]
    async fn test_fail_policy_surfaces_missing_value() {
        let source = MockMetadataSource::new().with_value(MetadataKey::InstanceId, "i-0abc");
        assert!(fetch_metadata(&source, FetchPolicy::Fail).await.is_err());
    }

    #[tokio::test]
    async fn test_token_failure_is_tolerated_under_empty_policy() {
        let source = MockMetadataSource::new()
            .with_token_error("connection refused")
            .with_value(MetadataKey::InstanceId, "i-0abc");

        let metadata = fetch_metadata(&source, FetchPolicy::Empty).await.unwrap();
        assert_eq!(metadata.instance_id, "i-0abc");
        assert_eq!(source.tokens_seen(), vec![None, None, None]);

        assert!(fetch_metadata(&source, FetchPolicy::Fail).await.is_err());
    }

    #[tokio::test]
    async fn test_single_token_for_all_reads() {
        let source = MockMetadataSource::new().with_token("tok-1");
        fetch_metadata(&source, FetchPolicy::Empty).await.unwrap();

        assert_eq!(source.token_requests(), 1);
        assert_eq!(source.tokens_seen(), vec![Some("tok-1".to_string()); 3]);
    }

    #[test]
    fn test_key_paths() {
        assert_eq!(MetadataKey::InstanceId.path(), "instance-id");
        assert_eq!(MetadataKey::PrivateIpv4.path(), "local-ipv4");
        assert_eq!(
            MetadataKey::AvailabilityZone.to_string(),
            "placement/availability-zone"
        );
    }
}
