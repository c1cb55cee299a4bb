//! Mock metadata source for testing
//!
//! # Example
//! ```
//! use ec2_bootstrap::metadata::{MetadataKey, mock::MockMetadataSource};
//!
//! let mock = MockMetadataSource::new()
//!     .with_token("token")
//!     .with_value(MetadataKey::InstanceId, "i-1234567890abcdef0");
//! ```

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use super::{MetadataKey, MetadataSource};
use crate::ProvisionError;

/// Configurable in-memory metadata source
pub struct MockMetadataSource {
    token: Result<String, String>,
    values: HashMap<MetadataKey, String>,
    token_requests: Mutex<usize>,
    tokens_seen: Mutex<Vec<Option<String>>>,
}

impl MockMetadataSource {
    /// Source with a fixed token and no values
    pub fn new() -> Self {
        Self {
            token: Ok("mock-token".to_string()),
            values: HashMap::new(),
            token_requests: Mutex::new(0),
            tokens_seen: Mutex::new(Vec::new()),
        }
    }

    /// Set the token handed out
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Ok(token.to_string());
        self
    }

    /// Make token requests fail
    pub fn with_token_error(mut self, error: &str) -> Self {
        self.token = Err(error.to_string());
        self
    }

    /// Answer `key` with `value`; unset keys fail
    pub fn with_value(mut self, key: MetadataKey, value: &str) -> Self {
        self.values.insert(key, value.to_string());
        self
    }

    /// Number of token requests made
    pub fn token_requests(&self) -> usize {
        self.token_requests.lock().map(|n| *n).unwrap_or_default()
    }

    /// Token passed with each read, in order
    pub fn tokens_seen(&self) -> Vec<Option<String>> {
        self.tokens_seen
            .lock()
            .map(|seen| seen.clone())
            .unwrap_or_default()
    }
}

impl Default for MockMetadataSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataSource for MockMetadataSource {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn session_token(&self) -> Result<String, ProvisionError> {
        if let Ok(mut n) = self.token_requests.lock() {
            *n += 1;
        }
        self.token.clone().map_err(ProvisionError::Metadata)
    }

    async fn get(&self, token: Option<&str>, key: MetadataKey) -> Result<String, ProvisionError> {
        if let Ok(mut seen) = self.tokens_seen.lock() {
            seen.push(token.map(str::to_string));
        }
        self.values
            .get(&key)
            .cloned()
            .ok_or_else(|| ProvisionError::Metadata(format!("no mock value for {key}")))
    }
}
