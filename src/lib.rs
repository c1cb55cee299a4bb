//! ec2-bootstrap library
//!
//! First-boot provisioning for EC2 instances. Two components are provided:
//! a status page listing the instance's identity facts, and a WordPress
//! stack behind Apache and PHP-FPM.
//!
//! # Design Principles
//!
//! - **Safety First**: No unsafe code (`#![forbid(unsafe_code)]`)
//! - **Explicit failure policy**: every step is either fatal or logged and skipped
//! - **Re-runnable**: configuration edits are idempotent
//! - **Testable**: host commands and the metadata service sit behind traits

pub mod config;
pub mod exec;
pub mod metadata;
pub mod modules;
pub mod stages;
pub mod steps;
pub mod template;

mod error;

pub use error::ProvisionError;

use serde::Serialize;
use tracing::info;

use config::BootstrapConfig;
use exec::HostRunner;
use metadata::MetadataKey;
use metadata::imds::Imds;
use stages::status_page::StatusPage;
use stages::wordpress::WordPress;
use steps::RunReport;

/// Provisioning components
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    /// Metadata status page
    StatusPage,
    /// WordPress on Apache and PHP-FPM
    WordPress,
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Component::StatusPage => write!(f, "{}", stages::status_page::COMPONENT),
            Component::WordPress => write!(f, "{}", stages::wordpress::COMPONENT),
        }
    }
}

/// Run a component against the local host
pub async fn run_component(
    component: Component,
    config: &BootstrapConfig,
) -> Result<RunReport, ProvisionError> {
    info!("Starting component: {}", component);
    let runner = HostRunner;

    let report = match component {
        Component::StatusPage => {
            let imds = Imds::new(&config.metadata)?;
            StatusPage::new(config, &runner, &imds)?.run().await?
        }
        Component::WordPress => WordPress::new(config, &runner)?.run().await?,
    };

    info!("Completed component: {}", component);
    Ok(report)
}

/// Identity facts read from the instance metadata service
///
/// A fact that could not be read is an empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstanceMetadata {
    pub instance_id: String,
    pub private_ipv4: String,
    pub availability_zone: String,
}

impl InstanceMetadata {
    pub fn set(&mut self, key: MetadataKey, value: String) {
        match key {
            MetadataKey::InstanceId => self.instance_id = value,
            MetadataKey::PrivateIpv4 => self.private_ipv4 = value,
            MetadataKey::AvailabilityZone => self.availability_zone = value,
        }
    }

    pub fn get(&self, key: MetadataKey) -> &str {
        match key {
            MetadataKey::InstanceId => &self.instance_id,
            MetadataKey::PrivateIpv4 => &self.private_ipv4,
            MetadataKey::AvailabilityZone => &self.availability_zone,
        }
    }
}
