//! Configuration loader
//!
//! Loads and merges configuration from standard locations.

use super::{BootstrapConfig, merge};
use crate::ProvisionError;
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Main configuration file
pub const DEFAULT_CONFIG_FILE: &str = "/etc/ec2-bootstrap/config.yaml";

/// Drop-in configuration directory
pub const DEFAULT_CONFIG_D: &str = "/etc/ec2-bootstrap/config.d";

/// Configuration loader builder
pub struct ConfigLoader {
    main: PathBuf,
    dropin_dir: Option<PathBuf>,
    /// An explicitly requested file must exist and parse
    required: bool,
}

impl ConfigLoader {
    /// Loader for the standard locations; both are optional
    pub fn new() -> Self {
        Self {
            main: PathBuf::from(DEFAULT_CONFIG_FILE),
            dropin_dir: Some(PathBuf::from(DEFAULT_CONFIG_D)),
            required: false,
        }
    }

    /// Loader for a single explicit file (no drop-ins)
    pub fn from_file(path: impl AsRef<Path>) -> Self {
        Self {
            main: path.as_ref().to_path_buf(),
            dropin_dir: None,
            required: true,
        }
    }

    /// Use a custom main file and drop-in directory (useful for testing)
    pub fn with_dirs(main: impl AsRef<Path>, dropin_dir: impl AsRef<Path>) -> Self {
        Self {
            main: main.as_ref().to_path_buf(),
            dropin_dir: Some(dropin_dir.as_ref().to_path_buf()),
            required: false,
        }
    }

    /// Load, merge over the defaults and validate
    pub async fn load(self) -> Result<BootstrapConfig, ProvisionError> {
        let mut layers = Vec::new();

        match load_layer(&self.main).await? {
            Some(layer) => {
                debug!("Loaded base config from {}", self.main.display());
                layers.push(layer);
            }
            None if self.required => {
                return Err(ProvisionError::Config(format!(
                    "config file not found: {}",
                    self.main.display()
                )));
            }
            None => debug!("No config at {}, using defaults", self.main.display()),
        }

        if let Some(dir) = &self.dropin_dir {
            layers.extend(load_dropin_layers(dir).await?);
        }

        let base = serde_yaml::to_value(BootstrapConfig::default())?;
        let merged = merge::merge_all(base, &layers);
        let config: BootstrapConfig = serde_yaml::from_value(merged)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Read one YAML layer; `None` when the file is absent or empty
async fn load_layer(path: &Path) -> Result<Option<Value>, ProvisionError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path).await?;
    if content.trim().is_empty() {
        return Ok(None);
    }

    let value: Value = serde_yaml::from_str(&content)
        .map_err(|e| ProvisionError::Config(format!("{}: {}", path.display(), e)))?;
    Ok(Some(value))
}

/// Load all drop-in layers from a directory (sorted alphabetically)
async fn load_dropin_layers(dir: &Path) -> Result<Vec<Value>, ProvisionError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    let mut read_dir = fs::read_dir(dir).await?;
    while let Some(entry) = read_dir.next_entry().await? {
        let path = entry.path();
        if path
            .extension()
            .is_some_and(|e| e == "yaml" || e == "yml")
        {
            entries.push(path);
        }
    }
    entries.sort();

    let mut layers = Vec::new();
    for path in entries {
        match load_layer(&path).await {
            Ok(Some(layer)) => {
                debug!("Loaded drop-in config from {}", path.display());
                layers.push(layer);
            }
            Ok(None) => {}
            Err(e) => warn!("Skipping drop-in {}: {}", path.display(), e),
        }
    }

    info!("Loaded {} drop-in configs", layers.len());
    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_files_give_defaults() {
        let temp = TempDir::new().unwrap();
        let config = ConfigLoader::with_dirs(temp.path().join("none.yaml"), temp.path().join("d"))
            .load()
            .await
            .unwrap();
        assert_eq!(config.web.user, "apache");
    }

    #[tokio::test]
    async fn test_explicit_file_must_exist() {
        let result = ConfigLoader::from_file("/nonexistent/ec2-bootstrap.yaml")
            .load()
            .await;
        assert!(matches!(result, Err(ProvisionError::Config(_))));
    }

    #[tokio::test]
    async fn test_dropins_override_in_order() {
        let temp = TempDir::new().unwrap();
        let main = temp.path().join("config.yaml");
        let dir = temp.path().join("config.d");
        fs::create_dir_all(&dir).await.unwrap();

        fs::write(&main, "web:\n  user: apache\n  group: apache\n")
            .await
            .unwrap();
        fs::write(dir.join("00-base.yaml"), "web:\n  user: nginx\n")
            .await
            .unwrap();
        fs::write(dir.join("10-override.yaml"), "web:\n  user: www-data\n")
            .await
            .unwrap();
        // Not a yaml file, ignored
        fs::write(dir.join("notes.txt"), "web: [").await.unwrap();
        // Broken drop-in, skipped
        fs::write(dir.join("20-broken.yaml"), "web: [unclosed")
            .await
            .unwrap();

        let config = ConfigLoader::with_dirs(&main, &dir).load().await.unwrap();
        assert_eq!(config.web.user, "www-data");
        assert_eq!(config.web.group, "apache");
        assert_eq!(config.web.service, "httpd");
    }

    #[tokio::test]
    async fn test_invalid_main_file_is_error() {
        let temp = TempDir::new().unwrap();
        let main = temp.path().join("config.yaml");
        fs::write(&main, "web: [unclosed").await.unwrap();

        assert!(ConfigLoader::from_file(&main).load().await.is_err());
    }

    #[tokio::test]
    async fn test_merged_config_is_validated() {
        let temp = TempDir::new().unwrap();
        let main = temp.path().join("config.yaml");
        fs::write(&main, "wordpress:\n  url_scheme: ftp\n").await.unwrap();

        assert!(ConfigLoader::from_file(&main).load().await.is_err());
    }
}
