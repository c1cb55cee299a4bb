//! Provisioning configuration
//!
//! Everything the provisioning routines would otherwise read from ambient
//! process state (package lists, paths, endpoints, service names, database
//! parameters) lives in [`BootstrapConfig`] and is passed explicitly.

pub mod loader;
pub mod merge;

pub use loader::{ConfigLoader, DEFAULT_CONFIG_D, DEFAULT_CONFIG_FILE};

use crate::ProvisionError;
use crate::metadata::FetchPolicy;
use crate::modules::packages::PackageManager;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Force a package manager instead of detecting one
    pub package_manager: Option<PackageManager>,

    /// Directory receiving `<component>.json` run reports
    pub report_dir: PathBuf,

    pub metadata: MetadataSettings,
    pub web: WebSettings,
    pub php: PhpSettings,
    pub wordpress: WordPressSettings,
    pub status_page: StatusPageSettings,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            package_manager: None,
            report_dir: PathBuf::from("/run/ec2-bootstrap"),
            metadata: MetadataSettings::default(),
            web: WebSettings::default(),
            php: PhpSettings::default(),
            wordpress: WordPressSettings::default(),
            status_page: StatusPageSettings::default(),
        }
    }
}

/// Instance metadata service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataSettings {
    pub endpoint: String,
    pub token_ttl_seconds: u32,
    pub timeout_secs: u64,
    /// What a failed fetch turns into
    pub on_failure: FetchPolicy,
}

impl Default for MetadataSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://169.254.169.254".to_string(),
            token_ttl_seconds: 21600,
            timeout_secs: 5,
            on_failure: FetchPolicy::Empty,
        }
    }
}

/// Apache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSettings {
    pub service: String,
    pub document_root: PathBuf,
    pub config_dir: PathBuf,
    pub log_dir: PathBuf,
    /// Error log file name inside `log_dir`
    pub error_log: String,
    /// Service account owning the document root
    pub user: String,
    pub group: String,
    /// SELinux type applied to the document root
    pub selinux_type: String,
}

impl Default for WebSettings {
    fn default() -> Self {
        Self {
            service: "httpd".to_string(),
            document_root: PathBuf::from("/var/www/html"),
            config_dir: PathBuf::from("/etc/httpd/conf.d"),
            log_dir: PathBuf::from("/var/log/httpd"),
            error_log: "error_log".to_string(),
            user: "apache".to_string(),
            group: "apache".to_string(),
            selinux_type: "httpd_sys_rw_content_t".to_string(),
        }
    }
}

impl WebSettings {
    /// `user:group` as accepted by chown
    pub fn owner_spec(&self) -> String {
        format!("{}:{}", self.user, self.group)
    }
}

/// PHP and PHP-FPM settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhpSettings {
    /// Full runtime package list (web server, PHP, FPM, extensions)
    pub packages: Vec<String>,
    /// Package that must be present after install, retried once otherwise
    pub fpm_package: String,
    pub fpm_service: String,
    pub pool_config: PathBuf,
    /// Section name of the pool inside `pool_config`
    pub pool_section: String,
    pub socket: PathBuf,
    pub log_dir: PathBuf,
    pub error_log: String,
}

impl Default for PhpSettings {
    fn default() -> Self {
        Self {
            packages: [
                "httpd",
                "php",
                "php-fpm",
                "php-mysqlnd",
                "php-gd",
                "php-mbstring",
                "php-xml",
                "php-intl",
                "php-zip",
                "php-opcache",
            ]
            .iter()
            .map(|p| p.to_string())
            .collect(),
            fpm_package: "php-fpm".to_string(),
            fpm_service: "php-fpm".to_string(),
            pool_config: PathBuf::from("/etc/php-fpm.d/www.conf"),
            pool_section: "www".to_string(),
            socket: PathBuf::from("/run/php-fpm/www.sock"),
            log_dir: PathBuf::from("/var/log/php-fpm"),
            error_log: "error.log".to_string(),
        }
    }
}

/// WordPress settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WordPressSettings {
    pub archive_url: String,
    /// Top-level directory inside the archive, stripped on extraction
    pub archive_root: String,
    pub salt_url: String,
    pub table_prefix: String,
    /// Scheme prefixed to the request host for WP_HOME and WP_SITEURL
    pub url_scheme: String,
    pub database: DatabaseSettings,
    /// Scratch directory for the downloaded archive
    pub staging_dir: PathBuf,
    /// Base URL the smoke test fetches `info.php` from
    pub smoke_test_url: String,
    pub http_timeout_secs: u64,
}

impl Default for WordPressSettings {
    fn default() -> Self {
        Self {
            archive_url: "https://wordpress.org/latest.tar.gz".to_string(),
            archive_root: "wordpress".to_string(),
            salt_url: "https://api.wordpress.org/secret-key/1.1/salt/".to_string(),
            table_prefix: "wp_".to_string(),
            url_scheme: "http".to_string(),
            database: DatabaseSettings::default(),
            staging_dir: PathBuf::from("/tmp/ec2-bootstrap"),
            smoke_test_url: "http://localhost".to_string(),
            http_timeout_secs: 60,
        }
    }
}

/// Database connection parameters embedded into `wp-config.php`
///
/// The defaults are placeholders. Override them here and nowhere else.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub name: String,
    pub user: String,
    pub password: String,
    pub host: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            name: "wordpress".to_string(),
            user: "admin".to_string(),
            password: "your-db-password".to_string(),
            host: "your-rds-endpoint.rds.amazonaws.com".to_string(),
        }
    }
}

impl std::fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .finish()
    }
}

/// Status page settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusPageSettings {
    pub packages: Vec<String>,
    /// File name inside the web document root
    pub file_name: String,
}

impl Default for StatusPageSettings {
    fn default() -> Self {
        Self {
            packages: vec!["httpd".to_string()],
            file_name: "index.html".to_string(),
        }
    }
}

impl BootstrapConfig {
    /// Parse configuration from a YAML string, filling gaps with defaults
    pub fn from_yaml(yaml: &str) -> Result<Self, ProvisionError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would produce a broken install
    pub fn validate(&self) -> Result<(), ProvisionError> {
        let prefix = &self.wordpress.table_prefix;
        if prefix.is_empty() || !prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ProvisionError::Config(format!(
                "table_prefix must be non-empty and contain only [A-Za-z0-9_], got '{prefix}'"
            )));
        }

        if !matches!(self.wordpress.url_scheme.as_str(), "http" | "https") {
            return Err(ProvisionError::Config(format!(
                "url_scheme must be http or https, got '{}'",
                self.wordpress.url_scheme
            )));
        }

        if !self.web.document_root.is_absolute() {
            return Err(ProvisionError::Config(format!(
                "document_root must be absolute: {}",
                self.web.document_root.display()
            )));
        }

        if self.php.packages.is_empty() {
            return Err(ProvisionError::Config("php.packages is empty".to_string()));
        }

        Ok(())
    }

    /// Path of the generated status page
    pub fn status_page_path(&self) -> PathBuf {
        self.web.document_root.join(&self.status_page.file_name)
    }
}
