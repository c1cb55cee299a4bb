//! WordPress configuration file generation

use reqwest::Client;
use std::path::Path;
use tracing::{debug, info};

use super::write_files::write_file;
use crate::ProvisionError;
use crate::config::WordPressSettings;
use crate::template::{Templates, WP_CONFIG, wp_config_context};

/// Mode of the generated file; it carries database credentials
pub const WP_CONFIG_MODE: u32 = 0o640;

/// Fetch a fresh block of `define(...)` secret key lines
///
/// The body is embedded verbatim, so an empty one is treated as a failure.
pub async fn fetch_salts(client: &Client, url: &str) -> Result<String, ProvisionError> {
    debug!("Fetching secret keys from {}", url);

    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(ProvisionError::Http(format!(
            "GET {} returned {}",
            url,
            response.status()
        )));
    }

    let body = response.text().await?;
    if !body.contains("define(") {
        return Err(ProvisionError::InvalidData(format!(
            "secret key response from {url} contains no define() lines"
        )));
    }
    Ok(body)
}

/// Render `wp-config.php` content
pub fn render_wp_config(
    templates: &Templates,
    settings: &WordPressSettings,
    salts: &str,
) -> Result<String, ProvisionError> {
    templates.render(
        WP_CONFIG,
        wp_config_context(
            &settings.database,
            salts.trim_end(),
            &settings.table_prefix,
            &settings.url_scheme,
        ),
    )
}

/// Fetch secret keys, render and write `wp-config.php` into `document_root`
pub async fn generate(
    client: &Client,
    templates: &Templates,
    settings: &WordPressSettings,
    document_root: &Path,
) -> Result<(), ProvisionError> {
    let salts = fetch_salts(client, &settings.salt_url).await?;
    let content = render_wp_config(templates, settings, &salts)?;

    let path = document_root.join(WP_CONFIG);
    write_file(&path, &content, WP_CONFIG_MODE).await?;
    info!(
        "Generated {} for database {} on {}",
        path.display(),
        settings.database.name,
        settings.database.host
    );
    Ok(())
}
