//! Template context building

use minijinja::{Value, context};
use std::path::Path;

use crate::InstanceMetadata;
use crate::config::DatabaseSettings;

/// Context for the status page
pub fn status_page_context(metadata: &InstanceMetadata, generated_at: &str) -> Value {
    context! {
        instance_id => metadata.instance_id,
        private_ipv4 => metadata.private_ipv4,
        availability_zone => metadata.availability_zone,
        generated_at => generated_at,
    }
}

/// Context for `wp-config.php`
///
/// `salts` is embedded verbatim.
pub fn wp_config_context(
    db: &DatabaseSettings,
    salts: &str,
    table_prefix: &str,
    url_scheme: &str,
) -> Value {
    context! {
        db => Value::from_serialize(db),
        salts => salts,
        table_prefix => table_prefix,
        url_scheme => url_scheme,
    }
}

/// Context for the Apache to PHP-FPM proxy fragment
pub fn fpm_proxy_context(socket: &Path) -> Value {
    context! {
        socket => socket.display().to_string(),
    }
}
