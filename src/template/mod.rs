//! Jinja2-compatible template rendering
//!
//! Every generated file comes from a template embedded at build time.
//! Undefined variables are errors, so a rendered file never carries an
//! unresolved placeholder.

pub mod context;

pub use context::{fpm_proxy_context, status_page_context, wp_config_context};

use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;
use tracing::debug;

use crate::ProvisionError;

pub const STATUS_PAGE: &str = "status_page.html";
pub const WP_CONFIG: &str = "wp-config.php";
pub const FPM_PROXY: &str = "php-fpm-proxy.conf";

/// Static Apache fragment with compression and cache-header rules
pub const PERFORMANCE_CONF: &str = include_str!("files/performance.conf");

/// Diagnostic script used by the smoke test
pub const INFO_PHP: &str = include_str!("files/info.php");

/// Escape a value for a single-quoted PHP string literal
pub fn php_str(value: String) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Environment holding the embedded templates
pub struct Templates {
    env: Environment<'static>,
}

impl Templates {
    pub fn new() -> Result<Self, ProvisionError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);
        env.add_filter("php_str", php_str);

        env.add_template(STATUS_PAGE, include_str!("files/status_page.html"))?;
        env.add_template(WP_CONFIG, include_str!("files/wp-config.php"))?;
        env.add_template(FPM_PROXY, include_str!("files/php-fpm-proxy.conf"))?;

        Ok(Self { env })
    }

    /// Render the named template with `ctx`
    pub fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<String, ProvisionError> {
        debug!("Rendering template {}", name);
        let tmpl = self.env.get_template(name)?;
        Ok(tmpl.render(ctx)?)
    }
}
