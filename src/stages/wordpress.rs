//! WordPress component
//!
//! Installs Apache, PHP and PHP-FPM, unpacks WordPress into the document
//! root and wires everything together. Every step is fatal except starting
//! the two services and reading their error logs, which are logged and
//! skipped over on failure. Nothing is rolled back; a failed run leaves the
//! host as the completed steps left it.

use chrono::Utc;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::ProvisionError;
use crate::config::BootstrapConfig;
use crate::exec::CommandRunner;
use crate::modules::packages::{self, PackageManager};
use crate::modules::write_files::{set_ownership, set_permissions_recursive, write_file};
use crate::modules::{archive, diagnostics, fpm_pool, selinux, services, wp_config};
use crate::steps::{RunReport, StepRunner};
use crate::template::{FPM_PROXY, PERFORMANCE_CONF, Templates, WP_CONFIG, fpm_proxy_context};

pub const COMPONENT: &str = "wordpress";

/// rwxr-xr-x for everything under the document root
pub const DOCROOT_MODE: u32 = 0o755;

/// File name of the compression and caching fragment
pub const PERFORMANCE_FILE: &str = "performance.conf";

/// Application provisioner
pub struct WordPress<'a> {
    config: &'a BootstrapConfig,
    runner: &'a dyn CommandRunner,
    client: Client,
    templates: Templates,
}

impl<'a> WordPress<'a> {
    pub fn new(
        config: &'a BootstrapConfig,
        runner: &'a dyn CommandRunner,
    ) -> Result<Self, ProvisionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.wordpress.http_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            config,
            runner,
            client,
            templates: Templates::new()?,
        })
    }

    /// Run all steps and write the run report
    pub async fn run(&self) -> Result<RunReport, ProvisionError> {
        let started_at = Utc::now();
        let mut steps = StepRunner::new(COMPONENT);

        let result = self.run_steps(&mut steps).await;

        let report = RunReport::from_run(&steps, started_at, &result);
        report.write_best_effort(&self.config.report_dir).await;
        result.map(|()| report)
    }

    async fn run_steps(&self, steps: &mut StepRunner) -> Result<(), ProvisionError> {
        let runner = self.runner;
        let web = &self.config.web;
        let php = &self.config.php;
        let wp = &self.config.wordpress;
        let docroot = web.document_root.as_path();
        let owner = web.owner_spec();

        steps
            .fatal("install_packages", async {
                let pm = PackageManager::resolve(self.config.package_manager, runner).await?;
                packages::update_package_cache(runner, pm).await?;
                packages::install_with_retry(runner, pm, &php.packages, &php.fpm_package).await
            })
            .await?;

        steps
            .guarded("start_web_service", services::start_and_enable(runner, &web.service))
            .await;
        steps
            .guarded("start_fpm_service", services::start_and_enable(runner, &php.fpm_service))
            .await;

        steps
            .fatal("write_fpm_proxy_conf", async {
                let content = self.templates.render(FPM_PROXY, fpm_proxy_context(&php.socket))?;
                write_file(&web.config_dir.join(FPM_PROXY), &content, 0o644).await
            })
            .await?;

        steps
            .fatal("install_application", async {
                archive::install_archive(
                    &self.client,
                    &wp.archive_url,
                    &wp.staging_dir,
                    docroot,
                    &wp.archive_root,
                )
                .await?;
                Ok(())
            })
            .await?;

        steps
            .fatal("apply_ownership", async {
                set_ownership(runner, docroot, &owner, true).await?;
                set_permissions_recursive(docroot, DOCROOT_MODE).await?;
                Ok(())
            })
            .await?;

        steps
            .fatal("apply_security_label", async {
                selinux::relabel(runner, docroot, &web.selinux_type).await?;
                Ok(())
            })
            .await?;

        steps
            .fatal(
                "generate_app_config",
                wp_config::generate(&self.client, &self.templates, wp, docroot),
            )
            .await?;

        steps
            .fatal(
                "secure_app_config",
                set_ownership(runner, &docroot.join(WP_CONFIG), &owner, false),
            )
            .await?;

        steps
            .fatal(
                "write_performance_conf",
                write_file(&web.config_dir.join(PERFORMANCE_FILE), PERFORMANCE_CONF, 0o644),
            )
            .await?;

        steps
            .fatal("patch_fpm_pool", async {
                fpm_pool::patch_pool_file(
                    &php.pool_config,
                    &php.pool_section,
                    &web.user,
                    &web.group,
                )
                .await?;
                Ok(())
            })
            .await?;

        steps
            .fatal("restart_services", async {
                let names = [web.service.as_str(), php.fpm_service.as_str()];
                for service in names {
                    services::restart(runner, service).await?;
                }
                for service in names {
                    info!("Status of {}:", service);
                    for line in services::status(runner, service).await?.lines() {
                        info!("  {}", line);
                    }
                }
                Ok(())
            })
            .await?;

        steps
            .guarded(
                "diagnostics_web",
                diagnostics::report_error_log(
                    &web.service,
                    &web.log_dir.join(&web.error_log),
                    search_dir(&web.log_dir),
                ),
            )
            .await;
        steps
            .guarded(
                "diagnostics_fpm",
                diagnostics::report_error_log(
                    &php.fpm_service,
                    &php.log_dir.join(&php.error_log),
                    search_dir(&php.log_dir),
                ),
            )
            .await;

        steps
            .fatal("smoke_test", async {
                diagnostics::smoke_test(&self.client, &wp.smoke_test_url, docroot).await?;
                Ok(())
            })
            .await?;

        steps
            .fatal("summary", async {
                println!("{}", self.summary());
                Ok(())
            })
            .await?;

        Ok(())
    }

    /// Completion message shown at the end of a successful run
    pub fn summary(&self) -> String {
        let db = &self.config.wordpress.database;
        format!(
            "WordPress installation complete\n\
             \x20 Document root: {}\n\
             \x20 Database name: {}\n\
             \x20 Database host: {}\n\
             \x20 Open {}://<load balancer or instance address>/ to finish the setup wizard",
            self.config.web.document_root.display(),
            db.name,
            db.host,
            self.config.wordpress.url_scheme,
        )
    }
}

/// Directory searched for related logs when a service's error log is missing
fn search_dir(log_dir: &Path) -> &Path {
    log_dir.parent().unwrap_or(log_dir)
}
