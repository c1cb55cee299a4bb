//! Status page component
//!
//! Responsibilities:
//! - Install the web server
//! - Fetch instance identity facts from the metadata service
//! - Render them into the status page in the document root
//! - Enable and start the web service

use chrono::Utc;
use tracing::info;

use crate::config::BootstrapConfig;
use crate::exec::CommandRunner;
use crate::metadata::{MetadataSource, fetch_metadata};
use crate::modules::packages::{self, PackageManager};
use crate::modules::services;
use crate::modules::write_files::write_file;
use crate::steps::{RunReport, StepRunner};
use crate::template::{STATUS_PAGE, Templates, status_page_context};
use crate::{InstanceMetadata, ProvisionError};

pub const COMPONENT: &str = "status-page";

/// Timestamp format shown on the page
const GENERATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Metadata page generator
pub struct StatusPage<'a> {
    config: &'a BootstrapConfig,
    runner: &'a dyn CommandRunner,
    source: &'a dyn MetadataSource,
    templates: Templates,
}

impl<'a> StatusPage<'a> {
    pub fn new(
        config: &'a BootstrapConfig,
        runner: &'a dyn CommandRunner,
        source: &'a dyn MetadataSource,
    ) -> Result<Self, ProvisionError> {
        Ok(Self {
            config,
            runner,
            source,
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
        let config = self.config;
        let runner = self.runner;

        steps
            .fatal("install_packages", async {
                let pm = PackageManager::resolve(config.package_manager, runner).await?;
                packages::update_package_cache(runner, pm).await?;
                packages::install_packages(runner, pm, &config.status_page.packages).await
            })
            .await?;

        let mut metadata = InstanceMetadata::default();
        steps
            .fatal("fetch_metadata", async {
                metadata = fetch_metadata(self.source, config.metadata.on_failure).await?;
                Ok(())
            })
            .await?;

        steps
            .fatal("write_status_page", async {
                let generated_at = Utc::now().format(GENERATED_AT_FORMAT).to_string();
                let page = self
                    .templates
                    .render(STATUS_PAGE, status_page_context(&metadata, &generated_at))?;
                write_file(&config.status_page_path(), &page, 0o644).await
            })
            .await?;

        steps
            .fatal(
                "enable_web_service",
                services::enable_now(runner, &config.web.service),
            )
            .await?;

        let instance = if metadata.instance_id.is_empty() {
            "<unknown instance>"
        } else {
            &metadata.instance_id
        };
        info!(
            "Status page for {} written to {}",
            instance,
            config.status_page_path().display()
        );
        Ok(())
    }
}
