//! Run reports
//!
//! One JSON document per component run, written to
//! `<report_dir>/<component>.json` and overwritten on the next run.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{StepRecord, StepRunner};
use crate::ProvisionError;

/// Summary of one component run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub component: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    pub error: Option<String>,
    pub steps: Vec<StepRecord>,
}

impl RunReport {
    /// Build the report for a finished run
    pub fn from_run(
        runner: &StepRunner,
        started_at: DateTime<Utc>,
        result: &Result<(), ProvisionError>,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            component: runner.component().to_string(),
            started_at,
            finished_at: Utc::now(),
            success: result.is_ok(),
            error: result.as_ref().err().map(|e| e.to_string()),
            steps: runner.records().to_vec(),
        }
    }

    /// Path the report is written to inside `dir`
    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(format!("{}.json", self.component))
    }

    /// Write the report as pretty JSON
    pub async fn write(&self, dir: &Path) -> Result<PathBuf, ProvisionError> {
        fs::create_dir_all(dir).await?;
        let path = self.path_in(dir);
        fs::write(&path, serde_json::to_string_pretty(self)?).await?;
        debug!("Wrote run report to {}", path.display());
        Ok(path)
    }

    /// Write the report, logging instead of failing
    pub async fn write_best_effort(&self, dir: &Path) {
        if let Err(e) = self.write(dir).await {
            warn!("Could not write run report to {}: {}", dir.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_report_records_failure() {
        let temp = TempDir::new().unwrap();
        let started = Utc::now();
        let mut runner = StepRunner::new("wordpress");
        runner.fatal("install_packages", async { Ok(()) }).await.unwrap();
        let result = runner
            .fatal("install_application", async {
                Err(ProvisionError::Http("404 Not Found".into()))
            })
            .await;

        let report = RunReport::from_run(&runner, started, &result);
        let path = report.write(temp.path()).await.unwrap();
        assert_eq!(path, temp.path().join("wordpress.json"));

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["component"], "wordpress");
        assert_eq!(json["steps"].as_array().unwrap().len(), 2);
        assert_eq!(json["steps"][1]["status"], "failed");
        assert_eq!(json["steps"][1]["policy"], "fatal");
        assert!(json["error"].as_str().unwrap().contains("install_application"));
    }

    #[tokio::test]
    async fn test_write_best_effort_tolerates_bad_dir() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("file");
        std::fs::write(&blocker, "").unwrap();

        let runner = StepRunner::new("status-page");
        let report = RunReport::from_run(&runner, Utc::now(), &Ok(()));
        // A regular file in place of the directory
        report.write_best_effort(&blocker.join("reports")).await;
    }
}
