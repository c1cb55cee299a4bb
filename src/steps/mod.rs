//! Step runner
//!
//! Provisioning routines are linear sequences of steps. Each step declares
//! whether its failure stops the run ([`FailurePolicy::Fatal`]) or is logged
//! and skipped over ([`FailurePolicy::LogAndContinue`]). Outcomes are kept
//! for the run report.

pub mod report;

pub use report::RunReport;

use serde::Serialize;
use std::future::Future;
use std::time::Instant;
use tracing::{info, warn};

use crate::ProvisionError;

/// How a step failure is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop the run
    Fatal,
    /// Log a warning and carry on with the next step
    LogAndContinue,
}

/// Outcome of one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    Succeeded,
    Failed,
    /// Failed under [`FailurePolicy::LogAndContinue`]
    Suppressed,
}

/// Record of one executed step
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub name: String,
    pub policy: FailurePolicy,
    pub status: StepStatus,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

/// Runs steps in order and records their outcomes
#[derive(Debug)]
pub struct StepRunner {
    component: String,
    records: Vec<StepRecord>,
}

impl StepRunner {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            records: Vec::new(),
        }
    }

    /// Run one step under `policy`
    ///
    /// Returns an error only for a failed fatal step.
    pub async fn run<F>(
        &mut self,
        name: &str,
        policy: FailurePolicy,
        step: F,
    ) -> Result<(), ProvisionError>
    where
        F: Future<Output = Result<(), ProvisionError>>,
    {
        info!("[{}] {}", self.component, name);
        let started = Instant::now();
        let result = step.await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let (status, error, outcome) = match result {
            Ok(()) => (StepStatus::Succeeded, None, Ok(())),
            Err(e) if policy == FailurePolicy::LogAndContinue => {
                warn!("[{}] {} failed, continuing: {}", self.component, name, e);
                (StepStatus::Suppressed, Some(e.to_string()), Ok(()))
            }
            Err(e) => (
                StepStatus::Failed,
                Some(e.to_string()),
                Err(ProvisionError::step(name, e)),
            ),
        };

        self.records.push(StepRecord {
            name: name.to_string(),
            policy,
            status,
            error,
            elapsed_ms,
        });
        outcome
    }

    /// Run a step whose failure stops the run
    pub async fn fatal<F>(&mut self, name: &str, step: F) -> Result<(), ProvisionError>
    where
        F: Future<Output = Result<(), ProvisionError>>,
    {
        self.run(name, FailurePolicy::Fatal, step).await
    }

    /// Run a step whose failure is only logged
    pub async fn guarded<F>(&mut self, name: &str, step: F)
    where
        F: Future<Output = Result<(), ProvisionError>>,
    {
        // LogAndContinue never yields an error
        let _ = self.run(name, FailurePolicy::LogAndContinue, step).await;
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    /// Names of the steps that ran, in order
    pub fn executed(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn ok() -> Result<(), ProvisionError> {
        Ok(())
    }

    async fn fail(msg: &str) -> Result<(), ProvisionError> {
        Err(ProvisionError::Command(msg.to_string()))
    }

    #[tokio::test]
    async fn test_fatal_failure_stops_sequence() {
        let mut runner = StepRunner::new("test");

        let result = async {
            runner.fatal("first", ok()).await?;
            runner.fatal("second", fail("boom")).await?;
            runner.fatal("third", ok()).await?;
            Ok::<(), ProvisionError>(())
        }
        .await;

        let err = result.unwrap_err();
        assert!(matches!(err, ProvisionError::Step { ref step, .. } if step == "second"));
        assert_eq!(runner.executed(), vec!["first", "second"]);
        assert_eq!(runner.records()[1].status, StepStatus::Failed);
    }

    #[tokio::test]
    async fn test_guarded_failure_continues() {
        let mut runner = StepRunner::new("test");

        runner.guarded("start", fail("unit not found")).await;
        runner.fatal("next", ok()).await.unwrap();

        assert_eq!(runner.executed(), vec!["start", "next"]);
        let record = &runner.records()[0];
        assert_eq!(record.status, StepStatus::Suppressed);
        assert_eq!(record.policy, FailurePolicy::LogAndContinue);
        assert!(record.error.as_deref().unwrap().contains("unit not found"));
    }

    #[tokio::test]
    async fn test_success_has_no_error() {
        let mut runner = StepRunner::new("test");
        runner.run("only", FailurePolicy::Fatal, ok()).await.unwrap();

        let record = &runner.records()[0];
        assert_eq!(record.status, StepStatus::Succeeded);
        assert!(record.error.is_none());
    }
}
