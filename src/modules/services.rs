//! Service management via systemctl

use tracing::info;

use crate::ProvisionError;
use crate::exec::{CommandRunner, run_checked};

/// Start a service and enable it at boot
///
/// The service is enabled even when starting it fails, so a later restart
/// still leaves it enabled. The first error is returned.
pub async fn start_and_enable(
    runner: &dyn CommandRunner,
    service: &str,
) -> Result<(), ProvisionError> {
    info!("Starting and enabling {}", service);
    let started = run_checked(runner, "systemctl", &["start", service]).await;
    let enabled = run_checked(runner, "systemctl", &["enable", service]).await;
    started.and(enabled).map(|_| ())
}

/// Enable a service at boot and start it now
pub async fn enable_now(runner: &dyn CommandRunner, service: &str) -> Result<(), ProvisionError> {
    info!("Enabling {}", service);
    run_checked(runner, "systemctl", &["enable", "--now", service]).await?;
    Ok(())
}

/// Restart a service
pub async fn restart(runner: &dyn CommandRunner, service: &str) -> Result<(), ProvisionError> {
    info!("Restarting {}", service);
    run_checked(runner, "systemctl", &["restart", service]).await?;
    Ok(())
}

/// Human-readable status of a service
///
/// `systemctl status` exits non-zero for inactive units; the text is
/// returned either way.
pub async fn status(runner: &dyn CommandRunner, service: &str) -> Result<String, ProvisionError> {
    let output = runner
        .run("systemctl", &["status", "--no-pager", service])
        .await?;
    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{CommandOutput, RecordingRunner};

    #[tokio::test]
    async fn test_start_and_enable() {
        let runner = RecordingRunner::new();
        start_and_enable(&runner, "php-fpm").await.unwrap();
        assert_eq!(
            runner.calls(),
            vec!["systemctl start php-fpm", "systemctl enable php-fpm"]
        );
    }

    #[tokio::test]
    async fn test_start_failure_still_enables() {
        let runner = RecordingRunner::new().with_response(
            "systemctl start",
            CommandOutput::failed(5, "Unit php-fpm.service not found."),
        );
        let err = start_and_enable(&runner, "php-fpm").await.unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert_eq!(
            runner.calls(),
            vec!["systemctl start php-fpm", "systemctl enable php-fpm"]
        );
    }

    #[tokio::test]
    async fn test_enable_failure_is_reported() {
        let runner = RecordingRunner::new()
            .with_response("systemctl enable", CommandOutput::failed(1, "read-only"));
        let err = start_and_enable(&runner, "httpd").await.unwrap_err();
        assert!(err.to_string().contains("read-only"));
    }

    #[tokio::test]
    async fn test_status_of_inactive_unit_is_text() {
        let runner = RecordingRunner::new().with_response(
            "systemctl status",
            CommandOutput {
                code: Some(3),
                stdout: "Active: inactive (dead)".to_string(),
                stderr: String::new(),
            },
        );
        let text = status(&runner, "httpd").await.unwrap();
        assert!(text.contains("inactive"));
    }
}
