//! SELinux file labels

use std::path::Path;
use tracing::info;

use crate::ProvisionError;
use crate::exec::{CommandRunner, run_checked};

/// Whether SELinux is enabled on this host
///
/// A missing `selinuxenabled` binary counts as disabled.
pub async fn is_enabled(runner: &dyn CommandRunner) -> bool {
    runner
        .run("selinuxenabled", &[])
        .await
        .is_ok_and(|o| o.success())
}

/// Recursively apply the SELinux type `label` to `path`
///
/// Returns `false` without doing anything when SELinux is disabled.
pub async fn relabel(
    runner: &dyn CommandRunner,
    path: &Path,
    label: &str,
) -> Result<bool, ProvisionError> {
    if !is_enabled(runner).await {
        info!("SELinux disabled, leaving labels on {} alone", path.display());
        return Ok(false);
    }

    info!("Labelling {} as {}", path.display(), label);
    let path = path.to_string_lossy();
    run_checked(runner, "chcon", &["-R", "-t", label, &*path]).await?;
    Ok(true)
}
