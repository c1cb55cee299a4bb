//! Package management module
//!
//! Installs packages using the appropriate package manager (dnf, yum, apt, zypper, apk).

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::ProvisionError;
use crate::exec::{CommandRunner, run_checked};

/// Detected package manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageManager {
    Dnf,
    Yum,
    Apt,
    Zypper,
    Apk,
}

impl PackageManager {
    /// Detect the system's package manager
    pub async fn detect(runner: &dyn CommandRunner) -> Option<Self> {
        // Check in order of preference
        for (binary, pm) in [
            ("dnf", Self::Dnf),
            ("yum", Self::Yum),
            ("apt-get", Self::Apt),
            ("zypper", Self::Zypper),
            ("apk", Self::Apk),
        ] {
            if command_exists(runner, binary).await {
                return Some(pm);
            }
        }
        None
    }

    /// Use `preferred` when set, otherwise detect
    pub async fn resolve(
        preferred: Option<Self>,
        runner: &dyn CommandRunner,
    ) -> Result<Self, ProvisionError> {
        if let Some(pm) = preferred {
            return Ok(pm);
        }
        Self::detect(runner).await.ok_or_else(|| {
            ProvisionError::Command("No supported package manager found".to_string())
        })
    }

    fn install_command(&self) -> (&'static str, Vec<&'static str>) {
        match self {
            Self::Dnf => ("dnf", vec!["install", "-y"]),
            Self::Yum => ("yum", vec!["install", "-y"]),
            Self::Apt => ("apt-get", vec!["install", "-y"]),
            Self::Zypper => ("zypper", vec!["--non-interactive", "install"]),
            Self::Apk => ("apk", vec!["add", "--no-cache"]),
        }
    }

    fn update_command(&self) -> (&'static str, Vec<&'static str>) {
        match self {
            Self::Dnf => ("dnf", vec!["makecache"]),
            Self::Yum => ("yum", vec!["makecache"]),
            Self::Apt => ("apt-get", vec!["update"]),
            Self::Zypper => ("zypper", vec!["--non-interactive", "refresh"]),
            Self::Apk => ("apk", vec!["update"]),
        }
    }

    fn query_command(&self) -> (&'static str, Vec<&'static str>) {
        match self {
            Self::Dnf | Self::Yum | Self::Zypper => ("rpm", vec!["-q"]),
            Self::Apt => ("dpkg", vec!["-s"]),
            Self::Apk => ("apk", vec!["info", "-e"]),
        }
    }
}

/// Check if a command exists
async fn command_exists(runner: &dyn CommandRunner, cmd: &str) -> bool {
    runner
        .run("which", &[cmd])
        .await
        .is_ok_and(|o| o.success())
}

/// Update package cache
///
/// Refresh problems are logged; a stale index rarely stops an install.
pub async fn update_package_cache(
    runner: &dyn CommandRunner,
    pm: PackageManager,
) -> Result<(), ProvisionError> {
    info!("Updating package cache using {:?}", pm);

    let (cmd, args) = pm.update_command();
    let output = runner.run(cmd, &args).await?;

    if !output.success() {
        warn!("Package cache update had issues: {}", output.stderr.trim());
    }

    Ok(())
}

/// Install packages
pub async fn install_packages(
    runner: &dyn CommandRunner,
    pm: PackageManager,
    packages: &[String],
) -> Result<(), ProvisionError> {
    if packages.is_empty() {
        return Ok(());
    }

    info!("Installing {} packages using {:?}", packages.len(), pm);
    debug!("Packages: {:?}", packages);

    let (cmd, base_args) = pm.install_command();
    let mut args: Vec<&str> = base_args;
    args.extend(packages.iter().map(String::as_str));

    run_checked(runner, cmd, &args).await.map_err(|e| {
        ProvisionError::Command(format!("Failed to install packages: {e}"))
    })?;

    info!("Successfully installed {} packages", packages.len());
    Ok(())
}

/// Check whether a package is installed
pub async fn is_installed(
    runner: &dyn CommandRunner,
    pm: PackageManager,
    package: &str,
) -> Result<bool, ProvisionError> {
    let (cmd, base_args) = pm.query_command();
    let mut args: Vec<&str> = base_args;
    args.push(package);
    Ok(runner.run(cmd, &args).await?.success())
}

/// Install `packages`, then make sure `required` is present
///
/// If `required` is reported absent after the bulk install, it is installed
/// once more on its own. There is no further retry; a failure of that second
/// install is returned.
pub async fn install_with_retry(
    runner: &dyn CommandRunner,
    pm: PackageManager,
    packages: &[String],
    required: &str,
) -> Result<(), ProvisionError> {
    install_packages(runner, pm, packages).await?;

    if is_installed(runner, pm, required).await? {
        debug!("{} is installed", required);
        return Ok(());
    }

    warn!("{} missing after install, retrying once", required);
    install_packages(runner, pm, &[required.to_string()]).await
}
