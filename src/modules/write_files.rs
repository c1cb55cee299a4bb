//! File writing, permissions and ownership

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::ProvisionError;
use crate::exec::{CommandRunner, run_checked};

/// Write `content` to `path` with `mode`, creating parent directories
///
/// An existing file is overwritten.
pub async fn write_file(path: &Path, content: &str, mode: u32) -> Result<(), ProvisionError> {
    info!("Writing file: {}", path.display());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    fs::write(path, content).await?;
    set_permissions(path, mode).await
}

/// Remove a file, treating "already gone" as success
pub async fn remove_file_if_exists(path: &Path) -> Result<(), ProvisionError> {
    match fs::remove_file(path).await {
        Ok(()) => {
            debug!("Removed {}", path.display());
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

pub async fn set_permissions(path: &Path, mode: u32) -> Result<(), ProvisionError> {
    debug!("Setting permissions {:o} on {:?}", mode, path);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
    }

    Ok(())
}

/// Apply `mode` to `root` and everything below it
///
/// Symlinks are left alone. Returns the number of entries changed.
pub async fn set_permissions_recursive(root: &Path, mode: u32) -> Result<usize, ProvisionError> {
    info!("Setting permissions {:o} recursively on {}", mode, root.display());

    let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];
    let mut count = 0;

    while let Some(path) = pending.pop() {
        let meta = fs::symlink_metadata(&path).await?;
        if meta.file_type().is_symlink() {
            continue;
        }

        set_permissions(&path, mode).await?;
        count += 1;

        if meta.is_dir() {
            let mut entries = fs::read_dir(&path).await?;
            while let Some(entry) = entries.next_entry().await? {
                pending.push(entry.path());
            }
        }
    }

    Ok(count)
}

/// Change ownership via chown, optionally recursively
pub async fn set_ownership(
    runner: &dyn CommandRunner,
    path: &Path,
    owner: &str,
    recursive: bool,
) -> Result<(), ProvisionError> {
    debug!("Setting ownership {} on {:?}", owner, path);

    let path = path.to_string_lossy();
    let mut args = Vec::with_capacity(3);
    if recursive {
        args.push("-R");
    }
    args.push(owner);
    args.push(&*path);

    run_checked(runner, "chown", &args)
        .await
        .map_err(|e| ProvisionError::Command(format!("Failed to set ownership: {e}")))?;
    Ok(())
}
