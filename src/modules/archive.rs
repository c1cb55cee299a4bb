//! Application archive download and extraction
//!
//! The archive is streamed into a staging directory, unpacked into the
//! destination with its top-level directory stripped, and the download
//! directory is removed whether or not extraction succeeded.

use flate2::read::GzDecoder;
use reqwest::Client;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ProvisionError;

const ARCHIVE_FILE: &str = "archive.tar.gz";

/// Download `url` to `dest`, returning the number of bytes written
pub async fn download(client: &Client, url: &str, dest: &Path) -> Result<u64, ProvisionError> {
    info!("Downloading {}", url);

    let mut response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(ProvisionError::Http(format!(
            "GET {} returned {}",
            url,
            response.status()
        )));
    }

    let mut file = fs::File::create(dest).await?;
    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    debug!("Downloaded {} bytes to {}", written, dest.display());
    Ok(written)
}

/// Unpack a `.tar.gz` into `dest`, stripping the leading `root` directory
///
/// Returns the number of entries unpacked.
pub async fn extract_tar_gz(
    archive: &Path,
    dest: &Path,
    root: &str,
) -> Result<usize, ProvisionError> {
    info!("Extracting {} into {}", archive.display(), dest.display());

    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();
    let root = root.to_string();
    tokio::task::spawn_blocking(move || unpack_stripped(&archive, &dest, &root))
        .await
        .map_err(|e| ProvisionError::Archive(format!("extraction task failed: {e}")))?
}

/// Download and unpack an archive
///
/// The download goes to a fresh subdirectory of `staging_dir`, which is
/// removed afterwards. Nothing else in `staging_dir` is touched.
pub async fn install_archive(
    client: &Client,
    url: &str,
    staging_dir: &Path,
    dest: &Path,
    root: &str,
) -> Result<usize, ProvisionError> {
    let work_dir = staging_dir.join(format!("download-{}", Uuid::new_v4()));
    fs::create_dir_all(&work_dir).await?;
    let archive = work_dir.join(ARCHIVE_FILE);

    let result = async {
        download(client, url, &archive).await?;
        extract_tar_gz(&archive, dest, root).await
    }
    .await;

    if let Err(e) = fs::remove_dir_all(&work_dir).await {
        warn!("Could not remove {}: {}", work_dir.display(), e);
    }

    let count = result?;
    info!("Unpacked {} entries into {}", count, dest.display());
    Ok(count)
}

fn archive_err(e: std::io::Error) -> ProvisionError {
    ProvisionError::Archive(e.to_string())
}

fn unpack_stripped(archive: &Path, dest: &Path, root: &str) -> Result<usize, ProvisionError> {
    let file = std::fs::File::open(archive)?;
    let mut tar = tar::Archive::new(GzDecoder::new(file));
    std::fs::create_dir_all(dest)?;

    let mut count = 0;
    for entry in tar.entries().map_err(archive_err)? {
        let mut entry = entry.map_err(archive_err)?;
        let path = entry.path().map_err(archive_err)?.into_owned();

        let entry_type = entry.header().entry_type();
        if entry_type.is_symlink() || entry_type.is_hard_link() {
            warn!("Skipping link entry {}", path.display());
            continue;
        }

        let Some(relative) = strip_root(&path, root)? else {
            continue;
        };

        let target = dest.join(&relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        entry.unpack(&target).map_err(archive_err)?;
        count += 1;
    }

    Ok(count)
}

/// Path of an entry relative to `root`
///
/// `None` for the root directory entry itself. Entries outside `root` or
/// containing `..` are rejected.
fn strip_root(path: &Path, root: &str) -> Result<Option<PathBuf>, ProvisionError> {
    let normalized: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();

    let relative = if root.is_empty() {
        normalized.as_path()
    } else {
        normalized.strip_prefix(root).map_err(|_| {
            ProvisionError::Archive(format!(
                "entry {} is outside {}/",
                path.display(),
                root
            ))
        })?
    };

    if relative.as_os_str().is_empty() {
        return Ok(None);
    }

    if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(ProvisionError::Archive(format!(
            "refusing unsafe entry {}",
            path.display()
        )));
    }

    Ok(Some(relative.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tempfile::TempDir;

    fn build_archive(path: &Path, entries: &[(&str, &str)]) {
        let file = std::fs::File::create(path).unwrap();
        let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        for (name, content) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, name, content.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap();
    }

    #[test]
    fn test_strip_root() {
        assert_eq!(
            strip_root(Path::new("wordpress/index.php"), "wordpress").unwrap(),
            Some(PathBuf::from("index.php"))
        );
        assert_eq!(
            strip_root(Path::new("./wordpress/wp-admin/"), "wordpress").unwrap(),
            Some(PathBuf::from("wp-admin"))
        );
        assert_eq!(strip_root(Path::new("wordpress/"), "wordpress").unwrap(), None);
        assert!(strip_root(Path::new("other/index.php"), "wordpress").is_err());
        assert!(strip_root(Path::new("wordpress/../../etc/passwd"), "wordpress").is_err());
        assert_eq!(
            strip_root(Path::new("index.php"), "").unwrap(),
            Some(PathBuf::from("index.php"))
        );
    }

    #[tokio::test]
    async fn test_extract_strips_root() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("latest.tar.gz");
        build_archive(
            &archive,
            &[
                ("wordpress/index.php", "<?php // index"),
                ("wordpress/wp-includes/version.php", "<?php $wp_version = '6.6';"),
            ],
        );

        let dest = temp.path().join("html");
        let count = extract_tar_gz(&archive, &dest, "wordpress").await.unwrap();

        assert_eq!(count, 2);
        assert_eq!(
            std::fs::read_to_string(dest.join("index.php")).unwrap(),
            "<?php // index"
        );
        assert!(dest.join("wp-includes/version.php").exists());
        assert!(!dest.join("wordpress").exists());
    }

    #[tokio::test]
    async fn test_extract_rejects_foreign_entries() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("bad.tar.gz");
        build_archive(&archive, &[("elsewhere/evil.php", "<?php")]);

        let result = extract_tar_gz(&archive, &temp.path().join("html"), "wordpress").await;
        assert!(matches!(result, Err(ProvisionError::Archive(_))));
    }

    #[tokio::test]
    async fn test_extract_corrupt_archive() {
        let temp = TempDir::new().unwrap();
        let archive = temp.path().join("corrupt.tar.gz");
        std::fs::write(&archive, b"not gzip at all").unwrap();

        assert!(extract_tar_gz(&archive, &temp.path().join("html"), "wordpress").await.is_err());
    }

    #[tokio::test]
    async fn test_install_leaves_staging_contents_alone() {
        let temp = TempDir::new().unwrap();
        let staging = temp.path().join("shared-tmp");
        std::fs::create_dir_all(&staging).unwrap();
        std::fs::write(staging.join("unrelated.txt"), "keep me").unwrap();

        let result = install_archive(
            &Client::new(),
            "http://127.0.0.1:9/latest.tar.gz",
            &staging,
            &temp.path().join("html"),
            "wordpress",
        )
        .await;

        assert!(result.is_err());
        let remaining: Vec<_> = std::fs::read_dir(&staging)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(remaining, vec![std::ffi::OsString::from("unrelated.txt")]);
    }
}
