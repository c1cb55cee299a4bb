//! Post-install diagnostics and the local smoke test

use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

use super::write_files::{remove_file_if_exists, write_file};
use crate::ProvisionError;
use crate::template::INFO_PHP;

/// Lines shown from each error log
pub const TAIL_LINES: usize = 20;

/// Characters of the smoke test response shown
pub const SNIPPET_CHARS: usize = 300;

/// File name of the smoke test script inside the document root
pub const SMOKE_SCRIPT: &str = "info.php";

/// Last `n` lines of a log file
///
/// Invalid UTF-8 is replaced rather than rejected; error logs carry raw
/// request bytes.
pub async fn tail_file(path: &Path, n: usize) -> Result<Vec<String>, ProvisionError> {
    let bytes = fs::read(path).await?;
    let content = String::from_utf8_lossy(&bytes);
    let lines: Vec<&str> = content.lines().collect();
    let start = lines.len().saturating_sub(n);
    Ok(lines[start..].iter().map(|l| l.to_string()).collect())
}

/// Files in `dir` whose name contains `needle`, sorted
pub async fn related_logs(dir: &Path, needle: &str) -> Result<Vec<PathBuf>, ProvisionError> {
    let mut found = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_name().to_string_lossy().contains(needle) {
            found.push(entry.path());
        }
    }
    found.sort();
    Ok(found)
}

/// Log the tail of a service's error log, or list candidate files
///
/// `search_dir` is scanned for names containing `service` when the log
/// itself is missing.
pub async fn report_error_log(
    service: &str,
    log: &Path,
    search_dir: &Path,
) -> Result<(), ProvisionError> {
    if log.exists() {
        info!("Last {} lines of {}:", TAIL_LINES, log.display());
        for line in tail_file(log, TAIL_LINES).await? {
            info!("  {}", line);
        }
        return Ok(());
    }

    info!("{} not found, searching {} for {} logs", log.display(), search_dir.display(), service);
    let candidates = related_logs(search_dir, service).await?;
    if candidates.is_empty() {
        info!("No {} logs in {}", service, search_dir.display());
    }
    for path in candidates {
        info!("  {}", path.display());
    }
    Ok(())
}

/// First `max` characters of `body`
pub fn snippet(body: &str, max: usize) -> String {
    body.chars().take(max).collect()
}

/// Drop a diagnostic script into `document_root`, fetch it once from
/// `base_url`, and remove it again
///
/// The script is removed even when the fetch fails. A failed fetch is
/// logged and yields `None`; only filesystem errors are returned.
pub async fn smoke_test(
    client: &Client,
    base_url: &str,
    document_root: &Path,
) -> Result<Option<String>, ProvisionError> {
    let script = document_root.join(SMOKE_SCRIPT);
    write_file(&script, INFO_PHP, 0o644).await?;

    let url = format!("{}/{}", base_url.trim_end_matches('/'), SMOKE_SCRIPT);
    let fetched = fetch_text(client, &url).await;

    remove_file_if_exists(&script).await?;

    match fetched {
        Ok(body) => {
            let head = snippet(&body, SNIPPET_CHARS);
            info!("Smoke test response from {}:\n{}", url, head);
            Ok(Some(head))
        }
        Err(e) => {
            warn!("Smoke test request to {} failed: {}", url, e);
            Ok(None)
        }
    }
}

async fn fetch_text(client: &Client, url: &str) -> Result<String, ProvisionError> {
    let response = client.get(url).send().await?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(ProvisionError::Http(format!("GET {url} returned {status}")));
    }
    Ok(body)
}
