//! PHP-FPM pool configuration
//!
//! Pool files are INI: `[section]` headers, `key = value` settings and
//! `;` comments. The stock files ship most settings commented out
//! (`;listen.owner = nobody`), so setting a key first looks for an active
//! line, then for a commented one to take over, and only then appends.
//! Lines that are not touched are written back byte for byte.

use std::fmt;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info};

use crate::ProvisionError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Line {
    Section { name: String, raw: String },
    Setting { key: String, value: String, raw: String },
    Commented { key: String, raw: String },
    Other(String),
}

impl Line {
    fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let Some(name) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            return Self::Section {
                name: name.trim().to_string(),
                raw: raw.to_string(),
            };
        }

        if let Some(rest) = trimmed.strip_prefix(';').or_else(|| trimmed.strip_prefix('#')) {
            let rest = rest.trim_start_matches([';', '#']).trim_start();
            return match split_setting(rest) {
                Some((key, _)) => Self::Commented {
                    key,
                    raw: raw.to_string(),
                },
                None => Self::Other(raw.to_string()),
            };
        }

        match split_setting(trimmed) {
            Some((key, value)) => Self::Setting {
                key,
                value,
                raw: raw.to_string(),
            },
            None => Self::Other(raw.to_string()),
        }
    }

    fn setting(key: &str, value: &str) -> Self {
        Self::Setting {
            key: key.to_string(),
            value: value.to_string(),
            raw: format!("{key} = {value}"),
        }
    }

    fn raw(&self) -> &str {
        match self {
            Self::Section { raw, .. }
            | Self::Setting { raw, .. }
            | Self::Commented { raw, .. }
            | Self::Other(raw) => raw,
        }
    }
}

/// Split `key = value`; keys are a single token
fn split_setting(s: &str) -> Option<(String, String)> {
    let (key, value) = s.split_once('=')?;
    let key = key.trim();
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | '[' | ']'));
    valid.then(|| (key.to_string(), value.trim().to_string()))
}

/// Parsed pool configuration file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    lines: Vec<Line>,
}

impl PoolConfig {
    pub fn parse(text: &str) -> Self {
        Self {
            lines: text.lines().map(Line::parse).collect(),
        }
    }

    /// Line range `[start, end)` of a section's body
    fn section_range(&self, section: &str) -> Option<(usize, usize)> {
        let header = self
            .lines
            .iter()
            .position(|l| matches!(l, Line::Section { name, .. } if name == section))?;
        let end = self.lines[header + 1..]
            .iter()
            .position(|l| matches!(l, Line::Section { .. }))
            .map_or(self.lines.len(), |offset| header + 1 + offset);
        Some((header + 1, end))
    }

    /// Active value of `key` in `section`; the last occurrence wins
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        let (start, end) = self.section_range(section)?;
        self.lines[start..end].iter().rev().find_map(|l| match l {
            Line::Setting { key: k, value, .. } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    /// Set `key` to `value` in `section`, returning whether anything changed
    pub fn set(&mut self, section: &str, key: &str, value: &str) -> bool {
        let Some((start, end)) = self.section_range(section) else {
            self.lines.push(Line::Section {
                name: section.to_string(),
                raw: format!("[{section}]"),
            });
            self.lines.push(Line::setting(key, value));
            return true;
        };

        let active: Vec<usize> = (start..end)
            .filter(|&i| matches!(&self.lines[i], Line::Setting { key: k, .. } if k == key))
            .collect();

        if !active.is_empty() {
            let mut changed = false;
            for i in active {
                if let Line::Setting { value: v, .. } = &self.lines[i] {
                    if v != value {
                        self.lines[i] = Line::setting(key, value);
                        changed = true;
                    }
                }
            }
            return changed;
        }

        let commented = (start..end)
            .find(|&i| matches!(&self.lines[i], Line::Commented { key: k, .. } if k == key));
        match commented {
            Some(i) => self.lines[i] = Line::setting(key, value),
            None => self.lines.insert(end, Line::setting(key, value)),
        }
        true
    }
}

impl fmt::Display for PoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line.raw())?;
        }
        Ok(())
    }
}

/// Make the pool listener and workers run as `user:group`
///
/// Rewrites the file only when a value changed. Returns whether it did.
pub async fn patch_pool_file(
    path: &Path,
    section: &str,
    user: &str,
    group: &str,
) -> Result<bool, ProvisionError> {
    let text = fs::read_to_string(path).await.map_err(|e| {
        ProvisionError::Config(format!("cannot read pool config {}: {}", path.display(), e))
    })?;
    let mut pool = PoolConfig::parse(&text);

    let mut changed = false;
    for (key, value) in [
        ("listen.owner", user),
        ("listen.group", group),
        ("user", user),
        ("group", group),
    ] {
        if pool.set(section, key, value) {
            debug!("Pool [{}]: {} = {}", section, key, value);
            changed = true;
        }
    }

    if changed {
        info!("Patching {}", path.display());
        fs::write(path, pool.to_string()).await?;
    } else {
        info!("{} already up to date", path.display());
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const STOCK_POOL: &str = "\
; Start a new pool named 'www'.
[www]

; Unix user/group of processes
user = nobody
group = nobody

listen = /run/php-fpm/www.sock

; Set permissions for unix socket.
;listen.owner = nobody
;listen.group = nobody
;listen.mode = 0660

pm = dynamic
";

    #[test]
    fn test_parse_and_get() {
        let pool = PoolConfig::parse(STOCK_POOL);
        assert_eq!(pool.get("www", "user"), Some("nobody"));
        assert_eq!(pool.get("www", "listen"), Some("/run/php-fpm/www.sock"));
        assert_eq!(pool.get("www", "listen.owner"), None);
        assert_eq!(pool.get("other", "user"), None);
    }

    #[test]
    fn test_untouched_file_round_trips() {
        assert_eq!(PoolConfig::parse(STOCK_POOL).to_string(), STOCK_POOL);
    }

    #[test]
    fn test_set_replaces_active_line() {
        let mut pool = PoolConfig::parse(STOCK_POOL);
        assert!(pool.set("www", "user", "apache"));
        assert!(!pool.set("www", "user", "apache"));
        assert!(pool.to_string().contains("\nuser = apache\n"));
        assert!(!pool.to_string().contains("user = nobody"));
    }

    #[test]
    fn test_set_uncomments_in_place() {
        let mut pool = PoolConfig::parse(STOCK_POOL);
        pool.set("www", "listen.owner", "apache");

        let text = pool.to_string();
        assert!(text.contains("listen.owner = apache\n;listen.group = nobody"));
        assert!(!text.contains(";listen.owner"));
    }

    #[test]
    fn test_set_appends_missing_key_to_section() {
        let mut pool = PoolConfig::parse("[www]\nuser = apache\n[other]\nuser = x\n");
        pool.set("www", "listen.owner", "apache");
        assert_eq!(
            pool.to_string(),
            "[www]\nuser = apache\nlisten.owner = apache\n[other]\nuser = x\n"
        );
    }

    #[test]
    fn test_set_creates_missing_section() {
        let mut pool = PoolConfig::parse("");
        pool.set("www", "user", "apache");
        assert_eq!(pool.to_string(), "[www]\nuser = apache\n");
    }

    #[test]
    fn test_only_target_section_is_touched() {
        let mut pool = PoolConfig::parse("[global]\nuser = root\n[www]\nuser = nobody\n");
        pool.set("www", "user", "apache");
        assert_eq!(pool.get("global", "user"), Some("root"));
        assert_eq!(pool.get("www", "user"), Some("apache"));
    }

    #[tokio::test]
    async fn test_patch_pool_file_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("www.conf");
        fs::write(&path, STOCK_POOL).await.unwrap();

        assert!(patch_pool_file(&path, "www", "apache", "apache").await.unwrap());
        let first = fs::read_to_string(&path).await.unwrap();

        assert!(!patch_pool_file(&path, "www", "apache", "apache").await.unwrap());
        let second = fs::read_to_string(&path).await.unwrap();

        assert_eq!(first, second);
        let pool = PoolConfig::parse(&first);
        for key in ["listen.owner", "listen.group", "user", "group"] {
            assert_eq!(pool.get("www", key), Some("apache"), "{key}");
        }
        assert!(first.contains(";listen.mode = 0660"));
    }

    #[tokio::test]
    async fn test_patch_missing_file_is_error() {
        let temp = TempDir::new().unwrap();
        let result =
            patch_pool_file(&temp.path().join("www.conf"), "www", "apache", "apache").await;
        assert!(matches!(result, Err(ProvisionError::Config(_))));
    }
}
