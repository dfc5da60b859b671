//! PHP binary resolution.
//!
//! Finds an interpreter to run, in order:
//!
//!   1. The user-confirmed path persisted in the store (unless a fresh
//!      lookup is forced).  A stale path is deleted, not kept.
//!   2. `php` on `PATH`, located with `which` (or `where` on Windows).
//!   3. A platform list of well-known install locations.  Glob entries
//!      (versioned bundles such as MAMP or WAMP) are sorted and tried from
//!      the lexicographically last match backwards.
//!
//! When all three fail the caller asks the user to pick a binary and hands
//! it to [`PhpResolver::select_path`], which validates it the same way.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::ResolveError;
use crate::process::{self, Limits};
use crate::store::{CUSTOM_PHP_PATH_KEY, CatalogStore, PHP_VERSION_KEY};

/// Command name used when `php` resolves through `PATH`.
pub const PHP_COMMAND: &str = "php";

/// Marker the interpreter prints in its `-v` banner.
const PHP_BANNER_MARKER: &str = "PHP";

pub struct PhpResolver {
    store: Arc<CatalogStore>,
    search_locations: Vec<String>,
    timeout: Duration,
}

impl PhpResolver {
    pub fn new(store: Arc<CatalogStore>, search_locations: Vec<String>, timeout: Duration) -> Self {
        Self {
            store,
            search_locations,
            timeout,
        }
    }

    fn limits(&self) -> Limits {
        Limits {
            timeout: self.timeout,
            max_output: 64 * 1024,
        }
    }

    /// Locate a usable interpreter.  Returns the path (or the bare
    /// [`PHP_COMMAND`]) or `None` when the user has to be asked.
    pub async fn resolve(&self, force_fresh: bool) -> Option<String> {
        debug!("Resolving PHP path (force_fresh = {force_fresh})");

        if !force_fresh && let Some(custom) = self.store.get_string(CUSTOM_PHP_PATH_KEY) {
            if self.is_valid_php_binary(Path::new(&custom)).await {
                debug!("Using stored custom PHP path: {custom}");
                return Some(custom);
            }
            warn!("Stored custom PHP path {custom} is no longer valid, clearing it");
            self.store.delete(CUSTOM_PHP_PATH_KEY);
        }

        if self.is_php_in_path().await {
            return Some(PHP_COMMAND.to_string());
        }

        debug!("PHP not found in PATH, searching common locations");
        if let Some(found) = self.search_common_locations().await {
            return Some(found);
        }

        warn!("PHP not found automatically; the user needs to specify its location");
        None
    }

    /// Validate a user-picked binary and persist it.  The cached PHP
    /// version is dropped so the next detection runs against the new binary.
    pub async fn select_path(&self, selected: &Path) -> Result<String, ResolveError> {
        if !self.is_valid_php_binary(selected).await {
            return Err(ResolveError::InvalidBinary(selected.to_path_buf()));
        }
        let path = selected.to_string_lossy().into_owned();
        self.store.set_string(CUSTOM_PHP_PATH_KEY, &path);
        self.store.delete(PHP_VERSION_KEY);
        info!("User selected valid PHP path: {path}");
        Ok(path)
    }

    /// Forget the user-confirmed path.
    pub fn clear_path(&self) {
        if self.store.delete(CUSTOM_PHP_PATH_KEY) {
            info!("Cleared custom PHP path");
        }
        self.store.delete(PHP_VERSION_KEY);
    }

    /// True when `path` is an executable file whose `-v` output mentions PHP.
    pub async fn is_valid_php_binary(&self, path: &Path) -> bool {
        if !is_executable(path) {
            return false;
        }
        match process::run(path.as_os_str(), &["-v"], None, self.limits()).await {
            Ok(out) => out.stdout.contains(PHP_BANNER_MARKER),
            Err(e) => {
                debug!("{} failed validation: {e}", path.display());
                false
            }
        }
    }

    async fn is_php_in_path(&self) -> bool {
        let lookup = if cfg!(windows) { "where" } else { "which" };
        let Ok(out) = process::run(OsStr::new(lookup), &[PHP_COMMAND], None, self.limits()).await
        else {
            return false;
        };
        let Some(first) = out.stdout.lines().map(str::trim).find(|l| !l.is_empty()) else {
            return false;
        };
        if self.is_valid_php_binary(Path::new(first)).await {
            info!("PHP found in PATH: {first}");
            return true;
        }
        false
    }

    async fn search_common_locations(&self) -> Option<String> {
        for location in &self.search_locations {
            for candidate in expand_location(location) {
                if self.is_valid_php_binary(&candidate).await {
                    let found = candidate.to_string_lossy().into_owned();
                    info!("Found PHP at: {found}");
                    return Some(found);
                }
            }
        }
        None
    }
}

/// Expand one search location into the candidates to try, in order.
///
/// A plain path yields itself.  A glob pattern yields its matches sorted
/// newest-first (lexicographically descending).  An invalid pattern yields
/// nothing.
pub fn expand_location(location: &str) -> Vec<PathBuf> {
    if !location.contains('*') {
        return vec![PathBuf::from(location)];
    }
    let Ok(paths) = glob::glob(location) else {
        debug!("Ignoring invalid search pattern {location}");
        return Vec::new();
    };
    let mut matches: Vec<PathBuf> = paths.filter_map(Result::ok).collect();
    matches.sort();
    matches.reverse();
    matches
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|m| m.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn plain_location_is_kept_as_is() {
        assert_eq!(
            expand_location("/usr/bin/php"),
            vec![PathBuf::from("/usr/bin/php")]
        );
    }

    #[test]
    fn glob_matches_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        for version in ["php7.4.33", "php8.2.0", "php8.1.12"] {
            let bin = dir.path().join(version).join("bin");
            fs::create_dir_all(&bin).unwrap();
            fs::write(bin.join("php"), "").unwrap();
        }
        let pattern = format!("{}/php*/bin/php", dir.path().display());
        let found: Vec<String> = expand_location(&pattern)
            .iter()
            .map(|p| {
                p.parent()
                    .and_then(Path::parent)
                    .and_then(Path::file_name)
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        assert_eq!(found, vec!["php8.2.0", "php8.1.12", "php7.4.33"]);
    }

    #[test]
    fn unmatched_glob_is_empty() {
        assert!(expand_location("/nonexistent-wpshell/php*/php").is_empty());
    }
}
