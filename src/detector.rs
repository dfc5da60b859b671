//! PHP and WordPress version detection.
//!
//! The PHP version comes from the interpreter's `-v` banner and is cached
//! once for the whole store (the interpreter rarely changes mid-session).
//! The WordPress version comes from `wp-includes/version.php` and is cached
//! per installation directory.  Both detections return `None` on any
//! failure; they never error.

use std::ffi::OsStr;
use std::path::Path;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, info, warn};

use crate::process::{self, Limits};
use crate::resolver::PhpResolver;
use crate::store::{CatalogStore, PHP_VERSION_KEY, directory_key, wp_version_key};
use crate::types::VersionInfo;

/// Path of the version marker file, relative to the installation root.
pub const WP_VERSION_FILE: &str = "wp-includes/version.php";

/// A directory is a WordPress installation iff it contains this file.
pub const WP_CONFIG_FILE: &str = "wp-config.php";

static PHP_BANNER_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"PHP\s+(\d+\.\d+\.\d+)").expect("static regex")
});

static WP_VERSION_ASSIGNMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\$wp_version\s*=\s*['"]([^'"]+)['"]"#).expect("static regex")
});

/// Extract the dotted three-part version following `PHP` in a `php -v`
/// banner, e.g. `"PHP 8.1.5 (cli) (built: ...)"` → `"8.1.5"`.
pub fn parse_php_banner(banner: &str) -> Option<String> {
    PHP_BANNER_VERSION
        .captures(banner)
        .map(|c| c[1].to_string())
}

/// Extract the `$wp_version = '...'` literal from `version.php` content.
pub fn parse_wp_version_file(content: &str) -> Option<String> {
    WP_VERSION_ASSIGNMENT
        .captures(content)
        .map(|c| c[1].to_string())
}

pub struct VersionDetector {
    store: Arc<CatalogStore>,
    resolver: Arc<PhpResolver>,
    limits: Limits,
}

impl VersionDetector {
    pub fn new(store: Arc<CatalogStore>, resolver: Arc<PhpResolver>, limits: Limits) -> Self {
        Self {
            store,
            resolver,
            limits,
        }
    }

    /// Cached PHP version and the directory's cached WordPress version,
    /// detecting (and caching) whichever is missing.
    pub async fn version_info(&self, directory: &Path) -> VersionInfo {
        let (php, wordpress) = tokio::join!(self.php_version(), self.wordpress_version(directory));
        VersionInfo { php, wordpress }
    }

    pub async fn php_version(&self) -> Option<String> {
        if let Some(cached) = self.store.get_string(PHP_VERSION_KEY) {
            return Some(cached);
        }
        let version = self.detect_php().await?;
        self.store.set_string(PHP_VERSION_KEY, &version);
        Some(version)
    }

    pub async fn wordpress_version(&self, directory: &Path) -> Option<String> {
        let key = wp_version_key(&directory_key(directory));
        if let Some(cached) = self.store.get_string(&key) {
            return Some(cached);
        }
        let version = detect_wordpress(directory).await?;
        self.store.set_string(&key, &version);
        Some(version)
    }

    /// Run `php -v` on the resolved interpreter and parse its banner.
    pub async fn detect_php(&self) -> Option<String> {
        let Some(php) = self.resolver.resolve(false).await else {
            warn!("Cannot detect PHP version: no PHP binary found");
            return None;
        };
        let out = match process::run(OsStr::new(&php), &["-v"], None, self.limits).await {
            Ok(out) => out,
            Err(e) => {
                warn!("PHP version check failed: {e}");
                return None;
            }
        };
        let version = parse_php_banner(&out.stdout);
        match &version {
            Some(v) => info!("Detected PHP {v}"),
            None => warn!("Could not parse PHP version from: {}", out.stdout.trim()),
        }
        version
    }
}

pub async fn is_wordpress_installation(directory: &Path) -> bool {
    tokio::fs::metadata(directory.join(WP_CONFIG_FILE))
        .await
        .is_ok_and(|m| m.is_file())
}

/// Read the installation's `version.php` and extract `$wp_version`.
pub async fn detect_wordpress(directory: &Path) -> Option<String> {
    let path = directory.join(WP_VERSION_FILE);
    let content = match tokio::fs::read_to_string(&path).await {
        Ok(c) => c,
        Err(e) => {
            debug!("Cannot read {}: {e}", path.display());
            return None;
        }
    };
    let version = parse_wp_version_file(&content);
    match &version {
        Some(v) => info!("Detected WordPress {v} in {}", directory.display()),
        None => warn!("No $wp_version found in {}", path.display()),
    }
    version
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn banner_version_is_parsed() {
        let banner = "PHP 8.1.5 (cli) (built: Apr 21 2022 10:14:33) (NTS)\n\
                      Copyright (c) The PHP Group\nZend Engine v4.1.5";
        assert_eq!(parse_php_banner(banner).as_deref(), Some("8.1.5"));
    }

    #[test]
    fn banner_without_version_is_none() {
        assert_eq!(parse_php_banner("Zend Engine v4.1.5"), None);
        assert_eq!(parse_php_banner("PHP 8.1 (cli)"), None);
    }

    #[test]
    fn wp_version_literal_is_parsed() {
        let file = "<?php\n/**\n * The WordPress version string.\n */\n$wp_version = '6.4.2';\n$wp_db_version = 56657;\n";
        assert_eq!(parse_wp_version_file(file).as_deref(), Some("6.4.2"));
        assert_eq!(
            parse_wp_version_file("$wp_version=\"6.5-RC1\";").as_deref(),
            Some("6.5-RC1")
        );
        assert_eq!(parse_wp_version_file("<?php $wp_db_version = 1;"), None);
    }

    #[tokio::test]
    async fn installation_needs_wp_config() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_wordpress_installation(dir.path()).await);
        std::fs::write(dir.path().join(WP_CONFIG_FILE), "<?php").unwrap();
        assert!(is_wordpress_installation(dir.path()).await);
    }

    #[tokio::test]
    async fn missing_version_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(detect_wordpress(dir.path()).await, None);
    }
}
