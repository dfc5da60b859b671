//! Configuration loading.
//!
//! Settings live in `<config dir>/wpshell/config.toml` (resolved through
//! `etcetera`) and every field has a default, so a missing file is the same
//! as an empty one.  The fallback version chains are data here rather than
//! code: supporting a new PHP or WordPress release means adding a line to
//! the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use etcetera::BaseStrategy;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::types::Ecosystem;

/// Application directory name under the platform config/data dirs.
pub const APP_DIR: &str = "wpshell";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Root of the bundled catalogs (`<data_dir>/<ecosystem>/<major.minor>.json`).
    pub data_dir: Option<PathBuf>,
    /// Location of the persistent catalog store.
    pub store_path: Option<PathBuf>,
    pub fallback_versions: FallbackVersions,
    pub php: PhpConfig,
    pub completion: CompletionConfig,
}

/// Known catalog versions per ecosystem, newest first.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FallbackVersions {
    pub php: Vec<String>,
    pub wordpress: Vec<String>,
}

impl Default for FallbackVersions {
    fn default() -> Self {
        Self {
            php: ["8.3", "8.2", "8.1", "8.0", "7.4"].map(String::from).to_vec(),
            wordpress: ["6.5", "6.4", "6.3", "6.2", "6.1", "6.0"]
                .map(String::from)
                .to_vec(),
        }
    }
}

impl FallbackVersions {
    pub fn for_ecosystem(&self, ecosystem: Ecosystem) -> &[String] {
        match ecosystem {
            Ecosystem::Php => &self.php,
            Ecosystem::WordPress => &self.wordpress,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PhpConfig {
    /// Well-known install locations, tried in order.  Entries containing
    /// `*` are glob patterns.
    pub search_locations: Vec<String>,
    pub validate_timeout_ms: u64,
    pub detection_max_output: usize,
    pub extraction_timeout_ms: u64,
    pub extraction_max_output: usize,
}

impl Default for PhpConfig {
    fn default() -> Self {
        Self {
            search_locations: default_search_locations(),
            validate_timeout_ms: 5_000,
            detection_max_output: 1024 * 1024,
            extraction_timeout_ms: 60_000,
            extraction_max_output: 50 * 1024 * 1024,
        }
    }
}

impl PhpConfig {
    pub fn validate_timeout(&self) -> Duration {
        Duration::from_millis(self.validate_timeout_ms)
    }

    pub fn extraction_timeout(&self) -> Duration {
        Duration::from_millis(self.extraction_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Maximum number of items returned per completion query.
    pub max_results: usize,
    /// Try live extraction before the bundled catalogs on directory selection.
    pub prefer_live_extraction: bool,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            max_results: 100,
            prefer_live_extraction: false,
        }
    }
}

/// Platform-specific PHP install locations.
pub fn default_search_locations() -> Vec<String> {
    let locations: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/opt/homebrew/bin/php",
            "/usr/local/bin/php",
            "/usr/bin/php",
            "/Applications/MAMP/bin/php/php*/bin/php",
            "/Applications/XAMPP/bin/php",
        ]
    } else if cfg!(windows) {
        &[
            "C:\\php\\php.exe",
            "C:\\xampp\\php\\php.exe",
            "C:\\wamp\\bin\\php\\php*\\php.exe",
        ]
    } else {
        &["/usr/bin/php", "/usr/local/bin/php", "/opt/php/bin/php"]
    };
    locations.iter().map(|s| s.to_string()).collect()
}

impl Config {
    /// Read a config file.  A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Default location of `config.toml`, if a home directory exists.
    pub fn default_path() -> Option<PathBuf> {
        let strategy = etcetera::choose_base_strategy().ok()?;
        Some(strategy.config_dir().join(APP_DIR).join("config.toml"))
    }

    /// Catalog root: the configured one, else `data/` next to the executable.
    pub fn resolved_data_dir(&self) -> PathBuf {
        if let Some(dir) = &self.data_dir {
            return dir.clone();
        }
        std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(|p| p.join("data")))
            .unwrap_or_else(|| PathBuf::from("data"))
    }

    /// Store file: the configured one, else under the platform data dir.
    pub fn resolved_store_path(&self) -> PathBuf {
        if let Some(path) = &self.store_path {
            return path.clone();
        }
        etcetera::choose_base_strategy()
            .map(|s| s.data_dir().join(APP_DIR).join("store.json"))
            .unwrap_or_else(|_| PathBuf::from("wpshell-store.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.completion.max_results, 100);
        assert_eq!(config.fallback_versions.php[0], "8.3");
        assert_eq!(config.fallback_versions.wordpress.last().unwrap(), "6.0");
        assert_eq!(config.php.validate_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn fallback_lists_are_overridable() {
        let config = Config::parse(
            r#"
            [fallback_versions]
            wordpress = ["6.7", "6.6"]
            "#,
        )
        .unwrap();
        assert_eq!(
            config.fallback_versions.for_ecosystem(Ecosystem::WordPress),
            ["6.7", "6.6"]
        );
        // The other list keeps its default.
        assert_eq!(config.fallback_versions.php.len(), 5);
    }

    #[test]
    fn unknown_top_level_key_is_rejected() {
        assert!(Config::parse("no_such_key = 1").is_err());
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("config.toml")).unwrap();
        assert!(!config.completion.prefer_live_extraction);
    }
}
