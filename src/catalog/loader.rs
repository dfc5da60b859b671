//! Bundled catalog loading.
//!
//! Catalogs live at `<data_dir>/<ecosystem>/<major.minor>.json` as
//! `{ "functions": [ ... ] }`.  A version without its own file falls back
//! to the first existing file in the ecosystem's configured list of known
//! versions (newest first).  Every failure yields an empty catalog; this
//! path never calls the interpreter.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::catalog::normalize_entry;
use crate::config::FallbackVersions;
use crate::types::{Catalog, Ecosystem, FunctionEntry};

static MAJOR_MINOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+\.\d+)").expect("static regex"));

/// Reduce a full version to its `major.minor` form (`"8.1.5"` → `"8.1"`).
/// Returns `None` when the string does not start with two numeric groups.
pub fn major_minor(version: &str) -> Option<&str> {
    MAJOR_MINOR
        .captures(version)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

pub struct CatalogLoader {
    data_dir: PathBuf,
    fallbacks: FallbackVersions,
}

impl CatalogLoader {
    pub fn new(data_dir: impl Into<PathBuf>, fallbacks: FallbackVersions) -> Self {
        Self {
            data_dir: data_dir.into(),
            fallbacks,
        }
    }

    fn catalog_path(&self, ecosystem: Ecosystem, version: &str) -> PathBuf {
        self.data_dir
            .join(ecosystem.data_dir_name())
            .join(format!("{version}.json"))
    }

    /// Load the catalog for `full_version` (e.g. `"8.1.5"`).
    pub async fn load(&self, ecosystem: Ecosystem, full_version: &str) -> Catalog {
        let Some(version) = major_minor(full_version) else {
            warn!("Invalid {ecosystem} version format: {full_version}");
            return Catalog::new();
        };

        let Some(path) = self.find_catalog_file(ecosystem, version).await else {
            warn!("No {ecosystem} catalog found for {version} or any fallback version");
            return Catalog::new();
        };

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) => {
                warn!("Error reading {}: {e}", path.display());
                return Catalog::new();
            }
        };

        match parse_catalog(&content) {
            Some(catalog) => {
                info!(
                    "Loaded {} {ecosystem} functions from {}",
                    catalog.len(),
                    path.display()
                );
                catalog
            }
            None => {
                warn!("Invalid data structure in {}", path.display());
                Catalog::new()
            }
        }
    }

    /// The exact file for `version`, else the first existing fallback.
    async fn find_catalog_file(&self, ecosystem: Ecosystem, version: &str) -> Option<PathBuf> {
        let exact = self.catalog_path(ecosystem, version);
        if is_file(&exact).await {
            return Some(exact);
        }
        debug!("{ecosystem} {version} data file not found, trying fallback versions");

        for fallback in self.fallbacks.for_ecosystem(ecosystem) {
            let path = self.catalog_path(ecosystem, fallback);
            if is_file(&path).await {
                info!("Using fallback {ecosystem} {fallback} data for {version}");
                return Some(path);
            }
        }
        None
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|m| m.is_file())
}

/// Parse a catalog document.  Returns `None` when the JSON is malformed or
/// has no `functions` array.  Individual records that are not valid entries
/// are skipped.
pub fn parse_catalog(content: &str) -> Option<Catalog> {
    let document: Value = serde_json::from_str(content).ok()?;
    let Value::Array(records) = document.get("functions")?.clone() else {
        return None;
    };

    let total = records.len();
    let catalog: Catalog = records
        .into_iter()
        .filter_map(|record| serde_json::from_value::<FunctionEntry>(record).ok())
        .filter_map(normalize_entry)
        .collect();

    if catalog.len() < total {
        debug!("Skipped {} malformed catalog records", total - catalog.len());
    }
    Some(catalog)
}
