//! Completion service.
//!
//! Orchestrates detection, catalog loading (bundled or live), and caching,
//! and owns the in-memory [`CompletionIndex`] that answers per-keystroke
//! queries.  Every operation returns a value, possibly empty or the fixed
//! fallback set; only directory and binary selection report errors.
//!
//! Directory selections are tagged with a generation number.  A load whose
//! tag is no longer current when it finishes neither writes its catalogs to
//! the store nor replaces the active index.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::catalog::fallback::fallback_completions;
use crate::catalog::loader::{CatalogLoader, major_minor};
use crate::completion::index::CompletionIndex;
use crate::config::{CompletionConfig, Config};
use crate::detector::{VersionDetector, is_wordpress_installation};
use crate::error::{DirectoryError, ResolveError};
use crate::extractor::{DefinitionExtractor, FunctionDefinitions};
use crate::process::Limits;
use crate::resolver::PhpResolver;
use crate::store::{CatalogStore, directory_key, php_functions_key, wp_functions_key};
use crate::types::{Catalog, ClearCacheResult, Completions, Ecosystem, VersionInfo};

/// Identifies the directory selection a load was issued for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTag {
    pub generation: u64,
    pub directory: PathBuf,
}

pub struct CompletionService {
    store: Arc<CatalogStore>,
    resolver: Arc<PhpResolver>,
    detector: VersionDetector,
    loader: CatalogLoader,
    extractor: DefinitionExtractor,
    config: CompletionConfig,
    generation: AtomicU64,
    selected: RwLock<Option<PathBuf>>,
    active: RwLock<Option<Arc<CompletionIndex>>>,
}

fn catalog_key(ecosystem: Ecosystem, directory: &Path, version: &str) -> String {
    match ecosystem {
        Ecosystem::Php => php_functions_key(version),
        Ecosystem::WordPress => wp_functions_key(&directory_key(directory), version),
    }
}

impl CompletionService {
    pub fn new(store: Arc<CatalogStore>, config: &Config) -> Self {
        let resolver = Arc::new(PhpResolver::new(
            Arc::clone(&store),
            config.php.search_locations.clone(),
            config.php.validate_timeout(),
        ));
        let detector = VersionDetector::new(
            Arc::clone(&store),
            Arc::clone(&resolver),
            Limits {
                timeout: config.php.validate_timeout(),
                max_output: config.php.detection_max_output,
            },
        );
        let extractor = DefinitionExtractor::new(
            Arc::clone(&resolver),
            Limits {
                timeout: config.php.extraction_timeout(),
                max_output: config.php.extraction_max_output,
            },
        );
        let loader = CatalogLoader::new(
            config.resolved_data_dir(),
            config.fallback_versions.clone(),
        );

        Self {
            store,
            resolver,
            detector,
            loader,
            extractor,
            config: config.completion.clone(),
            generation: AtomicU64::new(0),
            selected: RwLock::new(None),
            active: RwLock::new(None),
        }
    }

    pub fn store(&self) -> &Arc<CatalogStore> {
        &self.store
    }

    /// The index built by the last directory selection that completed
    /// while still current.
    pub fn active_index(&self) -> Option<Arc<CompletionIndex>> {
        self.active.read().clone()
    }

    // ─── Queries ────────────────────────────────────────────────────────

    pub async fn get_version_info(&self, directory: &Path) -> VersionInfo {
        self.detector.version_info(directory).await
    }

    /// Both catalogs for `versions`, from the store when cached, otherwise
    /// from the bundled data (and then cached).
    pub async fn get_all_completions(&self, directory: &Path, versions: &VersionInfo) -> Completions {
        self.load_catalogs(directory, versions, None).await
    }

    /// Detect versions and return the matching catalogs.  When neither
    /// version is detectable the fixed fallback set is returned.
    pub async fn get_completions(&self, directory: &Path) -> Completions {
        let versions = self.get_version_info(directory).await;
        if versions.is_empty() {
            warn!(
                "No PHP or WordPress version detected for {}, using fallback completions",
                directory.display()
            );
            return fallback_completions();
        }
        self.get_all_completions(directory, &versions).await
    }

    pub fn get_fallback_completions(&self) -> Completions {
        fallback_completions()
    }

    pub async fn get_function_definitions(&self, directory: &Path) -> Option<FunctionDefinitions> {
        self.extractor.extract(directory).await
    }

    /// Drop every cached WordPress entry for `directory`.
    pub async fn clear_completion_cache(&self, directory: &Path) -> ClearCacheResult {
        let removed = self.store.clear_for_directory(&directory_key(directory));
        info!("Cleared {removed} cached entries for {}", directory.display());
        match self.store.flush_async().await {
            Ok(()) => ClearCacheResult {
                success: true,
                error: None,
            },
            Err(e) => ClearCacheResult {
                success: false,
                error: Some(e.to_string()),
            },
        }
    }

    /// Warning to show the user for partially or wholly undetected
    /// versions.
    pub fn version_warning(versions: &VersionInfo) -> Option<String> {
        match (&versions.php, &versions.wordpress) {
            (Some(_), Some(_)) => None,
            (None, None) => Some(
                "Could not detect the PHP or WordPress version. Using basic fallback completions."
                    .to_string(),
            ),
            (None, Some(_)) => Some(
                "Could not detect the PHP version. Only WordPress completions are available."
                    .to_string(),
            ),
            (Some(_), None) => Some(
                "Could not detect the WordPress version. Only PHP completions are available."
                    .to_string(),
            ),
        }
    }

    // ─── Directory selection ────────────────────────────────────────────

    /// Make `directory` the active installation: record it as recent, load
    /// its catalogs, and install the completion index.
    pub async fn select_directory(&self, directory: &Path) -> Result<Completions, DirectoryError> {
        if !is_wordpress_installation(directory).await {
            return Err(DirectoryError::NotWordPress(directory.to_path_buf()));
        }
        self.store.add_recent_directory(&directory_key(directory));

        let tag = self.begin_load(directory);
        info!(
            "Loading completions for {} (generation {})",
            directory.display(),
            tag.generation
        );

        let versions = self.get_version_info(directory).await;
        let completions = if versions.is_empty() {
            warn!("No versions detected for {}, using fallback completions", directory.display());
            fallback_completions()
        } else if self.config.prefer_live_extraction {
            match self.load_live(directory, &versions, &tag).await {
                Some(live) => live,
                None => self.load_catalogs(directory, &versions, Some(&tag)).await,
            }
        } else {
            self.load_catalogs(directory, &versions, Some(&tag)).await
        };

        if self.is_current(&tag) {
            let index = CompletionIndex::build(&completions, self.config.max_results);
            debug!("Installed completion index with {} entries", index.len());
            *self.active.write() = Some(Arc::new(index));
        } else {
            debug!(
                "Discarding completions for superseded selection {}",
                tag.directory.display()
            );
        }
        Ok(completions)
    }

    /// Like [`select_directory`](Self::select_directory), but a directory
    /// that is no longer an installation is dropped from the recent list.
    pub async fn select_recent_directory(
        &self,
        directory: &Path,
    ) -> Result<Completions, DirectoryError> {
        if !is_wordpress_installation(directory).await {
            self.store.remove_recent_directory(&directory_key(directory));
            return Err(DirectoryError::NoLongerWordPress(directory.to_path_buf()));
        }
        self.select_directory(directory).await
    }

    pub fn recent_directories(&self) -> Vec<String> {
        self.store.recent_directories()
    }

    // ─── PHP binary ─────────────────────────────────────────────────────

    pub async fn resolve_php_path(&self, force_fresh: bool) -> Option<String> {
        self.resolver.resolve(force_fresh).await
    }

    pub async fn select_php_binary(&self, path: &Path) -> Result<String, ResolveError> {
        self.resolver.select_path(path).await
    }

    pub fn clear_php_path(&self) {
        self.resolver.clear_path();
    }

    // ─── Loading ────────────────────────────────────────────────────────

    /// Start a new selection, superseding any load still in flight.
    pub fn begin_load(&self, directory: &Path) -> LoadTag {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.selected.write() = Some(directory.to_path_buf());
        LoadTag {
            generation,
            directory: directory.to_path_buf(),
        }
    }

    /// A tag is current while no later selection has started and its
    /// directory is still the selected one.
    pub fn is_current(&self, tag: &LoadTag) -> bool {
        self.generation.load(Ordering::SeqCst) == tag.generation
            && self.selected.read().as_deref() == Some(tag.directory.as_path())
    }

    async fn load_catalogs(
        &self,
        directory: &Path,
        versions: &VersionInfo,
        tag: Option<&LoadTag>,
    ) -> Completions {
        let (php, wordpress) = tokio::join!(
            self.discover(Ecosystem::Php, directory, versions.php.as_deref(), tag),
            self.discover(Ecosystem::WordPress, directory, versions.wordpress.as_deref(), tag),
        );
        Completions {
            php,
            wordpress,
            versions: versions.clone(),
        }
    }

    /// One ecosystem's catalog: store first, bundled data on a miss.
    async fn discover(
        &self,
        ecosystem: Ecosystem,
        directory: &Path,
        version: Option<&str>,
        tag: Option<&LoadTag>,
    ) -> Catalog {
        let Some(version) = version else {
            return Catalog::new();
        };
        let Some(short) = major_minor(version) else {
            warn!("Invalid {ecosystem} version format: {version}");
            return Catalog::new();
        };

        let key = catalog_key(ecosystem, directory, short);
        if let Some(cached) = self.store.get_catalog(&key) {
            debug!("Cache hit for {key} ({} entries)", cached.len());
            return cached;
        }

        let catalog = self.loader.load(ecosystem, version).await;
        self.cache_catalog(&key, &catalog, tag);
        catalog
    }

    /// Convert a live extraction into both catalogs.  `None` when the
    /// extraction fails or produces nothing.
    async fn load_live(
        &self,
        directory: &Path,
        detected: &VersionInfo,
        tag: &LoadTag,
    ) -> Option<Completions> {
        let definitions = self.extractor.extract(directory).await?;
        let reported = definitions.versions();
        let versions = VersionInfo {
            php: detected.php.clone().or(reported.php),
            wordpress: detected.wordpress.clone().or(reported.wordpress),
        };

        let php = definitions.php_catalog();
        let wordpress = definitions.wordpress_catalog();
        if php.is_empty() && wordpress.is_empty() {
            warn!("Live extraction for {} produced no functions", directory.display());
            return None;
        }

        if let Some(v) = versions.php.as_deref().and_then(major_minor) {
            self.cache_catalog(&catalog_key(Ecosystem::Php, directory, v), &php, Some(tag));
        }
        if let Some(v) = versions.wordpress.as_deref().and_then(major_minor) {
            self.cache_catalog(
                &catalog_key(Ecosystem::WordPress, directory, v),
                &wordpress,
                Some(tag),
            );
        }

        Some(Completions {
            php,
            wordpress,
            versions,
        })
    }

    fn cache_catalog(&self, key: &str, catalog: &Catalog, tag: Option<&LoadTag>) {
        if let Some(tag) = tag
            && !self.is_current(tag)
        {
            debug!(
                "Not caching {key}: selection of {} was superseded",
                tag.directory.display()
            );
            return;
        }
        if self.store.set_catalog(key, catalog) {
            debug!("Cached {} entries under {key}", catalog.len());
        }
    }
}
