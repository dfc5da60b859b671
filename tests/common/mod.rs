#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use wpshell_lsp::Backend;
use wpshell_lsp::completion::service::CompletionService;
use wpshell_lsp::config::Config;
use wpshell_lsp::store::{CUSTOM_PHP_PATH_KEY, CatalogStore, PHP_VERSION_KEY};

/// Everything a test needs on disk: bundled catalogs, a WordPress
/// installation, and (optionally) a fake PHP interpreter.
pub struct Fixture {
    pub data: tempfile::TempDir,
    pub site: tempfile::TempDir,
    pub bin: tempfile::TempDir,
    pub store: Arc<CatalogStore>,
}

impl Fixture {
    /// Bundled PHP 8.1 and WordPress 6.4 catalogs, and a site reporting
    /// WordPress `wp_version`.
    pub fn new(wp_version: Option<&str>) -> Self {
        let data = tempfile::tempdir().expect("failed to create temp dir");
        write_catalog(
            data.path(),
            "php",
            "8.1",
            &[
                ("array_map", "array array_map(?callable $callback, array $array, array ...$arrays)"),
                ("strlen", "int strlen(string $string)"),
                ("str_replace", "string|array str_replace(array|string $search, array|string $replace, string|array $subject, int &$count = null)"),
            ],
        );
        write_catalog(
            data.path(),
            "wordpress",
            "6.4",
            &[
                ("get_option", "mixed get_option(string $option, mixed $default_value = false)"),
                ("get_post", "WP_Post|array|null get_post(int|WP_Post|null $post = null, string $output = OBJECT)"),
                ("get_posts", "WP_Post[]|int[] get_posts(array $args = null)"),
                ("wp_insert_post", "int|WP_Error wp_insert_post(array $postarr, bool $wp_error = false)"),
            ],
        );

        let site = create_wordpress_site(wp_version);
        let bin = tempfile::tempdir().expect("failed to create temp dir");

        Fixture {
            data,
            site,
            bin,
            store: Arc::new(CatalogStore::in_memory()),
        }
    }

    pub fn config(&self) -> Config {
        Config {
            data_dir: Some(self.data.path().to_path_buf()),
            php: wpshell_lsp::config::PhpConfig {
                search_locations: Vec::new(),
                ..Default::default()
            },
            ..Config::default()
        }
    }

    pub fn service(&self) -> Arc<CompletionService> {
        Arc::new(CompletionService::new(Arc::clone(&self.store), &self.config()))
    }

    pub fn backend(&self) -> Backend {
        Backend::new_test(self.service())
    }

    /// A backend together with the service it serves from.
    pub fn backend_with_service(&self) -> (Backend, Arc<CompletionService>) {
        let service = self.service();
        (Backend::new_test(Arc::clone(&service)), service)
    }

    pub fn site_path(&self) -> PathBuf {
        self.site.path().to_path_buf()
    }

    /// Pretend PHP `version` was already detected, so no interpreter runs.
    pub fn with_cached_php_version(self, version: &str) -> Self {
        self.store.set_string(PHP_VERSION_KEY, version);
        self
    }

    /// Install a fake `php` printing `banner` for `-v` and store it as the
    /// user-confirmed path.
    #[cfg(unix)]
    pub fn with_fake_php(self, banner: &str) -> Self {
        let path = fake_php(self.bin.path(), "php", banner);
        self.store
            .set_string(CUSTOM_PHP_PATH_KEY, &path.to_string_lossy());
        self
    }
}

pub fn write_catalog(root: &Path, ecosystem: &str, version: &str, entries: &[(&str, &str)]) {
    let dir = root.join(ecosystem);
    fs::create_dir_all(&dir).expect("failed to create dirs");
    let functions: Vec<_> = entries
        .iter()
        .map(|(name, signature)| json!({ "name": name, "kind": "Function", "signature": signature, "source": "core" }))
        .collect();
    fs::write(
        dir.join(format!("{version}.json")),
        json!({ "functions": functions }).to_string(),
    )
    .expect("failed to write catalog");
}

/// A directory with `wp-config.php` and, when given, a `version.php`.
pub fn create_wordpress_site(wp_version: Option<&str>) -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    fs::write(dir.path().join("wp-config.php"), "<?php\n").expect("failed to write wp-config.php");
    if let Some(version) = wp_version {
        let includes = dir.path().join("wp-includes");
        fs::create_dir_all(&includes).expect("failed to create wp-includes");
        fs::write(
            includes.join("version.php"),
            format!("<?php\n$wp_version = '{version}';\n$wp_db_version = 56657;\n"),
        )
        .expect("failed to write version.php");
    }
    dir
}

/// Write an executable shell script that prints `banner` and exits 0.
#[cfg(unix)]
pub fn fake_php(dir: &Path, name: &str, banner: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\necho '{banner}'\n")).expect("failed to write fake php");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("failed to chmod");
    path
}

/// Like [`fake_php`], but any invocation other than `-v` prints
/// `definitions` (the extraction script's output).
#[cfg(unix)]
pub fn fake_php_with_definitions(dir: &Path, banner: &str, definitions: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("php");
    let script = format!(
        "#!/bin/sh\nif [ \"$1\" = \"-v\" ]; then\n  echo '{banner}'\nelse\n  cat <<'JSON'\n{definitions}\nJSON\nfi\n"
    );
    fs::write(&path, script).expect("failed to write fake php");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("failed to chmod");
    path
}

/// Like [`fake_php_with_definitions`], but the extraction output is read
/// from `definitions.json` in the working directory, i.e. the installation
/// being extracted.  An installation containing a `slow-extraction` file
/// makes the interpreter sleep for `delay_secs` first.
#[cfg(unix)]
pub fn fake_php_per_site(dir: &Path, banner: &str, delay_secs: u32) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("php");
    let script = format!(
        "#!/bin/sh\nif [ \"$1\" = \"-v\" ]; then\n  echo '{banner}'\n  exit 0\nfi\nif [ -f slow-extraction ]; then\n  sleep {delay_secs}\nfi\ncat definitions.json\n"
    );
    fs::write(&path, script).expect("failed to write fake php");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("failed to chmod");
    path
}

/// Extraction output declaring one WordPress function and `strtoupper`.
pub fn definitions_with(wordpress_function: &str) -> String {
    json!({
        "phpVersion": "8.1.5",
        "wpVersion": "6.4.2",
        "wordpressFunctions": [ { "name": wordpress_function, "params": [] } ],
        "phpFunctions": [ { "name": "strtoupper", "params": [ { "name": "string" } ] } ]
    })
    .to_string()
}

pub const PHP_81_BANNER: &str = "PHP 8.1.5 (cli) (built: Apr 21 2022 10:14:33) (NTS)";
