use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;
use tower_lsp::{Client, ClientSocket, LspService};

pub mod catalog;
pub mod completion;
pub mod config;
pub mod detector;
pub mod error;
pub mod extractor;
pub mod process;
pub mod resolver;
pub mod store;
pub mod types;

mod rpc;
mod server;
mod util;

use completion::service::CompletionService;

/// Parameters of the directory-scoped custom requests.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryParams {
    pub directory: PathBuf,
}

/// Parameters of `wpshell/resolvePhpPath`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvePhpParams {
    #[serde(default)]
    pub force_fresh: bool,
}

/// Parameters of `wpshell/selectPhpBinary`.
#[derive(Debug, Clone, Deserialize)]
pub struct PhpBinaryParams {
    pub path: PathBuf,
}

pub struct Backend {
    name: String,
    version: String,
    open_files: Arc<Mutex<HashMap<String, String>>>,
    /// Root from `initialize`; selected automatically when it is a
    /// WordPress installation.
    workspace_root: Arc<Mutex<Option<PathBuf>>>,
    service: Arc<CompletionService>,
    client: Option<Client>,
}

impl Backend {
    pub fn new(client: Client, service: Arc<CompletionService>) -> Self {
        Self {
            client: Some(client),
            ..Self::new_test(service)
        }
    }

    /// A backend with no client attached.  Messages that would go to the
    /// editor are dropped.
    pub fn new_test(service: Arc<CompletionService>) -> Self {
        Self {
            name: "wpshell-lsp".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            open_files: Arc::new(Mutex::new(HashMap::new())),
            workspace_root: Arc::new(Mutex::new(None)),
            service,
            client: None,
        }
    }
}

/// Build the LSP service with the `wpshell/*` requests registered.
pub fn build_lsp_service(service: Arc<CompletionService>) -> (LspService<Backend>, ClientSocket) {
    LspService::build(move |client| Backend::new(client, Arc::clone(&service)))
        .custom_method("wpshell/getVersionInfo", Backend::get_version_info)
        .custom_method("wpshell/getCompletions", Backend::get_completions)
        .custom_method(
            "wpshell/clearCompletionCache",
            Backend::clear_completion_cache,
        )
        .custom_method(
            "wpshell/getFunctionDefinitions",
            Backend::get_function_definitions,
        )
        .custom_method("wpshell/selectDirectory", Backend::select_directory)
        .custom_method(
            "wpshell/selectRecentDirectory",
            Backend::select_recent_directory,
        )
        .custom_method(
            "wpshell/getRecentDirectories",
            Backend::get_recent_directories,
        )
        .custom_method("wpshell/resolvePhpPath", Backend::resolve_php_path)
        .custom_method("wpshell/selectPhpBinary", Backend::select_php_binary)
        .custom_method("wpshell/clearPhpPath", Backend::clear_php_path)
        .finish()
}
