/// Custom `wpshell/*` JSON-RPC requests.
///
/// These expose the completion service directly to a client that manages
/// its own editor (directory pickers, cache buttons, PHP path prompts).
/// Selection failures come back as `invalid_params` errors carrying the
/// message to show the user.
use std::fmt::Display;

use tower_lsp::jsonrpc::{Error, Result};
use tower_lsp::lsp_types::MessageType;

use crate::extractor::FunctionDefinitions;
use crate::types::{ClearCacheResult, Completions, VersionInfo};
use crate::{Backend, DirectoryParams, PhpBinaryParams, ResolvePhpParams};

fn invalid_params(err: impl Display) -> Error {
    Error::invalid_params(err.to_string())
}

impl Backend {
    pub async fn get_version_info(&self, params: DirectoryParams) -> Result<VersionInfo> {
        Ok(self.service.get_version_info(&params.directory).await)
    }

    pub async fn get_completions(&self, params: DirectoryParams) -> Result<Completions> {
        let completions = self.service.get_completions(&params.directory).await;
        self.warn_about_versions(&completions.versions).await;
        Ok(completions)
    }

    pub async fn clear_completion_cache(
        &self,
        params: DirectoryParams,
    ) -> Result<ClearCacheResult> {
        Ok(self.service.clear_completion_cache(&params.directory).await)
    }

    /// `null` when extraction fails.
    pub async fn get_function_definitions(
        &self,
        params: DirectoryParams,
    ) -> Result<Option<FunctionDefinitions>> {
        Ok(self
            .service
            .get_function_definitions(&params.directory)
            .await)
    }

    pub async fn select_directory(&self, params: DirectoryParams) -> Result<Completions> {
        let completions = self
            .service
            .select_directory(&params.directory)
            .await
            .map_err(invalid_params)?;
        self.warn_about_versions(&completions.versions).await;
        Ok(completions)
    }

    pub async fn select_recent_directory(&self, params: DirectoryParams) -> Result<Completions> {
        let completions = self
            .service
            .select_recent_directory(&params.directory)
            .await
            .map_err(invalid_params)?;
        self.warn_about_versions(&completions.versions).await;
        Ok(completions)
    }

    pub async fn get_recent_directories(&self) -> Result<Vec<String>> {
        Ok(self.service.recent_directories())
    }

    /// `null` tells the client to ask the user for a binary.
    pub async fn resolve_php_path(&self, params: ResolvePhpParams) -> Result<Option<String>> {
        let path = self.service.resolve_php_path(params.force_fresh).await;
        if path.is_none() {
            self.show_message(
                MessageType::WARNING,
                "PHP was not found automatically. Please select the PHP executable.".to_string(),
            )
            .await;
        }
        Ok(path)
    }

    pub async fn select_php_binary(&self, params: PhpBinaryParams) -> Result<String> {
        self.service
            .select_php_binary(&params.path)
            .await
            .map_err(invalid_params)
    }

    pub async fn clear_php_path(&self) -> Result<()> {
        self.service.clear_php_path();
        Ok(())
    }
}
