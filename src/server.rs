/// LSP server trait implementation.
///
/// This module contains the `impl LanguageServer for Backend` block,
/// which handles the standard protocol messages (initialize, didOpen,
/// didChange, didClose, completion, signatureHelp, hover, shutdown).
/// Every query reads the active completion index only; nothing here
/// touches the disk or spawns processes except `initialized`, which may
/// select the workspace root, and `shutdown`, which flushes the store.
use tower_lsp::LanguageServer;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tracing::{debug, error, info};

use crate::Backend;
use crate::completion::context::{call_context, word_prefix};
use crate::detector::is_wordpress_installation;
use crate::types::{FunctionEntry, FunctionKind};
use crate::util::{line_prefix, text_before_position, word_at_position};

fn completion_kind(kind: FunctionKind) -> CompletionItemKind {
    match kind {
        FunctionKind::Function => CompletionItemKind::FUNCTION,
        FunctionKind::Variable => CompletionItemKind::VARIABLE,
        FunctionKind::Keyword => CompletionItemKind::KEYWORD,
        FunctionKind::Constant => CompletionItemKind::CONSTANT,
    }
}

fn markdown(value: String) -> MarkupContent {
    MarkupContent {
        kind: MarkupKind::Markdown,
        value,
    }
}

fn completion_item(position: usize, entry: &FunctionEntry) -> CompletionItem {
    CompletionItem {
        label: entry.name.clone(),
        kind: Some(completion_kind(entry.kind)),
        detail: (!entry.signature.is_empty()).then(|| entry.signature.clone()),
        documentation: (!entry.documentation.is_empty())
            .then(|| Documentation::MarkupContent(markdown(entry.documentation.clone()))),
        insert_text: Some(entry.insert_text.clone()),
        insert_text_format: Some(InsertTextFormat::SNIPPET),
        filter_text: Some(entry.name.clone()),
        // Keep catalog order in the client.
        sort_text: Some(format!("{position:05}")),
        ..CompletionItem::default()
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        let workspace_root = params
            .root_uri
            .as_ref()
            .and_then(|uri| uri.to_file_path().ok());
        *self.workspace_root.lock() = workspace_root;

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                completion_provider: Some(CompletionOptions {
                    resolve_provider: Some(false),
                    ..CompletionOptions::default()
                }),
                signature_help_provider: Some(SignatureHelpOptions {
                    trigger_characters: Some(vec!["(".to_string(), ",".to_string()]),
                    retrigger_characters: Some(vec![",".to_string()]),
                    work_done_progress_options: WorkDoneProgressOptions {
                        work_done_progress: None,
                    },
                }),
                hover_provider: Some(HoverProviderCapability::Simple(true)),
                text_document_sync: Some(TextDocumentSyncCapability::Kind(
                    TextDocumentSyncKind::FULL,
                )),
                ..ServerCapabilities::default()
            },
            server_info: Some(ServerInfo {
                name: self.name.clone(),
                version: Some(self.version.clone()),
            }),
            ..InitializeResult::default()
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        let workspace_root = self.workspace_root.lock().clone();

        let Some(root) = workspace_root else {
            self.log(MessageType::INFO, "wpshell-lsp initialized".to_string())
                .await;
            return;
        };

        if !is_wordpress_installation(&root).await {
            self.log(
                MessageType::INFO,
                format!(
                    "wpshell-lsp initialized; {} is not a WordPress installation",
                    root.display()
                ),
            )
            .await;
            return;
        }

        match self.service.select_directory(&root).await {
            Ok(completions) => {
                self.warn_about_versions(&completions.versions).await;
                self.log(
                    MessageType::INFO,
                    format!(
                        "wpshell-lsp initialized! Loaded {} PHP and {} WordPress functions for {}",
                        completions.php.len(),
                        completions.wordpress.len(),
                        root.display()
                    ),
                )
                .await;
            }
            Err(e) => {
                self.show_message(MessageType::ERROR, e.to_string()).await;
            }
        }
    }

    async fn shutdown(&self) -> Result<()> {
        if let Err(e) = self.service.store().flush_async().await {
            error!("Failed to flush store on shutdown: {e}");
        }
        info!("Shut down");
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        let uri = doc.uri.to_string();
        self.open_files.lock().insert(uri.clone(), doc.text);
        debug!("Opened file: {uri}");
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri.to_string();
        if let Some(change) = params.content_changes.into_iter().next() {
            self.open_files.lock().insert(uri, change.text);
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri.to_string();
        self.open_files.lock().remove(&uri);
        debug!("Closed file: {uri}");
    }

    async fn completion(&self, params: CompletionParams) -> Result<Option<CompletionResponse>> {
        let uri = &params.text_document_position.text_document.uri;
        let position = params.text_document_position.position;

        let Some(index) = self.service.active_index() else {
            return Ok(None);
        };
        let Some(content) = self.file_content(uri) else {
            return Ok(None);
        };
        let Some(line) = line_prefix(&content, position) else {
            return Ok(None);
        };

        let matches = index.complete(word_prefix(line));
        if matches.is_empty() {
            return Ok(None);
        }

        let is_incomplete = matches.len() >= index.max_results();
        let items = matches
            .into_iter()
            .enumerate()
            .map(|(i, entry)| completion_item(i, entry))
            .collect();

        Ok(Some(CompletionResponse::List(CompletionList {
            is_incomplete,
            items,
        })))
    }

    async fn signature_help(&self, params: SignatureHelpParams) -> Result<Option<SignatureHelp>> {
        let uri = &params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        let Some(index) = self.service.active_index() else {
            return Ok(None);
        };
        let Some(before) = self
            .file_content(uri)
            .and_then(|content| text_before_position(&content, position))
        else {
            return Ok(None);
        };
        let Some(found) = call_context(&before).and_then(|ctx| index.signature_help(&ctx)) else {
            return Ok(None);
        };

        let parameters = found
            .signature
            .parameters
            .iter()
            .map(|p| ParameterInformation {
                label: ParameterLabel::Simple(p.text.clone()),
                documentation: None,
            })
            .collect();
        let active_parameter = found.active_parameter as u32;
        let signature = SignatureInformation {
            label: found.entry.signature.clone(),
            documentation: (!found.entry.documentation.is_empty())
                .then(|| Documentation::MarkupContent(markdown(found.entry.documentation.clone()))),
            parameters: Some(parameters),
            active_parameter: Some(active_parameter),
        };

        Ok(Some(SignatureHelp {
            signatures: vec![signature],
            active_signature: Some(0),
            active_parameter: Some(active_parameter),
        }))
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = &params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;

        let Some(index) = self.service.active_index() else {
            return Ok(None);
        };
        let Some(word) = self
            .file_content(uri)
            .and_then(|content| word_at_position(&content, position))
        else {
            return Ok(None);
        };
        let Some(entry) = index.find(&word) else {
            return Ok(None);
        };

        let mut value = String::new();
        if !entry.signature.is_empty() {
            value.push_str(&format!("```php\n{}\n```\n", entry.signature));
        }
        if !entry.documentation.is_empty() {
            value.push_str(&format!("\n{}\n", entry.documentation));
        }
        if let Some(ecosystem) = index.ecosystem_of(&word) {
            value.push_str(&format!("\n*{ecosystem}* · `{}`", entry.source));
        }

        Ok(Some(Hover {
            contents: HoverContents::Markup(markdown(value)),
            range: None,
        }))
    }
}
