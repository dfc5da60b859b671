mod common;

use common::Fixture;
use tower_lsp::LanguageServer;
use tower_lsp::lsp_types::*;
use wpshell_lsp::Backend;

/// Backend whose workspace root is a WordPress 6.4.2 site, initialized so
/// the site's catalogs are active.
async fn ready_backend(fixture: &Fixture) -> Backend {
    let backend = fixture.backend();
    let params = InitializeParams {
        root_uri: Some(Url::from_file_path(fixture.site.path()).unwrap()),
        ..InitializeParams::default()
    };
    backend.initialize(params).await.unwrap();
    backend.initialized(InitializedParams {}).await;
    backend
}

async fn open(backend: &Backend, text: &str) -> Url {
    let uri = Url::parse("file:///shell.php").unwrap();
    backend
        .did_open(DidOpenTextDocumentParams {
            text_document: TextDocumentItem {
                uri: uri.clone(),
                language_id: "php".to_string(),
                version: 1,
                text: text.to_string(),
            },
        })
        .await;
    uri
}

fn position_params(uri: &Url, line: u32, character: u32) -> TextDocumentPositionParams {
    TextDocumentPositionParams {
        text_document: TextDocumentIdentifier { uri: uri.clone() },
        position: Position { line, character },
    }
}

async fn complete(backend: &Backend, uri: &Url, line: u32, character: u32) -> Option<CompletionList> {
    let params = CompletionParams {
        text_document_position: position_params(uri, line, character),
        work_done_progress_params: WorkDoneProgressParams::default(),
        partial_result_params: PartialResultParams::default(),
        context: None,
    };
    match backend.completion(params).await.unwrap()? {
        CompletionResponse::List(list) => Some(list),
        CompletionResponse::Array(items) => Some(CompletionList {
            is_incomplete: false,
            items,
        }),
    }
}

async fn signature(backend: &Backend, uri: &Url, line: u32, character: u32) -> Option<SignatureHelp> {
    let params = SignatureHelpParams {
        context: None,
        text_document_position_params: position_params(uri, line, character),
        work_done_progress_params: WorkDoneProgressParams::default(),
    };
    backend.signature_help(params).await.unwrap()
}

// ─── Completion ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn prefix_completion_from_selected_site() {
    let fixture = Fixture::new(Some("6.4.2")).with_cached_php_version("8.1.5");
    let backend = ready_backend(&fixture).await;
    let uri = open(&backend, "<?php\n$posts = GET_PO").await;

    let list = complete(&backend, &uri, 1, 15).await.unwrap();
    let labels: Vec<&str> = list.items.iter().map(|i| i.label.as_str()).collect();
    assert_eq!(labels, vec!["get_post", "get_posts"]);
    assert!(!list.is_incomplete);

    let get_post = &list.items[0];
    assert_eq!(get_post.kind, Some(CompletionItemKind::FUNCTION));
    assert_eq!(get_post.insert_text_format, Some(InsertTextFormat::SNIPPET));
    assert_eq!(get_post.insert_text.as_deref(), Some("get_post()"));
    assert!(get_post.detail.as_deref().unwrap().contains("get_post("));
}

#[tokio::test]
async fn required_parameters_become_tab_stops() {
    let fixture = Fixture::new(Some("6.4.2")).with_cached_php_version("8.1.5");
    let backend = ready_backend(&fixture).await;
    let uri = open(&backend, "<?php\nwp_ins").await;

    let list = complete(&backend, &uri, 1, 6).await.unwrap();
    assert_eq!(list.items.len(), 1);
    assert_eq!(
        list.items[0].insert_text.as_deref(),
        Some("wp_insert_post(${1:postarr})")
    );
}

#[tokio::test]
async fn no_prefix_no_completions() {
    let fixture = Fixture::new(Some("6.4.2")).with_cached_php_version("8.1.5");
    let backend = ready_backend(&fixture).await;
    let uri = open(&backend, "<?php\necho ").await;

    assert!(complete(&backend, &uri, 1, 5).await.is_none());
}

#[tokio::test]
async fn results_are_capped_and_marked_incomplete() {
    let fixture = Fixture::new(Some("6.4.2")).with_cached_php_version("8.1.5");
    let many: Vec<(String, String)> = (0..250)
        .map(|i| (format!("wp_cap_{i:03}"), format!("void wp_cap_{i:03}()")))
        .collect();
    let rows: Vec<(&str, &str)> = many.iter().map(|(n, s)| (n.as_str(), s.as_str())).collect();
    common::write_catalog(fixture.data.path(), "wordpress", "6.4", &rows);

    let backend = ready_backend(&fixture).await;
    let uri = open(&backend, "<?php\nwp_cap").await;

    let list = complete(&backend, &uri, 1, 6).await.unwrap();
    assert_eq!(list.items.len(), 100);
    assert!(list.is_incomplete);
    assert_eq!(list.items[0].label, "wp_cap_000");
    assert_eq!(list.items[99].label, "wp_cap_099");
}

#[tokio::test]
async fn completion_without_selected_site_is_none() {
    let fixture = Fixture::new(Some("6.4.2"));
    let backend = fixture.backend();
    backend.initialize(InitializeParams::default()).await.unwrap();
    let uri = open(&backend, "<?php\nget_").await;

    assert!(complete(&backend, &uri, 1, 4).await.is_none());
}

// ─── Signature help ─────────────────────────────────────────────────────────

#[tokio::test]
async fn signature_help_tracks_active_parameter() {
    let fixture = Fixture::new(Some("6.4.2")).with_cached_php_version("8.1.5");
    let backend = ready_backend(&fixture).await;
    let uri = open(&backend, "<?php\n$v = get_option('siteurl', ").await;

    let help = signature(&backend, &uri, 1, 27).await.unwrap();
    assert_eq!(help.active_parameter, Some(1));
    let sig = &help.signatures[0];
    assert_eq!(
        sig.label,
        "mixed get_option(string $option, mixed $default_value = false)"
    );
    assert_eq!(sig.parameters.as_ref().unwrap().len(), 2);
}

#[tokio::test]
async fn signature_help_spans_lines_and_skips_nested_calls() {
    let fixture = Fixture::new(Some("6.4.2")).with_cached_php_version("8.1.5");
    let backend = ready_backend(&fixture).await;
    let text = "<?php\n$s = str_replace(\n    array_map('trim', $a),\n    ";
    let uri = open(&backend, text).await;

    let help = signature(&backend, &uri, 3, 4).await.unwrap();
    assert!(help.signatures[0].label.contains("str_replace("));
    assert_eq!(help.active_parameter, Some(1));
}

#[tokio::test]
async fn signature_help_clamps_past_last_parameter() {
    let fixture = Fixture::new(Some("6.4.2")).with_cached_php_version("8.1.5");
    let backend = ready_backend(&fixture).await;
    let uri = open(&backend, "<?php\nstrlen($a, $b, ").await;

    let help = signature(&backend, &uri, 1, 15).await.unwrap();
    assert_eq!(help.active_parameter, Some(0));
}

#[tokio::test]
async fn unknown_function_has_no_signature() {
    let fixture = Fixture::new(Some("6.4.2")).with_cached_php_version("8.1.5");
    let backend = ready_backend(&fixture).await;
    let uri = open(&backend, "<?php\nmy_own_helper(").await;

    assert!(signature(&backend, &uri, 1, 14).await.is_none());
}

// ─── Hover ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn hover_shows_signature() {
    let fixture = Fixture::new(Some("6.4.2")).with_cached_php_version("8.1.5");
    let backend = ready_backend(&fixture).await;
    let uri = open(&backend, "<?php\n$n = strlen($s);").await;

    let hover = backend
        .hover(HoverParams {
            text_document_position_params: position_params(&uri, 1, 7),
            work_done_progress_params: WorkDoneProgressParams::default(),
        })
        .await
        .unwrap()
        .unwrap();
    let HoverContents::Markup(markup) = hover.contents else {
        panic!("expected markup hover");
    };
    assert!(markup.value.contains("int strlen(string $string)"));
    assert!(markup.value.contains("PHP"));
}
