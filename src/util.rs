/// Utility functions for the wpshell language server.
///
/// Position helpers over open documents and client messaging.
use tower_lsp::lsp_types::*;

use crate::Backend;
use crate::completion::service::CompletionService;
use crate::types::VersionInfo;

/// Lines without terminators.  Unlike `str::lines`, a trailing newline
/// yields a final empty line, where the cursor of a fresh line sits.
fn lines(content: &str) -> impl Iterator<Item = &str> {
    content.split('\n').map(|l| l.strip_suffix('\r').unwrap_or(l))
}

fn nth_line(content: &str, n: usize) -> Option<&str> {
    lines(content).nth(n)
}

/// The text of line `position.line` up to `position.character`.  The
/// character offset counts chars; positions past the end of the line are
/// clamped to it.
pub(crate) fn line_prefix(content: &str, position: Position) -> Option<&str> {
    let line = nth_line(content, position.line as usize)?;
    let end = line
        .char_indices()
        .nth(position.character as usize)
        .map_or(line.len(), |(idx, _)| idx);
    Some(&line[..end])
}

/// Everything before `position`, across lines, so calls whose arguments
/// span several lines still resolve.
pub(crate) fn text_before_position(content: &str, position: Position) -> Option<String> {
    let mut before = String::new();
    for (i, line) in lines(content).enumerate() {
        if i == position.line as usize {
            before.push_str(line_prefix(line, Position::new(0, position.character))?);
            return Some(before);
        }
        before.push_str(line);
        before.push('\n');
    }
    None
}

/// The identifier under the cursor, if any.
pub(crate) fn word_at_position(content: &str, position: Position) -> Option<String> {
    let line = nth_line(content, position.line as usize)?;
    let chars: Vec<char> = line.chars().collect();
    let pos = position.character as usize;
    if pos > chars.len() {
        return None;
    }

    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let mut start = pos;
    let mut end = pos;
    while start > 0 && is_word(chars[start - 1]) {
        start -= 1;
    }
    while end < chars.len() && is_word(chars[end]) {
        end += 1;
    }

    (start < end).then(|| chars[start..end].iter().collect())
}

impl Backend {
    pub(crate) fn file_content(&self, uri: &Url) -> Option<String> {
        self.open_files.lock().get(uri.as_str()).cloned()
    }

    pub(crate) async fn log(&self, typ: MessageType, message: String) {
        if let Some(client) = &self.client {
            client.log_message(typ, message).await;
        }
    }

    pub(crate) async fn show_message(&self, typ: MessageType, message: String) {
        if let Some(client) = &self.client {
            client.show_message(typ, message).await;
        }
    }

    /// Tell the user which versions could not be detected.
    pub(crate) async fn warn_about_versions(&self, versions: &VersionInfo) {
        if let Some(message) = CompletionService::version_warning(versions) {
            tracing::warn!("{message}");
            self.show_message(MessageType::WARNING, message).await;
        }
    }
}
