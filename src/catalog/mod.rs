//! Function catalogs.
//!
//! - **loader**: bundled, version-keyed JSON catalogs with fallback chains
//! - **signature**: parsing signature display strings into parameters
//! - **fallback**: the small built-in catalog used when nothing is detected

pub mod fallback;
pub mod loader;
pub mod signature;

use crate::types::FunctionEntry;

/// Build a snippet calling `name` with one tab-stop per required parameter:
/// `get_option(${1:option})`, or `name()` when none are required.
pub fn snippet_for<'a>(name: &str, parameters: impl IntoIterator<Item = &'a str>) -> String {
    let placeholders: Vec<String> = parameters
        .into_iter()
        .filter(|p| signature::is_required(p))
        .enumerate()
        .map(|(i, p)| format!("${{{}:{}}}", i + 1, signature::parameter_name(p)))
        .collect();
    format!("{}({})", name, placeholders.join(", "))
}

/// Make an entry usable for completion.  Returns `None` for entries without
/// a name; fills in a missing `insertText` from the signature.
pub fn normalize_entry(mut entry: FunctionEntry) -> Option<FunctionEntry> {
    entry.name = entry.name.trim().to_string();
    if entry.name.is_empty() {
        return None;
    }
    if entry.insert_text.trim().is_empty() {
        let params: Vec<String> = signature::parse_signature(&entry.signature)
            .map(|sig| sig.parameters.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        entry.insert_text = snippet_for(&entry.name, params.iter().map(String::as_str));
    }
    Some(entry)
}
