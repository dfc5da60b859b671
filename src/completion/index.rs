//! In-memory completion index.
//!
//! Built once per directory selection from the PHP and WordPress catalogs
//! (PHP first, then WordPress; duplicates across the two are kept).  Each
//! entry carries its lowercased name and its pre-parsed signature so the
//! per-keystroke queries are plain scans with no parsing and no I/O.

use std::collections::HashMap;

use crate::catalog::signature::parse_signature;
use crate::types::{
    CallContext, Completions, Ecosystem, FunctionEntry, ParsedSignature, SignatureMatch,
};

#[derive(Debug, Clone)]
struct IndexedEntry {
    entry: FunctionEntry,
    ecosystem: Ecosystem,
    lower_name: String,
    signature: Option<ParsedSignature>,
}

#[derive(Debug, Clone)]
pub struct CompletionIndex {
    entries: Vec<IndexedEntry>,
    /// Lowercased name → position of its first occurrence.
    by_name: HashMap<String, usize>,
    max_results: usize,
}

impl CompletionIndex {
    pub fn build(completions: &Completions, max_results: usize) -> Self {
        let tagged = completions
            .php
            .iter()
            .map(|e| (e, Ecosystem::Php))
            .chain(completions.wordpress.iter().map(|e| (e, Ecosystem::WordPress)));

        let mut entries = Vec::with_capacity(completions.php.len() + completions.wordpress.len());
        let mut by_name = HashMap::new();
        for (entry, ecosystem) in tagged {
            let lower_name = entry.name.to_lowercase();
            by_name.entry(lower_name.clone()).or_insert(entries.len());
            entries.push(IndexedEntry {
                signature: parse_signature(&entry.signature),
                entry: entry.clone(),
                ecosystem,
                lower_name,
            });
        }

        Self {
            entries,
            by_name,
            max_results,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// Entries whose name starts with `prefix`, case-insensitively, in
    /// catalog order and capped at `max_results`.  An empty prefix matches
    /// nothing.
    pub fn complete(&self, prefix: &str) -> Vec<&FunctionEntry> {
        if prefix.is_empty() {
            return Vec::new();
        }
        let prefix = prefix.to_lowercase();
        self.entries
            .iter()
            .filter(|e| e.lower_name.starts_with(&prefix))
            .take(self.max_results)
            .map(|e| &e.entry)
            .collect()
    }

    /// Exact, case-insensitive lookup.  PHP entries win over WordPress
    /// entries of the same name.
    pub fn find(&self, name: &str) -> Option<&FunctionEntry> {
        self.find_indexed(name).map(|e| &e.entry)
    }

    /// The ecosystem an entry was loaded from.
    pub fn ecosystem_of(&self, name: &str) -> Option<Ecosystem> {
        self.find_indexed(name).map(|e| e.ecosystem)
    }

    fn find_indexed(&self, name: &str) -> Option<&IndexedEntry> {
        let idx = *self.by_name.get(&name.to_lowercase())?;
        self.entries.get(idx)
    }

    /// Resolve a call context to a signature with the active parameter
    /// clamped to the last valid index.  `None` when the function is
    /// unknown or its signature does not parse.
    pub fn signature_help(&self, context: &CallContext) -> Option<SignatureMatch<'_>> {
        let indexed = self.find_indexed(&context.function_name)?;
        let signature = indexed.signature.as_ref()?;
        let last = signature.parameters.len().saturating_sub(1);
        Some(SignatureMatch {
            entry: &indexed.entry,
            signature,
            active_parameter: context.active_parameter.min(last),
        })
    }
}
