//! Data types used throughout the WP Shell completion server.
//!
//! This module contains the "model" structs and enums that describe function
//! catalogs (entries, kinds, parsed signatures), detected versions, and the
//! payloads returned to the editor through the custom requests.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the two symbol universes merged for completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    /// The PHP runtime's built-in functions.
    Php,
    /// Functions defined by WordPress core.
    WordPress,
}

impl Ecosystem {
    /// Directory name used for bundled catalogs (`<data_dir>/<dir>/<ver>.json`).
    pub fn data_dir_name(self) -> &'static str {
        match self {
            Ecosystem::Php => "php",
            Ecosystem::WordPress => "wordpress",
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ecosystem::Php => f.write_str("PHP"),
            Ecosystem::WordPress => f.write_str("WordPress"),
        }
    }
}

/// Presentation tag of a catalog entry.
///
/// Catalog files carry this as a free-form string (`"Function"`,
/// `"variable"`, ...).  Unknown tags fall back to `Function`, since every
/// catalog record describes something callable unless stated otherwise.
/// Mapping to an editor's own vocabulary happens in `server.rs` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FunctionKind {
    #[default]
    Function,
    Variable,
    Keyword,
    Constant,
}

impl From<String> for FunctionKind {
    fn from(tag: String) -> Self {
        match tag.to_ascii_lowercase().as_str() {
            "variable" => FunctionKind::Variable,
            "keyword" => FunctionKind::Keyword,
            "constant" => FunctionKind::Constant,
            _ => FunctionKind::Function,
        }
    }
}

impl From<FunctionKind> for String {
    fn from(kind: FunctionKind) -> Self {
        match kind {
            FunctionKind::Function => "Function",
            FunctionKind::Variable => "Variable",
            FunctionKind::Keyword => "Keyword",
            FunctionKind::Constant => "Constant",
        }
        .to_string()
    }
}

/// One completion candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionEntry {
    /// The function name (e.g. `"get_posts"`).  Older catalogs call this
    /// field `label`.
    #[serde(alias = "label")]
    pub name: String,
    #[serde(default)]
    pub kind: FunctionKind,
    #[serde(default)]
    pub documentation: String,
    /// Snippet inserted on accept, with `${n:param}` placeholders.
    #[serde(default)]
    pub insert_text: String,
    /// Human-readable `returnType name(params)` string.  Older catalogs call
    /// this field `detail`.
    #[serde(default, alias = "detail")]
    pub signature: String,
    /// Provenance: `"core"`, an extension name, or the defining file.
    #[serde(default)]
    pub source: String,
}

/// Catalog of function entries for one (ecosystem, version) pair.
///
/// Catalogs are never mutated in place; a refresh replaces the whole value.
pub type Catalog = Vec<FunctionEntry>;

/// One parameter of a parsed signature, kept as display text
/// (e.g. `"callable $cb = null"`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureParameter {
    pub text: String,
}

/// A signature string split into its return type and ordered parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedSignature {
    /// The return type, when the signature spells one out.
    pub return_type: Option<String>,
    pub function_name: String,
    pub parameters: Vec<SignatureParameter>,
}

/// Detected PHP and WordPress versions.  Either may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub php: Option<String>,
    pub wordpress: Option<String>,
}

impl VersionInfo {
    /// True when neither version could be detected.
    pub fn is_empty(&self) -> bool {
        self.php.is_none() && self.wordpress.is_none()
    }
}

/// Result of `wpshell/getCompletions`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completions {
    pub php: Catalog,
    pub wordpress: Catalog,
    pub versions: VersionInfo,
}

/// Result of `wpshell/clearCompletionCache`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearCacheResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The call surrounding the cursor, as seen by signature help.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    /// The identifier right before the enclosing `(`.
    pub function_name: String,
    /// Number of top-level commas between the `(` and the cursor.
    pub active_parameter: usize,
}

/// Signature-help answer for a single function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureMatch<'a> {
    pub entry: &'a FunctionEntry,
    pub signature: &'a ParsedSignature,
    /// Active parameter, clamped to the last valid index.
    pub active_parameter: usize,
}
