//! Live function-definition extraction.
//!
//! Instead of a bundled approximation, this asks the installation itself:
//! a one-shot PHP script boots WordPress, reflects over every defined
//! function, and prints a JSON document:
//!
//! ```json
//! {
//!   "phpVersion": "8.1.5",
//!   "wpVersion": "6.4.2",
//!   "wordpressFunctions": [
//!     { "name": "get_option", "file": "/srv/wp/wp-includes/option.php",
//!       "docComment": "/** ... */",
//!       "params": [ { "name": "option", "optional": false, "hasType": true,
//!                     "type": "string", "default": null } ] }
//!   ],
//!   "phpFunctions": [ { "name": "strlen", "params": [ { "name": "string", "optional": false } ] } ]
//! }
//! ```
//!
//! Internal PHP functions are limited to [`PHP_FUNCTION_PREFIXES`] to keep
//! the document small.  The document converts into the same
//! [`FunctionEntry`] records the bundled catalogs hold.

use std::ffi::OsStr;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::snippet_for;
use crate::process::{self, Limits};
use crate::resolver::PhpResolver;
use crate::types::{Catalog, FunctionEntry, FunctionKind, VersionInfo};

/// Name prefixes of the internal PHP functions included in the dump.
pub const PHP_FUNCTION_PREFIXES: &[&str] = &[
    "str", "array", "file", "is_", "print", "echo", "var_", "json_", "serialize", "unserialize",
    "count", "empty", "isset", "in_array", "explode", "implode", "trim", "sprintf", "date",
    "time", "preg_",
];

/// The extraction output document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDefinitions {
    #[serde(default)]
    pub php_version: Option<String>,
    #[serde(default)]
    pub wp_version: Option<String>,
    #[serde(default)]
    pub wordpress_functions: Vec<WordPressFunction>,
    #[serde(default)]
    pub php_functions: Vec<PhpFunction>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordPressFunction {
    pub name: String,
    #[serde(default)]
    pub params: Vec<ReflectedParameter>,
    /// Defining file; `false` in PHP for internal functions.
    #[serde(default, deserialize_with = "string_or_false")]
    pub file: Option<String>,
    #[serde(default)]
    pub doc_comment: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReflectedParameter {
    pub name: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub has_type: bool,
    #[serde(default, rename = "type")]
    pub type_name: Option<String>,
    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhpFunction {
    pub name: String,
    #[serde(default)]
    pub params: Vec<ReflectedParameter>,
}

fn string_or_false<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_str().map(str::to_string))
}

impl FunctionDefinitions {
    pub fn versions(&self) -> VersionInfo {
        VersionInfo {
            php: self.php_version.clone().filter(|v| !v.is_empty()),
            wordpress: self.wp_version.clone().filter(|v| !v.is_empty()),
        }
    }

    pub fn php_catalog(&self) -> Catalog {
        self.php_functions
            .iter()
            .filter(|f| !f.name.is_empty())
            .map(|f| {
                let params: Vec<String> = f.params.iter().map(parameter_text).collect();
                FunctionEntry {
                    name: f.name.clone(),
                    kind: FunctionKind::Function,
                    documentation: String::new(),
                    insert_text: snippet_for(&f.name, params.iter().map(String::as_str)),
                    signature: format!("{}({})", f.name, params.join(", ")),
                    source: "core".to_string(),
                }
            })
            .collect()
    }

    pub fn wordpress_catalog(&self) -> Catalog {
        self.wordpress_functions
            .iter()
            .filter(|f| !f.name.is_empty())
            .map(|f| {
                let params: Vec<String> = f.params.iter().map(parameter_text).collect();
                let call = format!("{}({})", f.name, params.join(", "));
                let signature = match doc_return_type(&f.doc_comment) {
                    Some(ret) => format!("{ret} {call}"),
                    None => call,
                };
                FunctionEntry {
                    name: f.name.clone(),
                    kind: FunctionKind::Function,
                    documentation: doc_summary(&f.doc_comment),
                    insert_text: snippet_for(&f.name, params.iter().map(String::as_str)),
                    signature,
                    source: f.file.clone().unwrap_or_else(|| "wordpress".to_string()),
                }
            })
            .collect()
    }
}

/// `[type ]$name[ = default]`; optional parameters without a known default
/// render as `= ...`.
fn parameter_text(param: &ReflectedParameter) -> String {
    let mut text = match param.type_name.as_deref().filter(|_| param.has_type) {
        Some(ty) if !ty.is_empty() => format!("{ty} ${}", param.name),
        _ => format!("${}", param.name),
    };
    if param.optional {
        match param.default.as_deref() {
            Some(default) => {
                text.push_str(" = ");
                text.push_str(default);
            }
            None => text.push_str(" = ..."),
        }
    }
    text
}

/// Body lines of a `/** ... */` block before the first tag, joined.
pub fn doc_summary(doc_comment: &str) -> String {
    let trimmed = doc_comment.trim();
    let inner = trimmed.strip_prefix("/**").unwrap_or(trimmed);
    let inner = inner.strip_suffix("*/").unwrap_or(inner);

    inner
        .lines()
        .map(|line| line.trim().trim_start_matches('*').trim())
        .take_while(|line| !line.starts_with('@'))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Type named by the `@return` tag, if any.
fn doc_return_type(doc_comment: &str) -> Option<String> {
    doc_comment.lines().find_map(|line| {
        let rest = line.trim().trim_start_matches('*').trim().strip_prefix("@return")?;
        rest.split_whitespace().next().map(str::to_string)
    })
}

/// PHP script that dumps the definitions of the installation rooted at
/// `directory`.
pub fn extraction_script(directory: &Path) -> String {
    let wp_load = directory
        .join("wp-load.php")
        .to_string_lossy()
        .replace('\\', "/")
        .replace('\'', "\\'");
    let prefixes = PHP_FUNCTION_PREFIXES.join("|");

    format!(
        r#"<?php
define('WP_USE_THEMES', false);
require_once('{wp_load}');

$defined = get_defined_functions();
$wordpress = [];
$php = [];

foreach ($defined['user'] as $fn) {{
    try {{
        $ref = new ReflectionFunction($fn);
    }} catch (Throwable $e) {{
        continue;
    }}
    $params = [];
    foreach ($ref->getParameters() as $p) {{
        $info = [
            'name' => $p->getName(),
            'optional' => $p->isOptional(),
            'hasType' => $p->hasType(),
            'type' => $p->hasType() ? (string) $p->getType() : null,
            'default' => null,
        ];
        if ($p->isDefaultValueAvailable()) {{
            try {{
                $d = $p->getDefaultValue();
                $info['default'] = is_array($d) ? 'array()' : var_export($d, true);
            }} catch (Throwable $e) {{
            }}
        }}
        $params[] = $info;
    }}
    $wordpress[] = [
        'name' => $fn,
        'params' => $params,
        'file' => $ref->getFileName(),
        'docComment' => $ref->getDocComment() ?: '',
    ];
}}

foreach ($defined['internal'] as $fn) {{
    if (!preg_match('/^({prefixes})/', $fn)) {{
        continue;
    }}
    try {{
        $ref = new ReflectionFunction($fn);
    }} catch (Throwable $e) {{
        continue;
    }}
    $params = [];
    foreach ($ref->getParameters() as $p) {{
        $params[] = ['name' => $p->getName(), 'optional' => $p->isOptional()];
    }}
    $php[] = ['name' => $fn, 'params' => $params];
}}

echo json_encode([
    'phpVersion' => PHP_VERSION,
    'wpVersion' => get_bloginfo('version'),
    'wordpressFunctions' => $wordpress,
    'phpFunctions' => $php,
]);
"#
    )
}

pub struct DefinitionExtractor {
    resolver: Arc<PhpResolver>,
    limits: Limits,
}

impl DefinitionExtractor {
    pub fn new(resolver: Arc<PhpResolver>, limits: Limits) -> Self {
        Self { resolver, limits }
    }

    /// Run the extraction script inside `directory`.  Any failure (no PHP,
    /// timeout, oversized output, bad JSON) is logged and yields `None`.
    pub async fn extract(&self, directory: &Path) -> Option<FunctionDefinitions> {
        let Some(php) = self.resolver.resolve(false).await else {
            warn!("Cannot extract definitions: no PHP binary found");
            return None;
        };

        let script = match write_script(directory) {
            Ok(file) => file,
            Err(e) => {
                warn!("Cannot write extraction script: {e}");
                return None;
            }
        };
        debug!("Running extraction script {}", script.path().display());

        let out = match process::run(
            OsStr::new(&php),
            &[script.path().as_os_str()],
            Some(directory),
            self.limits,
        )
        .await
        {
            Ok(out) => out,
            Err(e) => {
                warn!("Definition extraction failed: {e}");
                return None;
            }
        };

        match serde_json::from_str::<FunctionDefinitions>(out.stdout.trim()) {
            Ok(defs) => {
                info!(
                    "Extracted {} WordPress and {} PHP functions from {}",
                    defs.wordpress_functions.len(),
                    defs.php_functions.len(),
                    directory.display()
                );
                Some(defs)
            }
            Err(e) => {
                warn!("Failed to parse function definitions: {e}");
                None
            }
        }
    }
}

/// The script goes to the system temp dir; it is removed when the returned
/// handle drops.
fn write_script(directory: &Path) -> std::io::Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("wpshell-definitions-")
        .suffix(".php")
        .tempfile()?;
    file.write_all(extraction_script(directory).as_bytes())?;
    file.flush()?;
    Ok(file)
}
