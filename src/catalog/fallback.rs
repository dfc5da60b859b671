//! Minimal built-in catalog.
//!
//! Served when neither the PHP nor the WordPress version can be detected,
//! so the editor always has something to complete.

use crate::types::{Catalog, Completions, FunctionEntry, FunctionKind, VersionInfo};

/// (name, documentation, insertText, signature, source)
type Row = (&'static str, &'static str, &'static str, &'static str, &'static str);

const PHP_FUNCTIONS: &[Row] = &[
    (
        "array_map",
        "Applies a callback function to arrays",
        "array_map(${1:callback}, ${2:array})",
        "array array_map(callable $callback, array $array)",
        "core",
    ),
    (
        "array_filter",
        "Filters elements of an array using a callback function",
        "array_filter(${1:array})",
        "array array_filter(array $array, ?callable $callback = null)",
        "core",
    ),
    (
        "json_encode",
        "Returns the JSON representation of a value",
        "json_encode(${1:value})",
        "string|false json_encode(mixed $value, int $flags = 0)",
        "json",
    ),
    (
        "var_dump",
        "Dumps information about a variable",
        "var_dump(${1:value})",
        "void var_dump(mixed $value, mixed ...$values)",
        "core",
    ),
];

const WORDPRESS_FUNCTIONS: &[Row] = &[
    (
        "get_posts",
        "Retrieve a list of posts",
        "get_posts(${1:args})",
        "array get_posts(array $args = [])",
        "core",
    ),
    (
        "get_option",
        "Retrieve an option value",
        "get_option(${1:option})",
        "mixed get_option(string $option, mixed $default = false)",
        "core",
    ),
    (
        "get_the_title",
        "Retrieve post title",
        "get_the_title(${1:post})",
        "string get_the_title(int|WP_Post $post = 0)",
        "core",
    ),
    (
        "wp_insert_post",
        "Insert or update a post",
        "wp_insert_post(${1:postarr})",
        "int|WP_Error wp_insert_post(array $postarr, bool $wp_error = false)",
        "core",
    ),
    (
        "add_action",
        "Add a callback to an action hook",
        "add_action(${1:hook_name}, ${2:callback})",
        "true add_action(string $hook_name, callable $callback, int $priority = 10, int $accepted_args = 1)",
        "core",
    ),
    (
        "add_filter",
        "Add a callback to a filter hook",
        "add_filter(${1:hook_name}, ${2:callback})",
        "true add_filter(string $hook_name, callable $callback, int $priority = 10, int $accepted_args = 1)",
        "core",
    ),
];

fn to_catalog(rows: &[Row]) -> Catalog {
    rows.iter()
        .map(
            |&(name, documentation, insert_text, signature, source)| FunctionEntry {
                name: name.to_string(),
                kind: FunctionKind::Function,
                documentation: documentation.to_string(),
                insert_text: insert_text.to_string(),
                signature: signature.to_string(),
                source: source.to_string(),
            },
        )
        .collect()
}

/// The fixed fallback set, with both versions unset.
pub fn fallback_completions() -> Completions {
    Completions {
        php: to_catalog(PHP_FUNCTIONS),
        wordpress: to_catalog(WORDPRESS_FUNCTIONS),
        versions: VersionInfo::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::signature::parse_signature;

    #[test]
    fn fallback_is_never_empty() {
        let fallback = fallback_completions();
        assert_eq!(fallback.php.len(), 4);
        assert_eq!(fallback.wordpress.len(), 6);
        assert!(fallback.versions.is_empty());
    }

    #[test]
    fn every_fallback_signature_parses() {
        let fallback = fallback_completions();
        for entry in fallback.php.iter().chain(&fallback.wordpress) {
            let sig = parse_signature(&entry.signature)
                .unwrap_or_else(|| panic!("unparseable: {}", entry.signature));
            assert_eq!(sig.function_name, entry.name);
        }
    }
}
