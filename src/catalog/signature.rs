//! Signature string parsing.
//!
//! Catalog signatures are display strings such as
//! `array get_posts(array $args = array())` or
//! `int|WP_Error wp_insert_post(array $postarr, bool $wp_error = false)`.
//! They are parsed once, when a completion index is built, into a
//! [`ParsedSignature`] whose parameter list is split on top-level commas
//! only: commas nested in `()`, `[]`, `{}` or `<>`, and commas inside
//! quoted default values, do not split.

use crate::types::{ParsedSignature, SignatureParameter};

/// Parse `[returnType] name(params)[: returnType]`.
///
/// Returns `None` when the string has no parameter list or no function
/// name before it.
pub fn parse_signature(signature: &str) -> Option<ParsedSignature> {
    let signature = signature.trim();
    let open = find_parameter_list_open(signature)?;
    let close = find_matching_close(signature, open)?;

    let head = signature[..open].trim_end();
    let name_start = head
        .char_indices()
        .rev()
        .take_while(|&(_, c)| is_identifier_char(c))
        .last()
        .map(|(i, _)| i)?;
    let function_name = head[name_start..].to_string();

    let leading_return = head[..name_start].trim();
    let trailing_return = signature[close + 1..]
        .trim()
        .strip_prefix(':')
        .map(str::trim)
        .filter(|r| !r.is_empty());

    let return_type = if !leading_return.is_empty() {
        Some(leading_return.to_string())
    } else {
        trailing_return.map(str::to_string)
    };

    let parameters = split_top_level(&signature[open + 1..close])
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| SignatureParameter {
            text: p.to_string(),
        })
        .collect();

    Some(ParsedSignature {
        return_type,
        function_name,
        parameters,
    })
}

/// Split on commas at nesting depth zero.  Quoted strings are skipped and
/// the `>` of `=>` / `->` does not close an angle bracket.
pub fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote = QuoteState::default();
    let mut prev = '\0';
    let mut start = 0;

    for (i, ch) in s.char_indices() {
        if quote.consume(ch) {
            prev = ch;
            continue;
        }
        match ch {
            '(' | '[' | '{' | '<' => depth += 1,
            '>' if prev == '=' || prev == '-' => {}
            ')' | ']' | '}' | '>' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        prev = ch;
    }
    parts.push(&s[start..]);
    parts
}

/// Bare parameter name of one parameter's text: `"array &$args = []"` →
/// `"args"`.  Falls back to the last whitespace-separated token.
pub fn parameter_name(parameter: &str) -> &str {
    let before_default = parameter.split('=').next().unwrap_or(parameter).trim();
    let token = before_default
        .split_whitespace()
        .find(|t| t.contains('$'))
        .or_else(|| before_default.split_whitespace().last())
        .unwrap_or(before_default);
    token.trim_start_matches(['&', '.', '$'])
}

/// True for parameters that must be passed: no default and not variadic.
pub fn is_required(parameter: &str) -> bool {
    !parameter.contains('=') && !parameter.contains("...")
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// The `(` that opens the parameter list: the first one directly preceded
/// (modulo whitespace) by an identifier.
fn find_parameter_list_open(s: &str) -> Option<usize> {
    s.char_indices().find_map(|(i, c)| {
        (c == '(' && s[..i].trim_end().ends_with(is_identifier_char)).then_some(i)
    })
}

fn find_matching_close(s: &str, open: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut quote = QuoteState::default();
    for (i, ch) in s[open..].char_indices() {
        if quote.consume(ch) {
            continue;
        }
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Quoted-literal tracking for forward scans.  A backslash escapes the
/// next character, so `"\\"` closes after the second backslash.
#[derive(Default)]
struct QuoteState {
    quote: Option<char>,
    escaped: bool,
}

impl QuoteState {
    /// Feed one character.  Returns true when it belongs to a quoted
    /// literal (including both quotes) and must not be interpreted.
    fn consume(&mut self, ch: char) -> bool {
        let Some(q) = self.quote else {
            if ch == '\'' || ch == '"' {
                self.quote = Some(ch);
                return true;
            }
            return false;
        };
        if self.escaped {
            self.escaped = false;
        } else if ch == '\\' {
            self.escaped = true;
        } else if ch == q {
            self.quote = None;
        }
        true
    }
}
