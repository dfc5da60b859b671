//! Cursor context extraction.
//!
//! Both queries look only at the text before the cursor: completion needs
//! the identifier being typed, signature help needs the call the cursor sits
//! in and how many top-level commas precede it.

use crate::types::CallContext;

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// The identifier immediately before the cursor (`"$x = get_po"` →
/// `"get_po"`).  Empty when the cursor does not follow an identifier.
pub fn word_prefix(text_before_cursor: &str) -> &str {
    let start = text_before_cursor
        .char_indices()
        .rev()
        .take_while(|&(_, c)| is_identifier_char(c))
        .last()
        .map_or(text_before_cursor.len(), |(i, _)| i);
    &text_before_cursor[start..]
}

/// Language constructs whose `(` is never a function call.
const CONTROL_KEYWORDS: &[&str] = &[
    "if", "elseif", "while", "for", "foreach", "switch", "match", "catch", "declare",
    "function", "fn", "use", "return", "echo", "print", "new", "include", "include_once",
    "require", "require_once",
];

/// Constructs whose parentheses hold a literal, like `[`.
const LITERAL_CONSTRUCTS: &[&str] = &["array", "list"];

/// Find the call enclosing the cursor.
///
/// Walks backward from the cursor, skipping balanced `()`, `[]` and string
/// literals, until it reaches the unmatched `(`.  Commas met at depth zero
/// on the way are counted; an unmatched `[` or `array(` means the cursor is
/// inside an array literal argument, so commas seen so far belong to that
/// literal.  A string literal still being typed at the cursor counts as
/// part of the current argument.
///
/// Returns `None` when there is no enclosing `(`, when a `;` or unmatched
/// `{` is reached first, or when the `(` is not preceded by a plain
/// function name (method calls, variable calls, control structures such as
/// `if (` or `foreach(`).
pub fn call_context(text_before_cursor: &str) -> Option<CallContext> {
    let chars: Vec<char> = text_before_cursor.chars().collect();
    let end = unterminated_string_start(&chars).unwrap_or(chars.len());
    let chars = &chars[..end];
    let (open_paren, commas) = find_enclosing_open_paren(chars)?;

    let start = identifier_start(chars, open_paren);
    if start == open_paren || chars[start].is_ascii_digit() {
        return None;
    }

    // `$fn(`, `$obj->method(` and `Class::method(` are not catalog functions.
    if start > 0 && chars[start - 1] == '$' {
        return None;
    }
    if start >= 2 {
        let op: String = chars[start - 2..start].iter().collect();
        if op == "->" || op == "::" {
            return None;
        }
    }

    Some(CallContext {
        function_name: chars[start..open_paren].iter().collect(),
        active_parameter: commas,
    })
}

fn identifier_start(chars: &[char], end: usize) -> usize {
    let mut start = end;
    while start > 0 && is_identifier_char(chars[start - 1]) {
        start -= 1;
    }
    start
}

/// The keyword-like word before the `(` at `open`, whitespace allowed in
/// between, lowercased.
fn word_before(chars: &[char], open: usize) -> String {
    let mut end = open;
    while end > 0 && chars[end - 1].is_whitespace() {
        end -= 1;
    }
    let start = identifier_start(chars, end);
    chars[start..end].iter().collect::<String>().to_lowercase()
}

/// Returns the index of the unmatched `(` and the number of depth-zero
/// commas between it and the end of `chars`.
fn find_enclosing_open_paren(chars: &[char]) -> Option<(usize, usize)> {
    let mut i = chars.len();
    let mut depth: i32 = 0;
    let mut commas = 0usize;

    while i > 0 {
        i -= 1;
        match chars[i] {
            ')' | ']' => depth += 1,
            '(' => {
                if depth > 0 {
                    depth -= 1;
                    continue;
                }
                let word = word_before(chars, i);
                if LITERAL_CONSTRUCTS.contains(&word.as_str()) {
                    commas = 0;
                } else if CONTROL_KEYWORDS.contains(&word.as_str()) {
                    return None;
                } else {
                    return Some((i, commas));
                }
            }
            '[' => {
                if depth > 0 {
                    depth -= 1;
                } else {
                    commas = 0;
                }
            }
            ',' if depth == 0 => commas += 1,
            '\'' | '"' => i = skip_string_backward(chars, i),
            '{' if depth == 0 => return None,
            ';' => return None,
            _ => {}
        }
    }

    None
}

/// Position of the opening quote when `chars` ends inside a string
/// literal.  Scans forward, honoring backslash escapes and skipping `//`,
/// `#` and `/* */` comments outside strings.
fn unterminated_string_start(chars: &[char]) -> Option<usize> {
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '\'' | '"' => {
                let quote = chars[i];
                let start = i;
                i += 1;
                loop {
                    match chars.get(i) {
                        None => return Some(start),
                        Some('\\') => i += 2,
                        Some(&c) if c == quote => break,
                        Some(_) => i += 1,
                    }
                }
            }
            '#' => i = skip_to_line_end(chars, i),
            '/' if chars.get(i + 1) == Some(&'/') => i = skip_to_line_end(chars, i),
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                    i += 1;
                }
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn skip_to_line_end(chars: &[char], from: usize) -> usize {
    chars[from..]
        .iter()
        .position(|&c| c == '\n')
        .map_or(chars.len(), |p| from + p)
}

/// Skip backward past a string literal whose closing quote is at `end`.
/// Returns the position of the opening quote, or 0 if none is found.
fn skip_string_backward(chars: &[char], end: usize) -> usize {
    let q = chars[end];
    let mut j = end;
    while j > 0 {
        j -= 1;
        if chars[j] == q {
            let mut backslashes = 0usize;
            let mut k = j;
            while k > 0 && chars[k - 1] == '\\' {
                backslashes += 1;
                k -= 1;
            }
            if backslashes.is_multiple_of(2) {
                return j;
            }
        }
    }
    0
}
