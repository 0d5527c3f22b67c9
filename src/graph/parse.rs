//! Node text helpers: name validity and argument splitting.

/// Marks a query variable (`?x`).
pub const VARIABLE_MARKER: char = '?';

/// Characters a concept name may not start with.
const RESERVED_LEADING: [char; 3] = ['"', '\'', '#'];

/// Non-empty and entirely ASCII digits. Such text is always an id.
pub fn is_numeric(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

/// Whether `name` may become a concept name.
pub fn is_valid_name(name: &str, allow_variables: bool) -> bool {
    let Some(first) = name.chars().next() else {
        return false;
    };
    if is_numeric(name) || RESERVED_LEADING.contains(&first) {
        return false;
    }
    if first == VARIABLE_MARKER && !allow_variables {
        return false;
    }
    !name.chars().any(|c| c.is_whitespace() || c == '(' || c == ')')
}

/// Drop one enclosing pair of parentheses, if present.
pub fn strip_outer_parens(text: &str) -> &str {
    let text = text.trim();
    match text.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        Some(inner) => inner.trim(),
        None => text,
    }
}

/// Split on whitespace, keeping double-quoted runs and parenthesized
/// groups together. Tokens keep their quotes and parentheses.
///
/// ```
/// # use dag_rs::graph::parse::split_args;
/// assert_eq!(split_args(r#"name Cow "Daisy May" (age 4)"#),
///            vec!["name", "Cow", "\"Daisy May\"", "(age 4)"]);
/// ```
pub fn split_args(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quoted = false;

    for c in text.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                current.push(c);
            }
            '(' if !quoted => {
                depth += 1;
                current.push(c);
            }
            ')' if !quoted => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            c if c.is_whitespace() && !quoted && depth == 0 => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}
