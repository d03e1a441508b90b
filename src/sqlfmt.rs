//! Small helpers for rendering SQL literals and identifiers.

/// Quote an identifier with backticks, doubling any embedded backtick.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Quote a string literal with single quotes.
pub fn quote_str(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '\\' => out.push_str("\\\\"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Quote raw bytes as a string literal, replacing invalid UTF-8.
pub fn quote_bytes(value: &[u8]) -> String {
    quote_str(&String::from_utf8_lossy(value))
}
