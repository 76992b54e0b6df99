//! Lua literal quoting
//!
//! The only place where data is turned into script text. Key prefixes,
//! column names and condition values all pass through here.

use crate::query::Value;

/// Renders a value as a Lua expression.
///
/// Text and numbers become single-quoted string literals (the store holds
/// strings, comparisons happen on strings). Bools become `'1'`/`'0'`, null
/// becomes `false` (what a missing hash field reads as), and expressions
/// are embedded as is.
pub fn quote_value(value: &Value) -> String {
    match value {
        Value::Null => "false".to_string(),
        Value::Expression(expr) => expr.clone(),
        other => quote_str(&other.as_text().unwrap_or_default()),
    }
}

/// Renders text as a single-quoted Lua string literal.
pub fn quote_str(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            // fixed width, so a following digit is never absorbed
            c if c.is_ascii_control() => out.push_str(&format!("\\{:03}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}
