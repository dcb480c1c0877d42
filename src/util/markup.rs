//! Escaping for text placed in XML or HTML documents.

/// Escape `&`, `<`, `>`, `"` and `'` so the result is safe both as element
/// text and inside a quoted attribute. Uses numeric `&#39;` for the apostrophe,
/// which XML and HTML both accept.
pub fn escape_markup(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
