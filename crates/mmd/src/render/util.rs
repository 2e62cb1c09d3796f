//! Small text helpers shared by the emitters.

use std::borrow::Cow;

/// Escape `<`, `>`, `&`, and `"` for HTML body and attribute contexts.
pub fn escape_html(text: &str) -> Cow<'_, str> {
    if !text.contains(['<', '>', '&', '"']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// Escape a URL for use in an `href` attribute. Only the characters HTML
/// itself cares about are touched; percent-encoding is the author's concern.
pub fn escape_href(url: &str) -> Cow<'_, str> {
    escape_html(url)
}

/// Escape LaTeX special characters.
pub fn escape_latex(text: &str) -> Cow<'_, str> {
    if !text.contains(['\\', '#', '$', '%', '&', '_', '{', '}', '~', '^']) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '#' => out.push_str("\\#"),
            '$' => out.push_str("\\$"),
            '%' => out.push_str("\\%"),
            '&' => out.push_str("\\&"),
            '_' => out.push_str("\\_"),
            '{' => out.push_str("\\{"),
            '}' => out.push_str("\\}"),
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            _ => out.push(c),
        }
    }
    Cow::Owned(out)
}

/// True if autolink-ish interior text is an email address.
pub fn looks_like_email(text: &str) -> bool {
    let Some(at) = text.find('@') else { return false };
    at > 0 && text[at + 1..].contains('.') && !text.contains([' ', '<', '>'])
}

/// True if autolink-ish interior text carries a URI scheme.
pub fn looks_like_uri(text: &str) -> bool {
    let Some(colon) = text.find(':') else {
        return false;
    };
    let scheme = &text[..colon];
    scheme.len() >= 2
        && scheme.as_bytes()[0].is_ascii_alphabetic()
        && scheme
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'.' | b'-'))
        && !text.contains(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_escaping() {
        assert_eq!(escape_html("a < b & c"), "a &lt; b &amp; c");
        assert_eq!(escape_html("plain"), "plain");
        assert_eq!(escape_html("\"q\""), "&quot;q&quot;");
    }

    #[test]
    fn latex_escaping() {
        assert_eq!(escape_latex("50%"), "50\\%");
        assert_eq!(escape_latex("a_b"), "a\\_b");
    }

    #[test]
    fn autolink_detection() {
        assert!(looks_like_uri("https://example.com"));
        assert!(looks_like_email("user@example.com"));
        assert!(!looks_like_uri("not a url"));
        assert!(!looks_like_email("plain"));
    }
}
