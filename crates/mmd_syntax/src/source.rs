use std::ops::{Deref, Range};
use std::sync::Arc;

/// The immutable source buffer every token span points into. Cloning is a
/// reference-count bump, so the engine, lexers, and renderers can all hold
/// the text without lifetimes threading through the whole pipeline.
///
/// Construction normalizes the things the parser is not prepared to see:
/// a UTF-8 BOM is stripped and CR / CRLF line endings become LF. Token
/// offsets always refer to the normalized text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceText(Arc<str>);

impl SourceText {
    pub fn new(text: &str) -> Self {
        let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);
        if text.contains('\r') {
            let mut normalized = String::with_capacity(text.len());
            let mut chars = text.chars().peekable();
            while let Some(c) = chars.next() {
                if c == '\r' {
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    normalized.push('\n');
                } else {
                    normalized.push(c);
                }
            }
            Self(normalized.into())
        } else {
            Self(text.into())
        }
    }

    /// Decode raw bytes, replacing malformed UTF-8 sequences with U+FFFD and
    /// reporting the byte offset of each malformed run so the caller can
    /// surface a diagnostic. Parsing continues over the replaced text.
    pub fn from_bytes(bytes: &[u8]) -> (Self, Vec<usize>) {
        let mut bad_offsets = Vec::new();
        let mut rest = bytes;
        let mut consumed = 0usize;
        let mut decoded = String::with_capacity(bytes.len());
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    decoded.push_str(valid);
                    break;
                }
                Err(error) => {
                    let valid_up_to = error.valid_up_to();
                    decoded.push_str(unsafe { std::str::from_utf8_unchecked(&rest[..valid_up_to]) });
                    bad_offsets.push(consumed + valid_up_to);
                    decoded.push('\u{FFFD}');
                    let skip = valid_up_to + error.error_len().unwrap_or(rest.len() - valid_up_to);
                    consumed += skip;
                    rest = &rest[skip..];
                    if rest.is_empty() {
                        break;
                    }
                }
            }
        }
        (Self::new(&decoded), bad_offsets)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The byte at `offset`, or the NUL end-of-input sentinel past the end.
    #[inline(always)]
    pub fn byte(&self, offset: usize) -> u8 {
        self.0.as_bytes().get(offset).copied().unwrap_or(0)
    }

    pub fn slice(&self, range: Range<usize>) -> &str {
        &self.0[range]
    }
}

impl Deref for SourceText {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SourceText {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for SourceText {
    fn from(text: String) -> Self {
        Self::new(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::SourceText;

    #[test]
    fn normalizes_line_endings() {
        let source = SourceText::new("a\r\nb\rc\n");
        assert_eq!(source.as_str(), "a\nb\nc\n");
    }

    #[test]
    fn strips_bom() {
        let source = SourceText::new("\u{FEFF}# Title\n");
        assert_eq!(source.as_str(), "# Title\n");
    }

    #[test]
    fn reports_malformed_utf8() {
        let (source, offsets) = SourceText::from_bytes(b"ok\xFFrest");
        assert_eq!(offsets, vec![2]);
        assert!(source.as_str().contains('\u{FFFD}'));
        assert!(source.as_str().ends_with("rest"));
    }

    #[test]
    fn byte_past_end_is_sentinel() {
        let source = SourceText::new("x");
        assert_eq!(source.byte(0), b'x');
        assert_eq!(source.byte(1), 0);
        assert_eq!(source.byte(99), 0);
    }
}
