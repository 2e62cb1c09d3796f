//! The line lexer: classifies each physical line of the source into one of
//! the `LINE_*` token kinds by examining its leading bytes (and, for a few
//! kinds, its full content). One pass, no backtracking; the block parser
//! consumes the resulting token chain.

use memchr::memchr;
use mmd_syntax::chars;
use mmd_syntax::{SourceText, TokenId, TokenKind, TokenTree};

use crate::extensions::Extensions;

/// How far a line's classification looked into it, plus the classification
/// itself. `content_offset` is the byte offset of the first non-whitespace
/// character relative to the line start; `leading_spaces` is tab-expanded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineClass {
    pub kind: TokenKind,
    pub content_offset: usize,
    pub leading_spaces: usize,
}

/// Scan the whole source into a flat sequence of line tokens, one per
/// physical line, each spanning its text including the trailing newline.
pub fn scan_lines(
    source: &SourceText,
    tree: &mut TokenTree,
    extensions: Extensions,
) -> Vec<TokenId> {
    let bytes = source.as_bytes();
    let mut lines = Vec::new();
    let mut offset = 0;
    // True while every line so far keeps the document head open for a
    // metadata block: metadata entries and their whitespace-led
    // continuations.
    let mut at_head = !extensions.contains(Extensions::NO_METADATA) && extensions.mmd_features();

    while offset < bytes.len() {
        let line_end = match memchr(b'\n', &bytes[offset..]) {
            Some(index) => offset + index + 1,
            None => bytes.len(),
        };
        let content_len = line_length_without_ending(bytes, offset, line_end);
        let class = classify_line(source, offset, content_len, extensions, at_head);

        if at_head {
            let continues_head = class.kind == TokenKind::LINE_META
                || (class.content_offset > 0 && content_len > class.content_offset);
            if !continues_head {
                at_head = false;
            }
        }

        let id = tree.alloc(class.kind, offset, line_end - offset);
        lines.push(id);
        offset = line_end;
    }

    lines
}

fn line_length_without_ending(bytes: &[u8], start: usize, end: usize) -> usize {
    let mut len = end - start;
    if len > 0 && bytes[start + len - 1] == b'\n' {
        len -= 1;
    }
    len
}

/// Classify the line occupying `source[start .. start + len]` (`len` excludes
/// the trailing newline). Also used when block parsing re-examines dedented
/// content inside list items and blockquotes.
pub fn classify_line(
    source: &SourceText,
    start: usize,
    len: usize,
    extensions: Extensions,
    allow_meta: bool,
) -> LineClass {
    let bytes = &source.as_bytes()[start..start + len];
    let mmd = extensions.mmd_features();

    let mut content_offset = 0;
    let mut leading_spaces = 0;
    let mut first_leading_tab = false;
    for &byte in bytes {
        match byte {
            b' ' => {
                content_offset += 1;
                leading_spaces += 1;
            }
            b'\t' => {
                if content_offset == 0 {
                    first_leading_tab = true;
                }
                content_offset += 1;
                leading_spaces += 4 - (leading_spaces % 4);
            }
            _ => break,
        }
    }

    let class = |kind| LineClass {
        kind,
        content_offset,
        leading_spaces,
    };

    if content_offset >= bytes.len() {
        return class(TokenKind::LINE_EMPTY);
    }

    if leading_spaces >= 4 {
        return class(if first_leading_tab {
            TokenKind::LINE_INDENTED_TAB
        } else {
            TokenKind::LINE_INDENTED_SPACE
        });
    }

    if allow_meta && content_offset == 0 {
        if let Some(kind) = match_metadata_line(bytes) {
            return class(kind);
        }
    }

    let content = &bytes[content_offset..];
    let kind = match content[0] {
        b'#' => match_atx(content),
        b'=' => match_setext_1(content),
        b'-' | b'*' | b'+' => match_bullet_hr_or_setext(content),
        b'_' => match_hr(content).then_some(TokenKind::LINE_HR),
        b'>' => Some(TokenKind::LINE_BLOCKQUOTE),
        b'`' => match_fence(content),
        b'0'..=b'9' => match_enumerator(content),
        b':' if mmd => match_definition(content),
        b'[' => match_definition_line(content, extensions),
        b'<' => match_html(content),
        b'{' if mmd => match_toc(content),
        _ => None,
    };

    if let Some(kind) = kind {
        return class(kind);
    }

    if mmd {
        if is_table_separator(content) {
            return class(TokenKind::LINE_TABLE_SEPARATOR);
        }
        if contains_unescaped_pipe(content) {
            return class(TokenKind::LINE_TABLE);
        }
    }

    class(TokenKind::LINE_PLAIN)
}

/// `key: value` where the key starts with an alphanumeric character and
/// contains only label characters. A value beginning with `//` is rejected so
/// that a bare URL on the first line does not open a metadata block.
fn match_metadata_line(bytes: &[u8]) -> Option<TokenKind> {
    if !chars::is_alphanumeric(bytes[0]) {
        return None;
    }
    let colon = bytes.iter().position(|&b| b == b':')?;
    let key_ok = bytes[..colon]
        .iter()
        .all(|&b| chars::is_alphanumeric(b) || matches!(b, b' ' | b'_' | b'-' | b'.'));
    if !key_ok {
        return None;
    }
    if bytes[colon + 1..].starts_with(b"//") {
        return None;
    }
    Some(TokenKind::LINE_META)
}

fn match_atx(content: &[u8]) -> Option<TokenKind> {
    let mut count = 0;
    let mut has_space = false;
    for &byte in content {
        match byte {
            b'#' => {
                count += 1;
                if count > 6 {
                    return None;
                }
            }
            b' ' | b'\t' => {
                has_space = true;
                break;
            }
            _ => return None,
        }
    }
    // A bare run of hashes is literal text, not an empty heading.
    if !has_space {
        return None;
    }
    Some(match count {
        1 => TokenKind::LINE_ATX_1,
        2 => TokenKind::LINE_ATX_2,
        3 => TokenKind::LINE_ATX_3,
        4 => TokenKind::LINE_ATX_4,
        5 => TokenKind::LINE_ATX_5,
        _ => TokenKind::LINE_ATX_6,
    })
}

fn match_setext_1(content: &[u8]) -> Option<TokenKind> {
    let tail = content.iter().skip_while(|&&b| b == b'=');
    tail.skip_while(|&&b| chars::is_whitespace(b))
        .next()
        .is_none()
        .then_some(TokenKind::LINE_SETEXT_1)
}

/// Lines opening with `-`, `*`, or `+` can be a list marker, a thematic
/// break, or (for dashes) a setext underline. A bare dash run is classified
/// as a setext underline; the block parser demotes it to a thematic break or
/// plain text when no paragraph precedes it. A thematic break outranks a
/// list marker (`* * *` is a rule, not a one-item list).
fn match_bullet_hr_or_setext(content: &[u8]) -> Option<TokenKind> {
    let marker = content[0];
    if marker == b'-' && content.len() > 1 && content.iter().all(|&b| b == b'-') {
        return Some(TokenKind::LINE_SETEXT_2);
    }
    if match_hr(content) {
        return Some(TokenKind::LINE_HR);
    }
    if content.len() == 1 || chars::is_whitespace(content[1]) {
        return Some(TokenKind::LINE_LIST_BULLETED);
    }
    None
}

fn match_hr(content: &[u8]) -> bool {
    let marker = content[0];
    if !matches!(marker, b'-' | b'*' | b'_') {
        return false;
    }
    let mut count = 0;
    for &byte in content {
        if byte == marker {
            count += 1;
        } else if !chars::is_whitespace(byte) {
            return false;
        }
    }
    count >= 3
}

fn match_fence(content: &[u8]) -> Option<TokenKind> {
    let ticks = content.iter().take_while(|&&b| b == b'`').count();
    if ticks < 3 {
        return None;
    }
    let rest = &content[ticks..];
    // A backtick fence's info string cannot itself contain backticks.
    if rest.contains(&b'`') {
        return None;
    }
    let has_info = rest.iter().any(|&b| !chars::is_whitespace(b));
    Some(match (ticks, has_info) {
        (3, false) => TokenKind::LINE_FENCE_BACKTICK_3,
        (3, true) => TokenKind::LINE_FENCE_BACKTICK_START_3,
        (4, false) => TokenKind::LINE_FENCE_BACKTICK_4,
        (4, true) => TokenKind::LINE_FENCE_BACKTICK_START_4,
        (_, false) => TokenKind::LINE_FENCE_BACKTICK_5,
        (_, true) => TokenKind::LINE_FENCE_BACKTICK_START_5,
    })
}

fn match_enumerator(content: &[u8]) -> Option<TokenKind> {
    let digits = content.iter().take_while(|&&b| chars::is_digit(b)).count();
    if digits == 0 || digits + 1 > content.len() {
        return None;
    }
    if !matches!(content[digits], b'.' | b')') {
        return None;
    }
    match content.get(digits + 1) {
        None => Some(TokenKind::LINE_LIST_ENUMERATED),
        Some(&b) if chars::is_whitespace(b) => Some(TokenKind::LINE_LIST_ENUMERATED),
        _ => None,
    }
}

fn match_definition(content: &[u8]) -> Option<TokenKind> {
    match content.get(1) {
        None => None,
        Some(&b) if chars::is_whitespace(b) => Some(TokenKind::LINE_DEFINITION),
        _ => None,
    }
}

/// `[label]:`, `[^label]:`, `[#label]:`, `[?label]:`, `[>label]:` at the
/// start of a line open the corresponding definition block.
fn match_definition_line(content: &[u8], extensions: Extensions) -> Option<TokenKind> {
    let mmd = extensions.mmd_features();
    let (kind, label_start) = match *content.get(1)? {
        b'^' if extensions.notes() => (TokenKind::LINE_DEF_FOOTNOTE, 2),
        b'#' if mmd => (TokenKind::LINE_DEF_CITATION, 2),
        b'?' if mmd => (TokenKind::LINE_DEF_GLOSSARY, 2),
        b'>' if mmd => (TokenKind::LINE_DEF_ABBREVIATION, 2),
        _ => (TokenKind::LINE_DEF_LINK, 1),
    };

    let mut index = label_start;
    let mut escaped = false;
    while index < content.len() {
        match content[index] {
            _ if escaped => escaped = false,
            b'\\' => escaped = true,
            b']' => {
                return (content.get(index + 1) == Some(&b':') && index > label_start)
                    .then_some(kind);
            }
            b'[' => return None,
            _ => {}
        }
        index += 1;
    }
    None
}

fn match_html(content: &[u8]) -> Option<TokenKind> {
    match content.get(1) {
        Some(&b) if chars::is_alpha(b) => Some(TokenKind::LINE_HTML),
        Some(&b'/') | Some(&b'!') | Some(&b'?') => Some(TokenKind::LINE_HTML),
        _ => None,
    }
}

fn match_toc(content: &[u8]) -> Option<TokenKind> {
    let trimmed_len = content
        .iter()
        .rev()
        .skip_while(|&&b| chars::is_whitespace(b))
        .count();
    (content[..trimmed_len] == *b"{{TOC}}").then_some(TokenKind::LINE_TOC)
}

/// The alignment row: cells of `-`/`=` with optional `:` markers, separated
/// by pipes. At least one pipe is required to disambiguate from thematic
/// breaks and definition lines.
fn is_table_separator(content: &[u8]) -> bool {
    let mut has_pipe = false;
    let mut has_rule = false;
    for &byte in content {
        match byte {
            b'|' => has_pipe = true,
            b'-' | b'=' => has_rule = true,
            b':' | b'+' | b'.' | b' ' | b'\t' => {}
            _ => return false,
        }
    }
    has_pipe && has_rule
}

fn contains_unescaped_pipe(content: &[u8]) -> bool {
    let mut escaped = false;
    for &byte in content {
        match byte {
            _ if escaped => escaped = false,
            b'\\' => escaped = true,
            b'|' => return true,
            _ => {}
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn classify(text: &str) -> TokenKind {
        let source = SourceText::new(text);
        let len = text.trim_end_matches('\n').len();
        classify_line(&source, 0, len, Extensions::standard(), false).kind
    }

    #[test_case("# Title", TokenKind::LINE_ATX_1)]
    #[test_case("###### Deep", TokenKind::LINE_ATX_6)]
    #[test_case("####### Too deep", TokenKind::LINE_PLAIN)]
    #[test_case("#NoSpace", TokenKind::LINE_PLAIN)]
    #[test_case("   # Indented a little", TokenKind::LINE_ATX_1)]
    fn atx(text: &str, kind: TokenKind) {
        assert_eq!(classify(text), kind);
    }

    #[test_case("", TokenKind::LINE_EMPTY)]
    #[test_case("   \t ", TokenKind::LINE_EMPTY)]
    #[test_case("    code", TokenKind::LINE_INDENTED_SPACE)]
    #[test_case("\tcode", TokenKind::LINE_INDENTED_TAB)]
    #[test_case("plain text", TokenKind::LINE_PLAIN)]
    fn whitespace_kinds(text: &str, kind: TokenKind) {
        assert_eq!(classify(text), kind);
    }

    #[test_case("===", TokenKind::LINE_SETEXT_1; "setext_1_equals")]
    #[test_case("= ", TokenKind::LINE_SETEXT_1; "setext_1_equals_space")]
    #[test_case("---", TokenKind::LINE_SETEXT_2; "setext_2_dashes")]
    #[test_case("- - -", TokenKind::LINE_HR; "hr_spaced_dashes")]
    #[test_case("***", TokenKind::LINE_HR; "hr_stars")]
    #[test_case("___", TokenKind::LINE_HR; "hr_underscores")]
    #[test_case("**", TokenKind::LINE_PLAIN; "plain_double_star")]
    fn rules_and_underlines(text: &str, kind: TokenKind) {
        assert_eq!(classify(text), kind);
    }

    #[test_case("- item", TokenKind::LINE_LIST_BULLETED; "bulleted_dash")]
    #[test_case("-", TokenKind::LINE_LIST_BULLETED; "bulleted_dash_only")]
    #[test_case("* item", TokenKind::LINE_LIST_BULLETED; "bulleted_star")]
    #[test_case("+ item", TokenKind::LINE_LIST_BULLETED; "bulleted_plus")]
    #[test_case("1. item", TokenKind::LINE_LIST_ENUMERATED; "enumerated_period")]
    #[test_case("23) item", TokenKind::LINE_LIST_ENUMERATED; "enumerated_paren")]
    #[test_case("1.item", TokenKind::LINE_PLAIN; "plain_no_space_after_period")]
    fn list_markers(text: &str, kind: TokenKind) {
        assert_eq!(classify(text), kind);
    }

    #[test_case("> quoted", TokenKind::LINE_BLOCKQUOTE; "blockquote")]
    #[test_case("```", TokenKind::LINE_FENCE_BACKTICK_3; "fence_backtick_3")]
    #[test_case("```rust", TokenKind::LINE_FENCE_BACKTICK_START_3; "fence_backtick_start_3")]
    #[test_case("`````", TokenKind::LINE_FENCE_BACKTICK_5; "fence_backtick_5")]
    #[test_case("``", TokenKind::LINE_PLAIN; "plain_two_backticks")]
    #[test_case("{{TOC}}", TokenKind::LINE_TOC; "toc")]
    #[test_case("<div>", TokenKind::LINE_HTML; "html_open_tag")]
    #[test_case("</div>", TokenKind::LINE_HTML; "html_close_tag")]
    #[test_case("< 5", TokenKind::LINE_PLAIN; "plain_less_than")]
    fn structural(text: &str, kind: TokenKind) {
        assert_eq!(classify(text), kind);
    }

    #[test_case("[label]: http://example.com", TokenKind::LINE_DEF_LINK)]
    #[test_case("[^note]: body", TokenKind::LINE_DEF_FOOTNOTE)]
    #[test_case("[#cite]: source", TokenKind::LINE_DEF_CITATION)]
    #[test_case("[?term]: meaning", TokenKind::LINE_DEF_GLOSSARY)]
    #[test_case("[>abbr]: expansion", TokenKind::LINE_DEF_ABBREVIATION)]
    #[test_case("[not a def]", TokenKind::LINE_PLAIN)]
    #[test_case(": definition body", TokenKind::LINE_DEFINITION)]
    fn definitions(text: &str, kind: TokenKind) {
        assert_eq!(classify(text), kind);
    }

    #[test_case("| a | b |", TokenKind::LINE_TABLE; "table_row")]
    #[test_case("a \\| b", TokenKind::LINE_PLAIN; "plain_escaped_pipe")]
    #[test_case("|:--|--:|", TokenKind::LINE_TABLE_SEPARATOR; "table_separator_piped")]
    #[test_case(":--|--:", TokenKind::LINE_TABLE_SEPARATOR; "table_separator_bare")]
    fn tables(text: &str, kind: TokenKind) {
        assert_eq!(classify(text), kind);
    }

    #[test]
    fn compatibility_mode_disables_dialect_lines() {
        let source = SourceText::new("| a | b |");
        let class = classify_line(&source, 0, 9, Extensions::COMPATIBILITY, false);
        assert_eq!(class.kind, TokenKind::LINE_PLAIN);
    }

    #[test]
    fn metadata_only_at_head() {
        let source = SourceText::new("title: My Doc\n");
        let head = classify_line(&source, 0, 13, Extensions::standard(), true);
        assert_eq!(head.kind, TokenKind::LINE_META);
        let body = classify_line(&source, 0, 13, Extensions::standard(), false);
        assert_eq!(body.kind, TokenKind::LINE_PLAIN);
    }

    #[test]
    fn url_does_not_open_metadata() {
        let source = SourceText::new("http://example.com\n");
        let class = classify_line(&source, 0, 18, Extensions::standard(), true);
        assert_eq!(class.kind, TokenKind::LINE_PLAIN);
    }

    #[test]
    fn scan_produces_one_token_per_line() {
        let source = SourceText::new("# A\n\nText\n");
        let mut tree = TokenTree::new();
        let lines = scan_lines(&source, &mut tree, Extensions::standard());
        let kinds: Vec<TokenKind> = lines.iter().map(|&id| tree.kind(id)).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::LINE_ATX_1,
                TokenKind::LINE_EMPTY,
                TokenKind::LINE_PLAIN
            ]
        );
        assert_eq!(tree.get(lines[0]).span(), 0..4);
        assert_eq!(tree.get(lines[2]).span(), 5..10);
    }

    #[test]
    fn lexing_is_idempotent() {
        let text = "# A\n\n- one\n- two\n\n    code\n";
        let source = SourceText::new(text);
        let mut tree_a = TokenTree::new();
        let mut tree_b = TokenTree::new();
        let a = scan_lines(&source, &mut tree_a, Extensions::standard());
        let b = scan_lines(&source, &mut tree_b, Extensions::standard());
        let kinds_a: Vec<TokenKind> = a.iter().map(|&id| tree_a.kind(id)).collect();
        let kinds_b: Vec<TokenKind> = b.iter().map(|&id| tree_b.kind(id)).collect();
        assert_eq!(kinds_a, kinds_b);
    }
}
