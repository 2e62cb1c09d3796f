//! The second, finer-grained lexer. Runs over the content ranges of a block
//! and classifies bytes into span tokens; the pair matcher then matches
//! delimiters over the resulting chain.

use mmd_syntax::chars;
use mmd_syntax::{SourceText, TokenFlags, TokenKind};
use unicode_properties::{GeneralCategoryGroup, UnicodeGeneralCategory};

use crate::extensions::Extensions;

/// A token produced by the inline lexer, not yet placed in the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Lexed {
    pub kind: TokenKind,
    pub start: usize,
    pub len: usize,
    pub flags: TokenFlags,
}

impl Lexed {
    fn plain(start: usize, len: usize) -> Self {
        Self {
            kind: TokenKind::TEXT_PLAIN,
            start,
            len,
            flags: TokenFlags::empty(),
        }
    }

    fn new(kind: TokenKind, start: usize, len: usize) -> Self {
        Self {
            kind,
            start,
            len,
            flags: TokenFlags::empty(),
        }
    }

    fn unmatched(kind: TokenKind, start: usize, len: usize) -> Self {
        Self {
            kind,
            start,
            len,
            flags: TokenFlags::UNMATCHED,
        }
    }
}

/// Bytes that interrupt a plain-text run and get their own classification.
fn is_significant(byte: u8) -> bool {
    matches!(
        byte,
        b'\\' | b'*'
            | b'_'
            | b'~'
            | b'^'
            | b'`'
            | b'&'
            | b'<'
            | b'>'
            | b'{'
            | b'}'
            | b'+'
            | b'='
            | b'.'
            | b'!'
            | b'['
            | b']'
            | b'('
            | b')'
            | b'\''
            | b'"'
            | b'$'
            | b'|'
            | b'-'
    )
}

/// Tokenize `source[start..end]` into `out`. The range never spans a line
/// ending; the caller joins lines with `TEXT_NL` / `TEXT_LINEBREAK` tokens.
pub fn tokenize(
    source: &SourceText,
    start: usize,
    end: usize,
    extensions: Extensions,
    out: &mut Vec<Lexed>,
) {
    Tokenizer {
        source,
        bytes: source.as_bytes(),
        pos: start,
        end,
        extensions,
    }
    .run(out)
}

struct Tokenizer<'a> {
    source: &'a SourceText,
    bytes: &'a [u8],
    pos: usize,
    end: usize,
    extensions: Extensions,
}

impl<'a> Tokenizer<'a> {
    fn run(mut self, out: &mut Vec<Lexed>) {
        while self.pos < self.end {
            let token_or_run = self.next_token(out);
            if let Some(token) = token_or_run {
                out.push(token);
            }
        }
    }

    fn rest(&self) -> &[u8] {
        &self.bytes[self.pos..self.end]
    }

    fn starts_with(&self, prefix: &[u8]) -> bool {
        self.rest().starts_with(prefix)
    }

    /// Lex one token at the current position, or push a whole delimiter run
    /// into `out` directly and return `None`.
    fn next_token(&mut self, out: &mut Vec<Lexed>) -> Option<Lexed> {
        let start = self.pos;
        let mmd = self.extensions.mmd_features();
        let critic = self.extensions.critic();
        let byte = self.bytes[start];

        let token = match byte {
            b'\\' => return Some(self.lex_escape()),
            b'*' | b'_' => {
                self.lex_delimiter_run(out);
                return None;
            }
            b'~' if critic && self.starts_with(b"~~}") => {
                self.take(TokenKind::CRITIC_SUB_CLOSE, 3)
            }
            b'~' if critic && self.starts_with(b"~>") => {
                out.push(Lexed::unmatched(TokenKind::CRITIC_SUB_DIV_A, start, 1));
                out.push(Lexed::unmatched(TokenKind::CRITIC_SUB_DIV_B, start + 1, 1));
                self.pos += 2;
                return None;
            }
            b'~' if mmd => self.flanked(TokenKind::SUBSCRIPT),
            b'^' if mmd => self.flanked(TokenKind::SUPERSCRIPT),
            b'`' => {
                let run = self.rest().iter().take_while(|&&b| b == b'`').count();
                self.pos += run;
                Lexed::unmatched(TokenKind::BACKTICK, start, run)
            }
            b'&' => return Some(self.lex_entity()),
            b'<' if critic && self.starts_with(b"<<}") => {
                self.take(TokenKind::CRITIC_COM_CLOSE, 3)
            }
            b'<' if self.starts_with(b"<!--") => self.take(TokenKind::HTML_COMMENT_START, 4),
            b'<' => self.take_unmatched(TokenKind::ANGLE_LEFT, 1),
            b'>' => self.take(TokenKind::ANGLE_RIGHT, 1),
            b'{' if critic && self.starts_with(b"{++") => self.take(TokenKind::CRITIC_ADD_OPEN, 3),
            b'{' if critic && self.starts_with(b"{--") => self.take(TokenKind::CRITIC_DEL_OPEN, 3),
            b'{' if critic && self.starts_with(b"{>>") => self.take(TokenKind::CRITIC_COM_OPEN, 3),
            b'{' if critic && self.starts_with(b"{==") => self.take(TokenKind::CRITIC_HI_OPEN, 3),
            b'{' if critic && self.starts_with(b"{~~") => self.take(TokenKind::CRITIC_SUB_OPEN, 3),
            b'{' if mmd && self.starts_with(b"{=") => {
                self.take_unmatched(TokenKind::RAW_FILTER_LEFT, 2)
            }
            b'{' if mmd && self.starts_with(b"{{") => {
                self.take_unmatched(TokenKind::BRACE_DOUBLE_LEFT, 2)
            }
            b'{' => self.take(TokenKind::TEXT_BRACE_LEFT, 1),
            b'}' if mmd && self.starts_with(b"}}") => {
                self.take(TokenKind::BRACE_DOUBLE_RIGHT, 2)
            }
            b'}' => self.take(TokenKind::TEXT_BRACE_RIGHT, 1),
            b'+' if critic && self.starts_with(b"++}") => {
                self.take(TokenKind::CRITIC_ADD_CLOSE, 3)
            }
            b'+' => self.take(TokenKind::PLUS, 1),
            b'-' if self.starts_with(b"-->") => self.take(TokenKind::HTML_COMMENT_STOP, 3),
            b'-' if critic && self.starts_with(b"--}") => {
                self.take(TokenKind::CRITIC_DEL_CLOSE, 3)
            }
            b'-' if self.starts_with(b"---") => self.take(TokenKind::DASH_M, 3),
            b'-' if self.starts_with(b"--") => self.take(TokenKind::DASH_N, 2),
            b'-' => self.take(TokenKind::TEXT_PLAIN, 1),
            b'=' if critic && self.starts_with(b"==}") => {
                self.take(TokenKind::CRITIC_HI_CLOSE, 3)
            }
            b'=' => self.take(TokenKind::EQUAL, 1),
            b'.' if self.starts_with(b"...") => self.take(TokenKind::ELLIPSIS, 3),
            b'.' => self.take(TokenKind::TEXT_PERIOD, 1),
            b'!' if self.starts_with(b"![") => {
                self.take_unmatched(TokenKind::BRACKET_IMAGE_LEFT, 2)
            }
            b'!' => self.take(TokenKind::TEXT_PLAIN, 1),
            b'[' => return Some(self.lex_bracket()),
            b']' => self.take_unmatched(TokenKind::BRACKET_RIGHT, 1),
            b'(' => self.take_unmatched(TokenKind::PAREN_LEFT, 1),
            b')' => self.take_unmatched(TokenKind::PAREN_RIGHT, 1),
            b'\'' => return Some(self.lex_single_quote()),
            b'"' => {
                let flags = self.quote_flags();
                let mut token = self.take_unmatched(TokenKind::QUOTE_DOUBLE, 1);
                token.flags |= flags;
                token
            }
            b'$' if mmd && self.starts_with(b"$$") => {
                let mut token = self.take_unmatched(TokenKind::MATH_DOLLAR_DOUBLE, 2);
                token.flags |= self.math_flags(start, start + 2);
                token
            }
            b'$' if mmd => {
                let mut token = self.take_unmatched(TokenKind::MATH_DOLLAR_SINGLE, 1);
                token.flags |= self.math_flags(start, start + 1);
                token
            }
            b'|' => self.take(TokenKind::PIPE, 1),
            _ => return Some(self.lex_plain_text()),
        };

        Some(token)
    }

    fn take(&mut self, kind: TokenKind, len: usize) -> Lexed {
        let start = self.pos;
        self.pos += len;
        Lexed::new(kind, start, len)
    }

    fn take_unmatched(&mut self, kind: TokenKind, len: usize) -> Lexed {
        let start = self.pos;
        self.pos += len;
        Lexed::unmatched(kind, start, len)
    }

    fn lex_escape(&mut self) -> Lexed {
        let start = self.pos;
        let mmd = self.extensions.mmd_features();
        match self.bytes.get(self.pos + 1) {
            Some(&b'(') if mmd => self.take_unmatched(TokenKind::MATH_PAREN_OPEN, 2),
            Some(&b')') if mmd => self.take_unmatched(TokenKind::MATH_PAREN_CLOSE, 2),
            Some(&b'[') if mmd => self.take_unmatched(TokenKind::MATH_BRACKET_OPEN, 2),
            Some(&b']') if mmd => self.take_unmatched(TokenKind::MATH_BRACKET_CLOSE, 2),
            Some(&b) if b.is_ascii_punctuation() => self.take(TokenKind::ESCAPED_CHARACTER, 2),
            _ => {
                self.pos += 1;
                Lexed::new(TokenKind::TEXT_BACKSLASH, start, 1)
            }
        }
    }

    fn lex_bracket(&mut self) -> Lexed {
        let mmd = self.extensions.mmd_features();
        let kind = match self.bytes.get(self.pos + 1) {
            Some(&b'^') if self.extensions.notes() => Some(TokenKind::BRACKET_FOOTNOTE_LEFT),
            Some(&b'#') if mmd => Some(TokenKind::BRACKET_CITATION_LEFT),
            Some(&b'?') if mmd => Some(TokenKind::BRACKET_GLOSSARY_LEFT),
            Some(&b'>') if mmd => Some(TokenKind::BRACKET_ABBREVIATION_LEFT),
            Some(&b'%') if mmd => Some(TokenKind::BRACKET_VARIABLE_LEFT),
            _ => None,
        };
        match kind {
            Some(kind) => self.take_unmatched(kind, 2),
            None => self.take_unmatched(TokenKind::BRACKET_LEFT, 1),
        }
    }

    /// `&name;`, `&#123;`, and `&#x1F;` forms become a single entity token;
    /// a bare ampersand stays an `AMPERSAND` for escaping.
    fn lex_entity(&mut self) -> Lexed {
        let start = self.pos;
        let rest = self.rest();
        let mut index = 1;
        let valid;
        if rest.get(index) == Some(&b'#') {
            index += 1;
            let hex = matches!(rest.get(index), Some(&b'x') | Some(&b'X'));
            if hex {
                index += 1;
            }
            let digits_start = index;
            let limit = if hex { 6 } else { 7 };
            while index - digits_start < limit {
                match rest.get(index) {
                    Some(&b) if (hex && b.is_ascii_hexdigit()) || (!hex && b.is_ascii_digit()) => {
                        index += 1
                    }
                    _ => break,
                }
            }
            valid = index > digits_start && rest.get(index) == Some(&b';');
        } else {
            let name_start = index;
            while let Some(&b) = rest.get(index) {
                if b.is_ascii_alphanumeric() {
                    index += 1;
                } else {
                    break;
                }
            }
            valid = index > name_start && rest.get(index) == Some(&b';');
        }

        if valid {
            self.pos += index + 1;
            Lexed::new(TokenKind::HTML_ENTITY, start, index + 1)
        } else {
            self.pos += 1;
            Lexed::new(TokenKind::AMPERSAND, start, 1)
        }
    }

    fn lex_single_quote(&mut self) -> Lexed {
        let start = self.pos;
        let before_alnum = start > 0 && chars::is_alphanumeric(self.source.byte(start - 1));
        let after_alnum = chars::is_alphanumeric(self.source.byte(start + 1));
        if before_alnum && after_alnum {
            return self.take(TokenKind::APOSTROPHE, 1);
        }
        let flags = self.quote_flags();
        let mut token = self.take_unmatched(TokenKind::QUOTE_SINGLE, 1);
        token.flags |= flags;
        token
    }

    fn quote_flags(&self) -> TokenFlags {
        let (before_ws, before_punct) = class_before(self.source, self.pos);
        let mut flags = TokenFlags::empty();
        if before_ws || before_punct {
            flags |= TokenFlags::CAN_OPEN;
        }
        if !before_ws {
            flags |= TokenFlags::CAN_CLOSE;
        }
        flags
    }

    fn math_flags(&self, start: usize, end: usize) -> TokenFlags {
        let (before_ws, _) = class_before(self.source, start);
        let (after_ws, _) = class_after(self.source, end);
        let mut flags = TokenFlags::empty();
        if !after_ws {
            flags |= TokenFlags::CAN_OPEN;
        }
        if !before_ws {
            flags |= TokenFlags::CAN_CLOSE;
        }
        flags
    }

    fn flanked(&mut self, kind: TokenKind) -> Lexed {
        let start = self.pos;
        let flags = delimiter_run_flags(self.source, start, start + 1, kind);
        let mut token = self.take_unmatched(kind, 1);
        token.flags |= flags;
        token
    }

    /// Lex a whole `*` or `_` run as single-character tokens carrying the
    /// run's flanking flags, so adjacent delimiters can pair independently.
    fn lex_delimiter_run(&mut self, out: &mut Vec<Lexed>) {
        let start = self.pos;
        let byte = self.bytes[start];
        let kind = if byte == b'*' {
            TokenKind::STAR
        } else {
            TokenKind::UL
        };
        let run = self.rest().iter().take_while(|&&b| b == byte).count();
        let flags = delimiter_run_flags(self.source, start, start + run, kind);
        for index in 0..run {
            let mut token = Lexed::unmatched(kind, start + index, 1);
            token.flags |= flags;
            out.push(token);
        }
        self.pos += run;
    }

    fn lex_plain_text(&mut self) -> Lexed {
        let start = self.pos;
        while self.pos < self.end && !is_significant(self.bytes[self.pos]) {
            self.pos += 1;
        }
        if self.pos == start {
            self.pos += 1;
        }
        Lexed::plain(start, self.pos - start)
    }
}

/// (is_whitespace, is_punctuation) of the character ending just before
/// `offset`. The start of input counts as whitespace.
fn class_before(source: &SourceText, offset: usize) -> (bool, bool) {
    match source.as_str()[..offset].chars().next_back() {
        Some(c) => classify_char(c),
        None => (true, false),
    }
}

/// The same for the character starting at `offset`; end of input counts as
/// whitespace.
fn class_after(source: &SourceText, offset: usize) -> (bool, bool) {
    match source.as_str()[offset..].chars().next() {
        Some(c) => classify_char(c),
        None => (true, false),
    }
}

fn classify_char(c: char) -> (bool, bool) {
    if c.is_whitespace() {
        return (true, false);
    }
    let punct = if c.is_ascii() {
        c.is_ascii_punctuation()
    } else {
        matches!(
            c.general_category_group(),
            GeneralCategoryGroup::Punctuation | GeneralCategoryGroup::Symbol
        )
    };
    (false, punct)
}

/// Flanking per the simplified rule: a run may open when not followed by
/// whitespace and preceded by whitespace or punctuation; close in the mirror
/// case. Intraword runs: `*` (and `~`/`^`) may do both, `_` neither.
pub fn delimiter_run_flags(
    source: &SourceText,
    run_start: usize,
    run_end: usize,
    kind: TokenKind,
) -> TokenFlags {
    let (before_ws, before_punct) = class_before(source, run_start);
    let (after_ws, after_punct) = class_after(source, run_end);

    let intraword = !before_ws && !before_punct && !after_ws && !after_punct;
    let mut flags = TokenFlags::empty();
    if intraword {
        if kind != TokenKind::UL {
            flags |= TokenFlags::CAN_OPEN | TokenFlags::CAN_CLOSE;
        }
        return flags;
    }

    if !after_ws && (before_ws || before_punct) {
        flags |= TokenFlags::CAN_OPEN;
    }
    if !before_ws && (after_ws || after_punct) {
        flags |= TokenFlags::CAN_CLOSE;
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn lex(text: &str) -> Vec<(TokenKind, usize)> {
        let source = SourceText::new(text);
        let mut out = Vec::new();
        tokenize(&source, 0, text.len(), Extensions::standard(), &mut out);
        out.into_iter().map(|t| (t.kind, t.len)).collect()
    }

    #[test]
    fn plain_text_merges_whitespace() {
        assert_eq!(lex("plain words here"), vec![(TokenKind::TEXT_PLAIN, 16)]);
    }

    #[test]
    fn emphasis_runs_split_into_single_chars() {
        let tokens = lex("**bold**");
        assert_eq!(
            tokens,
            vec![
                (TokenKind::STAR, 1),
                (TokenKind::STAR, 1),
                (TokenKind::TEXT_PLAIN, 4),
                (TokenKind::STAR, 1),
                (TokenKind::STAR, 1),
            ]
        );
    }

    #[test]
    fn opener_and_closer_flags() {
        let source = SourceText::new("*hi*");
        let mut out = Vec::new();
        tokenize(&source, 0, 4, Extensions::standard(), &mut out);
        assert!(out[0].flags.contains(TokenFlags::CAN_OPEN));
        assert!(!out[0].flags.contains(TokenFlags::CAN_CLOSE));
        assert!(out[2].flags.contains(TokenFlags::CAN_CLOSE));
    }

    #[test]
    fn underscore_intraword_is_inert() {
        let source = SourceText::new("snake_case");
        let mut out = Vec::new();
        tokenize(&source, 0, 10, Extensions::standard(), &mut out);
        let underscore = out
            .iter()
            .find(|t| t.kind == TokenKind::UL)
            .expect("UL token");
        assert!(!underscore.flags.contains(TokenFlags::CAN_OPEN));
        assert!(!underscore.flags.contains(TokenFlags::CAN_CLOSE));
    }

    #[test_case("{++add++}", TokenKind::CRITIC_ADD_OPEN, TokenKind::CRITIC_ADD_CLOSE)]
    #[test_case("{--del--}", TokenKind::CRITIC_DEL_OPEN, TokenKind::CRITIC_DEL_CLOSE)]
    #[test_case("{>>com<<}", TokenKind::CRITIC_COM_OPEN, TokenKind::CRITIC_COM_CLOSE)]
    #[test_case("{==hi==}", TokenKind::CRITIC_HI_OPEN, TokenKind::CRITIC_HI_CLOSE)]
    fn critic_delimiters(text: &str, open: TokenKind, close: TokenKind) {
        let kinds: Vec<TokenKind> = lex(text).into_iter().map(|(k, _)| k).collect();
        assert_eq!(kinds[0], open);
        assert_eq!(*kinds.last().unwrap(), close);
    }

    #[test]
    fn critic_substitution_divider_is_two_tokens() {
        let kinds: Vec<TokenKind> = lex("{~~a~>b~~}").into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::CRITIC_SUB_OPEN,
                TokenKind::TEXT_PLAIN,
                TokenKind::CRITIC_SUB_DIV_A,
                TokenKind::CRITIC_SUB_DIV_B,
                TokenKind::TEXT_PLAIN,
                TokenKind::CRITIC_SUB_CLOSE,
            ]
        );
    }

    #[test]
    fn entities_and_ampersands() {
        assert_eq!(lex("&amp;")[0].0, TokenKind::HTML_ENTITY);
        assert_eq!(lex("&#8212;")[0].0, TokenKind::HTML_ENTITY);
        assert_eq!(lex("&#x1F;")[0].0, TokenKind::HTML_ENTITY);
        assert_eq!(lex("&nope")[0].0, TokenKind::AMPERSAND);
    }

    #[test]
    fn bracket_variants() {
        assert_eq!(lex("[^fn]")[0].0, TokenKind::BRACKET_FOOTNOTE_LEFT);
        assert_eq!(lex("[#cite]")[0].0, TokenKind::BRACKET_CITATION_LEFT);
        assert_eq!(lex("[?gloss]")[0].0, TokenKind::BRACKET_GLOSSARY_LEFT);
        assert_eq!(lex("[>abbr]")[0].0, TokenKind::BRACKET_ABBREVIATION_LEFT);
        assert_eq!(lex("[%var]")[0].0, TokenKind::BRACKET_VARIABLE_LEFT);
        assert_eq!(lex("![img]")[0].0, TokenKind::BRACKET_IMAGE_LEFT);
        assert_eq!(lex("[link]")[0].0, TokenKind::BRACKET_LEFT);
    }

    #[test]
    fn smart_typography_tokens() {
        assert_eq!(lex("a---b")[1].0, TokenKind::DASH_M);
        assert_eq!(lex("a--b")[1].0, TokenKind::DASH_N);
        assert_eq!(lex("wait...")[1].0, TokenKind::ELLIPSIS);
        assert_eq!(lex("isn't")[1].0, TokenKind::APOSTROPHE);
        assert_eq!(lex("'quoted'")[0].0, TokenKind::QUOTE_SINGLE);
    }

    #[test]
    fn escapes() {
        assert_eq!(lex("\\*")[0], (TokenKind::ESCAPED_CHARACTER, 2));
        assert_eq!(lex("\\(x\\)")[0].0, TokenKind::MATH_PAREN_OPEN);
        assert_eq!(lex("\\a")[0].0, TokenKind::TEXT_BACKSLASH);
    }

    #[test]
    fn backtick_runs_keep_length() {
        assert_eq!(lex("``code``")[0], (TokenKind::BACKTICK, 2));
    }

    #[test]
    fn raw_filter_opener() {
        let kinds: Vec<TokenKind> = lex("{=html}").into_iter().map(|(k, _)| k).collect();
        assert_eq!(kinds[0], TokenKind::RAW_FILTER_LEFT);
        assert_eq!(*kinds.last().unwrap(), TokenKind::TEXT_BRACE_RIGHT);
    }

    #[test]
    fn compatibility_mode_lexes_fewer_kinds() {
        let source = SourceText::new("x~sub~ {++a++}");
        let mut out = Vec::new();
        tokenize(&source, 0, 14, Extensions::COMPATIBILITY, &mut out);
        assert!(out
            .iter()
            .all(|t| !matches!(t.kind, TokenKind::SUBSCRIPT | TokenKind::CRITIC_ADD_OPEN)));
    }
}
