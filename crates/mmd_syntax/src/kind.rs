use serde::Serialize;

/// The closed set of token tags used across the whole pipeline. Variants are
/// grouped by role and kept in contiguous runs so that the predicate methods
/// below can test membership with a discriminant range instead of a match
/// over every name.
///
/// The groups, in order:
///
/// - internal kinds (`NONE`, `DOCUMENT`)
/// - line kinds assigned by the line lexer, one token per physical line
/// - block kinds produced by reducing the line stream
/// - pair kinds produced by the inline delimiter matcher
/// - primitive span kinds produced by the inline lexer, including the
///   CriticMarkup delimiters and the structural markers the block parser
///   leaves inside block content
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[repr(u16)]
pub enum TokenKind {
    /// An emptied or not-yet-assigned token. Never appears in a finished tree.
    NONE = 0,
    /// The root of every parse. Its span covers the entire source.
    DOCUMENT,

    // Line kinds.
    LINE_ATX_1,
    LINE_ATX_2,
    LINE_ATX_3,
    LINE_ATX_4,
    LINE_ATX_5,
    LINE_ATX_6,
    LINE_BLOCKQUOTE,
    /// Assigned after the fact to non-leading lines of a multi-line construct.
    LINE_CONTINUATION,
    /// A definition-list body line, beginning with `:`.
    LINE_DEFINITION,
    LINE_DEF_ABBREVIATION,
    LINE_DEF_CITATION,
    LINE_DEF_FOOTNOTE,
    LINE_DEF_GLOSSARY,
    LINE_DEF_LINK,
    LINE_EMPTY,
    LINE_FENCE_BACKTICK_3,
    LINE_FENCE_BACKTICK_4,
    LINE_FENCE_BACKTICK_5,
    /// Fence lines that carry an info string and therefore can only open a
    /// fenced block, never close one.
    LINE_FENCE_BACKTICK_START_3,
    LINE_FENCE_BACKTICK_START_4,
    LINE_FENCE_BACKTICK_START_5,
    LINE_HR,
    LINE_HTML,
    LINE_INDENTED_SPACE,
    LINE_INDENTED_TAB,
    LINE_LIST_BULLETED,
    LINE_LIST_ENUMERATED,
    /// `key: value`, only recognized while the document head is being read.
    LINE_META,
    LINE_PLAIN,
    LINE_SETEXT_1,
    LINE_SETEXT_2,
    LINE_TABLE,
    LINE_TABLE_SEPARATOR,
    /// A literal `{{TOC}}` line.
    LINE_TOC,

    // Block kinds.
    BLOCK_BLOCKQUOTE,
    BLOCK_CODE_FENCED,
    BLOCK_CODE_INDENTED,
    BLOCK_DEFLIST,
    BLOCK_DEFINITION,
    BLOCK_DEF_ABBREVIATION,
    BLOCK_DEF_CITATION,
    BLOCK_DEF_FOOTNOTE,
    BLOCK_DEF_GLOSSARY,
    BLOCK_DEF_LINK,
    BLOCK_EMPTY,
    BLOCK_H1,
    BLOCK_H2,
    BLOCK_H3,
    BLOCK_H4,
    BLOCK_H5,
    BLOCK_H6,
    BLOCK_HR,
    BLOCK_HTML,
    BLOCK_LIST_BULLETED,
    BLOCK_LIST_BULLETED_LOOSE,
    BLOCK_LIST_ENUMERATED,
    BLOCK_LIST_ENUMERATED_LOOSE,
    BLOCK_LIST_ITEM,
    BLOCK_LIST_ITEM_TIGHT,
    BLOCK_META,
    BLOCK_PARA,
    BLOCK_SETEXT_1,
    BLOCK_SETEXT_2,
    BLOCK_TABLE,
    BLOCK_TABLE_HEADER,
    BLOCK_TABLE_SECTION,
    /// The term line(s) of a definition list.
    BLOCK_TERM,
    BLOCK_TOC,

    // Pair kinds. A pair token's children include the delimiter tokens that
    // formed it: the opener is the first child and the closer is the last.
    PAIR_ANGLE,
    PAIR_BACKTICK,
    PAIR_BRACE,
    PAIR_BRACKET,
    PAIR_BRACKET_ABBREVIATION,
    PAIR_BRACKET_CITATION,
    PAIR_BRACKET_FOOTNOTE,
    PAIR_BRACKET_GLOSSARY,
    PAIR_BRACKET_IMAGE,
    PAIR_BRACKET_VARIABLE,
    PAIR_CRITIC_ADD,
    PAIR_CRITIC_COM,
    PAIR_CRITIC_DEL,
    PAIR_CRITIC_HI,
    /// The `{~~old~>new~~}` substitution produces two nested pairs: the
    /// deleted half and the added half, split at the divider.
    PAIR_CRITIC_SUB_ADD,
    PAIR_CRITIC_SUB_DEL,
    PAIR_EMPH,
    PAIR_HTML_COMMENT,
    PAIR_MATH,
    PAIR_PAREN,
    PAIR_QUOTE_ALT,
    PAIR_QUOTE_DOUBLE,
    PAIR_QUOTE_SINGLE,
    /// A backtick span whose closer is followed by `{=format}`.
    PAIR_RAW_FILTER,
    PAIR_STAR,
    PAIR_STRONG,
    PAIR_SUBSCRIPT,
    PAIR_SUPERSCRIPT,
    PAIR_UL,

    // Primitive spans.
    AMPERSAND,
    ANGLE_LEFT,
    ANGLE_RIGHT,
    APOSTROPHE,
    /// A run of one or more backticks; runs pair only with runs of the same
    /// length.
    BACKTICK,
    BRACE_DOUBLE_LEFT,
    BRACE_DOUBLE_RIGHT,
    BRACKET_ABBREVIATION_LEFT,
    BRACKET_CITATION_LEFT,
    BRACKET_FOOTNOTE_LEFT,
    BRACKET_GLOSSARY_LEFT,
    BRACKET_IMAGE_LEFT,
    BRACKET_LEFT,
    BRACKET_RIGHT,
    BRACKET_VARIABLE_LEFT,
    COLON,
    CRITIC_ADD_OPEN,
    CRITIC_ADD_CLOSE,
    CRITIC_COM_OPEN,
    CRITIC_COM_CLOSE,
    CRITIC_DEL_OPEN,
    CRITIC_DEL_CLOSE,
    CRITIC_HI_OPEN,
    CRITIC_HI_CLOSE,
    CRITIC_SUB_OPEN,
    /// The `~>` divider lexes as two half-tokens so the deleted half can
    /// close against the first and the added half open against the second.
    CRITIC_SUB_DIV_A,
    CRITIC_SUB_DIV_B,
    CRITIC_SUB_CLOSE,
    DASH_M,
    DASH_N,
    ELLIPSIS,
    /// Emphasis delimiters are retagged from `STAR`/`UL` when a pair is
    /// formed, so unmatched delimiters keep their literal kind.
    EMPH_START,
    EMPH_STOP,
    EQUAL,
    ESCAPED_CHARACTER,
    HTML_COMMENT_START,
    HTML_COMMENT_STOP,
    HTML_ENTITY,
    INDENT_SPACE,
    INDENT_TAB,
    /// The `#` run opening an ATX heading line.
    MARKER_ATX,
    MARKER_BLOCKQUOTE,
    MARKER_DEFLIST_COLON,
    MARKER_LIST_BULLET,
    MARKER_LIST_ENUMERATOR,
    MATH_BRACKET_OPEN,
    MATH_BRACKET_CLOSE,
    MATH_DOLLAR_SINGLE,
    MATH_DOLLAR_DOUBLE,
    MATH_PAREN_OPEN,
    MATH_PAREN_CLOSE,
    NON_INDENT_SPACE,
    PAREN_LEFT,
    PAREN_RIGHT,
    PIPE,
    PLUS,
    QUOTE_SINGLE,
    QUOTE_DOUBLE,
    /// The `{=` opener of a raw-format filter specifier.
    RAW_FILTER_LEFT,
    SLASH,
    STAR,
    STRONG_START,
    STRONG_STOP,
    SUBSCRIPT,
    SUPERSCRIPT,
    TABLE_CELL,
    TABLE_DIVIDER,
    TABLE_ROW,
    TEXT_BACKSLASH,
    TEXT_BRACE_LEFT,
    TEXT_BRACE_RIGHT,
    /// A zero-length placeholder used when a construct needs a token but the
    /// source contributes no bytes.
    TEXT_EMPTY,
    TEXT_HASH,
    /// A hard line break: two or more trailing spaces before the newline.
    TEXT_LINEBREAK,
    TEXT_NL,
    /// A number followed by `.` or `)` that could have started a list item.
    TEXT_NUMBER_POSS_LIST,
    TEXT_PERCENT,
    TEXT_PERIOD,
    TEXT_PLAIN,
    UL,
    /// A `[label]` span trailing a header or table caption, overriding the
    /// auto-generated label.
    MANUAL_LABEL,
}

impl TokenKind {
    #[inline]
    fn discriminant(self) -> u16 {
        self as u16
    }

    /// True for the kinds the line lexer produces.
    pub fn is_line(self) -> bool {
        let d = self.discriminant();
        d >= TokenKind::LINE_ATX_1.discriminant() && d <= TokenKind::LINE_TOC.discriminant()
    }

    /// True for reduced block kinds.
    pub fn is_block(self) -> bool {
        let d = self.discriminant();
        d >= TokenKind::BLOCK_BLOCKQUOTE.discriminant() && d <= TokenKind::BLOCK_TOC.discriminant()
    }

    /// True for pair kinds created by the delimiter matcher.
    pub fn is_pair(self) -> bool {
        let d = self.discriminant();
        d >= TokenKind::PAIR_ANGLE.discriminant() && d <= TokenKind::PAIR_UL.discriminant()
    }

    /// Heading level for ATX line kinds and heading block kinds, if any.
    pub fn heading_level(self) -> Option<u8> {
        let level = match self {
            TokenKind::LINE_ATX_1 | TokenKind::BLOCK_H1 | TokenKind::BLOCK_SETEXT_1 => 1,
            TokenKind::LINE_ATX_2 | TokenKind::BLOCK_H2 | TokenKind::BLOCK_SETEXT_2 => 2,
            TokenKind::LINE_ATX_3 | TokenKind::BLOCK_H3 => 3,
            TokenKind::LINE_ATX_4 | TokenKind::BLOCK_H4 => 4,
            TokenKind::LINE_ATX_5 | TokenKind::BLOCK_H5 => 5,
            TokenKind::LINE_ATX_6 | TokenKind::BLOCK_H6 => 6,
            _ => return None,
        };
        Some(level)
    }

    /// The heading block kind for a 1-based level, saturating at 6.
    pub fn heading_block_for_level(level: u8) -> TokenKind {
        match level {
            0 | 1 => TokenKind::BLOCK_H1,
            2 => TokenKind::BLOCK_H2,
            3 => TokenKind::BLOCK_H3,
            4 => TokenKind::BLOCK_H4,
            5 => TokenKind::BLOCK_H5,
            _ => TokenKind::BLOCK_H6,
        }
    }

    /// True for any heading block (ATX- or setext-derived).
    pub fn is_heading_block(self) -> bool {
        self.heading_level().is_some() && self.is_block()
    }

    /// True for list blocks of either flavor and looseness.
    pub fn is_list_block(self) -> bool {
        matches!(
            self,
            TokenKind::BLOCK_LIST_BULLETED
                | TokenKind::BLOCK_LIST_BULLETED_LOOSE
                | TokenKind::BLOCK_LIST_ENUMERATED
                | TokenKind::BLOCK_LIST_ENUMERATED_LOOSE
        )
    }

    /// True for the five definition-block kinds.
    pub fn is_definition_block(self) -> bool {
        matches!(
            self,
            TokenKind::BLOCK_DEF_ABBREVIATION
                | TokenKind::BLOCK_DEF_CITATION
                | TokenKind::BLOCK_DEF_FOOTNOTE
                | TokenKind::BLOCK_DEF_GLOSSARY
                | TokenKind::BLOCK_DEF_LINK
        )
    }

    /// The kind a line token falls back to when it joins a paragraph or other
    /// multi-line construct instead of starting its own block. Lines that can
    /// never join return themselves.
    pub fn line_fallback(self) -> TokenKind {
        match self {
            TokenKind::LINE_INDENTED_SPACE
            | TokenKind::LINE_INDENTED_TAB
            | TokenKind::LINE_TABLE
            | TokenKind::LINE_HTML
            | TokenKind::LINE_DEFINITION
            | TokenKind::LINE_META
            | TokenKind::LINE_FENCE_BACKTICK_3
            | TokenKind::LINE_FENCE_BACKTICK_4
            | TokenKind::LINE_FENCE_BACKTICK_5
            | TokenKind::LINE_FENCE_BACKTICK_START_3
            | TokenKind::LINE_FENCE_BACKTICK_START_4
            | TokenKind::LINE_FENCE_BACKTICK_START_5 => TokenKind::LINE_CONTINUATION,
            TokenKind::LINE_TABLE_SEPARATOR => TokenKind::LINE_PLAIN,
            other => other,
        }
    }

    /// True if a line of this kind can extend an open paragraph.
    pub fn continues_paragraph(self) -> bool {
        matches!(
            self.line_fallback(),
            TokenKind::LINE_CONTINUATION | TokenKind::LINE_PLAIN
        )
    }
}

#[cfg(test)]
mod tests {
    use super::TokenKind;
    use test_case::test_case;

    #[test_case(TokenKind::LINE_ATX_1, true; "atx is line")]
    #[test_case(TokenKind::LINE_TOC, true; "toc is line")]
    #[test_case(TokenKind::BLOCK_PARA, false; "para is not line")]
    #[test_case(TokenKind::PAIR_EMPH, false; "pair is not line")]
    fn line_predicate(kind: TokenKind, expected: bool) {
        assert_eq!(kind.is_line(), expected);
    }

    #[test_case(TokenKind::BLOCK_BLOCKQUOTE, true)]
    #[test_case(TokenKind::BLOCK_TOC, true)]
    #[test_case(TokenKind::LINE_PLAIN, false)]
    #[test_case(TokenKind::TEXT_PLAIN, false)]
    fn block_predicate(kind: TokenKind, expected: bool) {
        assert_eq!(kind.is_block(), expected);
    }

    #[test_case(TokenKind::PAIR_ANGLE, true)]
    #[test_case(TokenKind::PAIR_UL, true)]
    #[test_case(TokenKind::BACKTICK, false)]
    fn pair_predicate(kind: TokenKind, expected: bool) {
        assert_eq!(kind.is_pair(), expected);
    }

    #[test]
    fn heading_levels_round_trip() {
        for level in 1..=6u8 {
            let kind = TokenKind::heading_block_for_level(level);
            assert_eq!(kind.heading_level(), Some(level));
        }
    }

    #[test]
    fn fence_lines_fall_back_to_continuation() {
        assert_eq!(
            TokenKind::LINE_FENCE_BACKTICK_START_3.line_fallback(),
            TokenKind::LINE_CONTINUATION
        );
        assert_eq!(TokenKind::LINE_HR.line_fallback(), TokenKind::LINE_HR);
    }
}
