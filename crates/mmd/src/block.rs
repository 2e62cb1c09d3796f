//! The block parser: reduces the flat chain of line tokens into a tree of
//! block tokens. The accepted language is the grammar in SPEC_FULL §3; the
//! implementation is a hand-written reduction that dispatches on the current
//! line kind and eats continuations with predicates, recursing for the
//! contents of list items and blockquotes.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use mmd_syntax::chars;
use mmd_syntax::{SourceText, TokenId, TokenKind, TokenTree};

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::extensions::Extensions;
use crate::line::classify_line;
use crate::RECURSION_LIMIT;

/// Column alignment parsed from a table separator row. The `*Wrap` variants
/// come from a `+` marker in the separator cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Align {
    #[default]
    None,
    Left,
    LeftWrap,
    Right,
    RightWrap,
    Center,
    CenterWrap,
}

impl Align {
    pub fn css(self) -> Option<&'static str> {
        match self {
            Align::None => None,
            Align::Left | Align::LeftWrap => Some("left"),
            Align::Right | Align::RightWrap => Some("right"),
            Align::Center | Align::CenterWrap => Some("center"),
        }
    }

    pub fn latex_column(self) -> char {
        match self {
            Align::Right | Align::RightWrap => 'r',
            Align::Center | Align::CenterWrap => 'c',
            _ => 'l',
        }
    }
}

/// Tables can declare at most this many columns; extras in the separator row
/// are ignored.
pub const TABLE_MAX_COLUMNS: usize = 48;

#[derive(Clone, Debug, Default)]
pub struct TableShape {
    pub alignments: Vec<Align>,
}

pub struct BlockParseResult {
    pub root: TokenId,
    pub table_shapes: FxHashMap<TokenId, TableShape>,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn parse_document(
    source: &SourceText,
    tree: &mut TokenTree,
    lines: Vec<TokenId>,
    extensions: Extensions,
) -> BlockParseResult {
    let root = tree.alloc(TokenKind::DOCUMENT, 0, source.len());
    let mut parser = BlockParser {
        source,
        tree,
        lines: VecDeque::from(lines),
        extensions,
        table_shapes: FxHashMap::default(),
        diagnostics: Vec::new(),
    };
    parser.parse_blocks(root, true, 0);
    strip_line_endings(source, parser.tree, root);
    BlockParseResult {
        root,
        table_shapes: parser.table_shapes,
        diagnostics: parser.diagnostics,
    }
}

/// Parse a list of source ranges as a standalone block fragment, returning a
/// detached container token. Used for note bodies, whose content lives inside
/// a definition block but renders as ordinary blocks in the note list.
pub fn parse_fragment(
    source: &SourceText,
    tree: &mut TokenTree,
    ranges: &[std::ops::Range<usize>],
    extensions: Extensions,
) -> TokenId {
    let container = tree.alloc(TokenKind::DOCUMENT, 0, 0);
    let mut lines = Vec::with_capacity(ranges.len());
    for range in ranges {
        let content_len = source
            .slice(range.clone())
            .trim_end_matches('\n')
            .len();
        let class = classify_line(source, range.start, content_len, extensions, false);
        let id = tree.alloc(class.kind, range.start, range.len());
        lines.push(id);
    }
    let mut parser = BlockParser {
        source,
        tree,
        lines: VecDeque::from(lines),
        extensions,
        table_shapes: FxHashMap::default(),
        diagnostics: Vec::new(),
    };
    parser.parse_blocks(container, false, 1);
    strip_line_endings(source, parser.tree, container);
    container
}

/// Drop the trailing newline byte from every line token so downstream passes
/// see payloads only. Original offsets are preserved; only lengths shrink.
fn strip_line_endings(source: &SourceText, tree: &mut TokenTree, token: TokenId) {
    let children = tree.child_ids(token);
    for child in children {
        if tree.kind(child).is_line() {
            let end = tree.get(child).end();
            if end > tree.get(child).start && source.byte(end - 1) == b'\n' {
                let len = tree.get(child).len - 1;
                tree.set_len(child, len);
            }
        }
        strip_line_endings(source, tree, child);
    }
}

struct BlockParser<'a> {
    source: &'a SourceText,
    tree: &'a mut TokenTree,
    lines: VecDeque<TokenId>,
    extensions: Extensions,
    table_shapes: FxHashMap<TokenId, TableShape>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> BlockParser<'a> {
    fn parse_blocks(&mut self, parent: TokenId, allow_meta: bool, depth: usize) {
        let mut first_block = allow_meta;
        while let Some(&line) = self.lines.front() {
            let kind = self.tree.kind(line);
            match kind {
                TokenKind::LINE_EMPTY => self.consume_empties(parent),
                TokenKind::LINE_META if first_block => self.consume_meta_or_para(parent),
                TokenKind::LINE_META => self.consume_paragraph(parent),
                TokenKind::LINE_ATX_1
                | TokenKind::LINE_ATX_2
                | TokenKind::LINE_ATX_3
                | TokenKind::LINE_ATX_4
                | TokenKind::LINE_ATX_5
                | TokenKind::LINE_ATX_6 => {
                    let level = kind.heading_level().unwrap_or(1);
                    self.consume_line_as(parent, TokenKind::heading_block_for_level(level));
                }
                TokenKind::LINE_HR => self.consume_line_as(parent, TokenKind::BLOCK_HR),
                TokenKind::LINE_TOC => self.consume_line_as(parent, TokenKind::BLOCK_TOC),
                TokenKind::LINE_SETEXT_1 => self.consume_paragraph(parent),
                TokenKind::LINE_SETEXT_2 => self.consume_stray_dash_line(parent),
                TokenKind::LINE_BLOCKQUOTE => self.consume_blockquote(parent, depth),
                TokenKind::LINE_DEF_FOOTNOTE => {
                    self.consume_definition(parent, TokenKind::BLOCK_DEF_FOOTNOTE, true)
                }
                TokenKind::LINE_DEF_CITATION => {
                    self.consume_definition(parent, TokenKind::BLOCK_DEF_CITATION, true)
                }
                TokenKind::LINE_DEF_GLOSSARY => {
                    self.consume_definition(parent, TokenKind::BLOCK_DEF_GLOSSARY, true)
                }
                TokenKind::LINE_DEF_LINK => {
                    self.consume_definition(parent, TokenKind::BLOCK_DEF_LINK, false)
                }
                TokenKind::LINE_DEF_ABBREVIATION => {
                    self.consume_definition(parent, TokenKind::BLOCK_DEF_ABBREVIATION, false)
                }
                TokenKind::LINE_FENCE_BACKTICK_3
                | TokenKind::LINE_FENCE_BACKTICK_4
                | TokenKind::LINE_FENCE_BACKTICK_5
                | TokenKind::LINE_FENCE_BACKTICK_START_3
                | TokenKind::LINE_FENCE_BACKTICK_START_4
                | TokenKind::LINE_FENCE_BACKTICK_START_5 => self.consume_fenced(parent),
                TokenKind::LINE_INDENTED_SPACE | TokenKind::LINE_INDENTED_TAB => {
                    self.consume_indented_code(parent)
                }
                TokenKind::LINE_LIST_BULLETED => {
                    self.consume_list(parent, TokenKind::LINE_LIST_BULLETED, depth)
                }
                TokenKind::LINE_LIST_ENUMERATED => {
                    self.consume_list(parent, TokenKind::LINE_LIST_ENUMERATED, depth)
                }
                TokenKind::LINE_TABLE => self.consume_table_or_para(parent),
                TokenKind::LINE_HTML => self.consume_html(parent),
                _ => self.consume_paragraph(parent),
            }
            first_block = false;
        }
    }

    //#region Queue helpers

    fn peek_kind(&self) -> Option<TokenKind> {
        self.lines.front().map(|&id| self.tree.kind(id))
    }

    fn peek_kind_at(&self, offset: usize) -> Option<TokenKind> {
        self.lines.get(offset).map(|&id| self.tree.kind(id))
    }

    fn pop_into(&mut self, block: TokenId) -> TokenId {
        let line = self.lines.pop_front().expect("popped past end of lines");
        self.tree.append_child(block, line);
        self.tree.extend_span_over(block, line);
        line
    }

    fn pop_into_as(&mut self, block: TokenId, kind: TokenKind) -> TokenId {
        let line = self.pop_into(block);
        self.tree.set_kind(line, kind);
        line
    }

    fn new_block(&mut self, parent: TokenId, kind: TokenKind) -> TokenId {
        let start = self
            .lines
            .front()
            .map(|&id| self.tree.get(id).start)
            .unwrap_or(0);
        let block = self.tree.alloc(kind, start, 0);
        self.tree.append_child(parent, block);
        block
    }

    fn finish_block(&mut self, parent: TokenId, block: TokenId) {
        self.tree.extend_span_over(parent, block);
    }

    //#endregion

    fn consume_empties(&mut self, parent: TokenId) {
        let block = self.new_block(parent, TokenKind::BLOCK_EMPTY);
        while self.peek_kind() == Some(TokenKind::LINE_EMPTY) {
            self.pop_into(block);
        }
        self.finish_block(parent, block);
    }

    fn consume_line_as(&mut self, parent: TokenId, kind: TokenKind) {
        let block = self.new_block(parent, kind);
        self.pop_into(block);
        self.finish_block(parent, block);
    }

    /// A dash-run line with no open paragraph before it: three or more dashes
    /// make a thematic break, anything shorter is plain text.
    fn consume_stray_dash_line(&mut self, parent: TokenId) {
        let line = *self.lines.front().unwrap();
        let text = self.line_text(line);
        if text.trim().len() >= 3 {
            self.consume_line_as(parent, TokenKind::BLOCK_HR);
        } else {
            self.tree.set_kind(line, TokenKind::LINE_PLAIN);
            self.consume_paragraph(parent);
        }
    }

    /// The value of an enumerated list marker, for the paragraph tie-break.
    fn enumerator_value(&self, line: TokenId) -> u32 {
        let text = self.line_text(line);
        let digits: String = text
            .trim_start()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().unwrap_or(0)
    }

    fn line_text(&self, line: TokenId) -> &str {
        let token = self.tree.get(line);
        let mut end = token.end();
        if end > token.start && self.source.byte(end - 1) == b'\n' {
            end -= 1;
        }
        self.source.slice(token.start..end)
    }

    /// True if the next line extends an open paragraph instead of starting a
    /// new block. Enumerators greater than `1.` cannot interrupt (Markdown
    /// compatibility tie-break); fences, tables, and indented lines join via
    /// their fallback kind.
    fn line_continues_paragraph(&self, kind: TokenKind, line: TokenId) -> bool {
        match kind {
            TokenKind::LINE_PLAIN | TokenKind::LINE_CONTINUATION => true,
            TokenKind::LINE_LIST_ENUMERATED => self.enumerator_value(line) > 1,
            _ => kind.line_fallback() == TokenKind::LINE_CONTINUATION,
        }
    }

    fn consume_paragraph(&mut self, parent: TokenId) {
        let block = self.new_block(parent, TokenKind::BLOCK_PARA);
        let first = self.pop_into(block);
        if self.tree.kind(first) != TokenKind::LINE_PLAIN {
            self.tree.set_kind(first, TokenKind::LINE_PLAIN);
        }

        loop {
            let Some(kind) = self.peek_kind() else { break };
            match kind {
                TokenKind::LINE_SETEXT_1 => {
                    self.tree.set_kind(block, TokenKind::BLOCK_SETEXT_1);
                    self.pop_into(block);
                    break;
                }
                TokenKind::LINE_SETEXT_2 => {
                    self.tree.set_kind(block, TokenKind::BLOCK_SETEXT_2);
                    self.pop_into(block);
                    break;
                }
                TokenKind::LINE_DEFINITION if self.extensions.mmd_features() => {
                    self.promote_to_deflist(parent, block);
                    return;
                }
                kind if self.line_continues_paragraph(kind, *self.lines.front().unwrap()) => {
                    self.pop_into_as(block, TokenKind::LINE_CONTINUATION);
                }
                _ => break,
            }
        }
        self.finish_block(parent, block);
    }

    /// A paragraph followed by `: definition` lines becomes a definition
    /// list: each paragraph line is a term, each definition line opens a
    /// definition body.
    fn promote_to_deflist(&mut self, parent: TokenId, para: TokenId) {
        self.tree.set_kind(para, TokenKind::BLOCK_DEFLIST);
        let term_lines = self.tree.take_children(para);

        // Re-home each collected paragraph line under its own term block.
        let mut cursor = term_lines;
        while let Some(line) = cursor {
            let next = self.tree.get(line).next();
            let start = self.tree.get(line).start;
            let term = self.tree.alloc(TokenKind::BLOCK_TERM, start, 0);
            self.tree.unlink_siblings(line);
            self.tree.append_child(term, line);
            self.tree.extend_span_over(term, line);
            self.tree.append_child(para, term);
            self.tree.extend_span_over(para, term);
            cursor = next;
        }

        while self.peek_kind() == Some(TokenKind::LINE_DEFINITION) {
            let def = self.new_block(para, TokenKind::BLOCK_DEFINITION);
            self.pop_into(def);
            while let Some(kind) = self.peek_kind() {
                let line = *self.lines.front().unwrap();
                if kind != TokenKind::LINE_DEFINITION && self.line_continues_paragraph(kind, line) {
                    self.pop_into_as(def, TokenKind::LINE_CONTINUATION);
                } else {
                    break;
                }
            }
            self.tree.extend_span_over(para, def);
        }
        self.finish_block(parent, para);
    }

    fn consume_blockquote(&mut self, parent: TokenId, depth: usize) {
        let block = self.new_block(parent, TokenKind::BLOCK_BLOCKQUOTE);
        let mut raw_lines = Vec::new();
        loop {
            let Some(kind) = self.peek_kind() else { break };
            match kind {
                TokenKind::LINE_BLOCKQUOTE => {
                    raw_lines.push(*self.lines.front().unwrap());
                    self.lines.pop_front();
                }
                TokenKind::LINE_EMPTY => {
                    // A blank line ends the quote unless another `>` line
                    // follows immediately.
                    if self.peek_kind_at(1) == Some(TokenKind::LINE_BLOCKQUOTE) {
                        raw_lines.push(*self.lines.front().unwrap());
                        self.lines.pop_front();
                    } else {
                        break;
                    }
                }
                kind if self.line_continues_paragraph(kind, *self.lines.front().unwrap()) => {
                    raw_lines.push(*self.lines.front().unwrap());
                    self.lines.pop_front();
                }
                _ => break,
            }
        }

        for &line in &raw_lines {
            self.tree.extend_span_over(block, line);
        }
        self.reparse_dedented(block, &raw_lines, DedentRule::Blockquote, depth);
        self.finish_block(parent, block);
    }

    fn consume_html(&mut self, parent: TokenId) {
        let block = self.new_block(parent, TokenKind::BLOCK_HTML);
        self.pop_into(block);
        while let Some(kind) = self.peek_kind() {
            let line = *self.lines.front().unwrap();
            if kind == TokenKind::LINE_HTML {
                self.pop_into(block);
            } else if kind != TokenKind::LINE_EMPTY && self.line_continues_paragraph(kind, line) {
                self.pop_into_as(block, TokenKind::LINE_CONTINUATION);
            } else {
                break;
            }
        }
        self.finish_block(parent, block);
    }

    /// Definition blocks: the defining line plus its continuations. Notes
    /// (footnote / citation / glossary) additionally accept indented chunks
    /// after blank lines, so a note body can span paragraphs.
    fn consume_definition(&mut self, parent: TokenId, kind: TokenKind, allow_chunks: bool) {
        let block = self.new_block(parent, kind);
        self.pop_into(block);
        loop {
            let Some(kind) = self.peek_kind() else { break };
            let line = *self.lines.front().unwrap();
            match kind {
                TokenKind::LINE_EMPTY if allow_chunks => {
                    let next_is_indented = matches!(
                        self.peek_kind_at(1),
                        Some(TokenKind::LINE_INDENTED_SPACE) | Some(TokenKind::LINE_INDENTED_TAB)
                    );
                    if next_is_indented {
                        self.pop_into(block);
                    } else {
                        break;
                    }
                }
                kind if kind != TokenKind::LINE_EMPTY
                    && self.line_continues_paragraph(kind, line) =>
                {
                    self.pop_into_as(block, TokenKind::LINE_CONTINUATION);
                }
                _ => break,
            }
        }
        self.finish_block(parent, block);
    }

    fn consume_indented_code(&mut self, parent: TokenId) {
        let block = self.new_block(parent, TokenKind::BLOCK_CODE_INDENTED);
        let mut pending_empties: Vec<TokenId> = Vec::new();
        loop {
            match self.peek_kind() {
                Some(TokenKind::LINE_INDENTED_SPACE) | Some(TokenKind::LINE_INDENTED_TAB) => {
                    for empty in pending_empties.drain(..) {
                        self.tree.append_child(block, empty);
                        self.tree.extend_span_over(block, empty);
                    }
                    self.pop_into(block);
                }
                Some(TokenKind::LINE_EMPTY) => {
                    // Blank lines belong to the block only if more indented
                    // content follows.
                    pending_empties.push(self.lines.pop_front().unwrap());
                }
                _ => break,
            }
        }
        // Trailing blanks go back to the stream.
        for empty in pending_empties.into_iter().rev() {
            self.lines.push_front(empty);
        }
        self.finish_block(parent, block);
    }

    fn fence_tick_count(&self, line: TokenId) -> usize {
        self.line_text(line)
            .trim_start()
            .bytes()
            .take_while(|&b| b == b'`')
            .count()
    }

    fn consume_fenced(&mut self, parent: TokenId) {
        let block = self.new_block(parent, TokenKind::BLOCK_CODE_FENCED);
        let opening = self.pop_into(block);
        let opening_count = self.fence_tick_count(opening);

        loop {
            let Some(kind) = self.peek_kind() else { break };
            match kind {
                TokenKind::LINE_FENCE_BACKTICK_3
                | TokenKind::LINE_FENCE_BACKTICK_4
                | TokenKind::LINE_FENCE_BACKTICK_5 => {
                    let line = *self.lines.front().unwrap();
                    if self.fence_tick_count(line) >= opening_count {
                        self.pop_into(block);
                        break;
                    }
                    self.pop_into_as(block, TokenKind::LINE_CONTINUATION);
                }
                _ => {
                    self.pop_into_as(block, TokenKind::LINE_CONTINUATION);
                }
            }
        }
        self.finish_block(parent, block);
    }

    fn consume_list(&mut self, parent: TokenId, marker_kind: TokenKind, depth: usize) {
        let list_kind = if marker_kind == TokenKind::LINE_LIST_BULLETED {
            TokenKind::BLOCK_LIST_BULLETED
        } else {
            TokenKind::BLOCK_LIST_ENUMERATED
        };
        let block = self.new_block(parent, list_kind);
        let mut loose = false;
        let mut items = Vec::new();

        while self.peek_kind() == Some(marker_kind) {
            let item = self.new_block(block, TokenKind::BLOCK_LIST_ITEM);
            let mut item_lines = vec![self.lines.pop_front().unwrap()];
            let mut saw_blank_in_item = false;

            loop {
                let Some(kind) = self.peek_kind() else { break };
                let line = *self.lines.front().unwrap();
                match kind {
                    TokenKind::LINE_EMPTY => {
                        let follows = self.peek_kind_at(1);
                        match follows {
                            Some(TokenKind::LINE_INDENTED_SPACE)
                            | Some(TokenKind::LINE_INDENTED_TAB) => {
                                saw_blank_in_item = true;
                                item_lines.push(self.lines.pop_front().unwrap());
                            }
                            Some(kind2) if kind2 == marker_kind => {
                                // Blank between items: the list is loose.
                                loose = true;
                                self.pop_into(block);
                                break;
                            }
                            _ => break,
                        }
                    }
                    TokenKind::LINE_INDENTED_SPACE | TokenKind::LINE_INDENTED_TAB => {
                        item_lines.push(self.lines.pop_front().unwrap());
                    }
                    kind if kind == marker_kind => break,
                    TokenKind::LINE_LIST_BULLETED | TokenKind::LINE_LIST_ENUMERATED => break,
                    kind if self.line_continues_paragraph(kind, line) => {
                        item_lines.push(self.lines.pop_front().unwrap());
                    }
                    _ => break,
                }
            }

            if saw_blank_in_item {
                loose = true;
            }
            for &line in &item_lines {
                self.tree.extend_span_over(item, line);
            }
            self.reparse_dedented(item, &item_lines, DedentRule::ListItem, depth);
            self.tree.extend_span_over(block, item);
            items.push(item);
        }

        if loose {
            let loose_kind = if list_kind == TokenKind::BLOCK_LIST_BULLETED {
                TokenKind::BLOCK_LIST_BULLETED_LOOSE
            } else {
                TokenKind::BLOCK_LIST_ENUMERATED_LOOSE
            };
            self.tree.set_kind(block, loose_kind);
        } else {
            for item in items {
                self.tree.set_kind(item, TokenKind::BLOCK_LIST_ITEM_TIGHT);
            }
        }
        self.finish_block(parent, block);
    }

    fn consume_table_or_para(&mut self, parent: TokenId) {
        // Look ahead: header rows then a separator make a table; otherwise
        // these lines are a paragraph.
        let mut header_count = 0;
        while self.peek_kind_at(header_count) == Some(TokenKind::LINE_TABLE) {
            header_count += 1;
        }
        if self.peek_kind_at(header_count) != Some(TokenKind::LINE_TABLE_SEPARATOR) {
            self.consume_paragraph(parent);
            return;
        }

        let block = self.new_block(parent, TokenKind::BLOCK_TABLE);
        let header = self.new_block(block, TokenKind::BLOCK_TABLE_HEADER);
        for _ in 0..header_count {
            self.pop_into(header);
        }
        let separator = self.pop_into(header);
        self.tree.extend_span_over(block, header);

        match parse_alignment_row(self.line_text(separator)) {
            Some(shape) => {
                self.table_shapes.insert(block, shape);
            }
            None => {
                self.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::MalformedTableAlignment,
                    self.tree.get(separator).start,
                ));
            }
        }

        loop {
            match self.peek_kind() {
                Some(TokenKind::LINE_TABLE) => {
                    let section = self.new_block(block, TokenKind::BLOCK_TABLE_SECTION);
                    while self.peek_kind() == Some(TokenKind::LINE_TABLE) {
                        self.pop_into(section);
                    }
                    self.tree.extend_span_over(block, section);
                }
                Some(TokenKind::LINE_EMPTY) => {
                    if self.peek_kind_at(1) == Some(TokenKind::LINE_TABLE) {
                        self.pop_into(block);
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }
        self.finish_block(parent, block);
    }

    /// Accept a metadata block only when every line of the opening block is a
    /// well-formed entry or a whitespace-led continuation; otherwise the
    /// lines are a plain paragraph.
    fn consume_meta_or_para(&mut self, parent: TokenId) {
        let mut count = 0;
        let mut well_formed = true;
        loop {
            match self.peek_kind_at(count) {
                None | Some(TokenKind::LINE_EMPTY) => break,
                Some(TokenKind::LINE_META) => count += 1,
                Some(_) => {
                    // Continuation lines begin with whitespace.
                    let line = self.lines[count];
                    let starts_with_space = self
                        .line_text(line)
                        .bytes()
                        .next()
                        .is_some_and(chars::is_whitespace);
                    if starts_with_space {
                        count += 1;
                    } else {
                        well_formed = false;
                        break;
                    }
                }
            }
        }

        if !well_formed || count == 0 {
            for index in 0..count {
                let line = self.lines[index];
                self.tree.set_kind(line, TokenKind::LINE_PLAIN);
            }
            self.consume_paragraph(parent);
            return;
        }

        let block = self.new_block(parent, TokenKind::BLOCK_META);
        for _ in 0..count {
            self.pop_into(block);
        }
        self.finish_block(parent, block);
    }

    /// Create dedented line tokens for nested content and parse them as
    /// blocks under `parent`, bounded by the recursion cap.
    fn reparse_dedented(
        &mut self,
        parent: TokenId,
        raw_lines: &[TokenId],
        rule: DedentRule,
        depth: usize,
    ) {
        if depth + 1 >= RECURSION_LIMIT {
            self.diagnostics.push(Diagnostic::new(
                DiagnosticKind::RecursionDepthExceeded,
                self.tree.get(parent).start,
            ));
            for (index, &line) in raw_lines.iter().enumerate() {
                let start = self.tree.get(line).start;
                let len = self.tree.get(line).len;
                let kind = if index == 0 {
                    TokenKind::LINE_PLAIN
                } else {
                    TokenKind::LINE_CONTINUATION
                };
                let copy = self.tree.alloc(kind, start, len);
                self.tree.append_child(parent, copy);
            }
            return;
        }

        let mut sub_lines = Vec::with_capacity(raw_lines.len());
        for (index, &line) in raw_lines.iter().enumerate() {
            let token = self.tree.get(line);
            let (start, end) = (token.start, token.end());
            let text = self.source.slice(start..end);
            let strip = rule.strip_width(text, index == 0);
            let sub_start = start + strip;
            let sub_len = end.saturating_sub(sub_start);
            let content_len = self
                .source
                .slice(sub_start..sub_start + sub_len)
                .trim_end_matches('\n')
                .len();
            let class = classify_line(self.source, sub_start, content_len, self.extensions, false);
            let id = self.tree.alloc(class.kind, sub_start, sub_len);
            sub_lines.push(id);
        }

        let saved = std::mem::replace(&mut self.lines, VecDeque::from(sub_lines));
        self.parse_blocks(parent, false, depth + 1);
        self.lines = saved;
    }
}

#[derive(Clone, Copy, Debug)]
enum DedentRule {
    Blockquote,
    ListItem,
}

impl DedentRule {
    /// How many bytes to strip from the front of a nested construct's line.
    fn strip_width(self, text: &str, is_first: bool) -> usize {
        let bytes = text.as_bytes();
        match self {
            DedentRule::Blockquote => {
                let mut index = 0;
                let mut spaces = 0;
                while index < bytes.len() && bytes[index] == b' ' && spaces < 3 {
                    index += 1;
                    spaces += 1;
                }
                if index < bytes.len() && bytes[index] == b'>' {
                    index += 1;
                    if index < bytes.len() && bytes[index] == b' ' {
                        index += 1;
                    }
                    index
                } else {
                    0
                }
            }
            DedentRule::ListItem => {
                if is_first {
                    // Past the marker and the whitespace that follows it.
                    let mut index = 0;
                    while index < bytes.len() && chars::is_whitespace(bytes[index]) {
                        index += 1;
                    }
                    if index < bytes.len() && matches!(bytes[index], b'*' | b'+' | b'-') {
                        index += 1;
                    } else {
                        while index < bytes.len() && chars::is_digit(bytes[index]) {
                            index += 1;
                        }
                        if index < bytes.len() && matches!(bytes[index], b'.' | b')') {
                            index += 1;
                        }
                    }
                    // One space of marker separation is enough; the rest
                    // counts toward nested indentation.
                    if index < bytes.len() && chars::is_whitespace(bytes[index]) {
                        index += 1;
                    }
                    index
                } else {
                    // Up to one tab or four spaces of indentation.
                    if !bytes.is_empty() && bytes[0] == b'\t' {
                        1
                    } else {
                        bytes.iter().take(4).take_while(|&&b| b == b' ').count()
                    }
                }
            }
        }
    }
}

/// Parse a table separator row into per-column alignments. Returns `None`
/// when no columns can be read.
fn parse_alignment_row(text: &str) -> Option<TableShape> {
    let trimmed = text.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    let mut alignments = Vec::new();
    for cell in inner.split('|') {
        if alignments.len() >= TABLE_MAX_COLUMNS {
            break;
        }
        let cell = cell.trim();
        if cell.is_empty() {
            return None;
        }
        let wrap = cell.contains('+');
        let leading = cell.starts_with(':');
        let trailing = cell.ends_with(':');
        let align = match (leading, trailing, wrap) {
            (true, true, false) => Align::Center,
            (true, true, true) => Align::CenterWrap,
            (false, true, false) => Align::Right,
            (false, true, true) => Align::RightWrap,
            (true, false, false) => Align::Left,
            (true, false, true) => Align::LeftWrap,
            (false, false, true) => Align::LeftWrap,
            (false, false, false) => Align::None,
        };
        alignments.push(align);
    }
    if alignments.is_empty() {
        None
    } else {
        Some(TableShape { alignments })
    }
}
