//! The inline pass: re-lexes each block's content into span tokens, joins
//! lines with soft/hard break tokens, splits table rows into cells, and runs
//! the pair matcher over every resulting chain.

pub mod lexer;
pub mod pairs;
pub mod resolve;

use rustc_hash::FxHashSet;

use mmd_syntax::chars;
use mmd_syntax::{SourceText, TokenId, TokenKind, TokenTree};

use crate::extensions::Extensions;
use crate::extract::manual_label;

/// Process every inline-bearing block beneath `root` (which may be the
/// document or a detached note-content fragment).
pub fn process_blocks(
    source: &SourceText,
    tree: &mut TokenTree,
    root: TokenId,
    extensions: Extensions,
    manual_label_blocks: &FxHashSet<TokenId>,
) {
    for block in tree.child_ids(root) {
        let kind = tree.kind(block);
        match kind {
            TokenKind::BLOCK_PARA
            | TokenKind::BLOCK_TERM
            | TokenKind::BLOCK_DEFINITION
            | TokenKind::BLOCK_SETEXT_1
            | TokenKind::BLOCK_SETEXT_2
            | TokenKind::BLOCK_H1
            | TokenKind::BLOCK_H2
            | TokenKind::BLOCK_H3
            | TokenKind::BLOCK_H4
            | TokenKind::BLOCK_H5
            | TokenKind::BLOCK_H6 => {
                lex_block(source, tree, block, kind, extensions, manual_label_blocks)
            }
            TokenKind::BLOCK_TABLE_HEADER | TokenKind::BLOCK_TABLE_SECTION => {
                lex_table_section(source, tree, block, extensions)
            }
            TokenKind::BLOCK_BLOCKQUOTE
            | TokenKind::BLOCK_DEFLIST
            | TokenKind::BLOCK_LIST_BULLETED
            | TokenKind::BLOCK_LIST_BULLETED_LOOSE
            | TokenKind::BLOCK_LIST_ENUMERATED
            | TokenKind::BLOCK_LIST_ENUMERATED_LOOSE
            | TokenKind::BLOCK_LIST_ITEM
            | TokenKind::BLOCK_LIST_ITEM_TIGHT
            | TokenKind::BLOCK_TABLE => {
                process_blocks(source, tree, block, extensions, manual_label_blocks)
            }
            _ => {}
        }
    }
}

/// The payload of one line after structural markers are removed.
fn content_range(
    source: &SourceText,
    tree: &TokenTree,
    block_kind: TokenKind,
    line: TokenId,
    is_first: bool,
) -> Option<std::ops::Range<usize>> {
    let token = tree.get(line);
    let kind = tree.kind(line);
    if matches!(kind, TokenKind::LINE_SETEXT_1 | TokenKind::LINE_SETEXT_2) {
        return None;
    }
    let (mut start, end) = (token.start, token.end());
    let bytes = source.as_bytes();

    // Leading whitespace never carries through to inline content.
    while start < end && chars::is_whitespace(bytes[start]) {
        start += 1;
    }

    if block_kind.heading_level().is_some() && !matches!(
        block_kind,
        TokenKind::BLOCK_SETEXT_1 | TokenKind::BLOCK_SETEXT_2
    ) {
        while start < end && bytes[start] == b'#' {
            start += 1;
        }
        while start < end && chars::is_whitespace(bytes[start]) {
            start += 1;
        }
        // The optional closing hash run, when separated by a space.
        let text = source.slice(start..end);
        let trimmed = text.trim_end();
        let without_hashes = trimmed.trim_end_matches('#');
        let new_len = if without_hashes.len() < trimmed.len() && without_hashes.ends_with(' ') {
            without_hashes.trim_end().len()
        } else {
            trimmed.len()
        };
        return Some(start..start + new_len);
    }

    if block_kind == TokenKind::BLOCK_DEFINITION && is_first {
        if start < end && bytes[start] == b':' {
            start += 1;
            while start < end && chars::is_whitespace(bytes[start]) {
                start += 1;
            }
        }
    }

    Some(start..end)
}

fn lex_block(
    source: &SourceText,
    tree: &mut TokenTree,
    block: TokenId,
    kind: TokenKind,
    extensions: Extensions,
    manual_label_blocks: &FxHashSet<TokenId>,
) {
    let lines = tree.child_ids(block);
    let mut ranges = Vec::with_capacity(lines.len());
    for (index, &line) in lines.iter().enumerate() {
        if let Some(range) = content_range(source, tree, kind, line, index == 0) {
            ranges.push(range);
        }
    }

    // Headings with a manual `[label]` suffix drop it from the visible text.
    if manual_label_blocks.contains(&block) {
        if let Some(last) = ranges.last_mut() {
            let text = source.slice(last.clone());
            if let Some((_, suffix_len)) = manual_label(text) {
                let kept = text.trim_end().len() - suffix_len;
                let kept = text[..kept].trim_end().len();
                last.end = last.start + kept;
            }
        }
    }

    let mut lexed = Vec::new();
    let last_index = ranges.len().saturating_sub(1);
    for (index, range) in ranges.iter().enumerate() {
        let text = source.slice(range.clone());
        let trailing_spaces = text.len() - text.trim_end_matches(' ').len();
        let is_last = index == last_index;

        let lex_end = if !is_last && trailing_spaces >= 2 {
            range.end - trailing_spaces
        } else {
            range.end
        };
        lexer::tokenize(source, range.start, lex_end, extensions, &mut lexed);

        if !is_last {
            // The newline byte sits just past the stripped payload.
            if trailing_spaces >= 2 {
                lexed.push(lexer_break(TokenKind::TEXT_LINEBREAK, lex_end, range.end + 1));
            } else {
                lexed.push(lexer_break(TokenKind::TEXT_NL, range.end, range.end + 1));
            }
        }
    }

    tree.take_children(block);
    for token in &lexed {
        let id = tree.alloc(token.kind, token.start, token.len);
        tree.add_flags(id, token.flags);
        tree.append_child(block, id);
    }
    pairs::pair_inline(tree, block, extensions);
}

fn lexer_break(kind: TokenKind, start: usize, end: usize) -> lexer::Lexed {
    lexer::Lexed {
        kind,
        start,
        len: end - start,
        flags: mmd_syntax::TokenFlags::empty(),
    }
}

/// Split each table line into a `TABLE_ROW` of `TABLE_CELL`s and lex each
/// cell as its own inline chain.
fn lex_table_section(
    source: &SourceText,
    tree: &mut TokenTree,
    section: TokenId,
    extensions: Extensions,
) {
    let lines = tree.child_ids(section);
    tree.take_children(section);

    for line in lines {
        tree.unlink_siblings(line);
        if tree.kind(line) != TokenKind::LINE_TABLE {
            tree.append_child(section, line);
            continue;
        }

        let token = tree.get(line);
        let (start, end) = (token.start, token.end());
        let row = tree.alloc(TokenKind::TABLE_ROW, start, end - start);
        for cell_range in split_cells(source, start, end) {
            let cell = tree.alloc(
                TokenKind::TABLE_CELL,
                cell_range.start,
                cell_range.len(),
            );
            let mut lexed = Vec::new();
            lexer::tokenize(source, cell_range.start, cell_range.end, extensions, &mut lexed);
            for token in &lexed {
                let id = tree.alloc(token.kind, token.start, token.len);
                tree.add_flags(id, token.flags);
                tree.append_child(cell, id);
            }
            pairs::pair_inline(tree, cell, extensions);
            tree.append_child(row, cell);
        }
        tree.append_child(section, row);
    }
}

/// Cell payload ranges between unescaped pipes, whitespace-trimmed. Leading
/// and trailing pipes do not produce empty edge cells.
fn split_cells(source: &SourceText, start: usize, end: usize) -> Vec<std::ops::Range<usize>> {
    let bytes = source.as_bytes();
    let mut boundaries = vec![];
    let mut escaped = false;
    for pos in start..end {
        match bytes[pos] {
            _ if escaped => escaped = false,
            b'\\' => escaped = true,
            b'|' => boundaries.push(pos),
            _ => {}
        }
    }

    let mut cells = Vec::new();
    let mut cell_start = start;
    for &pipe in &boundaries {
        cells.push(cell_start..pipe);
        cell_start = pipe + 1;
    }
    cells.push(cell_start..end);

    // Trim each cell; drop empty cells produced by edge pipes.
    let count = cells.len();
    cells
        .into_iter()
        .enumerate()
        .filter_map(|(index, range)| {
            let text = source.slice(range.clone());
            let from_start = text.len() - text.trim_start().len();
            let trimmed = text.trim();
            let range = range.start + from_start..range.start + from_start + trimmed.len();
            let is_edge = index == 0 || index == count - 1;
            if trimmed.is_empty() && is_edge {
                None
            } else {
                Some(range)
            }
        })
        .collect()
}
