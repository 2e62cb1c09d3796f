//! Bracket classification. After pairing, bracket pairs are resolved against
//! the reference tables: explicit links and images, reference links,
//! footnotes, citations (including the locator form), glossary terms,
//! abbreviations, and metadata variables. Missing notes with substantive
//! content become inline definitions owned by the engine.

use rustc_hash::FxHashMap;

use mmd_syntax::{SourceText, TokenId, TokenKind, TokenTree};

use crate::extensions::Extensions;
use crate::extract::{clean_label, DestinationScanner, Definitions, Link, NoteDef};
use crate::metadata::{metadata_key, MetaItem};

/// What a bracket pair turned out to mean. Consulted by the renderer.
#[derive(Clone, Debug)]
pub enum BracketTarget {
    /// Explicit `[label](url "title")`; the following paren pair is consumed.
    InlineLink(Link),
    /// Reference or shortcut link resolved to `links[index]`.
    LinkRef(usize),
    Footnote(usize),
    Citation {
        index: usize,
        locator: Option<TokenId>,
    },
    Glossary(usize),
    Abbreviation(usize),
    /// `[%key]` replaced by a metadata value.
    Variable(String),
    /// A code span gated to one output format by a trailing `{=format}`.
    RawFilter(String),
    /// Absorbed into the resolution of a neighboring token; emits nothing.
    Consumed,
}

#[derive(Debug, Default)]
pub struct Resolutions {
    pub targets: FxHashMap<TokenId, BracketTarget>,
}

impl Resolutions {
    pub fn get(&self, id: TokenId) -> Option<&BracketTarget> {
        self.targets.get(&id)
    }
}

pub fn resolve_inline(
    source: &SourceText,
    tree: &TokenTree,
    root: TokenId,
    defs: &mut Definitions,
    metadata: &[MetaItem],
    extensions: Extensions,
) -> Resolutions {
    let mut resolutions = Resolutions::default();
    let mut resolver = Resolver {
        source,
        tree,
        defs,
        metadata,
        _extensions: extensions,
    };
    resolver.walk(root, &mut resolutions, 0);
    resolutions
}

struct Resolver<'a> {
    source: &'a SourceText,
    tree: &'a TokenTree,
    defs: &'a mut Definitions,
    metadata: &'a [MetaItem],
    _extensions: Extensions,
}

impl<'a> Resolver<'a> {
    fn walk(&mut self, parent: TokenId, out: &mut Resolutions, depth: usize) {
        if depth >= crate::RECURSION_LIMIT {
            return;
        }
        let children = self.tree.child_ids(parent);
        let mut index = 0;
        while index < children.len() {
            let current = children[index];
            let kind = self.tree.kind(current);
            match kind {
                TokenKind::PAIR_BRACKET | TokenKind::PAIR_BRACKET_IMAGE => {
                    let consumed_next =
                        self.resolve_link_like(current, children.get(index + 1).copied(), out);
                    if consumed_next {
                        index += 1;
                    }
                }
                TokenKind::PAIR_BRACKET_FOOTNOTE => self.resolve_note(
                    current,
                    NoteKind::Footnote,
                    out,
                ),
                TokenKind::PAIR_BRACKET_CITATION => self.resolve_citation(current, None, out),
                TokenKind::PAIR_BRACKET_GLOSSARY => self.resolve_note(
                    current,
                    NoteKind::Glossary,
                    out,
                ),
                TokenKind::PAIR_BRACKET_ABBREVIATION => {
                    let label = self.interior_text(current);
                    if let Some(found) = self.defs.abbreviation_table.lookup(&label) {
                        out.targets
                            .insert(current, BracketTarget::Abbreviation(found));
                    }
                }
                TokenKind::PAIR_BRACKET_VARIABLE => {
                    let key = metadata_key(&self.interior_text(current));
                    if let Some(item) = self.metadata.iter().find(|item| item.key == key) {
                        out.targets
                            .insert(current, BracketTarget::Variable(item.value.clone()));
                    }
                }
                TokenKind::PAIR_BACKTICK => {
                    if let Some(&next) = children.get(index + 1) {
                        if self.tree.kind(next) == TokenKind::PAIR_RAW_FILTER {
                            let format = self.interior_text(next).trim().to_string();
                            out.targets.insert(current, BracketTarget::RawFilter(format));
                            out.targets.insert(next, BracketTarget::Consumed);
                            index += 1;
                        }
                    }
                }
                _ => {}
            }

            // Descend into everything that can hold nested inline content.
            if !matches!(
                kind,
                TokenKind::PAIR_BACKTICK | TokenKind::PAIR_MATH | TokenKind::PAIR_RAW_FILTER
            ) && self.tree.get(current).child().is_some()
            {
                self.walk(current, out, depth + 1);
            }
            index += 1;
        }
    }

    /// The source text between a pair's delimiters.
    fn interior_text(&self, pair: TokenId) -> String {
        let Some(first) = self.tree.get(pair).child() else {
            return String::new();
        };
        let last = self.tree.get(pair).tail().unwrap_or(first);
        let start = self.tree.get(first).end();
        let end = self.tree.get(last).start;
        if start >= end {
            return String::new();
        }
        self.source.slice(start..end).to_string()
    }

    /// Returns true when the following sibling was consumed.
    fn resolve_link_like(
        &mut self,
        bracket: TokenId,
        next: Option<TokenId>,
        out: &mut Resolutions,
    ) -> bool {
        match next.map(|id| self.tree.kind(id)) {
            Some(TokenKind::PAIR_PAREN) => {
                let next = next.unwrap();
                let interior = self.interior_text(next);
                let mut scanner = DestinationScanner::new(&interior);
                let url = scanner.scan_url().unwrap_or_default();
                let title = scanner.scan_title();
                let attributes = scanner.scan_attributes();
                out.targets.insert(
                    bracket,
                    BracketTarget::InlineLink(Link {
                        label: None,
                        clean_text: String::new(),
                        label_text: String::new(),
                        url,
                        title,
                        attributes,
                    }),
                );
                out.targets.insert(next, BracketTarget::Consumed);
                true
            }
            Some(TokenKind::PAIR_BRACKET) => {
                let next = next.unwrap();
                let mut label = self.interior_text(next);
                if label.trim().is_empty() {
                    label = self.interior_text(bracket);
                }
                match self.defs.link_table.lookup(&clean_label(&label)) {
                    Some(found) => {
                        out.targets.insert(bracket, BracketTarget::LinkRef(found));
                        out.targets.insert(next, BracketTarget::Consumed);
                        true
                    }
                    None => false,
                }
            }
            Some(TokenKind::PAIR_BRACKET_CITATION) => {
                // `[p. 23][#ref]`: the first bracket is a locator for the
                // citation that follows.
                let next = next.unwrap();
                self.resolve_citation(next, Some(bracket), out);
                out.targets.insert(bracket, BracketTarget::Consumed);
                true
            }
            _ => {
                let label = self.interior_text(bracket);
                if let Some(found) = self.defs.link_table.lookup(&clean_label(&label)) {
                    out.targets.insert(bracket, BracketTarget::LinkRef(found));
                }
                false
            }
        }
    }

    fn resolve_citation(
        &mut self,
        pair: TokenId,
        locator: Option<TokenId>,
        out: &mut Resolutions,
    ) {
        let label = self.interior_text(pair);
        let index = match self.defs.citation_table.lookup(&clean_label(&label)) {
            Some(found) => found,
            None => {
                if label.trim().is_empty() {
                    return;
                }
                let index = self.defs.citations.len();
                self.defs.citations.push(inline_note(pair, &label));
                index
            }
        };
        out.targets
            .insert(pair, BracketTarget::Citation { index, locator });
    }

    fn resolve_note(&mut self, pair: TokenId, which: NoteKind, out: &mut Resolutions) {
        let label = self.interior_text(pair);
        let (notes, table) = match which {
            NoteKind::Footnote => (&mut self.defs.footnotes, &self.defs.footnote_table),
            NoteKind::Glossary => (&mut self.defs.glossary, &self.defs.glossary_table),
        };
        let index = match table.lookup(&clean_label(&label)) {
            Some(found) => found,
            None => {
                // An undefined reference with substantive content becomes an
                // inline definition.
                if label.trim().is_empty() {
                    return;
                }
                let index = notes.len();
                notes.push(inline_note(pair, &label));
                index
            }
        };
        let target = match which {
            NoteKind::Footnote => BracketTarget::Footnote(index),
            NoteKind::Glossary => BracketTarget::Glossary(index),
        };
        out.targets.insert(pair, target);
    }
}

#[derive(Clone, Copy)]
enum NoteKind {
    Footnote,
    Glossary,
}

/// An inline definition: the bracket pair itself is the content, and the
/// scratch pad releases the entry when the emission ends.
fn inline_note(pair: TokenId, _label: &str) -> NoteDef {
    NoteDef {
        label: None,
        clean_text: String::new(),
        label_text: String::new(),
        content: Some(pair),
        expansion: None,
        inline: true,
    }
}
