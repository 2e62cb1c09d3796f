//! Dissects completed definition blocks into the engine's reference stacks,
//! normalizes labels, validates URLs, and assigns anchor labels to headers.

use rustc_hash::FxHashMap;

use mmd_syntax::chars;
use mmd_syntax::{SourceText, TokenId, TokenKind, TokenTree};

use crate::block::parse_fragment;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::extensions::Extensions;
use crate::rand::Lcg;

/// Canonicalize whitespace (runs collapse to one space, ends trimmed) and
/// lowercase ASCII. One of the two hash keys every definition is filed under.
pub fn clean_label(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_space = false;
    for c in raw.chars() {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
        } else {
            if pending_space {
                out.push(' ');
                pending_space = false;
            }
            out.push(c.to_ascii_lowercase());
        }
    }
    out
}

/// Reduce a label to an identifier: ASCII alphanumerics (lowercased) plus
/// `.`, `_`, `-`, `:`; multibyte sequences pass through unchanged. The second
/// hash key, and the form used for anchor ids.
pub fn id_label(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if !c.is_ascii() {
            out.push(c);
        } else if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | ':') {
            out.push(c.to_ascii_lowercase());
        }
    }
    out
}

/// A stored link definition, or the destination side of an inline link.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Link {
    pub label: Option<TokenId>,
    pub clean_text: String,
    pub label_text: String,
    pub url: String,
    pub title: Option<String>,
    pub attributes: Vec<(String, String)>,
}

/// A footnote, citation, glossary, or abbreviation entry. `content` holds a
/// detached block fragment for body-bearing notes; abbreviations store their
/// expansion string instead.
#[derive(Clone, Debug)]
pub struct NoteDef {
    pub label: Option<TokenId>,
    pub clean_text: String,
    pub label_text: String,
    pub content: Option<TokenId>,
    pub expansion: Option<String>,
    pub inline: bool,
}

/// A header registered for TOC generation and cross-references.
#[derive(Clone, Debug)]
pub struct HeaderEntry {
    pub block: TokenId,
    pub level: u8,
    pub label: String,
    /// The visible heading text, captured before the inline pass replaces
    /// the heading's line tokens. Used for TOC entries.
    pub text: String,
    /// True when the label came from a trailing `[label]` span, which the
    /// inline pass excludes from the rendered heading text.
    pub manual: bool,
}

/// First-definition-wins table keyed under both normalizations.
#[derive(Debug, Default)]
pub struct RefTable {
    map: FxHashMap<String, usize>,
}

impl RefTable {
    pub fn insert(&mut self, index: usize, clean_text: &str, label_text: &str) {
        if !clean_text.is_empty() {
            self.map.entry(clean_text.to_string()).or_insert(index);
        }
        if !label_text.is_empty() {
            self.map.entry(label_text.to_string()).or_insert(index);
        }
    }

    /// Exact match first, then the clean form, then the identifier form.
    pub fn lookup(&self, text: &str) -> Option<usize> {
        if let Some(&index) = self.map.get(text) {
            return Some(index);
        }
        if let Some(&index) = self.map.get(&clean_label(text)) {
            return Some(index);
        }
        self.map.get(&id_label(text)).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Everything the extraction pass produces.
#[derive(Debug, Default)]
pub struct Definitions {
    pub links: Vec<Link>,
    pub footnotes: Vec<NoteDef>,
    pub citations: Vec<NoteDef>,
    pub glossary: Vec<NoteDef>,
    pub abbreviations: Vec<NoteDef>,
    pub link_table: RefTable,
    pub footnote_table: RefTable,
    pub citation_table: RefTable,
    pub glossary_table: RefTable,
    pub abbreviation_table: RefTable,
    pub headers: Vec<HeaderEntry>,
    pub tables: Vec<TokenId>,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn extract_definitions(
    source: &SourceText,
    tree: &mut TokenTree,
    root: TokenId,
    extensions: Extensions,
    random_seed: u32,
) -> Definitions {
    let mut defs = Definitions::default();
    let mut labeler = Lcg::new(random_seed);
    walk(source, tree, root, extensions, &mut defs, &mut labeler);
    defs
}

fn walk(
    source: &SourceText,
    tree: &mut TokenTree,
    parent: TokenId,
    extensions: Extensions,
    defs: &mut Definitions,
    labeler: &mut Lcg,
) {
    for block in tree.child_ids(parent) {
        let kind = tree.kind(block);
        match kind {
            TokenKind::BLOCK_DEF_LINK => extract_link(source, tree, block, defs),
            TokenKind::BLOCK_DEF_FOOTNOTE
            | TokenKind::BLOCK_DEF_CITATION
            | TokenKind::BLOCK_DEF_GLOSSARY => {
                extract_note(source, tree, block, extensions, defs)
            }
            TokenKind::BLOCK_DEF_ABBREVIATION => extract_abbreviation(source, tree, block, defs),
            TokenKind::BLOCK_TABLE => {
                defs.tables.push(block);
            }
            kind if kind.is_heading_block() => {
                extract_header(source, tree, block, extensions, defs, labeler)
            }
            TokenKind::BLOCK_BLOCKQUOTE
            | TokenKind::BLOCK_LIST_BULLETED
            | TokenKind::BLOCK_LIST_BULLETED_LOOSE
            | TokenKind::BLOCK_LIST_ENUMERATED
            | TokenKind::BLOCK_LIST_ENUMERATED_LOOSE
            | TokenKind::BLOCK_LIST_ITEM
            | TokenKind::BLOCK_LIST_ITEM_TIGHT
            | TokenKind::BLOCK_DEFLIST => {
                walk(source, tree, block, extensions, defs, labeler);
            }
            _ => {}
        }
    }
}

/// The `[label]` at the start of a definition block. Returns the interior
/// text range and the offset just past the closing `]:`.
fn split_definition_label(text: &str, marker_len: usize) -> Option<(std::ops::Range<usize>, usize)> {
    let bytes = text.as_bytes();
    let mut index = 1 + marker_len;
    let label_start = index;
    let mut escaped = false;
    while index < bytes.len() {
        match bytes[index] {
            _ if escaped => escaped = false,
            b'\\' => escaped = true,
            b']' => {
                if bytes.get(index + 1) == Some(&b':') {
                    return Some((label_start..index, index + 2));
                }
                return None;
            }
            _ => {}
        }
        index += 1;
    }
    None
}

fn block_first_line_text<'a>(source: &'a SourceText, tree: &TokenTree, block: TokenId) -> &'a str {
    let first = tree
        .get(block)
        .child()
        .expect("definition blocks always have a first line");
    source.slice(tree.get(first).span())
}

fn extract_link(source: &SourceText, tree: &TokenTree, block: TokenId, defs: &mut Definitions) {
    let text = block_whole_text(source, tree, block);
    let Some((label_range, rest_offset)) = split_definition_label(&text, 0) else {
        return;
    };
    let label = &text[label_range];
    let rest = &text[rest_offset..];

    let mut scanner = DestinationScanner::new(rest);
    let Some(url) = scanner.scan_url() else { return };
    if !is_valid_url(&url) {
        defs.diagnostics.push(Diagnostic::new(
            DiagnosticKind::InvalidUrl,
            tree.get(block).start,
        ));
        return;
    }
    let title = scanner.scan_title();
    let attributes = scanner.scan_attributes();

    let index = defs.links.len();
    let entry = Link {
        label: tree.get(block).child(),
        clean_text: clean_label(label),
        label_text: id_label(label),
        url,
        title,
        attributes,
    };
    defs.link_table
        .insert(index, &entry.clean_text, &entry.label_text);
    defs.links.push(entry);
}

/// Join a definition block's line payloads with newlines, so multi-line
/// values can be scanned as one logical string.
fn block_whole_text(source: &SourceText, tree: &TokenTree, block: TokenId) -> String {
    let mut text = String::new();
    for line in tree.children(block) {
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(source.slice(tree.get(line).span()));
    }
    text
}

fn extract_note(
    source: &SourceText,
    tree: &mut TokenTree,
    block: TokenId,
    extensions: Extensions,
    defs: &mut Definitions,
) {
    let first_text = block_first_line_text(source, tree, block).to_string();
    let Some((label_range, rest_offset)) = split_definition_label(&first_text, 1) else {
        return;
    };
    let label = first_text[label_range].to_string();
    let first_line = tree.get(block).child().unwrap();
    let first_start = tree.get(first_line).start;

    // Body ranges: remainder of the defining line, then every further line
    // with one level of indentation removed.
    let mut ranges = Vec::new();
    let mut body_start = rest_offset;
    while body_start < first_text.len()
        && chars::is_whitespace(first_text.as_bytes()[body_start])
    {
        body_start += 1;
    }
    ranges.push(first_start + body_start..tree.get(first_line).end());
    for line in tree.child_ids(block).into_iter().skip(1) {
        let token = tree.get(line);
        let text = source.slice(token.span());
        let strip = dedent_width(text);
        ranges.push(token.start + strip..token.end());
    }

    let kind = tree.kind(block);
    let content = parse_fragment(source, tree, &ranges, extensions);
    entry_into(defs, kind, NoteDef {
        label: Some(first_line),
        clean_text: clean_label(&label),
        label_text: id_label(&label),
        content: Some(content),
        expansion: None,
        inline: false,
    });
}

fn entry_into(defs: &mut Definitions, kind: TokenKind, entry: NoteDef) {
    let (notes, table) = match kind {
        TokenKind::BLOCK_DEF_FOOTNOTE => (&mut defs.footnotes, &mut defs.footnote_table),
        TokenKind::BLOCK_DEF_CITATION => (&mut defs.citations, &mut defs.citation_table),
        TokenKind::BLOCK_DEF_GLOSSARY => (&mut defs.glossary, &mut defs.glossary_table),
        _ => return,
    };
    let index = notes.len();
    table.insert(index, &entry.clean_text, &entry.label_text);
    notes.push(entry);
}

fn dedent_width(text: &str) -> usize {
    let bytes = text.as_bytes();
    if bytes.first() == Some(&b'\t') {
        1
    } else {
        bytes.iter().take(4).take_while(|&&b| b == b' ').count()
    }
}

fn extract_abbreviation(
    source: &SourceText,
    tree: &TokenTree,
    block: TokenId,
    defs: &mut Definitions,
) {
    let text = block_whole_text(source, tree, block);
    let Some((label_range, rest_offset)) = split_definition_label(&text, 1) else {
        return;
    };
    let label = &text[label_range];
    let expansion = text[rest_offset..].trim().to_string();
    let index = defs.abbreviations.len();
    let entry = NoteDef {
        label: tree.get(block).child(),
        clean_text: clean_label(label),
        label_text: id_label(label),
        content: None,
        expansion: Some(expansion),
        inline: false,
    };
    defs.abbreviation_table
        .insert(index, &entry.clean_text, &entry.label_text);
    defs.abbreviations.push(entry);
}

fn extract_header(
    source: &SourceText,
    tree: &TokenTree,
    block: TokenId,
    extensions: Extensions,
    defs: &mut Definitions,
    labeler: &mut Lcg,
) {
    let level = tree.kind(block).heading_level().unwrap_or(1);
    let full_text = heading_text(source, tree, block);
    if extensions.contains(Extensions::NO_LABELS) {
        defs.headers.push(HeaderEntry {
            block,
            level,
            label: String::new(),
            text: full_text,
            manual: false,
        });
        return;
    }

    let (label_source, visible, manual) = match manual_label(&full_text) {
        Some((label, suffix_len)) => {
            let kept = full_text.trim_end().len() - suffix_len;
            let visible = full_text[..kept].trim_end().to_string();
            (label.to_string(), visible, true)
        }
        None => (full_text.clone(), full_text.clone(), false),
    };

    let label = if extensions.contains(Extensions::RANDOM_LABELS) && !manual {
        format!("{:x}", labeler.next_u32())
    } else {
        id_label(&clean_label(&label_source))
    };

    defs.headers.push(HeaderEntry {
        block,
        level,
        label,
        text: visible,
        manual,
    });
}

/// The visible text of a heading: the first line's payload minus ATX marker
/// hashes, or every line except the setext underline.
pub fn heading_text(source: &SourceText, tree: &TokenTree, block: TokenId) -> String {
    let kind = tree.kind(block);
    let mut text = String::new();
    for line in tree.children(block) {
        let line_kind = tree.kind(line);
        if matches!(
            line_kind,
            TokenKind::LINE_SETEXT_1 | TokenKind::LINE_SETEXT_2
        ) {
            continue;
        }
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(source.slice(tree.get(line).span()));
    }
    if matches!(
        kind,
        TokenKind::BLOCK_SETEXT_1 | TokenKind::BLOCK_SETEXT_2
    ) {
        return text.trim().to_string();
    }
    strip_atx_markers(&text).to_string()
}

pub fn strip_atx_markers(text: &str) -> &str {
    let text = text.trim();
    let text = text.trim_start_matches('#');
    let text = text.trim_start();
    // An optional closing hash run, if separated from the text by a space.
    let trimmed = text.trim_end_matches('#');
    if trimmed.len() < text.len() && trimmed.ends_with(' ') {
        trimmed.trim_end()
    } else {
        text.trim_end()
    }
}

/// A heading ending in `[label]` carries a manual anchor label. Returns the
/// label text and the byte length of the bracketed suffix.
pub fn manual_label(text: &str) -> Option<(&str, usize)> {
    let trimmed = text.trim_end();
    if !trimmed.ends_with(']') {
        return None;
    }
    let open = trimmed.rfind('[')?;
    // Reference-style `][` suffixes and escapes are not manual labels.
    if open > 0 && trimmed.as_bytes()[open - 1] == b'\\' {
        return None;
    }
    let label = &trimmed[open + 1..trimmed.len() - 1];
    if label.is_empty() || label.starts_with(['^', '#', '?', '>', '%']) {
        return None;
    }
    Some((label, trimmed.len() - open))
}

/// Accept absolute URLs with a scheme, fragment/query references, and
/// relative paths. Reject anything with embedded whitespace or control
/// bytes, and scheme-only strings like `http:`.
pub fn is_valid_url(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }
    if url
        .bytes()
        .any(|b| b.is_ascii_control() || chars::is_whitespace(b))
    {
        return false;
    }
    if let Some(colon) = url.find(':') {
        let scheme = &url[..colon];
        let is_scheme = !scheme.is_empty()
            && scheme.as_bytes()[0].is_ascii_alphabetic()
            && scheme
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'.' | b'-'));
        if is_scheme {
            return !url[colon + 1..].is_empty();
        }
    }
    true
}

/// Scans the remainder of a link definition: destination, optional quoted
/// title (possibly on the following line), then `key="value"` attributes.
pub struct DestinationScanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> DestinationScanner<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn bytes(&self) -> &[u8] {
        self.text.as_bytes()
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.text.len()
            && chars::is_whitespace_or_line_ending(self.bytes()[self.pos])
        {
            self.pos += 1;
        }
    }

    pub fn scan_url(&mut self) -> Option<String> {
        self.skip_whitespace();
        if self.pos >= self.text.len() {
            return None;
        }
        if self.bytes()[self.pos] == b'<' {
            let close = self.text[self.pos..].find('>')?;
            let url = self.text[self.pos + 1..self.pos + close].to_string();
            self.pos += close + 1;
            return Some(url);
        }
        let start = self.pos;
        while self.pos < self.text.len()
            && !chars::is_whitespace_or_line_ending(self.bytes()[self.pos])
        {
            self.pos += 1;
        }
        Some(self.text[start..self.pos].to_string())
    }

    pub fn scan_title(&mut self) -> Option<String> {
        let saved = self.pos;
        self.skip_whitespace();
        if self.pos >= self.text.len() {
            self.pos = saved;
            return None;
        }
        let open = self.bytes()[self.pos];
        let close = match open {
            b'"' => b'"',
            b'\'' => b'\'',
            b'(' => b')',
            _ => {
                self.pos = saved;
                return None;
            }
        };
        let interior_start = self.pos + 1;
        let rel = self.text[interior_start..].find(close as char)?;
        let title = self.text[interior_start..interior_start + rel].to_string();
        self.pos = interior_start + rel + 1;
        Some(title)
    }

    pub fn scan_attributes(&mut self) -> Vec<(String, String)> {
        let mut attributes = Vec::new();
        loop {
            self.skip_whitespace();
            let key_start = self.pos;
            while self.pos < self.text.len()
                && (chars::is_alphanumeric(self.bytes()[self.pos])
                    || matches!(self.bytes()[self.pos], b'-' | b'_'))
            {
                self.pos += 1;
            }
            if self.pos == key_start || self.bytes().get(self.pos) != Some(&b'=') {
                break;
            }
            let key = self.text[key_start..self.pos].to_ascii_lowercase();
            self.pos += 1;
            let value = if self.bytes().get(self.pos) == Some(&b'"') {
                self.pos += 1;
                let start = self.pos;
                let rel = self.text[start..].find('"').unwrap_or(self.text.len() - start);
                self.pos = start + rel + if start + rel < self.text.len() { 1 } else { 0 };
                self.text[start..start + rel].to_string()
            } else {
                let start = self.pos;
                while self.pos < self.text.len()
                    && !chars::is_whitespace_or_line_ending(self.bytes()[self.pos])
                {
                    self.pos += 1;
                }
                self.text[start..self.pos].to_string()
            };
            let value = match key.as_str() {
                // Bare pixel sizes are written without the unit.
                "width" | "height" => value.trim_end_matches("px").to_string(),
                _ => value,
            };
            attributes.push((key, value));
        }
        attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::parse_document;
    use crate::line::scan_lines;
    use test_case::test_case;

    fn extract(text: &str) -> (TokenTree, Definitions) {
        let source = SourceText::new(text);
        let mut tree = TokenTree::new();
        let lines = scan_lines(&source, &mut tree, Extensions::standard());
        let result = parse_document(&source, &mut tree, lines, Extensions::standard());
        let defs = extract_definitions(&source, &mut tree, result.root, Extensions::standard(), 1);
        (tree, defs)
    }

    #[test_case("Some Label", "some label"; "collapses case")]
    #[test_case("  spaced\t out \n", "spaced out"; "collapses whitespace")]
    fn clean_labels(raw: &str, expected: &str) {
        assert_eq!(clean_label(raw), expected);
    }

    #[test_case("Some Label!", "somelabel"; "drops punctuation")]
    #[test_case("a.b_c-d:e", "a.b_c-d:e"; "keeps identifier punctuation")]
    #[test_case("Füße", "füße"; "keeps multibyte")]
    fn id_labels(raw: &str, expected: &str) {
        assert_eq!(id_label(raw), expected);
    }

    #[test]
    fn link_definition_with_title() {
        let (_, defs) = extract("[bar]: https://example.com \"Example\"\n");
        assert_eq!(defs.links.len(), 1);
        let link = &defs.links[0];
        assert_eq!(link.url, "https://example.com");
        assert_eq!(link.title.as_deref(), Some("Example"));
        assert_eq!(defs.link_table.lookup("bar"), Some(0));
        assert_eq!(defs.link_table.lookup("BAR"), Some(0));
    }

    #[test]
    fn angle_bracket_destination() {
        let (_, defs) = extract("[x]: <https://example.com/a b>\n");
        assert_eq!(defs.links[0].url, "https://example.com/a b");
    }

    #[test]
    fn title_on_next_line() {
        let (_, defs) = extract("[x]: https://example.com\n    \"Over here\"\n");
        assert_eq!(defs.links[0].title.as_deref(), Some("Over here"));
    }

    #[test]
    fn attributes_with_px_stripping() {
        let (_, defs) = extract("[img]: pic.png \"t\" width=400px height=300\n");
        assert_eq!(
            defs.links[0].attributes,
            vec![
                ("width".to_string(), "400".to_string()),
                ("height".to_string(), "300".to_string())
            ]
        );
    }

    #[test]
    fn first_definition_wins() {
        let (_, defs) = extract("[a]: http://first.example\n\n[a]: http://second.example\n");
        assert_eq!(defs.links.len(), 2);
        assert_eq!(defs.link_table.lookup("a"), Some(0));
        assert_eq!(defs.links[0].url, "http://first.example");
    }

    #[test]
    fn invalid_url_rejects_definition() {
        let (_, defs) = extract("[bad]: http:\n");
        assert!(defs.links.is_empty());
        assert_eq!(defs.diagnostics[0].kind, DiagnosticKind::InvalidUrl);
    }

    #[test]
    fn footnote_definition_builds_content() {
        let (tree, defs) = extract("[^1]: The note.\n");
        assert_eq!(defs.footnotes.len(), 1);
        let note = &defs.footnotes[0];
        assert_eq!(note.label_text, "1");
        let content = note.content.unwrap();
        assert_eq!(tree.kind(content), TokenKind::DOCUMENT);
        let blocks: Vec<_> = tree.children(content).map(|id| tree.kind(id)).collect();
        assert_eq!(blocks, vec![TokenKind::BLOCK_PARA]);
    }

    #[test]
    fn abbreviation_expansion() {
        let (_, defs) = extract("[>MMD]: MultiMarkdown\n");
        assert_eq!(defs.abbreviations.len(), 1);
        assert_eq!(
            defs.abbreviations[0].expansion.as_deref(),
            Some("MultiMarkdown")
        );
        assert_eq!(defs.abbreviation_table.lookup("mmd"), Some(0));
    }

    #[test]
    fn header_labels() {
        let (_, defs) = extract("# Hello World\n\n## Größe [size]\n");
        assert_eq!(defs.headers.len(), 2);
        assert_eq!(defs.headers[0].label, "helloworld");
        assert_eq!(defs.headers[1].label, "size");
        assert!(defs.headers[1].manual);
    }

    #[test]
    fn random_labels_are_deterministic() {
        let run = || {
            let source = SourceText::new("# One\n\n# Two\n");
            let mut tree = TokenTree::new();
            let lines = scan_lines(&source, &mut tree, Extensions::standard());
            let result = parse_document(&source, &mut tree, lines, Extensions::standard());
            let defs = extract_definitions(
                &source,
                &mut tree,
                result.root,
                Extensions::standard() | Extensions::RANDOM_LABELS,
                7,
            );
            defs.headers
                .iter()
                .map(|h| h.label.clone())
                .collect::<Vec<_>>()
        };
        let a = run();
        let b = run();
        assert_eq!(a, b);
        assert_ne!(a[0], a[1]);
    }

    #[test_case("https://example.com", true)]
    #[test_case("relative/path.html", true)]
    #[test_case("#fragment", true)]
    #[test_case("http:", false)]
    #[test_case("has space", false)]
    #[test_case("", false)]
    fn url_validation(url: &str, valid: bool) {
        assert_eq!(is_valid_url(url), valid);
    }
}
