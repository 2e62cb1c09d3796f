//! The HTML emitter. Canonical implementation of the renderer contract; the
//! other emitters follow the same dispatch shape.

use std::fmt::Write as _;

use mmd_syntax::{TokenId, TokenKind};

use crate::block::Align;
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::extensions::Extensions;
use crate::extract::NoteDef;
use crate::i18n::localize;
use crate::inline::resolve::BracketTarget;
use crate::render::util::{escape_href, escape_html, looks_like_email, looks_like_uri};
use crate::render::{effective_heading_level, Emitter, NoteStack, ScratchPad};

pub struct HtmlEmitter;

impl Emitter for HtmlEmitter {
    fn start_complete(&mut self, out: &mut String, scratch: &mut ScratchPad) {
        let engine = scratch.engine;
        let mut head = String::new();
        head.push_str("<!DOCTYPE html>\n<html>\n<head>\n\t<meta charset=\"utf-8\"/>\n");
        if let Some(title) = engine.metadata_value("title") {
            let _ = writeln!(head, "\t<title>{}</title>", escape_html(title));
        } else {
            head.push_str("\t<title></title>\n");
        }
        if let Some(css) = engine.metadata_value("css") {
            let _ = writeln!(
                head,
                "\t<link type=\"text/css\" rel=\"stylesheet\" href=\"{}\"/>",
                escape_href(css)
            );
        }
        for key in ["htmlheader", "xhtmlheader"] {
            if let Some(extra) = engine.metadata_value(key) {
                head.push_str(extra);
                head.push('\n');
            }
        }
        head.push_str("</head>\n<body>\n");
        scratch.write(out, &head);
    }

    fn end_complete(&mut self, out: &mut String, scratch: &mut ScratchPad) {
        let mut tail = String::new();
        if let Some(footer) = scratch.engine.metadata_value("htmlfooter") {
            tail.push_str("\n\n");
            tail.push_str(footer);
        }
        tail.push_str("\n\n</body>\n</html>\n");
        scratch.write(out, &tail);
    }

    fn visit(&mut self, out: &mut String, token: TokenId, scratch: &mut ScratchPad) {
        let tree = scratch.engine.tree();
        let kind = tree.kind(token);
        match kind {
            TokenKind::DOCUMENT => self.visit_tree(out, token, scratch),

            //#region Blocks
            TokenKind::BLOCK_EMPTY | TokenKind::BLOCK_META => {}
            kind if kind.is_definition_block() => {}
            TokenKind::BLOCK_PARA => self.paragraph(out, token, scratch),
            TokenKind::BLOCK_H1
            | TokenKind::BLOCK_H2
            | TokenKind::BLOCK_H3
            | TokenKind::BLOCK_H4
            | TokenKind::BLOCK_H5
            | TokenKind::BLOCK_H6
            | TokenKind::BLOCK_SETEXT_1
            | TokenKind::BLOCK_SETEXT_2 => self.heading(out, token, kind, scratch),
            TokenKind::BLOCK_HR => {
                scratch.pad(out, 2);
                scratch.write(out, "<hr />");
            }
            TokenKind::BLOCK_CODE_INDENTED => self.indented_code(out, token, scratch),
            TokenKind::BLOCK_CODE_FENCED => self.fenced_code(out, token, scratch),
            TokenKind::BLOCK_HTML => self.raw_block(out, token, scratch),
            TokenKind::BLOCK_BLOCKQUOTE => {
                scratch.pad(out, 2);
                scratch.write(out, "<blockquote>");
                self.visit_tree(out, token, scratch);
                scratch.pad(out, 1);
                scratch.write(out, "</blockquote>");
            }
            TokenKind::BLOCK_LIST_BULLETED | TokenKind::BLOCK_LIST_BULLETED_LOOSE => {
                self.list(out, token, "ul", kind == TokenKind::BLOCK_LIST_BULLETED, scratch)
            }
            TokenKind::BLOCK_LIST_ENUMERATED | TokenKind::BLOCK_LIST_ENUMERATED_LOOSE => {
                self.list(out, token, "ol", kind == TokenKind::BLOCK_LIST_ENUMERATED, scratch)
            }
            TokenKind::BLOCK_LIST_ITEM | TokenKind::BLOCK_LIST_ITEM_TIGHT => {
                scratch.pad(out, 1);
                scratch.write(out, "<li>");
                // The first block inside an item hugs the tag.
                scratch.padded = 2;
                self.visit_tree(out, token, scratch);
                scratch.write(out, "</li>");
            }
            TokenKind::BLOCK_DEFLIST => {
                scratch.pad(out, 2);
                scratch.write(out, "<dl>");
                self.visit_tree(out, token, scratch);
                scratch.pad(out, 1);
                scratch.write(out, "</dl>");
            }
            TokenKind::BLOCK_TERM => {
                scratch.pad(out, 1);
                scratch.write(out, "<dt>");
                self.visit_tree(out, token, scratch);
                scratch.write(out, "</dt>");
            }
            TokenKind::BLOCK_DEFINITION => {
                scratch.pad(out, 1);
                scratch.write(out, "<dd>");
                self.visit_tree(out, token, scratch);
                scratch.write(out, "</dd>");
            }
            TokenKind::BLOCK_TABLE => self.table(out, token, scratch),
            TokenKind::BLOCK_TABLE_HEADER => {
                scratch.in_table_header = true;
                scratch.pad(out, 1);
                scratch.write(out, "<thead>");
                self.visit_tree(out, token, scratch);
                scratch.pad(out, 1);
                scratch.write(out, "</thead>");
                scratch.in_table_header = false;
            }
            TokenKind::BLOCK_TABLE_SECTION => {
                scratch.pad(out, 1);
                scratch.write(out, "<tbody>");
                self.visit_tree(out, token, scratch);
                scratch.pad(out, 1);
                scratch.write(out, "</tbody>");
            }
            TokenKind::TABLE_ROW => {
                scratch.table_cell_index = 0;
                scratch.pad(out, 1);
                scratch.write(out, "<tr>");
                self.visit_tree(out, token, scratch);
                scratch.pad(out, 1);
                scratch.write(out, "</tr>");
            }
            TokenKind::TABLE_CELL => self.table_cell(out, token, scratch),
            TokenKind::BLOCK_TOC => self.toc(out, scratch),
            //#endregion

            //#region Pairs
            TokenKind::PAIR_EMPH => self.simple_pair(out, token, "em", scratch),
            TokenKind::PAIR_STRONG => self.simple_pair(out, token, "strong", scratch),
            TokenKind::PAIR_SUBSCRIPT => self.simple_pair(out, token, "sub", scratch),
            TokenKind::PAIR_SUPERSCRIPT => self.simple_pair(out, token, "sup", scratch),
            TokenKind::PAIR_BACKTICK => self.code_span(out, token, scratch),
            TokenKind::PAIR_MATH => self.math_span(out, token, scratch),
            TokenKind::PAIR_ANGLE => self.angle_pair(out, token, scratch),
            TokenKind::PAIR_QUOTE_SINGLE => self.quote_pair(out, token, false, scratch),
            TokenKind::PAIR_QUOTE_DOUBLE => self.quote_pair(out, token, true, scratch),
            TokenKind::PAIR_HTML_COMMENT => {
                let text = self.source_slice(token, scratch).to_string();
                scratch.write(out, &text);
            }
            TokenKind::PAIR_BRACKET | TokenKind::PAIR_BRACKET_IMAGE => {
                self.bracket(out, token, kind == TokenKind::PAIR_BRACKET_IMAGE, scratch)
            }
            TokenKind::PAIR_BRACKET_FOOTNOTE => self.footnote_ref(out, token, scratch),
            TokenKind::PAIR_BRACKET_CITATION => self.citation_ref(out, token, scratch),
            TokenKind::PAIR_BRACKET_GLOSSARY => self.glossary_ref(out, token, scratch),
            TokenKind::PAIR_BRACKET_ABBREVIATION => self.abbreviation_ref(out, token, scratch),
            TokenKind::PAIR_BRACKET_VARIABLE => self.variable_ref(out, token, scratch),
            TokenKind::PAIR_CRITIC_ADD | TokenKind::PAIR_CRITIC_SUB_ADD => {
                self.critic_addition(out, token, scratch)
            }
            TokenKind::PAIR_CRITIC_DEL | TokenKind::PAIR_CRITIC_SUB_DEL => {
                self.critic_deletion(out, token, scratch)
            }
            TokenKind::PAIR_CRITIC_COM => self.critic_comment(out, token, scratch),
            TokenKind::PAIR_CRITIC_HI => self.critic_highlight(out, token, scratch),
            TokenKind::PAIR_PAREN
            | TokenKind::PAIR_BRACE
            | TokenKind::PAIR_RAW_FILTER
            | TokenKind::PAIR_QUOTE_ALT
            | TokenKind::PAIR_STAR
            | TokenKind::PAIR_UL => {
                // Either absorbed by a preceding handler (a link's resource
                // paren, a raw filter's specifier) or unclaimed, in which
                // case the delimiters render as literal text.
                if !matches!(
                    scratch.engine.resolutions().get(token),
                    Some(BracketTarget::Consumed)
                ) {
                    self.visit_tree(out, token, scratch)
                }
            }
            //#endregion

            //#region Inline primitives
            TokenKind::TEXT_NL => scratch.write(out, "\n"),
            TokenKind::TEXT_LINEBREAK => scratch.write(out, "<br />\n"),
            TokenKind::TEXT_EMPTY
            | TokenKind::EMPH_START
            | TokenKind::EMPH_STOP
            | TokenKind::STRONG_START
            | TokenKind::STRONG_STOP
            | TokenKind::MARKER_ATX
            | TokenKind::MARKER_BLOCKQUOTE
            | TokenKind::MARKER_DEFLIST_COLON
            | TokenKind::MARKER_LIST_BULLET
            | TokenKind::MARKER_LIST_ENUMERATOR
            | TokenKind::MANUAL_LABEL
            | TokenKind::TABLE_DIVIDER
            | TokenKind::LINE_TABLE_SEPARATOR => {}
            TokenKind::ESCAPED_CHARACTER => {
                let text = self.source_slice(token, scratch);
                let escaped = escape_html(&text[1..]).into_owned();
                scratch.write(out, &escaped);
            }
            TokenKind::HTML_ENTITY => {
                let text = self.source_slice(token, scratch).to_string();
                scratch.write(out, &text);
            }
            TokenKind::AMPERSAND => scratch.write(out, "&amp;"),
            TokenKind::ANGLE_LEFT => scratch.write(out, "&lt;"),
            TokenKind::ANGLE_RIGHT => scratch.write(out, "&gt;"),
            TokenKind::QUOTE_DOUBLE => scratch.write(out, "&quot;"),
            TokenKind::QUOTE_SINGLE => scratch.write(out, "'"),
            TokenKind::APOSTROPHE => {
                if scratch.engine.extensions().smart() {
                    scratch.write(out, "&#8217;");
                } else {
                    scratch.write(out, "'");
                }
            }
            TokenKind::DASH_N => self.smart_or(out, "&#8211;", "--", scratch),
            TokenKind::DASH_M => self.smart_or(out, "&#8212;", "---", scratch),
            TokenKind::ELLIPSIS => self.smart_or(out, "&#8230;", "...", scratch),
            //#endregion

            kind if kind.is_line() => {
                let text = escape_html(self.source_slice(token, scratch)).into_owned();
                scratch.write(out, &text);
            }
            kind if !kind.is_block() && !kind.is_pair() => {
                // Every remaining span kind is literal text.
                let text = escape_html(self.source_slice(token, scratch)).into_owned();
                scratch.write(out, &text);
            }
            kind => {
                log::warn!("unknown token kind {:?} reached the HTML renderer", kind);
                scratch.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::UnknownToken,
                    tree.get(token).start,
                ));
            }
        }
    }

    fn emit_note_lists(&mut self, out: &mut String, scratch: &mut ScratchPad) {
        self.note_list(
            out,
            scratch,
            NoteStack::Footnote,
            "footnotes",
            "fn",
            "fnref",
            "reversefootnote",
        );
        self.note_list(
            out,
            scratch,
            NoteStack::Glossary,
            "glossary",
            "gn",
            "gnref",
            "reverseglossary",
        );
        self.note_list(
            out,
            scratch,
            NoteStack::Citation,
            "citations",
            "cn",
            "cnref",
            "reversecitation",
        );
    }
}

impl HtmlEmitter {
    fn source_slice<'s>(&self, token: TokenId, scratch: &'s ScratchPad) -> &'s str {
        let span = scratch.engine.tree().get(token).span();
        scratch.engine.source().slice(span)
    }

    fn interior_text<'s>(&self, pair: TokenId, scratch: &'s ScratchPad) -> &'s str {
        let tree = scratch.engine.tree();
        let Some(first) = tree.get(pair).child() else {
            return "";
        };
        let last = tree.get(pair).tail().unwrap_or(first);
        let start = tree.get(first).end();
        let end = tree.get(last).start;
        if start >= end {
            return "";
        }
        scratch.engine.source().slice(start..end)
    }

    /// Plain text of a subtree, for `alt` attributes and locators.
    fn plain_text(&self, pair: TokenId, scratch: &ScratchPad, out: &mut String) {
        let tree = scratch.engine.tree();
        let last = tree.get(pair).tail();
        let mut cursor = tree
            .get(pair)
            .child()
            .and_then(|first| tree.get(first).next());
        while let Some(id) = cursor {
            if Some(id) == last {
                break;
            }
            let kind = tree.kind(id);
            if kind.is_pair() {
                self.plain_text(id, scratch, out);
            } else if kind == TokenKind::TEXT_NL || kind == TokenKind::TEXT_LINEBREAK {
                out.push(' ');
            } else if !matches!(
                kind,
                TokenKind::EMPH_START
                    | TokenKind::EMPH_STOP
                    | TokenKind::STRONG_START
                    | TokenKind::STRONG_STOP
            ) {
                out.push_str(self.source_slice(id, scratch));
            }
            cursor = tree.get(id).next();
        }
    }

    fn smart_or(
        &mut self,
        out: &mut String,
        smart: &str,
        plain: &str,
        scratch: &mut ScratchPad,
    ) {
        if scratch.engine.extensions().smart() {
            scratch.write(out, smart);
        } else {
            scratch.write(out, plain);
        }
    }

    fn simple_pair(&mut self, out: &mut String, pair: TokenId, tag: &str, scratch: &mut ScratchPad) {
        scratch.write(out, &format!("<{}>", tag));
        self.visit_pair_interior(out, pair, scratch);
        scratch.write(out, &format!("</{}>", tag));
    }

    //#region Block handlers

    /// A paragraph of a lone image renders as a figure; inside a tight list
    /// item the `<p>` wrapper is dropped.
    fn paragraph(&mut self, out: &mut String, block: TokenId, scratch: &mut ScratchPad) {
        if scratch.tight_list() {
            self.visit_tree(out, block, scratch);
            return;
        }
        scratch.pad(out, 2);
        if let Some(image) = self.lone_image(block, scratch) {
            self.figure(out, image, scratch);
            return;
        }
        scratch.write(out, "<p>");
        self.visit_tree(out, block, scratch);
        scratch.write(out, "</p>");
    }

    fn lone_image(&self, block: TokenId, scratch: &ScratchPad) -> Option<TokenId> {
        let tree = scratch.engine.tree();
        let mut image = None;
        for child in tree.children(block) {
            let consumed = matches!(
                scratch.engine.resolutions().get(child),
                Some(BracketTarget::Consumed)
            );
            match tree.kind(child) {
                _ if consumed => {}
                TokenKind::PAIR_BRACKET_IMAGE if image.is_none() => image = Some(child),
                TokenKind::TEXT_PLAIN
                    if self
                        .source_slice(child, scratch)
                        .trim()
                        .is_empty() => {}
                _ => return None,
            }
        }
        let image = image?;
        match scratch.engine.resolutions().get(image)? {
            BracketTarget::InlineLink(_) | BracketTarget::LinkRef(_) => Some(image),
            _ => None,
        }
    }

    fn heading(
        &mut self,
        out: &mut String,
        block: TokenId,
        kind: TokenKind,
        scratch: &mut ScratchPad,
    ) {
        scratch.pad(out, 2);
        let level = effective_heading_level(scratch, kind);
        match scratch.engine.header_label(block) {
            Some(label) => {
                scratch.write(out, &format!("<h{} id=\"{}\">", level, escape_html(label)))
            }
            None => scratch.write(out, &format!("<h{}>", level)),
        }
        self.visit_tree(out, block, scratch);
        scratch.write(out, &format!("</h{}>", level));
    }

    fn list(
        &mut self,
        out: &mut String,
        block: TokenId,
        tag: &str,
        tight: bool,
        scratch: &mut ScratchPad,
    ) {
        scratch.pad(out, 2);
        scratch.write(out, &format!("<{}>", tag));
        scratch.list_tightness.push(tight);
        self.visit_tree(out, block, scratch);
        scratch.list_tightness.pop();
        scratch.pad(out, 1);
        scratch.write(out, &format!("</{}>", tag));
    }

    fn indented_code(&mut self, out: &mut String, block: TokenId, scratch: &mut ScratchPad) {
        scratch.pad(out, 2);
        scratch.write(out, "<pre><code>");
        let tree = scratch.engine.tree();
        let mut body = String::new();
        for line in tree.children(block) {
            let text = self.source_slice(line, scratch);
            let stripped = if let Some(rest) = text.strip_prefix('\t') {
                rest
            } else {
                let spaces = text.len() - text.trim_start_matches(' ').len();
                &text[spaces.min(4)..]
            };
            body.push_str(&escape_html(stripped));
            body.push('\n');
        }
        scratch.write(out, &body);
        scratch.write(out, "</code></pre>");
    }

    /// The info string of a fenced block, without the fence characters.
    fn fence_info<'s>(&self, block: TokenId, scratch: &'s ScratchPad) -> &'s str {
        let tree = scratch.engine.tree();
        let Some(first) = tree.get(block).child() else {
            return "";
        };
        let text = self.source_slice(first, scratch);
        text.trim_start()
            .trim_start_matches('`')
            .trim()
    }

    fn fenced_code(&mut self, out: &mut String, block: TokenId, scratch: &mut ScratchPad) {
        let info = self.fence_info(block, scratch).to_string();

        // `{=format}` gates the block to one target format, emitted verbatim.
        if let Some(filter) = info.strip_prefix("{=").and_then(|f| f.strip_suffix('}')) {
            if scratch.format.matches_filter(filter) {
                scratch.pad(out, 2);
                let mut body = String::new();
                self.collect_fence_body(block, scratch, |text| {
                    body.push_str(text);
                    body.push('\n');
                });
                scratch.write(out, &body);
            }
            return;
        }

        scratch.pad(out, 2);
        if info.is_empty() {
            scratch.write(out, "<pre><code>");
        } else {
            let class = info.split_whitespace().next().unwrap_or("");
            scratch.write(
                out,
                &format!("<pre><code class=\"language-{}\">", escape_html(class)),
            );
        }
        let mut body = String::new();
        self.collect_fence_body(block, scratch, |text| {
            body.push_str(&escape_html(text));
            body.push('\n');
        });
        scratch.write(out, &body);
        scratch.write(out, "</code></pre>");
    }

    fn collect_fence_body<F: FnMut(&str)>(
        &self,
        block: TokenId,
        scratch: &ScratchPad,
        mut each_line: F,
    ) {
        let tree = scratch.engine.tree();
        for line in tree.children(block) {
            if matches!(
                tree.kind(line),
                TokenKind::LINE_FENCE_BACKTICK_3
                    | TokenKind::LINE_FENCE_BACKTICK_4
                    | TokenKind::LINE_FENCE_BACKTICK_5
                    | TokenKind::LINE_FENCE_BACKTICK_START_3
                    | TokenKind::LINE_FENCE_BACKTICK_START_4
                    | TokenKind::LINE_FENCE_BACKTICK_START_5
            ) {
                continue;
            }
            each_line(self.source_slice(line, scratch));
        }
    }

    fn raw_block(&mut self, out: &mut String, block: TokenId, scratch: &mut ScratchPad) {
        scratch.pad(out, 2);
        let tree = scratch.engine.tree();
        let mut body = String::new();
        for line in tree.children(block) {
            if !body.is_empty() {
                body.push('\n');
            }
            body.push_str(self.source_slice(line, scratch));
        }
        scratch.write(out, &body);
    }

    //#endregion

    //#region Tables

    fn table(&mut self, out: &mut String, table: TokenId, scratch: &mut ScratchPad) {
        scratch.pad(out, 2);
        scratch.table_alignments = scratch
            .engine
            .table_shape(table)
            .map(|shape| shape.alignments.clone())
            .unwrap_or_default();

        scratch.write(out, "<table>\n");

        // A following paragraph holding a single bracket span is this
        // table's caption; absorb it by skipping that sibling afterwards.
        let mut absorb = 0;
        if let Some((caption, skip)) = self.table_caption(table, scratch) {
            let label = {
                let mut text = String::new();
                self.plain_text(caption, scratch, &mut text);
                text
            };
            let index = scratch
                .engine
                .defs()
                .tables
                .iter()
                .position(|&id| id == table)
                .unwrap_or(0);
            let id = if label.trim().is_empty() {
                format!("table-{}", index + 1)
            } else {
                crate::extract::id_label(&label)
            };
            scratch.write(out, &format!("<caption id=\"{}\">", id));
            self.visit_pair_interior(out, caption, scratch);
            scratch.write(out, "</caption>\n");
            absorb = skip;
        }

        let mut cols = String::new();
        let mut colgroup_written = false;
        for align in scratch.table_alignments.clone() {
            if !colgroup_written {
                cols.push_str("<colgroup>\n");
                colgroup_written = true;
            }
            match align.css() {
                Some(css) => {
                    let _ = writeln!(cols, "<col style=\"text-align:{};\"/>", css);
                }
                None => cols.push_str("<col />\n"),
            }
        }
        if colgroup_written {
            cols.push_str("</colgroup>\n");
        }
        scratch.write(out, &cols);

        self.visit_tree(out, table, scratch);
        scratch.pad(out, 1);
        scratch.write(out, "</table>");
        scratch.skip = absorb;
    }

    /// Returns the caption bracket pair and how many following siblings of
    /// the table the renderer must skip.
    fn table_caption(&self, table: TokenId, scratch: &ScratchPad) -> Option<(TokenId, usize)> {
        let tree = scratch.engine.tree();
        let next = tree.get(table).next()?;
        if tree.kind(next) != TokenKind::BLOCK_PARA {
            return None;
        }
        let children = tree.child_ids(next);
        if children.len() != 1 || tree.kind(children[0]) != TokenKind::PAIR_BRACKET {
            return None;
        }
        Some((children[0], 1))
    }

    fn table_cell(&mut self, out: &mut String, cell: TokenId, scratch: &mut ScratchPad) {
        let tag = if scratch.in_table_header { "th" } else { "td" };
        let align = scratch
            .table_alignments
            .get(scratch.table_cell_index)
            .copied()
            .unwrap_or(Align::None);
        scratch.pad(out, 1);
        match align.css() {
            Some(css) => {
                scratch.write(out, &format!("\t<{} style=\"text-align:{};\">", tag, css))
            }
            None => scratch.write(out, &format!("\t<{}>", tag)),
        }
        self.visit_tree(out, cell, scratch);
        scratch.write(out, &format!("</{}>", tag));
        scratch.table_cell_index += 1;
    }

    //#endregion

    //#region Links, images, notes

    fn bracket(&mut self, out: &mut String, pair: TokenId, is_image: bool, scratch: &mut ScratchPad) {
        let target = scratch.engine.resolutions().get(pair).cloned();
        match target {
            Some(BracketTarget::Consumed) => {}
            Some(BracketTarget::InlineLink(link)) => {
                self.link_or_image(out, pair, &link, is_image, scratch)
            }
            Some(BracketTarget::LinkRef(index)) => {
                let link = scratch.engine.defs().links[index].clone();
                self.link_or_image(out, pair, &link, is_image, scratch)
            }
            _ => {
                // Unresolved: the delimiters render themselves literally.
                self.visit_tree(out, pair, scratch);
            }
        }
    }

    fn link_or_image(
        &mut self,
        out: &mut String,
        pair: TokenId,
        link: &crate::extract::Link,
        is_image: bool,
        scratch: &mut ScratchPad,
    ) {
        let mut attributes = String::new();
        for (key, value) in &link.attributes {
            let _ = write!(attributes, " {}=\"{}\"", key, escape_html(value));
        }

        if is_image {
            let mut alt = String::new();
            self.plain_text(pair, scratch, &mut alt);
            let mut tag = format!(
                "<img src=\"{}\" alt=\"{}\"",
                escape_href(&link.url),
                escape_html(&alt)
            );
            if let Some(title) = &link.title {
                let _ = write!(tag, " title=\"{}\"", escape_html(title));
            }
            tag.push_str(&attributes);
            tag.push_str(" />");
            scratch.write(out, &tag);
        } else {
            let email = link.url.starts_with("mailto:");
            let href = if email && scratch.engine.extensions().contains(Extensions::OBFUSCATE) {
                self.obfuscate(&link.url, scratch)
            } else {
                escape_href(&link.url).into_owned()
            };
            let mut tag = format!("<a href=\"{}\"", href);
            if let Some(title) = &link.title {
                let _ = write!(tag, " title=\"{}\"", escape_html(title));
            }
            tag.push_str(&attributes);
            tag.push('>');
            scratch.write(out, &tag);
            self.visit_pair_interior(out, pair, scratch);
            scratch.write(out, "</a>");
        }
    }

    fn figure(&mut self, out: &mut String, image: TokenId, scratch: &mut ScratchPad) {
        scratch.write(out, "<figure>\n");
        self.visit(out, image, scratch);
        let mut caption = String::new();
        self.plain_text(image, scratch, &mut caption);
        scratch.write(
            out,
            &format!("\n<figcaption>{}</figcaption>\n", escape_html(&caption)),
        );
        scratch.write(out, "</figure>");
    }

    /// Footnote anchors are numbered in first-use order; `RANDOM_FOOT`
    /// replaces the anchor number with a seeded pseudo-random id.
    fn note_anchor(&self, scratch: &ScratchPad, number: usize) -> usize {
        if scratch
            .engine
            .extensions()
            .contains(Extensions::RANDOM_FOOT)
        {
            let seed = scratch.engine.random_seed();
            (seed
                .wrapping_add(number as u32)
                .wrapping_mul(2654435761)
                % 100000) as usize
        } else {
            number
        }
    }

    fn footnote_ref(&mut self, out: &mut String, pair: TokenId, scratch: &mut ScratchPad) {
        let Some(BracketTarget::Footnote(index)) = scratch.engine.resolutions().get(pair).cloned()
        else {
            self.visit_tree(out, pair, scratch);
            return;
        };
        let (number, first_use) = scratch.use_note(NoteStack::Footnote, index);
        let anchor = self.note_anchor(scratch, number);
        let title = localize("see footnote", scratch.engine.language());
        let text = if first_use {
            format!(
                "<a href=\"#fn:{}\" id=\"fnref:{}\" title=\"{}\" class=\"footnote\"><sup>{}</sup></a>",
                anchor, anchor, title, number
            )
        } else {
            format!(
                "<a href=\"#fn:{}\" title=\"{}\" class=\"footnote\"><sup>{}</sup></a>",
                anchor, title, number
            )
        };
        scratch.write(out, &text);
    }

    fn citation_ref(&mut self, out: &mut String, pair: TokenId, scratch: &mut ScratchPad) {
        let Some(BracketTarget::Citation { index, locator }) =
            scratch.engine.resolutions().get(pair).cloned()
        else {
            self.visit_tree(out, pair, scratch);
            return;
        };
        if scratch.engine.bibtex() {
            // BibTeX documents leave citation formatting to the typesetter.
            let label = self.interior_text(pair, scratch).to_string();
            scratch.write(out, &format!("~\\cite{{{}}}", label));
            return;
        }
        let (number, first_use) = scratch.use_note(NoteStack::Citation, index);
        let title = localize("see citation", scratch.engine.language());
        let locator_text = locator.map(|id| {
            let mut text = String::new();
            self.plain_text(id, scratch, &mut text);
            text
        });
        let display = match &locator_text {
            Some(locator) => format!("({}, {})", escape_html(locator), number),
            None => format!("({})", number),
        };
        let text = if first_use {
            format!(
                "<a href=\"#cn:{}\" id=\"cnref:{}\" title=\"{}\" class=\"citation\">{}</a>",
                number, number, title, display
            )
        } else {
            format!(
                "<a href=\"#cn:{}\" title=\"{}\" class=\"citation\">{}</a>",
                number, title, display
            )
        };
        scratch.write(out, &text);
    }

    fn glossary_ref(&mut self, out: &mut String, pair: TokenId, scratch: &mut ScratchPad) {
        let Some(BracketTarget::Glossary(index)) = scratch.engine.resolutions().get(pair).cloned()
        else {
            self.visit_tree(out, pair, scratch);
            return;
        };
        let (number, first_use) = scratch.use_note(NoteStack::Glossary, index);
        let title = localize("see glossary", scratch.engine.language());
        let open = if first_use {
            format!(
                "<a href=\"#gn:{}\" id=\"gnref:{}\" title=\"{}\" class=\"glossary\">",
                number, number, title
            )
        } else {
            format!(
                "<a href=\"#gn:{}\" title=\"{}\" class=\"glossary\">",
                number, title
            )
        };
        scratch.write(out, &open);
        let term = self
            .interior_text(pair, scratch)
            .trim_start_matches('?')
            .to_string();
        scratch.write(out, &escape_html(&term).into_owned());
        scratch.write(out, "</a>");
    }

    fn abbreviation_ref(&mut self, out: &mut String, pair: TokenId, scratch: &mut ScratchPad) {
        let Some(BracketTarget::Abbreviation(index)) =
            scratch.engine.resolutions().get(pair).cloned()
        else {
            self.visit_tree(out, pair, scratch);
            return;
        };
        let entry = &scratch.engine.defs().abbreviations[index];
        let expansion = entry.expansion.clone().unwrap_or_default();
        let short = self.interior_text(pair, scratch).to_string();
        scratch.write(
            out,
            &format!(
                "<abbr title=\"{}\">{}</abbr>",
                escape_html(&expansion),
                escape_html(&short)
            ),
        );
    }

    fn variable_ref(&mut self, out: &mut String, pair: TokenId, scratch: &mut ScratchPad) {
        match scratch.engine.resolutions().get(pair).cloned() {
            Some(BracketTarget::Variable(value)) => {
                scratch.write(out, &escape_html(&value).into_owned())
            }
            _ => self.visit_tree(out, pair, scratch),
        }
    }

    //#endregion

    //#region Code spans, math, autolinks, quotes

    fn code_span(&mut self, out: &mut String, pair: TokenId, scratch: &mut ScratchPad) {
        if let Some(BracketTarget::RawFilter(format)) =
            scratch.engine.resolutions().get(pair).cloned()
        {
            if scratch.format.matches_filter(&format) {
                let text = self.interior_text(pair, scratch).to_string();
                scratch.write(out, &text);
            }
            return;
        }
        let text = escape_html(self.interior_text(pair, scratch)).into_owned();
        scratch.write(out, "<code>");
        scratch.write(out, &text);
        scratch.write(out, "</code>");
    }

    fn math_span(&mut self, out: &mut String, pair: TokenId, scratch: &mut ScratchPad) {
        let tree = scratch.engine.tree();
        let opener = tree.get(pair).child().map(|id| tree.kind(id));
        let (open, close) = match opener {
            Some(TokenKind::MATH_BRACKET_OPEN) | Some(TokenKind::MATH_DOLLAR_DOUBLE) => {
                ("\\[", "\\]")
            }
            _ => ("\\(", "\\)"),
        };
        let body = escape_html(self.interior_text(pair, scratch)).into_owned();
        scratch.write(
            out,
            &format!("<span class=\"math\">{}{}{}</span>", open, body, close),
        );
    }

    fn angle_pair(&mut self, out: &mut String, pair: TokenId, scratch: &mut ScratchPad) {
        let interior = self.interior_text(pair, scratch).to_string();
        if looks_like_uri(&interior) {
            let href = escape_href(&interior).into_owned();
            scratch.write(
                out,
                &format!("<a href=\"{}\">{}</a>", href, escape_html(&interior)),
            );
        } else if looks_like_email(&interior) {
            let obfuscate = scratch.engine.extensions().contains(Extensions::OBFUSCATE);
            let (href, text) = if obfuscate {
                (
                    self.obfuscate(&format!("mailto:{}", interior), scratch),
                    self.obfuscate(&interior, scratch),
                )
            } else {
                (
                    format!("mailto:{}", escape_href(&interior)),
                    escape_html(&interior).into_owned(),
                )
            };
            scratch.write(out, &format!("<a href=\"{}\">{}</a>", href, text));
        } else if interior
            .bytes()
            .next()
            .is_some_and(|b| b.is_ascii_alphabetic() || b == b'/')
        {
            // Inline HTML passes through untouched.
            let text = self.source_slice(pair, scratch).to_string();
            scratch.write(out, &text);
        } else {
            self.visit_tree(out, pair, scratch);
        }
    }

    /// Each character becomes a decimal or hex entity, alternating on a
    /// seeded pseudo-random stream.
    fn obfuscate(&self, text: &str, scratch: &ScratchPad) -> String {
        let mut random = crate::rand::Lcg::new(scratch.engine.random_seed());
        let mut out = String::with_capacity(text.len() * 6);
        for c in text.chars() {
            let code = c as u32;
            if random.next_below(2) == 0 {
                let _ = write!(out, "&#{};", code);
            } else {
                let _ = write!(out, "&#x{:X};", code);
            }
        }
        out
    }

    fn quote_pair(&mut self, out: &mut String, pair: TokenId, double: bool, scratch: &mut ScratchPad) {
        let style = scratch.engine.quote_style();
        let (open, close) = if double {
            (style.left_double(), style.right_double())
        } else {
            (style.left_single(), style.right_single())
        };
        scratch.write(out, open);
        self.visit_pair_interior(out, pair, scratch);
        scratch.write(out, close);
    }

    //#endregion

    //#region CriticMarkup

    fn critic_addition(&mut self, out: &mut String, pair: TokenId, scratch: &mut ScratchPad) {
        let extensions = scratch.engine.extensions();
        if extensions.contains(Extensions::CRITIC_REJECT) {
            return;
        }
        if extensions.contains(Extensions::CRITIC_ACCEPT) {
            self.visit_pair_interior(out, pair, scratch);
            return;
        }
        scratch.write(out, "<ins>");
        self.visit_pair_interior(out, pair, scratch);
        scratch.write(out, "</ins>");
    }

    fn critic_deletion(&mut self, out: &mut String, pair: TokenId, scratch: &mut ScratchPad) {
        let extensions = scratch.engine.extensions();
        if extensions.contains(Extensions::CRITIC_ACCEPT) {
            return;
        }
        if extensions.contains(Extensions::CRITIC_REJECT) {
            self.visit_pair_interior(out, pair, scratch);
            return;
        }
        scratch.write(out, "<del>");
        self.visit_pair_interior(out, pair, scratch);
        scratch.write(out, "</del>");
    }

    fn critic_comment(&mut self, out: &mut String, pair: TokenId, scratch: &mut ScratchPad) {
        let extensions = scratch.engine.extensions();
        if extensions.contains(Extensions::CRITIC_ACCEPT)
            || extensions.contains(Extensions::CRITIC_REJECT)
        {
            return;
        }
        scratch.write(out, "<span class=\"critic comment\">");
        self.visit_pair_interior(out, pair, scratch);
        scratch.write(out, "</span>");
    }

    fn critic_highlight(&mut self, out: &mut String, pair: TokenId, scratch: &mut ScratchPad) {
        let extensions = scratch.engine.extensions();
        if extensions.contains(Extensions::CRITIC_ACCEPT)
            || extensions.contains(Extensions::CRITIC_REJECT)
        {
            self.visit_pair_interior(out, pair, scratch);
            return;
        }
        scratch.write(out, "<mark>");
        self.visit_pair_interior(out, pair, scratch);
        scratch.write(out, "</mark>");
    }

    //#endregion

    //#region TOC and note lists

    fn toc(&mut self, out: &mut String, scratch: &mut ScratchPad) {
        scratch.pad(out, 2);
        let headers = &scratch.engine.defs().headers;
        if headers.is_empty() {
            scratch.write(out, "<div class=\"TOC\"></div>");
            return;
        }

        let mut body = String::from("<div class=\"TOC\">\n");
        let base = headers.iter().map(|h| h.level).min().unwrap_or(1);
        let mut current = base.saturating_sub(1);
        for header in headers {
            let level = header.level;
            while current < level {
                body.push_str("<ul>\n");
                current += 1;
            }
            while current > level {
                body.push_str("</ul>\n");
                current -= 1;
            }
            if header.label.is_empty() {
                let _ = writeln!(body, "<li>{}</li>", escape_html(&header.text));
            } else {
                let _ = writeln!(
                    body,
                    "<li><a href=\"#{}\">{}</a></li>",
                    header.label,
                    escape_html(&header.text)
                );
            }
        }
        while current >= base {
            body.push_str("</ul>\n");
            current -= 1;
        }
        body.push_str("</div>");
        scratch.write(out, &body);
    }

    fn note_list(
        &mut self,
        out: &mut String,
        scratch: &mut ScratchPad,
        stack: NoteStack,
        div_class: &str,
        id_prefix: &str,
        ref_prefix: &str,
        reverse_class: &str,
    ) {
        let used: Vec<usize> = match stack {
            NoteStack::Footnote => scratch.used_footnotes.clone(),
            NoteStack::Citation => scratch.used_citations.clone(),
            NoteStack::Glossary => scratch.used_glossary.clone(),
        };
        if used.is_empty() {
            return;
        }

        scratch.pad(out, 2);
        scratch.write(out, &format!("<div class=\"{}\">\n<hr />\n<ol>", div_class));

        for (position, def_index) in used.iter().enumerate() {
            let number = position + 1;
            let anchor = if stack == NoteStack::Footnote {
                self.note_anchor(scratch, number)
            } else {
                number
            };
            scratch.write(out, &format!("\n<li id=\"{}:{}\">\n", id_prefix, anchor));

            let note: NoteDef = match stack {
                NoteStack::Footnote => scratch.engine.defs().footnotes[*def_index].clone(),
                NoteStack::Citation => scratch.engine.defs().citations[*def_index].clone(),
                NoteStack::Glossary => scratch.engine.defs().glossary[*def_index].clone(),
            };

            let mut body = String::new();
            let saved_padded = scratch.padded;
            scratch.padded = 2;
            match note.content {
                Some(content) if note.inline => {
                    // Inline definitions reuse the bracket's own subtree.
                    body.push_str("<p>");
                    let mut inner = String::new();
                    self.visit_pair_interior(&mut inner, content, scratch);
                    body.push_str(&inner);
                    body.push_str("</p>");
                }
                Some(content) => {
                    let mut inner = String::new();
                    self.visit_tree(&mut inner, content, scratch);
                    body.push_str(inner.trim_start_matches('\n'));
                }
                None => {}
            }
            scratch.padded = saved_padded;

            // The back reference decorates the last paragraph of the note.
            let back = format!(
                " <a href=\"#{}:{}\" title=\"{}\" class=\"{}\">&#160;&#8617;</a>",
                ref_prefix,
                anchor,
                localize("return to body", scratch.engine.language()),
                reverse_class
            );
            if let Some(position) = body.rfind("</p>") {
                body.insert_str(position, &back);
            } else {
                body.push_str(&back);
            }

            scratch.write(out, &body);
            scratch.write(out, "\n</li>");
        }

        scratch.write(out, "\n</ol>\n</div>");
    }

    //#endregion
}
