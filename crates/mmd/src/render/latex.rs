//! The LaTeX emitter. Shares the walk and scratch pad with the HTML emitter;
//! the `latex`, `beamer`, and `memoir` targets differ only in preamble and
//! header-level mapping.

use std::fmt::Write as _;

use mmd_syntax::{TokenId, TokenKind};

use crate::engine::OutputFormat;
use crate::extensions::Extensions;
use crate::inline::resolve::BracketTarget;
use crate::render::util::{escape_latex, looks_like_email, looks_like_uri};
use crate::render::{effective_heading_level, Emitter, NoteStack, ScratchPad};

pub struct LatexEmitter;

fn heading_command(format: OutputFormat, level: u8) -> &'static str {
    let plain = [
        "section",
        "subsection",
        "subsubsection",
        "paragraph",
        "subparagraph",
        "subparagraph",
    ];
    let memoir = [
        "chapter",
        "section",
        "subsection",
        "subsubsection",
        "paragraph",
        "subparagraph",
    ];
    let table = if format == OutputFormat::Memoir {
        memoir
    } else {
        plain
    };
    table[usize::from(level.clamp(1, 6)) - 1]
}

impl Emitter for LatexEmitter {
    fn start_complete(&mut self, out: &mut String, scratch: &mut ScratchPad) {
        let engine = scratch.engine;
        let class = match scratch.format {
            OutputFormat::Beamer => "beamer",
            OutputFormat::Memoir => "memoir",
            _ => "article",
        };
        let mut head = String::new();
        let _ = writeln!(head, "\\documentclass{{{}}}", class);
        head.push_str("\\usepackage[utf8]{inputenc}\n\\usepackage{hyperref}\n\\usepackage{ulem}\n");
        if let Some(title) = engine.metadata_value("title") {
            let _ = writeln!(head, "\\title{{{}}}", escape_latex(title));
        }
        if let Some(author) = engine.metadata_value("author") {
            let _ = writeln!(head, "\\author{{{}}}", escape_latex(author));
        }
        if let Some(date) = engine.metadata_value("date") {
            let _ = writeln!(head, "\\date{{{}}}", escape_latex(date));
        }
        head.push_str("\\begin{document}\n");
        if engine.metadata_value("title").is_some() {
            head.push_str("\\maketitle\n");
        }
        scratch.write(out, &head);
    }

    fn end_complete(&mut self, out: &mut String, scratch: &mut ScratchPad) {
        scratch.pad(out, 2);
        scratch.write(out, "\\end{document}\n");
    }

    fn visit(&mut self, out: &mut String, token: TokenId, scratch: &mut ScratchPad) {
        let tree = scratch.engine.tree();
        let kind = tree.kind(token);
        match kind {
            TokenKind::DOCUMENT => self.visit_tree(out, token, scratch),

            TokenKind::BLOCK_EMPTY | TokenKind::BLOCK_META => {}
            kind if kind.is_definition_block() => {}
            TokenKind::BLOCK_PARA => {
                scratch.pad(out, 2);
                self.visit_tree(out, token, scratch);
            }
            TokenKind::BLOCK_H1
            | TokenKind::BLOCK_H2
            | TokenKind::BLOCK_H3
            | TokenKind::BLOCK_H4
            | TokenKind::BLOCK_H5
            | TokenKind::BLOCK_H6
            | TokenKind::BLOCK_SETEXT_1
            | TokenKind::BLOCK_SETEXT_2 => {
                scratch.pad(out, 2);
                let level = effective_heading_level(scratch, kind);
                let command = heading_command(scratch.format, level);
                scratch.write(out, &format!("\\{}{{", command));
                self.visit_tree(out, token, scratch);
                scratch.write(out, "}");
                if let Some(label) = scratch.engine.header_label(token) {
                    scratch.write(out, &format!("\n\\label{{{}}}", label));
                }
            }
            TokenKind::BLOCK_HR => {
                scratch.pad(out, 2);
                scratch.write(out, "\\begin{center}\\rule{3in}{0.4pt}\\end{center}");
            }
            TokenKind::BLOCK_CODE_INDENTED | TokenKind::BLOCK_CODE_FENCED => {
                self.code_block(out, token, kind, scratch)
            }
            TokenKind::BLOCK_HTML => {
                // Raw HTML has no LaTeX rendition.
            }
            TokenKind::BLOCK_BLOCKQUOTE => {
                scratch.pad(out, 2);
                scratch.write(out, "\\begin{quote}");
                self.visit_tree(out, token, scratch);
                scratch.pad(out, 1);
                scratch.write(out, "\\end{quote}");
            }
            TokenKind::BLOCK_LIST_BULLETED | TokenKind::BLOCK_LIST_BULLETED_LOOSE => {
                self.environment(out, token, "itemize", scratch)
            }
            TokenKind::BLOCK_LIST_ENUMERATED | TokenKind::BLOCK_LIST_ENUMERATED_LOOSE => {
                self.environment(out, token, "enumerate", scratch)
            }
            TokenKind::BLOCK_LIST_ITEM | TokenKind::BLOCK_LIST_ITEM_TIGHT => {
                scratch.pad(out, 1);
                scratch.write(out, "\\item ");
                // The first block hugs the item marker.
                scratch.padded = 2;
                scratch.list_tightness.push(true);
                self.visit_tree(out, token, scratch);
                scratch.list_tightness.pop();
            }
            TokenKind::BLOCK_DEFLIST => self.environment(out, token, "description", scratch),
            TokenKind::BLOCK_TERM => {
                scratch.pad(out, 1);
                scratch.write(out, "\\item[");
                self.visit_tree(out, token, scratch);
                scratch.write(out, "] ");
            }
            TokenKind::BLOCK_DEFINITION => {
                self.visit_tree(out, token, scratch);
            }
            TokenKind::BLOCK_TABLE => self.table(out, token, scratch),
            TokenKind::BLOCK_TABLE_HEADER => {
                scratch.in_table_header = true;
                self.visit_tree(out, token, scratch);
                scratch.pad(out, 1);
                scratch.write(out, "\\midrule");
                scratch.in_table_header = false;
            }
            TokenKind::BLOCK_TABLE_SECTION => self.visit_tree(out, token, scratch),
            TokenKind::TABLE_ROW => {
                scratch.table_cell_index = 0;
                scratch.pad(out, 1);
                self.visit_tree(out, token, scratch);
                scratch.write(out, " \\\\");
            }
            TokenKind::TABLE_CELL => {
                if scratch.table_cell_index > 0 {
                    scratch.write(out, " & ");
                }
                self.visit_tree(out, token, scratch);
                scratch.table_cell_index += 1;
            }
            TokenKind::BLOCK_TOC => {
                scratch.pad(out, 2);
                scratch.write(out, "\\tableofcontents");
            }

            TokenKind::PAIR_EMPH => self.command_pair(out, token, "emph", scratch),
            TokenKind::PAIR_STRONG => self.command_pair(out, token, "textbf", scratch),
            TokenKind::PAIR_SUBSCRIPT => self.command_pair(out, token, "textsubscript", scratch),
            TokenKind::PAIR_SUPERSCRIPT => {
                self.command_pair(out, token, "textsuperscript", scratch)
            }
            TokenKind::PAIR_BACKTICK => self.code_span(out, token, scratch),
            TokenKind::PAIR_MATH => {
                let text = self.source_slice(token, scratch).to_string();
                scratch.write(out, &text);
            }
            TokenKind::PAIR_ANGLE => self.angle_pair(out, token, scratch),
            TokenKind::PAIR_QUOTE_SINGLE => {
                scratch.write(out, "`");
                self.visit_pair_interior(out, token, scratch);
                scratch.write(out, "'");
            }
            TokenKind::PAIR_QUOTE_DOUBLE => {
                scratch.write(out, "``");
                self.visit_pair_interior(out, token, scratch);
                scratch.write(out, "''");
            }
            TokenKind::PAIR_HTML_COMMENT => {}
            TokenKind::PAIR_BRACKET | TokenKind::PAIR_BRACKET_IMAGE => {
                self.bracket(out, token, kind == TokenKind::PAIR_BRACKET_IMAGE, scratch)
            }
            TokenKind::PAIR_BRACKET_FOOTNOTE => self.footnote(out, token, scratch),
            TokenKind::PAIR_BRACKET_CITATION => self.citation(out, token, scratch),
            TokenKind::PAIR_BRACKET_GLOSSARY => self.footnote(out, token, scratch),
            TokenKind::PAIR_BRACKET_ABBREVIATION | TokenKind::PAIR_BRACKET_VARIABLE => {
                match scratch.engine.resolutions().get(token).cloned() {
                    Some(BracketTarget::Variable(value)) => {
                        scratch.write(out, &escape_latex(&value).into_owned())
                    }
                    Some(BracketTarget::Abbreviation(index)) => {
                        let entry = &scratch.engine.defs().abbreviations[index];
                        let expansion = entry.expansion.clone().unwrap_or_default();
                        scratch.write(out, &escape_latex(&expansion).into_owned());
                    }
                    _ => self.visit_tree(out, token, scratch),
                }
            }
            TokenKind::PAIR_CRITIC_ADD | TokenKind::PAIR_CRITIC_SUB_ADD => {
                let extensions = scratch.engine.extensions();
                if extensions.contains(Extensions::CRITIC_REJECT) {
                    return;
                }
                if extensions.contains(Extensions::CRITIC_ACCEPT) {
                    self.visit_pair_interior(out, token, scratch);
                } else {
                    self.command_pair(out, token, "underline", scratch);
                }
            }
            TokenKind::PAIR_CRITIC_DEL | TokenKind::PAIR_CRITIC_SUB_DEL => {
                let extensions = scratch.engine.extensions();
                if extensions.contains(Extensions::CRITIC_ACCEPT) {
                    return;
                }
                if extensions.contains(Extensions::CRITIC_REJECT) {
                    self.visit_pair_interior(out, token, scratch);
                } else {
                    self.command_pair(out, token, "sout", scratch);
                }
            }
            TokenKind::PAIR_CRITIC_COM => {}
            TokenKind::PAIR_CRITIC_HI => self.command_pair(out, token, "emph", scratch),
            kind if kind.is_pair() => {
                if !matches!(
                    scratch.engine.resolutions().get(token),
                    Some(BracketTarget::Consumed)
                ) {
                    self.visit_tree(out, token, scratch)
                }
            }

            TokenKind::TEXT_NL => scratch.write(out, "\n"),
            TokenKind::TEXT_LINEBREAK => scratch.write(out, "\\\\\n"),
            TokenKind::TEXT_EMPTY
            | TokenKind::EMPH_START
            | TokenKind::EMPH_STOP
            | TokenKind::STRONG_START
            | TokenKind::STRONG_STOP
            | TokenKind::LINE_TABLE_SEPARATOR
            | TokenKind::MANUAL_LABEL => {}
            TokenKind::ESCAPED_CHARACTER => {
                let text = self.source_slice(token, scratch)[1..].to_string();
                scratch.write(out, &escape_latex(&text).into_owned());
            }
            TokenKind::DASH_N => self.smart_or(out, "--", "--", scratch),
            TokenKind::DASH_M => self.smart_or(out, "---", "---", scratch),
            TokenKind::ELLIPSIS => self.smart_or(out, "\\ldots{}", "...", scratch),
            TokenKind::APOSTROPHE => scratch.write(out, "'"),
            _ => {
                let text = self.source_slice(token, scratch).to_string();
                scratch.write(out, &escape_latex(&text).into_owned());
            }
        }
    }

    /// LaTeX emits footnotes and citations in place, so there are no
    /// trailing note lists.
    fn emit_note_lists(&mut self, _out: &mut String, _scratch: &mut ScratchPad) {}
}

impl LatexEmitter {
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

    fn smart_or(&mut self, out: &mut String, smart: &str, plain: &str, scratch: &mut ScratchPad) {
        if scratch.engine.extensions().smart() {
            scratch.write(out, smart);
        } else {
            scratch.write(out, plain);
        }
    }

    fn command_pair(
        &mut self,
        out: &mut String,
        pair: TokenId,
        command: &str,
        scratch: &mut ScratchPad,
    ) {
        scratch.write(out, &format!("\\{}{{", command));
        self.visit_pair_interior(out, pair, scratch);
        scratch.write(out, "}");
    }

    fn environment(&mut self, out: &mut String, block: TokenId, name: &str, scratch: &mut ScratchPad) {
        scratch.pad(out, 2);
        scratch.write(out, &format!("\\begin{{{}}}", name));
        self.visit_tree(out, block, scratch);
        scratch.pad(out, 1);
        scratch.write(out, &format!("\\end{{{}}}", name));
    }

    fn code_block(
        &mut self,
        out: &mut String,
        block: TokenId,
        kind: TokenKind,
        scratch: &mut ScratchPad,
    ) {
        // Raw filter fences only emit for a matching target.
        if kind == TokenKind::BLOCK_CODE_FENCED {
            let tree = scratch.engine.tree();
            let info = tree
                .get(block)
                .child()
                .map(|first| self.source_slice(first, scratch))
                .unwrap_or("")
                .trim_start()
                .trim_start_matches('`')
                .trim()
                .to_string();
            if let Some(filter) = info.strip_prefix("{=").and_then(|f| f.strip_suffix('}')) {
                if scratch.format.matches_filter(filter) {
                    scratch.pad(out, 2);
                    let mut body = String::new();
                    self.verbatim_lines(block, scratch, &mut body, false);
                    scratch.write(out, &body);
                }
                return;
            }
        }

        scratch.pad(out, 2);
        scratch.write(out, "\\begin{verbatim}\n");
        let mut body = String::new();
        self.verbatim_lines(block, scratch, &mut body, kind == TokenKind::BLOCK_CODE_INDENTED);
        scratch.write(out, &body);
        scratch.write(out, "\\end{verbatim}");
    }

    fn verbatim_lines(
        &self,
        block: TokenId,
        scratch: &ScratchPad,
        body: &mut String,
        dedent: bool,
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
            let text = self.source_slice(line, scratch);
            let text = if dedent {
                if let Some(rest) = text.strip_prefix('\t') {
                    rest
                } else {
                    let spaces = text.len() - text.trim_start_matches(' ').len();
                    &text[spaces.min(4)..]
                }
            } else {
                text
            };
            body.push_str(text);
            body.push('\n');
        }
    }

    fn table(&mut self, out: &mut String, table: TokenId, scratch: &mut ScratchPad) {
        scratch.pad(out, 2);
        let shape = scratch.engine.table_shape(table);
        let columns: String = shape
            .map(|shape| {
                shape
                    .alignments
                    .iter()
                    .map(|align| align.latex_column())
                    .collect()
            })
            .unwrap_or_else(|| "l".to_string());
        scratch.table_alignments = shape.map(|s| s.alignments.clone()).unwrap_or_default();
        scratch.write(out, "\\begin{tabular}{");
        scratch.write(out, &columns);
        scratch.write(out, "}\n\\toprule");
        self.visit_tree(out, table, scratch);
        scratch.pad(out, 1);
        scratch.write(out, "\\bottomrule\n\\end{tabular}");
    }

    fn bracket(&mut self, out: &mut String, pair: TokenId, is_image: bool, scratch: &mut ScratchPad) {
        let target = scratch.engine.resolutions().get(pair).cloned();
        let link = match target {
            Some(BracketTarget::Consumed) => return,
            Some(BracketTarget::InlineLink(link)) => link,
            Some(BracketTarget::LinkRef(index)) => scratch.engine.defs().links[index].clone(),
            _ => {
                self.visit_tree(out, pair, scratch);
                return;
            }
        };
        if is_image {
            scratch.write(
                out,
                &format!("\\includegraphics{{{}}}", link.url),
            );
        } else {
            scratch.write(out, &format!("\\href{{{}}}{{", link.url));
            self.visit_pair_interior(out, pair, scratch);
            scratch.write(out, "}");
        }
    }

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
        let text = escape_latex(self.interior_text(pair, scratch)).into_owned();
        scratch.write(out, "\\texttt{");
        scratch.write(out, &text);
        scratch.write(out, "}");
    }

    fn angle_pair(&mut self, out: &mut String, pair: TokenId, scratch: &mut ScratchPad) {
        let interior = self.interior_text(pair, scratch).to_string();
        if looks_like_uri(&interior) {
            scratch.write(out, &format!("\\url{{{}}}", interior));
        } else if looks_like_email(&interior) {
            scratch.write(out, &format!("\\href{{mailto:{}}}{{{}}}", interior, interior));
        } else {
            self.visit_tree(out, pair, scratch);
        }
    }

    fn footnote(&mut self, out: &mut String, pair: TokenId, scratch: &mut ScratchPad) {
        let target = scratch.engine.resolutions().get(pair).cloned();
        let (stack, index) = match target {
            Some(BracketTarget::Footnote(index)) => (NoteStack::Footnote, index),
            Some(BracketTarget::Glossary(index)) => (NoteStack::Glossary, index),
            _ => {
                self.visit_tree(out, pair, scratch);
                return;
            }
        };
        scratch.use_note(stack, index);
        let note = match stack {
            NoteStack::Footnote => scratch.engine.defs().footnotes[index].clone(),
            _ => scratch.engine.defs().glossary[index].clone(),
        };
        scratch.write(out, "\\footnote{");
        match note.content {
            Some(content) if note.inline => self.visit_pair_interior(out, content, scratch),
            Some(content) => {
                let mut inner = String::new();
                let saved = scratch.padded;
                scratch.padded = 2;
                self.visit_tree(&mut inner, content, scratch);
                scratch.padded = saved;
                scratch.write(out, inner.trim());
            }
            None => {}
        }
        scratch.write(out, "}");
    }

    fn citation(&mut self, out: &mut String, pair: TokenId, scratch: &mut ScratchPad) {
        let Some(BracketTarget::Citation { index, locator }) =
            scratch.engine.resolutions().get(pair).cloned()
        else {
            self.visit_tree(out, pair, scratch);
            return;
        };
        if scratch.engine.bibtex() {
            let label = self.interior_text(pair, scratch).trim_start_matches('#').to_string();
            match locator {
                Some(locator_id) => {
                    let locator_text = self.interior_text(locator_id, scratch).to_string();
                    scratch.write(out, &format!("~\\cite[{}]{{{}}}", locator_text, label));
                }
                None => scratch.write(out, &format!("~\\cite{{{}}}", label)),
            }
            return;
        }
        scratch.use_note(NoteStack::Citation, index);
        let note = scratch.engine.defs().citations[index].clone();
        scratch.write(out, "\\footnote{");
        match note.content {
            Some(content) if note.inline => self.visit_pair_interior(out, content, scratch),
            Some(content) => {
                let mut inner = String::new();
                let saved = scratch.padded;
                scratch.padded = 2;
                self.visit_tree(&mut inner, content, scratch);
                scratch.padded = saved;
                scratch.write(out, inner.trim());
            }
            None => {}
        }
        scratch.write(out, "}");
    }
}
