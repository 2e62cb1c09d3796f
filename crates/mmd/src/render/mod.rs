//! The shared renderer contract. Every emitter is a depth-first walk over
//! the token tree driven by `visit`, with a per-emission [`ScratchPad`]
//! carrying contextual state. The tree itself is never mutated during
//! emission, so repeated renders from one engine are identical.

mod html;
mod latex;
mod mmd;
mod util;

use rustc_hash::FxHashMap;

use mmd_syntax::{TokenId, TokenKind};

use crate::block::Align;
use crate::diagnostics::Diagnostic;
use crate::engine::{Engine, OutputFormat};
use crate::rand::Lcg;
use crate::RECURSION_LIMIT;

pub struct RenderOutput {
    pub text: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// Which of the engine's note stacks a used-note entry lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NoteStack {
    Footnote,
    Citation,
    Glossary,
}

/// Per-emission mutable state.
pub struct ScratchPad<'e> {
    pub engine: &'e Engine,
    pub format: OutputFormat,

    /// Trailing-newline accounting for the `pad` discipline.
    pub padded: usize,
    /// Siblings the current handler has absorbed; the traversal loop skips
    /// this many before visiting again.
    pub skip: usize,
    pub depth: usize,

    /// Entry indices in first-reference order, one stack per note kind.
    pub used_footnotes: Vec<usize>,
    pub used_citations: Vec<usize>,
    pub used_glossary: Vec<usize>,
    note_numbers: FxHashMap<(NoteStack, usize), usize>,

    /// Innermost value wins; empty means "not inside a list".
    pub list_tightness: Vec<bool>,
    pub in_table_header: bool,
    pub table_alignments: Vec<Align>,
    pub table_cell_index: usize,

    pub random: Lcg,
    pub diagnostics: Vec<Diagnostic>,
}

impl<'e> ScratchPad<'e> {
    pub fn new(engine: &'e Engine, format: OutputFormat) -> Self {
        Self {
            engine,
            format,
            padded: 2,
            skip: 0,
            depth: 0,
            used_footnotes: Vec::new(),
            used_citations: Vec::new(),
            used_glossary: Vec::new(),
            note_numbers: FxHashMap::default(),
            list_tightness: Vec::new(),
            in_table_header: false,
            table_alignments: Vec::new(),
            table_cell_index: 0,
            random: Lcg::new(engine.random_seed()),
            diagnostics: Vec::new(),
        }
    }

    /// Guarantee at least `n` newlines precede the next write.
    pub fn pad(&mut self, out: &mut String, n: usize) {
        while self.padded < n {
            out.push('\n');
            self.padded += 1;
        }
    }

    /// Write `text` and reset the padding counter to the number of newlines
    /// it ends with.
    pub fn write(&mut self, out: &mut String, text: &str) {
        if text.is_empty() {
            return;
        }
        out.push_str(text);
        self.padded = text.len() - text.trim_end_matches('\n').len();
    }

    /// The 1-based number of a note, assigned at first reference; duplicates
    /// reuse the original number. Returns `(number, first_use)`.
    pub fn use_note(&mut self, stack: NoteStack, index: usize) -> (usize, bool) {
        if let Some(&number) = self.note_numbers.get(&(stack, index)) {
            return (number, false);
        }
        let used = match stack {
            NoteStack::Footnote => &mut self.used_footnotes,
            NoteStack::Citation => &mut self.used_citations,
            NoteStack::Glossary => &mut self.used_glossary,
        };
        used.push(index);
        let number = used.len();
        self.note_numbers.insert((stack, index), number);
        (number, true)
    }

    pub fn tight_list(&self) -> bool {
        self.list_tightness.last().copied().unwrap_or(false)
    }
}

/// The contract every emitter implements. `visit_tree` drives the walk with
/// the skip counter and recursion cap; `visit` handles one token.
pub trait Emitter {
    fn start_complete(&mut self, out: &mut String, scratch: &mut ScratchPad);
    fn end_complete(&mut self, out: &mut String, scratch: &mut ScratchPad);
    fn visit(&mut self, out: &mut String, token: TokenId, scratch: &mut ScratchPad);
    fn emit_note_lists(&mut self, out: &mut String, scratch: &mut ScratchPad);

    fn visit_tree(&mut self, out: &mut String, parent: TokenId, scratch: &mut ScratchPad) {
        if scratch.depth >= RECURSION_LIMIT {
            scratch.diagnostics.push(Diagnostic::new(
                crate::diagnostics::DiagnosticKind::RecursionDepthExceeded,
                scratch.engine.tree().get(parent).start,
            ));
            return;
        }
        scratch.depth += 1;
        let mut cursor = scratch.engine.tree().get(parent).child();
        while let Some(id) = cursor {
            if scratch.skip > 0 {
                scratch.skip -= 1;
            } else {
                self.visit(out, id, scratch);
            }
            cursor = scratch.engine.tree().get(id).next();
        }
        scratch.depth -= 1;
    }

    /// Visit a pair's children without its delimiter tokens.
    fn visit_pair_interior(&mut self, out: &mut String, pair: TokenId, scratch: &mut ScratchPad) {
        if scratch.depth >= RECURSION_LIMIT {
            return;
        }
        scratch.depth += 1;
        let tree = scratch.engine.tree();
        let last = tree.get(pair).tail();
        let mut cursor = tree.get(pair).child().and_then(|first| tree.get(first).next());
        while let Some(id) = cursor {
            if Some(id) == last {
                break;
            }
            if scratch.skip > 0 {
                scratch.skip -= 1;
            } else {
                self.visit(out, id, scratch);
            }
            cursor = scratch.engine.tree().get(id).next();
        }
        scratch.depth -= 1;
    }
}

/// Render `engine`'s document to `format`. A `latexmode` metadata key
/// redirects a plain LaTeX request to the beamer or memoir variant.
pub fn render(engine: &Engine, format: OutputFormat) -> RenderOutput {
    let format = match format {
        OutputFormat::Latex => match engine
            .metadata_value("latexmode")
            .map(|mode| mode.trim().to_ascii_lowercase())
            .as_deref()
        {
            Some("memoir") => OutputFormat::Memoir,
            Some("beamer") => OutputFormat::Beamer,
            _ => OutputFormat::Latex,
        },
        other => other,
    };
    let mut scratch = ScratchPad::new(engine, format);
    let mut out = String::with_capacity(engine.source().len() + engine.source().len() / 2);

    match format {
        OutputFormat::Html => {
            let mut emitter = html::HtmlEmitter;
            run(&mut emitter, &mut out, &mut scratch)
        }
        OutputFormat::Latex | OutputFormat::Beamer | OutputFormat::Memoir => {
            let mut emitter = latex::LatexEmitter;
            run(&mut emitter, &mut out, &mut scratch)
        }
        OutputFormat::Mmd => {
            let mut emitter = mmd::MmdEmitter;
            run(&mut emitter, &mut out, &mut scratch)
        }
    }

    let mut diagnostics = engine.diagnostics().to_vec();
    diagnostics.append(&mut scratch.diagnostics);
    RenderOutput {
        text: out,
        diagnostics,
    }
}

fn run(emitter: &mut dyn Emitter, out: &mut String, scratch: &mut ScratchPad) {
    let complete = scratch.engine.wants_complete();
    if complete {
        emitter.start_complete(out, scratch);
    }
    emitter.visit_tree(out, scratch.engine.root(), scratch);
    emitter.emit_note_lists(out, scratch);
    if complete {
        emitter.end_complete(out, scratch);
    }
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

/// Map a heading block to its output level for the current format.
pub(crate) fn effective_heading_level(scratch: &ScratchPad, kind: TokenKind) -> u8 {
    let level = kind.heading_level().unwrap_or(1);
    let shift = scratch.engine.header_level_shift(scratch.format);
    (level + shift - 1).clamp(1, 6)
}
