//! The engine: owns the source, the token tree, and every cross-document
//! table, and drives the pipeline stages in order. One engine supports any
//! number of sequential emissions; per-emission state lives in the render
//! scratch pad, never on the engine.

use rustc_hash::{FxHashMap, FxHashSet};

use mmd_syntax::{SourceText, TokenId, TokenTree};

use crate::block::{self, TableShape};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::extensions::Extensions;
use crate::extract::{self, Definitions};
use crate::i18n::{Language, QuoteStyle};
use crate::inline::{self, resolve::Resolutions};
use crate::line;
use crate::metadata::{self, MetaItem};
use crate::render::{self, RenderOutput};

/// The supported output targets. The LaTeX variants share one emitter and
/// differ in preamble and header-level mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Html,
    Latex,
    Beamer,
    Memoir,
    Mmd,
}

impl OutputFormat {
    pub fn from_name(name: &str) -> Option<OutputFormat> {
        match name.trim().to_ascii_lowercase().as_str() {
            "html" => Some(OutputFormat::Html),
            "latex" => Some(OutputFormat::Latex),
            "beamer" => Some(OutputFormat::Beamer),
            "memoir" => Some(OutputFormat::Memoir),
            "mmd" | "markdown" => Some(OutputFormat::Mmd),
            _ => None,
        }
    }

    /// True if a `{=format}` raw filter targets this output.
    pub fn matches_filter(self, filter: &str) -> bool {
        let filter = filter.trim();
        if filter == "*" {
            return true;
        }
        match self {
            OutputFormat::Html => filter.eq_ignore_ascii_case("html"),
            OutputFormat::Latex | OutputFormat::Beamer | OutputFormat::Memoir => {
                filter.eq_ignore_ascii_case("latex")
            }
            OutputFormat::Mmd => filter.eq_ignore_ascii_case("mmd"),
        }
    }

    pub fn file_extension(self) -> &'static str {
        match self {
            OutputFormat::Html => "html",
            OutputFormat::Latex | OutputFormat::Beamer | OutputFormat::Memoir => "tex",
            OutputFormat::Mmd => "mmd",
        }
    }
}

pub struct Engine {
    source: SourceText,
    tree: TokenTree,
    root: TokenId,
    extensions: Extensions,
    language: Language,
    quote_style: QuoteStyle,
    metadata: Vec<MetaItem>,
    defs: Definitions,
    table_shapes: FxHashMap<TokenId, TableShape>,
    resolutions: Resolutions,
    diagnostics: Vec<Diagnostic>,
    header_labels: FxHashMap<TokenId, String>,
    base_header_level: u8,
    html_header_level: Option<u8>,
    latex_header_level: Option<u8>,
    bibtex: bool,
    random_seed: u32,
}

impl Engine {
    pub fn new(text: &str, extensions: Extensions) -> Engine {
        Self::with_options(text, extensions, Language::default(), 0)
    }

    /// Decode raw bytes first, reporting malformed UTF-8 as diagnostics.
    pub fn from_bytes(bytes: &[u8], extensions: Extensions) -> Engine {
        let (source, bad_offsets) = SourceText::from_bytes(bytes);
        let mut engine = Self::with_source(source, extensions, Language::default(), 0);
        for offset in bad_offsets {
            engine
                .diagnostics
                .push(Diagnostic::new(DiagnosticKind::MalformedUtf8, offset));
        }
        engine
    }

    pub fn with_options(
        text: &str,
        extensions: Extensions,
        language: Language,
        random_seed: u32,
    ) -> Engine {
        Self::with_source(SourceText::new(text), extensions, language, random_seed)
    }

    fn with_source(
        source: SourceText,
        extensions: Extensions,
        language: Language,
        random_seed: u32,
    ) -> Engine {
        let mut tree = TokenTree::with_capacity(source.len() / 16 + 16);
        let lines = line::scan_lines(&source, &mut tree, extensions);
        let blocks = block::parse_document(&source, &mut tree, lines, extensions);
        let mut diagnostics = blocks.diagnostics;

        let mut defs = extract::extract_definitions(
            &source,
            &mut tree,
            blocks.root,
            extensions,
            random_seed,
        );
        diagnostics.append(&mut defs.diagnostics);

        let mut engine = Engine {
            root: blocks.root,
            table_shapes: blocks.table_shapes,
            language,
            quote_style: language.default_quote_style(),
            metadata: Vec::new(),
            resolutions: Resolutions::default(),
            diagnostics,
            header_labels: FxHashMap::default(),
            base_header_level: 1,
            html_header_level: None,
            latex_header_level: None,
            bibtex: false,
            random_seed,
            source,
            tree,
            extensions,
            defs,
        };

        engine.collect_metadata();
        engine.apply_metadata_effects();
        engine.run_inline_passes();
        engine.header_labels = engine
            .defs
            .headers
            .iter()
            .map(|header| (header.block, header.label.clone()))
            .collect();
        engine
    }

    fn collect_metadata(&mut self) {
        let meta_block = self
            .tree
            .children(self.root)
            .find(|&id| self.tree.kind(id) == mmd_syntax::TokenKind::BLOCK_META);
        if let Some(block) = meta_block {
            self.metadata = metadata::parse_meta_block(&self.source, &self.tree, block);
        }
    }

    fn apply_metadata_effects(&mut self) {
        for item in &self.metadata {
            match item.key.as_str() {
                "baseheaderlevel" => {
                    if let Ok(level) = item.value.trim().parse::<u8>() {
                        self.base_header_level = level.clamp(1, 6);
                    }
                }
                "htmlheaderlevel" => {
                    self.html_header_level = item.value.trim().parse::<u8>().ok();
                }
                "latexheaderlevel" => {
                    self.latex_header_level = item.value.trim().parse::<u8>().ok();
                }
                "language" => {
                    if let Some(language) = Language::from_code(&item.value) {
                        self.language = language;
                        self.quote_style = language.default_quote_style();
                    }
                }
                "quoteslanguage" => {
                    if let Some(style) = QuoteStyle::from_code(&item.value) {
                        self.quote_style = style;
                    }
                }
                "bibtex" => self.bibtex = true,
                _ => {}
            }
        }
    }

    fn run_inline_passes(&mut self) {
        let manual_blocks: FxHashSet<TokenId> = self
            .defs
            .headers
            .iter()
            .filter(|header| header.manual)
            .map(|header| header.block)
            .collect();

        inline::process_blocks(
            &self.source,
            &mut self.tree,
            self.root,
            self.extensions,
            &manual_blocks,
        );

        // Note bodies carry inline content of their own.
        let note_contents: Vec<TokenId> = self
            .defs
            .footnotes
            .iter()
            .chain(self.defs.citations.iter())
            .chain(self.defs.glossary.iter())
            .filter_map(|note| note.content)
            .collect();
        for content in note_contents {
            inline::process_blocks(
                &self.source,
                &mut self.tree,
                content,
                self.extensions,
                &manual_blocks,
            );
        }

        self.resolutions = inline::resolve::resolve_inline(
            &self.source,
            &self.tree,
            self.root,
            &mut self.defs,
            &self.metadata,
            self.extensions,
        );
        // Resolution also runs over the detached note fragments so notes can
        // contain links and nested references. Inline definitions are part
        // of the document tree and were already covered by the first pass.
        for content in self
            .defs
            .footnotes
            .iter()
            .chain(self.defs.citations.iter())
            .chain(self.defs.glossary.iter())
            .filter(|note| !note.inline)
            .filter_map(|note| note.content)
            .collect::<Vec<_>>()
        {
            let more = inline::resolve::resolve_inline(
                &self.source,
                &self.tree,
                content,
                &mut self.defs,
                &self.metadata,
                self.extensions,
            );
            self.resolutions.targets.extend(more.targets);
        }
    }

    pub fn render(&self, format: OutputFormat) -> RenderOutput {
        render::render(self, format)
    }

    /// A JSON dump of the token tree, for tooling and test inspection.
    pub fn tree_to_json(&self) -> String {
        serde_json::to_string_pretty(&self.tree.dump(self.root)).unwrap_or_default()
    }

    //#region Accessors

    pub fn source(&self) -> &SourceText {
        &self.source
    }

    pub fn tree(&self) -> &TokenTree {
        &self.tree
    }

    pub fn root(&self) -> TokenId {
        self.root
    }

    pub fn extensions(&self) -> Extensions {
        self.extensions
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn quote_style(&self) -> QuoteStyle {
        self.quote_style
    }

    pub fn metadata(&self) -> &[MetaItem] {
        &self.metadata
    }

    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        let key = metadata::metadata_key(key);
        self.metadata
            .iter()
            .find(|item| item.key == key)
            .map(|item| item.value.as_str())
    }

    pub fn defs(&self) -> &Definitions {
        &self.defs
    }

    pub fn resolutions(&self) -> &Resolutions {
        &self.resolutions
    }

    pub fn table_shape(&self, table: TokenId) -> Option<&TableShape> {
        self.table_shapes.get(&table)
    }

    pub fn header_label(&self, block: TokenId) -> Option<&str> {
        self.header_labels
            .get(&block)
            .map(|label| label.as_str())
            .filter(|label| !label.is_empty())
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn bibtex(&self) -> bool {
        self.bibtex
    }

    pub fn random_seed(&self) -> u32 {
        self.random_seed
    }

    /// The heading shift for a format: a format-specific level override wins
    /// over `baseheaderlevel`.
    pub fn header_level_shift(&self, format: OutputFormat) -> u8 {
        let base = match format {
            OutputFormat::Html => self.html_header_level,
            OutputFormat::Latex | OutputFormat::Beamer | OutputFormat::Memoir => {
                self.latex_header_level
            }
            OutputFormat::Mmd => None,
        };
        base.unwrap_or(self.base_header_level).clamp(1, 6)
    }

    /// Complete-document output applies when forced by `COMPLETE`, or when
    /// recognized metadata is present and `SNIPPET` does not override it.
    pub fn wants_complete(&self) -> bool {
        if self.extensions.contains(Extensions::SNIPPET) {
            return false;
        }
        if self.extensions.contains(Extensions::COMPLETE) {
            return true;
        }
        self.metadata
            .iter()
            .any(|item| metadata::is_recognized_key(&item.key))
    }

    //#endregion
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_builds_for_empty_input() {
        let engine = Engine::new("", Extensions::standard());
        assert_eq!(engine.tree().children(engine.root()).count(), 0);
    }

    #[test]
    fn tree_dump_is_json() {
        let engine = Engine::new("# A\n", Extensions::standard());
        let json = engine.tree_to_json();
        assert!(json.contains("\"DOCUMENT\""));
        assert!(json.contains("\"BLOCK_H1\""));
    }

    #[test]
    fn engine_builds_for_one_byte_inputs() {
        for text in ["#", "[", "*", "`", "\\"] {
            let engine = Engine::new(text, Extensions::standard());
            assert!(engine.tree().len() > 0);
        }
    }

    #[test]
    fn metadata_effects_apply() {
        let engine = Engine::new(
            "language: de\nbaseheaderlevel: 2\n\n# Titel\n",
            Extensions::standard(),
        );
        assert_eq!(engine.language(), Language::German);
        assert_eq!(engine.quote_style(), QuoteStyle::German);
        assert_eq!(engine.header_level_shift(OutputFormat::Html), 2);
        assert!(engine.wants_complete());
    }

    #[test]
    fn snippet_overrides_complete() {
        let engine = Engine::new(
            "title: X\n\nBody\n",
            Extensions::standard() | Extensions::SNIPPET,
        );
        assert!(!engine.wants_complete());
    }

    #[test]
    fn span_invariants_hold_across_the_tree() {
        let text = "# H *em*\n\n- a\n- b\n\n> quote\n\n| a |\n|---|\n| b |\n";
        let engine = Engine::new(text, Extensions::standard());
        let tree = engine.tree();
        fn check(tree: &TokenTree, id: TokenId, limit: usize) {
            let token = tree.get(id);
            assert!(token.start <= token.end());
            assert!(token.end() <= limit, "span of {:?} exceeds source", token.kind);
            for child in tree.children(id) {
                let child_token = tree.get(child);
                assert!(token.start <= child_token.start);
                assert!(child_token.end() <= token.end());
                check(tree, child, limit);
            }
        }
        check(tree, engine.root(), engine.source().len());
    }
}
