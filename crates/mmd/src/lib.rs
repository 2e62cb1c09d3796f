//! A MultiMarkdown engine.
//!
//! The pipeline is strictly staged: a line lexer classifies physical lines,
//! a block parser reduces the line stream into a token tree, the reference
//! extractor files definitions into cross-document tables, an inline lexer
//! and delimiter matcher structure each block's content, a resolver
//! classifies bracket pairs against the tables, and per-format emitters walk
//! the finished tree. Every token points back into the immutable source by
//! byte range.
//!
//! ```text
//! source → lines → blocks → definitions → inline spans → pairs → render
//! ```
//!
//! The quickest entry points are [`html_from_text`] and [`Engine`].

pub mod block;
pub mod diagnostics;
pub mod engine;
pub mod extensions;
pub mod extract;
pub mod i18n;
pub mod inline;
pub mod line;
pub mod metadata;
pub mod rand;
pub mod render;

pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use engine::{Engine, OutputFormat};
pub use extensions::Extensions;
pub use i18n::{Language, QuoteStyle};
pub use render::RenderOutput;

/// Every recursive descent in the pipeline carries a depth counter with this
/// cap and silently truncates past it.
pub(crate) const RECURSION_LIMIT: usize = 1000;

/// Convert MultiMarkdown text to an HTML snippet or complete document,
/// depending on metadata and the extension set.
pub fn html_from_text(text: &str, extensions: Extensions) -> String {
    Engine::new(text, extensions).render(OutputFormat::Html).text
}

/// Convert MultiMarkdown text to the requested format.
pub fn convert(text: &str, extensions: Extensions, format: OutputFormat) -> RenderOutput {
    Engine::new(text, extensions).render(format)
}
