use thiserror::Error;

/// The recoverable conditions the pipeline can report. None of these abort
/// parsing or rendering; they accumulate on the engine and ride along with
/// the rendered output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum DiagnosticKind {
    #[error("malformed UTF-8 sequence; bytes replaced with U+FFFD")]
    MalformedUtf8,
    #[error("invalid URL in link definition; definition rejected")]
    InvalidUrl,
    #[error("malformed table alignment row; treated as content")]
    MalformedTableAlignment,
    #[error("recursion depth exceeded; subtree truncated")]
    RecursionDepthExceeded,
    #[error("unknown token kind reached the renderer; node skipped")]
    UnknownToken,
}

/// A single report, with the byte offset in the normalized source where the
/// condition was observed, when one is known.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub offset: Option<usize>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, offset: impl Into<Option<usize>>) -> Self {
        Self {
            kind,
            offset: offset.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.offset {
            Some(offset) => write!(f, "{} (byte {})", self.kind, offset),
            None => write!(f, "{}", self.kind),
        }
    }
}
