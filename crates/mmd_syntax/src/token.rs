use bitflags::bitflags;
use serde::Serialize;

use crate::kind::TokenKind;

/// A stable handle to a token inside a [`TokenTree`](crate::tree::TokenTree)
/// arena. Handles are plain indices; they stay valid for the lifetime of the
/// arena and are never reused within one parse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TokenId(pub(crate) u32);

impl TokenId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

bitflags! {
    /// Per-token state driving the delimiter matcher. `CAN_OPEN` and
    /// `CAN_CLOSE` are assigned by the inline lexer from flanking context;
    /// `UNMATCHED` is set on every candidate delimiter and cleared when a
    /// mate is found, so the renderer knows to emit leftovers literally.
    #[repr(transparent)]
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TokenFlags: u8 {
        const CAN_OPEN = 1;
        const CAN_CLOSE = 1 << 1;
        const UNMATCHED = 1 << 2;
    }
}

impl Serialize for TokenFlags {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.bits())
    }
}

/// A typed byte span with tree links. Every token points back into the
/// immutable source through `start`/`len`; the link fields are arena indices
/// maintained by [`TokenTree`](crate::tree::TokenTree).
#[derive(Clone, Debug, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub start: usize,
    pub len: usize,
    pub(crate) prev: Option<TokenId>,
    pub(crate) next: Option<TokenId>,
    pub(crate) child: Option<TokenId>,
    pub(crate) tail: Option<TokenId>,
    pub(crate) mate: Option<TokenId>,
    pub flags: TokenFlags,
}

impl Token {
    pub(crate) fn new(kind: TokenKind, start: usize, len: usize) -> Self {
        Self {
            kind,
            start,
            len,
            prev: None,
            next: None,
            child: None,
            tail: None,
            mate: None,
            flags: TokenFlags::empty(),
        }
    }

    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn span(&self) -> std::ops::Range<usize> {
        self.start..self.end()
    }

    pub fn next(&self) -> Option<TokenId> {
        self.next
    }

    pub fn prev(&self) -> Option<TokenId> {
        self.prev
    }

    pub fn child(&self) -> Option<TokenId> {
        self.child
    }

    pub fn tail(&self) -> Option<TokenId> {
        self.tail
    }

    pub fn mate(&self) -> Option<TokenId> {
        self.mate
    }

    pub fn can_open(&self) -> bool {
        self.flags.contains(TokenFlags::CAN_OPEN)
    }

    pub fn can_close(&self) -> bool {
        self.flags.contains(TokenFlags::CAN_CLOSE)
    }

    pub fn is_unmatched(&self) -> bool {
        self.flags.contains(TokenFlags::UNMATCHED)
    }
}
