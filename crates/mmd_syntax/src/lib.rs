//! Token-level foundations for the `mmd` MultiMarkdown engine: the closed
//! [`TokenKind`] enumeration, the arena-backed [`TokenTree`] whose nodes all
//! point back into an immutable [`SourceText`], and the byte classification
//! tables used by both lexing stages.

pub mod chars;
mod kind;
mod source;
mod token;
mod tree;

pub use kind::TokenKind;
pub use source::SourceText;
pub use token::{Token, TokenFlags, TokenId};
pub use tree::{ChildIter, TokenTree, TreeDump};
