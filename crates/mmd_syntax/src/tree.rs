use serde::Serialize;

use crate::kind::TokenKind;
use crate::token::{Token, TokenFlags, TokenId};

/// The arena holding every token of one parse. Tokens are created exclusively
/// through [`TokenTree::alloc`] and freed as a group when the tree is dropped;
/// all tree links (`prev`/`next`/`child`/`tail`/`mate`) are indices into this
/// arena, which keeps the cyclic sibling and mate references safe without
/// reference counting.
#[derive(Debug, Default)]
pub struct TokenTree {
    tokens: Vec<Token>,
}

impl TokenTree {
    pub fn new() -> Self {
        Self { tokens: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tokens: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Create a new, unlinked token.
    pub fn alloc(&mut self, kind: TokenKind, start: usize, len: usize) -> TokenId {
        let id = TokenId(self.tokens.len() as u32);
        self.tokens.push(Token::new(kind, start, len));
        id
    }

    pub fn get(&self, id: TokenId) -> &Token {
        &self.tokens[id.index()]
    }

    fn get_mut(&mut self, id: TokenId) -> &mut Token {
        &mut self.tokens[id.index()]
    }

    pub fn kind(&self, id: TokenId) -> TokenKind {
        self.get(id).kind
    }

    pub fn set_kind(&mut self, id: TokenId, kind: TokenKind) {
        self.get_mut(id).kind = kind;
    }

    pub fn set_span(&mut self, id: TokenId, start: usize, len: usize) {
        let token = self.get_mut(id);
        token.start = start;
        token.len = len;
    }

    pub fn set_len(&mut self, id: TokenId, len: usize) {
        self.get_mut(id).len = len;
    }

    pub fn add_flags(&mut self, id: TokenId, flags: TokenFlags) {
        self.get_mut(id).flags |= flags;
    }

    pub fn remove_flags(&mut self, id: TokenId, flags: TokenFlags) {
        self.get_mut(id).flags -= flags;
    }

    /// Link `a` and `b` as mates. Mate links are always symmetric.
    pub fn set_mates(&mut self, a: TokenId, b: TokenId) {
        self.get_mut(a).mate = Some(b);
        self.get_mut(b).mate = Some(a);
    }

    /// Append `child` to the end of `parent`'s child chain. The child must be
    /// unlinked.
    pub fn append_child(&mut self, parent: TokenId, child: TokenId) {
        debug_assert!(
            self.get(child).prev.is_none() && self.get(child).next.is_none(),
            "appended token is already linked into a chain"
        );
        match self.get(parent).tail {
            Some(tail) => {
                self.get_mut(tail).next = Some(child);
                self.get_mut(child).prev = Some(tail);
            }
            None => {
                self.get_mut(parent).child = Some(child);
            }
        }
        self.get_mut(parent).tail = Some(child);
    }

    /// Grow `parent`'s span to cover `child`'s span. Used by the block parser
    /// as it accretes lines into blocks.
    pub fn extend_span_over(&mut self, parent: TokenId, child: TokenId) {
        let (child_start, child_end) = {
            let child = self.get(child);
            (child.start, child.end())
        };
        let parent = self.get_mut(parent);
        if parent.len == 0 && parent.start == 0 {
            parent.start = child_start;
        }
        if child_start < parent.start {
            parent.start = child_start;
        }
        if child_end > parent.end() {
            parent.len = child_end - parent.start;
        }
    }

    /// Detach `parent`'s whole child chain and return its head. The children
    /// keep their sibling links to one another.
    pub fn take_children(&mut self, parent: TokenId) -> Option<TokenId> {
        let parent = self.get_mut(parent);
        let head = parent.child.take();
        parent.tail = None;
        head
    }

    /// Clear `id`'s sibling links so it can be re-appended elsewhere. The
    /// caller is responsible for the rest of the chain it came from.
    pub fn unlink_siblings(&mut self, id: TokenId) {
        let token = self.get_mut(id);
        token.prev = None;
        token.next = None;
    }

    /// Wrap the sibling span `first..=last` (inclusive, both children of
    /// `parent`) under a new token of `kind`, splicing the new token into the
    /// chain where the span used to be. The wrapped tokens, delimiters
    /// included, become the new token's children; its byte span covers the
    /// whole range.
    pub fn wrap_span(
        &mut self,
        parent: TokenId,
        first: TokenId,
        last: TokenId,
        kind: TokenKind,
    ) -> TokenId {
        let start = self.get(first).start;
        let end = self.get(last).end();
        let wrapper = self.alloc(kind, start, end - start);

        let before = self.get(first).prev;
        let after = self.get(last).next;

        self.get_mut(first).prev = None;
        self.get_mut(last).next = None;
        self.get_mut(wrapper).child = Some(first);
        self.get_mut(wrapper).tail = Some(last);

        self.get_mut(wrapper).prev = before;
        self.get_mut(wrapper).next = after;
        match before {
            Some(before) => self.get_mut(before).next = Some(wrapper),
            None => self.get_mut(parent).child = Some(wrapper),
        }
        match after {
            Some(after) => self.get_mut(after).prev = Some(wrapper),
            None => self.get_mut(parent).tail = Some(wrapper),
        }

        wrapper
    }

    /// Wrap a matched delimiter pair. The opener and closer become the first
    /// and last children of the new pair token, are linked as mates, and lose
    /// their `UNMATCHED` flag.
    pub fn wrap_pair(
        &mut self,
        parent: TokenId,
        opener: TokenId,
        closer: TokenId,
        kind: TokenKind,
    ) -> TokenId {
        let wrapper = self.wrap_span(parent, opener, closer, kind);
        self.set_mates(opener, closer);
        self.remove_flags(opener, TokenFlags::UNMATCHED);
        self.remove_flags(closer, TokenFlags::UNMATCHED);
        wrapper
    }

    /// Iterate `id`'s children in order.
    pub fn children(&self, id: TokenId) -> ChildIter<'_> {
        ChildIter {
            tree: self,
            cursor: self.get(id).child,
        }
    }

    /// Iterate the sibling chain starting at `id` (inclusive).
    pub fn siblings_from(&self, id: TokenId) -> ChildIter<'_> {
        ChildIter {
            tree: self,
            cursor: Some(id),
        }
    }

    /// Collect the children of `id` into a Vec. The block and inline passes
    /// use this when they need to restructure a chain while walking it.
    pub fn child_ids(&self, id: TokenId) -> Vec<TokenId> {
        self.children(id).collect()
    }

    /// A recursive dump of the subtree at `id` for tooling and tests.
    pub fn dump(&self, id: TokenId) -> TreeDump {
        let token = self.get(id);
        TreeDump {
            kind: token.kind,
            start: token.start,
            len: token.len,
            children: self.children(id).map(|child| self.dump(child)).collect(),
        }
    }
}

pub struct ChildIter<'a> {
    tree: &'a TokenTree,
    cursor: Option<TokenId>,
}

impl<'a> Iterator for ChildIter<'a> {
    type Item = TokenId;

    fn next(&mut self) -> Option<TokenId> {
        let current = self.cursor?;
        self.cursor = self.tree.get(current).next;
        Some(current)
    }
}

/// A serializable snapshot of a subtree.
#[derive(Debug, Serialize)]
pub struct TreeDump {
    pub kind: TokenKind,
    pub start: usize,
    pub len: usize,
    pub children: Vec<TreeDump>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_chain_valid(tree: &TokenTree, parent: TokenId) {
        let mut prev: Option<TokenId> = None;
        let mut cursor = tree.get(parent).child;
        while let Some(id) = cursor {
            assert_eq!(tree.get(id).prev, prev, "prev link broken at {:?}", id);
            prev = Some(id);
            cursor = tree.get(id).next;
        }
        assert_eq!(tree.get(parent).tail, prev, "tail does not match last child");
        for child in tree.children(parent) {
            assert_chain_valid(tree, child);
        }
    }

    #[test]
    fn append_maintains_links() {
        let mut tree = TokenTree::new();
        let root = tree.alloc(TokenKind::DOCUMENT, 0, 10);
        let a = tree.alloc(TokenKind::TEXT_PLAIN, 0, 3);
        let b = tree.alloc(TokenKind::TEXT_PLAIN, 3, 3);
        let c = tree.alloc(TokenKind::TEXT_PLAIN, 6, 4);
        tree.append_child(root, a);
        tree.append_child(root, b);
        tree.append_child(root, c);

        assert_eq!(tree.child_ids(root), vec![a, b, c]);
        assert_chain_valid(&tree, root);
        assert!(tree.get(a).prev().is_none());
        assert!(tree.get(c).next().is_none());
    }

    #[test]
    fn wrap_span_in_middle() {
        let mut tree = TokenTree::new();
        let root = tree.alloc(TokenKind::DOCUMENT, 0, 10);
        let ids: Vec<_> = (0..5)
            .map(|i| tree.alloc(TokenKind::TEXT_PLAIN, i * 2, 2))
            .collect();
        for &id in &ids {
            tree.append_child(root, id);
        }

        let pair = tree.wrap_span(root, ids[1], ids[3], TokenKind::PAIR_EMPH);
        assert_eq!(tree.child_ids(root), vec![ids[0], pair, ids[4]]);
        assert_eq!(tree.child_ids(pair), vec![ids[1], ids[2], ids[3]]);
        assert_eq!(tree.get(pair).start, 2);
        assert_eq!(tree.get(pair).len, 6);
        assert_chain_valid(&tree, root);
    }

    #[test]
    fn wrap_span_covering_whole_chain() {
        let mut tree = TokenTree::new();
        let root = tree.alloc(TokenKind::DOCUMENT, 0, 4);
        let a = tree.alloc(TokenKind::STAR, 0, 1);
        let b = tree.alloc(TokenKind::TEXT_PLAIN, 1, 2);
        let c = tree.alloc(TokenKind::STAR, 3, 1);
        tree.append_child(root, a);
        tree.append_child(root, b);
        tree.append_child(root, c);

        let pair = tree.wrap_pair(root, a, c, TokenKind::PAIR_EMPH);
        assert_eq!(tree.child_ids(root), vec![pair]);
        assert_eq!(tree.get(root).tail(), Some(pair));
        assert_eq!(tree.get(a).mate(), Some(c));
        assert_eq!(tree.get(c).mate(), Some(a));
        assert_chain_valid(&tree, root);
    }

    #[test]
    fn dump_serializes_to_json() {
        let mut tree = TokenTree::new();
        let root = tree.alloc(TokenKind::DOCUMENT, 0, 4);
        let text = tree.alloc(TokenKind::TEXT_PLAIN, 0, 4);
        tree.append_child(root, text);
        let json = serde_json::to_string(&tree.dump(root)).unwrap();
        assert!(json.contains("\"DOCUMENT\""));
        assert!(json.contains("\"TEXT_PLAIN\""));
    }

    #[test]
    fn mates_are_symmetric() {
        let mut tree = TokenTree::new();
        let a = tree.alloc(TokenKind::QUOTE_DOUBLE, 0, 1);
        let b = tree.alloc(TokenKind::QUOTE_DOUBLE, 5, 1);
        tree.set_mates(a, b);
        assert_eq!(tree.get(a).mate(), Some(b));
        assert_eq!(tree.get(b).mate(), Some(a));
    }

    #[test]
    fn parent_spans_cover_children() {
        let mut tree = TokenTree::new();
        let block = tree.alloc(TokenKind::BLOCK_PARA, 0, 0);
        let line = tree.alloc(TokenKind::LINE_PLAIN, 4, 6);
        tree.append_child(block, line);
        tree.extend_span_over(block, line);
        assert!(tree.get(block).start <= tree.get(line).start);
        assert!(tree.get(line).end() <= tree.get(block).end());
    }
}
