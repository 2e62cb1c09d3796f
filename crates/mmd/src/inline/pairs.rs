//! Delimiter pairing. Four passes run over each inline chain, one per pair
//! family: verbatim spans (backticks, math, CriticMarkup, HTML comments),
//! bracket shapes, emphasis runs, and smart quotes. Matched delimiters are
//! wrapped under a `PAIR_*` token and linked as mates; leftovers keep their
//! `UNMATCHED` flag and render as literal text.

use mmd_syntax::{TokenFlags, TokenId, TokenKind, TokenTree};

use crate::extensions::Extensions;
use crate::RECURSION_LIMIT;

/// Pair interiors that are never re-examined by later passes.
fn is_verbatim_pair(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::PAIR_BACKTICK
            | TokenKind::PAIR_MATH
            | TokenKind::PAIR_RAW_FILTER
            | TokenKind::PAIR_HTML_COMMENT
    )
}

pub fn pair_inline(tree: &mut TokenTree, parent: TokenId, extensions: Extensions) {
    pass_verbatim(tree, parent, 0);
    pass_brackets(tree, parent, 0);
    pass_emphasis(tree, parent, 0);
    if extensions.smart() {
        pass_quotes(tree, parent, 0);
    }
}

fn next_of(tree: &TokenTree, id: TokenId) -> Option<TokenId> {
    tree.get(id).next()
}

fn find_forward<F: Fn(&TokenTree, TokenId) -> bool>(
    tree: &TokenTree,
    from: TokenId,
    pred: F,
) -> Option<TokenId> {
    let mut cursor = next_of(tree, from);
    while let Some(id) = cursor {
        if pred(tree, id) {
            return Some(id);
        }
        cursor = next_of(tree, id);
    }
    None
}

//#region Verbatim family

fn pass_verbatim(tree: &mut TokenTree, parent: TokenId, depth: usize) {
    if depth >= RECURSION_LIMIT {
        return;
    }

    let mut cursor = tree.get(parent).child();
    while let Some(current) = cursor {
        let kind = tree.kind(current);
        let wrapped = match kind {
            TokenKind::BACKTICK => {
                let length = tree.get(current).len;
                find_forward(tree, current, |t, id| {
                    t.kind(id) == TokenKind::BACKTICK && t.get(id).len == length
                })
                .map(|close| tree.wrap_pair(parent, current, close, TokenKind::PAIR_BACKTICK))
            }
            TokenKind::MATH_PAREN_OPEN => {
                pair_verbatim_simple(tree, parent, current, TokenKind::MATH_PAREN_CLOSE, TokenKind::PAIR_MATH)
            }
            TokenKind::MATH_BRACKET_OPEN => pair_verbatim_simple(
                tree,
                parent,
                current,
                TokenKind::MATH_BRACKET_CLOSE,
                TokenKind::PAIR_MATH,
            ),
            TokenKind::MATH_DOLLAR_SINGLE | TokenKind::MATH_DOLLAR_DOUBLE
                if tree.get(current).can_open() =>
            {
                find_forward(tree, current, |t, id| {
                    t.kind(id) == kind && t.get(id).can_close()
                })
                .map(|close| tree.wrap_pair(parent, current, close, TokenKind::PAIR_MATH))
            }
            TokenKind::CRITIC_ADD_OPEN => pair_verbatim_simple(
                tree,
                parent,
                current,
                TokenKind::CRITIC_ADD_CLOSE,
                TokenKind::PAIR_CRITIC_ADD,
            ),
            TokenKind::CRITIC_DEL_OPEN => pair_verbatim_simple(
                tree,
                parent,
                current,
                TokenKind::CRITIC_DEL_CLOSE,
                TokenKind::PAIR_CRITIC_DEL,
            ),
            TokenKind::CRITIC_COM_OPEN => pair_verbatim_simple(
                tree,
                parent,
                current,
                TokenKind::CRITIC_COM_CLOSE,
                TokenKind::PAIR_CRITIC_COM,
            ),
            TokenKind::CRITIC_HI_OPEN => pair_verbatim_simple(
                tree,
                parent,
                current,
                TokenKind::CRITIC_HI_CLOSE,
                TokenKind::PAIR_CRITIC_HI,
            ),
            TokenKind::CRITIC_SUB_OPEN => pair_critic_substitution(tree, parent, current),
            TokenKind::HTML_COMMENT_START => pair_verbatim_simple(
                tree,
                parent,
                current,
                TokenKind::HTML_COMMENT_STOP,
                TokenKind::PAIR_HTML_COMMENT,
            ),
            _ => None,
        };

        cursor = match wrapped {
            Some(pair) => next_of(tree, pair),
            None => next_of(tree, current),
        };
    }

    // CriticMarkup interiors still carry ordinary inline content.
    for child in tree.child_ids(parent) {
        if matches!(
            tree.kind(child),
            TokenKind::PAIR_CRITIC_ADD
                | TokenKind::PAIR_CRITIC_DEL
                | TokenKind::PAIR_CRITIC_COM
                | TokenKind::PAIR_CRITIC_HI
                | TokenKind::PAIR_CRITIC_SUB_ADD
                | TokenKind::PAIR_CRITIC_SUB_DEL
        ) {
            pass_verbatim(tree, child, depth + 1);
        }
    }
}

fn pair_verbatim_simple(
    tree: &mut TokenTree,
    parent: TokenId,
    open: TokenId,
    close_kind: TokenKind,
    pair_kind: TokenKind,
) -> Option<TokenId> {
    find_forward(tree, open, |t, id| t.kind(id) == close_kind)
        .map(|close| tree.wrap_pair(parent, open, close, pair_kind))
}

/// `{~~deleted~>added~~}`: the opener pairs with the first divider half and
/// the second divider half pairs with the closer, producing two sibling
/// pairs that the renderer treats as a deletion plus an addition.
fn pair_critic_substitution(
    tree: &mut TokenTree,
    parent: TokenId,
    open: TokenId,
) -> Option<TokenId> {
    let div_a = find_forward(tree, open, |t, id| {
        t.kind(id) == TokenKind::CRITIC_SUB_DIV_A
    })?;
    let deleted = tree.wrap_pair(parent, open, div_a, TokenKind::PAIR_CRITIC_SUB_DEL);
    let div_b = next_of(tree, deleted)?;
    if tree.kind(div_b) != TokenKind::CRITIC_SUB_DIV_B {
        return Some(deleted);
    }
    let close = find_forward(tree, div_b, |t, id| {
        t.kind(id) == TokenKind::CRITIC_SUB_CLOSE
    })?;
    Some(tree.wrap_pair(parent, div_b, close, TokenKind::PAIR_CRITIC_SUB_ADD))
}

//#endregion

//#region Bracket family

fn opener_pair_kind(kind: TokenKind) -> Option<TokenKind> {
    Some(match kind {
        TokenKind::BRACKET_LEFT => TokenKind::PAIR_BRACKET,
        TokenKind::BRACKET_IMAGE_LEFT => TokenKind::PAIR_BRACKET_IMAGE,
        TokenKind::BRACKET_FOOTNOTE_LEFT => TokenKind::PAIR_BRACKET_FOOTNOTE,
        TokenKind::BRACKET_CITATION_LEFT => TokenKind::PAIR_BRACKET_CITATION,
        TokenKind::BRACKET_GLOSSARY_LEFT => TokenKind::PAIR_BRACKET_GLOSSARY,
        TokenKind::BRACKET_ABBREVIATION_LEFT => TokenKind::PAIR_BRACKET_ABBREVIATION,
        TokenKind::BRACKET_VARIABLE_LEFT => TokenKind::PAIR_BRACKET_VARIABLE,
        TokenKind::PAREN_LEFT => TokenKind::PAIR_PAREN,
        TokenKind::ANGLE_LEFT => TokenKind::PAIR_ANGLE,
        TokenKind::BRACE_DOUBLE_LEFT => TokenKind::PAIR_BRACE,
        TokenKind::RAW_FILTER_LEFT => TokenKind::PAIR_RAW_FILTER,
        _ => return None,
    })
}

/// The closer each opener kind accepts.
fn closes(opener: TokenKind, closer: TokenKind) -> bool {
    match closer {
        TokenKind::BRACKET_RIGHT => matches!(
            opener,
            TokenKind::BRACKET_LEFT
                | TokenKind::BRACKET_IMAGE_LEFT
                | TokenKind::BRACKET_FOOTNOTE_LEFT
                | TokenKind::BRACKET_CITATION_LEFT
                | TokenKind::BRACKET_GLOSSARY_LEFT
                | TokenKind::BRACKET_ABBREVIATION_LEFT
                | TokenKind::BRACKET_VARIABLE_LEFT
        ),
        TokenKind::PAREN_RIGHT => opener == TokenKind::PAREN_LEFT,
        TokenKind::ANGLE_RIGHT => opener == TokenKind::ANGLE_LEFT,
        TokenKind::BRACE_DOUBLE_RIGHT => opener == TokenKind::BRACE_DOUBLE_LEFT,
        TokenKind::TEXT_BRACE_RIGHT => opener == TokenKind::RAW_FILTER_LEFT,
        _ => false,
    }
}

fn pass_brackets(tree: &mut TokenTree, parent: TokenId, depth: usize) {
    if depth >= RECURSION_LIMIT {
        return;
    }

    let mut stack: Vec<TokenId> = Vec::new();
    let mut cursor = tree.get(parent).child();
    while let Some(current) = cursor {
        let kind = tree.kind(current);
        if opener_pair_kind(kind).is_some() {
            stack.push(current);
            cursor = next_of(tree, current);
            continue;
        }

        // Only the top of the stack is a legal match; a mismatched closer
        // stays literal.
        let top_matches = stack
            .last()
            .is_some_and(|&open| closes(tree.kind(open), kind));
        if top_matches {
            let open = stack.pop().unwrap();
            let pair_kind = opener_pair_kind(tree.kind(open)).unwrap();
            let pair = tree.wrap_pair(parent, open, current, pair_kind);
            cursor = next_of(tree, pair);
        } else {
            cursor = next_of(tree, current);
        }
    }

    for child in tree.child_ids(parent) {
        let kind = tree.kind(child);
        if matches!(
            kind,
            TokenKind::PAIR_CRITIC_ADD
                | TokenKind::PAIR_CRITIC_DEL
                | TokenKind::PAIR_CRITIC_COM
                | TokenKind::PAIR_CRITIC_HI
                | TokenKind::PAIR_CRITIC_SUB_ADD
                | TokenKind::PAIR_CRITIC_SUB_DEL
        ) {
            pass_brackets(tree, child, depth + 1);
        }
    }
}

//#endregion

//#region Emphasis family

struct DelimiterRun {
    kind: TokenKind,
    tokens: Vec<TokenId>,
    /// Remaining unconsumed range within `tokens`.
    lo: usize,
    hi: usize,
    can_open: bool,
    can_close: bool,
    active: bool,
}

impl DelimiterRun {
    fn remaining(&self) -> usize {
        self.hi - self.lo
    }
}

fn pass_emphasis(tree: &mut TokenTree, parent: TokenId, depth: usize) {
    if depth >= RECURSION_LIMIT {
        return;
    }

    let mut runs: Vec<DelimiterRun> = Vec::new();
    let mut cursor = tree.get(parent).child();
    while let Some(current) = cursor {
        let kind = tree.kind(current);
        let token = tree.get(current);
        match kind {
            TokenKind::STAR | TokenKind::UL => {
                let start = token.start;
                let can_open = token.can_open();
                let can_close = token.can_close();
                match runs.last_mut() {
                    Some(last)
                        if last.kind == kind
                            && last.active
                            && tree.get(*last.tokens.last().unwrap()).end() == start =>
                    {
                        last.tokens.push(current);
                        last.hi += 1;
                    }
                    _ => runs.push(DelimiterRun {
                        kind,
                        tokens: vec![current],
                        lo: 0,
                        hi: 1,
                        can_open,
                        can_close,
                        active: true,
                    }),
                }
            }
            TokenKind::SUBSCRIPT | TokenKind::SUPERSCRIPT => runs.push(DelimiterRun {
                kind,
                tokens: vec![current],
                lo: 0,
                hi: 1,
                can_open: token.can_open(),
                can_close: token.can_close(),
                active: true,
            }),
            _ => {}
        }
        cursor = next_of(tree, current);
    }

    process_emphasis_runs(tree, parent, &mut runs);

    for child in tree.child_ids(parent) {
        let kind = tree.kind(child);
        if kind.is_pair() && !is_verbatim_pair(kind) {
            pass_emphasis(tree, child, depth + 1);
        }
    }
}

/// The delimiter-stack match: walk closers left to right, and for each scan
/// backwards for the nearest compatible opener, consuming up to two
/// characters per round (strong before emphasis).
fn process_emphasis_runs(tree: &mut TokenTree, parent: TokenId, runs: &mut Vec<DelimiterRun>) {
    for closer_index in 0..runs.len() {
        if !runs[closer_index].can_close || !runs[closer_index].active {
            continue;
        }

        for opener_index in (0..closer_index).rev() {
            {
                let opener = &runs[opener_index];
                let closer = &runs[closer_index];
                if !opener.active
                    || !opener.can_open
                    || opener.kind != closer.kind
                    || opener.remaining() == 0
                {
                    continue;
                }
            }

            if matches!(
                runs[closer_index].kind,
                TokenKind::SUBSCRIPT | TokenKind::SUPERSCRIPT
            ) {
                match_script_pair(tree, parent, runs, opener_index, closer_index);
            } else {
                if !emphasis_may_match(&runs[opener_index], &runs[closer_index]) {
                    continue;
                }
                match_emphasis_runs(tree, parent, runs, opener_index, closer_index);
            }

            for between in opener_index + 1..closer_index {
                runs[between].active = false;
            }

            if runs[closer_index].remaining() == 0 {
                runs[closer_index].active = false;
                break;
            }
        }
    }
}

/// "If one of the delimiters can both open and close, the sum of the run
/// lengths must not be a multiple of 3 unless both are."
fn emphasis_may_match(opener: &DelimiterRun, closer: &DelimiterRun) -> bool {
    if opener.can_open && opener.can_close || closer.can_open && closer.can_close {
        let total = opener.remaining() + closer.remaining();
        if total % 3 == 0 && (opener.remaining() % 3 != 0 || closer.remaining() % 3 != 0) {
            return false;
        }
    }
    true
}

fn match_script_pair(
    tree: &mut TokenTree,
    parent: TokenId,
    runs: &mut [DelimiterRun],
    opener_index: usize,
    closer_index: usize,
) {
    let pair_kind = if runs[opener_index].kind == TokenKind::SUBSCRIPT {
        TokenKind::PAIR_SUBSCRIPT
    } else {
        TokenKind::PAIR_SUPERSCRIPT
    };
    let open = runs[opener_index].tokens[0];
    let close = runs[closer_index].tokens[0];
    tree.wrap_pair(parent, open, close, pair_kind);
    runs[opener_index].hi = runs[opener_index].lo;
    runs[opener_index].active = false;
    runs[closer_index].hi = runs[closer_index].lo;
}

fn match_emphasis_runs(
    tree: &mut TokenTree,
    parent: TokenId,
    runs: &mut [DelimiterRun],
    opener_index: usize,
    closer_index: usize,
) {
    loop {
        let available = std::cmp::min(
            runs[opener_index].remaining(),
            runs[closer_index].remaining(),
        );
        if available == 0 {
            break;
        }
        let consume = std::cmp::min(2, available);
        let (open_retag, close_retag, pair_kind) = if consume == 2 {
            (
                TokenKind::STRONG_START,
                TokenKind::STRONG_STOP,
                TokenKind::PAIR_STRONG,
            )
        } else {
            (
                TokenKind::EMPH_START,
                TokenKind::EMPH_STOP,
                TokenKind::PAIR_EMPH,
            )
        };

        let first = runs[opener_index].tokens[runs[opener_index].hi - consume];
        let last = runs[closer_index].tokens[runs[closer_index].lo + consume - 1];
        for offset in 0..consume {
            let open_token = runs[opener_index].tokens[runs[opener_index].hi - consume + offset];
            let close_token = runs[closer_index].tokens[runs[closer_index].lo + offset];
            tree.set_kind(open_token, open_retag);
            tree.set_kind(close_token, close_retag);
            tree.remove_flags(open_token, TokenFlags::UNMATCHED);
            tree.remove_flags(close_token, TokenFlags::UNMATCHED);
        }
        tree.wrap_pair(parent, first, last, pair_kind);
        runs[opener_index].hi -= consume;
        runs[closer_index].lo += consume;
    }

    if runs[opener_index].remaining() == 0 {
        runs[opener_index].active = false;
    }
}

//#endregion

//#region Quote family

fn pass_quotes(tree: &mut TokenTree, parent: TokenId, depth: usize) {
    if depth >= RECURSION_LIMIT {
        return;
    }

    let mut stack: Vec<(TokenKind, TokenId)> = Vec::new();
    let mut cursor = tree.get(parent).child();
    while let Some(current) = cursor {
        let kind = tree.kind(current);
        if matches!(kind, TokenKind::QUOTE_SINGLE | TokenKind::QUOTE_DOUBLE) {
            let token = tree.get(current);
            let pair_kind = if kind == TokenKind::QUOTE_SINGLE {
                TokenKind::PAIR_QUOTE_SINGLE
            } else {
                TokenKind::PAIR_QUOTE_DOUBLE
            };

            let matching = if token.can_close() {
                stack.iter().rposition(|&(open_kind, _)| open_kind == kind)
            } else {
                None
            };
            match matching {
                Some(position) => {
                    let (_, open) = stack[position];
                    // Anything opened inside the span can no longer match.
                    stack.truncate(position);
                    let pair = tree.wrap_pair(parent, open, current, pair_kind);
                    cursor = next_of(tree, pair);
                    continue;
                }
                None if token.can_open() => stack.push((kind, current)),
                None => {}
            }
        }
        cursor = next_of(tree, current);
    }

    for child in tree.child_ids(parent) {
        let kind = tree.kind(child);
        if kind.is_pair() && !is_verbatim_pair(kind) {
            pass_quotes(tree, child, depth + 1);
        }
    }
}

//#endregion

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inline::lexer::tokenize;
    use mmd_syntax::SourceText;

    fn pair_text(text: &str) -> (TokenTree, TokenId) {
        let source = SourceText::new(text);
        let mut tree = TokenTree::new();
        let parent = tree.alloc(TokenKind::BLOCK_PARA, 0, text.len());
        let mut lexed = Vec::new();
        tokenize(&source, 0, text.len(), Extensions::standard(), &mut lexed);
        for token in &lexed {
            let id = tree.alloc(token.kind, token.start, token.len);
            tree.add_flags(id, token.flags);
            tree.append_child(parent, id);
        }
        pair_inline(&mut tree, parent, Extensions::standard());
        (tree, parent)
    }

    fn kinds(tree: &TokenTree, parent: TokenId) -> Vec<TokenKind> {
        tree.children(parent).map(|id| tree.kind(id)).collect()
    }

    #[test]
    fn single_emphasis() {
        let (tree, parent) = pair_text("*hi*");
        assert_eq!(kinds(&tree, parent), vec![TokenKind::PAIR_EMPH]);
        let pair = tree.child_ids(parent)[0];
        let children = tree.child_ids(pair);
        assert_eq!(tree.kind(children[0]), TokenKind::EMPH_START);
        assert_eq!(tree.kind(*children.last().unwrap()), TokenKind::EMPH_STOP);
        assert_eq!(tree.get(children[0]).mate(), Some(*children.last().unwrap()));
    }

    #[test]
    fn strong_emphasis() {
        let (tree, parent) = pair_text("**hi**");
        assert_eq!(kinds(&tree, parent), vec![TokenKind::PAIR_STRONG]);
    }

    #[test]
    fn triple_becomes_nested() {
        let (tree, parent) = pair_text("***hi***");
        assert_eq!(kinds(&tree, parent), vec![TokenKind::PAIR_EMPH]);
        let outer = tree.child_ids(parent)[0];
        let inner_kinds = kinds(&tree, outer);
        assert!(inner_kinds.contains(&TokenKind::PAIR_STRONG));
    }

    #[test]
    fn unmatched_star_stays_literal() {
        let (tree, parent) = pair_text("a * b");
        let all = kinds(&tree, parent);
        assert!(all.contains(&TokenKind::STAR));
        assert!(!all.contains(&TokenKind::PAIR_EMPH));
    }

    #[test]
    fn adjacent_emphasis_and_strong() {
        let (tree, parent) = pair_text("*hi***yes**");
        let all = kinds(&tree, parent);
        assert_eq!(all, vec![TokenKind::PAIR_EMPH, TokenKind::PAIR_STRONG]);
    }

    #[test]
    fn code_span_equal_lengths() {
        let (tree, parent) = pair_text("`code`");
        assert_eq!(kinds(&tree, parent), vec![TokenKind::PAIR_BACKTICK]);

        let (tree, parent) = pair_text("``a`b``");
        assert_eq!(kinds(&tree, parent), vec![TokenKind::PAIR_BACKTICK]);
        let pair = tree.child_ids(parent)[0];
        // The single backtick stays inside as literal content.
        assert!(kinds(&tree, pair).contains(&TokenKind::BACKTICK));
    }

    #[test]
    fn mismatched_backtick_lengths_stay_flat() {
        let (tree, parent) = pair_text("``code`");
        assert!(!kinds(&tree, parent).contains(&TokenKind::PAIR_BACKTICK));
    }

    #[test]
    fn bracket_then_paren() {
        let (tree, parent) = pair_text("[text](url)");
        assert_eq!(
            kinds(&tree, parent),
            vec![TokenKind::PAIR_BRACKET, TokenKind::PAIR_PAREN]
        );
    }

    #[test]
    fn nested_brackets() {
        let (tree, parent) = pair_text("[[inner]]");
        assert_eq!(kinds(&tree, parent), vec![TokenKind::PAIR_BRACKET]);
        let outer = tree.child_ids(parent)[0];
        assert!(kinds(&tree, outer).contains(&TokenKind::PAIR_BRACKET));
    }

    #[test]
    fn footnote_bracket_kind() {
        let (tree, parent) = pair_text("[^note]");
        assert_eq!(kinds(&tree, parent), vec![TokenKind::PAIR_BRACKET_FOOTNOTE]);
    }

    #[test]
    fn critic_substitution_makes_two_pairs() {
        let (tree, parent) = pair_text("{~~old~>new~~}");
        assert_eq!(
            kinds(&tree, parent),
            vec![
                TokenKind::PAIR_CRITIC_SUB_DEL,
                TokenKind::PAIR_CRITIC_SUB_ADD
            ]
        );
    }

    #[test]
    fn emphasis_inside_link_label() {
        let (tree, parent) = pair_text("[*em*](x)");
        let bracket = tree.child_ids(parent)[0];
        assert!(kinds(&tree, bracket).contains(&TokenKind::PAIR_EMPH));
    }

    #[test]
    fn math_pairs() {
        let (tree, parent) = pair_text("\\(x^2\\)");
        assert_eq!(kinds(&tree, parent)[0], TokenKind::PAIR_MATH);

        let (tree, parent) = pair_text("$x$");
        assert_eq!(kinds(&tree, parent), vec![TokenKind::PAIR_MATH]);
    }

    #[test]
    fn double_quotes_pair() {
        let (tree, parent) = pair_text("\"Hello,\" she said.");
        assert_eq!(kinds(&tree, parent)[0], TokenKind::PAIR_QUOTE_DOUBLE);
    }

    #[test]
    fn deep_bracket_nesting_is_bounded() {
        let mut text = String::new();
        for _ in 0..2000 {
            text.push('[');
        }
        text.push_str("x");
        for _ in 0..2000 {
            text.push(']');
        }
        // Must not panic or overflow.
        let (tree, parent) = pair_text(&text);
        assert!(tree.get(parent).child().is_some());
    }
}
