//! Metadata block dissection and the keys that change engine behavior.

use mmd_syntax::{SourceText, TokenId, TokenKind, TokenTree};

/// One `key: value` entry. `key` is the normalized form used for lookups;
/// `raw_key` preserves the author's spelling for pass-through output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetaItem {
    pub key: String,
    pub raw_key: String,
    pub value: String,
}

/// Case-fold a metadata key and drop every non-alphanumeric byte, so
/// `Base Header Level`, `baseheaderlevel`, and `base-header-level` collide.
pub fn metadata_key(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || !c.is_ascii())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Split a metadata block into items. Lines that do not carry their own
/// `key:` prefix extend the value of the previous entry.
pub fn parse_meta_block(source: &SourceText, tree: &TokenTree, block: TokenId) -> Vec<MetaItem> {
    let mut items: Vec<MetaItem> = Vec::new();
    for line in tree.children(block) {
        let token = tree.get(line);
        let text = source.slice(token.span());
        if tree.kind(line) == TokenKind::LINE_META {
            let Some(colon) = text.find(':') else { continue };
            let raw_key = text[..colon].trim().to_string();
            let value = text[colon + 1..].trim().to_string();
            items.push(MetaItem {
                key: metadata_key(&raw_key),
                raw_key,
                value,
            });
        } else if let Some(last) = items.last_mut() {
            let continuation = text.trim();
            if !continuation.is_empty() {
                if !last.value.is_empty() {
                    last.value.push(' ');
                }
                last.value.push_str(continuation);
            }
        }
    }
    items
}

/// The keys with a semantic effect on emission, as opposed to keys that only
/// ride along into the document head.
pub fn is_recognized_key(key: &str) -> bool {
    matches!(
        key,
        "baseheaderlevel"
            | "htmlheaderlevel"
            | "latexheaderlevel"
            | "odfheaderlevel"
            | "epubheaderlevel"
            | "language"
            | "quoteslanguage"
            | "latexmode"
            | "bibtex"
            | "css"
            | "htmlheader"
            | "xhtmlheader"
            | "htmlfooter"
            | "title"
            | "author"
            | "date"
            | "copyright"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::parse_document;
    use crate::extensions::Extensions;
    use crate::line::scan_lines;
    use mmd_syntax::TokenTree;

    fn meta_items(text: &str) -> Vec<MetaItem> {
        let source = SourceText::new(text);
        let mut tree = TokenTree::new();
        let lines = scan_lines(&source, &mut tree, Extensions::standard());
        let result = parse_document(&source, &mut tree, lines, Extensions::standard());
        let meta = tree
            .children(result.root)
            .find(|&id| tree.kind(id) == TokenKind::BLOCK_META)
            .expect("document should contain a metadata block");
        parse_meta_block(&source, &tree, meta)
    }

    #[test]
    fn keys_are_normalized() {
        assert_eq!(metadata_key("Base Header Level"), "baseheaderlevel");
        assert_eq!(metadata_key("quotes-language"), "quoteslanguage");
        assert_eq!(metadata_key("Title"), "title");
    }

    #[test]
    fn parses_simple_entries() {
        let items = meta_items("title: My Document\nauthor: A. Writer\n\nBody\n");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].key, "title");
        assert_eq!(items[0].value, "My Document");
        assert_eq!(items[1].raw_key, "author");
    }

    #[test]
    fn continuation_lines_extend_the_value() {
        let items = meta_items("keywords: first,\n    second,\n    third\n\nBody\n");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].value, "first, second, third");
    }

    #[test]
    fn recognized_keys() {
        assert!(is_recognized_key("baseheaderlevel"));
        assert!(is_recognized_key("language"));
        assert!(!is_recognized_key("keywords"));
    }
}
