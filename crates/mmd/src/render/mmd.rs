//! The MMD emitter: re-emits the document's block structure as MultiMarkdown
//! with canonical blank-line separation. Inline content is copied from the
//! source span of each block, so the output is a near-identity of well-formed
//! input rather than a byte-exact copy.

use mmd_syntax::{TokenId, TokenKind};

use crate::render::{Emitter, ScratchPad};

pub struct MmdEmitter;

impl Emitter for MmdEmitter {
    fn start_complete(&mut self, out: &mut String, scratch: &mut ScratchPad) {
        // Metadata re-emits as a metadata block; handled by the BLOCK_META
        // visit so snippet output stays clean.
        let _ = (out, scratch);
    }

    fn end_complete(&mut self, _out: &mut String, _scratch: &mut ScratchPad) {}

    fn visit(&mut self, out: &mut String, token: TokenId, scratch: &mut ScratchPad) {
        let tree = scratch.engine.tree();
        let kind = tree.kind(token);
        match kind {
            TokenKind::DOCUMENT => self.visit_tree(out, token, scratch),
            TokenKind::BLOCK_EMPTY => {}
            TokenKind::BLOCK_META => {
                scratch.pad(out, 2);
                let mut block = String::new();
                for item in scratch.engine.metadata() {
                    block.push_str(&item.raw_key);
                    block.push_str(": ");
                    block.push_str(&item.value);
                    block.push('\n');
                }
                scratch.write(out, block.trim_end_matches('\n'));
            }
            kind if kind.is_block() => {
                scratch.pad(out, 2);
                let text = self.block_source(token, scratch).to_string();
                scratch.write(out, text.trim_end_matches('\n'));
            }
            _ => {}
        }
    }

    fn emit_note_lists(&mut self, _out: &mut String, _scratch: &mut ScratchPad) {}
}

impl MmdEmitter {
    fn block_source<'s>(&self, block: TokenId, scratch: &'s ScratchPad) -> &'s str {
        let span = scratch.engine.tree().get(block).span();
        scratch.engine.source().slice(span)
    }
}
