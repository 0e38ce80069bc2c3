use serde::{Deserialize, Serialize};

use super::inline;
use crate::docs::content::ContentTree;

/// A position inside the `block`-th textblock (document order), `offset` chars in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TextPos {
    pub block: usize,
    pub offset: usize,
}

impl TextPos {
    pub fn new(block: usize, offset: usize) -> Self {
        Self { block, offset }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub anchor: TextPos,
    pub head: TextPos,
}

impl Selection {
    pub fn cursor(block: usize, offset: usize) -> Self {
        let pos = TextPos::new(block, offset);
        Self { anchor: pos, head: pos }
    }

    pub fn range(anchor: TextPos, head: TextPos) -> Self {
        Self { anchor, head }
    }

    /// Whole text of a single textblock
    pub fn block(tree: &ContentTree, block: usize) -> Self {
        let width = tree
            .textblocks()
            .get(block)
            .and_then(|b| b.inline_content())
            .map_or(0, |inlines| inline::len(inlines));
        Self::range(TextPos::new(block, 0), TextPos::new(block, width))
    }

    pub fn from(&self) -> TextPos {
        self.anchor.min(self.head)
    }

    pub fn to(&self) -> TextPos {
        self.anchor.max(self.head)
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.head
    }

    pub fn is_single_block(&self) -> bool {
        self.anchor.block == self.head.block
    }

    /// Pull both ends back inside the tree
    pub fn clamp(&self, tree: &ContentTree) -> Self {
        let blocks = tree.textblocks();
        let clamp_pos = |pos: TextPos| {
            let Some(last) = blocks.len().checked_sub(1) else {
                return TextPos::default();
            };
            let block = pos.block.min(last);
            let width = blocks[block].inline_content().map_or(0, |i| inline::len(i));
            TextPos::new(block, pos.offset.min(width))
        };
        Self {
            anchor: clamp_pos(self.anchor),
            head: clamp_pos(self.head),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docs::content::{Block, Inline};

    #[test]
    fn test_from_to_order_backwards_selection() {
        let sel = Selection::range(TextPos::new(2, 1), TextPos::new(0, 4));
        assert_eq!(sel.from(), TextPos::new(0, 4));
        assert_eq!(sel.to(), TextPos::new(2, 1));
        assert!(!sel.is_collapsed());
        assert!(!sel.is_single_block());
    }

    #[test]
    fn test_clamp() {
        let tree = ContentTree::new(vec![
            Block::paragraph(vec![Inline::text("abc")]),
            Block::paragraph(vec![Inline::text("de")]),
        ]);
        let sel = Selection::range(TextPos::new(0, 10), TextPos::new(7, 7)).clamp(&tree);
        assert_eq!(sel.anchor, TextPos::new(0, 3));
        assert_eq!(sel.head, TextPos::new(1, 2));
    }

    #[test]
    fn test_block_selection() {
        let tree = ContentTree::new(vec![Block::paragraph(vec![Inline::text("hello")])]);
        let sel = Selection::block(&tree, 0);
        assert_eq!(sel.to().offset, 5);
    }
}
