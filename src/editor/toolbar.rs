use serde::{Deserialize, Serialize};

use super::inline;
use super::selection::Selection;
use crate::docs::content::{Block, ContentTree, Mark};

/// Which toolbar buttons show as active for a selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolbarState {
    pub bold: bool,
    pub italic: bool,
    pub strike: bool,
    pub code: bool,
    /// href of the link under the selection start
    pub link: Option<String>,
    pub heading: Option<u8>,
    pub paragraph: bool,
    pub code_block: bool,
    pub bullet_list: bool,
    pub ordered_list: bool,
    pub blockquote: bool,
}

impl ToolbarState {
    pub fn compute(tree: &ContentTree, selection: Selection) -> Self {
        let selection = selection.clamp(tree);
        let from = selection.from();
        let blocks = tree.textblocks();
        let Some(block) = blocks.get(from.block) else {
            return Self::default();
        };
        let inlines = block.inline_content().map(Vec::as_slice).unwrap_or(&[]);

        let has = |wanted: Mark| -> bool {
            let same = |m: &Mark| std::mem::discriminant(m) == std::mem::discriminant(&wanted);
            if selection.is_collapsed() || !selection.is_single_block() {
                inline::marks_at(inlines, from.offset).iter().any(same)
            } else {
                inline::all_have(inlines, from.offset, selection.to().offset, same)
            }
        };

        let container = enclosing_top_level(tree, from.block);

        Self {
            bold: has(Mark::Bold),
            italic: has(Mark::Italic),
            strike: has(Mark::Strike),
            code: has(Mark::Code),
            link: inline::link_extent(inlines, from.offset).map(|(_, _, attrs)| attrs.href),
            heading: match block {
                Block::Heading { attrs, .. } => Some(attrs.level),
                _ => None,
            },
            paragraph: matches!(block, Block::Paragraph { .. }),
            code_block: matches!(block, Block::CodeBlock { .. }),
            bullet_list: matches!(container, Some(Block::BulletList { .. })),
            ordered_list: matches!(container, Some(Block::OrderedList { .. })),
            blockquote: matches!(container, Some(Block::Blockquote { .. })),
        }
    }
}

fn enclosing_top_level(tree: &ContentTree, ordinal: usize) -> Option<&Block> {
    let mut seen = 0;
    for block in &tree.content {
        let count = block.textblock_count();
        if ordinal < seen + count {
            return Some(block);
        }
        seen += count;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docs::content::{Inline, ListItem};
    use crate::editor::selection::TextPos;

    #[test]
    fn test_toolbar_reflects_marks_and_blocks() {
        let tree = ContentTree::new(vec![
            Block::heading(2, vec![Inline::marked("Bold title", vec![Mark::Bold])]),
            Block::BulletList {
                content: vec![ListItem::new(vec![Block::paragraph(vec![
                    Inline::text("go to "),
                    Inline::marked("site", vec![Mark::link("https://a.io")]),
                ])])],
            },
        ]);

        let heading = ToolbarState::compute(&tree, Selection::cursor(0, 3));
        assert!(heading.bold);
        assert_eq!(heading.heading, Some(2));
        assert!(!heading.bullet_list);

        let item = ToolbarState::compute(&tree, Selection::cursor(1, 7));
        assert!(item.bullet_list);
        assert!(item.paragraph);
        assert_eq!(item.link.as_deref(), Some("https://a.io"));
        assert!(!item.bold);
    }

    #[test]
    fn test_range_marks_require_full_coverage() {
        let tree = ContentTree::new(vec![Block::paragraph(vec![
            Inline::marked("ab", vec![Mark::Italic]),
            Inline::text("c"),
        ])]);

        let partial = Selection::range(TextPos::new(0, 0), TextPos::new(0, 3));
        assert!(!ToolbarState::compute(&tree, partial).italic);

        let covered = Selection::range(TextPos::new(0, 0), TextPos::new(0, 2));
        assert!(ToolbarState::compute(&tree, covered).italic);
    }
}
