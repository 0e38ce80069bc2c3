//! Toolbar and text commands as pure functions of `(tree, selection, command)`.
//!
//! Nothing here touches a live editor; each command clones the tree, applies
//! itself and returns the normalized result with the selection to show next.
//! Selections address textblocks by document order, and wrapping or lifting
//! blocks never changes that order, so a selection survives block commands.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

use super::inline;
use super::selection::{Selection, TextPos};
use crate::docs::content::{
    Block, CodeBlockAttrs, ContentTree, ListItem, Mark, OrderedListAttrs, MAX_HEADING_LEVEL,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("Document is read-only")]
    ReadOnly,
    #[error("A link needs a URL")]
    EmptyHref,
    #[error("Heading level {0} is not supported")]
    InvalidHeadingLevel(u8),
    #[error("Text edits cannot span several blocks")]
    CrossBlockRange,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "value", rename_all = "snake_case")]
pub enum Command {
    ToggleBold,
    ToggleItalic,
    ToggleStrike,
    ToggleCode,
    ToggleHeading(u8),
    SetParagraph,
    ToggleBulletList,
    ToggleOrderedList,
    ToggleBlockquote,
    ToggleCodeBlock,
    InsertHorizontalRule,
    SetLink(String),
    UnsetLink,
    InsertText(String),
    DeleteSelection,
    SplitBlock,
}

impl Command {
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            Command::InsertText(_) | Command::DeleteSelection | Command::SplitBlock
        )
    }
}

/// Result of a command: the new tree and where the selection lands
#[derive(Debug, Clone, PartialEq)]
pub struct Edit {
    pub tree: ContentTree,
    pub selection: Selection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Bullet,
    Ordered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextblockKind {
    Paragraph,
    Heading(u8),
    Code,
}

pub fn apply(tree: &ContentTree, selection: Selection, command: &Command) -> Result<Edit, EditError> {
    let mut tree = tree.clone();
    tree.normalize();
    let selection = selection.clamp(&tree);

    let selection = match command {
        Command::ToggleBold => toggle_mark(&mut tree, selection, Mark::Bold),
        Command::ToggleItalic => toggle_mark(&mut tree, selection, Mark::Italic),
        Command::ToggleStrike => toggle_mark(&mut tree, selection, Mark::Strike),
        Command::ToggleCode => toggle_mark(&mut tree, selection, Mark::Code),
        Command::ToggleHeading(level) => toggle_heading(&mut tree, selection, *level)?,
        Command::SetParagraph => {
            set_textblocks(&mut tree, selection, TextblockKind::Paragraph);
            selection
        }
        Command::ToggleCodeBlock => toggle_textblock(&mut tree, selection, TextblockKind::Code),
        Command::ToggleBulletList => toggle_list(&mut tree, selection, ListKind::Bullet),
        Command::ToggleOrderedList => toggle_list(&mut tree, selection, ListKind::Ordered),
        Command::ToggleBlockquote => toggle_blockquote(&mut tree, selection),
        Command::InsertHorizontalRule => insert_horizontal_rule(&mut tree, selection),
        Command::SetLink(href) => set_link(&mut tree, selection, href)?,
        Command::UnsetLink => unset_link(&mut tree, selection),
        Command::InsertText(text) => insert_text(&mut tree, selection, text)?,
        Command::DeleteSelection => delete_selection(&mut tree, selection)?,
        Command::SplitBlock => split_block(&mut tree, selection)?,
    };

    tree.normalize();
    let selection = selection.clamp(&tree);
    Ok(Edit { tree, selection })
}

// ==================== Marks ====================

/// Per-textblock `(ordinal, from, to)` spans covered by the selection
fn block_spans(tree: &ContentTree, selection: Selection) -> Vec<(usize, usize, usize)> {
    let (from, to) = (selection.from(), selection.to());
    tree.textblocks()
        .iter()
        .enumerate()
        .skip(from.block)
        .take(to.block - from.block + 1)
        .filter_map(|(ordinal, block)| {
            let width = inline::len(block.inline_content()?);
            let start = if ordinal == from.block { from.offset } else { 0 };
            let end = if ordinal == to.block { to.offset } else { width };
            Some((ordinal, start, end))
        })
        .collect()
}

fn same_kind(a: &Mark, b: &Mark) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

fn mark_active(tree: &ContentTree, selection: Selection, mark: &Mark) -> bool {
    let blocks = tree.textblocks();
    let spans: Vec<_> = block_spans(tree, selection)
        .into_iter()
        .filter(|(ordinal, start, end)| start < end && !matches!(blocks[*ordinal], Block::CodeBlock { .. }))
        .collect();

    !spans.is_empty()
        && spans.iter().all(|(ordinal, start, end)| {
            blocks[*ordinal]
                .inline_content()
                .is_some_and(|inlines| inline::all_have(inlines, *start, *end, |m| same_kind(m, mark)))
        })
}

/// Code blocks never carry marks and are skipped
fn for_each_span(
    tree: &mut ContentTree,
    spans: &[(usize, usize, usize)],
    mut f: impl FnMut(&mut Vec<Mark>),
) {
    let mut blocks = tree.textblocks_mut();
    for (ordinal, start, end) in spans {
        let block = &mut blocks[*ordinal];
        if matches!(block, Block::CodeBlock { .. }) {
            continue;
        }
        if let Some(inlines) = block.inline_content_mut() {
            inline::map_marks(inlines, *start, *end, &mut f);
        }
    }
}

fn toggle_mark(tree: &mut ContentTree, selection: Selection, mark: Mark) -> Selection {
    if selection.is_collapsed() {
        return selection;
    }

    let active = mark_active(tree, selection, &mark);
    let spans = block_spans(tree, selection);
    for_each_span(tree, &spans, |marks| {
        marks.retain(|m| !same_kind(m, &mark));
        if !active {
            marks.push(mark.clone());
        }
    });
    selection
}

// ==================== Links ====================

fn scheme_pattern() -> &'static Regex {
    static SCHEME: OnceLock<Regex> = OnceLock::new();
    SCHEME.get_or_init(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.\-]*:").expect("valid scheme pattern"))
}

/// Trim and default to https when no scheme is given; relative and fragment links pass through
pub fn normalize_href(href: &str) -> Result<String, EditError> {
    let href = href.trim();
    if href.is_empty() {
        return Err(EditError::EmptyHref);
    }
    if scheme_pattern().is_match(href) || href.starts_with('/') || href.starts_with('#') {
        Ok(href.to_string())
    } else {
        Ok(format!("https://{}", href))
    }
}

/// Selection widened to the whole link when the cursor or range sits inside one
fn link_range(tree: &ContentTree, selection: Selection) -> Selection {
    if !selection.is_single_block() {
        return selection;
    }
    let (from, to) = (selection.from(), selection.to());
    let extent = tree.textblocks()[from.block]
        .inline_content()
        .and_then(|inlines| inline::link_extent(inlines, from.offset));

    match extent {
        Some((start, end, _)) if start <= from.offset && to.offset <= end => Selection::range(
            TextPos::new(from.block, start),
            TextPos::new(from.block, end),
        ),
        _ => selection,
    }
}

fn set_link(tree: &mut ContentTree, selection: Selection, href: &str) -> Result<Selection, EditError> {
    let href = normalize_href(href)?;
    let range = link_range(tree, selection);
    if range.is_collapsed() {
        return Ok(selection);
    }

    let spans = block_spans(tree, range);
    for_each_span(tree, &spans, |marks| {
        marks.retain(|m| !m.is_link());
        marks.push(Mark::link(href.clone()));
    });
    Ok(range)
}

fn unset_link(tree: &mut ContentTree, selection: Selection) -> Selection {
    let range = link_range(tree, selection);
    if range.is_collapsed() {
        return selection;
    }

    let spans = block_spans(tree, range);
    for_each_span(tree, &spans, |marks| marks.retain(|m| !m.is_link()));
    range
}

// ==================== Textblock types ====================

fn kind_of(block: &Block) -> Option<TextblockKind> {
    match block {
        Block::Paragraph { .. } => Some(TextblockKind::Paragraph),
        Block::Heading { attrs, .. } => Some(TextblockKind::Heading(attrs.level)),
        Block::CodeBlock { .. } => Some(TextblockKind::Code),
        _ => None,
    }
}

fn convert_textblock(block: &mut Block, kind: TextblockKind) {
    let Some(inlines) = block.inline_content_mut() else {
        return;
    };
    let content = std::mem::take(inlines);
    *block = match kind {
        TextblockKind::Paragraph => Block::paragraph(content),
        TextblockKind::Heading(level) => Block::heading(level, content),
        TextblockKind::Code => Block::CodeBlock {
            attrs: CodeBlockAttrs::default(),
            content: inline::strip_to_plain(content),
        },
    };
}

fn selected_ordinals(selection: Selection) -> std::ops::RangeInclusive<usize> {
    selection.from().block..=selection.to().block
}

fn all_selected_are(tree: &ContentTree, selection: Selection, kind: TextblockKind) -> bool {
    let blocks = tree.textblocks();
    selected_ordinals(selection).all(|ordinal| blocks.get(ordinal).and_then(|b| kind_of(b)) == Some(kind))
}

fn set_textblocks(tree: &mut ContentTree, selection: Selection, kind: TextblockKind) {
    let mut blocks = tree.textblocks_mut();
    for ordinal in selected_ordinals(selection) {
        if let Some(block) = blocks.get_mut(ordinal) {
            if kind_of(block) != Some(kind) {
                convert_textblock(block, kind);
            }
        }
    }
}

/// Blocks already of `kind` revert to paragraphs; anything else becomes `kind`
fn toggle_textblock(tree: &mut ContentTree, selection: Selection, kind: TextblockKind) -> Selection {
    let target = if all_selected_are(tree, selection, kind) {
        TextblockKind::Paragraph
    } else {
        kind
    };
    set_textblocks(tree, selection, target);
    selection
}

fn toggle_heading(tree: &mut ContentTree, selection: Selection, level: u8) -> Result<Selection, EditError> {
    if level == 0 || level > MAX_HEADING_LEVEL {
        return Err(EditError::InvalidHeadingLevel(level));
    }
    Ok(toggle_textblock(tree, selection, TextblockKind::Heading(level)))
}

// ==================== Wrapping ====================

/// Index of the top-level block holding textblock `ordinal`
fn top_level_index(tree: &ContentTree, ordinal: usize) -> usize {
    let mut seen = 0;
    let mut last_with_text = 0;
    for (i, block) in tree.content.iter().enumerate() {
        let count = block.textblock_count();
        if count > 0 {
            if ordinal < seen + count {
                return i;
            }
            last_with_text = i;
        }
        seen += count;
    }
    last_with_text
}

fn textblocks_before(tree: &ContentTree, index: usize) -> usize {
    tree.content[..index].iter().map(Block::textblock_count).sum()
}

fn list_kind(block: &Block) -> Option<ListKind> {
    match block {
        Block::BulletList { .. } => Some(ListKind::Bullet),
        Block::OrderedList { .. } => Some(ListKind::Ordered),
        _ => None,
    }
}

fn make_list(kind: ListKind, items: Vec<ListItem>, start: u32) -> Block {
    match kind {
        ListKind::Bullet => Block::BulletList { content: items },
        ListKind::Ordered => Block::OrderedList {
            attrs: OrderedListAttrs { start },
            content: items,
        },
    }
}

fn into_list_parts(block: Block) -> (Vec<ListItem>, u32) {
    match block {
        Block::BulletList { content } => (content, 1),
        Block::OrderedList { attrs, content } => (content, attrs.start),
        other => (vec![ListItem::new(vec![other])], 1),
    }
}

fn toggle_list(tree: &mut ContentTree, selection: Selection, kind: ListKind) -> Selection {
    let first = top_level_index(tree, selection.from().block);
    let last = top_level_index(tree, selection.to().block);

    if first == last && list_kind(&tree.content[first]) == Some(kind) {
        lift_list_items(tree, first, selection);
        return selection;
    }

    let range: Vec<Block> = tree.content.drain(first..=last).collect();
    let replacement = if range.iter().all(|b| list_kind(b) == Some(kind)) {
        range
            .into_iter()
            .flat_map(|b| into_list_parts(b).0)
            .flat_map(|item| item.content)
            .collect()
    } else if range.iter().all(|b| list_kind(b).is_some()) {
        range
            .into_iter()
            .map(|b| {
                let (items, start) = into_list_parts(b);
                make_list(kind, items, start)
            })
            .collect()
    } else {
        let items = range.into_iter().flat_map(|b| into_list_parts(b).0).collect();
        vec![make_list(kind, items, 1)]
    };

    tree.content.splice(first..first, replacement);
    selection
}

/// Lift only the items the selection touches out of a single list,
/// keeping the items around them as lists of their own
fn lift_list_items(tree: &mut ContentTree, index: usize, selection: Selection) {
    let offset = textblocks_before(tree, index);
    let block = tree.content.remove(index);
    let kind = list_kind(&block);
    let (items, start) = into_list_parts(block);

    let mut seen = offset;
    let mut first_item = None;
    let mut last_item = 0;
    for (i, item) in items.iter().enumerate() {
        let count: usize = item.content.iter().map(Block::textblock_count).sum();
        let touches = selection.from().block < seen + count && selection.to().block >= seen;
        if touches {
            first_item.get_or_insert(i);
            last_item = i;
        }
        seen += count;
    }
    let first_item = first_item.unwrap_or(0);
    let last_item = last_item.max(first_item);

    let mut items = items;
    let after: Vec<ListItem> = items.drain(last_item + 1..).collect();
    let lifted: Vec<ListItem> = items.drain(first_item..).collect();
    let before = items;

    let kind = kind.unwrap_or(ListKind::Bullet);
    let mut replacement = Vec::new();
    if !before.is_empty() {
        replacement.push(make_list(kind, before, start));
    }
    replacement.extend(lifted.into_iter().flat_map(|item| item.content));
    if !after.is_empty() {
        let skipped = u32::try_from(last_item + 1).unwrap_or(u32::MAX);
        replacement.push(make_list(kind, after, start.saturating_add(skipped)));
    }

    tree.content.splice(index..index, replacement);
}

fn toggle_blockquote(tree: &mut ContentTree, selection: Selection) -> Selection {
    let first = top_level_index(tree, selection.from().block);
    let last = top_level_index(tree, selection.to().block);

    let range: Vec<Block> = tree.content.drain(first..=last).collect();
    let unwrap = range.iter().all(|b| matches!(b, Block::Blockquote { .. }));

    let inner: Vec<Block> = range
        .into_iter()
        .flat_map(|b| match b {
            Block::Blockquote { content } => content,
            other => vec![other],
        })
        .collect();

    let replacement = if unwrap {
        inner
    } else {
        vec![Block::Blockquote { content: inner }]
    };

    tree.content.splice(first..first, replacement);
    selection
}

fn insert_horizontal_rule(tree: &mut ContentTree, selection: Selection) -> Selection {
    let index = top_level_index(tree, selection.to().block);
    tree.content.insert(index + 1, Block::HorizontalRule);

    let follows_with_text = tree
        .content
        .get(index + 2)
        .is_some_and(|b| b.textblock_count() > 0);
    if !follows_with_text {
        tree.content.insert(index + 2, Block::paragraph(Vec::new()));
    }

    Selection::cursor(textblocks_before(tree, index + 1), 0)
}

// ==================== Text ====================

fn single_block(selection: Selection) -> Result<(), EditError> {
    if selection.is_single_block() {
        Ok(())
    } else {
        Err(EditError::CrossBlockRange)
    }
}

fn insert_text(tree: &mut ContentTree, selection: Selection, text: &str) -> Result<Selection, EditError> {
    single_block(selection)?;
    let (from, to) = (selection.from(), selection.to());

    let mut blocks = tree.textblocks_mut();
    let Some(block) = blocks.get_mut(from.block) else {
        return Ok(selection);
    };
    let code = matches!(block, Block::CodeBlock { .. });
    let Some(inlines) = block.inline_content_mut() else {
        return Ok(selection);
    };

    inline::delete_range(inlines, from.offset, to.offset);
    let marks: Vec<Mark> = if code {
        Vec::new()
    } else {
        // links do not grow when typing at their edge
        inline::marks_at(inlines, from.offset)
            .into_iter()
            .filter(|m| !m.is_link())
            .collect()
    };
    inline::insert_text(inlines, from.offset, text, marks, code);

    Ok(Selection::cursor(from.block, from.offset + text.chars().count()))
}

fn delete_selection(tree: &mut ContentTree, selection: Selection) -> Result<Selection, EditError> {
    single_block(selection)?;
    let (mut from, to) = (selection.from(), selection.to());

    if selection.is_collapsed() {
        if from.offset == 0 {
            return Ok(selection);
        }
        from.offset -= 1;
    }

    let mut blocks = tree.textblocks_mut();
    if let Some(inlines) = blocks.get_mut(from.block).and_then(|b| b.inline_content_mut()) {
        inline::delete_range(inlines, from.offset, to.offset);
    }
    Ok(Selection::cursor(from.block, from.offset))
}

fn split_textblock(block: &mut Block, offset: usize) -> Block {
    let content = block.inline_content_mut().map(std::mem::take).unwrap_or_default();
    let (head, tail) = inline::split_at(content, offset);
    let tail_empty = tail.is_empty();

    if let Some(inlines) = block.inline_content_mut() {
        *inlines = head;
    }

    match block {
        Block::Heading { attrs, .. } if !tail_empty => Block::heading(attrs.level, tail),
        _ => Block::paragraph(tail),
    }
}

/// Split textblock `ordinal` among `blocks`; inside a list the item splits too
fn split_in_blocks(blocks: &mut Vec<Block>, ordinal: &mut usize, offset: usize) -> bool {
    let mut k = 0;
    while k < blocks.len() {
        if blocks[k].is_textblock() {
            if *ordinal == 0 {
                let second = split_textblock(&mut blocks[k], offset);
                blocks.insert(k + 1, second);
                return true;
            }
            *ordinal -= 1;
        } else if split_in_container(&mut blocks[k], ordinal, offset) {
            return true;
        }
        k += 1;
    }
    false
}

fn split_in_container(block: &mut Block, ordinal: &mut usize, offset: usize) -> bool {
    match block {
        Block::BulletList { content } | Block::OrderedList { content, .. } => {
            split_in_items(content, ordinal, offset)
        }
        Block::Blockquote { content } => split_in_blocks(content, ordinal, offset),
        _ => false,
    }
}

fn split_in_items(items: &mut Vec<ListItem>, ordinal: &mut usize, offset: usize) -> bool {
    for m in 0..items.len() {
        let mut k = 0;
        while k < items[m].content.len() {
            if items[m].content[k].is_textblock() {
                if *ordinal == 0 {
                    let item = &mut items[m];
                    let second = split_textblock(&mut item.content[k], offset);
                    let mut rest = vec![second];
                    rest.extend(item.content.drain(k + 1..));
                    items.insert(m + 1, ListItem::new(rest));
                    return true;
                }
                *ordinal -= 1;
            } else if split_in_container(&mut items[m].content[k], ordinal, offset) {
                return true;
            }
            k += 1;
        }
    }
    false
}

fn split_block(tree: &mut ContentTree, selection: Selection) -> Result<Selection, EditError> {
    single_block(selection)?;
    let from = selection.from();

    let in_code = matches!(tree.textblocks().get(from.block), Some(Block::CodeBlock { .. }));
    if in_code {
        return insert_text(tree, selection, "\n");
    }

    let collapsed = if selection.is_collapsed() {
        selection
    } else {
        delete_selection(tree, selection)?
    };

    let mut ordinal = from.block;
    if split_in_blocks(&mut tree.content, &mut ordinal, collapsed.from().offset) {
        Ok(Selection::cursor(from.block + 1, 0))
    } else {
        Ok(collapsed)
    }
}
