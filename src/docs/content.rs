//! Rich-text node tree in the editor's JSON shape.
//!
//! A document is a `doc` node holding block nodes; textblocks (paragraphs,
//! headings and code blocks) hold inline text runs carrying marks:
//!
//! ```json
//! {"type":"doc","content":[{"type":"paragraph","content":[
//!     {"type":"text","text":"hi","marks":[{"type":"bold"}]}]}]}
//! ```
//!
//! Parsing always validates, so a tree obtained from storage is either fully
//! well-formed or rejected as a whole.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use thiserror::Error;

pub const MAX_HEADING_LEVEL: u8 = 3;

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("Malformed content: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Invalid content: {0}")]
    Invalid(String),
}

impl ContentError {
    fn invalid(message: impl Into<String>) -> Self {
        ContentError::Invalid(message.into())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
enum DocTag {
    #[default]
    #[serde(rename = "doc")]
    Doc,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
enum ListItemTag {
    #[default]
    #[serde(rename = "listItem")]
    ListItem,
}

/// Root `doc` node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentTree {
    #[serde(rename = "type")]
    kind: DocTag,
    #[serde(default)]
    pub content: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Block {
    Paragraph {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        content: Vec<Inline>,
    },
    Heading {
        attrs: HeadingAttrs,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        content: Vec<Inline>,
    },
    BulletList {
        content: Vec<ListItem>,
    },
    OrderedList {
        #[serde(default)]
        attrs: OrderedListAttrs,
        content: Vec<ListItem>,
    },
    Blockquote {
        content: Vec<Block>,
    },
    CodeBlock {
        #[serde(default)]
        attrs: CodeBlockAttrs,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        content: Vec<Inline>,
    },
    HorizontalRule,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadingAttrs {
    pub level: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderedListAttrs {
    #[serde(default = "default_list_start")]
    pub start: u32,
}

impl Default for OrderedListAttrs {
    fn default() -> Self {
        Self { start: 1 }
    }
}

fn default_list_start() -> u32 {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlockAttrs {
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListItem {
    #[serde(rename = "type")]
    kind: ListItemTag,
    pub content: Vec<Block>,
}

impl ListItem {
    pub fn new(content: Vec<Block>) -> Self {
        Self {
            kind: ListItemTag::ListItem,
            content,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Inline {
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        marks: Vec<Mark>,
    },
    HardBreak,
}

impl Inline {
    pub fn text(text: impl Into<String>) -> Self {
        Inline::Text {
            text: text.into(),
            marks: Vec::new(),
        }
    }

    pub fn marked(text: impl Into<String>, mut marks: Vec<Mark>) -> Self {
        marks.sort();
        marks.dedup();
        Inline::Text {
            text: text.into(),
            marks,
        }
    }

    /// Length in chars; a hard break counts as one position
    pub fn len(&self) -> usize {
        match self {
            Inline::Text { text, .. } => text.chars().count(),
            Inline::HardBreak => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn marks(&self) -> &[Mark] {
        match self {
            Inline::Text { marks, .. } => marks,
            Inline::HardBreak => &[],
        }
    }
}

/// Marks are kept sorted in declaration order on every text node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Mark {
    Bold,
    Italic,
    Strike,
    Code,
    Link { attrs: LinkAttrs },
}

impl Mark {
    pub fn link(href: impl Into<String>) -> Self {
        Mark::Link {
            attrs: LinkAttrs {
                href: href.into(),
                target: None,
            },
        }
    }

    pub fn is_link(&self) -> bool {
        matches!(self, Mark::Link { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkAttrs {
    pub href: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl Block {
    pub fn paragraph(content: Vec<Inline>) -> Self {
        Block::Paragraph { content }
    }

    pub fn heading(level: u8, content: Vec<Inline>) -> Self {
        Block::Heading {
            attrs: HeadingAttrs { level },
            content,
        }
    }

    /// Paragraphs, headings and code blocks hold inline content directly
    pub fn is_textblock(&self) -> bool {
        matches!(
            self,
            Block::Paragraph { .. } | Block::Heading { .. } | Block::CodeBlock { .. }
        )
    }

    pub fn inline_content(&self) -> Option<&Vec<Inline>> {
        match self {
            Block::Paragraph { content }
            | Block::Heading { content, .. }
            | Block::CodeBlock { content, .. } => Some(content),
            _ => None,
        }
    }

    pub fn inline_content_mut(&mut self) -> Option<&mut Vec<Inline>> {
        match self {
            Block::Paragraph { content }
            | Block::Heading { content, .. }
            | Block::CodeBlock { content, .. } => Some(content),
            _ => None,
        }
    }

    /// Number of textblocks inside this block, itself included
    pub fn textblock_count(&self) -> usize {
        match self {
            Block::Paragraph { .. } | Block::Heading { .. } | Block::CodeBlock { .. } => 1,
            Block::BulletList { content } | Block::OrderedList { content, .. } => content
                .iter()
                .flat_map(|item| item.content.iter())
                .map(Block::textblock_count)
                .sum(),
            Block::Blockquote { content } => content.iter().map(Block::textblock_count).sum(),
            Block::HorizontalRule => 0,
        }
    }

    fn collect_textblocks<'a>(&'a self, out: &mut Vec<&'a Block>) {
        if self.is_textblock() {
            out.push(self);
            return;
        }
        match self {
            Block::BulletList { content } | Block::OrderedList { content, .. } => {
                for item in content {
                    for block in &item.content {
                        block.collect_textblocks(out);
                    }
                }
            }
            Block::Blockquote { content } => {
                for block in content {
                    block.collect_textblocks(out);
                }
            }
            _ => {}
        }
    }

    fn collect_textblocks_mut<'a>(&'a mut self, out: &mut Vec<&'a mut Block>) {
        if self.is_textblock() {
            out.push(self);
            return;
        }
        match self {
            Block::BulletList { content } | Block::OrderedList { content, .. } => {
                for item in content.iter_mut() {
                    for block in item.content.iter_mut() {
                        block.collect_textblocks_mut(out);
                    }
                }
            }
            Block::Blockquote { content } => {
                for block in content.iter_mut() {
                    block.collect_textblocks_mut(out);
                }
            }
            _ => {}
        }
    }

    fn plain_text_into(&self, out: &mut Vec<String>) {
        if let Some(inlines) = self.inline_content() {
            out.push(inline_plain_text(inlines));
            return;
        }
        match self {
            Block::BulletList { content } | Block::OrderedList { content, .. } => {
                for item in content {
                    for block in &item.content {
                        block.plain_text_into(out);
                    }
                }
            }
            Block::Blockquote { content } => {
                for block in content {
                    block.plain_text_into(out);
                }
            }
            _ => {}
        }
    }

    fn validate(&self) -> Result<(), ContentError> {
        match self {
            Block::Paragraph { content } => validate_inlines(content),
            Block::Heading { attrs, content } => {
                if attrs.level == 0 || attrs.level > MAX_HEADING_LEVEL {
                    return Err(ContentError::invalid(format!(
                        "heading level {} outside 1..={}",
                        attrs.level, MAX_HEADING_LEVEL
                    )));
                }
                validate_inlines(content)
            }
            Block::CodeBlock { content, .. } => {
                if content.iter().any(|inline| !inline.marks().is_empty()) {
                    return Err(ContentError::invalid("code block text cannot carry marks"));
                }
                validate_inlines(content)
            }
            Block::BulletList { content } | Block::OrderedList { content, .. } => {
                if content.is_empty() {
                    return Err(ContentError::invalid("list without items"));
                }
                for item in content {
                    if item.content.is_empty() {
                        return Err(ContentError::invalid("empty list item"));
                    }
                    item.content.iter().try_for_each(Block::validate)?;
                }
                Ok(())
            }
            Block::Blockquote { content } => {
                if content.is_empty() {
                    return Err(ContentError::invalid("empty blockquote"));
                }
                content.iter().try_for_each(Block::validate)
            }
            Block::HorizontalRule => Ok(()),
        }
    }

    fn normalize(&mut self) {
        if let Some(inlines) = self.inline_content_mut() {
            normalize_inlines(inlines);
            return;
        }
        match self {
            Block::BulletList { content } | Block::OrderedList { content, .. } => {
                for item in content.iter_mut() {
                    item.content.iter_mut().for_each(Block::normalize);
                }
            }
            Block::Blockquote { content } => content.iter_mut().for_each(Block::normalize),
            _ => {}
        }
    }
}

fn validate_inlines(inlines: &[Inline]) -> Result<(), ContentError> {
    for inline in inlines {
        if let Inline::Text { text, marks } = inline {
            if text.is_empty() {
                return Err(ContentError::invalid("empty text node"));
            }
            for (i, mark) in marks.iter().enumerate() {
                if marks[..i].iter().any(|m| std::mem::discriminant(m) == std::mem::discriminant(mark)) {
                    return Err(ContentError::invalid("duplicate mark on text node"));
                }
                if let Mark::Link { attrs } = mark {
                    if attrs.href.trim().is_empty() {
                        return Err(ContentError::invalid("link without href"));
                    }
                }
            }
        }
    }
    Ok(())
}

/// Sort marks, drop empty runs and merge neighbours carrying the same marks.
pub fn normalize_inlines(inlines: &mut Vec<Inline>) {
    let mut merged: Vec<Inline> = Vec::with_capacity(inlines.len());
    for mut inline in inlines.drain(..) {
        if let Inline::Text { text, marks } = &mut inline {
            if text.is_empty() {
                continue;
            }
            marks.sort();
            marks.dedup();
        }
        if let (Some(Inline::Text { text: prev, marks: prev_marks }), Inline::Text { text, marks }) =
            (merged.last_mut(), &inline)
        {
            if *prev_marks == *marks {
                prev.push_str(text);
                continue;
            }
        }
        merged.push(inline);
    }
    *inlines = merged;
}

pub fn inline_plain_text(inlines: &[Inline]) -> String {
    inlines
        .iter()
        .map(|inline| match inline {
            Inline::Text { text, .. } => text.as_str(),
            Inline::HardBreak => "\n",
        })
        .collect()
}

impl ContentTree {
    pub fn new(content: Vec<Block>) -> Self {
        Self {
            kind: DocTag::Doc,
            content,
        }
    }

    /// Placeholder content for a freshly created document: one empty paragraph
    pub fn empty() -> Self {
        Self::new(vec![Block::paragraph(Vec::new())])
    }

    pub fn from_json(value: &Value) -> Result<Self, ContentError> {
        let tree: ContentTree = serde_json::from_value(value.clone())?;
        tree.validate()?;
        Ok(tree)
    }

    /// Decode content as it arrives from a store.
    ///
    /// Older rows hold the tree serialized into a JSON string; newer ones hold
    /// the JSON object itself. Both normalize to the same tree.
    pub fn from_stored(value: &Value) -> Result<Self, ContentError> {
        match value {
            Value::String(raw) => raw.parse(),
            Value::Object(_) => Self::from_json(value),
            other => Err(ContentError::invalid(format!(
                "unsupported content encoding: {}",
                json_kind(other)
            ))),
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Serialized text form written to the store
    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), ContentError> {
        if self.content.is_empty() {
            return Err(ContentError::invalid("document without blocks"));
        }
        self.content.iter().try_for_each(Block::validate)
    }

    /// Canonical form; also guarantees at least one textblock to put a cursor in
    pub fn normalize(&mut self) {
        self.content.iter_mut().for_each(Block::normalize);
        if self.textblock_count() == 0 {
            self.content.push(Block::paragraph(Vec::new()));
        }
    }

    /// Textblocks in document order
    pub fn textblocks(&self) -> Vec<&Block> {
        let mut out = Vec::new();
        for block in &self.content {
            block.collect_textblocks(&mut out);
        }
        out
    }

    pub fn textblocks_mut(&mut self) -> Vec<&mut Block> {
        let mut out = Vec::new();
        for block in self.content.iter_mut() {
            block.collect_textblocks_mut(&mut out);
        }
        out
    }

    pub fn textblock_count(&self) -> usize {
        self.content.iter().map(Block::textblock_count).sum()
    }

    pub fn plain_text(&self) -> String {
        let mut lines = Vec::new();
        for block in &self.content {
            block.plain_text_into(&mut lines);
        }
        lines.join("\n")
    }

    pub fn word_count(&self) -> usize {
        self.plain_text().split_whitespace().count()
    }
}

impl Default for ContentTree {
    fn default() -> Self {
        Self::empty()
    }
}

impl FromStr for ContentTree {
    type Err = ContentError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let tree: ContentTree = serde_json::from_str(raw)?;
        tree.validate()?;
        Ok(tree)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
