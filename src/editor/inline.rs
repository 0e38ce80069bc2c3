//! Char-offset operations over a textblock's inline runs.
//!
//! Offsets count chars; a hard break occupies one position. Every mutating
//! helper leaves the runs normalized.

use crate::docs::content::{normalize_inlines, Inline, LinkAttrs, Mark};

pub fn len(inlines: &[Inline]) -> usize {
    inlines.iter().map(Inline::len).sum()
}

fn byte_index(text: &str, chars: usize) -> usize {
    text.char_indices().nth(chars).map_or(text.len(), |(i, _)| i)
}

/// Split runs at a char offset
pub fn split_at(inlines: Vec<Inline>, offset: usize) -> (Vec<Inline>, Vec<Inline>) {
    let mut before = Vec::new();
    let mut after = Vec::new();
    let mut pos = 0;

    for inline in inlines {
        let width = inline.len();
        if pos + width <= offset {
            before.push(inline);
        } else if pos >= offset {
            after.push(inline);
        } else if let Inline::Text { text, marks } = inline {
            let cut = byte_index(&text, offset - pos);
            before.push(Inline::Text {
                text: text[..cut].to_string(),
                marks: marks.clone(),
            });
            after.push(Inline::Text {
                text: text[cut..].to_string(),
                marks,
            });
        }
        pos += width;
    }

    (before, after)
}

fn split_range(inlines: Vec<Inline>, from: usize, to: usize) -> (Vec<Inline>, Vec<Inline>, Vec<Inline>) {
    let (before, rest) = split_at(inlines, from);
    let (middle, after) = split_at(rest, to.saturating_sub(from));
    (before, middle, after)
}

fn join(mut before: Vec<Inline>, middle: Vec<Inline>, after: Vec<Inline>) -> Vec<Inline> {
    before.extend(middle);
    before.extend(after);
    normalize_inlines(&mut before);
    before
}

/// Run `f` over the mark set of every text run inside `[from, to)`
pub fn map_marks(inlines: &mut Vec<Inline>, from: usize, to: usize, mut f: impl FnMut(&mut Vec<Mark>)) {
    if from >= to {
        return;
    }
    let (before, mut middle, after) = split_range(std::mem::take(inlines), from, to);
    for inline in middle.iter_mut() {
        if let Inline::Text { marks, .. } = inline {
            f(marks);
        }
    }
    *inlines = join(before, middle, after);
}

/// True when every text char in `[from, to)` carries a mark matching `pred`.
/// Ranges holding no text are never active.
pub fn all_have(inlines: &[Inline], from: usize, to: usize, pred: impl Fn(&Mark) -> bool) -> bool {
    let mut pos = 0;
    let mut seen_text = false;

    for inline in inlines {
        let width = inline.len();
        let overlaps = pos < to && pos + width > from;
        if overlaps {
            if let Inline::Text { marks, .. } = inline {
                if !marks.iter().any(&pred) {
                    return false;
                }
                seen_text = true;
            }
        }
        pos += width;
    }

    seen_text
}

/// Marks a character typed at `offset` would pick up
pub fn marks_at(inlines: &[Inline], offset: usize) -> Vec<Mark> {
    let before = offset.saturating_sub(1);
    let mut pos = 0;
    for inline in inlines {
        let width = inline.len();
        if before < pos + width {
            return inline.marks().to_vec();
        }
        pos += width;
    }
    Vec::new()
}

fn link_of(inline: &Inline) -> Option<&LinkAttrs> {
    inline.marks().iter().find_map(|mark| match mark {
        Mark::Link { attrs } => Some(attrs),
        _ => None,
    })
}

/// Extent of the link touching `offset`: the char at the offset is checked
/// first, then the char before it.
pub fn link_extent(inlines: &[Inline], offset: usize) -> Option<(usize, usize, LinkAttrs)> {
    let mut spans = Vec::with_capacity(inlines.len());
    let mut pos = 0;
    for inline in inlines {
        let width = inline.len();
        spans.push((pos, pos + width, link_of(inline)));
        pos += width;
    }

    let hit = spans
        .iter()
        .position(|(start, end, link)| link.is_some() && *start <= offset && offset < *end)
        .or_else(|| {
            let before = offset.checked_sub(1)?;
            spans
                .iter()
                .position(|(start, end, link)| link.is_some() && *start <= before && before < *end)
        })?;

    let attrs = spans[hit].2?;
    let mut first = hit;
    while first > 0 && spans[first - 1].2 == Some(attrs) {
        first -= 1;
    }
    let mut last = hit;
    while last + 1 < spans.len() && spans[last + 1].2 == Some(attrs) {
        last += 1;
    }

    Some((spans[first].0, spans[last].1, attrs.clone()))
}

/// Insert text carrying `marks` at `offset`. Outside code blocks a newline
/// becomes a hard break.
pub fn insert_text(inlines: &mut Vec<Inline>, offset: usize, text: &str, marks: Vec<Mark>, code: bool) {
    if text.is_empty() {
        return;
    }

    let mut inserted = Vec::new();
    if code {
        inserted.push(Inline::text(text));
    } else {
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                inserted.push(Inline::HardBreak);
            }
            if !line.is_empty() {
                inserted.push(Inline::marked(line, marks.clone()));
            }
        }
    }

    let (before, after) = split_at(std::mem::take(inlines), offset);
    *inlines = join(before, inserted, after);
}

pub fn delete_range(inlines: &mut Vec<Inline>, from: usize, to: usize) {
    if from >= to {
        return;
    }
    let (before, _, after) = split_range(std::mem::take(inlines), from, to);
    *inlines = join(before, Vec::new(), after);
}

/// Flatten runs to unmarked text, turning hard breaks into newlines
pub fn strip_to_plain(inlines: Vec<Inline>) -> Vec<Inline> {
    let text = crate::docs::content::inline_plain_text(&inlines);
    if text.is_empty() {
        Vec::new()
    } else {
        vec![Inline::text(text)]
    }
}
