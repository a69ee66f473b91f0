use std::collections::HashSet;
use std::fmt::Write;

use crate::accumulator::{ChapterAccumulator, SectionBuffer};

/// One entry of the table of contents received with `outline_completed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineNode {
    pub id: String,
    pub title: String,
    /// Heading level, 1 for top-level chapters.
    pub level: u8,
    pub children: Vec<OutlineNode>,
}

impl OutlineNode {
    pub fn new(id: impl Into<String>, title: impl Into<String>, level: u8) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            level,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<OutlineNode>) -> Self {
        self.children = children;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionState {
    Pending,
    Streaming,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSection {
    pub id: String,
    pub title: String,
    pub level: u8,
    pub body: String,
    pub state: SectionState,
    /// False for sections that streamed in without a matching outline entry.
    pub in_outline: bool,
}

/// Flattened, heading-annotated preview of the document in reading order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentTree {
    pub sections: Vec<RenderedSection>,
}

impl DocumentTree {
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn section(&self, id: &str) -> Option<&RenderedSection> {
        self.sections.iter().find(|section| section.id == id)
    }

    /// Concatenated bodies in reading order.
    pub fn body_text(&self) -> String {
        self.sections.iter().map(|section| section.body.as_str()).collect()
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            let hashes = "#".repeat(usize::from(section.level.clamp(1, 6)));
            let _ = writeln!(out, "{hashes} {}\n", section.title);
            if !section.body.is_empty() {
                out.push_str(section.body.trim_end());
                out.push_str("\n\n");
            }
        }
        let trimmed = out.trim_end().len();
        out.truncate(trimmed);
        out.push('\n');
        out
    }
}

/// Walk the outline depth-first and pair every node with its buffered text.
///
/// Buffers without an outline entry are appended afterwards in first-start order.
/// With no outline at all the result is the buffers alone, in the same order.
pub fn render(outline: &[OutlineNode], buffers: &ChapterAccumulator) -> DocumentTree {
    let mut sections = Vec::with_capacity(buffers.len().max(outline.len()));
    let mut seen = HashSet::new();
    for node in outline {
        walk(node, buffers, &mut sections, &mut seen);
    }

    for buffer in buffers.iter() {
        if seen.contains(buffer.section_id.as_str()) {
            continue;
        }
        sections.push(RenderedSection {
            id: buffer.section_id.clone(),
            title: buffer
                .title
                .clone()
                .unwrap_or_else(|| buffer.section_id.clone()),
            level: 1,
            body: buffer.text.clone(),
            state: section_state(Some(buffer)),
            in_outline: false,
        });
    }

    DocumentTree { sections }
}

fn walk<'a>(
    node: &'a OutlineNode,
    buffers: &ChapterAccumulator,
    sections: &mut Vec<RenderedSection>,
    seen: &mut HashSet<&'a str>,
) {
    let buffer = buffers.get(&node.id);
    seen.insert(node.id.as_str());
    sections.push(RenderedSection {
        id: node.id.clone(),
        title: node.title.clone(),
        level: node.level,
        body: buffer.map(|b| b.text.clone()).unwrap_or_default(),
        state: section_state(buffer),
        in_outline: true,
    });
    for child in &node.children {
        walk(child, buffers, sections, seen);
    }
}

fn section_state(buffer: Option<&SectionBuffer>) -> SectionState {
    match buffer {
        None => SectionState::Pending,
        Some(buffer) if buffer.is_ended => SectionState::Done,
        Some(_) => SectionState::Streaming,
    }
}
