use std::collections::HashMap;

use pipeline_logging::{pipeline_trace, pipeline_warn};

use crate::outline::{render, DocumentTree, OutlineNode};

/// Append-only text collected for one outline section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionBuffer {
    pub section_id: String,
    /// Title announced by the start frame, if any.
    pub title: Option<String>,
    pub text: String,
    pub is_started: bool,
    pub is_ended: bool,
}

impl SectionBuffer {
    fn opened(section_id: &str, title: Option<&str>) -> Self {
        Self {
            section_id: section_id.to_string(),
            title: title.map(ToOwned::to_owned),
            text: String::new(),
            is_started: true,
            is_ended: false,
        }
    }
}

/// What an accumulator operation did with its input.
///
/// The lenient branches are reported explicitly so callers and tests can see them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionEvent {
    Opened,
    AlreadyOpen,
    /// A fragment arrived for a section without a start frame; the section was opened for it.
    ImplicitlyOpened,
    Appended,
    Ended,
    /// End frame for a section that never started; an empty, ended section was recorded.
    EndedWithoutStart,
    AlreadyEnded,
    /// Start frame for a section that already ended; ignored.
    StartAfterEnd,
    /// Fragment for a section that already ended; ignored.
    FragmentAfterEnd,
}

impl SectionEvent {
    /// True for out-of-order input that was absorbed rather than applied normally.
    pub fn is_out_of_order(self) -> bool {
        matches!(
            self,
            SectionEvent::ImplicitlyOpened
                | SectionEvent::EndedWithoutStart
                | SectionEvent::StartAfterEnd
                | SectionEvent::FragmentAfterEnd
        )
    }
}

/// Keyed buffers for streamed chapter content.
///
/// Fragments are routed by section id; sections may interleave on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterAccumulator {
    buffers: HashMap<String, SectionBuffer>,
    /// Section ids in first-start order.
    order: Vec<String>,
}

impl ChapterAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_section_start(&mut self, section_id: &str, title: Option<&str>) -> SectionEvent {
        match self.buffers.get_mut(section_id) {
            Some(buffer) if buffer.is_ended => {
                pipeline_warn!("chapter_start for ended section {section_id}; ignored");
                SectionEvent::StartAfterEnd
            }
            Some(buffer) => {
                if buffer.title.is_none() {
                    buffer.title = title.map(ToOwned::to_owned);
                }
                SectionEvent::AlreadyOpen
            }
            None => {
                self.insert(SectionBuffer::opened(section_id, title));
                SectionEvent::Opened
            }
        }
    }

    pub fn on_fragment(&mut self, section_id: &str, text: &str) -> SectionEvent {
        match self.buffers.get_mut(section_id) {
            Some(buffer) if buffer.is_ended => {
                pipeline_warn!(
                    "content_chunk for ended section {section_id} dropped ({} bytes)",
                    text.len()
                );
                SectionEvent::FragmentAfterEnd
            }
            Some(buffer) => {
                buffer.text.push_str(text);
                pipeline_trace!("section {section_id} +{} bytes", text.len());
                SectionEvent::Appended
            }
            None => {
                pipeline_warn!("content_chunk before chapter_start for section {section_id}; opening it");
                let mut buffer = SectionBuffer::opened(section_id, None);
                buffer.text.push_str(text);
                self.insert(buffer);
                SectionEvent::ImplicitlyOpened
            }
        }
    }

    pub fn on_section_end(&mut self, section_id: &str) -> SectionEvent {
        match self.buffers.get_mut(section_id) {
            Some(buffer) if buffer.is_ended => SectionEvent::AlreadyEnded,
            Some(buffer) => {
                buffer.is_ended = true;
                SectionEvent::Ended
            }
            None => {
                pipeline_warn!("chapter_end for unknown section {section_id}");
                let mut buffer = SectionBuffer::opened(section_id, None);
                buffer.is_ended = true;
                self.insert(buffer);
                SectionEvent::EndedWithoutStart
            }
        }
    }

    pub fn get(&self, section_id: &str) -> Option<&SectionBuffer> {
        self.buffers.get(section_id)
    }

    /// Buffers in first-start order.
    pub fn iter(&self) -> impl Iterator<Item = &SectionBuffer> {
        self.order.iter().filter_map(|id| self.buffers.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffers.clear();
        self.order.clear();
    }

    /// Current best-effort rendering; callable at any point of the stream.
    pub fn materialize(&self, outline: &[OutlineNode]) -> DocumentTree {
        render(outline, self)
    }

    fn insert(&mut self, buffer: SectionBuffer) {
        self.order.push(buffer.section_id.clone());
        self.buffers.insert(buffer.section_id.clone(), buffer);
    }
}
