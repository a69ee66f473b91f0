//! Typed view of the JSON frames emitted by the generation stream.
//!
//! Frames arrive as loosely shaped objects. Dispatch order is `event` (chapter
//! boundaries and content), then `stage` (milestones and terminal frames), then
//! a plain progress frame when neither is present.

use serde_json::{Map, Value};

use crate::outline::OutlineNode;

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Progress carried by the frame, rounded and clamped to 0..=100.
    pub progress: Option<u8>,
    pub message: Option<String>,
    pub kind: FrameKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameKind {
    Progress,
    Milestone {
        marker: StageMarker,
        outline: Option<Vec<OutlineNode>>,
    },
    ChapterStart {
        section_id: String,
        title: Option<String>,
    },
    ContentChunk {
        section_id: String,
        content: String,
    },
    ChapterEnd {
        section_id: String,
    },
    Completed(TerminalArtifact),
    Failed {
        reason: String,
    },
}

/// Non-terminal stage markers reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageMarker {
    AnalysisCompleted,
    OutlineCompleted,
    ContentGeneration,
}

impl StageMarker {
    pub fn as_str(self) -> &'static str {
        match self {
            StageMarker::AnalysisCompleted => "analysis_completed",
            StageMarker::OutlineCompleted => "outline_completed",
            StageMarker::ContentGeneration => "content_generation",
        }
    }
}

/// Result of a successful generation: references to the produced files plus statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminalArtifact {
    pub output_file: String,
    pub output_files: Vec<String>,
    /// Every field of the success frame not otherwise interpreted.
    pub stats: Map<String, Value>,
}

impl TerminalArtifact {
    /// Primary artifact first, followed by the remaining files without duplicates.
    pub fn artifact_paths(&self) -> Vec<&str> {
        let mut paths = vec![self.output_file.as_str()];
        for file in &self.output_files {
            if !paths.contains(&file.as_str()) {
                paths.push(file);
            }
        }
        paths
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("invalid frame JSON: {0}")]
    Json(String),
    #[error("frame is not a JSON object")]
    NotAnObject,
    #[error("unknown chapter event `{0}`")]
    UnknownEvent(String),
    #[error("unknown stage `{0}`")]
    UnknownStage(String),
    #[error("{kind} frame is missing `{field}`")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },
    #[error("invalid `{field}`: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
}

const ENVELOPE_FIELDS: &[&str] = &[
    "stage",
    "success",
    "output_file",
    "output_files",
    "progress",
    "message",
];

impl Frame {
    pub fn parse(text: &str) -> Result<Self, FrameError> {
        let value: Value =
            serde_json::from_str(text).map_err(|err| FrameError::Json(err.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, FrameError> {
        match value {
            Value::Object(map) => Self::from_map(map),
            _ => Err(FrameError::NotAnObject),
        }
    }

    pub fn from_map(map: Map<String, Value>) -> Result<Self, FrameError> {
        let progress = map.get("progress").and_then(Value::as_f64).map(clamp_percent);
        let message = string_field(&map, "message");

        let kind = if let Some(event) = map.get("event").and_then(Value::as_str) {
            parse_chapter_event(event, &map)?
        } else if let Some(stage) = map.get("stage").and_then(Value::as_str) {
            parse_stage(stage, &map)?
        } else {
            FrameKind::Progress
        };

        Ok(Self {
            progress,
            message,
            kind,
        })
    }
}

fn clamp_percent(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}

fn string_field(map: &Map<String, Value>, field: &str) -> Option<String> {
    map.get(field).and_then(Value::as_str).map(ToOwned::to_owned)
}

/// Section ids arrive either as strings or as bare numbers.
fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn section_id(map: &Map<String, Value>, kind: &'static str) -> Result<String, FrameError> {
    map.get("chapter_number")
        .and_then(id_from_value)
        .ok_or(FrameError::MissingField {
            kind,
            field: "chapter_number",
        })
}

fn parse_chapter_event(event: &str, map: &Map<String, Value>) -> Result<FrameKind, FrameError> {
    match event {
        "chapter_start" => Ok(FrameKind::ChapterStart {
            section_id: section_id(map, "chapter_start")?,
            title: string_field(map, "chapter_title"),
        }),
        "content_chunk" => Ok(FrameKind::ContentChunk {
            section_id: section_id(map, "content_chunk")?,
            content: string_field(map, "content").unwrap_or_default(),
        }),
        "chapter_end" => Ok(FrameKind::ChapterEnd {
            section_id: section_id(map, "chapter_end")?,
        }),
        other => Err(FrameError::UnknownEvent(other.to_string())),
    }
}

fn parse_stage(stage: &str, map: &Map<String, Value>) -> Result<FrameKind, FrameError> {
    match stage {
        "analysis_completed" => Ok(FrameKind::Milestone {
            marker: StageMarker::AnalysisCompleted,
            outline: None,
        }),
        "outline_completed" => Ok(FrameKind::Milestone {
            marker: StageMarker::OutlineCompleted,
            outline: map.get("outline").map(parse_outline).transpose()?,
        }),
        "content_generation" => Ok(FrameKind::Milestone {
            marker: StageMarker::ContentGeneration,
            outline: None,
        }),
        "completed" => {
            if map.get("success").and_then(Value::as_bool) == Some(false) {
                return Ok(FrameKind::Failed {
                    reason: failure_reason(map),
                });
            }
            parse_artifact(map).map(FrameKind::Completed)
        }
        "error" => Ok(FrameKind::Failed {
            reason: failure_reason(map),
        }),
        other => Err(FrameError::UnknownStage(other.to_string())),
    }
}

fn failure_reason(map: &Map<String, Value>) -> String {
    string_field(map, "error")
        .or_else(|| string_field(map, "message"))
        .unwrap_or_else(|| "generation failed".to_string())
}

fn parse_artifact(map: &Map<String, Value>) -> Result<TerminalArtifact, FrameError> {
    let output_files: Vec<String> = match map.get("output_files") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(ToOwned::to_owned)
            .collect(),
        Some(_) => {
            return Err(FrameError::InvalidField {
                field: "output_files",
                message: "expected an array of strings".to_string(),
            })
        }
    };

    let output_file = string_field(map, "output_file")
        .filter(|file| !file.is_empty())
        .or_else(|| output_files.first().cloned())
        .ok_or(FrameError::MissingField {
            kind: "completed",
            field: "output_file",
        })?;

    let stats = map
        .iter()
        .filter(|(key, _)| !ENVELOPE_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Ok(TerminalArtifact {
        output_file,
        output_files,
        stats,
    })
}

fn parse_outline(value: &Value) -> Result<Vec<OutlineNode>, FrameError> {
    let Value::Array(items) = value else {
        return Err(FrameError::InvalidField {
            field: "outline",
            message: "expected an array".to_string(),
        });
    };
    items.iter().map(|item| parse_outline_node(item, 1)).collect()
}

fn parse_outline_node(value: &Value, depth: u8) -> Result<OutlineNode, FrameError> {
    let Value::Object(map) = value else {
        return Err(FrameError::InvalidField {
            field: "outline",
            message: "outline entries must be objects".to_string(),
        });
    };
    let id = map
        .get("id")
        .or_else(|| map.get("chapter_number"))
        .and_then(id_from_value)
        .ok_or(FrameError::InvalidField {
            field: "outline",
            message: "outline entry without id".to_string(),
        })?;
    let title = string_field(map, "title").unwrap_or_else(|| id.clone());
    let level = map
        .get("level")
        .and_then(Value::as_u64)
        .map_or(depth, |level| level.clamp(1, 6) as u8);
    let children = match map.get("children") {
        Some(Value::Array(children)) => children
            .iter()
            .map(|child| parse_outline_node(child, depth.saturating_add(1)))
            .collect::<Result<Vec<_>, _>>()?,
        _ => Vec::new(),
    };

    Ok(OutlineNode {
        id,
        title,
        level,
        children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_chapter_numbers_become_string_ids() {
        let frame = Frame::from_value(json!({"event": "chapter_end", "chapter_number": 3})).unwrap();
        assert_eq!(
            frame.kind,
            FrameKind::ChapterEnd {
                section_id: "3".to_string()
            }
        );
    }

    #[test]
    fn fractional_progress_is_rounded_and_clamped() {
        assert_eq!(clamp_percent(41.6), 42);
        assert_eq!(clamp_percent(-3.0), 0);
        assert_eq!(clamp_percent(180.0), 100);
    }

    #[test]
    fn outline_levels_default_to_depth() {
        let outline = parse_outline(&json!([
            {"id": "1", "title": "A", "children": [{"id": "1.1", "title": "B"}]}
        ]))
        .unwrap();
        assert_eq!(outline[0].level, 1);
        assert_eq!(outline[0].children[0].level, 2);
    }
}
