use pretty_assertions::assert_eq;
use serde_json::json;
use tender_core::{Frame, FrameError, FrameKind, StageMarker};

#[test]
fn plain_progress_frame() {
    let frame = Frame::parse(r#"{"progress": 12.4, "message": "analysing"}"#).unwrap();
    assert_eq!(frame.progress, Some(12));
    assert_eq!(frame.message.as_deref(), Some("analysing"));
    assert_eq!(frame.kind, FrameKind::Progress);
}

#[test]
fn chapter_events_take_precedence_over_stage() {
    let frame = Frame::from_value(json!({
        "stage": "content_generation",
        "event": "chapter_start",
        "chapter_number": "2",
        "chapter_title": "Method"
    }))
    .unwrap();
    assert_eq!(
        frame.kind,
        FrameKind::ChapterStart {
            section_id: "2".to_string(),
            title: Some("Method".to_string()),
        }
    );
}

#[test]
fn outline_completed_carries_nested_outline() {
    let frame = Frame::from_value(json!({
        "stage": "outline_completed",
        "outline": [{"id": 1, "title": "A", "children": [{"id": "1.1", "title": "B", "level": 3}]}]
    }))
    .unwrap();
    let FrameKind::Milestone { marker, outline } = frame.kind else {
        panic!("expected milestone");
    };
    assert_eq!(marker, StageMarker::OutlineCompleted);
    let outline = outline.unwrap();
    assert_eq!(outline[0].id, "1");
    assert_eq!(outline[0].children[0].level, 3);
}

#[test]
fn success_frame_keeps_statistics() {
    let frame = Frame::from_value(json!({
        "stage": "completed",
        "success": true,
        "output_file": "out/a.docx",
        "output_files": ["out/a.docx", "out/a.pdf"],
        "total_chapters": 8,
        "elapsed_seconds": 314
    }))
    .unwrap();
    let FrameKind::Completed(artifact) = frame.kind else {
        panic!("expected completion");
    };
    assert_eq!(artifact.artifact_paths(), vec!["out/a.docx", "out/a.pdf"]);
    assert_eq!(artifact.stats.len(), 2);
    assert_eq!(artifact.stats["total_chapters"], 8);
}

#[test]
fn success_frame_without_artifact_is_rejected() {
    let err = Frame::from_value(json!({"stage": "completed", "success": true})).unwrap_err();
    assert_eq!(
        err,
        FrameError::MissingField {
            kind: "completed",
            field: "output_file"
        }
    );
}

#[test]
fn error_frame_prefers_error_over_message() {
    let frame = Frame::from_value(json!({"stage": "error", "error": "model timeout", "message": "x"}))
        .unwrap();
    assert_eq!(
        frame.kind,
        FrameKind::Failed {
            reason: "model timeout".to_string()
        }
    );
    let frame = Frame::from_value(json!({"stage": "error"})).unwrap();
    assert_eq!(
        frame.kind,
        FrameKind::Failed {
            reason: "generation failed".to_string()
        }
    );
}

#[test]
fn unknown_shapes_are_errors() {
    assert!(matches!(
        Frame::from_value(json!({"event": "chapter_pause", "chapter_number": "1"})),
        Err(FrameError::UnknownEvent(_))
    ));
    assert!(matches!(
        Frame::from_value(json!({"stage": "warming_up"})),
        Err(FrameError::UnknownStage(_))
    ));
    assert!(matches!(
        Frame::from_value(json!([1, 2])),
        Err(FrameError::NotAnObject)
    ));
    assert!(matches!(
        Frame::from_value(json!({"event": "content_chunk", "content": "x"})),
        Err(FrameError::MissingField { .. })
    ));
    assert!(matches!(Frame::parse("not-json"), Err(FrameError::Json(_))));
}
