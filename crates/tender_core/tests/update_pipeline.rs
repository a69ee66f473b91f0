use std::sync::Once;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tender_core::{
    update, AppState, Effect, Frame, GenerationKind, GenerationRequest, JobId, JobStage, Msg,
    Severity, SyncFailure, SyncFailureKind, SyncStatus,
};

const TARGET: &str = "project-42/technical_proposal";

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(pipeline_logging::initialize_for_tests);
}

fn request() -> GenerationRequest {
    GenerationRequest::new(GenerationKind::TechnicalProposal)
        .with_source_file("uploads/tender.docx")
        .with_project("42")
}

fn start(state: AppState, request: GenerationRequest) -> (AppState, JobId, Vec<Effect>) {
    let (state, effects) = update(
        state,
        Msg::StartGeneration {
            target: TARGET.to_string(),
            request,
        },
    );
    let job_id = effects
        .iter()
        .find_map(|effect| match effect {
            Effect::OpenStream { job_id, .. } => Some(*job_id),
            _ => None,
        })
        .expect("open stream effect");
    (state, job_id, effects)
}

fn open(state: AppState, job_id: JobId) -> AppState {
    update(state, Msg::StreamOpened { job_id }).0
}

fn frame(state: AppState, job_id: JobId, value: Value) -> (AppState, Vec<Effect>) {
    update(
        state,
        Msg::FrameReceived {
            job_id,
            frame: Frame::from_value(value).unwrap(),
        },
    )
}

fn complete(state: AppState, job_id: JobId) -> (AppState, Vec<Effect>) {
    frame(
        state,
        job_id,
        json!({"stage": "completed", "success": true, "output_file": "out/proposal.docx", "word_count": 1200}),
    )
}

fn stage_of(state: &AppState) -> JobStage {
    state.job(TARGET).unwrap().stage()
}

#[test]
fn start_emits_open_stream_with_request() {
    init_logging();
    let (mut state, job_id, effects) = start(AppState::new(), request());
    assert_eq!(
        effects,
        vec![Effect::OpenStream {
            job_id,
            request: request(),
        }]
    );
    assert_eq!(stage_of(&state), JobStage::Submitting);
    assert!(state.consume_dirty());
    assert!(!state.consume_dirty());
}

#[test]
fn completion_triggers_conversion_and_one_automatic_sync() {
    init_logging();
    let (state, job_id, _) = start(AppState::new(), request());
    let state = open(state, job_id);
    let (state, effects) = complete(state, job_id);

    assert_eq!(stage_of(&state), JobStage::Completed);
    assert!(effects.contains(&Effect::CloseStream { job_id }));
    assert!(effects.contains(&Effect::ConvertArtifact {
        job_id,
        file: "out/proposal.docx".to_string(),
        attempt: 1,
    }));
    let syncs: Vec<_> = effects
        .iter()
        .filter(|effect| matches!(effect, Effect::SyncArtifact { .. }))
        .collect();
    assert_eq!(
        syncs,
        vec![&Effect::SyncArtifact {
            job_id,
            project_id: "42".to_string(),
            file_path: "out/proposal.docx".to_string(),
            file_type: "tech_proposal".to_string(),
        }]
    );

    let view = state.view();
    assert_eq!(view.jobs[0].sync_status, Some(SyncStatus::Syncing));
    assert_eq!(view.jobs[0].artifacts, vec!["out/proposal.docx".to_string()]);
}

#[test]
fn no_project_means_no_automatic_sync() {
    init_logging();
    let request = GenerationRequest::new(GenerationKind::PointToPoint);
    let (state, job_id, _) = start(AppState::new(), request);
    let state = open(state, job_id);
    let (state, effects) = complete(state, job_id);

    assert!(!effects
        .iter()
        .any(|effect| matches!(effect, Effect::SyncArtifact { .. })));
    assert_eq!(
        state.view().jobs[0].sync_status,
        Some(SyncStatus::Unsynced)
    );
}

#[test]
fn stream_closed_without_terminal_frame_fails() {
    init_logging();
    let (state, job_id, _) = start(AppState::new(), request());
    let state = open(state, job_id);
    let (state, _) = frame(
        state,
        job_id,
        json!({"event": "content_chunk", "chapter_number": "1", "content": "draft"}),
    );
    let (state, effects) = update(state, Msg::StreamEnded { job_id });

    assert_eq!(stage_of(&state), JobStage::Failed);
    let job = state.job(TARGET).unwrap();
    assert_eq!(
        job.failure_reason(),
        Some("stream closed before generation finished")
    );
    assert!(job.terminal_artifact().is_none());
    assert_eq!(job.materialize().section("1").unwrap().body, "draft");
    assert!(effects.iter().any(|effect| matches!(
        effect,
        Effect::Notify(notice) if notice.severity == Severity::Error
    )));
}

#[test]
fn stream_end_after_completion_changes_nothing() {
    init_logging();
    let (state, job_id, _) = start(AppState::new(), request());
    let state = open(state, job_id);
    let (state, _) = complete(state, job_id);
    let (state, effects) = update(state, Msg::StreamEnded { job_id });
    assert!(effects.is_empty());
    assert_eq!(stage_of(&state), JobStage::Completed);
}

#[test]
fn http_failure_at_connect_fails_submitting_job() {
    init_logging();
    let (state, job_id, _) = start(AppState::new(), request());
    let (state, _) = update(
        state,
        Msg::StreamFailed {
            job_id,
            message: "http status 502".to_string(),
        },
    );
    assert_eq!(stage_of(&state), JobStage::Failed);
    assert_eq!(
        state.job(TARGET).unwrap().failure_reason(),
        Some("http status 502")
    );
}

#[test]
fn superseded_job_frames_never_reach_new_job() {
    init_logging();
    let (state, old_id, _) = start(AppState::new(), request());
    let state = open(state, old_id);
    let (state, _) = frame(
        state,
        old_id,
        json!({"event": "content_chunk", "chapter_number": "1", "content": "old "}),
    );

    let (state, new_id, effects) = start(state, request());
    assert_ne!(old_id, new_id);
    assert_eq!(effects[0], Effect::CloseStream { job_id: old_id });

    let state = open(state, new_id);
    let (state, effects) = frame(
        state,
        old_id,
        json!({"event": "content_chunk", "chapter_number": "1", "content": "stale", "progress": 90}),
    );
    assert!(effects.is_empty());

    let job = state.job(TARGET).unwrap();
    assert_eq!(job.id(), new_id);
    assert!(job.sections().is_empty());
    assert_eq!(job.progress_percent(), 0);
    assert_eq!(job.stage(), JobStage::Streaming);
}

#[test]
fn regeneration_reuses_outline_until_replaced() {
    init_logging();
    let (state, old_id, _) = start(AppState::new(), request());
    let state = open(state, old_id);
    let (state, _) = frame(
        state,
        old_id,
        json!({"stage": "outline_completed", "outline": [{"id": "1", "title": "Intro"}]}),
    );
    let (state, _new_id, _) = start(state, request());

    let tree = state.job(TARGET).unwrap().materialize();
    assert_eq!(tree.sections.len(), 1);
    assert_eq!(tree.sections[0].title, "Intro");
    assert_eq!(tree.sections[0].body, "");
}

#[test]
fn cancel_closes_stream_and_freezes_job() {
    init_logging();
    let (state, job_id, _) = start(AppState::new(), request());
    let state = open(state, job_id);
    let (state, effects) = update(
        state,
        Msg::CancelRequested {
            target: TARGET.to_string(),
        },
    );
    assert_eq!(effects[0], Effect::CloseStream { job_id });
    assert_eq!(stage_of(&state), JobStage::Cancelled);

    let (state, effects) = complete(state, job_id);
    assert!(effects.is_empty());
    assert_eq!(stage_of(&state), JobStage::Cancelled);

    let (_state, effects) = update(
        state,
        Msg::CancelRequested {
            target: TARGET.to_string(),
        },
    );
    assert!(effects.is_empty());
}

#[test]
fn conversion_retries_once_then_degrades_to_download() {
    init_logging();
    let (state, job_id, _) = start(AppState::new(), request());
    let state = open(state, job_id);
    let (state, _) = complete(state, job_id);

    let (state, effects) = update(
        state,
        Msg::ConversionFinished {
            job_id,
            result: Err("converter unavailable".to_string()),
        },
    );
    assert_eq!(
        effects,
        vec![Effect::ConvertArtifact {
            job_id,
            file: "out/proposal.docx".to_string(),
            attempt: 2,
        }]
    );

    let (state, effects) = update(
        state,
        Msg::ConversionFinished {
            job_id,
            result: Err("converter unavailable".to_string()),
        },
    );
    assert!(matches!(
        effects.as_slice(),
        [Effect::Notify(notice)] if notice.severity == Severity::Warning
    ));
    let view = state.view();
    assert_eq!(view.jobs[0].stage, JobStage::Completed);
    assert!(view.jobs[0].conversion_warning.is_some());
    assert_eq!(view.jobs[0].artifacts, vec!["out/proposal.docx".to_string()]);
}

#[test]
fn conversion_success_exposes_editable_html() {
    init_logging();
    let (state, job_id, _) = start(AppState::new(), request());
    let state = open(state, job_id);
    let (state, _) = complete(state, job_id);
    let (state, effects) = update(
        state,
        Msg::ConversionFinished {
            job_id,
            result: Ok("<h1>Intro</h1>".to_string()),
        },
    );
    assert!(effects.is_empty());
    assert_eq!(
        state.view().jobs[0].editable_html.as_deref(),
        Some("<h1>Intro</h1>")
    );
}

#[test]
fn sync_request_while_in_flight_is_rejected() {
    init_logging();
    let (state, job_id, _) = start(AppState::new(), request());
    let state = open(state, job_id);
    let (state, _) = complete(state, job_id);

    let (state, effects) = update(
        state,
        Msg::SyncRequested {
            target: TARGET.to_string(),
        },
    );
    assert!(!effects
        .iter()
        .any(|effect| matches!(effect, Effect::SyncArtifact { .. })));
    assert_eq!(
        state.view().jobs[0].sync_status,
        Some(SyncStatus::Syncing)
    );
    assert_eq!(state.job(TARGET).unwrap().sync_record().unwrap().attempts(), 1);
}

#[test]
fn failed_sync_waits_for_manual_retry() {
    init_logging();
    let (state, job_id, _) = start(AppState::new(), request());
    let state = open(state, job_id);
    let (state, _) = complete(state, job_id);

    let (state, effects) = update(
        state,
        Msg::SyncFinished {
            job_id,
            result: Err(SyncFailure {
                kind: SyncFailureKind::UnexpectedResponse,
                message: "expected JSON, got text/html".to_string(),
            }),
        },
    );
    assert!(!effects
        .iter()
        .any(|effect| matches!(effect, Effect::SyncArtifact { .. })));
    let view = state.view();
    assert_eq!(view.jobs[0].sync_status, Some(SyncStatus::Failed));
    assert_eq!(
        view.jobs[0].sync_failure.as_ref().map(|f| f.kind),
        Some(SyncFailureKind::UnexpectedResponse)
    );
    assert!(matches!(
        effects.as_slice(),
        [Effect::Notify(notice)] if notice.text.contains("unexpected server response")
    ));

    let (state, effects) = update(
        state,
        Msg::SyncRequested {
            target: TARGET.to_string(),
        },
    );
    assert!(matches!(
        effects.as_slice(),
        [Effect::SyncArtifact { .. }]
    ));

    let (state, _) = update(
        state,
        Msg::SyncFinished {
            job_id,
            result: Ok("hitl-981".to_string()),
        },
    );
    let view = state.view();
    assert_eq!(view.jobs[0].sync_status, Some(SyncStatus::Synced));
    assert_eq!(view.jobs[0].sync_reference.as_deref(), Some("hitl-981"));

    let (state, effects) = update(
        state,
        Msg::SyncRequested {
            target: TARGET.to_string(),
        },
    );
    assert!(!effects
        .iter()
        .any(|effect| matches!(effect, Effect::SyncArtifact { .. })));
    assert_eq!(
        state.view().jobs[0].sync_status,
        Some(SyncStatus::Synced)
    );
}

#[test]
fn regeneration_starts_a_fresh_sync_record() {
    init_logging();
    let (state, job_id, _) = start(AppState::new(), request());
    let state = open(state, job_id);
    let (state, _) = complete(state, job_id);
    let (state, _) = update(
        state,
        Msg::SyncFinished {
            job_id,
            result: Ok("hitl-1".to_string()),
        },
    );

    let (state, new_id, _) = start(state, request());
    assert_eq!(state.view().jobs[0].sync_status, None);
    let state = open(state, new_id);
    let (state, effects) = complete(state, new_id);
    assert!(effects
        .iter()
        .any(|effect| matches!(effect, Effect::SyncArtifact { job_id, .. } if *job_id == new_id)));
    assert_eq!(
        state.view().jobs[0].sync_status,
        Some(SyncStatus::Syncing)
    );
}

#[test]
fn jobs_for_different_targets_are_independent() {
    init_logging();
    let (state, first, _) = start(AppState::new(), request());
    let (state, effects) = update(
        state,
        Msg::StartGeneration {
            target: "project-42/business_response".to_string(),
            request: GenerationRequest::new(GenerationKind::BusinessResponse),
        },
    );
    assert!(!effects
        .iter()
        .any(|effect| matches!(effect, Effect::CloseStream { .. })));
    assert_eq!(state.view().jobs.len(), 2);
    assert_eq!(state.job_by_id(first).unwrap().stage(), JobStage::Submitting);
}
