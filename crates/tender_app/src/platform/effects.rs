use std::time::Duration;

use pipeline_logging::{pipeline_debug, pipeline_info, pipeline_warn};
use tender_core::{Effect, Frame, Msg, Notice, SyncFailure, SyncFailureKind};
use tender_engine::{EngineEvent, EngineHandle, SyncError, SyncRequest};

/// Carries core effects out to the engine and engine events back in as messages.
pub struct EffectRunner {
    engine: EngineHandle,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle) -> Self {
        Self { engine }
    }

    /// Hand IO effects to the engine; notices are returned for display.
    pub fn enqueue(&self, effects: Vec<Effect>) -> Vec<Notice> {
        let mut notices = Vec::new();
        for effect in effects {
            match effect {
                Effect::OpenStream { job_id, request } => {
                    let endpoint = request.kind.stream_endpoint();
                    pipeline_info!("OpenStream job_id={job_id} endpoint={endpoint}");
                    self.engine.generate(job_id, endpoint, request.payload());
                }
                Effect::CloseStream { job_id } => self.engine.cancel(job_id),
                Effect::ConvertArtifact {
                    job_id,
                    file,
                    attempt,
                } => {
                    pipeline_info!("ConvertArtifact job_id={job_id} attempt={attempt} file={file}");
                    self.engine.convert(job_id, attempt, file);
                }
                Effect::SyncArtifact {
                    job_id,
                    project_id,
                    file_path,
                    file_type,
                } => {
                    pipeline_info!("SyncArtifact job_id={job_id} project={project_id} file={file_path}");
                    self.engine.sync(
                        job_id,
                        SyncRequest {
                            project_id,
                            file_path,
                            file_type,
                        },
                    );
                }
                Effect::Notify(notice) => notices.push(notice),
            }
        }
        notices
    }

    /// Next message from the engine, or `Tick` when nothing arrived in time.
    pub fn next_msg(&self, wait: Duration) -> Msg {
        match self.engine.recv_timeout(wait) {
            Some(event) => map_event(event).unwrap_or(Msg::NoOp),
            None => Msg::Tick,
        }
    }
}

pub fn map_event(event: EngineEvent) -> Option<Msg> {
    let msg = match event {
        EngineEvent::StreamOpened { job_id } => Msg::StreamOpened { job_id },
        EngineEvent::Frame { job_id, frame } => match Frame::from_map(frame) {
            Ok(frame) => Msg::FrameReceived { job_id, frame },
            Err(err) => {
                pipeline_warn!("job {job_id}: skipping frame: {err}");
                return None;
            }
        },
        EngineEvent::StreamEnded { job_id } => Msg::StreamEnded { job_id },
        EngineEvent::StreamFailed { job_id, error } => Msg::StreamFailed {
            job_id,
            message: error.to_string(),
        },
        EngineEvent::ConversionCompleted {
            job_id,
            attempt,
            result,
        } => {
            pipeline_debug!("job {job_id} conversion attempt {attempt} finished");
            Msg::ConversionFinished {
                job_id,
                result: result.map_err(|err| err.to_string()),
            }
        }
        EngineEvent::SyncCompleted { job_id, result } => {
            let result = match result {
                Ok(receipt) => Ok(receipt.external_reference),
                Err(SyncError::AlreadyInFlight(_)) => {
                    pipeline_debug!("job {job_id}: duplicate sync dropped by the engine");
                    return None;
                }
                Err(err) => Err(sync_failure(err)),
            };
            Msg::SyncFinished { job_id, result }
        }
    };
    Some(msg)
}

fn sync_failure(err: SyncError) -> SyncFailure {
    let kind = match &err {
        SyncError::Rejected(_) => SyncFailureKind::Rejected,
        SyncError::UnexpectedResponse { .. } => SyncFailureKind::UnexpectedResponse,
        SyncError::Transport(_) | SyncError::AlreadyInFlight(_) => SyncFailureKind::Transport,
    };
    let message = match err {
        SyncError::Rejected(message) => message,
        other => other.to_string(),
    };
    SyncFailure { kind, message }
}
