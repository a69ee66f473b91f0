use pipeline_logging::{pipeline_debug, pipeline_info, pipeline_warn};

use crate::effect::{Notice, Severity};
use crate::finalize::ConversionStep;
use crate::job::{FrameOutcome, GenerationJob, JobId, JobStage};
use crate::sync::{SyncFailureKind, SyncTrigger};
use crate::{AppState, Effect, GenerationRequest, Msg};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: AppState, msg: Msg) -> (AppState, Vec<Effect>) {
    let effects = match msg {
        Msg::StartGeneration { target, request } => start_generation(&mut state, &target, request),
        Msg::StreamOpened { job_id } => on_job(&mut state, job_id, "stream open", |job| {
            if let Err(err) = job.connection_opened() {
                pipeline_warn!("{err}");
            }
            Vec::new()
        }),
        Msg::FrameReceived { job_id, frame } => on_job(&mut state, job_id, "frame", |job| {
            match job.apply_frame(frame) {
                FrameOutcome::Completed => on_completed(job),
                FrameOutcome::Failed => {
                    let reason = job.failure_reason().unwrap_or_default();
                    let text = format!(
                        "generation failed: {reason} ({} completed section(s) kept)",
                        job.completed_section_ids().len()
                    );
                    vec![
                        Effect::CloseStream { job_id },
                        Effect::Notify(Notice::new(Some(job_id), Severity::Error, text)),
                    ]
                }
                FrameOutcome::Section(event) => {
                    if event.is_out_of_order() {
                        pipeline_debug!("job {job_id} absorbed out-of-order frame: {event:?}");
                    }
                    Vec::new()
                }
                FrameOutcome::Ignored | FrameOutcome::Applied => Vec::new(),
            }
        }),
        Msg::StreamEnded { job_id } => on_job(&mut state, job_id, "stream end", |job| {
            if matches!(job.stage(), JobStage::Submitting | JobStage::Streaming) {
                transport_failure(job, "stream closed before generation finished")
            } else {
                Vec::new()
            }
        }),
        Msg::StreamFailed { job_id, message } => {
            on_job(&mut state, job_id, "stream failure", |job| {
                transport_failure(job, &message)
            })
        }
        Msg::CancelRequested { target } => {
            let cancelled = state
                .job_mut(&target)
                .and_then(|job| job.cancel().then(|| job.id()));
            let effects = match cancelled {
                Some(job_id) => vec![
                    Effect::CloseStream { job_id },
                    Effect::Notify(Notice::new(
                        Some(job_id),
                        Severity::Info,
                        "generation cancelled",
                    )),
                ],
                None => Vec::new(),
            };
            if !effects.is_empty() {
                state.mark_dirty();
            }
            effects
        }
        Msg::ConversionFinished { job_id, result } => {
            on_job(&mut state, job_id, "conversion result", |job| {
                conversion_finished(job, result)
            })
        }
        Msg::SyncRequested { target } => match state.job_mut(&target) {
            Some(job) => {
                let effects = request_sync(job, SyncTrigger::Manual);
                state.mark_dirty();
                effects
            }
            None => vec![Effect::Notify(Notice::new(
                None,
                Severity::Warning,
                format!("nothing to sync for {target}"),
            ))],
        },
        Msg::SyncFinished { job_id, result } => {
            on_job(&mut state, job_id, "sync result", |job| {
                let Some(record) = job.sync_record_mut() else {
                    return Vec::new();
                };
                let notice = match result {
                    Ok(reference) => record.succeed(reference.clone()).then(|| {
                        Notice::new(
                            Some(job_id),
                            Severity::Info,
                            format!("artifact synchronized as {reference}"),
                        )
                    }),
                    Err(failure) => {
                        let text = match failure.kind {
                            SyncFailureKind::UnexpectedResponse => format!(
                                "sync failed: unexpected server response ({})",
                                failure.message
                            ),
                            SyncFailureKind::Rejected | SyncFailureKind::Transport => {
                                format!("sync failed: {}", failure.message)
                            }
                        };
                        record
                            .fail(failure)
                            .then(|| Notice::new(Some(job_id), Severity::Warning, text))
                    }
                };
                notice.map(Effect::Notify).into_iter().collect()
            })
        }
        Msg::Tick | Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn on_job(
    state: &mut AppState,
    job_id: JobId,
    what: &str,
    apply: impl FnOnce(&mut GenerationJob) -> Vec<Effect>,
) -> Vec<Effect> {
    let Some(job) = state.job_by_id_mut(job_id) else {
        pipeline_warn!("dropping {what} for unknown or superseded job {job_id}");
        return Vec::new();
    };
    let effects = apply(job);
    state.mark_dirty();
    effects
}

fn start_generation(state: &mut AppState, target: &str, request: GenerationRequest) -> Vec<Effect> {
    let (previous, job) = state.replace_job(target, request);
    let mut effects = Vec::with_capacity(2);

    if let Some(mut previous) = previous {
        if previous.cancel() {
            pipeline_info!(
                "job {} superseded by job {} for {target}",
                previous.id(),
                job.id()
            );
            effects.push(Effect::CloseStream {
                job_id: previous.id(),
            });
        }
    }

    match job.start() {
        Ok(()) => effects.push(Effect::OpenStream {
            job_id: job.id(),
            request: job.request().clone(),
        }),
        Err(err) => pipeline_warn!("{err}"),
    }

    state.mark_dirty();
    effects
}

fn transport_failure(job: &mut GenerationJob, message: &str) -> Vec<Effect> {
    if !job.fail_transport(message) {
        return Vec::new();
    }
    let job_id = job.id();
    vec![
        Effect::CloseStream { job_id },
        Effect::Notify(Notice::new(
            Some(job_id),
            Severity::Error,
            format!(
                "generation failed: {message} ({} completed section(s) kept)",
                job.completed_section_ids().len()
            ),
        )),
    ]
}

fn on_completed(job: &mut GenerationJob) -> Vec<Effect> {
    let job_id = job.id();
    let mut effects = vec![Effect::CloseStream { job_id }];
    let Some(file) = job
        .terminal_artifact()
        .map(|artifact| artifact.output_file.clone())
    else {
        return effects;
    };

    effects.push(Effect::Notify(Notice::new(
        Some(job_id),
        Severity::Info,
        format!("generation completed: {file}"),
    )));
    if let Some(attempt) = job.conversion_mut().begin() {
        effects.push(Effect::ConvertArtifact {
            job_id,
            file,
            attempt,
        });
    }
    if job.request().project_id.is_some() {
        effects.extend(request_sync(job, SyncTrigger::Automatic));
    }
    effects
}

fn conversion_finished(job: &mut GenerationJob, result: Result<String, String>) -> Vec<Effect> {
    let job_id = job.id();
    let error = result.as_ref().err().cloned();
    let Some(file) = job
        .terminal_artifact()
        .map(|artifact| artifact.output_file.clone())
    else {
        return Vec::new();
    };

    match job.conversion_mut().record(result) {
        ConversionStep::Retry { attempt } => {
            pipeline_warn!(
                "job {job_id} conversion failed ({}); retrying",
                error.unwrap_or_default()
            );
            vec![Effect::ConvertArtifact {
                job_id,
                file,
                attempt,
            }]
        }
        ConversionStep::DownloadOnly => vec![Effect::Notify(Notice::new(
            Some(job_id),
            Severity::Warning,
            format!(
                "editable view unavailable ({}); {file} can still be downloaded",
                error.unwrap_or_default()
            ),
        ))],
        ConversionStep::Ready | ConversionStep::Ignored => Vec::new(),
    }
}

fn request_sync(job: &mut GenerationJob, trigger: SyncTrigger) -> Vec<Effect> {
    let job_id = job.id();
    let warn = |text: String| vec![Effect::Notify(Notice::new(Some(job_id), Severity::Warning, text))];

    let Some(file_path) = job
        .terminal_artifact()
        .map(|artifact| artifact.output_file.clone())
    else {
        return warn("no finished artifact to sync".to_string());
    };
    let Some(project_id) = job.request().project_id.clone() else {
        return warn("no project selected for sync".to_string());
    };
    let file_type = job.request().kind.sync_file_type().to_string();

    let Some(record) = job.sync_record_mut() else {
        return Vec::new();
    };
    match record.begin(trigger) {
        Ok(()) => {
            pipeline_info!("job {job_id} syncing {file_path} to project {project_id} ({trigger:?})");
            vec![Effect::SyncArtifact {
                job_id,
                project_id,
                file_path,
                file_type,
            }]
        }
        Err(rejected) => {
            pipeline_warn!("job {job_id} sync not started: {rejected}");
            warn(rejected.to_string())
        }
    }
}
