use std::sync::Arc;

use pipeline_logging::{pipeline_debug, pipeline_info, pipeline_warn};

use crate::accumulator::{ChapterAccumulator, SectionEvent};
use crate::finalize::ConversionState;
use crate::frame::{Frame, FrameKind, StageMarker, TerminalArtifact};
use crate::outline::{DocumentTree, OutlineNode};
use crate::request::GenerationRequest;
use crate::sync::SyncRecord;

pub type JobId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobStage {
    #[default]
    Idle,
    Submitting,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl JobStage {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStage::Completed | JobStage::Failed | JobStage::Cancelled
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureSource {
    /// The stream could not be opened, stalled, or closed early.
    Transport,
    /// The server reported the failure in an error frame.
    Business,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub source: FailureSource,
    pub message: String,
}

/// Result of feeding one frame to a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// The job is not streaming; nothing changed.
    Ignored,
    Applied,
    Section(SectionEvent),
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("job {job_id}: cannot {action} while {stage:?}")]
pub struct TransitionError {
    pub job_id: JobId,
    pub action: &'static str,
    pub stage: JobStage,
}

/// One generation run and everything it produced.
///
/// The job is mutated only by stream frames, transport reports and cancellation.
/// Terminal stages are final.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    id: JobId,
    target: String,
    request: GenerationRequest,
    stage: JobStage,
    progress: u8,
    current_section: Option<String>,
    completed_sections: Vec<String>,
    status_message: Option<String>,
    milestones: Vec<StageMarker>,
    outline: Arc<[OutlineNode]>,
    sections: ChapterAccumulator,
    artifact: Option<TerminalArtifact>,
    failure: Option<JobFailure>,
    conversion: ConversionState,
    sync: Option<SyncRecord>,
}

impl GenerationJob {
    pub fn new(id: JobId, target: impl Into<String>, request: GenerationRequest) -> Self {
        Self {
            id,
            target: target.into(),
            request,
            stage: JobStage::Idle,
            progress: 0,
            current_section: None,
            completed_sections: Vec::new(),
            status_message: None,
            milestones: Vec::new(),
            outline: Arc::from(Vec::new()),
            sections: ChapterAccumulator::new(),
            artifact: None,
            failure: None,
            conversion: ConversionState::NotStarted,
            sync: None,
        }
    }

    /// Seed the outline of a regeneration with the previous run's outline.
    pub fn with_outline(mut self, outline: Arc<[OutlineNode]>) -> Self {
        self.outline = outline;
        self
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn request(&self) -> &GenerationRequest {
        &self.request
    }

    pub fn stage(&self) -> JobStage {
        self.stage
    }

    pub fn progress_percent(&self) -> u8 {
        self.progress
    }

    pub fn current_section_id(&self) -> Option<&str> {
        self.current_section.as_deref()
    }

    /// Sections that saw their end frame, in completion order.
    pub fn completed_section_ids(&self) -> &[String] {
        &self.completed_sections
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn milestones(&self) -> &[StageMarker] {
        &self.milestones
    }

    pub fn outline(&self) -> &Arc<[OutlineNode]> {
        &self.outline
    }

    pub fn sections(&self) -> &ChapterAccumulator {
        &self.sections
    }

    pub fn terminal_artifact(&self) -> Option<&TerminalArtifact> {
        self.artifact.as_ref()
    }

    pub fn failure(&self) -> Option<&JobFailure> {
        self.failure.as_ref()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure.as_ref().map(|failure| failure.message.as_str())
    }

    pub fn conversion(&self) -> &ConversionState {
        &self.conversion
    }

    pub fn conversion_mut(&mut self) -> &mut ConversionState {
        &mut self.conversion
    }

    pub fn sync_record(&self) -> Option<&SyncRecord> {
        self.sync.as_ref()
    }

    pub fn sync_record_mut(&mut self) -> Option<&mut SyncRecord> {
        self.sync.as_mut()
    }

    pub fn materialize(&self) -> DocumentTree {
        self.sections.materialize(&self.outline)
    }

    /// `idle -> submitting`. Clears any buffered sections and sync state.
    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.expect_stage(JobStage::Idle, "start")?;
        self.sections.clear();
        self.completed_sections.clear();
        self.current_section = None;
        self.sync = None;
        self.stage = JobStage::Submitting;
        pipeline_info!("job {} submitting {}", self.id, self.request.kind);
        Ok(())
    }

    /// `submitting -> streaming` once the stream connection is open.
    pub fn connection_opened(&mut self) -> Result<(), TransitionError> {
        self.expect_stage(JobStage::Submitting, "open the stream")?;
        self.stage = JobStage::Streaming;
        pipeline_info!("job {} streaming", self.id);
        Ok(())
    }

    pub fn apply_frame(&mut self, frame: Frame) -> FrameOutcome {
        if self.stage != JobStage::Streaming {
            pipeline_debug!(
                "job {} ignoring frame while {:?}: {:?}",
                self.id,
                self.stage,
                frame.kind
            );
            return FrameOutcome::Ignored;
        }

        if let Some(progress) = frame.progress {
            self.apply_progress(progress);
        }
        if let Some(message) = frame.message {
            self.status_message = Some(message);
        }

        match frame.kind {
            FrameKind::Progress => FrameOutcome::Applied,
            FrameKind::Milestone { marker, outline } => {
                pipeline_info!("job {} reached {}", self.id, marker.as_str());
                self.milestones.push(marker);
                if let Some(outline) = outline {
                    self.outline = Arc::from(outline);
                }
                FrameOutcome::Applied
            }
            FrameKind::ChapterStart { section_id, title } => {
                let event = self.sections.on_section_start(&section_id, title.as_deref());
                if event != SectionEvent::StartAfterEnd {
                    self.current_section = Some(section_id);
                }
                FrameOutcome::Section(event)
            }
            FrameKind::ContentChunk {
                section_id,
                content,
            } => {
                let event = self.sections.on_fragment(&section_id, &content);
                if event != SectionEvent::FragmentAfterEnd {
                    self.current_section = Some(section_id);
                }
                FrameOutcome::Section(event)
            }
            FrameKind::ChapterEnd { section_id } => {
                let event = self.sections.on_section_end(&section_id);
                if matches!(event, SectionEvent::Ended | SectionEvent::EndedWithoutStart) {
                    pipeline_debug!("job {} finished section {section_id}", self.id);
                    if self.current_section.as_deref() == Some(section_id.as_str()) {
                        self.current_section = None;
                    }
                    self.completed_sections.push(section_id);
                }
                FrameOutcome::Section(event)
            }
            FrameKind::Completed(artifact) => {
                pipeline_info!(
                    "job {} completed with artifact {} ({} sections)",
                    self.id,
                    artifact.output_file,
                    self.completed_sections.len()
                );
                self.stage = JobStage::Completed;
                self.progress = 100;
                self.current_section = None;
                self.artifact = Some(artifact);
                self.sync = Some(SyncRecord::new());
                FrameOutcome::Completed
            }
            FrameKind::Failed { reason } => {
                pipeline_warn!("job {} failed: {reason}", self.id);
                self.fail(FailureSource::Business, reason);
                FrameOutcome::Failed
            }
        }
    }

    /// Fatal transport problem. Returns false if the job had already ended.
    pub fn fail_transport(&mut self, message: impl Into<String>) -> bool {
        if self.stage.is_terminal() {
            return false;
        }
        let message = message.into();
        pipeline_warn!(
            "job {} transport failure after {} sections: {message}",
            self.id,
            self.completed_sections.len()
        );
        self.fail(FailureSource::Transport, message);
        true
    }

    /// Operator cancellation. Returns false if the job had already ended.
    pub fn cancel(&mut self) -> bool {
        if self.stage.is_terminal() {
            return false;
        }
        pipeline_info!("job {} cancelled while {:?}", self.id, self.stage);
        self.stage = JobStage::Cancelled;
        self.current_section = None;
        true
    }

    fn fail(&mut self, source: FailureSource, message: String) {
        self.stage = JobStage::Failed;
        self.current_section = None;
        self.failure = Some(JobFailure { source, message });
    }

    fn apply_progress(&mut self, progress: u8) {
        if progress >= self.progress {
            self.progress = progress;
        } else {
            pipeline_debug!(
                "job {} ignoring progress regression {} -> {progress}",
                self.id,
                self.progress
            );
        }
    }

    fn expect_stage(&self, expected: JobStage, action: &'static str) -> Result<(), TransitionError> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(TransitionError {
                job_id: self.id,
                action,
                stage: self.stage,
            })
        }
    }
}
