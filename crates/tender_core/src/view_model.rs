use crate::frame::StageMarker;
use crate::job::{GenerationJob, JobFailure, JobId, JobStage};
use crate::outline::DocumentTree;
use crate::request::GenerationKind;
use crate::sync::{SyncFailure, SyncStatus};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub jobs: Vec<JobView>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobView {
    pub job_id: JobId,
    pub target: String,
    pub kind: GenerationKind,
    pub stage: JobStage,
    pub progress: u8,
    pub status_message: Option<String>,
    pub last_milestone: Option<StageMarker>,
    pub current_section: Option<String>,
    pub completed_sections: usize,
    pub document: DocumentTree,
    pub failure: Option<JobFailure>,
    pub artifacts: Vec<String>,
    /// Converted editable view, once available.
    pub editable_html: Option<String>,
    /// Set when conversion gave up; the artifact remains downloadable.
    pub conversion_warning: Option<String>,
    pub sync_status: Option<SyncStatus>,
    pub sync_reference: Option<String>,
    pub sync_failure: Option<SyncFailure>,
}

impl JobView {
    pub fn from_job(job: &GenerationJob) -> Self {
        let sync = job.sync_record();

        Self {
            job_id: job.id(),
            target: job.target().to_string(),
            kind: job.request().kind,
            stage: job.stage(),
            progress: job.progress_percent(),
            status_message: job.status_message().map(ToOwned::to_owned),
            last_milestone: job.milestones().last().copied(),
            current_section: job.current_section_id().map(ToOwned::to_owned),
            completed_sections: job.completed_section_ids().len(),
            document: job.materialize(),
            failure: job.failure().cloned(),
            artifacts: job
                .terminal_artifact()
                .map(|artifact| {
                    artifact
                        .artifact_paths()
                        .into_iter()
                        .map(ToOwned::to_owned)
                        .collect()
                })
                .unwrap_or_default(),
            editable_html: job.conversion().html().map(ToOwned::to_owned),
            conversion_warning: job.conversion().warning(),
            sync_status: sync.map(|record| record.status()),
            sync_reference: sync
                .and_then(|record| record.external_reference())
                .map(ToOwned::to_owned),
            sync_failure: sync.and_then(|record| record.failure()).cloned(),
        }
    }
}
