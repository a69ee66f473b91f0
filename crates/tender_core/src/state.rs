use std::collections::BTreeMap;
use std::sync::Arc;

use crate::job::{GenerationJob, JobId};
use crate::outline::OutlineNode;
use crate::request::GenerationRequest;
use crate::view_model::{AppViewModel, JobView};

/// All live generation jobs, at most one per target.
///
/// A target names the thing being generated (for example a project and a kind);
/// starting a new job for a target discards the previous one.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    jobs: BTreeMap<String, GenerationJob>,
    next_job_id: JobId,
    dirty: bool,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            jobs: self.jobs.values().map(JobView::from_job).collect(),
            dirty: self.dirty,
        }
    }

    pub fn job(&self, target: &str) -> Option<&GenerationJob> {
        self.jobs.get(target)
    }

    pub fn job_by_id(&self, job_id: JobId) -> Option<&GenerationJob> {
        self.jobs.values().find(|job| job.id() == job_id)
    }

    pub fn consume_dirty(&mut self) -> bool {
        let was_dirty = self.dirty;
        self.dirty = false;
        was_dirty
    }

    pub(crate) fn job_mut(&mut self, target: &str) -> Option<&mut GenerationJob> {
        self.jobs.get_mut(target)
    }

    pub(crate) fn job_by_id_mut(&mut self, job_id: JobId) -> Option<&mut GenerationJob> {
        self.jobs.values_mut().find(|job| job.id() == job_id)
    }

    /// Install a fresh idle job for `target`, returning whatever it replaced.
    pub(crate) fn replace_job(
        &mut self,
        target: &str,
        request: GenerationRequest,
    ) -> (Option<GenerationJob>, &mut GenerationJob) {
        self.next_job_id += 1;
        let previous = self.jobs.remove(target);
        let outline: Arc<[OutlineNode]> = previous
            .as_ref()
            .map_or_else(|| Arc::from(Vec::new()), |job| Arc::clone(job.outline()));
        let job = GenerationJob::new(self.next_job_id, target, request).with_outline(outline);
        let slot = self.jobs.entry(target.to_string()).or_insert(job);
        (previous, slot)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}
