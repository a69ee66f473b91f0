use tender_core::{GenerationJob, JobId, JobStage, Notice, Severity, StageMarker, SyncStatus};

/// What was last printed for the job, so only changes produce output.
#[derive(Debug, Default)]
pub struct Reporter {
    last: Option<Printed>,
}

#[derive(Debug, Clone, PartialEq)]
struct Printed {
    job_id: JobId,
    stage: JobStage,
    progress: u8,
    milestone: Option<StageMarker>,
    section: Option<String>,
    completed_sections: usize,
    editable: bool,
    conversion_warning: bool,
    sync: Option<SyncStatus>,
}

impl Printed {
    fn fresh(job_id: JobId) -> Self {
        Self {
            job_id,
            stage: JobStage::Idle,
            progress: 0,
            milestone: None,
            section: None,
            completed_sections: 0,
            editable: false,
            conversion_warning: false,
            sync: None,
        }
    }

    fn from_job(job: &GenerationJob) -> Self {
        Self {
            job_id: job.id(),
            stage: job.stage(),
            progress: job.progress_percent(),
            milestone: job.milestones().last().copied(),
            section: job.current_section_id().map(ToOwned::to_owned),
            completed_sections: job.completed_section_ids().len(),
            editable: job.conversion().html().is_some(),
            conversion_warning: job.conversion().warning().is_some(),
            sync: job.sync_record().map(|record| record.status()),
        }
    }
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Terminal lines describing what changed since the previous call.
    pub fn lines(&mut self, job: &GenerationJob) -> Vec<String> {
        let now = Printed::from_job(job);
        let mut lines = Vec::new();
        let before = match self.last.take() {
            Some(before) if before.job_id == now.job_id => before,
            _ => {
                lines.push(format!(
                    "job {} started: {} for {}",
                    job.id(),
                    job.request().kind,
                    job.target()
                ));
                Printed::fresh(now.job_id)
            }
        };
        lines.extend(diff(&before, &now, job));
        self.last = Some(now);
        lines
    }
}

fn diff(before: &Printed, now: &Printed, job: &GenerationJob) -> Vec<String> {
    let mut lines = Vec::new();
    if now.milestone != before.milestone {
        if let Some(marker) = now.milestone {
            lines.push(format!("reached {}", marker.as_str()));
        }
    }
    if now.section != before.section {
        if let Some(section) = &now.section {
            lines.push(format!("writing section {section}"));
        }
    }
    if now.completed_sections > before.completed_sections {
        lines.push(format!("{} section(s) finished", now.completed_sections));
    }
    if now.progress != before.progress {
        let status = job.status_message().unwrap_or("");
        lines.push(format!("{:>3}% {status}", now.progress).trim_end().to_string());
    }
    if now.stage != before.stage {
        match (now.stage, job.failure()) {
            (JobStage::Failed, Some(failure)) => lines.push(format!(
                "generation failed ({:?}): {}",
                failure.source, failure.message
            )),
            (JobStage::Completed, _) => {
                let artifacts = job
                    .terminal_artifact()
                    .map(|artifact| artifact.artifact_paths().join(", "))
                    .unwrap_or_default();
                lines.push(format!("generation completed: {artifacts}"));
            }
            (stage, _) => lines.push(format!("stage: {stage:?}")),
        }
    }
    if now.editable && !before.editable {
        lines.push("editable view ready".to_string());
    }
    if now.conversion_warning && !before.conversion_warning {
        if let Some(warning) = job.conversion().warning() {
            lines.push(warning);
        }
    }
    if now.sync != before.sync {
        let record = job.sync_record();
        match now.sync {
            Some(SyncStatus::Synced) => lines.push(format!(
                "synced as {}",
                record
                    .and_then(|record| record.external_reference())
                    .unwrap_or("?")
            )),
            Some(SyncStatus::Failed) => lines.push(format!(
                "sync failed after {} attempt(s): {}",
                record.map_or(0, |record| record.attempts()),
                record
                    .and_then(|record| record.failure())
                    .map(|failure| failure.message.as_str())
                    .unwrap_or("unknown error")
            )),
            Some(SyncStatus::Syncing) => lines.push("syncing artifact".to_string()),
            Some(SyncStatus::Unsynced) | None => {}
        }
    }
    lines
}

pub fn print_notice(notice: &Notice) {
    match notice.severity {
        Severity::Info => println!("{}", notice.text),
        Severity::Warning => eprintln!("warning: {}", notice.text),
        Severity::Error => eprintln!("error: {}", notice.text),
    }
}
