use chrono::Utc;
use tender_core::GenerationJob;
use tender_engine::{export_job, ExportDir, ExportDocument, ExportError, SavedExport};

/// Save the assembled document, plus the editable view when conversion succeeded.
pub fn save_job(
    dir: &ExportDir,
    job: &GenerationJob,
    title: &str,
) -> Result<SavedExport, ExportError> {
    let generated_utc = Utc::now().to_rfc3339();
    let body = job.materialize().to_markdown();
    let artifact = job.terminal_artifact();

    let doc = ExportDocument {
        title,
        target: job.target(),
        kind: job.request().kind.as_str(),
        job_id: job.id(),
        generated_utc: &generated_utc,
        artifact: artifact.map(|artifact| artifact.output_file.as_str()),
        stats: artifact.map(|artifact| &artifact.stats),
        body_markdown: &body,
    };
    export_job(dir, &doc, job.conversion().html())
}
