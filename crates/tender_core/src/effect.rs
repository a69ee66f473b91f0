use crate::job::JobId;
use crate::request::GenerationRequest;

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    OpenStream {
        job_id: JobId,
        request: GenerationRequest,
    },
    CloseStream {
        job_id: JobId,
    },
    ConvertArtifact {
        job_id: JobId,
        file: String,
        attempt: u32,
    },
    SyncArtifact {
        job_id: JobId,
        project_id: String,
        file_path: String,
        file_type: String,
    },
    Notify(Notice),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Operator-facing message; how it is shown is up to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub job_id: Option<JobId>,
    pub severity: Severity,
    pub text: String,
}

impl Notice {
    pub fn new(job_id: Option<JobId>, severity: Severity, text: impl Into<String>) -> Self {
        Self {
            job_id,
            severity,
            text: text.into(),
        }
    }
}
