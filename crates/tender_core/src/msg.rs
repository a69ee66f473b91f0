use crate::frame::Frame;
use crate::job::JobId;
use crate::request::GenerationRequest;
use crate::sync::SyncFailure;

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Caller asked for a new generation for a target; replaces any previous job there.
    StartGeneration {
        target: String,
        request: GenerationRequest,
    },
    /// The stream connection for a job is open.
    StreamOpened { job_id: JobId },
    /// One decoded frame arrived on a job's stream.
    FrameReceived { job_id: JobId, frame: Frame },
    /// The stream reached end-of-data.
    StreamEnded { job_id: JobId },
    /// The stream could not be opened or broke (HTTP status, timeout, network).
    StreamFailed { job_id: JobId, message: String },
    /// Operator cancelled the job for a target.
    CancelRequested { target: String },
    /// Conversion of the artifact into an editable view finished.
    ConversionFinished {
        job_id: JobId,
        result: Result<String, String>,
    },
    /// Operator asked to (re)sync the artifact of a target.
    SyncRequested { target: String },
    /// External registration finished; `Ok` carries the external reference.
    SyncFinished {
        job_id: JobId,
        result: Result<String, SyncFailure>,
    },
    /// UI/render tick to coalesce rendering.
    Tick,
    /// An engine event with nothing for the core, e.g. a frame that failed to parse.
    NoOp,
}
