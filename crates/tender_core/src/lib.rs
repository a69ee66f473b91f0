//! Tender core: pure generation-job state machine, chapter accumulation and preview rendering.
mod accumulator;
mod effect;
mod finalize;
mod frame;
mod job;
mod msg;
mod outline;
mod request;
mod state;
mod sync;
mod update;
mod view_model;

pub use accumulator::{ChapterAccumulator, SectionBuffer, SectionEvent};
pub use effect::{Effect, Notice, Severity};
pub use finalize::{ConversionState, ConversionStep, MAX_CONVERSION_ATTEMPTS};
pub use frame::{Frame, FrameError, FrameKind, StageMarker, TerminalArtifact};
pub use job::{
    FailureSource, FrameOutcome, GenerationJob, JobFailure, JobId, JobStage, TransitionError,
};
pub use msg::Msg;
pub use outline::{render, DocumentTree, OutlineNode, RenderedSection, SectionState};
pub use request::{GenerationKind, GenerationRequest, UnknownKind};
pub use state::AppState;
pub use sync::{SyncFailure, SyncFailureKind, SyncRecord, SyncRejected, SyncStatus, SyncTrigger};
pub use update::update;
pub use view_model::{AppViewModel, JobView};
