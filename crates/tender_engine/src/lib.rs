//! Tender engine: stream transport, frame decoding and the remote collaborators.
mod convert;
mod decode;
mod engine;
mod export;
mod filename;
mod settings;
mod stream;
mod sync;
mod types;

pub use convert::{Converter, HttpConverter};
pub use decode::{FrameDecoder, FrameStream};
pub use engine::{EngineClients, EngineHandle};
pub use export::{build_export, export_job, ExportDir, ExportDocument, ExportError, SavedExport};
pub use filename::export_filename;
pub use settings::EngineSettings;
pub use stream::{
    pump_frames, run_generation, ChannelEventSink, EventSink, GenerationClient,
    ReqwestGenerationClient, StreamEnd,
};
pub use sync::{HttpSyncClient, SyncClient, SyncGate, SyncRequest};
pub use types::{
    ConversionError, EngineEvent, EngineStartError, FailureKind, JobId, RawFrame, SyncError,
    SyncReceipt, TransportError,
};
