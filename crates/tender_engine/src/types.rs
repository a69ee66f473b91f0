use std::fmt;

use serde_json::{Map, Value};

pub type JobId = u64;

/// One decoded frame, uninterpreted.
pub type RawFrame = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    StreamOpened {
        job_id: JobId,
    },
    Frame {
        job_id: JobId,
        frame: RawFrame,
    },
    /// The server closed the stream normally.
    StreamEnded {
        job_id: JobId,
    },
    StreamFailed {
        job_id: JobId,
        error: TransportError,
    },
    ConversionCompleted {
        job_id: JobId,
        attempt: u32,
        result: Result<String, ConversionError>,
    },
    SyncCompleted {
        job_id: JobId,
        result: Result<SyncReceipt, SyncError>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: FailureKind,
    pub message: String,
}

impl TransportError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    /// No response headers or no frame within the idle timeout.
    IdleTimeout,
    Timeout,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::IdleTimeout => write!(f, "stream idle timeout"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    #[error("conversion request failed: {0}")]
    Transport(TransportError),
    #[error("conversion rejected: {0}")]
    Rejected(String),
    #[error("conversion returned an empty document")]
    Empty,
}

/// Acknowledgement from the project store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReceipt {
    pub external_reference: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
    #[error("sync request failed: {0}")]
    Transport(TransportError),
    /// The store answered in JSON and reported a failure.
    #[error("sync rejected: {0}")]
    Rejected(String),
    /// The store answered with something other than JSON (typically an HTML error page).
    #[error("unexpected server response (status {status}): {snippet}")]
    UnexpectedResponse { status: u16, snippet: String },
    #[error("a sync for job {0} is already in flight")]
    AlreadyInFlight(JobId),
}

#[derive(Debug, thiserror::Error)]
pub enum EngineStartError {
    #[error("failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("failed to build http client: {0}")]
    Client(#[from] TransportError),
}
