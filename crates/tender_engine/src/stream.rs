use std::time::Duration;

use futures_util::StreamExt;
use pipeline_logging::{pipeline_debug, pipeline_info, pipeline_warn};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::decode::{FrameDecoder, FrameStream};
use crate::settings::map_reqwest_error;
use crate::{EngineEvent, EngineSettings, FailureKind, JobId, TransportError};

pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelEventSink {
    tx: std::sync::mpsc::Sender<EngineEvent>,
}

impl ChannelEventSink {
    pub fn new(tx: std::sync::mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

/// Opens the long-lived progress stream of a generation job.
#[async_trait::async_trait]
pub trait GenerationClient: Send + Sync {
    async fn open(&self, endpoint: &str, payload: &Value) -> Result<FrameStream, TransportError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestGenerationClient {
    settings: EngineSettings,
    client: reqwest::Client,
}

impl ReqwestGenerationClient {
    pub fn new(settings: EngineSettings) -> Result<Self, TransportError> {
        // No total timeout: the body stays open for the whole generation.
        let client = settings.build_client(None)?;
        Ok(Self { settings, client })
    }
}

#[async_trait::async_trait]
impl GenerationClient for ReqwestGenerationClient {
    async fn open(&self, endpoint: &str, payload: &Value) -> Result<FrameStream, TransportError> {
        let url = self.settings.endpoint_url(endpoint)?;
        let body = serde_json::to_vec(payload)
            .map_err(|err| TransportError::new(FailureKind::Network, err.to_string()))?;

        let send = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream")
            .body(body)
            .send();
        let response = tokio::time::timeout(self.settings.idle_timeout, send)
            .await
            .map_err(|_| {
                TransportError::new(
                    FailureKind::IdleTimeout,
                    format!("no response within {:?}", self.settings.idle_timeout),
                )
            })?
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(ToOwned::to_owned);
        let decoder = FrameDecoder::new(content_type.as_deref());
        pipeline_debug!(
            "stream open at {} ({})",
            response.url(),
            decoder.encoding_label()
        );

        let bytes = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(map_reqwest_error));
        Ok(FrameStream::new(bytes, decoder))
    }
}

/// How a stream stopped being read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    Closed,
    Cancelled,
    Failed(TransportError),
}

/// Forward every frame to `sink` in arrival order until the stream ends,
/// stalls for longer than `idle_timeout`, or `cancel` fires.
pub async fn pump_frames(
    job_id: JobId,
    mut frames: FrameStream,
    sink: &dyn EventSink,
    idle_timeout: Duration,
    cancel: &CancellationToken,
) -> StreamEnd {
    let mut count: u64 = 0;
    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                pipeline_debug!("job {job_id} stream cancelled after {count} frames");
                return StreamEnd::Cancelled;
            }
            next = tokio::time::timeout(idle_timeout, frames.next()) => next,
        };

        match next {
            Err(_) => {
                return StreamEnd::Failed(TransportError::new(
                    FailureKind::IdleTimeout,
                    format!("no frame received for {idle_timeout:?}"),
                ));
            }
            Ok(None) => {
                pipeline_debug!(
                    "job {job_id} stream closed after {count} frames ({} skipped)",
                    frames.skipped()
                );
                return StreamEnd::Closed;
            }
            Ok(Some(Err(err))) => return StreamEnd::Failed(err),
            Ok(Some(Ok(frame))) => {
                count += 1;
                sink.emit(EngineEvent::Frame { job_id, frame });
            }
        }
    }
}

/// Open the stream for a job and report everything that happens on it.
///
/// A cancelled job reports nothing further once cancellation is observed.
pub async fn run_generation(
    client: &dyn GenerationClient,
    job_id: JobId,
    endpoint: &str,
    payload: &Value,
    sink: &dyn EventSink,
    idle_timeout: Duration,
    cancel: &CancellationToken,
) {
    let opened = tokio::select! {
        biased;
        () = cancel.cancelled() => return,
        opened = client.open(endpoint, payload) => opened,
    };
    let frames = match opened {
        Ok(frames) => frames,
        Err(error) => {
            pipeline_warn!("job {job_id} could not open stream: {error}");
            sink.emit(EngineEvent::StreamFailed { job_id, error });
            return;
        }
    };

    pipeline_info!("job {job_id} stream opened at {endpoint}");
    sink.emit(EngineEvent::StreamOpened { job_id });
    match pump_frames(job_id, frames, sink, idle_timeout, cancel).await {
        StreamEnd::Closed => sink.emit(EngineEvent::StreamEnded { job_id }),
        StreamEnd::Cancelled => {}
        StreamEnd::Failed(error) => {
            pipeline_warn!("job {job_id} stream failed: {error}");
            sink.emit(EngineEvent::StreamFailed { job_id, error });
        }
    }
}
