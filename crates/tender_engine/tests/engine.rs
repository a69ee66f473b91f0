mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::{stream, StreamExt};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tender_engine::{
    ConversionError, Converter, EngineClients, EngineEvent, EngineHandle, EngineSettings,
    FrameDecoder, FrameStream, GenerationClient, SyncClient, SyncError, SyncReceipt, SyncRequest,
    TransportError,
};

use common::init_logging;

/// Replays a fixed body; optionally never finishes.
struct ScriptedStream {
    body: &'static str,
    hang: bool,
}

#[async_trait::async_trait]
impl GenerationClient for ScriptedStream {
    async fn open(&self, _endpoint: &str, _payload: &Value) -> Result<FrameStream, TransportError> {
        let chunks: Vec<Result<Bytes, TransportError>> =
            vec![Ok(Bytes::from_static(self.body.as_bytes()))];
        let bytes = if self.hang {
            stream::iter(chunks).chain(stream::pending()).boxed()
        } else {
            stream::iter(chunks).boxed()
        };
        Ok(FrameStream::new(bytes, FrameDecoder::new(None)))
    }
}

struct EchoConverter;

#[async_trait::async_trait]
impl Converter for EchoConverter {
    async fn to_editable_html(&self, artifact: &str) -> Result<String, ConversionError> {
        Ok(format!("<p>{artifact}</p>"))
    }
}

#[derive(Default)]
struct SlowStore {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl SyncClient for SlowStore {
    async fn register(&self, request: &SyncRequest) -> Result<SyncReceipt, SyncError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(SyncReceipt {
            external_reference: format!("ext-{}", request.project_id),
            message: None,
        })
    }
}

fn handle(generation: ScriptedStream, store: Arc<SlowStore>) -> EngineHandle {
    let clients = EngineClients {
        generation: Arc::new(generation),
        converter: Arc::new(EchoConverter),
        sync: store,
    };
    EngineHandle::with_clients(EngineSettings::default(), clients).unwrap()
}

fn collect(engine: &EngineHandle, count: usize) -> Vec<EngineEvent> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut events = Vec::new();
    while events.len() < count && Instant::now() < deadline {
        if let Some(event) = engine.recv_timeout(Duration::from_millis(50)) {
            events.push(event);
        }
    }
    events
}

#[test]
fn generation_events_arrive_in_order() {
    init_logging();
    let engine = handle(
        ScriptedStream {
            body: "data: {\"progress\": 5}\n\ndata: {\"stage\":\"completed\",\"output_file\":\"a.docx\"}\n\n",
            hang: false,
        },
        Arc::default(),
    );

    engine.generate(1, "/api/generation/technical_proposal/stream", json!({}));
    let events = collect(&engine, 4);

    assert_eq!(events.len(), 4);
    assert_eq!(events[0], EngineEvent::StreamOpened { job_id: 1 });
    assert!(matches!(events[1], EngineEvent::Frame { job_id: 1, .. }));
    assert!(matches!(events[2], EngineEvent::Frame { job_id: 1, .. }));
    assert_eq!(events[3], EngineEvent::StreamEnded { job_id: 1 });
}

#[test]
fn cancelled_stream_goes_quiet() {
    init_logging();
    let engine = handle(
        ScriptedStream {
            body: "data: {\"progress\": 5}\n\n",
            hang: true,
        },
        Arc::default(),
    );

    engine.generate(2, "/stream", json!({}));
    let opened = collect(&engine, 2);
    assert_eq!(opened.len(), 2);

    engine.cancel(2);
    assert_eq!(engine.recv_timeout(Duration::from_millis(300)), None);
}

#[test]
fn conversion_reports_its_attempt() {
    init_logging();
    let engine = handle(
        ScriptedStream {
            body: "",
            hang: false,
        },
        Arc::default(),
    );

    engine.convert(3, 2, "outputs/a.docx");
    assert_eq!(
        collect(&engine, 1),
        vec![EngineEvent::ConversionCompleted {
            job_id: 3,
            attempt: 2,
            result: Ok("<p>outputs/a.docx</p>".to_string()),
        }]
    );
}

#[test]
fn duplicate_sync_commands_reach_the_store_once() {
    init_logging();
    let store = Arc::new(SlowStore::default());
    let engine = handle(
        ScriptedStream {
            body: "",
            hang: false,
        },
        Arc::clone(&store),
    );
    let request = SyncRequest {
        project_id: "9".to_string(),
        file_path: "a.docx".to_string(),
        file_type: "tech_proposal".to_string(),
    };

    engine.sync(4, request.clone());
    engine.sync(4, request);
    let events = collect(&engine, 2);

    assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    assert!(events.contains(&EngineEvent::SyncCompleted {
        job_id: 4,
        result: Err(SyncError::AlreadyInFlight(4)),
    }));
    assert!(events.contains(&EngineEvent::SyncCompleted {
        job_id: 4,
        result: Ok(SyncReceipt {
            external_reference: "ext-9".to_string(),
            message: None,
        }),
    }));
}
