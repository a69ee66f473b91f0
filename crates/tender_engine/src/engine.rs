use std::collections::HashMap;
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use pipeline_logging::{pipeline_debug, pipeline_warn};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::convert::{Converter, HttpConverter};
use crate::stream::{run_generation, ChannelEventSink, GenerationClient, ReqwestGenerationClient};
use crate::sync::{HttpSyncClient, SyncClient, SyncGate, SyncRequest};
use crate::{EngineEvent, EngineSettings, EngineStartError, JobId};

enum EngineCommand {
    Generate {
        job_id: JobId,
        endpoint: String,
        payload: Value,
    },
    Cancel {
        job_id: JobId,
    },
    Convert {
        job_id: JobId,
        attempt: u32,
        artifact: String,
    },
    Sync {
        job_id: JobId,
        request: SyncRequest,
    },
}

/// Collaborators the engine talks to; swapped out in tests.
#[derive(Clone)]
pub struct EngineClients {
    pub generation: Arc<dyn GenerationClient>,
    pub converter: Arc<dyn Converter>,
    pub sync: Arc<dyn SyncClient>,
}

impl EngineClients {
    pub fn http(settings: &EngineSettings) -> Result<Self, EngineStartError> {
        Ok(Self {
            generation: Arc::new(ReqwestGenerationClient::new(settings.clone())?),
            converter: Arc::new(HttpConverter::new(settings.clone())?),
            sync: Arc::new(HttpSyncClient::new(settings.clone())?),
        })
    }
}

type CancelTokens = Arc<Mutex<HashMap<JobId, CancellationToken>>>;

/// Runs IO on a background tokio runtime and reports back through a channel.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn new(settings: EngineSettings) -> Result<Self, EngineStartError> {
        let clients = EngineClients::http(&settings)?;
        Self::with_clients(settings, clients)
    }

    pub fn with_clients(
        settings: EngineSettings,
        clients: EngineClients,
    ) -> Result<Self, EngineStartError> {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let runtime = tokio::runtime::Runtime::new()?;
        let idle_timeout = settings.idle_timeout;

        thread::spawn(move || {
            let tokens: CancelTokens = Arc::default();
            let gate = Arc::new(SyncGate::new());
            while let Ok(command) = cmd_rx.recv() {
                dispatch(
                    &runtime,
                    command,
                    &clients,
                    &tokens,
                    &gate,
                    idle_timeout,
                    &event_tx,
                );
            }
            pipeline_debug!("engine command channel closed");
        });

        Ok(Self { cmd_tx, event_rx })
    }

    pub fn generate(&self, job_id: JobId, endpoint: impl Into<String>, payload: Value) {
        self.send(EngineCommand::Generate {
            job_id,
            endpoint: endpoint.into(),
            payload,
        });
    }

    /// Close the job's stream; frames still in flight are dropped.
    pub fn cancel(&self, job_id: JobId) {
        self.send(EngineCommand::Cancel { job_id });
    }

    pub fn convert(&self, job_id: JobId, attempt: u32, artifact: impl Into<String>) {
        self.send(EngineCommand::Convert {
            job_id,
            attempt,
            artifact: artifact.into(),
        });
    }

    pub fn sync(&self, job_id: JobId, request: SyncRequest) {
        self.send(EngineCommand::Sync { job_id, request });
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    fn send(&self, command: EngineCommand) {
        if self.cmd_tx.send(command).is_err() {
            pipeline_warn!("engine thread is gone; command dropped");
        }
    }
}

fn dispatch(
    runtime: &tokio::runtime::Runtime,
    command: EngineCommand,
    clients: &EngineClients,
    tokens: &CancelTokens,
    gate: &Arc<SyncGate>,
    idle_timeout: Duration,
    event_tx: &mpsc::Sender<EngineEvent>,
) {
    match command {
        EngineCommand::Generate {
            job_id,
            endpoint,
            payload,
        } => {
            let token = CancellationToken::new();
            if let Ok(mut map) = tokens.lock() {
                map.insert(job_id, token.clone());
            }
            let client = Arc::clone(&clients.generation);
            let tokens = Arc::clone(tokens);
            let sink = ChannelEventSink::new(event_tx.clone());
            runtime.spawn(async move {
                run_generation(
                    client.as_ref(),
                    job_id,
                    &endpoint,
                    &payload,
                    &sink,
                    idle_timeout,
                    &token,
                )
                .await;
                if let Ok(mut map) = tokens.lock() {
                    map.remove(&job_id);
                }
            });
        }
        EngineCommand::Cancel { job_id } => {
            let token = tokens.lock().ok().and_then(|mut map| map.remove(&job_id));
            match token {
                Some(token) => token.cancel(),
                None => pipeline_debug!("cancel for job {job_id} with no open stream"),
            }
        }
        EngineCommand::Convert {
            job_id,
            attempt,
            artifact,
        } => {
            let converter = Arc::clone(&clients.converter);
            let event_tx = event_tx.clone();
            runtime.spawn(async move {
                let result = converter.to_editable_html(&artifact).await;
                let _ = event_tx.send(EngineEvent::ConversionCompleted {
                    job_id,
                    attempt,
                    result,
                });
            });
        }
        EngineCommand::Sync { job_id, request } => {
            let client = Arc::clone(&clients.sync);
            let gate = Arc::clone(gate);
            let event_tx = event_tx.clone();
            runtime.spawn(async move {
                let result = gate.sync_once(client.as_ref(), job_id, &request).await;
                let _ = event_tx.send(EngineEvent::SyncCompleted { job_id, result });
            });
        }
    }
}
