use std::collections::HashSet;
use std::sync::Mutex;

use pipeline_logging::{pipeline_info, pipeline_warn};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::settings::map_reqwest_error;
use crate::{EngineSettings, JobId, SyncError, SyncReceipt, TransportError};

const SNIPPET_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    pub project_id: String,
    pub file_path: String,
    pub file_type: String,
}

/// Registers a finished artifact against a project record in the external store.
#[async_trait::async_trait]
pub trait SyncClient: Send + Sync {
    async fn register(&self, request: &SyncRequest) -> Result<SyncReceipt, SyncError>;
}

#[derive(Debug, Clone)]
pub struct HttpSyncClient {
    settings: EngineSettings,
    client: reqwest::Client,
}

impl HttpSyncClient {
    pub fn new(settings: EngineSettings) -> Result<Self, TransportError> {
        let client = settings.build_client(Some(settings.request_timeout))?;
        Ok(Self { settings, client })
    }
}

#[derive(Debug, Deserialize)]
struct SyncResponse {
    #[serde(default)]
    success: bool,
    message: Option<String>,
    data: Option<Value>,
    id: Option<Value>,
}

impl SyncResponse {
    fn external_reference(&self) -> Option<String> {
        let from_data = self.data.as_ref().and_then(|data| {
            data.get("id")
                .or_else(|| data.get("external_id"))
                .or_else(|| data.get("file_id"))
        });
        from_data.or(self.id.as_ref()).and_then(|value| match value {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
    }
}

#[async_trait::async_trait]
impl SyncClient for HttpSyncClient {
    async fn register(&self, request: &SyncRequest) -> Result<SyncReceipt, SyncError> {
        let url = self
            .settings
            .sync_url(&request.project_id)
            .map_err(SyncError::Transport)?;
        let body = json!({ "file_path": request.file_path, "file_type": request.file_type });

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(body.to_string())
            .send()
            .await
            .map_err(|err| SyncError::Transport(map_reqwest_error(err)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| SyncError::Transport(map_reqwest_error(err)))?;
        interpret_response(status.as_u16(), status.is_success(), &text, request)
    }
}

fn interpret_response(
    status: u16,
    status_ok: bool,
    text: &str,
    request: &SyncRequest,
) -> Result<SyncReceipt, SyncError> {
    // Anything that is not a JSON object is an infrastructure problem, not a store decision.
    let parsed: SyncResponse = match serde_json::from_str::<Value>(text) {
        Ok(value @ Value::Object(_)) => serde_json::from_value(value).map_err(|err| {
            SyncError::UnexpectedResponse {
                status,
                snippet: err.to_string(),
            }
        })?,
        Ok(_) | Err(_) => {
            return Err(SyncError::UnexpectedResponse {
                status,
                snippet: text.trim().chars().take(SNIPPET_CHARS).collect(),
            })
        }
    };

    if !status_ok || !parsed.success {
        return Err(SyncError::Rejected(
            parsed
                .message
                .clone()
                .unwrap_or_else(|| format!("store refused the artifact (status {status})")),
        ));
    }

    Ok(SyncReceipt {
        external_reference: parsed
            .external_reference()
            .unwrap_or_else(|| request.file_path.clone()),
        message: parsed.message,
    })
}

/// Client-side guard: at most one registration in flight per job.
#[derive(Debug, Default)]
pub struct SyncGate {
    in_flight: Mutex<HashSet<JobId>>,
}

impl SyncGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the registration unless one is already running for `job_id`.
    ///
    /// Never retries; a failure is returned to the caller as is.
    pub async fn sync_once(
        &self,
        client: &dyn SyncClient,
        job_id: JobId,
        request: &SyncRequest,
    ) -> Result<SyncReceipt, SyncError> {
        if !self.claim(job_id) {
            pipeline_warn!("job {job_id} sync already in flight; request dropped");
            return Err(SyncError::AlreadyInFlight(job_id));
        }
        let result = client.register(request).await;
        self.release(job_id);

        match &result {
            Ok(receipt) => pipeline_info!(
                "job {job_id} registered {} as {}",
                request.file_path,
                receipt.external_reference
            ),
            Err(err) => pipeline_warn!("job {job_id} sync failed: {err}"),
        }
        result
    }

    fn claim(&self, job_id: JobId) -> bool {
        match self.in_flight.lock() {
            Ok(mut guard) => guard.insert(job_id),
            Err(poisoned) => poisoned.into_inner().insert(job_id),
        }
    }

    fn release(&self, job_id: JobId) {
        match self.in_flight.lock() {
            Ok(mut guard) => guard.remove(&job_id),
            Err(poisoned) => poisoned.into_inner().remove(&job_id),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SyncRequest {
        SyncRequest {
            project_id: "1".into(),
            file_path: "out/a.docx".into(),
            file_type: "tech_proposal".into(),
        }
    }

    #[test]
    fn html_body_is_unexpected_response() {
        let err = interpret_response(502, false, "<html>Bad Gateway</html>", &request()).unwrap_err();
        assert!(matches!(err, SyncError::UnexpectedResponse { status: 502, .. }));
    }

    #[test]
    fn json_failure_is_rejection() {
        let err = interpret_response(
            200,
            true,
            r#"{"success": false, "message": "project locked"}"#,
            &request(),
        )
        .unwrap_err();
        assert_eq!(err, SyncError::Rejected("project locked".into()));
    }

    #[test]
    fn numeric_ids_become_references() {
        let receipt =
            interpret_response(200, true, r#"{"success": true, "data": {"id": 55}}"#, &request())
                .unwrap();
        assert_eq!(receipt.external_reference, "55");
    }
}
