use pipeline_logging::pipeline_debug;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::json;

use crate::settings::map_reqwest_error;
use crate::{ConversionError, EngineSettings, FailureKind, TransportError};

/// Turns a generated artifact into an editable HTML view.
#[async_trait::async_trait]
pub trait Converter: Send + Sync {
    async fn to_editable_html(&self, artifact: &str) -> Result<String, ConversionError>;
}

#[derive(Debug, Clone)]
pub struct HttpConverter {
    settings: EngineSettings,
    client: reqwest::Client,
}

impl HttpConverter {
    pub fn new(settings: EngineSettings) -> Result<Self, TransportError> {
        let client = settings.build_client(Some(settings.request_timeout))?;
        Ok(Self { settings, client })
    }
}

#[derive(Debug, Deserialize)]
struct ConvertResponse {
    success: Option<bool>,
    html: Option<String>,
    content: Option<String>,
    message: Option<String>,
}

#[async_trait::async_trait]
impl Converter for HttpConverter {
    async fn to_editable_html(&self, artifact: &str) -> Result<String, ConversionError> {
        let url = self
            .settings
            .endpoint_url(&self.settings.convert_path)
            .map_err(ConversionError::Transport)?;
        let file_url = self
            .settings
            .artifact_url(artifact)
            .map_err(ConversionError::Transport)?;
        let body = json!({ "file_path": artifact, "file_url": file_url.as_str() });

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await
            .map_err(|err| ConversionError::Transport(map_reqwest_error(err)))?;

        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|ct| ct.contains("json"));
        let text = response
            .text()
            .await
            .map_err(|err| ConversionError::Transport(map_reqwest_error(err)))?;

        if !status.is_success() {
            return Err(ConversionError::Transport(TransportError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            )));
        }

        let html = if is_json {
            let parsed: ConvertResponse = serde_json::from_str(&text)
                .map_err(|err| ConversionError::Rejected(format!("invalid JSON: {err}")))?;
            if parsed.success == Some(false) {
                return Err(ConversionError::Rejected(
                    parsed.message.unwrap_or_else(|| "conversion failed".to_string()),
                ));
            }
            parsed.html.or(parsed.content).unwrap_or_default()
        } else {
            text
        };

        if html.trim().is_empty() {
            return Err(ConversionError::Empty);
        }
        pipeline_debug!("converted {artifact} into {} bytes of html", html.len());
        Ok(html)
    }
}
