use std::time::Duration;

use crate::{FailureKind, TransportError};

#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Server root, e.g. `https://bids.example.com` (a path prefix is kept).
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Longest accepted silence: waiting for response headers and between frames.
    pub idle_timeout: Duration,
    /// Whole-request limit for the non-streaming conversion and sync calls.
    pub request_timeout: Duration,
    pub convert_path: String,
    /// Sync endpoint; `{project_id}` marks the id's path segment.
    pub sync_path: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(120),
            request_timeout: Duration::from_secs(60),
            convert_path: "/api/documents/convert".to_string(),
            sync_path: "/api/projects/{project_id}/files".to_string(),
        }
    }
}

impl EngineSettings {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Join `path` onto the base URL.
    pub fn endpoint_url(&self, path: &str) -> Result<url::Url, TransportError> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return url::Url::parse(path)
                .map_err(|err| TransportError::new(FailureKind::InvalidUrl, err.to_string()));
        }
        let joined = format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url::Url::parse(&joined)
            .map_err(|err| TransportError::new(FailureKind::InvalidUrl, format!("{joined}: {err}")))
    }

    /// The id is pushed as a single percent-encoded path segment.
    pub fn sync_url(&self, project_id: &str) -> Result<url::Url, TransportError> {
        let invalid = |message: String| TransportError::new(FailureKind::InvalidUrl, message);
        let (prefix, suffix) = self
            .sync_path
            .split_once("{project_id}")
            .ok_or_else(|| invalid(format!("sync path {:?} lacks {{project_id}}", self.sync_path)))?;
        let mut url = self.endpoint_url(prefix)?;
        url.path_segments_mut()
            .map_err(|()| invalid(format!("{} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .push(project_id)
            .extend(suffix.split('/').filter(|segment| !segment.is_empty()));
        Ok(url)
    }

    /// Download location of an artifact reference; absolute URLs pass through.
    pub fn artifact_url(&self, artifact: &str) -> Result<url::Url, TransportError> {
        self.endpoint_url(artifact)
    }

    pub(crate) fn build_client(&self, total_timeout: Option<Duration>) -> Result<reqwest::Client, TransportError> {
        let mut builder = reqwest::Client::builder().connect_timeout(self.connect_timeout);
        if let Some(timeout) = total_timeout {
            builder = builder.timeout(timeout);
        }
        builder
            .build()
            .map_err(|err| TransportError::new(FailureKind::Network, err.to_string()))
    }
}

pub(crate) fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::new(FailureKind::Timeout, err.to_string());
    }
    TransportError::new(FailureKind::Network, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_path_prefix_is_kept() {
        let settings = EngineSettings::with_base_url("https://bids.example.com/backend/");
        assert_eq!(
            settings.endpoint_url("/api/x").unwrap().as_str(),
            "https://bids.example.com/backend/api/x"
        );
        assert_eq!(
            settings.sync_url("17").unwrap().as_str(),
            "https://bids.example.com/backend/api/projects/17/files"
        );
    }

    #[test]
    fn project_id_is_one_encoded_segment() {
        let settings = EngineSettings::with_base_url("https://bids.example.com/backend");
        assert_eq!(
            settings.sync_url("a/b?c#d").unwrap().as_str(),
            "https://bids.example.com/backend/api/projects/a%2Fb%3Fc%23d/files"
        );
    }

    #[test]
    fn sync_path_without_placeholder_is_rejected() {
        let settings = EngineSettings {
            sync_path: "/api/files".to_string(),
            ..EngineSettings::default()
        };
        assert_eq!(settings.sync_url("1").unwrap_err().kind, FailureKind::InvalidUrl);
    }

    #[test]
    fn absolute_artifact_urls_pass_through() {
        let settings = EngineSettings::default();
        assert_eq!(
            settings
                .artifact_url("https://files.example.com/a.docx")
                .unwrap()
                .as_str(),
            "https://files.example.com/a.docx"
        );
        assert_eq!(
            settings.artifact_url("outputs/a.docx").unwrap().as_str(),
            "http://127.0.0.1:8000/outputs/a.docx"
        );
    }
}
