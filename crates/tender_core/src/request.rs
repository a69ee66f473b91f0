use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

/// The generation features that share the streaming pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GenerationKind {
    TechnicalProposal,
    PointToPoint,
    BusinessResponse,
    DocumentMerge,
}

impl GenerationKind {
    pub const ALL: [GenerationKind; 4] = [
        GenerationKind::TechnicalProposal,
        GenerationKind::PointToPoint,
        GenerationKind::BusinessResponse,
        GenerationKind::DocumentMerge,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GenerationKind::TechnicalProposal => "technical_proposal",
            GenerationKind::PointToPoint => "point_to_point",
            GenerationKind::BusinessResponse => "business_response",
            GenerationKind::DocumentMerge => "document_merge",
        }
    }

    /// Path of the streaming endpoint, relative to the server base URL.
    pub fn stream_endpoint(self) -> String {
        format!("/api/generation/{}/stream", self.as_str())
    }

    /// `file_type` reported to the project store when syncing the artifact.
    pub fn sync_file_type(self) -> &'static str {
        match self {
            GenerationKind::TechnicalProposal => "tech_proposal",
            GenerationKind::PointToPoint => "point_to_point",
            GenerationKind::BusinessResponse => "business_response",
            GenerationKind::DocumentMerge => "merged_document",
        }
    }
}

impl fmt::Display for GenerationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown generation kind `{0}`")]
pub struct UnknownKind(pub String);

impl FromStr for GenerationKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_").to_ascii_lowercase();
        GenerationKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// Parameters of one generation run, as handed to the stream endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub kind: GenerationKind,
    /// Server-side reference of the uploaded source document.
    pub source_file: Option<String>,
    /// Project record that receives the artifact; no automatic sync without it.
    pub project_id: Option<String>,
    pub params: Map<String, Value>,
}

impl GenerationRequest {
    pub fn new(kind: GenerationKind) -> Self {
        Self {
            kind,
            source_file: None,
            project_id: None,
            params: Map::new(),
        }
    }

    pub fn with_source_file(mut self, file: impl Into<String>) -> Self {
        self.source_file = Some(file.into());
        self
    }

    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// JSON body posted to the stream endpoint.
    pub fn payload(&self) -> Value {
        let mut body = self.params.clone();
        if let Some(file) = &self.source_file {
            body.insert("file_path".to_string(), Value::String(file.clone()));
        }
        if let Some(project_id) = &self.project_id {
            body.insert("project_id".to_string(), Value::String(project_id.clone()));
        }
        Value::Object(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_parse_with_dashes_or_underscores() {
        assert_eq!(
            "point-to-point".parse::<GenerationKind>().unwrap(),
            GenerationKind::PointToPoint
        );
        assert_eq!(
            "Technical_Proposal".parse::<GenerationKind>().unwrap(),
            GenerationKind::TechnicalProposal
        );
        assert!("summary".parse::<GenerationKind>().is_err());
    }

    #[test]
    fn payload_merges_params_with_references() {
        let mut request = GenerationRequest::new(GenerationKind::BusinessResponse)
            .with_source_file("uploads/tender.docx")
            .with_project("42");
        request
            .params
            .insert("company_id".to_string(), Value::from(7));
        let payload = request.payload();
        assert_eq!(payload["file_path"], "uploads/tender.docx");
        assert_eq!(payload["project_id"], "42");
        assert_eq!(payload["company_id"], 7);
    }
}
