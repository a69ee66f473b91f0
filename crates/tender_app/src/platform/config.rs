use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use log::LevelFilter;
use serde::Deserialize;
use serde_json::{Map, Value};
use tender_core::{GenerationKind, GenerationRequest};
use tender_engine::EngineSettings;

use crate::args::{Args, LogTarget};

/// Settings read from `tender.ron`; every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server_url: String,
    pub output_dir: PathBuf,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub log: LogTarget,
    pub log_level: String,
    pub log_file: PathBuf,
    pub kind: Option<String>,
    pub source_file: Option<String>,
    pub project_id: Option<String>,
    pub title: Option<String>,
    pub params: BTreeMap<String, String>,
    #[serde(skip)]
    pub json_params: Map<String, Value>,
    #[serde(skip)]
    pub retry_sync: bool,
    /// Settings file actually read, if any.
    #[serde(skip)]
    pub loaded_from: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        let engine = EngineSettings::default();
        Self {
            server_url: engine.base_url,
            output_dir: PathBuf::from("output"),
            connect_timeout_secs: engine.connect_timeout.as_secs(),
            idle_timeout_secs: engine.idle_timeout.as_secs(),
            request_timeout_secs: engine.request_timeout.as_secs(),
            log: LogTarget::default(),
            log_level: "info".to_string(),
            log_file: PathBuf::from("./tender.log"),
            kind: None,
            source_file: None,
            project_id: None,
            title: None,
            params: BTreeMap::new(),
            json_params: Map::new(),
            retry_sync: false,
            loaded_from: None,
        }
    }
}

impl AppConfig {
    /// Read `path` if it exists; a missing file means defaults.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(err) => {
                return Err(err).with_context(|| format!("reading {}", path.display()));
            }
        };
        let mut config: Self = ron::from_str(&content)
            .with_context(|| format!("parsing {}", path.display()))?;
        config.loaded_from = Some(path.to_path_buf());
        Ok(config)
    }

    pub fn from_args(args: &Args) -> anyhow::Result<Self> {
        let mut config = Self::load(&args.config)?;
        config.apply_args(args)?;
        Ok(config)
    }

    pub fn apply_args(&mut self, args: &Args) -> anyhow::Result<()> {
        override_with(&mut self.server_url, args.server.clone());
        override_with(&mut self.output_dir, args.output_dir.clone());
        override_with(&mut self.connect_timeout_secs, args.connect_timeout_secs);
        override_with(&mut self.idle_timeout_secs, args.idle_timeout_secs);
        override_with(&mut self.request_timeout_secs, args.request_timeout_secs);
        override_with(&mut self.log, args.log);
        override_with(&mut self.log_level, args.log_level.clone());
        if args.kind.is_some() {
            self.kind = args.kind.clone();
        }
        if args.source_file.is_some() {
            self.source_file = args.source_file.clone();
        }
        if args.project_id.is_some() {
            self.project_id = args.project_id.clone();
        }
        if args.title.is_some() {
            self.title = args.title.clone();
        }
        if let Some(raw) = &args.params {
            self.json_params = match serde_json::from_str(raw).context("parsing --params")? {
                Value::Object(map) => map,
                _ => bail!("--params must be a JSON object"),
            };
        }
        self.retry_sync |= args.retry_sync;
        Ok(())
    }

    pub fn level_filter(&self) -> anyhow::Result<LevelFilter> {
        self.log_level
            .parse()
            .map_err(|_| anyhow!("unknown log level {:?}", self.log_level))
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            base_url: self.server_url.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..EngineSettings::default()
        }
    }

    pub fn generation_request(&self) -> anyhow::Result<GenerationRequest> {
        let kind: GenerationKind = self
            .kind
            .as_deref()
            .ok_or_else(|| anyhow!("no generation kind given"))?
            .parse()?;

        let mut request = GenerationRequest::new(kind);
        if let Some(file) = &self.source_file {
            request = request.with_source_file(file.clone());
        }
        if let Some(project_id) = &self.project_id {
            request = request.with_project(project_id.clone());
        }
        for (key, value) in &self.params {
            request
                .params
                .insert(key.clone(), Value::String(value.clone()));
        }
        request
            .params
            .extend(self.json_params.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(request)
    }

    /// One job slot per project and kind.
    pub fn target(&self, request: &GenerationRequest) -> String {
        format!(
            "{}/{}",
            request.project_id.as_deref().unwrap_or("local"),
            request.kind
        )
    }

    pub fn title(&self, request: &GenerationRequest) -> String {
        self.title.clone().unwrap_or_else(|| request.kind.to_string())
    }
}

fn override_with<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}
