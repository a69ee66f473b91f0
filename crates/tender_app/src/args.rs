use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde::Deserialize;

/// Stream a bid document from the generation service and save what it produces.
///
/// Settings come from `tender.ron` when present; flags given here win.
#[derive(Debug, Parser)]
#[command(version, about, name = "tender")]
pub struct Args {
    /// What to generate: technical_proposal, point_to_point, business_response, document_merge
    pub kind: Option<String>,

    /// RON settings file
    #[arg(long, default_value = "tender.ron")]
    pub config: PathBuf,

    /// Generation service root URL
    #[arg(long)]
    pub server: Option<String>,

    /// Directory receiving the exported document
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Server-side reference of the uploaded tender document
    #[arg(long)]
    pub source_file: Option<String>,

    /// Project that receives the artifact; enables automatic sync
    #[arg(long)]
    pub project_id: Option<String>,

    /// Extra request fields as a JSON object
    #[arg(long)]
    pub params: Option<String>,

    /// Title used for the exported document
    #[arg(long)]
    pub title: Option<String>,

    /// Retry once by hand if the automatic sync fails
    #[arg(long)]
    pub retry_sync: bool,

    /// Seconds of silence tolerated on the stream
    #[arg(long)]
    pub idle_timeout_secs: Option<u64>,

    #[arg(long)]
    pub connect_timeout_secs: Option<u64>,

    /// Limit for conversion and sync requests, in seconds
    #[arg(long)]
    pub request_timeout_secs: Option<u64>,

    #[arg(long, value_enum)]
    pub log: Option<LogTarget>,

    /// off, error, warn, info, debug or trace
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogTarget {
    File,
    #[default]
    Terminal,
    Both,
}

impl From<LogTarget> for pipeline_logging::LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::File => Self::File,
            LogTarget::Terminal => Self::Terminal,
            LogTarget::Both => Self::Both,
        }
    }
}
