//! Writing a finished job to the output directory.
//!
//! A job exports as a Markdown document with front matter and, when the
//! conversion succeeded, an editable HTML view next to it. Both files are
//! staged in full before either is moved into place, so a failed write never
//! leaves a fresh Markdown file paired with a stale HTML view.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use pipeline_logging::{pipeline_debug, pipeline_info};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::filename::export_filename;
use crate::JobId;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("output directory {path} unusable: {source}")]
    OutputDir { path: PathBuf, source: io::Error },
    #[error("could not stage {file}: {source}")]
    Stage { file: String, source: io::Error },
    #[error("could not move {file} into place: {source}")]
    Commit { file: String, source: io::Error },
}

/// Everything that goes into the exported Markdown besides the directory.
#[derive(Debug, Clone)]
pub struct ExportDocument<'a> {
    pub title: &'a str,
    /// Stable name of what was generated; drives the filename hash.
    pub target: &'a str,
    pub kind: &'a str,
    pub job_id: JobId,
    pub generated_utc: &'a str,
    pub artifact: Option<&'a str>,
    pub stats: Option<&'a Map<String, Value>>,
    pub body_markdown: &'a str,
}

/// Paths written by one export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedExport {
    pub markdown: PathBuf,
    pub editable_html: Option<PathBuf>,
}

/// An output directory known to exist and accept new files.
#[derive(Debug, Clone)]
pub struct ExportDir {
    dir: PathBuf,
}

struct StagedFile {
    name: String,
    tmp: NamedTempFile,
}

impl ExportDir {
    /// Create the directory if needed and check that files can be created in it.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ExportError> {
        let dir = dir.into();
        let unusable = |source: io::Error| ExportError::OutputDir {
            path: dir.clone(),
            source,
        };
        if dir.exists() && !dir.is_dir() {
            return Err(unusable(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "not a directory",
            )));
        }
        fs::create_dir_all(&dir).map_err(unusable)?;
        NamedTempFile::new_in(&dir).map_err(unusable)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn stage(&self, name: String, content: &str) -> Result<StagedFile, ExportError> {
        let staged = NamedTempFile::new_in(&self.dir).and_then(|mut tmp| {
            tmp.write_all(content.as_bytes())?;
            tmp.as_file().sync_all()?;
            Ok(tmp)
        });
        match staged {
            Ok(tmp) => Ok(StagedFile { name, tmp }),
            Err(source) => Err(ExportError::Stage { file: name, source }),
        }
    }

    fn commit(&self, staged: StagedFile) -> Result<PathBuf, ExportError> {
        let target = self.dir.join(&staged.name);
        staged
            .tmp
            .persist(&target)
            .map_err(|err| ExportError::Commit {
                file: staged.name,
                source: err.error,
            })?;
        pipeline_debug!("wrote {}", target.display());
        Ok(target)
    }
}

/// Markdown with a front matter block describing the run.
///
/// Values that could break out of the block (line breaks, `: `, leading
/// indicators) are written as double-quoted scalars.
pub fn build_export(doc: &ExportDocument<'_>) -> String {
    let mut out = String::from("---\n");
    push_field(&mut out, "title", doc.title.trim());
    push_field(&mut out, "kind", doc.kind);
    push_field(&mut out, "job_id", &doc.job_id.to_string());
    push_field(&mut out, "generated_utc", doc.generated_utc);
    if let Some(artifact) = doc.artifact {
        push_field(&mut out, "artifact", artifact);
    }
    if let Some(stats) = doc.stats.filter(|stats| !stats.is_empty()) {
        out.push_str("stats:\n");
        for (key, value) in stats {
            let rendered = match value {
                Value::String(s) => scalar(s),
                other => other.to_string(),
            };
            out.push_str(&format!("  {}: {rendered}\n", scalar(key)));
        }
    }
    out.push_str("---\n\n");
    out.push_str(doc.body_markdown);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

fn push_field(out: &mut String, key: &str, value: &str) {
    out.push_str(key);
    out.push_str(": ");
    out.push_str(&scalar(value));
    out.push('\n');
}

fn scalar(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value != value.trim()
        || value.chars().any(char::is_control)
        || value.contains(": ")
        || value.contains(" #")
        || value.ends_with(':')
        || value.starts_with([
            '-', '?', ':', ',', '[', ']', '{', '}', '#', '&', '*', '!', '|', '>', '\'', '"', '%',
            '@', '`',
        ]);
    if needs_quotes {
        Value::String(value.to_string()).to_string()
    } else {
        value.to_string()
    }
}

/// Write the document, and the editable view when given, under their deterministic names.
pub fn export_job(
    dir: &ExportDir,
    doc: &ExportDocument<'_>,
    editable_html: Option<&str>,
) -> Result<SavedExport, ExportError> {
    let markdown = dir.stage(export_filename(doc.title, doc.target, "md"), &build_export(doc))?;
    let html = editable_html
        .map(|html| dir.stage(export_filename(doc.title, doc.target, "html"), html))
        .transpose()?;

    let saved = SavedExport {
        markdown: dir.commit(markdown)?,
        editable_html: html.map(|staged| dir.commit(staged)).transpose()?,
    };
    pipeline_info!("job {} exported to {}", doc.job_id, saved.markdown.display());
    Ok(saved)
}
