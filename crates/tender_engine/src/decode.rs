use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use encoding_rs::{CoderResult, Decoder, Encoding, UTF_8};
use futures_util::Stream;
use pipeline_logging::{pipeline_debug, pipeline_trace, pipeline_warn};
use serde_json::Value;

use crate::{RawFrame, TransportError};

const DATA_PREFIX: &str = "data:";
const SNIPPET_CHARS: usize = 120;

/// Incremental `data: <json>` line decoder.
///
/// Bytes may split anywhere, including inside a multi-byte character; an
/// unterminated line is kept until the next push or until `finish`.
pub struct FrameDecoder {
    decoder: Decoder,
    encoding: &'static Encoding,
    text: String,
    skipped: usize,
}

impl FrameDecoder {
    /// Uses the charset of the Content-Type header when present, UTF-8 otherwise.
    /// A byte order mark in the stream wins over both.
    pub fn new(content_type: Option<&str>) -> Self {
        let encoding = content_type
            .and_then(extract_charset)
            .and_then(|label| Encoding::for_label(label.as_bytes()))
            .unwrap_or(UTF_8);
        Self {
            decoder: encoding.new_decoder(),
            encoding,
            text: String::new(),
            skipped: 0,
        }
    }

    pub fn encoding_label(&self) -> &'static str {
        self.encoding.name()
    }

    /// Lines that carried a `data:` payload which was not a JSON object.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<RawFrame> {
        self.decode(bytes, false);
        self.drain_lines(false)
    }

    /// End of data: flush the decoder and treat a trailing unterminated line as complete.
    pub fn finish(&mut self) -> Vec<RawFrame> {
        self.decode(&[], true);
        self.drain_lines(true)
    }

    fn decode(&mut self, mut src: &[u8], last: bool) {
        loop {
            let needed = self
                .decoder
                .max_utf8_buffer_length(src.len())
                .unwrap_or(src.len() * 3 + 16);
            self.text.reserve(needed);
            let (result, read, had_errors) = self.decoder.decode_to_string(src, &mut self.text, last);
            if had_errors {
                pipeline_warn!(
                    "malformed {} bytes in stream replaced",
                    self.encoding.name()
                );
            }
            src = &src[read..];
            match result {
                CoderResult::InputEmpty => break,
                CoderResult::OutputFull => continue,
            }
        }
    }

    /// Lines end at `\n`, `\r\n` or a bare `\r`. A `\r` closing the buffer waits
    /// for the next byte, which may be its `\n`.
    fn drain_lines(&mut self, flush: bool) -> Vec<RawFrame> {
        let mut frames = Vec::new();
        while let Some(pos) = self.text.find(['\n', '\r']) {
            let rest = &self.text.as_bytes()[pos..];
            let consumed = match rest {
                [b'\r', b'\n', ..] => 2,
                [b'\r'] if !flush => break,
                _ => 1,
            };
            let line: String = self.text.drain(..pos + consumed).collect();
            self.accept_line(&line, &mut frames);
        }
        if flush && !self.text.is_empty() {
            let line = std::mem::take(&mut self.text);
            self.accept_line(&line, &mut frames);
        }
        frames
    }

    fn accept_line(&mut self, line: &str, frames: &mut Vec<RawFrame>) {
        match parse_line(line) {
            LineKind::Frame(frame) => frames.push(frame),
            LineKind::Blank => {}
            LineKind::Noise => pipeline_trace!("ignoring non-data line: {}", snippet(line)),
            LineKind::Invalid(reason) => {
                self.skipped += 1;
                pipeline_warn!("skipping undecodable frame ({reason}): {}", snippet(line));
            }
        }
    }
}

enum LineKind {
    Frame(RawFrame),
    Blank,
    Noise,
    Invalid(String),
}

fn parse_line(line: &str) -> LineKind {
    let line = line.trim_end_matches(['\n', '\r']);
    if line.trim().is_empty() {
        return LineKind::Blank;
    }
    let Some(data) = line.strip_prefix(DATA_PREFIX) else {
        return LineKind::Noise;
    };
    let data = data.trim();
    if data.is_empty() || data == "[DONE]" {
        return LineKind::Noise;
    }
    match serde_json::from_str::<Value>(data) {
        Ok(Value::Object(map)) => LineKind::Frame(map),
        Ok(_) => LineKind::Invalid("not a JSON object".to_string()),
        Err(err) => LineKind::Invalid(err.to_string()),
    }
}

fn snippet(line: &str) -> String {
    line.trim_end().chars().take(SNIPPET_CHARS).collect()
}

fn extract_charset(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .filter_map(|part| {
            let (key, value) = part.split_once('=')?;
            key.trim()
                .eq_ignore_ascii_case("charset")
                .then(|| value.trim().trim_matches(['"', '\'']).to_string())
        })
        .next()
}

type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Stream of frames decoded from a byte stream.
///
/// Ends for good after the underlying stream ends or yields an error.
pub struct FrameStream {
    inner: ByteStream,
    decoder: FrameDecoder,
    pending: VecDeque<RawFrame>,
    done: bool,
}

impl FrameStream {
    pub fn new(
        byte_stream: impl Stream<Item = Result<Bytes, TransportError>> + Send + 'static,
        decoder: FrameDecoder,
    ) -> Self {
        Self {
            inner: Box::pin(byte_stream),
            decoder,
            pending: VecDeque::new(),
            done: false,
        }
    }

    pub fn skipped(&self) -> usize {
        self.decoder.skipped()
    }
}

impl Stream for FrameStream {
    type Item = Result<RawFrame, TransportError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(frame) = this.pending.pop_front() {
                return Poll::Ready(Some(Ok(frame)));
            }
            if this.done {
                return Poll::Ready(None);
            }

            match this.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    this.pending.extend(this.decoder.push(&bytes));
                }
                Poll::Ready(Some(Err(err))) => {
                    this.done = true;
                    this.pending.clear();
                    return Poll::Ready(Some(Err(err)));
                }
                Poll::Ready(None) => {
                    pipeline_debug!(
                        "byte stream ended ({} undecodable lines skipped)",
                        this.decoder.skipped()
                    );
                    this.done = true;
                    this.pending.extend(this.decoder.finish());
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
