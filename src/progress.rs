use log::{debug, warn};
use serde::Deserialize;

const SEPARATORS: [&[u8]; 2] = [b"\n\n", b"\r\n\r\n"];
const DATA_PREFIX: &str = "data: ";

/// One message pushed by the backend on a progress stream.
///
/// The variants are tried in declaration order, so a frame that carries both
/// `log` and `status` is treated as a log line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ProgressEvent {
    Log {
        log: String,
    },
    Error {
        error: String,
    },
    /// Setup installer progress
    Install {
        percent: f64,
        status: String,
        #[serde(default)]
        success: Option<bool>,
    },
    Status {
        status: String,
    },
}

impl ProgressEvent {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Status { status } if status == "completed")
    }

    /// Whether this event ends the operation that produced the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. }) || self.is_completed()
    }
}

/// Incremental reader for `data: <json>\n\n` frames.
///
/// Bytes are accumulated until a separator arrives, so a frame torn across
/// two network reads is parsed once it is whole. Complete segments that lack
/// the prefix or hold invalid JSON are dropped with a warning.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    pending: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one chunk and returns the events it completed, in arrival order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<ProgressEvent> {
        self.pending.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut consumed = 0;
        while let Some((offset, len)) = find_separator(&self.pending[consumed..]) {
            let frame = &self.pending[consumed..consumed + offset];
            if let Some(event) = parse_frame(frame) {
                events.push(event);
            }
            consumed += offset + len;
        }
        self.pending.drain(..consumed);
        events
    }

    /// Parses whatever is left once the stream has ended without a final separator.
    pub fn finish(&mut self) -> Option<ProgressEvent> {
        let rest = std::mem::take(&mut self.pending);
        if rest.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        parse_frame(&rest)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Offset and length of the first blank-line separator.
fn find_separator(haystack: &[u8]) -> Option<(usize, usize)> {
    (0..haystack.len()).find_map(|i| {
        SEPARATORS
            .iter()
            .find(|sep| haystack[i..].starts_with(sep))
            .map(|sep| (i, sep.len()))
    })
}

fn parse_frame(frame: &[u8]) -> Option<ProgressEvent> {
    let text = String::from_utf8_lossy(frame);
    let text = text.trim_start_matches(['\r', '\n']).trim_end_matches('\r');
    if text.is_empty() {
        return None;
    }

    let Some(json) = text.strip_prefix(DATA_PREFIX) else {
        debug!("Skipping non-data segment: {text:?}");
        return None;
    };

    match serde_json::from_str::<ProgressEvent>(json) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!("Dropping malformed progress frame ({err}): {json:?}");
            None
        }
    }
}
