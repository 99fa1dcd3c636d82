//! Server-Sent Events decoding for streamed chat completions
//!
//! The upstream body arrives as arbitrary byte slices; [`SseDecoder`] buffers
//! partial lines and yields complete `data:` payloads in arrival order.
//! [`chunk_stream`] turns a `reqwest::Response` into a stream of
//! [`UpstreamChunk`]s that ends at the `[DONE]` sentinel or end of body.

use super::types::ChatCompletionChunk;
use crate::error::{AppError, AppResult};
use futures::stream::{self, BoxStream, StreamExt};

/// Sentinel payload marking the end of an OpenAI stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// One incremental unit of generated text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamChunk {
    pub delta: String,
}

/// Stream of upstream chunks; ends after the terminal chunk
pub type ChunkStream = BoxStream<'static, AppResult<UpstreamChunk>>;

/// Decoded SSE event payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Data(String),
    Done,
}

/// Incremental SSE line decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data_lines: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning every event completed by them
    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(bytes);
        let mut events = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = self.buffer.drain(..=pos).collect();
            // Lines split on '\n' are whole UTF-8 sequences; lossy only guards
            // against a misbehaving upstream.
            let line = String::from_utf8_lossy(&line_bytes);
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }

        events
    }

    /// Flush whatever is buffered once the body has ended
    pub fn finish(&mut self) -> Vec<SseEvent> {
        let mut events = Vec::new();
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest).into_owned();
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        if let Some(event) = self.dispatch() {
            events.push(event);
        }
        events
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        let line = line.trim_end_matches(['\n', '\r']);

        if line.is_empty() {
            return self.dispatch();
        }

        // Comment / keep-alive
        if line.starts_with(':') {
            return None;
        }

        if let Some(rest) = line.strip_prefix("data:") {
            let data = rest.strip_prefix(' ').unwrap_or(rest);
            if data.trim() == DONE_SENTINEL {
                self.data_lines.clear();
                return Some(SseEvent::Done);
            }
            self.data_lines.push(data.to_string());
        }

        // event:, id:, retry: are irrelevant for chat completions
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if self.data_lines.is_empty() {
            return None;
        }
        let payload = self.data_lines.join("\n");
        self.data_lines.clear();
        if payload.trim().is_empty() {
            return None;
        }
        Some(SseEvent::Data(payload))
    }
}

/// Parse one `data:` payload into a chunk
pub fn parse_chunk(payload: &str) -> AppResult<UpstreamChunk> {
    let chunk: ChatCompletionChunk = serde_json::from_str(payload).map_err(|e| {
        AppError::upstream(format!("Failed to parse upstream stream chunk: {}", e))
    })?;

    if let Some(error) = chunk.error.as_ref() {
        return Err(AppError::upstream(
            error
                .message
                .clone()
                .unwrap_or_else(|| "Upstream reported an error mid-stream".to_string()),
        ));
    }

    Ok(UpstreamChunk {
        delta: chunk.into_delta(),
    })
}

struct DecodeState<S> {
    bytes: S,
    decoder: SseDecoder,
    pending: std::collections::VecDeque<SseEvent>,
    finished: bool,
}

/// Turn any byte stream carrying an SSE body into a [`ChunkStream`]
///
/// The byte stream is only polled when the consumer asks for the next chunk,
/// so dropping the returned stream stops reading from the upstream connection.
pub fn decode_stream<S, E>(bytes: S) -> ChunkStream
where
    S: futures::Stream<Item = Result<bytes::Bytes, E>> + Send + Unpin + 'static,
    E: Into<AppError>,
{
    let state = DecodeState {
        bytes,
        decoder: SseDecoder::new(),
        pending: std::collections::VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if state.finished {
                return None;
            }

            if let Some(event) = state.pending.pop_front() {
                match event {
                    SseEvent::Done => {
                        state.finished = true;
                        return None;
                    }
                    SseEvent::Data(payload) => {
                        let item = parse_chunk(&payload);
                        if item.is_err() {
                            state.finished = true;
                        }
                        return Some((item, state));
                    }
                }
            }

            match state.bytes.next().await {
                Some(Ok(bytes)) => {
                    let events = state.decoder.push(&bytes);
                    state.pending.extend(events);
                }
                Some(Err(e)) => {
                    state.finished = true;
                    return Some((Err(e.into()), state));
                }
                None => {
                    // Body ended without a sentinel: drain what is buffered, then stop
                    let events = state.decoder.finish();
                    state.pending.extend(events);
                    state.pending.push_back(SseEvent::Done);
                }
            }
        }
    })
    .boxed()
}

/// Chunk stream over a successful streaming `reqwest::Response`
pub fn chunk_stream(response: reqwest::Response) -> ChunkStream {
    decode_stream(Box::pin(response.bytes_stream()))
}
