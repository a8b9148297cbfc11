// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! SSE stream assembly for chat completions.
//!
//! The assembler is fed raw byte chunks as they arrive and owns all line
//! buffering, so the assembled output is identical no matter where the
//! network splits the stream. Tool-call fragments are keyed by their slot
//! index and concatenated per slot; malformed records are skipped with a
//! warning, never fatal.

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::warn;

use crate::types::ToolCall;

/// One delta record inside a stream chunk.
#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,

    #[serde(default)]
    tool_calls: Option<Vec<ToolCallFragment>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallFragment {
    index: usize,

    #[serde(default)]
    id: Option<String>,

    #[serde(default)]
    function: Option<FunctionFragment>,
}

#[derive(Debug, Deserialize)]
struct FunctionFragment {
    #[serde(default)]
    name: Option<String>,

    #[serde(default)]
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
}

/// Accumulator for one tool-call slot.
#[derive(Debug, Default)]
struct ToolCallSlot {
    id: String,
    name: String,
    arguments: String,
}

/// Incremental assembler for an SSE `chat/completions` stream.
#[derive(Debug, Default)]
pub struct StreamAssembler {
    pending: Vec<u8>,
    buffer: String,
    content: String,
    slots: BTreeMap<usize, ToolCallSlot>,
    finished: bool,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a raw network chunk; `on_delta` fires once per content fragment.
    ///
    /// A trailing partial line is carried into the next feed, and so is an
    /// incomplete trailing UTF-8 sequence, so a multibyte character split
    /// across chunks decodes intact.
    pub fn feed(&mut self, chunk: &[u8], on_delta: &mut dyn FnMut(&str)) {
        self.pending.extend_from_slice(chunk);
        self.decode_pending();

        while let Some(newline) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=newline).collect();
            self.process_line(line.trim_end_matches(['\n', '\r']), on_delta);
        }
    }

    /// Move every decodable byte from `pending` into the line buffer,
    /// keeping an incomplete trailing sequence and replacing invalid bytes.
    fn decode_pending(&mut self) {
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    self.pending.clear();
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    self.buffer
                        .push_str(&String::from_utf8_lossy(&self.pending[..valid]));
                    match e.error_len() {
                        Some(bad) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + bad);
                        }
                        None => {
                            // Truncated sequence at the tail: wait for more bytes.
                            self.pending.drain(..valid);
                            return;
                        }
                    }
                }
            }
        }
    }

    fn process_line(&mut self, line: &str, on_delta: &mut dyn FnMut(&str)) {
        let line = line.trim();
        if line.is_empty() || line.starts_with(':') {
            return;
        }
        let Some(data) = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")) else {
            // Non-data SSE fields (event:, id:) carry nothing we need.
            return;
        };
        let data = data.trim();

        if data == "[DONE]" {
            self.finished = true;
            return;
        }

        let chunk: StreamChunk = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!(error = %e, "skipping malformed stream record");
                return;
            }
        };

        let Some(delta) = chunk.choices.into_iter().next().and_then(|c| c.delta) else {
            return;
        };

        if let Some(content) = delta.content {
            if !content.is_empty() {
                self.content.push_str(&content);
                on_delta(&content);
            }
        }

        for fragment in delta.tool_calls.unwrap_or_default() {
            let slot = self.slots.entry(fragment.index).or_default();
            if let Some(id) = fragment.id {
                slot.id.push_str(&id);
            }
            if let Some(function) = fragment.function {
                if let Some(name) = function.name {
                    slot.name.push_str(&name);
                }
                if let Some(arguments) = function.arguments {
                    slot.arguments.push_str(&arguments);
                }
            }
        }
    }

    /// Whether `data: [DONE]` has been seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Assembled content so far.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Finalize: content plus tool calls in slot order.
    pub fn finish(self) -> (String, Vec<ToolCall>) {
        let calls = self
            .slots
            .into_values()
            .filter(|slot| !slot.name.is_empty())
            .map(|slot| ToolCall::new(slot.id, slot.name, slot.arguments))
            .collect();
        (self.content, calls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(assembler: &mut StreamAssembler, chunk: &str) -> Vec<String> {
        let mut deltas = Vec::new();
        assembler.feed(chunk.as_bytes(), &mut |d| deltas.push(d.to_string()));
        deltas
    }

    #[test]
    fn test_content_deltas() {
        let mut assembler = StreamAssembler::new();
        let deltas = collect(
            &mut assembler,
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\ndata: [DONE]\n",
        );
        assert_eq!(deltas, vec!["Hel", "lo"]);
        assert!(assembler.is_finished());
        let (content, calls) = assembler.finish();
        assert_eq!(content, "Hello");
        assert!(calls.is_empty());
    }

    #[test]
    fn test_chunk_boundary_invariance() {
        let stream = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"one \"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_1\",\"function\":{\"name\":\"read\",\"arguments\":\"{\\\"f\"}}]}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"ile\\\":1}\"}}]}}]}\n\n",
            "data: [DONE]\n\n",
        );

        // Whole stream at once.
        let mut whole = StreamAssembler::new();
        whole.feed(stream.as_bytes(), &mut |_| {});
        let (whole_content, whole_calls) = whole.finish();

        // One byte at a time.
        let mut tiny = StreamAssembler::new();
        for byte in stream.as_bytes() {
            tiny.feed(&[*byte], &mut |_| {});
        }
        let (tiny_content, tiny_calls) = tiny.finish();

        assert_eq!(whole_content, tiny_content);
        assert_eq!(whole_calls, tiny_calls);
        assert_eq!(whole_calls.len(), 1);
        assert_eq!(whole_calls[0].id, "call_1");
        assert_eq!(whole_calls[0].name, "read");
        assert_eq!(whole_calls[0].arguments, "{\"file\":1}");
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let stream = "data: {\"choices\":[{\"delta\":{\"content\":\"café\"}}]}\n\ndata: [DONE]\n";
        let bytes = stream.as_bytes();
        // "é" is two bytes; split between them so neither chunk alone is
        // valid UTF-8.
        let mid = stream.find('é').unwrap() + 1;

        let mut assembler = StreamAssembler::new();
        let mut deltas = Vec::new();
        assembler.feed(&bytes[..mid], &mut |d| deltas.push(d.to_string()));
        assembler.feed(&bytes[mid..], &mut |d| deltas.push(d.to_string()));

        assert!(assembler.is_finished());
        let (content, _) = assembler.finish();
        assert_eq!(content, "café");
        assert_eq!(deltas, vec!["café"]);
    }

    #[test]
    fn test_invalid_bytes_replaced_not_stalled() {
        let mut assembler = StreamAssembler::new();
        let mut deltas = Vec::new();
        // A lone 0xFF can never start a valid sequence; it must not wedge
        // the decoder.
        assembler.feed(b"\xff\ndata: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n", &mut |d| {
            deltas.push(d.to_string())
        });
        assert_eq!(deltas, vec!["ok"]);
    }

    #[test]
    fn test_multiple_tool_call_slots_in_index_order() {
        let mut assembler = StreamAssembler::new();
        collect(
            &mut assembler,
            concat!(
                "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":1,\"id\":\"b\",\"function\":{\"name\":\"second\",\"arguments\":\"{}\"}}]}}]}\n",
                "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"a\",\"function\":{\"name\":\"first\",\"arguments\":\"{}\"}}]}}]}\n",
                "data: [DONE]\n",
            ),
        );
        let (_, calls) = assembler.finish();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "first");
        assert_eq!(calls[1].name, "second");
    }

    #[test]
    fn test_malformed_record_skipped() {
        let mut assembler = StreamAssembler::new();
        let deltas = collect(
            &mut assembler,
            "data: {not json}\ndata: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\ndata: [DONE]\n",
        );
        assert_eq!(deltas, vec!["ok"]);
        assert!(assembler.is_finished());
    }

    #[test]
    fn test_comment_and_blank_lines_ignored() {
        let mut assembler = StreamAssembler::new();
        let deltas = collect(
            &mut assembler,
            ": keepalive\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n",
        );
        assert_eq!(deltas, vec!["x"]);
        assert!(!assembler.is_finished());
    }

    #[test]
    fn test_crlf_lines() {
        let mut assembler = StreamAssembler::new();
        let deltas = collect(
            &mut assembler,
            "data: {\"choices\":[{\"delta\":{\"content\":\"y\"}}]}\r\ndata: [DONE]\r\n",
        );
        assert_eq!(deltas, vec!["y"]);
        assert!(assembler.is_finished());
    }
}
