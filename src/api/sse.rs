//! Streaming wire encoding. Each chunk
//! is a delta-carrying response object; a terminal chunk carries
//! `finish_reason`. Framed as `data: <json>\n\n` per SSE convention.

use axum::response::sse::Event as SseEvent;
use serde::Serialize;
use serde_json::json;

use crate::providers::StreamChunk;

#[derive(Debug, Serialize)]
struct ChunkDelta {
    role: Option<&'static str>,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChunkChoice {
    index: u32,
    delta: ChunkDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct StreamingChunkDto {
    object: &'static str,
    choices: Vec<ChunkChoice>,
}

/// Encodes one `StreamChunk` as `chat.completion.chunk` wire shape
///. The first chunk of a stream should carry
/// `delta.role = "assistant"`; the caller passes `is_first` accordingly.
pub fn encode_chunk(chunk: &StreamChunk, is_first: bool) -> SseEvent {
    let dto = StreamingChunkDto {
        object: "chat.completion.chunk",
        choices: vec![ChunkChoice {
            index: 0,
            delta: ChunkDelta {
                role: if is_first { Some("assistant") } else { None },
                content: chunk.delta.clone(),
            },
            finish_reason: chunk.finish_reason.map(|f| format!("{f:?}").to_lowercase()),
        }],
    };
    SseEvent::default().json_data(dto).unwrap_or_else(|_| SseEvent::default().data("{}"))
}

pub fn encode_done() -> SseEvent {
    SseEvent::default().data("[DONE]")
}

pub fn encode_error(message: &str) -> SseEvent {
    SseEvent::default().event("error").json_data(json!({ "message": message })).unwrap_or_else(|_| SseEvent::default().data("{}"))
}
