use serde::Serialize;

use super::{CompletionRecord, ResponseIdentity};

const FINISH_REASON_STOP: &str = "stop";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletion {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<CompletionChoice>,
    pub usage: Usage,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionChoice {
    pub index: u32,
    pub message: AssistantMessage,
    pub finish_reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssistantMessage {
    pub role: &'static str,
    pub content: String,
}

/// Always zero: the proxy does not count tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: ChunkDelta,
    pub finish_reason: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ChunkDelta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// The upstream's own finish_reason is not forwarded; both render paths end with `stop`.
pub fn build_chat_completion(
    identity: &ResponseIdentity,
    record: &CompletionRecord,
) -> ChatCompletion {
    ChatCompletion {
        id: identity.id.clone(),
        object: "chat.completion",
        created: identity.created,
        model: identity.model.clone(),
        choices: vec![CompletionChoice {
            index: 0,
            message: AssistantMessage {
                role: "assistant",
                content: record.content.clone(),
            },
            finish_reason: FINISH_REASON_STOP.to_string(),
        }],
        usage: Usage::default(),
    }
}

pub fn build_content_chunk(identity: &ResponseIdentity, piece: &str) -> ChatCompletionChunk {
    chunk(
        identity,
        ChunkDelta {
            content: Some(piece.to_string()),
        },
        None,
    )
}

pub fn build_stop_chunk(identity: &ResponseIdentity) -> ChatCompletionChunk {
    chunk(identity, ChunkDelta::default(), Some(FINISH_REASON_STOP))
}

fn chunk(
    identity: &ResponseIdentity,
    delta: ChunkDelta,
    finish_reason: Option<&'static str>,
) -> ChatCompletionChunk {
    ChatCompletionChunk {
        id: identity.id.clone(),
        object: "chat.completion.chunk",
        created: identity.created,
        model: identity.model.clone(),
        choices: vec![ChunkChoice {
            index: 0,
            delta,
            finish_reason,
        }],
    }
}
