use rand::RngCore;
use serde_json::{Map, Value};

mod wire;

pub use wire::{
    build_chat_completion, build_content_chunk, build_stop_chunk, AssistantMessage,
    ChatCompletion, ChatCompletionChunk, ChunkChoice, ChunkDelta, CompletionChoice, Usage,
};

/// Parameters forwarded upstream. Everything else in the inbound body is dropped,
/// including `stream`: the upstream is always asked for a complete response.
pub const SUPPORTED_PARAMS: [&str; 7] = [
    "model",
    "messages",
    "temperature",
    "max_tokens",
    "top_p",
    "top_k",
    "stop",
];

pub fn is_supported_param(name: &str) -> bool {
    SUPPORTED_PARAMS.contains(&name)
}

/// Inbound chat payload reduced to the allow-listed parameter set.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRequest {
    payload: Map<String, Value>,
}

impl NormalizedRequest {
    pub fn from_object(object: &Map<String, Value>) -> Self {
        let payload = object
            .iter()
            .filter(|(key, _)| is_supported_param(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Self { payload }
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    pub fn model(&self) -> Option<&str> {
        self.payload
            .get("model")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|model| !model.is_empty())
    }
}

/// A validated client request: what to send upstream plus how to answer.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundChatRequest {
    pub request: NormalizedRequest,
    pub stream: bool,
}

pub fn parse_inbound_chat_request(body: &[u8]) -> Result<InboundChatRequest, String> {
    let value: Value =
        serde_json::from_slice(body).map_err(|err| format!("invalid json body: {err}"))?;
    let Some(object) = value.as_object() else {
        return Err("request body must be a json object".to_string());
    };
    match object.get("model") {
        Some(Value::String(model)) if !model.trim().is_empty() => {}
        _ => return Err("field `model` must be a non-empty string".to_string()),
    }
    if !object.get("messages").is_some_and(Value::is_array) {
        return Err("field `messages` must be an array".to_string());
    }
    let stream = match object.get("stream") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(_) => return Err("field `stream` must be a boolean".to_string()),
    };
    Ok(InboundChatRequest {
        request: NormalizedRequest::from_object(object),
        stream,
    })
}

/// Canonical completion produced by one upstream attempt.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompletionRecord {
    pub id: Option<String>,
    pub created: Option<i64>,
    pub model: Option<String>,
    pub content: String,
    pub finish_reason: Option<String>,
}

impl CompletionRecord {
    /// Length in characters, the unit the acceptance threshold is expressed in.
    pub fn content_len(&self) -> usize {
        self.content.chars().count()
    }

    /// Reads `choices[0].message.content` of a plain chat.completion object.
    pub fn from_completion_json(value: &Value) -> Result<Self, String> {
        let Some(choice) = value
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
        else {
            return Err("completion has no choices".to_string());
        };
        let content = choice
            .get("message")
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .ok_or_else(|| "completion choice has no message content".to_string())?;
        Ok(Self {
            id: non_empty_str(value.get("id")),
            created: value.get("created").and_then(Value::as_i64),
            model: non_empty_str(value.get("model")),
            content: content.to_string(),
            finish_reason: non_empty_str(choice.get("finish_reason")),
        })
    }
}

pub(crate) fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// The id/created/model triple stamped on every outbound object for one response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseIdentity {
    pub id: String,
    pub created: i64,
    pub model: String,
}

impl ResponseIdentity {
    pub fn resolve(record: &CompletionRecord, fallback_model: &str, now: i64) -> Self {
        Self {
            id: record.id.clone().unwrap_or_else(generate_completion_id),
            created: record.created.unwrap_or(now),
            model: record
                .model
                .clone()
                .unwrap_or_else(|| fallback_model.to_string()),
        }
    }
}

pub fn generate_completion_id() -> String {
    let mut bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut bytes);
    let mut id = String::with_capacity("chatcmpl-".len() + bytes.len() * 2);
    id.push_str("chatcmpl-");
    for byte in bytes {
        id.push_str(&format!("{byte:02x}"));
    }
    id
}
