use serde_json::Value;

use crate::chat::{non_empty_str, CompletionRecord};

pub const DONE_SENTINEL: &str = "[DONE]";
pub const DONE_FRAME: &str = "data: [DONE]\n\n";

pub fn format_data_frame(payload: &str) -> String {
    format!("data: {payload}\n\n")
}

/// True when any line of the body is an event-stream `data:` line.
pub fn is_event_stream_body(body: &str) -> bool {
    body.lines()
        .any(|line| line.trim_start().starts_with("data:"))
}

fn data_payload(line: &str) -> Option<&str> {
    line.trim_start()
        .strip_prefix("data:")
        .map(|rest| rest.trim())
}

/// Folds the `data:` events of a chat.completion.chunk stream into one record.
#[derive(Debug, Default)]
pub struct InlineStreamAccumulator {
    content: String,
    fragments: usize,
    id: Option<String>,
    model: Option<String>,
    created: Option<i64>,
    finish_reason: Option<String>,
}

impl InlineStreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&mut self, line: &str) {
        let Some(payload) = data_payload(line) else {
            return;
        };
        if payload.is_empty() || payload == DONE_SENTINEL {
            return;
        }
        let Ok(event) = serde_json::from_str::<Value>(payload) else {
            return;
        };
        self.push_event(&event);
    }

    fn push_event(&mut self, event: &Value) {
        if let Some(id) = non_empty_str(event.get("id")) {
            self.id = Some(id);
        }
        if let Some(model) = non_empty_str(event.get("model")) {
            self.model = Some(model);
        }
        if let Some(created) = event.get("created").and_then(Value::as_i64) {
            self.created = Some(created);
        }
        let Some(choice) = event
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
        else {
            return;
        };
        if let Some(fragment) = choice
            .get("delta")
            .and_then(|delta| delta.get("content"))
            .and_then(Value::as_str)
        {
            self.content.push_str(fragment);
            self.fragments += 1;
        }
        if let Some(reason) = non_empty_str(choice.get("finish_reason")) {
            self.finish_reason = Some(reason);
        }
    }

    pub fn fragment_count(&self) -> usize {
        self.fragments
    }

    /// `None` when the stream carried no non-empty content fragment.
    pub fn finish(self) -> Option<CompletionRecord> {
        if self.content.is_empty() {
            return None;
        }
        Some(CompletionRecord {
            id: self.id,
            created: self.created,
            model: self.model,
            content: self.content,
            finish_reason: self.finish_reason,
        })
    }
}

/// Folds a whole event-stream body. Returns the record with the number of
/// content fragments that went into it.
pub fn collect_inline_stream(body: &str) -> Option<(CompletionRecord, usize)> {
    let mut accumulator = InlineStreamAccumulator::new();
    for line in body.lines() {
        accumulator.push_line(line);
    }
    let fragments = accumulator.fragment_count();
    accumulator.finish().map(|record| (record, fragments))
}
