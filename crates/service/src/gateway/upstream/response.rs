use llmfanout_core::chat::CompletionRecord;
use llmfanout_core::sse::{collect_inline_stream, is_event_stream_body};
use serde_json::Value;

use crate::gateway::errors::AttemptFailure;

/// The two body shapes a non-streaming upstream call can come back with.
/// Resolved once here; everything downstream only sees a `CompletionRecord`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UpstreamResponse {
    PlainCompletion(CompletionRecord),
    /// The upstream streamed anyway; `fragments` is how many deltas were folded.
    InlineStreamCompletion {
        record: CompletionRecord,
        fragments: usize,
    },
}

impl UpstreamResponse {
    pub(crate) fn parse(body: &str) -> Result<Self, AttemptFailure> {
        if is_event_stream_body(body) {
            let (record, fragments) = collect_inline_stream(body).ok_or_else(|| {
                AttemptFailure::Malformed("event stream carried no content".to_string())
            })?;
            return Ok(Self::InlineStreamCompletion { record, fragments });
        }

        let value: Value = serde_json::from_str(body)
            .map_err(|err| AttemptFailure::Malformed(format!("invalid json: {err}")))?;
        CompletionRecord::from_completion_json(&value)
            .map(Self::PlainCompletion)
            .map_err(AttemptFailure::Malformed)
    }

    pub(crate) fn shape(&self) -> &'static str {
        match self {
            Self::PlainCompletion(_) => "plain",
            Self::InlineStreamCompletion { .. } => "inline_stream",
        }
    }

    pub(crate) fn into_record(self) -> CompletionRecord {
        match self {
            Self::PlainCompletion(record) => record,
            Self::InlineStreamCompletion { record, .. } => record,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_completion_is_read_from_first_choice() {
        let body = r#"{"id":"cmpl-1","created":7,"model":"m","choices":[{"index":0,"message":{"role":"assistant","content":"hello"},"finish_reason":"length"}]}"#;
        let parsed = UpstreamResponse::parse(body).expect("parse");
        assert_eq!(parsed.shape(), "plain");
        let record = parsed.into_record();
        assert_eq!(record.id.as_deref(), Some("cmpl-1"));
        assert_eq!(record.content, "hello");
        assert_eq!(record.finish_reason.as_deref(), Some("length"));
    }

    #[test]
    fn inline_stream_body_is_folded_into_one_record() {
        let body = concat!(
            "data: {\"id\":\"a\",\"model\":\"m1\",\"created\":1,\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: not json\n\n",
            "data: {\"id\":\"b\",\"model\":\"m2\",\"created\":2,\"choices\":[{\"delta\":{\"content\":\"lo\"},\"finish_reason\":\"stop\"}]}\n\n",
            "data: [DONE]\n\n"
        );
        let parsed = UpstreamResponse::parse(body).expect("parse");
        match &parsed {
            UpstreamResponse::InlineStreamCompletion { fragments, .. } => assert_eq!(*fragments, 2),
            other => panic!("unexpected shape {other:?}"),
        }
        let record = parsed.into_record();
        assert_eq!(record.content, "Hello");
        assert_eq!(record.id.as_deref(), Some("b"));
        assert_eq!(record.model.as_deref(), Some("m2"));
        assert_eq!(record.created, Some(2));
    }

    #[test]
    fn empty_stream_and_bad_json_are_malformed() {
        let err = UpstreamResponse::parse("data: [DONE]\n\n").unwrap_err();
        assert_eq!(err.kind(), "malformed");

        let err = UpstreamResponse::parse("<html>bad gateway</html>").unwrap_err();
        assert_eq!(err.kind(), "malformed");

        let err = UpstreamResponse::parse(r#"{"choices":[]}"#).unwrap_err();
        assert_eq!(err.kind(), "malformed");
    }
}
