use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use llmfanout_core::chat::{build_content_chunk, build_stop_chunk, ResponseIdentity};
use llmfanout_core::config::ConfigSnapshot;
use llmfanout_core::sse::{format_data_frame, DONE_FRAME};
use serde::Serialize;
use std::convert::Infallible;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StreamSettings {
    pub(crate) chunk_count: usize,
    pub(crate) delay: Duration,
}

impl StreamSettings {
    pub(crate) fn from_snapshot(snapshot: &ConfigSnapshot) -> Self {
        Self {
            chunk_count: snapshot.arbitration.stream_chunk_count,
            delay: Duration::from_millis(snapshot.arbitration.stream_chunk_delay_ms),
        }
    }
}

/// Splits on character boundaries into pieces of `max(1, chars / chunk_count)`
/// characters. Empty content yields no pieces.
pub(crate) fn segment_content(content: &str, chunk_count: usize) -> Vec<String> {
    let chars = content.chars().collect::<Vec<_>>();
    let piece_len = (chars.len() / chunk_count.max(1)).max(1);
    chars
        .chunks(piece_len)
        .map(|piece| piece.iter().collect())
        .collect()
}

fn data_frame<T: Serialize>(value: &T) -> Result<Bytes, String> {
    serde_json::to_string(value)
        .map(|payload| Bytes::from(format_data_frame(&payload)))
        .map_err(|err| format!("serialize stream chunk failed: {err}"))
}

/// Every frame of the replay: one delta per piece, the stop frame, then `[DONE]`.
pub(crate) fn render_frames(
    identity: &ResponseIdentity,
    content: &str,
    chunk_count: usize,
) -> Result<Vec<Bytes>, String> {
    let mut frames = segment_content(content, chunk_count)
        .iter()
        .map(|piece| data_frame(&build_content_chunk(identity, piece)))
        .collect::<Result<Vec<_>, _>>()?;
    frames.push(data_frame(&build_stop_chunk(identity))?);
    frames.push(Bytes::from_static(DONE_FRAME.as_bytes()));
    Ok(frames)
}

/// Replays already-complete content as paced event-stream frames. All frames
/// are rendered up front, so nothing can fail once the response has started.
pub(crate) fn emit(
    identity: &ResponseIdentity,
    content: &str,
    settings: StreamSettings,
) -> Result<impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static, String> {
    let frames = render_frames(identity, content, settings.chunk_count)?;
    let delta_frames = frames.len().saturating_sub(2);
    let delay = settings.delay;
    Ok(stream::iter(frames.into_iter().enumerate()).then(move |(index, frame)| async move {
        // Pause after each delta, i.e. before every frame that follows one.
        if index > 0 && index <= delta_frames && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(frame)
    }))
}
