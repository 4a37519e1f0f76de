use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};
use llmfanout_core::chat::{
    build_chat_completion, ChatCompletion, CompletionRecord, InboundChatRequest, NormalizedRequest,
    ResponseIdentity,
};
use llmfanout_core::config::ConfigSnapshot;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use super::arbitration::{ArbitrationSettings, Arbitrator};
use super::stream_emulator::{self, StreamSettings};
use super::upstream::UpstreamCaller;
use super::{GatewayError, GatewayState};

pub(crate) enum ChatReply {
    Completion(ChatCompletion),
    Stream(BoxStream<'static, Result<Bytes, Infallible>>),
}

/// One inbound chat request: rotate, arbitrate, render. The config snapshot is
/// taken once here and used for the whole round.
pub(crate) async fn handle_chat_request(
    state: &GatewayState,
    inbound: InboundChatRequest,
) -> Result<ChatReply, GatewayError> {
    let started_at = Instant::now();
    let snapshot = state.snapshot();
    let group = state.rotator.next_group(&snapshot)?;

    let caller = Arc::new(UpstreamCaller::from_snapshot(&state.client, &snapshot));
    let arbitrator = Arbitrator::new(caller, ArbitrationSettings::from_snapshot(&snapshot));
    let request = Arc::new(inbound.request);
    let decision = arbitrator.run(&group, Arc::clone(&request)).await?;

    let identity = response_identity(&decision.record, &request, &snapshot);
    log::info!(
        "event=chat_request_done group={} stream={} winner={}/{} chars={} upstream_finish={} model={} elapsed_ms={} {}",
        group.name(),
        inbound.stream,
        decision.attempt,
        decision.spawned,
        decision.record.content_len(),
        decision.record.finish_reason.as_deref().unwrap_or("-"),
        identity.model,
        started_at.elapsed().as_millis(),
        decision.ledger.summary()
    );

    if !inbound.stream {
        return Ok(ChatReply::Completion(build_chat_completion(
            &identity,
            &decision.record,
        )));
    }
    let frames = stream_emulator::emit(
        &identity,
        &decision.record.content,
        StreamSettings::from_snapshot(&snapshot),
    )
    .map_err(GatewayError::Internal)?;
    Ok(ChatReply::Stream(frames.boxed()))
}

/// Model falls back from the winning record to the request, then to config.
fn response_identity(
    record: &CompletionRecord,
    request: &NormalizedRequest,
    snapshot: &ConfigSnapshot,
) -> ResponseIdentity {
    let fallback_model = request
        .model()
        .unwrap_or(snapshot.arbitration.fallback_model.as_str());
    ResponseIdentity::resolve(record, fallback_model, llmfanout_core::now_ts())
}
