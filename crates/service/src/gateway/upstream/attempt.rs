use futures::future::{BoxFuture, FutureExt};
use llmfanout_core::chat::{CompletionRecord, NormalizedRequest};
use llmfanout_core::config::ConfigSnapshot;
use llmfanout_core::credentials::credential_fingerprint;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use super::response::UpstreamResponse;
use super::transport::{read_upstream_body, send_upstream_request, summarize_body};
use crate::gateway::errors::AttemptFailure;

const ERROR_BODY_LOG_LIMIT: usize = 240;

/// One upstream attempt: one credential, one shared request, one cancel token.
///
/// The returned future must resolve to `Cancelled` promptly once `cancel` fires.
pub(crate) trait AttemptCaller: Send + Sync + 'static {
    fn call(
        &self,
        credential: String,
        request: Arc<NormalizedRequest>,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<CompletionRecord, AttemptFailure>>;
}

/// HTTP-backed caller. Cheap to clone: the client is pooled and shared.
#[derive(Clone)]
pub(crate) struct UpstreamCaller {
    client: reqwest::Client,
    target_url: Arc<str>,
    timeout: Duration,
}

impl UpstreamCaller {
    pub(crate) fn new(client: reqwest::Client, target_url: impl Into<Arc<str>>, timeout: Duration) -> Self {
        Self {
            client,
            target_url: target_url.into(),
            timeout,
        }
    }

    pub(crate) fn from_snapshot(client: &reqwest::Client, snapshot: &ConfigSnapshot) -> Self {
        Self::new(
            client.clone(),
            snapshot.upstream_chat_url(),
            Duration::from_secs(snapshot.server.request_timeout_secs),
        )
    }

    async fn call_once(
        &self,
        credential: &str,
        request: &NormalizedRequest,
    ) -> Result<CompletionRecord, AttemptFailure> {
        let key_fp = credential_fingerprint(credential);
        let started_at = Instant::now();
        let response = send_upstream_request(&self.client, &self.target_url, credential, request)
            .await
            .map_err(|err| AttemptFailure::Network(err.to_string()))?;
        let (status, body) = read_upstream_body(response)
            .await
            .map_err(|err| AttemptFailure::Network(err.to_string()))?;
        let elapsed_ms = started_at.elapsed().as_millis();

        if !(200..300).contains(&status) {
            log::warn!(
                "event=upstream_status_error key_fp={} status={} elapsed_ms={} body={}",
                key_fp,
                status,
                elapsed_ms,
                summarize_body(&body, ERROR_BODY_LOG_LIMIT)
            );
            return Err(AttemptFailure::UpstreamStatus { status, body });
        }

        let parsed = UpstreamResponse::parse(&body)?;
        if let UpstreamResponse::InlineStreamCompletion { fragments, .. } = &parsed {
            log::info!(
                "event=upstream_inline_stream key_fp={} fragments={}",
                key_fp,
                fragments
            );
        }
        log::debug!(
            "event=upstream_response key_fp={} status={} shape={} elapsed_ms={}",
            key_fp,
            status,
            parsed.shape(),
            elapsed_ms
        );
        Ok(parsed.into_record())
    }
}

impl AttemptCaller for UpstreamCaller {
    fn call(
        &self,
        credential: String,
        request: Arc<NormalizedRequest>,
        cancel: CancellationToken,
    ) -> BoxFuture<'static, Result<CompletionRecord, AttemptFailure>> {
        let caller = self.clone();
        async move {
            let timeout = caller.timeout;
            // Dropping the in-flight request future on cancel closes its connection.
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(AttemptFailure::Cancelled),
                outcome = tokio::time::timeout(timeout, caller.call_once(&credential, &request)) => {
                    match outcome {
                        Ok(result) => result,
                        Err(_) => Err(AttemptFailure::Timeout(timeout)),
                    }
                }
            }
        }
        .boxed()
    }
}
