use llmfanout_core::chat::{CompletionRecord, NormalizedRequest};
use llmfanout_core::config::{ConfigSnapshot, SelectionPolicy};
use llmfanout_core::credentials::CredentialGroup;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::errors::{AttemptFailure, GatewayError};
use super::upstream::AttemptCaller;

mod ledger;
mod policy;

pub(crate) use ledger::{AttemptLedger, AttemptState};
use policy::{classify, CandidatePool, Verdict};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ArbitrationPhase {
    Dispatched,
    Collecting,
    Decided,
    Exhausted,
}

impl ArbitrationPhase {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            ArbitrationPhase::Dispatched => "dispatched",
            ArbitrationPhase::Collecting => "collecting",
            ArbitrationPhase::Decided => "decided",
            ArbitrationPhase::Exhausted => "exhausted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ArbitrationSettings {
    pub(crate) policy: SelectionPolicy,
    pub(crate) min_response_length: usize,
    pub(crate) collection_window: Duration,
}

impl ArbitrationSettings {
    pub(crate) fn from_snapshot(snapshot: &ConfigSnapshot) -> Self {
        Self {
            policy: snapshot.arbitration.selection_policy,
            min_response_length: snapshot.server.min_response_length,
            collection_window: Duration::from_secs(snapshot.arbitration.collection_window_secs),
        }
    }
}

/// The winning record of one round plus what happened to its siblings.
#[derive(Debug)]
pub(crate) struct Decision {
    pub(crate) record: CompletionRecord,
    pub(crate) attempt: usize,
    pub(crate) spawned: usize,
    pub(crate) ledger: AttemptLedger,
}

/// Fans one request out to every credential of a group and settles on one record.
pub(crate) struct Arbitrator<C: AttemptCaller> {
    caller: Arc<C>,
    settings: ArbitrationSettings,
}

impl<C: AttemptCaller> Arbitrator<C> {
    pub(crate) fn new(caller: Arc<C>, settings: ArbitrationSettings) -> Self {
        Self { caller, settings }
    }

    pub(crate) async fn run(
        &self,
        group: &CredentialGroup,
        request: Arc<NormalizedRequest>,
    ) -> Result<Decision, GatewayError> {
        if group.is_empty() {
            return Err(GatewayError::NoEligibleCredentials {
                group: group.name().to_string(),
            });
        }

        let round = CancellationToken::new();
        let mut ledger = AttemptLedger::new(group.credentials());
        let mut attempts = JoinSet::new();
        for (attempt, credential) in group.credentials().iter().enumerate() {
            let call = self
                .caller
                .call(credential.clone(), Arc::clone(&request), round.child_token());
            attempts.spawn(async move { (attempt, call.await) });
        }
        let spawned = attempts.len();
        let mut phase = ArbitrationPhase::Dispatched;
        log::info!(
            "event=arbitration_dispatched group={} attempts={} policy={} min_chars={}",
            group.name(),
            spawned,
            self.settings.policy.as_str(),
            self.settings.min_response_length
        );

        phase = self.advance(phase, ArbitrationPhase::Collecting);
        let mut pool = CandidatePool::new();
        let mut window_deadline: Option<Instant> = None;
        loop {
            let joined = match window_deadline {
                None => attempts.join_next().await,
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, attempts.join_next()).await {
                        Ok(joined) => joined,
                        Err(_) => {
                            log::info!(
                                "event=arbitration_window_closed group={} candidates={} pending={}",
                                group.name(),
                                pool.len(),
                                ledger.pending_count()
                            );
                            break;
                        }
                    }
                }
            };
            let Some(joined) = joined else {
                break;
            };
            let (attempt, outcome) = match joined {
                Ok(value) => value,
                Err(err) => {
                    // A panicked attempt keeps its pending slot; the round close marks it cancelled.
                    log::error!("event=attempt_join_failed group={} err={}", group.name(), err);
                    continue;
                }
            };
            if !self.absorb(&mut ledger, &mut pool, attempt, outcome) {
                continue;
            }
            match self.settings.policy {
                SelectionPolicy::FirstAcceptable => break,
                SelectionPolicy::BestOfWindow => {
                    if window_deadline.is_none() {
                        window_deadline = Some(Instant::now() + self.settings.collection_window);
                        log::debug!(
                            "event=arbitration_window_opened group={} window_ms={}",
                            group.name(),
                            self.settings.collection_window.as_millis()
                        );
                    }
                }
            }
        }

        // Decision point: stop every sibling and never look at their results again.
        round.cancel();
        attempts.abort_all();
        let cancelled = ledger.cancel_pending();

        let Some(winner) = pool.take_winner(self.settings.policy) else {
            self.advance(phase, ArbitrationPhase::Exhausted);
            log::warn!(
                "event=arbitration_exhausted group={} attempts={} {}",
                group.name(),
                spawned,
                ledger.summary()
            );
            return Err(GatewayError::AllAttemptsExhausted { attempts: spawned });
        };
        self.advance(phase, ArbitrationPhase::Decided);
        log::info!(
            "event=arbitration_decided group={} winner_fp={} chars={} cancelled={} {}",
            group.name(),
            ledger.key_fp(winner.attempt),
            winner.chars,
            cancelled,
            ledger.summary()
        );
        Ok(Decision {
            record: winner.record,
            attempt: winner.attempt,
            spawned,
            ledger,
        })
    }

    /// Settles one finished attempt; true when it joined the candidate pool.
    fn absorb(
        &self,
        ledger: &mut AttemptLedger,
        pool: &mut CandidatePool,
        attempt: usize,
        outcome: Result<CompletionRecord, AttemptFailure>,
    ) -> bool {
        let record = match outcome {
            Ok(record) => record,
            Err(failure) => {
                let state = if failure == AttemptFailure::Cancelled {
                    AttemptState::Cancelled
                } else {
                    AttemptState::Failed {
                        kind: failure.kind(),
                    }
                };
                ledger.settle(attempt, state);
                log::warn!(
                    "event=attempt_failed key_fp={} reason={} detail={}",
                    ledger.key_fp(attempt),
                    failure.kind(),
                    failure
                );
                return false;
            }
        };
        let chars = record.content_len();
        match classify(&record, self.settings.min_response_length) {
            Verdict::TooShort => {
                ledger.settle(attempt, AttemptState::Rejected { chars });
                log::info!(
                    "event=attempt_rejected key_fp={} reason=too_short chars={} min_chars={}",
                    ledger.key_fp(attempt),
                    chars,
                    self.settings.min_response_length
                );
                false
            }
            Verdict::Candidate => {
                ledger.settle(attempt, AttemptState::Succeeded { chars });
                log::info!(
                    "event=attempt_candidate key_fp={} chars={}",
                    ledger.key_fp(attempt),
                    chars
                );
                pool.push(attempt, record);
                true
            }
        }
    }

    fn advance(&self, from: ArbitrationPhase, to: ArbitrationPhase) -> ArbitrationPhase {
        log::debug!("event=arbitration_phase from={} to={}", from.as_str(), to.as_str());
        to
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::{BoxFuture, FutureExt};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    enum Script {
        Content(usize),
        Fail(AttemptFailure),
    }

    /// Answers each credential after a fixed delay, counting calls and completions.
    #[derive(Default)]
    struct ScriptedCaller {
        scripts: HashMap<String, (Duration, Script)>,
        calls: Arc<AtomicUsize>,
        completed: Arc<AtomicUsize>,
    }

    impl ScriptedCaller {
        fn with(mut self, credential: &str, delay_ms: u64, script: Script) -> Self {
            self.scripts.insert(
                credential.to_string(),
                (Duration::from_millis(delay_ms), script),
            );
            self
        }
    }

    impl AttemptCaller for ScriptedCaller {
        fn call(
            &self,
            credential: String,
            _request: Arc<NormalizedRequest>,
            cancel: CancellationToken,
        ) -> BoxFuture<'static, Result<CompletionRecord, AttemptFailure>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let (delay, script) = self
                .scripts
                .get(&credential)
                .cloned()
                .unwrap_or((Duration::ZERO, Script::Fail(AttemptFailure::Network("unknown".into()))));
            let completed = Arc::clone(&self.completed);
            async move {
                tokio::select! {
                    _ = cancel.cancelled() => Err(AttemptFailure::Cancelled),
                    _ = tokio::time::sleep(delay) => {
                        completed.fetch_add(1, Ordering::SeqCst);
                        match script {
                            Script::Content(chars) => Ok(CompletionRecord {
                                id: Some(format!("cmpl-{credential}")),
                                content: "x".repeat(chars),
                                ..CompletionRecord::default()
                            }),
                            Script::Fail(failure) => Err(failure),
                        }
                    }
                }
            }
            .boxed()
        }
    }

    fn group(credentials: &[&str]) -> CredentialGroup {
        CredentialGroup::new(
            "group1",
            credentials.iter().map(|c| c.to_string()).collect(),
        )
    }

    fn request() -> Arc<NormalizedRequest> {
        let payload = serde_json::json!({ "model": "m", "messages": [] });
        Arc::new(NormalizedRequest::from_object(payload.as_object().expect("object")))
    }

    fn settings(policy: SelectionPolicy) -> ArbitrationSettings {
        ArbitrationSettings {
            policy,
            min_response_length: 400,
            collection_window: Duration::from_secs(15),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failed_and_short_attempts_are_skipped_for_the_acceptable_one() {
        let caller = ScriptedCaller::default()
            .with("k1", 5, Script::Fail(AttemptFailure::Network("reset".into())))
            .with("k3", 10, Script::Content(50))
            .with("k2", 30, Script::Content(500));
        let calls = Arc::clone(&caller.calls);
        let arbitrator = Arbitrator::new(Arc::new(caller), settings(SelectionPolicy::FirstAcceptable));

        let decision = arbitrator
            .run(&group(&["k1", "k2", "k3"]), request())
            .await
            .expect("decision");
        assert_eq!(decision.record.id.as_deref(), Some("cmpl-k2"));
        assert_eq!(decision.record.content_len(), 500);
        assert_eq!(decision.attempt, 1);
        assert_eq!(decision.spawned, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(decision.ledger.state(0), Some(AttemptState::Failed { kind: "network" }));
        assert_eq!(decision.ledger.state(1), Some(AttemptState::Succeeded { chars: 500 }));
        assert_eq!(decision.ledger.state(2), Some(AttemptState::Rejected { chars: 50 }));
    }

    #[tokio::test(start_paused = true)]
    async fn all_short_responses_exhaust_the_round() {
        let caller = ScriptedCaller::default()
            .with("k1", 5, Script::Content(10))
            .with("k2", 6, Script::Content(399))
            .with("k3", 7, Script::Content(0));
        let arbitrator = Arbitrator::new(Arc::new(caller), settings(SelectionPolicy::BestOfWindow));
        let err = arbitrator
            .run(&group(&["k1", "k2", "k3"]), request())
            .await
            .unwrap_err();
        assert_eq!(err, GatewayError::AllAttemptsExhausted { attempts: 3 });
    }

    #[tokio::test(start_paused = true)]
    async fn first_acceptable_cancels_slower_siblings() {
        let caller = ScriptedCaller::default()
            .with("k1", 10, Script::Content(450))
            .with("k2", 50, Script::Content(2000))
            .with("k3", 80, Script::Content(3000));
        let completed = Arc::clone(&caller.completed);
        let arbitrator = Arbitrator::new(Arc::new(caller), settings(SelectionPolicy::FirstAcceptable));

        let started = Instant::now();
        let decision = arbitrator
            .run(&group(&["k1", "k2", "k3"]), request())
            .await
            .expect("decision");
        assert_eq!(decision.record.id.as_deref(), Some("cmpl-k1"));
        assert!(started.elapsed() < Duration::from_millis(50));
        assert_eq!(decision.ledger.state(1), Some(AttemptState::Cancelled));
        assert_eq!(decision.ledger.state(2), Some(AttemptState::Cancelled));
        assert_eq!(
            decision.ledger.summary(),
            "succeeded=1 rejected=0 failed=0 cancelled=2"
        );

        // Siblings are torn down; nothing runs to its scripted completion.
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn best_of_window_picks_longest_within_window() {
        let caller = ScriptedCaller::default()
            .with("k1", 10, Script::Content(450))
            .with("k2", 1_000, Script::Content(900))
            .with("k3", 20_000, Script::Content(5000));
        let arbitrator = Arbitrator::new(Arc::new(caller), settings(SelectionPolicy::BestOfWindow));

        let started = Instant::now();
        let decision = arbitrator
            .run(&group(&["k1", "k2", "k3"]), request())
            .await
            .expect("decision");
        assert_eq!(decision.record.id.as_deref(), Some("cmpl-k2"));
        // Window opens at the first candidate (10ms) and lasts 15s.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(15_010));
        assert!(elapsed < Duration::from_millis(20_000));
        assert_eq!(decision.ledger.state(2), Some(AttemptState::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn best_of_window_ends_early_when_everyone_answered() {
        let caller = ScriptedCaller::default()
            .with("k1", 10, Script::Content(500))
            .with("k2", 20, Script::Content(500))
            .with("k3", 30, Script::Fail(AttemptFailure::UpstreamStatus {
                status: 500,
                body: "boom".into(),
            }));
        let arbitrator = Arbitrator::new(Arc::new(caller), settings(SelectionPolicy::BestOfWindow));

        let started = Instant::now();
        let decision = arbitrator
            .run(&group(&["k1", "k2", "k3"]), request())
            .await
            .expect("decision");
        // Equal lengths: earliest arrival wins.
        assert_eq!(decision.record.id.as_deref(), Some("cmpl-k1"));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_group_is_rejected_before_dispatch() {
        let caller = ScriptedCaller::default();
        let calls = Arc::clone(&caller.calls);
        let arbitrator = Arbitrator::new(Arc::new(caller), settings(SelectionPolicy::FirstAcceptable));
        let err = arbitrator.run(&group(&[]), request()).await.unwrap_err();
        assert_eq!(
            err,
            GatewayError::NoEligibleCredentials {
                group: "group1".to_string()
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
