use llmfanout_core::chat::CompletionRecord;
use llmfanout_core::config::SelectionPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    Candidate,
    TooShort,
}

pub(crate) fn classify(record: &CompletionRecord, min_response_length: usize) -> Verdict {
    if record.content_len() < min_response_length {
        Verdict::TooShort
    } else {
        Verdict::Candidate
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub(crate) attempt: usize,
    pub(crate) chars: usize,
    pub(crate) record: CompletionRecord,
}

/// Accepted records in arrival order.
#[derive(Debug, Default)]
pub(crate) struct CandidatePool {
    candidates: Vec<Candidate>,
}

impl CandidatePool {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, attempt: usize, record: CompletionRecord) {
        let chars = record.content_len();
        self.candidates.push(Candidate {
            attempt,
            chars,
            record,
        });
    }

    pub(crate) fn len(&self) -> usize {
        self.candidates.len()
    }

    /// First-acceptable takes the earliest arrival; best-of-window takes the
    /// longest content, earliest arrival on ties.
    pub(crate) fn take_winner(self, policy: SelectionPolicy) -> Option<Candidate> {
        match policy {
            SelectionPolicy::FirstAcceptable => self.candidates.into_iter().next(),
            SelectionPolicy::BestOfWindow => {
                let mut best: Option<Candidate> = None;
                for candidate in self.candidates {
                    match &best {
                        Some(current) if current.chars >= candidate.chars => {}
                        _ => best = Some(candidate),
                    }
                }
                best
            }
        }
    }
}
