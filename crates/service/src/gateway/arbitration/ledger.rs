use llmfanout_core::credentials::credential_fingerprint;

/// Terminal states are sticky: once an attempt leaves `Pending` it never moves again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttemptState {
    Pending,
    Succeeded { chars: usize },
    Rejected { chars: usize },
    Failed { kind: &'static str },
    Cancelled,
}

impl AttemptState {
    pub(crate) fn is_terminal(&self) -> bool {
        !matches!(self, AttemptState::Pending)
    }
}

#[derive(Debug, Clone)]
struct AttemptEntry {
    key_fp: String,
    state: AttemptState,
}

/// Per-round record of every spawned attempt, indexed by position in the group.
#[derive(Debug, Clone)]
pub(crate) struct AttemptLedger {
    entries: Vec<AttemptEntry>,
}

impl AttemptLedger {
    pub(crate) fn new(credentials: &[String]) -> Self {
        Self {
            entries: credentials
                .iter()
                .map(|credential| AttemptEntry {
                    key_fp: credential_fingerprint(credential),
                    state: AttemptState::Pending,
                })
                .collect(),
        }
    }

    pub(crate) fn key_fp(&self, attempt: usize) -> &str {
        self.entries
            .get(attempt)
            .map(|entry| entry.key_fp.as_str())
            .unwrap_or("-")
    }

    #[cfg(test)]
    pub(crate) fn state(&self, attempt: usize) -> Option<AttemptState> {
        self.entries.get(attempt).map(|entry| entry.state)
    }

    /// Moves a pending attempt to `next`. Returns false when the attempt is
    /// unknown or already terminal, in which case nothing changes.
    pub(crate) fn settle(&mut self, attempt: usize, next: AttemptState) -> bool {
        match self.entries.get_mut(attempt) {
            Some(entry) if !entry.state.is_terminal() => {
                entry.state = next;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn cancel_pending(&mut self) -> usize {
        let mut cancelled = 0usize;
        for entry in self.entries.iter_mut() {
            if !entry.state.is_terminal() {
                entry.state = AttemptState::Cancelled;
                cancelled += 1;
            }
        }
        cancelled
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| !entry.state.is_terminal())
            .count()
    }

    pub(crate) fn summary(&self) -> String {
        let (mut succeeded, mut rejected, mut failed, mut cancelled) = (0, 0, 0, 0);
        for entry in &self.entries {
            match entry.state {
                AttemptState::Succeeded { .. } => succeeded += 1,
                AttemptState::Rejected { .. } => rejected += 1,
                AttemptState::Failed { .. } => failed += 1,
                AttemptState::Cancelled => cancelled += 1,
                AttemptState::Pending => {}
            }
        }
        format!("succeeded={succeeded} rejected={rejected} failed={failed} cancelled={cancelled}")
    }
}
