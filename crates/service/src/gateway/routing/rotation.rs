use llmfanout_core::config::ConfigSnapshot;
use llmfanout_core::credentials::CredentialGroup;
use std::sync::atomic::{AtomicU64, Ordering};

use super::errors::GatewayError;

/// Strict round-robin over the configured credential groups.
///
/// Each call takes a ticket with one `fetch_add`, so concurrent requests never
/// share a ticket and never skip one. The ticket is consumed whether or not the
/// round that follows succeeds.
#[derive(Debug, Default)]
pub(crate) struct CredentialRotator {
    next_ticket: AtomicU64,
}

impl CredentialRotator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Picks the next group and returns its eligible credentials.
    pub(crate) fn next_group(
        &self,
        snapshot: &ConfigSnapshot,
    ) -> Result<CredentialGroup, GatewayError> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::AcqRel);
        let group_count = snapshot.group_count();
        if group_count == 0 {
            return Err(GatewayError::NoEligibleCredentials {
                group: "<none>".to_string(),
            });
        }
        let index = (ticket % group_count as u64) as usize;
        let Some(group) = snapshot.group(index) else {
            return Err(GatewayError::NoEligibleCredentials {
                group: format!("#{index}"),
            });
        };
        let eligible = group.eligible();
        if eligible.is_empty() {
            // No fallback to another group: an empty group is a configuration error.
            log::error!(
                "event=rotation_no_eligible ticket={} group={} configured={}",
                ticket,
                group.name(),
                group.len()
            );
            return Err(GatewayError::NoEligibleCredentials {
                group: group.name().to_string(),
            });
        }
        log::info!(
            "event=rotation_selected ticket={} group={} eligible={}",
            ticket,
            eligible.name(),
            eligible.len()
        );
        Ok(eligible)
    }

    /// Index the next call would pick; does not advance.
    pub(crate) fn peek_index(&self, group_count: usize) -> Option<usize> {
        if group_count == 0 {
            return None;
        }
        Some((self.next_ticket.load(Ordering::Acquire) % group_count as u64) as usize)
    }
}
