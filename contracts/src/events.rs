//! # Vault Events
//!
//! The vault's append-only log. Each entry carries the full six-tuple of the
//! deposit it refers to, so an indexer never needs to read vault storage.
//! `deposit_id` and `user` are the indexed fields: [`EventFilter`] selects
//! on them.

use serde::{Deserialize, Serialize};
use twinvault_protocol::config::{EVENT_TOKENS_DEPOSITED, EVENT_TOKENS_WITHDRAWN};
use twinvault_protocol::{Address, U256};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Which entry point emitted an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultEventKind {
    /// A deposit was created.
    TokensDeposited,
    /// A deposit was redeemed.
    TokensWithdrawn,
}

impl VaultEventKind {
    /// The event's name as it appears in logs and on the API.
    pub fn name(&self) -> &'static str {
        match self {
            VaultEventKind::TokensDeposited => EVENT_TOKENS_DEPOSITED,
            VaultEventKind::TokensWithdrawn => EVENT_TOKENS_WITHDRAWN,
        }
    }
}

impl std::fmt::Display for VaultEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A single log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultEvent {
    /// What happened.
    pub kind: VaultEventKind,
    /// The deposit concerned. Indexed.
    pub deposit_id: U256,
    /// The depositor. Indexed.
    pub user: Address,
    /// First leg asset identifier.
    pub asset_a: Address,
    /// First leg amount.
    pub amount_a: U256,
    /// Second leg asset identifier.
    pub asset_b: Address,
    /// Second leg amount.
    pub amount_b: U256,
    /// Block in which the emitting call committed.
    pub block_number: u64,
}

/// Selects events by their indexed fields. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFilter {
    /// Only events for this deposit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deposit_id: Option<U256>,
    /// Only events for this user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<Address>,
}

impl EventFilter {
    /// A filter that matches everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restricts to one deposit.
    pub fn deposit(mut self, deposit_id: U256) -> Self {
        self.deposit_id = Some(deposit_id);
        self
    }

    /// Restricts to one user.
    pub fn user(mut self, user: Address) -> Self {
        self.user = Some(user);
        self
    }

    /// Returns `true` if `event` passes the filter.
    pub fn matches(&self, event: &VaultEvent) -> bool {
        self.deposit_id.map_or(true, |id| event.deposit_id == id)
            && self.user.map_or(true, |user| event.user == user)
    }
}

// ---------------------------------------------------------------------------
// Log
// ---------------------------------------------------------------------------

/// The append-only event log. Entries are never removed or rewritten.
#[derive(Debug, Clone, Default)]
pub(crate) struct EventLog {
    entries: Vec<VaultEvent>,
}

impl EventLog {
    pub(crate) fn push(&mut self, event: VaultEvent) {
        self.entries.push(event);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn since(&self, index: usize) -> &[VaultEvent] {
        self.entries.get(index..).unwrap_or(&[])
    }

    pub(crate) fn matching<'a>(
        &'a self,
        filter: &'a EventFilter,
    ) -> impl Iterator<Item = &'a VaultEvent> + 'a {
        self.entries.iter().filter(move |e| filter.matches(e))
    }
}
