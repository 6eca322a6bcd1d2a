//! # TwinVault Contracts
//!
//! The custody vault and the pieces it is built from:
//!
//! - **vault**: the deposit ledger. Accepts up to two assets per deposit,
//!   hands back a dense deposit ID, and releases the exact pair to the
//!   depositor on withdrawal.
//! - **transfer**: one inbound/outbound interface over native value and
//!   ERC20-style tokens, including tokens that return nothing.
//! - **guard**: the vault-wide reentrancy lock.
//! - **events**: the append-only `TokensDeposited` / `TokensWithdrawn` log.
//! - **error**: the failure taxonomy callers match on.
//!
//! ## Design Principles
//!
//! 1. Checks, then effects, then interactions. Every record write happens
//!    before any asset leaves or enters the vault.
//! 2. All or nothing. A failed entry point leaves chain state, vault
//!    records and the event log exactly as they were.
//! 3. The vault never trusts a token or a recipient. Either may call back
//!    into it mid-transfer; the guard turns that into a clean failure.

pub mod error;
pub mod events;
pub mod guard;
pub mod transfer;
pub mod vault;

pub use error::{InvalidAmountReason, VaultError};
pub use events::{EventFilter, VaultEvent, VaultEventKind};
pub use guard::{GuardLock, ReentrancyGuard};
pub use transfer::TransferAdapter;
pub use vault::{DepositRecord, DepositStatus, TwinVault};
