// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # TwinVault Protocol: Core Library
//!
//! Everything a TwinVault contract needs from the world it runs in, and
//! nothing it doesn't:
//!
//! - **primitives**: `Address`, `U256`, and the typed [`Asset`] view of an
//!   asset identifier (native sentinel or token contract).
//! - **token**: ERC20-style token storage, including the badly-behaved
//!   variants (no return value, `false` instead of revert, hooks).
//! - **chain**: the devnet execution host: balances, tokens, account
//!   hooks, and nested call frames with all-or-nothing rollback.
//! - **genesis**: initial devnet state, loadable from JSON.
//! - **config**: protocol constants and node defaults.
//!
//! ## Design Philosophy
//!
//! 1. Amounts are `U256` in the smallest unit. No floats, no decimals in
//!    arithmetic, checked operations wherever money moves.
//! 2. Failures are reverts: a failed call leaves no trace in state.
//! 3. Foreign code (hooks) runs with no host lock held, so hostile
//!    callbacks are possible and testable.

pub mod chain;
pub mod config;
pub mod genesis;
pub mod primitives;
pub mod token;

pub use chain::{AccountHook, AssetLedger, CallContext, Chain, ChainError, Checkpoint, HookRejection};
pub use primitives::{Address, Asset, U256};
pub use token::{ReturnStyle, TokenConfig, TokenError};
