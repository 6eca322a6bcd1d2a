//! # Protocol Configuration & Constants
//!
//! Every magic number in TwinVault lives here. If you're hardcoding a
//! constant somewhere else, you're doing it wrong.
//!
//! Runtime knobs (ports, genesis file, log format) are CLI flags on the
//! node binary; the values below are their defaults and the protocol-level
//! facts that never change at runtime.

use alloy_primitives::{Address, U256};

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// The full protocol version string.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Major version. Bump when the deposit record layout or event schema changes.
pub const PROTOCOL_VERSION_MAJOR: u16 = 0;

/// Minor version. Bump on backward-compatible additions.
pub const PROTOCOL_VERSION_MINOR: u16 = 1;

// ---------------------------------------------------------------------------
// Chain Identifiers
// ---------------------------------------------------------------------------

/// Local devnet. Reset on every node start, no promises, no survivors.
pub const CHAIN_ID_DEVNET: u64 = 0x5456_4456; // "TVDV"

/// Shared testnet.
pub const CHAIN_ID_TESTNET: u64 = 0x5456_5454; // "TVTT"

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

/// The reserved asset identifier meaning "the chain's native asset".
///
/// It is the all-zero address: no token contract can ever live there, so
/// it is safe to overload the asset slot with it.
pub const NATIVE_ASSET: Address = Address::ZERO;

/// Display symbol for the native asset.
pub const NATIVE_SYMBOL: &str = "TVN";

/// Decimal places of the native asset. Display only; arithmetic is always
/// in the smallest unit.
pub const NATIVE_DECIMALS: u8 = 18;

/// One whole native unit in the smallest denomination (10^18).
pub const ONE_NATIVE: u128 = 1_000_000_000_000_000_000;

/// Native balance granted to each default devnet account (1,000 TVN).
pub const DEFAULT_GENESIS_BALANCE: u128 = 1_000 * ONE_NATIVE;

/// Token supply minted to each default devnet holder (1,000,000 units).
pub const DEFAULT_TOKEN_GRANT: u128 = 1_000_000 * ONE_NATIVE;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Name of the event emitted on every successful deposit.
pub const EVENT_TOKENS_DEPOSITED: &str = "TokensDeposited";

/// Name of the event emitted on every successful withdrawal.
pub const EVENT_TOKENS_WITHDRAWN: &str = "TokensWithdrawn";

// ---------------------------------------------------------------------------
// Node Defaults
// ---------------------------------------------------------------------------

/// Default JSON-RPC / REST API port.
pub const DEFAULT_RPC_PORT: u16 = 8645;

/// Default metrics (Prometheus) port.
pub const DEFAULT_METRICS_PORT: u16 = 8646;

/// Broadcast capacity for live event streaming to WebSocket clients.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Utility
// ---------------------------------------------------------------------------

/// Converts a whole-unit amount into the smallest denomination.
///
/// Saturates instead of overflowing; nobody has `2^256 / 10^18` TVN.
pub fn units(whole: u64) -> U256 {
    U256::from(whole).saturating_mul(U256::from(ONE_NATIVE))
}

/// Returns a friendly name for a chain ID, mainly for logging.
pub fn network_name(chain_id: u64) -> String {
    match chain_id {
        CHAIN_ID_DEVNET => "devnet".to_string(),
        CHAIN_ID_TESTNET => "testnet".to_string(),
        other => format!("unknown(0x{:08X})", other),
    }
}
