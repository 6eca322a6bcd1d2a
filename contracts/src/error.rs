//! # Vault Errors
//!
//! Every failure is an all-or-nothing abort: when a vault entry point
//! returns one of these, no record, balance or event has changed. The
//! variants are grouped so callers can tell bad input apart from "not your
//! deposit" and from "an asset refused to move".

use serde::Serialize;
use thiserror::Error;
use twinvault_protocol::{Address, Asset, U256};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why an amount (or the attached value) was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum InvalidAmountReason {
    /// Both legs of a deposit carry zero.
    BothLegsZero,
    /// Both legs of a deposit name the native asset.
    BothLegsNative,
    /// The attached native value does not equal the sum of the native legs.
    ValueMismatch {
        /// Value the native legs require.
        required: U256,
        /// Value actually attached to the call.
        supplied: U256,
    },
    /// Native value was attached to a non-payable call.
    UnexpectedValue {
        /// Value attached to the call.
        supplied: U256,
    },
}

impl std::fmt::Display for InvalidAmountReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidAmountReason::BothLegsZero => write!(f, "both amounts are zero"),
            InvalidAmountReason::BothLegsNative => {
                write!(f, "at most one leg may hold the native asset")
            }
            InvalidAmountReason::ValueMismatch { required, supplied } => write!(
                f,
                "attached value {} does not match required {}",
                supplied, required
            ),
            InvalidAmountReason::UnexpectedValue { supplied } => {
                write!(f, "call is not payable but {} was attached", supplied)
            }
        }
    }
}

/// Errors returned by [`TwinVault`](crate::vault::TwinVault) entry points.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VaultError {
    /// Amounts or attached value are unacceptable.
    #[error("invalid amount: {0}")]
    InvalidAmount(InvalidAmountReason),

    /// The caller is the zero address, which cannot own a deposit.
    #[error("invalid caller: {0} cannot own a deposit")]
    InvalidCaller(Address),

    /// Both legs reference the same token.
    #[error("invalid token: both legs reference {0}")]
    InvalidToken(Address),

    /// No deposit was ever created under this ID.
    #[error("deposit {0} not found")]
    DepositNotFound(U256),

    /// The deposit has already been redeemed.
    #[error("deposit {0} already withdrawn")]
    DepositAlreadyWithdrawn(U256),

    /// Only the depositor may withdraw.
    #[error("{caller} may not withdraw deposit {deposit_id} owned by {owner}")]
    UnauthorizedWithdrawal {
        /// The deposit being withdrawn.
        deposit_id: U256,
        /// Who tried to withdraw it.
        caller: Address,
        /// Who owns it.
        owner: Address,
    },

    /// An asset transfer reverted, returned `false`, or was rejected by the
    /// recipient.
    #[error("transfer of {asset} failed: {reason}")]
    TransferFailed {
        /// The asset that failed to move.
        asset: Asset,
        /// What the host reported.
        reason: String,
    },

    /// A vault entry point was entered while another was still running.
    #[error("reentrant call rejected")]
    ReentrantCall,
}

impl VaultError {
    /// Stable machine-readable identifier, used as the error kind in the
    /// node's API responses and metrics labels.
    pub fn code(&self) -> &'static str {
        match self {
            VaultError::InvalidAmount(_) => "InvalidAmount",
            VaultError::InvalidCaller(_) => "InvalidCaller",
            VaultError::InvalidToken(_) => "InvalidToken",
            VaultError::DepositNotFound(_) => "DepositNotFound",
            VaultError::DepositAlreadyWithdrawn(_) => "DepositAlreadyWithdrawn",
            VaultError::UnauthorizedWithdrawal { .. } => "UnauthorizedWithdrawal",
            VaultError::TransferFailed { .. } => "TransferFailed",
            VaultError::ReentrantCall => "ReentrantCall",
        }
    }

    /// Returns `true` for failures caused by the caller's input, as opposed
    /// to authorization, state, or asset behaviour.
    pub fn is_bad_input(&self) -> bool {
        matches!(
            self,
            VaultError::InvalidAmount(_)
                | VaultError::InvalidCaller(_)
                | VaultError::InvalidToken(_)
        )
    }
}
