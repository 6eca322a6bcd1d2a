//! # Fungible Token Model
//!
//! An in-memory ERC20-style token: balances, allowances, and total supply,
//! with checked arithmetic everywhere.
//!
//! Real-world tokens disagree about how to report success, and a vault
//! that only works with the polite ones is a vault that loses money. The
//! [`ReturnStyle`] knob reproduces the three behaviours seen in the wild:
//!
//! | Style      | On success      | On failure            |
//! |------------|-----------------|-----------------------|
//! | `Bool`     | returns `true`  | reverts               |
//! | `Silent`   | returns nothing | reverts               |
//! | `SoftFail` | returns `true`  | returns `false`       |
//!
//! Return data is modelled as `Option<bool>`: `None` means the call
//! returned no data at all.
//!
//! Hooked tokens (ERC777-style) notify the sender before and the recipient
//! after a balance move. The hooks themselves are dispatched by
//! [`Chain`](crate::chain::Chain); this module only carries the flag.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Reasons a token call reverts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    /// The source account does not hold enough tokens.
    #[error("insufficient balance: {account} has {available}, needs {required}")]
    InsufficientBalance {
        /// The account being debited.
        account: Address,
        /// Its current balance.
        available: U256,
        /// The amount requested.
        required: U256,
    },

    /// The spender's allowance does not cover the transfer.
    #[error("insufficient allowance: {spender} may move {allowed} from {owner}, needs {required}")]
    InsufficientAllowance {
        /// The account whose tokens would move.
        owner: Address,
        /// The account attempting to move them.
        spender: Address,
        /// Remaining allowance.
        allowed: U256,
        /// The amount requested.
        required: U256,
    },

    /// All transfers are frozen by the token's administrator.
    #[error("token is paused")]
    Paused,

    /// Minting would push the total supply past `U256::MAX`.
    #[error("supply overflow")]
    SupplyOverflow,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How a token reports the outcome of `transfer` / `transferFrom` / `approve`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnStyle {
    /// Returns `true` on success and reverts on failure.
    #[default]
    Bool,
    /// Returns no data; reverts on failure.
    Silent,
    /// Returns `false` on failure instead of reverting.
    SoftFail,
}

/// Static properties of a token, fixed at deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenConfig {
    /// Human-readable name.
    pub name: String,
    /// Ticker symbol.
    pub symbol: String,
    /// Display decimals.
    #[serde(default = "default_decimals")]
    pub decimals: u8,
    /// Success-reporting behaviour.
    #[serde(default)]
    pub return_style: ReturnStyle,
    /// Whether sender/recipient hooks fire on every balance move.
    #[serde(default)]
    pub hooks: bool,
}

fn default_decimals() -> u8 {
    18
}

impl TokenConfig {
    /// A plain 18-decimal token that returns `true` and has no hooks.
    pub fn new(name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            decimals: default_decimals(),
            return_style: ReturnStyle::Bool,
            hooks: false,
        }
    }

    /// Sets the success-reporting behaviour.
    pub fn with_return_style(mut self, style: ReturnStyle) -> Self {
        self.return_style = style;
        self
    }

    /// Enables ERC777-style sender/recipient hooks.
    pub fn with_hooks(mut self) -> Self {
        self.hooks = true;
        self
    }

    /// Sets the display decimals.
    pub fn with_decimals(mut self, decimals: u8) -> Self {
        self.decimals = decimals;
        self
    }
}

// ---------------------------------------------------------------------------
// TokenState
// ---------------------------------------------------------------------------

/// Return data of a token call: `None` when the token returns nothing.
pub type ReturnData = Option<bool>;

/// Storage of a single deployed token.
///
/// Every mutating method validates first and writes second, so a failed
/// call (revert or soft failure) leaves the state untouched.
#[derive(Debug, Clone)]
pub struct TokenState {
    config: TokenConfig,
    total_supply: U256,
    balances: HashMap<Address, U256>,
    allowances: HashMap<(Address, Address), U256>,
    paused: bool,
}

impl TokenState {
    /// Creates a token with zero supply.
    pub fn new(config: TokenConfig) -> Self {
        Self {
            config,
            total_supply: U256::ZERO,
            balances: HashMap::new(),
            allowances: HashMap::new(),
            paused: false,
        }
    }

    /// Returns the token's static configuration.
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    /// Returns the total supply.
    pub fn total_supply(&self) -> U256 {
        self.total_supply
    }

    /// Returns the balance of `account` (zero if it never held the token).
    pub fn balance_of(&self, account: Address) -> U256 {
        self.balances.get(&account).copied().unwrap_or_default()
    }

    /// Returns how much `spender` may still move on behalf of `owner`.
    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&(owner, spender))
            .copied()
            .unwrap_or_default()
    }

    /// Returns `true` while transfers are frozen.
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Freezes or unfreezes all transfers.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    /// Creates `amount` new tokens in `to`'s balance.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::SupplyOverflow`] if the supply would overflow.
    pub fn mint(&mut self, to: Address, amount: U256) -> Result<(), TokenError> {
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(TokenError::SupplyOverflow)?;
        // A balance can never exceed the supply, so this cannot overflow.
        let balance = self.balance_of(to).saturating_add(amount);

        self.total_supply = supply;
        self.balances.insert(to, balance);
        Ok(())
    }

    /// Sets `spender`'s allowance over `owner`'s tokens.
    pub fn approve(
        &mut self,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<ReturnData, TokenError> {
        if self.paused {
            return self.fail(TokenError::Paused);
        }
        self.allowances.insert((owner, spender), amount);
        Ok(self.succeed())
    }

    /// Moves `amount` from the caller to `to`.
    pub fn transfer(
        &mut self,
        caller: Address,
        to: Address,
        amount: U256,
    ) -> Result<ReturnData, TokenError> {
        match self.move_balance(caller, to, amount) {
            Ok(()) => Ok(self.succeed()),
            Err(e) => self.fail(e),
        }
    }

    /// Moves `amount` from `from` to `to` on the strength of `spender`'s
    /// allowance. An allowance of `U256::MAX` is treated as infinite and
    /// never decremented.
    pub fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<ReturnData, TokenError> {
        let allowed = self.allowance(from, spender);
        if allowed < amount {
            return self.fail(TokenError::InsufficientAllowance {
                owner: from,
                spender,
                allowed,
                required: amount,
            });
        }

        if let Err(e) = self.move_balance(from, to, amount) {
            return self.fail(e);
        }

        if allowed != U256::MAX {
            self.allowances.insert((from, spender), allowed - amount);
        }
        Ok(self.succeed())
    }

    fn move_balance(&mut self, from: Address, to: Address, amount: U256) -> Result<(), TokenError> {
        if self.paused {
            return Err(TokenError::Paused);
        }

        let available = self.balance_of(from);
        if available < amount {
            return Err(TokenError::InsufficientBalance {
                account: from,
                available,
                required: amount,
            });
        }

        self.balances.insert(from, available - amount);
        // Bounded by total supply.
        let credited = self.balance_of(to).saturating_add(amount);
        self.balances.insert(to, credited);
        Ok(())
    }

    fn succeed(&self) -> ReturnData {
        match self.config.return_style {
            ReturnStyle::Bool | ReturnStyle::SoftFail => Some(true),
            ReturnStyle::Silent => None,
        }
    }

    fn fail(&self, error: TokenError) -> Result<ReturnData, TokenError> {
        match self.config.return_style {
            ReturnStyle::SoftFail => Ok(Some(false)),
            ReturnStyle::Bool | ReturnStyle::Silent => Err(error),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
