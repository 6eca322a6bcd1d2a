//! # Devnet Execution Host
//!
//! [`Chain`] is the environment contracts run against: native balances,
//! deployed tokens, contract hooks attached to accounts, and a block
//! counter. It is deliberately small -- just enough world for a vault to
//! move assets around and for hostile counterparties to try to break it.
//!
//! ## Call Frames
//!
//! Every host operation that can invoke foreign code (a hook) runs inside
//! its own checkpoint, so a rejected hook undoes the balance move that
//! triggered it. Contracts take their own checkpoint around a whole entry
//! point and either [`commit`](Chain::commit) or
//! [`revert_to`](Chain::revert_to) it. Checkpoints nest LIFO, exactly like
//! EVM call frames.
//!
//! ## Locking
//!
//! State sits behind a `parking_lot::Mutex` that is only ever held for the
//! duration of a balance update. Hooks are invoked with no lock held, which
//! is what allows them to call back into contracts mid-transfer. Whether
//! that callback is safe is the contract's problem; see the vault's
//! reentrancy guard.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, error, trace};

use crate::config::CHAIN_ID_DEVNET;
use crate::token::{ReturnData, TokenConfig, TokenError, TokenState};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by host operations. Each one is a revert of the call frame
/// that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// The target address has no token contract.
    #[error("no token contract deployed at {0}")]
    NoContract(Address),

    /// The token call itself reverted.
    #[error("token call reverted: {0}")]
    TokenReverted(#[from] TokenError),

    /// The sender cannot cover a native transfer.
    #[error("insufficient native balance: {account} has {available}, needs {required}")]
    InsufficientNativeBalance {
        /// The account being debited.
        account: Address,
        /// Its current balance.
        available: U256,
        /// The amount requested.
        required: U256,
    },

    /// Crediting the recipient would overflow its native balance.
    #[error("native balance overflow for {0}")]
    NativeOverflow(Address),

    /// A contract hook on the account refused the call.
    #[error("account {account} rejected the call: {reason}")]
    HookRejected {
        /// The account whose hook rejected.
        account: Address,
        /// The reason the hook gave.
        reason: String,
    },
}

/// A refusal returned by an [`AccountHook`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HookRejection(pub String);

impl HookRejection {
    /// Builds a rejection from anything printable, e.g. a nested contract error.
    pub fn new(reason: impl ToString) -> Self {
        Self(reason.to_string())
    }
}

// ---------------------------------------------------------------------------
// Call context
// ---------------------------------------------------------------------------

/// Who is calling a contract entry point and how much native value is
/// attached to the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallContext {
    /// The immediate caller.
    pub caller: Address,
    /// Native value attached to the call, in the smallest unit.
    pub value: U256,
}

impl CallContext {
    /// A call with no attached value.
    pub fn new(caller: Address) -> Self {
        Self {
            caller,
            value: U256::ZERO,
        }
    }

    /// Attaches native value to the call.
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

/// Contract code attached to an account.
///
/// An account with a hook behaves like a contract: it can refuse incoming
/// native value and it is notified about hooked-token movements. All
/// methods default to accepting silently.
pub trait AccountHook: Send + Sync {
    /// Called after native value has been credited to the account.
    fn on_native_received(&self, _from: Address, _amount: U256) -> Result<(), HookRejection> {
        Ok(())
    }

    /// Called before a hooked token debits the account.
    fn on_tokens_sent(
        &self,
        _token: Address,
        _operator: Address,
        _to: Address,
        _amount: U256,
    ) -> Result<(), HookRejection> {
        Ok(())
    }

    /// Called after a hooked token credits the account.
    fn on_tokens_received(
        &self,
        _token: Address,
        _operator: Address,
        _from: Address,
        _amount: U256,
    ) -> Result<(), HookRejection> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// AssetLedger
// ---------------------------------------------------------------------------

/// The asset-movement surface a contract needs from its host.
///
/// This is the seam between contract logic and the environment: the vault
/// is generic over it, the devnet [`Chain`] implements it.
pub trait AssetLedger: Send + Sync {
    /// Moves native value and notifies the recipient.
    fn native_transfer(&self, from: Address, to: Address, amount: U256) -> Result<(), ChainError>;

    /// Calls `token.transfer(to, amount)` as `caller`.
    fn token_transfer(
        &self,
        token: Address,
        caller: Address,
        to: Address,
        amount: U256,
    ) -> Result<ReturnData, ChainError>;

    /// Calls `token.transferFrom(from, to, amount)` as `spender`.
    fn token_transfer_from(
        &self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<ReturnData, ChainError>;

    /// Opens a call frame.
    fn checkpoint(&self) -> Checkpoint;

    /// Discards every change made since `checkpoint` and closes the frame.
    fn revert_to(&self, checkpoint: Checkpoint);

    /// Keeps every change made since `checkpoint` and closes the frame.
    fn commit(&self, checkpoint: Checkpoint);

    /// Current block number, stamped on emitted events.
    fn block_number(&self) -> u64;
}

impl<T: AssetLedger + ?Sized> AssetLedger for Arc<T> {
    fn native_transfer(&self, from: Address, to: Address, amount: U256) -> Result<(), ChainError> {
        (**self).native_transfer(from, to, amount)
    }

    fn token_transfer(
        &self,
        token: Address,
        caller: Address,
        to: Address,
        amount: U256,
    ) -> Result<ReturnData, ChainError> {
        (**self).token_transfer(token, caller, to, amount)
    }

    fn token_transfer_from(
        &self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<ReturnData, ChainError> {
        (**self).token_transfer_from(token, spender, from, to, amount)
    }

    fn checkpoint(&self) -> Checkpoint {
        (**self).checkpoint()
    }

    fn revert_to(&self, checkpoint: Checkpoint) {
        (**self).revert_to(checkpoint)
    }

    fn commit(&self, checkpoint: Checkpoint) {
        (**self).commit(checkpoint)
    }

    fn block_number(&self) -> u64 {
        (**self).block_number()
    }
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// Handle to an open call frame. Only valid on the chain that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(usize);

/// Everything a checkpoint has to capture.
#[derive(Debug, Clone, Default)]
struct ChainState {
    native: HashMap<Address, U256>,
    tokens: HashMap<Address, TokenState>,
    block_number: u64,
    contract_nonce: u64,
}

impl ChainState {
    fn native_balance(&self, account: Address) -> U256 {
        self.native.get(&account).copied().unwrap_or_default()
    }

    fn move_native(&mut self, from: Address, to: Address, amount: U256) -> Result<(), ChainError> {
        let available = self.native_balance(from);
        if available < amount {
            return Err(ChainError::InsufficientNativeBalance {
                account: from,
                available,
                required: amount,
            });
        }
        if from == to {
            return Ok(());
        }
        let credited = self
            .native_balance(to)
            .checked_add(amount)
            .ok_or(ChainError::NativeOverflow(to))?;

        self.native.insert(from, available - amount);
        self.native.insert(to, credited);
        Ok(())
    }

    fn token_mut(&mut self, token: Address) -> Result<&mut TokenState, ChainError> {
        self.tokens
            .get_mut(&token)
            .ok_or(ChainError::NoContract(token))
    }

    fn next_contract_address(&mut self) -> Address {
        self.contract_nonce += 1;
        let mut bytes = [0u8; 20];
        bytes[0] = 0xC0;
        bytes[12..].copy_from_slice(&self.contract_nonce.to_be_bytes());
        Address::new(bytes)
    }
}

/// The devnet execution host.
pub struct Chain {
    chain_id: u64,
    state: Mutex<ChainState>,
    journal: Mutex<Vec<ChainState>>,
    hooks: RwLock<HashMap<Address, Arc<dyn AccountHook>>>,
}

impl Chain {
    /// Creates an empty devnet chain.
    pub fn new() -> Self {
        Self::with_chain_id(CHAIN_ID_DEVNET)
    }

    /// Creates an empty chain with an explicit chain ID.
    pub fn with_chain_id(chain_id: u64) -> Self {
        Self {
            chain_id,
            state: Mutex::new(ChainState::default()),
            journal: Mutex::new(Vec::new()),
            hooks: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the chain ID.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    // -- Blocks --------------------------------------------------------------

    /// Returns the current block number.
    pub fn block_number(&self) -> u64 {
        self.state.lock().block_number
    }

    /// Seals the current block and returns the new block number.
    pub fn advance_block(&self) -> u64 {
        let mut state = self.state.lock();
        state.block_number += 1;
        state.block_number
    }

    // -- Accounts & contracts ------------------------------------------------

    /// Reserves a fresh contract address (used when deploying contracts
    /// that live outside the host, like the vault).
    pub fn allocate_address(&self) -> Address {
        self.state.lock().next_contract_address()
    }

    /// Deploys a new token with zero supply and returns its address.
    pub fn deploy_token(&self, config: TokenConfig) -> Address {
        let mut state = self.state.lock();
        let address = state.next_contract_address();
        debug!(token = %address, symbol = %config.symbol, "token deployed");
        state.tokens.insert(address, TokenState::new(config));
        address
    }

    /// Attaches contract code to `account`, replacing any previous hook.
    pub fn register_hook(&self, account: Address, hook: Arc<dyn AccountHook>) {
        self.hooks.write().insert(account, hook);
    }

    /// Detaches contract code from `account`.
    pub fn remove_hook(&self, account: Address) {
        self.hooks.write().remove(&account);
    }

    fn hook(&self, account: Address) -> Option<Arc<dyn AccountHook>> {
        self.hooks.read().get(&account).cloned()
    }

    // -- Native asset --------------------------------------------------------

    /// Returns the native balance of `account`.
    pub fn native_balance(&self, account: Address) -> U256 {
        self.state.lock().native_balance(account)
    }

    /// Overwrites the native balance of `account` (genesis / test setup).
    pub fn set_native_balance(&self, account: Address, amount: U256) {
        self.state.lock().native.insert(account, amount);
    }

    /// Moves native value from `from` to `to`, then runs the recipient's
    /// hook. A rejecting hook reverts the move.
    pub fn native_transfer(&self, from: Address, to: Address, amount: U256) -> Result<(), ChainError> {
        self.atomically(|| {
            self.state.lock().move_native(from, to, amount)?;
            trace!(%from, %to, %amount, "native transfer");

            if let Some(hook) = self.hook(to) {
                hook.on_native_received(from, amount)
                    .map_err(|rejection| ChainError::HookRejected {
                        account: to,
                        reason: rejection.0,
                    })?;
            }
            Ok(())
        })
    }

    // -- Tokens --------------------------------------------------------------

    /// Returns the configuration of the token at `token`.
    pub fn token_config(&self, token: Address) -> Result<TokenConfig, ChainError> {
        self.read_token(token, |t| t.config().clone())
    }

    /// Returns `account`'s balance of `token`.
    pub fn token_balance(&self, token: Address, account: Address) -> Result<U256, ChainError> {
        self.read_token(token, |t| t.balance_of(account))
    }

    /// Returns `spender`'s remaining allowance over `owner`'s `token`.
    pub fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ChainError> {
        self.read_token(token, |t| t.allowance(owner, spender))
    }

    /// Returns the total supply of `token`.
    pub fn total_supply(&self, token: Address) -> Result<U256, ChainError> {
        self.read_token(token, |t| t.total_supply())
    }

    /// Mints `amount` of `token` to `to` (genesis / test setup).
    pub fn mint(&self, token: Address, to: Address, amount: U256) -> Result<(), ChainError> {
        let mut state = self.state.lock();
        state.token_mut(token)?.mint(to, amount)?;
        Ok(())
    }

    /// Freezes or unfreezes all transfers of `token`.
    pub fn set_token_paused(&self, token: Address, paused: bool) -> Result<(), ChainError> {
        let mut state = self.state.lock();
        state.token_mut(token)?.set_paused(paused);
        Ok(())
    }

    /// Calls `token.approve(spender, amount)` as `owner`.
    pub fn approve(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<ReturnData, ChainError> {
        let mut state = self.state.lock();
        Ok(state.token_mut(token)?.approve(owner, spender, amount)?)
    }

    /// Calls `token.transfer(to, amount)` as `caller`.
    pub fn token_transfer(
        &self,
        token: Address,
        caller: Address,
        to: Address,
        amount: U256,
    ) -> Result<ReturnData, ChainError> {
        self.hooked_token_call(token, caller, caller, to, amount, |t| {
            t.transfer(caller, to, amount)
        })
    }

    /// Calls `token.transferFrom(from, to, amount)` as `spender`.
    pub fn token_transfer_from(
        &self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<ReturnData, ChainError> {
        self.hooked_token_call(token, spender, from, to, amount, |t| {
            t.transfer_from(spender, from, to, amount)
        })
    }

    fn read_token<T>(
        &self,
        token: Address,
        read: impl FnOnce(&TokenState) -> T,
    ) -> Result<T, ChainError> {
        let state = self.state.lock();
        state
            .tokens
            .get(&token)
            .map(read)
            .ok_or(ChainError::NoContract(token))
    }

    /// Runs a balance-moving token call with ERC777-style hooks around it:
    /// sender hook first, then the move, then the recipient hook.
    fn hooked_token_call(
        &self,
        token: Address,
        operator: Address,
        from: Address,
        to: Address,
        amount: U256,
        call: impl FnOnce(&mut TokenState) -> Result<ReturnData, TokenError>,
    ) -> Result<ReturnData, ChainError> {
        self.atomically(|| {
            let hooked = self.read_token(token, |t| t.config().hooks)?;

            if hooked {
                if let Some(hook) = self.hook(from) {
                    hook.on_tokens_sent(token, operator, to, amount)
                        .map_err(|rejection| ChainError::HookRejected {
                            account: from,
                            reason: rejection.0,
                        })?;
                }
            }

            let returned = {
                let mut state = self.state.lock();
                call(state.token_mut(token)?)?
            };
            trace!(%token, %from, %to, %amount, ?returned, "token transfer");

            if hooked && returned != Some(false) {
                if let Some(hook) = self.hook(to) {
                    hook.on_tokens_received(token, operator, from, amount)
                        .map_err(|rejection| ChainError::HookRejected {
                            account: to,
                            reason: rejection.0,
                        })?;
                }
            }
            Ok(returned)
        })
    }

    // -- Call frames ---------------------------------------------------------

    /// Opens a call frame by snapshotting the full state.
    pub fn checkpoint(&self) -> Checkpoint {
        let snapshot = self.state.lock().clone();
        let mut journal = self.journal.lock();
        journal.push(snapshot);
        Checkpoint(journal.len() - 1)
    }

    /// Restores the state captured by `checkpoint` and closes it together
    /// with every frame opened after it.
    pub fn revert_to(&self, checkpoint: Checkpoint) {
        let snapshot = {
            let mut journal = self.journal.lock();
            if checkpoint.0 >= journal.len() {
                error!(?checkpoint, depth = journal.len(), "revert to a closed checkpoint");
                return;
            }
            journal.truncate(checkpoint.0 + 1);
            journal.pop()
        };
        if let Some(snapshot) = snapshot {
            *self.state.lock() = snapshot;
        }
    }

    /// Keeps the current state and closes `checkpoint` together with every
    /// frame opened after it.
    pub fn commit(&self, checkpoint: Checkpoint) {
        let mut journal = self.journal.lock();
        if checkpoint.0 >= journal.len() {
            error!(?checkpoint, depth = journal.len(), "commit of a closed checkpoint");
            return;
        }
        journal.truncate(checkpoint.0);
    }

    /// Runs `body` in its own call frame: committed on `Ok`, reverted on `Err`.
    pub fn atomically<T, E>(&self, body: impl FnOnce() -> Result<T, E>) -> Result<T, E> {
        let checkpoint = self.checkpoint();
        match body() {
            Ok(value) => {
                self.commit(checkpoint);
                Ok(value)
            }
            Err(e) => {
                self.revert_to(checkpoint);
                Err(e)
            }
        }
    }
}

impl Default for Chain {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetLedger for Chain {
    fn native_transfer(&self, from: Address, to: Address, amount: U256) -> Result<(), ChainError> {
        Chain::native_transfer(self, from, to, amount)
    }

    fn token_transfer(
        &self,
        token: Address,
        caller: Address,
        to: Address,
        amount: U256,
    ) -> Result<ReturnData, ChainError> {
        Chain::token_transfer(self, token, caller, to, amount)
    }

    fn token_transfer_from(
        &self,
        token: Address,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<ReturnData, ChainError> {
        Chain::token_transfer_from(self, token, spender, from, to, amount)
    }

    fn checkpoint(&self) -> Checkpoint {
        Chain::checkpoint(self)
    }

    fn revert_to(&self, checkpoint: Checkpoint) {
        Chain::revert_to(self, checkpoint)
    }

    fn commit(&self, checkpoint: Checkpoint) {
        Chain::commit(self, checkpoint)
    }

    fn block_number(&self) -> u64 {
        Chain::block_number(self)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
