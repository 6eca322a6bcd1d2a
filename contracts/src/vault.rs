//! # TwinVault Ledger
//!
//! Custody for pairs of assets. A depositor locks up to two assets (tokens
//! or the native asset) in one call and gets back a deposit ID; later, the
//! same account redeems exactly that pair with the ID.
//!
//! ## Lifecycle
//!
//! ```text
//!   Nonexistent --deposit--> Active --withdraw--> Settled
//! ```
//!
//! Records are kept in an append-only arena indexed by deposit ID. IDs are
//! dense, start at 0, and are never reused. A record is written once by
//! `deposit` and flipped once by `withdraw`; nothing else mutates it.
//!
//! ## Call discipline
//!
//! Each mutating entry point:
//!
//! 1. takes the [`ReentrancyGuard`] (nested entries fail immediately),
//! 2. validates its input,
//! 3. writes the vault record,
//! 4. moves assets through the [`TransferAdapter`] inside a host
//!    checkpoint,
//! 5. commits and emits its event, or, on any failure, reverts the host
//!    checkpoint and undoes the record write.
//!
//! The store lock is never held while the ledger is called, so a hook may
//! read the vault mid-transfer. Only the guard stops it from writing.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use twinvault_protocol::{Address, Asset, AssetLedger, CallContext, U256};

use crate::error::{InvalidAmountReason, VaultError};
use crate::events::{EventFilter, EventLog, VaultEvent, VaultEventKind};
use crate::guard::ReentrancyGuard;
use crate::transfer::TransferAdapter;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// The lifecycle state of a deposit ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepositStatus {
    /// No deposit was ever created under this ID.
    Nonexistent,
    /// Funds are held and can be withdrawn by the owner.
    Active,
    /// Funds have been returned to the owner.
    Settled,
}

impl std::fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DepositStatus::Nonexistent => write!(f, "Nonexistent"),
            DepositStatus::Active => write!(f, "Active"),
            DepositStatus::Settled => write!(f, "Settled"),
        }
    }
}

/// One escrowed pair of asset legs.
///
/// Unknown IDs read as the all-zero record, the same way an unset storage
/// slot does.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositRecord {
    /// The depositor. Zero only for nonexistent records.
    pub owner: Address,
    /// First leg asset identifier (zero address = native).
    pub asset_a: Address,
    /// Second leg asset identifier (zero address = native).
    pub asset_b: Address,
    /// Amount held under the first leg.
    pub amount_a: U256,
    /// Amount held under the second leg.
    pub amount_b: U256,
    /// Set once, when the deposit is redeemed.
    pub withdrawn: bool,
}

impl DepositRecord {
    /// Classifies the record.
    pub fn status(&self) -> DepositStatus {
        match (self.owner.is_zero(), self.withdrawn) {
            (true, _) => DepositStatus::Nonexistent,
            (false, false) => DepositStatus::Active,
            (false, true) => DepositStatus::Settled,
        }
    }

    /// Both legs as typed `(asset, amount)` pairs.
    pub fn legs(&self) -> [(Asset, U256); 2] {
        [
            (Asset::from_address(self.asset_a), self.amount_a),
            (Asset::from_address(self.asset_b), self.amount_b),
        ]
    }

    fn event(&self, kind: VaultEventKind, deposit_id: U256, block_number: u64) -> VaultEvent {
        VaultEvent {
            kind,
            deposit_id,
            user: self.owner,
            asset_a: self.asset_a,
            amount_a: self.amount_a,
            asset_b: self.asset_b,
            amount_b: self.amount_b,
            block_number,
        }
    }
}

/// Records plus the event log, under one lock.
#[derive(Debug, Default)]
struct DepositStore {
    records: Vec<DepositRecord>,
    log: EventLog,
}

impl DepositStore {
    fn index(&self, deposit_id: U256) -> Option<usize> {
        if deposit_id >= self.next_id() {
            return None;
        }
        u64::try_from(deposit_id).ok().map(|i| i as usize)
    }

    fn next_id(&self) -> U256 {
        U256::from(self.records.len() as u64)
    }
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// The two-leg custody vault, running against any [`AssetLedger`].
pub struct TwinVault<L: AssetLedger> {
    address: Address,
    ledger: L,
    guard: ReentrancyGuard,
    store: RwLock<DepositStore>,
}

impl<L: AssetLedger> TwinVault<L> {
    /// Deploys a vault that holds its assets under `address`.
    pub fn new(ledger: L, address: Address) -> Self {
        info!(vault = %address, "vault deployed");
        Self {
            address,
            ledger,
            guard: ReentrancyGuard::new(),
            store: RwLock::new(DepositStore::default()),
        }
    }

    /// The vault's own account, where escrowed assets are held.
    pub fn address(&self) -> Address {
        self.address
    }

    /// The host this vault runs against.
    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    // -- Entry points --------------------------------------------------------

    /// Escrows up to two assets and returns the new deposit ID.
    ///
    /// `ctx.value` must equal the sum of the native legs exactly. Token legs
    /// are pulled with `transferFrom`, so the caller must have approved the
    /// vault beforehand.
    ///
    /// # Errors
    ///
    /// - [`VaultError::ReentrantCall`] if another entry point is running.
    /// - [`VaultError::InvalidAmount`] if both amounts are zero, both assets
    ///   are native, or the attached value is wrong.
    /// - [`VaultError::InvalidCaller`] if the caller is the zero address.
    /// - [`VaultError::InvalidToken`] if both legs name the same token.
    /// - [`VaultError::TransferFailed`] if a token leg cannot be pulled.
    pub fn deposit(
        &self,
        ctx: CallContext,
        asset_a: Address,
        amount_a: U256,
        asset_b: Address,
        amount_b: U256,
    ) -> Result<U256, VaultError> {
        let record = DepositRecord {
            owner: ctx.caller,
            asset_a,
            asset_b,
            amount_a,
            amount_b,
            withdrawn: false,
        };
        self.try_deposit(ctx, record).map_err(|e| {
            warn!(caller = %ctx.caller, kind = e.code(), error = %e, "deposit rejected");
            e
        })
    }

    /// Returns both legs of deposit `deposit_id` to its owner.
    ///
    /// # Errors
    ///
    /// - [`VaultError::ReentrantCall`] if another entry point is running.
    /// - [`VaultError::InvalidAmount`] if native value is attached.
    /// - [`VaultError::DepositNotFound`], [`VaultError::DepositAlreadyWithdrawn`],
    ///   [`VaultError::UnauthorizedWithdrawal`] per the record's state.
    /// - [`VaultError::TransferFailed`] if either leg cannot be sent.
    pub fn withdraw(&self, ctx: CallContext, deposit_id: U256) -> Result<(), VaultError> {
        self.try_withdraw(ctx, deposit_id).map_err(|e| {
            warn!(
                caller = %ctx.caller,
                deposit_id = %deposit_id,
                kind = e.code(),
                error = %e,
                "withdraw rejected"
            );
            e
        })
    }

    fn try_deposit(&self, ctx: CallContext, record: DepositRecord) -> Result<U256, VaultError> {
        let _lock = self.guard.enter()?;
        validate_deposit(&record, ctx.value)?;

        // Effects: the record exists before any token is touched.
        let (deposit_id, index) = {
            let mut store = self.store.write();
            let id = store.next_id();
            store.records.push(record.clone());
            (id, store.records.len() - 1)
        };

        let checkpoint = self.ledger.checkpoint();
        let adapter = TransferAdapter::new(&self.ledger, self.address);
        let funded = adapter.receive_value(ctx.caller, ctx.value).and_then(|()| {
            record
                .legs()
                .into_iter()
                .filter(|(_, amount)| !amount.is_zero())
                .try_for_each(|(asset, amount)| adapter.pull_in(asset, ctx.caller, amount))
        });

        if let Err(e) = funded {
            self.ledger.revert_to(checkpoint);
            self.store.write().records.truncate(index);
            return Err(e);
        }

        self.ledger.commit(checkpoint);
        let block_number = self.ledger.block_number();
        self.store.write().log.push(record.event(
            VaultEventKind::TokensDeposited,
            deposit_id,
            block_number,
        ));

        info!(
            deposit_id = %deposit_id,
            user = %ctx.caller,
            asset_a = %record.asset_a,
            amount_a = %record.amount_a,
            asset_b = %record.asset_b,
            amount_b = %record.amount_b,
            "tokens deposited"
        );
        Ok(deposit_id)
    }

    fn try_withdraw(&self, ctx: CallContext, deposit_id: U256) -> Result<(), VaultError> {
        let _lock = self.guard.enter()?;
        if !ctx.value.is_zero() {
            return Err(VaultError::InvalidAmount(
                InvalidAmountReason::UnexpectedValue { supplied: ctx.value },
            ));
        }

        // Checks and effects under one write lock.
        let (index, record) = {
            let mut store = self.store.write();
            // A zero owner means no deposit, matching `DepositRecord::status`.
            let index = store
                .index(deposit_id)
                .filter(|&i| !store.records[i].owner.is_zero())
                .ok_or(VaultError::DepositNotFound(deposit_id))?;
            let record = &mut store.records[index];
            if record.withdrawn {
                return Err(VaultError::DepositAlreadyWithdrawn(deposit_id));
            }
            if record.owner != ctx.caller {
                return Err(VaultError::UnauthorizedWithdrawal {
                    deposit_id,
                    caller: ctx.caller,
                    owner: record.owner,
                });
            }
            record.withdrawn = true;
            (index, record.clone())
        };

        // Interactions.
        let checkpoint = self.ledger.checkpoint();
        let adapter = TransferAdapter::new(&self.ledger, self.address);
        let paid = record
            .legs()
            .into_iter()
            .filter(|(_, amount)| !amount.is_zero())
            .try_for_each(|(asset, amount)| adapter.push_out(asset, ctx.caller, amount));

        if let Err(e) = paid {
            self.ledger.revert_to(checkpoint);
            self.store.write().records[index].withdrawn = false;
            return Err(e);
        }

        self.ledger.commit(checkpoint);
        let block_number = self.ledger.block_number();
        self.store.write().log.push(record.event(
            VaultEventKind::TokensWithdrawn,
            deposit_id,
            block_number,
        ));

        info!(deposit_id = %deposit_id, user = %ctx.caller, "tokens withdrawn");
        Ok(())
    }

    // -- Views ---------------------------------------------------------------

    /// Reads a deposit record. Unknown IDs read as the zero record.
    pub fn get_deposit(&self, deposit_id: U256) -> DepositRecord {
        let store = self.store.read();
        store
            .index(deposit_id)
            .map(|i| store.records[i].clone())
            .unwrap_or_default()
    }

    /// Classifies a deposit ID.
    pub fn deposit_status(&self, deposit_id: U256) -> DepositStatus {
        self.get_deposit(deposit_id).status()
    }

    /// The ID the next successful deposit will receive.
    pub fn next_deposit_id(&self) -> U256 {
        self.store.read().next_id()
    }

    /// The full event log, oldest first.
    pub fn events(&self) -> Vec<VaultEvent> {
        self.store.read().log.since(0).to_vec()
    }

    /// Events appended at or after position `index` in the log.
    pub fn events_since(&self, index: usize) -> Vec<VaultEvent> {
        self.store.read().log.since(index).to_vec()
    }

    /// Events passing `filter`, oldest first.
    pub fn events_matching(&self, filter: &EventFilter) -> Vec<VaultEvent> {
        self.store.read().log.matching(filter).cloned().collect()
    }

    /// Number of events emitted so far.
    pub fn event_count(&self) -> usize {
        self.store.read().log.len()
    }

    /// Number of deposits not yet withdrawn.
    pub fn active_deposits(&self) -> usize {
        self.store
            .read()
            .records
            .iter()
            .filter(|r| r.status() == DepositStatus::Active)
            .count()
    }

    /// Sum of all active legs holding `asset`. The vault's balance of
    /// `asset` never drops below this.
    ///
    /// Returns `None` if the sum does not fit in a `U256`.
    pub fn outstanding(&self, asset: Asset) -> Option<U256> {
        let store = self.store.read();
        store
            .records
            .iter()
            .filter(|r| r.status() == DepositStatus::Active)
            .flat_map(|r| r.legs())
            .filter(|(leg, _)| *leg == asset)
            .try_fold(U256::ZERO, |total, (_, amount)| total.checked_add(amount))
    }
}

/// Input checks for `deposit`, in the order the errors take precedence.
fn validate_deposit(record: &DepositRecord, value: U256) -> Result<(), VaultError> {
    if record.owner.is_zero() {
        return Err(VaultError::InvalidCaller(record.owner));
    }

    let [(asset_a, amount_a), (asset_b, amount_b)] = record.legs();

    if amount_a.is_zero() && amount_b.is_zero() {
        return Err(VaultError::InvalidAmount(InvalidAmountReason::BothLegsZero));
    }
    if asset_a.is_native() && asset_b.is_native() {
        return Err(VaultError::InvalidAmount(InvalidAmountReason::BothLegsNative));
    }
    if asset_a == asset_b {
        return Err(VaultError::InvalidToken(record.asset_a));
    }

    // At most one leg is native here, so this cannot overflow.
    let required = [(asset_a, amount_a), (asset_b, amount_b)]
        .into_iter()
        .filter(|(asset, _)| asset.is_native())
        .fold(U256::ZERO, |sum, (_, amount)| sum + amount);
    if value != required {
        return Err(VaultError::InvalidAmount(InvalidAmountReason::ValueMismatch {
            required,
            supplied: value,
        }));
    }

    debug!(%required, "deposit input validated");
    Ok(())
}
