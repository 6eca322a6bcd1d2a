//! Hostile counterparties.
//!
//! Each test attaches contract code to an attacker account that calls back
//! into the vault while the vault is mid-transfer: through a hooked
//! token's sender/recipient notifications during `deposit`, and through a
//! native-value receive hook during `withdraw`.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use twinvault_contracts::{DepositStatus, TwinVault, VaultError};
use twinvault_protocol::config::units;
use twinvault_protocol::genesis::{alice, Genesis};
use twinvault_protocol::{
    AccountHook, Address, Asset, CallContext, Chain, HookRejection, TokenConfig, U256,
};

type Vault = TwinVault<Arc<Chain>>;

/// The attacker's account.
fn mallory() -> Address {
    Address::repeat_byte(0x66)
}

fn n(v: u64) -> U256 {
    U256::from(v)
}

/// Chain with the default genesis, a vault, and a hooked token that
/// mallory holds and has approved.
fn setup() -> (Arc<Chain>, Arc<Vault>, Address, Address) {
    let (chain, tokens) = Genesis::devnet().build().unwrap();
    let chain = Arc::new(chain);
    let vault = Arc::new(TwinVault::new(chain.clone(), chain.allocate_address()));
    let t0 = tokens[0].address;
    let hooked = chain.deploy_token(TokenConfig::new("Hooked", "HOOK").with_hooks());

    chain.set_native_balance(mallory(), units(100));
    chain.mint(hooked, mallory(), n(1_000)).unwrap();
    chain.mint(t0, mallory(), n(1_000)).unwrap();
    for token in [hooked, t0] {
        chain
            .approve(token, mallory(), vault.address(), U256::MAX)
            .unwrap();
    }
    (chain, vault, hooked, t0)
}

/// What the attacker does when its hook fires.
#[derive(Clone, Copy)]
enum Attack {
    /// Open another deposit.
    Deposit { token: Address },
    /// Withdraw the given deposit again.
    Withdraw { id: U256 },
}

/// Attacker contract. Runs `attack` from inside whichever hook fires,
/// records what the vault answered, and either swallows the failure or
/// propagates it.
struct Attacker {
    vault: Weak<Vault>,
    attack: Mutex<Option<Attack>>,
    propagate: bool,
    outcomes: Mutex<Vec<Result<(), VaultError>>>,
    observed: Mutex<Vec<DepositStatus>>,
}

impl Attacker {
    fn new(vault: &Arc<Vault>, attack: Attack, propagate: bool) -> Arc<Self> {
        Arc::new(Self {
            vault: Arc::downgrade(vault),
            attack: Mutex::new(Some(attack)),
            propagate,
            outcomes: Mutex::new(Vec::new()),
            observed: Mutex::new(Vec::new()),
        })
    }

    fn strike(&self) -> Result<(), HookRejection> {
        // One shot, so a successful re-entry could not loop forever.
        let Some(attack) = self.attack.lock().take() else {
            return Ok(());
        };
        let vault = self
            .vault
            .upgrade()
            .ok_or_else(|| HookRejection::new("vault gone"))?;

        let outcome = match attack {
            Attack::Deposit { token } => vault
                .deposit(CallContext::new(mallory()), token, n(1), Address::ZERO, U256::ZERO)
                .map(|_| ()),
            Attack::Withdraw { id } => {
                self.observed.lock().push(vault.deposit_status(id));
                vault.withdraw(CallContext::new(mallory()), id)
            }
        };

        self.outcomes.lock().push(outcome.clone());
        match outcome {
            Err(e) if self.propagate => Err(HookRejection::new(e)),
            _ => Ok(()),
        }
    }
}

impl AccountHook for Attacker {
    fn on_native_received(&self, _: Address, _: U256) -> Result<(), HookRejection> {
        self.strike()
    }

    fn on_tokens_sent(&self, _: Address, _: Address, _: Address, _: U256) -> Result<(), HookRejection> {
        self.strike()
    }

    fn on_tokens_received(
        &self,
        _: Address,
        _: Address,
        _: Address,
        _: U256,
    ) -> Result<(), HookRejection> {
        self.strike()
    }
}

// ---------------------------------------------------------------------------
// Deposit
// ---------------------------------------------------------------------------

#[test]
fn token_hook_cannot_reenter_deposit() {
    let (chain, vault, hooked, t0) = setup();
    let attacker = Attacker::new(&vault, Attack::Deposit { token: t0 }, false);
    chain.register_hook(mallory(), attacker.clone());

    let id = vault
        .deposit(CallContext::new(mallory()), hooked, n(10), t0, n(20))
        .unwrap();

    assert_eq!(*attacker.outcomes.lock(), vec![Err(VaultError::ReentrantCall)]);
    assert_eq!(id, U256::ZERO);
    assert_eq!(vault.next_deposit_id(), n(1));
    assert_eq!(vault.events().len(), 1);
    assert_eq!(chain.token_balance(hooked, vault.address()).unwrap(), n(10));
}

#[test]
fn propagated_reentry_reverts_the_outer_deposit() {
    let (chain, vault, hooked, t0) = setup();
    let attacker = Attacker::new(&vault, Attack::Deposit { token: t0 }, true);
    chain.register_hook(mallory(), attacker.clone());

    let err = vault
        .deposit(CallContext::new(mallory()), t0, n(20), hooked, n(10))
        .unwrap_err();

    assert!(matches!(
        err,
        VaultError::TransferFailed { asset, ref reason }
            if asset == Asset::Token(hooked) && reason.contains("reentrant")
    ));
    assert_eq!(vault.next_deposit_id(), U256::ZERO);
    assert_eq!(chain.token_balance(t0, mallory()).unwrap(), n(1_000));
    assert_eq!(chain.token_balance(t0, vault.address()).unwrap(), U256::ZERO);
    assert!(vault.events().is_empty());
}

#[test]
fn vault_usable_after_reentry_attempt() {
    let (chain, vault, hooked, t0) = setup();
    let attacker = Attacker::new(&vault, Attack::Deposit { token: t0 }, true);
    chain.register_hook(mallory(), attacker);

    assert!(vault
        .deposit(CallContext::new(mallory()), hooked, n(1), t0, n(1))
        .is_err());

    let id = vault
        .deposit(CallContext::new(alice()), t0, U256::ZERO, Address::ZERO, units(1))
        .map_err(|e| e.code());
    assert_eq!(id, Err("InvalidAmount"));

    let id = vault
        .deposit(
            CallContext::new(alice()).with_value(units(1)),
            Address::ZERO,
            units(1),
            t0,
            U256::ZERO,
        )
        .unwrap();
    assert_eq!(id, U256::ZERO);
}

// ---------------------------------------------------------------------------
// Withdraw
// ---------------------------------------------------------------------------

#[test]
fn native_receive_hook_cannot_double_withdraw() {
    let (chain, vault, _hooked, t0) = setup();
    let id = vault
        .deposit(
            CallContext::new(mallory()).with_value(units(5)),
            Address::ZERO,
            units(5),
            t0,
            n(100),
        )
        .unwrap();

    let attacker = Attacker::new(&vault, Attack::Withdraw { id }, false);
    chain.register_hook(mallory(), attacker.clone());
    let native_before = chain.native_balance(mallory());

    vault.withdraw(CallContext::new(mallory()), id).unwrap();

    // The hook saw the record already settled and was turned away.
    assert_eq!(*attacker.observed.lock(), vec![DepositStatus::Settled]);
    assert_eq!(*attacker.outcomes.lock(), vec![Err(VaultError::ReentrantCall)]);

    assert_eq!(chain.native_balance(mallory()), native_before + units(5));
    assert_eq!(chain.native_balance(vault.address()), U256::ZERO);
    assert_eq!(chain.token_balance(t0, vault.address()).unwrap(), U256::ZERO);
    assert_eq!(vault.events().len(), 2);
}

#[test]
fn hooked_token_recipient_cannot_double_withdraw() {
    let (chain, vault, hooked, t0) = setup();
    let id = vault
        .deposit(CallContext::new(mallory()), hooked, n(300), t0, n(1))
        .unwrap();

    let attacker = Attacker::new(&vault, Attack::Withdraw { id }, false);
    chain.register_hook(mallory(), attacker.clone());

    vault.withdraw(CallContext::new(mallory()), id).unwrap();

    assert_eq!(*attacker.outcomes.lock(), vec![Err(VaultError::ReentrantCall)]);
    assert_eq!(chain.token_balance(hooked, mallory()).unwrap(), n(1_000));
    assert_eq!(chain.token_balance(hooked, vault.address()).unwrap(), U256::ZERO);
}

#[test]
fn other_depositors_unaffected_by_attack() {
    let (chain, vault, _hooked, t0) = setup();
    let honest = vault
        .deposit(
            CallContext::new(alice()).with_value(units(7)),
            Address::ZERO,
            units(7),
            t0,
            n(1),
        )
        .unwrap();
    let bait = vault
        .deposit(
            CallContext::new(mallory()).with_value(units(1)),
            Address::ZERO,
            units(1),
            t0,
            n(1),
        )
        .unwrap();

    // On payout, try to take alice's deposit instead.
    let attacker = Attacker::new(&vault, Attack::Withdraw { id: honest }, true);
    chain.register_hook(mallory(), attacker);

    let err = vault.withdraw(CallContext::new(mallory()), bait).unwrap_err();
    assert_eq!(err.code(), "TransferFailed");

    assert_eq!(vault.deposit_status(honest), DepositStatus::Active);
    assert_eq!(vault.deposit_status(bait), DepositStatus::Active);
    assert_eq!(chain.native_balance(vault.address()), units(8));
    assert_eq!(vault.outstanding(Asset::Native), Some(units(8)));
}
