//! Integration tests for the devnet execution host.
//!
//! These exercise the host the way contracts use it: through the
//! `AssetLedger` seam, with hooks that call back into the chain while a
//! transfer is still in flight.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use twinvault_protocol::genesis::{alice, bob, carol, Genesis};
use twinvault_protocol::{
    AccountHook, Address, AssetLedger, Chain, ChainError, HookRejection, ReturnStyle,
    TokenConfig, U256,
};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

/// A contract that forwards every native payment it receives to `forward_to`.
/// Proves hooks can re-enter the host while the outer transfer is running.
struct Forwarder {
    me: Address,
    forward_to: Address,
    chain: Weak<Chain>,
}

impl AccountHook for Forwarder {
    fn on_native_received(&self, _from: Address, amount: U256) -> Result<(), HookRejection> {
        let chain = self
            .chain
            .upgrade()
            .ok_or_else(|| HookRejection::new("chain gone"))?;
        chain
            .native_transfer(self.me, self.forward_to, amount)
            .map_err(HookRejection::new)
    }
}

/// Records every hooked-token notification it sees.
#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<&'static str>>,
}

impl AccountHook for Recorder {
    fn on_tokens_sent(
        &self,
        _token: Address,
        _operator: Address,
        _to: Address,
        _amount: U256,
    ) -> Result<(), HookRejection> {
        self.seen.lock().push("sent");
        Ok(())
    }

    fn on_tokens_received(
        &self,
        _token: Address,
        _operator: Address,
        _from: Address,
        _amount: U256,
    ) -> Result<(), HookRejection> {
        self.seen.lock().push("received");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

#[test]
fn hook_can_reenter_host_mid_transfer() {
    let chain = Arc::new(Chain::new());
    let relay = Address::repeat_byte(0x5E);
    chain.set_native_balance(alice(), U256::from(100));

    let forwarder = Arc::new(Forwarder {
        me: relay,
        forward_to: carol(),
        chain: Arc::downgrade(&chain),
    });
    chain.register_hook(relay, forwarder);

    chain.native_transfer(alice(), relay, U256::from(30)).unwrap();

    assert_eq!(chain.native_balance(relay), U256::ZERO);
    assert_eq!(chain.native_balance(carol()), U256::from(30));
    assert_eq!(chain.native_balance(alice()), U256::from(70));
}

#[test]
fn failed_reentrant_forward_reverts_outer_transfer() {
    let chain = Arc::new(Chain::new());
    let relay = Address::repeat_byte(0x5E);
    let rejecting_sink = Address::repeat_byte(0x51);
    chain.set_native_balance(alice(), U256::from(100));

    struct Sink;
    impl AccountHook for Sink {
        fn on_native_received(&self, _: Address, _: U256) -> Result<(), HookRejection> {
            Err(HookRejection::new("sink closed"))
        }
    }

    chain.register_hook(
        relay,
        Arc::new(Forwarder {
            me: relay,
            forward_to: rejecting_sink,
            chain: Arc::downgrade(&chain),
        }),
    );
    chain.register_hook(rejecting_sink, Arc::new(Sink));

    let err = chain
        .native_transfer(alice(), relay, U256::from(30))
        .unwrap_err();

    assert!(matches!(err, ChainError::HookRejected { account, .. } if account == relay));
    assert_eq!(chain.native_balance(alice()), U256::from(100));
    assert_eq!(chain.native_balance(relay), U256::ZERO);
    assert_eq!(chain.native_balance(rejecting_sink), U256::ZERO);
}

#[test]
fn hooked_token_notifies_sender_then_recipient() {
    let chain = Chain::new();
    let token = chain.deploy_token(TokenConfig::new("Hooked", "HKD").with_hooks());
    chain.mint(token, alice(), U256::from(50)).unwrap();

    let sender = Arc::new(Recorder::default());
    let recipient = Arc::new(Recorder::default());
    chain.register_hook(alice(), sender.clone());
    chain.register_hook(bob(), recipient.clone());

    chain
        .token_transfer(token, alice(), bob(), U256::from(20))
        .unwrap();

    assert_eq!(*sender.seen.lock(), vec!["sent"]);
    assert_eq!(*recipient.seen.lock(), vec!["received"]);
}

// ---------------------------------------------------------------------------
// AssetLedger seam
// ---------------------------------------------------------------------------

#[test]
fn arc_chain_is_an_asset_ledger() {
    fn move_through_seam(ledger: &impl AssetLedger) -> Result<(), ChainError> {
        let cp = ledger.checkpoint();
        ledger.native_transfer(alice(), bob(), U256::from(5))?;
        ledger.commit(cp);
        Ok(())
    }

    let chain = Arc::new(Chain::new());
    chain.set_native_balance(alice(), U256::from(5));
    move_through_seam(&chain).unwrap();
    assert_eq!(chain.native_balance(bob()), U256::from(5));
}

#[test]
fn silent_token_transfer_from_through_seam() {
    let chain = Chain::new();
    let token = chain.deploy_token(
        TokenConfig::new("Tether-ish", "TTH").with_return_style(ReturnStyle::Silent),
    );
    let vault = chain.allocate_address();
    chain.mint(token, alice(), U256::from(1_000)).unwrap();
    chain
        .approve(token, alice(), vault, U256::from(1_000))
        .unwrap();

    let ret = AssetLedger::token_transfer_from(
        &chain,
        token,
        vault,
        alice(),
        vault,
        U256::from(400),
    )
    .unwrap();

    assert_eq!(ret, None);
    assert_eq!(chain.token_balance(token, vault).unwrap(), U256::from(400));
    assert_eq!(
        chain.allowance(token, alice(), vault).unwrap(),
        U256::from(600)
    );
}

#[test]
fn paused_token_reverts_through_host() {
    let (chain, tokens) = Genesis::devnet().build().unwrap();
    let t0 = tokens[0].address;
    chain.set_token_paused(t0, true).unwrap();

    let err = chain
        .token_transfer(t0, alice(), bob(), U256::from(1))
        .unwrap_err();
    assert!(matches!(err, ChainError::TokenReverted(_)));
}
