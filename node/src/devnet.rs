//! # Devnet Runtime
//!
//! Owns the in-memory chain and the deployed vault, and imposes the total
//! call order the vault relies on: every state-changing call goes through
//! one sequencer lock, commits, seals a block, and then publishes what it
//! emitted to WebSocket subscribers.
//!
//! Callers name their `caller` address explicitly. This is a devnet, so
//! impersonation is the point: there are no signatures to check.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

use twinvault_contracts::{DepositRecord, DepositStatus, EventFilter, TwinVault, VaultError, VaultEvent};
use twinvault_protocol::config::EVENT_CHANNEL_CAPACITY;
use twinvault_protocol::genesis::{DeployedToken, Genesis, GenesisError};
use twinvault_protocol::{Address, CallContext, Chain, ChainError, U256};

use crate::metrics::SharedMetrics;

/// Events pushed to WebSocket subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeEvent {
    /// A call committed and sealed a block.
    NewBlock {
        /// The new block number.
        number: u64,
    },
    /// The vault emitted an event.
    VaultEvent(VaultEvent),
}

/// The running devnet: chain, vault, and the plumbing around them.
pub struct Devnet {
    chain: Arc<Chain>,
    vault: TwinVault<Arc<Chain>>,
    tokens: Vec<DeployedToken>,
    sequencer: Mutex<()>,
    event_tx: broadcast::Sender<NodeEvent>,
    metrics: SharedMetrics,
}

impl Devnet {
    /// Builds the chain from `genesis` and deploys a fresh vault on it.
    pub fn from_genesis(genesis: &Genesis, metrics: SharedMetrics) -> Result<Self, GenesisError> {
        let (chain, tokens) = genesis.build()?;
        let chain = Arc::new(chain);
        let vault = TwinVault::new(chain.clone(), chain.allocate_address());
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        info!(
            chain_id = chain.chain_id(),
            vault = %vault.address(),
            tokens = tokens.len(),
            "devnet ready"
        );
        metrics.block_number.set(chain.block_number() as i64);

        Ok(Self {
            chain,
            vault,
            tokens,
            sequencer: Mutex::new(()),
            event_tx,
            metrics,
        })
    }

    // -- Vault calls ---------------------------------------------------------

    /// Runs `vault.deposit` as `caller` with `value` attached.
    pub fn deposit(
        &self,
        caller: Address,
        value: U256,
        asset_a: Address,
        amount_a: U256,
        asset_b: Address,
        amount_b: U256,
    ) -> Result<U256, VaultError> {
        let ctx = CallContext::new(caller).with_value(value);
        let id = self.vault_call(|vault| vault.deposit(ctx, asset_a, amount_a, asset_b, amount_b))?;
        self.metrics.deposits_total.inc();
        Ok(id)
    }

    /// Runs `vault.withdraw` as `caller`.
    pub fn withdraw(&self, caller: Address, deposit_id: U256) -> Result<(), VaultError> {
        self.vault_call(|vault| vault.withdraw(CallContext::new(caller), deposit_id))?;
        self.metrics.withdrawals_total.inc();
        Ok(())
    }

    /// Sequences one vault entry point: times it, seals a block on success,
    /// and publishes the events it emitted.
    fn vault_call<T>(
        &self,
        call: impl FnOnce(&TwinVault<Arc<Chain>>) -> Result<T, VaultError>,
    ) -> Result<T, VaultError> {
        let _turn = self.sequencer.lock();
        let seen = self.vault.event_count();
        let timer = Instant::now();
        let result = call(&self.vault);
        self.metrics
            .call_latency_seconds
            .observe(timer.elapsed().as_secs_f64());

        match result {
            Ok(value) => {
                let emitted = self.vault.events_since(seen);
                self.metrics
                    .active_deposits
                    .set(self.vault.active_deposits() as i64);
                self.seal_block();
                for event in emitted {
                    // No subscribers is not an error.
                    let _ = self.event_tx.send(NodeEvent::VaultEvent(event));
                }
                Ok(value)
            }
            Err(e) => {
                self.metrics.record_rejection(e.code());
                Err(e)
            }
        }
    }

    /// Calls `token.approve(spender, amount)` as `owner`.
    pub fn approve(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<bool, ChainError> {
        let _turn = self.sequencer.lock();
        let returned = self.chain.approve(token, owner, spender, amount)?;
        self.seal_block();
        Ok(returned.unwrap_or(true))
    }

    fn seal_block(&self) {
        let number = self.chain.advance_block();
        self.metrics.block_number.set(number as i64);
        debug!(block = number, "block sealed");
        let _ = self.event_tx.send(NodeEvent::NewBlock { number });
    }

    // -- Views ---------------------------------------------------------------

    /// Reads a deposit record.
    pub fn get_deposit(&self, deposit_id: U256) -> (DepositRecord, DepositStatus) {
        let record = self.vault.get_deposit(deposit_id);
        let status = record.status();
        (record, status)
    }

    /// The vault's public counter.
    pub fn next_deposit_id(&self) -> U256 {
        self.vault.next_deposit_id()
    }

    /// Vault events passing `filter`.
    pub fn events(&self, filter: &EventFilter) -> Vec<VaultEvent> {
        self.vault.events_matching(filter)
    }

    /// Total number of vault events.
    pub fn event_count(&self) -> usize {
        self.vault.event_count()
    }

    /// `account`'s balance of `token`.
    pub fn token_balance(&self, token: Address, account: Address) -> Result<U256, ChainError> {
        self.chain.token_balance(token, account)
    }

    /// `account`'s native balance.
    pub fn native_balance(&self, account: Address) -> U256 {
        self.chain.native_balance(account)
    }

    /// Current block number.
    pub fn block_number(&self) -> u64 {
        self.chain.block_number()
    }

    /// Chain ID.
    pub fn chain_id(&self) -> u64 {
        self.chain.chain_id()
    }

    /// The vault's account.
    pub fn vault_address(&self) -> Address {
        self.vault.address()
    }

    /// Tokens deployed at genesis.
    pub fn tokens(&self) -> &[DeployedToken] {
        &self.tokens
    }

    /// Subscribes to the live event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.event_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::VaultMetrics;
    use std::io::Write;
    use twinvault_protocol::genesis::{alice, bob};

    fn devnet() -> Devnet {
        let metrics = Arc::new(VaultMetrics::new().unwrap());
        Devnet::from_genesis(&Genesis::devnet(), metrics).unwrap()
    }

    fn approve_all(d: &Devnet, who: Address) {
        for token in d.tokens().to_vec() {
            d.approve(token.address, who, d.vault_address(), U256::MAX)
                .unwrap();
        }
    }

    #[test]
    fn committed_calls_seal_blocks_and_publish() {
        let d = devnet();
        let mut rx = d.subscribe();
        approve_all(&d, alice());
        let (t0, t1) = (d.tokens()[0].address, d.tokens()[1].address);
        let start = d.block_number();

        let id = d
            .deposit(alice(), U256::ZERO, t0, U256::from(100), t1, U256::from(200))
            .unwrap();

        assert_eq!(id, U256::ZERO);
        assert_eq!(d.block_number(), start + 1);
        assert_eq!(d.metrics.deposits_total.get(), 1);
        assert_eq!(d.metrics.active_deposits.get(), 1);

        let mut saw_deposit = false;
        while let Ok(event) = rx.try_recv() {
            if let NodeEvent::VaultEvent(e) = event {
                assert_eq!(e.deposit_id, id);
                saw_deposit = true;
            }
        }
        assert!(saw_deposit);
    }

    #[test]
    fn rejected_calls_are_counted_not_sealed() {
        let d = devnet();
        let before = d.block_number();
        let err = d.withdraw(bob(), U256::from(9)).unwrap_err();

        assert_eq!(err.code(), "DepositNotFound");
        assert_eq!(d.block_number(), before);
        assert_eq!(
            d.metrics
                .rejected_calls_total
                .with_label_values(&["DepositNotFound"])
                .get(),
            1
        );
    }

    #[test]
    fn loads_genesis_from_file() {
        let mut genesis = Genesis::devnet();
        genesis.tokens.truncate(1);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_vec(&genesis).unwrap().as_slice())
            .unwrap();

        let loaded = Genesis::load(file.path()).unwrap();
        let metrics = Arc::new(VaultMetrics::new().unwrap());
        let d = Devnet::from_genesis(&loaded, metrics).unwrap();
        assert_eq!(d.tokens().len(), 1);
        assert_eq!(d.tokens()[0].symbol, "T0");
    }

    #[test]
    fn node_event_json_is_tagged() {
        let json = serde_json::to_value(NodeEvent::NewBlock { number: 3 }).unwrap();
        assert_eq!(json["type"], "new_block");
        assert_eq!(json["number"], 3);
    }
}
