//! # Genesis
//!
//! The initial state of a devnet: funded accounts and pre-deployed tokens.
//! Stored as JSON so it can be checked into a repo, diffed, and passed to
//! `twinvault-node run --genesis <file>`.
//!
//! ```json
//! {
//!   "chainId": 1414939734,
//!   "accounts": [{ "label": "alice", "address": "0xa1a1...", "balance": "0x3635c9adc5dea00000" }],
//!   "tokens": [{ "name": "Token Zero", "symbol": "T0", "holders": [{ "address": "0xa1a1...", "amount": "0x..." }] }]
//! }
//! ```

use std::path::Path;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::chain::{Chain, ChainError};
use crate::config::{self, CHAIN_ID_DEVNET};
use crate::token::TokenConfig;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur while loading or applying a genesis.
#[derive(Debug, Error)]
pub enum GenesisError {
    /// The genesis file could not be read.
    #[error("failed to read genesis file: {0}")]
    Io(#[from] std::io::Error),

    /// The genesis file is not valid genesis JSON.
    #[error("malformed genesis: {0}")]
    Json(#[from] serde_json::Error),

    /// Two tokens share a symbol, which makes them ambiguous in logs and APIs.
    #[error("duplicate token symbol in genesis: {0}")]
    DuplicateSymbol(String),

    /// An account or token holder is the zero address, which is the
    /// native-asset sentinel.
    #[error("genesis {0} uses the zero address")]
    ZeroAddress(&'static str),

    /// Applying the genesis to a chain failed (e.g. supply overflow).
    #[error("failed to apply genesis: {0}")]
    Chain(#[from] ChainError),
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A pre-funded native account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesisAccount {
    /// Optional human-friendly label, used in logs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// The account address.
    pub address: Address,
    /// Initial native balance.
    pub balance: U256,
}

/// An initial token holding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesisHolding {
    /// The holder.
    pub address: Address,
    /// Amount minted to the holder.
    pub amount: U256,
}

/// A token deployed at genesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenesisToken {
    /// Token configuration.
    #[serde(flatten)]
    pub config: TokenConfig,
    /// Initial holders.
    #[serde(default)]
    pub holders: Vec<GenesisHolding>,
}

/// The full initial state of a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Genesis {
    /// Chain ID.
    pub chain_id: u64,
    /// Pre-funded native accounts.
    #[serde(default)]
    pub accounts: Vec<GenesisAccount>,
    /// Tokens deployed in order; their addresses follow deployment order.
    #[serde(default)]
    pub tokens: Vec<GenesisToken>,
}

/// A token as deployed by [`Genesis::build`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedToken {
    /// Ticker symbol.
    pub symbol: String,
    /// Address the token was deployed at.
    pub address: Address,
}

// ---------------------------------------------------------------------------
// Well-known devnet accounts
// ---------------------------------------------------------------------------

/// Alice's devnet address.
pub fn alice() -> Address {
    Address::repeat_byte(0xA1)
}

/// Bob's devnet address.
pub fn bob() -> Address {
    Address::repeat_byte(0xB0)
}

/// Carol's devnet address.
pub fn carol() -> Address {
    Address::repeat_byte(0xCA)
}

impl Genesis {
    /// The default devnet: alice, bob and carol each hold 1,000 TVN plus
    /// 1,000,000 units of two plain tokens, `T0` and `T1`.
    pub fn devnet() -> Self {
        let named = [("alice", alice()), ("bob", bob()), ("carol", carol())];
        let grant = U256::from(config::DEFAULT_TOKEN_GRANT);
        let holders: Vec<GenesisHolding> = named
            .iter()
            .map(|(_, address)| GenesisHolding {
                address: *address,
                amount: grant,
            })
            .collect();

        Self {
            chain_id: CHAIN_ID_DEVNET,
            accounts: named
                .iter()
                .map(|(label, address)| GenesisAccount {
                    label: Some((*label).to_string()),
                    address: *address,
                    balance: U256::from(config::DEFAULT_GENESIS_BALANCE),
                })
                .collect(),
            tokens: vec![
                GenesisToken {
                    config: TokenConfig::new("Token Zero", "T0"),
                    holders: holders.clone(),
                },
                GenesisToken {
                    config: TokenConfig::new("Token One", "T1"),
                    holders,
                },
            ],
        }
    }

    /// Reads a genesis from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GenesisError> {
        let raw = std::fs::read_to_string(path)?;
        let genesis: Genesis = serde_json::from_str(&raw)?;
        genesis.validate()?;
        Ok(genesis)
    }

    /// Rejects genesis files that would produce an ambiguous chain.
    pub fn validate(&self) -> Result<(), GenesisError> {
        if self.accounts.iter().any(|a| a.address.is_zero()) {
            return Err(GenesisError::ZeroAddress("account"));
        }
        if self
            .tokens
            .iter()
            .flat_map(|t| &t.holders)
            .any(|h| h.address.is_zero())
        {
            return Err(GenesisError::ZeroAddress("token holder"));
        }

        let mut seen = std::collections::HashSet::new();
        for token in &self.tokens {
            if !seen.insert(token.config.symbol.to_uppercase()) {
                return Err(GenesisError::DuplicateSymbol(token.config.symbol.clone()));
            }
        }
        Ok(())
    }

    /// Builds a fresh chain from this genesis. Returns the chain together
    /// with the deployed tokens in declaration order.
    pub fn build(&self) -> Result<(Chain, Vec<DeployedToken>), GenesisError> {
        self.validate()?;
        let chain = Chain::with_chain_id(self.chain_id);

        for account in &self.accounts {
            chain.set_native_balance(account.address, account.balance);
        }

        let mut deployed = Vec::with_capacity(self.tokens.len());
        for token in &self.tokens {
            let address = chain.deploy_token(token.config.clone());
            for holding in &token.holders {
                chain.mint(address, holding.address, holding.amount)?;
            }
            deployed.push(DeployedToken {
                symbol: token.config.symbol.clone(),
                address,
            });
        }

        info!(
            chain_id = self.chain_id,
            accounts = self.accounts.len(),
            tokens = deployed.len(),
            "genesis applied"
        );
        Ok((chain, deployed))
    }
}

impl Default for Genesis {
    fn default() -> Self {
        Self::devnet()
    }
}
