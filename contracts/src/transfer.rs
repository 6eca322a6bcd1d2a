//! # Transfer Adapter
//!
//! A single inbound/outbound interface over the two asset kinds a vault
//! leg can hold.
//!
//! | Asset  | `pull_in`                          | `push_out`               |
//! |--------|------------------------------------|--------------------------|
//! | native | no-op (value came with the call)   | value transfer to `to`   |
//! | token  | `transferFrom(from, vault, amount)`| `transfer(to, amount)`   |
//!
//! A token call succeeds iff it did not revert and returned either nothing
//! or `true`. Anything else, including a call to an address with no token
//! deployed, is [`VaultError::TransferFailed`].

use tracing::debug;
use twinvault_protocol::token::ReturnData;
use twinvault_protocol::{Address, Asset, AssetLedger, ChainError, U256};

use crate::error::VaultError;

/// Moves assets between the vault's holdings and the outside world.
pub struct TransferAdapter<'a, L: AssetLedger + ?Sized> {
    ledger: &'a L,
    holder: Address,
}

impl<'a, L: AssetLedger + ?Sized> TransferAdapter<'a, L> {
    /// Creates an adapter acting on behalf of `holder` (the vault account).
    pub fn new(ledger: &'a L, holder: Address) -> Self {
        Self { ledger, holder }
    }

    /// Accepts native value attached to a call into the holder's balance.
    pub fn receive_value(&self, from: Address, value: U256) -> Result<(), VaultError> {
        if value.is_zero() {
            return Ok(());
        }
        debug!(%from, %value, "accepting attached value");
        self.ledger
            .native_transfer(from, self.holder, value)
            .map_err(|e| transfer_failed(Asset::Native, e))
    }

    /// Brings `amount` of `asset` from `from` into the holder's balance.
    /// Native value is expected to have arrived with the call already.
    pub fn pull_in(&self, asset: Asset, from: Address, amount: U256) -> Result<(), VaultError> {
        match asset {
            Asset::Native => Ok(()),
            Asset::Token(token) => {
                debug!(%token, %from, %amount, "pulling tokens in");
                let returned = self
                    .ledger
                    .token_transfer_from(token, self.holder, from, self.holder, amount);
                check_token_call(asset, returned)
            }
        }
    }

    /// Sends `amount` of `asset` from the holder's balance to `to`.
    pub fn push_out(&self, asset: Asset, to: Address, amount: U256) -> Result<(), VaultError> {
        match asset {
            Asset::Native => {
                debug!(%to, %amount, "pushing native value out");
                self.ledger
                    .native_transfer(self.holder, to, amount)
                    .map_err(|e| transfer_failed(asset, e))
            }
            Asset::Token(token) => {
                debug!(%token, %to, %amount, "pushing tokens out");
                let returned = self.ledger.token_transfer(token, self.holder, to, amount);
                check_token_call(asset, returned)
            }
        }
    }
}

/// Applies the "no revert and not `false`" success rule to a token call.
fn check_token_call(
    asset: Asset,
    returned: Result<ReturnData, ChainError>,
) -> Result<(), VaultError> {
    match returned {
        Ok(None) | Ok(Some(true)) => Ok(()),
        Ok(Some(false)) => Err(VaultError::TransferFailed {
            asset,
            reason: "token returned false".into(),
        }),
        Err(e) => Err(transfer_failed(asset, e)),
    }
}

fn transfer_failed(asset: Asset, error: ChainError) -> VaultError {
    VaultError::TransferFailed {
        asset,
        reason: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use twinvault_protocol::{AccountHook, Chain, HookRejection, ReturnStyle, TokenConfig};

    fn alice() -> Address {
        Address::repeat_byte(0xA1)
    }

    struct Refuse;

    impl AccountHook for Refuse {
        fn on_native_received(&self, _: Address, _: U256) -> Result<(), HookRejection> {
            Err(HookRejection::new("refused"))
        }
    }

    fn setup(style: ReturnStyle) -> (Chain, Address, Address) {
        let chain = Chain::new();
        let vault = chain.allocate_address();
        let token = chain.deploy_token(TokenConfig::new("Test", "TST").with_return_style(style));
        chain.mint(token, alice(), U256::from(1_000)).unwrap();
        chain.approve(token, alice(), vault, U256::MAX).unwrap();
        (chain, vault, token)
    }

    #[test]
    fn pull_and_push_token() {
        let (chain, vault, token) = setup(ReturnStyle::Bool);
        let adapter = TransferAdapter::new(&chain, vault);

        adapter
            .pull_in(Asset::Token(token), alice(), U256::from(300))
            .unwrap();
        assert_eq!(chain.token_balance(token, vault).unwrap(), U256::from(300));

        adapter
            .push_out(Asset::Token(token), alice(), U256::from(300))
            .unwrap();
        assert_eq!(chain.token_balance(token, vault).unwrap(), U256::ZERO);
        assert_eq!(chain.token_balance(token, alice()).unwrap(), U256::from(1_000));
    }

    #[test]
    fn silent_token_counts_as_success() {
        let (chain, vault, token) = setup(ReturnStyle::Silent);
        let adapter = TransferAdapter::new(&chain, vault);
        adapter
            .pull_in(Asset::Token(token), alice(), U256::from(1))
            .unwrap();
        assert_eq!(chain.token_balance(token, vault).unwrap(), U256::from(1));
    }

    #[test]
    fn false_return_is_transfer_failure() {
        let (chain, vault, token) = setup(ReturnStyle::SoftFail);
        let adapter = TransferAdapter::new(&chain, vault);
        let err = adapter
            .pull_in(Asset::Token(token), alice(), U256::from(5_000))
            .unwrap_err();
        assert!(matches!(err, VaultError::TransferFailed { .. }));
    }

    #[test]
    fn revert_is_transfer_failure() {
        let (chain, vault, token) = setup(ReturnStyle::Bool);
        let adapter = TransferAdapter::new(&chain, vault);
        let err = adapter
            .push_out(Asset::Token(token), alice(), U256::from(1))
            .unwrap_err();
        assert_eq!(err.code(), "TransferFailed");
    }

    #[test]
    fn native_pull_is_a_no_op() {
        let chain = Chain::new();
        let vault = chain.allocate_address();
        let adapter = TransferAdapter::new(&chain, vault);
        adapter
            .pull_in(Asset::Native, alice(), U256::from(10))
            .unwrap();
        assert_eq!(chain.native_balance(vault), U256::ZERO);
    }

    #[test]
    fn rejected_native_push_fails() {
        let chain = Chain::new();
        let vault = chain.allocate_address();
        chain.set_native_balance(vault, U256::from(10));
        chain.register_hook(alice(), Arc::new(Refuse));

        let adapter = TransferAdapter::new(&chain, vault);
        let err = adapter
            .push_out(Asset::Native, alice(), U256::from(10))
            .unwrap_err();

        match err {
            VaultError::TransferFailed { asset, reason } => {
                assert_eq!(asset, Asset::Native);
                assert!(reason.contains("refused"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(chain.native_balance(vault), U256::from(10));
    }

    #[test]
    fn missing_token_contract_fails() {
        let chain = Chain::new();
        let vault = chain.allocate_address();
        let adapter = TransferAdapter::new(&chain, vault);
        let err = adapter
            .pull_in(
                Asset::Token(Address::repeat_byte(0x77)),
                alice(),
                U256::from(1),
            )
            .unwrap_err();
        assert!(matches!(err, VaultError::TransferFailed { .. }));
    }
}
