//! # Primitive Types
//!
//! Accounts and amounts use the EVM's native shapes: 20-byte addresses and
//! 256-bit unsigned integers, both re-exported from `alloy-primitives` so
//! every crate in the workspace agrees on a single definition.
//!
//! [`Asset`] is the typed view of an asset identifier. On the wire and in
//! deposit records an asset is just an [`Address`]; the all-zero address is
//! the native-asset sentinel. Inside the code we match on `Asset` instead
//! of comparing against the sentinel by hand.

use std::fmt;

use serde::{Deserialize, Serialize};

pub use alloy_primitives::{Address, U256};

use crate::config::NATIVE_ASSET;

/// An asset a vault leg can hold: the chain's native asset or a fungible
/// token contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Address", into = "Address")]
pub enum Asset {
    /// The chain's native asset, identified by the all-zero address.
    Native,
    /// An ERC20-style token deployed at the given address.
    Token(Address),
}

impl Asset {
    /// Interprets an asset identifier. The zero address is always native.
    pub fn from_address(address: Address) -> Self {
        if address == NATIVE_ASSET {
            Asset::Native
        } else {
            Asset::Token(address)
        }
    }

    /// Returns the asset identifier as stored in deposit records.
    pub fn address(&self) -> Address {
        match self {
            Asset::Native => NATIVE_ASSET,
            Asset::Token(token) => *token,
        }
    }

    /// Returns `true` for the native asset.
    pub fn is_native(&self) -> bool {
        matches!(self, Asset::Native)
    }
}

impl From<Address> for Asset {
    fn from(address: Address) -> Self {
        Asset::from_address(address)
    }
}

impl From<Asset> for Address {
    fn from(asset: Asset) -> Self {
        asset.address()
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Asset::Native => write!(f, "native"),
            Asset::Token(token) => write!(f, "token:{}", token),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_address_is_native() {
        assert_eq!(Asset::from_address(Address::ZERO), Asset::Native);
        assert!(Asset::from_address(Address::ZERO).is_native());
    }

    #[test]
    fn non_zero_address_is_token() {
        let token = Address::repeat_byte(0x42);
        let asset = Asset::from(token);
        assert_eq!(asset, Asset::Token(token));
        assert!(!asset.is_native());
        assert_eq!(asset.address(), token);
    }

    #[test]
    fn asset_serializes_as_plain_address() {
        let token = Address::repeat_byte(0x42);
        let json = serde_json::to_value(Asset::Token(token)).unwrap();
        assert_eq!(json, serde_json::to_value(token).unwrap());

        let native: Asset = serde_json::from_value(serde_json::to_value(Address::ZERO).unwrap())
            .unwrap();
        assert_eq!(native, Asset::Native);
    }

    #[test]
    fn display_distinguishes_native() {
        assert_eq!(Asset::Native.to_string(), "native");
        assert!(Asset::Token(Address::repeat_byte(1))
            .to_string()
            .starts_with("token:0x"));
    }
}
