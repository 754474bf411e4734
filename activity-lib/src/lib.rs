pub mod store;

pub use alloy_primitives::{Address, U256};
pub use store::JsonActivityStore;

/// Trading activity of an account, used as its distribution weight.
pub type Volume = U256;
pub type Exchange = String;

const ADDRESS_LENGTH: usize = 20;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ParseVolumeError {
    #[error("empty volume")]
    Empty,
    #[error("invalid volume '{value}': {reason}")]
    Invalid { value: String, reason: String },
}

/// Source of exchange activity: which accounts traded on an exchange and
/// how much volume each of them produced inside a height window.
pub trait ActivityStore {
    type Error: std::error::Error + Send + Sync + 'static;

    fn accounts_for_exchange(&self, exchange: &str) -> Result<Vec<Address>, Self::Error>;

    /// Volumes for `[start_height, end_height)`. The two sequences are parallel:
    /// `volumes[i]` belongs to `accounts[i]`.
    fn account_volumes(
        &self,
        exchange: &str,
        start_height: u64,
        end_height: u64,
    ) -> Result<(Vec<Address>, Vec<Volume>), Self::Error>;
}

impl<S: ActivityStore + ?Sized> ActivityStore for &S {
    type Error = S::Error;

    fn accounts_for_exchange(&self, exchange: &str) -> Result<Vec<Address>, Self::Error> {
        (**self).accounts_for_exchange(exchange)
    }

    fn account_volumes(
        &self,
        exchange: &str,
        start_height: u64,
        end_height: u64,
    ) -> Result<(Vec<Address>, Vec<Volume>), Self::Error> {
        (**self).account_volumes(exchange, start_height, end_height)
    }
}

/// Parses a hex encoded account address: an optional `0x`/`0X` prefix
/// followed by exactly 40 hex digits, in any case.
pub fn parse_address(s: &str) -> Option<Address> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    let mut buffer = [0u8; ADDRESS_LENGTH];
    hex::decode_to_slice(digits, &mut buffer).ok()?;
    Some(Address::from(buffer))
}

pub fn is_hex_address(s: &str) -> bool {
    parse_address(s).is_some()
}

/// Parses a volume from its decimal representation, or from hex when it
/// carries a `0x` prefix. Signs, digit separators and other radix prefixes
/// are not accepted.
pub fn parse_volume(s: &str) -> Result<Volume, ParseVolumeError> {
    if s.is_empty() {
        return Err(ParseVolumeError::Empty);
    }
    let invalid = |reason: String| ParseVolumeError::Invalid {
        value: s.to_string(),
        reason,
    };
    let (digits, radix) = match s.strip_prefix("0x") {
        Some(digits) if digits.bytes().all(|b| b.is_ascii_hexdigit()) => (digits, 16),
        None if s.bytes().all(|b| b.is_ascii_digit()) => (s, 10),
        _ => return Err(invalid("unexpected character".to_string())),
    };
    if digits.is_empty() {
        return Err(invalid("no digits".to_string()));
    }
    Volume::from_str_radix(digits, radix).map_err(|e| invalid(e.to_string()))
}

#[cfg(any(test, feature = "proptest"))]
pub mod arbitrary {
    use super::Address;
    use proptest::prelude::*;

    pub fn address() -> impl Strategy<Value = Address> {
        any::<[u8; 20]>().prop_map(Address::from)
    }
}
