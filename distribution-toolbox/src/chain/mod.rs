mod rpc;

pub use rpc::{balance_of_call_data, Error as RpcError, RpcChainClient};

use activity_lib::Address;
use alloy_primitives::U256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub number: u64,
}

/// Read access to the chain rewards are paid on.
pub trait ChainClient {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Latest confirmed block header. Implementations keep retrying until
    /// they get one, so this never fails.
    fn latest_block_header(&self) -> BlockHeader;

    fn token_balance(&self, token: Address, owner: Address) -> Result<U256, Self::Error>;
}

impl<C: ChainClient + ?Sized> ChainClient for &C {
    type Error = C::Error;

    fn latest_block_header(&self) -> BlockHeader {
        (**self).latest_block_header()
    }

    fn token_balance(&self, token: Address, owner: Address) -> Result<U256, Self::Error> {
        (**self).token_balance(token, owner)
    }
}
