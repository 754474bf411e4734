use super::{BlockHeader, ChainClient};
use crate::distribution::DEFAULT_RETRY_INTERVAL;
use activity_lib::Address;
use alloy_primitives::U256;
use alloy_sol_types::{sol, SolCall};
use reqwest::blocking::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::warn;

sol! {
    function balanceOf(address account) external view returns (uint256);
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("rpc response has no result")]
    MissingResult,

    #[error("invalid hex quantity '{0}'")]
    InvalidQuantity(String),

    #[error("invalid return data: {0}")]
    ReturnData(#[from] hex::FromHexError),

    #[error(transparent)]
    Abi(#[from] alloy_sol_types::Error),
}

#[derive(Serialize)]
struct Request<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct Response<T> {
    result: Option<T>,
    error: Option<ErrorObject>,
}

#[derive(Deserialize)]
struct ErrorObject {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct RawHeader {
    number: String,
}

/// Blocking Ethereum JSON-RPC client.
pub struct RpcChainClient {
    client: Client,
    url: String,
    retry_interval: Duration,
    next_id: AtomicU64,
}

impl RpcChainClient {
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            retry_interval: DEFAULT_RETRY_INTERVAL,
            next_id: AtomicU64::new(1),
        }
    }

    /// Pause between two attempts of the block header query
    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, Error> {
        let request = Request {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        let response: Response<T> = self
            .client
            .post(&self.url)
            .json(&request)
            .send()?
            .error_for_status()?
            .json()?;
        if let Some(ErrorObject { code, message }) = response.error {
            return Err(Error::Rpc { code, message });
        }
        response.result.ok_or(Error::MissingResult)
    }

    pub fn try_latest_block_header(&self) -> Result<BlockHeader, Error> {
        let raw: RawHeader = self.call("eth_getBlockByNumber", json!(["latest", false]))?;
        Ok(BlockHeader {
            number: parse_quantity(&raw.number)?,
        })
    }
}

impl ChainClient for RpcChainClient {
    type Error = Error;

    fn latest_block_header(&self) -> BlockHeader {
        loop {
            match self.try_latest_block_header() {
                Ok(header) => return header,
                Err(e) => {
                    warn!(error = %e, "failed to get latest block header, retrying");
                    std::thread::sleep(self.retry_interval);
                }
            }
        }
    }

    fn token_balance(&self, token: Address, owner: Address) -> Result<U256, Error> {
        let data: String = self.call(
            "eth_call",
            json!([
                { "to": token.to_string(), "data": balance_of_call_data(owner) },
                "latest"
            ]),
        )?;
        decode_balance(&data)
    }
}

/// ABI encoded `balanceOf(owner)` call.
pub fn balance_of_call_data(owner: Address) -> String {
    format!(
        "0x{}",
        hex::encode(balanceOfCall { account: owner }.abi_encode())
    )
}

fn parse_quantity(s: &str) -> Result<u64, Error> {
    s.strip_prefix("0x")
        .and_then(|digits| u64::from_str_radix(digits, 16).ok())
        .ok_or_else(|| Error::InvalidQuantity(s.to_string()))
}

// an empty return data means the token has no code at that address
fn decode_balance(data: &str) -> Result<U256, Error> {
    let bytes = hex::decode(data.trim_start_matches("0x"))?;
    if bytes.is_empty() {
        return Ok(U256::ZERO);
    }
    Ok(balanceOfCall::abi_decode_returns(&bytes, true)?._0)
}
