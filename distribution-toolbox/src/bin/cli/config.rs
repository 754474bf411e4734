use activity_lib::{parse_address, Address};
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Report;
use distribution_toolbox::distribution::ExchangeRegistry;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

fn default_retry_interval_secs() -> u64 {
    1
}

#[derive(Deserialize)]
pub struct Config {
    /// Ethereum JSON-RPC endpoint
    pub rpc_url: String,
    /// Account paying the rewards
    sender: String,
    /// Exchanges rewards can be distributed for
    exchanges: Vec<String>,
    #[serde(default = "default_retry_interval_secs")]
    balance_retry_interval_secs: u64,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, Report> {
        let file = std::fs::File::open(path)
            .wrap_err_with(|| format!("could not open config {}", path.display()))?;
        serde_json::from_reader(std::io::BufReader::new(file))
            .wrap_err_with(|| format!("invalid config {}", path.display()))
    }

    pub fn sender(&self) -> Result<Address, Report> {
        parse_address(&self.sender).ok_or_else(|| eyre!("wrong sender address '{}'", self.sender))
    }

    pub fn exchange_registry(&self) -> ExchangeRegistry {
        self.exchanges.iter().collect()
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.balance_retry_interval_secs)
    }
}
