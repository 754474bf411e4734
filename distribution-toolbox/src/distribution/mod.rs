mod ingest;
mod validate;

pub use ingest::{
    get_accounts, get_accounts_and_volumes, parse_account_line, parse_volume_line, Accounts,
    AccountsAndVolumes, FileSource, Ingestor, LineError, RecipientSource, StoreSource,
};
pub use validate::{BalanceGuard, OptionValidator, DEFAULT_RETRY_INTERVAL};

use activity_lib::Exchange;
use alloy_primitives::U256;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub type TotalValue = U256;

/// Parameters of a single reward distribution job.
///
/// Built once, validated once by [`OptionValidator::check_and_init`] and
/// read-only afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DistributionOption {
    pub total_value: TotalValue,
    /// Inclusive
    pub start_height: u64,
    /// Exclusive
    pub end_height: u64,
    pub exchange: Exchange,
    pub reward_token: String,
    /// Recipients are read from this file instead of the activity store
    pub input_file: Option<PathBuf>,
    /// Dry run report destination
    pub output_file: Option<PathBuf>,
    pub dry_run: bool,
}

impl DistributionOption {
    pub fn input_file(&self) -> Option<&Path> {
        non_empty(&self.input_file)
    }

    pub fn output_file(&self) -> Option<&Path> {
        non_empty(&self.output_file)
    }
}

fn non_empty(path: &Option<PathBuf>) -> Option<&Path> {
    path.as_deref().filter(|p| !p.as_os_str().is_empty())
}

/// The exchanges rewards can be distributed for.
#[derive(Clone, Debug, Default)]
pub struct ExchangeRegistry(HashSet<Exchange>);

impl ExchangeRegistry {
    pub fn contains(&self, exchange: &str) -> bool {
        self.0.contains(&exchange.to_lowercase())
    }
}

impl<S: AsRef<str>> FromIterator<S> for ExchangeRegistry {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|exchange| exchange.as_ref().to_lowercase())
                .collect(),
        )
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InvalidOption {
    #[error("total value must be greater than zero")]
    NonPositiveTotal,
    #[error("empty range, start height {start} >= end height {end}")]
    EmptyRange { start: u64, end: u64 },
    #[error("exchange {0} is not configured")]
    UnknownExchange(Exchange),
    #[error("wrong reward token '{0}'")]
    InvalidRewardToken(String),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    InvalidConfig(#[from] InvalidOption),

    #[error("latest height {latest} is lower than end height {end_height}")]
    StaleRange { latest: u64, end_height: u64 },

    #[error("not enough reward token balance, {balance} < {required}")]
    InsufficientBalance { balance: U256, required: U256 },

    #[error("could not access {}: {source}", .path.display())]
    Resource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}:{line_number}: {reason}: '{line}'", .path.display())]
    MalformedInput {
        path: PathBuf,
        line_number: usize,
        line: String,
        reason: LineError,
    },

    #[error(transparent)]
    Store(Box<dyn std::error::Error + Send + Sync>),

    #[error("reward token balance check aborted")]
    Aborted,
}

impl Error {
    pub(crate) fn store<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
        Self::Store(Box::new(e))
    }
}
