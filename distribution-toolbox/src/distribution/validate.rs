use super::{DistributionOption, Error, ExchangeRegistry, InvalidOption, TotalValue};
use crate::chain::ChainClient;
use activity_lib::{parse_address, Address};
use alloy_primitives::U256;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Polls the sender balance of the reward token until a query succeeds.
///
/// Failed queries are retried every `retry_interval` with no limit on the
/// number of attempts. An abort flag or a maximum wait can be injected to
/// bound the polling; without them the guard only returns once the chain
/// answers.
#[derive(Clone, Debug)]
pub struct BalanceGuard {
    retry_interval: Duration,
    max_wait: Option<Duration>,
    abort: Option<Arc<AtomicBool>>,
}

impl Default for BalanceGuard {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_INTERVAL)
    }
}

impl BalanceGuard {
    pub fn new(retry_interval: Duration) -> Self {
        Self {
            retry_interval,
            max_wait: None,
            abort: None,
        }
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = Some(max_wait);
        self
    }

    pub fn with_abort_flag(mut self, abort: Arc<AtomicBool>) -> Self {
        self.abort = Some(abort);
        self
    }

    fn should_stop(&self, started: Instant) -> bool {
        self.abort
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
            || self
                .max_wait
                .map(|max_wait| started.elapsed() >= max_wait)
                .unwrap_or(false)
    }

    /// Returns the balance of `owner` once it is known to cover `required`.
    pub fn ensure_balance<C: ChainClient>(
        &self,
        chain: &C,
        token: Address,
        owner: Address,
        required: TotalValue,
    ) -> Result<U256, Error> {
        let started = Instant::now();
        let mut retries = 0u64;
        loop {
            match chain.token_balance(token, owner) {
                Ok(balance) if balance < required => {
                    return Err(Error::InsufficientBalance { balance, required })
                }
                Ok(balance) => return Ok(balance),
                Err(e) => {
                    if self.should_stop(started) {
                        return Err(Error::Aborted);
                    }
                    retries += 1;
                    warn!(
                        %token,
                        %owner,
                        retries,
                        error = %e,
                        "failed to get reward token balance, retrying"
                    );
                    std::thread::sleep(self.retry_interval);
                }
            }
        }
    }
}

struct OutputFile {
    path: PathBuf,
    file: File,
}

/// Checks a [`DistributionOption`] against the configured exchanges and the
/// chain state, and holds the dry run output file for the rest of the job.
///
/// The output file is released by [`OptionValidator::deinit`] or, at the
/// latest, when the validator is dropped.
pub struct OptionValidator<'a, C> {
    chain: &'a C,
    exchanges: &'a ExchangeRegistry,
    sender: Address,
    balance_guard: BalanceGuard,
    output: Option<OutputFile>,
}

impl<'a, C: ChainClient> OptionValidator<'a, C> {
    pub fn new(chain: &'a C, exchanges: &'a ExchangeRegistry, sender: Address) -> Self {
        Self {
            chain,
            exchanges,
            sender,
            balance_guard: BalanceGuard::default(),
            output: None,
        }
    }

    pub fn with_balance_guard(mut self, balance_guard: BalanceGuard) -> Self {
        self.balance_guard = balance_guard;
        self
    }

    pub fn check_and_init(&mut self, option: &DistributionOption) -> Result<(), Error> {
        self.check(option)?;
        if let Some(path) = option.output_file() {
            self.open_output_file(path)?;
        }
        info!(
            exchange = %option.exchange,
            start_height = option.start_height,
            end_height = option.end_height,
            total_value = %option.total_value,
            "distribution option validated"
        );
        Ok(())
    }

    // local checks first, chain queries last
    fn check(&self, option: &DistributionOption) -> Result<(), Error> {
        if option.total_value == TotalValue::ZERO {
            return Err(InvalidOption::NonPositiveTotal.into());
        }
        if option.start_height >= option.end_height {
            return Err(InvalidOption::EmptyRange {
                start: option.start_height,
                end: option.end_height,
            }
            .into());
        }
        if !self.exchanges.contains(&option.exchange) {
            return Err(InvalidOption::UnknownExchange(option.exchange.clone()).into());
        }

        let latest = self.chain.latest_block_header();
        debug!(latest = latest.number, "got latest block header");
        if latest.number < option.end_height {
            return Err(Error::StaleRange {
                latest: latest.number,
                end_height: option.end_height,
            });
        }

        let reward_token = parse_address(&option.reward_token)
            .ok_or_else(|| InvalidOption::InvalidRewardToken(option.reward_token.clone()))?;
        let balance = self.balance_guard.ensure_balance(
            self.chain,
            reward_token,
            self.sender,
            option.total_value,
        )?;
        debug!(%balance, sender = %self.sender, "sender balance is enough");
        Ok(())
    }

    fn open_output_file(&mut self, path: &Path) -> Result<(), Error> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|source| Error::Resource {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(path = %path.display(), "opened output file");
        self.output = Some(OutputFile {
            path: path.to_path_buf(),
            file,
        });
        Ok(())
    }
}

impl<'a, C> OptionValidator<'a, C> {
    /// Dry run report destination, if one was configured.
    pub fn output_file(&mut self) -> Option<&mut File> {
        self.output.as_mut().map(|output| &mut output.file)
    }

    pub fn deinit(&mut self) {
        if let Some(OutputFile { path, file }) = self.output.take() {
            drop(file);
            debug!(path = %path.display(), "closed output file");
        }
    }
}

impl<'a, C> Drop for OptionValidator<'a, C> {
    fn drop(&mut self) {
        self.deinit();
    }
}
