use super::config::Config;
use activity_lib::JsonActivityStore;
use alloy_primitives::U256;
use color_eyre::eyre::WrapErr;
use color_eyre::Report;
use distribution_toolbox::chain::RpcChainClient;
use distribution_toolbox::distribution::{
    BalanceGuard, DistributionOption, Ingestor, OptionValidator,
};
use distribution_toolbox::utils::csv;
use std::path::PathBuf;
use std::time::Duration;
use structopt::StructOpt;
use tracing::{info, warn};

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case")]
pub struct Check {
    /// Path to the json encoded toolbox configuration
    #[structopt(long)]
    config: PathBuf,

    /// Reward (in the token smallest unit) to be distributed
    #[structopt(long)]
    total_value: U256,

    /// First block of the activity window
    #[structopt(long)]
    start_height: u64,

    /// Block right after the activity window
    #[structopt(long)]
    end_height: u64,

    #[structopt(long)]
    exchange: String,

    #[structopt(long)]
    reward_token: String,

    /// Recipients file, one address (or address and volume) per line.
    /// Overrides the activity export.
    #[structopt(long)]
    input_file: Option<PathBuf>,

    /// Dry run report output path
    #[structopt(long)]
    output_file: Option<PathBuf>,

    /// Path to a json export of the exchanges activity
    #[structopt(long)]
    activity: Option<PathBuf>,

    /// Weight rewards by trading volume
    #[structopt(long)]
    by_volume: bool,

    #[structopt(long)]
    dry_run: bool,

    /// Give up on the sender balance check after this many seconds of failed queries
    #[structopt(long)]
    balance_max_wait_secs: Option<u64>,
}

impl Check {
    pub fn exec(self) -> Result<(), Report> {
        let Check {
            config,
            total_value,
            start_height,
            end_height,
            exchange,
            reward_token,
            input_file,
            output_file,
            activity,
            by_volume,
            dry_run,
            balance_max_wait_secs,
        } = self;

        let config = Config::load(&config)?;
        let sender = config.sender()?;
        let exchanges = config.exchange_registry();
        let chain = RpcChainClient::new(config.rpc_url.clone())
            .with_retry_interval(config.retry_interval());
        let mut balance_guard = BalanceGuard::new(config.retry_interval());
        if let Some(secs) = balance_max_wait_secs {
            balance_guard = balance_guard.with_max_wait(Duration::from_secs(secs));
        }

        let store = match &activity {
            Some(path) => JsonActivityStore::load(path)
                .wrap_err_with(|| format!("could not load activity {}", path.display()))?,
            None => JsonActivityStore::default(),
        };

        let option = DistributionOption {
            total_value,
            start_height,
            end_height,
            exchange,
            reward_token,
            input_file,
            output_file,
            dry_run,
        };
        if option.input_file().is_none() && activity.is_none() {
            warn!(
                "neither an input file nor an activity export was given, \
                 no recipients will be found"
            );
        }

        let mut validator =
            OptionValidator::new(&chain, &exchanges, sender).with_balance_guard(balance_guard);
        validator.check_and_init(&option)?;

        let ingestor = Ingestor::new(&option, &store);
        if by_volume {
            let (accounts, volumes) = ingestor.get_accounts_and_volumes()?;
            if let Some(file) = validator.output_file() {
                csv::dump_accounts_and_volumes(file, &accounts, &volumes)?;
            }
        } else {
            let accounts = ingestor.get_accounts()?;
            if let Some(file) = validator.output_file() {
                csv::dump_accounts(file, &accounts)?;
            }
        }

        if option.dry_run {
            info!("dry run, no rewards will be sent");
        } else {
            info!("recipients are ready for payout");
        }
        validator.deinit();
        Ok(())
    }
}
