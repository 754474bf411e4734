mod cli;

use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("distribution_toolbox=info,activity_lib=info")),
        )
        .init();

    cli::Cli::from_args().exec()
}
