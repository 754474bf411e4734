mod check;
mod config;

use color_eyre::Report;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case")]
pub enum Cli {
    /// Validate a reward distribution and collect its recipients
    Check(check::Check),
}

impl Cli {
    pub fn exec(self) -> Result<(), Report> {
        match self {
            Self::Check(cmd) => cmd.exec(),
        }
    }
}
