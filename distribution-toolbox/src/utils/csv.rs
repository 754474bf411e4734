use activity_lib::{Address, Volume};
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct AccountRecord {
    account: String,
}

#[derive(Serialize)]
struct VolumeRecord {
    account: String,
    volume: String,
}

/// Writes the dry run report of an unweighted distribution.
pub fn dump_accounts<W: Write>(writer: W, accounts: &[Address]) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for account in accounts {
        csv_writer.serialize(AccountRecord {
            account: account.to_string(),
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Writes the dry run report of a volume weighted distribution.
pub fn dump_accounts_and_volumes<W: Write>(
    writer: W,
    accounts: &[Address],
    volumes: &[Volume],
) -> Result<(), csv::Error> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for (account, volume) in accounts.iter().zip(volumes) {
        csv_writer.serialize(VolumeRecord {
            account: account.to_string(),
            volume: volume.to_string(),
        })?;
    }
    csv_writer.flush()?;
    Ok(())
}
