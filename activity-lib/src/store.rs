use crate::{parse_address, parse_volume, ActivityStore, Address, Exchange, Volume};
use serde::{de::Error as _, Deserialize, Deserializer};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("volume of account {0} overflowed while summing records")]
    Overflow(Address),
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct VolumeRecord {
    #[serde(deserialize_with = "address_from_hex")]
    pub account: Address,
    pub height: u64,
    #[serde(deserialize_with = "volume_from_str")]
    pub volume: Volume,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct ExchangeActivity {
    #[serde(default, deserialize_with = "addresses_from_hex")]
    pub accounts: Vec<Address>,
    #[serde(default)]
    pub volumes: Vec<VolumeRecord>,
}

/// Activity store backed by a JSON export, keyed by exchange.
///
/// Exchanges are configured as hex identifiers, so lookups ignore case.
#[derive(Clone, Debug, Default)]
pub struct JsonActivityStore {
    inner: HashMap<Exchange, ExchangeActivity>,
}

impl JsonActivityStore {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = std::fs::File::open(path)?;
        let raw: HashMap<Exchange, ExchangeActivity> =
            serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(Self::from(raw))
    }

    fn exchange(&self, exchange: &str) -> Option<&ExchangeActivity> {
        self.inner.get(&exchange.to_lowercase())
    }
}

impl From<HashMap<Exchange, ExchangeActivity>> for JsonActivityStore {
    fn from(from: HashMap<Exchange, ExchangeActivity>) -> Self {
        Self {
            inner: from
                .into_iter()
                .map(|(exchange, activity)| (exchange.to_lowercase(), activity))
                .collect(),
        }
    }
}

impl ActivityStore for JsonActivityStore {
    type Error = Error;

    fn accounts_for_exchange(&self, exchange: &str) -> Result<Vec<Address>, Error> {
        Ok(self
            .exchange(exchange)
            .map(|activity| activity.accounts.clone())
            .unwrap_or_default())
    }

    fn account_volumes(
        &self,
        exchange: &str,
        start_height: u64,
        end_height: u64,
    ) -> Result<(Vec<Address>, Vec<Volume>), Error> {
        let records = match self.exchange(exchange) {
            Some(activity) => &activity.volumes,
            None => return Ok((Vec::new(), Vec::new())),
        };

        let mut per_account: BTreeMap<Address, Volume> = BTreeMap::new();
        for record in records
            .iter()
            .filter(|r| r.height >= start_height && r.height < end_height)
        {
            let entry = per_account.entry(record.account).or_default();
            *entry = entry
                .checked_add(record.volume)
                .ok_or(Error::Overflow(record.account))?;
        }

        Ok(per_account.into_iter().unzip())
    }
}

fn address_from_hex<'de, D>(deserializer: D) -> Result<Address, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    parse_address(&s).ok_or_else(|| D::Error::custom(format!("invalid hex address '{}'", s)))
}

fn addresses_from_hex<'de, D>(deserializer: D) -> Result<Vec<Address>, D::Error>
where
    D: Deserializer<'de>,
{
    Vec::<String>::deserialize(deserializer)?
        .into_iter()
        .map(|s| {
            parse_address(&s)
                .ok_or_else(|| D::Error::custom(format!("invalid hex address '{}'", s)))
        })
        .collect()
}

fn volume_from_str<'de, D>(deserializer: D) -> Result<Volume, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum VolumeInput {
        String(String),
        Int(u64),
    }

    match VolumeInput::deserialize(deserializer)? {
        VolumeInput::String(s) => parse_volume(&s).map_err(D::Error::custom),
        VolumeInput::Int(v) => Ok(Volume::from(v)),
    }
}
