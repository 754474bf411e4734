use super::{DistributionOption, Error};
use activity_lib::{parse_address, parse_volume, ActivityStore, Address, ParseVolumeError, Volume};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info};

pub type Accounts = Vec<Address>;
/// Parallel sequences: `volumes[i]` is the weight of `accounts[i]`.
pub type AccountsAndVolumes = (Vec<Address>, Vec<Volume>);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LineError {
    #[error("wrong address")]
    Address,
    #[error("expected an address and a volume, found {0} fields")]
    FieldCount(usize),
    #[error(transparent)]
    Volume(#[from] ParseVolumeError),
    #[error("line is not valid UTF-8")]
    Encoding,
}

/// Where the recipients of a distribution come from.
pub trait RecipientSource {
    fn accounts(&self) -> Result<Accounts, Error>;
    fn accounts_and_volumes(&self) -> Result<AccountsAndVolumes, Error>;
}

pub struct StoreSource<'a, S> {
    store: &'a S,
    exchange: &'a str,
    start_height: u64,
    end_height: u64,
}

impl<'a, S: ActivityStore> StoreSource<'a, S> {
    pub fn new(store: &'a S, option: &'a DistributionOption) -> Self {
        Self {
            store,
            exchange: &option.exchange,
            start_height: option.start_height,
            end_height: option.end_height,
        }
    }
}

impl<S: ActivityStore> RecipientSource for StoreSource<'_, S> {
    fn accounts(&self) -> Result<Accounts, Error> {
        self.store
            .accounts_for_exchange(self.exchange)
            .map_err(Error::store)
    }

    fn accounts_and_volumes(&self) -> Result<AccountsAndVolumes, Error> {
        self.store
            .account_volumes(self.exchange, self.start_height, self.end_height)
            .map_err(Error::store)
    }
}

/// Recipients listed in a text file, one entry per line.
pub struct FileSource<'a> {
    path: &'a Path,
}

impl<'a> FileSource<'a> {
    pub fn new(path: &'a Path) -> Self {
        Self { path }
    }

    // any bad line discards everything read so far
    fn parse_lines<T, F>(&self, parse: F) -> Result<Vec<T>, Error>
    where
        F: Fn(&str) -> Result<T, LineError>,
    {
        let resource = |source: std::io::Error| Error::Resource {
            path: self.path.to_path_buf(),
            source,
        };
        let file = File::open(self.path).map_err(resource)?;
        BufReader::new(file)
            .split(b'\n')
            .enumerate()
            .map(|(index, bytes)| {
                let malformed = |line: &str, reason: LineError| Error::MalformedInput {
                    path: self.path.to_path_buf(),
                    line_number: index + 1,
                    line: line.trim().to_string(),
                    reason,
                };
                let line = String::from_utf8(bytes.map_err(resource)?).map_err(|e| {
                    malformed(&*String::from_utf8_lossy(e.as_bytes()), LineError::Encoding)
                })?;
                parse(line.trim()).map_err(|reason| malformed(line.as_str(), reason))
            })
            .collect()
    }
}

impl RecipientSource for FileSource<'_> {
    fn accounts(&self) -> Result<Accounts, Error> {
        self.parse_lines(parse_account_line)
    }

    fn accounts_and_volumes(&self) -> Result<AccountsAndVolumes, Error> {
        Ok(self.parse_lines(parse_volume_line)?.into_iter().unzip())
    }
}

pub fn parse_account_line(line: &str) -> Result<Address, LineError> {
    parse_address(line).ok_or(LineError::Address)
}

/// `<address> <volume>`, nothing more.
pub fn parse_volume_line(line: &str) -> Result<(Address, Volume), LineError> {
    let fields = line.split_whitespace().collect::<Vec<_>>();
    match fields.as_slice() {
        [account, volume] => {
            let account = parse_address(account).ok_or(LineError::Address)?;
            Ok((account, parse_volume(volume)?))
        }
        _ => Err(LineError::FieldCount(fields.len())),
    }
}

/// Picks the recipient source of a validated option: the input file when one
/// is configured, the activity store otherwise.
pub struct Ingestor<'a, S> {
    option: &'a DistributionOption,
    store: &'a S,
}

impl<'a, S: ActivityStore + 'a> Ingestor<'a, S> {
    pub fn new(option: &'a DistributionOption, store: &'a S) -> Self {
        Self { option, store }
    }

    pub fn source(&self) -> Box<dyn RecipientSource + 'a> {
        match self.option.input_file() {
            Some(path) => {
                debug!(path = %path.display(), "reading recipients from input file");
                Box::new(FileSource::new(path))
            }
            None => {
                debug!(exchange = %self.option.exchange, "reading recipients from activity store");
                Box::new(StoreSource::new(self.store, self.option))
            }
        }
    }

    pub fn get_accounts(&self) -> Result<Accounts, Error> {
        let accounts = self.source().accounts()?;
        info!(accounts = accounts.len(), "loaded recipient accounts");
        Ok(accounts)
    }

    pub fn get_accounts_and_volumes(&self) -> Result<AccountsAndVolumes, Error> {
        let (accounts, volumes) = self.source().accounts_and_volumes()?;
        info!(accounts = accounts.len(), "loaded recipient accounts and volumes");
        Ok((accounts, volumes))
    }
}

pub fn get_accounts<S: ActivityStore>(
    option: &DistributionOption,
    store: &S,
) -> Result<Accounts, Error> {
    Ingestor::new(option, store).get_accounts()
}

pub fn get_accounts_and_volumes<S: ActivityStore>(
    option: &DistributionOption,
    store: &S,
) -> Result<AccountsAndVolumes, Error> {
    Ingestor::new(option, store).get_accounts_and_volumes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::TotalValue;
    use activity_lib::arbitrary;
    use std::cell::Cell;
    use std::io::Write;
    use std::path::PathBuf;
    use test_strategy::proptest;

    const EXCHANGE: &str = "0x049ddc3cd20ac7a2f6c867680f7e21de68720fb0";
    const ALICE: &str = "0xABCDabcdABCDabcdABCDabcdABCDabcdABCD1234";
    const BOB: &str = "0xef01ef01ef01ef01ef01ef01ef01ef01ef015678";

    #[derive(Debug, thiserror::Error)]
    #[error("store unavailable")]
    struct Unavailable;

    #[derive(Default)]
    struct CountingStore {
        accounts: Vec<Address>,
        volumes: Vec<Volume>,
        fail: bool,
        account_queries: Cell<usize>,
        volume_queries: Cell<Option<(u64, u64)>>,
    }

    impl ActivityStore for CountingStore {
        type Error = Unavailable;

        fn accounts_for_exchange(&self, exchange: &str) -> Result<Vec<Address>, Unavailable> {
            assert_eq!(exchange, EXCHANGE);
            self.account_queries.set(self.account_queries.get() + 1);
            if self.fail {
                return Err(Unavailable);
            }
            Ok(self.accounts.clone())
        }

        fn account_volumes(
            &self,
            exchange: &str,
            start_height: u64,
            end_height: u64,
        ) -> Result<(Vec<Address>, Vec<Volume>), Unavailable> {
            assert_eq!(exchange, EXCHANGE);
            self.volume_queries.set(Some((start_height, end_height)));
            if self.fail {
                return Err(Unavailable);
            }
            Ok((self.accounts.clone(), self.volumes.clone()))
        }
    }

    fn option(input_file: Option<PathBuf>) -> DistributionOption {
        DistributionOption {
            total_value: TotalValue::from(1u64),
            start_height: 100,
            end_height: 200,
            exchange: EXCHANGE.to_string(),
            reward_token: String::new(),
            input_file,
            output_file: None,
            dry_run: true,
        }
    }

    fn input_file(content: &str) -> tempfile::NamedTempFile {
        input_bytes(content.as_bytes())
    }

    fn input_bytes(content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content).unwrap();
        file
    }

    fn address(s: &str) -> Address {
        parse_address(s).unwrap()
    }

    #[test]
    fn account_lines() {
        assert_eq!(parse_account_line(ALICE), Ok(address(ALICE)));
        assert_eq!(parse_account_line(""), Err(LineError::Address));
        assert_eq!(parse_account_line("notanaddress"), Err(LineError::Address));
    }

    #[test]
    fn volume_lines() {
        assert_eq!(
            parse_volume_line(&format!("{} 1000", ALICE)),
            Ok((address(ALICE), Volume::from(1000u64)))
        );
        assert_eq!(
            parse_volume_line(&format!("{}\t\t0x10", BOB)),
            Ok((address(BOB), Volume::from(16u64)))
        );
        assert_eq!(
            parse_volume_line("notanaddress 100"),
            Err(LineError::Address)
        );
        assert_eq!(parse_volume_line(ALICE), Err(LineError::FieldCount(1)));
        assert_eq!(parse_volume_line(""), Err(LineError::FieldCount(0)));
        assert_eq!(
            parse_volume_line(&format!("{} 1000 2000", ALICE)),
            Err(LineError::FieldCount(3))
        );
        assert!(matches!(
            parse_volume_line(&format!("{} -5", ALICE)),
            Err(LineError::Volume(_))
        ));
    }

    #[test]
    fn accounts_from_file() {
        let file = input_file(&format!("  {}\n{}  \n{}\n", ALICE, BOB, ALICE));
        let store = CountingStore::default();
        let accounts = get_accounts(&option(Some(file.path().into())), &store).unwrap();
        // duplicates are kept as given
        assert_eq!(accounts, vec![address(ALICE), address(BOB), address(ALICE)]);
        assert_eq!(store.account_queries.get(), 0);
    }

    #[test]
    fn accounts_file_without_trailing_newline() {
        let file = input_file(BOB);
        let accounts = get_accounts(
            &option(Some(file.path().into())),
            &CountingStore::default(),
        )
        .unwrap();
        assert_eq!(accounts, vec![address(BOB)]);
    }

    #[test]
    fn bad_account_line_discards_everything() {
        let file = input_file(&format!("{}\n0x1234\n{}\n", ALICE, BOB));
        match get_accounts(&option(Some(file.path().into())), &CountingStore::default()) {
            Err(Error::MalformedInput {
                line_number,
                line,
                reason,
                ..
            }) => {
                assert_eq!(line_number, 2);
                assert_eq!(line, "0x1234");
                assert_eq!(reason, LineError::Address);
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn volumes_from_file() {
        let file = input_file(&format!("{} 1000\n{} 2000\n", ALICE, BOB));
        let store = CountingStore::default();
        let (accounts, volumes) =
            get_accounts_and_volumes(&option(Some(file.path().into())), &store).unwrap();
        assert_eq!(accounts, vec![address(ALICE), address(BOB)]);
        assert_eq!(volumes, vec![Volume::from(1000u64), Volume::from(2000u64)]);
        assert!(store.volume_queries.get().is_none());
    }

    #[test]
    fn bad_volume_line_discards_everything() {
        let file = input_file(&format!("{} 1000\nnotanaddress 100\n{} 2000\n", ALICE, BOB));
        match get_accounts_and_volumes(
            &option(Some(file.path().into())),
            &CountingStore::default(),
        ) {
            Err(Error::MalformedInput {
                line_number, line, ..
            }) => {
                assert_eq!(line_number, 2);
                assert_eq!(line, "notanaddress 100");
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn non_utf8_line_is_malformed() {
        let mut content = format!("{} 1000\n", ALICE).into_bytes();
        content.extend_from_slice(b"\xff\xfe bad\n");
        content.extend_from_slice(format!("{} 2000\n", BOB).as_bytes());
        let file = input_bytes(&content);
        let option = option(Some(file.path().into()));

        match get_accounts_and_volumes(&option, &CountingStore::default()) {
            Err(Error::MalformedInput {
                line_number,
                line,
                reason,
                ..
            }) => {
                assert_eq!(line_number, 2);
                assert_eq!(line, "\u{fffd}\u{fffd} bad");
                assert_eq!(reason, LineError::Encoding);
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert!(matches!(
            get_accounts(&option, &CountingStore::default()),
            Err(Error::MalformedInput {
                line_number: 2,
                reason: LineError::Encoding,
                ..
            })
        ));
    }

    #[test]
    fn crlf_line_endings() {
        let file = input_file(&format!("{}\r\n{}\r\n", ALICE, BOB));
        let accounts = get_accounts(
            &option(Some(file.path().into())),
            &CountingStore::default(),
        )
        .unwrap();
        assert_eq!(accounts, vec![address(ALICE), address(BOB)]);
    }

    #[test]
    fn extra_volume_fields_are_rejected() {
        let file = input_file(&format!("{}  1000 extra\n", ALICE));
        assert!(matches!(
            get_accounts_and_volumes(&option(Some(file.path().into())), &CountingStore::default()),
            Err(Error::MalformedInput {
                reason: LineError::FieldCount(3),
                ..
            })
        ));
    }

    #[test]
    fn missing_input_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.txt");
        match get_accounts(&option(Some(path.clone())), &CountingStore::default()) {
            Err(Error::Resource { path: missing, .. }) => assert_eq!(missing, path),
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn store_is_used_without_input_file() {
        let store = CountingStore {
            accounts: vec![address(BOB), address(ALICE)],
            volumes: vec![Volume::from(3u64), Volume::from(4u64)],
            ..Default::default()
        };
        for option in [option(None), option(Some(PathBuf::new()))] {
            assert_eq!(
                get_accounts(&option, &store).unwrap(),
                vec![address(BOB), address(ALICE)]
            );
            assert_eq!(
                get_accounts_and_volumes(&option, &store).unwrap(),
                (
                    vec![address(BOB), address(ALICE)],
                    vec![Volume::from(3u64), Volume::from(4u64)]
                )
            );
        }
        assert_eq!(store.account_queries.get(), 2);
        assert_eq!(store.volume_queries.get(), Some((100, 200)));
    }

    #[test]
    fn store_errors_are_surfaced() {
        let store = CountingStore {
            fail: true,
            ..Default::default()
        };
        match get_accounts(&option(None), &store) {
            Err(Error::Store(e)) => {
                assert!(e.downcast_ref::<Unavailable>().is_some());
                assert_eq!(e.to_string(), "store unavailable");
            }
            other => panic!("unexpected result {:?}", other),
        }
        assert!(matches!(
            get_accounts_and_volumes(&option(None), &store),
            Err(Error::Store(_))
        ));
    }

    #[proptest]
    fn account_file_round_trip(
        #[strategy(proptest::collection::vec(arbitrary::address(), 0..50))] accounts: Vec<Address>,
        lowercase: bool,
    ) {
        let content = accounts
            .iter()
            .map(|a| {
                if lowercase {
                    a.to_string().to_lowercase()
                } else {
                    a.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        let file = input_file(&content);
        let read = get_accounts(&option(Some(file.path().into())), &CountingStore::default())
            .unwrap();
        assert_eq!(read, accounts);
        assert_eq!(
            read.iter().map(ToString::to_string).collect::<Vec<_>>(),
            accounts.iter().map(ToString::to_string).collect::<Vec<_>>()
        );
    }
}
