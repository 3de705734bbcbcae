//! Versioned key-value ledger with a hash-chained audit log per key
use super::config::Config;
use super::error::{ScfError, ScfResult};
use super::types::EntityKind;
use super::utils;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Serialize, de::DeserializeOwned};
use sled::Transactional;
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionResult};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}

/// Current value of a key together with the version that wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    pub value: Vec<u8>,
    pub version: u64,
}

/// One committed write of a key. Versions start at 1 and increase by one.
#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct HistoryEntry {
    #[n(0)]
    pub version: u64,
    #[n(1)]
    pub tx_id: String,
    #[n(2)]
    pub timestamp: TimeStamp<Utc>,
    #[n(3)]
    pub digest: String, // sha256 over the previous digest and this value
    #[n(4)]
    pub value: Vec<u8>,
}

/// Digest of a history entry, chained to the entry before it. The first
/// version of a key chains to the empty string.
pub fn chain_digest(prev_digest: &str, value: &[u8]) -> String {
    let mut material = Vec::with_capacity(prev_digest.len() + value.len());
    material.extend_from_slice(prev_digest.as_bytes());
    material.extend_from_slice(value);
    sha256::digest(&material)
}

/// Recomputes the digest chain of a key's history.
pub fn verify_history(key: &str, entries: &[HistoryEntry]) -> ScfResult<()> {
    let mut prev = String::new();
    for (idx, entry) in entries.iter().enumerate() {
        let expected_version = idx as u64 + 1;
        if entry.version != expected_version {
            return Err(ScfError::corrupt(
                key,
                format!(
                    "history version {} found where {expected_version} was expected",
                    entry.version
                ),
            ));
        }
        if chain_digest(&prev, &entry.value) != entry.digest {
            return Err(ScfError::corrupt(
                key,
                format!("digest chain broken at version {}", entry.version),
            ));
        }
        prev = entry.digest.clone();
    }
    Ok(())
}

/// The state a core operation reads and writes. Implementations must make
/// each `put_state` atomic together with its history entry, and must reject
/// a write whose `expected` version is no longer current.
pub trait LedgerStore {
    fn get_state(&self, key: &str) -> ScfResult<Option<Versioned>>;

    /// `expected == None` requires the key to be absent, `Some(v)` requires
    /// `v` to be the current version. Returns the new version.
    fn put_state(&self, key: &str, value: &[u8], expected: Option<u64>) -> ScfResult<u64>;

    /// Every committed write of `key`, oldest first.
    fn history(&self, key: &str) -> ScfResult<Vec<HistoryEntry>>;

    /// Current values of every key starting with `prefix`, in key order.
    fn scan_prefix(&self, prefix: &str) -> ScfResult<Vec<(String, Versioned)>>;
}

/// sled backed ledger. `state` holds the JSON value of each key, `versions`
/// its current version and `history` the CBOR encoded audit entries.
#[derive(Clone)]
pub struct SledLedger {
    instance: Arc<sled::Db>,
    state: sled::Tree,
    versions: sled::Tree,
    history: sled::Tree,
    flush_on_commit: bool,
}

impl SledLedger {
    pub fn new(instance: Arc<sled::Db>) -> ScfResult<Self> {
        let state = instance.open_tree("state")?;
        let versions = instance.open_tree("versions")?;
        let history = instance.open_tree("history")?;

        Ok(Self {
            instance,
            state,
            versions,
            history,
            flush_on_commit: false,
        })
    }

    pub fn open<P: AsRef<Path>>(path: P) -> ScfResult<Self> {
        let db = sled::open(path.as_ref())?;
        info!(path = %path.as_ref().display(), "Opened ledger");
        Self::new(Arc::new(db))
    }

    pub fn from_config(config: &Config) -> ScfResult<Self> {
        Ok(Self::open(&config.ledger_path)?.with_flush_on_commit(config.flush_on_commit))
    }

    /// Force every commit to disk before returning.
    pub fn with_flush_on_commit(mut self, flush: bool) -> Self {
        self.flush_on_commit = flush;
        self
    }
}

fn history_key(key: &str, version: u64) -> Vec<u8> {
    let mut out = history_prefix(key);
    out.extend_from_slice(&version.to_be_bytes());
    out
}

// NUL keeps "proposal:D1" from matching the entries of "proposal:D10"
fn history_prefix(key: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(key.len() + 9);
    out.extend_from_slice(key.as_bytes());
    out.push(0);
    out
}

fn decode_version(key: &str, raw: &[u8]) -> ScfResult<u64> {
    let bytes: [u8; 8] = raw
        .try_into()
        .map_err(|_| ScfError::corrupt(key, "version is not 8 bytes"))?;
    Ok(u64::from_be_bytes(bytes))
}

fn decode_entry(key: &str, raw: &[u8]) -> ScfResult<HistoryEntry> {
    minicbor::decode(raw).map_err(|e| ScfError::corrupt(key, e))
}

impl LedgerStore for SledLedger {
    fn get_state(&self, key: &str) -> ScfResult<Option<Versioned>> {
        let result: TransactionResult<_, ScfError> =
            (&self.state, &self.versions).transaction(|(state, versions)| {
                let value = state.get(key.as_bytes())?;
                let version = versions.get(key.as_bytes())?;
                Ok((value, version))
            });
        let (value, version) = match result {
            Ok(read) => read,
            Err(TransactionError::Abort(err)) => return Err(err),
            Err(TransactionError::Storage(err)) => return Err(err.into()),
        };

        debug!(key, found = value.is_some(), "Read ledger state");
        match (value, version) {
            (None, None) => Ok(None),
            (Some(value), Some(version)) => Ok(Some(Versioned {
                value: value.to_vec(),
                version: decode_version(key, &version)?,
            })),
            _ => Err(ScfError::corrupt(key, "value and version out of step")),
        }
    }

    fn put_state(&self, key: &str, value: &[u8], expected: Option<u64>) -> ScfResult<u64> {
        let tx_id = utils::new_tx_id();
        let timestamp = TimeStamp::new();

        let trees = (&self.state, &self.versions, &self.history);
        let result: TransactionResult<u64, ScfError> =
            trees.transaction(|(state, versions, history)| {
                let current = match versions.get(key.as_bytes())? {
                    Some(raw) => Some(
                        decode_version(key, &raw).map_err(ConflictableTransactionError::Abort)?,
                    ),
                    None => None,
                };
                if current != expected {
                    return Err(ConflictableTransactionError::Abort(ScfError::Conflict {
                        key: key.to_string(),
                    }));
                }

                let prev_digest = match current {
                    Some(v) => match history.get(history_key(key, v))? {
                        Some(raw) => {
                            decode_entry(key, &raw)
                                .map_err(ConflictableTransactionError::Abort)?
                                .digest
                        }
                        None => {
                            return Err(ConflictableTransactionError::Abort(ScfError::corrupt(
                                key,
                                format!("history entry for version {v} is missing"),
                            )));
                        }
                    },
                    None => String::new(),
                };

                let version = current.map_or(1, |v| v + 1);
                let entry = HistoryEntry {
                    version,
                    tx_id: tx_id.clone(),
                    timestamp: timestamp.clone(),
                    digest: chain_digest(&prev_digest, value),
                    value: value.to_vec(),
                };
                let encoded = minicbor::to_vec(&entry).map_err(|e| {
                    ConflictableTransactionError::Abort(ScfError::Storage(e.to_string()))
                })?;

                state.insert(key.as_bytes(), value)?;
                versions.insert(key.as_bytes(), version.to_be_bytes().to_vec())?;
                history.insert(history_key(key, version), encoded)?;

                Ok(version)
            });

        match result {
            Ok(version) => {
                if self.flush_on_commit {
                    self.instance.flush()?;
                }
                info!(key, version, tx_id = %tx_id, "Committed ledger write");
                Ok(version)
            }
            Err(TransactionError::Abort(err)) => {
                if let ScfError::Conflict { .. } = err {
                    warn!(key, ?expected, "Rejected stale ledger write");
                }
                Err(err)
            }
            Err(TransactionError::Storage(err)) => Err(err.into()),
        }
    }

    fn history(&self, key: &str) -> ScfResult<Vec<HistoryEntry>> {
        let mut entries = Vec::new();
        for item in self.history.scan_prefix(history_prefix(key)) {
            let (_, raw) = item?;
            entries.push(decode_entry(key, &raw)?);
        }
        Ok(entries)
    }

    fn scan_prefix(&self, prefix: &str) -> ScfResult<Vec<(String, Versioned)>> {
        let mut out = Vec::new();
        for item in self.state.scan_prefix(prefix.as_bytes()) {
            let (raw_key, value) = item?;
            let key = String::from_utf8(raw_key.to_vec())
                .map_err(|e| ScfError::corrupt(prefix, e))?;
            let version = match self.versions.get(raw_key)? {
                Some(raw) => decode_version(&key, &raw)?,
                None => return Err(ScfError::corrupt(&key, "value has no version")),
            };
            out.push((
                key,
                Versioned {
                    value: value.to_vec(),
                    version,
                },
            ));
        }
        Ok(out)
    }
}

/// Decodes a stored JSON value, reporting the key on failure.
pub fn decode_record<T: DeserializeOwned>(key: &str, value: &[u8]) -> ScfResult<T> {
    serde_json::from_slice(value).map_err(|e| ScfError::corrupt(key, e))
}

fn encode_record<T: Serialize>(key: &str, record: &T) -> ScfResult<Vec<u8>> {
    serde_json::to_vec(record).map_err(|e| ScfError::corrupt(key, e))
}

/// Reads `kind:id` with the version it was read at.
pub fn read_record<L, T>(ledger: &L, kind: EntityKind, id: &str) -> ScfResult<Option<(T, u64)>>
where
    L: LedgerStore + ?Sized,
    T: DeserializeOwned,
{
    let key = kind.key(id);
    match ledger.get_state(&key)? {
        Some(found) => Ok(Some((decode_record(&key, &found.value)?, found.version))),
        None => Ok(None),
    }
}

/// Like [`read_record`] but an absent key is `NotFound`.
pub fn load_record<L, T>(ledger: &L, kind: EntityKind, id: &str) -> ScfResult<(T, u64)>
where
    L: LedgerStore + ?Sized,
    T: DeserializeOwned,
{
    read_record(ledger, kind, id)?.ok_or_else(|| ScfError::NotFound {
        kind,
        id: id.to_string(),
    })
}

/// Writes a new record, failing with `AlreadyExists` when the key is taken.
pub fn insert_record<L, T>(ledger: &L, kind: EntityKind, id: &str, record: &T) -> ScfResult<u64>
where
    L: LedgerStore + ?Sized,
    T: Serialize,
{
    let key = kind.key(id);
    if ledger.get_state(&key)?.is_some() {
        return Err(ScfError::AlreadyExists {
            kind,
            id: id.to_string(),
        });
    }
    let value = encode_record(&key, record)?;
    ledger.put_state(&key, &value, None)
}

/// Overwrites a record that was read at `expected_version`.
pub fn replace_record<L, T>(
    ledger: &L,
    kind: EntityKind,
    id: &str,
    record: &T,
    expected_version: u64,
) -> ScfResult<u64>
where
    L: LedgerStore + ?Sized,
    T: Serialize,
{
    let key = kind.key(id);
    let value = encode_record(&key, record)?;
    ledger.put_state(&key, &value, Some(expected_version))
}
