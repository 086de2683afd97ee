//! A single MVCC transaction: the snapshot-isolation read/write handle
//! that `storage::txn::Txn`, the transaction manager, wraps with a
//! state machine, deadline, and isolation-level mapping.
//!
//! Visibility rule: a versioned key `k@v` is visible to a transaction
//! with snapshot `(version, active)` iff `v <= version` and `v` is not
//! in `active` (unless `v` is this transaction's own version, in which
//! case it always sees its own uncommitted writes). This is the
//! standard toyDB-lineage scheme described in `mvcc::mvcc`'s module doc.

use std::collections::{HashSet, Bound};
use std::sync::{Arc, Mutex};

use serde_derive::{Deserialize, Serialize};

use crate::error::{CResult, Error};
use crate::mvcc::mvcc::{Key, KeyPrefix};
use crate::mvcc::scan::Scan;
use crate::mvcc::Version;
use crate::storage::engine::Engine;

/// An MVCC transaction.
pub struct Transaction<E: Engine> {
    /// The underlying engine, shared by all transactions.
    engine: Arc<Mutex<E>>,

    /// The transaction state.
    st: TransactionState,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransactionState {
    /// The version this transaction is running at.
    /// Only one read-write transaction can run at a given version, since this identifies its writes.
    pub version: Version,

    /// If true, the transaction is read only.
    pub read_only: bool,

    /// The set of concurrent active (uncommitted) transactions, as of the start of this transaction.
    /// Their writes should be invisible to this transaction even if they're writing at a lower version,
    /// since they're not committed yet.
    pub active: HashSet<Version>,
}

impl TransactionState {
    /// Checks whether the given version is visible to this transaction.
    ///
    /// Future versions, and versions belonging to active transactions as of
    /// the start of this transaction, are invisible.
    pub(crate) fn is_visible(&self, version: Version) -> bool {
        if self.active.contains(&version) {
            false
        } else {
            version <= self.version
        }
    }
}

fn serialize<T: serde::Serialize>(v: &T) -> CResult<Vec<u8>> {
    Ok(bincode::serialize(v)?)
}

fn deserialize<'a, T: serde::Deserialize<'a>>(bytes: &'a [u8]) -> CResult<T> {
    Ok(bincode::deserialize(bytes)?)
}

pub(crate) trait TransactionDef<E: Engine> {
    fn begin(engine: Arc<Mutex<E>>) -> CResult<Transaction<E>>;

    fn begin_read_only(engine: Arc<Mutex<E>>, as_of: Option<Version>) -> CResult<Transaction<E>>;

    fn resume(engine: Arc<Mutex<E>>, state: TransactionState) -> CResult<Transaction<E>>;
}

impl<E: Engine> TransactionDef<E> for Transaction<E> {
    /// Begins a new read-write transaction.
    fn begin(engine: Arc<Mutex<E>>) -> CResult<Transaction<E>> {
        let mut session = engine.lock().map_err(|_| Error::Internal("engine mutex poisoned".into()))?;

        let version = match session.get(&Key::NextVersion.encode()?)? {
            Some(ref v) => deserialize(v)?,
            None => 1,
        };
        session.set(&Key::NextVersion.encode()?, serialize(&(version + 1))?)?;

        let active = Self::scan_active(&mut *session)?;
        if !active.is_empty() {
            session.set(&Key::TxnActiveSnapshot(version).encode()?, serialize(&active)?)?;
        }
        session.set(&Key::TxnActive(version).encode()?, vec![])?;
        drop(session);

        Ok(Transaction { engine, st: TransactionState { version, read_only: false, active } })
    }

    /// Begins a read-only transaction. If `as_of` is given, the transaction
    /// can read at an arbitrary historical version, as long as the
    /// version's garbage hasn't been collected. The statement-level
    /// snapshot used for ReadUncommitted/ReadCommitted reuses this entry
    /// point once per statement.
    fn begin_read_only(engine: Arc<Mutex<E>>, as_of: Option<Version>) -> CResult<Transaction<E>> {
        let mut session = engine.lock().map_err(|_| Error::Internal("engine mutex poisoned".into()))?;

        let mut version = match session.get(&Key::NextVersion.encode()?)? {
            Some(ref v) => deserialize(v)?,
            None => 1,
        };
        let mut active = HashSet::new();
        if let Some(as_of) = as_of {
            if as_of >= version {
                return Err(Error::InvalidData(format!("version {} does not exist", as_of)));
            }
            version = as_of;
            if let Some(ref v) = session.get(&Key::TxnActiveSnapshot(version).encode()?)? {
                active = deserialize(v)?;
            }
        } else {
            active = Self::scan_active(&mut *session)?;
        }
        drop(session);

        Ok(Transaction { engine, st: TransactionState { version, read_only: true, active } })
    }

    /// Resumes a transaction from the given state.
    fn resume(engine: Arc<Mutex<E>>, state: TransactionState) -> CResult<Transaction<E>> {
        if !state.read_only {
            let mut session = engine.lock().map_err(|_| Error::Internal("engine mutex poisoned".into()))?;
            if session.get(&Key::TxnActive(state.version).encode()?)?.is_none() {
                return Err(Error::Internal(format!(
                    "no active transaction at version {}",
                    state.version
                )));
            }
        }
        Ok(Transaction { engine, st: state })
    }
}

impl<E: Engine> Transaction<E> {
    /// Scans the set of currently active transactions.
    fn scan_active(session: &mut E) -> CResult<HashSet<Version>> {
        let mut active = HashSet::new();
        let mut scan = session.scan_prefix(&KeyPrefix::TxnActive.encode()?);
        while let Some((key, _)) = scan.next().transpose()? {
            match Key::decode(&key)? {
                Key::TxnActive(version) => active.insert(version),
                k => return Err(Error::Internal(format!("expected TxnActive key, got {:?}", k))),
            };
        }
        Ok(active)
    }

    pub fn version(&self) -> Version {
        self.st.version
    }

    pub fn read_only(&self) -> bool {
        self.st.read_only
    }

    pub fn state(&self) -> &TransactionState {
        &self.st
    }

    /// Commits the transaction, by removing it from the active set.
    pub fn commit(self) -> CResult<()> {
        if self.st.read_only {
            return Ok(());
        }
        let mut session = self.engine.lock().map_err(|_| Error::Internal("engine mutex poisoned".into()))?;
        let remove = session
            .scan_prefix(&KeyPrefix::TxnWrite(self.st.version).encode()?)
            .map(|r| r.map(|(k, _)| k))
            .collect::<CResult<Vec<_>>>()?;
        for key in remove {
            session.delete(&key)?;
        }
        session.delete(&Key::TxnActive(self.st.version).encode()?)?;
        session.flush()
    }

    /// Rolls back the transaction, by undoing all written versions and
    /// removing it from the active set.
    pub fn rollback(self) -> CResult<()> {
        if self.st.read_only {
            return Ok(());
        }
        let mut session = self.engine.lock().map_err(|_| Error::Internal("engine mutex poisoned".into()))?;
        let mut rollback = Vec::new();
        let mut scan = session.scan_prefix(&KeyPrefix::TxnWrite(self.st.version).encode()?);
        while let Some((key, _)) = scan.next().transpose()? {
            match Key::decode(&key)? {
                Key::TxnWrite(_, written_key) => rollback.push(Key::Version(written_key, self.st.version).encode()?),
                k => return Err(Error::Internal(format!("expected TxnWrite key, got {:?}", k))),
            }
            rollback.push(key);
        }
        drop(scan);
        for key in rollback {
            session.delete(&key)?;
        }
        session.delete(&Key::TxnActive(self.st.version).encode()?)?;
        session.flush()
    }

    /// Deletes a key.
    pub fn delete(&self, key: &[u8]) -> CResult<()> {
        self.write_version(key, None)
    }

    /// Sets a value for a key.
    pub fn set(&self, key: &[u8], value: Vec<u8>) -> CResult<()> {
        self.write_version(key, Some(value))
    }

    /// Writes a new version for a key at the transaction's version. None is
    /// used for deletion (tombstone). Errors if the key is not writable
    /// (i.e. we don't have a snapshot at this version, or it was written by
    /// a newer or uncommitted transaction -- an optimistic-concurrency
    /// write-write conflict).
    fn write_version(&self, key: &[u8], value: Option<Vec<u8>>) -> CResult<()> {
        if self.st.read_only {
            return Err(Error::ReadOnly);
        }
        let mut session = self.engine.lock().map_err(|_| Error::Internal("engine mutex poisoned".into()))?;

        // Check for write conflicts, i.e. if the latest key is invisible to
        // us (either a newer version, or an uncommitted version in our
        // past). We can only conflict with the latest key, since all
        // transactions enforce this.
        let from = Key::Version(
            key.to_vec().into(),
            self.st.active.iter().min().copied().unwrap_or(self.st.version + 1),
        )
        .encode()?;
        let to = Key::Version(key.to_vec().into(), u64::MAX).encode()?;
        if let Some((k, _)) = session.scan((Bound::Included(from), Bound::Included(to))).next_back().transpose()? {
            match Key::decode(&k)? {
                Key::Version(_, version) => {
                    if !self.st.is_visible(version) {
                        return Err(Error::Conflict(format!(
                            "write-write conflict on key at version {}",
                            version
                        )));
                    }
                }
                k => return Err(Error::Internal(format!("expected Version key, got {:?}", k))),
            }
        }

        session.set(&Key::TxnWrite(self.st.version, key.to_vec().into()).encode()?, vec![])?;
        session.set(
            &Key::Version(key.to_vec().into(), self.st.version).encode()?,
            serialize(&value)?,
        )?;
        Ok(())
    }

    /// Fetches a key's value, or None if it does not exist.
    pub fn get(&self, key: &[u8]) -> CResult<Option<Vec<u8>>> {
        let mut session = self.engine.lock().map_err(|_| Error::Internal("engine mutex poisoned".into()))?;
        let from = Key::Version(key.to_vec().into(), 0).encode()?;
        let to = Key::Version(key.to_vec().into(), self.st.version).encode()?;
        let mut scan = session.scan((Bound::Included(from), Bound::Included(to)));
        while let Some((k, v)) = scan.next_back().transpose()? {
            match Key::decode(&k)? {
                Key::Version(_, version) => {
                    if self.st.is_visible(version) {
                        return deserialize(&v);
                    }
                }
                k => return Err(Error::Internal(format!("expected Version key, got {:?}", k))),
            }
        }
        Ok(None)
    }

    /// Returns an iterator over the latest visible key/value pairs at the
    /// transaction's version in the given range.
    pub fn scan(&self, range: (Bound<Vec<u8>>, Bound<Vec<u8>>)) -> CResult<Scan<E>> {
        let from = match range.0 {
            Bound::Included(k) => Bound::Included(Key::Version(k.into(), 0).encode()?),
            Bound::Excluded(k) => Bound::Excluded(Key::Version(k.into(), u64::MAX).encode()?),
            Bound::Unbounded => Bound::Included(Key::Version(vec![].into(), 0).encode()?),
        };
        let to = match range.1 {
            Bound::Included(k) => Bound::Included(Key::Version(k.into(), u64::MAX).encode()?),
            Bound::Excluded(k) => Bound::Excluded(Key::Version(k.into(), 0).encode()?),
            Bound::Unbounded => Bound::Excluded(KeyPrefix::Unversioned.encode()?),
        };
        Scan::new(self.engine.clone(), self.st.clone(), from, to)
    }

    /// Scans keys under the given prefix.
    pub fn scan_prefix(&self, prefix: &[u8]) -> CResult<Scan<E>> {
        let start = Bound::Included(prefix.to_vec());
        let end = match prefix.iter().rposition(|b| *b != 0xff) {
            Some(i) => Bound::Excluded(prefix.iter().take(i).copied().chain(std::iter::once(prefix[i] + 1)).collect()),
            None => Bound::Unbounded,
        };
        self.scan((start, end))
    }
}
