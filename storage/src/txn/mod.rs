//! Transaction manager: wraps the bare MVCC
//! [`crate::mvcc::transaction::Transaction`] with the state machine,
//! deadline, and SQL isolation-level mapping a session actually talks
//! to. `storage::engine` binds one of these to each logical
//! transaction a session holds open.

use std::time::{Duration, Instant};

use crate::error::{CResult, Error};
use crate::mvcc::mvcc::{MVCCDef, MVCC};
use crate::mvcc::transaction::{Transaction, TransactionDef, TransactionState};
use crate::storage::engine::Engine;

/// The four standard SQL isolation levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl Default for IsolationLevel {
    fn default() -> Self {
        IsolationLevel::RepeatableRead
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Active,
    Committing,
    Committed,
    Aborting,
    Aborted,
}

/// A transaction handle bound to a session.
///
/// `ReadUncommitted`/`ReadCommitted` are served by re-opening the
/// inner MVCC snapshot on every statement (`statement_snapshot`),
/// since the underlying substrate's write path pins one version for
/// the whole transaction lifetime and has no narrower read handle;
/// `RepeatableRead` and `Serializable` reuse the one snapshot taken at
/// `begin`. See DESIGN.md for why this downgrades rather than rejects
/// the weaker levels on a read-write transaction.
pub struct Txn<E: Engine> {
    mvcc: MVCC<E>,
    inner: Transaction<E>,
    isolation: IsolationLevel,
    state: TxnState,
    deadline: Option<Instant>,
}

impl<E: Engine> Txn<E> {
    pub(crate) fn new(
        mvcc: MVCC<E>,
        inner: Transaction<E>,
        isolation: IsolationLevel,
        deadline: Option<Instant>,
    ) -> Self {
        Txn { mvcc, inner, isolation, state: TxnState::Active, deadline }
    }

    pub fn isolation(&self) -> IsolationLevel {
        self.isolation
    }

    pub fn state(&self) -> TxnState {
        self.state
    }

    pub fn read_only(&self) -> bool {
        self.inner.read_only()
    }

    pub fn version(&self) -> crate::mvcc::Version {
        self.inner.version()
    }

    /// Persistable handle for resuming this transaction later (e.g.
    /// across a session that got detached and reattached).
    pub fn state_handle(&self) -> TransactionState {
        self.inner.state().clone()
    }

    fn check_active(&self) -> CResult<()> {
        match self.state {
            TxnState::Active => {}
            _ => return Err(Error::Internal(format!("transaction is not active ({:?})", self.state))),
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(Error::DeadlineExceeded("transaction deadline exceeded".into()));
            }
        }
        Ok(())
    }

    /// Returns the read handle a single statement should use: under
    /// `ReadUncommitted`/`ReadCommitted` this is a fresh snapshot as of
    /// now (so the statement sees the latest commits), under
    /// `RepeatableRead`/`Serializable` it's the transaction's own
    /// pinned snapshot.
    pub fn statement_snapshot(&self) -> CResult<Transaction<E>> {
        self.check_active()?;
        match self.isolation {
            IsolationLevel::ReadUncommitted | IsolationLevel::ReadCommitted if self.inner.read_only() => {
                self.mvcc.begin_read_only()
            }
            _ => Transaction::resume(self.engine_handle(), self.inner.state().clone()),
        }
    }

    fn engine_handle(&self) -> std::sync::Arc<std::sync::Mutex<E>> {
        // Transaction doesn't expose its engine handle directly; resuming
        // from the same state against the manager's engine is equivalent
        // and keeps the handle private to the mvcc module.
        self.mvcc.engine_handle()
    }

    /// Read access for the current statement under this transaction.
    pub fn get(&self, key: &[u8]) -> CResult<Option<Vec<u8>>> {
        self.check_active()?;
        self.inner.get(key)
    }

    pub fn set(&self, key: &[u8], value: Vec<u8>) -> CResult<()> {
        self.check_active()?;
        if self.inner.read_only() {
            return Err(Error::ReadOnly);
        }
        self.inner.set(key, value)
    }

    pub fn delete(&self, key: &[u8]) -> CResult<()> {
        self.check_active()?;
        if self.inner.read_only() {
            return Err(Error::ReadOnly);
        }
        self.inner.delete(key)
    }

    pub fn scan(
        &self,
        range: (std::ops::Bound<Vec<u8>>, std::ops::Bound<Vec<u8>>),
    ) -> CResult<crate::mvcc::scan::Scan<E>> {
        self.check_active()?;
        self.inner.scan(range)
    }

    pub fn scan_prefix(&self, prefix: &[u8]) -> CResult<crate::mvcc::scan::Scan<E>> {
        self.check_active()?;
        self.inner.scan_prefix(prefix)
    }

    /// Commits the transaction. On a KV write-write conflict the
    /// transaction ends up `Aborted` and the (retryable) conflict is
    /// returned to the caller.
    pub fn commit(mut self) -> CResult<()> {
        self.check_active()?;
        self.state = TxnState::Committing;
        match self.inner.commit() {
            Ok(()) => {
                self.state = TxnState::Committed;
                Ok(())
            }
            Err(err) => {
                self.state = TxnState::Aborted;
                Err(err)
            }
        }
    }

    pub fn rollback(mut self) -> CResult<()> {
        self.state = TxnState::Aborting;
        self.inner.rollback()?;
        self.state = TxnState::Aborted;
        Ok(())
    }
}

/// Opens transactions against a single MVCC-backed engine and maps SQL
/// isolation levels onto it.
pub struct TxnManager<E: Engine> {
    mvcc: MVCC<E>,
}

impl<E: Engine> TxnManager<E> {
    pub fn new(engine: E) -> Self {
        TxnManager { mvcc: MVCC::new(engine) }
    }

    /// Opens a new transaction. `deadline` is relative to now; `None`
    /// means no statement/connection deadline applies.
    pub fn begin(
        &self,
        read_only: bool,
        isolation: IsolationLevel,
        deadline: Option<Duration>,
    ) -> CResult<Txn<E>> {
        if isolation == IsolationLevel::Serializable {
            return Err(Error::NotSupported(
                "the storage substrate provides snapshot isolation with optimistic \
                 write-write conflict detection, not true serializability"
                    .into(),
            ));
        }
        let inner = if read_only { self.mvcc.begin_read_only()? } else { self.mvcc.begin()? };
        let deadline = deadline.map(|d| Instant::now() + d);
        Ok(Txn::new(self.mvcc.clone(), inner, isolation, deadline))
    }

    /// Resumes a previously detached transaction (e.g. a session that
    /// was parked between statements).
    pub fn resume(
        &self,
        state: TransactionState,
        isolation: IsolationLevel,
        deadline: Option<Duration>,
    ) -> CResult<Txn<E>> {
        let inner = self.mvcc.resume(state)?;
        let deadline = deadline.map(|d| Instant::now() + d);
        Ok(Txn::new(self.mvcc.clone(), inner, isolation, deadline))
    }

    pub fn status(&self) -> CResult<crate::mvcc::mvcc::Status> {
        self.mvcc.status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::Memory;

    #[test]
    fn begin_commit_roundtrip() -> CResult<()> {
        let mgr = TxnManager::new(Memory::new());
        let txn = mgr.begin(false, IsolationLevel::RepeatableRead, None)?;
        txn.set(b"a", b"1".to_vec())?;
        txn.commit()?;

        let txn = mgr.begin(true, IsolationLevel::RepeatableRead, None)?;
        assert_eq!(txn.get(b"a")?, Some(b"1".to_vec()));
        txn.commit()
    }

    #[test]
    fn serializable_is_rejected() {
        let mgr = TxnManager::new(Memory::new());
        match mgr.begin(false, IsolationLevel::Serializable, None) {
            Err(Error::NotSupported(_)) => {}
            other => panic!("expected NotSupported, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn deadline_exceeded_surfaces_on_next_operation() -> CResult<()> {
        let mgr = TxnManager::new(Memory::new());
        let txn = mgr.begin(false, IsolationLevel::RepeatableRead, Some(Duration::from_millis(0)))?;
        std::thread::sleep(Duration::from_millis(5));
        match txn.set(b"a", b"1".to_vec()) {
            Err(Error::DeadlineExceeded(_)) => Ok(()),
            other => panic!("expected DeadlineExceeded, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn rollback_discards_writes() -> CResult<()> {
        let mgr = TxnManager::new(Memory::new());
        let txn = mgr.begin(false, IsolationLevel::RepeatableRead, None)?;
        txn.set(b"a", b"1".to_vec())?;
        txn.rollback()?;

        let txn = mgr.begin(true, IsolationLevel::RepeatableRead, None)?;
        assert_eq!(txn.get(b"a")?, None);
        txn.commit()
    }
}
