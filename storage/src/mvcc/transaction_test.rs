#[cfg(test)]
mod tx_test {
    use std::sync::{Arc, Mutex};

    use crate::error::{CResult, Error};
    use crate::mvcc::transaction::{Transaction, TransactionDef};
    use crate::storage::memory::Memory;

    fn engine() -> Arc<Mutex<Memory>> {
        Arc::new(Mutex::new(Memory::new()))
    }

    #[test]
    fn begin_allocates_increasing_versions() -> CResult<()> {
        let engine = engine();
        let t1 = Transaction::begin(engine.clone())?;
        assert_eq!(t1.version(), 1);
        t1.commit()?;

        let t2 = Transaction::begin(engine.clone())?;
        assert_eq!(t2.version(), 2);
        t2.commit()?;
        Ok(())
    }

    #[test]
    fn set_get_roundtrip() -> CResult<()> {
        let engine = engine();
        let txn = Transaction::begin(engine)?;
        txn.set(b"a", b"1".to_vec())?;
        assert_eq!(txn.get(b"a")?, Some(b"1".to_vec()));
        assert_eq!(txn.get(b"missing")?, None);
        txn.commit()
    }

    #[test]
    fn committed_writes_are_visible_to_later_transactions() -> CResult<()> {
        let engine = engine();
        let t1 = Transaction::begin(engine.clone())?;
        t1.set(b"a", b"1".to_vec())?;
        t1.commit()?;

        let t2 = Transaction::begin(engine)?;
        assert_eq!(t2.get(b"a")?, Some(b"1".to_vec()));
        t2.commit()
    }

    #[test]
    fn uncommitted_writes_are_invisible_to_concurrent_transactions() -> CResult<()> {
        let engine = engine();
        let t1 = Transaction::begin(engine.clone())?;
        let t2 = Transaction::begin(engine.clone())?;

        t1.set(b"a", b"1".to_vec())?;
        assert_eq!(t2.get(b"a")?, None);

        t1.commit()?;
        assert_eq!(t2.get(b"a")?, None, "t2's snapshot predates t1's commit");
        t2.commit()
    }

    #[test]
    fn rollback_undoes_writes() -> CResult<()> {
        let engine = engine();
        let t1 = Transaction::begin(engine.clone())?;
        t1.set(b"a", b"1".to_vec())?;
        t1.rollback()?;

        let t2 = Transaction::begin(engine)?;
        assert_eq!(t2.get(b"a")?, None);
        t2.commit()
    }

    #[test]
    fn delete_writes_a_tombstone() -> CResult<()> {
        let engine = engine();
        let t1 = Transaction::begin(engine.clone())?;
        t1.set(b"a", b"1".to_vec())?;
        t1.commit()?;

        let t2 = Transaction::begin(engine.clone())?;
        t2.delete(b"a")?;
        t2.commit()?;

        let t3 = Transaction::begin(engine)?;
        assert_eq!(t3.get(b"a")?, None);
        t3.commit()
    }

    #[test]
    fn concurrent_writes_to_same_key_conflict() -> CResult<()> {
        let engine = engine();
        let t1 = Transaction::begin(engine.clone())?;
        let t2 = Transaction::begin(engine)?;

        t1.set(b"a", b"1".to_vec())?;
        match t2.set(b"a", b"2".to_vec()) {
            Err(Error::Conflict(_)) => {}
            other => panic!("expected write-write conflict, got {:?}", other.map(|_| ())),
        }
        t1.commit()
    }

    #[test]
    fn read_only_transaction_rejects_writes() -> CResult<()> {
        let engine = engine();
        let txn = Transaction::begin_read_only(engine, None)?;
        assert!(txn.read_only());
        match txn.set(b"a", b"1".to_vec()) {
            Err(Error::ReadOnly) => Ok(()),
            other => panic!("expected ReadOnly, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn scan_prefix_returns_latest_visible_versions() -> CResult<()> {
        let engine = engine();
        let t1 = Transaction::begin(engine.clone())?;
        t1.set(b"key/a", b"1".to_vec())?;
        t1.set(b"key/b", b"2".to_vec())?;
        t1.set(b"other", b"x".to_vec())?;
        t1.commit()?;

        let t2 = Transaction::begin(engine.clone())?;
        t2.set(b"key/a", b"3".to_vec())?;
        t2.commit()?;

        let t3 = Transaction::begin(engine)?;
        let rows = t3.scan_prefix(b"key/")?.collect::<CResult<Vec<_>>>()?;
        assert_eq!(
            rows,
            vec![(b"key/a".to_vec(), b"3".to_vec()), (b"key/b".to_vec(), b"2".to_vec())],
        );
        t3.commit()
    }

    #[test]
    fn resume_reattaches_to_an_active_transaction() -> CResult<()> {
        let engine = engine();
        let t1 = Transaction::begin(engine.clone())?;
        t1.set(b"a", b"1".to_vec())?;
        let state = t1.state().clone();

        let resumed = Transaction::resume(engine, state)?;
        assert_eq!(resumed.get(b"a")?, Some(b"1".to_vec()));
        resumed.commit()
    }
}
