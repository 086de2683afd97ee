//! MVCC-aware range/prefix scans over the raw engine.
//!
//! The inner engine scan is collected eagerly while the engine mutex is
//! held (the underlying `Engine::scan` only ever walks an in-memory
//! index or log, never the network, so this is cheap) and reduced to
//! the latest visible version of each key; the engine-level scan is
//! key-major then version-minor, so all versions of one key are
//! contiguous and the last one seen in forward order is the newest.
//! The resulting `(key, value)` pairs support both forward and
//! backward iteration, matching the row store's `scan` direction option.

use std::collections::Bound;
use std::sync::{Arc, Mutex};

use crate::error::{CResult, Error};
use crate::mvcc::mvcc::Key;
use crate::mvcc::transaction::TransactionState;
use crate::storage::engine::Engine;

pub struct Scan<E: Engine> {
    inner: std::vec::IntoIter<(Vec<u8>, Vec<u8>)>,
    _marker: std::marker::PhantomData<E>,
}

impl<E: Engine> Scan<E> {
    pub(crate) fn new(
        engine: Arc<Mutex<E>>,
        txn: TransactionState,
        from: Bound<Vec<u8>>,
        to: Bound<Vec<u8>>,
    ) -> CResult<Self> {
        let mut session = engine.lock().map_err(|_| Error::Internal("engine mutex poisoned".into()))?;
        let raw = session.scan((from, to)).collect::<CResult<Vec<_>>>()?;
        drop(session);

        let mut result: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
        let mut current: Option<(Vec<u8>, Option<Vec<u8>>)> = None;
        for (key, value) in raw {
            let (user_key, version) = match Key::decode(&key)? {
                Key::Version(k, v) => (k.into_owned(), v),
                k => return Err(Error::Internal(format!("expected Version key, got {:?}", k))),
            };
            if !txn.is_visible(version) {
                continue;
            }
            let decoded: Option<Vec<u8>> = bincode::deserialize(&value)?;
            match &mut current {
                Some((ck, cv)) if *ck == user_key => *cv = decoded,
                _ => {
                    if let Some((k, Some(v))) = current.take() {
                        result.push((k, v));
                    }
                    current = Some((user_key, decoded));
                }
            }
        }
        if let Some((k, Some(v))) = current {
            result.push((k, v));
        }

        Ok(Self { inner: result.into_iter(), _marker: std::marker::PhantomData })
    }
}

impl<E: Engine> Iterator for Scan<E> {
    type Item = CResult<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(Ok)
    }
}

impl<E: Engine> DoubleEndedIterator for Scan<E> {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.inner.next_back().map(Ok)
    }
}
