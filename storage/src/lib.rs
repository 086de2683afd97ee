#![allow(non_camel_case_types)]

//! `guocedb-storage` is the CORE of guocedb: a KV-backed relational
//! storage engine. It owns a pluggable append-only `Engine` (keys and
//! values are arbitrary byte strings, stored in lexicographical key
//! order), an MVCC transaction layer over it, a catalog of
//! databases/tables/indexes, and the row/index stores and relational
//! engine facade built on top. It knows nothing about SQL text or the
//! MySQL wire protocol; `guocedb-server` is the layer that talks to a
//! client and calls into this crate through `engine::StorageEngine`.
//!
//! ## Getting started
//!
//! ```
//! use guocedb_storage::error::Error;
//! use guocedb_storage::storage::engine::Engine;
//! use guocedb_storage::storage::memory::Memory;
//!
//! fn run() -> Result<(), Error> {
//!     let mut engine = Memory::new();
//!     engine.set(b"a", vec![0x01])?;
//!     engine.set(b"b", vec![0x02])?;
//!     engine.delete(b"a")?;
//!
//!     assert_eq!(
//!         vec![(b"b".to_vec(), vec![0x02])],
//!         engine.scan(..).collect::<Result<Vec<_>, Error>>()?,
//!     );
//!     Ok(())
//! }
//!
//! run().unwrap();
//! ```

pub mod error;
pub mod value;
pub mod storage;
pub mod codec;
pub mod mvcc;
pub mod txn;
pub mod catalog;
pub mod row;
pub mod index;
pub mod engine;

#[cfg(test)]
mod test {
    use crate::error::Error;
    use crate::storage::engine::Engine;
    use crate::storage::log_cask::LogCask;

    #[test]
    fn run() -> Result<(), Error> {
        let storage_path = "";
        let path = tempdir::TempDir::new("demo")?.path().join("whosdb");

        let mut engine = LogCask::new(path)?;
        engine.set(b"b", vec![0x01])?;
        engine.set(b"b", vec![0x02])?;

        engine.set(b"e", vec![0x05])?;
        engine.delete(b"e")?;

        engine.set(b"c", vec![0x00])?;
        engine.delete(b"c")?;
        engine.set(b"c", vec![0x03])?;

        engine.set(b"", vec![])?;

        engine.set(b"a", vec![0x01])?;

        engine.delete(b"f")?;

        engine.delete(b"d")?;
        engine.set(b"d", vec![0x04])?;

        // Make sure the scan yields the expected results.
        assert_eq!(
            vec![
                (b"".to_vec(), vec![]),
                (b"a".to_vec(), vec![0x01]),
                (b"b".to_vec(), vec![0x02]),
                (b"c".to_vec(), vec![0x03]),
                (b"d".to_vec(), vec![0x04]),
            ],
            engine.scan(..).collect::<Result<Vec<_>,Error>> ()?,
        );

        let rs = engine.flush();

        Ok(())
    }
}

