//! Snapshot-isolation MVCC layer over a raw [`crate::storage::engine::Engine`]:
//! the underlying KV substrate provides snapshot-isolation transactions
//! with optimistic concurrency. `storage::txn` builds the
//! transaction-manager state machine and isolation-level mapping on top
//! of the primitives this module provides.

pub mod mvcc;
pub mod scan;
pub mod transaction;
mod transaction_test;

/// An MVCC version represents a logical timestamp. The latest version is incremented
/// when beginning each read-write transaction.
pub type Version = u64;
