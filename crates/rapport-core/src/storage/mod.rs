//! # Storage Module
//!
//! Disk-backed ledger storage.

mod redb_ledger;

pub use redb_ledger::RedbLedger;
