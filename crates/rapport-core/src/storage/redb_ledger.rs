//! # redb-backed Ledger Storage
//!
//! A disk-backed ledger using the redb embedded database, providing:
//! - ACID transactions (one write transaction per command)
//! - Crash safety (copy-on-write B-trees)
//! - MVCC (concurrent readers, single writer)
//!
//! ## Layout
//!
//! Child tables are keyed by `(progression_id, record_id)` so one progression's
//! history is a single ordered range scan, and a cascade delete is a range
//! collect followed by removes.

use crate::ledger::{ChildRecord, FIRST_RECORD_ID, LedgerChange, LedgerStore};
use crate::progression::ProgressionHistory;
use crate::{HealthSnapshot, OrganizationId, Progression, ProgressionId, RapportError};
use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, ReadableTableMetadata,
    TableDefinition, WriteTransaction,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

type ChildTable = TableDefinition<'static, (u64, u64), &'static [u8]>;

/// Table for progressions: ProgressionId(u64) -> serialized Progression bytes
const PROGRESSIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("progressions");

/// Child tables: (progression_id, record_id) -> serialized record bytes
const MILESTONES: ChildTable = TableDefinition::new("milestones");
const TRUST_ACTIVITIES: ChildTable = TableDefinition::new("trust_activities");
const INTERACTIONS: ChildTable = TableDefinition::new("interactions");
const PATTERNS: ChildTable = TableDefinition::new("patterns");
const SNAPSHOTS: ChildTable = TableDefinition::new("snapshots");

const CHILD_TABLES: [ChildTable; 5] =
    [MILESTONES, TRUST_ACTIVITIES, INTERACTIONS, PATTERNS, SNAPSHOTS];

/// Table for the organization index: OrganizationId(u64) -> ProgressionId(u64)
const ORGANIZATION_INDEX: TableDefinition<u64, u64> = TableDefinition::new("organization_index");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const NEXT_RECORD_ID: &str = "next_record_id";

fn io_err(e: impl std::fmt::Display) -> RapportError {
    RapportError::IoError(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, RapportError> {
    postcard::to_allocvec(value).map_err(|e| RapportError::SerializationError(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, RapportError> {
    postcard::from_bytes(bytes).map_err(|e| RapportError::SerializationError(e.to_string()))
}

/// A disk-backed ledger store using redb.
pub struct RedbLedger {
    /// The redb database handle.
    db: Database,
    /// Cached copy of the persisted id counter.
    next_record_id: u64,
}

impl std::fmt::Debug for RedbLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbLedger")
            .field("next_record_id", &self.next_record_id)
            .finish_non_exhaustive()
    }
}

impl RedbLedger {
    /// Open or create a ledger database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, RapportError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io_err)?;
            let _ = write_txn.open_table(PROGRESSIONS).map_err(io_err)?;
            for table in CHILD_TABLES {
                let _ = write_txn.open_table(table).map_err(io_err)?;
            }
            let _ = write_txn.open_table(ORGANIZATION_INDEX).map_err(io_err)?;
            let _ = write_txn.open_table(METADATA).map_err(io_err)?;
            write_txn.commit().map_err(io_err)?;
        }

        let next_record_id = {
            let read_txn = db.begin_read().map_err(io_err)?;
            let table = read_txn.open_table(METADATA).map_err(io_err)?;
            table
                .get(NEXT_RECORD_ID)
                .map_err(io_err)?
                .map(|v| v.value())
                .unwrap_or(FIRST_RECORD_ID)
        };

        tracing::debug!(next_record_id, "opened redb ledger");
        Ok(Self { db, next_record_id })
    }

    fn read_children<T: DeserializeOwned>(
        txn: &ReadTransaction,
        table: ChildTable,
        id: ProgressionId,
    ) -> Result<Vec<T>, RapportError> {
        let table = txn.open_table(table).map_err(io_err)?;
        let mut records = Vec::new();
        for entry in table
            .range((id.0, 0u64)..=(id.0, u64::MAX))
            .map_err(io_err)?
        {
            let (_, value) = entry.map_err(io_err)?;
            records.push(decode(value.value())?);
        }
        Ok(records)
    }

    fn write(
        txn: &WriteTransaction,
        progression: &Progression,
        appended: &[ChildRecord],
    ) -> Result<(), RapportError> {
        {
            let mut index = txn.open_table(ORGANIZATION_INDEX).map_err(io_err)?;
            let owner = index
                .get(progression.organization.0)
                .map_err(io_err)?
                .map(|v| v.value());
            match owner {
                Some(owner) if owner != progression.id.0 => {
                    return Err(RapportError::InvariantViolation(format!(
                        "organization {} already tracked by progression {owner}",
                        progression.organization
                    )));
                }
                Some(_) => {}
                None => {
                    index
                        .insert(progression.organization.0, progression.id.0)
                        .map_err(io_err)?;
                }
            }
        }

        let bytes = encode(progression)?;
        txn.open_table(PROGRESSIONS)
            .map_err(io_err)?
            .insert(progression.id.0, bytes.as_slice())
            .map_err(io_err)?;

        for record in appended {
            let (table, bytes) = match record {
                ChildRecord::Milestone(r) => (MILESTONES, encode(r)?),
                ChildRecord::TrustActivity(r) => (TRUST_ACTIVITIES, encode(r)?),
                ChildRecord::Interaction(r) => (INTERACTIONS, encode(r)?),
                ChildRecord::Pattern(r) => (PATTERNS, encode(r)?),
                ChildRecord::Snapshot(r) => (SNAPSHOTS, encode(r)?),
            };
            txn.open_table(table)
                .map_err(io_err)?
                .insert((progression.id.0, record.id()), bytes.as_slice())
                .map_err(io_err)?;
        }
        Ok(())
    }

    /// Apply one change inside an open write transaction.
    fn apply(
        txn: &WriteTransaction,
        change: &LedgerChange,
        next_id: &mut u64,
    ) -> Result<(), RapportError> {
        match change {
            LedgerChange::Write {
                progression,
                appended,
            } => Self::write(txn, progression, appended),
            LedgerChange::Delete(id) => Self::delete(txn, *id),
            LedgerChange::ReserveIds(next) => {
                *next_id = (*next_id).max(*next);
                Ok(())
            }
            LedgerChange::Batch(changes) => changes
                .iter()
                .try_for_each(|change| Self::apply(txn, change, next_id)),
        }
    }

    fn delete(txn: &WriteTransaction, id: ProgressionId) -> Result<(), RapportError> {
        let removed = txn
            .open_table(PROGRESSIONS)
            .map_err(io_err)?
            .remove(id.0)
            .map_err(io_err)?
            .map(|v| decode::<Progression>(v.value()))
            .transpose()?
            .ok_or(RapportError::ProgressionNotFound(id))?;

        txn.open_table(ORGANIZATION_INDEX)
            .map_err(io_err)?
            .remove(removed.organization.0)
            .map_err(io_err)?;

        for definition in CHILD_TABLES {
            let mut table = txn.open_table(definition).map_err(io_err)?;
            // Collect first: the range borrows the table.
            let mut keys = Vec::new();
            for entry in table
                .range((id.0, 0u64)..=(id.0, u64::MAX))
                .map_err(io_err)?
            {
                let (key, _) = entry.map_err(io_err)?;
                keys.push(key.value());
            }
            for key in keys {
                table.remove(key).map_err(io_err)?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// LEDGERSTORE TRAIT IMPLEMENTATION
// =============================================================================

impl LedgerStore for RedbLedger {
    fn progression(&self, id: ProgressionId) -> Result<Option<Progression>, RapportError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(PROGRESSIONS).map_err(io_err)?;
        table
            .get(id.0)
            .map_err(io_err)?
            .map(|v| decode(v.value()))
            .transpose()
    }

    fn progression_for(
        &self,
        organization: OrganizationId,
    ) -> Result<Option<Progression>, RapportError> {
        let id = {
            let read_txn = self.db.begin_read().map_err(io_err)?;
            let table = read_txn.open_table(ORGANIZATION_INDEX).map_err(io_err)?;
            table
                .get(organization.0)
                .map_err(io_err)?
                .map(|v| ProgressionId(v.value()))
        };
        match id {
            Some(id) => self.progression(id),
            None => Ok(None),
        }
    }

    fn progressions(&self) -> Result<Vec<Progression>, RapportError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(PROGRESSIONS).map_err(io_err)?;
        let mut progressions = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (_, value) = entry.map_err(io_err)?;
            progressions.push(decode(value.value())?);
        }
        Ok(progressions)
    }

    fn history(&self, id: ProgressionId) -> Result<ProgressionHistory, RapportError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        Ok(ProgressionHistory {
            milestones: Self::read_children(&read_txn, MILESTONES, id)?,
            trust_activities: Self::read_children(&read_txn, TRUST_ACTIVITIES, id)?,
            interactions: Self::read_children(&read_txn, INTERACTIONS, id)?,
            patterns: Self::read_children(&read_txn, PATTERNS, id)?,
        })
    }

    fn health_snapshots(&self, id: ProgressionId) -> Result<Vec<HealthSnapshot>, RapportError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        Self::read_children(&read_txn, SNAPSHOTS, id)
    }

    fn next_record_id(&self) -> Result<u64, RapportError> {
        Ok(self.next_record_id)
    }

    fn progression_count(&self) -> Result<usize, RapportError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(PROGRESSIONS).map_err(io_err)?;
        Ok(table.len().map_err(io_err)? as usize)
    }

    fn commit(&mut self, change: LedgerChange) -> Result<(), RapportError> {
        change.check_ownership()?;
        let mut next_id = change
            .max_id()
            .map_or(self.next_record_id, |max| {
                self.next_record_id.max(max.saturating_add(1))
            });

        // Dropping the transaction on any error aborts it.
        let write_txn = self.db.begin_write().map_err(io_err)?;
        Self::apply(&write_txn, &change, &mut next_id)?;
        write_txn
            .open_table(METADATA)
            .map_err(io_err)?
            .insert(NEXT_RECORD_ID, next_id)
            .map_err(io_err)?;
        write_txn.commit().map_err(io_err)?;

        self.next_record_id = next_id;
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
