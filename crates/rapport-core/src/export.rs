//! # Canonical Export Module
//!
//! `redb` files are not bit-identical across runs, so verification goes
//! through a canonical export: every record sorted by id and serialized as
//! one `postcard` stream. The export is also the on-disk format of the
//! `file` backend.
//!
//! ```text
//! [header_len: u32 LE] [CanonicalHeader (postcard)] [CanonicalLedger (postcard)]
//! ```

use crate::ledger::{ChildRecord, LedgerChange, LedgerStore, MemoryLedger};
use crate::progression::{ProgressionHistory, check_invariants, rederive};
use crate::{
    CommunicationPattern, HealthSnapshot, Interaction, Milestone, Progression, RapportError,
    TrustActivity,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// CANONICAL FORMAT
// =============================================================================

/// Magic bytes for canonical export format.
pub const CANONICAL_MAGIC: [u8; 4] = *b"RPEX"; // Rapport Export

/// Current canonical format version.
pub const CANONICAL_VERSION: u8 = 1;

/// Maximum allowed record count in canonical imports.
///
/// Checked against the header before the body is decoded.
pub const MAX_IMPORT_RECORD_COUNT: u64 = 10_000_000;

/// Header for canonical export files.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalHeader {
    /// Magic bytes to identify the format.
    pub magic: [u8; 4],

    /// Format version for compatibility.
    pub version: u8,

    /// Number of progressions in the export.
    pub progression_count: u64,

    /// Number of child records (all kinds) in the export.
    pub record_count: u64,

    /// Checksum of the data section.
    pub checksum: u64,
}

impl CanonicalHeader {
    /// Create a new header with the given counts.
    #[must_use]
    pub fn new(progression_count: u64, record_count: u64, checksum: u64) -> Self {
        Self {
            magic: CANONICAL_MAGIC,
            version: CANONICAL_VERSION,
            progression_count,
            record_count,
            checksum,
        }
    }

    /// Validate the header.
    ///
    /// Error messages stay generic and do not echo the offending bytes.
    pub fn validate(&self) -> Result<(), RapportError> {
        if self.magic != CANONICAL_MAGIC {
            return Err(RapportError::SerializationError(
                "Invalid file format".to_string(),
            ));
        }
        if self.version != CANONICAL_VERSION {
            return Err(RapportError::SerializationError(
                "Unsupported file version".to_string(),
            ));
        }
        let total = self.progression_count.saturating_add(self.record_count);
        if total > MAX_IMPORT_RECORD_COUNT {
            return Err(RapportError::SerializationError(format!(
                "Record count {total} exceeds maximum allowed {MAX_IMPORT_RECORD_COUNT}"
            )));
        }
        Ok(())
    }
}

// =============================================================================
// CANONICAL LEDGER (Sorted, Deterministic)
// =============================================================================

/// A whole ledger in canonical order.
///
/// Progressions are sorted by id; child lists by `(progression, id)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalLedger {
    pub progressions: Vec<Progression>,
    pub milestones: Vec<Milestone>,
    pub trust_activities: Vec<TrustActivity>,
    pub interactions: Vec<Interaction>,
    pub patterns: Vec<CommunicationPattern>,
    pub snapshots: Vec<HealthSnapshot>,
    /// Id counter, so ids of deleted records are never reused after import.
    pub next_record_id: u64,
}

impl CanonicalLedger {
    /// Collect a canonical snapshot from any store.
    pub fn from_store<S>(store: &S) -> Result<Self, RapportError>
    where
        S: LedgerStore + ?Sized,
    {
        let mut canonical = Self {
            next_record_id: store.next_record_id()?,
            ..Self::default()
        };
        for progression in store.progressions()? {
            let history = store.history(progression.id)?;
            canonical.milestones.extend(history.milestones);
            canonical.trust_activities.extend(history.trust_activities);
            canonical.interactions.extend(history.interactions);
            canonical.patterns.extend(history.patterns);
            canonical
                .snapshots
                .extend(store.health_snapshots(progression.id)?);
            canonical.progressions.push(progression);
        }
        canonical.progressions.sort_by_key(|p| p.id);
        Ok(canonical)
    }

    /// Number of child records.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.milestones.len()
            + self.trust_activities.len()
            + self.interactions.len()
            + self.patterns.len()
            + self.snapshots.len()
    }

    /// Compute a deterministic checksum of the data.
    ///
    /// Rotate-xor-multiply over the postcard bytes: order sensitive, integer
    /// only.
    ///
    /// This is **NOT** a cryptographic hash. It detects accidental
    /// corruption; use the BLAKE3 hash (`crypto-hash` feature) to detect
    /// tampering.
    pub fn checksum(&self) -> Result<u64, RapportError> {
        let bytes = postcard::to_allocvec(self)
            .map_err(|e| RapportError::SerializationError(format!("Data: {}", e)))?;
        Ok(bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash: u64, byte| {
            (hash.rotate_left(5) ^ u64::from(*byte)).wrapping_mul(0x0100_0000_01b3)
        }))
    }

    /// Group child records by progression, rejecting orphans.
    fn histories(
        &self,
    ) -> Result<BTreeMap<u64, (ProgressionHistory, Vec<HealthSnapshot>)>, RapportError> {
        let mut grouped: BTreeMap<u64, (ProgressionHistory, Vec<HealthSnapshot>)> = self
            .progressions
            .iter()
            .map(|p| (p.id.0, Default::default()))
            .collect();

        let orphan = |kind: &str, id: u64| {
            RapportError::SerializationError(format!("Orphan {kind} record {id}"))
        };

        for r in &self.milestones {
            let entry = grouped
                .get_mut(&r.progression.0)
                .ok_or_else(|| orphan("milestone", r.id.0))?;
            entry.0.milestones.push(r.clone());
        }
        for r in &self.trust_activities {
            let entry = grouped
                .get_mut(&r.progression.0)
                .ok_or_else(|| orphan("trust activity", r.id.0))?;
            entry.0.trust_activities.push(r.clone());
        }
        for r in &self.interactions {
            let entry = grouped
                .get_mut(&r.progression.0)
                .ok_or_else(|| orphan("interaction", r.id.0))?;
            entry.0.interactions.push(r.clone());
        }
        for r in &self.patterns {
            let entry = grouped
                .get_mut(&r.progression.0)
                .ok_or_else(|| orphan("pattern", r.id.0))?;
            entry.0.patterns.push(r.clone());
        }
        for r in &self.snapshots {
            let entry = grouped
                .get_mut(&r.progression.0)
                .ok_or_else(|| orphan("snapshot", r.id.0))?;
            entry.1.push(r.clone());
        }
        Ok(grouped)
    }

    /// Reject duplicate progression ids, organizations and record ids.
    ///
    /// Progressions and child records share one id counter, so every id in
    /// the ledger is distinct.
    fn check_identities(&self) -> Result<(), RapportError> {
        let mut organizations = BTreeMap::new();
        let mut ids = BTreeSet::new();

        for progression in &self.progressions {
            if let Some(owner) = organizations.insert(progression.organization, progression.id) {
                return Err(RapportError::InvariantViolation(format!(
                    "organization {} tracked by progressions {} and {}",
                    progression.organization, owner, progression.id
                )));
            }
            if !ids.insert(progression.id.0) {
                return Err(RapportError::InvariantViolation(format!(
                    "progression id {} appears twice",
                    progression.id
                )));
            }
        }

        let record_ids = self
            .milestones
            .iter()
            .map(|r| r.id.0)
            .chain(self.trust_activities.iter().map(|r| r.id.0))
            .chain(self.interactions.iter().map(|r| r.id.0))
            .chain(self.patterns.iter().map(|r| r.id.0))
            .chain(self.snapshots.iter().map(|r| r.id.0));
        for id in record_ids {
            if !ids.insert(id) {
                return Err(RapportError::InvariantViolation(format!(
                    "record id {id} appears twice"
                )));
            }
        }
        Ok(())
    }

    /// Write this ledger into a store as a single transaction.
    ///
    /// Everything is checked before the write: ids and organizations must be
    /// unique, and each progression must equal the fold of its history.
    /// On error the store is left untouched.
    pub fn restore_into<S>(&self, store: &mut S) -> Result<(), RapportError>
    where
        S: LedgerStore + ?Sized,
    {
        self.check_identities()?;
        let mut grouped = self.histories()?;
        for progression in &self.progressions {
            let Some((history, _)) = grouped.get(&progression.id.0) else {
                continue;
            };
            check_invariants(progression, history)?;
            if rederive(progression, history, progression.last_progression_update) != *progression
            {
                return Err(RapportError::InvariantViolation(format!(
                    "progression {} does not match the fold of its history",
                    progression.id
                )));
            }
        }

        let mut changes = Vec::with_capacity(self.progressions.len() + 1);
        for progression in &self.progressions {
            let (history, snapshots) = grouped.remove(&progression.id.0).unwrap_or_default();
            let mut appended = Vec::with_capacity(history.len() + snapshots.len());
            appended.extend(history.milestones.into_iter().map(ChildRecord::Milestone));
            appended.extend(
                history
                    .trust_activities
                    .into_iter()
                    .map(ChildRecord::TrustActivity),
            );
            appended.extend(history.interactions.into_iter().map(ChildRecord::Interaction));
            appended.extend(history.patterns.into_iter().map(ChildRecord::Pattern));
            appended.extend(snapshots.into_iter().map(ChildRecord::Snapshot));

            changes.push(LedgerChange::Write {
                progression: progression.clone(),
                appended,
            });
        }
        changes.push(LedgerChange::ReserveIds(self.next_record_id));
        store.commit(LedgerChange::Batch(changes))?;

        tracing::info!(
            progressions = self.progressions.len(),
            records = self.record_count(),
            "restored canonical ledger"
        );
        Ok(())
    }

    /// Build an in-memory ledger from this export.
    pub fn to_memory(&self) -> Result<MemoryLedger, RapportError> {
        let mut ledger = MemoryLedger::new();
        self.restore_into(&mut ledger)?;
        Ok(ledger)
    }
}

// =============================================================================
// EXPORT FUNCTIONS
// =============================================================================

/// Encode a canonical ledger with its header.
pub fn encode_canonical(canonical: &CanonicalLedger) -> Result<Vec<u8>, RapportError> {
    let header = CanonicalHeader::new(
        canonical.progressions.len() as u64,
        canonical.record_count() as u64,
        canonical.checksum()?,
    );

    let header_bytes = postcard::to_allocvec(&header)
        .map_err(|e| RapportError::SerializationError(format!("Header: {}", e)))?;
    let data_bytes = postcard::to_allocvec(canonical)
        .map_err(|e| RapportError::SerializationError(format!("Data: {}", e)))?;

    // Combine: [header_len: u32] [header] [data]
    let mut result = Vec::with_capacity(4 + header_bytes.len() + data_bytes.len());
    result.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
    result.extend_from_slice(&header_bytes);
    result.extend_from_slice(&data_bytes);
    Ok(result)
}

/// Export any store to canonical postcard format.
pub fn export_canonical<S>(store: &S) -> Result<Vec<u8>, RapportError>
where
    S: LedgerStore + ?Sized,
{
    encode_canonical(&CanonicalLedger::from_store(store)?)
}

/// Decode and verify canonical postcard data.
///
/// # Errors
///
/// Returns `RapportError::SerializationError` if the data is truncated,
/// the header is invalid, or the checksum or counts do not match.
pub fn import_canonical(data: &[u8]) -> Result<CanonicalLedger, RapportError> {
    let Some((len_bytes, rest)) = data.split_first_chunk::<4>() else {
        return Err(RapportError::SerializationError(
            "Data too short".to_string(),
        ));
    };
    let header_len = u32::from_le_bytes(*len_bytes) as usize;
    if rest.len() < header_len {
        return Err(RapportError::SerializationError(
            "Data too short for header".to_string(),
        ));
    }
    let (header_bytes, body) = rest.split_at(header_len);

    let header: CanonicalHeader = postcard::from_bytes(header_bytes)
        .map_err(|e| RapportError::SerializationError(format!("Header: {}", e)))?;
    header.validate()?;

    let canonical: CanonicalLedger = postcard::from_bytes(body)
        .map_err(|e| RapportError::SerializationError(format!("Data: {}", e)))?;

    let computed = canonical.checksum()?;
    if computed != header.checksum {
        return Err(RapportError::SerializationError(format!(
            "Checksum mismatch: expected {}, got {}",
            header.checksum, computed
        )));
    }
    if canonical.progressions.len() as u64 != header.progression_count {
        return Err(RapportError::SerializationError(
            "Progression count mismatch".to_string(),
        ));
    }
    if canonical.record_count() as u64 != header.record_count {
        return Err(RapportError::SerializationError(
            "Record count mismatch".to_string(),
        ));
    }

    Ok(canonical)
}

/// Check that a store holds exactly what a canonical export holds.
pub fn verify_canonical<S>(store: &S, canonical_data: &[u8]) -> Result<bool, RapportError>
where
    S: LedgerStore + ?Sized,
{
    let imported = import_canonical(canonical_data)?;
    Ok(CanonicalLedger::from_store(store)? == imported)
}

/// Compute the canonical checksum of a store.
pub fn canonical_checksum<S>(store: &S) -> Result<u64, RapportError>
where
    S: LedgerStore + ?Sized,
{
    CanonicalLedger::from_store(store)?.checksum()
}

// =============================================================================
// CRYPTOGRAPHIC HASH SUPPORT
// =============================================================================

/// Compute a BLAKE3 hash of a store's canonical export, as 64 hex characters.
///
/// Only available with the `crypto-hash` feature.
#[cfg(feature = "crypto-hash")]
pub fn canonical_crypto_hash<S>(store: &S) -> Result<String, RapportError>
where
    S: LedgerStore + ?Sized,
{
    Ok(compute_blake3_hash(&export_canonical(store)?))
}

/// Compute a BLAKE3 hash of raw bytes.
#[cfg(feature = "crypto-hash")]
#[must_use]
pub fn compute_blake3_hash(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

// =============================================================================
// TESTS
// =============================================================================
