//! # Session Module
//!
//! The engine's public entry point: one session owns one ledger store and
//! exposes every command and query.
//!
//! ## Storage Backends
//!
//! Session supports two storage backends:
//! - `InMemory`: Uses `MemoryLedger` (fast, volatile unless explicitly exported)
//! - `Persistent`: Uses `RedbLedger` for disk-backed ACID storage

use crate::commands::{
    Command, InteractionInput, MilestoneInput, Opened, Outcome, PatternInput, ProgressionNotes,
    Recorded, SnapshotInput, TrustActivityInput,
};
use crate::export::CanonicalLedger;
use crate::ledger::{LedgerStore, MemoryLedger};
use crate::progression::ProgressionHistory;
use crate::recorder::Recorder;
use crate::storage::RedbLedger;
use crate::system::{StageAssessor, StageProgress};
use crate::{
    CommunicationPattern, HealthSnapshot, Interaction, Milestone, OrganizationId, Progression,
    ProgressionId, RapportError, TrustActivity,
};
use chrono::{DateTime, Utc};
use std::path::Path;

/// Storage backend for a Session.
#[derive(Debug)]
pub enum StorageBackend {
    /// In-memory ledger (fast, volatile).
    InMemory(MemoryLedger),
    /// Disk-backed ledger using redb (ACID, persistent).
    Persistent(RedbLedger),
}

impl Default for StorageBackend {
    fn default() -> Self {
        Self::InMemory(MemoryLedger::new())
    }
}

// NOTE: StorageBackend does NOT implement Clone.
// RedbLedger (database handle) cannot be safely cloned.

/// A Session routes commands and queries to its storage backend.
#[derive(Debug, Default)]
pub struct Session {
    backend: StorageBackend,
}

impl Session {
    /// Create a new empty session with in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session with an existing in-memory ledger.
    #[must_use]
    pub fn with_ledger(ledger: MemoryLedger) -> Self {
        Self {
            backend: StorageBackend::InMemory(ledger),
        }
    }

    /// Create a session with persistent redb storage.
    ///
    /// Opens or creates a redb database at the given path.
    /// Every command is persisted before it returns.
    pub fn with_redb(path: impl AsRef<Path>) -> Result<Self, RapportError> {
        Ok(Self {
            backend: StorageBackend::Persistent(RedbLedger::open(path)?),
        })
    }

    /// Create an in-memory session from canonical export bytes.
    pub fn from_canonical(data: &[u8]) -> Result<Self, RapportError> {
        let ledger = crate::export::import_canonical(data)?.to_memory()?;
        Ok(Self::with_ledger(ledger))
    }

    /// Check if using persistent storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        matches!(self.backend, StorageBackend::Persistent(_))
    }

    /// Get a reference to the storage backend.
    #[must_use]
    pub fn backend(&self) -> &StorageBackend {
        &self.backend
    }

    /// Get an optional reference to the in-memory ledger.
    #[must_use]
    pub fn ledger_opt(&self) -> Option<&MemoryLedger> {
        match &self.backend {
            StorageBackend::InMemory(ledger) => Some(ledger),
            StorageBackend::Persistent(_) => None,
        }
    }

    /// Try to clone the session.
    ///
    /// Returns `None` for persistent backends (database handles cannot be
    /// safely cloned).
    #[must_use]
    pub fn try_clone(&self) -> Option<Self> {
        self.ledger_opt().cloned().map(Self::with_ledger)
    }

    fn store(&self) -> &dyn LedgerStore {
        match &self.backend {
            StorageBackend::InMemory(ledger) => ledger,
            StorageBackend::Persistent(redb) => redb,
        }
    }

    fn store_mut(&mut self) -> &mut dyn LedgerStore {
        match &mut self.backend {
            StorageBackend::InMemory(ledger) => ledger,
            StorageBackend::Persistent(redb) => redb,
        }
    }

    // =========================================================================
    // COMMANDS
    // =========================================================================

    /// Return the organization's progression, creating it if needed.
    pub fn open_progression(
        &mut self,
        organization: OrganizationId,
        at: DateTime<Utc>,
    ) -> Result<Opened, RapportError> {
        Recorder::open_progression(self.store_mut(), organization, at)
    }

    /// Record a one-time milestone.
    pub fn record_milestone(
        &mut self,
        id: ProgressionId,
        input: MilestoneInput,
        at: DateTime<Utc>,
    ) -> Result<Recorded<Milestone>, RapportError> {
        Recorder::record_milestone(self.store_mut(), id, input, at)
    }

    /// Record a trust activity.
    pub fn record_trust_activity(
        &mut self,
        id: ProgressionId,
        input: TrustActivityInput,
        at: DateTime<Utc>,
    ) -> Result<Recorded<TrustActivity>, RapportError> {
        Recorder::record_trust_activity(self.store_mut(), id, input, at)
    }

    /// Log an interaction, opening the organization's progression if needed.
    pub fn record_interaction(
        &mut self,
        input: InteractionInput,
        at: DateTime<Utc>,
    ) -> Result<Recorded<Interaction>, RapportError> {
        Recorder::record_interaction(self.store_mut(), input, at)
    }

    /// Record communication statistics for one period.
    pub fn record_communication_pattern(
        &mut self,
        id: ProgressionId,
        input: PatternInput,
        at: DateTime<Utc>,
    ) -> Result<Recorded<CommunicationPattern>, RapportError> {
        Recorder::record_communication_pattern(self.store_mut(), id, input, at)
    }

    /// Record a health snapshot.
    pub fn record_health_snapshot(
        &mut self,
        id: ProgressionId,
        input: SnapshotInput,
        at: DateTime<Utc>,
    ) -> Result<Recorded<HealthSnapshot>, RapportError> {
        Recorder::record_health_snapshot(self.store_mut(), id, input, at)
    }

    /// Update notes and the stored-only scores.
    pub fn annotate(
        &mut self,
        id: ProgressionId,
        notes: ProgressionNotes,
        at: DateTime<Utc>,
    ) -> Result<Progression, RapportError> {
        Recorder::annotate(self.store_mut(), id, notes, at)
    }

    /// Soft-deactivate a progression.
    pub fn deactivate(
        &mut self,
        id: ProgressionId,
        at: DateTime<Utc>,
    ) -> Result<Progression, RapportError> {
        Recorder::deactivate(self.store_mut(), id, at)
    }

    /// Delete a progression and all of its records.
    pub fn delete_progression(&mut self, id: ProgressionId) -> Result<(), RapportError> {
        Recorder::delete_progression(self.store_mut(), id)
    }

    /// Execute a tagged command.
    pub fn execute(&mut self, command: Command, at: DateTime<Utc>) -> Result<Outcome, RapportError> {
        let outcome = match command {
            Command::OpenProgression { organization_id } => {
                Outcome::Opened(self.open_progression(organization_id, at)?)
            }
            Command::RecordMilestone {
                progression_id,
                input,
            } => Outcome::Milestone(self.record_milestone(progression_id, input, at)?),
            Command::RecordTrustActivity {
                progression_id,
                input,
            } => Outcome::TrustActivity(self.record_trust_activity(progression_id, input, at)?),
            Command::RecordInteraction { input } => {
                Outcome::Interaction(self.record_interaction(input, at)?)
            }
            Command::RecordCommunicationPattern {
                progression_id,
                input,
            } => Outcome::Pattern(self.record_communication_pattern(progression_id, input, at)?),
            Command::RecordHealthSnapshot {
                progression_id,
                input,
            } => Outcome::Snapshot(self.record_health_snapshot(progression_id, input, at)?),
            Command::Annotate {
                progression_id,
                notes,
            } => Outcome::Updated {
                progression: self.annotate(progression_id, notes, at)?,
            },
            Command::Deactivate { progression_id } => Outcome::Updated {
                progression: self.deactivate(progression_id, at)?,
            },
            Command::DeleteProgression { progression_id } => {
                self.delete_progression(progression_id)?;
                Outcome::Deleted { progression_id }
            }
        };
        Ok(outcome)
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Get a progression by id.
    pub fn progression(&self, id: ProgressionId) -> Result<Progression, RapportError> {
        self.store()
            .progression(id)?
            .ok_or(RapportError::ProgressionNotFound(id))
    }

    /// Get the progression of an organization, if one exists.
    pub fn progression_for(
        &self,
        organization: OrganizationId,
    ) -> Result<Option<Progression>, RapportError> {
        self.store().progression_for(organization)
    }

    /// All progressions in id order.
    pub fn progressions(&self) -> Result<Vec<Progression>, RapportError> {
        self.store().progressions()
    }

    /// The child history of a progression.
    pub fn history(&self, id: ProgressionId) -> Result<ProgressionHistory, RapportError> {
        self.progression(id)?;
        self.store().history(id)
    }

    /// Health snapshots of a progression.
    pub fn health_snapshots(&self, id: ProgressionId) -> Result<Vec<HealthSnapshot>, RapportError> {
        self.progression(id)?;
        self.store().health_snapshots(id)
    }

    /// Progress toward the next stage.
    pub fn stage_progress(&self, id: ProgressionId) -> Result<StageProgress, RapportError> {
        Ok(StageAssessor::new().progress_to_next(&self.history(id)?))
    }

    /// Number of progressions.
    pub fn progression_count(&self) -> Result<usize, RapportError> {
        self.store().progression_count()
    }

    /// The id the next new record will receive.
    pub fn next_record_id(&self) -> Result<u64, RapportError> {
        self.store().next_record_id()
    }

    // =========================================================================
    // EXPORT SUPPORT
    // =========================================================================

    /// Build a canonical snapshot of the whole ledger.
    pub fn canonical_snapshot(&self) -> Result<CanonicalLedger, RapportError> {
        CanonicalLedger::from_store(self.store())
    }

    /// Export the whole ledger in canonical format.
    pub fn export_canonical(&self) -> Result<Vec<u8>, RapportError> {
        crate::export::export_canonical(self.store())
    }

    /// Checksum of the canonical export.
    pub fn canonical_checksum(&self) -> Result<u64, RapportError> {
        crate::export::canonical_checksum(self.store())
    }

    /// BLAKE3 hash of the canonical export.
    #[cfg(feature = "crypto-hash")]
    pub fn canonical_crypto_hash(&self) -> Result<String, RapportError> {
        crate::export::canonical_crypto_hash(self.store())
    }

    /// Load a canonical export into this session's store.
    ///
    /// The store must be empty.
    pub fn import_canonical(&mut self, data: &[u8]) -> Result<usize, RapportError> {
        if self.progression_count()? > 0 {
            return Err(RapportError::InvalidInput(
                "import target must be empty".to_string(),
            ));
        }
        let canonical = crate::export::import_canonical(data)?;
        canonical.restore_into(self.store_mut())?;
        Ok(canonical.progressions.len())
    }
}

// =============================================================================
// TESTS
// =============================================================================
