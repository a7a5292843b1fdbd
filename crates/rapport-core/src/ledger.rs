//! # Ledger Store
//!
//! The storage seam for progressions and their append-only children.
//!
//! A store knows nothing about scoring. It persists whatever a
//! [`LedgerChange`] carries, and it applies each change atomically: either
//! every row lands or none does. The in-memory [`MemoryLedger`] and the
//! disk-backed [`crate::storage::RedbLedger`] both implement [`LedgerStore`].

use crate::progression::ProgressionHistory;
use crate::{
    CommunicationPattern, HealthSnapshot, Interaction, Milestone, OrganizationId, Progression,
    ProgressionId, RapportError, TrustActivity,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// First id handed out by an empty store.
pub const FIRST_RECORD_ID: u64 = 1;

// =============================================================================
// CHANGES
// =============================================================================

/// One appended child record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChildRecord {
    Milestone(Milestone),
    TrustActivity(TrustActivity),
    Interaction(Interaction),
    Pattern(CommunicationPattern),
    Snapshot(HealthSnapshot),
}

impl ChildRecord {
    /// The raw record id.
    #[must_use]
    pub fn id(&self) -> u64 {
        match self {
            ChildRecord::Milestone(r) => r.id.0,
            ChildRecord::TrustActivity(r) => r.id.0,
            ChildRecord::Interaction(r) => r.id.0,
            ChildRecord::Pattern(r) => r.id.0,
            ChildRecord::Snapshot(r) => r.id.0,
        }
    }

    /// The owning progression.
    #[must_use]
    pub fn progression(&self) -> ProgressionId {
        match self {
            ChildRecord::Milestone(r) => r.progression,
            ChildRecord::TrustActivity(r) => r.progression,
            ChildRecord::Interaction(r) => r.progression,
            ChildRecord::Pattern(r) => r.progression,
            ChildRecord::Snapshot(r) => r.progression,
        }
    }
}

/// A unit of work applied by [`LedgerStore::commit`] in one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerChange {
    /// Upsert the progression row and append child records to it.
    Write {
        progression: Progression,
        appended: Vec<ChildRecord>,
    },
    /// Remove a progression and every child record it owns.
    Delete(ProgressionId),
    /// Raise the id counter to at least this value.
    ReserveIds(u64),
    /// Apply several changes in one transaction: all of them or none.
    Batch(Vec<LedgerChange>),
}

impl LedgerChange {
    /// Highest record id carried by this change, if any.
    #[must_use]
    pub fn max_id(&self) -> Option<u64> {
        match self {
            LedgerChange::Write {
                progression,
                appended,
            } => appended
                .iter()
                .map(ChildRecord::id)
                .chain(std::iter::once(progression.id.0))
                .max(),
            LedgerChange::Delete(_) | LedgerChange::ReserveIds(_) => None,
            LedgerChange::Batch(changes) => changes.iter().filter_map(Self::max_id).max(),
        }
    }

    /// Reject a write whose children point at another progression.
    pub(crate) fn check_ownership(&self) -> Result<(), RapportError> {
        let (progression, appended) = match self {
            LedgerChange::Write {
                progression,
                appended,
            } => (progression, appended),
            LedgerChange::Batch(changes) => {
                return changes.iter().try_for_each(Self::check_ownership);
            }
            LedgerChange::Delete(_) | LedgerChange::ReserveIds(_) => return Ok(()),
        };
        match appended.iter().find(|r| r.progression() != progression.id) {
            Some(stray) => Err(RapportError::InvariantViolation(format!(
                "record {} belongs to progression {}, not {}",
                stray.id(),
                stray.progression(),
                progression.id
            ))),
            None => Ok(()),
        }
    }
}

// =============================================================================
// STORE TRAIT
// =============================================================================

/// Trait for progression storage backends.
pub trait LedgerStore {
    /// Lookup a progression by id.
    fn progression(&self, id: ProgressionId) -> Result<Option<Progression>, RapportError>;

    /// Lookup the progression of an organization.
    fn progression_for(
        &self,
        organization: OrganizationId,
    ) -> Result<Option<Progression>, RapportError>;

    /// All progressions in id order.
    fn progressions(&self) -> Result<Vec<Progression>, RapportError>;

    /// The child history of a progression, each list in id order.
    ///
    /// An unknown progression has an empty history.
    fn history(&self, id: ProgressionId) -> Result<ProgressionHistory, RapportError>;

    /// Health snapshots of a progression in id order.
    fn health_snapshots(&self, id: ProgressionId) -> Result<Vec<HealthSnapshot>, RapportError>;

    /// The id the next new record will receive. Does not consume it.
    fn next_record_id(&self) -> Result<u64, RapportError>;

    /// Apply a change atomically, advancing the id counter past its ids.
    fn commit(&mut self, change: LedgerChange) -> Result<(), RapportError>;

    /// Number of progressions.
    fn progression_count(&self) -> Result<usize, RapportError> {
        Ok(self.progressions()?.len())
    }
}

// =============================================================================
// IN-MEMORY STORE
// =============================================================================

/// An in-memory ledger backed by `BTreeMap`s.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryLedger {
    progressions: BTreeMap<ProgressionId, Progression>,
    organizations: BTreeMap<OrganizationId, ProgressionId>,
    histories: BTreeMap<ProgressionId, ProgressionHistory>,
    snapshots: BTreeMap<ProgressionId, Vec<HealthSnapshot>>,
    next_id: u64,
}

impl Default for MemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self {
            progressions: BTreeMap::new(),
            organizations: BTreeMap::new(),
            histories: BTreeMap::new(),
            snapshots: BTreeMap::new(),
            next_id: FIRST_RECORD_ID,
        }
    }

    fn apply_write(&mut self, progression: Progression, appended: Vec<ChildRecord>) {
        let id = progression.id;
        self.organizations.insert(progression.organization, id);
        self.progressions.insert(id, progression);

        let history = self.histories.entry(id).or_default();
        for record in appended {
            match record {
                ChildRecord::Milestone(r) => history.milestones.push(r),
                ChildRecord::TrustActivity(r) => history.trust_activities.push(r),
                ChildRecord::Interaction(r) => history.interactions.push(r),
                ChildRecord::Pattern(r) => history.patterns.push(r),
                ChildRecord::Snapshot(r) => self.snapshots.entry(id).or_default().push(r),
            }
        }
    }
}

impl LedgerStore for MemoryLedger {
    fn progression(&self, id: ProgressionId) -> Result<Option<Progression>, RapportError> {
        Ok(self.progressions.get(&id).cloned())
    }

    fn progression_for(
        &self,
        organization: OrganizationId,
    ) -> Result<Option<Progression>, RapportError> {
        Ok(self
            .organizations
            .get(&organization)
            .and_then(|id| self.progressions.get(id))
            .cloned())
    }

    fn progressions(&self) -> Result<Vec<Progression>, RapportError> {
        Ok(self.progressions.values().cloned().collect())
    }

    fn history(&self, id: ProgressionId) -> Result<ProgressionHistory, RapportError> {
        Ok(self.histories.get(&id).cloned().unwrap_or_default())
    }

    fn health_snapshots(&self, id: ProgressionId) -> Result<Vec<HealthSnapshot>, RapportError> {
        Ok(self.snapshots.get(&id).cloned().unwrap_or_default())
    }

    fn next_record_id(&self) -> Result<u64, RapportError> {
        Ok(self.next_id)
    }

    fn progression_count(&self) -> Result<usize, RapportError> {
        Ok(self.progressions.len())
    }

    fn commit(&mut self, change: LedgerChange) -> Result<(), RapportError> {
        change.check_ownership()?;
        if let LedgerChange::Batch(changes) = change {
            // Stage on a copy so a failing change leaves `self` untouched.
            let mut staged = self.clone();
            for change in changes {
                staged.commit(change)?;
            }
            *self = staged;
            return Ok(());
        }

        let next_id = change
            .max_id()
            .map_or(self.next_id, |max| self.next_id.max(max.saturating_add(1)));

        match change {
            LedgerChange::Write {
                progression,
                appended,
            } => {
                if let Some(owner) = self
                    .organizations
                    .get(&progression.organization)
                    .filter(|owner| **owner != progression.id)
                {
                    return Err(RapportError::InvariantViolation(format!(
                        "organization {} already tracked by progression {owner}",
                        progression.organization
                    )));
                }
                self.apply_write(progression, appended);
            }
            LedgerChange::Delete(id) => {
                let removed = self
                    .progressions
                    .remove(&id)
                    .ok_or(RapportError::ProgressionNotFound(id))?;
                self.organizations.remove(&removed.organization);
                self.histories.remove(&id);
                self.snapshots.remove(&id);
            }
            LedgerChange::ReserveIds(next) => {
                self.next_id = self.next_id.max(next);
            }
            LedgerChange::Batch(_) => {}
        }

        self.next_id = self.next_id.max(next_id);
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
