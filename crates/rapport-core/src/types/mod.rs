//! # Core Type Definitions
//!
//! This module contains all core types for the Rapport progression engine:
//! - Identifiers (`OrganizationId`, `ProgressionId`, record ids)
//! - Fixed vocabularies (`MilestoneKind`, `TrustActivityType`, ...)
//! - Persisted records (`Progression`, `Milestone`, `TrustActivity`, ...)
//! - Error types (`RapportError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (no floating-point)
//! - Implement `Ord` where they key a `BTreeMap`/`BTreeSet`
//! - Carry caller-supplied timestamps; nothing here reads the clock

mod records;
mod vocabulary;

pub use records::*;
pub use vocabulary::*;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

macro_rules! id_newtype {
    ($($(#[$meta:meta])* $name:ident),+ $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(
                Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
            )]
            #[serde(transparent)]
            pub struct $name(pub u64);

            impl std::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )+
    };
}

id_newtype! {
    /// An organization in the CRM. Owned by the outer system; the engine only references it.
    OrganizationId,
    /// The single progression record tracking one organization.
    ProgressionId,
    /// A recorded relationship milestone.
    MilestoneId,
    /// A recorded trust-building (or eroding) activity.
    ActivityId,
    /// A logged interaction with the organization.
    InteractionId,
    /// A contact person at the organization. Owned by the outer system.
    ContactId,
    /// A sales opportunity. Owned by the outer system.
    OpportunityId,
    /// A product from the catalogue. Owned by the outer system.
    ProductId,
    /// A recorded health snapshot.
    SnapshotId,
    /// A recorded communication pattern for one analysis period.
    PatternId,
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Coarse classification of a [`RapportError`].
///
/// None of these are transient: the engine performs no I/O beyond the
/// enclosing store transaction, so there is nothing to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The command violates a uniqueness, range or enum constraint.
    Constraint,
    /// The command references a record that does not exist.
    Referential,
    /// Re-deriving the progression produced an inconsistent record.
    Integrity,
    /// The storage backend or a codec failed.
    Storage,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Constraint => "constraint",
            ErrorKind::Referential => "referential",
            ErrorKind::Integrity => "integrity",
            ErrorKind::Storage => "storage",
        }
    }
}

/// Errors that can occur in the Rapport engine.
///
/// - No silent failures
/// - Every rejected command leaves the store untouched
/// - The engine never panics; all errors are reported to the caller
#[derive(Debug, Error)]
pub enum RapportError {
    /// The milestone kind was already achieved for this progression.
    #[error("Milestone {kind} already recorded for progression {progression}")]
    DuplicateMilestone {
        progression: ProgressionId,
        kind: MilestoneKind,
    },

    /// A communication pattern already exists for this analysis period.
    #[error("Communication pattern for {start}..{end} already recorded for progression {progression}")]
    DuplicateCommunicationPeriod {
        progression: ProgressionId,
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },

    /// A numeric field is outside its allowed range.
    #[error("{field} = {value} is outside {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    /// A categorical field holds a value outside its vocabulary.
    #[error("Invalid {field}: {value:?}")]
    InvalidEnum { field: &'static str, value: String },

    /// Any other malformed input (oversized text, inverted period, ...).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The progression has been deactivated and no longer accepts events.
    #[error("Progression {0} is inactive")]
    ProgressionInactive(ProgressionId),

    /// The requested progression does not exist.
    #[error("Progression not found: {0}")]
    ProgressionNotFound(ProgressionId),

    /// The linked interaction does not exist for this progression.
    #[error("Interaction not found: {0}")]
    InteractionNotFound(InteractionId),

    /// The linked contact has never been engaged through an interaction.
    #[error("Contact {0} has not been engaged by this progression")]
    ContactNotEngaged(ContactId),

    /// The re-derived progression broke an invariant; the command was aborted.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O or storage engine error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl RapportError {
    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            RapportError::DuplicateMilestone { .. }
            | RapportError::DuplicateCommunicationPeriod { .. }
            | RapportError::OutOfRange { .. }
            | RapportError::InvalidEnum { .. }
            | RapportError::InvalidInput(_)
            | RapportError::ProgressionInactive(_) => ErrorKind::Constraint,
            RapportError::ProgressionNotFound(_)
            | RapportError::InteractionNotFound(_)
            | RapportError::ContactNotEngaged(_) => ErrorKind::Referential,
            RapportError::InvariantViolation(_) => ErrorKind::Integrity,
            RapportError::SerializationError(_) | RapportError::IoError(_) => ErrorKind::Storage,
        }
    }

    /// Shorthand for a range check failure.
    pub(crate) fn out_of_range(field: &'static str, value: i64, min: i64, max: i64) -> Self {
        RapportError::OutOfRange {
            field,
            value,
            min,
            max,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
