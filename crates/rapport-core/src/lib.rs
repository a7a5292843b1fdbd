//! # rapport-core
//!
//! The deterministic Relationship Progression Engine for Rapport.
//!
//! One progression tracks the commercial relationship with one organization.
//! It moves through four stages (initial contact, trust building,
//! partnership deepening, strategic collaboration) as milestones are
//! achieved, and carries integer scores derived from its history of
//! milestones, trust activities, interactions and communication patterns.
//!
//! ## Architectural Constraints
//!
//! The engine:
//! - Is event-sourced: child records are append-only, and every derived
//!   field is a pure fold over them ([`progression::fold`])
//! - Is deterministic: `BTreeMap` only, integer arithmetic only
//! - Is closed: timestamps are supplied by the caller, never read from the clock
//! - Has NO async, NO network dependencies (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod commands;
pub mod export;
pub mod ledger;
pub mod primitives;
pub mod progression;
pub mod recorder;
pub mod scoring;
pub mod session;
pub mod storage;
pub mod system;
pub mod tables;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    ActivityId, CommunicationPattern, ContactId, EngagementCounters, ErrorKind, HealthSnapshot,
    Interaction, InteractionChannel, InteractionId, Milestone, MilestoneId, MilestoneKind,
    OpportunityId, OrganizationId, PatternId, ProductId, Progression, ProgressionId,
    ProgressionScores, RapportError, ResponseQuality, RiskLevel, SnapshotId, TrustActivity,
    TrustActivityType,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use commands::{
    Command, InteractionInput, MilestoneInput, Opened, Outcome, PatternInput, ProgressionNotes,
    Recorded, SnapshotInput, TrustActivityInput,
};
#[cfg(feature = "crypto-hash")]
pub use export::{canonical_crypto_hash, compute_blake3_hash};
pub use export::{
    CanonicalHeader, CanonicalLedger, canonical_checksum, export_canonical, import_canonical,
    verify_canonical,
};
pub use ledger::{LedgerChange, LedgerStore, MemoryLedger};
pub use progression::{Derived, ProgressionHistory, fold};
pub use recorder::Recorder;
pub use scoring::MaturityBreakdown;
pub use session::{Session, StorageBackend};
pub use storage::RedbLedger;

// =============================================================================
// RE-EXPORTS: System (from system module)
// =============================================================================

pub use system::{
    PARTNERSHIP_DEEPENING_THRESHOLD, RelationshipMetrics, STRATEGIC_COLLABORATION_THRESHOLD, Stage,
    StageAssessor, StageProgress, TRUST_BUILDING_THRESHOLD, derive_stage,
};
