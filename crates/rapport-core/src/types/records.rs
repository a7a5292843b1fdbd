//! Persisted records.
//!
//! Child records (milestones, trust activities, interactions, communication
//! patterns, health snapshots) are append-only: the engine never mutates a
//! field after insert. `Progression` is the only mutable row, and every
//! derived field on it is rewritten from the child history on each command.
//!
//! These structs are stored with `postcard`, which is not self-describing:
//! no `skip_serializing_if` or `flatten` here.

use super::{
    ActivityId, ContactId, InteractionChannel, InteractionId, MilestoneId, MilestoneKind,
    OpportunityId, OrganizationId, PatternId, ProductId, ProgressionId, ResponseQuality, RiskLevel,
    SnapshotId, TrustActivityType,
};
use crate::system::Stage;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// PROGRESSION
// =============================================================================

/// The five computed 0–100 component scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgressionScores {
    pub relationship_maturity_score: u8,
    pub trust_level_score: u8,
    pub communication_frequency_score: u8,
    pub stakeholder_engagement_score: u8,
    pub product_portfolio_depth_score: u8,
}

impl ProgressionScores {
    /// All scores paired with their field names, for range checks and display.
    #[must_use]
    pub fn named(&self) -> [(&'static str, u8); 5] {
        [
            ("relationship_maturity_score", self.relationship_maturity_score),
            ("trust_level_score", self.trust_level_score),
            (
                "communication_frequency_score",
                self.communication_frequency_score,
            ),
            (
                "stakeholder_engagement_score",
                self.stakeholder_engagement_score,
            ),
            (
                "product_portfolio_depth_score",
                self.product_portfolio_depth_score,
            ),
        ]
    }
}

/// Engagement counters derived from the interaction log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngagementCounters {
    pub total_interactions_count: u32,
    pub contacts_engaged_count: u32,
    pub decision_makers_engaged_count: u32,
    pub products_discussed_count: u32,
    pub product_categories_engaged: u32,
}

/// The single evolving record tracking one organization's relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progression {
    pub id: ProgressionId,
    pub organization: OrganizationId,
    pub current_stage: Stage,
    pub scores: ProgressionScores,
    /// Stored but never computed; set only through annotation.
    pub partnership_resilience_score: Option<u8>,
    /// Stored but never computed; set only through annotation.
    pub strategic_value_score: Option<u8>,
    /// Quality of the most recent communication pattern.
    pub response_quality: Option<ResponseQuality>,
    pub counters: EngagementCounters,
    pub created_at: DateTime<Utc>,
    pub first_contact_date: Option<DateTime<Utc>>,
    pub last_milestone_date: Option<DateTime<Utc>>,
    pub last_interaction_date: Option<DateTime<Utc>>,
    pub last_progression_update: DateTime<Utc>,
    pub relationship_notes: Option<String>,
    pub next_steps: Option<String>,
    pub is_active: bool,
}

impl Progression {
    /// A fresh progression: stage `initial_contact`, every score 0.
    #[must_use]
    pub fn new(id: ProgressionId, organization: OrganizationId, at: DateTime<Utc>) -> Self {
        Self {
            id,
            organization,
            current_stage: Stage::InitialContact,
            scores: ProgressionScores::default(),
            partnership_resilience_score: None,
            strategic_value_score: None,
            response_quality: None,
            counters: EngagementCounters::default(),
            created_at: at,
            first_contact_date: None,
            last_milestone_date: None,
            last_interaction_date: None,
            last_progression_update: at,
            relationship_notes: None,
            next_steps: None,
            is_active: true,
        }
    }
}

// =============================================================================
// CHILD RECORDS
// =============================================================================

/// A one-time named milestone achieved by a relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: MilestoneId,
    pub progression: ProgressionId,
    pub kind: MilestoneKind,
    pub achieved_date: DateTime<Utc>,
    pub interaction: Option<InteractionId>,
    pub contact: Option<ContactId>,
    pub opportunity: Option<OpportunityId>,
    /// 1..=5
    pub significance_score: u8,
    pub notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// A logged trust-building or trust-eroding action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustActivity {
    pub id: ActivityId,
    pub progression: ProgressionId,
    pub activity_type: TrustActivityType,
    /// -5..=5
    pub impact_on_trust: i8,
    pub activity_date: DateTime<Utc>,
    pub contact: Option<ContactId>,
    pub description: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// A logged touchpoint with the organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: InteractionId,
    pub progression: ProgressionId,
    pub channel: InteractionChannel,
    pub contact: Option<ContactId>,
    pub decision_maker: bool,
    pub products: BTreeSet<ProductId>,
    pub product_categories: BTreeSet<String>,
    pub occurred_at: DateTime<Utc>,
    pub summary: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Aggregated communication statistics for one bounded analysis period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunicationPattern {
    pub id: PatternId,
    pub progression: ProgressionId,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total_interactions: u32,
    pub inbound_count: u32,
    pub outbound_count: u32,
    pub average_response_minutes: Option<u32>,
    pub response_quality: ResponseQuality,
    pub preferred_channel: Option<InteractionChannel>,
    pub recorded_at: DateTime<Utc>,
}

/// A point-in-time assessment. Recorded only; never fed back into scoring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthSnapshot {
    pub id: SnapshotId,
    pub progression: ProgressionId,
    pub assessed_at: DateTime<Utc>,
    pub overall_health_score: u8,
    pub trust_health_score: u8,
    pub engagement_health_score: u8,
    pub growth_health_score: u8,
    pub risk_level: RiskLevel,
    pub recommendations: Option<String>,
    pub recorded_at: DateTime<Utc>,
}
