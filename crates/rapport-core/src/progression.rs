//! # Progression Fold
//!
//! A progression's derived fields are a pure function of its child history.
//!
//! ```text
//! history (milestones, trust activities, interactions, patterns)
//!     │
//!     └── fold() ──> Derived { stage, scores, counters, response_quality, dates }
//!                        │
//!                        └── apply() ──> Progression
//! ```
//!
//! Every command re-runs the fold over the full history of the touched
//! progression, so the stored row can never drift from its children.

use crate::primitives::MAX_SCORE;
use crate::scoring::{self, MaturityBreakdown};
use crate::system::{Stage, StageAssessor};
use crate::{
    CommunicationPattern, ContactId, EngagementCounters, Interaction, InteractionId, Milestone,
    MilestoneKind, Progression, ProgressionScores, RapportError, ResponseQuality, TrustActivity,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// HISTORY
// =============================================================================

/// The append-only child records of one progression, each in record-id order.
///
/// Health snapshots are not part of the history: they never feed scoring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionHistory {
    pub milestones: Vec<Milestone>,
    pub trust_activities: Vec<TrustActivity>,
    pub interactions: Vec<Interaction>,
    pub patterns: Vec<CommunicationPattern>,
}

impl ProgressionHistory {
    /// Kinds of all achieved milestones.
    pub fn milestone_kinds(&self) -> impl Iterator<Item = MilestoneKind> + '_ {
        self.milestones.iter().map(|m| m.kind)
    }

    /// Trust impacts in record order.
    pub fn trust_impacts(&self) -> impl Iterator<Item = i8> + '_ {
        self.trust_activities.iter().map(|a| a.impact_on_trust)
    }

    #[must_use]
    pub fn has_milestone(&self, kind: MilestoneKind) -> bool {
        self.milestones.iter().any(|m| m.kind == kind)
    }

    #[must_use]
    pub fn has_interaction(&self, id: InteractionId) -> bool {
        self.interactions.iter().any(|i| i.id == id)
    }

    /// Whether some interaction has engaged this contact.
    #[must_use]
    pub fn has_engaged(&self, contact: ContactId) -> bool {
        self.interactions.iter().any(|i| i.contact == Some(contact))
    }

    #[must_use]
    pub fn has_period(&self, start: NaiveDate, end: NaiveDate) -> bool {
        self.patterns
            .iter()
            .any(|p| p.period_start == start && p.period_end == end)
    }

    /// The pattern with the latest `period_end`; the later record wins ties.
    #[must_use]
    pub fn latest_pattern(&self) -> Option<&CommunicationPattern> {
        self.patterns.iter().max_by_key(|p| (p.period_end, p.id))
    }

    /// Total number of child records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.milestones.len()
            + self.trust_activities.len()
            + self.interactions.len()
            + self.patterns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// FOLD
// =============================================================================

/// Everything on a [`Progression`] that is derived from its history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Derived {
    pub stage: Stage,
    pub maturity: MaturityBreakdown,
    pub scores: ProgressionScores,
    pub counters: EngagementCounters,
    pub response_quality: Option<ResponseQuality>,
    pub first_contact_date: Option<DateTime<Utc>>,
    pub last_milestone_date: Option<DateTime<Utc>>,
    pub last_interaction_date: Option<DateTime<Utc>>,
}

/// Count distinct engagement from the interaction log.
#[must_use]
pub fn engagement_counters(interactions: &[Interaction]) -> EngagementCounters {
    let mut contacts = BTreeSet::new();
    let mut decision_makers = BTreeSet::new();
    let mut products = BTreeSet::new();
    let mut categories = BTreeSet::new();

    for interaction in interactions {
        if let Some(contact) = interaction.contact {
            contacts.insert(contact);
            if interaction.decision_maker {
                decision_makers.insert(contact);
            }
        }
        products.extend(interaction.products.iter().copied());
        categories.extend(interaction.product_categories.iter().map(String::as_str));
    }

    EngagementCounters {
        total_interactions_count: saturating_count(interactions.len()),
        contacts_engaged_count: saturating_count(contacts.len()),
        decision_makers_engaged_count: saturating_count(decision_makers.len()),
        products_discussed_count: saturating_count(products.len()),
        product_categories_engaged: saturating_count(categories.len()),
    }
}

fn saturating_count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Re-derive every computed field from a history.
#[must_use]
pub fn fold(history: &ProgressionHistory) -> Derived {
    let counters = engagement_counters(&history.interactions);
    let response_quality = history.latest_pattern().map(|p| p.response_quality);

    let maturity = scoring::compute_maturity(
        history.milestone_kinds(),
        history.trust_impacts(),
        counters.contacts_engaged_count,
        response_quality,
    );

    let scores = ProgressionScores {
        relationship_maturity_score: maturity.score,
        trust_level_score: scoring::trust_level(history.trust_impacts()),
        communication_frequency_score: scoring::communication_frequency(&counters),
        stakeholder_engagement_score: scoring::stakeholder_engagement(&counters),
        product_portfolio_depth_score: scoring::product_portfolio_depth(&counters),
    };

    let first_contact_date = history
        .interactions
        .iter()
        .map(|i| i.occurred_at)
        .chain(history.milestones.iter().map(|m| m.achieved_date))
        .min();

    Derived {
        stage: StageAssessor::new().assess(history),
        maturity,
        scores,
        counters,
        response_quality,
        first_contact_date,
        last_milestone_date: history.milestones.iter().map(|m| m.achieved_date).max(),
        last_interaction_date: history.interactions.iter().map(|i| i.occurred_at).max(),
    }
}

impl Derived {
    /// Write the derived fields onto a progression.
    ///
    /// Identity, notes, stored-only scores and `is_active` are untouched.
    pub fn apply(self, progression: &mut Progression, at: DateTime<Utc>) {
        progression.current_stage = self.stage;
        progression.scores = self.scores;
        progression.counters = self.counters;
        progression.response_quality = self.response_quality;
        progression.first_contact_date = self.first_contact_date;
        progression.last_milestone_date = self.last_milestone_date;
        progression.last_interaction_date = self.last_interaction_date;
        progression.last_progression_update = at;
    }
}

/// Fold a history onto a copy of `progression`.
#[must_use]
pub fn rederive(
    progression: &Progression,
    history: &ProgressionHistory,
    at: DateTime<Utc>,
) -> Progression {
    let mut next = progression.clone();
    fold(history).apply(&mut next, at);
    next
}

// =============================================================================
// INVARIANTS
// =============================================================================

/// Check a re-derived progression against its history.
///
/// Returns `InvariantViolation` when a score leaves its range, the stage
/// disagrees with the milestone set, or a milestone kind repeats.
pub fn check_invariants(
    progression: &Progression,
    history: &ProgressionHistory,
) -> Result<(), RapportError> {
    for (field, value) in progression.scores.named() {
        if value > MAX_SCORE {
            return Err(RapportError::InvariantViolation(format!(
                "{field} = {value} exceeds {MAX_SCORE}"
            )));
        }
    }
    for (field, value) in [
        (
            "partnership_resilience_score",
            progression.partnership_resilience_score,
        ),
        ("strategic_value_score", progression.strategic_value_score),
    ] {
        if let Some(value) = value.filter(|v| *v > MAX_SCORE) {
            return Err(RapportError::InvariantViolation(format!(
                "{field} = {value} exceeds {MAX_SCORE}"
            )));
        }
    }

    let expected = StageAssessor::new().assess(history);
    if progression.current_stage != expected {
        return Err(RapportError::InvariantViolation(format!(
            "stage {} does not match milestones ({})",
            progression.current_stage.as_str(),
            expected.as_str()
        )));
    }

    let mut seen = BTreeSet::new();
    for milestone in &history.milestones {
        if milestone.progression != progression.id {
            return Err(RapportError::InvariantViolation(format!(
                "milestone {} belongs to progression {}",
                milestone.id, milestone.progression
            )));
        }
        if !seen.insert(milestone.kind) {
            return Err(RapportError::InvariantViolation(format!(
                "milestone {} recorded twice",
                milestone.kind
            )));
        }
    }

    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
