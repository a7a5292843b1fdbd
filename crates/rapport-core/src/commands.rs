//! # Commands
//!
//! Caller-facing inputs for every state-changing operation, plus the tagged
//! [`Command`] envelope used for batch replay.
//!
//! Inputs carry raw numbers (`u32`/`i32`) so that out-of-range values reach
//! the recorder and fail with [`crate::RapportError::OutOfRange`] instead of
//! being truncated by the decoder.

use crate::{
    CommunicationPattern, ContactId, HealthSnapshot, Interaction, InteractionChannel,
    InteractionId, Milestone, MilestoneKind, OpportunityId, OrganizationId, ProductId,
    Progression, ProgressionId, ResponseQuality, RiskLevel, TrustActivity, TrustActivityType,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// INPUTS
// =============================================================================

/// Details for `record_milestone`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneInput {
    pub milestone_type: MilestoneKind,
    pub achieved_date: DateTime<Utc>,
    #[serde(default)]
    pub interaction_id: Option<InteractionId>,
    #[serde(default)]
    pub contact_id: Option<ContactId>,
    #[serde(default)]
    pub opportunity_id: Option<OpportunityId>,
    /// 1..=5, defaults to 3.
    #[serde(default)]
    pub significance_score: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl MilestoneInput {
    /// A milestone with no links and default significance.
    #[must_use]
    pub fn new(milestone_type: MilestoneKind, achieved_date: DateTime<Utc>) -> Self {
        Self {
            milestone_type,
            achieved_date,
            interaction_id: None,
            contact_id: None,
            opportunity_id: None,
            significance_score: None,
            notes: None,
        }
    }
}

/// Details for `record_trust_activity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustActivityInput {
    pub activity_type: TrustActivityType,
    /// -5..=5
    pub impact_on_trust: i32,
    pub activity_date: DateTime<Utc>,
    #[serde(default)]
    pub contact_id: Option<ContactId>,
    #[serde(default)]
    pub description: Option<String>,
}

impl TrustActivityInput {
    #[must_use]
    pub fn new(
        activity_type: TrustActivityType,
        impact_on_trust: i32,
        activity_date: DateTime<Utc>,
    ) -> Self {
        Self {
            activity_type,
            impact_on_trust,
            activity_date,
            contact_id: None,
            description: None,
        }
    }
}

/// Details for `record_interaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionInput {
    pub organization_id: OrganizationId,
    pub channel: InteractionChannel,
    #[serde(default)]
    pub contact_id: Option<ContactId>,
    /// The contact is a decision maker. Requires `contact_id`.
    #[serde(default)]
    pub decision_maker: bool,
    #[serde(default)]
    pub products: Vec<ProductId>,
    #[serde(default)]
    pub product_categories: Vec<String>,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl InteractionInput {
    /// An interaction with no contact and no products.
    #[must_use]
    pub fn new(
        organization_id: OrganizationId,
        channel: InteractionChannel,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            organization_id,
            channel,
            contact_id: None,
            decision_maker: false,
            products: Vec::new(),
            product_categories: Vec::new(),
            occurred_at,
            summary: None,
        }
    }
}

/// Details for `record_communication_pattern`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternInput {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total_interactions: u32,
    #[serde(default)]
    pub inbound_count: u32,
    #[serde(default)]
    pub outbound_count: u32,
    #[serde(default)]
    pub average_response_minutes: Option<u32>,
    pub response_quality: ResponseQuality,
    #[serde(default)]
    pub preferred_channel: Option<InteractionChannel>,
}

/// Details for `record_health_snapshot`. Scores are 0..=100.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotInput {
    pub assessed_at: DateTime<Utc>,
    pub overall_health_score: u32,
    pub trust_health_score: u32,
    pub engagement_health_score: u32,
    pub growth_health_score: u32,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub recommendations: Option<String>,
}

/// Fields changed by `annotate`. `None` leaves a field as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionNotes {
    #[serde(default)]
    pub relationship_notes: Option<String>,
    #[serde(default)]
    pub next_steps: Option<String>,
    #[serde(default)]
    pub partnership_resilience_score: Option<u32>,
    #[serde(default)]
    pub strategic_value_score: Option<u32>,
}

impl ProgressionNotes {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

// =============================================================================
// RESULTS
// =============================================================================

/// A newly appended record together with the re-derived progression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recorded<T> {
    pub record: T,
    pub progression: Progression,
}

/// Result of `open_progression`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Opened {
    pub progression: Progression,
    /// False when the organization already had a progression.
    pub created: bool,
}

// =============================================================================
// COMMAND ENVELOPE
// =============================================================================

/// Any state-changing operation, tagged by `type`.
///
/// JSON only: the flattened inputs need a self-describing format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    OpenProgression {
        organization_id: OrganizationId,
    },
    RecordMilestone {
        progression_id: ProgressionId,
        #[serde(flatten)]
        input: MilestoneInput,
    },
    RecordTrustActivity {
        progression_id: ProgressionId,
        #[serde(flatten)]
        input: TrustActivityInput,
    },
    RecordInteraction {
        #[serde(flatten)]
        input: InteractionInput,
    },
    RecordCommunicationPattern {
        progression_id: ProgressionId,
        #[serde(flatten)]
        input: PatternInput,
    },
    RecordHealthSnapshot {
        progression_id: ProgressionId,
        #[serde(flatten)]
        input: SnapshotInput,
    },
    Annotate {
        progression_id: ProgressionId,
        #[serde(flatten)]
        notes: ProgressionNotes,
    },
    Deactivate {
        progression_id: ProgressionId,
    },
    DeleteProgression {
        progression_id: ProgressionId,
    },
}

impl Command {
    /// The wire name of this command.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Command::OpenProgression { .. } => "open_progression",
            Command::RecordMilestone { .. } => "record_milestone",
            Command::RecordTrustActivity { .. } => "record_trust_activity",
            Command::RecordInteraction { .. } => "record_interaction",
            Command::RecordCommunicationPattern { .. } => "record_communication_pattern",
            Command::RecordHealthSnapshot { .. } => "record_health_snapshot",
            Command::Annotate { .. } => "annotate",
            Command::Deactivate { .. } => "deactivate",
            Command::DeleteProgression { .. } => "delete_progression",
        }
    }
}

/// What an executed [`Command`] produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Opened(Opened),
    Milestone(Recorded<Milestone>),
    TrustActivity(Recorded<TrustActivity>),
    Interaction(Recorded<Interaction>),
    Pattern(Recorded<CommunicationPattern>),
    Snapshot(Recorded<HealthSnapshot>),
    Updated { progression: Progression },
    Deleted { progression_id: ProgressionId },
}

impl Outcome {
    /// The progression after the command, if it still exists.
    #[must_use]
    pub fn progression(&self) -> Option<&Progression> {
        match self {
            Outcome::Opened(o) => Some(&o.progression),
            Outcome::Milestone(r) => Some(&r.progression),
            Outcome::TrustActivity(r) => Some(&r.progression),
            Outcome::Interaction(r) => Some(&r.progression),
            Outcome::Pattern(r) => Some(&r.progression),
            Outcome::Snapshot(r) => Some(&r.progression),
            Outcome::Updated { progression } => Some(progression),
            Outcome::Deleted { .. } => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn command_parses_from_tagged_json() {
        let json = r#"{
            "type": "record_milestone",
            "progression_id": 4,
            "milestone_type": "trial_program",
            "achieved_date": "2024-04-01T10:00:00Z",
            "significance_score": 5
        }"#;
        let command: Command = serde_json::from_str(json).expect("parse");
        match command {
            Command::RecordMilestone {
                progression_id,
                input,
            } => {
                assert_eq!(progression_id, ProgressionId(4));
                assert_eq!(input.milestone_type, MilestoneKind::TrialProgram);
                assert_eq!(input.significance_score, Some(5));
                assert_eq!(input.contact_id, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn unknown_milestone_type_is_rejected() {
        let json = r#"{
            "type": "record_milestone",
            "progression_id": 4,
            "milestone_type": "handshake",
            "achieved_date": "2024-04-01T10:00:00Z"
        }"#;
        assert!(serde_json::from_str::<Command>(json).is_err());
    }

    #[test]
    fn command_names_match_tags() {
        let command = Command::Deactivate {
            progression_id: ProgressionId(1),
        };
        let value = serde_json::to_value(&command).expect("encode");
        assert_eq!(value["type"], command.name());
    }

    #[test]
    fn empty_notes() {
        assert!(ProgressionNotes::default().is_empty());
    }
}
