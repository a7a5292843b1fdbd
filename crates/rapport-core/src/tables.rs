//! # Lookup Tables
//!
//! Fixed point tables consulted by the scoring fold. They are data, kept
//! apart from [`crate::scoring`] so they can be reviewed and tuned on their
//! own.

use crate::{MilestoneKind, ResponseQuality};

/// Maturity points awarded per achieved milestone kind.
///
/// Independent of the milestone's `significance_score`.
pub const MILESTONE_POINTS: [(MilestoneKind, u32); 14] = [
    (MilestoneKind::FirstContact, 2),
    (MilestoneKind::ContactResponse, 3),
    (MilestoneKind::MeetingScheduled, 4),
    (MilestoneKind::MeetingCompleted, 5),
    (MilestoneKind::NeedsAssessment, 6),
    (MilestoneKind::ProductPresentation, 7),
    (MilestoneKind::SampleDelivered, 8),
    (MilestoneKind::DecisionMakerEngaged, 10),
    (MilestoneKind::PricingDiscussion, 10),
    (MilestoneKind::StrategicDiscussion, 12),
    (MilestoneKind::PartnershipProposal, 15),
    (MilestoneKind::TrialProgram, 18),
    (MilestoneKind::ContractDiscussion, 20),
    (MilestoneKind::PartnershipEstablished, 25),
];

/// Points for a kind missing from [`MILESTONE_POINTS`].
pub const UNLISTED_MILESTONE_POINTS: u32 = 1;

/// Milestones that count toward `strategic_collaboration`.
pub const STRATEGIC_MILESTONES: [MilestoneKind; 5] = [
    MilestoneKind::StrategicDiscussion,
    MilestoneKind::PartnershipProposal,
    MilestoneKind::TrialProgram,
    MilestoneKind::ContractDiscussion,
    MilestoneKind::PartnershipEstablished,
];

/// Communication bonus per response-quality rating.
pub const RESPONSE_QUALITY_BONUS: [(ResponseQuality, u32); 5] = [
    (ResponseQuality::Strategic, 15),
    (ResponseQuality::Collaborative, 12),
    (ResponseQuality::Engaged, 8),
    (ResponseQuality::Responsive, 5),
    (ResponseQuality::Minimal, 2),
];

/// Look up the maturity points for a milestone kind.
#[must_use]
pub fn milestone_points(kind: MilestoneKind) -> u32 {
    MILESTONE_POINTS
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, points)| *points)
        .unwrap_or(UNLISTED_MILESTONE_POINTS)
}

/// Whether a milestone kind belongs to the strategic subset.
#[must_use]
pub fn is_strategic(kind: MilestoneKind) -> bool {
    STRATEGIC_MILESTONES.contains(&kind)
}

/// Look up the communication bonus; no rating yet means no bonus.
#[must_use]
pub fn response_quality_bonus(quality: Option<ResponseQuality>) -> u32 {
    let Some(quality) = quality else {
        return 0;
    };
    RESPONSE_QUALITY_BONUS
        .iter()
        .find(|(q, _)| *q == quality)
        .map(|(_, bonus)| *bonus)
        .unwrap_or(0)
}
