//! # Scoring Module
//!
//! Integer scoring rules for a progression.
//!
//! - Maturity = milestone component (cap 40) + trust-activity component
//!   (cap 30) + communication component (cap 30), clamped to 0..=100
//! - Trust accumulates `max(impact, 0) * 2` per activity, clamped to 0..=100
//! - Secondary scores are capped linear counts
//!
//! All arithmetic is saturating; there is no floating point.

use crate::primitives::{
    COMMUNICATION_COMPONENT_CAP, DEPTH_POINTS_PER_CATEGORY, DEPTH_POINTS_PER_PRODUCT,
    ENGAGEMENT_POINTS_PER_CONTACT, ENGAGEMENT_POINTS_PER_DECISION_MAKER,
    FREQUENCY_POINTS_PER_INTERACTION, MAX_SCORE, MILESTONE_COMPONENT_CAP,
    POINTS_PER_ENGAGED_CONTACT, POINTS_PER_POSITIVE_ACTIVITY, TRUST_COMPONENT_CAP,
    TRUST_GAIN_PER_IMPACT_POINT,
};
use crate::tables::{milestone_points, response_quality_bonus};
use crate::{EngagementCounters, MilestoneKind, ResponseQuality};
use serde::{Deserialize, Serialize};

/// Clamp an unsigned intermediate into the score range.
#[must_use]
pub fn clamp_score(value: u32) -> u8 {
    value.min(u32::from(MAX_SCORE)) as u8
}

// =============================================================================
// MATURITY
// =============================================================================

/// The three maturity components and their clamped sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MaturityBreakdown {
    /// Milestone points, at most 40.
    pub milestone_component: u8,
    /// Positive trust activities, at most 30.
    pub trust_component: u8,
    /// Contacts and response quality, at most 30.
    pub communication_component: u8,
    /// Sum of the components, 0..=100.
    pub score: u8,
}

/// Sum fixed per-kind points, capped at [`MILESTONE_COMPONENT_CAP`].
#[must_use]
pub fn milestone_component<I>(kinds: I) -> u8
where
    I: IntoIterator<Item = MilestoneKind>,
{
    let total = kinds.into_iter().fold(0u32, |acc, kind| {
        acc.saturating_add(milestone_points(kind))
            .min(MILESTONE_COMPONENT_CAP)
    });
    clamp_score(total)
}

/// Two points per positive-impact activity, capped at [`TRUST_COMPONENT_CAP`].
#[must_use]
pub fn trust_component<I>(impacts: I) -> u8
where
    I: IntoIterator<Item = i8>,
{
    let positive = impacts.into_iter().filter(|impact| *impact > 0).count() as u32;
    clamp_score(
        positive
            .saturating_mul(POINTS_PER_POSITIVE_ACTIVITY)
            .min(TRUST_COMPONENT_CAP),
    )
}

/// Engaged contacts plus the response-quality bonus, capped at
/// [`COMMUNICATION_COMPONENT_CAP`].
#[must_use]
pub fn communication_component(contacts_engaged: u32, quality: Option<ResponseQuality>) -> u8 {
    let total = contacts_engaged
        .saturating_mul(POINTS_PER_ENGAGED_CONTACT)
        .saturating_add(response_quality_bonus(quality));
    clamp_score(total.min(COMMUNICATION_COMPONENT_CAP))
}

/// Compute the full maturity breakdown.
#[must_use]
pub fn compute_maturity<M, T>(
    milestones: M,
    impacts: T,
    contacts_engaged: u32,
    quality: Option<ResponseQuality>,
) -> MaturityBreakdown
where
    M: IntoIterator<Item = MilestoneKind>,
    T: IntoIterator<Item = i8>,
{
    let milestone_component = milestone_component(milestones);
    let trust_component = trust_component(impacts);
    let communication_component = communication_component(contacts_engaged, quality);

    let sum = u32::from(milestone_component)
        + u32::from(trust_component)
        + u32::from(communication_component);

    MaturityBreakdown {
        milestone_component,
        trust_component,
        communication_component,
        score: clamp_score(sum),
    }
}

// =============================================================================
// TRUST
// =============================================================================

/// Apply one activity to a running trust score.
///
/// Only positive impacts move the score; a negative impact contributes zero.
#[must_use]
pub fn accumulate_trust(current: u8, impact: i8) -> u8 {
    let gain = i32::from(impact).max(0) * TRUST_GAIN_PER_IMPACT_POINT;
    (i32::from(current) + gain).clamp(0, i32::from(MAX_SCORE)) as u8
}

/// Replay a sequence of impacts from zero.
#[must_use]
pub fn trust_level<I>(impacts: I) -> u8
where
    I: IntoIterator<Item = i8>,
{
    impacts.into_iter().fold(0, accumulate_trust)
}

// =============================================================================
// SECONDARY SCORES
// =============================================================================

/// Interactions logged, 4 points each.
#[must_use]
pub fn communication_frequency(counters: &EngagementCounters) -> u8 {
    clamp_score(
        counters
            .total_interactions_count
            .saturating_mul(FREQUENCY_POINTS_PER_INTERACTION),
    )
}

/// Contacts and decision makers reached.
#[must_use]
pub fn stakeholder_engagement(counters: &EngagementCounters) -> u8 {
    clamp_score(
        counters
            .contacts_engaged_count
            .saturating_mul(ENGAGEMENT_POINTS_PER_CONTACT)
            .saturating_add(
                counters
                    .decision_makers_engaged_count
                    .saturating_mul(ENGAGEMENT_POINTS_PER_DECISION_MAKER),
            ),
    )
}

/// Breadth of products and categories discussed.
#[must_use]
pub fn product_portfolio_depth(counters: &EngagementCounters) -> u8 {
    clamp_score(
        counters
            .products_discussed_count
            .saturating_mul(DEPTH_POINTS_PER_PRODUCT)
            .saturating_add(
                counters
                    .product_categories_engaged
                    .saturating_mul(DEPTH_POINTS_PER_CATEGORY),
            ),
    )
}

// =============================================================================
// TESTS
// =============================================================================
