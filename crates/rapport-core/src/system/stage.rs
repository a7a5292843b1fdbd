//! # Stage Assessment
//!
//! Coarse relationship stage derived from the milestone set.
//!
//! ## Stage Definitions
//!
//! | Stage | Rule (checked top to bottom) |
//! |-------|------------------------------|
//! | strategic_collaboration | ≥ 2 strategic milestones |
//! | partnership_deepening | ≥ 8 milestones |
//! | trust_building | ≥ 4 milestones |
//! | initial_contact | otherwise |
//!
//! Milestones are never removed, so the stage is a non-decreasing function
//! of the cumulative milestone set. `strategic_collaboration` is terminal,
//! although further milestones may still be recorded after reaching it.

use crate::progression::ProgressionHistory;
use crate::tables::is_strategic;
use crate::MilestoneKind;
use serde::{Deserialize, Serialize};

// =============================================================================
// STAGE THRESHOLDS
// =============================================================================

/// Milestones needed for `trust_building`.
pub const TRUST_BUILDING_THRESHOLD: usize = 4;

/// Milestones needed for `partnership_deepening`.
pub const PARTNERSHIP_DEEPENING_THRESHOLD: usize = 8;

/// Strategic milestones needed for `strategic_collaboration`.
pub const STRATEGIC_COLLABORATION_THRESHOLD: usize = 2;

// =============================================================================
// STAGE ENUM
// =============================================================================

/// Relationship stages, ordered from earliest to latest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    InitialContact,
    TrustBuilding,
    PartnershipDeepening,
    StrategicCollaboration,
}

impl Stage {
    /// Every stage, earliest first.
    pub const ALL: [Stage; 4] = [
        Stage::InitialContact,
        Stage::TrustBuilding,
        Stage::PartnershipDeepening,
        Stage::StrategicCollaboration,
    ];

    /// Human-readable stage name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Stage::InitialContact => "Initial Contact",
            Stage::TrustBuilding => "Trust Building",
            Stage::PartnershipDeepening => "Partnership Deepening",
            Stage::StrategicCollaboration => "Strategic Collaboration",
        }
    }

    /// The snake_case wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::InitialContact => "initial_contact",
            Stage::TrustBuilding => "trust_building",
            Stage::PartnershipDeepening => "partnership_deepening",
            Stage::StrategicCollaboration => "strategic_collaboration",
        }
    }

    /// Position in the stage order, starting at 0.
    #[must_use]
    pub fn rank(&self) -> u8 {
        *self as u8
    }

    /// Get the next stage, if any.
    #[must_use]
    pub fn next(&self) -> Option<Stage> {
        match self {
            Stage::InitialContact => Some(Stage::TrustBuilding),
            Stage::TrustBuilding => Some(Stage::PartnershipDeepening),
            Stage::PartnershipDeepening => Some(Stage::StrategicCollaboration),
            Stage::StrategicCollaboration => None,
        }
    }

    /// Get the previous stage, if any.
    #[must_use]
    pub fn previous(&self) -> Option<Stage> {
        match self {
            Stage::InitialContact => None,
            Stage::TrustBuilding => Some(Stage::InitialContact),
            Stage::PartnershipDeepening => Some(Stage::TrustBuilding),
            Stage::StrategicCollaboration => Some(Stage::PartnershipDeepening),
        }
    }

    /// Check if this stage is terminal.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::StrategicCollaboration)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.name())
    }
}

// =============================================================================
// RELATIONSHIP METRICS
// =============================================================================

/// Milestone counts extracted for stage assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RelationshipMetrics {
    /// Distinct milestones achieved.
    pub milestone_count: usize,
    /// Achieved milestones in the strategic subset.
    pub strategic_count: usize,
}

impl RelationshipMetrics {
    /// Count milestones and strategic milestones.
    #[must_use]
    pub fn from_kinds<I>(kinds: I) -> Self
    where
        I: IntoIterator<Item = MilestoneKind>,
    {
        kinds
            .into_iter()
            .fold(Self::default(), |mut metrics, kind| {
                metrics.milestone_count = metrics.milestone_count.saturating_add(1);
                if is_strategic(kind) {
                    metrics.strategic_count = metrics.strategic_count.saturating_add(1);
                }
                metrics
            })
    }

    /// Count the milestones of a progression history.
    #[must_use]
    pub fn from_history(history: &ProgressionHistory) -> Self {
        Self::from_kinds(history.milestone_kinds())
    }
}

/// Derive the stage of a milestone set with the default thresholds.
#[must_use]
pub fn derive_stage<I>(kinds: I) -> Stage
where
    I: IntoIterator<Item = MilestoneKind>,
{
    StageAssessor::new().assess_from_metrics(&RelationshipMetrics::from_kinds(kinds))
}

// =============================================================================
// STAGE ASSESSOR
// =============================================================================

/// Stage Assessor - Pure function to determine current stage.
#[derive(Debug, Clone, Copy)]
pub struct StageAssessor {
    trust_building: usize,
    partnership_deepening: usize,
    strategic_collaboration: usize,
}

impl Default for StageAssessor {
    fn default() -> Self {
        Self::new()
    }
}

impl StageAssessor {
    /// Create a new assessor with default thresholds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            trust_building: TRUST_BUILDING_THRESHOLD,
            partnership_deepening: PARTNERSHIP_DEEPENING_THRESHOLD,
            strategic_collaboration: STRATEGIC_COLLABORATION_THRESHOLD,
        }
    }

    /// Create an assessor with custom thresholds.
    #[must_use]
    pub fn with_thresholds(
        trust_building: usize,
        partnership_deepening: usize,
        strategic_collaboration: usize,
    ) -> Self {
        Self {
            trust_building,
            partnership_deepening,
            strategic_collaboration,
        }
    }

    /// Assess the current stage of a history.
    #[must_use]
    pub fn assess(&self, history: &ProgressionHistory) -> Stage {
        self.assess_from_metrics(&RelationshipMetrics::from_history(history))
    }

    /// Assess stage from pre-computed metrics.
    ///
    /// The strategic rule takes priority over the raw milestone count.
    #[must_use]
    pub fn assess_from_metrics(&self, metrics: &RelationshipMetrics) -> Stage {
        if metrics.strategic_count >= self.strategic_collaboration {
            Stage::StrategicCollaboration
        } else if metrics.milestone_count >= self.partnership_deepening {
            Stage::PartnershipDeepening
        } else if metrics.milestone_count >= self.trust_building {
            Stage::TrustBuilding
        } else {
            Stage::InitialContact
        }
    }

    /// Check if a specific stage is reached.
    #[must_use]
    pub fn has_reached(&self, history: &ProgressionHistory, target: Stage) -> bool {
        self.assess(history) >= target
    }

    /// Get progress toward the next stage.
    #[must_use]
    pub fn progress_to_next(&self, history: &ProgressionHistory) -> StageProgress {
        self.progress_from_metrics(RelationshipMetrics::from_history(history))
    }

    /// Get progress toward the next stage from pre-computed metrics.
    ///
    /// The first two steps advance on the milestone count; the final step
    /// advances on the strategic count.
    #[must_use]
    pub fn progress_from_metrics(&self, metrics: RelationshipMetrics) -> StageProgress {
        let current = self.assess_from_metrics(&metrics);

        let (next, achieved, floor, needed) = match current {
            Stage::InitialContact => (
                Stage::TrustBuilding,
                metrics.milestone_count,
                0,
                self.trust_building,
            ),
            Stage::TrustBuilding => (
                Stage::PartnershipDeepening,
                metrics.milestone_count,
                self.trust_building,
                self.partnership_deepening,
            ),
            Stage::PartnershipDeepening => (
                Stage::StrategicCollaboration,
                metrics.strategic_count,
                0,
                self.strategic_collaboration,
            ),
            Stage::StrategicCollaboration => return StageProgress::terminal(current, metrics),
        };

        let range = needed.saturating_sub(floor);
        let progress_in_range = achieved.saturating_sub(floor);

        let percent = if range > 0 {
            ((progress_in_range as u64).saturating_mul(100) / (range as u64)) as u8
        } else {
            100
        };

        StageProgress {
            current,
            next: Some(next),
            percent: percent.min(100),
            milestones_current: metrics.milestone_count,
            strategic_current: metrics.strategic_count,
            needed_for_next: needed,
            metrics,
        }
    }
}

/// Progress information toward the next stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageProgress {
    pub current: Stage,
    pub next: Option<Stage>,
    pub percent: u8,
    pub milestones_current: usize,
    pub strategic_current: usize,
    /// Milestones (or strategic milestones, for the final step) required by `next`.
    pub needed_for_next: usize,
    pub metrics: RelationshipMetrics,
}

impl StageProgress {
    fn terminal(current: Stage, metrics: RelationshipMetrics) -> Self {
        Self {
            current,
            next: None,
            percent: 100,
            milestones_current: metrics.milestone_count,
            strategic_current: metrics.strategic_count,
            needed_for_next: metrics.strategic_count,
            metrics,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
