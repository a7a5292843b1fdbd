//! # Innate Primitives
//!
//! Hardcoded runtime constants for the Rapport engine.
//!
//! Rapport starts with zero data but fixed logic. These primitives are
//! compiled into the binary and are immutable at runtime. Per-kind point
//! values live in [`crate::tables`]; this module holds caps, ranges and
//! input limits.

// =============================================================================
// SCORE BOUNDS
// =============================================================================

/// Every score field lies in `0..=MAX_SCORE`.
pub const MAX_SCORE: u8 = 100;

/// Cap on the milestone contribution to the maturity score.
pub const MILESTONE_COMPONENT_CAP: u32 = 40;

/// Cap on the trust-activity contribution to the maturity score.
pub const TRUST_COMPONENT_CAP: u32 = 30;

/// Cap on the communication contribution to the maturity score.
pub const COMMUNICATION_COMPONENT_CAP: u32 = 30;

/// Maturity points per trust activity with a positive impact.
pub const POINTS_PER_POSITIVE_ACTIVITY: u32 = 2;

/// Maturity points per engaged contact.
pub const POINTS_PER_ENGAGED_CONTACT: u32 = 5;

/// Trust score gained per positive impact point.
///
/// Negative impacts are recorded but never subtracted.
pub const TRUST_GAIN_PER_IMPACT_POINT: i32 = 2;

// =============================================================================
// SECONDARY SCORE WEIGHTS
// =============================================================================

/// Communication-frequency points per logged interaction.
pub const FREQUENCY_POINTS_PER_INTERACTION: u32 = 4;

/// Stakeholder-engagement points per engaged contact.
pub const ENGAGEMENT_POINTS_PER_CONTACT: u32 = 10;

/// Stakeholder-engagement points per engaged decision maker.
pub const ENGAGEMENT_POINTS_PER_DECISION_MAKER: u32 = 15;

/// Portfolio-depth points per distinct product discussed.
pub const DEPTH_POINTS_PER_PRODUCT: u32 = 5;

/// Portfolio-depth points per distinct product category engaged.
pub const DEPTH_POINTS_PER_CATEGORY: u32 = 10;

// =============================================================================
// INPUT RANGES
// =============================================================================

/// Lowest allowed `impact_on_trust`.
pub const MIN_TRUST_IMPACT: i32 = -5;

/// Highest allowed `impact_on_trust`.
pub const MAX_TRUST_IMPACT: i32 = 5;

/// Lowest allowed milestone `significance_score`.
pub const MIN_SIGNIFICANCE: u32 = 1;

/// Highest allowed milestone `significance_score`.
pub const MAX_SIGNIFICANCE: u32 = 5;

/// Significance assigned when the caller gives none.
pub const DEFAULT_SIGNIFICANCE: u8 = 3;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for free-text fields (notes, summaries, recommendations).
///
/// Longer text is rejected by the recorder to bound record size.
pub const MAX_TEXT_LENGTH: usize = 4096;

/// Maximum length of a product category name.
pub const MAX_CATEGORY_LENGTH: usize = 128;

/// Maximum number of products or categories on one interaction.
pub const MAX_PRODUCTS_PER_INTERACTION: usize = 256;

/// Maximum number of commands in one replay batch.
pub const MAX_REPLAY_COMMANDS: usize = 10_000;
