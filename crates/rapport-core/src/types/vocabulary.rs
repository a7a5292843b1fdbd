//! Fixed vocabularies.
//!
//! Every categorical field of the data model is a closed enum. Parsing an
//! unknown string fails with [`RapportError::InvalidEnum`], so invalid enum
//! values are rejected at the command boundary instead of in storage.

use super::RapportError;
use serde::{Deserialize, Serialize};

/// Declare a closed vocabulary with its snake_case wire names.
///
/// The wire name given for each variant must match serde's `snake_case`
/// rendering of the variant, so text and JSON forms agree.
macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident ($field:literal) {
            $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            /// Every member of the vocabulary, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The snake_case wire name.
            #[must_use]
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = RapportError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($text => Ok($name::$variant),)+
                    other => Err(RapportError::InvalidEnum {
                        field: $field,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

vocabulary! {
    /// The 14 one-time milestones of a relationship, in their canonical order.
    MilestoneKind ("milestone_type") {
        FirstContact => "first_contact",
        ContactResponse => "contact_response",
        MeetingScheduled => "meeting_scheduled",
        MeetingCompleted => "meeting_completed",
        NeedsAssessment => "needs_assessment",
        ProductPresentation => "product_presentation",
        SampleDelivered => "sample_delivered",
        DecisionMakerEngaged => "decision_maker_engaged",
        PricingDiscussion => "pricing_discussion",
        StrategicDiscussion => "strategic_discussion",
        PartnershipProposal => "partnership_proposal",
        TrialProgram => "trial_program",
        ContractDiscussion => "contract_discussion",
        PartnershipEstablished => "partnership_established",
    }
}

vocabulary! {
    /// Kinds of logged trust-building (or eroding) actions.
    TrustActivityType ("activity_type") {
        PromiseKept => "promise_kept",
        ProactiveSupport => "proactive_support",
        IssueResolved => "issue_resolved",
        ExpertiseShared => "expertise_shared",
        TransparencyShared => "transparency_shared",
        ReferralProvided => "referral_provided",
        CommitmentMissed => "commitment_missed",
        IssueEscalated => "issue_escalated",
    }
}

vocabulary! {
    /// Qualitative rating of how the organization responds to outreach.
    ResponseQuality ("response_quality") {
        Strategic => "strategic",
        Collaborative => "collaborative",
        Engaged => "engaged",
        Responsive => "responsive",
        Minimal => "minimal",
    }
}

vocabulary! {
    /// Risk level attached to a health snapshot.
    RiskLevel ("risk_level") {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
}

vocabulary! {
    /// Channel an interaction took place on.
    InteractionChannel ("channel") {
        Email => "email",
        Phone => "phone",
        Meeting => "meeting",
        SiteVisit => "site_visit",
        TradeShow => "trade_show",
        Other => "other",
    }
}
