//! # Progression Scenarios
//!
//! End-to-end command sequences against an in-memory session.
//!
//! ## Groups
//! - Stage derivation
//! - Milestone uniqueness
//! - Trust accumulation
//! - Engagement and communication
//! - Lifecycle

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rapport_core::{
    ContactId, InteractionChannel, InteractionInput, MilestoneInput, MilestoneKind,
    OrganizationId, PatternInput, ProductId, ProgressionId, RapportError, ResponseQuality,
    Session, Stage, TrustActivityInput, TrustActivityType,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0)
        .single()
        .expect("valid date")
}

fn day(n: i64) -> DateTime<Utc> {
    t0() + Duration::days(n)
}

fn open(session: &mut Session, org: u64) -> ProgressionId {
    session
        .open_progression(OrganizationId(org), t0())
        .expect("open")
        .progression
        .id
}

fn milestone(session: &mut Session, id: ProgressionId, kind: MilestoneKind, n: i64) {
    session
        .record_milestone(id, MilestoneInput::new(kind, day(n)), day(n))
        .expect("record milestone");
}

fn trust(session: &mut Session, id: ProgressionId, impact: i32, n: i64) {
    session
        .record_trust_activity(
            id,
            TrustActivityInput::new(TrustActivityType::PromiseKept, impact, day(n)),
            day(n),
        )
        .expect("record trust activity");
}

// =============================================================================
// STAGE DERIVATION
// =============================================================================

mod stage_derivation {
    use super::*;

    /// Four ordinary milestones cross the trust-building threshold.
    #[test]
    fn four_milestones_reach_trust_building() {
        let mut session = Session::new();
        let id = open(&mut session, 1);

        let kinds = [
            MilestoneKind::FirstContact,
            MilestoneKind::ContactResponse,
            MilestoneKind::MeetingScheduled,
            MilestoneKind::MeetingCompleted,
        ];
        for (n, kind) in kinds.into_iter().enumerate() {
            milestone(&mut session, id, kind, n as i64);
        }

        let progression = session.progression(id).expect("progression");
        assert_eq!(progression.current_stage, Stage::TrustBuilding);
        assert_eq!(progression.scores.relationship_maturity_score, 14);
    }

    /// Two strategic milestones outrank the raw milestone count.
    #[test]
    fn two_strategic_milestones_reach_strategic_collaboration() {
        let mut session = Session::new();
        let id = open(&mut session, 1);

        milestone(&mut session, id, MilestoneKind::StrategicDiscussion, 1);
        assert_eq!(
            session.progression(id).expect("p").current_stage,
            Stage::InitialContact
        );
        milestone(&mut session, id, MilestoneKind::PartnershipProposal, 2);

        let progression = session.progression(id).expect("progression");
        assert_eq!(progression.current_stage, Stage::StrategicCollaboration);
        assert_eq!(progression.scores.relationship_maturity_score, 27);
    }

    /// Eight ordinary milestones reach partnership deepening.
    #[test]
    fn eight_milestones_reach_partnership_deepening() {
        let mut session = Session::new();
        let id = open(&mut session, 1);
        for (n, kind) in MilestoneKind::ALL[..8].iter().enumerate() {
            milestone(&mut session, id, *kind, n as i64);
        }
        let progression = session.progression(id).expect("progression");
        assert_eq!(progression.current_stage, Stage::PartnershipDeepening);
        // 2+3+4+5+6+7+8+10 = 45, capped at 40
        assert_eq!(progression.scores.relationship_maturity_score, 40);
    }

    /// Stage never drops as milestones accumulate.
    #[test]
    fn stage_is_monotonic() {
        let mut session = Session::new();
        let id = open(&mut session, 1);
        let mut previous = Stage::InitialContact;
        for (n, kind) in MilestoneKind::ALL.iter().enumerate() {
            milestone(&mut session, id, *kind, n as i64);
            let stage = session.progression(id).expect("p").current_stage;
            assert!(stage >= previous, "{kind} dropped stage to {stage}");
            previous = stage;
        }
        assert_eq!(previous, Stage::StrategicCollaboration);
    }
}

// =============================================================================
// MILESTONE UNIQUENESS
// =============================================================================

mod milestone_uniqueness {
    use super::*;

    /// A repeated kind is rejected and leaves the progression untouched.
    #[test]
    fn duplicate_milestone_rejected() {
        let mut session = Session::new();
        let id = open(&mut session, 1);
        milestone(&mut session, id, MilestoneKind::FirstContact, 1);
        let before = session.progression(id).expect("progression");

        let result = session.record_milestone(
            id,
            MilestoneInput::new(MilestoneKind::FirstContact, day(2)),
            day(2),
        );
        assert!(matches!(
            result,
            Err(RapportError::DuplicateMilestone {
                kind: MilestoneKind::FirstContact,
                ..
            })
        ));

        assert_eq!(session.progression(id).expect("progression"), before);
        assert_eq!(session.history(id).expect("history").milestones.len(), 1);
    }

    /// The same kind may be achieved once per progression.
    #[test]
    fn same_kind_on_two_progressions() {
        let mut session = Session::new();
        let a = open(&mut session, 1);
        let b = open(&mut session, 2);
        milestone(&mut session, a, MilestoneKind::FirstContact, 1);
        milestone(&mut session, b, MilestoneKind::FirstContact, 1);
        assert_eq!(session.progressions().expect("list").len(), 2);
    }

    /// Unknown progression is a referential failure.
    #[test]
    fn milestone_for_unknown_progression() {
        let mut session = Session::new();
        let result = session.record_milestone(
            ProgressionId(404),
            MilestoneInput::new(MilestoneKind::FirstContact, day(1)),
            day(1),
        );
        let err = result.expect_err("not found");
        assert_eq!(err.kind(), rapport_core::ErrorKind::Referential);
    }
}

// =============================================================================
// TRUST ACCUMULATION
// =============================================================================

mod trust_accumulation {
    use super::*;

    /// Twenty maximal activities cap the maturity trust component at 30.
    #[test]
    fn trust_component_caps_at_thirty() {
        let mut session = Session::new();
        let id = open(&mut session, 1);
        for n in 0..20 {
            trust(&mut session, id, 5, n);
        }
        let progression = session.progression(id).expect("progression");
        assert_eq!(progression.scores.relationship_maturity_score, 30);
        assert_eq!(progression.scores.trust_level_score, 100);
    }

    /// A negative impact is logged but does not lower trust.
    #[test]
    fn negative_impact_does_not_lower_trust() {
        let mut session = Session::new();
        let id = open(&mut session, 1);
        trust(&mut session, id, 4, 1);
        let before = session.progression(id).expect("p").scores;

        trust(&mut session, id, -5, 2);
        let after = session.progression(id).expect("p").scores;

        assert_eq!(before.trust_level_score, 8);
        assert_eq!(after.trust_level_score, 8);
        assert_eq!(
            after.relationship_maturity_score,
            before.relationship_maturity_score
        );
        assert_eq!(
            session.history(id).expect("history").trust_activities.len(),
            2
        );
    }
}

// =============================================================================
// ENGAGEMENT AND COMMUNICATION
// =============================================================================

mod engagement {
    use super::*;

    fn interaction(org: u64, contact: u64, decision_maker: bool, n: i64) -> InteractionInput {
        let mut input = InteractionInput::new(OrganizationId(org), InteractionChannel::Meeting, day(n));
        input.contact_id = Some(ContactId(contact));
        input.decision_maker = decision_maker;
        input.products = vec![ProductId(n as u64), ProductId(100)];
        input.product_categories = vec!["seafood".to_string()];
        input
    }

    /// Interactions drive the counters and secondary scores.
    #[test]
    fn interactions_update_counters() {
        let mut session = Session::new();
        session
            .record_interaction(interaction(9, 1, false, 1), day(1))
            .expect("interaction");
        session
            .record_interaction(interaction(9, 2, true, 2), day(2))
            .expect("interaction");
        let progression = session
            .progression_for(OrganizationId(9))
            .expect("lookup")
            .expect("auto-opened");

        assert_eq!(progression.counters.total_interactions_count, 2);
        assert_eq!(progression.counters.contacts_engaged_count, 2);
        assert_eq!(progression.counters.decision_makers_engaged_count, 1);
        assert_eq!(progression.counters.products_discussed_count, 3);
        assert_eq!(progression.scores.communication_frequency_score, 8);
        assert_eq!(progression.scores.stakeholder_engagement_score, 35);
        assert_eq!(progression.scores.product_portfolio_depth_score, 25);
        // Two contacts, no response quality yet.
        assert_eq!(progression.scores.relationship_maturity_score, 10);
        assert_eq!(progression.first_contact_date, Some(day(1)));
        assert_eq!(progression.last_interaction_date, Some(day(2)));
    }

    /// The latest period's response quality feeds the communication component.
    #[test]
    fn latest_pattern_sets_response_quality() {
        let mut session = Session::new();
        let id = session
            .record_interaction(interaction(9, 1, false, 1), day(1))
            .expect("interaction")
            .progression
            .id;

        let pattern = |month: u32, quality| PatternInput {
            period_start: NaiveDate::from_ymd_opt(2024, month, 1).expect("date"),
            period_end: NaiveDate::from_ymd_opt(2024, month, 28).expect("date"),
            total_interactions: 6,
            inbound_count: 2,
            outbound_count: 4,
            average_response_minutes: Some(90),
            response_quality: quality,
            preferred_channel: Some(InteractionChannel::Email),
        };

        session
            .record_communication_pattern(id, pattern(2, ResponseQuality::Collaborative), day(40))
            .expect("pattern");
        session
            .record_communication_pattern(id, pattern(1, ResponseQuality::Minimal), day(41))
            .expect("older period");

        let progression = session.progression(id).expect("progression");
        assert_eq!(
            progression.response_quality,
            Some(ResponseQuality::Collaborative)
        );
        // 1 contact * 5 + collaborative 12
        assert_eq!(progression.scores.relationship_maturity_score, 17);

        let duplicate = session.record_communication_pattern(
            id,
            pattern(2, ResponseQuality::Strategic),
            day(42),
        );
        assert!(matches!(
            duplicate,
            Err(RapportError::DuplicateCommunicationPeriod { .. })
        ));
    }
}

// =============================================================================
// LIFECYCLE
// =============================================================================

mod lifecycle {
    use super::*;

    /// Deactivated progressions refuse events but stay queryable.
    #[test]
    fn deactivated_progression_is_read_only() {
        let mut session = Session::new();
        let id = open(&mut session, 1);
        milestone(&mut session, id, MilestoneKind::FirstContact, 1);
        session.deactivate(id, day(2)).expect("deactivate");

        let result = session.record_trust_activity(
            id,
            TrustActivityInput::new(TrustActivityType::IssueResolved, 2, day(3)),
            day(3),
        );
        assert!(matches!(result, Err(RapportError::ProgressionInactive(_))));

        let progression = session.progression(id).expect("progression");
        assert!(!progression.is_active);
        assert_eq!(session.history(id).expect("history").milestones.len(), 1);
    }

    /// Deleting removes every record; reopening starts fresh.
    #[test]
    fn delete_cascades_and_reopen_starts_fresh() {
        let mut session = Session::new();
        let id = open(&mut session, 1);
        milestone(&mut session, id, MilestoneKind::FirstContact, 1);
        trust(&mut session, id, 3, 2);

        session.delete_progression(id).expect("delete");
        assert!(session.progression(id).is_err());
        assert!(
            session
                .progression_for(OrganizationId(1))
                .expect("lookup")
                .is_none()
        );

        let reopened = open(&mut session, 1);
        assert_ne!(reopened, id);
        let progression = session.progression(reopened).expect("progression");
        assert_eq!(progression.current_stage, Stage::InitialContact);
        assert_eq!(progression.scores.relationship_maturity_score, 0);
    }
}
