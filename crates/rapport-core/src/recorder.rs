//! # Recorder Module
//!
//! Command validation and recording protocol.
//!
//! Every command follows the same three steps:
//! 1. Validate against the input ranges and the current history
//! 2. Re-derive the progression from the history plus the new record
//! 3. Commit the record and the re-derived row in one store write
//!
//! A failure in steps 1 or 2 returns before anything touches the store.

use crate::commands::{
    InteractionInput, MilestoneInput, Opened, PatternInput, ProgressionNotes, Recorded,
    SnapshotInput, TrustActivityInput,
};
use crate::ledger::{ChildRecord, LedgerChange, LedgerStore};
use crate::primitives::{
    DEFAULT_SIGNIFICANCE, MAX_CATEGORY_LENGTH, MAX_PRODUCTS_PER_INTERACTION, MAX_SCORE,
    MAX_SIGNIFICANCE, MAX_TEXT_LENGTH, MAX_TRUST_IMPACT, MIN_SIGNIFICANCE, MIN_TRUST_IMPACT,
};
use crate::progression::{ProgressionHistory, check_invariants, rederive};
use crate::{
    ActivityId, CommunicationPattern, HealthSnapshot, Interaction, InteractionId, Milestone,
    MilestoneId, OrganizationId, PatternId, Progression, ProgressionId, RapportError, SnapshotId,
    TrustActivity,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

// =============================================================================
// VALIDATION HELPERS
// =============================================================================

fn check_text(field: &str, text: Option<&str>) -> Result<(), RapportError> {
    match text {
        Some(text) if text.len() > MAX_TEXT_LENGTH => Err(RapportError::InvalidInput(format!(
            "{field} exceeds {MAX_TEXT_LENGTH} bytes"
        ))),
        _ => Ok(()),
    }
}

fn check_score(field: &'static str, value: u32) -> Result<u8, RapportError> {
    if value > u32::from(MAX_SCORE) {
        return Err(RapportError::out_of_range(
            field,
            i64::from(value),
            0,
            i64::from(MAX_SCORE),
        ));
    }
    Ok(value as u8)
}

/// Load a progression that accepts event commands.
fn active_progression<S>(store: &S, id: ProgressionId) -> Result<Progression, RapportError>
where
    S: LedgerStore + ?Sized,
{
    let progression = store
        .progression(id)?
        .ok_or(RapportError::ProgressionNotFound(id))?;
    if !progression.is_active {
        return Err(RapportError::ProgressionInactive(id));
    }
    Ok(progression)
}

/// Re-derive, check and commit. Returns the row that was written.
fn commit<S>(
    store: &mut S,
    progression: &Progression,
    history: &ProgressionHistory,
    appended: Vec<ChildRecord>,
    at: DateTime<Utc>,
) -> Result<Progression, RapportError>
where
    S: LedgerStore + ?Sized,
{
    let next = rederive(progression, history, at);
    check_invariants(&next, history)?;

    store.commit(LedgerChange::Write {
        progression: next.clone(),
        appended,
    })?;

    if next.current_stage != progression.current_stage {
        tracing::info!(
            progression = %next.id,
            from = progression.current_stage.as_str(),
            to = next.current_stage.as_str(),
            "stage transition"
        );
    }
    Ok(next)
}

/// The Recorder validates commands and writes them to any ledger store.
///
/// Works with both the in-memory `MemoryLedger` and the persistent
/// `RedbLedger`.
pub struct Recorder;

impl Recorder {
    // =========================================================================
    // VALIDATION
    // =========================================================================

    /// Validate a milestone against the progression's history.
    ///
    /// Returns the significance score to store.
    pub fn validate_milestone(
        id: ProgressionId,
        history: &ProgressionHistory,
        input: &MilestoneInput,
    ) -> Result<u8, RapportError> {
        let significance = input
            .significance_score
            .unwrap_or(u32::from(DEFAULT_SIGNIFICANCE));
        if !(MIN_SIGNIFICANCE..=MAX_SIGNIFICANCE).contains(&significance) {
            return Err(RapportError::out_of_range(
                "significance_score",
                i64::from(significance),
                i64::from(MIN_SIGNIFICANCE),
                i64::from(MAX_SIGNIFICANCE),
            ));
        }

        check_text("notes", input.notes.as_deref())?;

        if history.has_milestone(input.milestone_type) {
            return Err(RapportError::DuplicateMilestone {
                progression: id,
                kind: input.milestone_type,
            });
        }

        if let Some(interaction) = input
            .interaction_id
            .filter(|i| !history.has_interaction(*i))
        {
            return Err(RapportError::InteractionNotFound(interaction));
        }

        if let Some(contact) = input.contact_id.filter(|c| !history.has_engaged(*c)) {
            return Err(RapportError::ContactNotEngaged(contact));
        }

        Ok(significance as u8)
    }

    /// Validate a trust activity. Returns the impact to store.
    pub fn validate_trust_activity(input: &TrustActivityInput) -> Result<i8, RapportError> {
        if !(MIN_TRUST_IMPACT..=MAX_TRUST_IMPACT).contains(&input.impact_on_trust) {
            return Err(RapportError::out_of_range(
                "impact_on_trust",
                i64::from(input.impact_on_trust),
                i64::from(MIN_TRUST_IMPACT),
                i64::from(MAX_TRUST_IMPACT),
            ));
        }
        check_text("description", input.description.as_deref())?;
        Ok(input.impact_on_trust as i8)
    }

    /// Validate an interaction.
    ///
    /// Returns the normalized category set: trimmed and deduplicated.
    pub fn validate_interaction(
        input: &InteractionInput,
    ) -> Result<BTreeSet<String>, RapportError> {
        if input.decision_maker && input.contact_id.is_none() {
            return Err(RapportError::InvalidInput(
                "decision_maker requires contact_id".to_string(),
            ));
        }
        if input.products.len() > MAX_PRODUCTS_PER_INTERACTION {
            return Err(RapportError::InvalidInput(format!(
                "more than {MAX_PRODUCTS_PER_INTERACTION} products"
            )));
        }
        if input.product_categories.len() > MAX_PRODUCTS_PER_INTERACTION {
            return Err(RapportError::InvalidInput(format!(
                "more than {MAX_PRODUCTS_PER_INTERACTION} product categories"
            )));
        }
        check_text("summary", input.summary.as_deref())?;

        let mut categories = BTreeSet::new();
        for category in &input.product_categories {
            let category = category.trim();
            if category.is_empty() {
                return Err(RapportError::InvalidInput(
                    "product category must not be empty".to_string(),
                ));
            }
            if category.len() > MAX_CATEGORY_LENGTH {
                return Err(RapportError::InvalidInput(format!(
                    "product category exceeds {MAX_CATEGORY_LENGTH} bytes"
                )));
            }
            categories.insert(category.to_string());
        }
        Ok(categories)
    }

    /// Validate a communication pattern against the progression's history.
    pub fn validate_pattern(
        id: ProgressionId,
        history: &ProgressionHistory,
        input: &PatternInput,
    ) -> Result<(), RapportError> {
        if input.period_end < input.period_start {
            return Err(RapportError::InvalidInput(format!(
                "period_end {} is before period_start {}",
                input.period_end, input.period_start
            )));
        }
        let directed = input.inbound_count.saturating_add(input.outbound_count);
        if directed > input.total_interactions {
            return Err(RapportError::InvalidInput(format!(
                "inbound + outbound ({directed}) exceeds total_interactions ({})",
                input.total_interactions
            )));
        }
        if history.has_period(input.period_start, input.period_end) {
            return Err(RapportError::DuplicateCommunicationPeriod {
                progression: id,
                start: input.period_start,
                end: input.period_end,
            });
        }
        Ok(())
    }

    /// Validate a health snapshot. Returns the four scores as stored.
    pub fn validate_snapshot(input: &SnapshotInput) -> Result<[u8; 4], RapportError> {
        let scores = [
            check_score("overall_health_score", input.overall_health_score)?,
            check_score("trust_health_score", input.trust_health_score)?,
            check_score("engagement_health_score", input.engagement_health_score)?,
            check_score("growth_health_score", input.growth_health_score)?,
        ];
        check_text("recommendations", input.recommendations.as_deref())?;
        Ok(scores)
    }

    /// Validate an annotation.
    pub fn validate_notes(notes: &ProgressionNotes) -> Result<(), RapportError> {
        check_text("relationship_notes", notes.relationship_notes.as_deref())?;
        check_text("next_steps", notes.next_steps.as_deref())?;
        if let Some(score) = notes.partnership_resilience_score {
            check_score("partnership_resilience_score", score)?;
        }
        if let Some(score) = notes.strategic_value_score {
            check_score("strategic_value_score", score)?;
        }
        Ok(())
    }

    // =========================================================================
    // COMMANDS
    // =========================================================================

    /// Return the organization's progression, creating it if needed.
    pub fn open_progression<S>(
        store: &mut S,
        organization: OrganizationId,
        at: DateTime<Utc>,
    ) -> Result<Opened, RapportError>
    where
        S: LedgerStore + ?Sized,
    {
        if let Some(progression) = store.progression_for(organization)? {
            return Ok(Opened {
                progression,
                created: false,
            });
        }

        let id = ProgressionId(store.next_record_id()?);
        let progression = Progression::new(id, organization, at);
        store.commit(LedgerChange::Write {
            progression: progression.clone(),
            appended: Vec::new(),
        })?;

        tracing::debug!(progression = %id, organization = %organization, "opened progression");
        Ok(Opened {
            progression,
            created: true,
        })
    }

    /// Record a milestone and re-derive the progression.
    pub fn record_milestone<S>(
        store: &mut S,
        id: ProgressionId,
        input: MilestoneInput,
        at: DateTime<Utc>,
    ) -> Result<Recorded<Milestone>, RapportError>
    where
        S: LedgerStore + ?Sized,
    {
        let progression = active_progression(store, id)?;
        let mut history = store.history(id)?;
        let significance_score = Self::validate_milestone(id, &history, &input)?;

        let milestone = Milestone {
            id: MilestoneId(store.next_record_id()?),
            progression: id,
            kind: input.milestone_type,
            achieved_date: input.achieved_date,
            interaction: input.interaction_id,
            contact: input.contact_id,
            opportunity: input.opportunity_id,
            significance_score,
            notes: input.notes,
            recorded_at: at,
        };
        history.milestones.push(milestone.clone());

        let progression = commit(
            store,
            &progression,
            &history,
            vec![ChildRecord::Milestone(milestone.clone())],
            at,
        )?;

        tracing::debug!(
            progression = %id,
            milestone = milestone.kind.as_str(),
            maturity = progression.scores.relationship_maturity_score,
            "recorded milestone"
        );
        Ok(Recorded {
            record: milestone,
            progression,
        })
    }

    /// Record a trust activity and re-derive the progression.
    pub fn record_trust_activity<S>(
        store: &mut S,
        id: ProgressionId,
        input: TrustActivityInput,
        at: DateTime<Utc>,
    ) -> Result<Recorded<TrustActivity>, RapportError>
    where
        S: LedgerStore + ?Sized,
    {
        let progression = active_progression(store, id)?;
        let impact_on_trust = Self::validate_trust_activity(&input)?;
        let mut history = store.history(id)?;

        let activity = TrustActivity {
            id: ActivityId(store.next_record_id()?),
            progression: id,
            activity_type: input.activity_type,
            impact_on_trust,
            activity_date: input.activity_date,
            contact: input.contact_id,
            description: input.description,
            recorded_at: at,
        };
        history.trust_activities.push(activity.clone());

        let progression = commit(
            store,
            &progression,
            &history,
            vec![ChildRecord::TrustActivity(activity.clone())],
            at,
        )?;

        tracing::debug!(
            progression = %id,
            activity = activity.activity_type.as_str(),
            impact = activity.impact_on_trust,
            trust = progression.scores.trust_level_score,
            "recorded trust activity"
        );
        Ok(Recorded {
            record: activity,
            progression,
        })
    }

    /// Record an interaction, opening the organization's progression if needed.
    ///
    /// A new progression and its first interaction are written together.
    pub fn record_interaction<S>(
        store: &mut S,
        input: InteractionInput,
        at: DateTime<Utc>,
    ) -> Result<Recorded<Interaction>, RapportError>
    where
        S: LedgerStore + ?Sized,
    {
        let product_categories = Self::validate_interaction(&input)?;

        let mut next_id = store.next_record_id()?;
        let (progression, mut history) = match store.progression_for(input.organization_id)? {
            Some(existing) if !existing.is_active => {
                return Err(RapportError::ProgressionInactive(existing.id));
            }
            Some(existing) => {
                let history = store.history(existing.id)?;
                (existing, history)
            }
            None => {
                let progression =
                    Progression::new(ProgressionId(next_id), input.organization_id, at);
                next_id = next_id.saturating_add(1);
                (progression, ProgressionHistory::default())
            }
        };

        let interaction = Interaction {
            id: InteractionId(next_id),
            progression: progression.id,
            channel: input.channel,
            contact: input.contact_id,
            decision_maker: input.decision_maker,
            products: input.products.into_iter().collect(),
            product_categories,
            occurred_at: input.occurred_at,
            summary: input.summary,
            recorded_at: at,
        };
        history.interactions.push(interaction.clone());

        let progression = commit(
            store,
            &progression,
            &history,
            vec![ChildRecord::Interaction(interaction.clone())],
            at,
        )?;

        tracing::debug!(
            progression = %progression.id,
            channel = interaction.channel.as_str(),
            interactions = progression.counters.total_interactions_count,
            "recorded interaction"
        );
        Ok(Recorded {
            record: interaction,
            progression,
        })
    }

    /// Record a communication pattern and re-derive the progression.
    pub fn record_communication_pattern<S>(
        store: &mut S,
        id: ProgressionId,
        input: PatternInput,
        at: DateTime<Utc>,
    ) -> Result<Recorded<CommunicationPattern>, RapportError>
    where
        S: LedgerStore + ?Sized,
    {
        let progression = active_progression(store, id)?;
        let mut history = store.history(id)?;
        Self::validate_pattern(id, &history, &input)?;

        let pattern = CommunicationPattern {
            id: PatternId(store.next_record_id()?),
            progression: id,
            period_start: input.period_start,
            period_end: input.period_end,
            total_interactions: input.total_interactions,
            inbound_count: input.inbound_count,
            outbound_count: input.outbound_count,
            average_response_minutes: input.average_response_minutes,
            response_quality: input.response_quality,
            preferred_channel: input.preferred_channel,
            recorded_at: at,
        };
        history.patterns.push(pattern.clone());

        let progression = commit(
            store,
            &progression,
            &history,
            vec![ChildRecord::Pattern(pattern.clone())],
            at,
        )?;

        tracing::debug!(
            progression = %id,
            period_start = %pattern.period_start,
            period_end = %pattern.period_end,
            quality = pattern.response_quality.as_str(),
            "recorded communication pattern"
        );
        Ok(Recorded {
            record: pattern,
            progression,
        })
    }

    /// Record a health snapshot. Scores are not affected.
    pub fn record_health_snapshot<S>(
        store: &mut S,
        id: ProgressionId,
        input: SnapshotInput,
        at: DateTime<Utc>,
    ) -> Result<Recorded<HealthSnapshot>, RapportError>
    where
        S: LedgerStore + ?Sized,
    {
        let progression = active_progression(store, id)?;
        let [overall, trust, engagement, growth] = Self::validate_snapshot(&input)?;
        let history = store.history(id)?;

        let snapshot = HealthSnapshot {
            id: SnapshotId(store.next_record_id()?),
            progression: id,
            assessed_at: input.assessed_at,
            overall_health_score: overall,
            trust_health_score: trust,
            engagement_health_score: engagement,
            growth_health_score: growth,
            risk_level: input.risk_level,
            recommendations: input.recommendations,
            recorded_at: at,
        };

        let progression = commit(
            store,
            &progression,
            &history,
            vec![ChildRecord::Snapshot(snapshot.clone())],
            at,
        )?;

        tracing::debug!(
            progression = %id,
            risk = snapshot.risk_level.as_str(),
            "recorded health snapshot"
        );
        Ok(Recorded {
            record: snapshot,
            progression,
        })
    }

    /// Update notes and the stored-only scores.
    ///
    /// Allowed on inactive progressions.
    pub fn annotate<S>(
        store: &mut S,
        id: ProgressionId,
        notes: ProgressionNotes,
        at: DateTime<Utc>,
    ) -> Result<Progression, RapportError>
    where
        S: LedgerStore + ?Sized,
    {
        Self::validate_notes(&notes)?;
        let mut progression = store
            .progression(id)?
            .ok_or(RapportError::ProgressionNotFound(id))?;
        let history = store.history(id)?;

        if let Some(text) = notes.relationship_notes {
            progression.relationship_notes = Some(text);
        }
        if let Some(text) = notes.next_steps {
            progression.next_steps = Some(text);
        }
        if let Some(score) = notes.partnership_resilience_score {
            progression.partnership_resilience_score = Some(score as u8);
        }
        if let Some(score) = notes.strategic_value_score {
            progression.strategic_value_score = Some(score as u8);
        }

        let progression = commit(store, &progression, &history, Vec::new(), at)?;
        tracing::debug!(progression = %id, "annotated progression");
        Ok(progression)
    }

    /// Soft-deactivate a progression. Deactivating twice is a no-op.
    pub fn deactivate<S>(
        store: &mut S,
        id: ProgressionId,
        at: DateTime<Utc>,
    ) -> Result<Progression, RapportError>
    where
        S: LedgerStore + ?Sized,
    {
        let mut progression = store
            .progression(id)?
            .ok_or(RapportError::ProgressionNotFound(id))?;
        if !progression.is_active {
            return Ok(progression);
        }

        let history = store.history(id)?;
        progression.is_active = false;
        let progression = commit(store, &progression, &history, Vec::new(), at)?;

        tracing::info!(progression = %id, "deactivated progression");
        Ok(progression)
    }

    /// Delete a progression and every record it owns.
    pub fn delete_progression<S>(store: &mut S, id: ProgressionId) -> Result<(), RapportError>
    where
        S: LedgerStore + ?Sized,
    {
        store.commit(LedgerChange::Delete(id))?;
        tracing::info!(progression = %id, "deleted progression");
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;
    use crate::system::Stage;
    use crate::{ContactId, InteractionChannel, MilestoneKind, ResponseQuality, RiskLevel};
    use chrono::{NaiveDate, TimeZone};

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, day, 14, 0, 0)
            .single()
            .expect("valid date")
    }

    fn opened(store: &mut MemoryLedger) -> ProgressionId {
        Recorder::open_progression(store, OrganizationId(500), at(1))
            .expect("open")
            .progression
            .id
    }

    #[test]
    fn open_is_get_or_create() {
        let mut store = MemoryLedger::new();
        let first = Recorder::open_progression(&mut store, OrganizationId(1), at(1)).expect("open");
        let second =
            Recorder::open_progression(&mut store, OrganizationId(1), at(2)).expect("open");
        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.progression.id, second.progression.id);
        assert_eq!(second.progression.created_at, at(1));
    }

    #[test]
    fn milestone_default_significance() {
        let mut store = MemoryLedger::new();
        let id = opened(&mut store);
        let recorded = Recorder::record_milestone(
            &mut store,
            id,
            MilestoneInput::new(MilestoneKind::FirstContact, at(2)),
            at(2),
        )
        .expect("record");
        assert_eq!(recorded.record.significance_score, DEFAULT_SIGNIFICANCE);
        assert_eq!(recorded.progression.last_milestone_date, Some(at(2)));
    }

    #[test]
    fn milestone_significance_out_of_range() {
        let mut store = MemoryLedger::new();
        let id = opened(&mut store);
        let mut input = MilestoneInput::new(MilestoneKind::FirstContact, at(2));
        input.significance_score = Some(6);
        let err = Recorder::record_milestone(&mut store, id, input, at(2)).expect_err("range");
        assert!(matches!(
            err,
            RapportError::OutOfRange {
                field: "significance_score",
                ..
            }
        ));
        assert!(store.history(id).expect("history").is_empty());
    }

    #[test]
    fn milestone_links_must_resolve() {
        let mut store = MemoryLedger::new();
        let id = opened(&mut store);

        let mut input = MilestoneInput::new(MilestoneKind::MeetingCompleted, at(3));
        input.interaction_id = Some(InteractionId(999));
        let err = Recorder::record_milestone(&mut store, id, input, at(3)).expect_err("link");
        assert!(matches!(err, RapportError::InteractionNotFound(_)));

        let mut input = MilestoneInput::new(MilestoneKind::MeetingCompleted, at(3));
        input.contact_id = Some(ContactId(77));
        let err = Recorder::record_milestone(&mut store, id, input, at(3)).expect_err("contact");
        assert!(matches!(err, RapportError::ContactNotEngaged(_)));
    }

    #[test]
    fn milestone_links_to_own_interaction() {
        let mut store = MemoryLedger::new();
        let id = opened(&mut store);
        let mut interaction =
            InteractionInput::new(OrganizationId(500), InteractionChannel::Phone, at(2));
        interaction.contact_id = Some(ContactId(77));
        let logged = Recorder::record_interaction(&mut store, interaction, at(2)).expect("log");

        let mut input = MilestoneInput::new(MilestoneKind::ContactResponse, at(2));
        input.interaction_id = Some(logged.record.id);
        input.contact_id = Some(ContactId(77));
        let recorded = Recorder::record_milestone(&mut store, id, input, at(2)).expect("record");
        assert_eq!(recorded.record.interaction, Some(logged.record.id));
    }

    #[test]
    fn trust_impact_out_of_range() {
        let mut store = MemoryLedger::new();
        let id = opened(&mut store);
        let input = TrustActivityInput::new(crate::TrustActivityType::PromiseKept, 6, at(2));
        let err = Recorder::record_trust_activity(&mut store, id, input, at(2)).expect_err("range");
        assert!(matches!(err, RapportError::OutOfRange { .. }));
    }

    #[test]
    fn interaction_auto_opens_progression() {
        let mut store = MemoryLedger::new();
        let mut input = InteractionInput::new(OrganizationId(8), InteractionChannel::Email, at(4));
        input.contact_id = Some(ContactId(1));
        input.decision_maker = true;
        input.product_categories = vec![" produce ".to_string(), "produce".to_string()];

        let recorded = Recorder::record_interaction(&mut store, input, at(4)).expect("record");
        let progression = recorded.progression;
        assert_eq!(progression.organization, OrganizationId(8));
        assert_eq!(progression.counters.decision_makers_engaged_count, 1);
        assert_eq!(progression.counters.product_categories_engaged, 1);
        assert_eq!(progression.first_contact_date, Some(at(4)));
        assert_ne!(recorded.record.id.0, progression.id.0);
    }

    #[test]
    fn decision_maker_requires_contact() {
        let mut store = MemoryLedger::new();
        let mut input = InteractionInput::new(OrganizationId(8), InteractionChannel::Email, at(4));
        input.decision_maker = true;
        let err = Recorder::record_interaction(&mut store, input, at(4)).expect_err("invalid");
        assert!(matches!(err, RapportError::InvalidInput(_)));
        assert!(store.progressions().expect("list").is_empty());
    }

    #[test]
    fn inverted_period_is_rejected() {
        let mut store = MemoryLedger::new();
        let id = opened(&mut store);
        let input = PatternInput {
            period_start: NaiveDate::from_ymd_opt(2024, 2, 10).expect("date"),
            period_end: NaiveDate::from_ymd_opt(2024, 2, 1).expect("date"),
            total_interactions: 0,
            inbound_count: 0,
            outbound_count: 0,
            average_response_minutes: None,
            response_quality: ResponseQuality::Engaged,
            preferred_channel: None,
        };
        let err = Recorder::record_communication_pattern(&mut store, id, input, at(5))
            .expect_err("inverted");
        assert!(matches!(err, RapportError::InvalidInput(_)));
    }

    #[test]
    fn snapshot_does_not_touch_scores() {
        let mut store = MemoryLedger::new();
        let id = opened(&mut store);
        let input = SnapshotInput {
            assessed_at: at(6),
            overall_health_score: 90,
            trust_health_score: 90,
            engagement_health_score: 90,
            growth_health_score: 90,
            risk_level: RiskLevel::Low,
            recommendations: None,
        };
        let recorded =
            Recorder::record_health_snapshot(&mut store, id, input.clone(), at(6)).expect("snap");
        assert_eq!(recorded.progression.scores, Default::default());
        assert_eq!(recorded.progression.current_stage, Stage::InitialContact);

        let mut bad = input;
        bad.growth_health_score = 101;
        assert!(Recorder::record_health_snapshot(&mut store, id, bad, at(6)).is_err());
        assert_eq!(store.health_snapshots(id).expect("snaps").len(), 1);
    }

    #[test]
    fn annotate_replaces_only_given_fields() {
        let mut store = MemoryLedger::new();
        let id = opened(&mut store);
        let first = ProgressionNotes {
            relationship_notes: Some("Chef prefers mornings".to_string()),
            strategic_value_score: Some(70),
            ..Default::default()
        };
        Recorder::annotate(&mut store, id, first, at(2)).expect("annotate");
        let second = ProgressionNotes {
            next_steps: Some("Quote seasonal menu".to_string()),
            ..Default::default()
        };
        let progression = Recorder::annotate(&mut store, id, second, at(3)).expect("annotate");
        assert_eq!(
            progression.relationship_notes.as_deref(),
            Some("Chef prefers mornings")
        );
        assert_eq!(progression.strategic_value_score, Some(70));
        assert_eq!(progression.partnership_resilience_score, None);
        assert_eq!(progression.last_progression_update, at(3));

        let bad = ProgressionNotes {
            partnership_resilience_score: Some(101),
            ..Default::default()
        };
        assert!(Recorder::annotate(&mut store, id, bad, at(4)).is_err());
    }

    #[test]
    fn inactive_progression_rejects_events() {
        let mut store = MemoryLedger::new();
        let id = opened(&mut store);
        Recorder::deactivate(&mut store, id, at(2)).expect("deactivate");
        let again = Recorder::deactivate(&mut store, id, at(3)).expect("deactivate");
        assert_eq!(again.last_progression_update, at(2));

        let err = Recorder::record_milestone(
            &mut store,
            id,
            MilestoneInput::new(MilestoneKind::FirstContact, at(3)),
            at(3),
        )
        .expect_err("inactive");
        assert!(matches!(err, RapportError::ProgressionInactive(_)));

        let err = Recorder::record_interaction(
            &mut store,
            InteractionInput::new(OrganizationId(500), InteractionChannel::Phone, at(3)),
            at(3),
        )
        .expect_err("inactive");
        assert!(matches!(err, RapportError::ProgressionInactive(_)));
    }

    #[test]
    fn delete_then_reopen_is_fresh() {
        let mut store = MemoryLedger::new();
        let id = opened(&mut store);
        Recorder::record_milestone(
            &mut store,
            id,
            MilestoneInput::new(MilestoneKind::FirstContact, at(2)),
            at(2),
        )
        .expect("record");
        Recorder::delete_progression(&mut store, id).expect("delete");

        let reopened =
            Recorder::open_progression(&mut store, OrganizationId(500), at(5)).expect("open");
        assert!(reopened.created);
        assert_ne!(reopened.progression.id, id);
        assert!(store.history(reopened.progression.id).expect("h").is_empty());
    }
}
