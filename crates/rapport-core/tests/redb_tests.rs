//! # Backend Parity
//!
//! The same command stream must produce the same ledger whether it runs
//! in memory or on redb, and a redb ledger must survive a reopen.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rapport_core::{
    CanonicalLedger, Command, ContactId, LedgerChange, LedgerStore, Progression, RapportError,
    RedbLedger, InteractionChannel, InteractionInput, MilestoneInput, MilestoneKind,
    OrganizationId, PatternInput, ProgressionId, ProgressionNotes, ResponseQuality, RiskLevel,
    Session, SnapshotInput, Stage, TrustActivityInput, TrustActivityType,
};
use rapport_core::export::encode_canonical;
use tempfile::TempDir;

fn at(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 6, 8, 30, 0)
        .single()
        .expect("valid date")
        + Duration::days(n)
}

/// A realistic command stream for two organizations. Progression ids are
/// allocated from the shared counter, so the first opened one is 1.
fn stream() -> Vec<Command> {
    let mut contacted = InteractionInput::new(OrganizationId(10), InteractionChannel::Phone, at(0));
    contacted.contact_id = Some(ContactId(501));
    contacted.decision_maker = true;
    contacted.product_categories = vec!["dairy".to_string(), "produce".to_string()];

    let mut milestone = MilestoneInput::new(MilestoneKind::FirstContact, at(0));
    milestone.contact_id = Some(ContactId(501));
    milestone.significance_score = Some(4);

    vec![
        Command::RecordInteraction { input: contacted },
        Command::RecordMilestone {
            progression_id: ProgressionId(1),
            input: milestone,
        },
        Command::RecordMilestone {
            progression_id: ProgressionId(1),
            input: MilestoneInput::new(MilestoneKind::ContactResponse, at(2)),
        },
        Command::RecordTrustActivity {
            progression_id: ProgressionId(1),
            input: TrustActivityInput::new(TrustActivityType::ProactiveSupport, 3, at(3)),
        },
        Command::RecordCommunicationPattern {
            progression_id: ProgressionId(1),
            input: PatternInput {
                period_start: NaiveDate::from_ymd_opt(2024, 5, 1).expect("date"),
                period_end: NaiveDate::from_ymd_opt(2024, 5, 31).expect("date"),
                total_interactions: 4,
                inbound_count: 1,
                outbound_count: 3,
                average_response_minutes: None,
                response_quality: ResponseQuality::Engaged,
                preferred_channel: None,
            },
        },
        Command::RecordHealthSnapshot {
            progression_id: ProgressionId(1),
            input: SnapshotInput {
                assessed_at: at(30),
                overall_health_score: 64,
                trust_health_score: 55,
                engagement_health_score: 70,
                growth_health_score: 48,
                risk_level: RiskLevel::Medium,
                recommendations: Some("Schedule a tasting".to_string()),
            },
        },
        Command::OpenProgression {
            organization_id: OrganizationId(20),
        },
        Command::Annotate {
            progression_id: ProgressionId(1),
            notes: ProgressionNotes {
                next_steps: Some("Send spring menu samples".to_string()),
                strategic_value_score: Some(60),
                ..ProgressionNotes::default()
            },
        },
    ]
}

fn run(session: &mut Session) {
    for (n, command) in stream().into_iter().enumerate() {
        let name = command.name();
        session
            .execute(command, at(n as i64))
            .unwrap_or_else(|e| panic!("{name} failed: {e}"));
    }
}

#[test]
#[allow(clippy::panic)]
fn redb_matches_memory() {
    let dir = TempDir::new().expect("tempdir");
    let mut persistent = Session::with_redb(dir.path().join("rapport.redb")).expect("open redb");
    let mut memory = Session::new();

    run(&mut persistent);
    run(&mut memory);

    assert_eq!(
        persistent.progressions().expect("list"),
        memory.progressions().expect("list")
    );
    assert_eq!(
        persistent.export_canonical().expect("export"),
        memory.export_canonical().expect("export")
    );
    assert_eq!(
        persistent.next_record_id().expect("next"),
        memory.next_record_id().expect("next")
    );
}

#[test]
#[allow(clippy::panic)]
fn redb_survives_reopen() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("rapport.redb");

    let checksum = {
        let mut session = Session::with_redb(&path).expect("open redb");
        run(&mut session);
        session.canonical_checksum().expect("checksum")
    };

    let mut session = Session::with_redb(&path).expect("reopen redb");
    assert_eq!(session.canonical_checksum().expect("checksum"), checksum);

    let progression = session.progression(ProgressionId(1)).expect("progression");
    assert_eq!(progression.organization, OrganizationId(10));
    assert_eq!(progression.current_stage, Stage::InitialContact);
    assert_eq!(progression.strategic_value_score, Some(60));
    assert_eq!(session.health_snapshots(progression.id).expect("snapshots").len(), 1);

    // Ids continue past everything recorded before the reopen.
    let next = session.next_record_id().expect("next");
    let recorded = session
        .record_milestone(
            progression.id,
            MilestoneInput::new(MilestoneKind::MeetingScheduled, at(40)),
            at(40),
        )
        .expect("milestone after reopen");
    assert_eq!(recorded.record.id.0, next);
}

#[test]
#[allow(clippy::panic)]
fn canonical_export_moves_between_backends() {
    let mut memory = Session::new();
    run(&mut memory);
    let bytes = memory.export_canonical().expect("export");

    let dir = TempDir::new().expect("tempdir");
    let mut persistent = Session::with_redb(dir.path().join("import.redb")).expect("open redb");
    let imported = persistent.import_canonical(&bytes).expect("import");

    assert_eq!(imported, 2);
    assert_eq!(persistent.export_canonical().expect("export"), bytes);

    // Importing into a populated store is refused.
    assert!(persistent.import_canonical(&bytes).is_err());
}

#[test]
fn delete_on_redb_frees_the_organization() {
    let dir = TempDir::new().expect("tempdir");
    let mut session = Session::with_redb(dir.path().join("delete.redb")).expect("open redb");

    let first = session
        .open_progression(OrganizationId(5), at(0))
        .expect("open")
        .progression
        .id;
    session
        .record_milestone(first, MilestoneInput::new(MilestoneKind::FirstContact, at(1)), at(1))
        .expect("milestone");
    session.delete_progression(first).expect("delete");

    let reopened = session
        .open_progression(OrganizationId(5), at(2))
        .expect("reopen");
    assert!(reopened.created);
    assert!(reopened.progression.id > first);
    assert!(session.history(reopened.progression.id).expect("history").is_empty());
}

#[test]
fn failed_import_leaves_redb_empty() {
    let mut memory = Session::new();
    run(&mut memory);
    let mut canonical: CanonicalLedger = memory.canonical_snapshot().expect("snapshot");
    let shared = canonical.progressions[0].organization;
    canonical.progressions[1].organization = shared;
    let conflicting = encode_canonical(&canonical).expect("encode");

    let dir = TempDir::new().expect("tempdir");
    let mut persistent = Session::with_redb(dir.path().join("import.redb")).expect("open redb");
    let result = persistent.import_canonical(&conflicting);

    assert!(matches!(result, Err(RapportError::InvariantViolation(_))));
    assert_eq!(persistent.progression_count().expect("count"), 0);

    // The store is still empty, so a good export can be imported afterwards.
    let good = memory.export_canonical().expect("export");
    assert_eq!(persistent.import_canonical(&good).expect("retry"), 2);
}

#[test]
fn redb_batch_is_one_transaction() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("batch.redb");
    let mut ledger = RedbLedger::open(&path).expect("open redb");

    let result = ledger.commit(LedgerChange::Batch(vec![
        LedgerChange::Write {
            progression: Progression::new(ProgressionId(1), OrganizationId(7), at(0)),
            appended: Vec::new(),
        },
        LedgerChange::Write {
            progression: Progression::new(ProgressionId(2), OrganizationId(7), at(0)),
            appended: Vec::new(),
        },
        LedgerChange::ReserveIds(50),
    ]));

    assert!(matches!(result, Err(RapportError::InvariantViolation(_))));
    assert_eq!(ledger.progression_count().expect("count"), 0);
    assert_eq!(ledger.next_record_id().expect("next"), 1);
    drop(ledger);

    let reopened = RedbLedger::open(&path).expect("reopen");
    assert!(reopened.progressions().expect("list").is_empty());
    assert_eq!(reopened.next_record_id().expect("next"), 1);
}
