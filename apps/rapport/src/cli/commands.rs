//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//!
//! With the `file` backend every command loads the canonical file, runs,
//! and writes it back. With `redb` each engine command is its own write
//! transaction.

use super::ExportFormat;
use crate::api::{self, AppState};
use crate::config::{AppConfig, Backend, StorageConfig};
use chrono::{DateTime, Utc};
use rapport_core::{
    Command, Outcome, Progression, ProgressionId, RapportError, Session, Stage,
    primitives::MAX_REPLAY_COMMANDS,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a replay file (100 MB).
const MAX_REPLAY_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum size of a canonical import (500 MB).
const MAX_IMPORT_FILE_SIZE: u64 = 500 * 1024 * 1024;

fn validate_file_size(path: &Path, max_size: u64) -> Result<(), RapportError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| RapportError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(RapportError::InvalidInput(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Resolve an input path to an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, RapportError> {
    let canonical = path.canonicalize().map_err(|e| {
        RapportError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(RapportError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Resolve an output path against its (existing) parent directory.
fn validate_output_path(path: &Path) -> Result<PathBuf, RapportError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        RapportError::IoError(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(RapportError::IoError(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| RapportError::IoError("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

/// Read a size-checked input file.
fn read_input(path: &Path, max_size: u64) -> Result<Vec<u8>, RapportError> {
    let validated = validate_file_path(path)?;
    validate_file_size(&validated, max_size)?;
    std::fs::read(&validated).map_err(|e| RapportError::IoError(format!("Read file: {}", e)))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), RapportError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| RapportError::SerializationError(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(config: &AppConfig) -> Result<(), RapportError> {
    let storage = &config.storage;
    let session = load_or_create_session(storage)?;
    let addr = format!("{}:{}", config.server.host, config.server.port);

    println!("Rapport Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Address:  {}", addr);
    println!("  Backend:  {}", storage.backend.as_str());
    println!("  Database: {:?}", storage.database);
    println!();
    println!("Endpoints:");
    println!("  GET  /progressions              - List progressions");
    println!("  POST /progressions              - Open a progression");
    println!("  GET  /progressions/{{id}}/stage   - Stage progress");
    println!("  POST /progressions/{{id}}/...     - Milestones, trust, patterns, snapshots");
    println!("  POST /interactions              - Log an interaction");
    println!("  POST /export                    - Export ledger");
    println!("  GET  /health                    - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    if storage.backend == Backend::File {
        tracing::warn!("file backend: changes are held in memory and written on shutdown");
    }

    let state = AppState::new(session);
    api::run_server(&addr, state.clone(), &config.security).await?;

    let session = state.session.read().await;
    save_session(&session, storage)
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new database.
pub fn cmd_init(storage: &StorageConfig, force: bool) -> Result<(), RapportError> {
    let path = &storage.database;
    if path.exists() {
        if !force {
            return Err(RapportError::InvalidInput(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(path)
            .map_err(|e| RapportError::IoError(format!("Remove {:?}: {}", path, e)))?;
    }

    match storage.backend {
        Backend::Redb => {
            let _session = Session::with_redb(path)?;
            println!("Initialized new redb database at {:?}", path);
        }
        Backend::File => {
            save_session(&Session::new(), storage)?;
            println!("Initialized new file database at {:?}", path);
        }
    }

    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Ledger-wide counts.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerStatus {
    pub database: String,
    pub backend: &'static str,
    pub progression_count: usize,
    pub active_count: usize,
    pub by_stage: BTreeMap<Stage, usize>,
    pub next_record_id: u64,
}

impl LedgerStatus {
    pub fn collect(session: &Session, storage: &StorageConfig) -> Result<Self, RapportError> {
        let progressions = session.progressions()?;
        let mut by_stage: BTreeMap<Stage, usize> = Stage::ALL.iter().map(|s| (*s, 0)).collect();
        for progression in &progressions {
            *by_stage.entry(progression.current_stage).or_default() += 1;
        }
        Ok(Self {
            database: storage.database.to_string_lossy().into_owned(),
            backend: storage.backend.as_str(),
            progression_count: progressions.len(),
            active_count: progressions.iter().filter(|p| p.is_active).count(),
            by_stage,
            next_record_id: session.next_record_id()?,
        })
    }
}

/// Show ledger status.
pub fn cmd_status(storage: &StorageConfig, json_mode: bool) -> Result<(), RapportError> {
    let session = load_or_create_session(storage)?;
    let status = LedgerStatus::collect(&session, storage)?;

    if json_mode {
        return print_json(&status);
    }

    println!("Rapport Ledger Status");
    println!("=====================");
    println!("Database: {}", status.database);
    println!("Backend:  {}", status.backend);
    println!();
    println!("Progressions: {}", status.progression_count);
    println!("Active:       {}", status.active_count);
    for (stage, count) in &status.by_stage {
        println!("  {:<40} {}", stage.to_string(), count);
    }

    Ok(())
}

// =============================================================================
// SHOW / STAGE COMMANDS
// =============================================================================

/// Show one progression.
pub fn cmd_show(
    storage: &StorageConfig,
    json_mode: bool,
    id: ProgressionId,
    with_history: bool,
) -> Result<(), RapportError> {
    let session = load_or_create_session(storage)?;
    let progression = session.progression(id)?;
    let history = if with_history {
        Some(session.history(id)?)
    } else {
        None
    };

    if json_mode {
        return print_json(&serde_json::json!({
            "progression": progression,
            "history": history,
        }));
    }

    print_progression(&progression);

    if let Some(history) = history {
        println!();
        println!("Milestones:");
        for m in &history.milestones {
            println!(
                "  #{:<6} {:<26} {}  significance {}",
                m.id.0,
                m.kind.as_str(),
                m.achieved_date.format("%Y-%m-%d"),
                m.significance_score
            );
        }
        println!("Trust activities:");
        for a in &history.trust_activities {
            println!(
                "  #{:<6} {:<26} {}  impact {:+}",
                a.id.0,
                a.activity_type.as_str(),
                a.activity_date.format("%Y-%m-%d"),
                a.impact_on_trust
            );
        }
        println!("Interactions: {}", history.interactions.len());
        println!("Communication patterns:");
        for p in &history.patterns {
            println!(
                "  #{:<6} {}..{}  {}",
                p.id.0,
                p.period_start,
                p.period_end,
                p.response_quality.as_str()
            );
        }
    }

    Ok(())
}

/// Show progress toward the next stage.
pub fn cmd_stage(
    storage: &StorageConfig,
    json_mode: bool,
    id: ProgressionId,
    detailed: bool,
) -> Result<(), RapportError> {
    let session = load_or_create_session(storage)?;
    let progress = session.stage_progress(id)?;

    if json_mode {
        return print_json(&progress);
    }

    println!("Progression {} Stage", id);
    println!("====================");
    println!();
    println!("Current Stage: {}", progress.current);
    println!();

    match progress.next {
        Some(next) => {
            println!("Next Stage: {}", next);
            println!("Progress:   {}%", progress.percent);
            if next == Stage::StrategicCollaboration {
                println!(
                    "Strategic milestones: {} / {} needed",
                    progress.strategic_current, progress.needed_for_next
                );
            } else {
                println!(
                    "Milestones: {} / {} needed",
                    progress.milestones_current, progress.needed_for_next
                );
            }
        }
        None => println!("Terminal stage reached"),
    }

    if detailed {
        println!();
        println!("Metrics:");
        println!("  Milestones:           {}", progress.metrics.milestone_count);
        println!("  Strategic milestones: {}", progress.metrics.strategic_count);
    }

    Ok(())
}

// =============================================================================
// ENGINE COMMANDS
// =============================================================================

/// Run a single engine command and persist the result.
pub fn cmd_run(
    storage: &StorageConfig,
    json_mode: bool,
    command: Command,
) -> Result<(), RapportError> {
    let mut session = load_or_create_session(storage)?;
    let name = command.name();
    let outcome = session.execute(command, Utc::now())?;
    save_session(&session, storage)?;
    tracing::debug!(command = name, "command applied");

    if json_mode {
        return print_json(&outcome);
    }
    print_outcome(&outcome);
    Ok(())
}

/// One entry of a replay file: a tagged command plus an optional timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayEntry {
    /// Command time; defaults to the moment of replay.
    #[serde(default)]
    pub at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub command: Command,
}

/// Parse a replay file.
pub fn parse_replay(contents: &[u8]) -> Result<Vec<ReplayEntry>, RapportError> {
    let entries: Vec<ReplayEntry> = serde_json::from_slice(contents)
        .map_err(|e| RapportError::InvalidInput(format!("replay file: {}", e)))?;

    if entries.len() > MAX_REPLAY_COMMANDS {
        return Err(RapportError::InvalidInput(format!(
            "Command count {} exceeds maximum allowed {}",
            entries.len(),
            MAX_REPLAY_COMMANDS
        )));
    }
    Ok(entries)
}

/// Apply entries in order, stopping at the first failure.
///
/// Commands applied before the failure stay applied. Returns the number
/// of commands applied.
pub fn replay(session: &mut Session, entries: Vec<ReplayEntry>) -> Result<usize, RapportError> {
    let now = Utc::now();
    let total = entries.len();
    for (index, entry) in entries.into_iter().enumerate() {
        let name = entry.command.name();
        if let Err(e) = session.execute(entry.command, entry.at.unwrap_or(now)) {
            tracing::warn!(index, command = name, error = %e, "replay stopped");
            return Err(RapportError::InvalidInput(format!(
                "command {} ({}) failed: {}",
                index, name, e
            )));
        }
    }
    Ok(total)
}

/// Apply a JSON array of tagged commands.
pub fn cmd_replay(
    storage: &StorageConfig,
    json_mode: bool,
    file: &Path,
) -> Result<(), RapportError> {
    let entries = parse_replay(&read_input(file, MAX_REPLAY_FILE_SIZE)?)?;
    tracing::info!("Replaying {} commands from {:?}", entries.len(), file);

    let mut session = load_or_create_session(storage)?;
    let result = replay(&mut session, entries);
    save_session(&session, storage)?;
    let total = result?;

    if json_mode {
        return print_json(&serde_json::json!({ "applied": total }));
    }
    println!("Applied {} commands", total);
    println!("Ledger now has {} progressions", session.progression_count()?);
    Ok(())
}

// =============================================================================
// EXPORT / IMPORT / HASH COMMANDS
// =============================================================================

/// Export the ledger.
pub fn cmd_export(
    storage: &StorageConfig,
    output: &Path,
    format: ExportFormat,
) -> Result<(), RapportError> {
    let validated_output = validate_output_path(output)?;
    let session = load_or_create_session(storage)?;

    let data = match format {
        ExportFormat::Canonical => {
            let data = session.export_canonical()?;
            println!("Checksum: {}", session.canonical_checksum()?);
            data
        }
        ExportFormat::Json => serde_json::to_vec_pretty(&session.canonical_snapshot()?)
            .map_err(|e| RapportError::SerializationError(e.to_string()))?,
    };

    std::fs::write(&validated_output, &data)
        .map_err(|e| RapportError::IoError(format!("Write file: {}", e)))?;

    println!("Exported {} bytes to {:?}", data.len(), validated_output);
    Ok(())
}

/// Import a canonical export into an empty database.
pub fn cmd_import(storage: &StorageConfig, input: &Path) -> Result<(), RapportError> {
    let data = read_input(input, MAX_IMPORT_FILE_SIZE)?;

    let mut session = load_or_create_session(storage)?;
    let imported = session.import_canonical(&data)?;
    save_session(&session, storage)?;

    println!(
        "Imported {} progressions; next record id {}",
        imported,
        session.next_record_id()?
    );
    Ok(())
}

/// Compute the BLAKE3 hash of the canonical export.
pub fn cmd_hash(storage: &StorageConfig, json_mode: bool) -> Result<(), RapportError> {
    let session = load_or_create_session(storage)?;
    let hash = session.canonical_crypto_hash()?;

    if json_mode {
        return print_json(&serde_json::json!({
            "hash": hash,
            "algorithm": "blake3",
            "checksum": session.canonical_checksum()?,
        }));
    }

    println!("BLAKE3: {}", hash);
    Ok(())
}

// =============================================================================
// OUTPUT
// =============================================================================

fn print_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Opened(opened) if opened.created => println!(
            "Opened progression {} for organization {}",
            opened.progression.id, opened.progression.organization
        ),
        Outcome::Opened(opened) => println!(
            "Organization {} already has progression {}",
            opened.progression.organization, opened.progression.id
        ),
        Outcome::Milestone(r) => println!(
            "Recorded milestone {} (#{})",
            r.record.kind.as_str(),
            r.record.id.0
        ),
        Outcome::TrustActivity(r) => println!(
            "Recorded trust activity {} with impact {:+} (#{})",
            r.record.activity_type.as_str(),
            r.record.impact_on_trust,
            r.record.id.0
        ),
        Outcome::Interaction(r) => println!(
            "Logged {} interaction (#{})",
            r.record.channel.as_str(),
            r.record.id.0
        ),
        Outcome::Pattern(r) => println!(
            "Recorded communication pattern {}..{} (#{})",
            r.record.period_start, r.record.period_end, r.record.id.0
        ),
        Outcome::Snapshot(r) => println!(
            "Recorded health snapshot, risk {} (#{})",
            r.record.risk_level.as_str(),
            r.record.id.0
        ),
        Outcome::Updated { progression } => {
            println!("Updated progression {}", progression.id);
        }
        Outcome::Deleted { progression_id } => {
            println!("Deleted progression {}", progression_id);
        }
    }

    if let Some(progression) = outcome.progression() {
        println!();
        print_progression(progression);
    }
}

fn print_progression(p: &Progression) {
    println!(
        "Progression {} (organization {}){}",
        p.id,
        p.organization,
        if p.is_active { "" } else { " [inactive]" }
    );
    println!("  Stage: {}", p.current_stage);
    for (name, score) in p.scores.named() {
        println!("  {:<32} {:>3}", name, score);
    }
    if let Some(score) = p.partnership_resilience_score {
        println!("  {:<32} {:>3}", "partnership_resilience_score", score);
    }
    if let Some(score) = p.strategic_value_score {
        println!("  {:<32} {:>3}", "strategic_value_score", score);
    }
    println!(
        "  Interactions {}, contacts {}, decision makers {}, products {}, categories {}",
        p.counters.total_interactions_count,
        p.counters.contacts_engaged_count,
        p.counters.decision_makers_engaged_count,
        p.counters.products_discussed_count,
        p.counters.product_categories_engaged
    );
    if let Some(next_steps) = &p.next_steps {
        println!("  Next steps: {}", next_steps);
    }
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Load or create a session for the configured backend.
pub fn load_or_create_session(storage: &StorageConfig) -> Result<Session, RapportError> {
    let path = &storage.database;
    match storage.backend {
        Backend::Redb => Session::with_redb(path),
        Backend::File => {
            if !path.exists() {
                return Ok(Session::new());
            }
            let data = std::fs::read(path)
                .map_err(|e| RapportError::IoError(format!("Read db: {}", e)))?;
            Session::from_canonical(&data)
        }
    }
}

/// Persist a session. A no-op for redb, which commits per command.
pub fn save_session(session: &Session, storage: &StorageConfig) -> Result<(), RapportError> {
    if session.is_persistent() {
        return Ok(());
    }
    let data = session.export_canonical()?;
    std::fs::write(&storage.database, &data)
        .map_err(|e| RapportError::IoError(format!("Write db: {}", e)))
}

// =============================================================================
// TESTS
// =============================================================================
