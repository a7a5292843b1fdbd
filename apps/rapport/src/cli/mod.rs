//! # Rapport CLI Module
//!
//! This module implements the CLI interface for Rapport.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `init` - Initialize a new database
//! - `status` - Summarize the ledger
//! - `show` - Show one progression (optionally with its history)
//! - `stage` - Show progress toward the next stage
//! - `open` / `milestone` / `trust` / `interaction` / `pattern` /
//!   `snapshot` / `annotate` / `deactivate` / `delete` - Run one command
//! - `replay` - Apply a JSON array of tagged commands in order
//! - `export` / `import` - Canonical format
//! - `hash` - BLAKE3 hash of the canonical export

mod commands;

use crate::config::{AppConfig, Backend};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use rapport_core::{
    Command, ContactId, InteractionChannel, InteractionId, InteractionInput, MilestoneInput,
    MilestoneKind, OpportunityId, OrganizationId, PatternInput, ProductId, ProgressionId,
    ProgressionNotes, RapportError, ResponseQuality, RiskLevel, SnapshotInput,
    TrustActivityInput, TrustActivityType,
};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Rapport - Relationship Progression Engine
///
/// Tracks how each customer organization moves from first contact to
/// strategic partnership.
#[derive(Parser, Debug)]
#[command(name = "rapport")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the database (overrides [storage] database)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend (overrides [storage] backend)
    #[arg(short = 'B', long, global = true, value_enum)]
    pub backend: Option<Backend>,

    /// Path to a TOML config file (default: ./rapport.toml if present)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Output format for `export`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
    /// Binary canonical format, importable with `import`
    Canonical,
    /// Pretty-printed JSON of the same snapshot, for inspection
    Json,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides [server] host)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides [server] port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Summarize the ledger
    Status,

    /// Show one progression
    Show {
        /// Progression ID
        progression: u64,

        /// Include milestones, trust activities, interactions and patterns
        #[arg(long)]
        history: bool,
    },

    /// Show progress toward the next stage
    Stage {
        /// Progression ID
        progression: u64,

        /// Show milestone counts
        #[arg(short, long)]
        detailed: bool,
    },

    /// Open (or fetch) the progression for an organization
    Open {
        /// Organization ID
        organization: u64,
    },

    /// Record a milestone
    Milestone {
        /// Progression ID
        progression: u64,

        /// Milestone type (first_contact, contact_response, ...)
        kind: MilestoneKind,

        /// When it was achieved (RFC 3339, default: now)
        #[arg(long)]
        date: Option<DateTime<Utc>>,

        /// Interaction that produced it
        #[arg(long)]
        interaction: Option<u64>,

        /// Contact involved (must have been engaged)
        #[arg(long)]
        contact: Option<u64>,

        /// Linked sales opportunity
        #[arg(long)]
        opportunity: Option<u64>,

        /// Significance 1..=5 (default 3)
        #[arg(short, long)]
        significance: Option<u32>,

        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Record a trust activity
    Trust {
        /// Progression ID
        progression: u64,

        /// Activity type (promise_kept, issue_resolved, ...)
        activity: TrustActivityType,

        /// Impact on trust, -5..=5
        #[arg(allow_hyphen_values = true)]
        impact: i32,

        /// When it happened (RFC 3339, default: now)
        #[arg(long)]
        date: Option<DateTime<Utc>>,

        #[arg(long)]
        contact: Option<u64>,

        #[arg(short, long)]
        description: Option<String>,
    },

    /// Log an interaction (opens the organization's progression if needed)
    Interaction {
        /// Organization ID
        organization: u64,

        /// Channel (email, phone, meeting, site_visit, trade_show, other)
        channel: InteractionChannel,

        #[arg(long)]
        contact: Option<u64>,

        /// The contact is a decision maker
        #[arg(long, requires = "contact")]
        decision_maker: bool,

        /// Product IDs discussed (comma-separated)
        #[arg(long, value_delimiter = ',')]
        products: Vec<u64>,

        /// Product categories discussed (comma-separated)
        #[arg(long, value_delimiter = ',')]
        categories: Vec<String>,

        /// When it happened (RFC 3339, default: now)
        #[arg(long)]
        date: Option<DateTime<Utc>>,

        #[arg(short, long)]
        summary: Option<String>,
    },

    /// Record communication statistics for one period
    Pattern {
        /// Progression ID
        progression: u64,

        /// Period start (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,

        /// Period end (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,

        /// Response quality (strategic, collaborative, engaged, responsive, minimal)
        #[arg(long)]
        quality: ResponseQuality,

        #[arg(long, default_value_t = 0)]
        total: u32,

        #[arg(long, default_value_t = 0)]
        inbound: u32,

        #[arg(long, default_value_t = 0)]
        outbound: u32,

        /// Average response time in minutes
        #[arg(long)]
        response_minutes: Option<u32>,

        #[arg(long)]
        preferred_channel: Option<InteractionChannel>,
    },

    /// Record a health snapshot
    Snapshot {
        /// Progression ID
        progression: u64,

        #[arg(long)]
        overall: u32,

        #[arg(long)]
        trust: u32,

        #[arg(long)]
        engagement: u32,

        #[arg(long)]
        growth: u32,

        /// Risk level (low, medium, high, critical)
        #[arg(long)]
        risk: RiskLevel,

        #[arg(long)]
        recommendations: Option<String>,

        /// Assessment time (RFC 3339, default: now)
        #[arg(long)]
        date: Option<DateTime<Utc>>,
    },

    /// Update notes and the manually assessed scores
    Annotate {
        /// Progression ID
        progression: u64,

        #[arg(long)]
        notes: Option<String>,

        #[arg(long)]
        next_steps: Option<String>,

        /// Partnership resilience, 0..=100
        #[arg(long)]
        resilience: Option<u32>,

        /// Strategic value, 0..=100
        #[arg(long)]
        strategic_value: Option<u32>,
    },

    /// Deactivate a progression (it stops accepting events)
    Deactivate {
        /// Progression ID
        progression: u64,
    },

    /// Delete a progression and all of its records
    Delete {
        /// Progression ID
        progression: u64,
    },

    /// Apply a JSON array of tagged commands in order
    Replay {
        /// Path to the commands file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Export the ledger
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Export format
        #[arg(short = 't', long, value_enum, default_value = "canonical")]
        format: ExportFormat,
    },

    /// Import a canonical export into an empty database
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Compute BLAKE3 cryptographic hash of the ledger
    Hash,
}

impl Cli {
    /// Apply `--database` and `--backend` on top of the loaded config.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(database) = &self.database {
            config.storage.database.clone_from(database);
        }
        if let Some(backend) = self.backend {
            config.storage.backend = backend;
        }
    }
}

impl Commands {
    /// The engine command for a single-command subcommand, if this is one.
    ///
    /// `now` stands in for any omitted date.
    pub fn to_engine_command(&self, now: DateTime<Utc>) -> Option<Command> {
        let command = match self {
            Commands::Open { organization } => Command::OpenProgression {
                organization_id: OrganizationId(*organization),
            },
            Commands::Milestone {
                progression,
                kind,
                date,
                interaction,
                contact,
                opportunity,
                significance,
                notes,
            } => Command::RecordMilestone {
                progression_id: ProgressionId(*progression),
                input: MilestoneInput {
                    interaction_id: interaction.map(InteractionId),
                    contact_id: contact.map(ContactId),
                    opportunity_id: opportunity.map(OpportunityId),
                    significance_score: *significance,
                    notes: notes.clone(),
                    ..MilestoneInput::new(*kind, date.unwrap_or(now))
                },
            },
            Commands::Trust {
                progression,
                activity,
                impact,
                date,
                contact,
                description,
            } => Command::RecordTrustActivity {
                progression_id: ProgressionId(*progression),
                input: TrustActivityInput {
                    contact_id: contact.map(ContactId),
                    description: description.clone(),
                    ..TrustActivityInput::new(*activity, *impact, date.unwrap_or(now))
                },
            },
            Commands::Interaction {
                organization,
                channel,
                contact,
                decision_maker,
                products,
                categories,
                date,
                summary,
            } => Command::RecordInteraction {
                input: InteractionInput {
                    contact_id: contact.map(ContactId),
                    decision_maker: *decision_maker,
                    products: products.iter().copied().map(ProductId).collect(),
                    product_categories: categories.clone(),
                    summary: summary.clone(),
                    ..InteractionInput::new(
                        OrganizationId(*organization),
                        *channel,
                        date.unwrap_or(now),
                    )
                },
            },
            Commands::Pattern {
                progression,
                start,
                end,
                quality,
                total,
                inbound,
                outbound,
                response_minutes,
                preferred_channel,
            } => Command::RecordCommunicationPattern {
                progression_id: ProgressionId(*progression),
                input: PatternInput {
                    period_start: *start,
                    period_end: *end,
                    total_interactions: *total,
                    inbound_count: *inbound,
                    outbound_count: *outbound,
                    average_response_minutes: *response_minutes,
                    response_quality: *quality,
                    preferred_channel: *preferred_channel,
                },
            },
            Commands::Snapshot {
                progression,
                overall,
                trust,
                engagement,
                growth,
                risk,
                recommendations,
                date,
            } => Command::RecordHealthSnapshot {
                progression_id: ProgressionId(*progression),
                input: SnapshotInput {
                    assessed_at: date.unwrap_or(now),
                    overall_health_score: *overall,
                    trust_health_score: *trust,
                    engagement_health_score: *engagement,
                    growth_health_score: *growth,
                    risk_level: *risk,
                    recommendations: recommendations.clone(),
                },
            },
            Commands::Annotate {
                progression,
                notes,
                next_steps,
                resilience,
                strategic_value,
            } => Command::Annotate {
                progression_id: ProgressionId(*progression),
                notes: ProgressionNotes {
                    relationship_notes: notes.clone(),
                    next_steps: next_steps.clone(),
                    partnership_resilience_score: *resilience,
                    strategic_value_score: *strategic_value,
                },
            },
            Commands::Deactivate { progression } => Command::Deactivate {
                progression_id: ProgressionId(*progression),
            },
            Commands::Delete { progression } => Command::DeleteProgression {
                progression_id: ProgressionId(*progression),
            },
            _ => return None,
        };
        Some(command)
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments and the loaded config.
pub async fn execute(cli: Cli, mut config: AppConfig) -> Result<(), RapportError> {
    cli.apply_overrides(&mut config);
    let json_mode = cli.json_mode;
    let storage = &config.storage;

    let Some(command) = cli.command else {
        // No subcommand - show status by default
        return cmd_status(storage, json_mode);
    };

    if let Some(engine_command) = command.to_engine_command(Utc::now()) {
        return cmd_run(storage, json_mode, engine_command);
    }

    match command {
        Commands::Server { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            cmd_server(&config).await
        }
        Commands::Init { force } => cmd_init(storage, force),
        Commands::Status => cmd_status(storage, json_mode),
        Commands::Show {
            progression,
            history,
        } => cmd_show(storage, json_mode, ProgressionId(progression), history),
        Commands::Stage {
            progression,
            detailed,
        } => cmd_stage(storage, json_mode, ProgressionId(progression), detailed),
        Commands::Replay { file } => cmd_replay(storage, json_mode, &file),
        Commands::Export { output, format } => cmd_export(storage, &output, format),
        Commands::Import { input } => cmd_import(storage, &input),
        Commands::Hash => cmd_hash(storage, json_mode),
        _ => Err(RapportError::InvalidInput(format!(
            "unhandled command: {:?}",
            command
        ))),
    }
}

// =============================================================================
// TESTS
// =============================================================================
