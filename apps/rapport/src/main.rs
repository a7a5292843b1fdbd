//! # Rapport - Relationship Progression Server
//!
//! The main binary for the Rapport relationship progression engine.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for recording and inspecting progressions
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                apps/rapport (THE BINARY)             │
//! │                                                      │
//! │  ┌─────────────┐   ┌─────────────┐   ┌────────────┐  │
//! │  │    CLI      │   │  HTTP API   │   │   Config   │  │
//! │  │   (clap)    │   │   (axum)    │   │   (toml)   │  │
//! │  └──────┬──────┘   └──────┬──────┘   └─────┬──────┘  │
//! │         └─────────────────┼────────────────┘         │
//! │                           ▼                          │
//! │                   ┌───────────────┐                  │
//! │                   │ rapport-core  │                  │
//! │                   │  (THE LOGIC)  │                  │
//! │                   └───────────────┘                  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server
//! rapport server --host 0.0.0.0 --port 8080
//!
//! # CLI operations
//! rapport open 42
//! rapport milestone 1 first_contact --date 2024-02-01T09:00:00Z
//! rapport stage 1 --detailed
//! ```

use clap::Parser;
use rapport::{
    cli,
    config::{AppConfig, LogFormat},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // Tracing is not up yet, so config errors go straight to stderr.
    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let default_filter = if cli.verbose {
        "rapport=debug,rapport_core=debug,tower_http=debug"
    } else {
        "rapport=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli, config).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Rapport startup banner.
fn print_banner() {
    println!(
        r#"
  ██████╗  █████╗ ██████╗ ██████╗  ██████╗ ██████╗ ████████╗
  ██╔══██╗██╔══██╗██╔══██╗██╔══██╗██╔═══██╗██╔══██╗╚══██╔══╝
  ██████╔╝███████║██████╔╝██████╔╝██║   ██║██████╔╝   ██║
  ██╔══██╗██╔══██║██╔═══╝ ██╔═══╝ ██║   ██║██╔══██╗   ██║
  ██║  ██║██║  ██║██║     ██║     ╚██████╔╝██║  ██║   ██║
  ╚═╝  ╚═╝╚═╝  ╚═╝╚═╝     ╚═╝      ╚═════╝ ╚═╝  ╚═╝   ╚═╝

  Relationship Progression Engine v{}

  Event-sourced • Deterministic • Auditable
"#,
        env!("CARGO_PKG_VERSION")
    );
}
